//! SQL DDL for the application schema, as an ordered list of migrations.
//!
//! The statements are shared between MySQL and SQLite. Two placeholders are
//! substituted per dialect before execution:
//! - `{pk}`: auto-incrementing primary key column type
//! - `{engine}`: table options suffix (InnoDB/utf8mb4 on MySQL, empty on SQLite)
//!
//! Tables are created with `IF NOT EXISTS` so a migration that stopped halfway
//! (MySQL commits DDL implicitly) can be re-run. SQLite indexes get the same
//! guard in the rendered text; MySQL has no such clause, so [`created_index`]
//! lets the migrator skip indexes that already exist.
//!
//! Money columns hold paise, percentages hold basis points, weights hold grams.
//! Timestamps are UTC `YYYY-MM-DD HH:MM:SS` text; dates are `YYYY-MM-DD` text.

use super::Dialect;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    /// Statements of this migration rendered for `dialect`.
    pub fn statements(&self, dialect: Dialect) -> Vec<String> {
        let (pk, engine) = match dialect {
            Dialect::MySql => (
                "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
                " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            ),
            Dialect::Sqlite => ("INTEGER PRIMARY KEY AUTOINCREMENT", ""),
        };
        let index = match dialect {
            Dialect::MySql => "CREATE INDEX ",
            Dialect::Sqlite => "CREATE INDEX IF NOT EXISTS ",
        };
        self.sql
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.replace("{pk}", pk)
                    .replace("{engine}", engine)
                    .replace("CREATE INDEX ", index)
            })
            .collect()
    }
}

/// `(index, table)` created by a `CREATE INDEX name ON table(...)` statement.
pub fn created_index(stmt: &str) -> Option<(&str, &str)> {
    let start = stmt.find("CREATE INDEX ")? + "CREATE INDEX ".len();
    let mut words = stmt[start..].split_whitespace();
    let mut name = words.next()?;
    if name == "IF" {
        words.next().filter(|w| *w == "NOT")?;
        words.next().filter(|w| *w == "EXISTS")?;
        name = words.next()?;
    }
    words.next().filter(|w| w.eq_ignore_ascii_case("ON"))?;
    let table = words.next()?.split('(').next()?;
    (!table.is_empty()).then_some((name, table))
}

/// Bookkeeping table recording which migrations have been applied.
pub const LEDGER_DDL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT NOT NULL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    applied_at VARCHAR(19) NOT NULL
)";

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "auth_users",
        sql: r"
-- ---------------------------------------------------------------------------
-- Users (login by email)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id {pk},
    email VARCHAR(254) NOT NULL,
    first_name VARCHAR(150) NOT NULL DEFAULT '',
    last_name VARCHAR(150) NOT NULL DEFAULT '',
    role VARCHAR(20) NOT NULL DEFAULT 'executive',
    is_active BIGINT NOT NULL DEFAULT 1,
    is_staff BIGINT NOT NULL DEFAULT 0,
    is_superuser BIGINT NOT NULL DEFAULT 0,
    password_hash VARCHAR(255) NOT NULL,
    date_joined VARCHAR(19) NOT NULL,
    last_login VARCHAR(19) NULL,
    UNIQUE (email)
){engine};
",
    },
    Migration {
        version: 2,
        name: "customers",
        sql: r"
-- ---------------------------------------------------------------------------
-- Customers
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS customers (
    id {pk},
    name VARCHAR(100) NOT NULL,
    phone VARCHAR(15) NOT NULL,
    email VARCHAR(254) NULL,
    address VARCHAR(1000) NULL,
    customer_type VARCHAR(20) NOT NULL DEFAULT 'retail',
    credit_limit BIGINT NOT NULL DEFAULT 0,
    created_at VARCHAR(19) NOT NULL,
    updated_at VARCHAR(19) NOT NULL
){engine};

CREATE INDEX idx_customers_name ON customers(name);
CREATE INDEX idx_customers_phone ON customers(phone);
",
    },
    Migration {
        version: 3,
        name: "products",
        sql: r"
-- ---------------------------------------------------------------------------
-- Products and their quality variants
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS products (
    id {pk},
    name VARCHAR(100) NOT NULL,
    description VARCHAR(1000) NULL,
    image_url VARCHAR(500) NULL,
    created_at VARCHAR(19) NOT NULL,
    updated_at VARCHAR(19) NOT NULL
){engine};

CREATE INDEX idx_products_name ON products(name);

CREATE TABLE IF NOT EXISTS product_qualities (
    id {pk},
    product_id BIGINT NOT NULL,
    quality VARCHAR(20) NOT NULL,
    retail_price BIGINT NOT NULL,
    wholesale_price BIGINT NOT NULL,
    broker_price BIGINT NOT NULL,
    stock_grams BIGINT NOT NULL DEFAULT 0,
    created_at VARCHAR(19) NOT NULL,
    updated_at VARCHAR(19) NOT NULL,
    UNIQUE (product_id, quality),
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
){engine};

-- ---------------------------------------------------------------------------
-- Uploaded price lists
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS price_lists (
    id {pk},
    file_name VARCHAR(255) NOT NULL,
    uploaded_by BIGINT NULL,
    uploaded_at VARCHAR(19) NOT NULL,
    processed BIGINT NOT NULL DEFAULT 0,
    rows_processed BIGINT NOT NULL DEFAULT 0,
    FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE SET NULL
){engine};
",
    },
    Migration {
        version: 4,
        name: "billing",
        sql: r"
-- ---------------------------------------------------------------------------
-- Invoices
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invoices (
    id {pk},
    invoice_number VARCHAR(20) NOT NULL,
    customer_id BIGINT NOT NULL,
    created_by BIGINT NULL,
    created_at VARCHAR(19) NOT NULL,
    updated_at VARCHAR(19) NOT NULL,
    payment_type VARCHAR(20) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    subtotal BIGINT NOT NULL DEFAULT 0,
    discount_percentage BIGINT NOT NULL DEFAULT 0,
    discount_amount BIGINT NOT NULL DEFAULT 0,
    tax_percentage BIGINT NOT NULL DEFAULT 0,
    tax_amount BIGINT NOT NULL DEFAULT 0,
    total BIGINT NOT NULL DEFAULT 0,
    amount_paid BIGINT NOT NULL DEFAULT 0,
    due_date VARCHAR(10) NULL,
    payment_due_date VARCHAR(10) NULL,
    notes VARCHAR(2000) NULL,
    UNIQUE (invoice_number),
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
){engine};

CREATE INDEX idx_invoices_status ON invoices(status);
CREATE INDEX idx_invoices_created_at ON invoices(created_at);

CREATE TABLE IF NOT EXISTS invoice_items (
    id {pk},
    invoice_id BIGINT NOT NULL,
    product_id BIGINT NOT NULL,
    product_quality_id BIGINT NOT NULL,
    quantity_grams BIGINT NOT NULL,
    unit_price BIGINT NOT NULL,
    discount_percentage BIGINT NOT NULL DEFAULT 0,
    discount_amount BIGINT NOT NULL DEFAULT 0,
    subtotal BIGINT NOT NULL,
    FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE,
    FOREIGN KEY (product_quality_id) REFERENCES product_qualities(id) ON DELETE CASCADE
){engine};
",
    },
    Migration {
        version: 5,
        name: "payments",
        sql: r"
-- ---------------------------------------------------------------------------
-- Payments and reminders
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS payments (
    id {pk},
    invoice_id BIGINT NOT NULL,
    customer_id BIGINT NOT NULL,
    amount BIGINT NOT NULL,
    payment_method VARCHAR(20) NOT NULL,
    reference_number VARCHAR(50) NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'completed',
    created_by BIGINT NULL,
    created_at VARCHAR(19) NOT NULL,
    updated_at VARCHAR(19) NOT NULL,
    notes VARCHAR(2000) NULL,
    FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
){engine};

CREATE INDEX idx_payments_created_at ON payments(created_at);

CREATE TABLE IF NOT EXISTS reminders (
    id {pk},
    invoice_id BIGINT NOT NULL,
    customer_id BIGINT NOT NULL,
    reminder_type VARCHAR(20) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    created_by BIGINT NULL,
    created_at VARCHAR(19) NOT NULL,
    sent_at VARCHAR(19) NULL,
    notes VARCHAR(2000) NULL,
    FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE,
    FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
){engine};
",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn renders_per_dialect() {
        let sqlite = MIGRATIONS[0].statements(Dialect::Sqlite);
        assert_eq!(sqlite.len(), 1);
        assert!(sqlite[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!sqlite[0].contains("{engine}"));

        let mysql = MIGRATIONS[0].statements(Dialect::MySql);
        assert!(mysql[0].contains("AUTO_INCREMENT"));
        assert!(mysql[0].ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
    }

    #[test]
    fn every_statement_can_be_repeated() {
        for migration in MIGRATIONS {
            for stmt in migration.statements(Dialect::Sqlite) {
                assert!(
                    stmt.contains("IF NOT EXISTS"),
                    "migration {} is not repeatable: {stmt}",
                    migration.version
                );
            }
            for stmt in migration.statements(Dialect::MySql) {
                assert!(
                    stmt.contains("CREATE TABLE IF NOT EXISTS") || created_index(&stmt).is_some(),
                    "migration {} is not repeatable: {stmt}",
                    migration.version
                );
            }
        }
    }

    #[test]
    fn index_statements_name_their_table() {
        assert_eq!(
            created_index("CREATE INDEX idx_customers_name ON customers(name)"),
            Some(("idx_customers_name", "customers"))
        );
        assert_eq!(
            created_index("CREATE INDEX IF NOT EXISTS idx_a ON payments (created_at)"),
            Some(("idx_a", "payments"))
        );
        assert_eq!(created_index("CREATE TABLE users (id INTEGER)"), None);
    }
}
