use super::models::Customer;
use super::{contains_pattern, inserted_id};
use crate::domain::{CustomerType, InvoiceStatus, Money, now_text};
use ahash::AHashMap;
use serde::Deserialize;
use sqlx::AnyConnection;

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, address, customer_type, credit_limit, created_at, updated_at";

/// Customer fields accepted on create and full update.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerForm {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_customer_type")]
    pub customer_type: CustomerType,
    #[serde(default)]
    pub credit_limit: Money,
}

fn default_customer_type() -> CustomerType {
    CustomerType::Retail
}

impl CustomerForm {
    /// Trims fields and checks the required ones.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self.address = self
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        if self.name.is_empty() {
            return Err("Customer name is required.".to_string());
        }
        if self.name.chars().count() > 100 {
            return Err("Customer name must be at most 100 characters.".to_string());
        }
        if self.phone.is_empty() {
            return Err("Phone number is required.".to_string());
        }
        if self.phone.chars().count() > 15 {
            return Err("Phone number must be at most 15 characters.".to_string());
        }
        if let Some(email) = &self.email
            && !crate::auth::looks_like_email(email)
        {
            return Err("Enter a valid email address.".to_string());
        }
        if self.credit_limit.is_negative() {
            return Err("Credit limit cannot be negative.".to_string());
        }
        Ok(self)
    }
}

pub async fn insert(conn: &mut AnyConnection, form: &CustomerForm) -> Result<i64, sqlx::Error> {
    let now = now_text();
    let res = sqlx::query(
        r"
        INSERT INTO customers
            (name, phone, email, address, customer_type, credit_limit, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(form.name.as_str())
    .bind(form.phone.as_str())
    .bind(form.email.as_deref())
    .bind(form.address.as_deref())
    .bind(form.customer_type.as_str())
    .bind(form.credit_limit.paise())
    .bind(now.as_str())
    .bind(now.as_str())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn update(
    conn: &mut AnyConnection,
    id: i64,
    form: &CustomerForm,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r"
        UPDATE customers
        SET name = ?, phone = ?, email = ?, address = ?, customer_type = ?,
            credit_limit = ?, updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(form.name.as_str())
    .bind(form.phone.as_str())
    .bind(form.email.as_deref())
    .bind(form.address.as_deref())
    .bind(form.customer_type.as_str())
    .bind(form.credit_limit.paise())
    .bind(now_text())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn find_by_id(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list(conn: &mut AnyConnection) -> Result<Vec<Customer>, sqlx::Error> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, id"
    ))
    .fetch_all(&mut *conn)
    .await
}

/// Phone or name contains `q` (case-insensitive), at most `limit` rows.
pub async fn search(
    conn: &mut AnyConnection,
    q: &str,
    limit: i64,
) -> Result<Vec<Customer>, sqlx::Error> {
    let pattern = contains_pattern(q);
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         WHERE LOWER(phone) LIKE ? OR LOWER(name) LIKE ? ORDER BY name, id LIMIT ?"
    ))
    .bind(pattern.as_str())
    .bind(pattern.as_str())
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

/// Existing customer with the same name (case-insensitive) or the same phone.
pub async fn find_duplicate(
    conn: &mut AnyConnection,
    name: &str,
    phone: &str,
) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         WHERE LOWER(name) = ? OR phone = ? ORDER BY id LIMIT 1"
    ))
    .bind(name.trim().to_lowercase())
    .bind(phone.trim())
    .fetch_optional(&mut *conn)
    .await
}

/// `?, ?, ?` for an `IN (...)` list of `n` binds.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n.max(1)].join(", ")
}

/// Outstanding balance (`total - amount_paid`, floored at zero) per customer,
/// summed over invoices in `statuses`.
pub async fn open_balances(
    conn: &mut AnyConnection,
    statuses: &[InvoiceStatus],
    customer_id: Option<i64>,
) -> Result<AHashMap<i64, Money>, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(AHashMap::new());
    }
    let mut sql = format!(
        "SELECT customer_id, total, amount_paid FROM invoices WHERE status IN ({})",
        placeholders(statuses.len())
    );
    if customer_id.is_some() {
        sql.push_str(" AND customer_id = ?");
    }
    let mut query = sqlx::query_as::<_, (i64, i64, i64)>(&sql);
    for status in statuses {
        query = query.bind(status.as_str());
    }
    if let Some(id) = customer_id {
        query = query.bind(id);
    }

    let mut balances: AHashMap<i64, Money> = AHashMap::new();
    for (customer, total, paid) in query.fetch_all(&mut *conn).await? {
        *balances.entry(customer).or_default() += Money(total - paid).non_negative();
    }
    Ok(balances)
}

/// Sum owed towards the credit limit: open balances of pending or overdue invoices.
pub async fn total_pending_amount(
    conn: &mut AnyConnection,
    customer_id: i64,
) -> Result<Money, sqlx::Error> {
    let balances =
        open_balances(conn, InvoiceStatus::CREDIT_EXPOSURE, Some(customer_id)).await?;
    Ok(balances.get(&customer_id).copied().unwrap_or_default())
}
