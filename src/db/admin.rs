//! Generic record access for the administrative panel.
//!
//! Tables are only reachable through [`REGISTRY`], so table and column names
//! interpolated into SQL are always static.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdminModel {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(skip)]
    pub table: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
    #[serde(skip)]
    pub order_by: &'static str,
}

use ColumnKind::{Int, Text};

pub const REGISTRY: &[AdminModel] = &[
    AdminModel {
        name: "users",
        label: "Users",
        table: "users",
        columns: &[
            ("id", Int),
            ("email", Text),
            ("first_name", Text),
            ("last_name", Text),
            ("role", Text),
            ("is_active", Int),
            ("is_staff", Int),
            ("is_superuser", Int),
            ("date_joined", Text),
            ("last_login", Text),
        ],
        order_by: "date_joined DESC, id DESC",
    },
    AdminModel {
        name: "customers",
        label: "Customers",
        table: "customers",
        columns: &[
            ("id", Int),
            ("name", Text),
            ("phone", Text),
            ("email", Text),
            ("address", Text),
            ("customer_type", Text),
            ("credit_limit", Int),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
    AdminModel {
        name: "products",
        label: "Products",
        table: "products",
        columns: &[
            ("id", Int),
            ("name", Text),
            ("description", Text),
            ("image_url", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
    AdminModel {
        name: "product_qualities",
        label: "Product qualities",
        table: "product_qualities",
        columns: &[
            ("id", Int),
            ("product_id", Int),
            ("quality", Text),
            ("retail_price", Int),
            ("wholesale_price", Int),
            ("broker_price", Int),
            ("stock_grams", Int),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
    AdminModel {
        name: "price_lists",
        label: "Price lists",
        table: "price_lists",
        columns: &[
            ("id", Int),
            ("file_name", Text),
            ("uploaded_by", Int),
            ("uploaded_at", Text),
            ("processed", Int),
            ("rows_processed", Int),
        ],
        order_by: "uploaded_at DESC, id DESC",
    },
    AdminModel {
        name: "invoices",
        label: "Invoices",
        table: "invoices",
        columns: &[
            ("id", Int),
            ("invoice_number", Text),
            ("customer_id", Int),
            ("created_by", Int),
            ("created_at", Text),
            ("payment_type", Text),
            ("status", Text),
            ("subtotal", Int),
            ("discount_amount", Int),
            ("tax_amount", Int),
            ("total", Int),
            ("amount_paid", Int),
            ("due_date", Text),
            ("payment_due_date", Text),
            ("notes", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
    AdminModel {
        name: "invoice_items",
        label: "Invoice items",
        table: "invoice_items",
        columns: &[
            ("id", Int),
            ("invoice_id", Int),
            ("product_id", Int),
            ("product_quality_id", Int),
            ("quantity_grams", Int),
            ("unit_price", Int),
            ("discount_amount", Int),
            ("subtotal", Int),
        ],
        order_by: "id DESC",
    },
    AdminModel {
        name: "payments",
        label: "Payments",
        table: "payments",
        columns: &[
            ("id", Int),
            ("invoice_id", Int),
            ("customer_id", Int),
            ("amount", Int),
            ("payment_method", Text),
            ("reference_number", Text),
            ("status", Text),
            ("created_by", Int),
            ("created_at", Text),
            ("notes", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
    AdminModel {
        name: "reminders",
        label: "Reminders",
        table: "reminders",
        columns: &[
            ("id", Int),
            ("invoice_id", Int),
            ("customer_id", Int),
            ("reminder_type", Text),
            ("status", Text),
            ("created_by", Int),
            ("created_at", Text),
            ("sent_at", Text),
            ("notes", Text),
        ],
        order_by: "created_at DESC, id DESC",
    },
];

pub fn lookup(name: &str) -> Option<&'static AdminModel> {
    REGISTRY.iter().find(|m| m.name == name)
}

impl AdminModel {
    fn select(&self) -> String {
        let columns: Vec<&str> = self.columns.iter().map(|(c, _)| *c).collect();
        format!("SELECT {} FROM {}", columns.join(", "), self.table)
    }

    fn to_json(&self, row: &AnyRow) -> Result<Value, sqlx::Error> {
        let mut obj = Map::with_capacity(self.columns.len());
        for (column, kind) in self.columns {
            let value = match kind {
                Int => row
                    .try_get::<Option<i64>, _>(*column)?
                    .map_or(Value::Null, Value::from),
                Text => row
                    .try_get::<Option<String>, _>(*column)?
                    .map_or(Value::Null, Value::from),
            };
            obj.insert((*column).to_string(), value);
        }
        Ok(Value::Object(obj))
    }

    pub async fn count(&self, conn: &mut AnyConnection) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&mut *conn)
            .await?;
        Ok(n)
    }

    pub async fn list(
        &self,
        conn: &mut AnyConnection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Value>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY {} LIMIT ? OFFSET ?",
            self.select(),
            self.order_by
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(|row| self.to_json(row)).collect()
    }

    pub async fn get(
        &self,
        conn: &mut AnyConnection,
        id: i64,
    ) -> Result<Option<Value>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE id = ?", self.select()))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(|r| self.to_json(r)).transpose()
    }

    pub async fn delete(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
