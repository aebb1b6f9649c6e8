//! Partial-update payloads.
//!
//! Every field is optional: `None` leaves the column untouched, `Some(v)` overwrites it.
//! Each payload is applied with a single `UPDATE ... SET col = COALESCE(?, col)`.

use crate::domain::{Money, PaymentMethod, PaymentType, Percent, Quantity, Role, now_text};
use serde::Deserialize;
use sqlx::AnyConnection;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityPatch {
    pub retail_price: Option<Money>,
    pub wholesale_price: Option<Money>,
    pub broker_price: Option<Money>,
    pub stock_quantity: Option<Quantity>,
}

/// Header fields of a draft invoice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoicePatch {
    pub payment_type: Option<PaymentType>,
    pub discount_percentage: Option<Percent>,
    pub tax_percentage: Option<Percent>,
    pub payment_due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentPatch {
    pub amount: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl UserPatch {
    pub async fn apply(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            r"
            UPDATE users
            SET
                email = COALESCE(?, email),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                role = COALESCE(?, role),
                is_active = COALESCE(?, is_active)
            WHERE id = ?
            ",
        )
        .bind(self.email.as_deref().map(str::trim))
        .bind(self.first_name.as_deref())
        .bind(self.last_name.as_deref())
        .bind(self.role.map(|r| r.as_str()))
        .bind(self.is_active.map(i64::from))
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(
            table = "users",
            id,
            affected = res.rows_affected(),
            email_set = self.email.is_some(),
            role_set = self.role.is_some(),
            is_active_set = self.is_active.is_some(),
            "db patch applied"
        );
        Ok(res.rows_affected() > 0)
    }
}

impl ProductPatch {
    pub async fn apply(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            r"
            UPDATE products
            SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                image_url = COALESCE(?, image_url),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(self.name.as_deref().map(str::trim))
        .bind(self.description.as_deref())
        .bind(self.image_url.as_deref())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(table = "products", id, affected = res.rows_affected(), "db patch applied");
        Ok(res.rows_affected() > 0)
    }
}

impl QualityPatch {
    pub async fn apply(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            r"
            UPDATE product_qualities
            SET
                retail_price = COALESCE(?, retail_price),
                wholesale_price = COALESCE(?, wholesale_price),
                broker_price = COALESCE(?, broker_price),
                stock_grams = COALESCE(?, stock_grams),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(self.retail_price.map(Money::paise))
        .bind(self.wholesale_price.map(Money::paise))
        .bind(self.broker_price.map(Money::paise))
        .bind(self.stock_quantity.map(Quantity::grams))
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(
            table = "product_qualities",
            id,
            affected = res.rows_affected(),
            "db patch applied"
        );
        Ok(res.rows_affected() > 0)
    }
}

impl InvoicePatch {
    pub async fn apply(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            r"
            UPDATE invoices
            SET
                payment_type = COALESCE(?, payment_type),
                discount_percentage = COALESCE(?, discount_percentage),
                tax_percentage = COALESCE(?, tax_percentage),
                payment_due_date = COALESCE(?, payment_due_date),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(self.payment_type.map(|p| p.as_str()))
        .bind(self.discount_percentage.map(|p| p.0))
        .bind(self.tax_percentage.map(|p| p.0))
        .bind(self.payment_due_date.as_deref())
        .bind(self.notes.as_deref())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(table = "invoices", id, affected = res.rows_affected(), "db patch applied");
        Ok(res.rows_affected() > 0)
    }
}

impl PaymentPatch {
    pub async fn apply(&self, conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            r"
            UPDATE payments
            SET
                amount = COALESCE(?, amount),
                payment_method = COALESCE(?, payment_method),
                reference_number = COALESCE(?, reference_number),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(self.amount.map(Money::paise))
        .bind(self.payment_method.map(|m| m.as_str()))
        .bind(self.reference_number.as_deref())
        .bind(self.notes.as_deref())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(table = "payments", id, affected = res.rows_affected(), "db patch applied");
        Ok(res.rows_affected() > 0)
    }
}
