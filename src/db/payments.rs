use super::inserted_id;
use super::models::{Payment, PaymentListing, Reminder};
use crate::domain::{
    Money, PaymentMethod, PaymentStatus, ReminderStatus, ReminderType, day_end_exclusive,
    day_start, now_text,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Any, AnyConnection, QueryBuilder};

const PAYMENT_COLUMNS: &str = "pm.id, pm.invoice_id, pm.customer_id, pm.amount, \
     pm.payment_method, pm.reference_number, pm.status, pm.created_by, pm.created_at, \
     pm.updated_at, pm.notes";

const LISTING_FROM: &str = "i.invoice_number AS invoice_number, c.name AS customer_name \
     FROM payments pm \
     JOIN invoices i ON i.id = pm.invoice_id \
     JOIN customers c ON c.id = pm.customer_id";

const REMINDER_COLUMNS: &str = "id, invoice_id, customer_id, reminder_type, status, created_by, \
     created_at, sent_at, notes";

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub invoice_id: i64,
    pub customer_id: i64,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    pub status: PaymentStatus,
    pub created_by: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub query: Option<String>,
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub invoice_id: i64,
    pub customer_id: i64,
    pub reminder_type: ReminderType,
    pub status: ReminderStatus,
    pub created_by: Option<i64>,
    pub sent_at: Option<String>,
    pub notes: Option<String>,
}

pub async fn insert(conn: &mut AnyConnection, p: &NewPayment) -> Result<i64, sqlx::Error> {
    let now = now_text();
    let res = sqlx::query(
        r"
        INSERT INTO payments
            (invoice_id, customer_id, amount, payment_method, reference_number, status,
             created_by, created_at, updated_at, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(p.invoice_id)
    .bind(p.customer_id)
    .bind(p.amount.paise())
    .bind(p.payment_method.as_str())
    .bind(p.reference_number.as_deref())
    .bind(p.status.as_str())
    .bind(p.created_by)
    .bind(now.as_str())
    .bind(now.as_str())
    .bind(p.notes.as_deref())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn find(conn: &mut AnyConnection, id: i64) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments pm WHERE pm.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_listing(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<PaymentListing>, sqlx::Error> {
    sqlx::query_as::<_, PaymentListing>(&format!(
        "SELECT {PAYMENT_COLUMNS}, {LISTING_FROM} WHERE pm.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn set_status(
    conn: &mut AnyConnection,
    id: i64,
    status: PaymentStatus,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn for_invoice(
    conn: &mut AnyConnection,
    invoice_id: i64,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments pm WHERE pm.invoice_id = ? \
         ORDER BY pm.created_at DESC, pm.id DESC"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
}

/// Sum of completed payments against an invoice.
pub async fn completed_total(
    conn: &mut AnyConnection,
    invoice_id: i64,
) -> Result<Money, sqlx::Error> {
    let amounts: Vec<(i64,)> =
        sqlx::query_as("SELECT amount FROM payments WHERE invoice_id = ? AND status = ?")
            .bind(invoice_id)
            .bind(PaymentStatus::Completed.as_str())
            .fetch_all(&mut *conn)
            .await?;
    Ok(amounts.into_iter().map(|(a,)| Money(a)).sum())
}

/// Filtered payments, newest first.
pub async fn list(
    conn: &mut AnyConnection,
    filter: &PaymentFilter,
    customer_id: Option<i64>,
) -> Result<Vec<PaymentListing>, sqlx::Error> {
    let mut qb: QueryBuilder<'_, Any> = QueryBuilder::new(format!(
        "SELECT {PAYMENT_COLUMNS}, {LISTING_FROM} WHERE 1 = 1"
    ));
    if let Some(q) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = super::contains_pattern(q);
        qb.push(" AND (LOWER(i.invoice_number) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(c.name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(pm.reference_number, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND pm.status = ").push_bind(status.as_str());
    }
    if let Some(method) = filter.payment_method {
        qb.push(" AND pm.payment_method = ").push_bind(method.as_str());
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND pm.created_at >= ").push_bind(day_start(from));
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND pm.created_at < ").push_bind(day_end_exclusive(to));
    }
    if let Some(id) = customer_id {
        qb.push(" AND pm.customer_id = ").push_bind(id);
    }
    qb.push(" ORDER BY pm.created_at DESC, pm.id DESC");
    qb.build_query_as::<PaymentListing>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert_reminder(
    conn: &mut AnyConnection,
    r: &NewReminder,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        r"
        INSERT INTO reminders
            (invoice_id, customer_id, reminder_type, status, created_by, created_at, sent_at, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(r.invoice_id)
    .bind(r.customer_id)
    .bind(r.reminder_type.as_str())
    .bind(r.status.as_str())
    .bind(r.created_by)
    .bind(now_text())
    .bind(r.sent_at.as_deref())
    .bind(r.notes.as_deref())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn reminders_for(
    conn: &mut AnyConnection,
    invoice_id: i64,
) -> Result<Vec<Reminder>, sqlx::Error> {
    sqlx::query_as::<_, Reminder>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE invoice_id = ? \
         ORDER BY created_at DESC, id DESC"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn find_reminder(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<Reminder>, sqlx::Error> {
    sqlx::query_as::<_, Reminder>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}
