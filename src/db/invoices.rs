use super::inserted_id;
use super::models::{Invoice, InvoiceItem, InvoiceItemListing, InvoiceListing};
use crate::domain::{
    InvoiceStatus, Money, PaymentType, Percent, Quantity, day_end_exclusive, day_start, now_text,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Any, AnyConnection, QueryBuilder};

pub(crate) const INVOICE_COLUMNS: &str = "i.id, i.invoice_number, i.customer_id, i.created_by, \
     i.created_at, i.updated_at, i.payment_type, i.status, i.subtotal, i.discount_percentage, \
     i.discount_amount, i.tax_percentage, i.tax_amount, i.total, i.amount_paid, i.due_date, \
     i.payment_due_date, i.notes";

const LISTING_SELECT: &str = "c.name AS customer_name, c.phone AS customer_phone, \
     c.customer_type AS customer_type FROM invoices i JOIN customers c ON c.id = i.customer_id";

const ITEM_COLUMNS: &str = "ii.id, ii.invoice_id, ii.product_id, ii.product_quality_id, \
     ii.quantity_grams, ii.unit_price, ii.discount_percentage, ii.discount_amount, ii.subtotal";

/// Everything needed to persist a new invoice header.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub customer_id: i64,
    pub created_by: Option<i64>,
    pub payment_type: PaymentType,
    pub status: InvoiceStatus,
    pub subtotal: Money,
    pub discount_percentage: Percent,
    pub discount_amount: Money,
    pub tax_percentage: Percent,
    pub tax_amount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub due_date: Option<String>,
    pub payment_due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub invoice_id: i64,
    pub product_id: i64,
    pub product_quality_id: i64,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub discount_percentage: Percent,
    pub discount_amount: Money,
    pub subtotal: Money,
}

/// Totals recomputed from items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub query: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub payment_type: Option<PaymentType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub customer_id: Option<i64>,
}

pub async fn insert(conn: &mut AnyConnection, inv: &NewInvoice) -> Result<i64, sqlx::Error> {
    let now = now_text();
    let res = sqlx::query(
        r"
        INSERT INTO invoices
            (invoice_number, customer_id, created_by, created_at, updated_at, payment_type,
             status, subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount,
             total, amount_paid, due_date, payment_due_date, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(inv.invoice_number.as_str())
    .bind(inv.customer_id)
    .bind(inv.created_by)
    .bind(now.as_str())
    .bind(now.as_str())
    .bind(inv.payment_type.as_str())
    .bind(inv.status.as_str())
    .bind(inv.subtotal.paise())
    .bind(inv.discount_percentage.0)
    .bind(inv.discount_amount.paise())
    .bind(inv.tax_percentage.0)
    .bind(inv.tax_amount.paise())
    .bind(inv.total.paise())
    .bind(inv.amount_paid.paise())
    .bind(inv.due_date.as_deref())
    .bind(inv.payment_due_date.as_deref())
    .bind(inv.notes.as_deref())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn number_exists(conn: &mut AnyConnection, number: &str) -> Result<bool, sqlx::Error> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM invoices WHERE invoice_number = ?")
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn find(conn: &mut AnyConnection, id: i64) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices i WHERE i.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn find_listing(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<InvoiceListing>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceListing>(&format!(
        "SELECT {INVOICE_COLUMNS}, {LISTING_SELECT} WHERE i.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Filtered invoices, newest first.
pub async fn list(
    conn: &mut AnyConnection,
    filter: &InvoiceFilter,
) -> Result<Vec<InvoiceListing>, sqlx::Error> {
    let mut qb: QueryBuilder<'_, Any> = QueryBuilder::new(format!(
        "SELECT {INVOICE_COLUMNS}, {LISTING_SELECT} WHERE 1 = 1"
    ));
    if let Some(q) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = super::contains_pattern(q);
        qb.push(" AND (LOWER(i.invoice_number) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(c.name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(c.phone) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND i.status = ").push_bind(status.as_str());
    }
    if let Some(pt) = filter.payment_type {
        qb.push(" AND i.payment_type = ").push_bind(pt.as_str());
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND i.created_at >= ").push_bind(day_start(from));
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND i.created_at < ").push_bind(day_end_exclusive(to));
    }
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND i.customer_id = ").push_bind(customer_id);
    }
    qb.push(" ORDER BY i.created_at DESC, i.id DESC");
    qb.build_query_as::<InvoiceListing>()
        .fetch_all(&mut *conn)
        .await
}

/// Invoices whose status is in `statuses`.
pub async fn list_by_status(
    conn: &mut AnyConnection,
    statuses: &[InvoiceStatus],
) -> Result<Vec<InvoiceListing>, sqlx::Error> {
    let mut qb: QueryBuilder<'_, Any> = QueryBuilder::new(format!(
        "SELECT {INVOICE_COLUMNS}, {LISTING_SELECT} WHERE i.status IN ("
    ));
    let mut sep = qb.separated(", ");
    for status in statuses {
        sep.push_bind(status.as_str());
    }
    qb.push(") ORDER BY i.created_at DESC, i.id DESC");
    qb.build_query_as::<InvoiceListing>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn set_status(
    conn: &mut AnyConnection,
    id: i64,
    status: InvoiceStatus,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE invoices SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn set_settlement(
    conn: &mut AnyConnection,
    id: i64,
    amount_paid: Money,
    status: InvoiceStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE invoices SET amount_paid = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(amount_paid.paise())
        .bind(status.as_str())
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_totals(
    conn: &mut AnyConnection,
    id: i64,
    totals: Totals,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE invoices SET subtotal = ?, discount_amount = ?, tax_amount = ?, total = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(totals.subtotal.paise())
    .bind(totals.discount_amount.paise())
    .bind(totals.tax_amount.paise())
    .bind(totals.total.paise())
    .bind(now_text())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_due_date(
    conn: &mut AnyConnection,
    id: i64,
    due_date: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE invoices SET due_date = ?, updated_at = ? WHERE id = ?")
        .bind(due_date)
        .bind(now_text())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM invoices WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Marks open invoices whose due date has passed; returns affected rows.
pub async fn mark_overdue(conn: &mut AnyConnection, today: &str) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r"
        UPDATE invoices
        SET status = ?, updated_at = ?
        WHERE status IN (?, ?, ?)
          AND amount_paid < total
          AND COALESCE(payment_due_date, due_date) IS NOT NULL
          AND COALESCE(payment_due_date, due_date) < ?
        ",
    )
    .bind(InvoiceStatus::Overdue.as_str())
    .bind(now_text())
    .bind(InvoiceStatus::PendingPayment.as_str())
    .bind(InvoiceStatus::Issued.as_str())
    .bind(InvoiceStatus::PartiallyPaid.as_str())
    .bind(today)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}

pub async fn insert_item(conn: &mut AnyConnection, item: &NewItem) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        r"
        INSERT INTO invoice_items
            (invoice_id, product_id, product_quality_id, quantity_grams, unit_price,
             discount_percentage, discount_amount, subtotal)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(item.invoice_id)
    .bind(item.product_id)
    .bind(item.product_quality_id)
    .bind(item.quantity.grams())
    .bind(item.unit_price.paise())
    .bind(item.discount_percentage.0)
    .bind(item.discount_amount.paise())
    .bind(item.subtotal.paise())
    .execute(&mut *conn)
    .await?;
    inserted_id(conn, &res).await
}

pub async fn update_item(
    conn: &mut AnyConnection,
    id: i64,
    item: &NewItem,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r"
        UPDATE invoice_items
        SET product_id = ?, product_quality_id = ?, quantity_grams = ?, unit_price = ?,
            discount_percentage = ?, discount_amount = ?, subtotal = ?
        WHERE id = ?
        ",
    )
    .bind(item.product_id)
    .bind(item.product_quality_id)
    .bind(item.quantity.grams())
    .bind(item.unit_price.paise())
    .bind(item.discount_percentage.0)
    .bind(item.discount_amount.paise())
    .bind(item.subtotal.paise())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn find_item(
    conn: &mut AnyConnection,
    id: i64,
) -> Result<Option<InvoiceItem>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM invoice_items ii WHERE ii.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn delete_item(conn: &mut AnyConnection, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM invoice_items WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn items_of(
    conn: &mut AnyConnection,
    invoice_id: i64,
) -> Result<Vec<InvoiceItemListing>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceItemListing>(&format!(
        "SELECT {ITEM_COLUMNS}, p.name AS product_name, pq.quality AS quality \
         FROM invoice_items ii \
         JOIN products p ON p.id = ii.product_id \
         JOIN product_qualities pq ON pq.id = ii.product_quality_id \
         WHERE ii.invoice_id = ? ORDER BY ii.id"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await
}

/// Items of non-draft invoices created in `[from, to]`, with the invoice date.
pub async fn sold_items_between(
    conn: &mut AnyConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<(InvoiceItemListing, String)>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        item: InvoiceItemListing,
        invoice_created_at: String,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        "SELECT {ITEM_COLUMNS}, p.name AS product_name, pq.quality AS quality, \
                i.created_at AS invoice_created_at \
         FROM invoice_items ii \
         JOIN invoices i ON i.id = ii.invoice_id \
         JOIN products p ON p.id = ii.product_id \
         JOIN product_qualities pq ON pq.id = ii.product_quality_id \
         WHERE i.status <> ? AND i.created_at >= ? AND i.created_at < ? \
         ORDER BY ii.id"
    ))
    .bind(InvoiceStatus::Draft.as_str())
    .bind(day_start(from))
    .bind(day_end_exclusive(to))
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.item, r.invoice_created_at))
        .collect())
}
