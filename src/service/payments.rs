//! Payments against invoices, settlement, pending balances and reminders.

use crate::db::invoices;
use crate::db::models::{
    Customer, Invoice, InvoiceListing, Page, Payment, PaymentListing, Reminder,
};
use crate::db::patch::PaymentPatch;
use crate::db::payments::{self, NewPayment, NewReminder, PaymentFilter};
use crate::db::{Db, customers};
use crate::domain::{
    InvoiceStatus, Money, PaymentMethod, PaymentStatus, ReminderStatus, ReminderType, now_text,
    today,
};
use crate::error::{AppError, AppResult};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::AnyConnection;
use tracing::info;

pub const PAYMENTS_PER_PAGE: i64 = 10;

/// Window used for the "due soon" bucket of pending invoices.
pub const DUE_SOON_DAYS: u64 = 7;

/// Status implied by the amount received so far.
pub fn settlement_status(amount_paid: Money, total: Money) -> InvoiceStatus {
    if amount_paid >= total {
        InvoiceStatus::Paid
    } else if amount_paid > Money::ZERO {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Issued
    }
}

/// Settlement on the invoice beyond its completed payments, such as a manual mark-paid.
async fn carried_settlement(conn: &mut AnyConnection, invoice: &Invoice) -> AppResult<Money> {
    let completed = payments::completed_total(conn, invoice.id).await?;
    Ok((invoice.amount_paid - completed).non_negative())
}

/// Recomputes `amount_paid` from completed payments plus `carried` and updates the status.
async fn settle(
    conn: &mut AnyConnection,
    invoice_id: i64,
    carried: Money,
) -> AppResult<Invoice> {
    let invoice = load_invoice(conn, invoice_id).await?;
    let paid = payments::completed_total(conn, invoice_id).await? + carried;
    let status = settlement_status(paid, invoice.total);
    invoices::set_settlement(conn, invoice_id, paid, status).await?;
    info!(
        invoice = %invoice.invoice_number,
        amount_paid = %paid,
        status = %status,
        "invoice settled"
    );
    load_invoice(conn, invoice_id).await
}

fn ensure_payable(invoice: &Invoice) -> AppResult<()> {
    match invoice.status {
        InvoiceStatus::Paid => Err(AppError::conflict("This invoice is already fully paid.")),
        InvoiceStatus::Cancelled => Err(AppError::conflict(
            "Cannot add payment to a cancelled invoice.",
        )),
        _ => Ok(()),
    }
}

fn ensure_within_due(amount: Money, invoice: &Invoice) -> AppResult<()> {
    if amount > invoice.amount_due() {
        return Err(AppError::Unprocessable(format!(
            "Payment amount (₹{amount}) exceeds the amount due (₹{}).",
            invoice.amount_due()
        )));
    }
    Ok(())
}

async fn load_invoice(conn: &mut AnyConnection, id: i64) -> AppResult<Invoice> {
    invoices::find(conn, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))
}

async fn load_payment(conn: &mut AnyConnection, id: i64) -> AppResult<Payment> {
    payments::find(conn, id)
        .await?
        .ok_or(AppError::NotFound("Payment"))
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentForm {
    pub amount: Money,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default = "default_payment_status")]
    pub status: PaymentStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_payment_status() -> PaymentStatus {
    PaymentStatus::Completed
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub invoice: Invoice,
}

pub async fn record_payment(
    db: &Db,
    invoice_id: i64,
    user_id: i64,
    form: &PaymentForm,
) -> AppResult<PaymentRecorded> {
    if form.amount <= Money::ZERO {
        return Err(AppError::validation(
            "Payment amount must be greater than zero.",
        ));
    }

    let mut tx = db.begin().await?;
    let invoice = load_invoice(&mut tx, invoice_id).await?;
    ensure_payable(&invoice)?;
    ensure_within_due(form.amount, &invoice)?;
    let carried = carried_settlement(&mut tx, &invoice).await?;

    let payment_id = payments::insert(
        &mut tx,
        &NewPayment {
            invoice_id,
            customer_id: invoice.customer_id,
            amount: form.amount,
            payment_method: form.payment_method,
            reference_number: trimmed(form.reference_number.as_ref()),
            status: form.status,
            created_by: Some(user_id),
            notes: trimmed(form.notes.as_ref()),
        },
    )
    .await?;
    let invoice = if form.status == PaymentStatus::Completed {
        settle(&mut tx, invoice_id, carried).await?
    } else {
        invoice
    };
    let payment = load_payment(&mut tx, payment_id).await?;
    tx.commit().await?;

    info!(
        payment_id,
        invoice = %invoice.invoice_number,
        amount = %payment.amount,
        "payment recorded"
    );
    Ok(PaymentRecorded { payment, invoice })
}

pub async fn payment_detail(db: &Db, id: i64) -> AppResult<PaymentListing> {
    let mut conn = db.acquire().await?;
    payments::find_listing(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Payment"))
}

/// Edits a pending payment; the amount may not exceed what is still owed.
pub async fn update_payment(db: &Db, id: i64, patch: &PaymentPatch) -> AppResult<Payment> {
    let mut tx = db.begin().await?;
    let payment = load_payment(&mut tx, id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::conflict("Only pending payments can be updated."));
    }
    if let Some(amount) = patch.amount {
        if amount <= Money::ZERO {
            return Err(AppError::validation(
                "Payment amount must be greater than zero.",
            ));
        }
        // Pending payments are not part of `amount_paid`.
        let invoice = load_invoice(&mut tx, payment.invoice_id).await?;
        ensure_within_due(amount, &invoice)?;
    }
    patch.apply(&mut tx, id).await?;
    let payment = load_payment(&mut tx, id).await?;
    tx.commit().await?;
    Ok(payment)
}

/// Marks a pending payment as received and settles its invoice.
pub async fn complete_payment(db: &Db, id: i64) -> AppResult<PaymentRecorded> {
    let mut tx = db.begin().await?;
    let payment = load_payment(&mut tx, id).await?;
    if payment.status != PaymentStatus::Pending {
        return Err(AppError::conflict("Only pending payments can be completed."));
    }
    let invoice = load_invoice(&mut tx, payment.invoice_id).await?;
    ensure_payable(&invoice)?;
    ensure_within_due(payment.amount, &invoice)?;
    let carried = carried_settlement(&mut tx, &invoice).await?;

    payments::set_status(&mut tx, id, PaymentStatus::Completed).await?;
    let invoice = settle(&mut tx, invoice.id, carried).await?;
    let payment = load_payment(&mut tx, id).await?;
    tx.commit().await?;

    info!(
        payment_id = id,
        invoice = %invoice.invoice_number,
        amount = %payment.amount,
        "payment completed"
    );
    Ok(PaymentRecorded { payment, invoice })
}

/// Cancelling a completed payment re-opens its share of the balance. A manual
/// settlement recorded on top of the payments is kept.
pub async fn cancel_payment(db: &Db, id: i64) -> AppResult<Payment> {
    let mut tx = db.begin().await?;
    let payment = load_payment(&mut tx, id).await?;
    if payment.status == PaymentStatus::Cancelled {
        return Err(AppError::conflict("This payment is already cancelled."));
    }
    let invoice = load_invoice(&mut tx, payment.invoice_id).await?;
    let carried = carried_settlement(&mut tx, &invoice).await?;
    payments::set_status(&mut tx, id, PaymentStatus::Cancelled).await?;
    if payment.status == PaymentStatus::Completed {
        settle(&mut tx, payment.invoice_id, carried).await?;
    }
    let payment = load_payment(&mut tx, id).await?;
    tx.commit().await?;
    info!(payment_id = id, "payment cancelled");
    Ok(payment)
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentList {
    #[serde(flatten)]
    pub page: Page<PaymentListing>,
    /// Sum of completed payments over the whole filtered set.
    pub total_amount: Money,
}

pub async fn list_payments(db: &Db, filter: &PaymentFilter) -> AppResult<PaymentList> {
    let mut conn = db.acquire().await?;
    let all = payments::list(&mut conn, filter, None).await?;
    let total_amount = all
        .iter()
        .filter(|p| p.payment.status == PaymentStatus::Completed)
        .map(|p| p.payment.amount)
        .sum();
    Ok(PaymentList {
        page: Page::from_vec(all, filter.page, PAYMENTS_PER_PAGE),
        total_amount,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueFilter {
    Overdue,
    DueSoon,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingFilter {
    pub query: Option<String>,
    pub overdue_status: Option<DueFilter>,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingInvoice {
    #[serde(flatten)]
    pub invoice: InvoiceListing,
    pub amount_due: Money,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PendingSummary {
    pub total_pending: Money,
    pub overdue_amount: Money,
    pub overdue_count: usize,
    pub due_soon_amount: Money,
    pub due_soon_count: usize,
    pub no_due_date_amount: Money,
    pub no_due_date_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingList {
    #[serde(flatten)]
    pub page: Page<PendingInvoice>,
    pub summary: PendingSummary,
    pub today: NaiveDate,
}

fn matches_query(listing: &InvoiceListing, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty()
        || listing.invoice.invoice_number.to_lowercase().contains(&q)
        || listing.customer_name.to_lowercase().contains(&q)
        || listing.customer_phone.to_lowercase().contains(&q)
}

/// Buckets pending invoices by `payment_due_date`.
pub fn summarize_pending(invoices: &[PendingInvoice], today: NaiveDate) -> PendingSummary {
    let soon = today
        .checked_add_days(Days::new(DUE_SOON_DAYS))
        .unwrap_or(today);
    let mut summary = PendingSummary::default();
    for pending in invoices {
        summary.total_pending += pending.amount_due;
        match pending.invoice.invoice.payment_due_date() {
            Some(due) if due < today => {
                summary.overdue_amount += pending.amount_due;
                summary.overdue_count += 1;
            }
            Some(due) if due <= soon => {
                summary.due_soon_amount += pending.amount_due;
                summary.due_soon_count += 1;
            }
            Some(_) => {}
            None => {
                summary.no_due_date_amount += pending.amount_due;
                summary.no_due_date_count += 1;
            }
        }
    }
    summary
}

pub async fn pending_invoices(db: &Db, filter: &PendingFilter) -> AppResult<PendingList> {
    let today = today();
    let soon = today
        .checked_add_days(Days::new(DUE_SOON_DAYS))
        .unwrap_or(today);

    let mut conn = db.acquire().await?;
    let pending: Vec<PendingInvoice> = invoices::list_by_status(&mut conn, InvoiceStatus::OPEN)
        .await?
        .into_iter()
        .filter(|l| filter.query.as_deref().is_none_or(|q| matches_query(l, q)))
        .filter(|l| match filter.overdue_status {
            None => true,
            Some(DueFilter::Overdue) => l.invoice.payment_due_date().is_some_and(|d| d < today),
            Some(DueFilter::DueSoon) => l
                .invoice
                .payment_due_date()
                .is_some_and(|d| d >= today && d <= soon),
        })
        .map(|l| PendingInvoice {
            amount_due: l.invoice.amount_due(),
            invoice: l,
        })
        .filter(|p| filter.min_amount.is_none_or(|min| p.amount_due >= min))
        .filter(|p| filter.max_amount.is_none_or(|max| p.amount_due <= max))
        .collect();

    let summary = summarize_pending(&pending, today);
    Ok(PendingList {
        page: Page::from_vec(pending, filter.page, PAYMENTS_PER_PAGE),
        summary,
        today,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderForm {
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn send_reminder(
    conn: &mut AnyConnection,
    invoice: &Invoice,
    user_id: i64,
    form: &ReminderForm,
) -> AppResult<Reminder> {
    // Delivery is not wired to a gateway; the reminder is recorded as sent.
    let id = payments::insert_reminder(
        conn,
        &NewReminder {
            invoice_id: invoice.id,
            customer_id: invoice.customer_id,
            reminder_type: form.reminder_type,
            status: ReminderStatus::Sent,
            created_by: Some(user_id),
            sent_at: Some(now_text()),
            notes: trimmed(form.notes.as_ref()),
        },
    )
    .await?;
    payments::find_reminder(conn, id)
        .await?
        .ok_or(AppError::NotFound("Reminder"))
}

pub async fn create_reminder(
    db: &Db,
    invoice_id: i64,
    user_id: i64,
    form: &ReminderForm,
) -> AppResult<Reminder> {
    let mut conn = db.acquire().await?;
    let invoice = load_invoice(&mut conn, invoice_id).await?;
    match invoice.status {
        InvoiceStatus::Paid => {
            return Err(AppError::conflict("This invoice is already fully paid."));
        }
        InvoiceStatus::Cancelled => {
            return Err(AppError::conflict(
                "Cannot send reminder for a cancelled invoice.",
            ));
        }
        _ => {}
    }
    let reminder = send_reminder(&mut conn, &invoice, user_id, form).await?;
    info!(invoice = %invoice.invoice_number, kind = %form.reminder_type, "reminder sent");
    Ok(reminder)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkReminderForm {
    pub invoice_ids: Vec<i64>,
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReminderOutcome {
    pub message: String,
    pub reminders: Vec<Reminder>,
}

/// One reminder per listed invoice; all or nothing.
pub async fn bulk_reminder(
    db: &Db,
    user_id: i64,
    form: &BulkReminderForm,
) -> AppResult<BulkReminderOutcome> {
    if form.invoice_ids.is_empty() {
        return Err(AppError::validation("No invoices selected."));
    }
    let single = ReminderForm {
        reminder_type: form.reminder_type,
        notes: form.notes.clone(),
    };

    let mut tx = db.begin().await?;
    let mut reminders = Vec::with_capacity(form.invoice_ids.len());
    for id in &form.invoice_ids {
        let invoice = load_invoice(&mut tx, *id).await?;
        reminders.push(send_reminder(&mut tx, &invoice, user_id, &single).await?);
    }
    tx.commit().await?;

    info!(count = reminders.len(), "bulk reminders sent");
    Ok(BulkReminderOutcome {
        message: format!("Reminders sent to {} customers.", reminders.len()),
        reminders,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentHistory {
    pub customer: Customer,
    pub payments: Vec<PaymentListing>,
    pub invoices: Vec<InvoiceListing>,
    pub total_invoiced: Money,
    pub total_paid: Money,
    pub total_pending: Money,
}

pub async fn customer_history(db: &Db, customer_id: i64) -> AppResult<PaymentHistory> {
    let mut conn = db.acquire().await?;
    let customer = customers::find_by_id(&mut conn, customer_id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    let payments =
        payments::list(&mut conn, &PaymentFilter::default(), Some(customer_id)).await?;
    let invoices = invoices::list(
        &mut conn,
        &invoices::InvoiceFilter {
            customer_id: Some(customer_id),
            ..Default::default()
        },
    )
    .await?;

    let total_invoiced: Money = invoices.iter().map(|i| i.invoice.total).sum();
    let total_paid: Money = payments
        .iter()
        .filter(|p| p.payment.status == PaymentStatus::Completed)
        .map(|p| p.payment.amount)
        .sum();
    Ok(PaymentHistory {
        customer,
        payments,
        invoices,
        total_invoiced,
        total_paid,
        total_pending: total_invoiced - total_paid,
    })
}
