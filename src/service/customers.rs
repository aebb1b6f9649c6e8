use crate::db::customers::{self, CustomerForm};
use crate::db::invoices::{self, InvoiceFilter};
use crate::db::models::{CreditStanding, Customer, InvoiceListing, PaymentListing};
use crate::db::payments::{self, PaymentFilter};
use crate::db::Db;
use crate::domain::{InvoiceStatus, Money};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use tracing::info;

pub const SEARCH_LIMIT: i64 = 10;
const RECENT_ACTIVITY: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRow {
    #[serde(flatten)]
    pub customer: Customer,
    pub pending_amount: Money,
}

/// Customers by name, each with the balance of its open invoices.
pub async fn list(db: &Db) -> AppResult<Vec<CustomerRow>> {
    let mut conn = db.acquire().await?;
    let balances = customers::open_balances(&mut conn, InvoiceStatus::OPEN, None).await?;
    Ok(customers::list(&mut conn)
        .await?
        .into_iter()
        .map(|customer| CustomerRow {
            pending_amount: balances.get(&customer.id).copied().unwrap_or_default(),
            customer,
        })
        .collect())
}

pub async fn create(db: &Db, form: CustomerForm) -> AppResult<Customer> {
    let form = form.normalized().map_err(AppError::Validation)?;
    let mut conn = db.acquire().await?;
    let id = customers::insert(&mut conn, &form).await?;
    info!(customer_id = id, name = %form.name, "customer created");
    customers::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Customer"))
}

pub async fn update(db: &Db, id: i64, form: CustomerForm) -> AppResult<Customer> {
    let form = form.normalized().map_err(AppError::Validation)?;
    let mut conn = db.acquire().await?;
    if !customers::update(&mut conn, id, &form).await? {
        return Err(AppError::NotFound("Customer"));
    }
    customers::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Customer"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Invoice,
    Payment,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub date: String,
    pub reference_id: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub customer: Customer,
    pub credit: CreditStanding,
    pub invoices: Vec<InvoiceListing>,
    pub pending_invoices: Vec<InvoiceListing>,
    pub total_pending_amount: Money,
    pub recent_activities: Vec<Activity>,
}

/// Merges the newest invoices and payments, most recent first.
pub fn recent_activities(
    invoices: &[InvoiceListing],
    payments: &[PaymentListing],
    limit: usize,
) -> Vec<Activity> {
    let mut activities: Vec<Activity> = invoices
        .iter()
        .take(limit)
        .map(|i| Activity {
            kind: ActivityKind::Invoice,
            date: i.invoice.created_at.clone(),
            reference_id: i.invoice.id,
            description: format!(
                "Invoice #{} created for ₹{}",
                i.invoice.invoice_number, i.invoice.total
            ),
        })
        .chain(payments.iter().take(limit).map(|p| Activity {
            kind: ActivityKind::Payment,
            date: p.payment.created_at.clone(),
            reference_id: p.payment.id,
            description: format!(
                "Payment of ₹{} made for Invoice #{}",
                p.payment.amount, p.invoice_number
            ),
        }))
        .collect();
    activities.sort_by(|a, b| b.date.cmp(&a.date));
    activities.truncate(limit);
    activities
}

pub async fn detail(db: &Db, id: i64) -> AppResult<CustomerDetail> {
    let mut conn = db.acquire().await?;
    let customer = customers::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    let invoices = invoices::list(
        &mut conn,
        &InvoiceFilter {
            customer_id: Some(id),
            ..Default::default()
        },
    )
    .await?;
    let payments = payments::list(&mut conn, &PaymentFilter::default(), Some(id)).await?;
    let exposure = customers::total_pending_amount(&mut conn, id).await?;

    let mut pending_invoices: Vec<InvoiceListing> = invoices
        .iter()
        .filter(|i| i.invoice.status.is_open())
        .cloned()
        .collect();
    // Undated invoices sort first, as NULLs do in an ascending SQL sort.
    pending_invoices.sort_by_key(|i| i.invoice.payment_due_date());
    let total_pending_amount = pending_invoices
        .iter()
        .map(|i| i.invoice.amount_due())
        .sum();

    Ok(CustomerDetail {
        credit: CreditStanding::new(customer.credit_limit, exposure),
        recent_activities: recent_activities(&invoices, &payments, RECENT_ACTIVITY),
        customer,
        invoices,
        pending_invoices,
        total_pending_amount,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerHit {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub customer_type: crate::domain::CustomerType,
    #[serde(flatten)]
    pub credit: CreditStanding,
}

/// Phone/name search with each hit's credit position. Blank queries find nothing.
pub async fn search(db: &Db, q: &str) -> AppResult<Vec<CustomerHit>> {
    if q.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut conn = db.acquire().await?;
    let found = customers::search(&mut conn, q, SEARCH_LIMIT).await?;
    let mut hits = Vec::with_capacity(found.len());
    for c in found {
        let pending = customers::total_pending_amount(&mut conn, c.id).await?;
        hits.push(CustomerHit {
            id: c.id,
            name: c.name,
            phone: c.phone,
            customer_type: c.customer_type,
            credit: CreditStanding::new(c.credit_limit, pending),
        });
    }
    Ok(hits)
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuickCreate {
    Created(Customer),
    Duplicate { existing_customer: Customer },
}

/// Billing-screen customer creation; refuses a second customer with the same
/// name (case-insensitive) or phone.
pub async fn quick_create(db: &Db, form: CustomerForm) -> AppResult<QuickCreate> {
    let form = form.normalized().map_err(AppError::Validation)?;
    let mut conn = db.acquire().await?;
    if let Some(existing) = customers::find_duplicate(&mut conn, &form.name, &form.phone).await? {
        return Ok(QuickCreate::Duplicate {
            existing_customer: existing,
        });
    }
    let id = customers::insert(&mut conn, &form).await?;
    info!(customer_id = id, "customer created from billing");
    let customer = customers::find_by_id(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    Ok(QuickCreate::Created(customer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Invoice, Payment};
    use crate::domain::{CustomerType, PaymentMethod, PaymentStatus, PaymentType, Percent};

    fn invoice(id: i64, created_at: &str) -> InvoiceListing {
        InvoiceListing {
            invoice: Invoice {
                id,
                invoice_number: format!("INV-{id:08}"),
                customer_id: 1,
                created_by: None,
                created_at: created_at.to_string(),
                updated_at: created_at.to_string(),
                payment_type: PaymentType::Cash,
                status: InvoiceStatus::Paid,
                subtotal: Money(1_000),
                discount_percentage: Percent(0),
                discount_amount: Money(0),
                tax_percentage: Percent(0),
                tax_amount: Money(0),
                total: Money(1_000),
                amount_paid: Money(1_000),
                due_date: None,
                payment_due_date: None,
                notes: None,
            },
            customer_name: "Asha".to_string(),
            customer_phone: "98450".to_string(),
            customer_type: CustomerType::Retail,
        }
    }

    fn payment(id: i64, created_at: &str) -> PaymentListing {
        PaymentListing {
            payment: Payment {
                id,
                invoice_id: 1,
                customer_id: 1,
                amount: Money(500),
                payment_method: PaymentMethod::Upi,
                reference_number: None,
                status: PaymentStatus::Completed,
                created_by: None,
                created_at: created_at.to_string(),
                updated_at: created_at.to_string(),
                notes: None,
            },
            invoice_number: "INV-00000001".to_string(),
            customer_name: "Asha".to_string(),
        }
    }

    #[test]
    fn activities_merge_newest_first() {
        let invoices = vec![
            invoice(3, "2024-04-03 09:00:00"),
            invoice(2, "2024-04-02 09:00:00"),
            invoice(1, "2024-04-01 09:00:00"),
        ];
        let payments = vec![payment(7, "2024-04-02 12:00:00")];
        let merged = recent_activities(&invoices, &payments, 3);
        let kinds: Vec<_> = merged.iter().map(|a| (a.kind, a.reference_id)).collect();
        assert_eq!(
            kinds,
            vec![
                (ActivityKind::Invoice, 3),
                (ActivityKind::Payment, 7),
                (ActivityKind::Invoice, 2),
            ]
        );
        assert_eq!(merged[1].description, "Payment of ₹5.00 made for Invoice #INV-00000001");
    }
}
