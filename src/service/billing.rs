//! Cart, checkout and the invoice lifecycle.

use crate::auth::{CartLine, SessionStore};
use crate::db::invoices::{self, InvoiceFilter, NewInvoice, NewItem, Totals};
use crate::db::models::{
    Invoice, InvoiceItem, InvoiceItemListing, InvoiceListing, Payment, Reminder,
};
use crate::db::patch::InvoicePatch;
use crate::db::{Db, customers, payments, products};
use crate::domain::{
    InvoiceStatus, Money, PaymentType, Percent, Quantity, format_date, parse_date, today,
};
use crate::error::{AppError, AppResult};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::AnyConnection;
use tracing::{info, warn};

/// Days granted to credit invoices issued without a due date.
pub const DEFAULT_CREDIT_DAYS: u64 = 30;

const INVOICE_NUMBER_ATTEMPTS: usize = 5;

/// `INV-` followed by eight uppercase hex digits of a random v4 UUID.
pub fn generate_invoice_number() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("INV-{}", simple[..8].to_uppercase())
}

async fn unique_invoice_number(conn: &mut AnyConnection) -> AppResult<String> {
    for _ in 0..INVOICE_NUMBER_ATTEMPTS {
        let candidate = generate_invoice_number();
        if !invoices::number_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
        warn!(number = %candidate, "invoice number collision, retrying");
    }
    Err(AppError::Internal(
        "could not allocate a unique invoice number".to_string(),
    ))
}

/// `(discount_amount, subtotal)` of one invoice line.
pub fn item_amounts(unit_price: Money, quantity: Quantity, discount: Percent) -> (Money, Money) {
    let gross = unit_price.times_quantity(quantity);
    let discount_amount = gross.percent(discount);
    (discount_amount, gross - discount_amount)
}

/// Totals of an invoice with a percentage discount.
pub fn invoice_totals(subtotal: Money, discount: Percent, tax: Percent) -> Totals {
    let discount_amount = subtotal.percent(discount);
    let tax_amount = (subtotal - discount_amount).percent(tax);
    Totals {
        subtotal,
        discount_amount,
        tax_amount,
        total: subtotal - discount_amount + tax_amount,
    }
}

/// Totals of a checkout with a flat discount.
pub fn checkout_totals(subtotal: Money, flat_discount: Money, tax: Percent) -> Totals {
    let tax_amount = (subtotal - flat_discount).percent(tax);
    Totals {
        subtotal,
        discount_amount: flat_discount,
        tax_amount,
        total: subtotal - flat_discount + tax_amount,
    }
}

/// Status of a freshly checked-out invoice and the amount already received.
pub fn checkout_status(
    payment_type: PaymentType,
    total: Money,
    payment_due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> (InvoiceStatus, Money) {
    match payment_type {
        PaymentType::Cash => (InvoiceStatus::Paid, total),
        PaymentType::Upi | PaymentType::Credit => {
            if payment_due_date.is_some_and(|d| d < today) {
                (InvoiceStatus::Overdue, Money::ZERO)
            } else {
                (InvoiceStatus::PendingPayment, Money::ZERO)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    G,
}

impl WeightUnit {
    /// Converts an amount entered in this unit to kilograms.
    pub fn to_kg(self, amount: Quantity) -> Quantity {
        match self {
            WeightUnit::Kg => amount,
            WeightUnit::G => Quantity::from_grams((amount.grams() + 500) / 1000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: i64,
    pub quality_id: i64,
    pub quantity: Quantity,
    #[serde(default)]
    pub unit: WeightUnit,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartAdded {
    pub message: String,
    pub cart_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartViewLine {
    pub index: usize,
    pub product_id: i64,
    pub product_name: String,
    pub quality_id: i64,
    pub quality: String,
    pub quantity: Quantity,
    pub price: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartViewLine>,
    pub subtotal: Money,
    pub cart_count: usize,
}

fn session_cart(sessions: &SessionStore, token: &str) -> AppResult<Vec<CartLine>> {
    sessions
        .get(token)
        .map(|s| s.cart)
        .ok_or(AppError::Unauthorized)
}

fn with_cart<R>(
    sessions: &SessionStore,
    token: &str,
    f: impl FnOnce(&mut Vec<CartLine>) -> AppResult<R>,
) -> AppResult<R> {
    sessions
        .update_cart(token, f)
        .ok_or(AppError::Unauthorized)?
}

fn check_index(cart: &[CartLine], index: usize) -> AppResult<()> {
    if index < cart.len() {
        Ok(())
    } else {
        Err(AppError::validation("Invalid item index."))
    }
}

pub async fn add_to_cart(
    db: &Db,
    sessions: &SessionStore,
    token: &str,
    req: &AddToCart,
) -> AppResult<CartAdded> {
    let quantity = req.unit.to_kg(req.quantity);
    if quantity.grams() <= 0 {
        return Err(AppError::validation("Quantity must be greater than zero."));
    }
    if !quantity.in_range() {
        return Err(AppError::validation("Quantity is too large."));
    }

    let mut conn = db.acquire().await?;
    let listing = products::find_listing(&mut conn, req.quality_id)
        .await?
        .filter(|l| l.quality.product_id == req.product_id)
        .ok_or(AppError::NotFound("Product quality"))?;

    let line = CartLine {
        product_id: req.product_id,
        quality_id: req.quality_id,
        quantity,
        price: listing.quality.retail_price,
    };
    let cart_count = with_cart(sessions, token, |cart| {
        match cart
            .iter_mut()
            .find(|l| l.product_id == line.product_id && l.quality_id == line.quality_id)
        {
            Some(existing) => {
                let merged = existing.quantity + line.quantity;
                if !merged.in_range() {
                    return Err(AppError::validation("Quantity is too large."));
                }
                existing.quantity = merged;
            }
            None => cart.push(line),
        }
        Ok(cart.len())
    })?;

    Ok(CartAdded {
        message: format!(
            "{} - {} added to cart",
            listing.product_name, listing.quality.quality
        ),
        cart_count,
    })
}

/// Cart lines resolved against the catalogue; vanished products are skipped.
pub async fn view_cart(db: &Db, sessions: &SessionStore, token: &str) -> AppResult<CartView> {
    let cart = session_cart(sessions, token)?;
    let mut conn = db.acquire().await?;

    let mut items = Vec::with_capacity(cart.len());
    for (index, line) in cart.iter().enumerate() {
        let Some(listing) = products::find_listing(&mut conn, line.quality_id).await? else {
            continue;
        };
        items.push(CartViewLine {
            index,
            product_id: line.product_id,
            product_name: listing.product_name,
            quality_id: line.quality_id,
            quality: listing.quality.quality.to_string(),
            quantity: line.quantity,
            price: line.price,
            subtotal: line.subtotal(),
        });
    }
    Ok(CartView {
        subtotal: items.iter().map(|i| i.subtotal).sum(),
        cart_count: cart.len(),
        items,
    })
}

pub fn update_cart_quantity(
    sessions: &SessionStore,
    token: &str,
    index: usize,
    quantity: Quantity,
) -> AppResult<usize> {
    if quantity.grams() <= 0 {
        return Err(AppError::validation("Quantity must be greater than zero."));
    }
    with_cart(sessions, token, |cart| {
        check_index(cart, index)?;
        cart[index].quantity = quantity;
        Ok(cart.len())
    })
}

/// Switches a line to another quality of the same product and re-prices it.
pub async fn update_cart_quality(
    db: &Db,
    sessions: &SessionStore,
    token: &str,
    index: usize,
    quality_id: i64,
) -> AppResult<usize> {
    let cart = session_cart(sessions, token)?;
    check_index(&cart, index)?;
    let product_id = cart[index].product_id;

    let mut conn = db.acquire().await?;
    let quality = products::find_quality(&mut conn, quality_id)
        .await?
        .filter(|q| q.product_id == product_id)
        .ok_or(AppError::NotFound("Product quality"))?;

    with_cart(sessions, token, |cart| {
        check_index(cart, index)?;
        cart[index].quality_id = quality.id;
        cart[index].price = quality.retail_price;
        Ok(cart.len())
    })
}

pub fn remove_from_cart(sessions: &SessionStore, token: &str, index: usize) -> AppResult<usize> {
    with_cart(sessions, token, |cart| {
        check_index(cart, index)?;
        cart.remove(index);
        Ok(cart.len())
    })
}

pub fn clear_cart(sessions: &SessionStore, token: &str) -> AppResult<()> {
    with_cart(sessions, token, |cart| {
        cart.clear();
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: i64,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub flat_discount: Money,
    #[serde(default)]
    pub tax_percentage: Percent,
    #[serde(default)]
    pub payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub message: String,
    pub invoice: Invoice,
    pub warnings: Vec<String>,
}

/// Turns the session cart into an invoice, reduces stock and clears the cart.
pub async fn checkout(
    db: &Db,
    sessions: &SessionStore,
    token: &str,
    user_id: i64,
    req: &CheckoutRequest,
) -> AppResult<CheckoutOutcome> {
    let cart = session_cart(sessions, token)?;
    if cart.is_empty() {
        return Err(AppError::validation("Your cart is empty."));
    }
    if req.flat_discount.is_negative() {
        return Err(AppError::validation("Discount cannot be negative."));
    }
    if req.tax_percentage.is_negative() {
        return Err(AppError::validation("Tax percentage cannot be negative."));
    }

    let subtotal: Money = cart.iter().map(CartLine::subtotal).sum();
    if req.flat_discount > subtotal {
        return Err(AppError::validation("Discount cannot exceed the subtotal."));
    }
    let totals = checkout_totals(subtotal, req.flat_discount, req.tax_percentage);

    let mut tx = db.begin().await?;
    let customer = customers::find_by_id(&mut tx, req.customer_id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;

    if req.payment_type == PaymentType::Credit {
        let pending = customers::total_pending_amount(&mut tx, customer.id).await?;
        let available = customer.credit_limit - pending;
        if totals.total > available {
            warn!(
                customer_id = customer.id,
                available = %available,
                required = %totals.total,
                "checkout blocked by credit limit"
            );
            return Err(AppError::InsufficientCredit {
                available,
                required: totals.total,
            });
        }
    }

    let (status, amount_paid) =
        checkout_status(req.payment_type, totals.total, req.payment_due_date, today());
    let due_date = match req.payment_type {
        PaymentType::Cash => None,
        PaymentType::Upi | PaymentType::Credit => req.payment_due_date.map(format_date),
    };

    let invoice_number = unique_invoice_number(&mut tx).await?;
    let invoice_id = invoices::insert(
        &mut tx,
        &NewInvoice {
            invoice_number,
            customer_id: customer.id,
            created_by: Some(user_id),
            payment_type: req.payment_type,
            status,
            subtotal: totals.subtotal,
            discount_percentage: Percent::default(),
            discount_amount: totals.discount_amount,
            tax_percentage: req.tax_percentage,
            tax_amount: totals.tax_amount,
            total: totals.total,
            amount_paid,
            due_date: due_date.clone(),
            payment_due_date: due_date,
            notes: req.notes.clone().filter(|n| !n.trim().is_empty()),
        },
    )
    .await?;

    let mut warnings = Vec::new();
    for line in &cart {
        let listing = products::find_listing(&mut tx, line.quality_id)
            .await?
            .ok_or(AppError::NotFound("Product quality"))?;
        let stock = listing.quality.stock;
        let remaining = if stock >= line.quantity {
            stock - line.quantity
        } else {
            warnings.push(format!(
                "Warning: {} - {} had insufficient stock. Stock reduced to 0.",
                listing.product_name, listing.quality.quality
            ));
            Quantity::default()
        };
        products::set_stock(&mut tx, line.quality_id, remaining).await?;

        invoices::insert_item(
            &mut tx,
            &NewItem {
                invoice_id,
                product_id: line.product_id,
                product_quality_id: line.quality_id,
                quantity: line.quantity,
                unit_price: line.price,
                discount_percentage: Percent::default(),
                discount_amount: Money::ZERO,
                subtotal: line.subtotal(),
            },
        )
        .await?;
    }

    let invoice = invoices::find(&mut tx, invoice_id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    tx.commit().await?;
    clear_cart(sessions, token)?;

    info!(
        invoice = %invoice.invoice_number,
        customer_id = customer.id,
        total = %invoice.total,
        status = %invoice.status,
        "checkout completed"
    );
    Ok(CheckoutOutcome {
        message: format!("Bill {} created successfully!", invoice.invoice_number),
        invoice,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub count: usize,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceList {
    pub invoices: Vec<InvoiceListing>,
    pub summary: InvoiceSummary,
}

pub async fn list_invoices(db: &Db, filter: &InvoiceFilter) -> AppResult<InvoiceList> {
    let mut conn = db.acquire().await?;
    let invoices = invoices::list(&mut conn, filter).await?;
    let total_amount: Money = invoices.iter().map(|i| i.invoice.total).sum();
    let paid_amount: Money = invoices.iter().map(|i| i.invoice.amount_paid).sum();
    Ok(InvoiceList {
        summary: InvoiceSummary {
            count: invoices.len(),
            total_amount,
            paid_amount,
            pending_amount: total_amount - paid_amount,
        },
        invoices,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftInvoice {
    pub customer_id: i64,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub discount_percentage: Percent,
    #[serde(default)]
    pub tax_percentage: Percent,
    #[serde(default)]
    pub payment_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn check_percent(label: &str, pct: Percent) -> AppResult<()> {
    if pct.is_negative() || pct > Percent::from_whole(100) {
        return Err(AppError::validation(format!(
            "{label} must be between 0 and 100."
        )));
    }
    Ok(())
}

pub async fn create_draft(db: &Db, user_id: i64, req: &DraftInvoice) -> AppResult<Invoice> {
    check_percent("Discount percentage", req.discount_percentage)?;
    check_percent("Tax percentage", req.tax_percentage)?;

    let mut tx = db.begin().await?;
    customers::find_by_id(&mut tx, req.customer_id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    let invoice_number = unique_invoice_number(&mut tx).await?;
    let id = invoices::insert(
        &mut tx,
        &NewInvoice {
            invoice_number,
            customer_id: req.customer_id,
            created_by: Some(user_id),
            payment_type: req.payment_type,
            status: InvoiceStatus::Draft,
            subtotal: Money::ZERO,
            discount_percentage: req.discount_percentage,
            discount_amount: Money::ZERO,
            tax_percentage: req.tax_percentage,
            tax_amount: Money::ZERO,
            total: Money::ZERO,
            amount_paid: Money::ZERO,
            due_date: None,
            payment_due_date: req.payment_due_date.map(format_date),
            notes: req.notes.clone().filter(|n| !n.trim().is_empty()),
        },
    )
    .await?;
    let invoice = invoices::find(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    tx.commit().await?;
    info!(invoice = %invoice.invoice_number, "draft invoice created");
    Ok(invoice)
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceListing,
    pub amount_due: Money,
    pub items: Vec<InvoiceItemListing>,
    pub payments: Vec<Payment>,
    pub reminders: Vec<Reminder>,
}

pub async fn invoice_detail(db: &Db, id: i64) -> AppResult<InvoiceDetail> {
    let mut conn = db.acquire().await?;
    let invoice = invoices::find_listing(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    Ok(InvoiceDetail {
        amount_due: invoice.invoice.amount_due(),
        items: invoices::items_of(&mut conn, id).await?,
        payments: payments::for_invoice(&mut conn, id).await?,
        reminders: payments::reminders_for(&mut conn, id).await?,
        invoice,
    })
}

async fn load(conn: &mut AnyConnection, id: i64) -> AppResult<Invoice> {
    invoices::find(conn, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))
}

async fn load_draft(conn: &mut AnyConnection, id: i64) -> AppResult<Invoice> {
    let invoice = load(conn, id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(AppError::conflict(
            "This invoice has already been issued and cannot be modified.",
        ));
    }
    Ok(invoice)
}

/// Recomputes and stores the totals of `invoice` from its items.
async fn recalculate(conn: &mut AnyConnection, invoice: &Invoice) -> AppResult<Totals> {
    let items = invoices::items_of(conn, invoice.id).await?;
    let subtotal: Money = items.iter().map(|i| i.item.subtotal).sum();
    let totals = invoice_totals(
        subtotal,
        invoice.discount_percentage,
        invoice.tax_percentage,
    );
    invoices::set_totals(conn, invoice.id, totals).await?;
    Ok(totals)
}

pub async fn update_draft(db: &Db, id: i64, patch: &InvoicePatch) -> AppResult<Invoice> {
    if let Some(pct) = patch.discount_percentage {
        check_percent("Discount percentage", pct)?;
    }
    if let Some(pct) = patch.tax_percentage {
        check_percent("Tax percentage", pct)?;
    }
    if let Some(date) = patch.payment_due_date.as_deref()
        && parse_date(date).is_none()
    {
        return Err(AppError::validation(
            "Invalid date format. Please use YYYY-MM-DD format.",
        ));
    }

    let mut tx = db.begin().await?;
    load_draft(&mut tx, id).await?;
    patch.apply(&mut tx, id).await?;
    let invoice = load(&mut tx, id).await?;
    recalculate(&mut tx, &invoice).await?;
    let invoice = load(&mut tx, id).await?;
    tx.commit().await?;
    Ok(invoice)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemForm {
    pub product_quality_id: i64,
    pub quantity: Quantity,
    /// Per kilogram; defaults to the quality's retail price.
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub discount_percentage: Percent,
}

async fn build_item(
    conn: &mut AnyConnection,
    invoice_id: i64,
    form: &ItemForm,
) -> AppResult<NewItem> {
    if form.quantity.grams() <= 0 {
        return Err(AppError::validation("Quantity must be greater than zero."));
    }
    check_percent("Discount percentage", form.discount_percentage)?;
    let quality = products::find_quality(conn, form.product_quality_id)
        .await?
        .ok_or(AppError::NotFound("Product quality"))?;
    let unit_price = form.unit_price.unwrap_or(quality.retail_price);
    if unit_price.is_negative() {
        return Err(AppError::validation("Unit price cannot be negative."));
    }
    let (discount_amount, subtotal) =
        item_amounts(unit_price, form.quantity, form.discount_percentage);
    Ok(NewItem {
        invoice_id,
        product_id: quality.product_id,
        product_quality_id: quality.id,
        quantity: form.quantity,
        unit_price,
        discount_percentage: form.discount_percentage,
        discount_amount,
        subtotal,
    })
}

pub async fn add_item(db: &Db, invoice_id: i64, form: &ItemForm) -> AppResult<InvoiceItem> {
    let mut tx = db.begin().await?;
    let invoice = load_draft(&mut tx, invoice_id).await?;
    let item = build_item(&mut tx, invoice_id, form).await?;
    let item_id = invoices::insert_item(&mut tx, &item).await?;
    recalculate(&mut tx, &invoice).await?;
    let item = invoices::find_item(&mut tx, item_id)
        .await?
        .ok_or(AppError::NotFound("Invoice item"))?;
    tx.commit().await?;
    Ok(item)
}

pub async fn update_item(db: &Db, item_id: i64, form: &ItemForm) -> AppResult<InvoiceItem> {
    let mut tx = db.begin().await?;
    let existing = invoices::find_item(&mut tx, item_id)
        .await?
        .ok_or(AppError::NotFound("Invoice item"))?;
    let invoice = load_draft(&mut tx, existing.invoice_id).await?;
    let item = build_item(&mut tx, invoice.id, form).await?;
    invoices::update_item(&mut tx, item_id, &item).await?;
    recalculate(&mut tx, &invoice).await?;
    let item = invoices::find_item(&mut tx, item_id)
        .await?
        .ok_or(AppError::NotFound("Invoice item"))?;
    tx.commit().await?;
    Ok(item)
}

pub async fn delete_item(db: &Db, item_id: i64) -> AppResult<Invoice> {
    let mut tx = db.begin().await?;
    let existing = invoices::find_item(&mut tx, item_id)
        .await?
        .ok_or(AppError::NotFound("Invoice item"))?;
    let invoice = load_draft(&mut tx, existing.invoice_id).await?;
    invoices::delete_item(&mut tx, item_id).await?;
    recalculate(&mut tx, &invoice).await?;
    let invoice = load(&mut tx, invoice.id).await?;
    tx.commit().await?;
    Ok(invoice)
}

/// Finalizes a draft: recomputes totals and opens it for payment.
pub async fn issue(db: &Db, id: i64) -> AppResult<Invoice> {
    let mut tx = db.begin().await?;
    let invoice = load(&mut tx, id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(AppError::conflict("This invoice has already been issued."));
    }
    if invoices::items_of(&mut tx, id).await?.is_empty() {
        return Err(AppError::validation(
            "Cannot issue an invoice with no items.",
        ));
    }

    recalculate(&mut tx, &invoice).await?;
    if invoice.payment_type == PaymentType::Credit && invoice.due_date.is_none() {
        let due = today()
            .checked_add_days(Days::new(DEFAULT_CREDIT_DAYS))
            .unwrap_or_else(today);
        invoices::set_due_date(&mut tx, id, Some(&format_date(due))).await?;
    }
    invoices::set_status(&mut tx, id, InvoiceStatus::PendingPayment).await?;
    let invoice = load(&mut tx, id).await?;
    tx.commit().await?;

    info!(invoice = %invoice.invoice_number, total = %invoice.total, "invoice issued");
    Ok(invoice)
}

pub async fn mark_paid(db: &Db, id: i64) -> AppResult<Invoice> {
    let mut tx = db.begin().await?;
    let invoice = load(&mut tx, id).await?;
    if invoice.status == InvoiceStatus::Paid {
        return Err(AppError::conflict(
            "This invoice is already marked as paid.",
        ));
    }
    invoices::set_settlement(&mut tx, id, invoice.total, InvoiceStatus::Paid).await?;
    let invoice = load(&mut tx, id).await?;
    tx.commit().await?;
    info!(invoice = %invoice.invoice_number, "invoice marked as paid");
    Ok(invoice)
}

pub async fn cancel(db: &Db, id: i64) -> AppResult<Invoice> {
    let mut conn = db.acquire().await?;
    let invoice = load(&mut conn, id).await?;
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(AppError::conflict("This invoice is already cancelled."));
    }
    invoices::set_status(&mut conn, id, InvoiceStatus::Cancelled).await?;
    info!(invoice = %invoice.invoice_number, "invoice cancelled");
    load(&mut conn, id).await
}

pub async fn set_due_date(db: &Db, id: i64, due_date: NaiveDate) -> AppResult<Invoice> {
    let mut conn = db.acquire().await?;
    let invoice = load(&mut conn, id).await?;
    if matches!(
        invoice.status,
        InvoiceStatus::Paid | InvoiceStatus::Cancelled
    ) {
        return Err(AppError::conflict(
            "Cannot set due date for paid or cancelled invoices.",
        ));
    }
    invoices::set_due_date(&mut conn, id, Some(&format_date(due_date))).await?;
    load(&mut conn, id).await
}

pub async fn delete_invoice(db: &Db, id: i64) -> AppResult<()> {
    let mut conn = db.acquire().await?;
    let invoice = load(&mut conn, id).await?;
    invoices::delete(&mut conn, id).await?;
    info!(invoice = %invoice.invoice_number, "invoice deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn invoice_numbers_have_fixed_shape() {
        let number = generate_invoice_number();
        assert_eq!(number.len(), 12);
        assert!(number.starts_with("INV-"));
        assert!(
            number[4..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn item_discount_applies_to_gross() {
        // 2.5 kg at 800.00/kg with 10% off.
        let (discount, subtotal) = item_amounts(Money(80_000), Quantity(2_500), Percent(1_000));
        assert_eq!(discount, Money(20_000));
        assert_eq!(subtotal, Money(180_000));
    }

    #[test]
    fn invoice_totals_tax_after_discount() {
        let totals = invoice_totals(Money(100_000), Percent(1_000), Percent(500));
        assert_eq!(totals.discount_amount, Money(10_000));
        assert_eq!(totals.tax_amount, Money(4_500));
        assert_eq!(totals.total, Money(94_500));
    }

    #[test]
    fn checkout_totals_use_flat_discount() {
        let totals = checkout_totals(Money(50_000), Money(5_000), Percent(1_800));
        assert_eq!(totals.tax_amount, Money(8_100));
        assert_eq!(totals.total, Money(53_100));
    }

    #[test]
    fn checkout_status_rules() {
        let today = date(2024, 5, 10);
        assert_eq!(
            checkout_status(PaymentType::Cash, Money(100), None, today),
            (InvoiceStatus::Paid, Money(100))
        );
        assert_eq!(
            checkout_status(PaymentType::Credit, Money(100), Some(date(2024, 5, 9)), today),
            (InvoiceStatus::Overdue, Money::ZERO)
        );
        assert_eq!(
            checkout_status(PaymentType::Upi, Money(100), Some(today), today),
            (InvoiceStatus::PendingPayment, Money::ZERO)
        );
        assert_eq!(
            checkout_status(PaymentType::Upi, Money(100), None, today),
            (InvoiceStatus::PendingPayment, Money::ZERO)
        );
    }

    #[test]
    fn grams_convert_to_kilograms() {
        // "500" entered in grams parses as 500.000 and must become 0.500 kg.
        assert_eq!(WeightUnit::G.to_kg(Quantity(500_000)), Quantity(500));
        assert_eq!(WeightUnit::Kg.to_kg(Quantity(1_250)), Quantity(1_250));
    }
}
