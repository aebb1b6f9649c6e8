//! Plain-text rendition of an invoice, downloaded as an attachment.

use crate::db::customers;
use crate::db::invoices;
use crate::db::models::{Customer, Invoice, InvoiceItemListing};
use crate::db::Db;
use crate::domain::Money;
use crate::error::{AppError, AppResult};
use std::fmt::Write as _;

const COMPANY_NAME: &str = "Dry Fruits Business";
const COMPANY_ADDRESS: &str = "123 Business Street, City, Country";
const COMPANY_PHONE: &str = "+1234567890";
const COMPANY_EMAIL: &str = "info@dryfruitsbusiness.com";

const TERMS: [&str; 2] = [
    "1. Payment is due within 30 days.",
    "2. Please make checks payable to Dry Fruits Business.",
];

const WIDTH: usize = 92;

/// `pending_payment` -> `Pending Payment`.
pub fn title_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn file_name(invoice: &Invoice) -> String {
    format!("invoice_{}.txt", invoice.invoice_number)
}

fn total_line(out: &mut String, label: &str, amount: Money) {
    let amount = amount.to_string();
    let _ = writeln!(out, "{label:>76} ₹{amount:>13}");
}

pub fn render(invoice: &Invoice, customer: &Customer, items: &[InvoiceItemListing]) -> String {
    let mut out = String::new();
    let rule = "=".repeat(WIDTH);
    let thin = "-".repeat(WIDTH);

    let _ = writeln!(out, "{COMPANY_NAME}");
    let _ = writeln!(out, "{COMPANY_ADDRESS}");
    let _ = writeln!(out, "Phone: {COMPANY_PHONE}");
    let _ = writeln!(out, "Email: {COMPANY_EMAIL}");
    let _ = writeln!(out, "{rule}");

    let _ = writeln!(out, "INVOICE #{}", invoice.invoice_number);
    let date = invoice
        .created_on()
        .map_or_else(|| invoice.created_at.clone(), |d| d.to_string());
    let _ = writeln!(out, "Date: {date}");
    let _ = writeln!(out, "Status: {}", title_case(invoice.status.as_str()));
    if let Some(due) = invoice.effective_due_date() {
        let _ = writeln!(out, "Due Date: {due}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Customer Information:");
    let _ = writeln!(out, "Name: {}", customer.name);
    let _ = writeln!(out, "Phone: {}", customer.phone);
    let _ = writeln!(
        out,
        "Address: {}",
        customer.address.as_deref().unwrap_or_default()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Invoice Items:");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(
        out,
        "{:>3}  {:<28} {:<10} {:>12} {:>12} {:>8} {:>13}",
        "#", "Product", "Quality", "Quantity", "Unit Price", "Disc", "Subtotal"
    );
    let _ = writeln!(out, "{thin}");
    for (i, line) in items.iter().enumerate() {
        let item = &line.item;
        let _ = writeln!(
            out,
            "{:>3}  {:<28} {:<10} {:>12} {:>12} {:>8} {:>13}",
            i + 1,
            line.product_name,
            title_case(line.quality.as_str()),
            format!("{} kg", item.quantity),
            format!("₹{}", item.unit_price),
            format!("{}%", item.discount_percentage),
            format!("₹{}", item.subtotal),
        );
    }
    let _ = writeln!(out, "{thin}");

    total_line(&mut out, "Subtotal:", invoice.subtotal);
    if !invoice.discount_percentage.is_zero() || !invoice.discount_amount.is_zero() {
        let label = if invoice.discount_percentage.is_zero() {
            "Discount:".to_string()
        } else {
            format!("Discount ({}%):", invoice.discount_percentage)
        };
        total_line(&mut out, &label, invoice.discount_amount);
    }
    if !invoice.tax_percentage.is_zero() {
        total_line(
            &mut out,
            &format!("Tax ({}%):", invoice.tax_percentage),
            invoice.tax_amount,
        );
    }
    total_line(&mut out, "Total:", invoice.total);
    if invoice.amount_paid.paise() > 0 {
        total_line(&mut out, "Paid:", invoice.amount_paid);
        total_line(&mut out, "Balance:", invoice.amount_due());
    }
    let _ = writeln!(out);

    if let Some(notes) = invoice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(out, "Notes:");
        let _ = writeln!(out, "{notes}");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Terms and Conditions:");
    for term in TERMS {
        let _ = writeln!(out, "{term}");
    }
    out
}

/// Loads and renders one invoice. Returns the attachment name and the document.
pub async fn print(db: &Db, id: i64) -> AppResult<(String, String)> {
    let mut conn = db.acquire().await?;
    let invoice = invoices::find(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    let customer = customers::find_by_id(&mut conn, invoice.customer_id)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    let items = invoices::items_of(&mut conn, id).await?;
    Ok((file_name(&invoice), render(&invoice, &customer, &items)))
}
