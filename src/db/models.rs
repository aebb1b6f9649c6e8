use crate::domain::{
    CustomerType, InvoiceStatus, Money, PaymentMethod, PaymentStatus, PaymentType, Percent,
    PriceTier, Quality, Quantity, ReminderStatus, ReminderType, Role, parse_date,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Boolean stored as a `0`/`1` integer column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(pub bool);

impl From<i64> for Flag {
    fn from(raw: i64) -> Self {
        Flag(raw != 0)
    }
}

impl Flag {
    pub fn get(self) -> bool {
        self.0
    }

    pub fn as_int(self) -> i64 {
        i64::from(self.0)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(try_from = "i64")]
    pub is_active: Flag,
    #[sqlx(try_from = "i64")]
    pub is_staff: Flag,
    #[sqlx(try_from = "i64")]
    pub is_superuser: Flag,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: String,
    pub last_login: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser.get()
    }

    pub fn is_executive(&self) -> bool {
        self.role == Role::Executive
    }

    /// Staff and superusers may enter the admin panel.
    pub fn can_access_admin(&self) -> bool {
        self.is_staff.get() || self.is_superuser.get()
    }

    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    #[sqlx(try_from = "String")]
    pub customer_type: CustomerType,
    #[sqlx(try_from = "i64")]
    pub credit_limit: Money,
    pub created_at: String,
    pub updated_at: String,
}

/// Credit position of a customer derived from open invoices.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CreditStanding {
    pub credit_limit: Money,
    pub total_pending_amount: Money,
    pub available_credit: Money,
    pub is_credit_limit_exceeded: bool,
}

impl CreditStanding {
    pub fn new(credit_limit: Money, total_pending_amount: Money) -> Self {
        Self {
            credit_limit,
            total_pending_amount,
            available_credit: (credit_limit - total_pending_amount).non_negative(),
            is_credit_limit_exceeded: total_pending_amount > credit_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct ProductQuality {
    pub id: i64,
    pub product_id: i64,
    #[sqlx(try_from = "String")]
    pub quality: Quality,
    #[sqlx(try_from = "i64")]
    pub retail_price: Money,
    #[sqlx(try_from = "i64")]
    pub wholesale_price: Money,
    #[sqlx(try_from = "i64")]
    pub broker_price: Money,
    #[sqlx(rename = "stock_grams", try_from = "i64")]
    #[serde(rename = "stock_quantity")]
    pub stock: Quantity,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductQuality {
    pub fn price_for(&self, tier: PriceTier) -> Money {
        match tier {
            PriceTier::Retail => self.retail_price,
            PriceTier::Wholesale => self.wholesale_price,
            PriceTier::Broker => self.broker_price,
        }
    }
}

/// A quality variant joined with its product, as shown in listings.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct QualityListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quality: ProductQuality,
    pub product_name: String,
    pub product_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct PriceList {
    pub id: i64,
    pub file_name: String,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: String,
    #[sqlx(try_from = "i64")]
    pub processed: Flag,
    pub rows_processed: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub customer_id: i64,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    #[sqlx(try_from = "String")]
    pub payment_type: PaymentType,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    #[sqlx(try_from = "i64")]
    pub subtotal: Money,
    #[sqlx(try_from = "i64")]
    pub discount_percentage: Percent,
    #[sqlx(try_from = "i64")]
    pub discount_amount: Money,
    #[sqlx(try_from = "i64")]
    pub tax_percentage: Percent,
    #[sqlx(try_from = "i64")]
    pub tax_amount: Money,
    #[sqlx(try_from = "i64")]
    pub total: Money,
    #[sqlx(try_from = "i64")]
    pub amount_paid: Money,
    pub due_date: Option<String>,
    pub payment_due_date: Option<String>,
    pub notes: Option<String>,
}

impl Invoice {
    pub fn amount_due(&self) -> Money {
        self.total - self.amount_paid
    }

    pub fn is_paid(&self) -> bool {
        self.amount_paid >= self.total
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_date)
    }

    pub fn payment_due_date(&self) -> Option<NaiveDate> {
        self.payment_due_date.as_deref().and_then(parse_date)
    }

    /// Expected payment date, falling back to the formal due date.
    pub fn effective_due_date(&self) -> Option<NaiveDate> {
        self.payment_due_date().or_else(|| self.due_date())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date().is_some_and(|d| d < today) && !self.is_paid()
    }

    /// Creation date (`YYYY-MM-DD` prefix of `created_at`).
    pub fn created_on(&self) -> Option<NaiveDate> {
        self.created_at.get(..10).and_then(parse_date)
    }
}

/// Invoice joined with the customer's name and phone.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct InvoiceListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invoice: Invoice,
    pub customer_name: String,
    pub customer_phone: String,
    #[sqlx(try_from = "String")]
    pub customer_type: CustomerType,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub product_quality_id: i64,
    #[sqlx(rename = "quantity_grams", try_from = "i64")]
    pub quantity: Quantity,
    #[sqlx(try_from = "i64")]
    pub unit_price: Money,
    #[sqlx(try_from = "i64")]
    pub discount_percentage: Percent,
    #[sqlx(try_from = "i64")]
    pub discount_amount: Money,
    #[sqlx(try_from = "i64")]
    pub subtotal: Money,
}

/// Invoice item joined with product name and quality grade.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct InvoiceItemListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: InvoiceItem,
    pub product_name: String,
    #[sqlx(try_from = "String")]
    pub quality: Quality,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: i64,
    pub customer_id: i64,
    #[sqlx(try_from = "i64")]
    pub amount: Money,
    #[sqlx(try_from = "String")]
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub notes: Option<String>,
}

/// Payment joined with invoice number and customer name.
#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct PaymentListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: Payment,
    pub invoice_number: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub invoice_id: i64,
    pub customer_id: i64,
    #[sqlx(try_from = "String")]
    pub reminder_type: ReminderType,
    #[sqlx(try_from = "String")]
    pub status: ReminderStatus,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub notes: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    /// Clamps a 1-based page number and returns `(page, offset)`.
    pub fn bounds(page: Option<i64>, per_page: i64, total: i64) -> (i64, i64) {
        let total_pages = Self::pages(per_page, total);
        let page = page.unwrap_or(1).clamp(1, total_pages.max(1));
        (page, (page - 1) * per_page)
    }

    pub fn pages(per_page: i64, total: i64) -> i64 {
        if total == 0 { 1 } else { (total + per_page - 1) / per_page }
    }

    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        Self {
            items,
            page,
            per_page,
            total,
            total_pages: Self::pages(per_page, total),
        }
    }

    /// Slices an already materialized list.
    pub fn from_vec(all: Vec<T>, page: Option<i64>, per_page: i64) -> Self {
        let total = all.len() as i64;
        let (page, offset) = Self::bounds(page, per_page, total);
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .collect();
        Self::new(items, page, per_page, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(total: i64, paid: i64, due: Option<&str>) -> Invoice {
        Invoice {
            id: 1,
            invoice_number: "INV-00000001".to_string(),
            customer_id: 1,
            created_by: None,
            created_at: "2024-03-01 10:00:00".to_string(),
            updated_at: "2024-03-01 10:00:00".to_string(),
            payment_type: PaymentType::Credit,
            status: InvoiceStatus::PendingPayment,
            subtotal: Money(total),
            discount_percentage: Percent(0),
            discount_amount: Money(0),
            tax_percentage: Percent(0),
            tax_amount: Money(0),
            total: Money(total),
            amount_paid: Money(paid),
            due_date: due.map(str::to_string),
            payment_due_date: None,
            notes: None,
        }
    }

    #[test]
    fn overdue_requires_past_due_date_and_balance() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(invoice(1000, 0, Some("2024-03-09")).is_overdue(today));
        assert!(!invoice(1000, 1000, Some("2024-03-09")).is_overdue(today));
        assert!(!invoice(1000, 0, Some("2024-03-10")).is_overdue(today));
        assert!(!invoice(1000, 0, None).is_overdue(today));
        assert_eq!(
            invoice(1000, 0, None).created_on(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn page_bounds_clamp() {
        assert_eq!(Page::<()>::bounds(Some(3), 10, 25), (3, 20));
        assert_eq!(Page::<()>::bounds(Some(9), 10, 25), (3, 20));
        assert_eq!(Page::<()>::bounds(None, 10, 0), (1, 0));
        let page = Page::from_vec((1..=12).collect::<Vec<i32>>(), Some(2), 10);
        assert_eq!(page.items, vec![11, 12]);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn credit_standing_clamps_available() {
        let standing = CreditStanding::new(Money(10_000), Money(12_500));
        assert!(standing.is_credit_limit_exceeded);
        assert_eq!(standing.available_credit, Money::ZERO);
    }
}
