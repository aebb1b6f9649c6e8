//! Dashboard and report aggregation.
//!
//! Rows come from the plain filtered queries in `db`; grouping, growth and
//! percentage maths happen here so every report is testable without a database.

use crate::db::Db;
use crate::db::customers;
use crate::db::invoices::{self, InvoiceFilter};
use crate::db::models::{Customer, Invoice, InvoiceItemListing, InvoiceListing};
use crate::domain::{
    CustomerType, InvoiceStatus, Money, PaymentType, Quality, Quantity, format_date,
    growth_percent, today,
};
use crate::error::{AppError, AppResult};
use crate::service::invoice_print::title_case;
use ahash::AHashMap;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const SALES_DEFAULT_DAYS: i64 = 30;
pub const CUSTOMER_DEFAULT_DAYS: i64 = 90;
const DASHBOARD_DAYS: i64 = 7;
const CHART_SIZE: usize = 5;

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Parses an optional filter where blank and `all` mean "no filter".
fn choice<T: FromStr<Err = String>>(raw: Option<&str>) -> AppResult<Option<T>> {
    match raw.map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(AppError::Validation),
    }
}

fn blank_to_none(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickFilter {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    LastMonth,
}

impl QuickFilter {
    pub fn range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            QuickFilter::Today => (today, today),
            QuickFilter::Yesterday => {
                let day = today - Duration::days(1);
                (day, day)
            }
            QuickFilter::ThisWeek => (Grouping::Week.period_start(today), today),
            QuickFilter::ThisMonth => (month_start(today), today),
            QuickFilter::LastMonth => {
                let last = month_start(today) - Duration::days(1);
                (month_start(last), last)
            }
        }
    }
}

fn resolve_range(
    quick: Option<QuickFilter>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
    default_days: i64,
) -> AppResult<(NaiveDate, NaiveDate)> {
    if let Some(quick) = quick {
        return Ok(quick.range(today));
    }
    let from = from.unwrap_or(today - Duration::days(default_days));
    let to = to.unwrap_or(today);
    if from > to {
        return Err(AppError::validation("Start date must be on or before end date."));
    }
    Ok((from, to))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    #[default]
    Day,
    Week,
    Month,
}

impl Grouping {
    /// First day of the period containing `date`; weeks start on Monday.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Grouping::Day => date,
            Grouping::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Grouping::Month => month_start(date),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Grouping::Day => format_date(start),
            Grouping::Week => start.format("Week %U, %Y").to_string(),
            Grouping::Month => start.format("%B %Y").to_string(),
        }
    }
}

/// Bills and takings of one period, split by payment type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSales {
    pub period: String,
    pub bills: i64,
    pub total_sale: Money,
    pub cash_sale: Money,
    pub upi_sale: Money,
    pub credit_sale: Money,
}

impl PeriodSales {
    fn new(period: String) -> Self {
        Self {
            period,
            bills: 0,
            total_sale: Money::ZERO,
            cash_sale: Money::ZERO,
            upi_sale: Money::ZERO,
            credit_sale: Money::ZERO,
        }
    }

    fn add(&mut self, invoice: &Invoice) {
        self.bills += 1;
        self.total_sale += invoice.total;
        match invoice.payment_type {
            PaymentType::Cash => self.cash_sale += invoice.total,
            PaymentType::Upi => self.upi_sale += invoice.total,
            PaymentType::Credit => self.credit_sale += invoice.total,
        }
    }
}

/// Groups invoices into periods in chronological order; empty periods are omitted.
pub fn group_sales(invoices: &[InvoiceListing], grouping: Grouping) -> Vec<PeriodSales> {
    let mut periods: BTreeMap<NaiveDate, PeriodSales> = BTreeMap::new();
    for listing in invoices {
        let Some(day) = listing.invoice.created_on() else {
            continue;
        };
        let start = grouping.period_start(day);
        periods
            .entry(start)
            .or_insert_with(|| PeriodSales::new(grouping.label(start)))
            .add(&listing.invoice);
    }
    periods.into_values().collect()
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    pub cash: Money,
    pub upi: Money,
    pub credit: Money,
}

impl PaymentTotals {
    pub fn total(&self) -> Money {
        self.cash + self.upi + self.credit
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PaymentShares {
    pub cash: f64,
    pub upi: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub customer_type: CustomerType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub total_sales: Money,
    pub month_sales: Money,
    pub sales_growth: i64,
    pub pending_payments: Money,
    pub pending_growth: i64,
    pub total_customers: i64,
    pub customer_growth: i64,
    pub sales_series: Vec<DailyPoint>,
    pub payment_totals: PaymentTotals,
    pub payment_percentages: PaymentShares,
    pub customer_types: Vec<TypeCount>,
    pub total_bills: i64,
    pub table_data: Vec<PeriodSales>,
}

fn outstanding(invoice: &Invoice) -> Money {
    invoice.amount_due().non_negative()
}

pub fn build_dashboard(
    today: NaiveDate,
    invoices: &[InvoiceListing],
    customers: &[Customer],
) -> Dashboard {
    let this_month = month_start(today);
    let prev_month = month_start(this_month - Duration::days(1));
    let series_start = today - Duration::days(DASHBOARD_DAYS);

    let mut month_sales = Money::ZERO;
    let mut prev_month_sales = Money::ZERO;
    let mut pending_payments = Money::ZERO;
    let mut prev_pending = Money::ZERO;
    let mut payment_totals = PaymentTotals::default();
    let mut recent = Vec::new();

    for listing in invoices {
        let invoice = &listing.invoice;
        match invoice.payment_type {
            PaymentType::Cash => payment_totals.cash += invoice.total,
            PaymentType::Upi => payment_totals.upi += invoice.total,
            PaymentType::Credit => payment_totals.credit += invoice.total,
        }
        pending_payments += outstanding(invoice);

        let Some(day) = invoice.created_on() else {
            continue;
        };
        if day >= this_month && day <= today {
            month_sales += invoice.total;
        } else if day >= prev_month && day < this_month {
            prev_month_sales += invoice.total;
        }
        if day < this_month {
            prev_pending += outstanding(invoice);
        }
        if day >= series_start && day <= today {
            recent.push(listing.clone());
        }
    }

    let table_data = group_sales(&recent, Grouping::Day);
    let by_day: AHashMap<&str, Money> = table_data
        .iter()
        .map(|p| (p.period.as_str(), p.total_sale))
        .collect();
    let sales_series = (0..=DASHBOARD_DAYS)
        .map(|offset| {
            let date = series_start + Duration::days(offset);
            DailyPoint {
                date,
                total: by_day
                    .get(format_date(date).as_str())
                    .copied()
                    .unwrap_or_default(),
            }
        })
        .collect();

    let all_sales = payment_totals.total();
    let payment_percentages = PaymentShares {
        cash: payment_totals.cash.share_of(all_sales, 1),
        upi: payment_totals.upi.share_of(all_sales, 1),
        credit: payment_totals.credit.share_of(all_sales, 1),
    };

    let cutoff = format!("{} 00:00:00", format_date(this_month));
    let total_customers = customers.len() as i64;
    let prev_customers = customers.iter().filter(|c| c.created_at < cutoff).count() as i64;
    let customer_types = CustomerType::ALL
        .iter()
        .map(|t| TypeCount {
            customer_type: *t,
            count: customers.iter().filter(|c| c.customer_type == *t).count() as i64,
        })
        .filter(|t| t.count > 0)
        .collect();

    Dashboard {
        today,
        total_sales: all_sales,
        month_sales,
        sales_growth: growth_percent(month_sales.paise(), prev_month_sales.paise()),
        pending_payments,
        pending_growth: growth_percent(pending_payments.paise(), prev_pending.paise()),
        total_customers,
        customer_growth: growth_percent(total_customers, prev_customers),
        sales_series,
        payment_totals,
        payment_percentages,
        customer_types,
        total_bills: invoices.len() as i64,
        table_data,
    }
}

pub async fn dashboard(db: &Db) -> AppResult<Dashboard> {
    let mut conn = db.acquire().await?;
    let invoices = invoices::list(&mut conn, &InvoiceFilter::default()).await?;
    let customers = customers::list(&mut conn).await?;
    Ok(build_dashboard(today(), &invoices, &customers))
}

// ---------------------------------------------------------------------------
// Sales report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub quick_filter: Option<QuickFilter>,
    #[serde(default)]
    pub grouping: Grouping,
    pub payment_type: Option<String>,
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    pub bills: i64,
    pub total_sales: Money,
    pub total_cash: Money,
    pub total_upi: Money,
    pub total_credit: Money,
    pub cash_percent: i64,
    pub upi_percent: i64,
    pub credit_percent: i64,
}

pub fn sales_totals(rows: &[PeriodSales]) -> SalesTotals {
    let mut t = SalesTotals::default();
    for row in rows {
        t.bills += row.bills;
        t.total_sales += row.total_sale;
        t.total_cash += row.cash_sale;
        t.total_upi += row.upi_sale;
        t.total_credit += row.credit_sale;
    }
    let paid = t.total_cash + t.total_upi + t.total_credit;
    t.cash_percent = t.total_cash.share_of(paid, 0) as i64;
    t.upi_percent = t.total_upi.share_of(paid, 0) as i64;
    t.credit_percent = t.total_credit.share_of(paid, 0) as i64;
    t
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub date_range_display: String,
    pub grouping: Grouping,
    pub rows: Vec<PeriodSales>,
    pub totals: SalesTotals,
}

fn range_display(from: NaiveDate, to: NaiveDate) -> String {
    if from == to {
        from.format("%d %b %Y").to_string()
    } else {
        format!("{} - {}", from.format("%d %b %Y"), to.format("%d %b %Y"))
    }
}

fn range_slug(from: NaiveDate, to: NaiveDate) -> String {
    if from == to {
        format_date(from)
    } else {
        format!("{}_to_{}", format_date(from), format_date(to))
    }
}

async fn sales_rows(
    db: &Db,
    query: &SalesQuery,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<PeriodSales>> {
    let payment_type: Option<PaymentType> = choice(query.payment_type.as_deref())?;
    let mut conn = db.acquire().await?;
    let mut invoices = invoices::list(
        &mut conn,
        &InvoiceFilter {
            payment_type,
            date_from: Some(from),
            date_to: Some(to),
            ..Default::default()
        },
    )
    .await?;
    let customer = blank_to_none(query.customer.as_deref()).map(str::to_lowercase);
    invoices.retain(|l| {
        l.invoice.status != InvoiceStatus::Draft
            && customer
                .as_deref()
                .is_none_or(|c| l.customer_name.to_lowercase().contains(c))
    });
    Ok(group_sales(&invoices, query.grouping))
}

pub async fn sales(db: &Db, query: &SalesQuery) -> AppResult<SalesReport> {
    let (from, to) = resolve_range(
        query.quick_filter,
        query.date_from,
        query.date_to,
        today(),
        SALES_DEFAULT_DAYS,
    )?;
    let rows = sales_rows(db, query, from, to).await?;
    Ok(SalesReport {
        start_date: from,
        end_date: to,
        date_range_display: range_display(from, to),
        grouping: query.grouping,
        totals: sales_totals(&rows),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Product sales report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductSort {
    #[default]
    Quantity,
    Revenue,
    Name,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub quick_filter: Option<QuickFilter>,
    pub product_search: Option<String>,
    pub variant_filter: Option<String>,
    pub min_quantity: Option<String>,
    #[serde(default)]
    pub sort_by: ProductSort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSalesRow {
    pub product: String,
    pub variant: Quality,
    pub quantity_sold: Quantity,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<ProductSalesRow>,
    pub total_quantity: Quantity,
    pub total_revenue: Money,
    pub chart: Vec<ChartPoint>,
}

/// Sums sold items per product and variant. Revenue is undiscounted: quantity × unit price.
pub fn product_rows(
    items: &[InvoiceItemListing],
    search: Option<&str>,
    variant: Option<Quality>,
    min_quantity: Option<Quantity>,
    sort: ProductSort,
) -> Vec<ProductSalesRow> {
    let search = search.map(str::to_lowercase);
    let mut grouped: AHashMap<(String, Quality), (Quantity, Money)> = AHashMap::new();
    for line in items {
        if search
            .as_deref()
            .is_some_and(|s| !line.product_name.to_lowercase().contains(s))
        {
            continue;
        }
        if variant.is_some_and(|v| v != line.quality) {
            continue;
        }
        let entry = grouped
            .entry((line.product_name.clone(), line.quality))
            .or_default();
        entry.0 += line.item.quantity;
        entry.1 += line.item.unit_price.times_quantity(line.item.quantity);
    }

    let mut rows: Vec<ProductSalesRow> = grouped
        .into_iter()
        .map(|((product, variant), (quantity_sold, revenue))| ProductSalesRow {
            product,
            variant,
            quantity_sold,
            revenue,
        })
        .filter(|r| min_quantity.is_none_or(|min| r.quantity_sold >= min))
        .collect();
    rows.sort_by(|a, b| {
        let key = match sort {
            ProductSort::Quantity => b.quantity_sold.cmp(&a.quantity_sold),
            ProductSort::Revenue => b.revenue.cmp(&a.revenue),
            ProductSort::Name => std::cmp::Ordering::Equal,
        };
        key.then_with(|| a.product.cmp(&b.product))
            .then_with(|| a.variant.as_str().cmp(b.variant.as_str()))
    });
    rows
}

fn top_by_value(mut points: Vec<ChartPoint>) -> Vec<ChartPoint> {
    points.sort_by(|a, b| b.value.cmp(&a.value));
    points.truncate(CHART_SIZE);
    points
}

async fn product_report_rows(
    db: &Db,
    query: &ProductQuery,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<ProductSalesRow>> {
    let variant: Option<Quality> = choice(query.variant_filter.as_deref())?;
    // Unreadable minimums are ignored.
    let min_quantity = blank_to_none(query.min_quantity.as_deref()).and_then(Quantity::parse);
    let mut conn = db.acquire().await?;
    let items: Vec<InvoiceItemListing> = invoices::sold_items_between(&mut conn, from, to)
        .await?
        .into_iter()
        .map(|(item, _)| item)
        .collect();
    Ok(product_rows(
        &items,
        blank_to_none(query.product_search.as_deref()),
        variant,
        min_quantity,
        query.sort_by,
    ))
}

pub async fn products(db: &Db, query: &ProductQuery) -> AppResult<ProductReport> {
    let (from, to) = resolve_range(
        query.quick_filter,
        query.date_from,
        query.date_to,
        today(),
        SALES_DEFAULT_DAYS,
    )?;
    let rows = product_report_rows(db, query, from, to).await?;
    let chart = top_by_value(
        rows.iter()
            .map(|r| ChartPoint {
                name: r.product.clone(),
                value: r.revenue,
            })
            .collect(),
    );
    Ok(ProductReport {
        start_date: from,
        end_date: to,
        total_quantity: rows.iter().map(|r| r.quantity_sold).sum(),
        total_revenue: rows.iter().map(|r| r.revenue).sum(),
        chart,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Customer summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSort {
    #[default]
    Purchases,
    Name,
    LastPurchase,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub customer_type: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub sort_by: CustomerSort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummaryRow {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub customer_type: CustomerType,
    pub total_orders: i64,
    pub total_value: Money,
    pub pending_payment: Money,
    pub last_purchase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rows: Vec<CustomerSummaryRow>,
    pub total_customers: i64,
    pub total_orders: i64,
    pub total_value: Money,
    pub total_pending: Money,
    pub chart: Vec<ChartPoint>,
}

/// Per-customer orders, value and outstanding balance over non-draft `invoices`.
///
/// Customers without orders appear only when `include_inactive` is set.
pub fn customer_rows(
    customers: &[Customer],
    invoices: &[InvoiceListing],
    customer_type: Option<CustomerType>,
    include_inactive: bool,
    sort: CustomerSort,
) -> Vec<CustomerSummaryRow> {
    let mut rows: Vec<CustomerSummaryRow> = customers
        .iter()
        .filter(|c| customer_type.is_none_or(|t| c.customer_type == t))
        .map(|c| {
            let mut row = CustomerSummaryRow {
                id: c.id,
                name: c.name.clone(),
                phone: c.phone.clone(),
                customer_type: c.customer_type,
                total_orders: 0,
                total_value: Money::ZERO,
                pending_payment: Money::ZERO,
                last_purchase: None,
            };
            for l in invoices.iter().filter(|l| {
                l.invoice.customer_id == c.id && l.invoice.status != InvoiceStatus::Draft
            }) {
                row.total_orders += 1;
                row.total_value += l.invoice.total;
                row.pending_payment += outstanding(&l.invoice);
                if row
                    .last_purchase
                    .as_deref()
                    .is_none_or(|last| l.invoice.created_at.as_str() > last)
                {
                    row.last_purchase = Some(l.invoice.created_at.clone());
                }
            }
            row
        })
        .filter(|r| include_inactive || r.total_orders > 0)
        .collect();

    match sort {
        CustomerSort::Purchases => rows.sort_by(|a, b| {
            b.total_value
                .cmp(&a.total_value)
                .then_with(|| a.name.cmp(&b.name))
        }),
        CustomerSort::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
        // Customers without a purchase go last.
        CustomerSort::LastPurchase => rows.sort_by(|a, b| {
            b.last_purchase
                .cmp(&a.last_purchase)
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
    rows
}

async fn customer_report_rows(
    db: &Db,
    query: &CustomerQuery,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<CustomerSummaryRow>> {
    let customer_type: Option<CustomerType> = choice(query.customer_type.as_deref())?;
    let mut conn = db.acquire().await?;
    let customers = customers::list(&mut conn).await?;
    let invoices = invoices::list(
        &mut conn,
        &InvoiceFilter {
            date_from: Some(from),
            date_to: Some(to),
            ..Default::default()
        },
    )
    .await?;
    Ok(customer_rows(
        &customers,
        &invoices,
        customer_type,
        query.include_inactive,
        query.sort_by,
    ))
}

pub async fn customers(db: &Db, query: &CustomerQuery) -> AppResult<CustomerReport> {
    let (from, to) = resolve_range(
        None,
        query.date_from,
        query.date_to,
        today(),
        CUSTOMER_DEFAULT_DAYS,
    )?;
    let rows = customer_report_rows(db, query, from, to).await?;
    let chart = top_by_value(
        rows.iter()
            .filter(|r| r.total_value.paise() > 0)
            .map(|r| ChartPoint {
                name: r.name.clone(),
                value: r.total_value,
            })
            .collect(),
    );
    Ok(CustomerReport {
        start_date: from,
        end_date: to,
        total_customers: rows.len() as i64,
        total_orders: rows.iter().map(|r| r.total_orders).sum(),
        total_value: rows.iter().map(|r| r.total_value).sum(),
        total_pending: rows.iter().map(|r| r.pending_payment).sum(),
        chart,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Credit overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditSort {
    #[default]
    DueDate,
    Amount,
    Overdue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditQuery {
    #[serde(default)]
    pub sort_by: CreditSort,
    #[serde(default)]
    pub include_paid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Paid,
    PartiallyPaid,
    Overdue,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditRow {
    pub invoice_id: i64,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub invoice_date: String,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub amount_due: Money,
    pub status: CreditStatus,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditReport {
    pub rows: Vec<CreditRow>,
    pub total_invoices: i64,
    pub total_amount: Money,
    pub total_paid: Money,
    pub total_due: Money,
}

fn days_overdue(invoice: &Invoice, today: NaiveDate) -> i64 {
    invoice
        .effective_due_date()
        .filter(|due| *due < today)
        .map_or(0, |due| (today - due).num_days())
}

/// Status as seen by the credit desk, derived from the balance rather than the stored status.
pub fn credit_status(invoice: &Invoice, today: NaiveDate) -> CreditStatus {
    let due = invoice.amount_due();
    if invoice.status == InvoiceStatus::Paid || due.is_zero() {
        CreditStatus::Paid
    } else if due < invoice.total {
        CreditStatus::PartiallyPaid
    } else if days_overdue(invoice, today) > 0 {
        CreditStatus::Overdue
    } else {
        CreditStatus::Pending
    }
}

pub fn credit_rows(
    invoices: &[InvoiceListing],
    include_paid: bool,
    today: NaiveDate,
    sort: CreditSort,
) -> Vec<CreditRow> {
    let mut rows: Vec<CreditRow> = invoices
        .iter()
        .filter(|l| include_paid || l.invoice.status != InvoiceStatus::Paid)
        .filter_map(|l| {
            let invoice = &l.invoice;
            let amount_due = invoice.amount_due();
            let owed = amount_due.paise() > 0;
            if !owed && !include_paid {
                return None;
            }
            if invoice.payment_type != PaymentType::Credit && !owed {
                return None;
            }
            Some(CreditRow {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                customer_name: l.customer_name.clone(),
                customer_phone: l.customer_phone.clone(),
                invoice_date: invoice.created_at.clone(),
                due_date: invoice.effective_due_date(),
                total_amount: invoice.total,
                amount_paid: invoice.amount_paid,
                amount_due,
                status: credit_status(invoice, today),
                days_overdue: days_overdue(invoice, today),
            })
        })
        .collect();

    match sort {
        CreditSort::DueDate => rows.sort_by_key(|r| (r.due_date.is_none(), r.due_date)),
        CreditSort::Amount => rows.sort_by(|a, b| b.amount_due.cmp(&a.amount_due)),
        CreditSort::Overdue => rows.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue)),
    }
    rows
}

pub async fn credit(db: &Db, query: &CreditQuery) -> AppResult<CreditReport> {
    let mut conn = db.acquire().await?;
    let invoices = invoices::list(&mut conn, &InvoiceFilter::default()).await?;
    let rows = credit_rows(&invoices, query.include_paid, today(), query.sort_by);
    Ok(CreditReport {
        total_invoices: rows.len() as i64,
        total_amount: rows.iter().map(|r| r.total_amount).sum(),
        total_paid: rows.iter().map(|r| r.amount_paid).sum(),
        total_due: rows.iter().map(|r| r.amount_due).sum(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// CSV exports
// ---------------------------------------------------------------------------

/// A rendered CSV attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub body: Vec<u8>,
}

fn finish(writer: csv::Writer<Vec<u8>>) -> AppResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("flush report export: {e}")))
}

pub fn sales_csv(rows: &[PeriodSales]) -> AppResult<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["Date", "Bills Generated", "Total Sale", "Cash", "UPI/Card", "Credit"])?;
    for r in rows {
        w.write_record([
            r.period.clone(),
            r.bills.to_string(),
            r.total_sale.to_string(),
            r.cash_sale.to_string(),
            r.upi_sale.to_string(),
            r.credit_sale.to_string(),
        ])?;
    }
    let t = sales_totals(rows);
    w.write_record([
        "Total".to_string(),
        t.bills.to_string(),
        t.total_sales.to_string(),
        t.total_cash.to_string(),
        t.total_upi.to_string(),
        t.total_credit.to_string(),
    ])?;
    finish(w)
}

pub async fn export_sales(db: &Db, query: &SalesQuery) -> AppResult<CsvExport> {
    let today = today();
    let (from, to) = resolve_range(
        query.quick_filter,
        query.date_from,
        query.date_to,
        today,
        SALES_DEFAULT_DAYS,
    )?;
    let rows = sales_rows(db, query, from, to).await?;
    let mut parts = vec!["Sales_Report".to_string(), range_slug(from, to)];
    if let Some(pt) = choice::<PaymentType>(query.payment_type.as_deref())? {
        parts.push(pt.to_string());
    }
    parts.push(format_date(today));
    Ok(CsvExport {
        file_name: format!("{}.csv", parts.join("_")),
        body: sales_csv(&rows)?,
    })
}

pub fn products_csv(rows: &[ProductSalesRow]) -> AppResult<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["Product", "Variant", "Qty Sold (Kg)", "Revenue (₹)"])?;
    for r in rows {
        w.write_record([
            r.product.clone(),
            title_case(r.variant.as_str()),
            r.quantity_sold.to_string(),
            r.revenue.to_string(),
        ])?;
    }
    let qty: Quantity = rows.iter().map(|r| r.quantity_sold).sum();
    let revenue: Money = rows.iter().map(|r| r.revenue).sum();
    w.write_record([
        "Total".to_string(),
        String::new(),
        qty.to_string(),
        revenue.to_string(),
    ])?;
    finish(w)
}

pub async fn export_products(db: &Db, query: &ProductQuery) -> AppResult<CsvExport> {
    let today = today();
    let (from, to) = resolve_range(
        query.quick_filter,
        query.date_from,
        query.date_to,
        today,
        SALES_DEFAULT_DAYS,
    )?;
    let rows = product_report_rows(db, query, from, to).await?;
    let mut parts = vec!["Product_Sales".to_string(), range_slug(from, to)];
    if let Some(search) = blank_to_none(query.product_search.as_deref()) {
        parts.push(format!("search_{search}"));
    }
    if let Some(variant) = choice::<Quality>(query.variant_filter.as_deref())? {
        parts.push(format!("variant_{variant}"));
    }
    parts.push(format_date(today));
    Ok(CsvExport {
        file_name: format!("{}.csv", parts.join("_")),
        body: products_csv(&rows)?,
    })
}

pub fn customers_csv(rows: &[CustomerSummaryRow]) -> AppResult<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "Customer",
        "Phone",
        "Customer Type",
        "Total Orders",
        "Total Value (₹)",
        "Pending Payment (₹)",
    ])?;
    for r in rows {
        w.write_record([
            r.name.clone(),
            r.phone.clone(),
            title_case(r.customer_type.as_str()),
            r.total_orders.to_string(),
            r.total_value.to_string(),
            r.pending_payment.to_string(),
        ])?;
    }
    let orders: i64 = rows.iter().map(|r| r.total_orders).sum();
    let value: Money = rows.iter().map(|r| r.total_value).sum();
    let pending: Money = rows.iter().map(|r| r.pending_payment).sum();
    w.write_record([
        "Total".to_string(),
        String::new(),
        String::new(),
        orders.to_string(),
        value.to_string(),
        pending.to_string(),
    ])?;
    finish(w)
}

pub async fn export_customers(db: &Db, query: &CustomerQuery) -> AppResult<CsvExport> {
    let today = today();
    let (from, to) = resolve_range(
        None,
        query.date_from,
        query.date_to,
        today,
        CUSTOMER_DEFAULT_DAYS,
    )?;
    let rows = customer_report_rows(db, query, from, to).await?;
    Ok(CsvExport {
        file_name: format!("Customer_Summary_{}.csv", format_date(today)),
        body: customers_csv(&rows)?,
    })
}

/// Credit-type invoices only; paid ones unless `include_paid`.
pub fn credit_csv(invoices: &[InvoiceListing], include_paid: bool, today: NaiveDate) -> AppResult<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "Invoice #",
        "Customer",
        "Phone",
        "Invoice Date",
        "Due Date",
        "Total Amount",
        "Amount Paid",
        "Amount Due",
        "Status",
        "Days Overdue",
    ])?;
    for l in invoices.iter().filter(|l| {
        l.invoice.payment_type == PaymentType::Credit
            && (include_paid || l.invoice.status != InvoiceStatus::Paid)
    }) {
        let invoice = &l.invoice;
        w.write_record([
            invoice.invoice_number.clone(),
            l.customer_name.clone(),
            l.customer_phone.clone(),
            invoice
                .created_on()
                .map(format_date)
                .unwrap_or_default(),
            invoice
                .effective_due_date()
                .map(format_date)
                .unwrap_or_default(),
            invoice.total.to_string(),
            invoice.amount_paid.to_string(),
            invoice.amount_due().to_string(),
            title_case(invoice.status.as_str()),
            days_overdue(invoice, today).to_string(),
        ])?;
    }
    finish(w)
}

pub async fn export_credit(db: &Db, query: &CreditQuery) -> AppResult<CsvExport> {
    let today = today();
    let mut conn = db.acquire().await?;
    let invoices = invoices::list(
        &mut conn,
        &InvoiceFilter {
            payment_type: Some(PaymentType::Credit),
            ..Default::default()
        },
    )
    .await?;
    Ok(CsvExport {
        file_name: format!("Credit_Overview_Report_{}.csv", format_date(today)),
        body: credit_csv(&invoices, query.include_paid, today)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::InvoiceItem;
    use crate::domain::Percent;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn listing(
        id: i64,
        created: &str,
        payment_type: PaymentType,
        status: InvoiceStatus,
        total: i64,
        paid: i64,
    ) -> InvoiceListing {
        InvoiceListing {
            invoice: Invoice {
                id,
                invoice_number: format!("INV-{id:08}"),
                customer_id: 1,
                created_by: None,
                created_at: format!("{created} 10:00:00"),
                updated_at: format!("{created} 10:00:00"),
                payment_type,
                status,
                subtotal: Money(total),
                discount_percentage: Percent(0),
                discount_amount: Money(0),
                tax_percentage: Percent(0),
                tax_amount: Money(0),
                total: Money(total),
                amount_paid: Money(paid),
                due_date: None,
                payment_due_date: None,
                notes: None,
            },
            customer_name: "Asha Stores".to_string(),
            customer_phone: "98450".to_string(),
            customer_type: CustomerType::Retail,
        }
    }

    fn customer(id: i64, name: &str, created: &str, customer_type: CustomerType) -> Customer {
        Customer {
            id,
            name: name.to_string(),
            phone: format!("9{id:09}"),
            email: None,
            address: None,
            customer_type,
            credit_limit: Money(0),
            created_at: format!("{created} 09:00:00"),
            updated_at: format!("{created} 09:00:00"),
        }
    }

    #[test]
    fn quick_filters() {
        let today = date("2024-01-17");
        assert_eq!(
            QuickFilter::LastMonth.range(today),
            (date("2023-12-01"), date("2023-12-31"))
        );
        assert_eq!(
            QuickFilter::LastMonth.range(date("2024-03-05")),
            (date("2024-02-01"), date("2024-02-29"))
        );
        // 2024-01-17 is a Wednesday.
        assert_eq!(
            QuickFilter::ThisWeek.range(today),
            (date("2024-01-15"), today)
        );
        assert_eq!(QuickFilter::Yesterday.range(today).0, date("2024-01-16"));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let today = date("2024-01-17");
        assert!(
            resolve_range(None, Some(today), Some(date("2024-01-01")), today, 30).is_err()
        );
        assert_eq!(
            resolve_range(None, None, None, today, 30).unwrap(),
            (date("2023-12-18"), today)
        );
    }

    #[test]
    fn grouping_by_week_and_month() {
        let invoices = vec![
            listing(1, "2024-01-15", PaymentType::Cash, InvoiceStatus::Paid, 1_000, 1_000),
            listing(2, "2024-01-16", PaymentType::Upi, InvoiceStatus::Paid, 2_000, 2_000),
            listing(3, "2024-02-01", PaymentType::Credit, InvoiceStatus::Overdue, 500, 0),
        ];
        let weeks = group_sales(&invoices, Grouping::Week);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].bills, 2);
        assert_eq!(weeks[0].cash_sale, Money(1_000));
        assert_eq!(weeks[0].upi_sale, Money(2_000));

        let months = group_sales(&invoices, Grouping::Month);
        assert_eq!(months[0].period, "January 2024");
        assert_eq!(months[1].period, "February 2024");
        assert_eq!(months[1].credit_sale, Money(500));

        let totals = sales_totals(&months);
        assert_eq!(totals.total_sales, Money(3_500));
        assert_eq!(totals.cash_percent, 29);
        assert_eq!(totals.upi_percent, 57);
        assert_eq!(totals.credit_percent, 14);
    }

    #[test]
    fn dashboard_growth_and_series() {
        let today = date("2024-03-10");
        let invoices = vec![
            listing(1, "2024-03-09", PaymentType::Cash, InvoiceStatus::Paid, 15_000, 15_000),
            listing(2, "2024-02-20", PaymentType::Credit, InvoiceStatus::PendingPayment, 10_000, 2_500),
            listing(3, "2024-03-10", PaymentType::Upi, InvoiceStatus::PendingPayment, 5_000, 0),
        ];
        let customers = vec![
            customer(1, "A", "2024-01-05", CustomerType::Retail),
            customer(2, "B", "2024-03-02", CustomerType::Wholesale),
        ];
        let d = build_dashboard(today, &invoices, &customers);
        assert_eq!(d.month_sales, Money(20_000));
        assert_eq!(d.sales_growth, 100);
        assert_eq!(d.pending_payments, Money(12_500));
        // 125.00 now against 75.00 outstanding from before March.
        assert_eq!(d.pending_growth, 67);
        assert_eq!(d.customer_growth, 100);
        assert_eq!(d.sales_series.len(), 8);
        assert_eq!(d.sales_series[0].date, date("2024-03-03"));
        assert_eq!(d.sales_series[7].total, Money(5_000));
        assert_eq!(d.sales_series[6].total, Money(15_000));
        assert_eq!(d.table_data.len(), 2);
        assert_eq!(d.total_bills, 3);
        assert!((d.payment_percentages.credit - 33.3).abs() < f64::EPSILON);
        assert_eq!(d.customer_types.len(), 2);
    }

    #[test]
    fn credit_rows_derive_status() {
        let today = date("2024-03-10");
        let mut late = listing(1, "2024-02-01", PaymentType::Credit, InvoiceStatus::Overdue, 1_000, 0);
        late.invoice.payment_due_date = Some("2024-03-01".to_string());
        let mut partial =
            listing(2, "2024-02-05", PaymentType::Credit, InvoiceStatus::PartiallyPaid, 1_000, 400);
        partial.invoice.due_date = Some("2024-04-01".to_string());
        let paid = listing(3, "2024-02-06", PaymentType::Cash, InvoiceStatus::Paid, 800, 800);
        let open = listing(4, "2024-02-07", PaymentType::Upi, InvoiceStatus::PendingPayment, 300, 0);

        let invoices = vec![late, partial, paid, open];
        let rows = credit_rows(&invoices, false, today, CreditSort::DueDate);
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.invoice_id, r.status, r.days_overdue))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, CreditStatus::Overdue, 9),
                (2, CreditStatus::PartiallyPaid, 0),
                (4, CreditStatus::Pending, 0),
            ]
        );

        let with_paid = credit_rows(&invoices, true, today, CreditSort::Amount);
        assert_eq!(with_paid.len(), 3);
        assert_eq!(with_paid[0].invoice_id, 1);
        assert!(with_paid.iter().all(|r| r.invoice_id != 3));
    }

    fn sold(product: &str, quality: Quality, grams: i64, price: i64) -> InvoiceItemListing {
        InvoiceItemListing {
            item: InvoiceItem {
                id: 0,
                invoice_id: 1,
                product_id: 1,
                product_quality_id: 1,
                quantity: Quantity(grams),
                unit_price: Money(price),
                discount_percentage: Percent(1_000),
                discount_amount: Money(0),
                subtotal: Money(0),
            },
            product_name: product.to_string(),
            quality,
        }
    }

    #[test]
    fn product_rows_sum_undiscounted_revenue() {
        let items = vec![
            sold("Almonds", Quality::Premium, 1_500, 100_000),
            sold("Almonds", Quality::Premium, 500, 100_000),
            sold("Cashew", Quality::Standard, 3_000, 80_000),
            sold("Almonds", Quality::Economy, 250, 60_000),
        ];
        let rows = product_rows(&items, None, None, None, ProductSort::Revenue);
        assert_eq!(rows[0].product, "Cashew");
        assert_eq!(rows[0].revenue, Money(240_000));
        assert_eq!(rows[1].quantity_sold, Quantity(2_000));
        assert_eq!(rows[1].revenue, Money(200_000));

        let filtered = product_rows(
            &items,
            Some("alm"),
            Some(Quality::Premium),
            Some(Quantity(1_000)),
            ProductSort::Quantity,
        );
        assert_eq!(filtered.len(), 1);
        assert!(product_rows(&items, None, None, Some(Quantity(5_000)), ProductSort::Name).is_empty());
    }

    #[test]
    fn customer_rows_skip_inactive_unless_asked() {
        let customers = vec![
            customer(1, "Asha Stores", "2024-01-01", CustomerType::Retail),
            customer(2, "Bharat Traders", "2024-01-01", CustomerType::Wholesale),
        ];
        let invoices = vec![
            listing(1, "2024-02-01", PaymentType::Credit, InvoiceStatus::PartiallyPaid, 5_000, 1_000),
            listing(2, "2024-02-03", PaymentType::Cash, InvoiceStatus::Paid, 2_000, 2_000),
            listing(3, "2024-02-04", PaymentType::Cash, InvoiceStatus::Draft, 9_000, 0),
        ];
        let rows = customer_rows(&customers, &invoices, None, false, CustomerSort::Purchases);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_orders, 2);
        assert_eq!(rows[0].total_value, Money(7_000));
        assert_eq!(rows[0].pending_payment, Money(4_000));
        assert_eq!(rows[0].last_purchase.as_deref(), Some("2024-02-03 10:00:00"));

        let all = customer_rows(&customers, &invoices, None, true, CustomerSort::LastPurchase);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name, "Bharat Traders");

        let wholesale = customer_rows(
            &customers,
            &invoices,
            Some(CustomerType::Wholesale),
            true,
            CustomerSort::Name,
        );
        assert_eq!(wholesale.len(), 1);
        assert_eq!(wholesale[0].total_orders, 0);
    }

    #[test]
    fn sales_csv_has_total_row() {
        let rows = vec![PeriodSales {
            period: "2024-01-15".to_string(),
            bills: 2,
            total_sale: Money(3_000),
            cash_sale: Money(1_000),
            upi_sale: Money(2_000),
            credit_sale: Money(0),
        }];
        let text = String::from_utf8(sales_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,Bills Generated,Total Sale,Cash,UPI/Card,Credit");
        assert_eq!(lines[1], "2024-01-15,2,30.00,10.00,20.00,0.00");
        assert_eq!(lines[2], "Total,2,30.00,10.00,20.00,0.00");
    }

    #[test]
    fn blank_and_all_choices_mean_no_filter() {
        assert_eq!(choice::<PaymentType>(Some("all")).unwrap(), None);
        assert_eq!(choice::<PaymentType>(Some(" ")).unwrap(), None);
        assert_eq!(
            choice::<PaymentType>(Some("upi")).unwrap(),
            Some(PaymentType::Upi)
        );
        assert!(choice::<PaymentType>(Some("barter")).is_err());
    }
}
