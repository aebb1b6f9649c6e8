//! Value types shared by storage, services and HTTP handlers.

mod enums;
mod money;

pub use enums::{
    CustomerType, InvoiceStatus, PaymentMethod, PaymentStatus, PaymentType, PriceTier, Quality,
    ReminderStatus, ReminderType, Role,
};
pub use money::{Money, Percent, Quantity, growth_percent};

use chrono::{NaiveDate, NaiveDateTime, Utc};

/// Storage format for timestamps (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn parse_ts(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// Current UTC time in storage format.
pub fn now_text() -> String {
    format_ts(now_utc())
}

/// Inclusive lower bound for a `created_at` column on `date`.
pub fn day_start(date: NaiveDate) -> String {
    format!("{} 00:00:00", format_date(date))
}

/// Exclusive upper bound for a `created_at` column ending on `date` (inclusive).
pub fn day_end_exclusive(date: NaiveDate) -> String {
    day_start(date.succ_opt().unwrap_or(date))
}
