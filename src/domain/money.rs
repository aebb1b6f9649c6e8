//! Fixed-point quantities used throughout the ledger.
//!
//! - [`Money`]: rupees with two decimals, stored as paise.
//! - [`Quantity`]: weight in kilograms with three decimals, stored as grams.
//! - [`Percent`]: percentage with two decimals, stored as basis points.
//!
//! All three serialize as decimal strings (`"12.50"`, `"1.250"`, `"18.00"`) and accept
//! either strings or JSON numbers on input.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Stored values carry at most ten significant digits, fraction included.
pub const MAX_DIGITS: u32 = 10;

/// Exclusive bound on the magnitude of a scaled value.
const LIMIT: i64 = 10_i64.pow(MAX_DIGITS);

fn within_limit(value: i64) -> Option<i64> {
    (value.unsigned_abs() < LIMIT.unsigned_abs()).then_some(value)
}

/// Parses a decimal string into an integer scaled by `10^scale`.
///
/// Extra fractional digits are rounded half away from zero. Accepts an optional sign,
/// surrounding whitespace and `,` thousands separators. Values of more than
/// [`MAX_DIGITS`] digits are rejected.
fn parse_fixed(input: &str, scale: u32) -> Option<i64> {
    let s: String = input.trim().chars().filter(|c| *c != ',').collect();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(&s)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let factor = 10_i128.pow(scale);
    let mut value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<i128>().ok()?
    };
    value = value.checked_mul(factor)?;

    let frac_digits: Vec<u32> = frac_part.chars().filter_map(|c| c.to_digit(10)).collect();
    let mut frac: i128 = 0;
    for i in 0..scale as usize {
        frac = frac * 10 + i128::from(frac_digits.get(i).copied().unwrap_or(0));
    }
    if frac_digits.get(scale as usize).is_some_and(|d| *d >= 5) {
        frac += 1;
    }
    value += frac;
    if negative {
        value = -value;
    }
    i64::try_from(value).ok().and_then(within_limit)
}

fn format_fixed(f: &mut fmt::Formatter<'_>, value: i64, scale: u32) -> fmt::Result {
    let factor = 10_i64.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let factor = factor.unsigned_abs();
    write!(
        f,
        "{sign}{}.{:0width$}",
        abs / factor,
        abs % factor,
        width = scale as usize
    )
}

/// `numerator / denominator` rounded half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i64 {
    let q = numerator / denominator;
    let r = numerator % denominator;
    let adjust = if r.abs() * 2 >= denominator.abs() {
        if (numerator < 0) == (denominator < 0) { 1 } else { -1 }
    } else {
        0
    };
    i64::try_from(q + adjust).unwrap_or(if q > 0 { i64::MAX } else { i64::MIN })
}

macro_rules! fixed_point {
    ($name:ident, $scale:expr, $what:literal) => {
        impl $name {
            pub const SCALE: u32 = $scale;

            /// Parses a decimal string such as `"12.5"`.
            pub fn parse(s: &str) -> Option<Self> {
                parse_fixed(s, $scale).map(Self)
            }

            /// Lossy conversion from a float, rounding to the nearest unit.
            pub fn from_f64(v: f64) -> Option<Self> {
                if !v.is_finite() {
                    return None;
                }
                let scaled = (v * 10_f64.powi($scale)).round();
                if scaled.abs() >= LIMIT as f64 {
                    return None;
                }
                Some(Self(scaled as i64))
            }

            /// Largest value accepted on input.
            pub const MAX: Self = Self(LIMIT - 1);

            /// Whether the value still fits in [`MAX_DIGITS`] digits.
            pub fn in_range(self) -> bool {
                within_limit(self.0).is_some()
            }

            pub fn to_f64(self) -> f64 {
                self.0 as f64 / 10_f64.powi($scale)
            }

            pub fn is_zero(self) -> bool {
                self.0 == 0
            }

            pub fn is_negative(self) -> bool {
                self.0 < 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                format_fixed(f, self.0, $scale)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| format!("invalid {}: {s:?}", $what))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match serde_json::Value::deserialize(deserializer)? {
                    serde_json::Value::String(s) => s.parse().map_err(de::Error::custom),
                    serde_json::Value::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            i.checked_mul(10_i64.pow($scale))
                                .and_then(within_limit)
                                .map(Self)
                                .ok_or_else(|| de::Error::custom(concat!($what, " out of range")))
                        } else {
                            n.as_f64()
                                .and_then(Self::from_f64)
                                .ok_or_else(|| de::Error::custom(concat!("invalid ", $what)))
                        }
                    }
                    _ => Err(de::Error::custom(concat!(
                        "expected a string or a number for ",
                        $what
                    ))),
                }
            }
        }
    };
}

/// Amount in rupees, held as paise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(pub i64);

/// Weight in kilograms, held as grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(pub i64);

/// Percentage, held as basis points (`18.00%` is `1800`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(pub i64);

fixed_point!(Money, 2, "amount");
fixed_point!(Quantity, 3, "quantity");
fixed_point!(Percent, 2, "percentage");

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn paise(self) -> i64 {
        self.0
    }

    /// Price per kilogram applied to a weight.
    pub fn times_quantity(self, qty: Quantity) -> Money {
        Money(div_round(i128::from(self.0) * i128::from(qty.0), 1000))
    }

    /// `self * pct / 100`.
    pub fn percent(self, pct: Percent) -> Money {
        Money(div_round(i128::from(self.0) * i128::from(pct.0), 10_000))
    }

    /// Clamps negative amounts to zero.
    pub fn non_negative(self) -> Money {
        Money(self.0.max(0))
    }

    /// Share of `self` in `total` as a percentage rounded to `decimals` places.
    pub fn share_of(self, total: Money, decimals: i32) -> f64 {
        if total.0 == 0 {
            return 0.0;
        }
        let factor = 10_f64.powi(decimals);
        (self.0 as f64 / total.0 as f64 * 100.0 * factor).round() / factor
    }
}

impl Quantity {
    pub fn grams(self) -> i64 {
        self.0
    }

    pub fn from_grams(grams: i64) -> Self {
        Quantity(grams)
    }
}

impl Percent {
    pub fn from_whole(pct: i64) -> Self {
        Percent(pct * 100)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.fold(0_i64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        Money(iter.fold(0_i64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        Quantity(iter.fold(0_i64, |acc, q| acc.saturating_add(q.0)))
    }
}

/// Growth of `current` over `previous` in whole percent.
///
/// `previous == 0` yields 100 when there is any current value and 0 otherwise.
pub fn growth_percent(current: i64, previous: i64) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    ((current - previous) as f64 / previous as f64 * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_money() {
        assert_eq!(Money::parse("12.5"), Some(Money(1250)));
        assert_eq!(Money::parse("1,234.56"), Some(Money(123_456)));
        assert_eq!(Money::parse("0.005"), Some(Money(1)));
        assert_eq!(Money::parse("-3"), Some(Money(-300)));
        assert_eq!(Money::parse(".75"), Some(Money(75)));
        assert_eq!(Money::parse("abc"), None);
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money(1250).to_string(), "12.50");
        assert_eq!(Money(-5).to_string(), "-0.05");
    }

    #[test]
    fn quantity_is_kilograms_with_three_decimals() {
        assert_eq!(Quantity::parse("2.5"), Some(Quantity(2500)));
        assert_eq!(Quantity(250).to_string(), "0.250");
    }

    #[test]
    fn price_times_weight_rounds_half_up() {
        // 1200.00/kg * 0.250 kg = 300.00
        assert_eq!(Money(120_000).times_quantity(Quantity(250)), Money(30_000));
        // 10.01/kg * 0.5 kg = 5.005 -> 5.01
        assert_eq!(Money(1001).times_quantity(Quantity(500)), Money(501));
    }

    #[test]
    fn percent_of_amount() {
        assert_eq!(Money(100_000).percent(Percent(1800)), Money(18_000));
        assert_eq!(Money(999).percent(Percent(500)), Money(50));
    }

    #[test]
    fn serde_accepts_numbers_and_strings() {
        let m: Money = serde_json::from_str("\"99.99\"").unwrap();
        assert_eq!(m, Money(9999));
        let m: Money = serde_json::from_str("5").unwrap();
        assert_eq!(m, Money(500));
        let m: Money = serde_json::from_str("2.75").unwrap();
        assert_eq!(m, Money(275));
        assert_eq!(serde_json::to_string(&Money(500)).unwrap(), "\"5.00\"");
    }

    #[test]
    fn values_are_bounded_to_ten_digits() {
        assert_eq!(Money::parse("99999999.99"), Some(Money::MAX));
        assert_eq!(Money::parse("100000000"), None);
        assert_eq!(Quantity::parse("9000000000000000"), None);
        assert_eq!(Quantity::parse("9999999.999"), Some(Quantity::MAX));
        assert!(serde_json::from_str::<Quantity>("9000000000000000").is_err());
        assert!(serde_json::from_str::<Money>("1e12").is_err());
        assert!(!(Quantity::MAX + Quantity(1)).in_range());
    }

    #[test]
    fn arithmetic_saturates_instead_of_overflowing() {
        assert_eq!(Money(i64::MAX) + Money(1), Money(i64::MAX));
        assert_eq!(Money(i64::MIN) - Money(1), Money(i64::MIN));
        let mut q = Quantity(i64::MAX);
        q += Quantity(5);
        assert_eq!(q, Quantity(i64::MAX));
        let total: Money = [Money(i64::MAX), Money(1)].into_iter().sum();
        assert_eq!(total, Money(i64::MAX));
    }

    #[test]
    fn growth_rules() {
        assert_eq!(growth_percent(150, 100), 50);
        assert_eq!(growth_percent(50, 100), -50);
        assert_eq!(growth_percent(10, 0), 100);
        assert_eq!(growth_percent(0, 0), 0);
    }
}
