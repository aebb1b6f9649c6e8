use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a string-backed enum stored as lowercase text in the database.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($name), " {:?}"),
                        other
                    )),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

text_enum! {
    pub enum Role {
        Admin => "admin",
        Executive => "executive",
    }
}

text_enum! {
    pub enum CustomerType {
        Retail => "retail",
        Wholesale => "wholesale",
        Distributor => "distributor",
    }
}

text_enum! {
    pub enum Quality {
        Premium => "premium",
        Standard => "standard",
        Economy => "economy",
    }
}

text_enum! {
    pub enum PaymentType {
        Cash => "cash",
        Upi => "upi",
        Credit => "credit",
    }
}

text_enum! {
    pub enum InvoiceStatus {
        Draft => "draft",
        PendingPayment => "pending_payment",
        Issued => "issued",
        Paid => "paid",
        PartiallyPaid => "partially_paid",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Upi => "upi",
        BankTransfer => "bank_transfer",
        Cheque => "cheque",
    }
}

text_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum ReminderType {
        Email => "email",
        Sms => "sms",
        Whatsapp => "whatsapp",
        Call => "call",
    }
}

text_enum! {
    pub enum ReminderStatus {
        Pending => "pending",
        Sent => "sent",
        Failed => "failed",
    }
}

text_enum! {
    /// Price tier requested by the billing screen.
    pub enum PriceTier {
        Retail => "retail",
        Wholesale => "wholesale",
        Broker => "broker",
    }
}

impl PriceTier {
    /// Unknown tiers fall back to retail pricing.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(PriceTier::Retail)
    }
}

impl InvoiceStatus {
    /// Statuses whose balance counts towards a customer's credit exposure.
    pub const CREDIT_EXPOSURE: &'static [InvoiceStatus] =
        &[InvoiceStatus::PendingPayment, InvoiceStatus::Overdue];

    /// Issued invoices that still expect money.
    pub const OPEN: &'static [InvoiceStatus] = &[
        InvoiceStatus::PendingPayment,
        InvoiceStatus::Issued,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Overdue,
    ];

    /// Statuses still awaiting money.
    pub fn is_open(self) -> bool {
        !matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled | InvoiceStatus::Draft
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        for status in InvoiceStatus::ALL {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), *status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
        assert_eq!(" UPI ".parse::<PaymentType>().unwrap(), PaymentType::Upi);
        assert!("gold".parse::<Quality>().is_err());
    }

    #[test]
    fn unknown_price_tier_is_retail() {
        assert_eq!(PriceTier::parse_lenient("broker"), PriceTier::Broker);
        assert_eq!(PriceTier::parse_lenient("vip"), PriceTier::Retail);
    }
}
