//! Business operations composed from the `db` query modules.
//!
//! Handlers stay thin: they extract and authorize, then call into here.
//! Multi-row writes open their own transaction on the shared [`crate::db::Db`].

pub mod billing;
pub mod catalog;
pub mod customers;
pub mod invoice_print;
pub mod overdue_sweeper;
pub mod payments;
pub mod price_list;
pub mod reports;
pub mod users;
