//! Credit-limit core for an installment lending service.
//!
//! Customers are onboarded with one credit limit per tenor (1 to 4 months).
//! Transactions reserve their OTR amount against the limit of their tenor and
//! release it again when rejected. The [`application::ledger::LimitLedger`]
//! keeps `0 <= used <= limit` for every row, also under concurrent creation.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::service::LendingService;
pub use config::LendingConfig;
pub use error::{LendingError, Result};
