//! Application layer: the limit ledger, the transaction lifecycle, customer
//! onboarding and the admission guard, wired together by `LendingService`.
//!
//! Components depend only on the storage ports in `domain::ports`. Creation
//! requests pass through the guard, then the lifecycle, which reserves on the
//! ledger before persisting.

pub mod contract;
pub mod guard;
pub mod ledger;
pub mod lifecycle;
pub mod onboarding;
pub mod service;
