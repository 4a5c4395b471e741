use super::customer::{Customer, CustomerProfile};
use super::limit::{CustomerLimit, LimitKey};
use super::transaction::{StatusChange, StatusChangeOutcome, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Offset pagination, ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Assigns the next id and persists the customer. Fails with
    /// `FieldError::DuplicateNik` if any customer, tombstoned or not, holds
    /// the same NIK.
    async fn create(&self, profile: CustomerProfile, now: DateTime<Utc>) -> Result<Customer>;
    /// Returns tombstoned rows too; callers decide visibility.
    async fn get(&self, id: u64) -> Result<Option<Customer>>;
    async fn get_by_nik(&self, nik: &str) -> Result<Option<Customer>>;
    /// Live (not tombstoned) customers only.
    async fn list(&self, page: Page) -> Result<Vec<Customer>>;
    /// Overwrites a live row. A tombstoned row is final: writing over it fails
    /// with `NotFound`, so a stale read can never undo a delete.
    async fn update(&self, customer: Customer) -> Result<()>;
}

/// Closure run under the row lock of a limit. Returning `Err` aborts the unit
/// of work without writing; `Ok(row)` is persisted before the lock is released.
pub type LimitUpdate = Box<dyn FnOnce(&CustomerLimit) -> Result<CustomerLimit> + Send>;

#[async_trait]
pub trait LimitStore: Send + Sync {
    /// Inserts all rows or none. Fails if any `(customer, tenor)` already exists.
    async fn insert_all(&self, limits: Vec<CustomerLimit>) -> Result<()>;
    /// Unlocked snapshot.
    async fn get(&self, key: LimitKey) -> Result<Option<CustomerLimit>>;
    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<CustomerLimit>>;
    async fn all(&self) -> Result<Vec<CustomerLimit>>;
    /// Locked read-modify-write of one row. `Ok(None)` when the row does not
    /// exist. Updates on the same key never interleave; different keys do not
    /// block each other.
    async fn update_locked(&self, key: LimitKey, update: LimitUpdate)
    -> Result<Option<CustomerLimit>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Assigns the next id (the incoming `id` is ignored) and persists the
    /// transaction. Fails with `LendingError::DuplicateContractNumber` if the
    /// contract number is taken.
    async fn create(&self, tx: Transaction) -> Result<Transaction>;
    async fn get(&self, id: u64) -> Result<Option<Transaction>>;
    async fn get_by_contract_number(&self, contract_number: &str) -> Result<Option<Transaction>>;
    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<Transaction>>;
    async fn list(&self, page: Page) -> Result<Vec<Transaction>>;
    async fn compare_and_set_status(&self, change: StatusChange) -> Result<StatusChangeOutcome>;
}

pub type CustomerStoreRef = Arc<dyn CustomerStore>;
pub type LimitStoreRef = Arc<dyn LimitStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;

/// The three stores backing one deployment.
#[derive(Clone)]
pub struct Stores {
    pub customers: CustomerStoreRef,
    pub limits: LimitStoreRef,
    pub transactions: TransactionStoreRef,
}
