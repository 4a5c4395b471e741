use crate::domain::money::Money;
use crate::domain::transaction::TransactionStatus;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LendingError>;

/// Tenor-set rules applied when a customer is onboarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenorPolicyError {
    #[error("invalid tenor {0} months, only 1, 2, 3, 4 months allowed")]
    InvalidTenor(u32),
    #[error("incomplete tenors provided ({provided} given), missing {missing:?}; all of 1, 2, 3, 4 are required")]
    IncompleteSet { provided: usize, missing: Vec<u32> },
    #[error("duplicate tenor {0}, each of 1, 2, 3, 4 must appear exactly once")]
    DuplicateTenor(u32),
    #[error("limit amount must be greater than 0 for tenor {tenor} months")]
    NonPositiveAmount { tenor: u32 },
}

/// Field-level rules for customer and transaction input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("NIK must be exactly 16 digits")]
    InvalidNik,
    #[error("customer with NIK {0} already exists")]
    DuplicateNik(String),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("invalid asset type {0}, allowed: WHITE_GOODS, MOTOR, MOBIL")]
    AssetType(String),
    #[error("invalid transaction source {0}, allowed: ECOMMERCE, WEB, DEALER")]
    Source(String),
    #[error("invalid transaction status {0}")]
    Status(String),
    #[error("{0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Tenor(#[from] TenorPolicyError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    #[error("customer {0}")]
    Customer(u64),
    #[error("customer limit for customer {customer_id}, tenor {tenor} months")]
    Limit { customer_id: u64, tenor: u32 },
    #[error("transaction {0}")]
    Transaction(u64),
}

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("not found: {0}")]
    NotFound(Entity),
    #[error("insufficient credit limit: requested {requested}, available {available}")]
    InsufficientLimit { requested: Money, available: Money },
    #[error("invalid status transition from {from} to {to}")]
    InvalidStateTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("no admission slot within {0:?}")]
    ConcurrencyTimeout(Duration),
    #[error("operation did not finish within {0:?}")]
    OperationTimeout(Duration),
    #[error("duplicate contract number {0}")]
    DuplicateContractNumber(String),
    #[error("storage failure: {0}")]
    StorageFailure(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl From<TenorPolicyError> for LendingError {
    fn from(err: TenorPolicyError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<FieldError> for LendingError {
    fn from(err: FieldError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<serde_json::Error> for LendingError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageFailure(format!("serialization error: {err}"))
    }
}
