use crate::config::DEFAULT_LOCK_TABLE_CAPACITY;
use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::limit::{CustomerLimit, LimitKey};
use crate::domain::ports::{
    CustomerStore, LimitStore, LimitUpdate, Page, Stores, TransactionStore,
};
use crate::domain::transaction::{StatusChange, StatusChangeOutcome, Transaction};
use crate::error::{Entity, FieldError, LendingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for customers, keyed by big-endian id.
pub const CF_CUSTOMERS: &str = "customers";
/// Column Family mapping NIK to customer id.
pub const CF_CUSTOMER_NIKS: &str = "customer_niks";
/// Column Family for limit rows, keyed by `LimitKey::to_bytes`.
pub const CF_LIMITS: &str = "limits";
/// Column Family for transactions, keyed by big-endian id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family mapping contract number to transaction id.
pub const CF_CONTRACTS: &str = "contracts";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const CUSTOMER_SEQUENCE: &[u8] = b"customer_seq";
const TRANSACTION_SEQUENCE: &[u8] = b"transaction_seq";

/// A persistent store implementation using RocksDB.
///
/// Implements all three storage ports over separate Column Families. Writes
/// that must check uniqueness or allocate ids are serialized by `write_lock`
/// and land in one `WriteBatch`. Limit rows are additionally guarded by
/// per-row async locks for [`LimitStore::update_locked`]. Once that table
/// reaches its capacity, handles nobody holds are dropped.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
    row_locks: Arc<DashMap<LimitKey, Arc<Mutex<()>>>>,
    lock_table_capacity: usize,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_CUSTOMERS,
            CF_CUSTOMER_NIKS,
            CF_LIMITS,
            CF_TRANSACTIONS,
            CF_CONTRACTS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            row_locks: Arc::new(DashMap::new()),
            lock_table_capacity: DEFAULT_LOCK_TABLE_CAPACITY,
        })
    }

    pub fn with_lock_table_capacity(mut self, capacity: usize) -> Self {
        self.lock_table_capacity = capacity;
        self
    }

    /// All three ports backed by this database.
    pub fn into_stores(self) -> Stores {
        Stores {
            customers: Arc::new(self.clone()),
            limits: Arc::new(self.clone()),
            transactions: Arc::new(self),
        }
    }

    fn handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LendingError::StorageFailure(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.handle(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.handle(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.handle(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn index_lookup(&self, cf: &str, key: &[u8]) -> Result<Option<u64>> {
        match self.db.get_cf(self.handle(cf)?, key)? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the sequence and stages its increment in `batch`.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &[u8]) -> Result<u64> {
        let current = self.index_lookup(CF_META, sequence)?.unwrap_or(0);
        let next = current + 1;
        batch.put_cf(self.handle(CF_META)?, sequence, next.to_be_bytes());
        Ok(next)
    }

    fn row_lock(&self, key: LimitKey) -> Arc<Mutex<()>> {
        if self.row_locks.len() >= self.lock_table_capacity {
            self.row_locks
                .retain(|_, handle| Arc::strong_count(handle) > 1);
        }
        self.row_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LendingError::StorageFailure("corrupt id encoding".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

#[async_trait]
impl CustomerStore for RocksDBStore {
    async fn create(&self, profile: CustomerProfile, now: DateTime<Utc>) -> Result<Customer> {
        let _write = self.write_lock.lock().await;
        if self
            .index_lookup(CF_CUSTOMER_NIKS, profile.nik.as_bytes())?
            .is_some()
        {
            return Err(FieldError::DuplicateNik(profile.nik).into());
        }

        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, CUSTOMER_SEQUENCE)?;
        let customer = Customer::new(id, profile, now);
        self.put_json(&mut batch, CF_CUSTOMERS, &id.to_be_bytes(), &customer)?;
        batch.put_cf(
            self.handle(CF_CUSTOMER_NIKS)?,
            customer.profile.nik.as_bytes(),
            id.to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(customer)
    }

    async fn get(&self, id: u64) -> Result<Option<Customer>> {
        self.get_json(CF_CUSTOMERS, &id.to_be_bytes())
    }

    async fn get_by_nik(&self, nik: &str) -> Result<Option<Customer>> {
        match self.index_lookup(CF_CUSTOMER_NIKS, nik.as_bytes())? {
            Some(id) => self.get_json(CF_CUSTOMERS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn list(&self, page: Page) -> Result<Vec<Customer>> {
        let customers: Vec<Customer> = self.scan_json(CF_CUSTOMERS)?;
        Ok(customers
            .into_iter()
            .filter(|c| !c.is_deleted())
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    async fn update(&self, customer: Customer) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let key = customer.id.to_be_bytes();
        match self.get_json::<Customer>(CF_CUSTOMERS, &key)? {
            Some(existing) if existing.is_deleted() => {
                Err(LendingError::NotFound(Entity::Customer(customer.id)))
            }
            Some(existing) if existing.profile.nik == customer.profile.nik => {
                let mut batch = WriteBatch::default();
                self.put_json(&mut batch, CF_CUSTOMERS, &key, &customer)?;
                self.db.write(batch)?;
                Ok(())
            }
            Some(_) => Err(LendingError::StorageFailure(format!(
                "NIK of customer {} cannot change",
                customer.id
            ))),
            None => Err(LendingError::StorageFailure(format!(
                "customer {} does not exist",
                customer.id
            ))),
        }
    }
}

#[async_trait]
impl LimitStore for RocksDBStore {
    async fn insert_all(&self, limits: Vec<CustomerLimit>) -> Result<()> {
        let _write = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        for limit in &limits {
            let key = limit.key().to_bytes();
            if self.db.get_pinned_cf(self.handle(CF_LIMITS)?, key)?.is_some() {
                return Err(LendingError::StorageFailure(format!(
                    "limit for customer {} tenor {} already exists",
                    limit.customer_id, limit.tenor
                )));
            }
            self.put_json(&mut batch, CF_LIMITS, &key, limit)?;
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, key: LimitKey) -> Result<Option<CustomerLimit>> {
        self.get_json(CF_LIMITS, &key.to_bytes())
    }

    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<CustomerLimit>> {
        let prefix = customer_id.to_be_bytes();
        let mut limits = Vec::new();
        for item in self.db.prefix_iterator_cf(self.handle(CF_LIMITS)?, prefix) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            limits.push(serde_json::from_slice(&value)?);
        }
        Ok(limits)
    }

    async fn all(&self) -> Result<Vec<CustomerLimit>> {
        self.scan_json(CF_LIMITS)
    }

    async fn update_locked(
        &self,
        key: LimitKey,
        update: LimitUpdate,
    ) -> Result<Option<CustomerLimit>> {
        let _row = self.row_lock(key).lock_owned().await;
        let raw_key = key.to_bytes();
        let Some(current) = self.get_json::<CustomerLimit>(CF_LIMITS, &raw_key)? else {
            return Ok(None);
        };
        let updated = update(&current)?;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_LIMITS, &raw_key, &updated)?;
        self.db.write(batch)?;
        Ok(Some(updated))
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn create(&self, mut tx: Transaction) -> Result<Transaction> {
        let _write = self.write_lock.lock().await;
        if self
            .index_lookup(CF_CONTRACTS, tx.contract_number.as_bytes())?
            .is_some()
        {
            return Err(LendingError::DuplicateContractNumber(tx.contract_number));
        }

        let mut batch = WriteBatch::default();
        tx.id = self.next_id(&mut batch, TRANSACTION_SEQUENCE)?;
        self.put_json(&mut batch, CF_TRANSACTIONS, &tx.id.to_be_bytes(), &tx)?;
        batch.put_cf(
            self.handle(CF_CONTRACTS)?,
            tx.contract_number.as_bytes(),
            tx.id.to_be_bytes(),
        );
        self.db.write(batch)?;
        Ok(tx)
    }

    async fn get(&self, id: u64) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())
    }

    async fn get_by_contract_number(&self, contract_number: &str) -> Result<Option<Transaction>> {
        match self.index_lookup(CF_CONTRACTS, contract_number.as_bytes())? {
            Some(id) => self.get_json(CF_TRANSACTIONS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan_json(CF_TRANSACTIONS)?;
        Ok(transactions
            .into_iter()
            .filter(|tx| tx.customer_id == customer_id)
            .collect())
    }

    async fn list(&self, page: Page) -> Result<Vec<Transaction>> {
        let transactions: Vec<Transaction> = self.scan_json(CF_TRANSACTIONS)?;
        Ok(transactions
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    async fn compare_and_set_status(&self, change: StatusChange) -> Result<StatusChangeOutcome> {
        let _write = self.write_lock.lock().await;
        let key = change.id.to_be_bytes();
        let Some(mut tx) = self.get_json::<Transaction>(CF_TRANSACTIONS, &key)? else {
            return Ok(StatusChangeOutcome::Missing);
        };
        if tx.status != change.from {
            return Ok(StatusChangeOutcome::Conflict(tx.status));
        }
        tx.status = change.to;
        tx.status_reason = change.reason;
        tx.updated_at = change.at;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_TRANSACTIONS, &key, &tx)?;
        self.db.write(batch)?;
        Ok(StatusChangeOutcome::Applied(tx))
    }
}
