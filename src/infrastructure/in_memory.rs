use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::limit::{CustomerLimit, LimitKey};
use crate::domain::ports::{
    CustomerStore, LimitStore, LimitUpdate, Page, Stores, TransactionStore,
};
use crate::domain::transaction::{StatusChange, StatusChangeOutcome, Transaction};
use crate::error::{Entity, FieldError, LendingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

impl Stores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            customers: Arc::new(InMemoryCustomerStore::new()),
            limits: Arc::new(InMemoryLimitStore::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
        }
    }
}

#[derive(Default)]
struct CustomerTable {
    last_id: u64,
    by_id: BTreeMap<u64, Customer>,
    by_nik: HashMap<String, u64>,
}

/// A thread-safe in-memory store for customers.
///
/// NIK uniqueness is checked and the id assigned under one write lock.
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    table: Arc<RwLock<CustomerTable>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn create(&self, profile: CustomerProfile, now: DateTime<Utc>) -> Result<Customer> {
        let mut table = self.table.write().await;
        if table.by_nik.contains_key(&profile.nik) {
            return Err(FieldError::DuplicateNik(profile.nik).into());
        }
        table.last_id += 1;
        let customer = Customer::new(table.last_id, profile, now);
        table.by_nik.insert(customer.profile.nik.clone(), customer.id);
        table.by_id.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get(&self, id: u64) -> Result<Option<Customer>> {
        let table = self.table.read().await;
        Ok(table.by_id.get(&id).cloned())
    }

    async fn get_by_nik(&self, nik: &str) -> Result<Option<Customer>> {
        let table = self.table.read().await;
        Ok(table
            .by_nik
            .get(nik)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn list(&self, page: Page) -> Result<Vec<Customer>> {
        let table = self.table.read().await;
        Ok(table
            .by_id
            .values()
            .filter(|c| !c.is_deleted())
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn update(&self, customer: Customer) -> Result<()> {
        let mut table = self.table.write().await;
        match table.by_id.get_mut(&customer.id) {
            Some(existing) if existing.is_deleted() => {
                Err(LendingError::NotFound(Entity::Customer(customer.id)))
            }
            Some(existing) if existing.profile.nik == customer.profile.nik => {
                *existing = customer;
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

/// A thread-safe in-memory store for customer limits.
///
/// Each row sits behind its own `Mutex`, which is the row lock for
/// [`LimitStore::update_locked`]. The outer map lock is only held to find or
/// insert rows, never across an update.
#[derive(Default, Clone)]
pub struct InMemoryLimitStore {
    rows: Arc<RwLock<HashMap<LimitKey, Arc<Mutex<CustomerLimit>>>>>,
}

impl InMemoryLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, key: LimitKey) -> Option<Arc<Mutex<CustomerLimit>>> {
        let rows = self.rows.read().await;
        rows.get(&key).cloned()
    }

    async fn snapshot<F>(&self, filter: F) -> Vec<CustomerLimit>
    where
        F: Fn(&LimitKey) -> bool,
    {
        let handles: Vec<_> = {
            let rows = self.rows.read().await;
            rows.iter()
                .filter(|(key, _)| filter(key))
                .map(|(_, row)| row.clone())
                .collect()
        };
        let mut limits = Vec::with_capacity(handles.len());
        for row in handles {
            limits.push(row.lock().await.clone());
        }
        limits.sort_by_key(CustomerLimit::key);
        limits
    }
}

#[async_trait]
impl LimitStore for InMemoryLimitStore {
    async fn insert_all(&self, limits: Vec<CustomerLimit>) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(taken) = limits.iter().find(|l| rows.contains_key(&l.key())) {
            return Err(LendingError::StorageFailure(format!(
                "limit for customer {} tenor {} already exists",
                taken.customer_id, taken.tenor
            )));
        }
        for limit in limits {
            rows.insert(limit.key(), Arc::new(Mutex::new(limit)));
        }
        Ok(())
    }

    async fn get(&self, key: LimitKey) -> Result<Option<CustomerLimit>> {
        match self.row(key).await {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<CustomerLimit>> {
        Ok(self.snapshot(|key| key.customer_id == customer_id).await)
    }

    async fn all(&self) -> Result<Vec<CustomerLimit>> {
        Ok(self.snapshot(|_| true).await)
    }

    async fn update_locked(
        &self,
        key: LimitKey,
        update: LimitUpdate,
    ) -> Result<Option<CustomerLimit>> {
        let Some(row) = self.row(key).await else {
            return Ok(None);
        };
        let mut locked = row.lock().await;
        let updated = update(&*locked)?;
        *locked = updated.clone();
        Ok(Some(updated))
    }
}

#[derive(Default)]
struct TransactionTable {
    last_id: u64,
    by_id: BTreeMap<u64, Transaction>,
    by_contract: HashMap<String, u64>,
}

/// A thread-safe in-memory store for transactions.
///
/// Contract numbers are unique; status changes are compare-and-set under the
/// table's write lock.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    table: Arc<RwLock<TransactionTable>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, mut tx: Transaction) -> Result<Transaction> {
        let mut table = self.table.write().await;
        if table.by_contract.contains_key(&tx.contract_number) {
            return Err(LendingError::DuplicateContractNumber(tx.contract_number));
        }
        table.last_id += 1;
        tx.id = table.last_id;
        table.by_contract.insert(tx.contract_number.clone(), tx.id);
        table.by_id.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn get(&self, id: u64) -> Result<Option<Transaction>> {
        let table = self.table.read().await;
        Ok(table.by_id.get(&id).cloned())
    }

    async fn get_by_contract_number(&self, contract_number: &str) -> Result<Option<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .by_contract
            .get(contract_number)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .by_id
            .values()
            .filter(|tx| tx.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn list(&self, page: Page) -> Result<Vec<Transaction>> {
        let table = self.table.read().await;
        Ok(table
            .by_id
            .values()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(&self, change: StatusChange) -> Result<StatusChangeOutcome> {
        let mut table = self.table.write().await;
        let Some(tx) = table.by_id.get_mut(&change.id) else {
            return Ok(StatusChangeOutcome::Missing);
        };
        if tx.status != change.from {
            return Ok(StatusChangeOutcome::Conflict(tx.status));
        }
        tx.status = change.to;
        tx.status_reason = change.reason;
        tx.updated_at = change.at;
        Ok(StatusChangeOutcome::Applied(tx.clone()))
    }
}
