use crate::application::contract::ContractNumberGenerator;
use crate::application::guard::ConcurrencyGuard;
use crate::application::ledger::LimitLedger;
use crate::application::lifecycle::TransactionLifecycle;
use crate::application::onboarding::CustomerService;
use crate::config::LendingConfig;
use crate::domain::customer::{Customer, CustomerProfile, ProfileUpdate};
use crate::domain::limit::CustomerLimit;
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{Page, Stores};
use crate::domain::tenor::{TenorLimit, validate_single_tenor};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{Instrument, Span, instrument, warn};

/// The lending core as seen by callers.
///
/// Cheap to clone; clones share the same stores, ledger and admission guard.
#[derive(Clone)]
pub struct LendingService {
    inner: Arc<Inner>,
}

struct Inner {
    config: LendingConfig,
    customers: CustomerService,
    lifecycle: TransactionLifecycle,
    ledger: LimitLedger,
    guard: ConcurrencyGuard,
}

impl LendingService {
    pub fn new(stores: Stores, config: LendingConfig) -> Self {
        let ledger = LimitLedger::new(stores.limits.clone());
        let customers = CustomerService::new(stores.customers.clone(), ledger.clone());
        let lifecycle = TransactionLifecycle::new(
            stores.customers,
            stores.transactions,
            ledger.clone(),
            ContractNumberGenerator::new(config.contract_prefix.clone()),
        );
        let guard = ConcurrencyGuard::new(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                customers,
                lifecycle,
                ledger,
                guard,
            }),
        }
    }

    pub fn config(&self) -> &LendingConfig {
        &self.inner.config
    }

    #[instrument(skip_all, fields(nik = %profile.nik))]
    pub async fn onboard_customer(
        &self,
        profile: CustomerProfile,
        limits: Vec<TenorLimit>,
    ) -> Result<Customer> {
        self.inner.customers.onboard(profile, limits).await
    }

    pub async fn get_customer(&self, id: u64) -> Result<Customer> {
        self.inner.customers.get(id).await
    }

    pub async fn get_customer_by_nik(&self, nik: &str) -> Result<Option<Customer>> {
        self.inner.customers.get_by_nik(nik).await
    }

    /// `limit` of 0 means the configured default page size.
    pub async fn list_customers(&self, limit: usize, offset: usize) -> Result<Vec<Customer>> {
        let page = Page::new(self.inner.config.page_limit(limit), offset);
        self.inner.customers.list(page).await
    }

    #[instrument(skip(self, update))]
    pub async fn update_customer(&self, id: u64, update: ProfileUpdate) -> Result<Customer> {
        self.inner.customers.update_profile(id, update).await
    }

    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: u64) -> Result<Customer> {
        self.inner.customers.delete(id).await
    }

    pub async fn customer_limits(&self, id: u64) -> Result<Vec<CustomerLimit>> {
        self.inner.customers.limits(id).await
    }

    pub async fn get_available_limit(&self, customer_id: u64, tenor_months: u32) -> Result<Money> {
        let tenor = validate_single_tenor(tenor_months)?;
        self.inner.ledger.available(customer_id, tenor).await
    }

    /// Advisory check that `amount` fits the current availability. Nothing is
    /// reserved; only [`Self::create_transaction`] holds the limit.
    pub async fn validate_transaction_limit(
        &self,
        customer_id: u64,
        tenor_months: u32,
        amount: Decimal,
    ) -> Result<()> {
        let tenor = validate_single_tenor(tenor_months)?;
        let amount = Amount::new(amount)?;
        self.inner
            .ledger
            .check_availability(customer_id, tenor, amount)
            .await
    }

    /// Every limit row in the store, ordered by customer then tenor.
    pub async fn all_limits(&self) -> Result<Vec<CustomerLimit>> {
        self.inner.ledger.all_limits().await
    }

    /// Runs the creation as its own task: admission first, then the
    /// lifecycle.
    ///
    /// If the task does not finish within the operation timeout the caller
    /// gets `OperationTimeout`. The task is not cancelled; whatever it
    /// completes afterwards stays persisted, and callers find out by querying.
    #[instrument(
        skip_all,
        fields(customer_id = request.customer_id, tenor = request.tenor_months)
    )]
    pub async fn create_transaction(&self, request: NewTransaction) -> Result<Transaction> {
        let inner = self.inner.clone();
        let timeout = inner.config.operation_timeout;

        let task = tokio::spawn(
            async move {
                let _ticket = inner.guard.admit(request.customer_id).await?;
                inner.lifecycle.create(request).await
            }
            .instrument(Span::current()),
        );

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LendingError::Internal(format!(
                "transaction creation task failed: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Transaction creation timed out"
                );
                Err(LendingError::OperationTimeout(timeout))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn approve_transaction(&self, id: u64) -> Result<Transaction> {
        self.inner.lifecycle.approve(id).await
    }

    #[instrument(skip(self))]
    pub async fn reject_transaction(&self, id: u64, reason: &str) -> Result<Transaction> {
        self.inner.lifecycle.reject(id, reason).await
    }

    #[instrument(skip(self))]
    pub async fn update_transaction_status(
        &self,
        id: u64,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        self.inner.lifecycle.update_status(id, status).await
    }

    pub async fn get_transaction(&self, id: u64) -> Result<Transaction> {
        self.inner.lifecycle.get(id).await
    }

    pub async fn get_transaction_by_contract_number(
        &self,
        contract_number: &str,
    ) -> Result<Option<Transaction>> {
        self.inner
            .lifecycle
            .get_by_contract_number(contract_number)
            .await
    }

    pub async fn customer_transactions(&self, customer_id: u64) -> Result<Vec<Transaction>> {
        self.inner.lifecycle.list_for_customer(customer_id).await
    }

    pub async fn list_transactions(&self, limit: usize, offset: usize) -> Result<Vec<Transaction>> {
        let page = Page::new(self.inner.config.page_limit(limit), offset);
        self.inner.lifecycle.list(page).await
    }
}
