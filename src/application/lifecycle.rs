use crate::application::contract::ContractNumberGenerator;
use crate::application::ledger::LimitLedger;
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{CustomerStoreRef, Page, TransactionStoreRef};
use crate::domain::tenor::{Tenor, validate_single_tenor};
use crate::domain::transaction::{
    NewTransaction, StatusChange, StatusChangeOutcome, Transaction, TransactionStatus,
    installment_amount,
};
use crate::error::{Entity, LendingError, Result};
use chrono::Utc;
use tracing::{error, info, warn};

/// Contract numbers tried before a creation gives up on duplicates.
const MAX_CONTRACT_ATTEMPTS: usize = 5;

/// Reason recorded when a rejection arrives through a plain status update.
const STATUS_UPDATE_REASON: &str = "rejected via status update";

/// Creates transactions and moves them through
/// `PENDING -> {APPROVED, REJECTED}`, `APPROVED -> ACTIVE`,
/// `ACTIVE -> {COMPLETED, DEFAULTED}`.
///
/// Creation reserves the OTR amount on the ledger; rejection releases it.
/// No other transition touches the ledger.
pub struct TransactionLifecycle {
    customers: CustomerStoreRef,
    transactions: TransactionStoreRef,
    ledger: LimitLedger,
    contracts: ContractNumberGenerator,
}

impl TransactionLifecycle {
    pub fn new(
        customers: CustomerStoreRef,
        transactions: TransactionStoreRef,
        ledger: LimitLedger,
        contracts: ContractNumberGenerator,
    ) -> Self {
        Self {
            customers,
            transactions,
            ledger,
            contracts,
        }
    }

    /// Reserves the OTR amount and persists the transaction in `PENDING`.
    ///
    /// Nothing is persisted when the reservation fails. If persisting fails
    /// after the reservation, the reservation is released before the error is
    /// returned.
    pub async fn create(&self, request: NewTransaction) -> Result<Transaction> {
        let tenor = validate_single_tenor(request.tenor_months)?;
        let otr = request.validate_amounts()?;
        self.require_customer(request.customer_id).await?;

        let limit = self.ledger.reserve(request.customer_id, tenor, otr).await?;

        match self.persist(&request, tenor).await {
            Ok(tx) => {
                info!(
                    transaction_id = tx.id,
                    contract_number = %tx.contract_number,
                    customer_id = tx.customer_id,
                    tenor = tenor.months(),
                    otr_amount = %tx.otr_amount,
                    available = %limit.available_amount(),
                    "Transaction created"
                );
                Ok(tx)
            }
            Err(err) => {
                self.compensate(request.customer_id, tenor, otr, &err).await;
                Err(err)
            }
        }
    }

    pub async fn approve(&self, id: u64) -> Result<Transaction> {
        let tx = self.transition(id, TransactionStatus::Approved, None).await?;
        info!(
            transaction_id = id,
            contract_number = %tx.contract_number,
            "Transaction approved"
        );
        Ok(tx)
    }

    /// `PENDING -> REJECTED`, releasing the reserved OTR amount.
    ///
    /// The status change is compare-and-set, so a transaction is released at
    /// most once. If the release fails the status goes back to `PENDING`.
    pub async fn reject(&self, id: u64, reason: &str) -> Result<Transaction> {
        let tx = self
            .transition(id, TransactionStatus::Rejected, Some(reason.to_string()))
            .await?;

        let otr = Amount::new(tx.otr_amount.value())?;
        if let Err(err) = self.ledger.release(tx.customer_id, tx.tenor, otr).await {
            error!(
                transaction_id = id,
                error = %err,
                "Releasing limit failed, reverting rejection"
            );
            self.revert_rejection(&tx).await;
            return Err(err);
        }

        info!(
            transaction_id = id,
            contract_number = %tx.contract_number,
            reason,
            released = %tx.otr_amount,
            "Transaction rejected"
        );
        Ok(tx)
    }

    /// Generic transition. `APPROVED` and `REJECTED` are routed through
    /// [`Self::approve`] and [`Self::reject`] so their ledger effect is kept.
    pub async fn update_status(&self, id: u64, status: TransactionStatus) -> Result<Transaction> {
        match status {
            TransactionStatus::Approved => self.approve(id).await,
            TransactionStatus::Rejected => self.reject(id, STATUS_UPDATE_REASON).await,
            _ => {
                let tx = self.transition(id, status, None).await?;
                info!(transaction_id = id, status = %status, "Transaction status updated");
                Ok(tx)
            }
        }
    }

    pub async fn get(&self, id: u64) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or(LendingError::NotFound(Entity::Transaction(id)))
    }

    pub async fn get_by_contract_number(&self, contract_number: &str) -> Result<Option<Transaction>> {
        self.transactions.get_by_contract_number(contract_number).await
    }

    pub async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<Transaction>> {
        self.transactions.list_for_customer(customer_id).await
    }

    pub async fn list(&self, page: Page) -> Result<Vec<Transaction>> {
        self.transactions.list(page).await
    }

    async fn require_customer(&self, customer_id: u64) -> Result<()> {
        match self.customers.get(customer_id).await? {
            Some(customer) if !customer.is_deleted() => Ok(()),
            _ => Err(LendingError::NotFound(Entity::Customer(customer_id))),
        }
    }

    async fn persist(&self, request: &NewTransaction, tenor: Tenor) -> Result<Transaction> {
        let otr = Money::new(request.otr_amount);
        let admin_fee = Money::new(request.admin_fee);
        let interest = Money::new(request.interest_amount);
        let installment = request
            .installment_amount
            .filter(|amount| !amount.is_zero())
            .map(Money::new)
            .unwrap_or_else(|| installment_amount(otr, admin_fee, interest, tenor));

        let mut attempt = 1;
        loop {
            let now = Utc::now();
            let tx = Transaction {
                id: 0,
                contract_number: self.contracts.next_at(now),
                customer_id: request.customer_id,
                tenor,
                otr_amount: otr,
                admin_fee,
                interest_amount: interest,
                installment_amount: installment,
                asset_name: request.asset_name.clone(),
                asset_type: request.asset_type,
                source: request.source,
                status: TransactionStatus::Pending,
                status_reason: None,
                created_at: now,
                updated_at: now,
            };
            match self.transactions.create(tx).await {
                Err(LendingError::DuplicateContractNumber(number)) if attempt < MAX_CONTRACT_ATTEMPTS => {
                    warn!(contract_number = %number, attempt, "Contract number taken, regenerating");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn compensate(&self, customer_id: u64, tenor: Tenor, otr: Amount, cause: &LendingError) {
        match self.ledger.release(customer_id, tenor, otr).await {
            Ok(_) => warn!(
                customer_id,
                tenor = tenor.months(),
                released = %Money::from(otr),
                error = %cause,
                "Transaction not persisted, reservation released"
            ),
            Err(release_err) => error!(
                customer_id,
                tenor = tenor.months(),
                amount = %Money::from(otr),
                error = %cause,
                release_error = %release_err,
                "Transaction not persisted and reservation could not be released"
            ),
        }
    }

    async fn revert_rejection(&self, tx: &Transaction) {
        let change = StatusChange {
            id: tx.id,
            from: TransactionStatus::Rejected,
            to: TransactionStatus::Pending,
            reason: None,
            at: Utc::now(),
        };
        match self.transactions.compare_and_set_status(change).await {
            Ok(StatusChangeOutcome::Applied(_)) => {}
            Ok(outcome) => error!(transaction_id = tx.id, ?outcome, "Could not revert rejection"),
            Err(err) => error!(transaction_id = tx.id, error = %err, "Could not revert rejection"),
        }
    }

    /// Checks the edge against the current status, then applies it as a
    /// compare-and-set so a concurrent change is reported, not overwritten.
    async fn transition(
        &self,
        id: u64,
        to: TransactionStatus,
        reason: Option<String>,
    ) -> Result<Transaction> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(LendingError::InvalidStateTransition {
                from: current.status,
                to,
            });
        }

        let change = StatusChange {
            id,
            from: current.status,
            to,
            reason,
            at: Utc::now(),
        };
        match self.transactions.compare_and_set_status(change).await? {
            StatusChangeOutcome::Applied(tx) => Ok(tx),
            StatusChangeOutcome::Conflict(actual) => Err(LendingError::InvalidStateTransition {
                from: actual,
                to,
            }),
            StatusChangeOutcome::Missing => Err(LendingError::NotFound(Entity::Transaction(id))),
        }
    }
}
