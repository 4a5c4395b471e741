use crate::domain::limit::{CustomerLimit, LimitKey};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{LimitStoreRef, LimitUpdate};
use crate::domain::tenor::Tenor;
use crate::error::{Entity, LendingError, Result};
use chrono::Utc;
use tracing::{debug, warn};

/// Authoritative used/available balance per `(customer, tenor)`.
///
/// Every change to a used amount goes through [`LimitLedger::adjust_used_amount`],
/// which runs the whole check-then-write under the row lock provided by the
/// limit store. Nothing else writes `used_amount`.
#[derive(Clone)]
pub struct LimitLedger {
    limits: LimitStoreRef,
}

impl LimitLedger {
    pub fn new(limits: LimitStoreRef) -> Self {
        Self { limits }
    }

    /// Creates the limit rows of a newly onboarded customer, all or none.
    pub async fn open(&self, limits: Vec<CustomerLimit>) -> Result<()> {
        self.limits.insert_all(limits).await
    }

    /// Unlocked snapshot, for display.
    pub async fn get_limit(&self, customer_id: u64, tenor: Tenor) -> Result<CustomerLimit> {
        self.limits
            .get(LimitKey::new(customer_id, tenor))
            .await?
            .ok_or_else(|| not_found(customer_id, tenor))
    }

    pub async fn limits_for(&self, customer_id: u64) -> Result<Vec<CustomerLimit>> {
        self.limits.list_for_customer(customer_id).await
    }

    pub async fn all_limits(&self) -> Result<Vec<CustomerLimit>> {
        self.limits.all().await
    }

    pub async fn available(&self, customer_id: u64, tenor: Tenor) -> Result<Money> {
        Ok(self.get_limit(customer_id, tenor).await?.available_amount())
    }

    /// Advisory pre-check against an unlocked snapshot. The binding decision
    /// is made by [`LimitLedger::reserve`].
    pub async fn check_availability(
        &self,
        customer_id: u64,
        tenor: Tenor,
        amount: Amount,
    ) -> Result<()> {
        let available = self.available(customer_id, tenor).await?;
        if Money::from(amount) > available {
            return Err(LendingError::InsufficientLimit {
                requested: amount.into(),
                available,
            });
        }
        Ok(())
    }

    pub async fn reserve(
        &self,
        customer_id: u64,
        tenor: Tenor,
        amount: Amount,
    ) -> Result<CustomerLimit> {
        self.adjust_used_amount(customer_id, tenor, amount.into())
            .await
    }

    pub async fn release(
        &self,
        customer_id: u64,
        tenor: Tenor,
        amount: Amount,
    ) -> Result<CustomerLimit> {
        self.adjust_used_amount(customer_id, tenor, Money::ZERO - Money::from(amount))
            .await
    }

    /// Applies `delta` to the used amount under the row lock.
    ///
    /// A release that would go below zero is clamped to zero. An increase past
    /// the limit fails with `InsufficientLimit` and writes nothing.
    pub async fn adjust_used_amount(
        &self,
        customer_id: u64,
        tenor: Tenor,
        delta: Money,
    ) -> Result<CustomerLimit> {
        let update: LimitUpdate = Box::new(move |row: &CustomerLimit| {
            let mut used = row.used_amount + delta;
            if delta.is_negative() && used.is_negative() {
                warn!(
                    customer_id,
                    tenor = tenor.months(),
                    used = %row.used_amount,
                    delta = %delta,
                    "Release exceeds used amount, clamping to zero"
                );
                used = Money::ZERO;
            }
            if used > row.limit_amount {
                return Err(LendingError::InsufficientLimit {
                    requested: delta,
                    available: row.available_amount(),
                });
            }
            let mut next = row.clone();
            next.used_amount = used;
            next.updated_at = Utc::now();
            Ok(next)
        });

        let updated = self
            .limits
            .update_locked(LimitKey::new(customer_id, tenor), update)
            .await?
            .ok_or_else(|| not_found(customer_id, tenor))?;

        debug!(
            customer_id,
            tenor = tenor.months(),
            delta = %delta,
            used = %updated.used_amount,
            available = %updated.available_amount(),
            "Adjusted used amount"
        );
        Ok(updated)
    }
}

fn not_found(customer_id: u64, tenor: Tenor) -> LendingError {
    LendingError::NotFound(Entity::Limit {
        customer_id,
        tenor: tenor.months(),
    })
}
