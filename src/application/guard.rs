use crate::config::LendingConfig;
use crate::error::{LendingError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// In-process admission control for transaction creation.
///
/// Bounds how many creations run at once and lets only one creation per
/// customer proceed at a time. This only shapes scheduling within one
/// process; the ledger's row lock is what keeps limits consistent when
/// several processes share a store.
pub struct ConcurrencyGuard {
    slots: Arc<Semaphore>,
    customer_locks: DashMap<u64, Arc<Mutex<()>>>,
    lock_table_capacity: usize,
    admission_wait: Duration,
}

/// Held for the duration of one creation. Dropping it frees the slot and
/// hands the customer's turn to the next waiter.
#[must_use]
pub struct AdmissionTicket {
    _turn: OwnedMutexGuard<()>,
    _slot: OwnedSemaphorePermit,
}

impl ConcurrencyGuard {
    pub fn new(config: &LendingConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent_creations)),
            customer_locks: DashMap::new(),
            lock_table_capacity: config.lock_table_capacity,
            admission_wait: config.admission_wait,
        }
    }

    /// Waits for a free slot, then for the customer's turn. Fails with
    /// `ConcurrencyTimeout` if both are not obtained within the admission wait.
    pub async fn admit(&self, customer_id: u64) -> Result<AdmissionTicket> {
        let admission = async {
            let slot = self
                .slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| LendingError::Internal(format!("admission pool closed: {e}")))?;
            let turn = self.customer_lock(customer_id).lock_owned().await;
            Ok::<_, LendingError>(AdmissionTicket {
                _turn: turn,
                _slot: slot,
            })
        };

        match tokio::time::timeout(self.admission_wait, admission).await {
            Ok(ticket) => ticket,
            Err(_) => {
                warn!(
                    customer_id,
                    wait_ms = self.admission_wait.as_millis() as u64,
                    "Admission wait exceeded"
                );
                Err(LendingError::ConcurrencyTimeout(self.admission_wait))
            }
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Number of per-customer handles currently tracked.
    pub fn tracked_customers(&self) -> usize {
        self.customer_locks.len()
    }

    fn customer_lock(&self, customer_id: u64) -> Arc<Mutex<()>> {
        if self.customer_locks.len() >= self.lock_table_capacity {
            self.prune_idle();
        }
        self.customer_locks
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops handles nobody holds or waits on. The map's own reference is the
    /// only one left for those.
    fn prune_idle(&self) {
        self.customer_locks
            .retain(|_, handle| Arc::strong_count(handle) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(slots: usize, table: usize, wait_ms: u64) -> ConcurrencyGuard {
        ConcurrencyGuard::new(&LendingConfig {
            max_concurrent_creations: slots,
            lock_table_capacity: table,
            admission_wait: Duration::from_millis(wait_ms),
            ..LendingConfig::default()
        })
    }

    #[tokio::test]
    async fn test_same_customer_is_serialized() {
        let guard = guard(10, 100, 50);
        let first = guard.admit(1).await.unwrap();

        let second = guard.admit(1).await;
        assert!(matches!(second, Err(LendingError::ConcurrencyTimeout(_))));

        // A different customer is not blocked.
        let other = guard.admit(2).await;
        assert!(other.is_ok());

        drop(first);
        assert!(guard.admit(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_slot_pool_is_bounded() {
        let guard = guard(2, 100, 50);
        let a = guard.admit(1).await.unwrap();
        let _b = guard.admit(2).await.unwrap();
        assert_eq!(guard.available_slots(), 0);

        assert!(matches!(
            guard.admit(3).await,
            Err(LendingError::ConcurrencyTimeout(_))
        ));

        drop(a);
        assert_eq!(guard.available_slots(), 1);
        assert!(guard.admit(3).await.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_gets_turn_after_release() {
        let guard = Arc::new(guard(10, 100, 1000));
        let first = guard.admit(7).await.unwrap();

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.admit(7).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_lock_table_prunes_idle_handles_only() {
        let guard = guard(10, 2, 50);
        let held = guard.admit(1).await.unwrap();

        for customer in 2..=20 {
            drop(guard.admit(customer).await.unwrap());
        }
        assert!(guard.tracked_customers() <= 2);

        // The handle for customer 1 is still in use and must still serialize.
        assert!(matches!(
            guard.admit(1).await,
            Err(LendingError::ConcurrencyTimeout(_))
        ));
        drop(held);
        assert!(guard.admit(1).await.is_ok());
    }
}
