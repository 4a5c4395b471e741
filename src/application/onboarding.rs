use crate::application::ledger::LimitLedger;
use crate::domain::customer::{Customer, CustomerProfile, ProfileUpdate};
use crate::domain::limit::CustomerLimit;
use crate::domain::money::Money;
use crate::domain::ports::{CustomerStoreRef, Page};
use crate::domain::tenor::{TenorLimit, validate_single_tenor, validate_tenor_limits};
use crate::error::{Entity, LendingError, Result};
use chrono::Utc;
use tracing::{error, info};

/// Registers customers together with their per-tenor limits, and serves
/// customer lookups.
pub struct CustomerService {
    customers: CustomerStoreRef,
    ledger: LimitLedger,
}

impl CustomerService {
    pub fn new(customers: CustomerStoreRef, ledger: LimitLedger) -> Self {
        Self { customers, ledger }
    }

    /// Validates the profile and the tenor set, then creates the customer and
    /// one limit row per tenor.
    ///
    /// If the limit rows cannot be created the new customer is tombstoned, so
    /// no live customer exists without limits.
    pub async fn onboard(
        &self,
        profile: CustomerProfile,
        limits: Vec<TenorLimit>,
    ) -> Result<Customer> {
        profile.validate()?;
        validate_tenor_limits(&limits)?;

        let now = Utc::now();
        let customer = self.customers.create(profile, now).await?;
        let rows = limits
            .iter()
            .map(|pair| -> Result<CustomerLimit> {
                Ok(CustomerLimit::new(
                    customer.id,
                    validate_single_tenor(pair.tenor)?,
                    Money::new(pair.limit_amount),
                    now,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Err(err) = self.ledger.open(rows).await {
            error!(customer_id = customer.id, error = %err, "Creating limits failed, tombstoning customer");
            let mut orphan = customer;
            orphan.deleted_at = Some(Utc::now());
            if let Err(tombstone_err) = self.customers.update(orphan).await {
                error!(error = %tombstone_err, "Tombstoning customer failed");
            }
            return Err(err);
        }

        info!(
            customer_id = customer.id,
            tenors = limits.len(),
            "Customer onboarded"
        );
        Ok(customer)
    }

    /// A live customer. Tombstoned customers are reported as not found.
    pub async fn get(&self, id: u64) -> Result<Customer> {
        match self.customers.get(id).await? {
            Some(customer) if !customer.is_deleted() => Ok(customer),
            _ => Err(LendingError::NotFound(Entity::Customer(id))),
        }
    }

    pub async fn get_by_nik(&self, nik: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .get_by_nik(nik)
            .await?
            .filter(|customer| !customer.is_deleted()))
    }

    pub async fn list(&self, page: Page) -> Result<Vec<Customer>> {
        self.customers.list(page).await
    }

    pub async fn update_profile(&self, id: u64, update: ProfileUpdate) -> Result<Customer> {
        let mut customer = self.get(id).await?;
        customer.apply(update, Utc::now());
        customer.profile.validate()?;
        self.customers.update(customer.clone()).await?;
        info!(customer_id = id, "Customer profile updated");
        Ok(customer)
    }

    /// Tombstones the customer. Limit rows and transactions are kept for the
    /// record; a tombstoned customer cannot open new transactions.
    pub async fn delete(&self, id: u64) -> Result<Customer> {
        let mut customer = self.get(id).await?;
        let now = Utc::now();
        customer.deleted_at = Some(now);
        customer.updated_at = now;
        self.customers.update(customer.clone()).await?;
        info!(customer_id = id, "Customer deleted");
        Ok(customer)
    }

    pub async fn limits(&self, id: u64) -> Result<Vec<CustomerLimit>> {
        self.get(id).await?;
        self.ledger.limits_for(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::limit::LimitKey;
    use crate::domain::ports::{CustomerStore, LimitStore, LimitUpdate};
    use crate::infrastructure::in_memory::{InMemoryCustomerStore, InMemoryLimitStore};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    /// A limit store that cannot create rows.
    struct RefusingLimitStore;

    #[async_trait]
    impl LimitStore for RefusingLimitStore {
        async fn insert_all(&self, _limits: Vec<CustomerLimit>) -> Result<()> {
            Err(LendingError::StorageFailure("limits table is read-only".to_string()))
        }
        async fn get(&self, _key: LimitKey) -> Result<Option<CustomerLimit>> {
            Ok(None)
        }
        async fn list_for_customer(&self, _customer_id: u64) -> Result<Vec<CustomerLimit>> {
            Ok(Vec::new())
        }
        async fn all(&self) -> Result<Vec<CustomerLimit>> {
            Ok(Vec::new())
        }
        async fn update_locked(
            &self,
            _key: LimitKey,
            _update: LimitUpdate,
        ) -> Result<Option<CustomerLimit>> {
            Ok(None)
        }
    }

    fn profile() -> CustomerProfile {
        CustomerProfile {
            nik: "3273010101900002".to_string(),
            full_name: "Dewi Lestari".to_string(),
            legal_name: "Dewi Lestari".to_string(),
            birth_place: "Semarang".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            salary: dec!(7500000),
            ktp_photo_path: None,
            selfie_photo_path: None,
        }
    }

    fn limits() -> Vec<TenorLimit> {
        (1..=4).map(|tenor| TenorLimit::new(tenor, dec!(500000))).collect()
    }

    #[tokio::test]
    async fn test_customer_is_tombstoned_when_limits_fail() {
        let store = Arc::new(InMemoryCustomerStore::new());
        let service = CustomerService::new(
            store.clone(),
            LimitLedger::new(Arc::new(RefusingLimitStore)),
        );

        let err = service.onboard(profile(), limits()).await.unwrap_err();
        assert!(matches!(err, LendingError::StorageFailure(_)));

        let stored = store.get(1).await.unwrap().unwrap();
        assert!(stored.is_deleted());
        assert!(matches!(
            service.get(1).await,
            Err(LendingError::NotFound(Entity::Customer(1)))
        ));
        assert!(service.list(Page::new(10, 0)).await.unwrap().is_empty());
        assert!(service.get_by_nik("3273010101900002").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_then_update_is_not_found() {
        let store = Arc::new(InMemoryCustomerStore::new());
        let service = CustomerService::new(
            store.clone(),
            LimitLedger::new(Arc::new(InMemoryLimitStore::new())),
        );
        let customer = service.onboard(profile(), limits()).await.unwrap();

        let deleted = service.delete(customer.id).await.unwrap();
        assert!(deleted.is_deleted());
        assert!(matches!(
            service.update_profile(customer.id, ProfileUpdate::default()).await,
            Err(LendingError::NotFound(Entity::Customer(_)))
        ));
        assert!(store.get(customer.id).await.unwrap().unwrap().is_deleted());
    }
}
