use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lendcore::domain::customer::{Customer, CustomerProfile, ProfileUpdate};
use lendcore::domain::money::Money;
use lendcore::domain::ports::{CustomerStore, Page, Stores};
use lendcore::domain::tenor::TenorLimit;
use lendcore::error::{Entity, FieldError, TenorPolicyError, ValidationError};
use lendcore::infrastructure::in_memory::InMemoryCustomerStore;
use lendcore::{LendingConfig, LendingError, LendingService, Result};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

mod common;

fn tenor_error(err: LendingError) -> TenorPolicyError {
    match err {
        LendingError::Validation(ValidationError::Tenor(inner)) => inner,
        other => panic!("expected a tenor policy error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_onboarding_creates_four_limits() {
    let service = common::service();
    let limits = vec![
        TenorLimit::new(1, dec!(1000000)),
        TenorLimit::new(2, dec!(1200000)),
        TenorLimit::new(3, dec!(1500000)),
        TenorLimit::new(4, dec!(2000000)),
    ];
    let customer = service
        .onboard_customer(common::profile(&common::nik(1)), limits)
        .await
        .unwrap();

    let rows = service.customer_limits(customer.id).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].limit_amount, Money::new(dec!(2000000)));
    assert!(rows.iter().all(|row| row.used_amount == Money::ZERO));
    assert_eq!(
        service.get_available_limit(customer.id, 2).await.unwrap(),
        Money::new(dec!(1200000))
    );
}

#[tokio::test]
async fn test_tenor_set_rules() {
    let service = common::service();
    let profile = common::profile(&common::nik(1));

    let missing = vec![
        TenorLimit::new(1, dec!(100)),
        TenorLimit::new(2, dec!(100)),
        TenorLimit::new(3, dec!(100)),
    ];
    let err = service.onboard_customer(profile.clone(), missing).await.unwrap_err();
    assert!(matches!(
        tenor_error(err),
        TenorPolicyError::IncompleteSet { provided: 3, .. }
    ));

    let duplicated = vec![
        TenorLimit::new(1, dec!(100)),
        TenorLimit::new(1, dec!(100)),
        TenorLimit::new(2, dec!(100)),
        TenorLimit::new(3, dec!(100)),
    ];
    let err = service.onboard_customer(profile.clone(), duplicated).await.unwrap_err();
    assert_eq!(tenor_error(err), TenorPolicyError::DuplicateTenor(1));

    let mut zero = common::uniform_limits(dec!(100));
    zero[2].limit_amount = dec!(0);
    let err = service.onboard_customer(profile.clone(), zero).await.unwrap_err();
    assert_eq!(tenor_error(err), TenorPolicyError::NonPositiveAmount { tenor: 3 });

    let mut outside = common::uniform_limits(dec!(100));
    outside[0].tenor = 6;
    let err = service.onboard_customer(profile.clone(), outside).await.unwrap_err();
    assert_eq!(tenor_error(err), TenorPolicyError::InvalidTenor(6));

    // Nothing was created by the refused attempts.
    assert!(service.list_customers(0, 0).await.unwrap().is_empty());
    assert!(service.all_limits().await.unwrap().is_empty());

    service
        .onboard_customer(profile, common::uniform_limits(dec!(100)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_profile_validation() {
    let service = common::service();

    let mut short_nik = common::profile("12345");
    let err = service
        .onboard_customer(short_nik.clone(), common::uniform_limits(dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LendingError::Validation(ValidationError::Field(FieldError::InvalidNik))
    ));

    short_nik.nik = common::nik(1);
    short_nik.full_name = "  ".to_string();
    assert!(
        service
            .onboard_customer(short_nik.clone(), common::uniform_limits(dec!(100)))
            .await
            .is_err()
    );

    short_nik.full_name = "Siti".to_string();
    short_nik.salary = dec!(-1);
    assert!(
        service
            .onboard_customer(short_nik, common::uniform_limits(dec!(100)))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_duplicate_nik_is_refused() {
    let service = common::service();
    let nik = common::nik(9);
    service
        .onboard_customer(common::profile(&nik), common::uniform_limits(dec!(100)))
        .await
        .unwrap();

    let err = service
        .onboard_customer(common::profile(&nik), common::uniform_limits(dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LendingError::Validation(ValidationError::Field(FieldError::DuplicateNik(_)))
    ));
    assert_eq!(service.all_limits().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_customer_queries_and_update() {
    let service = common::service();
    for n in 1..=12 {
        service
            .onboard_customer(common::profile(&common::nik(n)), common::uniform_limits(dec!(100)))
            .await
            .unwrap();
    }

    assert_eq!(service.list_customers(0, 0).await.unwrap().len(), 10);
    assert_eq!(service.list_customers(500, 0).await.unwrap().len(), 12);
    let tail = service.list_customers(5, 10).await.unwrap();
    assert_eq!(tail.iter().map(|c| c.id).collect::<Vec<_>>(), vec![11, 12]);

    let found = service
        .get_customer_by_nik(&common::nik(4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, 4);

    let updated = service
        .update_customer(
            4,
            ProfileUpdate {
                salary: Some(dec!(12500000)),
                birth_place: Some("Medan".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.profile.salary, dec!(12500000));
    assert_eq!(updated.profile.birth_place, "Medan");
    assert_eq!(updated.profile.nik, common::nik(4));
    assert_eq!(service.get_customer(4).await.unwrap(), updated);
}

#[tokio::test]
async fn test_deleted_customer_is_hidden_and_cannot_borrow() {
    let (service, customer) = common::service_with_customer(dec!(1000000)).await;
    service.delete_customer(customer).await.unwrap();

    assert!(matches!(
        service.get_customer(customer).await,
        Err(LendingError::NotFound(Entity::Customer(_)))
    ));
    assert!(
        service
            .get_customer_by_nik(&common::nik(1))
            .await
            .unwrap()
            .is_none()
    );
    assert!(service.list_customers(0, 0).await.unwrap().is_empty());

    let err = service
        .create_transaction(common::purchase(customer, 1, dec!(1000)))
        .await
        .unwrap_err();
    assert!(matches!(err, LendingError::NotFound(Entity::Customer(_))));
    assert!(matches!(
        service.delete_customer(customer).await,
        Err(LendingError::NotFound(_))
    ));

    // The NIK stays taken by the tombstoned record.
    assert!(
        service
            .onboard_customer(common::profile(&common::nik(1)), common::uniform_limits(dec!(100)))
            .await
            .is_err()
    );
}

/// Holds back every write of a live row, letting a delete land first.
struct LaggingProfileStore {
    inner: InMemoryCustomerStore,
    delay: Duration,
}

#[async_trait]
impl CustomerStore for LaggingProfileStore {
    async fn create(&self, profile: CustomerProfile, now: DateTime<Utc>) -> Result<Customer> {
        self.inner.create(profile, now).await
    }
    async fn get(&self, id: u64) -> Result<Option<Customer>> {
        self.inner.get(id).await
    }
    async fn get_by_nik(&self, nik: &str) -> Result<Option<Customer>> {
        self.inner.get_by_nik(nik).await
    }
    async fn list(&self, page: Page) -> Result<Vec<Customer>> {
        self.inner.list(page).await
    }
    async fn update(&self, customer: Customer) -> Result<()> {
        if !customer.is_deleted() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.update(customer).await
    }
}

#[tokio::test]
async fn test_profile_update_cannot_undo_a_concurrent_delete() {
    let stores = Stores {
        customers: Arc::new(LaggingProfileStore {
            inner: InMemoryCustomerStore::new(),
            delay: Duration::from_millis(100),
        }),
        ..Stores::in_memory()
    };
    let service = LendingService::new(stores, LendingConfig::default());
    let id = service
        .onboard_customer(common::profile(&common::nik(1)), common::uniform_limits(dec!(1000000)))
        .await
        .unwrap()
        .id;

    let update = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .update_customer(
                    id,
                    ProfileUpdate {
                        birth_place: Some("Medan".to_string()),
                        ..ProfileUpdate::default()
                    },
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    service.delete_customer(id).await.unwrap();

    assert!(matches!(
        update.await.unwrap(),
        Err(LendingError::NotFound(Entity::Customer(_)))
    ));
    assert!(matches!(
        service.get_customer(id).await,
        Err(LendingError::NotFound(Entity::Customer(_)))
    ));
    let err = service
        .create_transaction(common::purchase(id, 1, dec!(1000)))
        .await
        .unwrap_err();
    assert!(matches!(err, LendingError::NotFound(Entity::Customer(_))));
}
