#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use lendcore::domain::customer::CustomerProfile;
use lendcore::domain::ports::{Page, Stores, TransactionStore};
use lendcore::domain::tenor::TenorLimit;
use lendcore::domain::transaction::{
    AssetType, NewTransaction, StatusChange, StatusChangeOutcome, Transaction, TransactionSource,
};
use lendcore::infrastructure::in_memory::InMemoryTransactionStore;
use lendcore::{LendingConfig, LendingService, Result};
use rust_decimal::Decimal;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const CUSTOMER_HEADER: [&str; 7] = [
    "nik",
    "full_name",
    "legal_name",
    "birth_place",
    "birth_date",
    "salary",
    "limits",
];

pub const COMMAND_HEADER: [&str; 11] = [
    "type",
    "ref",
    "customer",
    "tenor",
    "otr",
    "admin_fee",
    "interest",
    "asset_name",
    "asset_type",
    "source",
    "reason",
];

/// A valid 16-digit NIK unique per `n`.
pub fn nik(n: u64) -> String {
    format!("{:016}", 3171000000000000u64 + n)
}

pub fn profile(nik: &str) -> CustomerProfile {
    CustomerProfile {
        nik: nik.to_string(),
        full_name: "Siti Rahayu".to_string(),
        legal_name: "Siti Rahayu".to_string(),
        birth_place: "Bandung".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1988, 11, 2).unwrap(),
        salary: Decimal::from(9_000_000),
        ktp_photo_path: None,
        selfie_photo_path: None,
    }
}

/// The same limit for each of the four tenors.
pub fn uniform_limits(limit: Decimal) -> Vec<TenorLimit> {
    (1..=4).map(|tenor| TenorLimit::new(tenor, limit)).collect()
}

pub fn purchase(customer_id: u64, tenor_months: u32, otr: Decimal) -> NewTransaction {
    NewTransaction {
        customer_id,
        tenor_months,
        otr_amount: otr,
        admin_fee: Decimal::ZERO,
        interest_amount: Decimal::ZERO,
        installment_amount: None,
        asset_name: "Honda Beat".to_string(),
        asset_type: AssetType::Motor,
        source: TransactionSource::Dealer,
    }
}

pub fn service() -> LendingService {
    LendingService::new(Stores::in_memory(), LendingConfig::default())
}

/// A service with one onboarded customer holding `limit` on every tenor.
pub async fn service_with_customer(limit: Decimal) -> (LendingService, u64) {
    let service = service();
    let customer = service
        .onboard_customer(profile(&nik(1)), uniform_limits(limit))
        .await
        .unwrap();
    (service, customer.id)
}

/// Delays every `create` by a fixed amount, then delegates to memory.
pub struct SlowTransactionStore {
    inner: InMemoryTransactionStore,
    delay: Duration,
}

impl SlowTransactionStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryTransactionStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl TransactionStore for SlowTransactionStore {
    async fn create(&self, tx: Transaction) -> Result<Transaction> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(tx).await
    }
    async fn get(&self, id: u64) -> Result<Option<Transaction>> {
        self.inner.get(id).await
    }
    async fn get_by_contract_number(&self, contract_number: &str) -> Result<Option<Transaction>> {
        self.inner.get_by_contract_number(contract_number).await
    }
    async fn list_for_customer(&self, customer_id: u64) -> Result<Vec<Transaction>> {
        self.inner.list_for_customer(customer_id).await
    }
    async fn list(&self, page: Page) -> Result<Vec<Transaction>> {
        self.inner.list(page).await
    }
    async fn compare_and_set_status(&self, change: StatusChange) -> Result<StatusChangeOutcome> {
        self.inner.compare_and_set_status(change).await
    }
}

/// In-memory stores whose transaction store is slowed down by `delay`.
pub fn slow_stores(delay: Duration) -> Stores {
    Stores {
        transactions: Arc::new(SlowTransactionStore::new(delay)),
        ..Stores::in_memory()
    }
}

/// Writes `rows` customers, NIKs `nik(1)..=nik(rows)`, each with `limit` on
/// every tenor.
pub fn generate_customers_csv(path: &Path, rows: u64, limit: &str) -> std::result::Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(CUSTOMER_HEADER)?;
    let limits = format!("1={limit}|2={limit}|3={limit}|4={limit}");
    for i in 1..=rows {
        wtr.write_record([
            nik(i).as_str(),
            "Siti Rahayu",
            "Siti Rahayu",
            "Bandung",
            "1988-11-02",
            "9000000",
            limits.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one `create` row per customer, each for `otr` on tenor 1.
pub fn generate_commands_csv(path: &Path, customers: u64, otr: &str) -> std::result::Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(COMMAND_HEADER)?;
    for i in 1..=customers {
        let reference = format!("t{i}");
        let customer = nik(i);
        wtr.write_record([
            "create",
            reference.as_str(),
            customer.as_str(),
            "1",
            otr,
            "0",
            "0",
            "Kulkas",
            "WHITE_GOODS",
            "WEB",
            "",
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
