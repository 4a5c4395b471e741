use clap::Parser;
use lendcore::config::{
    DEFAULT_ADMISSION_WAIT, DEFAULT_CONTRACT_PREFIX, DEFAULT_MAX_CONCURRENT_CREATIONS,
    DEFAULT_OPERATION_TIMEOUT, LendingConfig,
};
use lendcore::domain::ports::Stores;
use lendcore::error::FieldError;
use lendcore::interfaces::csv::command_reader::{Command, CommandReader};
use lendcore::interfaces::csv::customer_reader::CustomerReader;
use lendcore::interfaces::csv::limit_writer::LimitWriter;
use lendcore::{LendingError, LendingService};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Customers CSV: nik, full_name, legal_name, birth_place, birth_date, salary, limits
    customers: PathBuf,

    /// Lifecycle commands CSV: type, ref, customer, tenor, otr, admin_fee, interest,
    /// asset_name, asset_type, source, reason
    commands: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "LENDCORE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Prefix of generated contract numbers.
    #[arg(long, env = "LENDCORE_CONTRACT_PREFIX", default_value = DEFAULT_CONTRACT_PREFIX)]
    contract_prefix: String,

    /// Transaction creations allowed in flight at once.
    #[arg(long, env = "LENDCORE_MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT_CREATIONS)]
    max_concurrent: usize,

    /// Seconds a creation may wait for admission.
    #[arg(long, env = "LENDCORE_ADMISSION_WAIT_SECS", default_value_t = DEFAULT_ADMISSION_WAIT.as_secs())]
    admission_wait_secs: u64,

    /// Seconds a whole creation may take.
    #[arg(long, env = "LENDCORE_OPERATION_TIMEOUT_SECS", default_value_t = DEFAULT_OPERATION_TIMEOUT.as_secs())]
    operation_timeout_secs: u64,
}

impl Cli {
    fn config(&self) -> LendingConfig {
        LendingConfig {
            contract_prefix: self.contract_prefix.clone(),
            max_concurrent_creations: self.max_concurrent.max(1),
            admission_wait: Duration::from_secs(self.admission_wait_secs),
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            ..LendingConfig::default()
        }
    }
}

fn init_tracing() {
    // stdout carries the ledger CSV, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>, lock_table_capacity: usize) -> Result<Stores> {
    use lendcore::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "Using RocksDB storage");
            Ok(RocksDBStore::open(path)
                .into_diagnostic()?
                .with_lock_table_capacity(lock_table_capacity)
                .into_stores())
        }
        None => Ok(Stores::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>, _lock_table_capacity: usize) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Stores::in_memory())
}

async fn onboard_customers(service: &LendingService, file: File) {
    for (row, record) in CustomerReader::new(file).customers().enumerate() {
        let outcome = match record.and_then(|record| record.into_onboarding()) {
            Ok((profile, limits)) => service.onboard_customer(profile, limits).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(row = row + 1, error = %err, "Skipping customer");
        }
    }
}

fn lookup(refs: &HashMap<String, u64>, reference: &str) -> lendcore::Result<u64> {
    refs.get(reference).copied().ok_or_else(|| {
        FieldError::Malformed(format!("unknown transaction reference '{reference}'")).into()
    })
}

async fn run_command(
    service: &LendingService,
    refs: &mut HashMap<String, u64>,
    command: Command,
) -> lendcore::Result<()> {
    match command {
        Command::Create {
            reference,
            nik,
            draft,
        } => {
            let customer = service.get_customer_by_nik(&nik).await?.ok_or_else(|| {
                LendingError::from(FieldError::Malformed(format!("no customer with NIK {nik}")))
            })?;
            let tx = service.create_transaction(draft.for_customer(customer.id)).await?;
            info!(
                reference = %reference,
                contract_number = %tx.contract_number,
                installment = %tx.installment_amount,
                "Transaction created"
            );
            refs.insert(reference, tx.id);
        }
        Command::Approve { reference } => {
            service.approve_transaction(lookup(refs, &reference)?).await?;
        }
        Command::Reject { reference, reason } => {
            service.reject_transaction(lookup(refs, &reference)?, &reason).await?;
        }
        Command::Transition { reference, status } => {
            service
                .update_transaction_status(lookup(refs, &reference)?, status)
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();

    let stores = open_stores(cli.db_path, config.lock_table_capacity)?;
    let service = LendingService::new(stores, config);

    let customers = File::open(&cli.customers).into_diagnostic()?;
    onboard_customers(&service, customers).await;

    if let Some(path) = cli.commands {
        let file = File::open(path).into_diagnostic()?;
        let mut refs = HashMap::new();
        for (row, command) in CommandReader::new(file).commands().enumerate() {
            match command {
                Ok(command) => {
                    let reference = command.reference().to_string();
                    if let Err(err) = run_command(&service, &mut refs, command).await {
                        warn!(row = row + 1, reference = %reference, error = %err, "Command failed");
                    }
                }
                Err(err) => warn!(row = row + 1, error = %err, "Command failed"),
            }
        }
    }

    let limits = service.all_limits().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LimitWriter::new(stdout.lock());
    writer.write_limits(&limits).into_diagnostic()?;

    Ok(())
}
