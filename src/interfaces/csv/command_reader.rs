use crate::domain::transaction::{AssetType, NewTransaction, TransactionSource, TransactionStatus};
use crate::error::{FieldError, LendingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// Reason used when a `reject` row leaves the reason column empty.
pub const DEFAULT_REJECT_REASON: &str = "rejected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Create,
    Approve,
    Reject,
    Activate,
    Complete,
    Default,
}

/// One row of the commands file.
///
/// `ref` is a caller-chosen label that later rows use to address the
/// transaction a `create` row produced. Columns a command does not use may be
/// empty or missing.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub command_type: CommandType,
    #[serde(rename = "ref")]
    pub reference: String,
    pub customer: Option<String>,
    pub tenor: Option<u32>,
    pub otr: Option<Decimal>,
    pub admin_fee: Option<Decimal>,
    pub interest: Option<Decimal>,
    pub asset_name: Option<String>,
    pub asset_type: Option<String>,
    pub source: Option<String>,
    pub reason: Option<String>,
}

/// A create request whose customer is still addressed by NIK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub tenor_months: u32,
    pub otr_amount: Decimal,
    pub admin_fee: Decimal,
    pub interest_amount: Decimal,
    pub asset_name: String,
    pub asset_type: AssetType,
    pub source: TransactionSource,
}

impl TransactionDraft {
    pub fn for_customer(self, customer_id: u64) -> NewTransaction {
        NewTransaction {
            customer_id,
            tenor_months: self.tenor_months,
            otr_amount: self.otr_amount,
            admin_fee: self.admin_fee,
            interest_amount: self.interest_amount,
            installment_amount: None,
            asset_name: self.asset_name,
            asset_type: self.asset_type,
            source: self.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        reference: String,
        nik: String,
        draft: TransactionDraft,
    },
    Approve {
        reference: String,
    },
    Reject {
        reference: String,
        reason: String,
    },
    /// Any other status change: activation, completion or default.
    Transition {
        reference: String,
        status: TransactionStatus,
    },
}

impl Command {
    pub fn reference(&self) -> &str {
        match self {
            Command::Create { reference, .. }
            | Command::Approve { reference }
            | Command::Reject { reference, .. }
            | Command::Transition { reference, .. } => reference,
        }
    }
}

impl TryFrom<CommandRecord> for Command {
    type Error = LendingError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let reference = record.reference;
        let command = match record.command_type {
            CommandType::Create => {
                let nik = required(record.customer, "customer")?;
                let draft = TransactionDraft {
                    tenor_months: record.tenor.ok_or(FieldError::Empty("tenor"))?,
                    otr_amount: record.otr.ok_or(FieldError::Empty("otr"))?,
                    admin_fee: record.admin_fee.unwrap_or_default(),
                    interest_amount: record.interest.unwrap_or_default(),
                    asset_name: required(record.asset_name, "asset_name")?,
                    asset_type: required(record.asset_type, "asset_type")?.parse()?,
                    source: required(record.source, "source")?.parse()?,
                };
                Command::Create {
                    reference,
                    nik,
                    draft,
                }
            }
            CommandType::Approve => Command::Approve { reference },
            CommandType::Reject => Command::Reject {
                reference,
                reason: record
                    .reason
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string()),
            },
            CommandType::Activate => Command::Transition {
                reference,
                status: TransactionStatus::Active,
            },
            CommandType::Complete => Command::Transition {
                reference,
                status: TransactionStatus::Completed,
            },
            CommandType::Default => Command::Transition {
                reference,
                status: TransactionStatus::Defaulted,
            },
        };
        Ok(command)
    }
}

fn required(value: Option<String>, field: &'static str) -> std::result::Result<String, FieldError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(FieldError::Empty(field))
}

/// Reads lifecycle commands from a CSV source.
///
/// Whitespace is trimmed and rows may stop early, so `approve 7` style rows
/// need not carry the create-only columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts commands. A bad row yields an error without
    /// ending the stream.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result?;
            Command::try_from(record)
        })
    }
}
