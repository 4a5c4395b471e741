use crate::domain::money::{Amount, Money};
use crate::domain::tenor::Tenor;
use crate::error::FieldError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Completed,
    Defaulted,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Defaulted => "DEFAULTED",
        }
    }

    /// `PENDING -> {APPROVED, REJECTED}`, `APPROVED -> ACTIVE`,
    /// `ACTIVE -> {COMPLETED, DEFAULTED}`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Active)
                | (Active, Completed)
                | (Active, Defaulted)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "DEFAULTED" => Ok(Self::Defaulted),
            _ => Err(FieldError::Status(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    WhiteGoods,
    Motor,
    Mobil,
}

impl FromStr for AssetType {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "WHITE_GOODS" => Ok(Self::WhiteGoods),
            "MOTOR" => Ok(Self::Motor),
            "MOBIL" => Ok(Self::Mobil),
            other => Err(FieldError::AssetType(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSource {
    Ecommerce,
    Web,
    Dealer,
}

impl FromStr for TransactionSource {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ECOMMERCE" => Ok(Self::Ecommerce),
            "WEB" => Ok(Self::Web),
            "DEALER" => Ok(Self::Dealer),
            other => Err(FieldError::Source(other.to_string())),
        }
    }
}

/// A request to finance a purchase against the customer's limit for `tenor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub customer_id: u64,
    pub tenor_months: u32,
    pub otr_amount: Decimal,
    pub admin_fee: Decimal,
    pub interest_amount: Decimal,
    /// Derived from the other amounts when absent.
    pub installment_amount: Option<Decimal>,
    pub asset_name: String,
    pub asset_type: AssetType,
    pub source: TransactionSource,
}

impl NewTransaction {
    /// Field checks that do not need storage: positive OTR, non-negative fees,
    /// a named asset.
    pub fn validate_amounts(&self) -> Result<Amount, FieldError> {
        let otr = Amount::new(self.otr_amount).map_err(|_| FieldError::NonPositive("otr_amount"))?;
        if self.admin_fee < Decimal::ZERO {
            return Err(FieldError::Negative("admin_fee"));
        }
        if self.interest_amount < Decimal::ZERO {
            return Err(FieldError::Negative("interest_amount"));
        }
        if let Some(installment) = self.installment_amount
            && installment < Decimal::ZERO
        {
            return Err(FieldError::Negative("installment_amount"));
        }
        if self.asset_name.trim().is_empty() {
            return Err(FieldError::Empty("asset_name"));
        }
        Ok(otr)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transaction {
    pub id: u64,
    pub contract_number: String,
    pub customer_id: u64,
    pub tenor: Tenor,
    /// Principal; the amount reserved against the customer's limit.
    pub otr_amount: Money,
    pub admin_fee: Money,
    pub interest_amount: Money,
    pub installment_amount: Money,
    pub asset_name: String,
    pub asset_type: AssetType,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    #[serde(default)]
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A compare-and-set status change, applied by the transaction store only if
/// the stored status still equals `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: u64,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeOutcome {
    Applied(Transaction),
    /// The stored status was not `from`; nothing was written.
    Conflict(TransactionStatus),
    Missing,
}

/// `round((otr + admin_fee + interest) / tenor, 2)`.
pub fn installment_amount(otr: Money, admin_fee: Money, interest: Money, tenor: Tenor) -> Money {
    let total = otr + admin_fee + interest;
    Money::new(total.value() / Decimal::from(tenor.months())).round_cents()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tenor::validate_single_tenor;
    use rust_decimal_macros::dec;

    fn request() -> NewTransaction {
        NewTransaction {
            customer_id: 1,
            tenor_months: 3,
            otr_amount: dec!(500000),
            admin_fee: dec!(50000),
            interest_amount: dec!(25000),
            installment_amount: None,
            asset_name: "Kulkas 2 Pintu".to_string(),
            asset_type: AssetType::WhiteGoods,
            source: TransactionSource::Ecommerce,
        }
    }

    #[test]
    fn test_installment_derivation() {
        let tenor = validate_single_tenor(3).unwrap();
        let installment = installment_amount(
            Money::new(dec!(500000)),
            Money::new(dec!(50000)),
            Money::new(dec!(25000)),
            tenor,
        );
        assert_eq!(installment, Money::new(dec!(191666.67)));
    }

    #[test]
    fn test_installment_single_month_is_total() {
        let tenor = validate_single_tenor(1).unwrap();
        let installment = installment_amount(
            Money::new(dec!(100)),
            Money::new(dec!(10)),
            Money::new(dec!(5)),
            tenor,
        );
        assert_eq!(installment, Money::new(dec!(115)));
    }

    #[test]
    fn test_state_machine_edges() {
        use TransactionStatus::*;
        let all = [Pending, Approved, Rejected, Active, Completed, Defaulted];
        let legal = [
            (Pending, Approved),
            (Pending, Rejected),
            (Approved, Active),
            (Active, Completed),
            (Active, Defaulted),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use TransactionStatus::*;
        for status in [Rejected, Completed, Defaulted] {
            for to in [Pending, Approved, Rejected, Active, Completed, Defaulted] {
                assert!(!status.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("MOTOR".parse::<AssetType>(), Ok(AssetType::Motor));
        assert_eq!(
            "BOAT".parse::<AssetType>(),
            Err(FieldError::AssetType("BOAT".to_string()))
        );
        assert_eq!("DEALER".parse::<TransactionSource>(), Ok(TransactionSource::Dealer));
        assert_eq!("active".parse::<TransactionStatus>(), Ok(TransactionStatus::Active));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TransactionStatus::Defaulted).unwrap();
        assert_eq!(json, "\"DEFAULTED\"");
        let json = serde_json::to_string(&AssetType::WhiteGoods).unwrap();
        assert_eq!(json, "\"WHITE_GOODS\"");
    }

    #[test]
    fn test_request_amount_checks() {
        assert_eq!(request().validate_amounts().unwrap().value(), dec!(500000));

        let mut r = request();
        r.otr_amount = dec!(0);
        assert_eq!(r.validate_amounts(), Err(FieldError::NonPositive("otr_amount")));

        let mut r = request();
        r.admin_fee = dec!(-1);
        assert_eq!(r.validate_amounts(), Err(FieldError::Negative("admin_fee")));

        let mut r = request();
        r.asset_name = String::new();
        assert_eq!(r.validate_amounts(), Err(FieldError::Empty("asset_name")));
    }
}
