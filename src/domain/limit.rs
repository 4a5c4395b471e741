use crate::domain::money::Money;
use crate::domain::tenor::Tenor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of a limit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LimitKey {
    pub customer_id: u64,
    pub tenor: Tenor,
}

impl LimitKey {
    pub fn new(customer_id: u64, tenor: Tenor) -> Self {
        Self { customer_id, tenor }
    }

    /// Big-endian encoding, so keys of one customer sort together by tenor.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        bytes[..8].copy_from_slice(&self.customer_id.to_be_bytes());
        bytes[8..].copy_from_slice(&self.tenor.months().to_be_bytes());
        bytes
    }
}

/// The credit granted to a customer for one tenor, and how much of it is
/// committed to live transactions.
///
/// `limit_amount` is fixed at onboarding. `used_amount` is written only by the
/// limit ledger and always satisfies `0 <= used_amount <= limit_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLimit {
    pub customer_id: u64,
    pub tenor: Tenor,
    pub limit_amount: Money,
    pub used_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerLimit {
    pub fn new(customer_id: u64, tenor: Tenor, limit_amount: Money, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            tenor,
            limit_amount,
            used_amount: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> LimitKey {
        LimitKey::new(self.customer_id, self.tenor)
    }

    /// Always derived from the two stored figures.
    pub fn available_amount(&self) -> Money {
        self.limit_amount - self.used_amount
    }
}
