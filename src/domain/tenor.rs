//! Tenor policy: the fixed set of repayment terms a customer is onboarded with.
//!
//! Every function here is pure. The checks run once, at onboarding, before any
//! limit row exists; they never look at used amounts.

use crate::error::TenorPolicyError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tenors (in months) a customer must hold, in ascending order.
pub const ALLOWED_TENORS: [u32; 4] = [1, 2, 3, 4];

/// A repayment term in months, guaranteed to be one of [`ALLOWED_TENORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tenor(u32);

impl Tenor {
    pub fn months(&self) -> u32 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Tenor> {
        ALLOWED_TENORS.into_iter().map(Tenor)
    }
}

impl TryFrom<u32> for Tenor {
    type Error = TenorPolicyError;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        validate_single_tenor(months)
    }
}

impl From<Tenor> for u32 {
    fn from(tenor: Tenor) -> Self {
        tenor.0
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tenor paired with the limit requested for it, as submitted at onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenorLimit {
    pub tenor: u32,
    pub limit_amount: Decimal,
}

impl TenorLimit {
    pub fn new(tenor: u32, limit_amount: Decimal) -> Self {
        Self {
            tenor,
            limit_amount,
        }
    }
}

pub fn validate_single_tenor(months: u32) -> Result<Tenor, TenorPolicyError> {
    if ALLOWED_TENORS.contains(&months) {
        Ok(Tenor(months))
    } else {
        Err(TenorPolicyError::InvalidTenor(months))
    }
}

/// Checks that `tenors` is exactly {1, 2, 3, 4}, in any order.
///
/// A wrong count reports the missing tenors when there are any; otherwise the
/// offending element (invalid or repeated) is reported.
pub fn validate_complete_set(tenors: &[u32]) -> Result<(), TenorPolicyError> {
    if tenors.len() != ALLOWED_TENORS.len() {
        let missing = missing_tenors(tenors);
        if !missing.is_empty() {
            return Err(TenorPolicyError::IncompleteSet {
                provided: tenors.len(),
                missing,
            });
        }
    }

    for &tenor in tenors {
        validate_single_tenor(tenor)?;
    }

    let mut seen = BTreeSet::new();
    for &tenor in tenors {
        if !seen.insert(tenor) {
            return Err(TenorPolicyError::DuplicateTenor(tenor));
        }
    }

    let missing = missing_tenors(tenors);
    if !missing.is_empty() {
        return Err(TenorPolicyError::IncompleteSet {
            provided: tenors.len(),
            missing,
        });
    }

    Ok(())
}

pub fn validate_limit_amounts(pairs: &[TenorLimit]) -> Result<(), TenorPolicyError> {
    match pairs.iter().find(|pair| pair.limit_amount <= Decimal::ZERO) {
        Some(pair) => Err(TenorPolicyError::NonPositiveAmount { tenor: pair.tenor }),
        None => Ok(()),
    }
}

/// Full onboarding check: amounts first, then the tenor set.
pub fn validate_tenor_limits(pairs: &[TenorLimit]) -> Result<(), TenorPolicyError> {
    validate_limit_amounts(pairs)?;
    let tenors: Vec<u32> = pairs.iter().map(|pair| pair.tenor).collect();
    validate_complete_set(&tenors)
}

fn missing_tenors(provided: &[u32]) -> Vec<u32> {
    ALLOWED_TENORS
        .into_iter()
        .filter(|required| !provided.contains(required))
        .collect()
}
