use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

const SEQUENCE_MODULUS: u64 = 1_000_000;

/// Generates contract numbers of the form `<prefix><unix-seconds><sequence>`,
/// the sequence being six digits from a process-wide counter.
///
/// Two numbers from one generator only collide after a million numbers within
/// the same second. Across processes the transaction store's uniqueness check
/// is the backstop; callers regenerate on a duplicate.
#[derive(Debug)]
pub struct ContractNumberGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl ContractNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next_at(&self, at: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) % SEQUENCE_MODULUS;
        format!("{}{}{:06}", self.prefix, at.timestamp(), seq)
    }
}
