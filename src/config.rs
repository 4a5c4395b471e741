use std::time::Duration;

pub const DEFAULT_CONTRACT_PREFIX: &str = "XYZ";
pub const DEFAULT_MAX_CONCURRENT_CREATIONS: usize = 10;
pub const DEFAULT_ADMISSION_WAIT: Duration = Duration::from_secs(10);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCK_TABLE_CAPACITY: usize = 10_000;
pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Settings for one lending service instance.
///
/// Built once at startup and handed to the components that need it; nothing
/// reads configuration from global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingConfig {
    /// Prefix of generated contract numbers.
    pub contract_prefix: String,
    /// Transaction creations allowed in flight at once in this process.
    pub max_concurrent_creations: usize,
    /// How long a creation may wait for an admission slot and its customer's
    /// turn before failing with a concurrency timeout.
    pub admission_wait: Duration,
    /// Wall-clock bound for a whole creation.
    pub operation_timeout: Duration,
    /// Idle per-customer lock handles are pruned once the table grows past
    /// this size.
    pub lock_table_capacity: usize,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            contract_prefix: DEFAULT_CONTRACT_PREFIX.to_string(),
            max_concurrent_creations: DEFAULT_MAX_CONCURRENT_CREATIONS,
            admission_wait: DEFAULT_ADMISSION_WAIT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            lock_table_capacity: DEFAULT_LOCK_TABLE_CAPACITY,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl LendingConfig {
    /// Clamps a requested page size: `0` means the default, anything above the
    /// maximum is cut down to it.
    pub fn page_limit(&self, requested: usize) -> usize {
        match requested {
            0 => self.default_page_limit,
            n => n.min(self.max_page_limit),
        }
    }
}
