//! Table statistics (§3): row counts read after load, used to bound
//! parameter generators to extant primary keys.

/// Row counts for the five benchmark-schema tables, read once after the
/// bulk load completes (or supplied directly when attaching to a
/// pre-populated database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStats {
    /// Row count of `account_types`.
    pub account_types: u64,
    /// Row count of `customers`.
    pub customers: u64,
    /// Row count of `branches`.
    pub branches: u64,
    /// Row count of `accounts`.
    pub accounts: u64,
    /// Row count of `transactions`.
    pub transactions: u64,
}

impl TableStats {
    /// Construct directly from known counts (e.g. from a prior load run).
    #[must_use]
    pub fn new(
        account_types: u64,
        customers: u64,
        branches: u64,
        accounts: u64,
        transactions: u64,
    ) -> Self {
        Self {
            account_types,
            customers,
            branches,
            accounts,
            transactions,
        }
    }
}
