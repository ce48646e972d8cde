//! Dataset sizing from a target byte budget (§4.3).

use domain::TableStats;

/// Approximate on-disk row sizes, including indexes, in bytes.
const CUSTOMER_ROW_BYTES: u64 = 350;
const BRANCH_ROW_BYTES: u64 = 300;
const ACCOUNT_ROW_BYTES: u64 = 250;
const TRANSACTION_ROW_BYTES: u64 = 150;

/// Transactions receive ~66% of the byte budget; the remainder is spread
/// across the other tables via the fixed ratios below.
const TRANSACTION_BUDGET_FRACTION: f64 = 0.66;

/// 1 customer : 2 accounts.
const ACCOUNTS_PER_CUSTOMER: u64 = 2;
/// 1 branch per 200 accounts.
const ACCOUNTS_PER_BRANCH: u64 = 200;
/// 10 transactions per account.
const TRANSACTIONS_PER_ACCOUNT: u64 = 10;

const MIN_CUSTOMERS: u64 = 5_000;
const MIN_BRANCHES: u64 = 50;
const MIN_ACCOUNTS: u64 = 10_000;

/// Row count for the static `account_types` reference table.
pub const ACCOUNT_TYPE_COUNT: u64 = 8;

/// Derive row counts for every table from a target total dataset size.
///
/// Transactions get `TRANSACTION_BUDGET_FRACTION` of `target_size_bytes`;
/// the rest is apportioned across customers/branches/accounts by the
/// fixed ratios above. Minimums (§4.3) are enforced after the byte-driven
/// estimate, so a small `target_size_bytes` still produces a usable
/// dataset; actual row counts are never reduced below the estimate due to
/// rounding (never fewer rows than the estimate, per §4.3's invariant).
#[must_use]
pub fn estimate_table_stats(target_size_bytes: u64) -> TableStats {
    #[allow(clippy::cast_precision_loss)]
    let transaction_bytes = (target_size_bytes as f64 * TRANSACTION_BUDGET_FRACTION) as u64;
    let remaining_bytes = target_size_bytes.saturating_sub(transaction_bytes);

    // Split remaining_bytes across customer/branch/account rows using the
    // fixed ratio as an equivalent "weighted row" of
    // (CUSTOMER + ACCOUNTS_PER_CUSTOMER*ACCOUNT + ACCOUNT/ACCOUNTS_PER_BRANCH*BRANCH) bytes.
    let weighted_unit_bytes = CUSTOMER_ROW_BYTES
        + ACCOUNTS_PER_CUSTOMER * ACCOUNT_ROW_BYTES
        + (ACCOUNTS_PER_CUSTOMER * ACCOUNT_ROW_BYTES) / ACCOUNTS_PER_BRANCH * BRANCH_ROW_BYTES
            / ACCOUNT_ROW_BYTES.max(1);
    let weighted_unit_bytes = weighted_unit_bytes.max(1);
    let units = remaining_bytes / weighted_unit_bytes;

    let customers = units.max(MIN_CUSTOMERS);
    let accounts = (customers * ACCOUNTS_PER_CUSTOMER).max(MIN_ACCOUNTS);
    let branches = (accounts / ACCOUNTS_PER_BRANCH).max(MIN_BRANCHES);
    let transactions_from_bytes = transaction_bytes / TRANSACTION_ROW_BYTES;
    let transactions = transactions_from_bytes.max(accounts * TRANSACTIONS_PER_ACCOUNT);

    TableStats::new(ACCOUNT_TYPE_COUNT, customers, branches, accounts, transactions)
}

#[cfg(test)]
mod tests {
    use super::{estimate_table_stats, MIN_ACCOUNTS, MIN_BRANCHES, MIN_CUSTOMERS};

    #[test]
    fn tiny_budget_still_meets_minimums() {
        let stats = estimate_table_stats(1_024);
        assert!(stats.customers >= MIN_CUSTOMERS);
        assert!(stats.branches >= MIN_BRANCHES);
        assert!(stats.accounts >= MIN_ACCOUNTS);
    }

    #[test]
    fn larger_budget_scales_past_minimums() {
        let stats = estimate_table_stats(10 * 1024 * 1024 * 1024);
        assert!(stats.customers > MIN_CUSTOMERS);
        assert_eq!(stats.accounts, stats.customers * 2);
    }

    #[test]
    fn transactions_cover_ten_per_account() {
        let stats = estimate_table_stats(50 * 1024 * 1024 * 1024);
        assert!(stats.transactions >= stats.accounts * 10);
    }
}
