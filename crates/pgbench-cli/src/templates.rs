//! Built-in query template catalogue for the benchmark schema.
//!
//! A real deployment loads templates from a profile file (out of scope,
//! §1); this fixed catalogue exists so the core is runnable standalone
//! and so the S1 burst-smoke scenario's `{point_select:40,
//! range_select:20, insert_tx:20, update_balance:20}` mix has a concrete
//! implementation to drive.

use std::sync::Arc;

use domain::{QueryKind, QueryTemplate, SqlParam, WeightedTemplates};

/// Build the default template table against known entity-count bounds.
#[must_use]
pub fn builtin_templates() -> WeightedTemplates {
    WeightedTemplates::new(vec![
        QueryTemplate {
            name: "point_select",
            kind: QueryKind::Read,
            weight: 40,
            sql: "SELECT account_id, balance FROM accounts WHERE account_id = $1",
            generate: Arc::new(|rng, stats| {
                use rand::Rng as _;
                let id = rng.random_range(1..=stats.accounts.max(1));
                #[allow(clippy::cast_possible_wrap)]
                vec![SqlParam::I64(id as i64)]
            }),
        },
        QueryTemplate {
            name: "range_select",
            kind: QueryKind::Read,
            weight: 20,
            sql: "SELECT transaction_id, amount FROM transactions \
                  WHERE account_id = $1 ORDER BY occurred_at DESC LIMIT 20",
            generate: Arc::new(|rng, stats| {
                use rand::Rng as _;
                let id = rng.random_range(1..=stats.accounts.max(1));
                #[allow(clippy::cast_possible_wrap)]
                vec![SqlParam::I64(id as i64)]
            }),
        },
        QueryTemplate {
            name: "insert_tx",
            kind: QueryKind::Write,
            weight: 20,
            sql: "INSERT INTO transactions (account_id, amount, kind, occurred_at) \
                  VALUES ($1, $2, $3, now())",
            generate: Arc::new(|rng, stats| {
                use rand::Rng as _;
                let account_id = rng.random_range(1..=stats.accounts.max(1));
                let amount = f64::from(rng.random_range(1u32..=100_000u32)) / 100.0;
                let kind = if rng.random_bool(0.5) { "debit" } else { "credit" };
                #[allow(clippy::cast_possible_wrap)]
                vec![
                    SqlParam::I64(account_id as i64),
                    SqlParam::F64(amount),
                    SqlParam::Text(kind.to_owned()),
                ]
            }),
        },
        QueryTemplate {
            name: "update_balance",
            kind: QueryKind::Write,
            weight: 20,
            sql: "UPDATE accounts SET balance = balance + $2 WHERE account_id = $1",
            generate: Arc::new(|rng, stats| {
                use rand::Rng as _;
                let account_id = rng.random_range(1..=stats.accounts.max(1));
                let delta = f64::from(rng.random_range(-10_000i32..=10_000i32)) / 100.0;
                #[allow(clippy::cast_possible_wrap)]
                vec![SqlParam::I64(account_id as i64), SqlParam::F64(delta)]
            }),
        },
    ])
}
