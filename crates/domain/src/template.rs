//! Query templates: `{name, kind, weight, sql, parameter_generator}` (§3).
//!
//! Templates are immutable after executor construction; identity is a
//! `TemplateId` index (Design Note §9: typed identifier + name→index map,
//! not a string-keyed runtime registry).

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::stats::TableStats;

/// `read` or `write`, used by the Report Builder's read/write classification
/// and by the simulation profile's `read_write_split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// A query that only reads rows.
    Read,
    /// A query that mutates rows (insert/update/delete).
    Write,
}

/// Classify an operation name into `"read"`/`"write"` by the fixed name
/// set (§4.6): `point_select`, `range_select`, any name containing `join`
/// → read; everything else, including unrecognised names, → write.
/// Shared by the simulation executor's per-interval read/write counts and
/// the Report Builder's summary/latency breakdown, so both agree on one
/// classification.
#[must_use]
pub fn classify_read_write(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.contains("select") || lower.contains("join") {
        "read"
    } else {
        "write"
    }
}

/// A bound SQL parameter value, fed to `sqlx::query(...).bind(...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A signed 64-bit integer parameter.
    I64(i64),
    /// A double-precision float parameter.
    F64(f64),
    /// A text parameter.
    Text(String),
    /// A UUID parameter.
    Uuid(uuid::Uuid),
}

/// Opaque index into the executor's template vector. Cheap to copy, used
/// as the key for `OperationStats` lookups and error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(pub usize);

/// A pure function of a seeded RNG and the known entity-count bounds,
/// producing one row of positional bind parameters.
pub type ParamGenerator = Arc<dyn Fn(&mut StdRng, &TableStats) -> Vec<SqlParam> + Send + Sync>;

/// An immutable, weighted, parameterised SQL statement.
#[derive(Clone)]
pub struct QueryTemplate {
    /// Stable name used in reports and logs (e.g. `"point_select"`).
    pub name: &'static str,
    /// Read or write classification.
    pub kind: QueryKind,
    /// Relative selection weight; must be `>= 1`.
    pub weight: u32,
    /// SQL text with `$1, $2, ...` positional placeholders.
    pub sql: &'static str,
    /// Pure parameter generator bound to this template.
    pub generate: ParamGenerator,
}

impl fmt::Debug for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTemplate")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("weight", &self.weight)
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

/// A weighted-sampling table precomputed once at executor construction:
/// cumulative weight prefix sums over an (immutable) template vector.
///
/// Each selection is a single uniform draw over the total weight plus a
/// binary search (`partition_point`) into the prefix sums; ties on prefix
/// equality resolve to the earlier template index because
/// `partition_point` returns the first index whose prefix sum exceeds the
/// draw.
#[derive(Debug, Clone)]
pub struct WeightedTemplates {
    templates: Vec<QueryTemplate>,
    prefix_sums: Vec<u64>,
    total_weight: u64,
}

impl WeightedTemplates {
    /// Build the prefix-sum table from `templates`. Panics if `templates`
    /// is empty or any weight is zero (an executor construction-time
    /// invariant, not a runtime error).
    #[must_use]
    pub fn new(templates: Vec<QueryTemplate>) -> Self {
        assert!(!templates.is_empty(), "at least one query template is required");
        let mut prefix_sums = Vec::with_capacity(templates.len());
        let mut running = 0u64;
        for t in &templates {
            assert!(t.weight >= 1, "template {:?} has zero weight", t.name);
            running += u64::from(t.weight);
            prefix_sums.push(running);
        }
        Self {
            templates,
            prefix_sums,
            total_weight: running,
        }
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether there are no templates (never true after `new` succeeds).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// All templates, in construction order; index is the `TemplateId`.
    #[must_use]
    pub fn templates(&self) -> &[QueryTemplate] {
        &self.templates
    }

    /// Look up a template by id.
    #[must_use]
    pub fn get(&self, id: TemplateId) -> &QueryTemplate {
        &self.templates[id.0]
    }

    /// Draw one `TemplateId` uniformly at random over the cumulative
    /// weights, using `rng`.
    #[must_use]
    pub fn sample(&self, rng: &mut StdRng) -> TemplateId {
        use rand::Rng as _;
        let draw = rng.random_range(0..self.total_weight) + 1;
        let idx = self.prefix_sums.partition_point(|&cum| cum < draw);
        TemplateId(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryKind, QueryTemplate, SqlParam, WeightedTemplates};
    use rand::{rngs::StdRng, SeedableRng as _};
    use std::sync::Arc;

    fn template(name: &'static str, weight: u32) -> QueryTemplate {
        QueryTemplate {
            name,
            kind: QueryKind::Read,
            weight,
            sql: "SELECT 1",
            generate: Arc::new(|_, _| vec![SqlParam::I64(1)]),
        }
    }

    #[test]
    fn weighted_sampling_respects_distribution() {
        // weights {3, 2, 1} -> expected frequencies 0.5 / 0.333 / 0.167.
        let table = WeightedTemplates::new(vec![
            template("a", 3),
            template("b", 2),
            template("c", 1),
        ]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u64; 3];
        const N: u64 = 1_000_000;
        for _ in 0..N {
            let id = table.sample(&mut rng);
            counts[id.0] += 1;
        }
        let freqs: Vec<f64> = counts.iter().map(|&c| c as f64 / N as f64).collect();
        assert!((freqs[0] - 0.5).abs() < 0.01, "freq[0]={}", freqs[0]);
        assert!((freqs[1] - 0.3333).abs() < 0.01, "freq[1]={}", freqs[1]);
        assert!((freqs[2] - 0.1667).abs() < 0.01, "freq[2]={}", freqs[2]);
    }

    #[test]
    fn single_template_always_selected() {
        let table = WeightedTemplates::new(vec![template("only", 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(table.sample(&mut rng).0, 0);
        }
    }

    #[test]
    #[should_panic(expected = "at least one query template")]
    fn empty_templates_panics() {
        let _ = WeightedTemplates::new(vec![]);
    }
}
