//! Simulation profile: activity curve + events (§3).
//!
//! The YAML parser that populates these types from a profile file is out
//! of scope (spec §1); the core only consumes the resulting structs, so
//! they derive `serde::Deserialize` for the external collaborator to
//! populate and `serde::Serialize` so the report can echo `profile_used`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One minute-of-day's activity level: `(hour, minute) -> {base_qps,
/// read_write_split, burstiness}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityPoint {
    /// Baseline target queries-per-second at this minute of day.
    pub base_qps: f64,
    /// Fraction of queries that are reads, in `[0, 1]`.
    pub read_write_split: f64,
    /// Multiplicative noise factor applied by the curve sampler, `>= 0`.
    pub burstiness: f64,
}

/// A named, logical-time-windowed perturbation to the target QPS curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, echoed in `events_triggered`.
    pub name: String,
    /// Offset from `sim_start` at which the event becomes active.
    pub start_offset_secs: i64,
    /// Offset from `sim_start` at which the event stops being active.
    pub end_offset_secs: i64,
    /// Multiplicative QPS factor applied while active.
    pub qps_multiplier: f64,
    /// Additive write-bias shift applied while active, clamped to `[0,
    /// 1]` when combined with the curve's `read_write_split`.
    #[serde(default)]
    pub write_bias: Option<f64>,
    /// If set, a probabilistic event: drawn once at `start_offset_secs`
    /// from the master RNG; `None` means the event always triggers.
    #[serde(default)]
    pub probability: Option<f64>,
    /// Whether this event repeats every `period_secs` across the run.
    #[serde(default)]
    pub period_secs: Option<i64>,
}

/// Named catalogue of the activity curve plus its events (§3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    /// Profile name, echoed as `profile_used` in the report.
    pub name: String,
    /// Profile format version.
    pub version: String,
    /// Activity curve, keyed by `"HH:MM"` minute-of-day.
    pub curve: HashMap<String, ActivityPoint>,
    /// Scheduled events.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl SimulationProfile {
    /// Look up the curve point for a given hour/minute, falling back to the
    /// nearest earlier minute if the exact key is absent (a profile need
    /// not specify every minute of the day).
    #[must_use]
    pub fn curve_at(&self, hour: u32, minute: u32) -> Option<ActivityPoint> {
        let key = format!("{hour:02}:{minute:02}");
        if let Some(point) = self.curve.get(&key) {
            return Some(*point);
        }
        // Fall back to the closest minute at or before (hour, minute) in the
        // same day, wrapping to the latest entry if none precedes it.
        let target = hour * 60 + minute;
        self.curve
            .iter()
            .filter_map(|(k, v)| {
                let (h, m) = k.split_once(':')?;
                let h: u32 = h.parse().ok()?;
                let m: u32 = m.parse().ok()?;
                let t = h * 60 + m;
                (t <= target).then_some((t, *v))
            })
            .max_by_key(|(t, _)| *t)
            .map(|(_, v)| v)
            .or_else(|| {
                self.curve
                    .iter()
                    .filter_map(|(k, v)| {
                        let (h, m) = k.split_once(':')?;
                        let h: u32 = h.parse().ok()?;
                        let m: u32 = m.parse().ok()?;
                        Some((h * 60 + m, *v))
                    })
                    .max_by_key(|(t, _)| *t)
                    .map(|(_, v)| v)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityPoint, SimulationProfile};
    use std::collections::HashMap;

    fn point(qps: f64) -> ActivityPoint {
        ActivityPoint {
            base_qps: qps,
            read_write_split: 0.8,
            burstiness: 1.0,
        }
    }

    #[test]
    fn curve_at_exact_minute() {
        let mut curve = HashMap::new();
        curve.insert("09:00".to_owned(), point(100.0));
        let profile = SimulationProfile {
            name: "test".to_owned(),
            version: "1".to_owned(),
            curve,
            events: vec![],
        };
        assert_eq!(profile.curve_at(9, 0).unwrap().base_qps, 100.0);
    }

    #[test]
    fn curve_at_falls_back_to_earlier_minute() {
        let mut curve = HashMap::new();
        curve.insert("09:00".to_owned(), point(100.0));
        curve.insert("10:00".to_owned(), point(200.0));
        let profile = SimulationProfile {
            name: "test".to_owned(),
            version: "1".to_owned(),
            curve,
            events: vec![],
        };
        assert_eq!(profile.curve_at(9, 30).unwrap().base_qps, 100.0);
    }
}
