//! Shared domain types for the Postgres load-generation engine.
//!
//! Defines the query-template model, table statistics, configuration
//! shapes, time-source abstraction, error taxonomy, and the point-in-time
//! snapshot/status types every other crate exchanges across its ports.
//! No other workspace crate is imported here.

pub mod clock;
pub mod config;
pub mod error;
pub mod profile;
pub mod size;
pub mod snapshot;
pub mod status;
pub mod stats;
pub mod template;

pub use clock::{Clock, FrozenClock, RealClock, SimulatedClock};
pub use config::{DbConfig, EngineConfig, OutputConfig, PreloadConfig, WorkloadConfig, WorkloadMode};
pub use error::{classify_sqlx_error, ErrorClass, ErrorKind};
pub use profile::{ActivityPoint, Event, SimulationProfile};
pub use size::{parse_size, SizeParseError};
pub use snapshot::{LatencySummary, LatencySummaryMs, OperationSnapshot, Snapshot};
pub use stats::TableStats;
pub use status::{SimulationStatus, TimelineInterval};
pub use template::{
    classify_read_write, ParamGenerator, QueryKind, QueryTemplate, SqlParam, TemplateId,
    WeightedTemplates,
};
