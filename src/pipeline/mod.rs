//! # Ingestion + aggregation pipeline
//!
//! Wires the stream session, the retrying runner and the aggregation engine
//! into one cycle, and optionally repeats that cycle on a fixed interval.
//!
//! ## Cycle order
//!
//! 1. `ensure_schema` (idempotent)
//! 2. One retried ingestion session of fixed duration
//! 3. Aggregation for the 5-minute window containing "now"
//!
//! ## Module Organization
//!
//! - `config` - Environment-driven settings
//! - `cycle` - One ingestion + aggregation pass
//! - `scheduler` - Fixed-interval repetition until shutdown

pub mod config;
pub mod cycle;
pub mod scheduler;

pub use config::{ConfigError, PipelineConfig};
pub use cycle::{CycleError, CycleReport, IngestionCycle};
pub use scheduler::{run_scheduled, SchedulerStats};
