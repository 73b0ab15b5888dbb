//! Aggregator Core - windowed vessel counts
//!
//! # Architecture
//!
//! ```text
//! now → aligned_window() → [start, end)
//!     ↓
//! PersistenceGateway::read_positions_in_window
//!     ↓ distinct ship ids
//! PersistenceGateway::read_static_by_ship_ids
//!     ↓
//! count_vessels (VesselCategory per ship_type)
//!     ↓
//! PersistenceGateway::upsert_count_aggregate → ship_count_agg
//! ```

pub mod category;
pub mod engine;
pub mod window;

pub use category::VesselCategory;
pub use engine::{count_vessels, AggregationEngine, AggregationError};
pub use window::{aligned_window, Window, WINDOW_MINUTES};
