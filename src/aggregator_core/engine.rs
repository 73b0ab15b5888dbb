//! Windowed vessel-count aggregation
//!
//! Reads raw positions for a window, joins the stored static row per ship and
//! upserts one `CountAggregate` keyed by the window start.

use super::category::VesselCategory;
use super::window::Window;
use crate::persistence::{CountAggregate, GatewayError, PersistenceGateway, PositionRecord, StaticRecord};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug)]
pub enum AggregationError {
    Gateway(GatewayError),
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl From<GatewayError> for AggregationError {
    fn from(err: GatewayError) -> Self {
        AggregationError::Gateway(err)
    }
}

impl std::fmt::Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::Gateway(e) => write!(f, "Aggregation failed: {}", e),
            AggregationError::InvalidWindow { start, end } => {
                write!(f, "Invalid window: start {} is not before end {}", start, end)
            }
        }
    }
}

impl std::error::Error for AggregationError {}

pub struct AggregationEngine {
    gateway: Arc<dyn PersistenceGateway>,
}

impl AggregationEngine {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Compute and persist counts for positions observed in `[start, end)`
    ///
    /// Nothing is written if any read fails. Re-running over unchanged
    /// positions and static rows yields the same aggregate.
    pub async fn aggregate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CountAggregate, AggregationError> {
        if start >= end {
            return Err(AggregationError::InvalidWindow { start, end });
        }

        log::info!("🧮 Aggregating window {} → {}", start.to_rfc3339(), end.to_rfc3339());

        let positions = self.gateway.read_positions_in_window(start, end).await?;
        let ship_ids: Vec<i64> = distinct_ship_ids(&positions).into_iter().collect();
        let statics = self.gateway.read_static_by_ship_ids(&ship_ids).await?;

        let aggregate = count_vessels(start, &positions, &statics);

        self.gateway.upsert_count_aggregate(&aggregate).await?;

        log::info!(
            "✅ Counts: total={} cargo={} tanker={} passenger={} ({} positions)",
            aggregate.total,
            aggregate.cargo,
            aggregate.tanker,
            aggregate.passenger,
            positions.len()
        );

        Ok(aggregate)
    }

    pub async fn aggregate_window(&self, window: &Window) -> Result<CountAggregate, AggregationError> {
        self.aggregate(window.start, window.end).await
    }
}

fn distinct_ship_ids(positions: &[PositionRecord]) -> BTreeSet<i64> {
    positions.iter().map(|p| p.ship_id).collect()
}

/// Count distinct ships in `positions` by category
///
/// Every distinct ship counts toward `total`, including ships with no static
/// row. `statics` rows for ships absent from `positions` are ignored.
pub fn count_vessels(
    batch_start: DateTime<Utc>,
    positions: &[PositionRecord],
    statics: &[StaticRecord],
) -> CountAggregate {
    let types: HashMap<i64, &str> = statics
        .iter()
        .map(|s| (s.ship_id, s.ship_type.as_str()))
        .collect();

    let mut aggregate = CountAggregate::empty(batch_start);

    for ship_id in distinct_ship_ids(positions) {
        aggregate.total += 1;

        let category = types
            .get(&ship_id)
            .map(|ship_type| VesselCategory::from_ship_type(ship_type))
            .unwrap_or(VesselCategory::Other);

        match category {
            VesselCategory::Cargo => aggregate.cargo += 1,
            VesselCategory::Tanker => aggregate.tanker += 1,
            VesselCategory::Passenger => aggregate.passenger += 1,
            VesselCategory::Other => {}
        }
    }

    aggregate
}
