//! Inbound AIS frame classification
//!
//! Frames look like:
//!
//! ```json
//! {"MessageType": "PositionReport",
//!  "Message": {"PositionReport": {"UserID": 244660000, "Latitude": 51.9, "Longitude": 4.1}}}
//! ```
//!
//! Only `PositionReport` and `ShipStaticData` are routed. Everything else,
//! including frames that fail to parse, is `Ignored`.

use crate::persistence::{PositionRecord, StaticRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const POSITION_REPORT: &str = "PositionReport";
pub const SHIP_STATIC_DATA: &str = "ShipStaticData";

#[derive(Debug, Clone, PartialEq)]
pub enum RoutedMessage {
    Position(PositionRecord),
    Static(StaticRecord),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    /// Not JSON, missing discriminant, or a body that doesn't match its kind
    Malformed(String),
    /// Valid frame of a kind this pipeline doesn't store
    UnhandledKind(String),
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::Malformed(msg) => write!(f, "malformed frame: {}", msg),
            IgnoreReason::UnhandledKind(kind) => write!(f, "unhandled message type: {}", kind),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "MessageType")]
    message_type: String,
    #[serde(rename = "Message", default)]
    message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PositionReportBody {
    #[serde(rename = "UserID")]
    user_id: i64,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ShipStaticBody {
    #[serde(rename = "UserID")]
    user_id: i64,
    #[serde(rename = "Type")]
    ship_type: TypeCode,
    #[serde(rename = "Destination")]
    destination: String,
    #[serde(rename = "Dimensions", default)]
    dimensions: Option<Dimensions>,
}

/// AIS ship type, sent as a number by the feed but tolerated as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeCode {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TypeCode {
    fn into_code_string(self) -> String {
        match self {
            TypeCode::Int(code) => code.to_string(),
            TypeCode::Float(code) => code.to_string(),
            TypeCode::Text(code) => code,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Dimensions {
    #[serde(rename = "A", default)]
    a: Option<f64>,
    #[serde(rename = "B", default)]
    b: Option<f64>,
    #[serde(rename = "C", default)]
    c: Option<f64>,
    #[serde(rename = "D", default)]
    d: Option<f64>,
}

/// Classify one raw frame, stamping records with `received_at`
pub fn classify(raw: &[u8], received_at: DateTime<Utc>) -> RoutedMessage {
    let frame: InboundFrame = match serde_json::from_slice(raw) {
        Ok(frame) => frame,
        Err(e) => return RoutedMessage::Ignored(IgnoreReason::Malformed(e.to_string())),
    };

    match frame.message_type.as_str() {
        POSITION_REPORT => match body::<PositionReportBody>(frame.message, POSITION_REPORT) {
            Ok(report) => RoutedMessage::Position(PositionRecord {
                ship_id: report.user_id,
                observed_at: received_at,
                latitude: report.latitude,
                longitude: report.longitude,
            }),
            Err(reason) => RoutedMessage::Ignored(reason),
        },
        SHIP_STATIC_DATA => match body::<ShipStaticBody>(frame.message, SHIP_STATIC_DATA) {
            Ok(data) => {
                let dims = data.dimensions.unwrap_or_default();
                RoutedMessage::Static(StaticRecord {
                    ship_id: data.user_id,
                    ship_type: data.ship_type.into_code_string(),
                    destination: data.destination,
                    last_update: received_at,
                    dim_a: dims.a,
                    dim_b: dims.b,
                    dim_c: dims.c,
                    dim_d: dims.d,
                })
            }
            Err(reason) => RoutedMessage::Ignored(reason),
        },
        other => RoutedMessage::Ignored(IgnoreReason::UnhandledKind(other.to_string())),
    }
}

/// Pull `Message.<kind>` out of the envelope and decode it
fn body<T: serde::de::DeserializeOwned>(
    mut message: serde_json::Value,
    kind: &str,
) -> Result<T, IgnoreReason> {
    let inner = message
        .get_mut(kind)
        .map(serde_json::Value::take)
        .ok_or_else(|| IgnoreReason::Malformed(format!("missing Message.{}", kind)))?;

    serde_json::from_value(inner)
        .map_err(|e| IgnoreReason::Malformed(format!("{} body: {}", kind, e)))
}
