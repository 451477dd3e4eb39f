//! An in-memory collector for geolocated traffic records.
//!
//! Records arrive one at a time over `POST /receive` and are appended to a
//! shared [`store::TrafficStore`]. `GET /data` returns everything received so
//! far, in arrival order.
//!
//! # Example
//!
//! ```rust,no_run
//! use traffic_collector::{api, store::TrafficStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = api::router(TrafficStore::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};

pub mod api;
pub mod store;

/// Default port the collector listens on.
pub const DEFAULT_PORT: u16 = 5000;

/// Typed view of a single traffic observation.
///
/// Every named field is optional so that any JSON object with well-typed
/// fields is accepted. Unknown keys are ignored here; the collector validates
/// inbound payloads against this type but stores the payload itself, untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TrafficRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// ISO-8601 date-time, without offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// 0 or 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<u8>,
}

impl TrafficRecord {
    /// Source IP for log lines, or `"unknown"` if the sender didn't include one.
    pub fn source(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }

    pub fn is_suspicious(&self) -> bool {
        self.suspicious == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_skips_absent_fields() {
        let raw = json!({
            "ip_address": "1.2.3.4",
            "latitude": 10.0,
            "country": "NL",
        });
        let record: TrafficRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(record.longitude, None);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"ip_address": "1.2.3.4", "latitude": 10.0})
        );
    }

    #[test]
    fn test_source_placeholder() {
        let record = TrafficRecord::default();
        assert_eq!(record.source(), "unknown");
        assert!(!record.is_suspicious());
    }
}
