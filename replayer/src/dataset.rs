//! Loading the traffic dataset into replay order.

use std::{fs::File, io::Read, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::Deserialize;
use traffic_collector::TrafficRecord;

/// One line of the source CSV, exactly as it appears on disk.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "ip address")]
    ip_address: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    /// Seconds since the unix epoch, possibly fractional
    #[serde(rename = "Timestamp")]
    timestamp: f64,
    /// Usually written as 0.0 / 1.0
    suspicious: f64,
}

/// A dataset row after timestamp conversion and flag coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRow {
    pub ip_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
    pub suspicious: u8,
}

impl ReplayRow {
    fn from_csv(row: CsvRow) -> Result<Self> {
        Ok(Self {
            timestamp: epoch_to_datetime(row.timestamp)?,
            suspicious: coerce_flag(row.suspicious)?,
            ip_address: row.ip_address,
            latitude: row.latitude,
            longitude: row.longitude,
        })
    }

    /// The payload sent to the collector for this row.
    pub fn to_record(&self) -> TrafficRecord {
        TrafficRecord {
            ip_address: Some(self.ip_address.clone()),
            latitude: Some(self.latitude),
            longitude: Some(self.longitude),
            timestamp: Some(format_timestamp(&self.timestamp)),
            suspicious: Some(self.suspicious),
            ..Default::default()
        }
    }
}

/// Read the dataset at `path` and return its rows in replay order.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayRow>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open dataset {}", path.display()))?;
    read_rows(file).with_context(|| format!("failed to read dataset {}", path.display()))
}

/// Parse CSV rows from any reader and sort them ascending by timestamp.
///
/// The sort is stable, so rows sharing a timestamp keep their file order.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ReplayRow>> {
    let mut reader = csv::Reader::from_reader(reader);

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let row = ReplayRow::from_csv(row).with_context(|| format!("invalid data row {}", i + 1))?;
        rows.push(row);
    }

    rows.sort_by_key(|row| row.timestamp);
    Ok(rows)
}

/// Convert epoch seconds to a UTC date-time, keeping any fractional part.
pub fn epoch_to_datetime(seconds: f64) -> Result<NaiveDateTime> {
    if !seconds.is_finite() {
        bail!("timestamp is not a finite number: {}", seconds);
    }

    let mut whole = seconds.floor();
    let mut nanos = ((seconds - whole) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        whole += 1.0;
        nanos = 0;
    }

    DateTime::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| anyhow!("timestamp out of range: {}", seconds))
}

/// ISO-8601 without offset; a microsecond fraction is only added when needed.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Truncate a float flag (`1.0`, `0.0`) to the integer the collector expects.
fn coerce_flag(value: f64) -> Result<u8> {
    if !value.is_finite() {
        bail!("suspicious flag is not a finite number: {}", value);
    }
    match value.trunc() as i64 {
        0 => Ok(0),
        1 => Ok(1),
        other => bail!("suspicious flag must be 0 or 1, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ip address,Latitude,Longitude,Timestamp,suspicious\n";

    fn rows(body: &str) -> Result<Vec<ReplayRow>> {
        read_rows(format!("{}{}", HEADER, body).as_bytes())
    }

    #[test]
    fn test_parses_and_coerces() {
        let rows = rows("1.2.3.4,10.0,20.0,1704067200,1.0\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ip_address, "1.2.3.4");
        assert_eq!(rows[0].latitude, 10.0);
        assert_eq!(rows[0].longitude, 20.0);
        assert_eq!(format_timestamp(&rows[0].timestamp), "2024-01-01T00:00:00");
        assert_eq!(rows[0].suspicious, 1);
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let rows = rows(
            "c,0,0,1704067300,0\n\
             a,0,0,1704067100,0\n\
             b,0,0,1704067200,0\n",
        )
        .unwrap();
        let ips: Vec<_> = rows.iter().map(|r| r.ip_address.as_str()).collect();
        assert_eq!(ips, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let rows = rows(
            "first,0,0,1704067200,0\n\
             early,0,0,1704067100,0\n\
             second,0,0,1704067200,1\n\
             third,0,0,1704067200,0\n",
        )
        .unwrap();
        let ips: Vec<_> = rows.iter().map(|r| r.ip_address.as_str()).collect();
        assert_eq!(ips, vec!["early", "first", "second", "third"]);
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(rows("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let err = read_rows("ip address,Latitude,Timestamp,suspicious\n1.2.3.4,1,2,0\n".as_bytes())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Longitude"));
    }

    #[test]
    fn test_bad_flag_is_an_error() {
        assert!(rows("1.2.3.4,0,0,1704067200,3\n").is_err());
        assert!(rows("1.2.3.4,0,0,1704067200,nan\n").is_err());
    }

    #[test]
    fn test_fractional_timestamps() {
        let ts = epoch_to_datetime(1704067200.5).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00.500000");

        let ts = epoch_to_datetime(1704067200.25).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00.250000");

        let ts = epoch_to_datetime(0.0).unwrap();
        assert_eq!(format_timestamp(&ts), "1970-01-01T00:00:00");
    }

    #[test]
    fn test_non_finite_timestamp_is_an_error() {
        assert!(epoch_to_datetime(f64::NAN).is_err());
        assert!(epoch_to_datetime(f64::INFINITY).is_err());
    }

    #[test]
    fn test_to_record() {
        let row = rows("9.9.9.9,-33.5,151.25,1704067200,0.0\n").unwrap().remove(0);
        let record = row.to_record();
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "ip_address": "9.9.9.9",
                "latitude": -33.5,
                "longitude": 151.25,
                "timestamp": "2024-01-01T00:00:00",
                "suspicious": 0
            })
        );
    }
}
