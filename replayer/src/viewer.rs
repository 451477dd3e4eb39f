//! Reading the collector back: what arrived, and from where most often.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use traffic_collector::TrafficRecord;
use url::Url;

/// Collector read endpoint used when none is given.
pub const DEFAULT_DATA_URL: &str = "http://localhost:5000/data";

/// Fetch everything the collector has received so far.
pub async fn fetch_records(client: &reqwest::Client, url: &Url) -> Result<Vec<TrafficRecord>> {
    let res = client.get(url.clone()).send().await?;
    let res = res.error_for_status()?;
    let bytes = res.bytes().await?;

    let de = &mut serde_json::Deserializer::from_slice(&bytes);
    let records: Vec<TrafficRecord> = serde_path_to_error::deserialize(de)?;
    Ok(records)
}

/// Records whose source hasn't been seen before, in arrival order.
///
/// Only the first record per source is returned; records without a source
/// are skipped.
pub fn new_arrivals<'a>(
    seen: &mut HashSet<String>,
    records: &'a [TrafficRecord],
) -> Vec<&'a TrafficRecord> {
    records
        .iter()
        .filter(|r| match &r.ip_address {
            Some(ip) => seen.insert(ip.clone()),
            None => false,
        })
        .collect()
}

/// Poll `url` every `interval` and hand each newly seen source to
/// `on_arrival`, until `cancel` fires. Returns how many sources were seen.
///
/// Cancellation also interrupts a fetch in flight, so a collector that stops
/// answering can't hold the loop open. Failed fetches are logged and retried
/// on the next tick.
pub async fn watch<F>(
    client: &reqwest::Client,
    url: &Url,
    interval: Duration,
    cancel: &CancellationToken,
    mut on_arrival: F,
) -> usize
where
    F: FnMut(&TrafficRecord),
{
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    let mut seen = HashSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let fetched = tokio::select! {
            res = fetch_records(client, url) => res,
            _ = cancel.cancelled() => break,
        };

        match fetched {
            Ok(records) => {
                for record in new_arrivals(&mut seen, &records) {
                    on_arrival(record);
                }
            }
            Err(e) => tracing::warn!(error = %e, "error fetching collector data"),
        }
    }

    seen.len()
}

/// Per-source tally for the top locations view.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCount {
    pub ip_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub count: usize,
    /// Whether any record from this source was flagged
    pub suspicious: bool,
}

/// The `limit` sources with the most records, busiest first. Ties keep the
/// order in which the sources first appeared.
pub fn top_locations(records: &[TrafficRecord], limit: usize) -> Vec<LocationCount> {
    let mut counts: Vec<LocationCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some(ip) = record.ip_address.as_deref() else {
            continue;
        };
        match index.get(ip) {
            Some(&i) => {
                counts[i].count += 1;
                counts[i].suspicious |= record.is_suspicious();
            }
            None => {
                index.insert(ip, counts.len());
                counts.push(LocationCount {
                    ip_address: ip.to_string(),
                    latitude: record.latitude,
                    longitude: record.longitude,
                    count: 1,
                    suspicious: record.is_suspicious(),
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}
