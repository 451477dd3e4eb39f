use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use traffic_collector::TrafficRecord;
use url::Url;

use crate::dataset::{load_dataset, ReplayRow};
use crate::pacing::Pacer;

/// Where the collector listens by default.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/receive";
/// Dataset read when no path is given.
pub const DEFAULT_DATASET: &str = "ip_addresses.csv";
/// Gap between consecutive rows.
pub const DEFAULT_PACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub dataset_path: PathBuf,
    pub endpoint_url: Url,
    pub pace: Duration,
}

impl ReplayConfig {
    pub fn new(dataset_path: PathBuf, endpoint_url: &str) -> Result<Self> {
        let endpoint_url = Url::parse(endpoint_url)
            .with_context(|| format!("invalid endpoint url: {}", endpoint_url))?;
        if !matches!(endpoint_url.scheme(), "http" | "https") {
            return Err(anyhow!("endpoint url must be http or https: {}", endpoint_url));
        }
        Ok(Self {
            dataset_path,
            endpoint_url,
            pace: DEFAULT_PACE,
        })
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Set the pace from a number of seconds, rejecting negative or non-finite values.
    pub fn with_pace_seconds(self, seconds: f64) -> Result<Self> {
        let pace = Duration::try_from_secs_f64(seconds)
            .map_err(|_| anyhow!("pace must be a finite, non-negative number of seconds, got {}", seconds))?;
        Ok(self.with_pace(pace))
    }
}

/// Outcome counts for one run. `attempted` always equals the number of rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends dataset rows to a collector one at a time, on a fixed cadence.
pub struct Replayer {
    http_client: reqwest::Client,
    endpoint_url: Url,
    pace: Duration,
}

impl Replayer {
    pub fn new(endpoint_url: Url, pace: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint_url,
            pace,
        }
    }

    /// POST a single record and return the response status.
    ///
    /// Transport failures and non-success statuses are both errors.
    pub async fn send(&self, record: &TrafficRecord) -> Result<reqwest::StatusCode> {
        let res = self
            .http_client
            .post(self.endpoint_url.clone())
            .json(record)
            .send()
            .await?;
        let res = res.error_for_status()?;
        Ok(res.status())
    }

    /// Send every row in order, printing one outcome line per row to stdout.
    pub async fn replay(&self, rows: &[ReplayRow]) -> Result<ReplaySummary> {
        self.replay_to(rows, &mut std::io::stdout()).await
    }

    /// Send every row in order and write one outcome line per row to `out`.
    ///
    /// Each send finishes before the next row is considered; a failed send is
    /// reported and skipped, never retried. Only a failure to write the
    /// outcome line stops the run.
    pub async fn replay_to<W: Write>(&self, rows: &[ReplayRow], out: &mut W) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        let pacer = Pacer::start(self.pace);

        for (i, row) in rows.iter().enumerate() {
            pacer.wait_for(i).await;

            summary.attempted += 1;
            match self.send(&row.to_record()).await {
                Ok(status) => {
                    summary.delivered += 1;
                    writeln!(out, "sent {} - status {}", row.ip_address, status.as_u16())?;
                    tracing::debug!(row = i, ip_address = %row.ip_address, "sent record");
                }
                Err(e) => {
                    summary.failed += 1;
                    writeln!(out, "error sending {}: {}", row.ip_address, e)?;
                    tracing::debug!(row = i, ip_address = %row.ip_address, error = %e, "error sending record");
                }
            }
            out.flush()?;
        }

        Ok(summary)
    }
}

/// Load the configured dataset and replay it. Dataset errors abort the run
/// before anything is sent.
pub async fn run(config: &ReplayConfig) -> Result<ReplaySummary> {
    let rows = load_dataset(&config.dataset_path)?;
    tracing::info!(
        rows = rows.len(),
        dataset = %config.dataset_path.display(),
        endpoint = %config.endpoint_url,
        pace_secs = config.pace.as_secs_f64(),
        "loaded dataset, replaying"
    );

    let replayer = Replayer::new(config.endpoint_url.clone(), config.pace);
    let summary = replayer.replay(&rows).await?;

    tracing::info!(
        attempted = summary.attempted,
        delivered = summary.delivered,
        failed = summary.failed,
        "replay finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ReplayConfig::new(PathBuf::from(DEFAULT_DATASET), DEFAULT_ENDPOINT).unwrap();
        assert_eq!(config.pace, Duration::from_secs(1));
        assert_eq!(config.endpoint_url.as_str(), "http://localhost:5000/receive");
    }

    #[test]
    fn test_config_rejects_bad_url() {
        assert!(ReplayConfig::new(PathBuf::from("x.csv"), "localhost:5000/receive").is_err());
        assert!(ReplayConfig::new(PathBuf::from("x.csv"), "not a url").is_err());
    }

    #[test]
    fn test_config_pace_seconds() {
        let config = ReplayConfig::new(PathBuf::from("x.csv"), DEFAULT_ENDPOINT).unwrap();
        let config = config.with_pace_seconds(0.5).unwrap();
        assert_eq!(config.pace, Duration::from_millis(500));

        let config = config.with_pace_seconds(0.0).unwrap();
        assert_eq!(config.pace, Duration::ZERO);
    }

    #[test]
    fn test_config_rejects_bad_pace() {
        let config = ReplayConfig::new(PathBuf::from("x.csv"), DEFAULT_ENDPOINT).unwrap();
        assert!(config.clone().with_pace_seconds(-1.0).is_err());
        assert!(config.clone().with_pace_seconds(f64::NAN).is_err());
        assert!(config.with_pace_seconds(f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn test_empty_replay_sends_nothing() {
        // nothing listens here, and nothing should be attempted
        let replayer = Replayer::new(Url::parse("http://127.0.0.1:9/receive").unwrap(), DEFAULT_PACE);
        let mut out: Vec<u8> = Vec::new();
        assert_eq!(replayer.replay_to(&[], &mut out).await.unwrap(), ReplaySummary::default());
        assert!(out.is_empty());
    }
}
