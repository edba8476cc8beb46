//! Periodic metrics push to the time-series collector.
//!
//! Each tick snapshots the counters, samples the host, encodes one
//! line-protocol payload and POSTs it. Pushes run as detached tasks, so a
//! slow collector never delays the next tick and overlapping pushes are
//! allowed. Failures are logged and dropped; the next tick sends fresh data.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::counters::CounterSet;
use super::line_protocol;
use super::system::{SystemSample, SystemSampler};
use crate::config::MetricsSection;

/// Per-push HTTP timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("collector unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector rejected payload with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub source: String,
    pub url: String,
    pub user_id: String,
    pub api_key: String,
    pub period: Duration,
    pub enabled: bool,
}

impl From<&MetricsSection> for ReporterConfig {
    fn from(m: &MetricsSection) -> Self {
        Self {
            source: m.source.clone(),
            url: m.url.clone(),
            user_id: m.user_id.clone(),
            api_key: m.api_key.clone(),
            period: m.period(),
            enabled: m.enabled,
        }
    }
}

/// Builds and ships one reporting cycle. Cheap to clone into push tasks.
#[derive(Clone)]
pub struct Reporter {
    config: Arc<ReporterConfig>,
    counters: Arc<CounterSet>,
    sampler: Arc<dyn SystemSampler>,
    http: reqwest::Client,
}

/// Owner of the running loop. `stop()` halts it deterministically.
pub struct ReporterHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Cancel the timer and wait for the loop to exit.
    /// Pushes already in flight are left to finish on their own.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "metrics reporter task failed");
        }
    }
}

impl Reporter {
    pub fn new(
        config: ReporterConfig,
        counters: Arc<CounterSet>,
        sampler: Arc<dyn SystemSampler>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "collector client build failed, pushing without a timeout");
                reqwest::Client::new()
            });

        Self {
            config: Arc::new(config),
            counters,
            sampler,
            http,
        }
    }

    /// Start the periodic loop on the current runtime.
    pub fn spawn(self) -> ReporterHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        ReporterHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let period = self.config.period;
        // first push one full period after start
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            url = %self.config.url,
            period_ms = period.as_millis() as u64,
            source = %self.config.source,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let reporter = self.clone();
                    tokio::spawn(async move { reporter.report_once().await });
                }
            }
        }
    }

    /// One reporting cycle. Never returns an error; failures are logged.
    pub async fn report_once(&self) {
        let payload = self.build_payload();
        match self.push(&payload).await {
            Ok(()) => debug!(bytes = payload.len(), "pushed metrics"),
            Err(e) => warn!(error = %e, "failed to push metrics"),
        }
    }

    /// Snapshot → sample → encode.
    pub fn build_payload(&self) -> String {
        let snapshot = self.counters.snapshot();
        let system = SystemSample::take(self.sampler.as_ref());
        line_protocol::encode(&snapshot, &system, &self.config.source)
    }

    async fn push(&self, payload: &str) -> Result<(), ReportError> {
        let response = self
            .http
            .post(&self.config.url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}:{}", self.config.user_id, self.config.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(payload.to_owned())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ReportError::Rejected(status.as_u16()))
        }
    }
}
