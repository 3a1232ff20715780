//! Size-based rotation of the access log sinks.
//!
//! A timer asks every watched sink to compare its size with a threshold.
//! The sink's own writer task performs the truncation, so rotation is
//! serialized with appends.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use super::router::LogRouter;
use super::sink::{RotationOutcome, Sink, SinkError, SinkKind};
use crate::config::AccessLogConfig;
use crate::observability::metrics;

struct Target {
    sink: Sink,
    threshold: u64,
}

/// Periodic task truncating oversized sink files.
pub struct RotationWatchdog {
    targets: Vec<Target>,
    interval: Duration,
}

impl RotationWatchdog {
    pub fn new(interval: Duration) -> Self {
        Self {
            targets: Vec::new(),
            interval,
        }
    }

    /// Watch both sinks of `router` that have a threshold configured.
    pub fn from_config(router: &LogRouter, config: &AccessLogConfig) -> Self {
        let mut watchdog = Self::new(Duration::from_millis(config.check_interval_ms));
        for (kind, threshold) in [
            (SinkKind::Success, config.out_max_bytes),
            (SinkKind::Error, config.error_max_bytes),
        ] {
            if let Some(threshold) = threshold {
                watchdog = watchdog.watch(router.sink(kind).clone(), threshold);
            }
        }
        watchdog
    }

    pub fn watch(mut self, sink: Sink, threshold: u64) -> Self {
        self.targets.push(Target { sink, threshold });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.targets.is_empty() {
            tracing::info!("Access log rotation disabled: no thresholds configured");
            return;
        }

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            sinks = self.targets.len(),
            "Access log rotation watchdog starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rotation watchdog received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Check every target once. Failures are logged and the file is left
    /// as it was.
    pub async fn check_all(&self) -> Vec<Result<RotationOutcome, SinkError>> {
        let mut results = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let kind = target.sink.kind();
            let result = target.sink.rotate_if_larger(target.threshold).await;

            match &result {
                Ok(RotationOutcome::Truncated { previous_size }) => {
                    tracing::info!(
                        sink = %kind,
                        path = %target.sink.path().display(),
                        previous_size,
                        threshold = target.threshold,
                        "Access log truncated"
                    );
                    metrics::record_log_rotation(kind.as_str());
                }
                Ok(RotationOutcome::WithinLimit { .. }) => {}
                Err(e) => {
                    tracing::error!(
                        sink = %kind,
                        path = %target.sink.path().display(),
                        error = %e,
                        "Access log rotation failed"
                    );
                }
            }

            results.push(result);
        }

        results
    }
}
