//! Status-based sink selection.

use std::path::Path;

use axum::http::StatusCode;
use tokio::task::JoinHandle;

use super::sink::{Sink, SinkError, SinkKind};
use crate::config::AccessLogConfig;

/// Holds the success and error sinks and picks one per exchange.
#[derive(Debug, Clone)]
pub struct LogRouter {
    success: Sink,
    error: Sink,
}

impl LogRouter {
    pub fn new(success: Sink, error: Sink) -> Self {
        Self { success, error }
    }

    /// Open both sink files named in the config.
    pub fn open(config: &AccessLogConfig) -> Result<(Self, Vec<JoinHandle<()>>), SinkError> {
        let dir = Path::new(&config.dir);
        let capacity = config.queue_capacity;
        let (success, success_task) =
            Sink::open_with_capacity(SinkKind::Success, dir.join(&config.out_file), capacity)?;
        let (error, error_task) =
            Sink::open_with_capacity(SinkKind::Error, dir.join(&config.error_file), capacity)?;
        Ok((Self::new(success, error), vec![success_task, error_task]))
    }

    pub fn sink(&self, kind: SinkKind) -> &Sink {
        match kind {
            SinkKind::Success => &self.success,
            SinkKind::Error => &self.error,
        }
    }

    pub fn sink_for(&self, status: StatusCode) -> &Sink {
        self.sink(SinkKind::for_status(status))
    }

    /// Queue `line` on exactly one sink, chosen from the final status.
    pub fn dispatch(&self, status: StatusCode, line: String) -> SinkKind {
        let sink = self.sink_for(status);
        sink.append(line);
        sink.kind()
    }

    pub async fn flush(&self) -> Result<(), SinkError> {
        self.success.flush().await?;
        self.error.flush().await
    }
}
