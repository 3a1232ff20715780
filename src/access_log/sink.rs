//! Append-only log sinks.
//!
//! Each sink file is owned by a single writer task. Appends, size checks and
//! truncation all travel through the same queue, so a line is always written
//! whole and truncation can never land in the middle of an append.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Lines a sink buffers before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Which sink a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Status < 400.
    Success,
    /// Status >= 400.
    Error,
}

impl SinkKind {
    /// Route on the final status code.
    pub fn for_status(status: StatusCode) -> Self {
        if status.as_u16() < 400 {
            SinkKind::Success
        } else {
            SinkKind::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Success => "success",
            SinkKind::Error => "error",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{0} sink is closed")]
    Closed(SinkKind),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a size check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// File is at or below the threshold and was left alone.
    WithinLimit { size: u64 },
    /// File exceeded the threshold and is now empty.
    Truncated { previous_size: u64 },
}

enum SinkCommand {
    Append(String),
    Rotate {
        threshold: u64,
        reply: oneshot::Sender<Result<RotationOutcome, SinkError>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to a sink's writer task.
#[derive(Clone)]
pub struct Sink {
    kind: SinkKind,
    path: Arc<PathBuf>,
    tx: mpsc::Sender<SinkCommand>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

impl Sink {
    /// Open (or create) the file for appending and start its writer task.
    ///
    /// The task ends once every handle is dropped and the queue is drained.
    pub fn open(kind: SinkKind, path: impl Into<PathBuf>) -> Result<(Self, JoinHandle<()>), SinkError> {
        Self::open_with_capacity(kind, path, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`Sink::open`], queueing at most `capacity` pending lines.
    pub fn open_with_capacity(
        kind: SinkKind,
        path: impl Into<PathBuf>,
        capacity: usize,
    ) -> Result<(Self, JoinHandle<()>), SinkError> {
        let path = path.into();
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = SinkWriter {
            kind,
            path: path.clone(),
            file: File::from_std(file),
        };
        let handle = tokio::spawn(writer.run(rx));

        tracing::debug!(sink = %kind, path = %path.display(), "Access log sink opened");

        Ok((
            Self {
                kind,
                path: Arc::new(path),
                tx,
            },
            handle,
        ))
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one line (without trailing newline). Never blocks and never
    /// fails the caller; a full or closed queue drops the line and reports
    /// it to the operational log.
    pub fn append(&self, line: String) {
        match self.tx.try_send(SinkCommand::Append(line)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::error!(sink = %self.kind, path = %self.path.display(), "Access log queue is full, dropping line");
                metrics::record_log_write_failure(self.kind.as_str());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(sink = %self.kind, path = %self.path.display(), "Access log sink is closed, dropping line");
                metrics::record_log_write_failure(self.kind.as_str());
            }
        }
    }

    /// Truncate the file if it is larger than `threshold` bytes. Runs after
    /// every line queued before this call has been written.
    pub async fn rotate_if_larger(&self, threshold: u64) -> Result<RotationOutcome, SinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Rotate { threshold, reply })
            .await
            .map_err(|_| SinkError::Closed(self.kind))?;
        rx.await.map_err(|_| SinkError::Closed(self.kind))?
    }

    /// Wait until every line queued before this call has been written.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Flush(reply))
            .await
            .map_err(|_| SinkError::Closed(self.kind))?;
        rx.await.map_err(|_| SinkError::Closed(self.kind))
    }
}

struct SinkWriter {
    kind: SinkKind,
    path: PathBuf,
    file: File,
}

impl SinkWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<SinkCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                SinkCommand::Append(mut line) => {
                    line.push('\n');
                    if let Err(e) = self.write(line.as_bytes()).await {
                        tracing::error!(
                            sink = %self.kind,
                            path = %self.path.display(),
                            error = %e,
                            "Failed to write access log line"
                        );
                        metrics::record_log_write_failure(self.kind.as_str());
                    }
                }
                SinkCommand::Rotate { threshold, reply } => {
                    let _ = reply.send(self.rotate(threshold).await);
                }
                SinkCommand::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        if let Err(e) = self.file.sync_all().await {
            tracing::warn!(sink = %self.kind, error = %e, "Failed to sync access log on close");
        }
        tracing::debug!(sink = %self.kind, "Access log sink closed");
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await
    }

    async fn rotate(&mut self, threshold: u64) -> Result<RotationOutcome, SinkError> {
        let size = self
            .file
            .metadata()
            .await
            .map_err(|source| self.io_error(source))?
            .len();

        if size <= threshold {
            return Ok(RotationOutcome::WithinLimit { size });
        }

        self.file
            .set_len(0)
            .await
            .map_err(|source| self.io_error(source))?;
        Ok(RotationOutcome::Truncated {
            previous_size: size,
        })
    }

    fn io_error(&self, source: io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_for_status() {
        assert_eq!(SinkKind::for_status(StatusCode::OK), SinkKind::Success);
        assert_eq!(SinkKind::for_status(StatusCode::PERMANENT_REDIRECT), SinkKind::Success);
        assert_eq!(SinkKind::for_status(StatusCode::BAD_REQUEST), SinkKind::Error);
        assert_eq!(SinkKind::for_status(StatusCode::INTERNAL_SERVER_ERROR), SinkKind::Error);
    }

    #[tokio::test]
    async fn test_append_writes_whole_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.log");
        let (sink, _task) = Sink::open(SinkKind::Success, &path).unwrap();

        for i in 0..100 {
            sink.append(format!("line {}", i));
        }
        sink.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 100);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(*line, format!("line {}", i));
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (sink, _task) = Sink::open(SinkKind::Success, &path).unwrap();

        let mut tasks = Vec::new();
        for t in 0..8 {
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    sink.append(format!("{}:{}:{}", t, i, "x".repeat(200)));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        sink.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 400);
        assert!(content.lines().all(|l| l.ends_with(&"x".repeat(200))));
    }

    #[tokio::test]
    async fn test_rotation_truncates_only_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        let (sink, _task) = Sink::open(SinkKind::Error, &path).unwrap();

        sink.append("a".repeat(99));
        assert_eq!(
            sink.rotate_if_larger(100).await.unwrap(),
            RotationOutcome::WithinLimit { size: 100 }
        );

        sink.append("b".repeat(10));
        assert_eq!(
            sink.rotate_if_larger(100).await.unwrap(),
            RotationOutcome::Truncated { previous_size: 111 }
        );
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        // Appends after truncation start from the beginning of the file.
        sink.append("fresh".to_string());
        sink.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_rotating_empty_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (sink, _task) = Sink::open(SinkKind::Success, &path).unwrap();

        for _ in 0..2 {
            assert_eq!(
                sink.rotate_if_larger(1).await.unwrap(),
                RotationOutcome::WithinLimit { size: 0 }
            );
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_closed_sink_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, task) = Sink::open(SinkKind::Error, dir.path().join("error.log")).unwrap();

        task.abort();
        let _ = task.await;

        assert!(matches!(
            sink.rotate_if_larger(10).await,
            Err(SinkError::Closed(SinkKind::Error))
        ));
        // Dropped silently apart from the operational log.
        sink.append("lost".to_string());
    }

    #[tokio::test]
    async fn test_full_queue_drops_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (sink, _task) = Sink::open_with_capacity(SinkKind::Success, &path, 2).unwrap();

        // The writer task cannot run until this test yields.
        for i in 0..5 {
            sink.append(format!("line {}", i));
        }
        sink.flush().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line 0\nline 1\n");

        sink.append("after drain".to_string());
        sink.flush().await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("after drain\n"));
    }

    #[tokio::test]
    async fn test_writer_drains_queue_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let (sink, task) = Sink::open(SinkKind::Success, &path).unwrap();

        sink.append("last words".to_string());
        drop(sink);
        task.await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "last words\n");
    }
}
