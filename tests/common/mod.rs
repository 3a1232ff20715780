//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use starter_backend::config::{AppConfig, Environment};
use starter_backend::{AppServer, Shutdown};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Config rooted in `root`: public dir, uploads and logs all live there.
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Test;
    config.server.bind_address = "127.0.0.1:0".into();
    config.server.public_dir = root.join("public").to_string_lossy().into_owned();
    config.upload.dir = root.join("public/upload").to_string_lossy().into_owned();
    config.access_log.dir = root.join("logs").to_string_lossy().into_owned();
    config.auth.token_secret = "integration-test-secret".into();
    config
}

pub fn out_log(root: &Path) -> PathBuf {
    root.join("logs/out.log")
}

pub fn error_log(root: &Path) -> PathBuf {
    root.join("logs/error.log")
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Poll `path` until it holds at least `count` lines.
pub async fn wait_for_lines(path: &Path, count: usize) -> Vec<String> {
    for _ in 0..200 {
        let lines = read_lines(path);
        if lines.len() >= count {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!(
        "{} never reached {} lines: {:?}",
        path.display(),
        count,
        read_lines(path)
    );
}

/// A server bound to an ephemeral port on a fresh temp directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    pub shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        customize(&mut config);
        std::fs::create_dir_all(&config.server.public_dir).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let server = AppServer::new(config).unwrap();
        let server_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            server.run(listener, server_shutdown).await.unwrap();
        });

        Self {
            addr,
            root,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn write_public(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.root().join("public").join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Trigger shutdown and wait for the server to drain its sinks.
    pub async fn stop(self) -> TempDir {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not shut down")
            .unwrap();
        self.root
    }
}

/// Build an in-process server for `oneshot` tests.
pub fn in_process(customize: impl FnOnce(&mut AppConfig)) -> (AppServer, TempDir) {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    customize(&mut config);
    std::fs::create_dir_all(&config.server.public_dir).unwrap();
    (AppServer::new(config).unwrap(), root)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Collect a response body into JSON. Dropping the body is what releases
/// the access log line.
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
