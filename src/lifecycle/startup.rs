//! Startup checks.
//!
//! # Responsibilities
//! - Create the directories the server writes to or serves from
//! - Warn when `BASE_URL` and the bound port disagree
//!
//! Any failure here is fatal: the server never starts half-configured.

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::AppConfig;

/// Create the public, upload and access log directories.
pub fn prepare_directories(config: &AppConfig) -> io::Result<()> {
    let mut dirs = vec![
        config.server.public_dir.as_str(),
        config.upload.dir.as_str(),
    ];
    if config.access_log.enabled {
        dirs.push(config.access_log.dir.as_str());
    }

    for dir in dirs {
        std::fs::create_dir_all(Path::new(dir))?;
        tracing::debug!(dir, "Directory ready");
    }
    Ok(())
}

/// Port named in `base_url`, if any.
pub fn base_url_port(base_url: &str) -> Option<u16> {
    let (_, rest) = base_url.split_once("://")?;
    let authority = rest.split('/').next()?;
    let (_, port) = authority.rsplit_once(':')?;
    port.parse().ok()
}

/// Log how the configured `BASE_URL` relates to the bound address.
pub fn check_base_url(base_url: &str, bound: SocketAddr) {
    if !base_url.starts_with("http://localhost") {
        tracing::info!(
            base_url,
            local_port = bound.port(),
            "BASE_URL is not localhost; testing directly against the local port may not match it"
        );
        return;
    }

    if base_url_port(base_url) != Some(bound.port()) {
        tracing::warn!(
            base_url,
            local_port = bound.port(),
            "BASE_URL and the bound port do not match"
        );
    }
}
