//! # Track Acquisition
//!
//! Turns a web link into the single local track file the voice session plays.
//! The session owns exactly one file at a well-known path: it is removed before
//! a new download and the fresh download is renamed onto it.

pub mod ytdlp;

use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::error::BotError;

pub use ytdlp::YtDlpFetcher;

/// Downloads audio into the well-known track file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Path of the single track file this fetcher writes.
    fn track_path(&self) -> PathBuf;

    async fn acquire(&self, url: &str) -> Result<TrackFile, BotError>;
}

/// A downloaded audio artifact, ready to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFile {
    path: PathBuf,
    url: String,
    title: Option<String>,
    duration: Option<Duration>,
}

impl TrackFile {
    pub fn new(path: PathBuf, url: impl Into<String>) -> Self {
        Self {
            path,
            url: url.into(),
            title: None,
            duration: None,
        }
    }

    pub fn with_title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Title when the downloader reported one, the source link otherwise.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// Removes the previous track file.
///
/// Returns whether a file was removed. A permission error means the file is
/// still held open for playback and maps to [`BotError::TrackBusy`].
pub async fn discard_track(path: &Path) -> Result<bool, BotError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("🗑️ Removed previous track file {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(BotError::TrackBusy),
        Err(e) => Err(BotError::Storage(format!("{}: {}", path.display(), e))),
    }
}
