use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{TrackFetcher, TrackFile};
use crate::{config::PlayerConfig, error::BotError};

/// Staging directory, relative to the download dir, that yt-dlp writes into.
const STAGING_DIR: &str = ".incoming";

/// Downloads audio with yt-dlp and normalizes it onto the track file.
pub struct YtDlpFetcher {
    program: String,
    download_dir: PathBuf,
    track_file: String,
    audio_format: String,
    audio_quality: String,
}

/// Metadata yt-dlp prints once the download is done.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
}

impl YtDlpFetcher {
    pub fn new(player: &PlayerConfig) -> Self {
        Self {
            program: player.downloader.clone(),
            download_dir: player.download_dir.clone(),
            track_file: player.track_file.clone(),
            audio_format: player.audio_format.clone(),
            audio_quality: player.audio_quality.clone(),
        }
    }

    /// Creates the download directory.
    pub async fn prepare(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        info!("📁 Track directory: {}", self.download_dir.display());
        Ok(())
    }

    /// Checks that yt-dlp and ffmpeg can be run.
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("✅ {} version: {}", self.program, version.trim());
            }
            _ => {
                error!("❌ {} not found. Install with: pip install yt-dlp", self.program);
                anyhow::bail!("{} not available", self.program);
            }
        }

        match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) if output.status.success() => info!("✅ ffmpeg available"),
            _ => {
                error!("❌ ffmpeg not found. Install with: sudo apt install ffmpeg");
                anyhow::bail!("ffmpeg not available");
            }
        }

        Ok(())
    }

    fn staging_dir(&self) -> PathBuf {
        self.download_dir.join(STAGING_DIR)
    }

    fn download_args(&self, url: &str) -> Vec<String> {
        let template = self.staging_dir().join("%(id)s.%(ext)s");
        vec![
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-f".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.audio_format.clone(),
            "--audio-quality".into(),
            self.audio_quality.clone(),
            "--dump-json".into(),
            "--no-simulate".into(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl TrackFetcher for YtDlpFetcher {
    fn track_path(&self) -> PathBuf {
        self.download_dir.join(&self.track_file)
    }

    async fn acquire(&self, url: &str) -> Result<TrackFile, BotError> {
        let url = validate_url(url)?;
        let staging = self.staging_dir();

        // leftovers from an interrupted download must not be picked up
        if tokio::fs::metadata(&staging).await.is_ok() {
            tokio::fs::remove_dir_all(&staging)
                .await
                .map_err(|e| BotError::Storage(format!("{}: {}", staging.display(), e)))?;
        }
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| BotError::Storage(format!("{}: {}", staging.display(), e)))?;

        info!("⬇️ Downloading audio from {}", url);

        let output = Command::new(&self.program)
            .args(self.download_args(url.as_str()))
            .output()
            .await
            .map_err(|e| BotError::DownloadFailed(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp error for {}: {}", url, stderr.trim());
            return Err(BotError::DownloadFailed(last_line(&stderr).to_string()));
        }

        let track_path = self.track_path();
        normalize_download(&staging, &track_path, &self.audio_format).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut track = TrackFile::new(track_path, url.as_str());
        if let Some(info) = parse_info(&stdout) {
            if let Some(title) = info.title.clone() {
                track = track.with_title(title);
            }
            if let Some(duration) = info.track_duration() {
                track = track.with_duration(duration);
            }
        }

        debug!("Download complete: {}", track.display_title());
        Ok(track)
    }
}

/// Only http(s) links are handed to the downloader.
fn validate_url(raw: &str) -> Result<Url, BotError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(BotError::InvalidUrl(raw.to_string())),
    }
}

/// Renames the downloaded artifact onto the well-known track path.
///
/// Picks the most recently modified file with the target extension in
/// `staging`, overwriting a stale track file.
async fn normalize_download(
    staging: &Path,
    track_path: &Path,
    extension: &str,
) -> Result<(), BotError> {
    let storage_error = |e: std::io::Error| BotError::Storage(format!("{}: {}", staging.display(), e));

    let mut entries = tokio::fs::read_dir(staging).await.map_err(storage_error)?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await.map_err(storage_error)? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }

        let modified = entry
            .metadata()
            .await
            .and_then(|meta| meta.modified())
            .map_err(storage_error)?;

        if newest.as_ref().map_or(true, |(current, _)| modified >= *current) {
            newest = Some((modified, path));
        }
    }

    let (_, downloaded) = newest.ok_or_else(|| {
        BotError::DownloadFailed(format!("no .{} file was produced", extension))
    })?;

    debug!("Renaming {} to {}", downloaded.display(), track_path.display());
    tokio::fs::rename(&downloaded, track_path)
        .await
        .map_err(|e| BotError::Storage(format!("{}: {}", track_path.display(), e)))
}

impl YtDlpInfo {
    /// Negative, NaN or out-of-range durations are treated as unknown.
    fn track_duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

fn parse_info(stdout: &str) -> Option<YtDlpInfo> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown error")
}
