use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the path to the YAML configuration file.
pub const CONFIG_ENV: &str = "CONFIG";

/// Prefix for environment overrides, e.g. `BOT_DISCORD__TOKEN`.
const ENV_OVERRIDE_PREFIX: &str = "BOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set as an environment variable")]
    Missing(&'static str),

    #[error("could not load configuration from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    pub allowed_text_channels: Vec<String>,
    #[serde(default)]
    pub allowed_voice_channels: Vec<String>,
    pub music_text_channel: String,
    /// Recognized command names, in dispatch order. Empty means every built-in command.
    #[serde(default, alias = "allowed_commands")]
    pub music_player_commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directives")]
    pub directives: Vec<String>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_track_file")]
    pub track_file: String,
    #[serde(default = "default_downloader")]
    pub downloader: String,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
    /// Percent, 0-100.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

impl Config {
    /// Loads the configuration from the file named by `CONFIG`.
    ///
    /// A `.env` file in the working directory is read first, so `CONFIG` can
    /// live there. Any failure here is fatal: the bot must not start without a
    /// token and a channel policy.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var_os(CONFIG_ENV)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(CONFIG_ENV))?;

        Self::from_path(Path::new(&path))
    }

    /// Parses a YAML file, layering `BOT_*` environment overrides on top.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let load_error = |source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };

        let config: Self = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_OVERRIDE_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(load_error)?
            .try_deserialize()
            .map_err(load_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token and command prefix must not be blank
    /// - At least one allowed text channel
    /// - Music text channel must be named
    /// - Default volume must be between 0 and 100
    pub fn validate(&self) -> Result<(), ConfigError> {
        let discord = &self.discord;

        if discord.token.trim().is_empty() {
            return Err(ConfigError::Invalid("discord.token must not be empty".into()));
        }

        if discord.command_prefix.is_empty()
            || discord.command_prefix.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::Invalid(format!(
                "discord.command_prefix must be non-empty and contain no whitespace, got: {:?}",
                discord.command_prefix
            )));
        }

        if discord.allowed_text_channels.is_empty() {
            return Err(ConfigError::Invalid(
                "discord.allowed_text_channels must list at least one channel".into(),
            ));
        }

        if discord.music_text_channel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "discord.music_text_channel must not be empty".into(),
            ));
        }

        if self.player.default_volume > 100 {
            return Err(ConfigError::Invalid(format!(
                "player.default_volume must be between 0 and 100, got: {}",
                self.player.default_volume
            )));
        }

        if self.player.track_file.trim().is_empty()
            || self.player.track_file.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid(format!(
                "player.track_file must be a plain file name, got: {:?}",
                self.player.track_file
            )));
        }

        Ok(())
    }

    /// Full path of the single well-known track file.
    pub fn track_path(&self) -> PathBuf {
        self.player.download_dir.join(&self.player.track_file)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {:?}\n  \
            Text channels: {:?} (music: {:?})\n  \
            Voice channels: {}\n  \
            Commands: {}\n  \
            Player: {} -> {} ({} @ {}), {}% default volume",
            self.discord.command_prefix,
            self.discord.allowed_text_channels,
            self.discord.music_text_channel,
            if self.discord.allowed_voice_channels.is_empty() {
                "any".to_string()
            } else {
                format!("{:?}", self.discord.allowed_voice_channels)
            },
            if self.discord.music_player_commands.is_empty() {
                "all built-in".to_string()
            } else {
                self.discord.music_player_commands.join(", ")
            },
            self.player.downloader,
            self.track_path().display(),
            self.player.audio_format,
            self.player.audio_quality,
            self.player.default_volume,
        )
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directives: default_log_directives(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            track_file: default_track_file(),
            downloader: default_downloader(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            default_volume: default_volume(),
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directives() -> Vec<String> {
    vec!["serenity=warn".to_string(), "songbird=info".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_track_file() -> String {
    "song.mp3".to_string()
}

fn default_downloader() -> String {
    "yt-dlp".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192K".to_string()
}

fn default_volume() -> u8 {
    100
}
