use thiserror::Error;

/// Errors raised while executing a chat command.
///
/// None of these are fatal: the router catches every variant at the command
/// boundary and turns it into a single reply through [`BotError::user_message`].
#[derive(Debug, Error)]
pub enum BotError {
    #[error("voice channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("voice channel '{0}' is not in the allowed list")]
    VoiceChannelNotAllowed(String),

    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("playback is not paused")]
    NotPaused,

    #[error("the current track is still in use")]
    TrackBusy,

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("missing argument, usage: {0}")]
    MissingArgument(&'static str),

    #[error("command '{0}' not found")]
    CommandNotFound(String),

    #[error("volume '{0}' is not a whole number")]
    VolumeUnparseable(String),

    #[error("voice connection error: {0}")]
    Voice(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("track storage error: {0}")]
    Storage(String),
}

impl BotError {
    /// Reply text sent back to the originating channel.
    pub fn user_message(&self, prefix: &str) -> String {
        match self {
            Self::ChannelNotFound(name) => {
                format!("I could not find a voice channel named '{}'.", name)
            }
            Self::VoiceChannelNotAllowed(name) => {
                format!("I am not allowed to join voice channel '{}'.", name)
            }
            Self::NotConnected => format!(
                "Not connected to a voice channel. Please use `{}join <voice_channel>` command.",
                prefix
            ),
            Self::NothingPlaying => "Currently no audio is playing.".to_string(),
            Self::NotPaused => "The audio is not paused.".to_string(),
            Self::TrackBusy => format!(
                "Wait for the current music to end or use the `{}stop` command.",
                prefix
            ),
            Self::DownloadFailed(_) => {
                "I could not download audio from that link.".to_string()
            }
            Self::InvalidUrl(url) => format!("'{}' is not a valid http(s) link.", url),
            Self::MissingArgument(usage) => format!("Usage: `{}{}`", prefix, usage),
            Self::CommandNotFound(name) => format!("Command `{}{}` not found.", prefix, name),
            Self::VolumeUnparseable(raw) => format!(
                "'{}' is not a valid volume. Use a whole number between 0 and 100.",
                raw
            ),
            Self::Voice(_) => "Something went wrong with the voice connection.".to_string(),
            Self::Playback(_) => "Something went wrong with playback.".to_string(),
            Self::Storage(_) => "I could not prepare the track file.".to_string(),
        }
    }
}
