use serenity::{async_trait, model::id::GuildId};
use songbird::{
    tracks::PlayMode, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler,
};
use tracing::{error, info};

/// Logs when a track finishes. The session notices on its next command.
pub struct TrackEndHandler {
    pub guild_id: GuildId,
    pub title: String,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        info!("🎵 Track '{}' ended in guild {}", self.title, self.guild_id);
        None
    }
}

/// Logs why the driver gave up on the track file.
///
/// The session still holds the handle; `is_finished` reports the errored
/// track as done, so the next `play` replaces it.
pub struct TrackErrorHandler {
    pub guild_id: GuildId,
    pub title: String,
}

impl TrackErrorHandler {
    fn describe(&self, playing: &PlayMode) -> String {
        match playing {
            PlayMode::Errored(e) => format!("'{}' failed in guild {}: {}", self.title, self.guild_id, e),
            other => format!("'{}' reported {:?} in guild {}", self.title, other, self.guild_id),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!("❌ {}", self.describe(&state.playing));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_names_the_track() {
        let handler = TrackErrorHandler {
            guild_id: GuildId::new(7),
            title: "Song".into(),
        };

        let line = handler.describe(&PlayMode::Stop);
        assert!(line.contains("'Song'"));
        assert!(line.contains('7'));
    }
}
