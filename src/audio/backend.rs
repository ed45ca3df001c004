use async_trait::async_trait;
use serenity::{
    cache::Cache,
    model::{
        channel::ChannelType,
        id::{ChannelId, GuildId},
    },
};
use songbird::{
    input::{File, Input},
    tracks::{PlayMode, TrackHandle},
    Event, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    audio::events::{TrackEndHandler, TrackErrorHandler},
    error::BotError,
    sources::TrackFile,
};

/// Voice transport used by a [`VoiceSession`](super::session::VoiceSession).
///
/// The production implementation is [`SongbirdBackend`]; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Looks a voice channel up by name in the guild.
    async fn resolve_voice_channel(&self, guild_id: GuildId, name: &str) -> Option<ChannelId>;

    /// Connects to `channel_id`, or moves an existing connection there.
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BotError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), BotError>;

    /// Starts streaming a local file at the given gain.
    async fn play_file(
        &self,
        guild_id: GuildId,
        track: &TrackFile,
        gain: f32,
    ) -> Result<Box<dyn TrackControl>, BotError>;
}

/// Control surface of one playing track.
#[async_trait]
pub trait TrackControl: Send + Sync {
    fn pause(&self) -> Result<(), BotError>;
    fn resume(&self) -> Result<(), BotError>;
    fn stop(&self) -> Result<(), BotError>;
    fn set_volume(&self, gain: f32) -> Result<(), BotError>;

    /// True once the track has ended, errored, or been stopped.
    async fn is_finished(&self) -> bool;
}

/// Songbird-backed voice transport.
///
/// Built per event from the serenity cache so channel names can be resolved
/// against the guild's current channel list.
pub struct SongbirdBackend {
    cache: Arc<Cache>,
    manager: Arc<Songbird>,
}

impl SongbirdBackend {
    pub fn new(cache: Arc<Cache>, manager: Arc<Songbird>) -> Self {
        Self { cache, manager }
    }
}

#[async_trait]
impl VoiceBackend for SongbirdBackend {
    async fn resolve_voice_channel(&self, guild_id: GuildId, name: &str) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        guild
            .channels
            .values()
            .find(|channel| {
                matches!(channel.kind, ChannelType::Voice | ChannelType::Stage)
                    && channel.name == name
            })
            .map(|channel| channel.id)
    }

    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BotError> {
        // songbird reuses the existing Call for the guild, so this is a move when connected
        match self.manager.join(guild_id, channel_id).await {
            Ok(_call) => {
                info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
                Ok(())
            }
            Err(e) => {
                warn!("Error joining voice channel {}: {:?}", channel_id, e);
                Err(BotError::Voice(e.to_string()))
            }
        }
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), BotError> {
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| BotError::Voice(e.to_string()))?;

        info!("👋 Left voice channel in guild {}", guild_id);
        Ok(())
    }

    async fn play_file(
        &self,
        guild_id: GuildId,
        track: &TrackFile,
        gain: f32,
    ) -> Result<Box<dyn TrackControl>, BotError> {
        let call = self.manager.get(guild_id).ok_or(BotError::NotConnected)?;

        let input: Input = File::new(track.path().to_path_buf()).into();
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        handle
            .set_volume(gain)
            .map_err(|e| BotError::Playback(e.to_string()))?;

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler {
                    guild_id,
                    title: track.display_title().to_string(),
                },
            )
            .map_err(|e| BotError::Playback(e.to_string()))?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorHandler {
                    guild_id,
                    title: track.display_title().to_string(),
                },
            )
            .map_err(|e| BotError::Playback(e.to_string()))?;

        Ok(Box::new(SongbirdTrack(handle)))
    }
}

struct SongbirdTrack(TrackHandle);

#[async_trait]
impl TrackControl for SongbirdTrack {
    fn pause(&self) -> Result<(), BotError> {
        self.0.pause().map_err(|e| BotError::Playback(e.to_string()))
    }

    fn resume(&self) -> Result<(), BotError> {
        self.0.play().map_err(|e| BotError::Playback(e.to_string()))
    }

    fn stop(&self) -> Result<(), BotError> {
        self.0.stop().map_err(|e| BotError::Playback(e.to_string()))
    }

    fn set_volume(&self, gain: f32) -> Result<(), BotError> {
        self.0
            .set_volume(gain)
            .map_err(|e| BotError::Playback(e.to_string()))
    }

    async fn is_finished(&self) -> bool {
        match self.0.get_info().await {
            Ok(state) => !matches!(state.playing, PlayMode::Play | PlayMode::Pause),
            // the driver drops the track once it is done
            Err(_) => true,
        }
    }
}
