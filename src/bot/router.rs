use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    audio::{backend::VoiceBackend, session::VoiceSession},
    bot::{
        auth::ChannelPolicy,
        commands::{CommandEnv, Dispatcher},
    },
    config::Config,
    error::BotError,
    sources::TrackFetcher,
    ui::replies,
};

/// A chat message reduced to what command handling needs.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub author: String,
    pub content: String,
    pub channel: String,
    pub guild_id: GuildId,
}

/// Single entry point for chat messages.
///
/// Owns one [`VoiceSession`] per guild. Each session sits behind its own
/// mutex, so commands for a guild run one at a time in arrival order.
pub struct Router {
    config: Arc<Config>,
    policy: ChannelPolicy,
    dispatcher: Dispatcher,
    fetcher: Arc<dyn TrackFetcher>,
    sessions: DashMap<GuildId, Arc<Mutex<VoiceSession>>>,
}

impl Router {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn TrackFetcher>) -> Self {
        let policy = ChannelPolicy::new(&config.discord);
        let dispatcher = Dispatcher::new(
            config.discord.command_prefix.clone(),
            &config.discord.music_player_commands,
        );

        for name in dispatcher.unknown_names() {
            warn!("⚠️ Configured command '{}' has no handler", name);
        }

        Self {
            config,
            policy,
            dispatcher,
            fetcher,
            sessions: DashMap::new(),
        }
    }

    /// Handles one message and returns the reply to send, if any.
    pub async fn route(
        &self,
        message: &IncomingMessage,
        backend: &dyn VoiceBackend,
    ) -> Option<String> {
        if !self.policy.should_process(&message.channel) {
            debug!(channel = %message.channel, "channel not in allowed list, ignoring");
            return None;
        }

        let invocation = self.dispatcher.dispatch(&message.content)?;
        let prefix = self.dispatcher.prefix();

        let Some(command) = invocation.command else {
            debug!(author = %message.author, name = invocation.name, "command not found");
            return Some(BotError::CommandNotFound(invocation.name.to_string()).user_message(prefix));
        };

        if !self.policy.should_process_command(&message.channel, command) {
            debug!(
                author = %message.author,
                channel = %message.channel,
                %command,
                "player command outside music channel"
            );
            return Some(replies::restricted_to_music_channel(
                self.policy.music_text_channel(),
            ));
        }

        debug!(
            author = %message.author,
            channel = %message.channel,
            guild = %message.guild_id,
            %command,
            args = invocation.args,
            "executing command"
        );

        let session = self.session(message.guild_id);
        let mut session = session.lock().await;

        let env = CommandEnv {
            prefix,
            allowed_voice_channels: &self.config.discord.allowed_voice_channels,
            backend,
            fetcher: self.fetcher.as_ref(),
        };

        let reply = match command.execute(invocation.args, &mut session, &env).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(author = %message.author, %command, "command failed: {}", e);
                e.user_message(prefix)
            }
        };

        Some(reply)
    }

    /// Resets a guild's session after the bot was disconnected from voice.
    pub async fn voice_disconnected(&self, guild_id: GuildId) {
        let Some(session) = self.sessions.get(&guild_id).map(|entry| Arc::clone(entry.value())) else {
            return;
        };
        session.lock().await.mark_disconnected();
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<VoiceSession>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(VoiceSession::new(
                    guild_id,
                    self.config.player.default_volume,
                )))
            })
            .clone()
    }
}
