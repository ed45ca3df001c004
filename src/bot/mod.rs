//! # Bot Module
//!
//! Discord-facing side of the bot.
//!
//! - [`MusicBot`] implements Serenity's [`EventHandler`] and is a thin adapter:
//!   it normalizes each message into an [`IncomingMessage`] and hands it to the
//!   [`Router`](router::Router)
//! - [`auth`] decides which channels and commands are processed
//! - [`commands`] maps the prefixed token to a [`Command`](commands::Command)
//!   and executes it against the guild's voice session
//! - [`router`] ties the three together and owns the sessions

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod auth;
pub mod commands;
pub mod router;

use crate::{audio::backend::SongbirdBackend, config::Config, sources::TrackFetcher};
use router::{IncomingMessage, Router};

/// Main Discord event handler.
pub struct MusicBot {
    router: Router,
    songbird: Arc<Songbird>,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn TrackFetcher>,
        songbird: Arc<Songbird>,
    ) -> Self {
        Self {
            router: Router::new(config, fetcher),
            songbird,
        }
    }

    /// Builds the router-facing view of a guild text message.
    ///
    /// Direct messages and channels missing from the cache yield `None`.
    fn normalize(ctx: &Context, msg: &Message) -> Option<IncomingMessage> {
        let guild_id = msg.guild_id?;
        let channel = {
            let guild = ctx.cache.guild(guild_id)?;
            guild.channels.get(&msg.channel_id)?.name.clone()
        };

        Some(IncomingMessage {
            author: msg.author.name.clone(),
            content: msg.content.clone(),
            channel,
            guild_id,
        })
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 Logged in as {}", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());
    }

    /// Every guild message goes through the router; at most one reply is sent.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.author.id == ctx.cache.current_user().id {
            return;
        }

        let Some(incoming) = Self::normalize(&ctx, &msg) else {
            debug!("Ignoring message {} outside a cached guild channel", msg.id);
            return;
        };

        debug!("{}: {} ({})", incoming.author, incoming.content, incoming.channel);

        let backend = SongbirdBackend::new(ctx.cache.clone(), self.songbird.clone());
        if let Some(reply) = self.router.route(&incoming, &backend).await {
            if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                error!("Error sending reply in {}: {:?}", incoming.channel, e);
            }
        }
    }

    /// Resets the session when the bot is removed from voice without `stop`.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot disconnected from voice in guild {}", guild_id);
            self.router.voice_disconnected(guild_id).await;
        }
    }
}
