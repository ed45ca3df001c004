use std::collections::HashSet;

use crate::{bot::commands::Command, config::DiscordConfig};

/// Text-channel policy applied to every incoming message.
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    allowed_text_channels: HashSet<String>,
    music_text_channel: String,
}

impl ChannelPolicy {
    pub fn new(discord: &DiscordConfig) -> Self {
        Self {
            allowed_text_channels: discord.allowed_text_channels.iter().cloned().collect(),
            music_text_channel: discord.music_text_channel.clone(),
        }
    }

    /// Messages from any other channel are dropped without a reply.
    pub fn should_process(&self, channel: &str) -> bool {
        self.allowed_text_channels.contains(channel)
    }

    /// Voice-player commands only run from the music channel.
    pub fn should_process_command(&self, channel: &str, command: Command) -> bool {
        !command.is_player_command() || channel == self.music_text_channel
    }

    pub fn music_text_channel(&self) -> &str {
        &self.music_text_channel
    }
}
