use crate::{audio::session::JoinOutcome, sources::TrackFile};

pub fn pong() -> String {
    "pong".to_string()
}

pub fn hello() -> String {
    "Hello!".to_string()
}

/// Sent once when a voice-player command arrives outside the music channel.
pub fn restricted_to_music_channel(music_channel: &str) -> String {
    format!(
        "I am only allowed to play music in text channel '{}'.",
        music_channel
    )
}

pub fn joined(outcome: &JoinOutcome) -> String {
    match outcome {
        JoinOutcome::Connected(name) => format!("🔊 Joined voice channel '{}'.", name),
        JoinOutcome::Moved { from, to } => format!("🔀 Moved from '{}' to '{}'.", from, to),
        JoinOutcome::AlreadyThere(name) => format!("I am already in '{}'.", name),
    }
}

pub fn now_playing(track: &TrackFile, volume_percent: u8) -> String {
    let mut reply = format!("🎵 Now playing: **{}**", track.display_title());
    if let Some(duration) = track.duration() {
        let whole_seconds = std::time::Duration::from_secs(duration.as_secs());
        reply.push_str(&format!(" ({})", humantime::format_duration(whole_seconds)));
    }
    reply.push_str(&format!(" at {}% volume", volume_percent));
    reply
}

pub fn paused(prefix: &str) -> String {
    format!("⏸️ Paused. Use `{}resume` to continue.", prefix)
}

pub fn resumed() -> String {
    "▶️ Resumed.".to_string()
}

pub fn disconnected() -> String {
    "👋 Stopped playing and left the voice channel.".to_string()
}

pub fn volume_changed(percent: u8) -> String {
    format!("Changed volume to {}%", percent)
}
