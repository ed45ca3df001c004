//! # Audio Module
//!
//! Voice player for one guild at a time, driven by chat commands.
//!
//! ## Architecture
//!
//! ### [`session`] - Voice Session
//! - Connection and playback state machine (disconnected, idle, playing, paused)
//! - Owns the current track handle and the session gain
//!
//! ### [`backend`] - Voice Transport
//! - [`backend::VoiceBackend`] / [`backend::TrackControl`] seams
//! - Songbird implementation streaming the local track file
//!
//! ### [`events`] - Track Events
//! - Songbird event handlers for track end and track errors
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let mut session = VoiceSession::new(guild_id, 100);
//! session.join(&backend, "Lounge").await?;
//! session.play(&backend, &fetcher, "https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//! session.set_volume(50).await?;
//! session.pause().await?;
//! ```

pub mod backend;
pub mod events;
pub mod session;
