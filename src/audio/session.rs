use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, info};

use crate::{
    audio::backend::{TrackControl, VoiceBackend},
    error::BotError,
    sources::{self, TrackFetcher, TrackFile},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Idle,
    Playing,
    Paused,
}

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedChannel {
    pub id: ChannelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Connected(String),
    Moved { from: String, to: String },
    AlreadyThere(String),
}

/// Voice player state for one guild.
///
/// Playback can only be `Playing` or `Paused` while connected; every transition
/// is validated here before the voice transport is touched. The gain is a
/// session property and carries over to the next track.
pub struct VoiceSession {
    guild_id: GuildId,
    channel: Option<ConnectedChannel>,
    playback: Playback,
    track: Option<Box<dyn TrackControl>>,
    gain: f32,
}

impl VoiceSession {
    /// `default_volume` is a percent, clamped to 0-100.
    pub fn new(guild_id: GuildId, default_volume: u8) -> Self {
        Self {
            guild_id,
            channel: None,
            playback: Playback::Idle,
            track: None,
            gain: f32::from(default_volume.min(100)) / 100.0,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.channel, self.playback) {
            (None, _) => SessionState::Disconnected,
            (Some(_), Playback::Idle) => SessionState::Idle,
            (Some(_), Playback::Playing) => SessionState::Playing,
            (Some(_), Playback::Paused) => SessionState::Paused,
        }
    }

    #[cfg(test)]
    pub fn channel(&self) -> Option<&ConnectedChannel> {
        self.channel.as_ref()
    }

    #[cfg(test)]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn volume_percent(&self) -> u8 {
        (self.gain * 100.0).round() as u8
    }

    /// Connects to the named voice channel, or moves the current connection.
    ///
    /// The playback sub-state survives a move.
    pub async fn join(
        &mut self,
        backend: &dyn VoiceBackend,
        name: &str,
    ) -> Result<JoinOutcome, BotError> {
        let channel_id = backend
            .resolve_voice_channel(self.guild_id, name)
            .await
            .ok_or_else(|| BotError::ChannelNotFound(name.to_string()))?;

        if let Some(current) = &self.channel {
            if current.id == channel_id {
                return Ok(JoinOutcome::AlreadyThere(current.name.clone()));
            }
        }

        backend.join(self.guild_id, channel_id).await?;

        let target = ConnectedChannel {
            id: channel_id,
            name: name.to_string(),
        };
        let outcome = match self.channel.replace(target) {
            Some(previous) => {
                info!("🔀 Moved from '{}' to '{}' in guild {}", previous.name, name, self.guild_id);
                JoinOutcome::Moved {
                    from: previous.name,
                    to: name.to_string(),
                }
            }
            None => {
                self.playback = Playback::Idle;
                info!("🔊 Joined '{}' in guild {}", name, self.guild_id);
                JoinOutcome::Connected(name.to_string())
            }
        };

        Ok(outcome)
    }

    /// Replaces the track file with a fresh download and starts streaming it.
    ///
    /// Steps, in order: release the previous track file (fails with
    /// [`BotError::TrackBusy`] while it is still held by playback), download,
    /// stream. Nothing changes when a step fails.
    pub async fn play(
        &mut self,
        backend: &dyn VoiceBackend,
        fetcher: &dyn TrackFetcher,
        url: &str,
    ) -> Result<TrackFile, BotError> {
        self.ensure_connected()?;
        self.refresh().await;

        if self.track.is_some() {
            debug!("Track still open in guild {}, refusing to replace it", self.guild_id);
            return Err(BotError::TrackBusy);
        }
        sources::discard_track(&fetcher.track_path()).await?;

        let track_file = fetcher.acquire(url).await?;

        let handle = backend.play_file(self.guild_id, &track_file, self.gain).await?;
        self.track = Some(handle);
        self.playback = Playback::Playing;

        info!("▶️ Playing '{}' in guild {}", track_file.display_title(), self.guild_id);
        Ok(track_file)
    }

    pub async fn pause(&mut self) -> Result<(), BotError> {
        self.ensure_connected()?;
        self.refresh().await;

        match (&self.track, self.playback) {
            (Some(track), Playback::Playing) => {
                track.pause()?;
                self.playback = Playback::Paused;
                info!("⏸️ Paused in guild {}", self.guild_id);
                Ok(())
            }
            _ => Err(BotError::NothingPlaying),
        }
    }

    pub async fn resume(&mut self) -> Result<(), BotError> {
        self.ensure_connected()?;
        self.refresh().await;

        match (&self.track, self.playback) {
            (Some(track), Playback::Paused) => {
                track.resume()?;
                self.playback = Playback::Playing;
                info!("▶️ Resumed in guild {}", self.guild_id);
                Ok(())
            }
            _ => Err(BotError::NotPaused),
        }
    }

    /// Stops playback and disconnects.
    ///
    /// The session counts as disconnected even when the transport fails to
    /// leave, so a later `join` reconnects instead of assuming it is still there.
    pub async fn stop(&mut self, backend: &dyn VoiceBackend) -> Result<(), BotError> {
        self.ensure_connected()?;

        self.stop_track();
        self.playback = Playback::Idle;
        self.channel = None;

        backend.leave(self.guild_id).await?;

        info!("⏹️ Stopped and disconnected in guild {}", self.guild_id);
        Ok(())
    }

    /// Sets the session gain from a percent clamped to 0-100.
    ///
    /// Applies immediately to the current track whatever its playback state.
    /// Returns the percent actually applied.
    pub async fn set_volume(&mut self, percent: i64) -> Result<u8, BotError> {
        self.ensure_connected()?;

        let applied = percent.clamp(0, 100) as u8;
        let gain = f32::from(applied) / 100.0;

        if let Some(track) = &self.track {
            track.set_volume(gain)?;
        }
        self.gain = gain;

        info!("🔊 Volume set to {}% in guild {}", applied, self.guild_id);
        Ok(applied)
    }

    /// The bot left the voice channel without a command (kicked, channel deleted).
    pub fn mark_disconnected(&mut self) {
        if self.channel.take().is_some() {
            info!("🔌 Voice connection lost in guild {}", self.guild_id);
        }
        // the guild's call outlives the driver connection, a rejoin would resume it
        self.stop_track();
        self.playback = Playback::Idle;
    }

    fn stop_track(&mut self) {
        if let Some(track) = self.track.take() {
            if let Err(e) = track.stop() {
                debug!("Stopping track in guild {} failed: {}", self.guild_id, e);
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), BotError> {
        if self.channel.is_some() {
            Ok(())
        } else {
            Err(BotError::NotConnected)
        }
    }

    /// Drops the track handle once the transport reports it finished.
    async fn refresh(&mut self) {
        let finished = match &self.track {
            Some(track) => track.is_finished().await,
            None => false,
        };

        if finished {
            debug!("Track finished in guild {}", self.guild_id);
            self.track = None;
            self.playback = Playback::Idle;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{audio::backend::MockVoiceBackend, sources::MockTrackFetcher};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    #[derive(Debug, Default)]
    pub(crate) struct FakeTrackState {
        pub paused: bool,
        pub stopped: bool,
        pub finished: bool,
        pub volume: Option<f32>,
    }

    /// Track handle whose state the test can inspect and drive.
    #[derive(Clone, Default)]
    pub(crate) struct FakeTrack(pub Arc<Mutex<FakeTrackState>>);

    impl FakeTrack {
        pub fn finish(&self) {
            self.0.lock().unwrap().finished = true;
        }
    }

    #[async_trait]
    impl TrackControl for FakeTrack {
        fn pause(&self) -> Result<(), BotError> {
            self.0.lock().unwrap().paused = true;
            Ok(())
        }

        fn resume(&self) -> Result<(), BotError> {
            self.0.lock().unwrap().paused = false;
            Ok(())
        }

        fn stop(&self) -> Result<(), BotError> {
            self.0.lock().unwrap().stopped = true;
            Ok(())
        }

        fn set_volume(&self, gain: f32) -> Result<(), BotError> {
            self.0.lock().unwrap().volume = Some(gain);
            Ok(())
        }

        async fn is_finished(&self) -> bool {
            let state = self.0.lock().unwrap();
            state.finished || state.stopped
        }
    }

    pub(crate) const LOUNGE: ChannelId = ChannelId::new(10);
    pub(crate) const STAGE: ChannelId = ChannelId::new(11);

    /// Backend that knows "Lounge" and "Stage" and hands out `track` on play.
    pub(crate) fn backend_with(track: FakeTrack) -> MockVoiceBackend {
        let mut backend = MockVoiceBackend::new();
        backend
            .expect_resolve_voice_channel()
            .returning(|_, name| match name {
                "Lounge" => Some(LOUNGE),
                "Stage" => Some(STAGE),
                _ => None,
            });
        backend.expect_join().returning(|_, _| Ok(()));
        backend.expect_leave().returning(|_| Ok(()));
        backend
            .expect_play_file()
            .returning(move |_, _, gain| {
                let track = track.clone();
                track.0.lock().unwrap().volume = Some(gain);
                Ok(Box::new(track) as Box<dyn TrackControl>)
            });
        backend
    }

    pub(crate) fn fetcher_in(dir: PathBuf) -> MockTrackFetcher {
        let mut fetcher = MockTrackFetcher::new();
        let track_path = dir.join("song.mp3");
        fetcher.expect_track_path().return_const(track_path.clone());
        fetcher.expect_acquire().returning(move |url| {
            std::fs::write(&track_path, b"audio").unwrap();
            Ok(TrackFile::new(track_path.clone(), url).with_title("Song".into()))
        });
        fetcher
    }

    fn session() -> VoiceSession {
        VoiceSession::new(GuildId::new(1), 100)
    }

    #[tokio::test]
    async fn join_from_disconnected_is_idle() {
        let backend = backend_with(FakeTrack::default());
        let mut session = session();

        let outcome = session.join(&backend, "Lounge").await.unwrap();

        assert_eq!(outcome, JoinOutcome::Connected("Lounge".into()));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.channel().unwrap().id, LOUNGE);
    }

    #[tokio::test]
    async fn join_unknown_channel_changes_nothing() {
        let mut backend = MockVoiceBackend::new();
        backend.expect_resolve_voice_channel().returning(|_, _| None);
        backend.expect_join().never();
        let mut session = session();

        let err = session.join(&backend, "NoSuchChannel").await.unwrap_err();

        assert!(matches!(err, BotError::ChannelNotFound(name) if name == "NoSuchChannel"));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn move_keeps_playback_state() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with(FakeTrack::default());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/x").await.unwrap();
        let outcome = session.join(&backend, "Stage").await.unwrap();

        assert_eq!(
            outcome,
            JoinOutcome::Moved {
                from: "Lounge".into(),
                to: "Stage".into()
            }
        );
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.channel().unwrap().id, STAGE);
    }

    #[tokio::test]
    async fn play_requires_connection_and_skips_download() {
        let backend = MockVoiceBackend::new();
        let mut fetcher = MockTrackFetcher::new();
        fetcher.expect_acquire().never();
        let mut session = session();

        let err = session.play(&backend, &fetcher, "https://youtu.be/x").await.unwrap_err();

        assert!(matches!(err, BotError::NotConnected));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn play_while_track_open_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        let err = session.play(&backend, &fetcher, "https://youtu.be/b").await.unwrap_err();

        assert!(matches!(err, BotError::TrackBusy));
        assert_eq!(session.state(), SessionState::Playing);
        assert!(!track.0.lock().unwrap().stopped);
        assert!(dir.path().join("song.mp3").exists());
    }

    #[tokio::test]
    async fn play_while_paused_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        session.pause().await.unwrap();
        let err = session.play(&backend, &fetcher, "https://youtu.be/b").await.unwrap_err();

        assert!(matches!(err, BotError::TrackBusy));
        assert_eq!(session.state(), SessionState::Paused);
        assert!(!track.0.lock().unwrap().stopped);
        assert!(dir.path().join("song.mp3").exists());
    }

    #[tokio::test]
    async fn finished_track_frees_the_player() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        track.finish();

        assert!(matches!(session.pause().await, Err(BotError::NothingPlaying)));
        assert_eq!(session.state(), SessionState::Idle);
        session.play(&backend, &fetcher, "https://youtu.be/b").await.unwrap();
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[tokio::test]
    async fn pause_resume_cycle_preserves_volume() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        session.set_volume(30).await.unwrap();

        session.pause().await.unwrap();
        session.resume().await.unwrap();
        session.pause().await.unwrap();

        assert_eq!(session.state(), SessionState::Paused);
        assert!(track.0.lock().unwrap().paused);
        assert_eq!(session.volume_percent(), 30);
        assert_eq!(track.0.lock().unwrap().volume, Some(0.3));
    }

    #[tokio::test]
    async fn pause_and_resume_reject_wrong_states() {
        let backend = backend_with(FakeTrack::default());
        let mut session = session();

        assert!(matches!(session.pause().await, Err(BotError::NotConnected)));
        assert!(matches!(session.resume().await, Err(BotError::NotConnected)));

        session.join(&backend, "Lounge").await.unwrap();
        assert!(matches!(session.pause().await, Err(BotError::NothingPlaying)));
        assert!(matches!(session.resume().await, Err(BotError::NotPaused)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn volume_carries_over_to_next_track() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        assert_eq!(session.set_volume(50).await.unwrap(), 50);
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();

        assert_eq!(track.0.lock().unwrap().volume, Some(0.5));
        assert_eq!(session.gain(), 0.5);
    }

    #[tokio::test]
    async fn volume_is_clamped_and_needs_connection() {
        let backend = backend_with(FakeTrack::default());
        let mut session = session();

        assert!(matches!(session.set_volume(40).await, Err(BotError::NotConnected)));
        assert_eq!(session.volume_percent(), 100);

        session.join(&backend, "Lounge").await.unwrap();
        assert_eq!(session.set_volume(250).await.unwrap(), 100);
        assert_eq!(session.set_volume(-5).await.unwrap(), 0);
        assert_eq!(session.gain(), 0.0);
    }

    #[tokio::test]
    async fn stop_disconnects_and_releases_track() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();

        assert!(matches!(session.stop(&backend).await, Err(BotError::NotConnected)));

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        session.stop(&backend).await.unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(track.0.lock().unwrap().stopped);

        // rejoin and play again: the stale file is replaced
        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/b").await.unwrap();
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[tokio::test]
    async fn failed_leave_still_allows_rejoin() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut backend = MockVoiceBackend::new();
        backend
            .expect_resolve_voice_channel()
            .returning(|_, _| Some(LOUNGE));
        backend.expect_join().times(2).returning(|_, _| Ok(()));
        backend
            .expect_leave()
            .returning(|_| Err(BotError::Voice("NoCall".into())));
        let handed_out = track.clone();
        backend
            .expect_play_file()
            .returning(move |_, _, _| Ok(Box::new(handed_out.clone()) as Box<dyn TrackControl>));
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();
        let err = session.stop(&backend).await.unwrap_err();

        assert!(matches!(err, BotError::Voice(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(track.0.lock().unwrap().stopped);

        let outcome = session.join(&backend, "Lounge").await.unwrap();
        assert_eq!(outcome, JoinOutcome::Connected("Lounge".into()));
    }

    #[tokio::test]
    async fn failed_download_leaves_session_idle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with(FakeTrack::default());
        let mut fetcher = MockTrackFetcher::new();
        fetcher
            .expect_track_path()
            .return_const(dir.path().join("song.mp3"));
        fetcher
            .expect_acquire()
            .returning(|_| Err(BotError::DownloadFailed("ERROR: unavailable".into())));
        let mut session = session();

        session.join(&backend, "Lounge").await.unwrap();
        let err = session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap_err();

        assert!(matches!(err, BotError::DownloadFailed(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn external_disconnect_resets_session() {
        let dir = tempfile::tempdir().unwrap();
        let track = FakeTrack::default();
        let backend = backend_with(track.clone());
        let fetcher = fetcher_in(dir.path().to_path_buf());
        let mut session = session();
        session.join(&backend, "Lounge").await.unwrap();
        session.play(&backend, &fetcher, "https://youtu.be/a").await.unwrap();

        session.mark_disconnected();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(track.0.lock().unwrap().stopped);
    }
}
