use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::{
    error::PlayerError,
    queue::TrackQueue,
    track::TrackRef,
    voice::{ChannelNotifier, CompletionSignal, PlaybackEvent, VoiceConnection},
};

pub(crate) type SessionMap = DashMap<GuildId, Arc<PlaybackSession>>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub const IDLE_NOTICE: &str = "I'm sleepy! Nothing left to play, so I'm leaving the voice channel.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No voice connection yet.
    Disconnected,
    /// Connected and waiting for the queue.
    Idle,
    Playing,
    Paused,
    /// Connection released and loop ended; the registry replaces it on next use.
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// How long an idle, non-looping session waits for a track before leaving.
    pub idle_timeout: Duration,
    pub max_queue_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(180),
            max_queue_size: 1000,
        }
    }
}

#[derive(Default)]
struct SessionState {
    current: Option<TrackRef>,
    voice: Option<Arc<dyn VoiceConnection>>,
    looping: bool,
    paused: bool,
    /// Bumped whenever a track starts or playback is reset; completion events
    /// from older generations are ignored.
    generation: u64,
}

/// Per-guild playback state machine.
///
/// Owns the queue, the voice connection and the background playback loop.
/// The loop is the only consumer of the completion channel; commands mutate
/// the queue and state concurrently through the public methods.
pub struct PlaybackSession {
    id: u64,
    guild_id: GuildId,
    settings: SessionSettings,
    notifier: Arc<dyn ChannelNotifier>,
    queue: TrackQueue,
    state: Mutex<SessionState>,
    events: UnboundedSender<PlaybackEvent>,
    pending_events: Mutex<Option<UnboundedReceiver<PlaybackEvent>>>,
    player_task: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    registry: Weak<SessionMap>,
}

impl PlaybackSession {
    pub(crate) fn new(
        guild_id: GuildId,
        notifier: Arc<dyn ChannelNotifier>,
        settings: SessionSettings,
        registry: Weak<SessionMap>,
    ) -> Arc<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            guild_id,
            settings,
            notifier,
            queue: TrackQueue::new(),
            state: Mutex::new(SessionState::default()),
            events,
            pending_events: Mutex::new(Some(receiver)),
            player_task: Mutex::new(None),
            destroyed: AtomicBool::new(false),
            registry,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    pub fn current(&self) -> Option<TrackRef> {
        self.state.lock().current.clone()
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Voice channel the session is connected to, if any.
    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.state.lock().voice.as_ref().map(|voice| voice.channel_id())
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_destroyed() {
            return SessionStatus::Destroyed;
        }
        let state = self.state.lock();
        match (&state.voice, &state.current) {
            (None, _) => SessionStatus::Disconnected,
            (Some(_), None) => SessionStatus::Idle,
            (Some(_), Some(_)) if state.paused => SessionStatus::Paused,
            (Some(_), Some(_)) => SessionStatus::Playing,
        }
    }

    /// Attaches a voice connection and starts the playback loop.
    ///
    /// Connecting again to the same channel is a no-op; a different channel
    /// is rejected.
    pub fn connect(self: &Arc<Self>, voice: Arc<dyn VoiceConnection>) -> Result<(), PlayerError> {
        if self.is_destroyed() {
            return Err(PlayerError::NotConnected);
        }

        {
            let mut state = self.state.lock();
            if let Some(existing) = &state.voice {
                return if existing.channel_id() == voice.channel_id() {
                    Ok(())
                } else {
                    Err(PlayerError::AlreadyConnectedElsewhere)
                };
            }
            state.voice = Some(voice);
        }

        let mut task = self.player_task.lock();
        if task.is_none() {
            if let Some(events) = self.pending_events.lock().take() {
                *task = Some(tokio::spawn(Arc::clone(self).run(events)));
            }
        }
        Ok(())
    }

    /// Moves the existing connection to `channel_id`. Playback carries on.
    pub async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlayerError> {
        let voice = self
            .state
            .lock()
            .voice
            .clone()
            .ok_or(PlayerError::NotConnected)?;
        voice.move_to(channel_id).await
    }

    /// Queues tracks in order, up to the queue limit. Returns how many were
    /// accepted, or [`PlayerError::NotConnected`] once the session is closing.
    pub fn enqueue(&self, tracks: Vec<TrackRef>) -> Result<usize, PlayerError> {
        self.queue.extend_bounded(tracks, self.settings.max_queue_size)
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        let voice = {
            let state = self.state.lock();
            let voice = state.voice.clone().ok_or(PlayerError::NotConnected)?;
            if state.current.is_none() {
                return Err(PlayerError::NothingPlaying);
            }
            if state.paused {
                return Err(PlayerError::AlreadyPaused);
            }
            voice
        };

        voice.pause().await?;
        self.state.lock().paused = true;
        info!("⏸️ Paused playback in guild {}", self.guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        let voice = {
            let state = self.state.lock();
            let voice = state.voice.clone().ok_or(PlayerError::NotConnected)?;
            if state.current.is_none() {
                return Err(PlayerError::NothingPlaying);
            }
            if !state.paused {
                return Err(PlayerError::NotPaused);
            }
            voice
        };

        voice.resume().await?;
        self.state.lock().paused = false;
        info!("▶️ Resumed playback in guild {}", self.guild_id);
        Ok(())
    }

    /// Ends the current track. Also cancels a track that is still being
    /// prepared, so it never starts.
    pub async fn skip(&self) -> Result<(), PlayerError> {
        let voice = {
            let mut state = self.state.lock();
            let voice = state.voice.clone().ok_or(PlayerError::NotConnected)?;
            if state.current.is_none() {
                return Err(PlayerError::NothingPlaying);
            }
            if !state.looping {
                state.current = None;
            }
            state.paused = false;
            state.generation += 1;
            voice
        };

        info!("⏭️ Skipping track in guild {}", self.guild_id);
        voice.stop().await
    }

    /// Clears the queue and the current track but keeps the connection.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        self.queue.clear();
        let voice = {
            let mut state = self.state.lock();
            let voice = state.voice.clone().ok_or(PlayerError::NotConnected)?;
            state.current = None;
            state.looping = false;
            state.paused = false;
            state.generation += 1;
            voice
        };

        info!("⏹️ Stopped playback in guild {}", self.guild_id);
        voice.stop().await
    }

    /// Flips loop mode for the current track and returns the new value.
    pub fn toggle_loop(&self) -> Result<bool, PlayerError> {
        let mut state = self.state.lock();
        if state.current.is_none() {
            return Err(PlayerError::NothingPlaying);
        }
        state.looping = !state.looping;
        info!(
            "{} Loop mode {} in guild {}",
            if state.looping { "🔂" } else { "➡️" },
            if state.looping { "enabled" } else { "disabled" },
            self.guild_id
        );
        Ok(state.looping)
    }

    /// Explicit teardown: cancels the loop, releases the connection and
    /// detaches from the registry. Safe to call more than once.
    pub async fn leave(&self) {
        self.mark_destroyed();
        if let Some(task) = self.player_task.lock().take() {
            task.abort();
        }
        self.teardown().await;
    }

    async fn run(self: Arc<Self>, mut events: UnboundedReceiver<PlaybackEvent>) {
        info!("🎶 Playback loop started for guild {}", self.guild_id);

        let outcome = self.play_loop(&mut events).await;

        // Unreachable from the registry before anything else is awaited.
        self.mark_destroyed();
        self.teardown().await;

        match outcome {
            Err(PlayerError::QueueTimeout) => {
                info!(
                    "💤 Guild {} was idle for {:?}, disconnected",
                    self.guild_id, self.settings.idle_timeout
                );
                self.notifier.send_text(IDLE_NOTICE).await;
            }
            Err(e) => {
                error!("❌ Playback loop for guild {} failed: {:?}", self.guild_id, e);
                self.notifier
                    .send_text(&format!("{} Left the voice channel.", e.user_message()))
                    .await;
            }
            Ok(()) => {}
        }

        info!("🛑 Playback loop ended for guild {}", self.guild_id);
    }

    async fn play_loop(
        &self,
        events: &mut UnboundedReceiver<PlaybackEvent>,
    ) -> Result<(), PlayerError> {
        loop {
            let track = match self.replay_candidate() {
                Some(track) => {
                    debug!("🔂 Replaying {} in guild {}", track.name(), self.guild_id);
                    track
                }
                None => match self.queue.pop(self.settings.idle_timeout).await {
                    Ok(track) => track,
                    // A track pushed right at the deadline still gets played.
                    Err(PlayerError::QueueTimeout) if !self.queue.close_if_empty() => continue,
                    Err(e) => return Err(e),
                },
            };

            let (voice, generation) = self.begin(&track)?;

            let source = match track.generate_source().await {
                Ok(source) => source,
                Err(e) => {
                    warn!(
                        "⚠️ Could not prepare {} in guild {}: {}",
                        track.name(),
                        self.guild_id,
                        e
                    );
                    self.notifier
                        .send_text(&format!("Skipping **{}**: {}", track.name(), e.user_message()))
                        .await;
                    self.abandon(generation);
                    continue;
                }
            };

            if !self.is_generation(generation) {
                debug!("Playback of {} was cancelled before it started", track.name());
                continue;
            }

            let signal = CompletionSignal::new(generation, self.events.clone());
            if let Err(e) = voice.play(source, signal).await {
                warn!(
                    "⚠️ Backend refused {} in guild {}: {}",
                    track.name(),
                    self.guild_id,
                    e
                );
                self.abandon(generation);
                continue;
            }

            if !self.is_generation(generation) {
                // Stopped while the backend was starting the stream.
                if let Err(e) = voice.stop().await {
                    debug!("Error stopping cancelled track: {:?}", e);
                }
                continue;
            }

            info!("🎵 Now playing in guild {}: {}", self.guild_id, track.name());
            self.notifier.send_embed(track.create_embed()).await;

            self.wait_for_completion(events, generation).await?;
            self.finish(generation);
        }
    }

    fn replay_candidate(&self) -> Option<TrackRef> {
        let state = self.state.lock();
        if state.looping {
            state.current.clone()
        } else {
            None
        }
    }

    fn begin(&self, track: &TrackRef) -> Result<(Arc<dyn VoiceConnection>, u64), PlayerError> {
        let mut state = self.state.lock();
        let voice = state.voice.clone().ok_or(PlayerError::NotConnected)?;
        state.generation += 1;
        state.current = Some(Arc::clone(track));
        state.paused = false;
        Ok((voice, state.generation))
    }

    fn is_generation(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    /// Drops a track that never started. Loop mode is cleared so a broken
    /// track is not retried forever.
    fn abandon(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.current = None;
            state.looping = false;
            state.paused = false;
        }
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.paused = false;
            if !state.looping {
                state.current = None;
            }
        }
    }

    async fn wait_for_completion(
        &self,
        events: &mut UnboundedReceiver<PlaybackEvent>,
        generation: u64,
    ) -> Result<(), PlayerError> {
        loop {
            match events.recv().await {
                Some(event) if event.generation == generation => {
                    if let Some(reason) = event.error {
                        let err = PlayerError::PlaybackBackend(reason);
                        warn!("⚠️ Track ended early in guild {}: {}", self.guild_id, err);
                    }
                    return Ok(());
                }
                Some(stale) => {
                    debug!("Ignoring completion of track #{}", stale.generation);
                }
                None => {
                    return Err(PlayerError::Internal(anyhow::anyhow!(
                        "completion channel closed"
                    )))
                }
            }
        }
    }

    /// Single funnel for every terminal path. Idempotent.
    async fn teardown(&self) {
        self.queue.close();
        let voice = {
            let mut state = self.state.lock();
            state.current = None;
            state.looping = false;
            state.paused = false;
            state.generation += 1;
            state.voice.take()
        };

        if let Some(voice) = voice {
            if let Err(e) = voice.disconnect().await {
                error!("Error disconnecting voice in guild {}: {:?}", self.guild_id, e);
            }
        }
    }

    fn mark_destroyed(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.close();
        if let Some(sessions) = self.registry.upgrade() {
            sessions.remove_if(&self.guild_id, |_, session| session.id == self.id);
        }
        debug!("Session {} for guild {} destroyed", self.id, self.guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{eventually, FakeVoice, Notice, RecordingNotifier, StubTrack};
    use pretty_assertions::assert_eq;

    fn session_with(notifier: Arc<RecordingNotifier>) -> Arc<PlaybackSession> {
        PlaybackSession::new(
            GuildId::new(42),
            notifier,
            SessionSettings::default(),
            Weak::new(),
        )
    }

    async fn connected() -> (Arc<PlaybackSession>, Arc<FakeVoice>, Arc<RecordingNotifier>) {
        let notifier = RecordingNotifier::shared();
        let session = session_with(Arc::clone(&notifier));
        let voice = FakeVoice::new(7);
        session.connect(voice.clone()).unwrap();
        eventually("session idle", || session.status() == SessionStatus::Idle).await;
        (session, voice, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn new_session_is_disconnected_until_connected() {
        let session = session_with(RecordingNotifier::shared());
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.current().is_none());
        assert!(matches!(session.skip().await, Err(PlayerError::NotConnected)));
        assert!(matches!(session.pause().await, Err(PlayerError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn plays_queued_tracks_in_order_then_idles() {
        let (session, voice, notifier) = connected().await;
        session
            .enqueue(vec![
                StubTrack::shared("T1"),
                StubTrack::shared("T2"),
                StubTrack::shared("T3"),
            ])
            .unwrap();

        for played in 1..=3 {
            eventually("next track", || voice.play_count() == played).await;
            assert_eq!(session.status(), SessionStatus::Playing);
            assert!(voice.finish_current());
        }

        eventually("idle", || session.status() == SessionStatus::Idle).await;
        assert_eq!(notifier.now_playing(), vec!["T1", "T2", "T3"]);
        assert!(session.current().is_none());
        assert!(session.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_mode_replays_the_same_track() {
        let (session, voice, notifier) = connected().await;
        let track = Arc::new(StubTrack::new("T1"));
        session.enqueue(vec![track.clone() as TrackRef]).unwrap();
        session.enqueue(vec![StubTrack::shared("T2")]).unwrap();

        eventually("first play", || voice.play_count() == 1).await;
        assert_eq!(session.toggle_loop().unwrap(), true);

        for played in 2..=3 {
            assert!(voice.finish_current());
            eventually("replay", || voice.play_count() == played).await;
        }

        assert_eq!(notifier.now_playing(), vec!["T1", "T1", "T1"]);
        assert_eq!(track.sources_generated(), 3);
        let current = session.current().unwrap();
        assert!(Arc::ptr_eq(&current, &(track.clone() as TrackRef)));
        assert_eq!(session.status(), SessionStatus::Playing);
        assert_eq!(session.queue().len(), 1);

        assert_eq!(session.toggle_loop().unwrap(), false);
        assert!(voice.finish_current());
        eventually("advance after unloop", || voice.play_count() == 4).await;
        assert_eq!(notifier.now_playing().last().unwrap(), "T2");
    }

    #[tokio::test(start_paused = true)]
    async fn looping_track_never_times_out() {
        let (session, voice, notifier) = connected().await;
        session.enqueue(vec![StubTrack::shared("forever")]).unwrap();
        eventually("first play", || voice.play_count() == 1).await;
        session.toggle_loop().unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(session.status(), SessionStatus::Playing);
        assert!(notifier.texts().is_empty());
        assert_eq!(voice.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_advances_to_the_next_track() {
        let (session, voice, notifier) = connected().await;
        session.enqueue(vec![StubTrack::shared("T1"), StubTrack::shared("T2")]).unwrap();

        eventually("first play", || voice.play_count() == 1).await;
        assert!(voice.fail_current("opus encoder crashed"));

        eventually("second play", || voice.play_count() == 2).await;
        assert_eq!(notifier.now_playing(), vec!["T1", "T2"]);

        assert!(voice.fail_current("again"));
        eventually("idle", || session.status() == SessionStatus::Idle).await;
        assert_eq!(voice.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_track_is_skipped_with_a_notice() {
        let (session, voice, notifier) = connected().await;
        session.enqueue(vec![StubTrack::broken("gone"), StubTrack::shared("T2")]).unwrap();

        eventually("second track", || voice.play_count() == 1).await;
        assert_eq!(notifier.now_playing(), vec!["T2"]);
        let texts = notifier.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Skipping **gone**"));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_end_events_advance_only_once() {
        let (session, voice, _notifier) = connected().await;
        session
            .enqueue(vec![
                StubTrack::shared("T1"),
                StubTrack::shared("T2"),
                StubTrack::shared("T3"),
            ])
            .unwrap();

        eventually("first play", || voice.play_count() == 1).await;
        assert!(voice.finish_current());
        assert!(!voice.finish_current());
        eventually("second play", || voice.play_count() == 2).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(voice.play_count(), 2);
        assert_eq!(session.current().unwrap().name(), "T2");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_require_the_matching_state() {
        let (session, voice, _notifier) = connected().await;
        assert!(matches!(session.pause().await, Err(PlayerError::NothingPlaying)));

        session.enqueue(vec![StubTrack::shared("T1")]).unwrap();
        eventually("play", || voice.play_count() == 1).await;

        assert!(matches!(session.resume().await, Err(PlayerError::NotPaused)));
        session.pause().await.unwrap();
        assert!(voice.is_paused());
        assert_eq!(session.status(), SessionStatus::Paused);
        assert!(matches!(session.pause().await, Err(PlayerError::AlreadyPaused)));

        session.resume().await.unwrap();
        assert!(!voice.is_paused());
        assert_eq!(session.status(), SessionStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_moves_to_the_next_track() {
        let (session, voice, notifier) = connected().await;
        assert!(matches!(session.skip().await, Err(PlayerError::NothingPlaying)));

        session.enqueue(vec![StubTrack::shared("T1"), StubTrack::shared("T2")]).unwrap();
        eventually("play", || voice.play_count() == 1).await;
        session.pause().await.unwrap();

        session.skip().await.unwrap();
        eventually("next", || voice.play_count() == 2).await;
        assert_eq!(notifier.now_playing(), vec!["T1", "T2"]);
        assert_eq!(session.status(), SessionStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_everything_but_keeps_the_connection() {
        let (session, voice, _notifier) = connected().await;
        session
            .enqueue(vec![
                StubTrack::shared("T1"),
                StubTrack::shared("T2"),
                StubTrack::shared("T3"),
            ])
            .unwrap();
        eventually("play", || voice.play_count() == 1).await;
        session.toggle_loop().unwrap();

        session.stop().await.unwrap();
        eventually("idle", || session.status() == SessionStatus::Idle).await;

        assert!(session.queue().is_empty());
        assert!(!session.is_looping());
        assert_eq!(voice.disconnects(), 0);
        assert_eq!(voice.play_count(), 1);

        session.enqueue(vec![StubTrack::shared("T4")]).unwrap();
        eventually("play after stop", || voice.play_count() == 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_tears_the_session_down() {
        let notifier = RecordingNotifier::shared();
        let session = PlaybackSession::new(
            GuildId::new(42),
            notifier.clone(),
            SessionSettings {
                idle_timeout: Duration::from_secs(30),
                ..SessionSettings::default()
            },
            Weak::new(),
        );
        let voice = FakeVoice::new(7);
        session.connect(voice.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(session.status(), SessionStatus::Idle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        eventually("destroyed", || session.status() == SessionStatus::Destroyed).await;
        assert_eq!(notifier.notices(), vec![Notice::Text(IDLE_NOTICE.to_string())]);
        assert_eq!(voice.disconnects(), 1);
        assert!(session.voice_channel().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent_per_channel() {
        let (session, _voice, _notifier) = connected().await;
        assert!(session.connect(FakeVoice::new(7)).is_ok());
        assert!(matches!(
            session.connect(FakeVoice::new(8)),
            Err(PlayerError::AlreadyConnectedElsewhere)
        ));
        assert_eq!(session.voice_channel(), Some(ChannelId::new(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn leave_is_idempotent() {
        let (session, voice, _notifier) = connected().await;
        session
            .enqueue(vec![StubTrack::shared("T1"), StubTrack::shared("T2")])
            .unwrap();
        eventually("play", || voice.play_count() == 1).await;

        session.leave().await;
        session.leave().await;

        assert_eq!(session.status(), SessionStatus::Destroyed);
        assert_eq!(voice.disconnects(), 1);
        assert!(session.queue().is_empty());
        assert!(session.current().is_none());
        assert!(matches!(
            session.connect(FakeVoice::new(7)),
            Err(PlayerError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_respects_the_queue_limit() {
        let session = PlaybackSession::new(
            GuildId::new(1),
            RecordingNotifier::shared(),
            SessionSettings {
                max_queue_size: 2,
                ..SessionSettings::default()
            },
            Weak::new(),
        );
        let accepted = session
            .enqueue(vec![
                StubTrack::shared("a"),
                StubTrack::shared("b"),
                StubTrack::shared("c"),
            ])
            .unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(session.queue().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn left_session_refuses_new_tracks() {
        let (session, _voice, _notifier) = connected().await;
        session.leave().await;

        let result = session.enqueue(vec![StubTrack::shared("late")]);
        assert!(matches!(result, Err(PlayerError::NotConnected)));
        assert!(session.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_cancels_a_track_that_is_still_being_prepared() {
        let (session, voice, notifier) = connected().await;
        let slow: TrackRef =
            Arc::new(StubTrack::new("slow").with_prepare_delay(Duration::from_secs(5)));
        session
            .enqueue(vec![slow, StubTrack::shared("T2")])
            .unwrap();
        eventually("preparing", || session.current().is_some()).await;
        assert_eq!(voice.play_count(), 0);

        session.skip().await.unwrap();
        assert!(session.current().is_none());

        tokio::time::sleep(Duration::from_secs(6)).await;
        eventually("next", || voice.play_count() == 1).await;
        assert_eq!(notifier.now_playing(), vec!["T2"]);
        assert_eq!(session.current().unwrap().name(), "T2");
    }
}
