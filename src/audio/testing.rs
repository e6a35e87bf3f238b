//! In-memory doubles for the voice backend, used by the engine and command tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    builder::CreateEmbed,
    model::id::{ChannelId, GuildId, UserId},
};
use songbird::input::{File, Input};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    error::PlayerError,
    track::{Playable, TrackRef},
    voice::{ChannelNotifier, CompletionSignal, VoiceConnection, VoiceGateway},
};

#[derive(Debug, Clone)]
pub struct StubTrack {
    name: String,
    url: Option<String>,
    length: Option<Duration>,
    author: Option<String>,
    broken: bool,
    prepare_delay: Duration,
    sources_generated: Arc<AtomicUsize>,
}

impl StubTrack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: None,
            length: None,
            author: None,
            broken: false,
            prepare_delay: Duration::ZERO,
            sources_generated: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn shared(name: &str) -> TrackRef {
        Arc::new(Self::new(name))
    }

    /// A track whose stream can no longer be resolved.
    pub fn broken(name: &str) -> TrackRef {
        Arc::new(Self {
            broken: true,
            ..Self::new(name)
        })
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Makes `generate_source` take a while, like a slow yt-dlp lookup.
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    pub fn sources_generated(&self) -> usize {
        self.sources_generated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Playable for StubTrack {
    async fn generate_source(&self) -> Result<Input, PlayerError> {
        if !self.prepare_delay.is_zero() {
            tokio::time::sleep(self.prepare_delay).await;
        }
        if self.broken {
            return Err(PlayerError::Resolution(format!(
                "unable to find **{}**",
                self.name
            )));
        }
        self.sources_generated.fetch_add(1, Ordering::SeqCst);
        Ok(File::new("stub.ogg").into())
    }

    fn create_embed(&self) -> CreateEmbed {
        CreateEmbed::new().title("Now playing").description(&self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn length(&self) -> Option<Duration> {
        self.length
    }

    fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    fn requester(&self) -> UserId {
        UserId::new(1)
    }
}

pub fn names(tracks: &[TrackRef]) -> Vec<String> {
    tracks.iter().map(|track| track.name().to_string()).collect()
}

/// Voice connection that records calls and lets tests end tracks by hand.
pub struct FakeVoice {
    channel_id: Mutex<ChannelId>,
    signals: Mutex<Vec<CompletionSignal>>,
    paused: AtomicBool,
    disconnects: AtomicUsize,
}

impl FakeVoice {
    pub fn new(channel: u64) -> Arc<Self> {
        Arc::new(Self {
            channel_id: Mutex::new(ChannelId::new(channel)),
            signals: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn play_count(&self) -> usize {
        self.signals.lock().len()
    }

    /// Simulates the backend reaching the end of the current stream.
    pub fn finish_current(&self) -> bool {
        self.end_current(None)
    }

    /// Simulates the backend faulting mid-stream.
    pub fn fail_current(&self, reason: &str) -> bool {
        self.end_current(Some(reason.to_string()))
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn end_current(&self, error: Option<String>) -> bool {
        let last = self.signals.lock().last().cloned();
        last.map(|signal| signal.finish(error)).unwrap_or(false)
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    fn channel_id(&self) -> ChannelId {
        *self.channel_id.lock()
    }

    async fn play(&self, _source: Input, on_finish: CompletionSignal) -> Result<(), PlayerError> {
        self.paused.store(false, Ordering::SeqCst);
        self.signals.lock().push(on_finish);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.end_current(None);
        Ok(())
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlayerError> {
        *self.channel_id.lock() = channel_id;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        self.end_current(None);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    joined: Mutex<Vec<Arc<FakeVoice>>>,
}

impl FakeGateway {
    pub fn joins(&self) -> usize {
        self.joined.lock().len()
    }

    pub fn last_voice(&self) -> Option<Arc<FakeVoice>> {
        self.joined.lock().last().cloned()
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, PlayerError> {
        let voice = FakeVoice::new(channel_id.get());
        self.joined.lock().push(Arc::clone(&voice));
        Ok(voice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Text(String),
    NowPlaying(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    text_delay: Duration,
}

impl RecordingNotifier {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A notifier whose text messages take `delay` to go out.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            text_delay: delay,
            ..Self::default()
        })
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Titles announced as "now playing", in order.
    pub fn now_playing(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::NowPlaying(title) => Some(title.clone()),
                Notice::Text(_) => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter_map(|notice| match notice {
                Notice::Text(text) => Some(text.clone()),
                Notice::NowPlaying(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChannelNotifier for RecordingNotifier {
    async fn send_text(&self, text: &str) {
        if !self.text_delay.is_zero() {
            tokio::time::sleep(self.text_delay).await;
        }
        self.notices.lock().push(Notice::Text(text.to_string()));
    }

    async fn send_embed(&self, embed: CreateEmbed) {
        let value = serde_json::to_value(&embed).unwrap_or_default();
        let title = value["description"].as_str().unwrap_or_default().to_string();
        self.notices.lock().push(Notice::NowPlaying(title));
    }
}

/// Polls `condition` while letting virtual time advance in 1ms steps.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for {}", what);
}
