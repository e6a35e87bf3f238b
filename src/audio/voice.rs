//! Seams between the playback engine and Discord.
//!
//! The session only talks to the traits in this module; the songbird and
//! serenity implementations live here as well so the rest of the engine can be
//! exercised without a gateway connection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    input::Input, tracks::TrackHandle, Call, Event, EventContext,
    EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::error::PlayerError;

/// Message posted by the backend when a track stops producing audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub generation: u64,
    pub error: Option<String>,
}

/// One-shot completion callback handed to the backend with each track.
///
/// Clones share the same flag, so however many backend events fire for a
/// track (end, error, stop), the session is woken exactly once.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    generation: u64,
    sender: UnboundedSender<PlaybackEvent>,
    fired: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn new(generation: u64, sender: UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            generation,
            sender,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reports the end of the track. Returns false if it was already reported.
    pub fn finish(&self, error: Option<String>) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // The receiver only disappears once the session is gone.
        let _ = self.sender.send(PlaybackEvent {
            generation: self.generation,
            error,
        });
        true
    }
}

/// An established voice connection for one guild.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Starts streaming `source`, replacing anything currently playing.
    /// `on_finish` must be triggered when the stream ends for any reason.
    async fn play(&self, source: Input, on_finish: CompletionSignal) -> Result<(), PlayerError>;

    async fn pause(&self) -> Result<(), PlayerError>;

    async fn resume(&self) -> Result<(), PlayerError>;

    /// Stops the current stream, which fires its completion signal.
    async fn stop(&self) -> Result<(), PlayerError>;

    /// Moves the connection to another channel of the same guild, keeping
    /// the current stream.
    async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlayerError>;

    async fn disconnect(&self) -> Result<(), PlayerError>;
}

/// Capability to join voice channels.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, PlayerError>;
}

/// Where a session posts its notices.
#[async_trait]
pub trait ChannelNotifier: Send + Sync {
    async fn send_text(&self, text: &str);

    async fn send_embed(&self, embed: CreateEmbed);
}

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, PlayerError> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error joining voice channel {} in guild {}: {:?}", channel_id, guild_id, e);
            PlayerError::Internal(anyhow::anyhow!("failed to join voice channel: {}", e))
        })?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                warn!("Could not self-deafen in guild {}: {:?}", guild_id, e);
            }
        }

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdConnection {
            manager: Arc::clone(&self.manager),
            guild_id,
            channel_id: Mutex::new(channel_id),
            call,
            current: Mutex::new(None),
        }))
    }
}

/// Voice connection backed by a songbird [`Call`].
pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: Mutex<ChannelId>,
    call: Arc<tokio::sync::Mutex<Call>>,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    fn current_track(&self) -> Result<TrackHandle, PlayerError> {
        self.current.lock().clone().ok_or(PlayerError::NothingPlaying)
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    fn channel_id(&self) -> ChannelId {
        *self.channel_id.lock()
    }

    async fn play(&self, source: Input, on_finish: CompletionSignal) -> Result<(), PlayerError> {
        let handle = {
            let mut handler = self.call.lock().await;
            handler.play_only_input(source)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackCompletionNotifier {
                        guild_id: self.guild_id,
                        signal: on_finish.clone(),
                    },
                )
                .map_err(|e| PlayerError::PlaybackBackend(e.to_string()))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.current_track()?
            .pause()
            .map_err(|e| PlayerError::PlaybackBackend(e.to_string()))
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.current_track()?
            .play()
            .map_err(|e| PlayerError::PlaybackBackend(e.to_string()))
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        if let Some(handle) = self.current.lock().take() {
            // A track that already ended reports an error here; nothing to do.
            if let Err(e) = handle.stop() {
                debug!("Stopping finished track in guild {}: {:?}", self.guild_id, e);
            }
        }
        Ok(())
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), PlayerError> {
        // Joining with an existing call moves it.
        self.manager.join(self.guild_id, channel_id).await.map_err(|e| {
            PlayerError::Internal(anyhow::anyhow!("failed to move to voice channel: {}", e))
        })?;
        *self.channel_id.lock() = channel_id;
        info!("🔀 Moved to voice channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlayerError> {
        self.stop().await?;
        match self.manager.remove(self.guild_id).await {
            Ok(()) | Err(songbird::error::JoinError::NoCall) => {
                info!("👋 Left voice channel in guild {}", self.guild_id);
                Ok(())
            }
            Err(e) => Err(PlayerError::Internal(anyhow::anyhow!(
                "failed to leave voice channel: {}",
                e
            ))),
        }
    }
}

/// Forwards songbird track end/error events to the session.
struct TrackCompletionNotifier {
    guild_id: GuildId,
    signal: CompletionSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = None;
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    error = Some(format!("{:?}", e));
                }
            }
        }

        if self.signal.finish(error) {
            debug!(
                "Track #{} finished in guild {}",
                self.signal.generation(),
                self.guild_id
            );
        }

        None
    }
}

/// Posts session notices into a text channel.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ChannelNotifier for DiscordNotifier {
    async fn send_text(&self, text: &str) {
        if let Err(e) = self.channel_id.say(self.http.as_ref(), text).await {
            error!("Error sending message to channel {}: {:?}", self.channel_id, e);
        }
    }

    async fn send_embed(&self, embed: CreateEmbed) {
        let message = CreateMessage::new().embed(embed);
        if let Err(e) = self.channel_id.send_message(self.http.as_ref(), message).await {
            error!("Error sending embed to channel {}: {:?}", self.channel_id, e);
        }
    }
}
