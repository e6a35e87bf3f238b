use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::info;

use super::{
    session::{PlaybackSession, SessionMap, SessionSettings},
    voice::ChannelNotifier,
};

/// Process-wide map from guild to its playback session.
///
/// Cheap to clone. Sessions detach themselves when they are destroyed, so a
/// lookup never returns a torn-down session.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Returns the live session for `guild_id`, creating one bound to
    /// `notifier` if none exists.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        notifier: Arc<dyn ChannelNotifier>,
    ) -> Arc<PlaybackSession> {
        let mut entry = self.sessions.entry(guild_id).or_insert_with(|| {
            info!("🆕 Creating playback session for guild {}", guild_id);
            self.new_session(guild_id, Arc::clone(&notifier))
        });

        if entry.is_destroyed() {
            *entry = self.new_session(guild_id, notifier);
        }

        Arc::clone(entry.value())
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions
            .get(&guild_id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| !session.is_destroyed())
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    /// Tears down the guild's session, if any. Returns whether one existed.
    pub async fn leave(&self, guild_id: GuildId) -> bool {
        match self.remove(guild_id) {
            Some(session) => {
                session.leave().await;
                true
            }
            None => false,
        }
    }

    /// Handles the bot being disconnected from `left` by someone else.
    ///
    /// Only a session still connected to that channel is torn down; a late
    /// event for an earlier connection leaves a newer session alone.
    pub async fn leave_disconnected(&self, guild_id: GuildId, left: Option<ChannelId>) -> bool {
        let removed = self.sessions.remove_if(&guild_id, |_, session| {
            disconnect_applies(left, session.voice_channel())
        });

        match removed {
            Some((_, session)) => {
                session.leave().await;
                true
            }
            None => false,
        }
    }

    /// Tears down every session. Used on shutdown.
    pub async fn clear(&self) {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.sessions.clear();

        info!("🧹 Closing {} playback sessions", sessions.len());
        futures::future::join_all(sessions.iter().map(|session| session.leave())).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn new_session(
        &self,
        guild_id: GuildId,
        notifier: Arc<dyn ChannelNotifier>,
    ) -> Arc<PlaybackSession> {
        PlaybackSession::new(
            guild_id,
            notifier,
            self.settings.clone(),
            Arc::downgrade(&self.sessions),
        )
    }
}

/// Whether a voice disconnect from `left` concerns a session currently
/// connected to `connected`. An unknown `left` matches any live connection.
fn disconnect_applies(left: Option<ChannelId>, connected: Option<ChannelId>) -> bool {
    match (left, connected) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(left), Some(connected)) => left == connected,
    }
}
