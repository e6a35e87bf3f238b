//! Music commands, independent of the interaction plumbing.
//!
//! Each function takes a [`MusicContext`] describing who invoked the command
//! and returns a [`Reply`] or a [`PlayerError`] for the dispatcher to render.

use serenity::{
    builder::CreateEmbed,
    model::id::{ChannelId, GuildId, UserId},
};
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{
        error::PlayerError,
        registry::SessionRegistry,
        session::PlaybackSession,
        track::TrackRef,
        voice::{ChannelNotifier, VoiceGateway},
    },
    sources::{LocalLibrary, LocalTrack, TrackResolver},
    ui::embeds::{create_queue_embed, QueuePage},
};

pub const QUEUE_PAGE_SIZE: usize = 10;

/// Who ran a command and where.
pub struct MusicContext<'a> {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Voice channel the caller is currently in.
    pub user_voice: Option<ChannelId>,
    pub registry: &'a SessionRegistry,
    pub gateway: &'a dyn VoiceGateway,
    /// Text channel the session will post to if one has to be created.
    pub notifier: Arc<dyn ChannelNotifier>,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Embed(CreateEmbed),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Embed(_) => None,
        }
    }
}

/// Joins the caller's voice channel, reusing the existing connection when
/// already there.
async fn ensure_connected(ctx: &MusicContext<'_>) -> Result<Arc<PlaybackSession>, PlayerError> {
    let channel_id = ctx.user_voice.ok_or(PlayerError::UserNotInVoice)?;
    let session = ctx
        .registry
        .get_or_create(ctx.guild_id, Arc::clone(&ctx.notifier));

    match session.voice_channel() {
        Some(current) if current == channel_id => return Ok(session),
        Some(_) => return Err(PlayerError::AlreadyConnectedElsewhere),
        None => {}
    }

    let voice = ctx.gateway.join(ctx.guild_id, channel_id).await?;
    session.connect(voice)?;
    Ok(session)
}

fn connected_session(ctx: &MusicContext<'_>) -> Result<Arc<PlaybackSession>, PlayerError> {
    ctx.registry
        .get(ctx.guild_id)
        .filter(|session| session.voice_channel().is_some())
        .ok_or(PlayerError::NotConnected)
}

/// Session with something queued, for the queue-editing commands.
fn queued_session(ctx: &MusicContext<'_>) -> Result<Arc<PlaybackSession>, PlayerError> {
    ctx.registry
        .get(ctx.guild_id)
        .filter(|session| !session.queue().is_empty())
        .ok_or(PlayerError::EmptyQueue)
}

fn enqueue_reply(
    session: &PlaybackSession,
    tracks: Vec<TrackRef>,
    summary: String,
) -> Result<Reply, PlayerError> {
    let requested = tracks.len();
    let accepted = session.enqueue(tracks)?;

    if accepted == 0 {
        return Ok(Reply::text("The queue is full."));
    }
    if accepted < requested {
        return Ok(Reply::text(format!(
            "{} ({} tracks didn't fit in the queue)",
            summary,
            requested - accepted
        )));
    }
    Ok(Reply::text(summary))
}

pub async fn join(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    let session = ensure_connected(ctx).await?;
    let channel = session.voice_channel().ok_or(PlayerError::NotConnected)?;
    Ok(Reply::text(format!("👋 Joined <#{}>.", channel)))
}

/// Joins `channel`, or the caller's channel when none is given. A connected
/// bot is moved there with its queue intact.
pub async fn summon(
    ctx: &MusicContext<'_>,
    channel: Option<ChannelId>,
) -> Result<Reply, PlayerError> {
    let destination = channel.or(ctx.user_voice).ok_or_else(|| {
        PlayerError::InvalidQuery(
            "You are neither connected to a voice channel nor specified a channel to join."
                .to_string(),
        )
    })?;
    let session = ctx
        .registry
        .get_or_create(ctx.guild_id, Arc::clone(&ctx.notifier));

    match session.voice_channel() {
        Some(current) if current == destination => {}
        Some(_) => {
            session.move_to(destination).await?;
            info!("🔀 Summoned to {} in guild {}", destination, ctx.guild_id);
            return Ok(Reply::text(format!("🔀 Moved to <#{}>.", destination)));
        }
        None => {
            let voice = ctx.gateway.join(ctx.guild_id, destination).await?;
            session.connect(voice)?;
        }
    }

    Ok(Reply::text(format!("👋 Joined <#{}>.", destination)))
}

pub async fn leave(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    connected_session(ctx)?;
    ctx.registry.leave(ctx.guild_id).await;
    info!("👋 Left voice on request in guild {}", ctx.guild_id);
    Ok(Reply::text("👋 Left the voice channel."))
}

pub async fn play(
    ctx: &MusicContext<'_>,
    resolver: &dyn TrackResolver,
    query: &str,
) -> Result<Reply, PlayerError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PlayerError::InvalidQuery("Tell me what to play.".to_string()));
    }

    let session = ensure_connected(ctx).await?;
    let tracks = resolver.resolve(query, ctx.user_id).await?;

    let summary = match tracks.as_slice() {
        [single] => format!("Enqueued song: {}", single.describe()),
        many => format!("Enqueued {} songs", many.len()),
    };
    enqueue_reply(&session, tracks, summary)
}

pub async fn play_local(
    ctx: &MusicContext<'_>,
    library: Option<&LocalLibrary>,
    title: Option<&str>,
    album: Option<&str>,
    artist: Option<&str>,
) -> Result<Reply, PlayerError> {
    let library = library.ok_or(PlayerError::LocalLibraryDisabled)?;
    let present: fn(Option<&str>) -> Option<&str> = |value| value.map(str::trim).filter(|v| !v.is_empty());
    let (title, album, artist) = (present(title), present(album), present(artist));

    if title.is_none() && album.is_none() {
        let reason = if artist.is_none() {
            "❌ No fields were entered.\n"
        } else {
            "Sorry, you can't search **only** by artist.\n"
        };
        return Err(PlayerError::InvalidQuery(format!(
            "{}At minimum, the `title` or `album` fields must be entered.",
            reason
        )));
    }

    let session = ensure_connected(ctx).await?;

    let mut matches = library.find_possible_songs(title, album, artist);
    if matches.is_empty() {
        let query = [title, album, artist]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" / ");
        return Err(PlayerError::NotFound(query));
    }

    if title.is_some() {
        let track: TrackRef = Arc::new(LocalTrack::new(matches[0].clone(), ctx.user_id));
        let mut summary = format!("Enqueued song: {}", track.describe());
        if matches.len() > 1 {
            summary = format!(
                "⚠ {} possible song matches. Use the album & artist fields to filter.\n{}",
                matches.len(),
                summary
            );
        }
        return enqueue_reply(&session, vec![track], summary);
    }

    LocalLibrary::album_order(&mut matches);
    let album_name = matches
        .last()
        .and_then(|song| song.album.clone())
        .unwrap_or_default();
    let tracks: Vec<TrackRef> = matches
        .into_iter()
        .map(|song| Arc::new(LocalTrack::new(song.clone(), ctx.user_id)) as TrackRef)
        .collect();
    let summary = format!("Enqueued {} songs from **{}**", tracks.len(), album_name);
    enqueue_reply(&session, tracks, summary)
}

pub async fn pause(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    connected_session(ctx)?.pause().await?;
    Ok(Reply::text("⏯ Paused."))
}

pub async fn resume(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    connected_session(ctx)?.resume().await?;
    Ok(Reply::text("⏯ Resumed."))
}

pub async fn stop(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    connected_session(ctx)?.stop().await?;
    Ok(Reply::text("⏹ Stopped and cleared the queue."))
}

pub async fn skip(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    connected_session(ctx)?.skip().await?;
    Ok(Reply::text("⏭ Skipped."))
}

/// Lists the queue, ten tracks per page. Pages past the end list nothing.
pub fn queue(ctx: &MusicContext<'_>, page: usize) -> Result<Reply, PlayerError> {
    let session = queued_session(ctx)?;
    let queue = session.queue();

    let total_tracks = queue.len();
    let pages = total_tracks.div_ceil(QUEUE_PAGE_SIZE);
    let page = page.max(1);
    let start = (page - 1).saturating_mul(QUEUE_PAGE_SIZE);

    let entries = queue
        .slice(start, start.saturating_add(QUEUE_PAGE_SIZE))
        .iter()
        .enumerate()
        .map(|(offset, track)| (start + offset + 1, track.short_info()))
        .collect();

    Ok(Reply::Embed(create_queue_embed(&QueuePage {
        page,
        pages,
        total_tracks,
        total_length: queue.total_length(),
        entries,
    })))
}

pub fn shuffle(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    queued_session(ctx)?.queue().shuffle();
    Ok(Reply::text("🔀 Shuffled the queue."))
}

/// Removes the track at a 1-based position.
pub fn remove(ctx: &MusicContext<'_>, index: usize) -> Result<Reply, PlayerError> {
    let session = queued_session(ctx)?;
    let position = index
        .checked_sub(1)
        .ok_or_else(|| PlayerError::InvalidQuery("Track numbers start at 1.".to_string()))?;

    let removed = session.queue().remove_at(position)?;
    Ok(Reply::text(format!("✅ Removed **{}** from the queue.", removed.name())))
}

pub fn toggle_loop(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    let session = ctx
        .registry
        .get(ctx.guild_id)
        .ok_or(PlayerError::NothingPlaying)?;

    let looping = session.toggle_loop()?;
    let name = session
        .current()
        .map(|track| track.name().to_string())
        .unwrap_or_default();

    Ok(Reply::text(if looping {
        format!("🔂 Looping **{}**.", name)
    } else {
        format!("➡️ No longer looping **{}**.", name)
    }))
}

pub fn now_playing(ctx: &MusicContext<'_>) -> Result<Reply, PlayerError> {
    let track = ctx
        .registry
        .get(ctx.guild_id)
        .and_then(|session| session.current())
        .ok_or(PlayerError::NothingPlaying)?;
    Ok(Reply::Embed(track.create_embed()))
}
