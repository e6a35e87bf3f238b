pub mod local;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;

use crate::audio::{error::PlayerError, track::TrackRef};

pub use local::{LocalLibrary, LocalTrack, SongData, SongField};
pub use youtube::{RemoteTrack, YtDlp, YtDlpResolver};

/// Turns a user query into playable tracks.
///
/// Resolution only fetches metadata; the audio locator is produced later by
/// each track's `generate_source`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Returns one track for a single item, or every entry of a playlist.
    /// Never returns an empty list: no results is [`PlayerError::NotFound`].
    async fn resolve(&self, query: &str, requester: UserId) -> Result<Vec<TrackRef>, PlayerError>;
}

/// Whether the query should be handed to yt-dlp as-is instead of searched.
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
