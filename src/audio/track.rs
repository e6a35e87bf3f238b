use async_trait::async_trait;
use serenity::{builder::CreateEmbed, model::id::UserId};
use songbird::input::Input;
use std::{fmt, sync::Arc, time::Duration};

use super::error::PlayerError;

/// Shared handle to a queued track.
///
/// The queue owns tracks until they are dequeued, after which the session
/// keeps the same handle as its current track (loop mode replays it).
pub type TrackRef = Arc<dyn Playable>;

/// A playable audio item with lazily produced audio.
///
/// Implementations must not resolve their stream at construction time:
/// [`Playable::generate_source`] is called right before playback, which can
/// be long after the track was queued.
#[async_trait]
pub trait Playable: Send + Sync + fmt::Debug {
    /// Produces a fresh audio source for the voice driver.
    async fn generate_source(&self) -> Result<Input, PlayerError>;

    /// Builds the "now playing" display. Never fails; missing metadata is
    /// rendered with placeholders.
    fn create_embed(&self) -> CreateEmbed;

    fn name(&self) -> &str;

    fn url(&self) -> Option<&str>;

    fn length(&self) -> Option<Duration>;

    /// Artist or uploader, when known.
    fn author(&self) -> Option<&str>;

    fn requester(&self) -> UserId;

    /// One-line summary used in queue listings.
    fn short_info(&self) -> String {
        let name = match self.url() {
            Some(url) => format!("[**{}**]({})", self.name(), url),
            None => format!("**{}**", self.name()),
        };
        format!("{} - {}", name, format_length(self.length()))
    }

    /// Summary used when acknowledging an enqueue.
    fn describe(&self) -> String {
        format!(
            "**{}** by **{}**",
            self.name(),
            self.author().unwrap_or(UNKNOWN_PLACEHOLDER)
        )
    }
}

pub const UNKNOWN_PLACEHOLDER: &str = "Unknown";

/// Renders a length as `1d 2h 3m 4s`, skipping zero components.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (minutes, seconds) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

pub fn format_length(length: Option<Duration>) -> String {
    length
        .map(format_duration)
        .unwrap_or_else(|| "unknown length".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::StubTrack;

    #[test]
    fn durations_skip_empty_components() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_duration(Duration::from_secs(90061)), "1d 1h 1m 1s");
    }

    #[test]
    fn short_info_degrades_without_url_or_length() {
        let bare = StubTrack::new("Teardrop");
        assert_eq!(bare.short_info(), "**Teardrop** - unknown length");

        let linked = StubTrack::new("Angel")
            .with_url("https://youtu.be/abc")
            .with_length(Duration::from_secs(379));
        assert_eq!(linked.short_info(), "[**Angel**](https://youtu.be/abc) - 6m 19s");
    }

    #[test]
    fn describe_uses_placeholder_author() {
        let track = StubTrack::new("Dissolved Girl");
        assert_eq!(track.describe(), "**Dissolved Girl** by **Unknown**");
    }
}
