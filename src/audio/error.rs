use thiserror::Error;

/// Failures surfaced by the playback engine and the music commands.
///
/// Every variant except [`PlayerError::Internal`] has a short message that is
/// safe to show to users; internal failures are logged in full and reported
/// with a generic notice.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("not connected to any voice channel")]
    NotConnected,

    #[error("already connected to a different voice channel")]
    AlreadyConnectedElsewhere,

    #[error("caller is not connected to any voice channel")]
    UserNotInVoice,

    #[error("couldn't find anything that matches `{0}`")]
    NotFound(String),

    #[error("unable to resolve audio: {0}")]
    Resolution(String),

    #[error("no track arrived before the idle timeout")]
    QueueTimeout,

    #[error("index {index} is out of range for a queue of {len} tracks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("playback backend failure: {0}")]
    PlaybackBackend(String),

    #[error("nothing is being played")]
    NothingPlaying,

    #[error("playback is not paused")]
    NotPaused,

    #[error("playback is already paused")]
    AlreadyPaused,

    #[error("queue is empty")]
    EmptyQueue,

    #[error("local music playback is disabled")]
    LocalLibraryDisabled,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PlayerError {
    /// Text shown to the user that triggered the failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConnected => "Not connected to any voice channel.".to_string(),
            Self::AlreadyConnectedElsewhere => "Bot is already in a voice channel.".to_string(),
            Self::UserNotInVoice => "You are not connected to any voice channel.".to_string(),
            Self::NotFound(query) => format!("Couldn't find anything that matches `{}`", query),
            Self::Resolution(reason) => {
                format!("An error occurred while processing this request: {}", reason)
            }
            Self::QueueTimeout => "I'm sleepy! Nothing was queued, so I left.".to_string(),
            Self::IndexOutOfRange { index, len } => {
                format!("There is no track #{} (the queue has {} tracks).", index + 1, len)
            }
            Self::PlaybackBackend(_) => "The track stopped because of a playback error.".to_string(),
            Self::NothingPlaying => "Not playing any music right now...".to_string(),
            Self::NotPaused => "The player isn't paused.".to_string(),
            Self::AlreadyPaused => "The player is already paused.".to_string(),
            Self::EmptyQueue => "Queue is empty.".to_string(),
            Self::LocalLibraryDisabled => "❌ Can't play local songs, as the bot runner hasn't set a music folder. Try the normal play command".to_string(),
            Self::InvalidQuery(reason) => reason.clone(),
            Self::Internal(_) => "An error occurred.".to_string(),
        }
    }

    /// Whether the failure is unexpected and deserves a full server-side log.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
