//! # Audio Module
//!
//! Playback engine shared by every guild.
//!
//! ### [`session`] - Playback Session
//! - One state machine per guild: connection, current track, loop mode
//! - Background loop that pulls from the queue and waits for each track to end
//! - Tears itself down after the idle timeout
//!
//! ### [`queue`] - Track Queue
//! - FIFO of lazily resolved tracks, safe to mutate while the loop waits on it
//!
//! ### [`voice`] - Voice Backend
//! - Traits the session talks to, with songbird/serenity implementations
//!
//! ### [`registry`] - Session Registry
//! - Guild to session map; destroyed sessions detach themselves

pub mod error;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;
