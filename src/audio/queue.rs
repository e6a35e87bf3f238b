use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};
use tracing::debug;

use super::{error::PlayerError, track::TrackRef};

/// FIFO queue of tracks shared between the playback loop and commands.
///
/// The lock is only held for the duration of each operation, never across an
/// `.await`, so commands can mutate the queue while the loop waits in
/// [`TrackQueue::pop`].
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<TrackRef>>,
    available: Notify,
    /// Set once by [`TrackQueue::close`]; only changed under the `items` lock.
    closed: AtomicBool,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track and wakes a pending [`TrackQueue::pop`].
    pub fn push(&self, track: TrackRef) {
        debug!("➕ Queued: {}", track.name());
        self.items.lock().push_back(track);
        self.available.notify_one();
    }

    /// Appends as many of `tracks` as fit under `cap`, in order, as one step.
    /// Returns how many were accepted; a closed queue accepts none.
    pub fn extend_bounded(&self, tracks: Vec<TrackRef>, cap: usize) -> Result<usize, PlayerError> {
        let accepted = {
            let mut items = self.items.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(PlayerError::NotConnected);
            }
            let room = cap.saturating_sub(items.len());
            let before = items.len();
            items.extend(tracks.into_iter().take(room));
            items.len() - before
        };

        if accepted > 0 {
            debug!("➕ Queued {} tracks", accepted);
            self.available.notify_one();
        }
        Ok(accepted)
    }

    /// Drops every queued track and refuses further bounded pushes.
    pub fn close(&self) {
        let mut items = self.items.lock();
        self.closed.store(true, Ordering::Release);
        items.clear();
    }

    /// Closes the queue only if nothing is waiting in it. Lets an idle
    /// consumer give up without losing a track pushed after its timeout.
    pub fn close_if_empty(&self) -> bool {
        let items = self.items.lock();
        if !items.is_empty() {
            return false;
        }
        self.closed.store(true, Ordering::Release);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Removes the head of the queue, waiting up to `timeout` for one to be
    /// pushed. Fails with [`PlayerError::QueueTimeout`] if none arrives.
    ///
    /// Dropping the returned future cancels the wait without losing items.
    pub async fn pop(&self, timeout: Duration) -> Result<TrackRef, PlayerError> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            let head = self.items.lock().pop_front();
            if let Some(track) = head {
                return Ok(track);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(PlayerError::QueueTimeout);
            }
        }
    }

    /// Non-blocking variant of [`TrackQueue::pop`].
    pub fn try_pop(&self) -> Option<TrackRef> {
        self.items.lock().pop_front()
    }

    /// Randomly permutes the queued tracks in place.
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        items.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    /// Removes the track at a 0-based position.
    pub fn remove_at(&self, index: usize) -> Result<TrackRef, PlayerError> {
        let mut items = self.items.lock();
        let len = items.len();
        items
            .remove(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })
    }

    /// Snapshot of `start..end`, clamped to the queue length.
    pub fn slice(&self, start: usize, end: usize) -> Vec<TrackRef> {
        let items = self.items.lock();
        let end = end.min(items.len());
        if start >= end {
            return Vec::new();
        }
        items.range(start..end).cloned().collect()
    }

    /// Drops every queued track. A pending pop keeps waiting.
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Sum of the known lengths of queued tracks.
    pub fn total_length(&self) -> Duration {
        self.items
            .lock()
            .iter()
            .filter_map(|track| track.length())
            .sum()
    }
}
