use parking_lot::{RwLock, RwLockWriteGuard};
use std::{
    collections::{HashSet, VecDeque},
    time::Duration,
};
use tracing::debug;

use super::PlaylistEntry;
use crate::{catalog::SongId, error::CapacityExceeded};

/// Fixed-capacity FIFO of upcoming songs.
///
/// Readers always see whole operations: every mutation happens under the
/// write lock and [`snapshot`](Self::snapshot) copies under the read lock.
#[derive(Debug)]
pub struct PlaylistQueue {
    entries: RwLock<VecDeque<PlaylistEntry>>,
    capacity: usize,
}

impl PlaylistQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends at the tail, failing when the queue is already full.
    pub fn enqueue(&self, entry: PlaylistEntry) -> Result<(), CapacityExceeded> {
        self.write().enqueue(entry).map(|_| ())
    }

    /// Removes the head entry, renumbering the rest.
    pub fn dequeue(&self) -> Option<PlaylistEntry> {
        let mut entries = self.entries.write();
        let head = entries.pop_front()?;
        for entry in entries.iter_mut() {
            entry.position -= 1;
        }
        debug!("Dequeued {} ({} left)", head.song_id, entries.len());
        Some(head)
    }

    /// Point-in-time copy in playback order, positions 1..=N.
    pub fn snapshot(&self) -> Vec<PlaylistEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Exclusive access for check-then-push sequences.
    pub fn write(&self) -> QueueWriter<'_> {
        QueueWriter {
            entries: self.entries.write(),
            capacity: self.capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn contains(&self, song_id: SongId) -> bool {
        self.entries.read().iter().any(|e| e.song_id == song_id)
    }

    pub fn song_ids(&self) -> HashSet<SongId> {
        self.entries.read().iter().map(|e| e.song_id).collect()
    }

    /// Sum of the durations of every queued entry.
    pub fn total_duration(&self) -> Duration {
        self.entries.read().iter().map(|e| e.duration).sum()
    }
}

/// Write guard over a [`PlaylistQueue`].
pub struct QueueWriter<'a> {
    entries: RwLockWriteGuard<'a, VecDeque<PlaylistEntry>>,
    capacity: usize,
}

impl QueueWriter<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, song_id: SongId) -> bool {
        self.entries.iter().any(|e| e.song_id == song_id)
    }

    /// Appends at the tail and returns the entry's position.
    pub fn enqueue(&mut self, mut entry: PlaylistEntry) -> Result<usize, CapacityExceeded> {
        if self.is_full() {
            return Err(CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let position = self.entries.len() + 1;
        entry.position = position;
        debug!("Enqueued {} at position {}", entry.song_id, position);
        self.entries.push_back(entry);
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn entry(id: u64, requested: bool) -> PlaylistEntry {
        PlaylistEntry {
            song_id: SongId(id),
            title: format!("song {id}"),
            artist: "artist".into(),
            duration: Duration::from_secs(120),
            user_requested: requested,
            position: 0,
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn plays_in_enqueue_order() {
        let queue = PlaylistQueue::new(5);
        queue.enqueue(entry(3, false)).unwrap();
        queue.enqueue(entry(1, true)).unwrap();
        queue.enqueue(entry(2, false)).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue()).map(|e| e.song_id.0).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn rejects_past_capacity_without_touching_entries() {
        let queue = PlaylistQueue::new(2);
        queue.enqueue(entry(1, false)).unwrap();
        queue.enqueue(entry(2, false)).unwrap();
        let before = queue.snapshot();

        assert_eq!(queue.enqueue(entry(3, true)), Err(CapacityExceeded { capacity: 2 }));
        assert_eq!(queue.snapshot(), before);
        assert!(queue.is_full());
    }

    #[test]
    fn positions_follow_playback_order() {
        let queue = PlaylistQueue::new(4);
        for id in 10..14 {
            queue.enqueue(entry(id, false)).unwrap();
        }
        let positions: Vec<_> = queue.snapshot().iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);

        let head = queue.dequeue().unwrap();
        assert_eq!(head.position, 1);
        let after: Vec<_> = queue.snapshot().iter().map(|e| (e.song_id.0, e.position)).collect();
        assert_eq!(after, vec![(11, 1), (12, 2), (13, 3)]);

        queue.enqueue(entry(20, true)).unwrap();
        assert_eq!(queue.snapshot().last().unwrap().position, 4);
    }

    #[test]
    fn writer_checks_and_pushes_under_one_lock() {
        let queue = PlaylistQueue::new(3);
        {
            let mut writer = queue.write();
            assert!(writer.is_empty());
            assert_eq!(writer.enqueue(entry(1, false)), Ok(1));
            assert!(writer.contains(SongId(1)));
            assert!(!writer.contains(SongId(2)));
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.song_ids(), HashSet::from([SongId(1)]));
        assert_eq!(queue.total_duration(), Duration::from_secs(120));
    }

    #[test]
    fn zero_capacity_queue_accepts_nothing() {
        let queue = PlaylistQueue::new(0);
        assert!(queue.is_full());
        assert!(queue.enqueue(entry(1, false)).is_err());
    }
}
