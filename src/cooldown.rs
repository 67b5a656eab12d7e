//! Request cooldowns.
//!
//! A [`CooldownTracker`] remembers when each key was last played or requested
//! and answers whether it may be requested again. Records only ever move
//! forward in time; a stamp older than the stored one is ignored.
//!
//! The tracker is generic over its key: the controller keeps one keyed by
//! [`SongId`] for song cooldowns and one keyed by requester for the optional
//! per-listener throttle.

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::{collections::HashSet, hash::Hash, time::Duration};

use crate::catalog::SongId;

#[derive(Debug)]
pub struct CooldownTracker<K = SongId>
where
    K: Eq + Hash,
{
    window: Duration,
    records: DashMap<K, DateTime<Utc>>,
}

impl<K> CooldownTracker<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when `key` was never stamped or its window has elapsed at `now`.
    pub fn is_eligible(&self, key: &K, now: DateTime<Utc>) -> bool {
        self.remaining(key, now).is_none()
    }

    /// Time left before `key` becomes eligible, `None` if it already is.
    pub fn remaining(&self, key: &K, now: DateTime<Utc>) -> Option<Duration> {
        let stamp = *self.records.get(key)?;
        remaining_after(stamp, now, self.window)
    }

    /// Moves the record for `key` forward to `now`.
    pub fn record_play_or_request(&self, key: K, now: DateTime<Utc>) {
        self.records
            .entry(key)
            .and_modify(|stamp| {
                if now > *stamp {
                    *stamp = now;
                }
            })
            .or_insert(now);
    }

    /// Checks eligibility and stamps `now` in one step.
    ///
    /// Holds the key's shard for the duration, so two callers racing on the
    /// same key cannot both succeed. On refusal returns the remaining wait.
    pub fn try_claim(&self, key: K, now: DateTime<Utc>) -> Result<(), Duration> {
        match self.records.entry(key) {
            Entry::Occupied(mut record) => {
                if let Some(wait) = remaining_after(*record.get(), now, self.window) {
                    return Err(wait);
                }
                if now > *record.get() {
                    record.insert(now);
                }
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                Ok(())
            }
        }
    }

    pub fn last_stamp(&self, key: &K) -> Option<DateTime<Utc>> {
        self.records.get(key).map(|stamp| *stamp)
    }

    /// Up to `limit` records outside `exclude`, least recently stamped first.
    pub fn least_recent(&self, exclude: &HashSet<K>, limit: usize) -> Vec<(K, DateTime<Utc>)> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|record| !exclude.contains(record.key()))
            .map(|record| (record.key().clone(), *record.value()))
            .collect();
        records.sort_by_key(|(_, stamp)| *stamp);
        records.truncate(limit);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn remaining_after(stamp: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> Option<Duration> {
    // A stamp in the future counts as zero elapsed time.
    let elapsed = now.signed_duration_since(stamp).to_std().unwrap_or_default();
    window.checked_sub(elapsed).filter(|left| !left.is_zero())
}
