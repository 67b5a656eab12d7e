//! Property-based tests for the playlist queue and cooldown tracker.

use chrono::{DateTime, TimeZone, Utc};
use fureon::{CooldownTracker, PlaylistEntry, PlaylistQueue, SongId};
use proptest::prelude::*;
use std::time::Duration;

// ===== Helpers =====

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn entry(id: u64) -> PlaylistEntry {
    PlaylistEntry {
        song_id: SongId(id),
        title: format!("song {id}"),
        artist: "artist".into(),
        duration: Duration::from_secs(180),
        user_requested: id % 2 == 0,
        position: 0,
        enqueued_at: t0(),
    }
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u64),
    Dequeue,
}

fn arbitrary_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![3 => (0u64..1000).prop_map(Op::Enqueue), 1 => Just(Op::Dequeue)],
        0..200,
    )
}

// ===== Property Tests =====

proptest! {
    #[test]
    fn queue_never_exceeds_capacity(capacity in 0usize..30, ops in arbitrary_ops()) {
        let queue = PlaylistQueue::new(capacity);
        for op in ops {
            match op {
                Op::Enqueue(id) => {
                    let was_full = queue.is_full();
                    let result = queue.enqueue(entry(id));
                    prop_assert_eq!(result.is_err(), was_full);
                }
                Op::Dequeue => {
                    queue.dequeue();
                }
            }
            prop_assert!(queue.len() <= capacity);
        }
    }

    #[test]
    fn admitted_entries_leave_once_in_order(capacity in 1usize..30, ops in arbitrary_ops()) {
        let queue = PlaylistQueue::new(capacity);
        let mut admitted = Vec::new();
        let mut played = Vec::new();
        // Sequence numbers keep duplicates of one song id distinguishable.
        let mut seq = 0u64;

        for op in ops {
            match op {
                Op::Enqueue(_) => {
                    if queue.enqueue(entry(seq)).is_ok() {
                        admitted.push(seq);
                    }
                    seq += 1;
                }
                Op::Dequeue => {
                    if let Some(e) = queue.dequeue() {
                        played.push(e.song_id.0);
                    }
                }
            }
            let positions: Vec<_> = queue.snapshot().iter().map(|e| e.position).collect();
            prop_assert_eq!(positions, (1..=queue.len()).collect::<Vec<_>>());
        }
        while let Some(e) = queue.dequeue() {
            played.push(e.song_id.0);
        }

        prop_assert_eq!(played, admitted);
    }

    #[test]
    fn rerequest_inside_window_is_refused(window_mins in 1i64..240, offset_secs in 0i64..14_400) {
        let window = Duration::from_secs(window_mins as u64 * 60);
        let tracker = CooldownTracker::new(window);
        prop_assert!(tracker.try_claim(SongId(1), t0()).is_ok());

        let later = t0() + chrono::Duration::seconds(offset_secs);
        let inside = offset_secs < window_mins * 60;
        prop_assert_eq!(tracker.try_claim(SongId(1), later).is_err(), inside);
    }

    #[test]
    fn stamps_are_monotonic(offsets in prop::collection::vec(0i64..100_000, 1..50)) {
        let tracker = CooldownTracker::new(Duration::from_secs(3600));
        let mut latest = None;
        for offset in offsets {
            let at = t0() + chrono::Duration::seconds(offset);
            tracker.record_play_or_request(SongId(5), at);
            latest = latest.max(Some(at));
            prop_assert_eq!(tracker.last_stamp(&SongId(5)), latest);
        }
    }
}
