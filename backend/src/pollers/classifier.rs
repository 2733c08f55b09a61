//! Occupancy classification of a room's free/busy intervals.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use conffree_shared::{Interval, IntervalType, Room, RoomStatus};

use super::time::start_of_next_day;

/// Result of classifying one room's intervals at a fixed instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Intervals overlapping the rest of today, ordered by start
    pub freebusy: Vec<Interval>,
    /// First interval containing `now`
    pub current: Option<Interval>,
    /// First interval not containing `now`
    pub next: Option<Interval>,
    pub status: RoomStatus,
}

impl Classification {
    /// Build the room snapshot this classification describes.
    pub fn into_room(self, email: &str, label: &str) -> Room {
        Room {
            email: email.to_string(),
            label: label.to_string(),
            freebusy: self.freebusy,
            current: self.current,
            next: self.next,
            status: self.status,
        }
    }
}

/// Classify `entries` as seen at `now`.
///
/// An entry is kept when `[start, end]` overlaps `[now, start of tomorrow)`,
/// with "tomorrow" taken in `now`'s zone. Containment of `now` is inclusive
/// at both ends. Equal start times keep feed order.
///
/// The room is busy when any entry containing `now` is not tagged `FREE`,
/// so an `UNKNOWN` block over `now` counts as busy. Every room is therefore
/// either free or busy.
pub fn classify(now: DateTime<Tz>, entries: Vec<Interval>) -> Classification {
    let instant = now.with_timezone(&Utc);
    let day_end = start_of_next_day(now);

    let mut freebusy: Vec<Interval> = entries
        .into_iter()
        .filter(|entry| entry.start < day_end && entry.end >= instant)
        .collect();
    freebusy.sort_by_key(|entry| entry.start);

    let current = freebusy.iter().find(|entry| entry.contains(instant)).cloned();
    let next = freebusy.iter().find(|entry| !entry.contains(instant)).cloned();

    let occupied = freebusy
        .iter()
        .any(|entry| entry.contains(instant) && entry.kind != IntervalType::Free);
    let status = if occupied {
        RoomStatus::Busy
    } else {
        RoomStatus::Free
    };

    Classification {
        freebusy,
        current,
        next,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe;

    fn now() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2024, 3, 12, 12, 0, 0).unwrap()
    }

    fn at(offset_minutes: i64) -> DateTime<Utc> {
        now().with_timezone(&Utc) + Duration::minutes(offset_minutes)
    }

    fn busy(from: i64, to: i64) -> Interval {
        Interval::new(at(from), at(to), IntervalType::Busy)
    }

    fn free(from: i64, to: i64) -> Interval {
        Interval::new(at(from), at(to), IntervalType::Free)
    }

    #[test]
    fn test_no_entries_is_free_and_empty() {
        let result = classify(now(), vec![]);
        assert!(result.freebusy.is_empty());
        assert_eq!(result.current, None);
        assert_eq!(result.next, None);
        assert_eq!(result.status, RoomStatus::Free);
    }

    #[test]
    fn test_entries_outside_today_are_dropped() {
        // ended this morning, tomorrow, and yesterday
        let result = classify(
            now(),
            vec![busy(-180, -60), busy(13 * 60, 14 * 60), busy(-26 * 60, -25 * 60)],
        );
        assert!(result.freebusy.is_empty());
        assert_eq!(result.current, None);
        assert_eq!(result.next, None);
        assert_eq!(result.status, RoomStatus::Free);
    }

    #[test]
    fn test_entry_running_through_now_is_kept() {
        let result = classify(now(), vec![busy(-60, 60)]);
        assert_eq!(result.freebusy, vec![busy(-60, 60)]);
        assert_eq!(result.current, Some(busy(-60, 60)));
        assert_eq!(result.next, None);
    }

    #[test]
    fn test_entry_crossing_midnight_is_kept() {
        // 23:00 today to 01:00 tomorrow
        let result = classify(now(), vec![busy(11 * 60, 13 * 60)]);
        assert_eq!(result.freebusy.len(), 1);
    }

    #[test]
    fn test_entry_starting_at_midnight_is_dropped() {
        let result = classify(now(), vec![busy(12 * 60, 13 * 60)]);
        assert!(result.freebusy.is_empty());
    }

    #[test]
    fn test_sorted_by_start() {
        let result = classify(now(), vec![busy(240, 300), free(60, 90), busy(-30, 30)]);
        let starts: Vec<_> = result.freebusy.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![at(-30), at(60), at(240)]);
    }

    #[test]
    fn test_future_entry_is_next_not_current() {
        let result = classify(now(), vec![busy(120, 180)]);
        assert_eq!(result.current, None);
        assert_eq!(result.next, Some(busy(120, 180)));
    }

    #[test]
    fn test_busy_now_then_free_later() {
        let result = classify(now(), vec![free(30, 90), busy(-30, 30)]);
        assert_eq!(result.current, Some(busy(-30, 30)));
        assert_eq!(result.next, Some(free(30, 90)));
        assert_eq!(result.status, RoomStatus::Busy);
    }

    #[test]
    fn test_busy_later_only_is_free() {
        let result = classify(now(), vec![busy(180, 240)]);
        assert_eq!(result.current, None);
        assert_eq!(result.next, Some(busy(180, 240)));
        assert_eq!(result.status, RoomStatus::Free);
    }

    #[test]
    fn test_free_block_covering_now_is_not_occupied() {
        let result = classify(now(), vec![free(-60, 60)]);
        assert_eq!(result.current, Some(free(-60, 60)));
        assert_eq!(result.status, RoomStatus::Free);
    }

    #[test]
    fn test_unknown_block_covering_now_is_occupied() {
        let entry = Interval::new(at(-15), at(15), IntervalType::Unknown);
        let result = classify(now(), vec![entry]);
        assert_eq!(result.status, RoomStatus::Busy);
    }

    #[test]
    fn test_busy_overlapping_free_current_still_busy() {
        // the free block starts first and wins `current`, the busy one still occupies
        let result = classify(now(), vec![free(-60, 60), busy(-30, 30)]);
        assert_eq!(result.current, Some(free(-60, 60)));
        assert_eq!(result.next, None);
        assert_eq!(result.status, RoomStatus::Busy);
    }

    #[test]
    fn test_first_containing_entry_wins_current() {
        let result = classify(now(), vec![busy(-10, 10), busy(-20, 20)]);
        assert_eq!(result.current, Some(busy(-20, 20)));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let ends_now = classify(now(), vec![busy(-60, 0)]);
        assert_eq!(ends_now.current, Some(busy(-60, 0)));
        assert_eq!(ends_now.status, RoomStatus::Busy);

        let starts_now = classify(now(), vec![busy(0, 60)]);
        assert_eq!(starts_now.current, Some(busy(0, 60)));
        assert_eq!(starts_now.next, None);
    }

    #[test]
    fn test_current_and_next_are_members() {
        let entries = vec![busy(-30, 30), free(30, 90), busy(120, 150), busy(-300, -200)];
        let result = classify(now(), entries);
        let instant = now().with_timezone(&Utc);

        let current = result.current.clone().unwrap();
        assert!(result.freebusy.contains(&current));
        assert!(current.contains(instant));

        let next = result.next.clone().unwrap();
        assert!(result.freebusy.contains(&next));
        assert!(!next.contains(instant));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let entries = vec![busy(90, 120), free(-30, 30), busy(-5, 5)];
        assert_eq!(classify(now(), entries.clone()), classify(now(), entries));
    }

    #[test]
    fn test_day_boundary_uses_local_zone() {
        // 22:30 in Berlin is 21:30 UTC; an entry at 23:30 UTC is already tomorrow there
        let now = Utc
            .with_ymd_and_hms(2024, 3, 12, 21, 30, 0)
            .unwrap()
            .with_timezone(&Europe::Berlin);
        let late = Interval::new(
            Utc.with_ymd_and_hms(2024, 3, 12, 23, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 13, 0, 30, 0).unwrap(),
            IntervalType::Busy,
        );
        let result = classify(now, vec![late]);
        assert!(result.freebusy.is_empty());
    }

    #[test]
    fn test_into_room_carries_identity() {
        let room = classify(now(), vec![busy(-30, 30)]).into_room("blue@example.com", "Blue");
        assert_eq!(room.email, "blue@example.com");
        assert_eq!(room.label, "Blue");
        assert!(room.is_busy());
    }
}
