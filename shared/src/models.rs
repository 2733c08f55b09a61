use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free/busy classification of a calendar block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalType {
    Busy,
    Free,
    Unknown,
}

impl IntervalType {
    /// Map an iCalendar `FBTYPE` parameter value onto a tag.
    ///
    /// The tentative and unavailable flavours of busy collapse into `Busy`;
    /// anything unrecognised (including `X-` extensions) becomes `Unknown`.
    pub fn from_fbtype(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUSY" | "BUSY-UNAVAILABLE" | "BUSY-TENTATIVE" => IntervalType::Busy,
            "FREE" => IntervalType::Free,
            _ => IntervalType::Unknown,
        }
    }
}

/// A single free/busy block taken from a room's feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: IntervalType,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, kind: IntervalType) -> Self {
        Self { start, end, kind }
    }

    /// Whether `instant` falls inside the block, both endpoints inclusive.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Occupancy of a room as of its last successful poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Free,
    Busy,
}

/// Snapshot of a room's state.
///
/// A new value is built on every poll and swapped in whole; readers never
/// see a mix of two polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub email: String,
    pub label: String,
    pub freebusy: Vec<Interval>,
    pub current: Option<Interval>,
    pub next: Option<Interval>,
    pub status: RoomStatus,
}

impl Room {
    /// State of a room that has not been polled successfully yet.
    pub fn unpolled(email: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            label: label.into(),
            freebusy: Vec::new(),
            current: None,
            next: None,
            status: RoomStatus::Free,
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == RoomStatus::Free
    }

    pub fn is_busy(&self) -> bool {
        self.status == RoomStatus::Busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_fbtype_mapping() {
        assert_eq!(IntervalType::from_fbtype("BUSY"), IntervalType::Busy);
        assert_eq!(IntervalType::from_fbtype("busy-tentative"), IntervalType::Busy);
        assert_eq!(IntervalType::from_fbtype("BUSY-UNAVAILABLE"), IntervalType::Busy);
        assert_eq!(IntervalType::from_fbtype("FREE"), IntervalType::Free);
        assert_eq!(IntervalType::from_fbtype("X-OUT-OF-OFFICE"), IntervalType::Unknown);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let interval = Interval::new(at(9, 0), at(10, 0), IntervalType::Busy);
        assert!(interval.contains(at(9, 0)));
        assert!(interval.contains(at(9, 30)));
        assert!(interval.contains(at(10, 0)));
        assert!(!interval.contains(at(8, 59)));
        assert!(!interval.contains(at(10, 1)));
    }

    #[test]
    fn test_room_serialization_shape() {
        let mut room = Room::unpolled("board@example.com", "Board Room");
        room.current = Some(Interval::new(at(9, 0), at(10, 0), IntervalType::Busy));
        room.freebusy = vec![room.current.clone().unwrap()];
        room.status = RoomStatus::Busy;

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["email"], "board@example.com");
        assert_eq!(json["label"], "Board Room");
        assert_eq!(json["status"], "busy");
        assert_eq!(json["current"]["type"], "BUSY");
        assert_eq!(json["current"]["start"], "2024-03-12T09:00:00Z");
        assert!(json["next"].is_null());
        assert_eq!(json["freebusy"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unpolled_room_is_free() {
        let room = Room::unpolled("a@example.com", "A");
        assert!(room.is_free());
        assert!(!room.is_busy());
        assert!(room.freebusy.is_empty());
        assert!(room.current.is_none() && room.next.is_none());
    }
}
