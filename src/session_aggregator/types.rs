//! Session aggregator types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one tracking entry: (user_id, session_id)
///
/// Exact, case-sensitive match. No normalization is applied to either part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceKey {
    pub user_id: String,
    pub session_id: String,
}

impl AttendanceKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for AttendanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.user_id, self.session_id)
    }
}

/// Live frame counters for one key
///
/// Invariant: `attentive_frames <= total_frames`. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceCounter {
    pub total_frames: u64,
    pub attentive_frames: u64,
}

impl AttendanceCounter {
    /// Count one frame
    pub fn record(&mut self, attentive: bool) {
        self.total_frames += 1;
        if attentive {
            self.attentive_frames += 1;
        }
    }

    pub fn attendance_percent(&self) -> f64 {
        attendance_percent(self.attentive_frames, self.total_frames)
    }
}

/// `100 * attentive / total` rounded to 2 decimals, 0.0 when nothing was counted
pub fn attendance_percent(attentive_frames: u64, total_frames: u64) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    let percent = attentive_frames as f64 / total_frames as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Attendance statistics for one (user, session)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub user_id: String,
    pub session_id: String,
    pub total_frames: u64,
    pub attentive_frames: u64,
    pub attendance_percent: f64,
}

impl AttendanceStats {
    /// Zero-valued stats for a key with no recorded frames
    pub fn empty(key: &AttendanceKey) -> Self {
        Self::from_counter(key, &AttendanceCounter::default())
    }

    pub fn from_counter(key: &AttendanceKey, counter: &AttendanceCounter) -> Self {
        Self {
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            total_frames: counter.total_frames,
            attentive_frames: counter.attentive_frames,
            attendance_percent: counter.attendance_percent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounding() {
        assert_eq!(attendance_percent(2, 3), 66.67);
        assert_eq!(attendance_percent(1, 3), 33.33);
        assert_eq!(attendance_percent(1, 8), 12.5);
        assert_eq!(attendance_percent(5, 5), 100.0);
    }

    #[test]
    fn test_percent_zero_total() {
        assert_eq!(attendance_percent(0, 0), 0.0);
    }

    #[test]
    fn test_counter_record() {
        let mut counter = AttendanceCounter::default();
        counter.record(true);
        counter.record(false);
        counter.record(true);
        assert_eq!(counter.total_frames, 3);
        assert_eq!(counter.attentive_frames, 2);
        assert_eq!(counter.attendance_percent(), 66.67);
    }

    #[test]
    fn test_key_is_case_sensitive() {
        assert_ne!(AttendanceKey::new("Alice", "s1"), AttendanceKey::new("alice", "s1"));
        assert_eq!(AttendanceKey::new("alice", "s1").to_string(), "alice::s1");
    }

    #[test]
    fn test_empty_stats_serialization() {
        let stats = AttendanceStats::empty(&AttendanceKey::new("alice", "s1"));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["total_frames"], 0);
        assert_eq!(json["attentive_frames"], 0);
        assert_eq!(json["attendance_percent"], 0.0);
    }
}
