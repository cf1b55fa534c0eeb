//! Core domain types and the attendance classifier
//!
//! Employee and attendance records as the repository round-trips them, plus
//! the pure status classification and working-hours derivation everything
//! else builds on.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default punch-in cutoff: strictly later than this is Late.
pub fn default_late_threshold() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).expect("valid constant time")
}

/// Opaque employee identifier: 24 lowercase hex characters.
///
/// Parsing is the only way to obtain one from user input, so a malformed
/// identifier can never reach a repository query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    /// Parse a 24-character hex identifier. Returns `None` on wrong length
    /// or charset; uppercase hex is accepted and normalized.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() != 24 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..24].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attendance status for one employee-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    WorkFromHome,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Late => "Late",
            Self::Absent => "Absent",
            Self::WorkFromHome => "WorkFromHome",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Present" => Some(Self::Present),
            "Late" => Some(Self::Late),
            "Absent" => Some(Self::Absent),
            "WorkFromHome" => Some(Self::WorkFromHome),
            _ => None,
        }
    }
}

/// Punch location. Carried through the repository, not used by core logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// An employee profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub name: String,
    /// Unique (case-insensitive) among non-deleted records.
    pub email: String,
    /// Department / designation label, exact-match semantics.
    pub department: Option<String>,
    pub role: String,
    pub is_work_from_home: bool,
    pub is_deleted: bool,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One employee-day attendance row. At most one exists per (employee, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub employee_id: EmployeeId,
    /// Day granularity; time-of-day lives in the punch fields.
    pub date: NaiveDate,
    /// Absent means not yet punched in that day.
    pub punch_in: Option<NaiveTime>,
    pub punch_out: Option<NaiveTime>,
    pub status: AttendanceStatus,
    /// Defined only once punch-out is recorded; never negative.
    pub working_hours: Option<f64>,
    pub punch_in_location: Option<GeoPoint>,
    pub punch_out_location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Classify a punch-in against the late threshold.
///
/// Work-from-home wins unconditionally; a missing punch-in is Absent;
/// strictly after the threshold is Late; at or before it is Present.
/// Pure and total.
pub fn classify(
    punch_in: Option<NaiveTime>,
    late_threshold: NaiveTime,
    work_from_home: bool,
) -> AttendanceStatus {
    if work_from_home {
        return AttendanceStatus::WorkFromHome;
    }
    match punch_in {
        None => AttendanceStatus::Absent,
        Some(t) if t > late_threshold => AttendanceStatus::Late,
        Some(_) => AttendanceStatus::Present,
    }
}

/// Derive working hours from the punch pair.
///
/// `None` until punch-out is recorded; clamped to zero if the pair is
/// inverted.
pub fn working_hours(punch_in: Option<NaiveTime>, punch_out: Option<NaiveTime>) -> Option<f64> {
    let (start, end) = (punch_in?, punch_out?);
    let seconds = end.signed_duration_since(start).num_seconds();
    Some((seconds as f64 / 3600.0).max(0.0))
}

/// Minutes past the threshold, zero when on time.
pub fn minutes_late(punch_in: NaiveTime, late_threshold: NaiveTime) -> i64 {
    punch_in
        .signed_duration_since(late_threshold)
        .num_minutes()
        .max(0)
}

/// Strict HH:MM parse for user-supplied punch times (00:00-23:59).
pub fn parse_punch_time(raw: &str) -> Option<NaiveTime> {
    let (h, m) = raw.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}
