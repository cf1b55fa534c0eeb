//! Repository boundary for the employee and attendance collections
//!
//! The catalog only ever talks to `Repository`; the SQLite implementation
//! lives in `sqlite`. Soft-deleted employees are filtered out of every read,
//! and mark-attendance is an atomic conditional insert so a read-check-write
//! race cannot create two rows for one day.

mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{AttendanceRecord, EmployeeId, EmployeeRecord};

pub use sqlite::SqliteRepository;

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Window of `days` calendar days ending at `end` (inclusive).
    pub fn last_days(end: NaiveDate, days: u32) -> Self {
        let days = days.max(1);
        Self {
            start: end - chrono::Duration::days(i64::from(days) - 1),
            end,
        }
    }

    /// Number of calendar days covered, inclusive.
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days().max(0) as u32 + 1
    }
}

/// Outcome of the conditional mark-attendance insert.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    Created(AttendanceRecord),
    /// A row already existed for that employee and date; it is returned
    /// unchanged.
    AlreadyMarked(AttendanceRecord),
}

/// Storage-boundary failures. Connectivity loss is the only transient kind;
/// callers report it once per turn and never see driver error text.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("storage unavailable")]
    Unavailable(#[from] sqlx::Error),
}

/// Abstract read/write access to the two collections.
///
/// Absence is a value (`None` / empty vec), never an error. Every read
/// excludes soft-deleted employees.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Case-insensitive exact email match.
    async fn find_employee_by_email(
        &self,
        email: &str,
    ) -> Result<Option<EmployeeRecord>, RepoError>;

    async fn find_employee_by_id(
        &self,
        id: &EmployeeId,
    ) -> Result<Option<EmployeeRecord>, RepoError>;

    /// Exact case-sensitive department label match, name ascending.
    async fn list_employees_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<EmployeeRecord>, RepoError>;

    /// Attendance rows for one employee, date descending.
    async fn list_attendance(
        &self,
        employee_id: &EmployeeId,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, RepoError>;

    /// Attendance joined on department membership, date descending then
    /// employee name ascending.
    async fn list_attendance_for_department(
        &self,
        department: &str,
        range: DateRange,
    ) -> Result<Vec<(EmployeeRecord, AttendanceRecord)>, RepoError>;

    /// Late rows in a window, optionally filtered by department, date
    /// descending then employee name ascending.
    async fn list_late_arrivals(
        &self,
        range: DateRange,
        department: Option<&str>,
    ) -> Result<Vec<(EmployeeRecord, AttendanceRecord)>, RepoError>;

    /// Insert the record unless one already exists for its (employee, date).
    /// The losing side of a concurrent race observes the existing row.
    async fn mark_attendance_once(
        &self,
        record: &AttendanceRecord,
    ) -> Result<MarkOutcome, RepoError>;

    async fn insert_employee(&self, employee: &EmployeeRecord) -> Result<(), RepoError>;
}
