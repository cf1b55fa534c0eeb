//! Operation names, outputs and the failure taxonomy

use chrono::NaiveDate;

use crate::domain::{AttendanceRecord, EmployeeRecord};
use crate::report::{AttendanceSummary, DepartmentReport, LateArrivalsReport};
use crate::store::RepoError;

/// The fixed operation catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpName {
    SearchByEmail,
    SearchById,
    ListDepartment,
    AttendanceSummary,
    MarkAttendance,
    DepartmentReport,
    LateArrivals,
}

impl OpName {
    pub const ALL: [OpName; 7] = [
        OpName::SearchByEmail,
        OpName::SearchById,
        OpName::ListDepartment,
        OpName::AttendanceSummary,
        OpName::MarkAttendance,
        OpName::DepartmentReport,
        OpName::LateArrivals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchByEmail => "search_by_email",
            Self::SearchById => "search_by_id",
            Self::ListDepartment => "list_department",
            Self::AttendanceSummary => "attendance_summary",
            Self::MarkAttendance => "mark_attendance",
            Self::DepartmentReport => "department_report",
            Self::LateArrivals => "late_arrivals",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == raw)
    }

    /// The one mutating operation; the orchestrator allows at most one
    /// instance per turn.
    pub fn is_marking(&self) -> bool {
        matches!(self, Self::MarkAttendance)
    }
}

impl std::fmt::Display for OpName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful mark-attendance.
#[derive(Debug, Clone)]
pub struct MarkedAttendance {
    pub employee_name: String,
    pub record: AttendanceRecord,
    /// Minutes past the late threshold; zero when on time.
    pub minutes_late: i64,
}

/// Operation-specific success payloads.
#[derive(Debug, Clone)]
pub enum OpOutput {
    Profile(EmployeeRecord),
    Roster {
        department: String,
        employees: Vec<EmployeeRecord>,
    },
    Summary(AttendanceSummary),
    Marked(MarkedAttendance),
    Department(DepartmentReport),
    LateArrivals(LateArrivalsReport),
}

/// Failure taxonomy shared by catalog and orchestrator.
///
/// Validation kinds are produced before any repository call. NotFound and
/// AlreadyMarked are ordinary outcomes, not exceptional control flow.
/// User-facing text lives in `render::failure_message`; these messages are
/// for logs.
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("no match for {what}")]
    NotFound { what: String },

    #[error("malformed employee identifier: {given}")]
    InvalidIdentifier { given: String },

    #[error("invalid punch time: {given}")]
    InvalidTimeFormat { given: String },

    #[error("attendance already marked for {name} on {date}")]
    AlreadyMarked { name: String, date: NaiveDate },

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("operation budget exceeded")]
    BudgetExceeded,

    #[error("repository unavailable")]
    RepositoryUnavailable(#[from] RepoError),
}

/// Uniform catalog return shape: a value, never a panic or a raw error
/// escaping across the orchestrator boundary.
pub type OperationResult = Result<OpOutput, OpError>;
