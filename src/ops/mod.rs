//! Operation catalog and executor
//!
//! A fixed set of named operations over the repository, each with a typed
//! argument contract. Arguments are validated here, before any repository
//! call; a missing required argument surfaces as `MissingArgument` and the
//! orchestrator turns it into a clarification prompt.

mod attendance;
mod definitions;
mod employee;
mod types;

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime};
use serde_json::Value;
use tracing::debug;

use crate::domain::{self, EmployeeId};
use crate::store::Repository;

pub use definitions::{OpDefinition, catalog};
pub use types::{MarkedAttendance, OpError, OpName, OpOutput, OperationResult};

/// Source of "today" and "now". Injectable so tests pin the calendar.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn time_now(&self) -> NaiveTime;
}

/// Wall clock in local time, matching how punch times are experienced.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn time_now(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Pinned clock for tests and replays.
pub struct FixedClock {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }

    fn time_now(&self) -> NaiveTime {
        self.time
    }
}

/// Executes catalog operations against the repository.
///
/// Clone is cheap - shared state sits behind Arcs.
#[derive(Clone)]
pub struct OpsExecutor {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) late_threshold: NaiveTime,
    pub(crate) clock: Arc<dyn Clock>,
}

impl OpsExecutor {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            late_threshold: domain::default_late_threshold(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Configure the punch-in cutoff.
    pub fn with_late_threshold(mut self, threshold: NaiveTime) -> Self {
        self.late_threshold = threshold;
        self
    }

    /// Configure the clock (tests pin it).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Execute one operation by name with a JSON argument envelope.
    ///
    /// Always returns a value; failures are payloads, never panics.
    pub async fn execute(&self, op: OpName, args: &Value) -> OperationResult {
        debug!(op = %op, "executing operation");
        match op {
            OpName::SearchByEmail => employee::search_by_email(self, args).await,
            OpName::SearchById => employee::search_by_id(self, args).await,
            OpName::ListDepartment => employee::list_department(self, args).await,
            OpName::AttendanceSummary => attendance::attendance_summary(self, args).await,
            OpName::MarkAttendance => attendance::mark_attendance(self, args).await,
            OpName::DepartmentReport => attendance::department_report(self, args).await,
            OpName::LateArrivals => attendance::late_arrivals(self, args).await,
        }
    }
}

// Argument extraction. Empty strings count as missing so a selector that
// fills "" still triggers a clarification instead of a bogus query.

fn required_str<'a>(args: &'a Value, field: &'static str) -> Result<&'a str, OpError> {
    match args.get(field).and_then(Value::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(OpError::MissingArgument(field)),
    }
}

fn optional_str<'a>(args: &'a Value, field: &'static str) -> Option<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required_employee_id(args: &Value) -> Result<EmployeeId, OpError> {
    let raw = required_str(args, "employee_id")?;
    EmployeeId::parse(raw).ok_or_else(|| OpError::InvalidIdentifier {
        given: raw.to_string(),
    })
}

/// Window length with a per-operation default. Selectors sometimes send
/// numbers as strings; both are accepted. Anything present but unusable
/// (including zero) re-prompts.
fn window_days(args: &Value, default: u32) -> Result<u32, OpError> {
    let value = match args.get("window_days") {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value,
    };
    let days = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if s.trim().is_empty() => return Ok(default),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match days {
        Some(days) if days >= 1 => Ok(days.min(u64::from(u32::MAX)) as u32),
        _ => Err(OpError::MissingArgument("window_days")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttendanceStatus, EmployeeRecord};
    use crate::store::SqliteRepository;
    use chrono::Utc;
    use serde_json::json;

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(8, 45, 0).unwrap(),
        })
    }

    async fn executor_with(employees: &[EmployeeRecord]) -> OpsExecutor {
        let repo = SqliteRepository::in_memory().await.unwrap();
        for employee in employees {
            repo.insert_employee(employee).await.unwrap();
        }
        OpsExecutor::new(Arc::new(repo)).with_clock(fixed_clock())
    }

    fn jane() -> EmployeeRecord {
        let now = Utc::now();
        EmployeeRecord {
            id: EmployeeId::parse("507f1f77bcf86cd799439011").unwrap(),
            name: "Jane Doe".into(),
            email: "jane@corp.test".into(),
            department: Some("Engineering".into()),
            role: "employee".into(),
            is_work_from_home: false,
            is_deleted: false,
            is_disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn missing_email_is_a_clarification_not_a_query() {
        let ops = executor_with(&[]).await;
        for args in [json!({}), json!({"email": ""}), json!({"email": "not-an-email"})] {
            let result = ops.execute(OpName::SearchByEmail, &args).await;
            assert!(matches!(result, Err(OpError::MissingArgument("email"))));
        }
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_before_lookup() {
        let ops = executor_with(&[jane()]).await;
        let result = ops
            .execute(OpName::SearchById, &json!({"employee_id": "not-24-chars"}))
            .await;
        assert!(matches!(result, Err(OpError::InvalidIdentifier { .. })));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let ops = executor_with(&[jane()]).await;
        let result = ops
            .execute(
                OpName::SearchById,
                &json!({"employee_id": "aaaaaaaaaaaaaaaaaaaaaaaa"}),
            )
            .await;
        assert!(matches!(result, Err(OpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn mark_attendance_classifies_and_reports_duplicates() {
        let ops = executor_with(&[jane()]).await;
        let id = jane().id;

        // 08:15 with a 09:30 cutoff is Present.
        let first = ops
            .execute(
                OpName::MarkAttendance,
                &json!({"employee_id": id.as_str(), "punch_in": "08:15"}),
            )
            .await
            .unwrap();
        match first {
            OpOutput::Marked(marked) => {
                assert_eq!(marked.record.status, AttendanceStatus::Present);
                assert_eq!(marked.minutes_late, 0);
            }
            other => panic!("unexpected output: {other:?}"),
        }

        // Same day again: AlreadyMarked, original row untouched.
        let second = ops
            .execute(
                OpName::MarkAttendance,
                &json!({"employee_id": id.as_str(), "punch_in": "10:00"}),
            )
            .await;
        assert!(matches!(second, Err(OpError::AlreadyMarked { .. })));

        let summary = ops
            .execute(OpName::AttendanceSummary, &json!({"employee_id": id.as_str()}))
            .await
            .unwrap();
        match summary {
            OpOutput::Summary(s) => {
                assert_eq!(s.present_days, 1);
                assert_eq!(s.late_days, 0);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_punch_time_never_reaches_the_repository() {
        let ops = executor_with(&[jane()]).await;
        let result = ops
            .execute(
                OpName::MarkAttendance,
                &json!({"employee_id": jane().id.as_str(), "punch_in": "25:99"}),
            )
            .await;
        assert!(matches!(result, Err(OpError::InvalidTimeFormat { .. })));
    }

    #[tokio::test]
    async fn mark_without_override_uses_the_clock() {
        let ops = executor_with(&[jane()]).await;
        let result = ops
            .execute(
                OpName::MarkAttendance,
                &json!({"employee_id": jane().id.as_str()}),
            )
            .await
            .unwrap();
        match result {
            OpOutput::Marked(marked) => {
                assert_eq!(
                    marked.record.punch_in,
                    NaiveTime::from_hms_opt(8, 45, 0)
                );
                assert_eq!(marked.record.status, AttendanceStatus::Present);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wfh_flag_wins_over_punch_time() {
        let mut emp = jane();
        emp.is_work_from_home = true;
        let ops = executor_with(&[emp.clone()]).await;
        let result = ops
            .execute(
                OpName::MarkAttendance,
                &json!({"employee_id": emp.id.as_str(), "punch_in": "11:00"}),
            )
            .await
            .unwrap();
        match result {
            OpOutput::Marked(marked) => {
                assert_eq!(marked.record.status, AttendanceStatus::WorkFromHome);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_department_report_is_not_found() {
        let ops = executor_with(&[]).await;
        let result = ops
            .execute(
                OpName::DepartmentReport,
                &json!({"department": "Engineering"}),
            )
            .await;
        assert!(matches!(result, Err(OpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn late_arrivals_with_no_rows_is_an_empty_success() {
        let ops = executor_with(&[]).await;
        let result = ops.execute(OpName::LateArrivals, &json!({})).await.unwrap();
        match result {
            OpOutput::LateArrivals(report) => {
                assert!(report.arrivals.is_empty());
                assert_eq!(report.window_days, 7);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn window_days_accepts_strings_and_rejects_zero() {
        assert_eq!(window_days(&json!({}), 30).unwrap(), 30);
        assert_eq!(window_days(&json!({"window_days": 60}), 30).unwrap(), 60);
        assert_eq!(
            window_days(&json!({"window_days": "14"}), 30).unwrap(),
            14
        );
        assert!(matches!(
            window_days(&json!({"window_days": 0}), 30),
            Err(OpError::MissingArgument("window_days"))
        ));
        assert!(matches!(
            window_days(&json!({"window_days": "soon"}), 30),
            Err(OpError::MissingArgument("window_days"))
        ));
    }
}
