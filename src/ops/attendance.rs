//! Attendance operations: summaries, marking, department report, late list

use chrono::{Timelike, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{
    OpError, OpOutput, OperationResult, OpsExecutor, optional_str, required_employee_id,
    required_str, window_days,
};
use crate::domain::{self, AttendanceRecord, EmployeeId, EmployeeRecord};
use crate::ops::MarkedAttendance;
use crate::report;
use crate::store::{DateRange, MarkOutcome};

async fn find_employee(
    ops: &OpsExecutor,
    id: &EmployeeId,
) -> Result<EmployeeRecord, OpError> {
    ops.repo
        .find_employee_by_id(id)
        .await?
        .ok_or_else(|| OpError::NotFound {
            what: "an employee with that id".to_string(),
        })
}

pub(super) async fn attendance_summary(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let id = required_employee_id(args)?;
    let window = window_days(args, 30)?;

    let employee = find_employee(ops, &id).await?;
    let range = DateRange::last_days(ops.clock.today(), window);
    let rows = ops.repo.list_attendance(&id, range).await?;

    Ok(OpOutput::Summary(report::attendance_summary(
        &employee, &rows, range,
    )))
}

pub(super) async fn mark_attendance(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let id = required_employee_id(args)?;
    let punch_override = match optional_str(args, "punch_in") {
        Some(raw) => Some(domain::parse_punch_time(raw).ok_or(OpError::InvalidTimeFormat {
            given: raw.to_string(),
        })?),
        None => None,
    };

    let employee = find_employee(ops, &id).await?;

    let today = ops.clock.today();
    let punch_in = punch_override.unwrap_or_else(|| {
        // Punch times carry minute resolution.
        let now = ops.clock.time_now();
        chrono::NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now)
    });
    let status = domain::classify(Some(punch_in), ops.late_threshold, employee.is_work_from_home);

    let now = Utc::now();
    let record = AttendanceRecord {
        id: Uuid::new_v4().to_string(),
        employee_id: id,
        date: today,
        punch_in: Some(punch_in),
        punch_out: None,
        status,
        working_hours: None,
        punch_in_location: None,
        punch_out_location: None,
        created_at: now,
        updated_at: now,
    };

    match ops.repo.mark_attendance_once(&record).await? {
        MarkOutcome::Created(record) => Ok(OpOutput::Marked(MarkedAttendance {
            employee_name: employee.name,
            minutes_late: domain::minutes_late(punch_in, ops.late_threshold),
            record,
        })),
        MarkOutcome::AlreadyMarked(existing) => Err(OpError::AlreadyMarked {
            name: employee.name,
            date: existing.date,
        }),
    }
}

pub(super) async fn department_report(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let department = required_str(args, "department")?;
    let window = window_days(args, 30)?;

    let employees = ops.repo.list_employees_by_department(department).await?;
    if employees.is_empty() {
        return Err(OpError::NotFound {
            what: format!("any employees in {department}"),
        });
    }

    let range = DateRange::last_days(ops.clock.today(), window);
    let mut members = Vec::with_capacity(employees.len());
    for employee in employees {
        let rows = ops.repo.list_attendance(&employee.id, range).await?;
        members.push((employee, rows));
    }

    Ok(OpOutput::Department(report::department_report(
        department, &members, range,
    )))
}

pub(super) async fn late_arrivals(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let window = window_days(args, 7)?;
    let department = optional_str(args, "department");

    let range = DateRange::last_days(ops.clock.today(), window);
    let rows = ops.repo.list_late_arrivals(range, department).await?;

    Ok(OpOutput::LateArrivals(report::late_arrivals(
        &rows, range, department,
    )))
}
