//! Pure report builders
//!
//! Turn raw repository rows into structured statistics. Rendering to text
//! lives in `render`; these types are the machine-checkable layer.

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{AttendanceRecord, AttendanceStatus, EmployeeRecord};
use crate::store::DateRange;

/// Per-employee attendance statistics over a window.
///
/// The denominator is calendar days in the window; weekends are not
/// excluded. Absent days are window days without an attended record, which
/// coincides with explicit Absent rows when every day has one.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSummary {
    pub employee_name: String,
    pub employee_email: String,
    pub range: DateRange,
    pub window_days: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub wfh_days: u32,
    pub absent_days: u32,
    /// Percentage of window days with an attended record (0-100).
    pub attendance_rate: f64,
    pub total_hours: f64,
    /// Undefined until at least one row has recorded working hours.
    pub average_hours: Option<f64>,
}

/// Aggregate view of one department over a window.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentReport {
    pub department: String,
    pub range: DateRange,
    pub window_days: u32,
    pub headcount: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    /// Attended days over headcount x window days, as a percentage.
    pub attendance_rate: f64,
    /// Sorted by employee name ascending.
    pub employees: Vec<EmployeeRate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeRate {
    pub name: String,
    pub attendance_rate: f64,
    pub present_days: u32,
    pub late_days: u32,
}

/// One late punch-in.
#[derive(Debug, Clone, PartialEq)]
pub struct LateArrival {
    pub employee_name: String,
    pub employee_email: String,
    pub date: NaiveDate,
    pub punch_in: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LateArrivalsReport {
    pub range: DateRange,
    pub window_days: u32,
    pub department: Option<String>,
    /// Date descending, then name ascending.
    pub arrivals: Vec<LateArrival>,
}

fn attended(status: AttendanceStatus) -> bool {
    matches!(
        status,
        AttendanceStatus::Present | AttendanceStatus::Late | AttendanceStatus::WorkFromHome
    )
}

fn rate(attended_days: u32, window_days: u32) -> f64 {
    if window_days == 0 {
        return 0.0;
    }
    f64::from(attended_days) / f64::from(window_days) * 100.0
}

/// Build the attendance summary for one employee's rows over a window.
pub fn attendance_summary(
    employee: &EmployeeRecord,
    rows: &[AttendanceRecord],
    range: DateRange,
) -> AttendanceSummary {
    let window_days = range.days();
    let present_days = rows
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count() as u32;
    let late_days = rows
        .iter()
        .filter(|r| r.status == AttendanceStatus::Late)
        .count() as u32;
    let wfh_days = rows
        .iter()
        .filter(|r| r.status == AttendanceStatus::WorkFromHome)
        .count() as u32;

    let attended_days = present_days + late_days + wfh_days;
    let absent_days = window_days.saturating_sub(attended_days);

    let recorded: Vec<f64> = rows.iter().filter_map(|r| r.working_hours).collect();
    let total_hours: f64 = recorded.iter().sum();
    let average_hours = if recorded.is_empty() {
        None
    } else {
        Some(total_hours / recorded.len() as f64)
    };

    AttendanceSummary {
        employee_name: employee.name.clone(),
        employee_email: employee.email.clone(),
        range,
        window_days,
        present_days,
        late_days,
        wfh_days,
        absent_days,
        attendance_rate: rate(attended_days, window_days),
        total_hours,
        average_hours,
    }
}

/// Roll per-employee rows up into a department report.
///
/// `members` pairs every (non-deleted) department employee with their rows
/// for the window; employees with no rows still count toward headcount.
pub fn department_report(
    department: &str,
    members: &[(EmployeeRecord, Vec<AttendanceRecord>)],
    range: DateRange,
) -> DepartmentReport {
    let window_days = range.days();
    let mut employees: Vec<EmployeeRate> = Vec::with_capacity(members.len());
    let mut present_days = 0u32;
    let mut late_days = 0u32;
    let mut attended_days = 0u32;

    for (employee, rows) in members {
        let summary = attendance_summary(employee, rows, range);
        present_days += summary.present_days;
        late_days += summary.late_days;
        attended_days += summary.present_days + summary.late_days + summary.wfh_days;
        employees.push(EmployeeRate {
            name: employee.name.clone(),
            attendance_rate: summary.attendance_rate,
            present_days: summary.present_days,
            late_days: summary.late_days,
        });
    }

    employees.sort_by(|a, b| a.name.cmp(&b.name));

    let headcount = members.len() as u32;
    let absent_days = (headcount * window_days).saturating_sub(attended_days);

    DepartmentReport {
        department: department.to_string(),
        range,
        window_days,
        headcount,
        present_days,
        late_days,
        absent_days,
        attendance_rate: rate(attended_days, headcount * window_days),
        employees,
    }
}

/// Shape late rows into the report, enforcing the output ordering.
pub fn late_arrivals(
    rows: &[(EmployeeRecord, AttendanceRecord)],
    range: DateRange,
    department: Option<&str>,
) -> LateArrivalsReport {
    let mut arrivals: Vec<LateArrival> = rows
        .iter()
        .filter(|(_, a)| a.status == AttendanceStatus::Late)
        .map(|(e, a)| LateArrival {
            employee_name: e.name.clone(),
            employee_email: e.email.clone(),
            date: a.date,
            punch_in: a.punch_in,
        })
        .collect();

    arrivals.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.employee_name.cmp(&b.employee_name))
    });

    LateArrivalsReport {
        range,
        window_days: range.days(),
        department: department.map(String::from),
        arrivals,
    }
}
