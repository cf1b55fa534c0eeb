//! Deterministic text rendering of operation results
//!
//! The structured `OpOutput` / `OpError` layer is what tests assert on;
//! this module is the single place that turns it into chat replies.
//! Percentages are always two decimals, field order is fixed, and failure
//! messages never include storage-layer error text or raw internal ids.

use crate::domain::AttendanceStatus;
use crate::ops::{OpError, OpName, OpOutput, OperationResult};
use crate::report::{AttendanceSummary, DepartmentReport, LateArrivalsReport};

/// Standard apology for a turn that blew its step budget.
pub const BUDGET_EXCEEDED_MESSAGE: &str =
    "I'm sorry - that request took too many steps to work out. \
     Could you try a simpler or more specific question?";

pub fn render_result(result: &OperationResult) -> String {
    match result {
        Ok(output) => render_output(output),
        Err(err) => failure_message(err),
    }
}

pub fn render_output(output: &OpOutput) -> String {
    match output {
        OpOutput::Profile(emp) => {
            let mut text = String::from("👤 Employee Profile\n");
            text.push_str(&format!("Name: {}\n", emp.name));
            text.push_str(&format!("Email: {}\n", emp.email));
            text.push_str(&format!("Role: {}\n", emp.role));
            if let Some(dept) = &emp.department {
                text.push_str(&format!("Department: {dept}\n"));
            }
            let state = if emp.is_disabled { "Disabled" } else { "Active" };
            text.push_str(&format!("Status: {state}"));
            if emp.is_work_from_home {
                text.push_str(" | 🏠 Work From Home");
            }
            text
        }
        OpOutput::Roster {
            department,
            employees,
        } => {
            let mut text = format!(
                "👥 Employees in {department} ({} total):\n",
                employees.len()
            );
            for (idx, emp) in employees.iter().enumerate() {
                text.push_str(&format!("{}. {} - {}\n", idx + 1, emp.name, emp.email));
            }
            text.trim_end().to_string()
        }
        OpOutput::Summary(summary) => render_summary(summary),
        OpOutput::Marked(marked) => {
            let mut text = format!("✅ Attendance marked for {}\n", marked.employee_name);
            text.push_str(&format!("Date: {}\n", marked.record.date.format("%Y-%m-%d")));
            if let Some(punch_in) = marked.record.punch_in {
                text.push_str(&format!("Punch in: {}\n", punch_in.format("%H:%M")));
            }
            text.push_str(&format!("Status: {}", marked.record.status.as_str()));
            if marked.record.status == AttendanceStatus::Late {
                text.push_str(&format!(
                    "\n⚠️ Note: {} minutes past the cutoff",
                    marked.minutes_late
                ));
            }
            text
        }
        OpOutput::Department(report) => render_department(report),
        OpOutput::LateArrivals(report) => render_late_arrivals(report),
    }
}

fn render_summary(summary: &AttendanceSummary) -> String {
    let mut text = format!(
        "📊 Attendance Summary - last {} days\n",
        summary.window_days
    );
    text.push_str(&format!(
        "Employee: {} ({})\n",
        summary.employee_name, summary.employee_email
    ));
    text.push_str(&format!(
        "Period: {} to {}\n",
        summary.range.start.format("%Y-%m-%d"),
        summary.range.end.format("%Y-%m-%d")
    ));
    text.push_str(&format!("✅ Present: {} days\n", summary.present_days));
    text.push_str(&format!("⏰ Late: {} days\n", summary.late_days));
    text.push_str(&format!("🏠 Work from home: {} days\n", summary.wfh_days));
    text.push_str(&format!("❌ Absent: {} days\n", summary.absent_days));
    text.push_str(&format!(
        "📈 Attendance rate: {:.2}%\n",
        summary.attendance_rate
    ));
    match summary.average_hours {
        Some(avg) => text.push_str(&format!(
            "⏱️ Hours: {:.1} total, {:.1} average/day",
            summary.total_hours, avg
        )),
        None => text.push_str("⏱️ Hours: no working hours recorded"),
    }
    text
}

fn render_department(report: &DepartmentReport) -> String {
    let mut text = format!("🏢 Department Report - {}\n", report.department);
    text.push_str(&format!(
        "Period: {} to {}\n",
        report.range.start.format("%Y-%m-%d"),
        report.range.end.format("%Y-%m-%d")
    ));
    text.push_str(&format!("👥 Headcount: {}\n", report.headcount));
    text.push_str(&format!(
        "Totals: {} present, {} late, {} absent\n",
        report.present_days, report.late_days, report.absent_days
    ));
    text.push_str(&format!(
        "📈 Department attendance rate: {:.2}%\n",
        report.attendance_rate
    ));
    for emp in &report.employees {
        text.push_str(&format!(
            "• {}: {:.2}% ({} present, {} late)\n",
            emp.name, emp.attendance_rate, emp.present_days, emp.late_days
        ));
    }
    text.trim_end().to_string()
}

fn render_late_arrivals(report: &LateArrivalsReport) -> String {
    let scope = match &report.department {
        Some(dept) => format!(" in {dept}"),
        None => String::new(),
    };
    if report.arrivals.is_empty() {
        return format!(
            "✅ No late arrivals in the last {} days{scope}.",
            report.window_days
        );
    }
    let mut text = format!(
        "⏰ Late Arrivals - last {} days{scope}\n",
        report.window_days
    );
    text.push_str(&format!("Total: {} instances\n", report.arrivals.len()));
    for arrival in &report.arrivals {
        let punch = arrival
            .punch_in
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".into());
        text.push_str(&format!(
            "• {} - {} at {}\n",
            arrival.employee_name,
            arrival.date.format("%Y-%m-%d"),
            punch
        ));
    }
    text.trim_end().to_string()
}

/// Human-readable message for each failure kind. Distinct and deterministic
/// per kind; never includes internal identifiers or driver errors.
pub fn failure_message(err: &OpError) -> String {
    match err {
        OpError::NotFound { what } => {
            format!("❌ I couldn't find {what}. Could you double-check it?")
        }
        OpError::InvalidIdentifier { .. } => {
            "❌ That doesn't look like a valid employee id - I need the \
             24-character code."
                .into()
        }
        OpError::InvalidTimeFormat { .. } => {
            "❌ I couldn't read that time. Please use HH:MM, for example 09:15.".into()
        }
        OpError::AlreadyMarked { name, .. } => {
            format!("⚠️ Attendance is already marked for {name} today.")
        }
        OpError::MissingArgument(field) => clarification_prompt(field),
        OpError::BudgetExceeded => BUDGET_EXCEEDED_MESSAGE.into(),
        OpError::RepositoryUnavailable(_) => {
            "⚠️ The employee database is unreachable right now. Please try \
             again in a moment."
                .into()
        }
    }
}

/// Prompt text asking the user for one missing argument.
pub fn clarification_prompt(field: &str) -> String {
    match field {
        "employee_id" => {
            "Which employee? Please give me their 24-character employee id.".into()
        }
        "email" => "Which email address should I look up?".into(),
        "department" => "Which department should I look at?".into(),
        "window_days" => "How many days should that cover? Give me a number of days.".into(),
        "punch_in" => "What punch-in time should I record? Use HH:MM.".into(),
        other => format!("I still need the {other} - could you provide it?"),
    }
}

/// Message for an utterance no operation could be matched to.
pub fn fallback_message() -> String {
    "I can look up employees by email or id, show attendance summaries, \
     mark attendance, and report on departments or late arrivals. What \
     would you like?"
        .into()
}

/// Recoverable selection-backend failure for this turn.
pub fn selector_unavailable_message() -> String {
    "⚠️ I couldn't reach my reasoning service just now. Please try again in \
     a moment."
        .into()
}

/// One-line step record for the selection loop's scratchpad.
pub fn step_summary(op: OpName, result: &OperationResult) -> String {
    match result {
        Ok(output) => {
            let gist = match output {
                OpOutput::Profile(emp) => {
                    format!("found {} <{}> id={}", emp.name, emp.email, emp.id)
                }
                OpOutput::Roster { employees, .. } => {
                    format!("{} employees", employees.len())
                }
                OpOutput::Summary(s) => format!(
                    "{}: {:.2}% over {} days",
                    s.employee_name, s.attendance_rate, s.window_days
                ),
                OpOutput::Marked(m) => format!(
                    "marked {} as {}",
                    m.employee_name,
                    m.record.status.as_str()
                ),
                OpOutput::Department(r) => {
                    format!("{}: {:.2}% headcount {}", r.department, r.attendance_rate, r.headcount)
                }
                OpOutput::LateArrivals(r) => format!("{} late arrivals", r.arrivals.len()),
            };
            format!("{op} ok: {gist}")
        }
        Err(err) => format!("{op} failed: {err}"),
    }
}
