//! Deterministic rule-table selector
//!
//! Maps utterances to operation choices with plain pattern matching: emails,
//! 24-hex ids, department phrases, punch times and period words. This is the
//! selector the test suite runs against, and the fallback when no reasoning
//! backend is configured. One operation per turn, except the two-step chain
//! "resolve a person, then fetch their summary".

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::selector::{ContextSnapshot, Decision, Selector, SelectorError, StepRecord};
use crate::domain::{EmployeeId, parse_punch_time};
use crate::ops::{OpDefinition, OpName};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex"));
static HEX_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9a-fA-F]{24}\b").expect("valid regex"));
static PUNCH_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}:\d{2})\b").expect("valid regex"));
static LAST_N_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:last|past)\s+(\d+)\s+days?\b").expect("valid regex"));
static DEPARTMENT_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z]+)\s+(?:department|team|dept)\b").expect("valid regex")
});
// Deliberately case-sensitive: department labels are capitalized, and a
// case-insensitive class would swallow words like "the" in "in the last...".
static IN_DEPARTMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bin\s+([A-Z][A-Za-z]+)\b").expect("valid regex"));

/// Rule-based selector. Stateless and deterministic.
#[derive(Debug, Default)]
pub struct RuleSelector;

impl RuleSelector {
    pub fn new() -> Self {
        Self
    }
}

fn wants_attendance(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    ["attendance", "summary", "hours", "present", "absent"]
        .iter()
        .any(|kw| lower.contains(kw))
}

fn wants_mark(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    ["mark", "punch in", "punch-in", "i'm here", "im here", "check in", "check-in"]
        .iter()
        .any(|kw| lower.contains(kw))
}

pub(super) fn find_email(utterance: &str) -> Option<&str> {
    EMAIL.find(utterance).map(|m| m.as_str())
}

pub(super) fn find_employee_id(utterance: &str) -> Option<EmployeeId> {
    HEX_ID
        .find(utterance)
        .and_then(|m| EmployeeId::parse(m.as_str()))
}

pub(super) fn find_punch_time(utterance: &str) -> Option<&str> {
    PUNCH_TIME
        .captures(utterance)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|raw| parse_punch_time(raw).is_some())
}

fn find_department(utterance: &str) -> Option<String> {
    DEPARTMENT_PHRASE
        .captures(utterance)
        .or_else(|| IN_DEPARTMENT.captures(utterance))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Window length from period words, when the utterance names one.
fn find_window_days(utterance: &str) -> Option<u32> {
    if let Some(captures) = LAST_N_DAYS.captures(utterance) {
        return captures.get(1).and_then(|m| m.as_str().parse().ok());
    }
    let lower = utterance.to_lowercase();
    if lower.contains("today") {
        Some(1)
    } else if lower.contains("week") {
        Some(7)
    } else if lower.contains("month") {
        Some(30)
    } else if lower.contains("year") {
        Some(365)
    } else {
        None
    }
}

fn with_window(mut args: Value, utterance: &str) -> Value {
    if let Some(days) = find_window_days(utterance) {
        args["window_days"] = json!(days);
    }
    args
}

#[async_trait]
impl Selector for RuleSelector {
    async fn select(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
        _catalog: &[OpDefinition],
        prior_steps: &[StepRecord],
    ) -> Result<Decision, SelectorError> {
        // Follow-up pass: a profile lookup that surfaced an id feeds an
        // attendance question in the same turn.
        if let Some(last) = prior_steps.last() {
            let already_summarized = prior_steps
                .iter()
                .any(|s| s.op == OpName::AttendanceSummary);
            if last.success
                && !already_summarized
                && wants_attendance(utterance)
                && matches!(last.op, OpName::SearchByEmail | OpName::SearchById)
            {
                if let Some(id) = &last.resolved_employee {
                    return Ok(Decision::Invoke {
                        op: OpName::AttendanceSummary,
                        args: with_window(json!({ "employee_id": id.as_str() }), utterance),
                    });
                }
            }
            // One operation per turn otherwise.
            return Ok(Decision::Respond { text: None });
        }

        let email = find_email(utterance);
        let employee_id =
            find_employee_id(utterance).or_else(|| context.resolved_employee.clone());

        if wants_mark(utterance) {
            let Some(id) = employee_id else {
                let mut args = json!({});
                if let Some(time) = find_punch_time(utterance) {
                    args["punch_in"] = json!(time);
                }
                return Ok(Decision::Clarify {
                    op: OpName::MarkAttendance,
                    args,
                    field: "employee_id",
                });
            };
            let mut args = json!({ "employee_id": id.as_str() });
            if let Some(time) = find_punch_time(utterance) {
                args["punch_in"] = json!(time);
            }
            return Ok(Decision::Invoke {
                op: OpName::MarkAttendance,
                args,
            });
        }

        let lower = utterance.to_lowercase();
        if lower.contains("late") {
            let mut args = json!({});
            if let Some(days) = find_window_days(utterance) {
                args["window_days"] = json!(days);
            }
            if let Some(department) = find_department(utterance) {
                args["department"] = json!(department);
            }
            return Ok(Decision::Invoke {
                op: OpName::LateArrivals,
                args,
            });
        }

        if let Some(department) = find_department(utterance) {
            // "who works in X" lists; anything attendance-flavored reports.
            let op = if wants_attendance(utterance) || lower.contains("report") {
                OpName::DepartmentReport
            } else {
                OpName::ListDepartment
            };
            return Ok(Decision::Invoke {
                op,
                args: with_window(json!({ "department": department }), utterance),
            });
        }

        if let Some(email) = email {
            // The email lookup runs first either way; the follow-up pass
            // chains the summary when attendance was asked for.
            return Ok(Decision::Invoke {
                op: OpName::SearchByEmail,
                args: json!({ "email": email }),
            });
        }

        if wants_attendance(utterance) {
            let Some(id) = employee_id else {
                return Ok(Decision::Clarify {
                    op: OpName::AttendanceSummary,
                    args: with_window(json!({}), utterance),
                    field: "employee_id",
                });
            };
            return Ok(Decision::Invoke {
                op: OpName::AttendanceSummary,
                args: with_window(json!({ "employee_id": id.as_str() }), utterance),
            });
        }

        if let Some(id) = find_employee_id(utterance) {
            return Ok(Decision::Invoke {
                op: OpName::SearchById,
                args: json!({ "employee_id": id.as_str() }),
            });
        }

        Ok(Decision::Respond { text: None })
    }
}
