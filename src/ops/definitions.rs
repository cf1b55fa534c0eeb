//! Operation descriptions for the selection boundary
//!
//! One entry per catalog operation: the argument schema the selector fills
//! in, in function-calling format, plus guidance on when to pick it.

use serde_json::json;

use super::OpName;

/// A catalog entry as handed to the selector.
#[derive(Debug, Clone)]
pub struct OpDefinition {
    pub name: OpName,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// The full catalog, in stable order.
pub fn catalog() -> Vec<OpDefinition> {
    vec![
        OpDefinition {
            name: OpName::SearchByEmail,
            description: "Look up one employee's profile by email address. \
                          Use when the user mentions an email.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "description": "Employee email address"
                    }
                },
                "required": ["email"]
            }),
        },
        OpDefinition {
            name: OpName::SearchById,
            description: "Look up one employee's profile by their \
                          24-character employee id.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "string",
                        "description": "24-character hex employee id"
                    }
                },
                "required": ["employee_id"]
            }),
        },
        OpDefinition {
            name: OpName::ListDepartment,
            description: "List all employees in a department. Use for 'who \
                          works in X' questions.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "department": {
                        "type": "string",
                        "description": "Exact department name, e.g. Engineering"
                    }
                },
                "required": ["department"]
            }),
        },
        OpDefinition {
            name: OpName::AttendanceSummary,
            description: "Attendance statistics for one employee over the \
                          last N days: present/late/absent/WFH counts, \
                          attendance rate, working hours.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "string",
                        "description": "24-character hex employee id"
                    },
                    "window_days": {
                        "type": "integer",
                        "description": "Days to look back (default 30)"
                    }
                },
                "required": ["employee_id"]
            }),
        },
        OpDefinition {
            name: OpName::MarkAttendance,
            description: "Mark today's attendance for an employee. Punch-in \
                          time is optional (HH:MM); the current time is used \
                          when omitted. Refuses politely if today is already \
                          marked.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "employee_id": {
                        "type": "string",
                        "description": "24-character hex employee id"
                    },
                    "punch_in": {
                        "type": "string",
                        "description": "Punch-in time HH:MM (optional)"
                    }
                },
                "required": ["employee_id"]
            }),
        },
        OpDefinition {
            name: OpName::DepartmentReport,
            description: "Attendance report for a whole department over the \
                          last N days, with per-employee rates.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "department": {
                        "type": "string",
                        "description": "Exact department name"
                    },
                    "window_days": {
                        "type": "integer",
                        "description": "Days to look back (default 30)"
                    }
                },
                "required": ["department"]
            }),
        },
        OpDefinition {
            name: OpName::LateArrivals,
            description: "List everyone who punched in late over the last N \
                          days, optionally within one department.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "window_days": {
                        "type": "integer",
                        "description": "Days to look back (default 7)"
                    },
                    "department": {
                        "type": "string",
                        "description": "Optional department filter"
                    }
                },
                "required": []
            }),
        },
    ]
}
