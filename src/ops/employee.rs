//! Employee lookup operations

use serde_json::Value;

use super::{OpError, OpOutput, OperationResult, OpsExecutor, required_employee_id, required_str};

pub(super) async fn search_by_email(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let email = required_str(args, "email")?;
    // A value without an @ can't be an email; ask again rather than query.
    if !email.contains('@') {
        return Err(OpError::MissingArgument("email"));
    }

    match ops.repo.find_employee_by_email(email).await? {
        Some(employee) => Ok(OpOutput::Profile(employee)),
        None => Err(OpError::NotFound {
            what: format!("an employee with email {email}"),
        }),
    }
}

pub(super) async fn search_by_id(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let id = required_employee_id(args)?;

    match ops.repo.find_employee_by_id(&id).await? {
        Some(employee) => Ok(OpOutput::Profile(employee)),
        None => Err(OpError::NotFound {
            what: "an employee with that id".to_string(),
        }),
    }
}

pub(super) async fn list_department(ops: &OpsExecutor, args: &Value) -> OperationResult {
    let department = required_str(args, "department")?;

    let employees = ops.repo.list_employees_by_department(department).await?;
    if employees.is_empty() {
        return Err(OpError::NotFound {
            what: format!("any employees in {department}"),
        });
    }

    Ok(OpOutput::Roster {
        department: department.to_string(),
        employees,
    })
}
