//! SQLite repository over sqlx
//!
//! Owns the schema. Email uniqueness is an expression index over
//! `lower(email)` scoped to non-deleted rows; the per-day attendance
//! invariant is a `UNIQUE(employee_id, date)` constraint, which is what
//! makes `mark_attendance_once` safe under concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::warn;

use super::{DateRange, MarkOutcome, RepoError, Repository};
use crate::domain::{AttendanceRecord, AttendanceStatus, EmployeeId, EmployeeRecord, GeoPoint};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        department TEXT,
        role TEXT NOT NULL DEFAULT 'employee',
        is_work_from_home INTEGER NOT NULL DEFAULT 0,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        is_disabled INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_employees_email
        ON employees(lower(email)) WHERE is_deleted = 0
    "#,
    "CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department)",
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id TEXT PRIMARY KEY,
        employee_id TEXT NOT NULL REFERENCES employees(id),
        date TEXT NOT NULL,
        punch_in TEXT,
        punch_out TEXT,
        status TEXT NOT NULL,
        working_hours REAL,
        punch_in_lat REAL,
        punch_in_lon REAL,
        punch_out_lat REAL,
        punch_out_lon REAL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(employee_id, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_status ON attendance(status)",
];

const EMPLOYEE_COLS: &str =
    "id, name, email, department, role, is_work_from_home, is_deleted, is_disabled, \
     created_at, updated_at";

const ATTENDANCE_COLS: &str =
    "id, employee_id, date, punch_in, punch_out, status, working_hours, \
     punch_in_lat, punch_in_lon, punch_out_lat, punch_out_lon, created_at, updated_at";

/// sqlx-backed repository.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, RepoError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Private in-memory database, mainly for tests and demos.
    pub async fn in_memory() -> Result<Self, RepoError> {
        // A second connection would see a different :memory: database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn attendance_for_day(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLS} FROM attendance WHERE employee_id = $1 AND date = $2"
        ))
        .bind(employee_id.as_str())
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| attendance_from_row(&r)))
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn find_employee_by_email(
        &self,
        email: &str,
    ) -> Result<Option<EmployeeRecord>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLS} FROM employees \
             WHERE lower(email) = lower($1) AND is_deleted = 0"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| employee_from_row(&r)))
    }

    async fn find_employee_by_id(
        &self,
        id: &EmployeeId,
    ) -> Result<Option<EmployeeRecord>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLS} FROM employees WHERE id = $1 AND is_deleted = 0"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| employee_from_row(&r)))
    }

    async fn list_employees_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<EmployeeRecord>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLS} FROM employees \
             WHERE department = $1 AND is_deleted = 0 ORDER BY name ASC"
        ))
        .bind(department)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(employee_from_row).collect())
    }

    async fn list_attendance(
        &self,
        employee_id: &EmployeeId,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLS} FROM attendance \
             WHERE employee_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date DESC"
        ))
        .bind(employee_id.as_str())
        .bind(range.start.format("%Y-%m-%d").to_string())
        .bind(range.end.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(attendance_from_row).collect())
    }

    async fn list_attendance_for_department(
        &self,
        department: &str,
        range: DateRange,
    ) -> Result<Vec<(EmployeeRecord, AttendanceRecord)>, RepoError> {
        let rows = sqlx::query(
            "SELECT e.id AS e_id, e.name, e.email, e.department, e.role, \
                    e.is_work_from_home, e.is_deleted, e.is_disabled, \
                    e.created_at AS e_created_at, e.updated_at AS e_updated_at, \
                    a.id AS a_id, a.employee_id, a.date, a.punch_in, a.punch_out, \
                    a.status, a.working_hours, a.punch_in_lat, a.punch_in_lon, \
                    a.punch_out_lat, a.punch_out_lon, \
                    a.created_at AS a_created_at, a.updated_at AS a_updated_at \
             FROM attendance a \
             JOIN employees e ON e.id = a.employee_id \
             WHERE e.department = $1 AND e.is_deleted = 0 \
               AND a.date BETWEEN $2 AND $3 \
             ORDER BY a.date DESC, e.name ASC",
        )
        .bind(department)
        .bind(range.start.format("%Y-%m-%d").to_string())
        .bind(range.end.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(joined_from_row).collect())
    }

    async fn list_late_arrivals(
        &self,
        range: DateRange,
        department: Option<&str>,
    ) -> Result<Vec<(EmployeeRecord, AttendanceRecord)>, RepoError> {
        let base = "SELECT e.id AS e_id, e.name, e.email, e.department, e.role, \
                    e.is_work_from_home, e.is_deleted, e.is_disabled, \
                    e.created_at AS e_created_at, e.updated_at AS e_updated_at, \
                    a.id AS a_id, a.employee_id, a.date, a.punch_in, a.punch_out, \
                    a.status, a.working_hours, a.punch_in_lat, a.punch_in_lon, \
                    a.punch_out_lat, a.punch_out_lon, \
                    a.created_at AS a_created_at, a.updated_at AS a_updated_at \
             FROM attendance a \
             JOIN employees e ON e.id = a.employee_id \
             WHERE a.status = 'Late' AND e.is_deleted = 0 \
               AND a.date BETWEEN $1 AND $2";

        let rows = match department {
            Some(dept) => {
                sqlx::query(&format!(
                    "{base} AND e.department = $3 ORDER BY a.date DESC, e.name ASC"
                ))
                .bind(range.start.format("%Y-%m-%d").to_string())
                .bind(range.end.format("%Y-%m-%d").to_string())
                .bind(dept)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY a.date DESC, e.name ASC"))
                    .bind(range.start.format("%Y-%m-%d").to_string())
                    .bind(range.end.format("%Y-%m-%d").to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().filter_map(joined_from_row).collect())
    }

    async fn mark_attendance_once(
        &self,
        record: &AttendanceRecord,
    ) -> Result<MarkOutcome, RepoError> {
        let result = sqlx::query(
            "INSERT INTO attendance \
             (id, employee_id, date, punch_in, punch_out, status, working_hours, \
              punch_in_lat, punch_in_lon, punch_out_lat, punch_out_lon, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT(employee_id, date) DO NOTHING",
        )
        .bind(&record.id)
        .bind(record.employee_id.as_str())
        .bind(record.date.format("%Y-%m-%d").to_string())
        .bind(record.punch_in.map(fmt_time))
        .bind(record.punch_out.map(fmt_time))
        .bind(record.status.as_str())
        .bind(record.working_hours)
        .bind(record.punch_in_location.map(|g| g.lat))
        .bind(record.punch_in_location.map(|g| g.lon))
        .bind(record.punch_out_location.map(|g| g.lat))
        .bind(record.punch_out_location.map(|g| g.lon))
        .bind(record.created_at.timestamp())
        .bind(record.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(MarkOutcome::Created(record.clone()));
        }

        // Lost the race (or a repeat call); surface the existing row.
        match self
            .attendance_for_day(&record.employee_id, record.date)
            .await?
        {
            Some(existing) => Ok(MarkOutcome::AlreadyMarked(existing)),
            None => Err(RepoError::Unavailable(sqlx::Error::RowNotFound)),
        }
    }

    async fn insert_employee(&self, employee: &EmployeeRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO employees \
             (id, name, email, department, role, is_work_from_home, is_deleted, is_disabled, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(employee.id.as_str())
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.role)
        .bind(employee.is_work_from_home as i64)
        .bind(employee.is_deleted as i64)
        .bind(employee.is_disabled as i64)
        .bind(employee.created_at.timestamp())
        .bind(employee.updated_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn fmt_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn ts(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Decode an employee row; undecodable rows are skipped with a warning
/// rather than failing the whole read.
fn employee_from_row(row: &SqliteRow) -> Option<EmployeeRecord> {
    let id: String = row.try_get("id").or_else(|_| row.try_get("e_id")).ok()?;
    let Some(id) = EmployeeId::parse(&id) else {
        warn!("skipping employee row with malformed id");
        return None;
    };
    let created: i64 = row
        .try_get("created_at")
        .or_else(|_| row.try_get("e_created_at"))
        .ok()?;
    let updated: i64 = row
        .try_get("updated_at")
        .or_else(|_| row.try_get("e_updated_at"))
        .ok()?;

    Some(EmployeeRecord {
        id,
        name: row.try_get("name").ok()?,
        email: row.try_get("email").ok()?,
        department: row.try_get("department").ok()?,
        role: row.try_get("role").ok()?,
        is_work_from_home: row.try_get::<i64, _>("is_work_from_home").ok()? != 0,
        is_deleted: row.try_get::<i64, _>("is_deleted").ok()? != 0,
        is_disabled: row.try_get::<i64, _>("is_disabled").ok()? != 0,
        created_at: ts(created)?,
        updated_at: ts(updated)?,
    })
}

fn attendance_from_row(row: &SqliteRow) -> Option<AttendanceRecord> {
    let id: String = row.try_get("id").or_else(|_| row.try_get("a_id")).ok()?;
    let employee_id: String = row.try_get("employee_id").ok()?;
    let Some(employee_id) = EmployeeId::parse(&employee_id) else {
        warn!("skipping attendance row with malformed employee id");
        return None;
    };
    let date: String = row.try_get("date").ok()?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
    let status: String = row.try_get("status").ok()?;
    let status = AttendanceStatus::parse(&status)?;
    let created: i64 = row
        .try_get("created_at")
        .or_else(|_| row.try_get("a_created_at"))
        .ok()?;
    let updated: i64 = row
        .try_get("updated_at")
        .or_else(|_| row.try_get("a_updated_at"))
        .ok()?;

    let time = |col: &str| -> Option<NaiveTime> {
        row.try_get::<Option<String>, _>(col)
            .ok()
            .flatten()
            .and_then(|s| NaiveTime::parse_from_str(&s, "%H:%M").ok())
    };
    let geo = |lat_col: &str, lon_col: &str| -> Option<GeoPoint> {
        let lat = row.try_get::<Option<f64>, _>(lat_col).ok().flatten()?;
        let lon = row.try_get::<Option<f64>, _>(lon_col).ok().flatten()?;
        Some(GeoPoint { lat, lon })
    };

    Some(AttendanceRecord {
        id,
        employee_id,
        date,
        punch_in: time("punch_in"),
        punch_out: time("punch_out"),
        status,
        working_hours: row.try_get("working_hours").ok()?,
        punch_in_location: geo("punch_in_lat", "punch_in_lon"),
        punch_out_location: geo("punch_out_lat", "punch_out_lon"),
        created_at: ts(created)?,
        updated_at: ts(updated)?,
    })
}

fn joined_from_row(row: &SqliteRow) -> Option<(EmployeeRecord, AttendanceRecord)> {
    Some((employee_from_row(row)?, attendance_from_row(row)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain;

    fn employee(name: &str, email: &str, department: Option<&str>) -> EmployeeRecord {
        let now = Utc::now();
        EmployeeRecord {
            id: EmployeeId::generate(),
            name: name.into(),
            email: email.into(),
            department: department.map(String::from),
            role: "employee".into(),
            is_work_from_home: false,
            is_deleted: false,
            is_disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn attendance(
        employee_id: &EmployeeId,
        date: NaiveDate,
        punch_in: Option<&str>,
        status: AttendanceStatus,
    ) -> AttendanceRecord {
        let now = Utc::now();
        AttendanceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            employee_id: employee_id.clone(),
            date,
            punch_in: punch_in.and_then(domain::parse_punch_time),
            punch_out: None,
            status,
            working_hours: None,
            punch_in_location: None,
            punch_out_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn employee_round_trips_by_id_and_email() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let emp = employee("Jane Doe", "jane.doe@corp.test", Some("Engineering"));
        repo.insert_employee(&emp).await.unwrap();

        let by_id = repo.find_employee_by_id(&emp.id).await.unwrap().unwrap();
        let by_email = repo
            .find_employee_by_email("JANE.DOE@corp.test")
            .await
            .unwrap()
            .unwrap();

        // Timestamps survive at second resolution, everything else exactly.
        assert_eq!(by_id.id, emp.id);
        assert_eq!(by_id.name, emp.name);
        assert_eq!(by_id.email, emp.email);
        assert_eq!(by_id.department, emp.department);
        assert_eq!(by_id.role, emp.role);
        assert_eq!(by_id.is_work_from_home, emp.is_work_from_home);
        assert_eq!(by_id.is_disabled, emp.is_disabled);
        assert_eq!(by_id.created_at.timestamp(), emp.created_at.timestamp());
        assert_eq!(by_email, by_id);
    }

    #[tokio::test]
    async fn soft_deleted_employees_never_surface() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let mut emp = employee("Gone Person", "gone@corp.test", Some("Engineering"));
        emp.is_deleted = true;
        repo.insert_employee(&emp).await.unwrap();

        assert!(repo.find_employee_by_id(&emp.id).await.unwrap().is_none());
        assert!(
            repo.find_employee_by_email("gone@corp.test")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            repo.list_employees_by_department("Engineering")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn department_match_is_case_sensitive() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let emp = employee("Jane Doe", "jane@corp.test", Some("Engineering"));
        repo.insert_employee(&emp).await.unwrap();

        assert_eq!(
            repo.list_employees_by_department("Engineering")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(
            repo.list_employees_by_department("engineering")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn second_mark_for_same_day_reports_existing_row() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let emp = employee("Jane Doe", "jane@corp.test", None);
        repo.insert_employee(&emp).await.unwrap();

        let day = d(2025, 3, 10);
        let first = attendance(&emp.id, day, Some("08:15"), AttendanceStatus::Present);
        let second = attendance(&emp.id, day, Some("10:00"), AttendanceStatus::Late);

        assert!(matches!(
            repo.mark_attendance_once(&first).await.unwrap(),
            MarkOutcome::Created(_)
        ));
        match repo.mark_attendance_once(&second).await.unwrap() {
            MarkOutcome::AlreadyMarked(existing) => {
                assert_eq!(existing.id, first.id);
                assert_eq!(existing.punch_in, first.punch_in);
                assert_eq!(existing.status, AttendanceStatus::Present);
            }
            MarkOutcome::Created(_) => panic!("duplicate day row created"),
        }
    }

    #[tokio::test]
    async fn attendance_listing_is_date_descending_and_inclusive() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let emp = employee("Jane Doe", "jane@corp.test", None);
        repo.insert_employee(&emp).await.unwrap();

        for day in [d(2025, 3, 1), d(2025, 3, 5), d(2025, 3, 10)] {
            let rec = attendance(&emp.id, day, Some("09:00"), AttendanceStatus::Present);
            repo.mark_attendance_once(&rec).await.unwrap();
        }

        let range = DateRange {
            start: d(2025, 3, 1),
            end: d(2025, 3, 10),
        };
        let rows = repo.list_attendance(&emp.id, range).await.unwrap();
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2025, 3, 10), d(2025, 3, 5), d(2025, 3, 1)]);
    }

    #[tokio::test]
    async fn late_arrivals_filter_by_status_and_department() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let eng = employee("Alice", "alice@corp.test", Some("Engineering"));
        let sales = employee("Bob", "bob@corp.test", Some("Sales"));
        repo.insert_employee(&eng).await.unwrap();
        repo.insert_employee(&sales).await.unwrap();

        let day = d(2025, 3, 10);
        repo.mark_attendance_once(&attendance(&eng.id, day, Some("10:00"), AttendanceStatus::Late))
            .await
            .unwrap();
        repo.mark_attendance_once(&attendance(
            &sales.id,
            day,
            Some("10:30"),
            AttendanceStatus::Late,
        ))
        .await
        .unwrap();

        let range = DateRange::last_days(day, 7);
        assert_eq!(repo.list_late_arrivals(range, None).await.unwrap().len(), 2);
        let eng_only = repo
            .list_late_arrivals(range, Some("Engineering"))
            .await
            .unwrap();
        assert_eq!(eng_only.len(), 1);
        assert_eq!(eng_only[0].0.name, "Alice");
    }
}
