//! Punchcard - conversational HR attendance assistant
//!
//! Console entrypoint: wires the SQLite repository, the operation catalog
//! and a selector (LLM-backed when an API key is configured, rule-based
//! otherwise) into the orchestrator, then hands the terminal to the REPL.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use punchcard::agent::{LlmSelector, Orchestrator, RuleSelector, Selector};
use punchcard::config::Config;
use punchcard::domain::{self, AttendanceRecord, EmployeeId, EmployeeRecord};
use punchcard::ops::OpsExecutor;
use punchcard::repl::Repl;
use punchcard::store::{Repository, SqliteRepository};

#[derive(Parser)]
#[command(name = "punchcard")]
#[command(about = "Conversational HR attendance assistant")]
struct Args {
    /// Database path (sqlite URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// API key for the reasoning backend
    #[arg(long, env = "PUNCHCARD_API_KEY")]
    api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "PUNCHCARD_API_BASE")]
    api_base: Option<String>,

    /// Model name for the reasoning backend
    #[arg(long, env = "PUNCHCARD_MODEL")]
    model: Option<String>,

    /// Punch-in cutoff (HH:MM, default 09:30)
    #[arg(long)]
    late_threshold: Option<String>,

    /// Max operation invocations per turn
    #[arg(long)]
    max_steps: Option<usize>,

    /// Seed a small demo data set into an empty database
    #[arg(long)]
    seed_demo: bool,

    /// Use the rule-based selector even when an API key is configured
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (from ~/.punchcard/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".punchcard").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv();
    }

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Load config file (~/.punchcard/config.toml)
    let config = Config::load();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let database_url = args
        .database_url
        .or(config.database_url.clone())
        .unwrap_or_else(|| "sqlite://punchcard.db?mode=rwc".to_string());

    let api_key = args.api_key.or(config.api_key.clone());
    let api_base = args.api_base.or(config.api_base.clone());
    let model = args.model.or(config.model.clone());

    let late_threshold = args
        .late_threshold
        .as_deref()
        .and_then(domain::parse_punch_time)
        .unwrap_or_else(|| config.late_threshold());

    let max_steps = args
        .max_steps
        .or(config.max_steps)
        .unwrap_or(punchcard::agent::DEFAULT_MAX_STEPS);

    let repo = Arc::new(SqliteRepository::connect(&database_url).await?);

    if args.seed_demo {
        seed_demo_data(repo.as_ref(), late_threshold).await;
    }

    let selector: Arc<dyn Selector> = match (&api_key, args.offline) {
        (Some(key), false) => {
            let mut llm = LlmSelector::new(key.clone());
            if let Some(base) = &api_base {
                llm = llm.with_api_base(base.as_str());
            }
            if let Some(model) = &model {
                llm = llm.with_model(model.as_str());
            }
            Arc::new(llm)
        }
        _ => Arc::new(RuleSelector::new()),
    };

    let selector_label = if api_key.is_some() && !args.offline {
        model.as_deref().unwrap_or("llm").to_string()
    } else {
        "rule-based (offline)".to_string()
    };

    // Startup banner
    println!();
    println!("  Punchcard {}", env!("CARGO_PKG_VERSION"));
    println!("{}", "─".repeat(50));
    println!("Database    {database_url}");
    println!("Selector    {selector_label}");
    println!("Cutoff      {}", late_threshold.format("%H:%M"));
    println!();

    let ops = OpsExecutor::new(repo).with_late_threshold(late_threshold);
    let orchestrator = Orchestrator::new(ops, selector).with_max_steps(max_steps);

    Repl::new(orchestrator)?.run().await
}

/// Seed four employees across two departments with two weeks of attendance.
/// A database that already holds the demo employees is left untouched.
async fn seed_demo_data(repo: &SqliteRepository, late_threshold: chrono::NaiveTime) {
    let now = Utc::now();
    let people: [(&str, &str, &str, bool); 4] = [
        ("Jane Doe", "jane.doe@corp.test", "Engineering", false),
        ("Arjun Mehta", "arjun.mehta@corp.test", "Engineering", false),
        ("Maria Gomez", "maria.gomez@corp.test", "Sales", false),
        ("Tom Park", "tom.park@corp.test", "Sales", true),
    ];

    let mut employees = Vec::new();
    for (name, email, department, wfh) in people {
        let employee = EmployeeRecord {
            id: EmployeeId::generate(),
            name: name.into(),
            email: email.into(),
            department: Some(department.into()),
            role: "employee".into(),
            is_work_from_home: wfh,
            is_deleted: false,
            is_disabled: false,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = repo.insert_employee(&employee).await {
            tracing::info!("skipping demo seed: {e}");
            return;
        }
        employees.push(employee);
    }

    let today = chrono::Local::now().date_naive();
    let mut rows = 0usize;
    for (idx, employee) in employees.iter().enumerate() {
        for offset in 0..14i64 {
            // Deterministic mix: mostly on time, the odd late day, one
            // absence per week.
            let slot = (idx as i64 + offset) % 7;
            let punch_in = match slot {
                6 => None,
                4 => domain::parse_punch_time("10:05"),
                _ => domain::parse_punch_time("09:05"),
            };
            let punch_out = punch_in.and(domain::parse_punch_time("17:30"));
            let record = AttendanceRecord {
                id: Uuid::new_v4().to_string(),
                employee_id: employee.id.clone(),
                date: today - Duration::days(offset),
                punch_in,
                punch_out,
                status: domain::classify(punch_in, late_threshold, employee.is_work_from_home),
                working_hours: domain::working_hours(punch_in, punch_out),
                punch_in_location: None,
                punch_out_location: None,
                created_at: now,
                updated_at: now,
            };
            if repo.mark_attendance_once(&record).await.is_ok() {
                rows += 1;
            }
        }
    }

    println!(
        "Seeded demo data: {} employees, {rows} attendance rows.",
        employees.len()
    );
    for employee in &employees {
        println!("  {} <{}> id={}", employee.name, employee.email, employee.id);
    }
}
