//! Intent resolution orchestrator
//!
//! Drives one turn at a time: if the session has an operation parked on a
//! missing argument, the utterance is read as that argument first; otherwise
//! the selector picks operations from the catalog until it stops, a
//! clarification is needed, or the step budget runs out. Operations execute
//! strictly in selection order - later selections see earlier results - and
//! their outputs aggregate into a single reply.

mod llm;
mod rules;
mod selector;

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::EmployeeId;
use crate::ops::{OpDefinition, OpError, OpName, OpOutput, OperationResult, OpsExecutor, catalog};
use crate::render;
use crate::session::{ConversationContext, PendingOp, SessionStore};

pub use llm::LlmSelector;
pub use rules::RuleSelector;
pub use selector::{ContextSnapshot, Decision, Selector, SelectorError, StepRecord};

/// Default cap on operation invocations per turn.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Turns of context shown to the selector.
const SNAPSHOT_TURNS: usize = 6;

/// The reply for one completed turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub text: String,
    /// Set when the turn ended on a clarification; names the awaited field
    /// so the transport can prompt for it.
    pub awaiting: Option<&'static str>,
}

impl TurnReply {
    fn answer(text: String) -> Self {
        Self {
            text,
            awaiting: None,
        }
    }

    fn clarify(field: &'static str) -> Self {
        Self {
            text: render::clarification_prompt(field),
            awaiting: Some(field),
        }
    }
}

/// Per-process orchestrator shared by all sessions.
pub struct Orchestrator {
    ops: OpsExecutor,
    selector: Arc<dyn Selector>,
    sessions: SessionStore,
    catalog: Vec<OpDefinition>,
    max_steps: usize,
}

impl Orchestrator {
    pub fn new(ops: OpsExecutor, selector: Arc<dyn Selector>) -> Self {
        Self {
            ops,
            selector,
            sessions: SessionStore::default(),
            catalog: catalog(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Cap operation invocations per turn.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_session_limits(mut self, sessions: usize, history: usize) -> Self {
        self.sessions = SessionStore::new(sessions, history);
        self
    }

    /// Process one utterance for one session.
    ///
    /// Turns for the same session are single-flight: the per-session lock is
    /// held for the whole turn. Different sessions proceed concurrently.
    pub async fn handle_turn(&self, session_id: &str, utterance: &str) -> TurnReply {
        let context = self.sessions.get_or_create(session_id).await;
        let mut context = context.lock().await;

        context.push_turn("user", utterance);

        let reply = match context.pending.take() {
            Some(pending) => self.resume_pending(&mut context, pending, utterance).await,
            None => self.run_selection(&mut context, utterance).await,
        };

        context.push_turn("assistant", reply.text.clone());
        reply
    }

    /// Link the session to an employee after a successful lookup. This is
    /// the caller-boundary "link profile" action; "my attendance" style
    /// requests resolve against it afterwards.
    pub async fn link_profile(&self, session_id: &str, query: &str) -> TurnReply {
        let context = self.sessions.get_or_create(session_id).await;
        let mut context = context.lock().await;

        let result = if let Some(email) = rules::find_email(query) {
            self.ops
                .execute(OpName::SearchByEmail, &json!({ "email": email }))
                .await
        } else if let Some(id) = rules::find_employee_id(query) {
            self.ops
                .execute(OpName::SearchById, &json!({ "employee_id": id.as_str() }))
                .await
        } else {
            return TurnReply::answer(
                "To link your profile I need your email address or your \
                 24-character employee id."
                    .into(),
            );
        };

        let reply = match result {
            Ok(OpOutput::Profile(employee)) => {
                context.resolved_employee = Some(employee.id.clone());
                TurnReply::answer(format!(
                    "🔗 Linked this chat to {} ({}).",
                    employee.name, employee.email
                ))
            }
            other => TurnReply::answer(render::render_result(&other)),
        };

        context.push_turn("assistant", reply.text.clone());
        reply
    }

    /// Drop the session's conversation, keeping any linked identity.
    pub async fn reset(&self, session_id: &str) {
        let context = self.sessions.get_or_create(session_id).await;
        context.lock().await.clear_conversation();
    }

    async fn resume_pending(
        &self,
        context: &mut ConversationContext,
        pending: PendingOp,
        utterance: &str,
    ) -> TurnReply {
        match parse_field_value(pending.missing, utterance) {
            Some(value) => {
                let mut args = pending.args;
                args[pending.missing] = value;
                debug!(op = %pending.op, field = pending.missing, "pending argument filled");
                let result = self.ops.execute(pending.op, &args).await;
                self.settle_single(context, pending.op, args, result)
            }
            None => {
                // Could not read the utterance as the awaited value; ask
                // again and keep the operation parked.
                let field = pending.missing;
                context.pending = Some(pending);
                TurnReply::clarify(field)
            }
        }
    }

    /// Wrap up a turn that executed exactly one operation outside the
    /// selection loop.
    fn settle_single(
        &self,
        context: &mut ConversationContext,
        op: OpName,
        args: Value,
        result: OperationResult,
    ) -> TurnReply {
        if let Err(OpError::MissingArgument(field)) = &result {
            let field = *field;
            context.pending = Some(PendingOp {
                op,
                args,
                missing: field,
            });
            return TurnReply::clarify(field);
        }
        TurnReply::answer(render::render_result(&result))
    }

    async fn run_selection(
        &self,
        context: &mut ConversationContext,
        utterance: &str,
    ) -> TurnReply {
        let snapshot = ContextSnapshot {
            resolved_employee: context.resolved_employee.clone(),
            recent_turns: context.recent_turns(SNAPSHOT_TURNS),
        };

        let mut steps: Vec<StepRecord> = Vec::new();
        let mut rendered: Vec<String> = Vec::new();
        let mut closing: Option<String> = None;

        loop {
            let decision = match self
                .selector
                .select(utterance, &snapshot, &self.catalog, &steps)
                .await
            {
                Ok(decision) => decision,
                Err(SelectorError::Backend(reason)) => {
                    warn!(%reason, "selector backend failed");
                    return TurnReply::answer(render::selector_unavailable_message());
                }
            };

            match decision {
                Decision::Respond { text } => {
                    closing = text;
                    break;
                }
                Decision::Clarify { op, args, field } => {
                    context.pending = Some(PendingOp {
                        op,
                        args,
                        missing: field,
                    });
                    return TurnReply::clarify(field);
                }
                Decision::Invoke { op, args } => {
                    // Budget check before the operation runs, so nothing
                    // past the cap ever executes (and no mutation can be
                    // left half-applied by a truncated turn).
                    if steps.len() >= self.max_steps {
                        warn!(max_steps = self.max_steps, "turn exceeded its step budget");
                        return TurnReply::answer(render::failure_message(
                            &OpError::BudgetExceeded,
                        ));
                    }

                    // At most one marking operation per turn.
                    if op.is_marking() && steps.iter().any(|s| s.op.is_marking()) {
                        steps.push(StepRecord {
                            op,
                            args,
                            summary: format!(
                                "{op} refused: attendance was already marked this turn"
                            ),
                            resolved_employee: None,
                            success: false,
                        });
                        continue;
                    }

                    let result = self.ops.execute(op, &args).await;

                    if let Err(OpError::MissingArgument(field)) = &result {
                        let field = *field;
                        context.pending = Some(PendingOp {
                            op,
                            args,
                            missing: field,
                        });
                        return TurnReply::clarify(field);
                    }

                    let repo_down = matches!(result, Err(OpError::RepositoryUnavailable(_)));
                    rendered.push(render::render_result(&result));
                    steps.push(StepRecord {
                        op,
                        args,
                        summary: render::step_summary(op, &result),
                        resolved_employee: surfaced_employee(&result),
                        success: result.is_ok(),
                    });

                    if repo_down {
                        // Report the outage once per turn and stop.
                        break;
                    }
                }
            }
        }

        let mut text = rendered.join("\n\n");
        if let Some(extra) = closing {
            if text.is_empty() {
                text = extra;
            } else {
                text.push_str("\n\n");
                text.push_str(&extra);
            }
        }
        if text.is_empty() {
            text = render::fallback_message();
        }
        TurnReply::answer(text)
    }
}

/// Employee id surfaced by a step, for chaining in later selections.
fn surfaced_employee(result: &OperationResult) -> Option<EmployeeId> {
    match result {
        Ok(OpOutput::Profile(employee)) => Some(employee.id.clone()),
        Ok(OpOutput::Marked(marked)) => Some(marked.record.employee_id.clone()),
        _ => None,
    }
}

/// Read an utterance as the value of one awaited field.
fn parse_field_value(field: &str, utterance: &str) -> Option<Value> {
    match field {
        "employee_id" => rules::find_employee_id(utterance).map(|id| json!(id.as_str())),
        "email" => rules::find_email(utterance).map(|email| json!(email)),
        "punch_in" => rules::find_punch_time(utterance).map(|time| json!(time)),
        "window_days" => utterance
            .split_whitespace()
            .find_map(|token| token.parse::<u32>().ok())
            .filter(|days| *days >= 1)
            .map(|days| json!(days)),
        "department" => {
            let trimmed = utterance.trim().trim_matches(['"', '\'']);
            (!trimmed.is_empty()).then(|| json!(trimmed))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmployeeRecord, default_late_threshold};
    use crate::ops::FixedClock;
    use crate::store::{
        DateRange, MarkOutcome, RepoError, Repository, SqliteRepository,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    async fn ops_with_jane() -> OpsExecutor {
        let repo = SqliteRepository::in_memory().await.unwrap();
        repo.insert_employee(&jane()).await.unwrap();
        OpsExecutor::new(Arc::new(repo)).with_clock(Arc::new(FixedClock {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(8, 45, 0).unwrap(),
        }))
    }

    /// Selector that keeps proposing the same operation forever.
    struct RelentlessSelector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Selector for RelentlessSelector {
        async fn select(
            &self,
            _utterance: &str,
            _context: &ContextSnapshot,
            _catalog: &[OpDefinition],
            _prior_steps: &[StepRecord],
        ) -> Result<Decision, SelectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Decision::Invoke {
                op: OpName::LateArrivals,
                args: json!({}),
            })
        }
    }

    #[tokio::test]
    async fn budget_exhaustion_yields_the_standard_apology() {
        let selector = Arc::new(RelentlessSelector {
            calls: AtomicUsize::new(0),
        });
        let orchestrator =
            Orchestrator::new(ops_with_jane().await, selector.clone()).with_max_steps(10);

        let reply = orchestrator.handle_turn("s1", "do everything").await;
        assert_eq!(reply.text, render::BUDGET_EXCEEDED_MESSAGE);
        assert!(reply.awaiting.is_none());
        // 10 executed, the 11th selection tripped the budget.
        assert_eq!(selector.calls.load(Ordering::SeqCst), 11);
    }

    /// Selector that tries to mark attendance twice in one turn.
    struct DoubleMarkSelector;

    #[async_trait]
    impl Selector for DoubleMarkSelector {
        async fn select(
            &self,
            _utterance: &str,
            _context: &ContextSnapshot,
            _catalog: &[OpDefinition],
            prior_steps: &[StepRecord],
        ) -> Result<Decision, SelectorError> {
            if prior_steps.len() < 2 {
                Ok(Decision::Invoke {
                    op: OpName::MarkAttendance,
                    args: json!({
                        "employee_id": "507f1f77bcf86cd799439011",
                        "punch_in": "08:15"
                    }),
                })
            } else {
                Ok(Decision::Respond { text: None })
            }
        }
    }

    #[tokio::test]
    async fn only_one_mark_executes_per_turn() {
        let ops = ops_with_jane().await;
        let orchestrator = Orchestrator::new(ops.clone(), Arc::new(DoubleMarkSelector));

        let reply = orchestrator.handle_turn("s1", "mark twice").await;
        assert_eq!(reply.text.matches("Attendance marked").count(), 1);

        // Exactly one row exists for today.
        let summary = ops
            .execute(
                OpName::AttendanceSummary,
                &json!({"employee_id": "507f1f77bcf86cd799439011"}),
            )
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
    async fn clarification_parks_the_operation_until_answered() {
        let orchestrator =
            Orchestrator::new(ops_with_jane().await, Arc::new(RuleSelector::new()));

        let reply = orchestrator.handle_turn("s1", "show attendance please").await;
        assert_eq!(reply.awaiting, Some("employee_id"));

        // Something that is not an id re-prompts without running anything.
        let retry = orchestrator.handle_turn("s1", "it's Jane").await;
        assert_eq!(retry.awaiting, Some("employee_id"));

        let answered = orchestrator
            .handle_turn("s1", "507f1f77bcf86cd799439011")
            .await;
        assert!(answered.awaiting.is_none());
        assert!(answered.text.contains("Attendance Summary"));
        assert!(answered.text.contains("Jane Doe"));
    }

    #[tokio::test]
    async fn linked_identity_powers_my_attendance() {
        let orchestrator =
            Orchestrator::new(ops_with_jane().await, Arc::new(RuleSelector::new()));

        let linked = orchestrator.link_profile("s1", "jane@corp.test").await;
        assert!(linked.text.contains("Jane Doe"));

        let reply = orchestrator.handle_turn("s1", "mark my attendance").await;
        assert!(reply.text.contains("Attendance marked for Jane Doe"));
    }

    /// Repository that fails every call.
    struct DownRepository;

    #[async_trait]
    impl Repository for DownRepository {
        async fn find_employee_by_email(
            &self,
            _email: &str,
        ) -> Result<Option<EmployeeRecord>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn find_employee_by_id(
            &self,
            _id: &EmployeeId,
        ) -> Result<Option<EmployeeRecord>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn list_employees_by_department(
            &self,
            _department: &str,
        ) -> Result<Vec<EmployeeRecord>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn list_attendance(
            &self,
            _employee_id: &EmployeeId,
            _range: DateRange,
        ) -> Result<Vec<crate::domain::AttendanceRecord>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn list_attendance_for_department(
            &self,
            _department: &str,
            _range: DateRange,
        ) -> Result<Vec<(EmployeeRecord, crate::domain::AttendanceRecord)>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn list_late_arrivals(
            &self,
            _range: DateRange,
            _department: Option<&str>,
        ) -> Result<Vec<(EmployeeRecord, crate::domain::AttendanceRecord)>, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn mark_attendance_once(
            &self,
            _record: &crate::domain::AttendanceRecord,
        ) -> Result<MarkOutcome, RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }

        async fn insert_employee(&self, _employee: &EmployeeRecord) -> Result<(), RepoError> {
            Err(RepoError::Unavailable(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn repository_outage_is_reported_once_per_turn() {
        let selector = Arc::new(RelentlessSelector {
            calls: AtomicUsize::new(0),
        });
        let ops = OpsExecutor::new(Arc::new(DownRepository));
        let orchestrator = Orchestrator::new(ops, selector.clone());

        let reply = orchestrator.handle_turn("s1", "who was late?").await;
        assert_eq!(reply.text.matches("unreachable").count(), 1);
        // The loop stopped after the first failing call.
        assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_turns_get_the_capability_hint() {
        let orchestrator = Orchestrator::new(
            ops_with_jane().await,
            Arc::new(RuleSelector::new()),
        )
        .with_max_steps(DEFAULT_MAX_STEPS);

        let reply = orchestrator.handle_turn("s1", "sing me a song").await;
        assert_eq!(reply.text, render::fallback_message());
    }

    #[test]
    fn pending_field_parsing_is_strict_per_field() {
        assert!(parse_field_value("employee_id", "it is 507f1f77bcf86cd799439011").is_some());
        assert!(parse_field_value("employee_id", "jane@corp.test").is_none());
        assert!(parse_field_value("punch_in", "at 08:15").is_some());
        assert!(parse_field_value("punch_in", "around nine").is_none());
        assert_eq!(
            parse_field_value("window_days", "30 days"),
            Some(json!(30u32))
        );
        assert_eq!(
            parse_field_value("department", "\"Engineering\""),
            Some(json!("Engineering"))
        );
        // The threshold check in ops still applies; zero never parses.
        assert!(parse_field_value("window_days", "0").is_none());
    }

    #[test]
    fn late_threshold_default_matches_config_default() {
        assert_eq!(
            default_late_threshold(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }
}
