//! Rule engine: validates a document and runs every rule against the store.
//!
//! Per run: `Idle → Validating → {Failed | Evaluating} → Dispatching → Done`.
//! Rules run one after another, in document order. Within a rule, matched
//! records are dispatched concurrently up to `dispatch_concurrency`, but
//! results are collected in record order by this single consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::RuleSetError;
use crate::pipeline::dispatcher::dispatch;
use crate::pipeline::evaluator::evaluate;
use crate::pipeline::report::{ExecutionReport, RuleReport, RuleStatus};
use crate::rules::{Rule, RuleSet, compile_rule, parse_document};
use crate::service::MailService;
use crate::store::MailStore;

/// Phase of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Failed,
    Evaluating,
    Dispatching,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Failed => "failed",
            Self::Evaluating => "evaluating",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
        }
    }
}

/// Shared cancellation flag. Raising it stops the engine before the next
/// rule starts; remote calls already issued are left to finish. The flag
/// applies to the current (or next) run and is cleared when that run ends.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RuleEngine {
    dispatch_concurrency: usize,
    cancel: CancelHandle,
}

impl RuleEngine {
    pub fn new(dispatch_concurrency: usize) -> Self {
        Self {
            dispatch_concurrency: dispatch_concurrency.max(1),
            cancel: CancelHandle::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.dispatch_concurrency)
    }

    /// Handle that can cancel runs of this engine from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Validate `document` and run it with `now` taken from the clock.
    pub async fn run(
        &self,
        document: &str,
        store: &dyn MailStore,
        service: &dyn MailService,
    ) -> Result<ExecutionReport, RuleSetError> {
        self.run_at(document, Utc::now(), store, service).await
    }

    /// Validate `document` and run it against a fixed reference time.
    ///
    /// Any validation error fails the whole run before the store or the
    /// service is touched.
    pub async fn run_at(
        &self,
        document: &str,
        now: DateTime<Utc>,
        store: &dyn MailStore,
        service: &dyn MailService,
    ) -> Result<ExecutionReport, RuleSetError> {
        let result = self.run_once(document, now, store, service).await;
        self.cancel.reset();
        result
    }

    async fn run_once(
        &self,
        document: &str,
        now: DateTime<Utc>,
        store: &dyn MailStore,
        service: &dyn MailService,
    ) -> Result<ExecutionReport, RuleSetError> {
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Validating);

        let rules = match parse_document(document) {
            Ok(rules) => rules,
            Err(e) => {
                transition(&mut state, RunState::Failed);
                warn!(errors = e.errors.len(), "Rule document rejected");
                for error in &e.errors {
                    warn!(path = %error.path, "{}", error.kind);
                }
                return Err(e);
            }
        };

        info!(rules = rules.len(), "Rule document accepted");
        Ok(self.execute(&rules, now, store, service, &mut state).await)
    }

    /// Run an already-validated rule set.
    async fn execute(
        &self,
        rules: &RuleSet,
        now: DateTime<Utc>,
        store: &dyn MailStore,
        service: &dyn MailService,
        state: &mut RunState,
    ) -> ExecutionReport {
        let mut report = ExecutionReport {
            evaluated_at: now,
            cancelled: false,
            rules: Vec::with_capacity(rules.len()),
        };

        for (index, rule) in rules.iter().enumerate() {
            let mut rule_report = RuleReport::new(index, rule.description.clone());

            if self.cancel.is_cancelled() {
                if !report.cancelled {
                    info!(rule = index, "Run cancelled, skipping remaining rules");
                }
                report.cancelled = true;
                rule_report.status = RuleStatus::Skipped;
                report.rules.push(rule_report);
                continue;
            }

            transition(state, RunState::Evaluating);
            self.run_rule(rule, now, store, service, state, &mut rule_report)
                .await;
            info!(
                rule = index,
                matched = rule_report.matched,
                failed_actions = rule_report.failed_actions(),
                status = ?rule_report.status,
                "Rule finished"
            );
            report.rules.push(rule_report);
        }

        transition(state, RunState::Done);
        info!(
            matched = report.total_matched(),
            failed_actions = report.total_failed_actions(),
            aborted_rules = report.aborted_rules(),
            cancelled = report.cancelled,
            "Run complete"
        );
        report
    }

    async fn run_rule(
        &self,
        rule: &Rule,
        now: DateTime<Utc>,
        store: &dyn MailStore,
        service: &dyn MailService,
        state: &mut RunState,
        rule_report: &mut RuleReport,
    ) {
        let index = rule_report.index;

        let filter = match compile_rule(rule, now) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(rule = index, error = %e, "Rule failed to compile");
                rule_report.status = RuleStatus::Aborted {
                    reason: e.to_string(),
                };
                return;
            }
        };

        let records = match evaluate(&filter, store).await {
            Ok(records) => records,
            Err(e) => {
                warn!(rule = index, error = %e, "Store query failed");
                rule_report.status = RuleStatus::Aborted {
                    reason: e.to_string(),
                };
                return;
            }
        };

        transition(state, RunState::Dispatching);
        let actions = rule.actions.as_slice();

        // Nothing after a stream error is dispatched.
        let mut results = records
            .scan(false, |failed, item| {
                let next = if *failed {
                    None
                } else {
                    *failed = item.is_err();
                    Some(item)
                };
                futures::future::ready(next)
            })
            .map(move |item| async move {
                match item {
                    Ok(record) => Ok(dispatch(&record, actions, service).await),
                    Err(e) => Err(e),
                }
            })
            .buffered(self.dispatch_concurrency);

        while let Some(item) = results.next().await {
            match item {
                Ok(action_results) => {
                    rule_report.matched += 1;
                    rule_report.actions.extend(action_results);
                }
                Err(e) => {
                    warn!(rule = index, error = %e, "Store stream failed mid-rule");
                    rule_report.status = RuleStatus::Aborted {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = state.as_str(), to = next.as_str(), "Run state");
    *state = next;
}
