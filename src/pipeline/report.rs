//! Execution report returned by a completed run.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ── Per-action ──────────────────────────────────────────────────────

/// Result of one action on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Failed { reason: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub message_id: String,
    /// Action label, e.g. `read` or `move:bin`.
    pub action: String,
    pub outcome: ActionOutcome,
}

// ── Per-rule ────────────────────────────────────────────────────────

/// How far a rule got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RuleStatus {
    /// Evaluated and dispatched. Individual actions may still have failed.
    Completed,
    /// Compilation or the store query failed; actions already issued for
    /// earlier records stay in `actions`.
    Aborted { reason: String },
    /// Not started because the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    /// Position of the rule in the document.
    pub index: usize,
    pub description: Option<String>,
    pub status: RuleStatus,
    /// Records the rule matched.
    pub matched: usize,
    pub actions: Vec<ActionResult>,
}

impl RuleReport {
    pub(crate) fn new(index: usize, description: Option<String>) -> Self {
        Self {
            index,
            description,
            status: RuleStatus::Completed,
            matched: 0,
            actions: Vec::new(),
        }
    }

    pub fn failed_actions(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_failure()).count()
    }
}

// ── Per-run ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Reference time every relative date in this run was computed from.
    pub evaluated_at: DateTime<Utc>,
    pub cancelled: bool,
    pub rules: Vec<RuleReport>,
}

impl ExecutionReport {
    pub fn total_matched(&self) -> usize {
        self.rules.iter().map(|r| r.matched).sum()
    }

    pub fn total_failed_actions(&self) -> usize {
        self.rules.iter().map(RuleReport::failed_actions).sum()
    }

    pub fn aborted_rules(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.status, RuleStatus::Aborted { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_tagged_outcomes() {
        let report = RuleReport {
            index: 0,
            description: Some("bin newsletters".into()),
            status: RuleStatus::Aborted {
                reason: "query failed".into(),
            },
            matched: 1,
            actions: vec![ActionResult {
                message_id: "m1".into(),
                action: "move:bin".into(),
                outcome: ActionOutcome::Failed {
                    reason: "message not found: m1".into(),
                },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["state"], "aborted");
        assert_eq!(json["status"]["reason"], "query failed");
        assert_eq!(json["actions"][0]["outcome"]["status"], "failed");
        assert_eq!(report.failed_actions(), 1);
    }

    #[test]
    fn totals_sum_over_rules() {
        let mut first = RuleReport::new(0, None);
        first.matched = 2;
        first.actions.push(ActionResult {
            message_id: "a".into(),
            action: "read".into(),
            outcome: ActionOutcome::Applied,
        });
        let mut second = RuleReport::new(1, None);
        second.matched = 3;
        second.status = RuleStatus::Aborted {
            reason: "x".into(),
        };

        let report = ExecutionReport {
            evaluated_at: Utc::now(),
            cancelled: false,
            rules: vec![first, second],
        };
        assert_eq!(report.total_matched(), 5);
        assert_eq!(report.total_failed_actions(), 0);
        assert_eq!(report.aborted_rules(), 1);
    }
}
