//! Action dispatch for a single matched record.

use tracing::{debug, warn};

use crate::pipeline::report::{ActionOutcome, ActionResult};
use crate::rules::{Action, EmailRecord, Operation};
use crate::service::MailService;

/// Run `actions` on one record, in declared order.
///
/// Every action is attempted; a failure is recorded and the next action
/// still runs. Nothing is rolled back.
pub async fn dispatch(
    record: &EmailRecord,
    actions: &[Action],
    service: &dyn MailService,
) -> Vec<ActionResult> {
    let mut results = Vec::with_capacity(actions.len());

    for action in actions {
        let label = action.label();
        let outcome = match apply(record, action, service).await {
            Ok(()) => {
                debug!(message_id = %record.message_id, action = %label, "Action applied");
                ActionOutcome::Applied
            }
            Err(e) => {
                warn!(
                    message_id = %record.message_id,
                    action = %label,
                    error = %e,
                    "Action failed"
                );
                ActionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        results.push(ActionResult {
            message_id: record.message_id.clone(),
            action: label,
            outcome,
        });
    }

    results
}

async fn apply(
    record: &EmailRecord,
    action: &Action,
    service: &dyn MailService,
) -> Result<(), crate::error::ServiceError> {
    match action.operation {
        Operation::MarkRead => service.set_read(&record.message_id, true).await,
        Operation::MarkUnread => service.set_read(&record.message_id, false).await,
        Operation::Move => service.move_to(&record.message_id, action.destination).await,
    }
}
