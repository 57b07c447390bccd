//! Rule execution pipeline.
//!
//! Each run of a rule document flows through:
//! 1. `validate()` (in [`crate::rules`]) rejects the whole document on any error
//! 2. per rule, in order: `compile_rule()` → `evaluate()` → `dispatch()`
//! 3. results are collected into an [`ExecutionReport`]
//!
//! Later rules see the same stored snapshot as earlier ones; remote changes
//! made by one rule are not reflected back into the store.

pub mod dispatcher;
pub mod engine;
pub mod evaluator;
pub mod report;

pub use dispatcher::dispatch;
pub use engine::{CancelHandle, RuleEngine, RunState};
pub use evaluator::evaluate;
pub use report::{ActionOutcome, ActionResult, ExecutionReport, RuleReport, RuleStatus};
