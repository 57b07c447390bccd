//! Rule definitions, validation and compilation.
//!
//! A rule document flows through:
//! 1. `validator::validate()` checks shape, vocabularies and field/predicate compatibility
//! 2. `compiler::compile_rule()` turns properties into one `RuleFilter` for a fixed `now`
//!
//! Evaluation and dispatch live in [`crate::pipeline`].

pub mod compiler;
pub mod model;
pub mod validator;

pub use compiler::{CompiledPredicate, Comparison, RuleFilter, compile, compile_rule, fold};
pub use model::{
    Action, Condition, Destination, EmailRecord, Field, Operation, Predicate, Property, Rule,
    RuleSet,
};
pub use validator::{parse_document, validate};
