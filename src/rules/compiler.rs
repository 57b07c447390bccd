//! Turns validated properties into predicates over [`EmailRecord`]s.
//!
//! Relative dates are resolved against a `now` supplied by the caller, so
//! every property compiled in one run shares the same cutoff origin.
//! A month is always 30 days; calendar months are deliberately not used.

use chrono::{DateTime, Duration, Utc};

use crate::error::CompileError;
use crate::rules::model::{Condition, EmailRecord, Field, Predicate, Property, Rule};
use crate::rules::validator::{DateUnit, split_relative_date};

const DAYS_PER_MONTH: i64 = 30;

type TextAccessor = fn(&EmailRecord) -> &str;

fn sender(record: &EmailRecord) -> &str {
    &record.sender
}

fn recipient(record: &EmailRecord) -> &str {
    &record.recipient
}

fn subject(record: &EmailRecord) -> &str {
    &record.subject
}

/// Static field → accessor mapping. `None` for the timestamp field.
fn text_accessor(field: Field) -> Option<TextAccessor> {
    match field {
        Field::Sender => Some(sender),
        Field::Recipient => Some(recipient),
        Field::Subject => Some(subject),
        Field::Received => None,
    }
}

/// Case folding shared by compiled predicates and stores that pre-fold
/// text columns, so both sides of a comparison always agree.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// The comparison half of a compiled property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Case-insensitive substring. The needle is stored lowercased.
    Contains(String),
    /// Case-insensitive inequality of the whole value. Stored lowercased.
    NotEquals(String),
    /// `received_at` strictly after the cutoff ("less than N ago").
    ReceivedAfter(DateTime<Utc>),
    /// `received_at` strictly before the cutoff ("more than N ago").
    ReceivedBefore(DateTime<Utc>),
}

/// One property, resolved and ready to test records or be pushed down to a store.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    pub field: Field,
    pub comparison: Comparison,
    accessor: Option<TextAccessor>,
}

impl CompiledPredicate {
    pub fn matches(&self, record: &EmailRecord) -> bool {
        match (&self.comparison, self.accessor) {
            (Comparison::Contains(needle), Some(get)) => {
                fold(get(record)).contains(needle.as_str())
            }
            (Comparison::NotEquals(other), Some(get)) => fold(get(record)) != *other,
            (Comparison::ReceivedAfter(cutoff), _) => record.received_at > *cutoff,
            (Comparison::ReceivedBefore(cutoff), _) => record.received_at < *cutoff,
            // compile() never pairs a text comparison with the timestamp field
            (Comparison::Contains(_) | Comparison::NotEquals(_), None) => false,
        }
    }
}

/// A rule's compiled properties combined by its condition.
#[derive(Debug, Clone)]
pub struct RuleFilter {
    pub condition: Condition,
    pub predicates: Vec<CompiledPredicate>,
}

impl RuleFilter {
    pub fn matches(&self, record: &EmailRecord) -> bool {
        match self.condition {
            Condition::All => self.predicates.iter().all(|p| p.matches(record)),
            Condition::Any => self.predicates.iter().any(|p| p.matches(record)),
        }
    }
}

/// Compile one property against `now`.
pub fn compile(property: &Property, now: DateTime<Utc>) -> Result<CompiledPredicate, CompileError> {
    let field = property.field();
    let accessor = text_accessor(field);
    let comparison = match (property.predicate(), accessor) {
        (Predicate::Contains, Some(_)) => Comparison::Contains(fold(property.value())),
        (Predicate::NotEquals, Some(_)) => Comparison::NotEquals(fold(property.value())),
        (Predicate::LessThan, None) => Comparison::ReceivedAfter(cutoff(property.value(), now)?),
        (Predicate::GreaterThan, None) => {
            Comparison::ReceivedBefore(cutoff(property.value(), now)?)
        }
        (predicate, _) => {
            return Err(CompileError::UnsupportedCombination {
                field: field.as_str().to_string(),
                predicate: predicate.as_str().to_string(),
            });
        }
    };

    Ok(CompiledPredicate {
        field,
        comparison,
        accessor,
    })
}

/// Compile every property of a rule into one filter.
pub fn compile_rule(rule: &Rule, now: DateTime<Utc>) -> Result<RuleFilter, CompileError> {
    let predicates = rule
        .properties
        .iter()
        .map(|p| compile(p, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleFilter {
        condition: rule.condition,
        predicates,
    })
}

/// `now - duration` where duration is parsed from `"<n>days"` / `"<n>months"`.
fn cutoff(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, CompileError> {
    let (amount, unit) = split_relative_date(value).ok_or_else(|| CompileError::MalformedDate {
        value: value.to_string(),
    })?;
    let out_of_range = || CompileError::DateOutOfRange {
        value: value.to_string(),
    };

    let amount: i64 = amount.parse().map_err(|_| out_of_range())?;
    let days = match unit {
        DateUnit::Days => Some(amount),
        DateUnit::Months => amount.checked_mul(DAYS_PER_MONTH),
    }
    .ok_or_else(out_of_range)?;

    let duration = Duration::try_days(days).ok_or_else(out_of_range)?;
    now.checked_sub_signed(duration).ok_or_else(out_of_range)
}
