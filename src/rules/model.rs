//! Validated rule types.
//!
//! Everything here is built by [`crate::rules::validator`] and is immutable
//! afterwards. The wire names (including the historical `grater_than`
//! spelling) live next to each variant in `as_str`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrorKind;
use crate::rules::validator::check_property;

// ── Email record ────────────────────────────────────────────────────

/// Snapshot of one mailbox message as held by the mail store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Provider message id, unique and stable.
    pub message_id: String,
    /// Raw `From` header.
    pub sender: String,
    /// Raw `To` header.
    pub recipient: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
}

// ── Closed vocabularies ─────────────────────────────────────────────

/// Which part of an [`EmailRecord`] a property matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "from")]
    Sender,
    #[serde(rename = "to")]
    Recipient,
    #[serde(rename = "subject")]
    Subject,
    #[serde(rename = "date_received")]
    Received,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Sender, Field::Recipient, Field::Subject, Field::Received];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "from",
            Self::Recipient => "to",
            Self::Subject => "subject",
            Self::Received => "date_received",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// Comparison applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_equals")]
    NotEquals,
    #[serde(rename = "less_than")]
    LessThan,
    #[serde(rename = "grater_than")]
    GreaterThan,
}

impl Predicate {
    pub const ALL: [Predicate; 4] = [
        Predicate::Contains,
        Predicate::NotEquals,
        Predicate::LessThan,
        Predicate::GreaterThan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotEquals => "not_equals",
            Self::LessThan => "less_than",
            Self::GreaterThan => "grater_than",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Date predicates describe elapsed time and only apply to `date_received`.
    pub fn is_relative_date(&self) -> bool {
        matches!(self, Self::LessThan | Self::GreaterThan)
    }
}

/// How a rule's properties combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    All,
    Any,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::All, Condition::Any];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Remote operation applied to a matched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "read")]
    MarkRead,
    #[serde(rename = "unread")]
    MarkUnread,
    #[serde(rename = "move")]
    Move,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::MarkRead, Operation::MarkUnread, Operation::Move];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkRead => "read",
            Self::MarkUnread => "unread",
            Self::Move => "move",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == s)
    }
}

/// Target mailbox for a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    #[default]
    #[serde(rename = "inbox")]
    Inbox,
    #[serde(rename = "bin")]
    Trash,
}

impl Destination {
    pub const ALL: [Destination; 2] = [Destination::Inbox, Destination::Trash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Trash => "bin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

/// Comma-separated wire names, for "expected one of" messages.
pub fn expected_names(names: impl IntoIterator<Item = &'static str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

// ── Rule structure ──────────────────────────────────────────────────

/// One atomic `(field, predicate, value)` condition. Only constructible
/// through [`Property::new`], so every instance is valid.
///
/// ```compile_fail
/// use inbox_rules::rules::{Field, Predicate, Property};
///
/// let unchecked = Property {
///     field: Field::Subject,
///     predicate: Predicate::LessThan,
///     value: "3days".to_string(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    field: Field,
    predicate: Predicate,
    value: String,
}

impl Property {
    /// Build a property, enforcing field/predicate compatibility and the
    /// relative date pattern for `date_received`.
    pub fn new(
        field: Field,
        predicate: Predicate,
        value: impl Into<String>,
    ) -> Result<Self, ValidationErrorKind> {
        let value = value.into();
        check_property(field, predicate, &value)?;
        Ok(Self {
            field,
            predicate,
            value,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One action to run on each matched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Action {
    pub operation: Operation,
    /// Only meaningful for [`Operation::Move`].
    pub destination: Destination,
}

impl Action {
    pub fn mark_read() -> Self {
        Self {
            operation: Operation::MarkRead,
            destination: Destination::default(),
        }
    }

    pub fn mark_unread() -> Self {
        Self {
            operation: Operation::MarkUnread,
            destination: Destination::default(),
        }
    }

    pub fn move_to(destination: Destination) -> Self {
        Self {
            operation: Operation::Move,
            destination,
        }
    }

    /// Short label for logs and reports, e.g. `move:bin`.
    pub fn label(&self) -> String {
        match self.operation {
            Operation::Move => format!("move:{}", self.destination.as_str()),
            op => op.as_str().to_string(),
        }
    }
}

/// A validated rule. `properties` and `actions` are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub description: Option<String>,
    pub condition: Condition,
    pub properties: Vec<Property>,
    pub actions: Vec<Action>,
}

/// Validated rules in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}
