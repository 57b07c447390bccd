//! Rule document validation.
//!
//! Walks the raw JSON document by hand instead of deriving `Deserialize`
//! so that every problem in every rule is reported in one pass, each with
//! the path of the offending value.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RuleSetError, ValidationError, ValidationErrorKind};
use crate::rules::model::{
    Action, Condition, Destination, Field, Operation, Predicate, Property, Rule, RuleSet,
    expected_names,
};

/// `<integer><unit>` for `date_received` values.
static RELATIVE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(days|months)$").unwrap());

/// Unit of a relative date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Days,
    /// Always 30 days, not a calendar month.
    Months,
}

/// Split `"3days"` into `("3", Days)`. `None` when the pattern does not match.
pub fn split_relative_date(value: &str) -> Option<(&str, DateUnit)> {
    let caps = RELATIVE_DATE.captures(value)?;
    let amount = caps.get(1)?.as_str();
    let unit = match caps.get(2)?.as_str() {
        "days" => DateUnit::Days,
        _ => DateUnit::Months,
    };
    Some((amount, unit))
}

/// Field/predicate compatibility and the relative date pattern for
/// `date_received`.
pub(crate) fn check_property(field: Field, predicate: Predicate, value: &str) -> Result<(), ValidationErrorKind> {
    let incompatible = match field {
        Field::Received => !predicate.is_relative_date(),
        Field::Sender | Field::Recipient | Field::Subject => predicate.is_relative_date(),
    };
    if incompatible {
        return Err(ValidationErrorKind::IncompatiblePredicate {
            field: field.as_str().to_string(),
            predicate: predicate.as_str().to_string(),
        });
    }
    if field == Field::Received && !RELATIVE_DATE.is_match(value) {
        return Err(ValidationErrorKind::InvalidDateValue {
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Parse and validate a rule document from JSON text.
pub fn parse_document(text: &str) -> Result<RuleSet, RuleSetError> {
    let document: Value = serde_json::from_str(text).map_err(|e| RuleSetError {
        errors: vec![ValidationError::new(
            "",
            ValidationErrorKind::Schema {
                message: format!("invalid JSON: {e}"),
            },
        )],
    })?;
    validate(&document)
}

/// Validate a rule document.
///
/// Either every rule is valid and the whole set is returned, or the
/// complete list of problems across all rules is.
pub fn validate(document: &Value) -> Result<RuleSet, RuleSetError> {
    let Some(entries) = document.as_array() else {
        return Err(RuleSetError {
            errors: vec![ValidationError::new(
                "",
                schema("rule document must be an array of rules"),
            )],
        });
    };

    let mut errors = Vec::new();
    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if let Some(rule) = validate_rule(entry, &format!("[{index}]"), &mut errors) {
            rules.push(rule);
        }
    }

    if errors.is_empty() {
        debug!(rules = rules.len(), "Rule document validated");
        Ok(RuleSet { rules })
    } else {
        debug!(errors = errors.len(), "Rule document rejected");
        Err(RuleSetError { errors })
    }
}

fn validate_rule(value: &Value, path: &str, errors: &mut Vec<ValidationError>) -> Option<Rule> {
    let obj = object(value, path, errors)?;

    let description = match obj.get("description") {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            errors.push(ValidationError::new(
                format!("{path}.description"),
                schema("expected a string"),
            ));
            None
        }
    };
    let condition = enum_at(obj, "conditions", path, errors, Condition::parse, || {
        expected_names(Condition::ALL.map(|c| c.as_str()))
    });
    let properties = list_at(obj, "properties", path, errors, validate_property);
    let actions = list_at(obj, "actions", path, errors, validate_action);

    Some(Rule {
        description: description?,
        condition: condition?,
        properties: properties?,
        actions: actions?,
    })
}

fn validate_property(
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<Property> {
    let obj = object(value, path, errors)?;
    let field = enum_at(obj, "field", path, errors, Field::parse, || {
        expected_names(Field::ALL.map(|f| f.as_str()))
    });
    let predicate = enum_at(obj, "predicate", path, errors, Predicate::parse, || {
        expected_names(Predicate::ALL.map(|p| p.as_str()))
    });
    let value = string_at(obj, "value", path, errors);

    let (field, predicate, value) = (field?, predicate?, value?);
    match Property::new(field, predicate, value) {
        Ok(property) => Some(property),
        Err(kind) => {
            let at = match kind {
                ValidationErrorKind::InvalidDateValue { .. } => "value",
                _ => "predicate",
            };
            errors.push(ValidationError::new(format!("{path}.{at}"), kind));
            None
        }
    }
}

fn validate_action(value: &Value, path: &str, errors: &mut Vec<ValidationError>) -> Option<Action> {
    let obj = object(value, path, errors)?;
    let operation = enum_at(obj, "operation", path, errors, Operation::parse, || {
        expected_names(Operation::ALL.map(|o| o.as_str()))
    });

    let destination = match obj.get("destination") {
        None | Some(Value::Null) => Some(None),
        Some(_) => enum_at(obj, "destination", path, errors, Destination::parse, || {
            expected_names(Destination::ALL.map(|d| d.as_str()))
        })
        .map(Some),
    };

    match (operation?, destination?) {
        (Operation::Move, None) => {
            errors.push(ValidationError::new(
                path,
                ValidationErrorKind::MissingDestination,
            ));
            None
        }
        (operation, destination) => Some(Action {
            operation,
            destination: destination.unwrap_or_default(),
        }),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn schema(message: &str) -> ValidationErrorKind {
    ValidationErrorKind::Schema {
        message: message.to_string(),
    }
}

fn object<'a>(
    value: &'a Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a Map<String, Value>> {
    match value.as_object() {
        Some(obj) => Some(obj),
        None => {
            errors.push(ValidationError::new(path, schema("expected an object")));
            None
        }
    }
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a Value> {
    match obj.get(key) {
        Some(value) => Some(value),
        None => {
            errors.push(ValidationError::new(
                format!("{path}.{key}"),
                schema("missing required key"),
            ));
            None
        }
    }
}

fn string_at<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a str> {
    match required(obj, key, path, errors)?.as_str() {
        Some(s) => Some(s),
        None => {
            errors.push(ValidationError::new(
                format!("{path}.{key}"),
                schema("expected a string"),
            ));
            None
        }
    }
}

fn enum_at<T>(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
    parse: fn(&str) -> Option<T>,
    expected: impl FnOnce() -> String,
) -> Option<T> {
    let raw = string_at(obj, key, path, errors)?;
    match parse(raw) {
        Some(value) => Some(value),
        None => {
            errors.push(ValidationError::new(
                format!("{path}.{key}"),
                ValidationErrorKind::UnknownVariant {
                    value: raw.to_string(),
                    expected: expected(),
                },
            ));
            None
        }
    }
}

/// Validate a required non-empty array, collecting errors from every item.
fn list_at<T>(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Vec<ValidationError>,
    item: fn(&Value, &str, &mut Vec<ValidationError>) -> Option<T>,
) -> Option<Vec<T>> {
    let list_path = format!("{path}.{key}");
    let Some(items) = required(obj, key, path, errors)?.as_array() else {
        errors.push(ValidationError::new(list_path, schema("expected an array")));
        return None;
    };
    if items.is_empty() {
        errors.push(ValidationError::new(
            list_path,
            ValidationErrorKind::Empty {
                what: key.to_string(),
            },
        ));
        return None;
    }

    let before = errors.len();
    let parsed: Vec<T> = items
        .iter()
        .enumerate()
        .filter_map(|(i, value)| item(value, &format!("{list_path}[{i}]"), errors))
        .collect();
    (errors.len() == before).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(field: &str, predicate: &str, value: &str) -> Value {
        json!({"field": field, "predicate": predicate, "value": value})
    }

    fn rule_with(properties: Vec<Value>, actions: Vec<Value>) -> Value {
        json!([{
            "description": "Rule 1",
            "conditions": "all",
            "properties": properties,
            "actions": actions,
        }])
    }

    fn kinds(err: &RuleSetError) -> Vec<&ValidationErrorKind> {
        err.errors.iter().map(|e| &e.kind).collect()
    }

    #[test]
    fn subject_accepts_contains_and_rejects_less_than() {
        assert!(Property::new(Field::Subject, Predicate::Contains, "test email").is_ok());
        let err = Property::new(Field::Subject, Predicate::LessThan, "test email").unwrap_err();
        assert!(matches!(err, ValidationErrorKind::IncompatiblePredicate { .. }));
    }

    #[test]
    fn received_accepts_less_than_and_rejects_contains() {
        assert!(Property::new(Field::Received, Predicate::LessThan, "10days").is_ok());
        let err = Property::new(Field::Received, Predicate::Contains, "1day").unwrap_err();
        assert_eq!(
            err,
            ValidationErrorKind::IncompatiblePredicate {
                field: "date_received".into(),
                predicate: "contains".into(),
            }
        );
    }

    #[test]
    fn received_value_must_match_pattern() {
        assert!(Property::new(Field::Received, Predicate::LessThan, "1days").is_ok());
        assert!(Property::new(Field::Received, Predicate::GreaterThan, "12months").is_ok());
        for bad in ["1aaa", "1day", "days", "-1days", "1 days", "1.5days", "1Days", ""] {
            let err = Property::new(Field::Received, Predicate::LessThan, bad).unwrap_err();
            assert!(
                matches!(err, ValidationErrorKind::InvalidDateValue { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn compatibility_table_is_exhaustive() {
        for field in Field::ALL {
            for predicate in Predicate::ALL {
                let value = if field == Field::Received { "3days" } else { "x" };
                let ok = Property::new(field, predicate, value).is_ok();
                let expected = (field == Field::Received) == predicate.is_relative_date();
                assert_eq!(ok, expected, "{field:?} / {predicate:?}");
            }
        }
    }

    #[test]
    fn actions_parse_with_and_without_destination() {
        let doc = rule_with(
            vec![property("from", "contains", "a")],
            vec![
                json!({"operation": "read"}),
                json!({"operation": "unread"}),
                json!({"operation": "move", "destination": "inbox"}),
                json!({"operation": "move", "destination": "bin"}),
            ],
        );
        let set = validate(&doc).unwrap();
        assert_eq!(
            set.rules[0].actions,
            vec![
                Action::mark_read(),
                Action::mark_unread(),
                Action::move_to(Destination::Inbox),
                Action::move_to(Destination::Trash),
            ]
        );
    }

    #[test]
    fn move_requires_destination() {
        let doc = rule_with(
            vec![property("from", "contains", "a")],
            vec![json!({"operation": "move"})],
        );
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].path, "[0].actions[0]");
        assert_eq!(err.errors[0].kind, ValidationErrorKind::MissingDestination);
    }

    #[test]
    fn bad_operation_and_destination_are_both_reported() {
        let doc = rule_with(
            vec![property("from", "contains", "a")],
            vec![json!({"operation": "mvoe", "destination": "archive"})],
        );
        let err = validate(&doc).unwrap_err();
        let paths: Vec<&str> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["[0].actions[0].operation", "[0].actions[0].destination"]
        );
        assert!(err.errors.iter().all(|e| matches!(
            e.kind,
            ValidationErrorKind::UnknownVariant { .. }
        )));
    }

    #[test]
    fn description_is_optional() {
        let doc = json!([{
            "conditions": "any",
            "properties": [property("subject", "not_equals", "hello")],
            "actions": [{"operation": "read"}],
        }]);
        let set = validate(&doc).unwrap();
        assert_eq!(set.rules[0].description, None);
        assert_eq!(set.rules[0].condition, Condition::Any);
    }

    #[test]
    fn bad_enum_value_is_reported_with_path() {
        let doc = rule_with(
            vec![property("from", "startswith", "a")],
            vec![json!({"operation": "read"})],
        );
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].path, "[0].properties[0].predicate");
        match &err.errors[0].kind {
            ValidationErrorKind::UnknownVariant { value, expected } => {
                assert_eq!(value, "startswith");
                assert!(expected.contains("grater_than"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn collects_errors_across_sibling_rules() {
        let doc = json!([
            {
                "conditions": "sometimes",
                "properties": [property("subject", "less_than", "x")],
                "actions": [{"operation": "read"}],
            },
            {
                "conditions": "all",
                "properties": [property("date_received", "less_than", "3weeks")],
                "actions": [],
            },
            {
                "conditions": "all",
                "properties": [property("from", "contains", "ok@example.com")],
                "actions": [{"operation": "read"}],
            },
        ]);
        let err = validate(&doc).unwrap_err();
        let paths: Vec<&str> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "[0].conditions",
                "[0].properties[0].predicate",
                "[1].properties[0].value",
                "[1].actions",
            ]
        );
        assert!(matches!(kinds(&err)[3], ValidationErrorKind::Empty { .. }));
    }

    #[test]
    fn missing_keys_and_wrong_types_are_schema_errors() {
        let doc = json!([{"properties": "nope", "actions": [{"operation": 3}]}]);
        let err = validate(&doc).unwrap_err();
        let paths: Vec<&str> = err.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["[0].conditions", "[0].properties", "[0].actions[0].operation"]
        );
        assert!(
            kinds(&err)
                .iter()
                .all(|k| matches!(k, ValidationErrorKind::Schema { .. }))
        );
    }

    #[test]
    fn non_array_document_is_rejected() {
        let err = validate(&json!({"rules": []})).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].path, "");
    }

    #[test]
    fn empty_document_is_an_empty_rule_set() {
        let set = validate(&json!([])).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn parse_document_reports_invalid_json() {
        let err = parse_document("[{").unwrap_err();
        assert!(matches!(
            err.errors[0].kind,
            ValidationErrorKind::Schema { .. }
        ));
    }

    #[test]
    fn split_relative_date_units() {
        assert_eq!(split_relative_date("3days"), Some(("3", DateUnit::Days)));
        assert_eq!(split_relative_date("2months"), Some(("2", DateUnit::Months)));
        assert_eq!(split_relative_date("2weeks"), None);
    }
}
