// ABOUTME: Severity, change type and priority assignment for raw diff entries
// ABOUTME: Also filters entries that fall under a job's ignored path prefixes

//! Priorities rank QA risk, highest first:
//!
//! | change                                   | type       | priority |
//! |------------------------------------------|------------|----------|
//! | field deleted                            | structural | 10       |
//! | field added                              | structural | 8        |
//! | array element removed / added            | structural | 7 / 6    |
//! | array element edit, object <-> scalar    | structural | 5        |
//! | scalar edit, JSON type changed           | either     | 4        |
//! | same-type edit (array element or scalar) | value      | 2        |
//! | numeric scalar edit                      | value      | 1        |
//!
//! Everything is `Error` except numeric-to-numeric edits, which are `Warning`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diff::{ArrayItemChange, DiffKind, PathSegment, RawDiff};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Structural,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    #[serde(rename = "changeType")]
    pub change_type: ChangeType,
    pub priority: u8,
}

/// A diff entry that has been classified. Only [`classify`] can build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    #[serde(flatten)]
    raw: RawDiff,
    #[serde(flatten)]
    classification: Classification,
}

impl DiffEntry {
    pub fn kind(&self) -> DiffKind {
        self.raw.kind
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.raw.path
    }

    pub fn old_value(&self) -> Option<&Value> {
        self.raw.old.as_ref()
    }

    pub fn new_value(&self) -> Option<&Value> {
        self.raw.new.as_ref()
    }

    pub fn severity(&self) -> Severity {
        self.classification.severity
    }

    pub fn change_type(&self) -> ChangeType {
        self.classification.change_type
    }

    pub fn priority(&self) -> u8 {
        self.classification.priority
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }
}

pub fn classify(raw: RawDiff) -> DiffEntry {
    let classification = classification_of(&raw);
    DiffEntry {
        raw,
        classification,
    }
}

pub fn classification_of(raw: &RawDiff) -> Classification {
    use ChangeType::{Structural, Value as ValueChange};
    use Severity::{Error, Warning};

    let (severity, change_type, priority) = match raw.kind {
        DiffKind::Delete => (Error, Structural, 10),
        DiffKind::New => (Error, Structural, 8),
        DiffKind::ArrayChange(ArrayItemChange::Removed) => (Error, Structural, 7),
        DiffKind::ArrayChange(ArrayItemChange::Added) => (Error, Structural, 6),
        DiffKind::Edit => {
            let old = raw.old.as_ref().unwrap_or(&NULL);
            let new = raw.new.as_ref().unwrap_or(&NULL);
            let numeric = old.is_number() && new.is_number();
            let shape_changed = is_container(old) != is_container(new);

            if raw.touches_array() {
                let severity = if numeric { Warning } else { Error };
                if shape_changed {
                    (severity, Structural, 5)
                } else {
                    (severity, ValueChange, 2)
                }
            } else if numeric {
                (Warning, ValueChange, 1)
            } else if json_type(old) != json_type(new) {
                (Error, if shape_changed { Structural } else { ValueChange }, 4)
            } else {
                (Error, ValueChange, 2)
            }
        }
    };

    Classification {
        severity,
        change_type,
        priority,
    }
}

/// Objects and arrays; `null` counts as a scalar.
fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Drops entries whose dot-joined path starts with any ignore prefix.
/// Root-level entries and blank prefixes never match.
pub fn filter_ignored(diffs: Vec<RawDiff>, ignore_paths: &[String]) -> Vec<RawDiff> {
    let prefixes: Vec<&str> = ignore_paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if prefixes.is_empty() {
        return diffs;
    }

    diffs
        .into_iter()
        .filter(|d| {
            if d.path.is_empty() {
                return true;
            }
            let dotted = d.dot_path();
            !prefixes.iter().any(|p| dotted.starts_with(p))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::diff::structural_diff;
    use serde_json::json;

    fn raw(kind: DiffKind, path: &[&str], old: Option<Value>, new: Option<Value>) -> RawDiff {
        RawDiff {
            kind,
            path: path
                .iter()
                .map(|p| match p.parse::<usize>() {
                    Ok(i) => PathSegment::Index(i),
                    Err(_) => PathSegment::Key(p.to_string()),
                })
                .collect(),
            old,
            new,
        }
    }

    fn edit(path: &[&str], old: Value, new: Value) -> Classification {
        classification_of(&raw(DiffKind::Edit, path, Some(old), Some(new)))
    }

    fn class(severity: Severity, change_type: ChangeType, priority: u8) -> Classification {
        Classification {
            severity,
            change_type,
            priority,
        }
    }

    #[test]
    fn test_delete_and_new() {
        assert_eq!(
            classification_of(&raw(DiffKind::Delete, &["ad"], Some(json!({"id": 1})), None)),
            class(Severity::Error, ChangeType::Structural, 10)
        );
        assert_eq!(
            classification_of(&raw(DiffKind::New, &["ad"], None, Some(json!(1)))),
            class(Severity::Error, ChangeType::Structural, 8)
        );
    }

    #[test]
    fn test_array_membership() {
        let removed = raw(
            DiffKind::ArrayChange(ArrayItemChange::Removed),
            &["xs", "3"],
            Some(json!(1)),
            None,
        );
        let added = raw(
            DiffKind::ArrayChange(ArrayItemChange::Added),
            &["xs", "3"],
            None,
            Some(json!(1)),
        );
        assert_eq!(
            classification_of(&removed),
            class(Severity::Error, ChangeType::Structural, 7)
        );
        assert_eq!(
            classification_of(&added),
            class(Severity::Error, ChangeType::Structural, 6)
        );
    }

    #[test]
    fn test_array_element_edits() {
        assert_eq!(
            edit(&["xs", "0"], json!({"a": 1}), json!("a")),
            class(Severity::Error, ChangeType::Structural, 5)
        );
        assert_eq!(
            edit(&["xs", "0", "name"], json!("a"), json!("b")),
            class(Severity::Error, ChangeType::Value, 2)
        );
        assert_eq!(
            edit(&["xs", "0"], json!(1), json!(2)),
            class(Severity::Warning, ChangeType::Value, 2)
        );
    }

    #[test]
    fn test_scalar_edits() {
        assert_eq!(
            edit(&["runs"], json!(100), json!(105)),
            class(Severity::Warning, ChangeType::Value, 1)
        );
        assert_eq!(
            edit(&["runs"], json!("100"), json!(100)),
            class(Severity::Error, ChangeType::Value, 4)
        );
        assert_eq!(
            edit(&["team"], json!({"id": 1}), json!(null)),
            class(Severity::Error, ChangeType::Structural, 4)
        );
        assert_eq!(
            edit(&["name"], json!("a"), json!("b")),
            class(Severity::Error, ChangeType::Value, 2)
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let input = raw(DiffKind::Edit, &["a", "b"], Some(json!(true)), Some(json!("x")));
        let first = classify(input.clone());
        let second = classify(input);
        assert_eq!(first.classification(), second.classification());
    }

    #[test]
    fn test_priority_ordering() {
        let delete = classification_of(&raw(DiffKind::Delete, &["a"], Some(json!(1)), None));
        let added = classification_of(&raw(DiffKind::New, &["a"], None, Some(json!(1))));
        let type_change = edit(&["a"], json!("1"), json!(1));
        let value_edit = edit(&["a"], json!("x"), json!("y"));
        let numeric_edit = edit(&["a"], json!(1), json!(2));

        assert!(delete.priority > added.priority);
        assert!(added.priority > type_change.priority);
        assert!(type_change.priority > value_edit.priority);
        assert!(value_edit.priority > numeric_edit.priority);
        for c in [delete, added, type_change, value_edit, numeric_edit] {
            assert!((1..=10).contains(&c.priority));
        }
    }

    #[test]
    fn test_filter_ignored_prefixes() {
        let diffs = || vec![raw(DiffKind::Edit, &["a", "b"], Some(json!(1)), Some(json!(2)))];

        assert!(filter_ignored(diffs(), &["a.b".into()]).is_empty());
        assert!(filter_ignored(diffs(), &["a".into()]).is_empty());
        assert_eq!(filter_ignored(diffs(), &["a.c".into()]).len(), 1);
        assert_eq!(filter_ignored(diffs(), &[]).len(), 1);
        assert_eq!(filter_ignored(diffs(), &["  ".into()]).len(), 1);
    }

    #[test]
    fn test_filter_keeps_root_entries() {
        let diffs = structural_diff(&json!(1), &json!("1"));
        assert_eq!(filter_ignored(diffs, &["a".into()]).len(), 1);
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = classify(raw(DiffKind::Edit, &["runs"], Some(json!(1)), Some(json!(2))));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["severity"], "Warning");
        assert_eq!(value["changeType"], "value");
        assert_eq!(value["priority"], 1);
        assert_eq!(value["path"], json!(["runs"]));
        assert_eq!(value["kind"], "Edit");
    }
}
