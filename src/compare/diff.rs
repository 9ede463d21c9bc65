// ABOUTME: Raw structural diff between two JSON documents
// ABOUTME: Emits one entry per added, removed or changed leaf, array growth or shrinkage

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayItemChange {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Edit,
    New,
    Delete,
    ArrayChange(ArrayItemChange),
}

/// One unclassified difference. `old` is side A's value, `new` is side B's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDiff {
    pub kind: DiffKind,
    pub path: Vec<PathSegment>,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl RawDiff {
    pub fn dot_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn touches_array(&self) -> bool {
        self.path.iter().any(|s| matches!(s, PathSegment::Index(_)))
    }
}

/// Walks both documents in parallel. Object keys are visited in sorted order,
/// array elements pairwise up to the shorter length.
pub fn structural_diff(lhs: &Value, rhs: &Value) -> Vec<RawDiff> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(&mut path, lhs, rhs, &mut out);
    out
}

fn walk(path: &mut Vec<PathSegment>, lhs: &Value, rhs: &Value, out: &mut Vec<RawDiff>) {
    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, lv) in left {
                path.push(PathSegment::Key(key.clone()));
                match right.get(key) {
                    Some(rv) => walk(path, lv, rv, out),
                    None => out.push(entry(DiffKind::Delete, path, Some(lv), None)),
                }
                path.pop();
            }
            for (key, rv) in right {
                if !left.contains_key(key) {
                    path.push(PathSegment::Key(key.clone()));
                    out.push(entry(DiffKind::New, path, None, Some(rv)));
                    path.pop();
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let shared = left.len().min(right.len());
            for i in 0..shared {
                path.push(PathSegment::Index(i));
                walk(path, &left[i], &right[i], out);
                path.pop();
            }
            for (i, lv) in left.iter().enumerate().skip(shared) {
                path.push(PathSegment::Index(i));
                out.push(entry(
                    DiffKind::ArrayChange(ArrayItemChange::Removed),
                    path,
                    Some(lv),
                    None,
                ));
                path.pop();
            }
            for (i, rv) in right.iter().enumerate().skip(shared) {
                path.push(PathSegment::Index(i));
                out.push(entry(
                    DiffKind::ArrayChange(ArrayItemChange::Added),
                    path,
                    None,
                    Some(rv),
                ));
                path.pop();
            }
        }
        _ if leaf_eq(lhs, rhs) => {}
        _ => out.push(entry(DiffKind::Edit, path, Some(lhs), Some(rhs))),
    }
}

/// 1 and 1.0 are the same number on the wire. Integers compare exactly so
/// values above 2^53 are not collapsed by a float conversion.
fn leaf_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
                return x == y;
            }
            if a.is_f64() || b.is_f64() {
                return match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                };
            }
            // one side negative, the other above i64::MAX
            false
        }
        _ => lhs == rhs,
    }
}

fn entry(
    kind: DiffKind,
    path: &[PathSegment],
    old: Option<&Value>,
    new: Option<&Value>,
) -> RawDiff {
    RawDiff {
        kind,
        path: path.to_vec(),
        old: old.cloned(),
        new: new.cloned(),
    }
}
