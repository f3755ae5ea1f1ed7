//! Path addressing into nested JSON structures.
//!
//! A path is a non-empty dotted string. Segments that parse as non-negative
//! integers index into an ordered sequence; any other segment names a field
//! in a mapping. A literal dot inside a field name is written `\.` and
//! round-trips losslessly through [`flatten`]/[`expand`].
//!
//! A single segment equal to `*` selects "all elements" of whatever sequence
//! sits at that position: if it is the last segment the sequence itself is
//! returned, otherwise the remainder of the path is applied to every element.
//! At most one `*` is permitted per path.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::DagError;

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(s) => write!(f, "{}", escape_segment(s)),
            Segment::Index(i) => write!(f, "{i}"),
            Segment::Wildcard => write!(f, "*"),
        }
    }
}

/// Escape literal dots in a raw field name so it survives path-joining.
#[must_use]
pub fn escape_segment(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('.', "\\.")
}

/// Split a raw dotted path string into segments, honoring `\.` escapes.
#[must_use]
pub fn parse_segments(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    chars.next();
                } else {
                    current.push('\\');
                }
            }
            '.' => {
                segments.push(raw_segment(&current));
                current.clear();
            }
            other => current.push(other),
        }
    }
    segments.push(raw_segment(&current));
    segments
}

fn raw_segment(raw: &str) -> Segment {
    if raw == "*" {
        Segment::Wildcard
    } else if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        raw.parse::<usize>()
            .map(Segment::Index)
            .unwrap_or_else(|_| Segment::Field(raw.to_string()))
    } else {
        Segment::Field(raw.to_string())
    }
}

fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a full path into its leading node id and the remainder (the
/// "value path" addressing into that node's current value).
#[must_use]
pub fn split_node_path(path: &str) -> (String, Option<String>) {
    match path.split_once('.') {
        Some((head, rest)) if !rest.is_empty() => (head.to_string(), Some(rest.to_string())),
        _ => (path.to_string(), None),
    }
}

/// Descend into `value` segment by segment. Returns `None` ("absent") on any
/// missing segment instead of erroring.
#[must_use]
pub fn get_at_path(value: &Value, path: &str) -> Option<Value> {
    let segments = parse_segments(path);
    get_at_segments(value, &segments)
}

fn get_at_segments(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match head {
        Segment::Field(name) => {
            let child = value.as_object().and_then(|m| m.get(name))?;
            get_at_segments(child, rest)
        }
        Segment::Index(i) => {
            let child = value.as_array().and_then(|a| a.get(*i))?;
            get_at_segments(child, rest)
        }
        Segment::Wildcard => {
            // Reaching a bare wildcard through this accessor (no before/after
            // split) is only valid as the final segment, mirroring the "whole
            // sequence" case of `getAtPathWithWildcard`.
            let arr = value.as_array()?;
            if rest.is_empty() {
                Some(Value::Array(arr.clone()))
            } else {
                let mapped: Option<Vec<Value>> = arr
                    .iter()
                    .map(|el| get_at_segments(el, rest))
                    .collect::<Option<Vec<_>>>();
                mapped.map(Value::Array)
            }
        }
    }
}

/// Descend through *existing* containers and write `v` at `path`. Fails if an
/// intermediate segment is missing; never creates new containers.
pub fn set_at_path(target: &mut Value, path: &str, v: Value) -> Result<(), DagError> {
    let segments = parse_segments(path);
    set_at_segments(target, &segments, v, path)
}

fn set_at_segments(
    target: &mut Value,
    segments: &[Segment],
    v: Value,
    full_path: &str,
) -> Result<(), DagError> {
    let Some((head, rest)) = segments.split_first() else {
        *target = v;
        return Ok(());
    };
    let missing = || {
        DagError::Path(format!(
            "setAtPath: missing intermediate segment in '{full_path}'"
        ))
    };
    match head {
        Segment::Field(name) => {
            let obj = target.as_object_mut().ok_or_else(missing)?;
            let child = obj.get_mut(name).ok_or_else(missing)?;
            set_at_segments(child, rest, v, full_path)
        }
        Segment::Index(i) => {
            let arr = target.as_array_mut().ok_or_else(missing)?;
            let child = arr.get_mut(*i).ok_or_else(missing)?;
            set_at_segments(child, rest, v, full_path)
        }
        Segment::Wildcard => Err(DagError::Path(format!(
            "setAtPath: wildcard not supported in '{full_path}'"
        ))),
    }
}

/// Resolve a path that may contain a single `*` segment. Splits the path into
/// `before` and `after` around the wildcard, resolves `before` (empty ⇒ the
/// value itself), requires it to be a sequence, then maps `after` over every
/// element (or returns the sequence itself when `after` is empty).
///
/// Returns `Ok(None)` ("absent") when `before` has not resolved yet. Returns
/// `Err` when `before` resolves to something other than a sequence, or when
/// the path carries more than one wildcard.
pub fn get_at_path_with_wildcard(value: &Value, path: &str) -> Result<Option<Value>, DagError> {
    let segments = parse_segments(path);
    let wildcard_positions: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == Segment::Wildcard)
        .map(|(i, _)| i)
        .collect();

    match wildcard_positions.len() {
        0 => Ok(get_at_segments(value, &segments)),
        1 => {
            let pos = wildcard_positions[0];
            let before = &segments[..pos];
            let after = &segments[pos + 1..];

            let Some(resolved_before) = get_at_segments(value, before) else {
                return Ok(None);
            };
            let Some(seq) = resolved_before.as_array() else {
                return Err(DagError::Path(format!(
                    "wildcard applied to non-sequence at '{}'",
                    join_segments(before)
                )));
            };
            if after.is_empty() {
                return Ok(Some(Value::Array(seq.clone())));
            }
            let mut out = Vec::with_capacity(seq.len());
            for el in seq {
                match get_at_segments(el, after) {
                    Some(v) => out.push(v),
                    None => return Ok(None),
                }
            }
            Ok(Some(Value::Array(out)))
        }
        _ => Err(DagError::Path(format!(
            "path '{path}' contains more than one wildcard"
        ))),
    }
}

/// Depth-first enumeration of every leaf path in a nested mapping/sequence,
/// with dot-escaping applied to field names along the way.
#[must_use]
pub fn collect_paths(tree: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_paths_into(tree, &mut Vec::new(), &mut out);
    out
}

fn collect_paths_into(node: &Value, prefix: &mut Vec<Segment>, out: &mut Vec<String>) {
    match node {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                prefix.push(Segment::Field(k.clone()));
                collect_paths_into(v, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, v) in arr.iter().enumerate() {
                prefix.push(Segment::Index(i));
                collect_paths_into(v, prefix, out);
                prefix.pop();
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.push(join_segments(prefix));
            }
        }
    }
}

/// Flatten a tree into a path → leaf mapping. When `keep` is given, only
/// paths present in `keep` (already-escaped path strings) are retained.
#[must_use]
pub fn flatten(tree: &Value, keep: Option<&[String]>) -> Map<String, Value> {
    let mut out = Map::new();
    for path in collect_paths(tree) {
        if let Some(keep) = keep {
            if !keep.contains(&path) {
                continue;
            }
        }
        if let Some(leaf) = get_at_path(tree, &path) {
            out.insert(path, leaf);
        }
    }
    out
}

/// Inverse of [`flatten`]: rebuild a tree from a path → leaf mapping.
#[must_use]
pub fn expand(flat: &Map<String, Value>, keep: Option<&[String]>) -> Value {
    let mut root = Value::Object(Map::new());
    for (path, leaf) in flat {
        if let Some(keep) = keep {
            if !keep.contains(path) {
                continue;
            }
        }
        insert_path(&mut root, &parse_segments(path), leaf.clone());
    }
    densify(root)
}

fn insert_path(node: &mut Value, segments: &[Segment], leaf: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let key = head.to_string();
    let obj = node.as_object_mut().expect("coerced above");
    let child = obj.entry(key).or_insert(Value::Object(Map::new()));
    insert_path(child, rest, leaf);
}

/// Recursively turn any object whose keys are exactly `"0".."n"` into an
/// array, since [`insert_path`] always builds through plain objects first.
fn densify(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let densified: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, densify(v)))
                .collect();
            if is_dense_index_map(&densified) {
                let mut items: Vec<(usize, Value)> = densified
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Value::Array(items.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(densified)
            }
        }
        other => other,
    }
}

fn is_dense_index_map(map: &Map<String, Value>) -> bool {
    if map.is_empty() {
        return false;
    }
    let mut indices: Vec<usize> = Vec::with_capacity(map.len());
    for k in map.keys() {
        match k.parse::<usize>() {
            Ok(i) => indices.push(i),
            Err(_) => return false,
        }
    }
    indices.sort_unstable();
    indices.iter().enumerate().all(|(pos, &idx)| pos == idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_node_path_single_segment() {
        assert_eq!(split_node_path("staticNode"), ("staticNode".into(), None));
    }

    #[test]
    fn split_node_path_with_remainder() {
        assert_eq!(
            split_node_path("inputs.stringValue"),
            ("inputs".into(), Some("stringValue".into()))
        );
    }

    #[test]
    fn get_at_path_basic() {
        let v = json!({"a": {"b": 2}});
        assert_eq!(get_at_path(&v, "a.b"), Some(json!(2)));
        assert_eq!(get_at_path(&v, "a.c"), None);
    }

    #[test]
    fn get_at_path_array_index() {
        let v = json!({"things": [{"amount": 4}, {"amount": 2}]});
        assert_eq!(get_at_path(&v, "things.0.amount"), Some(json!(4)));
    }

    #[test]
    fn wildcard_extraction() {
        let v = json!({"things": [{"amount": 4}, {"amount": 2}]});
        let result = get_at_path_with_wildcard(&v, "things.*.amount").unwrap();
        assert_eq!(result, Some(json!([4, 2])));
    }

    #[test]
    fn wildcard_whole_sequence() {
        let v = json!({"things": [1, 2, 3]});
        let result = get_at_path_with_wildcard(&v, "things.*").unwrap();
        assert_eq!(result, Some(json!([1, 2, 3])));
    }

    #[test]
    fn wildcard_on_non_sequence_errors() {
        let v = json!({"things": {"a": 1}});
        assert!(get_at_path_with_wildcard(&v, "things.*").is_err());
    }

    #[test]
    fn wildcard_double_is_error() {
        let v = json!({"a": [[1, 2]]});
        assert!(get_at_path_with_wildcard(&v, "a.*.*").is_err());
    }

    #[test]
    fn flatten_expand_roundtrip() {
        let tree = json!({"a": {"b": 1, "c": [2, 3]}, "d": "hi"});
        let flat = flatten(&tree, None);
        let rebuilt = expand(&flat, None);
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn flatten_escapes_literal_dots() {
        let tree = json!({"a.b": 1});
        let flat = flatten(&tree, None);
        assert!(flat.contains_key("a\\.b"));
        let rebuilt = expand(&flat, None);
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn set_at_path_missing_intermediate_fails() {
        let mut v = json!({"a": {}});
        assert!(set_at_path(&mut v, "a.b.c", json!(1)).is_err());
    }

    #[test]
    fn set_at_path_existing_container() {
        let mut v = json!({"a": {"b": 1}});
        set_at_path(&mut v, "a.b", json!(2)).unwrap();
        assert_eq!(v, json!({"a": {"b": 2}}));
    }
}
