//! Local JSON pointers: resolving `$ref` targets and writing patch targets.

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::PathSegment;

/// Resolve a local reference (`#`, `#/a/b`) against a schema root.
///
/// Returns `None` for external references, missing segments, or a walk that
/// hits a scalar.
pub fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    let pointer = pointer.strip_prefix('/')?;

    pointer.split('/').try_fold(root, |current, raw| {
        let segment = unescape_segment(raw);
        match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    })
}

/// Split a slash-separated target (`properties/a`, `/properties/a`,
/// `#/properties/a`) into segments.
pub fn parse_target(target: &str) -> Vec<PathSegment> {
    let trimmed = target.strip_prefix('#').unwrap_or(target);
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return vec![];
    }
    trimmed
        .split('/')
        .map(|raw| PathSegment::Key(unescape_segment(raw)))
        .collect()
}

fn unescape_segment(raw: &str) -> String {
    raw.replace("~1", "/").replace("~0", "~")
}

fn index_of(segment: &PathSegment) -> Option<usize> {
    match segment {
        PathSegment::Index(i) => Some(*i),
        PathSegment::Key(k) => k.parse().ok(),
    }
}

fn key_of(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Index(i) => i.to_string(),
        PathSegment::Key(k) => k.clone(),
    }
}

/// Write `value` at `path`, creating intermediate objects (or arrays, for
/// numeric segments) as needed. A walk that meets a scalar is a no-op.
pub fn set_path(root: &mut Value, path: &[PathSegment], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(path[i + 1], PathSegment::Index(_));
        let fresh = || {
            if next_is_index {
                Value::Array(vec![])
            } else {
                Value::Object(Map::new())
            }
        };
        current = match current {
            Value::Object(map) => map.entry(key_of(segment)).or_insert_with(fresh),
            Value::Array(list) => match index_of(segment) {
                Some(idx) if idx < list.len() => &mut list[idx],
                Some(idx) if idx == list.len() => {
                    list.push(fresh());
                    &mut list[idx]
                }
                _ => {
                    debug!(segment = %segment, "patch target index out of range");
                    return;
                }
            },
            _ => {
                debug!(segment = %segment, "patch target walks through a scalar");
                return;
            }
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(key_of(last), value);
        }
        Value::Array(list) => match index_of(last) {
            Some(idx) if idx < list.len() => list[idx] = value,
            Some(idx) if idx == list.len() => list.push(value),
            _ if key_of(last) == "-" => list.push(value),
            _ => debug!(segment = %last, "patch target index out of range"),
        },
        _ => debug!(segment = %last, "patch target parent is a scalar"),
    }
}

/// Delete the value at `path`. Missing targets are already removed.
pub fn remove_path(root: &mut Value, path: &[PathSegment]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(&key_of(segment)) {
                Some(next) => next,
                None => return,
            },
            Value::Array(list) => match index_of(segment).and_then(|i| list.get_mut(i)) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }

    match current {
        Value::Object(map) => {
            map.remove(&key_of(last));
        }
        Value::Array(list) => {
            if let Some(idx) = index_of(last).filter(|i| *i < list.len()) {
                list.remove(idx);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_pointer() {
        let root = json!({"definitions": {"a/b": {"type": "string"}}, "list": [1, {"x": 2}]});
        assert_eq!(resolve_pointer(&root, "#"), Some(&root));
        assert_eq!(
            resolve_pointer(&root, "#/definitions/a~1b"),
            Some(&json!({"type": "string"}))
        );
        assert_eq!(resolve_pointer(&root, "#/list/1/x"), Some(&json!(2)));
        assert_eq!(resolve_pointer(&root, "#/list/5"), None);
        assert_eq!(resolve_pointer(&root, "#/list/0/deeper"), None);
        assert_eq!(resolve_pointer(&root, "other.json#/a"), None);
    }

    #[test]
    fn test_set_then_resolve_round_trip() {
        let mut root = json!({});
        let value = json!({"type": "number", "enum": [1, 2]});
        set_path(&mut root, &["a".into(), "b".into()], value.clone());
        assert_eq!(resolve_pointer(&root, "#/a/b"), Some(&value));
    }

    #[test]
    fn test_set_path_creates_arrays_for_indices() {
        let mut root = json!({});
        set_path(&mut root, &["list".into(), PathSegment::Index(0)], json!("x"));
        assert_eq!(root, json!({"list": ["x"]}));
    }

    #[test]
    fn test_set_path_through_scalar_is_noop() {
        let mut root = json!({"a": 1});
        set_path(&mut root, &["a".into(), "b".into()], json!(2));
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn test_remove_path() {
        let mut root = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        remove_path(&mut root, &["a".into(), "b".into()]);
        remove_path(&mut root, &["list".into(), "1".into()]);
        remove_path(&mut root, &["missing".into(), "x".into()]);
        assert_eq!(root, json!({"a": {"c": 2}, "list": [1, 3]}));
    }

    #[test]
    fn test_parse_target_forms() {
        let expected: Vec<PathSegment> = vec!["properties".into(), "a".into()];
        assert_eq!(parse_target("properties/a"), expected);
        assert_eq!(parse_target("/properties/a"), expected);
        assert_eq!(parse_target("#/properties/a"), expected);
        assert!(parse_target("#").is_empty());
    }
}
