#![forbid(unsafe_code)]

//! Dot-separated path navigation over a [`serde_json::Value`] tree.
//!
//! A path is a sequence of segments separated by `.`, each either an object
//! key or a numeric array index (`email.work.main`, `phone.work.0`). The
//! empty path denotes the root itself.
//!
//! # Invariants
//!
//! 1. Reads never panic: an intermediate segment that resolves to `null`,
//!    a scalar, or nothing short-circuits `get` to `None` and `has` to
//!    `false`.
//! 2. `set` only mutates when every intermediate container already exists;
//!    it creates the leaf key on an existing object but never creates
//!    intermediate containers.
//! 3. Nothing is cached: every call walks the tree from the root.

use serde_json::Value;

/// Resolve `path` against `root`, returning the addressed value.
///
/// The empty path resolves to `root`.
#[must_use]
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Whether `path` resolves to a value (including an explicit `null` leaf).
#[must_use]
pub fn has(root: &Value, path: &str) -> bool {
    get(root, path).is_some()
}

/// Write `value` at `path`, returning whether the write happened.
///
/// The leaf key is created when its parent object exists; array segments
/// only overwrite existing positions. Missing intermediate containers make
/// the write a no-op returning `false`. The empty path replaces the root.
pub fn set(root: &mut Value, path: &str, value: Value) -> bool {
    if path.is_empty() {
        *root = value;
        return true;
    }
    let (parent, leaf) = split_leaf(path);
    let Some(container) = get_mut(root, parent) else {
        return false;
    };
    match container {
        Value::Object(map) => {
            map.insert(leaf.to_string(), value);
            true
        }
        Value::Array(items) => match leaf.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items[index] = value;
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Remove the value at `path`, returning it if it existed.
///
/// Removing an array position shifts later entries down; callers that need
/// identity-tracked removal go through the store's splice operation instead.
pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    let (parent, leaf) = split_leaf(path);
    let container = get_mut(root, parent)?;
    match container {
        Value::Object(map) => map.remove(leaf),
        Value::Array(items) => match leaf.parse::<usize>() {
            Ok(index) if index < items.len() => Some(items.remove(index)),
            _ => None,
        },
        _ => None,
    }
}

fn split_leaf(path: &str) -> (&str, &str) {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

pub(crate) fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                items.get_mut(index)
            }
            _ => None,
        }?;
    }
    Some(current)
}
