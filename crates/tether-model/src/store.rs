#![forbid(unsafe_code)]

//! Observable value store with deferred change delivery.
//!
//! [`Store`] wraps one model root. All mutation goes through the store
//! (`set`, `delete`, `splice_at`, `push_at`); each mutation queues typed
//! notifications that are delivered when [`Store::flush`] drains the queue.
//! Delivery is never interleaved with the code path that performed the
//! mutation, so a mutator can perform several writes and have subscribers
//! observe the settled state.
//!
//! # Invariants
//!
//! 1. Exactly one notification is queued per distinct mutation; flushing
//!    resolves each notification's value against the model at delivery
//!    time (settled state). No coalescing across mutations.
//! 2. Value subscriptions are keyed by path string, not object identity:
//!    deleting and re-creating a path keeps its subscribers attached.
//! 3. Mutating a path notifies the exact path and every subscribed
//!    descendant of it; deletion delivers an absent value.
//! 4. Dropping a [`Subscription`] before `flush()` guarantees its callback
//!    never runs; dropping it afterwards is a no-op.
//! 5. Every entry of an observed array carries a surrogate [`EntryId`]
//!    assigned at creation and maintained through splices, so removals can
//!    be tracked by identity after indices have shifted.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `set` on missing intermediates | Path not yet built | Returns `false`, nothing queued |
//! | `delete` on absent path | Already gone | Returns `false`, nothing queued |
//! | `splice_at` on a non-array | Wrong path type | Returns `None`, nothing queued |
//! | Callback mutates the store | Re-entrant write | New notifications join the same drain |
//! | Callback calls `flush` | Re-entrant flush | Inner call returns immediately |

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use serde_json::Value;
use tracing::trace;

use crate::path;

/// Surrogate identity assigned to one array entry at creation time.
///
/// Stable across splices: shifting an entry's index never changes its id.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct EntryId(u64);

/// A value change delivered to `observe_value` subscribers.
///
/// `value` is `None` when the path no longer resolves (deletion of the
/// path itself or of an ancestor).
#[derive(Clone, Debug)]
pub struct Change {
    pub path: String,
    pub value: Option<Value>,
}

/// A newly populated index of an observed array.
#[derive(Clone, Debug)]
pub struct Added {
    pub path: String,
    pub index: usize,
    pub value: Value,
}

/// One entry removed by a splice, identified by surrogate id and the index
/// it occupied before the splice.
#[derive(Clone, Debug)]
pub struct Removed {
    pub id: EntryId,
    pub index: usize,
    pub value: Value,
}

/// A structural array mutation: `removed` entries by identity plus the
/// number of entries inserted at `start`.
#[derive(Clone, Debug)]
pub struct Splice {
    pub path: String,
    pub start: usize,
    pub removed: Vec<Removed>,
    pub inserted: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SubId(u64);

type ValueCallback = Rc<dyn Fn(&Change)>;
type AddedCallback = Rc<dyn Fn(&Added)>;
type SpliceCallback = Rc<dyn Fn(&Splice)>;

struct SubEntry<C> {
    id: SubId,
    callback: C,
}

enum Pending {
    /// Value resolved against the model when delivered, not when queued.
    Value { path: String },
    Added(Added),
    Splice(Splice),
}

struct StoreInner {
    root: Value,
    /// Per-array-path surrogate id tables, created lazily on first
    /// observation or splice.
    entry_ids: AHashMap<String, Vec<EntryId>>,
    next_entry: u64,
    next_sub: u64,
    value_subs: AHashMap<String, Vec<SubEntry<ValueCallback>>>,
    added_subs: AHashMap<String, Vec<SubEntry<AddedCallback>>>,
    splice_subs: AHashMap<String, Vec<SubEntry<SpliceCallback>>>,
    pending: VecDeque<Pending>,
    flushing: bool,
}

impl StoreInner {
    fn alloc_sub(&mut self) -> SubId {
        let id = SubId(self.next_sub);
        self.next_sub += 1;
        id
    }

    fn alloc_entry(&mut self) -> EntryId {
        let id = EntryId(self.next_entry);
        self.next_entry += 1;
        id
    }

    /// Bring the id table for the array at `path` in sync with its length,
    /// assigning fresh ids to any untracked tail entries.
    fn sync_entry_ids(&mut self, path: &str) {
        let len = match path::get(&self.root, path) {
            Some(Value::Array(items)) => items.len(),
            _ => {
                self.entry_ids.remove(path);
                return;
            }
        };
        let mut table = self.entry_ids.remove(path).unwrap_or_default();
        table.truncate(len);
        while table.len() < len {
            let id = self.alloc_entry();
            table.push(id);
        }
        self.entry_ids.insert(path.to_string(), table);
    }

    /// Drop id tables for `path` and everything beneath it; a replaced
    /// container starts a new identity world.
    fn invalidate_entry_ids(&mut self, path: &str) {
        if path.is_empty() {
            self.entry_ids.clear();
            return;
        }
        let prefix = format!("{path}.");
        self.entry_ids
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    /// Queue one value notification for the mutated path and every
    /// subscribed descendant of it.
    fn queue_value_changes(&mut self, mutated: &str) {
        let prefix = format!("{mutated}.");
        let targets: Vec<String> = self
            .value_subs
            .keys()
            .filter(|sub_path| {
                mutated.is_empty() || *sub_path == mutated || sub_path.starts_with(&prefix)
            })
            .cloned()
            .collect();
        for target in targets {
            trace!(path = %target, "queue value change");
            self.pending.push_back(Pending::Value { path: target });
        }
    }
}

/// Shared, observable wrapper around one model root.
///
/// Cloning a `Store` creates a new handle to the **same** model.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("pending", &inner.pending.len())
            .field("value_subs", &inner.value_subs.len())
            .finish()
    }
}

impl Store {
    /// Wrap `root` in a new store.
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                root,
                entry_ids: AHashMap::new(),
                next_entry: 0,
                next_sub: 0,
                value_subs: AHashMap::new(),
                added_subs: AHashMap::new(),
                splice_subs: AHashMap::new(),
                pending: VecDeque::new(),
                flushing: false,
            })),
        }
    }

    /// Clone of the value at `path`, if it resolves.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        path::get(&self.inner.borrow().root, path).cloned()
    }

    /// Whether `path` currently resolves to a value.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        path::has(&self.inner.borrow().root, path)
    }

    /// Length of the array at `path`, or `None` when `path` is not an array.
    #[must_use]
    pub fn len_at(&self, path: &str) -> Option<usize> {
        match path::get(&self.inner.borrow().root, path) {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }

    /// Surrogate identity of the entry at `index` of the array at `path`.
    #[must_use]
    pub fn entry_id(&self, path: &str, index: usize) -> Option<EntryId> {
        let mut inner = self.inner.borrow_mut();
        inner.sync_entry_ids(path);
        inner.entry_ids.get(path).and_then(|t| t.get(index)).copied()
    }

    /// Write `value` at `path` and queue notifications.
    ///
    /// Returns `false` (queuing nothing) when intermediate containers are
    /// missing.
    pub fn set(&self, path: &str, value: Value) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !path::set(&mut inner.root, path, value) {
            return false;
        }
        inner.invalidate_entry_ids(path);
        inner.queue_value_changes(path);
        true
    }

    /// Remove the value at `path` and queue absent-value notifications.
    pub fn delete(&self, path: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        if path::remove(&mut inner.root, path).is_none() {
            return false;
        }
        inner.invalidate_entry_ids(path);
        inner.queue_value_changes(path);
        true
    }

    /// Splice the root array. See [`Store::splice_at`].
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Option<Vec<Value>> {
        self.splice_at("", start, delete_count, insert)
    }

    /// Remove `delete_count` entries at `start` of the array at `path` and
    /// insert `insert` in their place. Returns the removed values, or
    /// `None` when `path` is not an array.
    ///
    /// Queues one splice notification carrying the removed entries by
    /// identity and original index, a value notification for every index
    /// whose value shifted, and one added notification per index the
    /// array grew by.
    pub fn splice_at(
        &self,
        path: &str,
        start: usize,
        delete_count: usize,
        insert: Vec<Value>,
    ) -> Option<Vec<Value>> {
        let mut inner = self.inner.borrow_mut();
        inner.sync_entry_ids(path);
        let inserted = insert.len();

        let (removed_values, old_len, new_tail): (Vec<Value>, usize, Vec<Value>) = {
            let Some(Value::Array(items)) = path::get_mut(&mut inner.root, path) else {
                return None;
            };
            let old_len = items.len();
            let start = start.min(old_len);
            let end = (start + delete_count).min(old_len);
            let removed: Vec<Value> = items.splice(start..end, insert).collect();
            let new_len = items.len();
            let tail = items[old_len.min(new_len)..].to_vec();
            (removed, old_len, tail)
        };

        let start = start.min(old_len);
        let end = (start + delete_count).min(old_len);
        let fresh: Vec<EntryId> = (0..inserted).map(|_| inner.alloc_entry()).collect();
        let removed_ids: Vec<EntryId> = inner
            .entry_ids
            .get_mut(path)
            .map(|table| table.splice(start..end, fresh).collect())
            .unwrap_or_default();

        let removed: Vec<Removed> = removed_ids
            .into_iter()
            .zip(removed_values.iter().cloned())
            .enumerate()
            .map(|(offset, (id, value))| Removed {
                id,
                index: start + offset,
                value,
            })
            .collect();

        trace!(
            path = %path,
            start,
            removed = removed.len(),
            inserted,
            "queue splice"
        );
        inner.pending.push_back(Pending::Splice(Splice {
            path: path.to_string(),
            start,
            removed,
            inserted,
        }));
        let new_len = old_len + inserted - (end - start);
        for index in start..old_len.max(new_len) {
            if index >= old_len && index < new_len {
                // Net-new entries are announced as added, below.
                continue;
            }
            let item_path = if path.is_empty() {
                index.to_string()
            } else {
                format!("{path}.{index}")
            };
            inner.queue_value_changes(&item_path);
        }
        for (offset, value) in new_tail.into_iter().enumerate() {
            inner.pending.push_back(Pending::Added(Added {
                path: path.to_string(),
                index: old_len + offset,
                value,
            }));
        }
        Some(removed_values)
    }

    /// Append to the root array, returning the new index.
    pub fn push(&self, value: Value) -> Option<usize> {
        self.push_at("", value)
    }

    /// Append to the array at `path`, returning the new index.
    pub fn push_at(&self, path: &str, value: Value) -> Option<usize> {
        let len = self.len_at(path)?;
        self.splice_at(path, len, 0, vec![value])?;
        Some(len)
    }

    /// Subscribe to value changes at `path`. The callback observes the
    /// settled value at delivery time; absent paths deliver `None`.
    pub fn observe_value(&self, path: &str, callback: impl Fn(&Change) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.alloc_sub();
        inner
            .value_subs
            .entry(path.to_string())
            .or_default()
            .push(SubEntry {
                id,
                callback: Rc::new(callback),
            });
        Subscription {
            store: Rc::downgrade(&self.inner),
            kind: SubKind::Value(path.to_string()),
            id,
        }
    }

    /// Subscribe to newly populated indices of the array at `path`
    /// (`""` for the root).
    pub fn observe_added(&self, path: &str, callback: impl Fn(&Added) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.sync_entry_ids(path);
        let id = inner.alloc_sub();
        inner
            .added_subs
            .entry(path.to_string())
            .or_default()
            .push(SubEntry {
                id,
                callback: Rc::new(callback),
            });
        Subscription {
            store: Rc::downgrade(&self.inner),
            kind: SubKind::Added(path.to_string()),
            id,
        }
    }

    /// Subscribe to splices of the array at `path` (`""` for the root).
    pub fn observe_splice(&self, path: &str, callback: impl Fn(&Splice) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.sync_entry_ids(path);
        let id = inner.alloc_sub();
        inner
            .splice_subs
            .entry(path.to_string())
            .or_default()
            .push(SubEntry {
                id,
                callback: Rc::new(callback),
            });
        Subscription {
            store: Rc::downgrade(&self.inner),
            kind: SubKind::Splice(path.to_string()),
            id,
        }
    }

    /// Whether notifications are waiting to be delivered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().pending.is_empty()
    }

    /// Deliver all pending notifications, including any queued by the
    /// callbacks themselves. Re-entrant calls return immediately.
    pub fn flush(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing {
                return;
            }
            inner.flushing = true;
        }
        loop {
            let item = self.inner.borrow_mut().pending.pop_front();
            let Some(item) = item else {
                break;
            };
            match item {
                Pending::Value { path } => {
                    let (value, callbacks) = {
                        let inner = self.inner.borrow();
                        let value = path::get(&inner.root, &path).cloned();
                        let callbacks: Vec<ValueCallback> = inner
                            .value_subs
                            .get(&path)
                            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
                            .unwrap_or_default();
                        (value, callbacks)
                    };
                    let change = Change { path, value };
                    for callback in callbacks {
                        callback(&change);
                    }
                }
                Pending::Added(added) => {
                    let callbacks: Vec<AddedCallback> = {
                        let inner = self.inner.borrow();
                        inner
                            .added_subs
                            .get(&added.path)
                            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
                            .unwrap_or_default()
                    };
                    for callback in callbacks {
                        callback(&added);
                    }
                }
                Pending::Splice(splice) => {
                    let callbacks: Vec<SpliceCallback> = {
                        let inner = self.inner.borrow();
                        inner
                            .splice_subs
                            .get(&splice.path)
                            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
                            .unwrap_or_default()
                    };
                    for callback in callbacks {
                        callback(&splice);
                    }
                }
            }
        }
        self.inner.borrow_mut().flushing = false;
    }
}

enum SubKind {
    Value(String),
    Added(String),
    Splice(String),
}

/// RAII guard for one store subscription. Dropping it releases the
/// subscription; there is no other unsubscription path.
pub struct Subscription {
    store: Weak<RefCell<StoreInner>>,
    kind: SubKind,
    id: SubId,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match &self.kind {
            SubKind::Value(p) | SubKind::Added(p) | SubKind::Splice(p) => p,
        };
        f.debug_struct("Subscription").field("path", path).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let mut inner = store.borrow_mut();
        match &self.kind {
            SubKind::Value(path) => {
                if let Some(subs) = inner.value_subs.get_mut(path) {
                    subs.retain(|s| s.id != self.id);
                    if subs.is_empty() {
                        inner.value_subs.remove(path);
                    }
                }
            }
            SubKind::Added(path) => {
                if let Some(subs) = inner.added_subs.get_mut(path) {
                    subs.retain(|s| s.id != self.id);
                    if subs.is_empty() {
                        inner.added_subs.remove(path);
                    }
                }
            }
            SubKind::Splice(path) => {
                if let Some(subs) = inner.splice_subs.get_mut(path) {
                    subs.retain(|s| s.id != self.id);
                    if subs.is_empty() {
                        inner.splice_subs.remove(path);
                    }
                }
            }
        }
    }
}
