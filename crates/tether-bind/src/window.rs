#![forbid(unsafe_code)]

//! Windowed (virtualized) list rendering.
//!
//! A [`WindowRenderer`] owns one container element whose first child was
//! captured as the item template, and materializes one clone per model
//! index inside the window `[start, start + count)`. Items outside the
//! window, or whose model entry disappeared, are destroyed on the next
//! render; items already materialized are left untouched, so rendering
//! is idempotent.
//!
//! # Invariants
//!
//! 1. After `render`, the set of materialized indexes is exactly the
//!    window clipped to the model array's bounds.
//! 2. Sweep removals run in descending index order.
//! 3. Every subscription opened while an item's clone is bound is stored
//!    with that item and dropped when the item is destroyed.
//! 4. `render` is a no-op returning `false` until both `start` and
//!    `count` have been set.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |---|---|
//! | Container has no first child | Template absent; `render` materializes nothing |
//! | Window extends past the array | Indexes without a model entry are skipped |
//! | Entry id unknown to [`WindowRenderer::remove_entry`] | Returns `false`, no change |

use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, trace};

use tether_host::ElementRef;
use tether_model::{EntryId, Store, Subscription};

use crate::{Applicator, SubscriptionLedger};

/// Window size: a fixed number of items or the whole array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Count {
    /// Render every entry from `start` onward.
    All,
    /// Render at most this many entries.
    Fixed(usize),
}

/// Renders a window of an observed array into a container element.
pub struct WindowRenderer {
    store: Store,
    /// Path of the observed array; empty for the model root.
    array_path: String,
    /// Context name stamped into `data-<owner>_id` on rendered clones.
    owner: String,
    applicator: Rc<dyn Applicator>,
    ledger: Rc<SubscriptionLedger>,
    container: ElementRef,
    template: Option<ElementRef>,
    start: Option<usize>,
    count: Option<Count>,
    items: AHashMap<usize, ElementRef>,
    index_subs: AHashMap<usize, Vec<Subscription>>,
    by_entry: AHashMap<EntryId, usize>,
}

impl WindowRenderer {
    /// Capture the container's first child as the item template and
    /// detach it. The window stays unset; `render` does nothing until
    /// [`Self::set_start`] and [`Self::set_count`] are called.
    #[must_use]
    pub fn new(
        store: Store,
        array_path: &str,
        owner: &str,
        applicator: Rc<dyn Applicator>,
        ledger: Rc<SubscriptionLedger>,
        container: ElementRef,
    ) -> Self {
        let template = container.first_child();
        if let Some(template) = &template {
            container.remove_child(template);
        }
        Self {
            store,
            array_path: array_path.to_string(),
            owner: owner.to_string(),
            applicator,
            ledger,
            container,
            template,
            start: None,
            count: None,
            items: AHashMap::new(),
            index_subs: AHashMap::new(),
            by_entry: AHashMap::new(),
        }
    }

    pub fn set_start(&mut self, start: usize) {
        self.start = Some(start);
    }

    pub fn set_count(&mut self, count: Count) {
        self.count = Some(count);
    }

    #[must_use]
    pub fn start(&self) -> Option<usize> {
        self.start
    }

    #[must_use]
    pub fn count(&self) -> Option<Count> {
        self.count
    }

    /// The detached item template, if the container had one.
    #[must_use]
    pub fn template(&self) -> Option<ElementRef> {
        self.template.clone()
    }

    /// Materialized indexes in ascending order. Debugging helper.
    #[must_use]
    pub fn materialized(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self.items.keys().copied().collect();
        indexes.sort_unstable();
        indexes
    }

    /// Reconcile the container with the current window. Returns `false`
    /// while the window is unset.
    pub fn render(&mut self) -> bool {
        let (Some(start), Some(count)) = (self.start, self.count) else {
            return false;
        };
        let len = self.array_len();
        let effective = match count {
            Count::All => len.saturating_sub(start),
            Count::Fixed(n) => n,
        };
        let end = start.saturating_add(effective);
        trace!(
            owner = %self.owner,
            start,
            end,
            len,
            "rendering window"
        );

        let swept = self.sweep(start, end);
        if !swept.is_empty() {
            debug!(owner = %self.owner, removed = swept.len(), "swept stale items");
        }
        for index in start..end {
            self.add_item(index);
        }
        self.resync_entries();
        true
    }

    /// Materialize `index` unless it already is. Returns whether a new
    /// item was created.
    pub fn add_item(&mut self, index: usize) -> bool {
        if self.items.contains_key(&index) {
            return false;
        }
        match self.create(index) {
            Some(element) => {
                self.container.append_child(element);
                true
            }
            None => false,
        }
    }

    /// Destroy the item at `index`: detach its element and drop the
    /// subscriptions opened when it was bound.
    pub fn remove_item(&mut self, index: usize) -> bool {
        match self.items.remove(&index) {
            Some(element) => {
                self.container.remove_child(&element);
                drop(self.index_subs.remove(&index));
                self.by_entry.retain(|_, i| *i != index);
                true
            }
            None => false,
        }
    }

    /// Destroy the item materialized for `entry`, wherever the window
    /// currently places it. Used when a splice removes the entry.
    pub fn remove_entry(&mut self, entry: EntryId) -> bool {
        match self.by_entry.remove(&entry) {
            Some(index) => self.remove_item(index),
            None => false,
        }
    }

    /// Remove materialized items that fell outside `[start, end)` or
    /// whose model entry no longer exists, highest index first so earlier
    /// removals cannot shift later ones. Returns the removal order.
    fn sweep(&mut self, start: usize, end: usize) -> Vec<usize> {
        let mut marked: Vec<usize> = self
            .items
            .keys()
            .copied()
            .filter(|&index| {
                index < start || index >= end || !self.store.has(&self.item_path(index))
            })
            .collect();
        marked.sort_unstable_by(|a, b| b.cmp(a));
        for &index in &marked {
            self.remove_item(index);
        }
        marked
    }

    /// Clone the template for `index`, stamp the owning context id on the
    /// clone and all its descendants, and bind it. Subscriptions opened
    /// during binding are collected and stored with the item. Returns
    /// `None` when there is no template or no model entry at `index`.
    fn create(&mut self, index: usize) -> Option<ElementRef> {
        let template = self.template.clone()?;
        if !self.store.has(&self.item_path(index)) {
            return None;
        }
        let clone = template.clone_deep();
        let owner_attr = format!("data-{}_id", self.owner);
        let item_path = self.item_path(index);
        clone.set_attribute(&owner_attr, &item_path);
        for descendant in clone.descendants() {
            descendant.set_attribute(&owner_attr, &item_path);
        }

        self.ledger.begin();
        self.applicator.apply(&clone);
        let subs = self.ledger.end();

        self.items.insert(index, clone.clone());
        self.index_subs.insert(index, subs);
        if let Some(entry) = self.store.entry_id(&self.array_path, index) {
            self.by_entry.insert(entry, index);
        }
        Some(clone)
    }

    /// Model path of the entry at `index`.
    fn item_path(&self, index: usize) -> String {
        if self.array_path.is_empty() {
            index.to_string()
        } else {
            format!("{}.{index}", self.array_path)
        }
    }

    fn array_len(&self) -> usize {
        self.store.len_at(&self.array_path).unwrap_or(0)
    }

    /// Rebuild the entry map from the store's current id table so splice
    /// removals delivered later resolve against this render.
    fn resync_entries(&mut self) {
        self.by_entry.clear();
        for &index in self.items.keys() {
            if let Some(entry) = self.store.entry_id(&self.array_path, index) {
                self.by_entry.insert(entry, index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use tether_host::{Element, MemoryElement};

    struct RecordingApplicator {
        applied: RefCell<usize>,
    }

    impl Applicator for RecordingApplicator {
        fn apply(&self, _element: &ElementRef) {
            *self.applied.borrow_mut() += 1;
        }
    }

    fn renderer(store: &Store) -> (WindowRenderer, Rc<MemoryElement>, Rc<RecordingApplicator>) {
        let container = MemoryElement::new("ul");
        let li = MemoryElement::new("li");
        li.set_attribute("data-bind", "bind:innerHTML, title");
        container.append_child(li);

        let applicator = Rc::new(RecordingApplicator {
            applied: RefCell::new(0),
        });
        let renderer = WindowRenderer::new(
            store.clone(),
            "",
            "rows",
            applicator.clone(),
            Rc::new(SubscriptionLedger::new()),
            container.clone(),
        );
        (renderer, container, applicator)
    }

    fn three_items() -> Store {
        Store::new(json!([
            {"title": "Data1"},
            {"title": "Data2"},
            {"title": "Data3"}
        ]))
    }

    #[test]
    fn template_is_captured_and_detached() {
        let store = three_items();
        let (renderer, container, _) = renderer(&store);
        assert!(renderer.template().is_some());
        assert!(container.children().is_empty());
    }

    #[test]
    fn render_requires_both_boundaries() {
        let store = three_items();
        let (mut renderer, _, _) = renderer(&store);
        assert!(!renderer.render());
        renderer.set_start(0);
        assert!(!renderer.render());
        renderer.set_count(Count::All);
        assert!(renderer.render());
        assert_eq!(renderer.materialized(), vec![0, 1, 2]);
    }

    #[test]
    fn fixed_window_clips_to_array() {
        let store = three_items();
        let (mut renderer, container, _) = renderer(&store);
        renderer.set_start(1);
        renderer.set_count(Count::Fixed(10));
        renderer.render();
        assert_eq!(renderer.materialized(), vec![1, 2]);
        assert_eq!(container.children().len(), 2);
    }

    #[test]
    fn render_is_idempotent() {
        let store = three_items();
        let (mut renderer, container, applicator) = renderer(&store);
        renderer.set_start(0);
        renderer.set_count(Count::Fixed(2));
        renderer.render();
        renderer.render();
        assert_eq!(container.children().len(), 2);
        assert_eq!(*applicator.applied.borrow(), 2, "items bound exactly once");
    }

    #[test]
    fn shrinking_window_sweeps_descending() {
        let store = three_items();
        let (mut renderer, _, _) = renderer(&store);
        renderer.set_start(0);
        renderer.set_count(Count::All);
        renderer.render();

        renderer.set_count(Count::Fixed(1));
        let swept = renderer.sweep(0, 1);
        assert_eq!(swept, vec![2, 1], "highest index removed first");
        assert_eq!(renderer.materialized(), vec![0]);
    }

    #[test]
    fn moving_window_replaces_items() {
        let store = three_items();
        let (mut renderer, container, _) = renderer(&store);
        renderer.set_start(0);
        renderer.set_count(Count::Fixed(2));
        renderer.render();

        renderer.set_start(1);
        renderer.render();
        assert_eq!(renderer.materialized(), vec![1, 2]);
        assert_eq!(container.children().len(), 2);
    }

    #[test]
    fn clones_carry_the_owner_id_on_every_node() {
        let store = Store::new(json!([{"title": "Data1"}]));
        let container = MemoryElement::new("ul");
        let li = MemoryElement::new("li");
        let span = MemoryElement::new("span");
        li.append_child(span);
        container.append_child(li);

        let mut renderer = WindowRenderer::new(
            store,
            "",
            "rows",
            Rc::new(RecordingApplicator {
                applied: RefCell::new(0),
            }),
            Rc::new(SubscriptionLedger::new()),
            container.clone(),
        );
        renderer.set_start(0);
        renderer.set_count(Count::All);
        renderer.render();

        let item = container.first_child().unwrap();
        assert_eq!(item.attribute("data-rows_id"), Some("0".to_string()));
        let inner = item.first_child().unwrap();
        assert_eq!(inner.attribute("data-rows_id"), Some("0".to_string()));
    }

    #[test]
    fn sub_path_arrays_stamp_full_item_paths() {
        let store = Store::new(json!({"rows": [{"title": "Data1"}]}));
        let container = MemoryElement::new("ul");
        container.append_child(MemoryElement::new("li"));

        let mut renderer = WindowRenderer::new(
            store,
            "rows",
            "model",
            Rc::new(RecordingApplicator {
                applied: RefCell::new(0),
            }),
            Rc::new(SubscriptionLedger::new()),
            container.clone(),
        );
        renderer.set_start(0);
        renderer.set_count(Count::All);
        renderer.render();

        let item = container.first_child().unwrap();
        assert_eq!(item.attribute("data-model_id"), Some("rows.0".to_string()));
    }

    #[test]
    fn remove_entry_tracks_splices() {
        let store = three_items();
        let (mut renderer, container, _) = renderer(&store);
        renderer.set_start(0);
        renderer.set_count(Count::Fixed(2));
        renderer.render();

        let first = store.entry_id("", 0).unwrap();
        store.splice_at("", 0, 1, Vec::new());
        assert!(renderer.remove_entry(first));
        assert!(!renderer.remove_entry(first), "already destroyed");
        assert_eq!(renderer.materialized(), vec![1]);

        renderer.render();
        assert_eq!(renderer.materialized(), vec![0, 1]);
        assert_eq!(container.children().len(), 2);
    }

    #[test]
    fn item_subscriptions_die_with_the_item() {
        let store = three_items();
        let container = MemoryElement::new("ul");
        container.append_child(MemoryElement::new("li"));

        struct Subscribing {
            store: Store,
            ledger: Rc<SubscriptionLedger>,
            fired: Rc<RefCell<Vec<String>>>,
        }
        impl Applicator for Subscribing {
            fn apply(&self, element: &ElementRef) {
                let path = element.attribute("data-rows_id").unwrap();
                let fired = Rc::clone(&self.fired);
                let observed = path.clone();
                let sub = self.store.observe_value(&format!("{path}.title"), move |_| {
                    fired.borrow_mut().push(observed.clone());
                });
                self.ledger.deposit(sub);
            }
        }

        let ledger = Rc::new(SubscriptionLedger::new());
        let fired = Rc::new(RefCell::new(Vec::new()));
        let applicator = Rc::new(Subscribing {
            store: store.clone(),
            ledger: Rc::clone(&ledger),
            fired: Rc::clone(&fired),
        });
        let mut renderer =
            WindowRenderer::new(store.clone(), "", "rows", applicator, ledger, container);
        renderer.set_start(0);
        renderer.set_count(Count::All);
        renderer.render();

        renderer.remove_item(2);
        store.set("2.title", json!("changed"));
        store.set("0.title", json!("changed"));
        store.flush();

        assert_eq!(fired.borrow().as_slice(), &["0".to_string()]);
    }
}
