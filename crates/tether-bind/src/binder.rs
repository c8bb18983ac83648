#![forbid(unsafe_code)]

//! Binding orchestrator.
//!
//! A [`Binder`] ties one [`Store`] to an element tree: it resolves
//! directive paths against the element's owning context, performs the
//! initial write, opens the change observer, wires element-to-model sync
//! for unhandled bindings, and manages the named window renderers behind
//! `foreach`.
//!
//! # Invariants
//!
//! 1. An element inside a rendered list resolves relative paths through
//!    the `data-<name>_id` attribute stamped by the window renderer;
//!    everything else resolves against the model root.
//! 2. The initial write is skipped unless the resolved value is
//!    meaningful: truthy, or exactly `0` or `false`.
//! 3. Change-driven writes always land, and a disappeared value writes
//!    null so the element clears.
//! 4. Element-to-model sync is wired only for binding names without a
//!    registered handler, and only writes paths the model already has.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |---|---|
//! | Initial or change write hits a foreign element | `bind` returns the error; change writes log a warning |
//! | `foreach` before an applicator is set | Returns `false`, no renderer registered |
//! | Window update for an unknown renderer name | Returns `false` |
//! | `form` on a non-form element | Returns `false`, no listener added |

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use serde_json::Value;
use tracing::{debug, warn};

use tether_host::{ElementRef, HostError, write_value};
use tether_model::{Store, Subscription};

use crate::registry::{BindingHandler, HandlerRegistry};
use crate::window::{Count, WindowRenderer};
use crate::{Applicator, Directive, SubscriptionLedger, directive};

/// Orchestrates bindings between one model and an element tree.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Binder {
    inner: Rc<BinderInner>,
}

struct BinderInner {
    store: Store,
    /// Context name: rendered items carry `data-<name>_id`.
    name: RefCell<String>,
    registry: RefCell<HandlerRegistry>,
    renderers: RefCell<AHashMap<String, Rc<RefCell<WindowRenderer>>>>,
    applicator: RefCell<Option<Rc<dyn Applicator>>>,
    ledger: Rc<SubscriptionLedger>,
    /// Subscriptions opened outside any rendered item; live as long as
    /// the binder.
    held: RefCell<Vec<Subscription>>,
}

impl Binder {
    /// A binder over `store` with the default context name `"model"`.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            inner: Rc::new(BinderInner {
                store,
                name: RefCell::new("model".to_string()),
                registry: RefCell::new(HandlerRegistry::new()),
                renderers: RefCell::new(AHashMap::new()),
                applicator: RefCell::new(None),
                ledger: Rc::new(SubscriptionLedger::new()),
                held: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A binder with handlers pre-registered.
    #[must_use]
    pub fn with_handlers(
        store: Store,
        handlers: impl IntoIterator<Item = (String, BindingHandler)>,
    ) -> Self {
        let binder = Self::new(store);
        binder.inner.registry.borrow_mut().register_all(handlers);
        binder
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// The context name stamped on rendered items.
    #[must_use]
    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.inner.name.borrow_mut() = name.to_string();
    }

    /// Install the templating callback used to bind rendered items.
    pub fn set_applicator(&self, applicator: Rc<dyn Applicator>) {
        *self.inner.applicator.borrow_mut() = Some(applicator);
    }

    /// Register a handler for a binding name. See [`HandlerRegistry::register`].
    pub fn register(
        &self,
        name: &str,
        handler: impl Fn(&ElementRef, &str, &Value, &[String]) + 'static,
    ) -> bool {
        self.inner.registry.borrow_mut().register_fn(name, handler)
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.inner.registry.borrow().contains(name)
    }

    /// Dispatch to the handler registered under `name`, returning whether
    /// one existed.
    pub fn dispatch(
        &self,
        name: &str,
        element: &ElementRef,
        target: &str,
        value: &Value,
        extras: &[String],
    ) -> bool {
        // Clone the handler out so it can re-enter the registry.
        let handler = self.inner.registry.borrow().get(name);
        match handler {
            Some(handler) => {
                handler(element, target, value, extras);
                true
            }
            None => false,
        }
    }

    /// Parse and apply one directive source on `element`. Returns whether
    /// the directive was recognized.
    pub fn apply_directive(&self, element: &ElementRef, source: &str) -> Result<bool, HostError> {
        match directive::parse(source) {
            Some(Directive::Bind {
                target,
                path,
                name,
                extras,
            }) => {
                self.bind(element, &target, &path, name.as_deref(), &extras)?;
                Ok(true)
            }
            Some(Directive::Foreach { name, start, count }) => Ok(self.foreach(
                element,
                name.as_deref().unwrap_or("default"),
                start.unwrap_or(0),
                count.unwrap_or(Count::All),
            )),
            None => {
                debug!(source, "skipping unrecognized directive");
                Ok(false)
            }
        }
    }

    /// Bind `element`'s `target` property or attribute to the model value
    /// at `path`, resolved relative to the element's owning context.
    ///
    /// Performs the initial write when the value is meaningful, opens the
    /// change observer, and wires element-to-model sync unless a handler
    /// owns the binding name.
    pub fn bind(
        &self,
        element: &ElementRef,
        target: &str,
        path: &str,
        name: Option<&str>,
        extras: &[String],
    ) -> Result<(), HostError> {
        let owner_attr = format!("data-{}_id", self.inner.name.borrow());
        let prefixed = match element.attribute(&owner_attr) {
            Some(id) if path.is_empty() => id,
            Some(id) => format!("{id}.{path}"),
            None => path.to_string(),
        };
        let dispatch_name = name.unwrap_or(target).to_string();
        let extras: Vec<String> = extras.to_vec();

        if let Some(value) = self.inner.store.get(&prefixed) {
            if is_meaningful(&value)
                && !self.dispatch(&dispatch_name, element, target, &value, &extras)
            {
                write_value(element.as_ref(), target, &value)?;
            }
        }

        // Element-to-model sync stays off when a handler owns the name:
        // the handler may render a form the element cannot read back.
        if !self.has_handler(&dispatch_name) {
            let store = self.inner.store.clone();
            let weak_element = Rc::downgrade(element);
            let sync_path = prefixed.clone();
            let sync_target = target.to_string();
            element.add_listener(
                "change",
                Rc::new(move || {
                    let Some(element) = weak_element.upgrade() else {
                        return;
                    };
                    if store.has(&sync_path) {
                        if let Some(value) = element.property(&sync_target) {
                            store.set(&sync_path, value);
                        }
                    }
                }),
            );
        }

        let weak_inner = Rc::downgrade(&self.inner);
        let weak_element = Rc::downgrade(element);
        let observed_target = target.to_string();
        let subscription = self.inner.store.observe_value(&prefixed, move |change| {
            let (Some(inner), Some(element)) = (weak_inner.upgrade(), weak_element.upgrade())
            else {
                return;
            };
            // A deleted value clears the element.
            let value = change.value.clone().unwrap_or(Value::Null);
            let handler = inner.registry.borrow().get(&dispatch_name);
            let handled = match handler {
                Some(handler) => {
                    handler(&element, &observed_target, &value, &extras);
                    true
                }
                None => false,
            };
            if !handled {
                if let Err(error) = write_value(element.as_ref(), &observed_target, &value) {
                    warn!(target = %observed_target, %error, "change-driven write failed");
                }
            }
        });
        self.hold(subscription);
        Ok(())
    }

    /// Declare a windowed list over the model root array. See
    /// [`Self::foreach_at`].
    pub fn foreach(&self, container: &ElementRef, name: &str, start: usize, count: Count) -> bool {
        self.foreach_at(container, name, "", start, count)
    }

    /// Declare a windowed list over the array at `array_path`, registered
    /// under `name` for later window updates. Renders immediately and
    /// re-renders when entries are added; splice removals destroy the
    /// affected items by identity.
    ///
    /// Returns `false` when no applicator has been installed.
    pub fn foreach_at(
        &self,
        container: &ElementRef,
        name: &str,
        array_path: &str,
        start: usize,
        count: Count,
    ) -> bool {
        let Some(applicator) = self.inner.applicator.borrow().clone() else {
            warn!(name, "foreach without an applicator");
            return false;
        };
        let owner = self.inner.name.borrow().clone();
        let mut renderer = WindowRenderer::new(
            self.inner.store.clone(),
            array_path,
            &owner,
            applicator,
            Rc::clone(&self.inner.ledger),
            container.clone(),
        );
        renderer.set_start(start);
        renderer.set_count(count);
        let renderer = Rc::new(RefCell::new(renderer));
        renderer.borrow_mut().render();

        let weak = Rc::downgrade(&renderer);
        let on_added = self.inner.store.observe_added(array_path, move |_| {
            if let Some(renderer) = weak.upgrade() {
                renderer.borrow_mut().render();
            }
        });
        let weak = Rc::downgrade(&renderer);
        let on_splice = self.inner.store.observe_splice(array_path, move |splice| {
            if let Some(renderer) = weak.upgrade() {
                let mut renderer = renderer.borrow_mut();
                for removed in &splice.removed {
                    renderer.remove_entry(removed.id);
                }
            }
        });
        self.hold(on_added);
        self.hold(on_splice);

        self.inner
            .renderers
            .borrow_mut()
            .insert(name.to_string(), renderer);
        true
    }

    /// Move the lower boundary of the named window. Takes effect on the
    /// next [`Self::refresh`].
    pub fn update_start(&self, name: &str, start: usize) -> bool {
        match self.renderer(name) {
            Some(renderer) => {
                renderer.borrow_mut().set_start(start);
                true
            }
            None => false,
        }
    }

    /// Resize the named window. Takes effect on the next [`Self::refresh`].
    pub fn update_count(&self, name: &str, count: Count) -> bool {
        match self.renderer(name) {
            Some(renderer) => {
                renderer.borrow_mut().set_count(count);
                true
            }
            None => false,
        }
    }

    /// Re-render the named window against the current model.
    pub fn refresh(&self, name: &str) -> bool {
        match self.renderer(name) {
            Some(renderer) => renderer.borrow_mut().render(),
            None => false,
        }
    }

    /// The named window renderer, if registered.
    #[must_use]
    pub fn renderer(&self, name: &str) -> Option<Rc<RefCell<WindowRenderer>>> {
        self.inner.renderers.borrow().get(name).cloned()
    }

    /// Model index of the rendered item owning `element`, read from its
    /// context id attribute.
    #[must_use]
    pub fn item_index(&self, element: &ElementRef) -> Option<usize> {
        let owner_attr = format!("data-{}_id", self.inner.name.borrow());
        let id = element.attribute(&owner_attr)?;
        id.rsplit('.').next()?.parse().ok()
    }

    /// Wire a form so that submitting it writes every named field back
    /// into the model. Only paths the model already has are written.
    /// Returns `false` for non-form elements.
    pub fn form(&self, element: &ElementRef) -> bool {
        if element.tag() != "form" {
            return false;
        }
        let store = self.inner.store.clone();
        let owner_attr = format!("data-{}_id", self.inner.name.borrow());
        let weak_form = Rc::downgrade(element);
        element.add_listener(
            "submit",
            Rc::new(move || {
                let Some(form) = weak_form.upgrade() else {
                    return;
                };
                for field in form.descendants() {
                    let Some(name) = field.attribute("name") else {
                        continue;
                    };
                    let path = match field.attribute(&owner_attr) {
                        Some(id) => format!("{id}.{name}"),
                        None => name,
                    };
                    if store.has(&path) {
                        if let Some(value) = field.property("value") {
                            store.set(&path, value);
                        }
                    }
                }
            }),
        );
        true
    }

    /// Keep `subscription` alive: deposited into the enclosing rendered
    /// item's scope when one is open, otherwise held by the binder.
    fn hold(&self, subscription: Subscription) {
        if let Some(subscription) = self.inner.ledger.deposit(subscription) {
            self.inner.held.borrow_mut().push(subscription);
        }
    }

    /// A handle that does not keep the binder alive. Collaborators the
    /// binder itself stores (such as the applicator) should hold this
    /// instead of a [`Binder`] to avoid a reference cycle.
    #[must_use]
    pub fn downgrade(&self) -> WeakBinder {
        WeakBinder {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Weak counterpart of [`Binder`].
#[derive(Clone)]
pub struct WeakBinder {
    inner: Weak<BinderInner>,
}

impl WeakBinder {
    #[must_use]
    pub fn upgrade(&self) -> Option<Binder> {
        self.inner.upgrade().map(|inner| Binder { inner })
    }
}

/// The initial write fires only for meaningful values: truthy ones, plus
/// the explicit carve-outs `0` and `false`. The empty string stays out.
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn meaningful_values() {
        assert!(is_meaningful(&json!(0)));
        assert!(is_meaningful(&json!(false)));
        assert!(is_meaningful(&json!("x")));
        assert!(is_meaningful(&json!([])));
        assert!(!is_meaningful(&json!("")));
        assert!(!is_meaningful(&Value::Null));
    }

    #[test]
    fn item_index_parses_the_last_segment() {
        use tether_host::MemoryElement;

        let binder = Binder::new(Store::new(json!([])));
        let el: ElementRef = MemoryElement::new("li");
        assert_eq!(binder.item_index(&el), None);

        el.set_attribute("data-model_id", "3");
        assert_eq!(binder.item_index(&el), Some(3));

        el.set_attribute("data-model_id", "rows.12");
        assert_eq!(binder.item_index(&el), Some(12));
    }
}
