#![forbid(unsafe_code)]

//! Named binding handlers.
//!
//! A handler owns the element update for one binding name. When a bound
//! value changes, the orchestrator dispatches to the handler registered
//! under the binding's name; only when no handler exists does the default
//! direct write apply. Registering a handler also opts the binding out of
//! element-to-model sync, since the handler may render the value in a
//! form that cannot be read back.

use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tracing::debug;

use tether_host::ElementRef;

/// A binding handler: receives the element, the target property or
/// attribute name, the resolved value, and the directive's static extras.
pub type BindingHandler = Rc<dyn Fn(&ElementRef, &str, &Value, &[String])>;

/// Registry of binding handlers keyed by name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: AHashMap<String, BindingHandler>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    /// Returns `false` without registering when `name` is not a valid
    /// identifier.
    pub fn register(&mut self, name: &str, handler: BindingHandler) -> bool {
        if !is_identifier(name) {
            debug!(name, "rejected handler with invalid name");
            return false;
        }
        self.handlers.insert(name.to_string(), handler);
        true
    }

    /// Register a closure under `name`. See [`Self::register`].
    pub fn register_fn(
        &mut self,
        name: &str,
        handler: impl Fn(&ElementRef, &str, &Value, &[String]) + 'static,
    ) -> bool {
        self.register(name, Rc::new(handler))
    }

    /// Register every `(name, handler)` pair, returning how many were
    /// accepted.
    pub fn register_all(
        &mut self,
        handlers: impl IntoIterator<Item = (String, BindingHandler)>,
    ) -> usize {
        handlers
            .into_iter()
            .filter(|(name, handler)| self.register(name, Rc::clone(handler)))
            .count()
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// The handler registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BindingHandler> {
        self.handlers.get(name).cloned()
    }

    /// Invoke the handler registered under `name`. Returns whether a
    /// handler existed and was invoked.
    pub fn dispatch(
        &self,
        name: &str,
        element: &ElementRef,
        target: &str,
        value: &Value,
        extras: &[String],
    ) -> bool {
        match self.handlers.get(name) {
            Some(handler) => {
                handler(element, target, value, extras);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Binding names are identifiers: a letter or underscore, then letters,
/// digits, or underscores.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
