#![forbid(unsafe_code)]

//! Binding engine for Tether.
//!
//! - [`registry`]: named binding handlers with a default-assign fallback.
//! - [`directive`]: the `bind:`/`foreach` annotation grammar.
//! - [`window`]: the windowed (virtualized) list renderer.
//! - [`binder`]: the orchestrator wiring elements, handlers, and window
//!   renderers to one observed model.
//!
//! The templating layer that discovers annotated elements stays outside
//! this crate; it reaches back in through [`Applicator`], the capability
//! the window renderer invokes on every freshly cloned item.

pub mod binder;
pub mod directive;
pub mod registry;
pub mod window;

use std::cell::RefCell;

use tether_host::ElementRef;
use tether_model::Subscription;

pub use binder::{Binder, WeakBinder};
pub use directive::Directive;
pub use registry::{BindingHandler, HandlerRegistry};
pub use window::{Count, WindowRenderer};

/// Capability owned by the templating collaborator: recursively apply all
/// registered bindings found on `element` and its annotated descendants.
pub trait Applicator {
    fn apply(&self, element: &ElementRef);
}

/// Scoped collector for observer handles.
///
/// While a rendered item is being created, every subscription its bound
/// descendants open is deposited into the innermost open scope. The window
/// renderer closes the scope and keeps the collected handles with the
/// item, so destroying the item releases exactly the subscriptions it
/// created. Without an open scope, deposits are handed back to the caller.
///
/// Scopes nest: an item containing a nested windowed list collects that
/// list's observer handles too, tying their lifetime to the outer item.
#[derive(Default)]
pub struct SubscriptionLedger {
    scopes: RefCell<Vec<Vec<Subscription>>>,
}

impl SubscriptionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new innermost scope.
    pub fn begin(&self) {
        self.scopes.borrow_mut().push(Vec::new());
    }

    /// Close the innermost scope, returning everything deposited into it.
    pub fn end(&self) -> Vec<Subscription> {
        self.scopes.borrow_mut().pop().unwrap_or_default()
    }

    /// Deposit `subscription` into the innermost open scope, or hand it
    /// back when no scope is open.
    pub fn deposit(&self, subscription: Subscription) -> Option<Subscription> {
        let mut scopes = self.scopes.borrow_mut();
        match scopes.last_mut() {
            Some(scope) => {
                scope.push(subscription);
                None
            }
            None => Some(subscription),
        }
    }

    /// Number of open scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.borrow().len()
    }
}
