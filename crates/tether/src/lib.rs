#![forbid(unsafe_code)]

//! Umbrella crate re-exporting the Tether stack.
//!
//! - [`model`]: observed JSON model with deferred change delivery
//!   ([`Store`], [`Subscription`]).
//! - [`host`]: the element capability contract ([`Element`],
//!   [`MemoryElement`]).
//! - [`bind`]: binding handlers, directives, windowed lists, and the
//!   [`Binder`] orchestrator.
//!
//! ```
//! use serde_json::json;
//! use tether::{Binder, MemoryElement, Store};
//!
//! let store = Store::new(json!({"firstname": "Ada"}));
//! let binder = Binder::new(store.clone());
//!
//! let span = MemoryElement::new("span");
//! let span: tether::ElementRef = span;
//! binder.bind(&span, "innerHTML", "firstname", None, &[]).unwrap();
//! assert_eq!(span.property("innerHTML"), Some(json!("Ada")));
//!
//! store.set("firstname", json!("Grace"));
//! store.flush();
//! assert_eq!(span.property("innerHTML"), Some(json!("Grace")));
//! ```

pub use tether_bind as bind;
pub use tether_host as host;
pub use tether_model as model;

pub use tether_bind::{
    Applicator, Binder, BindingHandler, Count, Directive, HandlerRegistry, SubscriptionLedger,
    WeakBinder, WindowRenderer,
};
pub use tether_host::{
    Element, ElementKind, ElementRef, HostError, MemoryElement, display_text, same_element,
    write_value,
};
pub use tether_model::{Added, Change, EntryId, Removed, Splice, Store, Subscription};
