#![forbid(unsafe_code)]

//! Element capability contract for Tether.
//!
//! The binding engine never talks to a concrete DOM. It consumes the
//! narrow [`Element`] trait: deep cloning, property/attribute writes
//! selected by [`ElementKind`], child management, and event listener
//! registration. [`MemoryElement`] implements the contract in memory for
//! tests and for hosts without a real element tree.
//!
//! # Invariants
//!
//! 1. Element identity is `Rc` allocation identity: two [`ElementRef`]s
//!    refer to the same element iff `Rc::ptr_eq` holds.
//! 2. The default write ([`write_value`]) targets a property for
//!    [`ElementKind::Markup`], an attribute for [`ElementKind::Vector`],
//!    and fails with [`HostError::InvalidElementType`] for
//!    [`ElementKind::Foreign`].
//! 3. `clone_deep` copies structure and attributes, never properties or
//!    listeners.

pub mod memory;

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

pub use memory::MemoryElement;

/// Shared handle to one element.
pub type ElementRef = Rc<dyn Element>;

/// Namespace classification driving the default write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementKind {
    /// Generic markup element: default writes go to a property.
    Markup,
    /// Vector-graphics namespace: default writes go to an attribute.
    Vector,
    /// Anything else: default writes are a configuration error.
    Foreign,
}

/// Errors raised by element capability misuse.
#[derive(Clone, Debug)]
pub enum HostError {
    /// The write target is neither a markup nor a vector element.
    InvalidElementType,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidElementType => write!(f, "invalid element type"),
        }
    }
}

impl std::error::Error for HostError {}

/// The narrow element capability surface the engine consumes.
pub trait Element {
    /// Element tag name (lowercase).
    fn tag(&self) -> String;

    /// Namespace classification.
    fn kind(&self) -> ElementKind;

    /// Deep copy of this element: tag, kind, attributes, and children.
    /// Properties and listeners are not cloned.
    fn clone_deep(&self) -> ElementRef;

    /// Current value of a named property.
    fn property(&self, name: &str) -> Option<Value>;

    /// Write a named property.
    fn set_property(&self, name: &str, value: Value);

    /// Current value of a named attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Write a named attribute.
    fn set_attribute(&self, name: &str, value: &str);

    /// Append `child` as the last child.
    fn append_child(&self, child: ElementRef);

    /// Detach `child`, returning whether it was present.
    fn remove_child(&self, child: &ElementRef) -> bool;

    /// First child, if any.
    fn first_child(&self) -> Option<ElementRef>;

    /// Direct children in order.
    fn children(&self) -> Vec<ElementRef>;

    /// Strict descendants in depth-first order (excluding `self`).
    fn descendants(&self) -> Vec<ElementRef>;

    /// Register a callback for a named event (`"change"`, `"submit"`).
    fn add_listener(&self, event: &str, callback: Rc<dyn Fn()>);

    /// Fire all callbacks registered for `event`.
    fn emit(&self, event: &str);
}

/// Default direct write: property for markup, attribute for vector,
/// error for anything else.
pub fn write_value(element: &dyn Element, name: &str, value: &Value) -> Result<(), HostError> {
    match element.kind() {
        ElementKind::Markup => {
            element.set_property(name, value.clone());
            Ok(())
        }
        ElementKind::Vector => {
            element.set_attribute(name, &display_text(value));
            Ok(())
        }
        ElementKind::Foreign => Err(HostError::InvalidElementType),
    }
}

/// Presentation text for a value: bare strings stay bare, absent values
/// render empty, everything else renders as JSON.
#[must_use]
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether two handles refer to the same element.
#[must_use]
pub fn same_element(a: &ElementRef, b: &ElementRef) -> bool {
    Rc::ptr_eq(a, b)
}
