#![forbid(unsafe_code)]

//! In-memory element tree implementing the [`Element`] contract.
//!
//! Used by the engine's test suites and by hosts that render somewhere
//! other than a browser DOM. Listeners are fired synchronously by
//! [`MemoryElement::emit`].

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;

use crate::{Element, ElementKind, ElementRef, same_element};

/// A plain element node: tag, kind, attributes, properties, children,
/// and event listeners. Always handled through `Rc<MemoryElement>`.
pub struct MemoryElement {
    tag: String,
    kind: ElementKind,
    attributes: RefCell<AHashMap<String, String>>,
    properties: RefCell<AHashMap<String, Value>>,
    children: RefCell<Vec<ElementRef>>,
    listeners: RefCell<AHashMap<String, Vec<Rc<dyn Fn()>>>>,
}

impl MemoryElement {
    /// A markup element.
    #[must_use]
    pub fn new(tag: &str) -> Rc<Self> {
        Self::with_kind(tag, ElementKind::Markup)
    }

    /// A vector-graphics element.
    #[must_use]
    pub fn vector(tag: &str) -> Rc<Self> {
        Self::with_kind(tag, ElementKind::Vector)
    }

    /// An element outside both namespaces; default writes against it fail.
    #[must_use]
    pub fn foreign(tag: &str) -> Rc<Self> {
        Self::with_kind(tag, ElementKind::Foreign)
    }

    fn with_kind(tag: &str, kind: ElementKind) -> Rc<Self> {
        Rc::new(Self {
            tag: tag.to_string(),
            kind,
            attributes: RefCell::new(AHashMap::new()),
            properties: RefCell::new(AHashMap::new()),
            children: RefCell::new(Vec::new()),
            listeners: RefCell::new(AHashMap::new()),
        })
    }

    /// Descendants with the given tag, in depth-first order. Test helper.
    #[must_use]
    pub fn query(self: &Rc<Self>, tag: &str) -> Vec<ElementRef> {
        self.descendants()
            .into_iter()
            .filter(|el| el.tag() == tag)
            .collect()
    }
}

impl Element for MemoryElement {
    fn tag(&self) -> String {
        self.tag.clone()
    }

    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn clone_deep(&self) -> ElementRef {
        let copy = MemoryElement::with_kind(&self.tag, self.kind);
        *copy.attributes.borrow_mut() = self.attributes.borrow().clone();
        for child in self.children.borrow().iter() {
            copy.children.borrow_mut().push(child.clone_deep());
        }
        copy
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    fn set_property(&self, name: &str, value: Value) {
        self.properties.borrow_mut().insert(name.to_string(), value);
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    fn append_child(&self, child: ElementRef) {
        self.children.borrow_mut().push(child);
    }

    fn remove_child(&self, child: &ElementRef) -> bool {
        let mut children = self.children.borrow_mut();
        match children.iter().position(|c| same_element(c, child)) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }

    fn first_child(&self) -> Option<ElementRef> {
        self.children.borrow().first().cloned()
    }

    fn children(&self) -> Vec<ElementRef> {
        self.children.borrow().clone()
    }

    fn descendants(&self) -> Vec<ElementRef> {
        let mut out = Vec::new();
        for child in self.children.borrow().iter() {
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }

    fn add_listener(&self, event: &str, callback: Rc<dyn Fn()>) {
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    fn emit(&self, event: &str) {
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .listeners
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            callback();
        }
    }
}
