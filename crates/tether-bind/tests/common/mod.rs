#![forbid(unsafe_code)]
#![allow(dead_code)] // not every suite uses every helper

//! Minimal templating walker standing in for the composition layer: it
//! scans `data-<name>` attributes and feeds each directive to the binder.
//! A container handled by `foreach` is not descended into, since its
//! items are bound through the applicator when they are created.

use std::rc::Rc;

use tether_bind::{Applicator, Binder, WeakBinder};
use tether_host::{ElementRef, display_text};

pub struct Templater {
    binder: WeakBinder,
}

impl Templater {
    /// Build a walker for `binder` and install it as the binder's
    /// applicator. Holds the binder weakly; the binder owns the walker.
    pub fn install(binder: &Binder) -> Rc<Self> {
        let templater = Rc::new(Self {
            binder: binder.downgrade(),
        });
        binder.set_applicator(templater.clone());
        templater
    }

    fn walk(binder: &Binder, attr: &str, element: &ElementRef) {
        let mut handled_foreach = false;
        if let Some(source) = element.attribute(attr) {
            for directive in source.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                handled_foreach |= directive.starts_with("foreach");
                binder
                    .apply_directive(element, directive)
                    .expect("directive applies");
            }
        }
        if !handled_foreach {
            for child in element.children() {
                Self::walk(binder, attr, &child);
            }
        }
    }
}

impl Applicator for Templater {
    fn apply(&self, element: &ElementRef) {
        let Some(binder) = self.binder.upgrade() else {
            return;
        };
        let attr = format!("data-{}", binder.name());
        Self::walk(&binder, &attr, element);
    }
}

/// Rendered text of an element, reading its `innerHTML` property.
pub fn text(element: &ElementRef) -> String {
    element
        .property("innerHTML")
        .map(|value| display_text(&value))
        .unwrap_or_default()
}
