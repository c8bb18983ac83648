#![forbid(unsafe_code)]

//! Binding scalar and nested-object paths to individual elements.

mod common;

use common::{Templater, text};
use serde_json::{Value, json};
use tether_bind::{Applicator, Binder};
use tether_host::{Element, ElementRef, MemoryElement};
use tether_model::Store;

struct View {
    store: Store,
    /// Keeps the bindings' observers alive for the test's duration.
    _binder: Binder,
    firstname: ElementRef,
    lastname: ElementRef,
    seam: ElementRef,
}

fn setup(model: Value) -> View {
    let store = Store::new(model);
    let binder = Binder::new(store.clone());
    binder.set_name("bind");
    let templater = Templater::install(&binder);

    let root = MemoryElement::new("div");
    let firstname = MemoryElement::new("span");
    firstname.set_attribute("data-bind", "bind:innerHTML, firstname");
    let lastname = MemoryElement::new("span");
    lastname.set_attribute("data-bind", "bind:innerHTML, lastname");
    let seam = MemoryElement::new("span");
    seam.set_attribute("data-bind", "bind:innerHTML, plugins.seam");
    root.append_child(firstname.clone());
    root.append_child(lastname.clone());
    root.append_child(seam.clone());

    let root: ElementRef = root;
    templater.apply(&root);

    View {
        store,
        _binder: binder,
        firstname,
        lastname,
        seam,
    }
}

fn sample() -> Value {
    json!({
        "firstname": "Olivier",
        "plugins": {"seam": "views"}
    })
}

#[test]
fn initial_values_render_and_absent_paths_stay_blank() {
    let view = setup(sample());
    assert_eq!(text(&view.firstname), "Olivier");
    assert_eq!(text(&view.seam), "views");
    assert_eq!(view.lastname.property("innerHTML"), None, "no write for a missing path");
}

#[test]
fn changes_deliver_only_after_flush() {
    let view = setup(sample());
    view.store.set("firstname", json!("Ada"));
    assert_eq!(text(&view.firstname), "Olivier", "deferred until flush");
    view.store.flush();
    assert_eq!(text(&view.firstname), "Ada");
}

#[test]
fn late_populated_path_starts_rendering() {
    let view = setup(sample());
    view.store.set("lastname", json!("Scherrer"));
    view.store.flush();
    assert_eq!(text(&view.lastname), "Scherrer");
}

#[test]
fn deleting_a_value_clears_the_element() {
    let view = setup(sample());
    view.store.delete("firstname");
    view.store.flush();
    assert_eq!(view.firstname.property("innerHTML"), Some(Value::Null));
    assert_eq!(text(&view.firstname), "");
}

#[test]
fn replacing_an_ancestor_container_rebinds() {
    let view = setup(sample());
    view.store.set("plugins", json!({"seam": "templating"}));
    view.store.flush();
    assert_eq!(text(&view.seam), "templating");

    view.store.delete("plugins");
    view.store.flush();
    assert_eq!(text(&view.seam), "");

    view.store.set("plugins", json!({"seam": "views"}));
    view.store.flush();
    assert_eq!(text(&view.seam), "views", "subscription survives the container swap");
}

#[test]
fn several_writes_observe_the_settled_state() {
    let view = setup(sample());
    view.store.set("firstname", json!("one"));
    view.store.set("firstname", json!("two"));
    view.store.flush();
    assert_eq!(text(&view.firstname), "two");
}

#[test]
fn zero_and_false_render_but_empty_string_does_not() {
    let store = Store::new(json!({"zero": 0, "flag": false, "blank": ""}));
    let binder = Binder::new(store.clone());
    binder.set_name("bind");
    Templater::install(&binder);

    let zero: ElementRef = MemoryElement::new("span");
    let flag: ElementRef = MemoryElement::new("span");
    let blank: ElementRef = MemoryElement::new("span");
    binder.bind(&zero, "innerHTML", "zero", None, &[]).unwrap();
    binder.bind(&flag, "innerHTML", "flag", None, &[]).unwrap();
    binder.bind(&blank, "innerHTML", "blank", None, &[]).unwrap();

    assert_eq!(zero.property("innerHTML"), Some(json!(0)));
    assert_eq!(flag.property("innerHTML"), Some(json!(false)));
    assert_eq!(blank.property("innerHTML"), None, "empty string is not meaningful");

    // Change-driven writes land regardless.
    store.set("blank", json!("filled"));
    store.flush();
    assert_eq!(text(&blank), "filled");
}

#[test]
fn fan_out_to_multiple_elements_on_one_path() {
    let store = Store::new(json!({"firstname": "Olivier"}));
    let binder = Binder::new(store.clone());
    Templater::install(&binder);

    let elements: Vec<ElementRef> = (0..3).map(|_| -> ElementRef { MemoryElement::new("span") }).collect();
    for element in &elements {
        binder.bind(element, "innerHTML", "firstname", None, &[]).unwrap();
    }

    store.set("firstname", json!("Ada"));
    store.flush();
    for element in &elements {
        assert_eq!(text(element), "Ada");
    }
}

#[test]
fn vector_elements_take_attribute_writes() {
    let store = Store::new(json!({"cx": 40}));
    let binder = Binder::new(store.clone());
    Templater::install(&binder);

    let ellipse: ElementRef = MemoryElement::vector("ellipse");
    binder.bind(&ellipse, "cx", "cx", None, &[]).unwrap();
    assert_eq!(ellipse.attribute("cx"), Some("40".to_string()));

    store.set("cx", json!(55));
    store.flush();
    assert_eq!(ellipse.attribute("cx"), Some("55".to_string()));
}

#[test]
fn foreign_elements_fail_the_initial_write() {
    let store = Store::new(json!({"x": 1}));
    let binder = Binder::new(store);
    Templater::install(&binder);

    let foreign: ElementRef = MemoryElement::foreign("mystery");
    let result = binder.bind(&foreign, "x", "x", None, &[]);
    assert!(result.is_err());
}

#[test]
fn dropping_the_binder_releases_its_subscriptions() {
    let store = Store::new(json!({"firstname": "Olivier"}));
    let element: ElementRef = MemoryElement::new("span");
    {
        let binder = Binder::new(store.clone());
        Templater::install(&binder);
        binder.bind(&element, "innerHTML", "firstname", None, &[]).unwrap();
    }
    store.set("firstname", json!("Ada"));
    store.flush();
    assert_eq!(text(&element), "Olivier", "observer died with the binder");
}

#[test]
fn rc_is_enough_to_keep_shared_state() {
    let store = Store::new(json!({"firstname": "Olivier"}));
    let binder = Binder::new(store.clone());
    let clone = binder.clone();
    clone.set_name("bind");
    assert_eq!(binder.name(), "bind", "clones share state");
}
