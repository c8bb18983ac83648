#![forbid(unsafe_code)]

//! Model layer for Tether: path resolution and an observable value store.
//!
//! - [`path`]: pure navigation of dot-separated paths into a
//!   [`serde_json::Value`] tree.
//! - [`store`]: [`Store`], a shared wrapper around one model root that
//!   intercepts mutations and delivers change notifications through an
//!   explicit deferred queue.
//!
//! # Architecture
//!
//! `Store` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are registered per path string and removed by RAII
//! [`Subscription`] guards. Mutation detection is synchronous; delivery is
//! deferred until [`Store::flush`] drains the pending queue, so a mutator
//! can perform several writes and have subscribers observe the settled
//! state.

pub mod path;
pub mod store;

pub use store::{Added, Change, EntryId, Removed, Splice, Store, Subscription};
