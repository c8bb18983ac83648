#![forbid(unsafe_code)]

//! Annotation grammar for binding directives.
//!
//! A directive is `<operation>[:<arg>, <arg>, ...]`. Arguments are
//! comma-separated and trimmed. Two operations exist:
//!
//! - `bind:<target>[, <path>][, <name>][, <extra>...]` binds one element
//!   property or attribute to a model path. `name` selects the handler to
//!   dispatch to and defaults to `target`; further arguments are passed
//!   to the handler verbatim.
//! - `foreach[:<name>, <start>, <count>]` marks a container as a
//!   windowed list. `count` accepts `*` or `all` for an unbounded
//!   window. Window parameters may also arrive later through the
//!   orchestrator, so each argument is optional.
//!
//! Unknown operations and malformed arguments parse to `None`; the
//! caller skips them rather than failing the whole tree.

use crate::window::Count;

/// A parsed binding annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Bind one element target to a model path.
    Bind {
        /// Property or attribute to write.
        target: String,
        /// Model path relative to the element's owning context. Empty
        /// means the context value itself.
        path: String,
        /// Handler name; `None` falls back to `target`.
        name: Option<String>,
        /// Static arguments forwarded to the handler.
        extras: Vec<String>,
    },
    /// Declare a windowed list over an array.
    Foreach {
        /// Renderer name used by later window updates.
        name: Option<String>,
        /// First model index of the window.
        start: Option<usize>,
        /// Window size.
        count: Option<Count>,
    },
}

/// Parse one directive source string.
#[must_use]
pub fn parse(source: &str) -> Option<Directive> {
    let source = source.trim();
    let (operation, rest) = match source.split_once(':') {
        Some((operation, rest)) => (operation.trim(), rest),
        None => (source, ""),
    };
    let args: Vec<&str> = if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    match operation {
        "bind" => {
            let target = (*args.first()?).to_string();
            if target.is_empty() {
                return None;
            }
            let path = args.get(1).copied().unwrap_or("").to_string();
            let name = args
                .get(2)
                .filter(|s| !s.is_empty())
                .map(|s| (*s).to_string());
            let extras = args.iter().skip(3).map(|s| (*s).to_string()).collect();
            Some(Directive::Bind {
                target,
                path,
                name,
                extras,
            })
        }
        "foreach" => {
            let name = args
                .first()
                .filter(|s| !s.is_empty())
                .map(|s| (*s).to_string());
            let start = args.get(1).and_then(|s| s.parse().ok());
            let count = args.get(2).and_then(|s| parse_count(s));
            Some(Directive::Foreach { name, start, count })
        }
        _ => None,
    }
}

/// Parse a window size argument: `*` and `all` mean unbounded.
#[must_use]
pub fn parse_count(source: &str) -> Option<Count> {
    match source.trim() {
        "*" | "all" => Some(Count::All),
        other => other.parse().ok().map(Count::Fixed),
    }
}
