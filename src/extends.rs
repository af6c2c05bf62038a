//! Extends inheritance: directive detection, the wait set, and derived
//! fragments.
//!
//! A fragment whose first non-blank line is an extends directive, e.g.
//!
//! ```text
//! {{ extends "layouts/base" }}
//! {% block body %}...{% endblock %}
//! ```
//!
//! is not registered in the plain store. Its directive line is stripped and
//! the remainder is turned into a *derived* fragment: a new immutable
//! artifact whose engine source inherits from the base and carries the
//! child's block overrides. Derived fragments live in a separate
//! with-extends map that every lookup consults before the plain store, so a
//! name with an extends-derived form always resolves to that form. The base
//! is never touched, which is what keeps two children of the same base (and
//! the base itself) isolated from each other's overrides.
//!
//! Canonical directive grammar: the first non-blank line only, consisting of
//! the configured left delimiter, optional whitespace, the literal word
//! `extends`, whitespace, a base name in straight quotes, single quotes, or
//! bare, optional whitespace, and the right delimiter. No trailing argument
//! is accepted. The directive line and its trailing newline are removed
//! before the body is parsed; a directive on any other line is not
//! recognized.
//!
//! A child loaded in bulk before its base goes into the wait set and is
//! resolved after the bulk load completes. Resolution iterates to a
//! fixpoint, so a pending child may itself serve as the base of another
//! pending child regardless of map iteration order.

use std::collections::HashMap;
use std::path::PathBuf;

use regex::Regex;

use crate::options::Delims;
use crate::store::Fragment;

/// A child fragment parked until its declared base becomes available.
#[derive(Debug, Clone)]
pub(crate) struct PendingExtends {
    /// Source text as loaded (directive included).
    pub source: String,
    /// Directive-stripped remainder.
    pub body: String,
    /// File the child was loaded from, if any.
    pub file: Option<PathBuf>,
}

/// Bookkeeping for the extends feature: child → base edges, the wait set,
/// and the with-extends map of derived fragments.
#[derive(Debug, Default)]
pub(crate) struct ExtendsRegistry {
    /// Recorded `child → base` links, including resolved ones.
    pub links: HashMap<String, String>,
    /// Wait set: children whose base was unknown at load time.
    pub pending: HashMap<String, PendingExtends>,
    /// Derived fragments, keyed by child name. Kept apart from the plain
    /// store so ordinary lookups cannot bypass inheritance semantics.
    pub derived: HashMap<String, Fragment>,
}

impl ExtendsRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Lookup in the with-extends map, normalized name first, raw fallback.
    pub(crate) fn get<'a>(&'a self, cleaned: &str, raw: &str) -> Option<&'a Fragment> {
        if let Some(frag) = self.derived.get(cleaned) {
            return Some(frag);
        }
        if cleaned.len() != raw.len() {
            return self.derived.get(raw);
        }
        None
    }
}

/// Split an extends directive off the front of `source`.
///
/// Returns `(base_name, remaining_body)` when the first non-blank line is a
/// directive, `None` otherwise.
pub(crate) fn split_directive(source: &str, delims: &Delims) -> Option<(String, String)> {
    let trimmed = source.trim_start_matches(['\n', '\r', '\t', ' ']);
    let (first_line, rest) = match trimmed.find('\n') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => (trimmed, ""),
    };

    let base = match_directive_line(first_line, delims)?;
    Some((base, rest.to_string()))
}

/// Match a single line against the directive grammar.
fn match_directive_line(line: &str, delims: &Delims) -> Option<String> {
    // Cheap pre-checks before compiling the pattern; loads are rare enough
    // that an uncached Regex::new is fine here.
    let line = line.trim_end();
    if !line.contains("extends") {
        return None;
    }

    let pattern = format!(
        r#"^\s*{left}\s*extends\s+(?:"([^"]+)"|'([^']+)'|([^\s"']+))\s*{right}$"#,
        left = regex::escape(&delims.left),
        right = regex::escape(&delims.right),
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(line)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

/// Build the engine source for a derived fragment: an inheritance header
/// naming the base, followed by the directive-stripped child body.
pub(crate) fn derived_source(base: &str, body: &str) -> String {
    format!("{{% extends {base:?} %}}{body}")
}
