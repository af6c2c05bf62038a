//! Fragment store: the plain name → fragment registry.
//!
//! Names are normalized by stripping a recognized extension, so `home.tpl`
//! and `home` address the same fragment. Lookups accept either form: the
//! normalized name is tried first and, when normalization changed the
//! string, the raw name is tried as a fallback. At most one fragment exists
//! per name; re-registering replaces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A named, parsed, independently executable template unit.
///
/// The compiled form lives inside the renderer's engine environment, keyed
/// by [`name`](Fragment::name); a `Fragment` carries the immutable source
/// text and load metadata.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub(crate) name: String,
    pub(crate) source: String,
    pub(crate) body: String,
    pub(crate) base: Option<String>,
    pub(crate) file: Option<PathBuf>,
}

impl Fragment {
    /// Canonical registry name (extension-stripped).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text exactly as loaded.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Base fragment name, when this fragment was derived from an
    /// `extends` directive.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Path the fragment was loaded from, for file-backed fragments.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// The engine-facing source: identical to [`source`](Fragment::source)
    /// for plain fragments, or the derived inheritance artifact for
    /// extends-children.
    pub(crate) fn body(&self) -> &str {
        &self.body
    }
}

/// Strip a recognized extension (entries carry their dot prefix) from a
/// fragment name.
///
/// Only the final path segment is inspected, so a dotted directory name
/// never loses characters: `v1.2/home.tpl` → `v1.2/home`. A hidden-style
/// segment whose whole name is the extension (`.tpl`, `dir/.tpl`) stays
/// intact.
pub(crate) fn strip_ext<'a>(name: &'a str, exts: &[String]) -> &'a str {
    let last_seg = name.rfind('/').map_or(0, |i| i + 1);
    if let Some(pos) = name[last_seg..].rfind('.') {
        if pos > 0 && exts.iter().any(|e| e == &name[last_seg + pos..]) {
            return &name[..last_seg + pos];
        }
    }
    name
}

/// Plain fragment registry with extension-aware name normalization.
#[derive(Debug, Default)]
pub(crate) struct FragmentStore {
    frags: HashMap<String, Fragment>,
    /// Recognized extensions, with dot prefix (e.g. `.tpl`). Set at init.
    exts: Vec<String>,
}

impl FragmentStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Install the recognized extension list (names given without dot).
    pub(crate) fn set_ext_names(&mut self, names: &[String]) {
        self.exts = names
            .iter()
            .map(|e| {
                if e.starts_with('.') {
                    e.clone()
                } else {
                    format!(".{e}")
                }
            })
            .collect();
    }

    pub(crate) fn is_valid_ext(&self, ext_with_dot: &str) -> bool {
        self.exts.iter().any(|e| e == ext_with_dot)
    }

    /// Strip a recognized extension for the canonical registry key.
    pub(crate) fn clean_ext<'a>(&self, name: &'a str) -> &'a str {
        strip_ext(name, &self.exts)
    }

    /// Insert a fragment under its canonical name, replacing any previous
    /// fragment with that name.
    pub(crate) fn insert(&mut self, frag: Fragment) {
        self.frags.insert(frag.name.clone(), frag);
    }

    /// Normalized lookup with raw-name fallback.
    pub(crate) fn get(&self, name: &str) -> Option<&Fragment> {
        let cleaned = self.clean_ext(name);
        if let Some(frag) = self.frags.get(cleaned) {
            return Some(frag);
        }
        if cleaned.len() != name.len() {
            return self.frags.get(name);
        }
        None
    }

    /// Names of all plain fragments, in stable (sorted) order. Diagnostic
    /// only; the ordering carries no semantics.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frags.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.frags.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.frags.len()
    }
}
