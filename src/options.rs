//! Renderer configuration.
//!
//! [`Options`] is a plain config struct consumed once at construction; every
//! field has a sensible default so `Renderer::default()` works out of the box.
//! Delimiters and extension names are frozen when [`init`](crate::Renderer::init)
//! runs, since the engine binds both at parse time.

use std::path::PathBuf;

/// Left/right delimiter pair applied to every fragment parsed by a renderer
/// instance.
///
/// The pair maps to the engine's *expression* delimiters; block-tag
/// delimiters (`{% ... %}`) stay at the engine defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delims {
    /// Left delimiter, e.g. `{{`.
    pub left: String,
    /// Right delimiter, e.g. `}}`.
    pub right: String,
}

impl Delims {
    /// Create a delimiter pair.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.left.is_empty() || self.right.is_empty()
    }
}

impl Default for Delims {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Configuration for a [`Renderer`](crate::Renderer).
///
/// # Examples
///
/// ```
/// use tplkit::Options;
///
/// let opts = Options::new()
///     .with_layout("layouts/main")
///     .with_ext_names(["tpl", "html"]);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Default layout fragment name applied by `render`. Empty means no
    /// default layout is configured.
    pub layout: String,
    /// Directories walked (recursively) at init time; files with a
    /// recognized extension are loaded automatically.
    pub views_dirs: Vec<PathBuf>,
    /// Recognized template extensions, without the dot prefix.
    /// Defaults to `["tpl", "html"]`.
    pub ext_names: Vec<String>,
    /// Expression delimiter pair. Defaults to `{{` / `}}`.
    pub delims: Delims,
    /// Disable default-layout application. An explicit layout passed to
    /// `render_with_layout` still applies.
    pub disable_layout: bool,
    /// Enable first-line `extends` directive handling. On by default.
    pub enable_extends: bool,
}

impl Options {
    /// Options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default layout name.
    #[must_use]
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self.disable_layout = false;
        self
    }

    /// Disable default-layout application.
    #[must_use]
    pub fn without_layout(mut self) -> Self {
        self.layout.clear();
        self.disable_layout = true;
        self
    }

    /// Add a views directory to auto-load at init time.
    #[must_use]
    pub fn with_views_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.views_dirs.push(dir.into());
        self
    }

    /// Replace the recognized extension list (names without dot).
    #[must_use]
    pub fn with_ext_names<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ext_names = exts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expression delimiter pair.
    #[must_use]
    pub fn with_delims(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.delims = Delims::new(left, right);
        self
    }

    /// Disable first-line `extends` directive handling.
    #[must_use]
    pub fn without_extends(mut self) -> Self {
        self.enable_extends = false;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            layout: String::new(),
            views_dirs: Vec::new(),
            ext_names: vec!["tpl".to_string(), "html".to_string()],
            delims: Delims::default(),
            disable_layout: false,
            enable_extends: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.ext_names, ["tpl", "html"]);
        assert_eq!(opts.delims, Delims::new("{{", "}}"));
        assert!(opts.layout.is_empty());
        assert!(!opts.disable_layout);
        assert!(opts.enable_extends);
    }

    #[test]
    fn builder_chain() {
        let opts = Options::new()
            .with_layout("main")
            .with_views_dir("views")
            .with_delims("<%", "%>")
            .with_ext_names(["tpl"]);
        assert_eq!(opts.layout, "main");
        assert_eq!(opts.views_dirs, [PathBuf::from("views")]);
        assert_eq!(opts.delims, Delims::new("<%", "%>"));
        assert_eq!(opts.ext_names, ["tpl"]);
    }

    #[test]
    fn without_layout_clears_default() {
        let opts = Options::new().with_layout("main").without_layout();
        assert!(opts.layout.is_empty());
        assert!(opts.disable_layout);
    }
}
