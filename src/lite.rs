//! Minimal string substitution without the expression engine.
//!
//! [`LiteTemplate`] handles the "just replace some variables" cases that do
//! not justify a full renderer: configurable delimiters, `{{ name | fallback }}`
//! default values, a single-argument filter pipeline, and a hook for
//! variables missing from the data map. It shares nothing with
//! [`Renderer`](crate::Renderer) and registers nothing anywhere.
//!
//! Pipe segments after the variable name are interpreted in order: a segment
//! naming a registered filter is applied to the current value; any other
//! segment is the fallback used when the variable does not resolve. Filters
//! run after fallback substitution, so `{{ name | guest | upper }}` yields
//! `GUEST` for a missing `name`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::options::Delims;

/// A single-argument string filter for [`LiteTemplate`].
pub type LiteFilter = Arc<dyn Fn(&str) -> String + Send + Sync + 'static>;

/// Hook consulted for variables absent from the data map, before any
/// fallback applies.
pub type NotFoundHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync + 'static>;

/// Lightweight variable substitution over plain string maps.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use tplkit::lite::LiteTemplate;
///
/// let lt = LiteTemplate::new();
/// let vars = HashMap::from([("name".to_string(), "sam".to_string())]);
/// let out = lt.render("hi {{ name }}, role: {{ role | guest }}", &vars);
/// assert_eq!(out, "hi sam, role: guest");
/// ```
pub struct LiteTemplate {
    delims: Delims,
    filters: HashMap<String, LiteFilter>,
    not_found: Option<NotFoundHook>,
}

impl Default for LiteTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteTemplate {
    /// A lite template with `{{` / `}}` delimiters, the standard filters,
    /// and no not-found hook.
    pub fn new() -> Self {
        Self::with_delims(Delims::default())
    }

    /// A lite template with custom variable delimiters.
    pub fn with_delims(delims: Delims) -> Self {
        let mut lt = Self {
            delims,
            filters: HashMap::new(),
            not_found: None,
        };
        lt.add_filter("upper", |s| s.to_uppercase());
        lt.add_filter("lower", |s| s.to_lowercase());
        lt.add_filter("trim", |s| s.trim().to_string());
        lt
    }

    /// The configured delimiter pair.
    pub fn delims(&self) -> &Delims {
        &self.delims
    }

    /// Register or replace a named filter.
    pub fn add_filter<F>(&mut self, name: &str, filter: F) -> &mut Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.filters.insert(name.to_string(), Arc::new(filter));
        self
    }

    /// Install a hook consulted for variables absent from the data map.
    pub fn on_not_found<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(hook));
        self
    }

    /// Substitute variables in `source` from `vars`. Unresolved variables
    /// with no fallback render as the empty string.
    pub fn render(&self, source: &str, vars: &HashMap<String, String>) -> String {
        self.render_collect(source, vars).0
    }

    /// Like [`render`](Self::render), additionally returning the names of
    /// variables that did not resolve (no map entry, no hook answer, no
    /// fallback), in order of first appearance.
    pub fn render_collect(
        &self,
        source: &str,
        vars: &HashMap<String, String>,
    ) -> (String, Vec<String>) {
        let mut missing: Vec<String> = Vec::new();
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find(&self.delims.left) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.delims.left.len()..];
            match after.find(&self.delims.right) {
                Some(end) => {
                    out.push_str(&self.substitute(after[..end].trim(), vars, &mut missing));
                    rest = &after[end + self.delims.right.len()..];
                }
                None => {
                    // unmatched left delimiter stays literal
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        (out, missing)
    }

    fn substitute(
        &self,
        inner: &str,
        vars: &HashMap<String, String>,
        missing: &mut Vec<String>,
    ) -> String {
        let mut segments = inner.split('|').map(str::trim);
        let Some(name) = segments.next().filter(|n| !n.is_empty()) else {
            return String::new();
        };

        let mut value = vars.get(name).cloned();
        if value.is_none() {
            if let Some(hook) = &self.not_found {
                value = hook(name);
            }
        }

        let mut filters: Vec<&LiteFilter> = Vec::new();
        let mut fallback: Option<&str> = None;
        for seg in segments.filter(|s| !s.is_empty()) {
            match self.filters.get(seg) {
                Some(f) => filters.push(f),
                // First non-filter segment is the fallback; later ones are
                // ignored rather than guessed at.
                None => fallback = fallback.or(Some(seg)),
            }
        }

        let mut value = match value.or_else(|| fallback.map(str::to_string)) {
            Some(v) => v,
            None => {
                trace!("lite template variable not resolved: {name}");
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        };
        for f in filters {
            value = f(&value);
        }
        value
    }
}

impl std::fmt::Debug for LiteTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort();
        f.debug_struct("LiteTemplate")
            .field("delims", &self.delims)
            .field("filters", &names)
            .field("not_found", &self.not_found.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_variables() {
        let lt = LiteTemplate::new();
        let out = lt.render("hi {{ name }}, hi {{name}}", &vars(&[("name", "sam")]));
        assert_eq!(out, "hi sam, hi sam");
    }

    #[test]
    fn fallback_applies_for_missing() {
        let lt = LiteTemplate::new();
        let out = lt.render("role: {{ role | guest }}", &vars(&[]));
        assert_eq!(out, "role: guest");
        let out = lt.render("role: {{ role | guest }}", &vars(&[("role", "admin")]));
        assert_eq!(out, "role: admin");
    }

    #[test]
    fn filters_run_after_fallback() {
        let lt = LiteTemplate::new();
        let out = lt.render("{{ name | guest | upper }}", &vars(&[]));
        assert_eq!(out, "GUEST");
        let out = lt.render("{{ name | upper }}", &vars(&[("name", "sam")]));
        assert_eq!(out, "SAM");
    }

    #[test]
    fn missing_variables_are_collected_once() {
        let lt = LiteTemplate::new();
        let (out, missing) =
            lt.render_collect("{{ a }}/{{ b | x }}/{{ a }}", &vars(&[]));
        assert_eq!(out, "/x/");
        assert_eq!(missing, ["a"]);
    }

    #[test]
    fn not_found_hook_wins_over_fallback() {
        let mut lt = LiteTemplate::new();
        lt.on_not_found(|name| (name == "host").then(|| "localhost".to_string()));
        let out = lt.render("{{ host | fallback }} {{ port | 8080 }}", &vars(&[]));
        assert_eq!(out, "localhost 8080");
    }

    #[test]
    fn custom_delimiters() {
        let lt = LiteTemplate::with_delims(Delims::new("<%", "%>"));
        let out = lt.render("v=<% v %> and {{ v }}", &vars(&[("v", "1")]));
        assert_eq!(out, "v=1 and {{ v }}");
    }

    #[test]
    fn custom_filter_registration() {
        let mut lt = LiteTemplate::new();
        lt.add_filter("rev", |s| s.chars().rev().collect());
        let out = lt.render("{{ w | rev }}", &vars(&[("w", "abc")]));
        assert_eq!(out, "cba");
    }
}
