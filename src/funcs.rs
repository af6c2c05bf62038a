//! Template function registration.
//!
//! Three tiers compose by override, lowest to highest priority: the built-in
//! composition stubs (installed by the engine module), the std helper
//! functions below, and process-level custom functions registered through
//! [`Renderer::add_func`](crate::Renderer::add_func). A fourth, render-scoped
//! tier (`yield` bound to the wrapped target) is layered onto a per-call
//! clone of the environment and never reaches the shared table.
//!
//! Custom functions follow a typed capability contract: they receive the
//! evaluated argument values and produce one [`Value`] or an engine error.
//! Registration is rejected once the renderer is initialized, because the
//! engine binds function tables at parse time.

use std::collections::HashMap;
use std::sync::Arc;

use minijinja::value::{Rest, Value};
use minijinja::Environment;

/// A custom template function: evaluated arguments in, one value (or an
/// engine error) out.
pub type TemplateFn =
    Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static>;

/// Ordered registry of process-level custom functions.
#[derive(Default, Clone)]
pub(crate) struct FuncRegistry {
    customs: Vec<(String, TemplateFn)>,
}

impl FuncRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add or replace a custom function by name.
    pub(crate) fn add(&mut self, name: &str, func: TemplateFn) {
        if let Some(slot) = self.customs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = func;
        } else {
            self.customs.push((name.to_string(), func));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.customs.len()
    }

    /// Install every custom function into an environment. Runs after the
    /// std tier so customs shadow same-named helpers.
    pub(crate) fn install(&self, env: &mut Environment<'static>) {
        for (name, func) in &self.customs {
            let func = Arc::clone(func);
            env.add_function(
                name.clone(),
                move |args: Rest<Value>| -> Result<Value, minijinja::Error> { func(&args.0) },
            );
        }
    }
}

impl std::fmt::Debug for FuncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.customs.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("FuncRegistry").field("customs", &names).finish()
    }
}

/// Install the std helper function tier.
///
/// These mirror the helpers the template authors get for free: `upper`,
/// `lower`, `trim`, `join`, `up_first`, `lc_first` and `raw` (marks a string
/// as safe so auto-escaping leaves it alone).
pub(crate) fn install_std(env: &mut Environment<'static>) {
    env.add_function("upper", |s: String| s.to_uppercase());
    env.add_function("lower", |s: String| s.to_lowercase());
    env.add_function("trim", |s: String| s.trim().to_string());
    env.add_function("join", |items: Vec<String>, sep: String| items.join(&sep));
    env.add_function("up_first", |s: String| change_first(&s, char::to_uppercase));
    env.add_function("lc_first", |s: String| change_first(&s, char::to_lowercase));
    env.add_function("raw", |s: String| Value::from_safe_string(s));
}

fn change_first<I>(s: &str, f: impl Fn(char) -> I) -> String
where
    I: Iterator<Item = char>,
{
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => f(first).chain(chars).collect(),
        None => String::new(),
    }
}

/// Convenience alias used by [`add_func_map`](crate::Renderer::add_func_map).
pub type FuncMap = HashMap<String, TemplateFn>;
