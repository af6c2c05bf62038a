//! Process-wide default renderer.
//!
//! A convenience boundary for applications that want one shared renderer
//! without threading it through call sites. The free functions below are
//! thin wrappers over a `LazyLock<RwLock<Renderer>>`; the core never touches
//! this module, and everything here is reachable through an owned
//! [`Renderer`] as well.
//!
//! Because the instance is process-global, tests exercising it must be
//! serialized (see `tests/global.rs`).

use std::io::Write;
use std::path::Path;
use std::sync::{LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use minijinja::value::Value;
use serde::Serialize;

use crate::error::Result;
use crate::funcs::FuncMap;
use crate::options::Options;
use crate::renderer::Renderer;

static DEFAULT: LazyLock<RwLock<Renderer>> = LazyLock::new(|| RwLock::new(Renderer::default()));

// A poisoned lock only means some caller panicked mid-operation; the
// renderer itself holds no half-written state worth refusing over.
fn read() -> RwLockReadGuard<'static, Renderer> {
    match DEFAULT.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write() -> RwLockWriteGuard<'static, Renderer> {
    match DEFAULT.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Replace the default instance with a fresh renderer built from `opts`,
/// and initialize it.
pub fn init_with(opts: Options) -> Result<()> {
    let mut r = write();
    *r = Renderer::new(opts);
    r.init()
}

/// Initialize the default instance with its current options. Idempotent.
pub fn init() -> Result<()> {
    write().init()
}

/// Register a custom template function on the default instance.
pub fn add_func<F>(name: &str, func: F) -> Result<()>
where
    F: Fn(&[Value]) -> std::result::Result<Value, minijinja::Error> + Send + Sync + 'static,
{
    write().add_func(name, func)
}

/// Register many custom functions on the default instance.
pub fn add_func_map(map: FuncMap) -> Result<()> {
    write().add_func_map(map)
}

/// Register a named template string on the default instance.
pub fn load_string(name: &str, text: impl Into<String>) -> Result<()> {
    write().load_string(name, text)
}

/// Register raw template bytes on the default instance.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<()> {
    write().load_bytes(name, bytes)
}

/// Register many named template strings on the default instance as one
/// bulk load.
pub fn load_strings<I, K, V>(entries: I) -> Result<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    write().load_strings(entries)
}

/// Walk a directory into the default instance.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<()> {
    write().load_dir(dir)
}

/// Register files matching a glob pattern into the default instance.
pub fn load_glob(pattern: &str) -> Result<()> {
    write().load_glob(pattern)
}

/// Render a fragment from the default instance through the default layout
/// rules.
pub fn render<S: Serialize>(w: impl Write, name: &str, data: S) -> Result<()> {
    read().render(w, name, data)
}

/// Render a fragment from the default instance through an explicit layout.
pub fn render_with_layout<S: Serialize>(
    w: impl Write,
    name: &str,
    data: S,
    layout: &str,
) -> Result<()> {
    read().render_with_layout(w, name, data, layout)
}

/// Render a fragment from the default instance with layout wrapping forced
/// off.
pub fn render_partial<S: Serialize>(w: impl Write, name: &str, data: S) -> Result<()> {
    read().render_partial(w, name, data)
}

/// Render an ephemeral template string with the default instance.
pub fn render_string<S: Serialize>(w: impl Write, source: &str, data: S) -> Result<()> {
    read().render_string(w, source, data)
}

/// Whether a fragment resolves in the default instance.
pub fn contains(name: &str) -> bool {
    read().contains(name)
}

/// Drop the default instance's state, restoring a fresh uninitialized
/// renderer with default options. Intended for tests.
pub fn reset() {
    *write() = Renderer::default();
}
