//! The renderer: registry orchestration, load surface, and render entry
//! points.
//!
//! # Lifecycle
//!
//! 1. Construct with [`Renderer::new`] (or [`Renderer::default`]).
//! 2. Register custom functions with [`Renderer::add_func`].
//! 3. Call [`Renderer::init`]. Idempotent; freezes the function table and
//!    delimiters, and auto-loads any configured views directories.
//! 4. Load fragments (`load_string`, `load_strings`, `load_file`,
//!    `load_files`, `load_dir`, `load_glob`).
//! 5. Render (`render`, `render_with_layout`, `render_partial`,
//!    `render_string`).
//!
//! # Thread safety
//!
//! Load operations take `&mut self` and render operations take `&self`, so
//! the intended write-once-then-read-many pattern is enforced by the borrow
//! checker: once loading is done, any number of threads may render
//! concurrently through a shared reference. Layout-mode renders layer their
//! per-call `yield` binding onto a render-scoped clone of the engine
//! environment; shared state is never mutated during a render.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::value::Value;
use minijinja::Environment;
use serde::Serialize;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::engine;
use crate::error::{RenderError, Result};
use crate::extends::{self, ExtendsRegistry, PendingExtends};
use crate::funcs::{FuncMap, FuncRegistry};
use crate::options::{Delims, Options};
use crate::store::{Fragment, FragmentStore};

/// Template registry, composition resolver, and render entry point.
///
/// # Examples
///
/// ```
/// use tplkit::{Options, Renderer};
///
/// # fn main() -> tplkit::Result<()> {
/// let mut r = Renderer::inited(Options::new().with_layout("layout"))?;
/// r.load_strings([
///     ("layout", "HEAD:{{ yield() }}:TAIL"),
///     ("home", "hi {{ data }}"),
/// ])?;
///
/// let mut out = Vec::new();
/// r.render(&mut out, "home", "Sam")?;
/// assert_eq!(out, b"HEAD:hi Sam:TAIL");
/// # Ok(())
/// # }
/// ```
pub struct Renderer {
    opts: Options,
    inited: bool,
    store: FragmentStore,
    extends: ExtendsRegistry,
    funcs: FuncRegistry,
    env: Option<Environment<'static>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Renderer {
    /// Create a renderer with the given options, not yet initialized.
    pub fn new(opts: Options) -> Self {
        Self {
            opts,
            inited: false,
            store: FragmentStore::new(),
            extends: ExtendsRegistry::new(),
            funcs: FuncRegistry::new(),
            env: None,
        }
    }

    /// Create and initialize a renderer in one step.
    pub fn inited(opts: Options) -> Result<Self> {
        let mut r = Self::new(opts);
        r.init()?;
        Ok(r)
    }

    /// The renderer's configuration.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.inited
    }

    /// Register a custom template function.
    ///
    /// Functions receive their evaluated arguments and produce one value or
    /// an engine error. Rejected once the renderer is initialized, because
    /// the engine binds function tables at parse time.
    pub fn add_func<F>(&mut self, name: &str, func: F) -> Result<()>
    where
        F: Fn(&[Value]) -> std::result::Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        if self.inited {
            return Err(RenderError::FuncAfterInit {
                name: name.to_string(),
            });
        }
        self.funcs.add(name, Arc::new(func));
        Ok(())
    }

    /// Register many custom functions at once.
    pub fn add_func_map(&mut self, map: FuncMap) -> Result<()> {
        for (name, func) in map {
            if self.inited {
                return Err(RenderError::FuncAfterInit { name });
            }
            self.funcs.add(&name, func);
        }
        Ok(())
    }

    /// One-time setup: apply option defaults, build the engine baseline, and
    /// auto-load any configured views directories.
    ///
    /// Idempotent; a second call is a no-op returning success. After this
    /// call, registering new functions is rejected.
    pub fn init(&mut self) -> Result<()> {
        if self.inited {
            return Ok(());
        }

        if self.opts.ext_names.is_empty() {
            self.opts.ext_names = Options::default().ext_names;
        }
        if self.opts.delims.is_empty() {
            self.opts.delims = Delims::default();
        }
        self.store.set_ext_names(&self.opts.ext_names);
        self.env = Some(engine::new_environment(
            &self.opts.delims,
            &self.opts.ext_names,
            &self.funcs,
        )?);
        self.inited = true;
        debug!(
            "renderer initialized: {} custom template funcs, ext names: {:?}",
            self.funcs.len(),
            self.opts.ext_names
        );

        // Views directories count as one bulk load: the wait set resolves
        // only after every directory has been walked.
        let dirs = self.opts.views_dirs.clone();
        for dir in &dirs {
            self.walk_dir(dir)?;
        }
        self.resolve_pending()
    }

    /* ---------------- load surface ---------------- */

    /// Register a named template string.
    ///
    /// An extends directive in the source must name a base that already
    /// resolves; single loads have no wait set.
    pub fn load_string(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        self.require_init()?;
        debug!("load named template string: {name}");
        self.register_source(name, text.into(), None, false)
    }

    /// Register raw template bytes under a name. The bytes must be valid
    /// UTF-8; otherwise the load fails without registering anything.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.require_init()?;
        let text = std::str::from_utf8(bytes).map_err(|source| RenderError::Utf8 {
            name: name.to_string(),
            source,
        })?;
        debug!("load named template bytes: {name}");
        self.register_source(name, text.to_string(), None, false)
    }

    /// Register many named template strings as one bulk load.
    ///
    /// Extends-children may appear before their base in iteration order;
    /// the wait set resolves once the whole map is registered.
    pub fn load_strings<I, K, V>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.require_init()?;
        for (name, text) in entries {
            debug!("load named template string: {}", name.as_ref());
            self.register_source(name.as_ref(), text.into(), None, true)?;
        }
        self.resolve_pending()
    }

    /// Register one template file under an explicit name.
    pub fn load_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        self.require_init()?;
        self.load_file_as(name, path.as_ref(), false)
    }

    /// Register template files, deriving each name from the file path
    /// without its extension. Files with an unrecognized extension are
    /// skipped.
    pub fn load_files<I, P>(&mut self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.require_init()?;
        for file in files {
            let path = file.as_ref();
            if !self.has_valid_ext(path) {
                trace!("skip file with unrecognized extension: {}", path.display());
                continue;
            }
            let name = path_to_name(path);
            self.load_file_as(&name, path, false)?;
        }
        Ok(())
    }

    /// Walk a directory recursively and register every file with a
    /// recognized extension, naming fragments by their slash-normalized
    /// relative path without extension.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        self.require_init()?;
        self.walk_dir(dir.as_ref())?;
        self.resolve_pending()
    }

    /// Register template files matching a glob pattern.
    pub fn load_glob(&mut self, pattern: &str) -> Result<()> {
        self.load_glob_impl(pattern, None)
    }

    /// Register template files matching a glob pattern, stripping
    /// `base_dir` from the front of each derived name.
    pub fn load_glob_from(&mut self, pattern: &str, base_dir: impl AsRef<Path>) -> Result<()> {
        self.load_glob_impl(pattern, Some(base_dir.as_ref()))
    }

    /* ---------------- render surface ---------------- */

    /// Render a fragment through the default layout rules and write the
    /// result to `w`.
    ///
    /// Nothing is written unless the whole render succeeds. If a layout
    /// applies, the target fragment is rendered only through the layout's
    /// `yield()` call; a layout that never yields simply drops the target
    /// (intended, not an error).
    pub fn render<S: Serialize>(&self, w: impl Write, name: &str, data: S) -> Result<()> {
        self.render_impl(w, name, data, None)
    }

    /// Render a fragment through an explicit layout. An empty layout name
    /// disables layout wrapping for this call.
    pub fn render_with_layout<S: Serialize>(
        &self,
        w: impl Write,
        name: &str,
        data: S,
        layout: &str,
    ) -> Result<()> {
        self.render_impl(w, name, data, Some(layout))
    }

    /// Render a fragment with layout wrapping forced off: pure fragment +
    /// extends resolution.
    pub fn render_partial<S: Serialize>(&self, w: impl Write, name: &str, data: S) -> Result<()> {
        self.render_impl(w, name, data, Some(""))
    }

    /// Parse and execute `source` as an ephemeral, unregistered fragment
    /// with the baseline function table. Never touches the registry.
    pub fn render_string<S: Serialize>(&self, mut w: impl Write, source: &str, data: S) -> Result<()> {
        let env = self.env()?;
        let ctx = engine::build_context(&Value::from_serialize(data));
        let out = env
            .render_str(source, &ctx)
            .map_err(|e| engine::classify("<string>", e))?;
        w.write_all(out.as_bytes())?;
        Ok(())
    }

    /* ---------------- registry diagnostics ---------------- */

    /// Look up a fragment by name, extension-stripped, with-extends map
    /// first.
    pub fn fragment(&self, name: &str) -> Option<&Fragment> {
        let cleaned = self.store.clean_ext(name);
        self.extends.get(cleaned, name).or_else(|| self.store.get(name))
    }

    /// Whether a fragment resolves under this name.
    pub fn contains(&self, name: &str) -> bool {
        self.fragment(name).is_some()
    }

    /// All registered fragment names (plain and extends-derived), sorted.
    /// Diagnostic only.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.store.names();
        names.extend(self.extends.derived.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Name → file path for every file-backed fragment.
    pub fn files(&self) -> HashMap<String, PathBuf> {
        self.store
            .iter()
            .chain(self.extends.derived.values())
            .filter_map(|f| Some((f.name.clone(), f.file.clone()?)))
            .collect()
    }

    /* ---------------- internals ---------------- */

    fn require_init(&self) -> Result<()> {
        if self.inited {
            Ok(())
        } else {
            Err(RenderError::NotInitialized)
        }
    }

    fn env(&self) -> Result<&Environment<'static>> {
        self.env.as_ref().ok_or(RenderError::NotInitialized)
    }

    fn env_mut(&mut self) -> Result<&mut Environment<'static>> {
        self.env.as_mut().ok_or(RenderError::NotInitialized)
    }

    fn has_valid_ext(&self, path: &Path) -> bool {
        path_ext(path).is_some_and(|ext| self.store.is_valid_ext(&ext))
    }

    fn walk_dir(&mut self, dir: &Path) -> Result<()> {
        debug!("load templates from views dir: {}", dir.display());
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| RenderError::File {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.has_valid_ext(path) {
                continue;
            }
            let rel = path.strip_prefix(dir).unwrap_or(path);
            let name = path_to_name(rel);
            self.load_file_as(&name, path, true)?;
        }
        Ok(())
    }

    fn load_glob_impl(&mut self, pattern: &str, base: Option<&Path>) -> Result<()> {
        self.require_init()?;
        debug!("load templates by glob: {pattern}, base dir: {base:?}");
        let paths = glob::glob(pattern).map_err(|source| RenderError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        for entry in paths {
            let path = entry.map_err(|source| RenderError::Glob {
                pattern: pattern.to_string(),
                source,
            })?;
            if !path.is_file() || !self.has_valid_ext(&path) {
                continue;
            }
            let rel = base.and_then(|b| path.strip_prefix(b).ok()).unwrap_or(&path);
            let name = path_to_name(rel);
            self.load_file_as(&name, &path, true)?;
        }
        self.resolve_pending()
    }

    fn load_file_as(&mut self, name: &str, path: &Path, bulk: bool) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::File {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("load template file: {}, template name: {}", path.display(), name);
        self.register_source(name, text, Some(path.to_path_buf()), bulk)
    }

    /// Parse and register one fragment. `bulk` selects wait-set semantics
    /// for extends-children whose base is not yet known.
    fn register_source(
        &mut self,
        name: &str,
        source: String,
        file: Option<PathBuf>,
        bulk: bool,
    ) -> Result<()> {
        let name = self.store.clean_ext(name).to_string();

        if self.opts.enable_extends {
            if let Some((base, body)) = extends::split_directive(&source, &self.opts.delims) {
                let base = self.store.clean_ext(&base).to_string();
                self.extends.links.insert(name.clone(), base.clone());
                if self.contains(&base) {
                    return self.register_derived(name, source, body, base, file);
                }
                if bulk {
                    trace!("base {base:?} not yet loaded, parking {name:?} in the wait set");
                    self.extends
                        .pending
                        .insert(name, PendingExtends { source, body, file });
                    return Ok(());
                }
                return Err(RenderError::BaseNotFound { base, name });
            }
        }

        self.env_mut()?
            .add_template_owned(name.clone(), source.clone())
            .map_err(|e| engine::classify(&name, e))?;

        // Keep the with-extends form shadowing this name inside the engine.
        if let Some(derived_body) = self.extends.derived.get(&name).map(|f| f.body().to_string()) {
            self.env_mut()?
                .add_template_owned(name.clone(), derived_body)
                .map_err(|e| engine::classify(&name, e))?;
        }

        self.store.insert(Fragment {
            name,
            source: source.clone(),
            body: source,
            base: None,
            file,
        });
        Ok(())
    }

    /// Produce the derived with-extends fragment: a new artifact built from
    /// the base name and the directive-stripped body. The base fragment is
    /// never modified.
    fn register_derived(
        &mut self,
        name: String,
        source: String,
        body: String,
        base: String,
        file: Option<PathBuf>,
    ) -> Result<()> {
        let derived_body = extends::derived_source(&base, &body);
        self.env_mut()?
            .add_template_owned(name.clone(), derived_body.clone())
            .map_err(|e| engine::classify(&name, e))?;
        debug!("registered extends template {name:?}, base: {base:?}");
        self.extends.derived.insert(
            name.clone(),
            Fragment {
                name,
                source,
                body: derived_body,
                base: Some(base),
                file,
            },
        );
        Ok(())
    }

    /// Resolve the wait set to a fixpoint. A pending child may itself be
    /// the base of another pending child, so resolution iterates until no
    /// progress is made, then fails for anything still unresolved.
    fn resolve_pending(&mut self) -> Result<()> {
        while !self.extends.pending.is_empty() {
            let ready: Vec<String> = self
                .extends
                .pending
                .keys()
                .filter(|name| {
                    self.extends
                        .links
                        .get(*name)
                        .is_some_and(|base| self.contains(base))
                })
                .cloned()
                .collect();
            if ready.is_empty() {
                break;
            }
            for name in ready {
                let Some(p) = self.extends.pending.remove(&name) else {
                    continue;
                };
                let Some(base) = self.extends.links.get(&name).cloned() else {
                    continue;
                };
                trace!("resolving wait-set template {name:?} against base {base:?}");
                self.register_derived(name, p.source, p.body, base, p.file)?;
            }
        }

        // Deterministic failure: report the lexically first unresolved child.
        if let Some(name) = self.extends.pending.keys().min().cloned() {
            let base = self
                .extends
                .links
                .get(&name)
                .cloned()
                .unwrap_or_default();
            self.extends.pending.remove(&name);
            return Err(RenderError::BaseNotFound { base, name });
        }
        Ok(())
    }

    fn render_impl<S: Serialize>(
        &self,
        mut w: impl Write,
        name: &str,
        data: S,
        layout: Option<&str>,
    ) -> Result<()> {
        let env = self.env()?;
        let payload = Value::from_serialize(data);
        let ctx = engine::build_context(&payload);

        let target = self
            .fragment(name)
            .ok_or_else(|| RenderError::NotFound {
                name: name.to_string(),
            })?
            .name
            .clone();

        match self.layout_name(layout) {
            Some(layout_name) => {
                let layout_key = self
                    .fragment(&layout_name)
                    .ok_or_else(|| RenderError::LayoutNotFound {
                        layout: layout_name.clone(),
                        name: name.to_string(),
                    })?
                    .name
                    .clone();
                debug!("render template {target:?} through layout {layout_key:?}");
                // The binding goes onto the clone that runs the layout; the
                // target renders against the unbound baseline, so a yield
                // inside the page is still an error rather than a recursion.
                let mut scoped = env.clone();
                engine::bind_yield(&mut scoped, env.clone(), target, ctx.clone());
                self.execute_into(&scoped, &layout_key, &ctx, &mut w)
            }
            None => {
                debug!("render template {target:?} without layout");
                self.execute_into(env, &target, &ctx, &mut w)
            }
        }
    }

    /// Execute one registered fragment into the caller's writer. The render
    /// completes in memory first, so errors leave the writer untouched.
    fn execute_into(
        &self,
        env: &Environment<'static>,
        key: &str,
        ctx: &Value,
        w: &mut impl Write,
    ) -> Result<()> {
        let template = env.get_template(key).map_err(|e| engine::classify(key, e))?;
        let out = template.render(ctx).map_err(|e| engine::classify(key, e))?;
        w.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Decide the effective layout for a render call.
    ///
    /// An explicit override always wins: a non-empty name selects that
    /// layout even when default layouts are disabled, and an empty string
    /// means "no layout this call". With no override, the configured
    /// default applies unless layouts are disabled.
    fn layout_name(&self, explicit: Option<&str>) -> Option<String> {
        match explicit {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
            None => {
                let layout = self.opts.layout.trim();
                if self.opts.disable_layout || layout.is_empty() {
                    None
                } else {
                    Some(layout.to_string())
                }
            }
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("inited", &self.inited)
            .field("fragments", &self.store.len())
            .field("with_extends", &self.extends.derived.len())
            .field("pending", &self.extends.pending.len())
            .finish()
    }
}

/// Slash-normalized path used as a registry name; the recognized extension
/// is stripped during registration.
fn path_to_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn path_ext(path: &Path) -> Option<String> {
    path.extension().map(|e| format!(".{}", e.to_string_lossy()))
}
