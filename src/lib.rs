//! # tplkit
//!
//! A template registry and composition layer over the [minijinja] expression
//! engine: named fragments, a "layout wraps page" rendering model, and a
//! file-based "child extends parent, overrides named blocks" inheritance
//! model.
//!
//! The engine parses and executes individual fragments; this crate owns
//! everything around that: the name registry, load surfaces (strings,
//! files, directories, globs), layout resolution with a per-render `yield`
//! binding, the extends directive with its wait set, and the function-table
//! tiers fragments render against.
//!
//! ## Quick start
//!
//! ```
//! use tplkit::{Options, Renderer};
//!
//! # fn main() -> tplkit::Result<()> {
//! let mut r = Renderer::inited(Options::new().with_layout("layouts/main"))?;
//! r.load_strings([
//!     ("layouts/main", "<html>{{ yield() }}</html>"),
//!     ("home", "<h1>hi {{ data.name }}</h1>"),
//! ])?;
//!
//! let mut out = Vec::new();
//! r.render(&mut out, "home", serde_json::json!({ "name": "sam" }))?;
//! assert_eq!(out, b"<html><h1>hi sam</h1></html>");
//!
//! // The same page without the layout:
//! out.clear();
//! r.render_partial(&mut out, "home", serde_json::json!({ "name": "sam" }))?;
//! assert_eq!(out, b"<h1>hi sam</h1>");
//! # Ok(())
//! # }
//! ```
//!
//! ## Composition model
//!
//! Two orthogonal mechanisms:
//!
//! - **Layouts** are resolved per render call. The layout fragment runs as
//!   the top-level template and pulls the target in wherever it calls
//!   `yield()`; a layout that never yields drops the target. The layout is
//!   chosen by [`Renderer::render`] (configured default),
//!   [`Renderer::render_with_layout`] (explicit, empty string meaning none),
//!   or [`Renderer::render_partial`] (always none).
//! - **Extends** is resolved at load time. A fragment whose first non-blank
//!   line is `{{ extends "base" }}` becomes a *derived* fragment inheriting
//!   the base's structure with its own `{% block %}` overrides. The base is
//!   never modified, so any number of children stay isolated from each
//!   other. In bulk loads children may precede their base; single loads
//!   require the base up front.
//!
//! Fragments also get `include(name)` / `include(name, data)` for inline
//! registry lookups and `current_tpl()` for the active fragment name.
//!
//! ## Data convention
//!
//! Render data is anything [`serde::Serialize`]. Templates see it as the
//! `data` variable; when it is a map its fields are also lifted to top-level
//! variables, with `data` winning any name collision.
//!
//! ## Errors
//!
//! Every failure is synchronous and loud: load errors surface from the load
//! call that introduced them, and render errors surface before a single
//! byte reaches the output writer. See [`RenderError`].
//!
//! ## Extras
//!
//! - [`default`]: a process-wide shared renderer behind free functions.
//! - [`lite`]: delimiter-based string substitution with fallbacks and
//!   filters, for cases that do not need an engine at all.
//!
//! [minijinja]: https://docs.rs/minijinja

mod engine;
mod error;
mod extends;
mod funcs;
mod options;
mod renderer;
mod store;

pub mod default;
pub mod lite;

pub use error::{RenderError, Result};
pub use funcs::{FuncMap, TemplateFn};
pub use options::{Delims, Options};
pub use renderer::Renderer;
pub use store::Fragment;

// Engine types that appear in the public function contract.
pub use minijinja::value::Value;
pub use minijinja::Error as EngineError;
