//! Error handling for tplkit.
//!
//! All failures are surfaced synchronously to the caller of the operation that
//! introduced them: load operations fail at load time (not lazily at render
//! time), and render operations fail before a single byte reaches the output
//! writer. There is no retry, no partial-result fallback, and no
//! logging-and-continue; template composition errors are configuration bugs
//! and must be loud.
//!
//! # Error Categories
//!
//! - **Configuration**: [`RenderError::NotInitialized`],
//!   [`RenderError::FuncAfterInit`], [`RenderError::LayoutNotFound`],
//!   [`RenderError::BaseNotFound`], [`RenderError::Delims`]
//! - **Parsing**: [`RenderError::Parse`]: malformed fragment source, carrying
//!   the fragment name and the engine's syntax diagnostic
//! - **Execution**: [`RenderError::Execute`]: failures raised while a
//!   fragment runs, including errors from `yield`/`include` bindings
//! - **Lookup**: [`RenderError::NotFound`]: a render target absent from both
//!   the with-extends map and the plain store
//! - **I/O**: [`RenderError::File`], [`RenderError::Write`],
//!   [`RenderError::Pattern`], [`RenderError::Glob`]

use std::path::PathBuf;

use thiserror::Error;

/// A specialized result type for tplkit operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// The error type for registry, load, and render operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A load or render operation was called before [`init`](crate::Renderer::init).
    #[error("renderer is not initialized; call init() before loading or rendering templates")]
    NotInitialized,

    /// A custom template function was registered after initialization.
    ///
    /// The engine binds function tables when fragments are parsed, so
    /// functions added later would be invisible to already-loaded fragments.
    #[error("cannot add template func {name:?} after the renderer is initialized")]
    FuncAfterInit {
        /// Name of the rejected function.
        name: String,
    },

    /// The named fragment was not found in the registry at render time.
    #[error("the template {name:?} is not found")]
    NotFound {
        /// The requested fragment name, as given by the caller.
        name: String,
    },

    /// A layout fragment named by the caller (or configured as the default)
    /// does not resolve. Layout names are caller-controlled, so this is a
    /// fatal configuration error, never silently ignored.
    #[error("the layout template {layout:?} is not found, want render: {name}")]
    LayoutNotFound {
        /// The unresolved layout name.
        layout: String,
        /// The fragment that was being rendered through the layout.
        name: String,
    },

    /// An extends directive references a base fragment that never became
    /// available, after wait-set resolution was exhausted.
    #[error("the extends base template {base:?} is not found, want load: {name}")]
    BaseNotFound {
        /// The unresolved base name from the directive.
        base: String,
        /// The child fragment that declared the directive.
        name: String,
    },

    /// Fragment source failed to parse.
    #[error("failed to parse template {name:?}")]
    Parse {
        /// Registry name of the offending fragment.
        name: String,
        /// The underlying engine syntax diagnostic.
        #[source]
        source: minijinja::Error,
    },

    /// Fragment execution failed against the supplied data.
    #[error("failed to execute template {name:?}")]
    Execute {
        /// Registry name of the fragment being executed.
        name: String,
        /// The underlying engine diagnostic.
        #[source]
        source: minijinja::Error,
    },

    /// The configured delimiter pair was rejected by the engine.
    #[error("invalid template delimiters {left:?} / {right:?}")]
    Delims {
        /// Left delimiter as configured.
        left: String,
        /// Right delimiter as configured.
        right: String,
        /// The underlying engine diagnostic.
        #[source]
        source: minijinja::Error,
    },

    /// Template bytes passed to a load operation are not valid UTF-8.
    #[error("template {name:?} is not valid UTF-8")]
    Utf8 {
        /// Name the bytes were being registered under.
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    /// Reading a template file from disk failed.
    #[error("failed to read template file: {path}")]
    File {
        /// Path that could not be read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A glob pattern passed to a load operation is malformed.
    #[error("invalid glob pattern: {pattern}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A path matched by a glob pattern could not be visited.
    #[error("failed to read glob match for pattern: {pattern}")]
    Glob {
        /// Pattern being expanded when the failure occurred.
        pattern: String,
        #[source]
        source: glob::GlobError,
    },

    /// Writing rendered output to the destination writer failed.
    ///
    /// Rendering itself had already succeeded; the rendered output is
    /// discarded and nothing further is written.
    #[error("failed to write rendered output")]
    Write(#[from] std::io::Error),
}

impl RenderError {
    /// Returns `true` for errors that indicate a misconfigured renderer
    /// rather than a bad fragment or bad data.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::FuncAfterInit { .. }
                | Self::LayoutNotFound { .. }
                | Self::BaseNotFound { .. }
                | Self::Delims { .. }
        )
    }
}
