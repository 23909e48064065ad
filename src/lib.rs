//! Compile Sass stylesheets to CSS.
//!
//! This crate implements the Sass compilation core: it parses stylesheets
//! written in SCSS, the indented syntax, or plain CSS, evaluates them —
//! resolving imports through pluggable importers, reducing variables,
//! mixins, functions, and control flow, and applying `@extend` — and
//! serializes the result to CSS text, optionally with a source map.
//!
//! # Basic usage
//!
//! * Create an [`Options`] struct and configure it with its builder
//!   methods.
//! * Call [`compile`] with a path, or [`compile_string`] with source text.
//! * Read the CSS (and the source map, if requested) from the returned
//!   [`CompileResult`].
//!
//! # Example
//!
//! ```
//! let options = sass::Options::new();
//! let result = sass::compile_string("a { b: 1 + 2 }", &options).unwrap();
//! assert_eq!(result.css, "a {\n  b: 3;\n}");
//! ```
//!
//! # Loading stylesheets
//!
//! `@use`, `@forward`, and `@import` resolve their URLs through an ordered
//! list of importers: the importers from
//! [`Options::with_importer`] first, then one filesystem importer per
//! [`Options::with_load_path`], then a fallback importer rooted next to
//! the entrypoint.  The first importer that canonicalizes a URL wins, and
//! each canonical URL is loaded and parsed at most once per compilation.
//!
//! Custom importers implement the [`Importer`] trait: a `canonicalize`
//! step that turns user-written URLs into unique canonical URLs, and a
//! `load` step that produces the text for canonical URLs it owns.

#![allow(clippy::too_many_arguments)]
#![warn(nonstandard_style, rust_2018_idioms, unused)]
// Standalone lints
#![warn(trivial_casts, trivial_numeric_casts)]
// The public API is exported here
pub use crate::api::*;

mod api;
mod ast;
mod callable;
mod context;
mod css_tree;
mod deprecation;
mod dispatcher;
mod environment;
mod error;
mod eval;
mod extend;
mod functions;
mod import_cache;
mod importer;
mod io;
mod limits;
mod log;
mod logger;
mod module;
mod parse;
mod serializer;
mod session;
mod source;
mod sourcemap;
mod syntax;
mod url_resolver;
mod value;

#[doc(hidden)]
pub mod dispatcher_only {
    //! The embedded-protocol surface, for hosts that drive the compiler
    //! over a byte-framed channel.
    pub use crate::dispatcher::{Dispatcher, InboundResponse, OutboundRequest, Transport};
}
