//! Public Rust API for the compiler.
//!
//! This gets re-exported from the toplevel `lib.rs`.

#![warn(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use url::Url;

// Here we only re-export stuff that belongs to the public API.
pub use crate::{
    context::EvalContext,
    deprecation::{Deprecation, Version},
    error::{CompileError, ProtocolError, TraceFrame},
    importer::{CanonicalUrl, FilesystemImporter, Importer, Loaded, NoOpImporter},
    logger::{Logger, NullLogger, StderrLogger, WarnEvent},
    serializer::{LineFeed, OutputStyle},
    source::{SourceFile, SourceLocation, Span},
    sourcemap::{IncludeSources, SourceMap},
    syntax::Syntax,
    value::{
        ArgList, Color, Keywords, List, ListSeparator, Map, Number, SassFunction, SassMixin,
        Str, Value,
    },
};

use crate::callable::{BuiltinCallable, Callable, NativeFn};
use crate::import_cache::{CachedImport, ImportCache};
use crate::logger::{DeprecationLogger, DeprecationPolicy};
use crate::serializer::{self, SerializeOptions};
use crate::session::Session;
use crate::sourcemap;
use crate::{eval, io, parse, url_resolver};

/// A caller-supplied Sass function.
///
/// The implementation receives the values bound to its declared signature,
/// in order, and the evaluation context for warnings; errors are plain
/// messages that the compiler decorates with the call site.
pub type CustomFunction = NativeFn;

/// Options for [`compile`] and [`compile_string`].
///
/// This struct implements a builder pattern for configuring a compilation:
/// call the `with_*` methods in sequence, then pass the result to one of
/// the entry points.
pub struct Options {
    syntax: Option<Syntax>,
    logger: Rc<dyn Logger>,
    importers: Vec<Rc<dyn Importer>>,
    load_paths: Vec<PathBuf>,
    entrypoint_importer: Option<Rc<dyn Importer>>,
    functions: Vec<(String, CustomFunction)>,
    style: OutputStyle,
    use_spaces: bool,
    indent_width: usize,
    line_feed: LineFeed,
    source_map: bool,
    source_map_include_sources: IncludeSources,
    charset: bool,
    quiet_deps: bool,
    verbose: bool,
    silence_deprecations: HashSet<Deprecation>,
    fatal_deprecations: HashSet<Deprecation>,
    future_deprecations: HashSet<Deprecation>,
}

impl Options {
    /// Creates options with the defaults: expanded output, two-space
    /// indentation, LF newlines, no source map, warnings to stderr.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Options {
        Options {
            syntax: None,
            logger: Rc::new(StderrLogger),
            importers: Vec::new(),
            load_paths: Vec::new(),
            entrypoint_importer: None,
            functions: Vec::new(),
            style: OutputStyle::Expanded,
            use_spaces: true,
            indent_width: 2,
            line_feed: LineFeed::Lf,
            source_map: false,
            source_map_include_sources: IncludeSources::Auto,
            charset: true,
            quiet_deps: false,
            verbose: false,
            silence_deprecations: HashSet::new(),
            fatal_deprecations: HashSet::new(),
            future_deprecations: HashSet::new(),
        }
    }

    /// Forces the input syntax instead of inferring it from the path.
    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Sets the sink for warnings and `@debug` messages.
    pub fn with_logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Appends an importer.  Importers are consulted in the order added,
    /// before load paths.
    pub fn with_importer(mut self, importer: Rc<dyn Importer>) -> Self {
        self.importers.push(importer);
        self
    }

    /// Appends a filesystem load path.
    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }

    /// Overrides the entrypoint importer consulted last for every URL
    /// (by default, the filesystem relative to the entrypoint).
    pub fn with_entrypoint_importer(mut self, importer: Rc<dyn Importer>) -> Self {
        self.entrypoint_importer = Some(importer);
        self
    }

    /// Registers a custom function under a Sass signature like
    /// `"grayscale($color)"`.
    pub fn with_function(mut self, signature: impl Into<String>, function: CustomFunction) -> Self {
        self.functions.push((signature.into(), function));
        self
    }

    /// Selects the output style.
    pub fn with_style(mut self, style: OutputStyle) -> Self {
        self.style = style;
        self
    }

    /// Indents with spaces (the default) or tabs.
    pub fn with_spaces(mut self, use_spaces: bool) -> Self {
        self.use_spaces = use_spaces;
        self
    }

    /// Sets how many characters one indentation level is.  Must be
    /// between 0 and 10.
    pub fn with_indent_width(mut self, width: usize) -> Self {
        self.indent_width = width;
        self
    }

    /// Sets the newline sequence used in the output.
    pub fn with_line_feed(mut self, line_feed: LineFeed) -> Self {
        self.line_feed = line_feed;
        self
    }

    /// Enables source-map generation.
    pub fn with_source_map(mut self, enabled: bool) -> Self {
        self.source_map = enabled;
        self
    }

    /// Controls embedding of source texts in the source map.
    pub fn with_source_map_include_sources(mut self, mode: IncludeSources) -> Self {
        self.source_map_include_sources = mode;
        self
    }

    /// Controls the `@charset`/BOM prefix for non-ASCII output.
    pub fn with_charset(mut self, charset: bool) -> Self {
        self.charset = charset;
        self
    }

    /// Suppresses warnings from stylesheets other than the entrypoint.
    pub fn with_quiet_deps(mut self, quiet_deps: bool) -> Self {
        self.quiet_deps = quiet_deps;
        self
    }

    /// Disables repetition limiting for deprecation warnings.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Silences the given deprecations entirely.
    pub fn with_silenced_deprecations(
        mut self,
        deprecations: impl IntoIterator<Item = Deprecation>,
    ) -> Self {
        self.silence_deprecations.extend(deprecations);
        self
    }

    /// Promotes the given deprecations to fatal errors.
    pub fn with_fatal_deprecations(
        mut self,
        deprecations: impl IntoIterator<Item = Deprecation>,
    ) -> Self {
        self.fatal_deprecations.extend(deprecations);
        self
    }

    /// Opts into warnings for deprecations that are still in the future.
    pub fn with_future_deprecations(
        mut self,
        deprecations: impl IntoIterator<Item = Deprecation>,
    ) -> Self {
        self.future_deprecations.extend(deprecations);
        self
    }
}

/// The result of a successful compilation.
#[derive(Debug)]
pub struct CompileResult {
    /// The generated CSS text.
    pub css: String,

    /// The source map, when requested.  Serialize it with
    /// [`SourceMap::to_json`].
    pub source_map: Option<SourceMap>,

    /// Canonical URLs loaded during the compilation, in first-load order.
    pub loaded_urls: Vec<Url>,
}

/// Compiles the stylesheet at `path`, inferring its syntax from the
/// extension unless overridden.
pub fn compile(path: impl AsRef<Path>, options: &Options) -> Result<CompileResult, CompileError> {
    compile_entry(Entry::Path(path.as_ref()), options)
}

/// Compiles a stylesheet from a source string, parsed as SCSS unless a
/// syntax override is set.
pub fn compile_string(source: &str, options: &Options) -> Result<CompileResult, CompileError> {
    compile_entry(Entry::Source(source), options)
}

#[derive(Clone, Copy)]
enum Entry<'s> {
    Path(&'s Path),
    Source(&'s str),
}

fn compile_entry(entry: Entry<'_>, options: &Options) -> Result<CompileResult, CompileError> {
    // Usage validation comes before any other work.
    if options.indent_width > 10 {
        return Err(CompileError::Usage(format!(
            "indent width must be between 0 and 10 (was {}).",
            options.indent_width
        )));
    }

    let policy = DeprecationPolicy {
        silence: options.silence_deprecations.clone(),
        fatal: options.fatal_deprecations.clone(),
        future: options.future_deprecations.clone(),
    };
    policy.validate()?;

    let logger = DeprecationLogger::new(
        options.logger.clone(),
        policy,
        !options.verbose,
        options.quiet_deps,
    );
    let session = Session::new(logger);

    // The summary runs even when the compilation fails.
    let result = compile_with_session(entry, options, &session);
    session.logger().summarize();
    result
}

fn compile_with_session(
    entry: Entry<'_>,
    options: &Options,
    session: &Session,
) -> Result<CompileResult, CompileError> {
    // Resolution order: explicit importers, load paths, then the
    // entrypoint importer as the final fallback.
    let mut importers: Vec<Rc<dyn Importer>> = options.importers.clone();
    for load_path in &options.load_paths {
        importers.push(Rc::new(FilesystemImporter::new(load_path.clone())));
    }

    let entry_importer: Rc<dyn Importer> = match options.entrypoint_importer {
        Some(ref importer) => importer.clone(),
        None => {
            let base = match entry {
                Entry::Path(path) => path.parent().map(Path::to_path_buf),
                Entry::Source(_) => None,
            };
            Rc::new(FilesystemImporter::new(
                base.unwrap_or_else(|| PathBuf::from(".")),
            ))
        }
    };
    let entry_index = importers.len();
    importers.push(entry_importer);

    let import_cache = ImportCache::new(importers, session.clone());

    // Obtain the entry stylesheet, memoizing it in the import cache when
    // its syntax matches what an importer would have produced.
    let (stylesheet, entry_url, entry_importer_index, entry_text) = match entry {
        Entry::Path(path) => {
            let canonical_path = url_resolver::canonicalize(path)
                .map_err(|e| CompileError::Io(format!("Can't read {}: {e}", path.display())))?;
            let url = Url::from_file_path(&canonical_path).map_err(|_| {
                CompileError::Io(format!("invalid file path: {}", canonical_path.display()))
            })?;
            let canonical = CanonicalUrl::new(url);

            let default_syntax = Syntax::for_path(path);
            let syntax = options.syntax.unwrap_or(default_syntax);

            let text = io::acquire_data(&canonical)?;
            let stylesheet = Rc::new(parse::parse(
                &text,
                syntax,
                Some((*canonical).clone()),
            )?);

            if syntax == default_syntax {
                import_cache.register(Rc::new(CachedImport {
                    stylesheet: stylesheet.clone(),
                    canonical_url: canonical.clone(),
                    importer_index: entry_index,
                    original_url: path.display().to_string(),
                }));
            }

            (stylesheet, Some(canonical), Some(entry_index), text)
        }

        Entry::Source(source) => {
            let syntax = options.syntax.unwrap_or(Syntax::Scss);
            let stylesheet = Rc::new(parse::parse(source, syntax, None)?);
            (stylesheet, None, None, String::from(source))
        }
    };

    session
        .logger()
        .set_entrypoint(entry_url.as_ref().map(|u| (**u).clone()));

    // Custom functions, keyed by their declared name.
    let mut custom_functions: HashMap<String, Rc<Callable>> = HashMap::new();
    for (signature, function) in &options.functions {
        let (name, arguments) = parse::parse_signature(signature)
            .map_err(|e| CompileError::Usage(format!("invalid function signature: {e}")))?;
        custom_functions.insert(
            name.clone(),
            Rc::new(Callable::Builtin(BuiltinCallable {
                name,
                signature: Rc::new(arguments),
                function: function.clone(),
            })),
        );
    }

    let evaluated = eval::evaluate(
        &stylesheet,
        &import_cache,
        session,
        &custom_functions,
        entry_importer_index,
        entry_url,
    )?;

    let indent_char = if options.use_spaces { ' ' } else { '\t' };
    let serialize_options = SerializeOptions {
        style: options.style,
        indent: std::iter::repeat(indent_char)
            .take(options.indent_width)
            .collect(),
        line_feed: options.line_feed,
        charset: options.charset,
        source_map: options.source_map,
    };

    let serialized = serializer::serialize(&evaluated.css, &serialize_options)?;

    // Rewrite source URLs: the string entrypoint becomes a data: URL
    // embedding its text; everything else goes through the importer's
    // preferred external form.
    let source_map = serialized.map.map(|builder| {
        let urls = builder.source_urls();
        let mut map = builder.build(options.source_map_include_sources);
        map.sources = urls
            .iter()
            .map(|url| match url {
                None => sourcemap::data_url(&entry_text),
                Some(url) => import_cache.source_map_url(url).to_string(),
            })
            .collect();
        map
    });

    Ok(CompileResult {
        css: serialized.css,
        source_map,
        loaded_urls: import_cache.loaded_urls(),
    })
}
