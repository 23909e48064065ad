//! Pluggable importers: how `@use`, `@forward`, and `@import` find and load
//! stylesheets.
//!
//! An importer is a pair of operations: `canonicalize` turns a user-written
//! URL into the unique canonical URL of a loadable unit (or declines), and
//! `load` produces the text for a canonical URL it previously produced.
//! The import cache guarantees each operation runs at most once per input
//! within a compilation.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::CompileError;
use crate::io;
use crate::syntax::Syntax;
use crate::url_resolver;

/// Wrapper for URLs that an importer has canonicalized.
///
/// A canonical URL is absolute and unique: two imports that canonicalize to
/// the same `CanonicalUrl` are the same module.  The import cache keys its
/// memoization on this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn new(url: Url) -> CanonicalUrl {
        CanonicalUrl(url)
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl Deref for CanonicalUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A stylesheet produced by [`Importer::load`].
#[derive(Debug)]
pub struct Loaded {
    pub contents: String,
    pub syntax: Syntax,

    /// Where a source map for this stylesheet should point, when it differs
    /// from the canonical URL.
    pub source_map_url: Option<Url>,
}

/// A pluggable stylesheet resolver.
pub trait Importer {
    /// Resolves a user-written URL to a canonical URL, or `None` if this
    /// importer does not handle it.  Any importer that returns `Some` here
    /// must handle the resulting URL in [`Importer::load`].
    ///
    /// `from_import` is true when the URL comes from the legacy `@import`
    /// rule, which may resolve to import-only variants of a file.
    fn canonicalize(
        &self,
        url: &str,
        from_import: bool,
    ) -> Result<Option<CanonicalUrl>, CompileError>;

    /// Loads the text of a canonical URL this importer produced.
    fn load(&self, url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError>;

    /// A human-readable identity for diagnostics.
    fn name(&self) -> String;

    /// Whether this importer refuses on principle to canonicalize URLs with
    /// the given scheme.
    fn is_non_canonical_scheme(&self, _scheme: &str) -> bool {
        false
    }

    /// The external form of a canonical URL for use in source maps.
    fn source_map_url(&self, url: &CanonicalUrl) -> Option<Url> {
        Some((**url).clone())
    }
}

/// Resolves URLs as paths relative to a load path.
///
/// Probing (extensions, partials, index files) is delegated to
/// [`crate::url_resolver`]; the resulting path is canonicalized against the
/// real filesystem so that case-insensitive filesystems yield one canonical
/// URL per file regardless of how imports spell it.
pub struct FilesystemImporter {
    load_path: PathBuf,
}

impl FilesystemImporter {
    pub fn new(load_path: impl Into<PathBuf>) -> FilesystemImporter {
        FilesystemImporter {
            load_path: load_path.into(),
        }
    }
}

impl Importer for FilesystemImporter {
    fn canonicalize(
        &self,
        url: &str,
        from_import: bool,
    ) -> Result<Option<CanonicalUrl>, CompileError> {
        let path = match file_url_to_path(url) {
            FileUrl::Path(p) => p,
            FileUrl::OtherScheme => return Ok(None),
        };

        let resolved = url_resolver::resolve_import(&self.load_path, &path, from_import)
            .map_err(|e| CompileError::Io(e.to_string()))?;

        let Some(resolved) = resolved else {
            return Ok(None);
        };

        let canonical = url_resolver::canonicalize(&resolved).map_err(|err| {
            CompileError::Io(format!("Can't read {}: {err}", resolved.display()))
        })?;

        let url = Url::from_file_path(&canonical)
            .map_err(|_| CompileError::Io(format!("invalid file path: {}", canonical.display())))?;
        Ok(Some(CanonicalUrl(url)))
    }

    fn load(&self, url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError> {
        let path = url
            .to_file_path()
            .map_err(|_| CompileError::Io(format!("invalid file path: {url}")))?;

        let contents = io::acquire_data(url)?;
        Ok(Some(Loaded {
            contents,
            syntax: Syntax::for_path(&path),
            source_map_url: Some((**url).clone()),
        }))
    }

    fn name(&self) -> String {
        self.load_path.display().to_string()
    }

    fn is_non_canonical_scheme(&self, scheme: &str) -> bool {
        scheme != "file"
    }
}

/// An importer that canonicalizes nothing, for browser-like hosts where a
/// string entrypoint has no place to resolve relative imports.
pub struct NoOpImporter;

impl Importer for NoOpImporter {
    fn canonicalize(
        &self,
        _url: &str,
        _from_import: bool,
    ) -> Result<Option<CanonicalUrl>, CompileError> {
        Ok(None)
    }

    fn load(&self, _url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError> {
        Ok(None)
    }

    fn name(&self) -> String {
        String::from("(no-op)")
    }
}

enum FileUrl {
    Path(String),
    OtherScheme,
}

/// Extracts a (possibly relative) filesystem path from an import URL,
/// percent-decoding it.  URLs with a scheme other than `file:` belong to
/// some other importer.
fn file_url_to_path(url: &str) -> FileUrl {
    if let Ok(parsed) = Url::parse(url) {
        // `a:b` parses as a URL; single-letter schemes on Windows are
        // actually drive letters, but those arrive as absolute paths via
        // `file:` URLs in practice.
        return if parsed.scheme() == "file" {
            match parsed.to_file_path() {
                Ok(p) => FileUrl::Path(p.display().to_string()),
                Err(_) => FileUrl::OtherScheme,
            }
        } else {
            FileUrl::OtherScheme
        };
    }

    let decoded = percent_decode_str(url).decode_utf8_lossy();
    FileUrl::Path(decoded.into_owned())
}
