//! Resolving import URLs against the filesystem.
//!
//! A Sass import like `@use "src/corners"` names a stylesheet without its
//! extension, without a leading underscore for partials, and possibly
//! without the `/_index` suffix for directories.  This module probes the
//! filesystem for the candidates in the language's defined order and
//! reports ambiguities instead of picking one silently.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ResolveError {
    /// More than one file on disk matches the imported URL.
    Ambiguous {
        url: String,
        candidates: Vec<PathBuf>,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ResolveError::Ambiguous {
                ref url,
                ref candidates,
            } => {
                write!(f, "It's not clear which file to import for '{url}'.\nFound:")?;
                for candidate in candidates {
                    write!(f, "\n  {}", candidate.display())?;
                }
                Ok(())
            }
        }
    }
}

/// Resolves an import URL path against a base directory.
///
/// Returns the path of the file to load, `None` if nothing matches, or an
/// error if more than one file matches.  `from_import` enables the
/// `.import.*` probes used so a library can expose a different surface to
/// the legacy `@import` rule than to `@use`.
pub fn resolve_import(
    base: &Path,
    url_path: &str,
    from_import: bool,
) -> Result<Option<PathBuf>, ResolveError> {
    let joined = base.join(url_path);

    let candidates = match extension_of(&joined) {
        Some(_) => try_path(&joined, url_path, from_import)?,
        None => {
            let mut found = try_path_with_extensions(&joined, url_path, from_import)?;
            if found.is_none() {
                found = try_path_as_directory(&joined, url_path, from_import)?;
            }
            found
        }
    };

    Ok(candidates)
}

/// The Sass-relevant extension of a path, if it has one.
fn extension_of(path: &Path) -> Option<&str> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| matches!(*e, "scss" | "sass" | "css"))
}

/// Probes one exact path: the partial variant first, then the plain file.
/// Both existing at once is ambiguous.
fn try_path(
    path: &Path,
    url: &str,
    from_import: bool,
) -> Result<Option<PathBuf>, ResolveError> {
    if from_import {
        if let Some(found) = try_path(&with_import_suffix(path), url, false)? {
            return Ok(Some(found));
        }
    }

    let partial = partial_variant(path);
    let mut found = Vec::new();

    if let Some(ref partial) = partial {
        if partial.is_file() {
            found.push(partial.clone());
        }
    }
    if path.is_file() {
        found.push(path.to_path_buf());
    }

    exactly_one(found, url)
}

/// Probes `<path>.sass` and `<path>.scss`, falling back to `<path>.css`.
fn try_path_with_extensions(
    path: &Path,
    url: &str,
    from_import: bool,
) -> Result<Option<PathBuf>, ResolveError> {
    let mut found = Vec::new();
    for ext in ["sass", "scss"] {
        found.extend(existing_variants(&with_extension(path, ext), from_import)?);
    }

    if found.is_empty() {
        found = existing_variants(&with_extension(path, "css"), from_import)?;
    }

    exactly_one(found, url)
}

/// Probes `<dir>/index` and `<dir>/_index` with the usual extensions.
fn try_path_as_directory(
    dir: &Path,
    url: &str,
    from_import: bool,
) -> Result<Option<PathBuf>, ResolveError> {
    if !dir.is_dir() {
        return Ok(None);
    }

    try_path_with_extensions(&dir.join("index"), url, from_import)
}

/// The partial and plain variants of one exact path that exist on disk,
/// partial first.
fn existing_variants(path: &Path, from_import: bool) -> Result<Vec<PathBuf>, ResolveError> {
    let mut found = Vec::new();

    if from_import {
        found.extend(existing_variants(&with_import_suffix(path), false)?);
        if !found.is_empty() {
            return Ok(found);
        }
    }

    if let Some(partial) = partial_variant(path) {
        if partial.is_file() {
            found.push(partial);
        }
    }
    if path.is_file() {
        found.push(path.to_path_buf());
    }

    Ok(found)
}

fn exactly_one(found: Vec<PathBuf>, url: &str) -> Result<Option<PathBuf>, ResolveError> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.into_iter().next()),
        _ => Err(ResolveError::Ambiguous {
            url: String::from(url),
            candidates: found,
        }),
    }
}

/// `dir/name.scss` → `dir/_name.scss`, or `None` if the name is already a
/// partial.
fn partial_variant(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('_') {
        return None;
    }
    Some(path.with_file_name(format!("_{name}")))
}

/// `dir/name.scss` → `dir/name.import.scss`.
fn with_import_suffix(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    match extension_of(path) {
        Some(ext) => path.with_file_name(format!("{stem}.import.{ext}")),
        None => path.with_file_name(format!("{stem}.import")),
    }
}

fn with_extension(path: &Path, ext: &str) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".");
    p.push(ext);
    PathBuf::from(p)
}

/// Canonicalizes a path against the real filesystem, fixing up the case of
/// each component on case-insensitive filesystems and resolving symlinks.
pub fn canonicalize(path: &Path) -> io::Result<PathBuf> {
    path.canonicalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn resolves_exact_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));

        let found = resolve_import(dir.path(), "a.scss", false).unwrap();
        assert_eq!(found, Some(dir.path().join("a.scss")));
    }

    #[test]
    fn probes_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));

        let found = resolve_import(dir.path(), "a", false).unwrap();
        assert_eq!(found, Some(dir.path().join("a.scss")));
    }

    #[test]
    fn partials_are_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("_a.scss"));

        let found = resolve_import(dir.path(), "a", false).unwrap();
        assert_eq!(found, Some(dir.path().join("_a.scss")));
    }

    #[test]
    fn partial_and_plain_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));
        touch(&dir.path().join("_a.scss"));

        assert!(matches!(
            resolve_import(dir.path(), "a", false),
            Err(ResolveError::Ambiguous { ref candidates, .. }) if candidates.len() == 2
        ));
    }

    #[test]
    fn scss_and_sass_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));
        touch(&dir.path().join("a.sass"));

        assert!(matches!(
            resolve_import(dir.path(), "a", false),
            Err(ResolveError::Ambiguous { .. })
        ));
    }

    #[test]
    fn css_is_a_fallback_not_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));
        touch(&dir.path().join("a.css"));

        let found = resolve_import(dir.path(), "a", false).unwrap();
        assert_eq!(found, Some(dir.path().join("a.scss")));
    }

    #[test]
    fn directories_resolve_to_index() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("lib/_index.scss"));

        let found = resolve_import(dir.path(), "lib", false).unwrap();
        assert_eq!(found, Some(dir.path().join("lib/_index.scss")));
    }

    #[test]
    fn import_only_files_win_for_imports() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.scss"));
        touch(&dir.path().join("a.import.scss"));

        let for_use = resolve_import(dir.path(), "a", false).unwrap();
        assert_eq!(for_use, Some(dir.path().join("a.scss")));

        let for_import = resolve_import(dir.path(), "a", true).unwrap();
        assert_eq!(for_import, Some(dir.path().join("a.import.scss")));
    }

    #[test]
    fn missing_files_resolve_to_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_import(dir.path(), "nope", false)
            .unwrap()
            .is_none());
    }
}
