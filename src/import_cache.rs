//! Memoizes importer canonicalization and loading for one compilation.
//!
//! The cache guarantees the importer contract: for each `(importer, url)`
//! pair `canonicalize` runs at most once (even when it declines), and for
//! each canonical URL `load` and the parse run at most once.  Entries never
//! expire within a compilation, and the order in which canonical URLs were
//! first loaded is recorded for `CompileResult::loaded_urls`.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;

use url::Url;

use crate::ast::Stylesheet;
use crate::error::CompileError;
use crate::importer::{CanonicalUrl, Importer};
use crate::parse;
use crate::{sass_log, session::Session};

/// A loaded, parsed stylesheet and how it was reached.
pub struct CachedImport {
    pub stylesheet: Rc<Stylesheet>,
    pub canonical_url: CanonicalUrl,
    pub importer_index: usize,
    pub original_url: String,
}

pub struct ImportCache {
    importers: Vec<Rc<dyn Importer>>,
    session: Session,

    #[allow(clippy::type_complexity)]
    canonicalize_cache: RefCell<HashMap<(usize, String, bool), Option<CanonicalUrl>>>,
    imports: RefCell<HashMap<CanonicalUrl, Rc<CachedImport>>>,
    load_order: RefCell<Vec<CanonicalUrl>>,
}

impl ImportCache {
    pub fn new(importers: Vec<Rc<dyn Importer>>, session: Session) -> ImportCache {
        ImportCache {
            importers,
            session,
            canonicalize_cache: RefCell::new(HashMap::new()),
            imports: RefCell::new(HashMap::new()),
            load_order: RefCell::new(Vec::new()),
        }
    }

    pub fn importers(&self) -> &[Rc<dyn Importer>] {
        &self.importers
    }

    /// Resolves a user-written URL: first relative to the stylesheet that
    /// contains it (through the importer that loaded that stylesheet),
    /// then through every importer in option order.  The first importer
    /// whose `canonicalize` returns a URL wins.
    pub fn canonicalize(
        &self,
        url: &str,
        base: Option<(usize, &CanonicalUrl)>,
        from_import: bool,
    ) -> Result<Option<(usize, CanonicalUrl)>, CompileError> {
        if let Some((importer_index, base_url)) = base {
            if is_relative(url) {
                if let Ok(joined) = base_url.join(url) {
                    if let Some(canonical) =
                        self.canonicalize_one(importer_index, joined.as_str(), from_import)?
                    {
                        return Ok(Some((importer_index, canonical)));
                    }
                }
            }
        }

        for index in 0..self.importers.len() {
            if let Some(scheme) = scheme_of(url) {
                if self.importers[index].is_non_canonical_scheme(scheme) {
                    continue;
                }
            }
            if let Some(canonical) = self.canonicalize_one(index, url, from_import)? {
                return Ok(Some((index, canonical)));
            }
        }

        Ok(None)
    }

    fn canonicalize_one(
        &self,
        index: usize,
        url: &str,
        from_import: bool,
    ) -> Result<Option<CanonicalUrl>, CompileError> {
        let key = (index, String::from(url), from_import);
        if let Some(cached) = self.canonicalize_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let result = self.importers[index].canonicalize(url, from_import)?;
        self.canonicalize_cache.borrow_mut().insert(key, result.clone());
        Ok(result)
    }

    /// Loads and parses a canonical URL, at most once per compilation.
    pub fn import(
        &self,
        importer_index: usize,
        canonical: &CanonicalUrl,
        original_url: &str,
    ) -> Result<Rc<CachedImport>, CompileError> {
        if let Some(cached) = self.imports.borrow().get(canonical) {
            return Ok(cached.clone());
        }

        sass_log!(
            self.session,
            "loading {} (for {:?})",
            canonical,
            original_url
        );

        let loaded = self.importers[importer_index]
            .load(canonical)?
            .ok_or_else(|| {
                CompileError::Io(format!(
                    "Importer {} canonicalized {canonical} but failed to load it.",
                    self.importers[importer_index].name()
                ))
            })?;

        let stylesheet = parse::parse(
            &loaded.contents,
            loaded.syntax,
            Some((**canonical).clone()),
        )?;

        let cached = Rc::new(CachedImport {
            stylesheet: Rc::new(stylesheet),
            canonical_url: canonical.clone(),
            importer_index,
            original_url: String::from(original_url),
        });

        match self.imports.borrow_mut().entry(canonical.clone()) {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(e) => {
                e.insert(cached.clone());
            }
        }
        self.load_order.borrow_mut().push(canonical.clone());

        Ok(cached)
    }

    /// Registers a pre-parsed entrypoint so re-imports of it hit the
    /// cache.
    pub fn register(&self, cached: Rc<CachedImport>) {
        let canonical = cached.canonical_url.clone();
        if self
            .imports
            .borrow_mut()
            .insert(canonical.clone(), cached)
            .is_none()
        {
            self.load_order.borrow_mut().push(canonical);
        }
    }

    /// Converts a canonical URL to the form its importer prefers for
    /// source maps (for the filesystem importer, the `file:` URL itself).
    /// URLs the cache has never loaded pass through unchanged.
    pub fn source_map_url(&self, url: &Url) -> Url {
        let imports = self.imports.borrow();
        let canonical = CanonicalUrl::new(url.clone());
        match imports.get(&canonical) {
            Some(cached) => self.importers[cached.importer_index]
                .source_map_url(&canonical)
                .unwrap_or_else(|| url.clone()),
            None => url.clone(),
        }
    }

    /// The canonical URLs loaded by this compilation, in first-load order.
    pub fn loaded_urls(&self) -> Vec<Url> {
        self.load_order
            .borrow()
            .iter()
            .map(|c| (**c).clone())
            .collect()
    }
}

fn is_relative(url: &str) -> bool {
    scheme_of(url).is_none()
}

/// The scheme of a URL-shaped string, if it has one.
fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    let scheme = &url[..colon];
    if scheme.is_empty() {
        return None;
    }
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::Loaded;
    use crate::syntax::Syntax;

    /// Counts calls to verify the at-most-once guarantees.
    struct CountingImporter {
        canonicalize_calls: RefCell<Vec<String>>,
        load_calls: RefCell<Vec<String>>,
    }

    impl CountingImporter {
        fn new() -> Rc<CountingImporter> {
            Rc::new(CountingImporter {
                canonicalize_calls: RefCell::new(Vec::new()),
                load_calls: RefCell::new(Vec::new()),
            })
        }
    }

    impl Importer for Rc<CountingImporter> {
        fn canonicalize(
            &self,
            url: &str,
            _from_import: bool,
        ) -> Result<Option<CanonicalUrl>, CompileError> {
            self.canonicalize_calls.borrow_mut().push(String::from(url));
            if url.contains("missing") {
                return Ok(None);
            }
            let url = url.strip_prefix("test:").unwrap_or(url);
            Ok(Some(CanonicalUrl::new(
                Url::parse(&format!("test:{url}")).unwrap(),
            )))
        }

        fn load(&self, url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError> {
            self.load_calls.borrow_mut().push(url.to_string());
            Ok(Some(Loaded {
                contents: String::from("a { b: c; }"),
                syntax: Syntax::Scss,
                source_map_url: None,
            }))
        }

        fn name(&self) -> String {
            String::from("counting")
        }
    }

    fn cache(importer: Rc<CountingImporter>) -> ImportCache {
        ImportCache::new(vec![Rc::new(importer)], Session::new_for_test_suite())
    }

    #[test]
    fn canonicalize_runs_at_most_once_per_url() {
        let importer = CountingImporter::new();
        let cache = cache(importer.clone());

        for _ in 0..3 {
            cache.canonicalize("style", None, false).unwrap();
        }
        assert_eq!(importer.canonicalize_calls.borrow().len(), 1);

        // A negative result is cached too.
        for _ in 0..3 {
            assert!(cache.canonicalize("missing", None, false).unwrap().is_none());
        }
        assert_eq!(importer.canonicalize_calls.borrow().len(), 2);
    }

    #[test]
    fn import_loads_and_parses_at_most_once() {
        let importer = CountingImporter::new();
        let cache = cache(importer.clone());

        let (index, canonical) = cache.canonicalize("style", None, false).unwrap().unwrap();
        let first = cache.import(index, &canonical, "style").unwrap();
        let second = cache.import(index, &canonical, "style").unwrap();

        assert_eq!(importer.load_calls.borrow().len(), 1);
        assert!(Rc::ptr_eq(&first.stylesheet, &second.stylesheet));
    }

    #[test]
    fn load_order_is_recorded() {
        let importer = CountingImporter::new();
        let cache = cache(importer);

        for url in ["one", "two", "one"] {
            let (index, canonical) = cache.canonicalize(url, None, false).unwrap().unwrap();
            cache.import(index, &canonical, url).unwrap();
        }

        let loaded = cache.loaded_urls();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].as_str(), "test:one");
        assert_eq!(loaded[1].as_str(), "test:two");
    }

    #[test]
    fn non_canonical_schemes_are_skipped() {
        struct Refuser;
        impl Importer for Refuser {
            fn canonicalize(
                &self,
                _url: &str,
                _from_import: bool,
            ) -> Result<Option<CanonicalUrl>, CompileError> {
                panic!("canonicalize must not be called for refused schemes");
            }
            fn load(&self, _url: &CanonicalUrl) -> Result<Option<Loaded>, CompileError> {
                Ok(None)
            }
            fn name(&self) -> String {
                String::from("refuser")
            }
            fn is_non_canonical_scheme(&self, scheme: &str) -> bool {
                scheme == "special"
            }
        }

        let cache = ImportCache::new(vec![Rc::new(Refuser)], Session::new_for_test_suite());
        assert!(cache
            .canonicalize("special:thing", None, false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(scheme_of("file:///a"), Some("file"));
        assert_eq!(scheme_of("a/b:c"), None);
        assert_eq!(scheme_of("./rel"), None);
        assert_eq!(scheme_of("1:2"), None);
        assert!(is_relative("style/other"));
    }
}
