//! The three surface syntaxes a stylesheet can be written in.

use std::path::Path;

/// The dialect a source file is parsed as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Syntax {
    /// The CSS-superset SCSS syntax.
    Scss,

    /// The whitespace-sensitive indented syntax.
    Indented,

    /// Plain CSS; Sass-only constructs are parse errors.
    Css,
}

impl Syntax {
    /// Infers the syntax from a path's extension.
    ///
    /// `.sass` selects the indented syntax and `.css` plain CSS; everything
    /// else, including a missing extension, defaults to SCSS.
    pub fn for_path(path: &Path) -> Syntax {
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("sass") => Syntax::Indented,
            Some(e) if e.eq_ignore_ascii_case("css") => Syntax::Css,
            _ => Syntax::Scss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_syntax_from_extension() {
        assert_eq!(Syntax::for_path(Path::new("a/b.scss")), Syntax::Scss);
        assert_eq!(Syntax::for_path(Path::new("a/b.sass")), Syntax::Indented);
        assert_eq!(Syntax::for_path(Path::new("a/b.CSS")), Syntax::Css);
        assert_eq!(Syntax::for_path(Path::new("a/b")), Syntax::Scss);
        assert_eq!(Syntax::for_path(Path::new("a/b.txt")), Syntax::Scss);
    }
}
