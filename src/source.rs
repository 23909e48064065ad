//! Source files and the spans that point into them.
//!
//! Every AST node, CSS node, warning, and error carries a [`Span`]: a byte
//! range into a shared, immutable [`SourceFile`].  Files are registered once
//! (by the import cache, or directly by the compile entry points) and live
//! for the duration of the compilation result; spans hold a strong reference
//! to their file so they stay valid on their own.

use std::fmt;
use std::rc::Rc;

use url::Url;

use crate::syntax::Syntax;

/// An immutable, loaded source file.
///
/// The canonical URL is `None` only for the entrypoint of
/// [`compile_string`](crate::compile_string) when the caller did not supply
/// one; such files are identified in source maps by a `data:` URL embedding
/// their text.
pub struct SourceFile {
    url: Option<Url>,
    text: String,
    syntax: Syntax,

    /// Byte offset of the start of each line, in order.  `line_starts[0]`
    /// is always 0.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(text: String, url: Option<Url>, syntax: Syntax) -> Rc<SourceFile> {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }

        Rc::new(SourceFile {
            url,
            text,
            syntax,
            line_starts,
        })
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Projects a byte offset to a zero-based line/column location.
    ///
    /// The column is a count of bytes from the line start, which matches
    /// what source-map consumers expect for UTF-8 sources.
    pub fn location(&self, offset: usize) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(l) => l,
            Err(l) => l - 1,
        };

        SourceLocation {
            offset,
            line,
            column: offset - self.line_starts[line],
        }
    }

    /// The full text of a zero-based line, without its trailing newline.
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .map(|e| e - 1)
            .unwrap_or(self.text.len());
        &self.text[start..end]
    }

    /// A human-readable name for diagnostics: the URL if there is one,
    /// otherwise a placeholder.
    pub fn name(&self) -> String {
        match self.url {
            Some(ref url) => {
                if url.scheme() == "file" {
                    url.to_file_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|_| url.to_string())
                } else {
                    url.to_string()
                }
            }
            None => String::from("-"),
        }
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceFile({})", self.name())
    }
}

/// A zero-based line/column projection of a byte offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// A byte range into a [`SourceFile`].
#[derive(Clone)]
pub struct Span {
    pub file: Rc<SourceFile>,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file: Rc<SourceFile>, start: usize, end: usize) -> Span {
        debug_assert!(start <= end);
        Span { file, start, end }
    }

    /// The raw text the span covers.
    pub fn text(&self) -> &str {
        &self.file.text()[self.start..self.end]
    }

    pub fn start_location(&self) -> SourceLocation {
        self.file.location(self.start)
    }

    pub fn end_location(&self) -> SourceLocation {
        self.file.location(self.end)
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// Both spans must point into the same file.
    pub fn expand(&self, other: &Span) -> Span {
        debug_assert!(Rc::ptr_eq(&self.file, &other.file));
        Span {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A zero-length span at this span's start.
    pub fn collapse_to_start(&self) -> Span {
        Span {
            file: self.file.clone(),
            start: self.start,
            end: self.start,
        }
    }

    /// A sub-span covering `range` measured from this span's start.
    pub fn subspan(&self, start: usize, end: usize) -> Span {
        Span {
            file: self.file.clone(),
            start: self.start + start,
            end: (self.start + end).min(self.end),
        }
    }

    /// A `file:line:column` (one-based) description for messages.
    pub fn describe(&self) -> String {
        let loc = self.start_location();
        format!("{} {}:{}", self.file.name(), loc.line + 1, loc.column + 1)
    }

    /// A caret-annotated excerpt of the source line the span starts on.
    pub fn annotate(&self) -> String {
        let start = self.start_location();
        let end = self.end_location();
        let line = self.file.line_text(start.line);
        let line_no = (start.line + 1).to_string();
        let gutter = " ".repeat(line_no.len());

        let caret_len = if end.line == start.line {
            (end.column.saturating_sub(start.column)).max(1)
        } else {
            line.len().saturating_sub(start.column).max(1)
        };

        format!(
            "{gutter} |\n{line_no} | {line}\n{gutter} | {caret_pad}{carets}",
            gutter = gutter,
            line_no = line_no,
            line = line,
            caret_pad = " ".repeat(start.column),
            carets = "^".repeat(caret_len),
        )
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({} @ {}..{})", self.file.name(), self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(text: &str) -> Rc<SourceFile> {
        SourceFile::new(String::from(text), None, Syntax::Scss)
    }

    #[test]
    fn locations_project_lines_and_columns() {
        let f = file("a {\n  b: c;\n}\n");

        assert_eq!(
            f.location(0),
            SourceLocation {
                offset: 0,
                line: 0,
                column: 0
            }
        );
        assert_eq!(
            f.location(6),
            SourceLocation {
                offset: 6,
                line: 1,
                column: 2
            }
        );
        assert_eq!(
            f.location(12),
            SourceLocation {
                offset: 12,
                line: 2,
                column: 0
            }
        );
    }

    #[test]
    fn line_text_excludes_newline() {
        let f = file("a {\n  b: c;\n}");
        assert_eq!(f.line_text(0), "a {");
        assert_eq!(f.line_text(1), "  b: c;");
        assert_eq!(f.line_text(2), "}");
    }

    #[test]
    fn spans_expand_to_cover_both() {
        let f = file("abcdef");
        let a = Span::new(f.clone(), 1, 2);
        let b = Span::new(f, 4, 5);

        let merged = a.expand(&b);
        assert_eq!((merged.start, merged.end), (1, 5));
        assert_eq!(merged.text(), "bcde");
    }

    #[test]
    fn annotate_points_at_the_span() {
        let f = file("a { b: $x }\n");
        let span = Span::new(f, 7, 9);
        let annotated = span.annotate();

        assert!(annotated.contains("1 | a { b: $x }"));
        assert!(annotated.contains("^^"));
    }
}
