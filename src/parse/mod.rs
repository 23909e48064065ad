//! The parser front-end: turns `(text, syntax, url)` into a spanned
//! [`Stylesheet`].
//!
//! One hand-written recursive-descent parser serves all three dialects.
//! SCSS and plain CSS share the brace-delimited statement grammar (CSS with
//! the Sass-only constructs rejected); the indented syntax drives the same
//! statement and expression parsers with indentation in place of braces and
//! newlines in place of semicolons.

mod expression;
mod statement;

use std::rc::Rc;

use url::Url;

use crate::ast::{
    ArgumentDeclaration, Expression, Interpolation, InterpolationPart, InterpolationPartKind,
    Stylesheet,
};
use crate::error::CompileError;
use crate::limits;
use crate::source::{SourceFile, Span};
use crate::syntax::Syntax;

/// Parses a stylesheet.
pub fn parse(text: &str, syntax: Syntax, url: Option<Url>) -> Result<Stylesheet, CompileError> {
    let file = SourceFile::new(String::from(text), url.clone(), syntax);
    let mut parser = Parser::new(file.clone(), syntax);

    let statements = match syntax {
        Syntax::Scss | Syntax::Css => parser.parse_root_scss()?,
        Syntax::Indented => parser.parse_root_indented()?,
    };

    Ok(Stylesheet {
        statements,
        span: Span::new(file, 0, text.len()),
        url,
        syntax,
    })
}

/// Parses a custom-function signature like `grayscale($color)` into its
/// name and argument declaration.
pub fn parse_signature(signature: &str) -> Result<(String, ArgumentDeclaration), CompileError> {
    let file = SourceFile::new(String::from(signature), None, Syntax::Scss);
    let mut parser = Parser::new(file.clone(), Syntax::Scss);

    let start = parser.pos;
    let name = parser
        .scan_identifier()
        .ok_or_else(|| parser.error_here("expected function name"))?;

    parser.skip_ws();
    let arguments = if parser.peek() == Some('(') {
        parser.parse_argument_declaration()?
    } else {
        ArgumentDeclaration::empty(parser.span_from(start))
    };

    parser.skip_ws();
    if parser.pos != parser.text().len() {
        return Err(parser.error_here("expected end of signature"));
    }

    Ok((name, arguments))
}

pub(crate) struct Parser {
    file: Rc<SourceFile>,
    pub(crate) pos: usize,
    dialect: Syntax,

    /// Nesting depth guard for blocks, parens, and interpolations.
    depth: usize,

    /// Current indentation level, for the indented dialect.
    pub(crate) indent: usize,

    /// Whether the cursor is inside a style rule's block, for the
    /// plain-CSS nesting check.
    pub(crate) in_style_rule: bool,
}

impl Parser {
    fn new(file: Rc<SourceFile>, dialect: Syntax) -> Parser {
        Parser {
            file,
            pos: 0,
            dialect,
            depth: 0,
            indent: 0,
            in_style_rule: false,
        }
    }

    pub(crate) fn plain_css(&self) -> bool {
        self.dialect == Syntax::Css
    }

    pub(crate) fn indented(&self) -> bool {
        self.dialect == Syntax::Indented
    }

    // ----- scanning primitives -----

    pub(crate) fn text(&self) -> &str {
        self.file.text()
    }

    pub(crate) fn rest(&self) -> &str {
        &self.file.text()[self.pos..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consumes a keyword: the word must not run into further identifier
    /// characters (`not` must not match `nothing`).
    pub(crate) fn eat_word(&mut self, word: &str) -> bool {
        if !self.rest().starts_with(word) {
            return false;
        }
        match self.rest()[word.len()..].chars().next() {
            Some(c) if is_name_char(c) => false,
            _ => {
                self.pos += word.len();
                true
            }
        }
    }

    pub(crate) fn expect_char(&mut self, c: char) -> Result<(), CompileError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected \"{c}\"")))
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.text().len()
    }

    pub(crate) fn span_from(&self, start: usize) -> Span {
        Span::new(self.file.clone(), start, self.pos)
    }

    pub(crate) fn span_at(&self, start: usize, end: usize) -> Span {
        Span::new(self.file.clone(), start, end)
    }

    pub(crate) fn error(&self, message: &str, start: usize) -> CompileError {
        CompileError::parse(message, self.span_from(start))
    }

    pub(crate) fn error_here(&self, message: &str) -> CompileError {
        let end = (self.pos + 1).min(self.text().len());
        CompileError::parse(message, self.span_at(self.pos.min(end), end))
    }

    pub(crate) fn enter_nested(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > limits::MAX_NESTING_DEPTH {
            return Err(self.error_here("maximum nesting depth exceeded"));
        }
        Ok(())
    }

    pub(crate) fn exit_nested(&mut self) {
        self.depth -= 1;
    }

    // ----- whitespace and comments -----

    /// Skips whitespace and comments in expression context.  In the
    /// indented dialect newlines terminate statements, so only spaces and
    /// tabs are skipped there.
    pub(crate) fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.pos += 1;
                }
                Some('\r') | Some('\n') if !self.indented() => {
                    self.pos += 1;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    while !self.at_end() && !self.rest().starts_with("*/") {
                        self.advance();
                    }
                    self.eat_str("*/");
                }
                Some('/') if self.peek_at(1) == Some('/') && !self.plain_css() => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Skips spaces and tabs only.
    pub(crate) fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    // ----- identifiers -----

    /// Scans a plain (uninterpolated) identifier.
    ///
    /// A `-` continues the identifier only when another name character
    /// follows, so `$a-$b` is a subtraction rather than a variable named
    /// `a-`.
    pub(crate) fn scan_identifier(&mut self) -> Option<String> {
        let start = self.pos;

        if self.rest().starts_with("--") {
            self.pos += 2;
        } else {
            match self.peek() {
                Some(c) if is_name_start(c) => {
                    self.advance();
                }
                Some('-') => {
                    match self.peek_at(1) {
                        Some(c) if is_name_start(c) => {
                            self.pos += 1;
                            self.advance();
                        }
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }

        while let Some(c) = self.peek() {
            if c == '-' {
                match self.peek_at(1) {
                    Some(n) if is_name_char(n) => {
                        self.pos += 1;
                    }
                    _ => break,
                }
            } else if is_name_char(c) {
                self.advance();
            } else {
                break;
            }
        }

        Some(String::from(&self.text()[start..self.pos]))
    }

    /// Parses an identifier that may contain `#{…}` interpolation.
    pub(crate) fn parse_interpolated_identifier(
        &mut self,
    ) -> Result<Interpolation, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);

        loop {
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }

            match self.peek() {
                // A dash continues the name only when more name text (or
                // an interpolation) follows.
                Some('-') => match self.peek_at(1) {
                    Some(n) if is_name_char(n) => {
                        self.pos += 1;
                    }
                    Some('#') if self.rest()[1..].starts_with("#{") => {
                        self.pos += 1;
                    }
                    _ => break,
                },
                Some(c) if is_name_char(c) => {
                    self.advance();
                }
                _ => break,
            }
        }

        builder.finish(self, start)
    }

    /// Parses `#{expression}`, assuming the cursor is at `#`.
    pub(crate) fn parse_interpolation_expression(&mut self) -> Result<Expression, CompileError> {
        debug_assert!(self.rest().starts_with("#{"));
        self.enter_nested()?;
        self.pos += 2;

        if self.plain_css() {
            return Err(self.error_here("interpolation isn't allowed in plain CSS"));
        }

        self.skip_ws_in_braces();
        let expr = self.parse_expression()?;
        self.skip_ws_in_braces();
        self.expect_char('}')?;
        self.exit_nested();
        Ok(expr)
    }

    /// Inside `#{…}` and parens, newlines are insignificant even in the
    /// indented dialect.
    pub(crate) fn skip_ws_in_braces(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.pos += 1;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    while !self.at_end() && !self.rest().starts_with("*/") {
                        self.advance();
                    }
                    self.eat_str("*/");
                }
                Some('/') if self.peek_at(1) == Some('/') && !self.plain_css() => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }
}

/// Accumulates interpolation parts, tracking the literal run in progress.
pub(crate) struct InterpolationBuilder {
    parts: Vec<InterpolationPart>,
    literal_start: usize,
}

impl InterpolationBuilder {
    pub(crate) fn new(start: usize) -> InterpolationBuilder {
        InterpolationBuilder {
            parts: Vec::new(),
            literal_start: start,
        }
    }

    /// Ends the current literal run, emitting a part if it is non-empty.
    pub(crate) fn flush_literal(&mut self, parser: &Parser) {
        if parser.pos > self.literal_start {
            self.parts.push(InterpolationPart {
                kind: InterpolationPartKind::Literal(String::from(
                    &parser.text()[self.literal_start..parser.pos],
                )),
                span: parser.span_at(self.literal_start, parser.pos),
            });
        }
        self.literal_start = parser.pos;
    }

    /// Adds a literal that differs from the source text (escape sequences
    /// in quoted strings).  `span` covers the source it came from.
    pub(crate) fn push_literal_text(&mut self, text: String, span: Span) {
        self.parts.push(InterpolationPart {
            kind: InterpolationPartKind::Literal(text),
            span,
        });
    }

    pub(crate) fn push_expression(&mut self, parser: &Parser, expression: Expression) {
        let span = expression.span().clone();
        self.parts.push(InterpolationPart {
            kind: InterpolationPartKind::Expression(expression),
            span,
        });
        self.literal_start = parser.pos;
    }

    pub(crate) fn finish(
        mut self,
        parser: &Parser,
        start: usize,
    ) -> Result<Interpolation, CompileError> {
        self.flush_literal(parser);
        Ok(Interpolation {
            parts: self.parts,
            span: parser.span_from(start),
        })
    }

    pub(crate) fn is_empty(&self, parser: &Parser) -> bool {
        self.parts.is_empty() && parser.pos == self.literal_start
    }
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c as u32 >= 0x80
}

pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}
