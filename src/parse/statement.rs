//! Statement-level grammar.

use std::rc::Rc;

use crate::ast::*;
use crate::error::CompileError;
use crate::parse::{is_name_char, InterpolationBuilder, Parser};

impl Parser {
    // ----- roots -----

    pub(crate) fn parse_root_scss(&mut self) -> Result<Vec<Statement>, CompileError> {
        let mut statements = Vec::new();
        loop {
            self.skip_statement_ws();
            if self.at_end() {
                break;
            }
            if self.peek() == Some('}') {
                return Err(self.error_here("unmatched \"}\""));
            }
            if let Some(statement) = self.parse_statement(false)? {
                statements.push(statement);
            }
        }
        Ok(statements)
    }

    pub(crate) fn parse_root_indented(&mut self) -> Result<Vec<Statement>, CompileError> {
        let mut statements = Vec::new();
        while let Some(indent) = self.skip_blank_lines() {
            if indent != 0 {
                return Err(self.error_here("unexpected indentation at the top level"));
            }
            self.indent = 0;
            if let Some(statement) = self.parse_statement(false)? {
                statements.push(statement);
            }
        }
        Ok(statements)
    }

    // ----- dialect plumbing -----

    /// Skips inter-statement whitespace in the brace dialects.
    fn skip_statement_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.pos += 1;
        }
    }

    /// At a line start, skips blank lines and returns the indentation of
    /// the next line with content, leaving the cursor on that content.
    fn skip_blank_lines(&mut self) -> Option<usize> {
        loop {
            let mut indent = 0;
            while self.peek() == Some(' ') {
                self.pos += 1;
                indent += 1;
            }
            match self.peek() {
                None => return None,
                Some('\t') => {
                    // Mixing tabs into indentation has no defined width.
                    self.pos += 1;
                    indent += 1;
                }
                Some('\r') => {
                    self.pos += 1;
                    self.eat('\n');
                }
                Some('\n') => {
                    self.pos += 1;
                }
                _ => return Some(indent),
            }
        }
    }

    /// Consumes the rest of the current line (spaces, then a newline or
    /// EOF).  Indented dialect only.
    fn end_line(&mut self) -> Result<(), CompileError> {
        self.skip_spaces();
        match self.peek() {
            None => Ok(()),
            Some('\n') => {
                self.pos += 1;
                Ok(())
            }
            Some('\r') => {
                self.pos += 1;
                self.eat('\n');
                Ok(())
            }
            _ => Err(self.error_here("expected newline")),
        }
    }

    /// Terminates a block-less statement.
    pub(crate) fn expect_statement_end(&mut self) -> Result<(), CompileError> {
        if self.indented() {
            return self.end_line();
        }

        self.skip_statement_ws();
        match self.peek() {
            Some(';') => {
                self.pos += 1;
                Ok(())
            }
            Some('}') | None => Ok(()),
            _ => Err(self.error_here("expected \";\"")),
        }
    }

    /// Parses a statement's child block: `{ … }` in the brace dialects, a
    /// deeper-indented run of lines in the indented dialect.
    pub(crate) fn parse_children(
        &mut self,
        allow_declarations: bool,
    ) -> Result<Vec<Statement>, CompileError> {
        if self.indented() {
            self.end_line()?;
            return self.parse_children_indented(allow_declarations);
        }

        self.skip_statement_ws();
        self.expect_char('{')?;
        self.enter_nested()?;

        let mut statements = Vec::new();
        loop {
            self.skip_statement_ws();
            match self.peek() {
                None => return Err(self.error_here("expected \"}\"")),
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    if let Some(statement) = self.parse_statement(allow_declarations)? {
                        statements.push(statement);
                    }
                }
            }
        }

        self.exit_nested();
        Ok(statements)
    }

    fn parse_children_indented(
        &mut self,
        allow_declarations: bool,
    ) -> Result<Vec<Statement>, CompileError> {
        self.enter_nested()?;
        let parent_indent = self.indent;
        let mut child_indent: Option<usize> = None;
        let mut statements = Vec::new();

        loop {
            let save = self.pos;
            let Some(indent) = self.skip_blank_lines() else {
                break;
            };
            if indent <= parent_indent {
                self.pos = save;
                break;
            }

            match child_indent {
                None => child_indent = Some(indent),
                Some(expected) if expected != indent => {
                    return Err(self.error_here("inconsistent indentation"));
                }
                _ => {}
            }

            let outer = self.indent;
            self.indent = indent;
            if let Some(statement) = self.parse_statement(allow_declarations)? {
                statements.push(statement);
            }
            self.indent = outer;
        }

        self.exit_nested();
        Ok(statements)
    }

    /// Whether the statement head just parsed is followed by children.
    fn looking_at_children(&mut self) -> bool {
        let save = self.pos;
        let result = if self.indented() {
            self.skip_spaces();
            match self.peek() {
                Some('\n') | Some('\r') => {
                    if self.eat('\r') {
                        self.eat('\n');
                    } else {
                        self.eat('\n');
                    }
                    matches!(self.skip_blank_lines(), Some(i) if i > self.indent)
                }
                _ => false,
            }
        } else {
            self.skip_statement_ws();
            self.peek() == Some('{')
        };
        self.pos = save;
        result
    }

    // ----- statement dispatch -----

    fn parse_statement(
        &mut self,
        allow_declarations: bool,
    ) -> Result<Option<Statement>, CompileError> {
        match self.peek() {
            Some('/') if self.peek_at(1) == Some('/') => {
                if self.plain_css() {
                    return Err(self.error_here("silent comments aren't allowed in plain CSS"));
                }
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                Ok(Some(Statement::SilentComment(self.span_from(start))))
            }

            Some('/') if self.peek_at(1) == Some('*') => {
                self.parse_loud_comment().map(Some)
            }

            Some('$') => {
                if self.plain_css() {
                    return Err(self.error_here("Sass variables aren't allowed in plain CSS"));
                }
                self.parse_variable_declaration(None).map(Some)
            }

            Some('@') => self.parse_at_rule(allow_declarations),

            _ => {
                if !self.plain_css() && self.looking_at_namespaced_variable() {
                    let namespace = self.scan_identifier().expect("lookahead checked");
                    self.expect_char('.')?;
                    return self.parse_variable_declaration(Some(namespace)).map(Some);
                }

                if allow_declarations {
                    self.parse_declaration_or_style_rule().map(Some)
                } else {
                    self.parse_style_rule().map(Some)
                }
            }
        }
    }

    fn looking_at_namespaced_variable(&self) -> bool {
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if super::is_name_start(c) => {}
            _ => return false,
        }
        for (i, c) in chars {
            if is_name_char(c) {
                continue;
            }
            return c == '.' && rest[i + 1..].starts_with('$');
        }
        false
    }

    // ----- comments -----

    fn parse_loud_comment(&mut self) -> Result<Statement, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);
        debug_assert!(self.rest().starts_with("/*"));
        self.pos += 2;

        loop {
            if self.rest().starts_with("*/") {
                self.pos += 2;
                break;
            }
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }
            match self.peek() {
                None => {
                    if self.indented() {
                        break;
                    }
                    return Err(self.error("unterminated comment", start));
                }
                Some('\n') if self.indented() => break,
                _ => {
                    self.advance();
                }
            }
        }

        let mut text = builder.finish(self, start)?;
        // Indented-syntax comments close themselves at the line end.
        if self.indented() && !self.text()[start..self.pos].ends_with("*/") {
            let span = text.span.clone();
            text.parts.push(InterpolationPart {
                kind: InterpolationPartKind::Literal(String::from(" */")),
                span: span.collapse_to_start(),
            });
        }

        let span = self.span_from(start);
        Ok(Statement::LoudComment(LoudComment { text, span }))
    }

    // ----- variables -----

    fn parse_variable_declaration(
        &mut self,
        namespace: Option<String>,
    ) -> Result<Statement, CompileError> {
        let start = self.pos;
        self.expect_char('$')?;
        let name = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected variable name"))?;

        self.skip_ws();
        self.expect_char(':')?;
        self.skip_ws();

        let value = self.parse_expression()?;

        let mut guarded = false;
        let mut global = false;
        loop {
            self.skip_spaces();
            if !self.eat('!') {
                break;
            }
            let flag_start = self.pos;
            match self.scan_identifier().as_deref() {
                Some("default") => guarded = true,
                Some("global") => global = true,
                _ => return Err(self.error("invalid flag, expected !default or !global", flag_start)),
            }
        }

        self.expect_statement_end()?;
        Ok(Statement::VariableDecl(VariableDecl {
            name,
            namespace,
            value,
            guarded,
            global,
            span: self.span_from(start),
        }))
    }

    // ----- style rules and declarations -----

    fn parse_style_rule(&mut self) -> Result<Statement, CompileError> {
        let start = self.pos;
        let selector = self.parse_selector_interpolation()?;

        if self.plain_css() && self.in_style_rule {
            return Err(self.error("nested rules aren't allowed in plain CSS", start));
        }

        let was_in_style_rule = self.in_style_rule;
        self.in_style_rule = true;
        let body = self.parse_children(true)?;
        self.in_style_rule = was_in_style_rule;

        Ok(Statement::StyleRule(StyleRule {
            selector,
            body,
            span: self.span_from(start),
        }))
    }

    /// Scans selector text up to the block, preserving interpolation.
    fn parse_selector_interpolation(&mut self) -> Result<Interpolation, CompileError> {
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
                None => {
                    if self.indented() {
                        break;
                    }
                    return Err(self.error_here("expected \"{\""));
                }
                Some('{') if !self.indented() => break,
                Some('\n') | Some('\r') if self.indented() => break,
                Some(';') | Some('}') if !self.indented() => {
                    return Err(self.error_here("expected \"{\""));
                }
                Some(q @ ('"' | '\'')) => {
                    // Attribute selectors may contain quoted strings.
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '\\' {
                            self.advance();
                        } else if c == q {
                            break;
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        let interpolation = builder.finish(self, start)?;
        if interpolation.as_plain().map_or(false, |t| t.trim().is_empty()) {
            return Err(self.error("expected selector", start));
        }
        Ok(interpolation)
    }

    fn parse_declaration_or_style_rule(&mut self) -> Result<Statement, CompileError> {
        let start = self.pos;
        match self.try_parse_declaration() {
            Ok(Some(declaration)) => Ok(declaration),
            Ok(None) | Err(_) => {
                self.pos = start;
                self.parse_style_rule()
            }
        }
    }

    /// Attempts to parse `name: value` (with optional nested block).
    /// Returns `None` — leaving the caller to rewind — when the text turns
    /// out to be a selector.
    fn try_parse_declaration(&mut self) -> Result<Option<Statement>, CompileError> {
        let start = self.pos;

        let custom_property = self.rest().starts_with("--");
        let name = self.parse_interpolated_identifier()?;
        if name.parts.is_empty() {
            return Ok(None);
        }

        self.skip_spaces();
        if !self.eat(':') {
            return Ok(None);
        }
        // `a::before` and `a:hover` are selectors.
        if self.peek() == Some(':') {
            return Ok(None);
        }

        if custom_property {
            self.skip_spaces();
            let value = self.parse_custom_property_value()?;
            self.expect_statement_end()?;
            return Ok(Some(Statement::Declaration(Declaration {
                name,
                value: Some(value),
                body: None,
                span: self.span_from(start),
            })));
        }

        self.skip_spaces();

        // `font: { family: serif }` nests child declarations.
        if self.looking_at_children() {
            let body = self.parse_children(true)?;
            return Ok(Some(Statement::Declaration(Declaration {
                name,
                value: None,
                body: Some(body),
                span: self.span_from(start),
            })));
        }

        let value = self.parse_expression()?;

        if !self.indented() {
            let save = self.pos;
            self.skip_statement_ws();
            match self.peek() {
                Some(';') | Some('}') | None => self.pos = save,
                // A `{` after a parsed value means this was a selector
                // (`a:hover { … }`) all along.
                _ => return Ok(None),
            }
        }

        self.expect_statement_end()?;
        Ok(Some(Statement::Declaration(Declaration {
            name,
            value: Some(value),
            body: None,
            span: self.span_from(start),
        })))
    }

    /// Custom-property values are raw CSS text with interpolation, kept
    /// verbatim.
    fn parse_custom_property_value(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);
        let mut depth: usize = 0;

        loop {
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }

            match self.peek() {
                None => break,
                Some('\n') | Some('\r') if self.indented() && depth == 0 => break,
                Some(';') if depth == 0 && !self.indented() => break,
                Some('}') if depth == 0 && !self.indented() => break,
                Some('(' | '[' | '{') => {
                    depth += 1;
                    self.advance();
                }
                Some(')' | ']' | '}') => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                }
                Some(q @ ('"' | '\'')) => {
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '\\' {
                            self.advance();
                        } else if c == q {
                            break;
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        let text = builder.finish(self, start)?;
        let span = self.span_from(start);
        Ok(Expression::String(StringExpression {
            text,
            quoted: false,
            span,
        }))
    }

    // ----- at-rules -----

    fn parse_at_rule(
        &mut self,
        allow_declarations: bool,
    ) -> Result<Option<Statement>, CompileError> {
        let start = self.pos;
        self.expect_char('@')?;
        let name = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected at-rule name"))?;

        if self.plain_css() && is_sass_at_rule(&name) {
            return Err(self.error(
                &format!("@{name} isn't allowed in plain CSS"),
                start,
            ));
        }

        match name.as_str() {
            "use" => self.parse_use(start).map(Some),
            "forward" => self.parse_forward(start).map(Some),
            "import" => self.parse_import(start).map(Some),
            "mixin" => self.parse_callable_declaration(start, false).map(Some),
            "function" => self.parse_callable_declaration(start, true).map(Some),
            "include" => self.parse_include(start).map(Some),
            "content" => self.parse_content(start).map(Some),
            "return" => {
                self.skip_ws();
                let value = self.parse_expression()?;
                self.expect_statement_end()?;
                Ok(Some(Statement::Return(ReturnRule {
                    value,
                    span: self.span_from(start),
                })))
            }
            "if" => self.parse_if(start).map(Some),
            "else" => Err(self.error("@else without matching @if", start)),
            "each" => self.parse_each(start).map(Some),
            "for" => self.parse_for(start).map(Some),
            "while" => self.parse_while(start).map(Some),
            "extend" => self.parse_extend(start).map(Some),
            "media" => self.parse_media(start, allow_declarations).map(Some),
            "warn" | "debug" | "error" => {
                self.skip_ws();
                let expression = self.parse_expression()?;
                self.expect_statement_end()?;
                let rule = MessageRule {
                    expression,
                    span: self.span_from(start),
                };
                Ok(Some(match name.as_str() {
                    "warn" => Statement::Warn(rule),
                    "debug" => Statement::Debug(rule),
                    _ => Statement::Error(rule),
                }))
            }
            "charset" => {
                // The output charset is the serializer's concern.
                self.skip_ws();
                let _ = self.parse_expression()?;
                self.expect_statement_end()?;
                Ok(None)
            }
            _ => self.parse_generic_at_rule(start, name).map(Some),
        }
    }

    fn parse_quoted_url(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error_here("expected a quoted URL string")),
        };
        self.advance();

        let mut url = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string", start)),
                Some(c) if c == quote => break,
                Some('\\') => {
                    if let Some(c) = self.advance() {
                        url.push(c);
                    }
                }
                Some('\n') => return Err(self.error("unterminated string", start)),
                Some(c) => url.push(c),
            }
        }
        Ok(url)
    }

    fn parse_use(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let url = self.parse_quoted_url()?;

        self.skip_spaces();
        let namespace = if self.eat_word("as") {
            self.skip_ws();
            if self.eat('*') {
                UseNamespace::Global
            } else {
                let name = self
                    .scan_identifier()
                    .ok_or_else(|| self.error_here("expected namespace"))?;
                UseNamespace::Named(name)
            }
        } else {
            UseNamespace::Default
        };

        self.skip_spaces();
        let configuration = if self.eat_word("with") {
            self.parse_configuration()?
        } else {
            Vec::new()
        };

        self.expect_statement_end()?;
        Ok(Statement::Use(UseRule {
            url,
            namespace,
            configuration,
            span: self.span_from(start),
        }))
    }

    fn parse_forward(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let url = self.parse_quoted_url()?;

        self.skip_spaces();
        let prefix = if self.eat_word("as") {
            self.skip_ws();
            let mut prefix = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected prefix"))?;
            // The grammar is `identifier - *`; the dash joins the prefix.
            if self.eat('-') {
                prefix.push('-');
            }
            self.expect_char('*')?;
            Some(prefix)
        } else {
            None
        };

        self.skip_spaces();
        let visibility = if self.eat_word("show") {
            Some(self.parse_member_list(true)?)
        } else if self.eat_word("hide") {
            Some(self.parse_member_list(false)?)
        } else {
            None
        };

        self.skip_spaces();
        let configuration = if self.eat_word("with") {
            self.parse_configuration()?
        } else {
            Vec::new()
        };

        self.expect_statement_end()?;
        Ok(Statement::Forward(ForwardRule {
            url,
            prefix,
            visibility,
            configuration,
            span: self.span_from(start),
        }))
    }

    fn parse_member_list(&mut self, show: bool) -> Result<ForwardVisibility, CompileError> {
        let mut names = Vec::new();
        loop {
            self.skip_ws();
            let variable = self.eat('$');
            let name = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected member name"))?;
            let _ = variable;
            names.push(name);

            self.skip_spaces();
            if !self.eat(',') {
                break;
            }
        }
        Ok(ForwardVisibility { show, names })
    }

    fn parse_configuration(&mut self) -> Result<Vec<ConfiguredVariable>, CompileError> {
        self.skip_ws();
        self.expect_char('(')?;

        let mut configuration = Vec::new();
        loop {
            self.skip_ws_in_braces();
            if self.eat(')') {
                break;
            }

            let start = self.pos;
            self.expect_char('$')?;
            let name = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected variable name"))?;
            self.skip_ws_in_braces();
            self.expect_char(':')?;
            self.skip_ws_in_braces();
            let value = self.parse_space_list()?;

            self.skip_ws_in_braces();
            let guarded = if self.eat('!') {
                let flag_start = self.pos;
                match self.scan_identifier().as_deref() {
                    Some("default") => true,
                    _ => return Err(self.error("invalid flag, expected !default", flag_start)),
                }
            } else {
                false
            };

            configuration.push(ConfiguredVariable {
                name,
                value,
                guarded,
                span: self.span_from(start),
            });

            self.skip_ws_in_braces();
            if !self.eat(',') {
                self.expect_char(')')?;
                break;
            }
        }

        Ok(configuration)
    }

    fn parse_import(&mut self, start: usize) -> Result<Statement, CompileError> {
        let mut imports = Vec::new();

        loop {
            self.skip_ws();
            let target_start = self.pos;

            if self.rest().starts_with("url(") || self.rest().starts_with("url(\"") {
                let url = self.parse_raw_url()?;
                let modifiers = self.parse_import_modifiers()?;
                imports.push(Import::Css {
                    url,
                    modifiers,
                    span: self.span_from(target_start),
                });
            } else {
                let quote_pos = self.pos;
                let url = self.parse_quoted_url()?;
                let quoted_source = String::from(&self.text()[quote_pos..self.pos]);
                let modifiers = self.parse_import_modifiers()?;

                if modifiers.is_some() || is_plain_css_import(&url) || self.plain_css() {
                    imports.push(Import::Css {
                        url: Interpolation::literal(
                            quoted_source,
                            self.span_at(quote_pos, self.pos),
                        ),
                        modifiers,
                        span: self.span_from(target_start),
                    });
                } else {
                    imports.push(Import::Sass {
                        url,
                        span: self.span_from(target_start),
                    });
                }
            }

            self.skip_spaces();
            if !self.eat(',') {
                break;
            }
        }

        self.expect_statement_end()?;
        Ok(Statement::Import(ImportRule {
            imports,
            span: self.span_from(start),
        }))
    }

    /// `url(…)`, kept raw.
    fn parse_raw_url(&mut self) -> Result<Interpolation, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);
        debug_assert!(self.rest().starts_with("url("));
        self.pos += 4;

        let mut depth = 1;
        loop {
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }
            match self.advance() {
                None => return Err(self.error("unterminated url()", start)),
                Some('(') => depth += 1,
                Some(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }

        builder.finish(self, start)
    }

    /// Media queries or `supports(…)` after an import target make it a
    /// plain-CSS import.
    fn parse_import_modifiers(&mut self) -> Result<Option<Interpolation>, CompileError> {
        self.skip_spaces();
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
                None | Some(';') | Some(',') | Some('}') => break,
                Some('\n') | Some('\r') if self.indented() => break,
                Some('(') => {
                    // Balance parens so `(max-width: 100px)` survives.
                    let mut depth = 0;
                    loop {
                        match self.advance() {
                            None => return Err(self.error_here("expected \")\"")),
                            Some('(') => depth += 1,
                            Some(')') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        let interpolation = builder.finish(self, start)?;
        if interpolation
            .as_plain()
            .map_or(false, |t| t.trim().is_empty())
        {
            Ok(None)
        } else {
            Ok(Some(interpolation))
        }
    }

    fn parse_callable_declaration(
        &mut self,
        start: usize,
        function: bool,
    ) -> Result<Statement, CompileError> {
        self.skip_ws();
        let name = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected name"))?;

        self.skip_spaces();
        let arguments = if self.peek() == Some('(') {
            self.parse_argument_declaration()?
        } else if function {
            return Err(self.error_here("expected \"(\""));
        } else {
            ArgumentDeclaration::empty(self.span_from(start))
        };

        let body = self.parse_children(true)?;
        let declaration = Rc::new(CallableDeclaration {
            name,
            arguments,
            body,
            span: self.span_from(start),
        });

        Ok(if function {
            Statement::FunctionRule(declaration)
        } else {
            Statement::MixinRule(declaration)
        })
    }

    pub(crate) fn parse_argument_declaration(
        &mut self,
    ) -> Result<ArgumentDeclaration, CompileError> {
        let start = self.pos;
        self.expect_char('(')?;

        let mut arguments = Vec::new();
        let mut rest = None;

        loop {
            self.skip_ws_in_braces();
            if self.eat(')') {
                break;
            }
            if rest.is_some() {
                return Err(self.error_here("expected \")\""));
            }

            let arg_start = self.pos;
            self.expect_char('$')?;
            let name = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected argument name"))?;

            self.skip_ws_in_braces();
            if self.eat_str("...") {
                rest = Some(name);
            } else if self.eat(':') {
                self.skip_ws_in_braces();
                let default = self.parse_space_list()?;
                arguments.push(Argument {
                    name,
                    default: Some(default),
                    span: self.span_from(arg_start),
                });
            } else {
                arguments.push(Argument {
                    name,
                    default: None,
                    span: self.span_from(arg_start),
                });
            }

            self.skip_ws_in_braces();
            if !self.eat(',') {
                self.expect_char(')')?;
                break;
            }
        }

        Ok(ArgumentDeclaration {
            arguments,
            rest,
            span: self.span_from(start),
        })
    }

    fn parse_include(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let first = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected mixin name"))?;

        let (namespace, name) = if self.eat('.') {
            let name = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected mixin name"))?;
            (Some(first), name)
        } else {
            (None, first)
        };

        self.skip_spaces();
        let arguments = if self.peek() == Some('(') {
            self.parse_argument_invocation()?
        } else {
            ArgumentInvocation::empty(self.span_from(start))
        };

        self.skip_spaces();
        let content_arguments = if self.eat_word("using") {
            self.skip_ws();
            Some(self.parse_argument_declaration()?)
        } else {
            None
        };

        let content = if content_arguments.is_some() || self.looking_at_children() {
            let block_start = self.pos;
            let body = self.parse_children(true)?;
            Some(Rc::new(ContentBlock {
                arguments: content_arguments
                    .unwrap_or_else(|| ArgumentDeclaration::empty(self.span_from(block_start))),
                body,
                span: self.span_from(block_start),
            }))
        } else {
            self.expect_statement_end()?;
            None
        };

        Ok(Statement::Include(Include {
            name,
            namespace,
            arguments,
            content,
            span: self.span_from(start),
        }))
    }

    fn parse_content(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_spaces();
        let arguments = if self.peek() == Some('(') {
            self.parse_argument_invocation()?
        } else {
            ArgumentInvocation::empty(self.span_from(start))
        };
        self.expect_statement_end()?;
        Ok(Statement::Content(ContentInvocation {
            arguments,
            span: self.span_from(start),
        }))
    }

    fn parse_if(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let condition = self.parse_expression()?;
        let body = self.parse_children(true)?;

        let mut clauses = vec![IfClause { condition, body }];
        let mut else_body = None;

        loop {
            if !self.looking_at_else() {
                break;
            }
            // Consume up to and including `@else`.
            if self.indented() {
                self.skip_blank_lines();
            } else {
                self.skip_statement_ws();
            }
            let ate = self.eat_str("@else");
            debug_assert!(ate);

            self.skip_spaces();
            if self.eat_word("if") {
                self.skip_ws();
                let condition = self.parse_expression()?;
                let body = self.parse_children(true)?;
                clauses.push(IfClause { condition, body });
            } else {
                else_body = Some(self.parse_children(true)?);
                break;
            }
        }

        Ok(Statement::If(IfRule {
            clauses,
            else_body,
            span: self.span_from(start),
        }))
    }

    fn looking_at_else(&mut self) -> bool {
        let save = self.pos;
        let result = if self.indented() {
            match self.skip_blank_lines() {
                Some(indent) => indent == self.indent && self.rest().starts_with("@else"),
                None => false,
            }
        } else {
            self.skip_statement_ws();
            self.rest().starts_with("@else")
        };
        self.pos = save;
        result
    }

    fn parse_each(&mut self, start: usize) -> Result<Statement, CompileError> {
        let mut variables = Vec::new();
        loop {
            self.skip_ws();
            self.expect_char('$')?;
            let name = self
                .scan_identifier()
                .ok_or_else(|| self.error_here("expected variable name"))?;
            variables.push(name);

            self.skip_spaces();
            if !self.eat(',') {
                break;
            }
        }

        self.skip_spaces();
        if !self.eat_word("in") {
            return Err(self.error_here("expected \"in\""));
        }
        self.skip_ws();
        let list = self.parse_expression()?;
        let body = self.parse_children(true)?;

        Ok(Statement::Each(EachRule {
            variables,
            list,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_for(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        self.expect_char('$')?;
        let variable = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected variable name"))?;

        self.skip_spaces();
        if !self.eat_word("from") {
            return Err(self.error_here("expected \"from\""));
        }
        self.skip_ws();
        let from = self.parse_or_expression()?;

        self.skip_spaces();
        let exclusive = if self.eat_word("through") {
            false
        } else if self.eat_word("to") {
            true
        } else {
            return Err(self.error_here("expected \"through\" or \"to\""));
        };

        self.skip_ws();
        let to = self.parse_or_expression()?;
        let body = self.parse_children(true)?;

        Ok(Statement::For(ForRule {
            variable,
            from,
            to,
            exclusive,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_while(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let condition = self.parse_expression()?;
        let body = self.parse_children(true)?;

        Ok(Statement::While(WhileRule {
            condition,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_extend(&mut self, start: usize) -> Result<Statement, CompileError> {
        self.skip_ws();
        let selector_start = self.pos;
        let mut builder = InterpolationBuilder::new(selector_start);

        loop {
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }
            match self.peek() {
                None | Some(';') | Some('}') | Some('!') => break,
                Some('\n') | Some('\r') if self.indented() => break,
                _ => {
                    self.advance();
                }
            }
        }

        let selector = builder.finish(self, selector_start)?;

        let optional = if self.eat('!') {
            let flag_start = self.pos;
            match self.scan_identifier().as_deref() {
                Some("optional") => true,
                _ => return Err(self.error("invalid flag, expected !optional", flag_start)),
            }
        } else {
            false
        };

        self.expect_statement_end()?;
        Ok(Statement::Extend(ExtendRule {
            selector,
            optional,
            span: self.span_from(start),
        }))
    }

    fn parse_media(
        &mut self,
        start: usize,
        allow_declarations: bool,
    ) -> Result<Statement, CompileError> {
        self.skip_spaces();
        let query = self.parse_at_rule_prelude()?.ok_or_else(|| {
            self.error_here("expected media query")
        })?;
        let body = self.parse_children(allow_declarations || self.in_style_rule)?;

        Ok(Statement::Media(MediaRule {
            query,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_generic_at_rule(
        &mut self,
        start: usize,
        name: String,
    ) -> Result<Statement, CompileError> {
        self.skip_spaces();
        let name_span = self.span_at(start + 1, start + 1 + name.len());
        let value = self.parse_at_rule_prelude()?;

        let body = if self.indented() {
            if self.looking_at_children() {
                Some(self.parse_children(true)?)
            } else {
                self.end_line()?;
                None
            }
        } else {
            self.skip_spaces();
            match self.peek() {
                Some('{') => Some(self.parse_children(true)?),
                _ => {
                    self.expect_statement_end()?;
                    None
                }
            }
        };

        Ok(Statement::AtRule(AtRule {
            name: Interpolation::literal(name, name_span),
            value,
            body,
            span: self.span_from(start),
        }))
    }

    /// Raw prelude text with interpolation, up to the block or statement
    /// end.  `None` when empty.
    fn parse_at_rule_prelude(&mut self) -> Result<Option<Interpolation>, CompileError> {
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
                None | Some('{') | Some(';') | Some('}') => break,
                Some('\n') | Some('\r') if self.indented() => break,
                Some(q @ ('"' | '\'')) => {
                    self.advance();
                    while let Some(c) = self.advance() {
                        if c == '\\' {
                            self.advance();
                        } else if c == q {
                            break;
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        if builder.is_empty(self) {
            return Ok(None);
        }
        let mut interpolation = builder.finish(self, start)?;

        // Trim the literal tail so `@media screen ` keeps a clean prelude.
        if let Some(InterpolationPart {
            kind: InterpolationPartKind::Literal(ref mut text),
            ..
        }) = interpolation.parts.last_mut()
        {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            if text.is_empty() {
                interpolation.parts.pop();
            }
        }

        if interpolation.parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(interpolation))
        }
    }
}

/// At-rules that only exist in Sass.
fn is_sass_at_rule(name: &str) -> bool {
    matches!(
        name,
        "use"
            | "forward"
            | "mixin"
            | "include"
            | "function"
            | "return"
            | "if"
            | "else"
            | "each"
            | "for"
            | "while"
            | "extend"
            | "content"
            | "warn"
            | "debug"
            | "error"
            | "at-root"
    )
}

/// Imports that stay plain CSS even from SCSS.
fn is_plain_css_import(url: &str) -> bool {
    url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("//")
        || url.ends_with(".css")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::syntax::Syntax;

    fn scss(text: &str) -> Vec<Statement> {
        parse(text, Syntax::Scss, None).unwrap().statements
    }

    fn indented(text: &str) -> Vec<Statement> {
        parse(text, Syntax::Indented, None).unwrap().statements
    }

    #[test]
    fn parses_style_rules_and_declarations() {
        let stmts = scss("a { b: c; }");
        assert_eq!(stmts.len(), 1);
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.selector.as_plain().map(str::trim), Some("a"));
        assert_eq!(rule.body.len(), 1);
        assert!(matches!(rule.body[0], Statement::Declaration(_)));
    }

    #[test]
    fn pseudo_selectors_are_not_declarations() {
        let stmts = scss("a:hover { b: c; }");
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected style rule");
        };
        assert_eq!(rule.selector.as_plain().map(str::trim), Some("a:hover"));

        let stmts = scss("a { &:hover { b: c; } }");
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected style rule");
        };
        assert!(matches!(rule.body[0], Statement::StyleRule(_)));
    }

    #[test]
    fn parses_variable_declarations_with_flags() {
        let stmts = scss("$x: 1 !default; $y: 2 !global;");
        let Statement::VariableDecl(ref x) = stmts[0] else {
            panic!("expected variable");
        };
        assert!(x.guarded);
        let Statement::VariableDecl(ref y) = stmts[1] else {
            panic!("expected variable");
        };
        assert!(y.global);
    }

    #[test]
    fn parses_namespaced_variable_declarations() {
        let stmts = scss("lib.$x: 1;");
        let Statement::VariableDecl(ref decl) = stmts[0] else {
            panic!("expected variable");
        };
        assert_eq!(decl.namespace.as_deref(), Some("lib"));
        assert_eq!(decl.name, "x");
    }

    #[test]
    fn parses_control_flow() {
        let stmts = scss(
            "@if $a { a { b: 1 } } @else if $b { c { d: 2 } } @else { e { f: 3 } }",
        );
        let Statement::If(ref rule) = stmts[0] else {
            panic!("expected if");
        };
        assert_eq!(rule.clauses.len(), 2);
        assert!(rule.else_body.is_some());

        let stmts = scss("@each $a, $b in $list { x { y: $a } }");
        let Statement::Each(ref each) = stmts[0] else {
            panic!("expected each");
        };
        assert_eq!(each.variables, vec!["a", "b"]);

        let stmts = scss("@for $i from 1 through 3 { x { y: $i } }");
        let Statement::For(ref f) = stmts[0] else {
            panic!("expected for");
        };
        assert!(!f.exclusive);

        let stmts = scss("@while $i < 3 { x { y: $i } }");
        assert!(matches!(stmts[0], Statement::While(_)));
    }

    #[test]
    fn parses_mixins_and_includes() {
        let stmts = scss("@mixin corner($r: 3px) { b: $r; } a { @include corner(5px); }");
        let Statement::MixinRule(ref mixin) = stmts[0] else {
            panic!("expected mixin");
        };
        assert_eq!(mixin.name, "corner");
        assert_eq!(mixin.arguments.arguments.len(), 1);

        let Statement::StyleRule(ref rule) = stmts[1] else {
            panic!("expected rule");
        };
        let Statement::Include(ref include) = rule.body[0] else {
            panic!("expected include");
        };
        assert_eq!(include.name, "corner");
        assert!(include.content.is_none());
    }

    #[test]
    fn parses_include_with_content_block() {
        let stmts = scss("@include media { a: b; }");
        let Statement::Include(ref include) = stmts[0] else {
            panic!("expected include");
        };
        assert!(include.content.is_some());
    }

    #[test]
    fn parses_functions_and_returns() {
        let stmts = scss("@function double($n) { @return $n * 2; }");
        let Statement::FunctionRule(ref f) = stmts[0] else {
            panic!("expected function");
        };
        assert_eq!(f.name, "double");
        assert!(matches!(f.body[0], Statement::Return(_)));
    }

    #[test]
    fn parses_use_and_forward() {
        let stmts = scss("@use \"lib\" as l with ($x: 1);");
        let Statement::Use(ref use_rule) = stmts[0] else {
            panic!("expected use");
        };
        assert_eq!(use_rule.url, "lib");
        assert_eq!(use_rule.namespace, UseNamespace::Named(String::from("l")));
        assert_eq!(use_rule.configuration.len(), 1);

        let stmts = scss("@forward \"lib\" as lib-* show a, $b;");
        let Statement::Forward(ref fwd) = stmts[0] else {
            panic!("expected forward");
        };
        assert_eq!(fwd.prefix.as_deref(), Some("lib-"));
        let vis = fwd.visibility.as_ref().unwrap();
        assert!(vis.show);
        assert_eq!(vis.names, vec!["a", "b"]);
    }

    #[test]
    fn import_classification() {
        let stmts = scss("@import \"plain\", \"other.css\", url(x.png), \"a\" screen;");
        let Statement::Import(ref rule) = stmts[0] else {
            panic!("expected import");
        };
        assert_eq!(rule.imports.len(), 4);
        assert!(matches!(rule.imports[0], Import::Sass { .. }));
        assert!(matches!(rule.imports[1], Import::Css { .. }));
        assert!(matches!(rule.imports[2], Import::Css { .. }));
        assert!(matches!(
            rule.imports[3],
            Import::Css {
                modifiers: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn parses_extend_with_optional_flag() {
        let stmts = scss("a { @extend %base !optional; }");
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected rule");
        };
        let Statement::Extend(ref extend) = rule.body[0] else {
            panic!("expected extend");
        };
        assert!(extend.optional);
        assert_eq!(extend.selector.as_plain().map(str::trim), Some("%base"));
    }

    #[test]
    fn parses_media_and_generic_at_rules() {
        let stmts = scss("@media screen and (min-width: 100px) { a { b: c } }");
        let Statement::Media(ref media) = stmts[0] else {
            panic!("expected media");
        };
        assert_eq!(
            media.query.as_plain(),
            Some("screen and (min-width: 100px)")
        );

        let stmts = scss("@font-face { font-family: x; } @namespace svg url(x);");
        assert!(matches!(stmts[0], Statement::AtRule(ref r) if r.body.is_some()));
        assert!(matches!(stmts[1], Statement::AtRule(ref r) if r.body.is_none()));
    }

    #[test]
    fn parses_comments() {
        let stmts = scss("/* loud */ // silent\na { b: c }");
        assert!(matches!(stmts[0], Statement::LoudComment(_)));
        assert!(matches!(stmts[1], Statement::SilentComment(_)));
        assert!(matches!(stmts[2], Statement::StyleRule(_)));
    }

    #[test]
    fn custom_properties_keep_raw_values() {
        let stmts = scss("a { --shadow: { x: 1 } 2px; }");
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected rule");
        };
        let Statement::Declaration(ref decl) = rule.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::String(ref s)) = decl.value else {
            panic!("expected raw string value");
        };
        assert_eq!(s.text.as_plain(), Some("{ x: 1 } 2px"));
    }

    #[test]
    fn nested_property_blocks() {
        let stmts = scss("a { font: { family: serif; size: 10px; } }");
        let Statement::StyleRule(ref rule) = stmts[0] else {
            panic!("expected rule");
        };
        let Statement::Declaration(ref decl) = rule.body[0] else {
            panic!("expected declaration");
        };
        assert!(decl.value.is_none());
        assert_eq!(decl.body.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn charset_is_dropped() {
        let stmts = scss("@charset \"UTF-8\";\na { b: c }");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn plain_css_rejects_sass_constructs() {
        assert!(parse("$x: 1;", Syntax::Css, None).is_err());
        assert!(parse("@if true { }", Syntax::Css, None).is_err());
        assert!(parse("a { // c\n }", Syntax::Css, None).is_err());
        assert!(parse("a { b { c: d } }", Syntax::Css, None).is_err());
        assert!(parse("a { b: c }", Syntax::Css, None).is_ok());
    }

    #[test]
    fn indented_blocks_nest_by_indentation() {
        let stmts = indented("a\n  b: c\n  d\n    e: f\ng\n  h: i\n");
        assert_eq!(stmts.len(), 2);
        let Statement::StyleRule(ref a) = stmts[0] else {
            panic!("expected rule");
        };
        assert_eq!(a.body.len(), 2);
        let Statement::StyleRule(ref d) = a.body[1] else {
            panic!("expected nested rule");
        };
        assert_eq!(d.body.len(), 1);
    }

    #[test]
    fn indented_statements_end_at_newlines() {
        let stmts = indented("$x: 1\n@if $x == 1\n  a\n    b: $x\n");
        assert!(matches!(stmts[0], Statement::VariableDecl(_)));
        assert!(matches!(stmts[1], Statement::If(_)));
    }

    #[test]
    fn inconsistent_indentation_is_an_error() {
        assert!(parse("a\n  b: c\n   d: e\n", Syntax::Indented, None).is_err());
    }

    #[test]
    fn unmatched_brace_is_an_error() {
        assert!(parse("a { b: c; } }", Syntax::Scss, None).is_err());
        assert!(parse("a { b: c;", Syntax::Scss, None).is_err());
    }
}
