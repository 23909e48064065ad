//! Expression-level grammar: full operator precedence, interpolation,
//! and the CSS-compatible literal zoo.

use crate::ast::*;
use crate::error::CompileError;
use crate::parse::{is_name_char, is_name_start, InterpolationBuilder, Parser};
use crate::value::color;
use crate::value::list::ListSeparator;

impl Parser {
    /// A full expression: a comma-separated list at the top level.
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let first = self.parse_space_list()?;

        let save = self.pos;
        self.skip_ws();
        if self.peek() != Some(',') {
            self.pos = save;
            return Ok(first);
        }

        let mut contents = vec![first];
        loop {
            let save = self.pos;
            self.skip_ws();
            if !self.eat(',') {
                self.pos = save;
                break;
            }
            let after_comma = self.pos;
            self.skip_ws();
            if !self.looking_at_operand() {
                // A trailing comma ends the list.
                self.pos = after_comma;
                break;
            }
            contents.push(self.parse_space_list()?);
        }

        Ok(Expression::List(ListExpression {
            contents,
            separator: ListSeparator::Comma,
            brackets: false,
            span: self.span_from(start),
        }))
    }

    /// A space-separated list, or a single operator expression.
    pub(crate) fn parse_space_list(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let first = self.parse_or_expression()?;
        let mut contents = vec![first];

        loop {
            let save = self.pos;
            self.skip_ws();
            if self.pos == save || !self.looking_at_operand() {
                self.pos = save;
                break;
            }
            contents.push(self.parse_or_expression()?);
        }

        if contents.len() == 1 {
            return Ok(contents.pop().expect("len checked"));
        }

        Ok(Expression::List(ListExpression {
            contents,
            separator: ListSeparator::Space,
            brackets: false,
            span: self.span_from(start),
        }))
    }

    pub(crate) fn parse_or_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_and_expression()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            if !self.eat_word("or") {
                self.pos = save;
                break;
            }
            self.skip_ws();
            let right = self.parse_and_expression()?;
            left = Expression::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_equality()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            if !self.eat_word("and") {
                self.pos = save;
                break;
            }
            self.skip_ws();
            let right = self.parse_equality()?;
            left = Expression::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_relational()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            let op = if self.eat_str("==") {
                BinaryOp::Eq
            } else if self.eat_str("!=") {
                BinaryOp::Ne
            } else {
                self.pos = save;
                break;
            };
            self.skip_ws();
            let right = self.parse_relational()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_additive()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            let op = if self.eat_str("<=") {
                BinaryOp::Le
            } else if self.eat_str(">=") {
                BinaryOp::Ge
            } else if self.peek() == Some('<') {
                self.pos += 1;
                BinaryOp::Lt
            } else if self.peek() == Some('>') {
                self.pos += 1;
                BinaryOp::Gt
            } else {
                self.pos = save;
                break;
            };
            self.skip_ws();
            let right = self.parse_additive()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_multiplicative()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            let had_space = self.pos > save;

            let c = match self.peek() {
                Some(c @ ('+' | '-')) => c,
                _ => {
                    self.pos = save;
                    break;
                }
            };

            // `1 -2` is a space list of 1 and -2; `1 - 2` and `1-2` are
            // subtraction.
            let spaced_after = matches!(self.peek_at(1), Some(' ' | '\t' | '\n' | '\r'));
            if had_space && !spaced_after && self.operand_follows_sign() {
                self.pos = save;
                break;
            }

            self.pos += 1;
            self.skip_ws();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                op: if c == '+' { BinaryOp::Plus } else { BinaryOp::Minus },
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    /// Whether the character after a `+`/`-` sign begins an operand,
    /// making the sign part of a new space-list element.
    fn operand_follows_sign(&self) -> bool {
        matches!(
            self.peek_at(1),
            Some(c) if c.is_ascii_digit() || c == '.' || c == '$' || c == '(' || c == '#'
                || is_name_start(c)
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut left = self.parse_unary()?;

        loop {
            let save = self.pos;
            self.skip_ws();
            let op = match self.peek() {
                Some('*') => BinaryOp::Times,
                Some('/') if !matches!(self.peek_at(1), Some('/' | '*')) => BinaryOp::Div,
                Some('%') => BinaryOp::Mod,
                _ => {
                    self.pos = save;
                    break;
                }
            };
            self.pos += 1;
            self.skip_ws();
            let right = self.parse_unary()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;

        if !self.plain_css() {
            if self.eat_word("not") {
                self.skip_ws();
                let operand = self.parse_unary()?;
                return Ok(Expression::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                    span: self.span_from(start),
                });
            }

            match self.peek() {
                Some('-') if matches!(
                    self.peek_at(1),
                    Some(c) if c.is_ascii_digit() || c == '.' || c == '$' || c == '(' || c == '#'
                ) =>
                {
                    self.pos += 1;
                    let operand = self.parse_unary()?;
                    return Ok(Expression::Unary {
                        op: UnaryOp::Minus,
                        operand: Box::new(operand),
                        span: self.span_from(start),
                    });
                }
                Some('+') if matches!(
                    self.peek_at(1),
                    Some(c) if c.is_ascii_digit() || c == '.' || c == '$' || c == '('
                ) =>
                {
                    self.pos += 1;
                    let operand = self.parse_unary()?;
                    return Ok(Expression::Unary {
                        op: UnaryOp::Plus,
                        operand: Box::new(operand),
                        span: self.span_from(start),
                    });
                }
                _ => {}
            }
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, CompileError> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('.') if matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) => {
                self.parse_number()
            }

            Some('$') => self.parse_variable(None),

            Some('"') | Some('\'') => self.parse_quoted_string(),

            Some('#') if self.peek_at(1) == Some('{') => self.parse_identifier_like(),
            Some('#') => self.parse_hex_color(),

            Some('(') => self.parse_paren(),
            Some('[') => self.parse_bracketed_list(),

            Some('&') => {
                let start = self.pos;
                self.pos += 1;
                if self.plain_css() {
                    return Err(self.error(
                        "the parent selector isn't allowed in plain CSS",
                        start,
                    ));
                }
                Ok(Expression::ParentSelector {
                    span: self.span_from(start),
                })
            }

            Some('!') => {
                let start = self.pos;
                self.pos += 1;
                self.skip_ws();
                let word_start = self.pos;
                match self.scan_identifier() {
                    Some(word) if word.eq_ignore_ascii_case("important") => {
                        let span = self.span_from(start);
                        Ok(Expression::String(StringExpression {
                            text: Interpolation::literal("!important", span.clone()),
                            quoted: false,
                            span,
                        }))
                    }
                    _ => Err(self.error("expected \"important\"", word_start)),
                }
            }

            Some(c) if is_name_start(c) || c == '-' => self.parse_identifier_like(),

            _ => Err(self.error_here("expected expression")),
        }
    }

    fn parse_number(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.')
            && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit())
        {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        // Scientific notation, but not the start of an `em` unit.
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut offset = 1;
            if matches!(self.peek_at(1), Some('+' | '-')) {
                offset = 2;
            }
            if matches!(self.peek_at(offset), Some(c) if c.is_ascii_digit()) {
                self.pos += offset;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let value: f64 = self.text()[start..self.pos]
            .parse()
            .map_err(|_| self.error("invalid number", start))?;

        let unit = if self.eat('%') {
            Some(String::from("%"))
        } else if matches!(self.peek(), Some(c) if is_name_start(c)) {
            self.scan_identifier()
        } else {
            None
        };

        Ok(Expression::Number {
            value,
            unit,
            span: self.span_from(start),
        })
    }

    fn parse_variable(&mut self, namespace: Option<String>) -> Result<Expression, CompileError> {
        let start = self.pos;
        self.expect_char('$')?;
        if self.plain_css() {
            return Err(self.error("Sass variables aren't allowed in plain CSS", start));
        }
        let name = self
            .scan_identifier()
            .ok_or_else(|| self.error_here("expected variable name"))?;

        Ok(Expression::Variable {
            name,
            namespace,
            span: self.span_from(start),
        })
    }

    fn parse_quoted_string(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let quote = self.advance().expect("caller checked");
        let mut builder = InterpolationBuilder::new(self.pos);

        let mut buf = String::new();
        let mut buf_start = self.pos;

        macro_rules! flush_buf {
            () => {
                if !buf.is_empty() || self.pos > buf_start {
                    builder.push_literal_text(
                        std::mem::take(&mut buf),
                        self.span_at(buf_start, self.pos),
                    );
                }
                buf_start = self.pos;
            };
        }

        loop {
            if self.rest().starts_with("#{") {
                flush_buf!();
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                buf_start = self.pos;
                continue;
            }

            match self.peek() {
                None => return Err(self.error("unterminated string", start)),
                Some('\n') => return Err(self.error("unterminated string", start)),
                Some(c) if c == quote => {
                    flush_buf!();
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) if c.is_ascii_hexdigit() => {
                            let mut code = 0u32;
                            let mut digits = 0;
                            while digits < 6 {
                                match self.peek() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        code = code * 16 + h.to_digit(16).expect("hex digit");
                                        self.pos += 1;
                                        digits += 1;
                                    }
                                    _ => break,
                                }
                            }
                            // One whitespace character may terminate the
                            // escape.
                            if matches!(self.peek(), Some(' ')) {
                                self.pos += 1;
                            }
                            buf.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        Some(c) => {
                            self.advance();
                            buf.push(c);
                        }
                        None => return Err(self.error("unterminated string", start)),
                    }
                }
                Some(c) => {
                    self.advance();
                    buf.push(c);
                }
            }
        }

        let text = builder.finish(self, start + 1)?;
        Ok(Expression::String(StringExpression {
            text,
            quoted: true,
            span: self.span_from(start),
        }))
    }

    fn parse_hex_color(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        self.expect_char('#')?;

        let digit_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = &self.text()[digit_start..self.pos];

        let channel = |hi: u8, lo: u8| -> u8 {
            let hex = |b: u8| (b as char).to_digit(16).expect("hex digit") as u8;
            hex(hi) * 16 + hex(lo)
        };
        let b = digits.as_bytes();

        let (red, green, blue, alpha) = match digits.len() {
            3 => (
                channel(b[0], b[0]),
                channel(b[1], b[1]),
                channel(b[2], b[2]),
                1.0,
            ),
            4 => (
                channel(b[0], b[0]),
                channel(b[1], b[1]),
                channel(b[2], b[2]),
                f64::from(channel(b[3], b[3])) / 255.0,
            ),
            6 => (
                channel(b[0], b[1]),
                channel(b[2], b[3]),
                channel(b[4], b[5]),
                1.0,
            ),
            8 => (
                channel(b[0], b[1]),
                channel(b[2], b[3]),
                channel(b[4], b[5]),
                f64::from(channel(b[6], b[7])) / 255.0,
            ),
            _ => return Err(self.error("expected hex digits after \"#\"", start)),
        };

        Ok(Expression::Color {
            red,
            green,
            blue,
            alpha,
            original: String::from(&self.text()[start..self.pos]),
            span: self.span_from(start),
        })
    }

    fn parse_paren(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        self.expect_char('(')?;
        self.enter_nested()?;
        self.skip_ws_in_braces();

        if self.eat(')') {
            self.exit_nested();
            return Ok(Expression::List(ListExpression {
                contents: Vec::new(),
                separator: ListSeparator::Undecided,
                brackets: false,
                span: self.span_from(start),
            }));
        }

        let first = self.parse_space_list()?;
        self.skip_ws_in_braces();

        // `(key: value, …)` is a map.
        if self.eat(':') {
            self.skip_ws_in_braces();
            let value = self.parse_space_list()?;
            let mut pairs = vec![(first, value)];

            loop {
                self.skip_ws_in_braces();
                if !self.eat(',') {
                    break;
                }
                self.skip_ws_in_braces();
                if self.peek() == Some(')') {
                    break;
                }
                let key = self.parse_space_list()?;
                self.skip_ws_in_braces();
                self.expect_char(':')?;
                self.skip_ws_in_braces();
                let value = self.parse_space_list()?;
                pairs.push((key, value));
            }

            self.skip_ws_in_braces();
            self.expect_char(')')?;
            self.exit_nested();
            return Ok(Expression::Map(MapExpression {
                pairs,
                span: self.span_from(start),
            }));
        }

        // `(a, b, c)` is a comma list.
        if self.peek() == Some(',') {
            let mut contents = vec![first];
            loop {
                self.skip_ws_in_braces();
                if !self.eat(',') {
                    break;
                }
                self.skip_ws_in_braces();
                if self.peek() == Some(')') {
                    break;
                }
                contents.push(self.parse_space_list()?);
            }
            self.skip_ws_in_braces();
            self.expect_char(')')?;
            self.exit_nested();
            return Ok(Expression::List(ListExpression {
                contents,
                separator: ListSeparator::Comma,
                brackets: false,
                span: self.span_from(start),
            }));
        }

        self.expect_char(')')?;
        self.exit_nested();
        Ok(Expression::Paren {
            inner: Box::new(first),
            span: self.span_from(start),
        })
    }

    fn parse_bracketed_list(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        self.expect_char('[')?;
        self.enter_nested()?;

        let mut contents = Vec::new();
        let mut separator = ListSeparator::Undecided;

        loop {
            self.skip_ws_in_braces();
            if self.eat(']') {
                break;
            }
            contents.push(self.parse_space_list()?);
            self.skip_ws_in_braces();
            if self.eat(',') {
                separator = ListSeparator::Comma;
            }
        }

        // A single space list between the brackets is the list itself:
        // `[1 2 3]` has three elements, not one.
        if contents.len() == 1 && separator == ListSeparator::Undecided {
            if let Expression::List(ListExpression {
                contents: ref inner,
                separator: ListSeparator::Space,
                brackets: false,
                ..
            }) = contents[0]
            {
                let inner = inner.clone();
                contents = inner;
                separator = ListSeparator::Space;
            }
        }

        if contents.len() > 1 && separator == ListSeparator::Undecided {
            separator = ListSeparator::Space;
        }

        self.exit_nested();
        Ok(Expression::List(ListExpression {
            contents,
            separator,
            brackets: true,
            span: self.span_from(start),
        }))
    }

    /// Identifiers and everything that starts out looking like one:
    /// keywords, named colors, function calls, namespaced members, `url()`.
    fn parse_identifier_like(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let text = self.parse_interpolated_identifier()?;
        if text.parts.is_empty() {
            return Err(self.error_here("expected expression"));
        }

        let plain = text.as_plain().map(String::from);

        if let Some(ref plain) = plain {
            // `url(…)` takes raw text that the expression grammar cannot
            // represent.
            if plain.eq_ignore_ascii_case("url") && self.peek() == Some('(') {
                self.pos = start;
                let raw = self.parse_raw_url_expression()?;
                return Ok(raw);
            }

            if self.peek() == Some('(') {
                if self.plain_css() {
                    self.pos = start;
                    return self.parse_plain_css_function();
                }
                let arguments = self.parse_argument_invocation()?;
                return Ok(Expression::FunctionCall(FunctionCall {
                    name: plain.clone(),
                    namespace: None,
                    arguments,
                    span: self.span_from(start),
                }));
            }

            // Namespaced members: `ns.$var` and `ns.fn(…)`.
            if !self.plain_css() && self.peek() == Some('.') {
                if self.peek_at(1) == Some('$') {
                    self.pos += 1;
                    return self.parse_variable(Some(plain.clone()));
                }
                if matches!(self.peek_at(1), Some(c) if is_name_start(c)) {
                    let save = self.pos;
                    self.pos += 1;
                    if let Some(name) = self.scan_identifier() {
                        if self.peek() == Some('(') {
                            let arguments = self.parse_argument_invocation()?;
                            return Ok(Expression::FunctionCall(FunctionCall {
                                name,
                                namespace: Some(plain.clone()),
                                arguments,
                                span: self.span_from(start),
                            }));
                        }
                    }
                    self.pos = save;
                }
            }

            match plain.as_str() {
                "true" => {
                    return Ok(Expression::Boolean {
                        value: true,
                        span: self.span_from(start),
                    })
                }
                "false" => {
                    return Ok(Expression::Boolean {
                        value: false,
                        span: self.span_from(start),
                    })
                }
                "null" => {
                    return Ok(Expression::Null {
                        span: self.span_from(start),
                    })
                }
                _ => {}
            }

            if let Some(color) = color::from_name(plain) {
                let (red, green, blue) = color.rgb8();
                return Ok(Expression::Color {
                    red,
                    green,
                    blue,
                    alpha: 1.0,
                    original: plain.clone(),
                    span: self.span_from(start),
                });
            }
        } else if self.peek() == Some('(') {
            // A call whose name contains interpolation keeps its raw form.
            self.pos = start;
            return self.parse_plain_css_function();
        }

        let span = self.span_from(start);
        Ok(Expression::String(StringExpression {
            text,
            quoted: false,
            span,
        }))
    }

    /// `url(…)` as an expression: raw text with interpolation.
    fn parse_raw_url_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);
        let name = self.scan_identifier().expect("caller checked");
        debug_assert!(name.eq_ignore_ascii_case("url"));
        self.expect_char('(')?;

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

        let text = builder.finish(self, start)?;
        let span = self.span_from(start);
        Ok(Expression::String(StringExpression {
            text,
            quoted: false,
            span,
        }))
    }

    /// In plain CSS, function calls are opaque text.
    fn parse_plain_css_function(&mut self) -> Result<Expression, CompileError> {
        let start = self.pos;
        let mut builder = InterpolationBuilder::new(start);

        let mut depth = 0usize;
        loop {
            if self.rest().starts_with("#{") {
                builder.flush_literal(self);
                let expr = self.parse_interpolation_expression()?;
                builder.push_expression(self, expr);
                continue;
            }
            match self.peek() {
                None => return Err(self.error("unterminated function call", start)),
                Some('(') => {
                    depth += 1;
                    self.advance();
                }
                Some(')') => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
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

    pub(crate) fn parse_argument_invocation(
        &mut self,
    ) -> Result<ArgumentInvocation, CompileError> {
        let start = self.pos;
        self.expect_char('(')?;
        self.enter_nested()?;

        let mut positional = Vec::new();
        let mut named: Vec<(String, Expression)> = Vec::new();
        let mut rest = None;
        let mut keyword_rest = None;

        loop {
            self.skip_ws_in_braces();
            if self.eat(')') {
                break;
            }

            // `$name: value` is a named argument; anything else, including
            // a bare `$var`, is positional.
            let named_arg = if self.peek() == Some('$') {
                let save = self.pos;
                self.pos += 1;
                let name = self.scan_identifier();
                self.skip_ws_in_braces();
                match name {
                    Some(name) if self.eat(':') => {
                        self.skip_ws_in_braces();
                        Some(name)
                    }
                    _ => {
                        self.pos = save;
                        None
                    }
                }
            } else {
                None
            };

            let value = self.parse_space_list()?;

            match named_arg {
                Some(name) => {
                    if named.iter().any(|(n, _)| *n == name) {
                        return Err(self.error(
                            &format!("duplicate argument ${name}"),
                            start,
                        ));
                    }
                    named.push((name, value));
                }
                None => {
                    self.skip_ws_in_braces();
                    if self.eat_str("...") {
                        if rest.is_none() {
                            rest = Some(Box::new(value));
                        } else if keyword_rest.is_none() {
                            keyword_rest = Some(Box::new(value));
                        } else {
                            return Err(self.error_here("expected \")\""));
                        }
                    } else if !named.is_empty() || rest.is_some() {
                        return Err(self.error(
                            "positional arguments must come before keyword arguments",
                            start,
                        ));
                    } else {
                        positional.push(value);
                    }
                }
            }

            self.skip_ws_in_braces();
            if !self.eat(',') {
                self.expect_char(')')?;
                break;
            }
        }

        self.exit_nested();
        Ok(ArgumentInvocation {
            positional,
            named,
            rest,
            keyword_rest,
            span: self.span_from(start),
        })
    }

    /// Whether the cursor is at the start of another expression operand.
    pub(crate) fn looking_at_operand(&self) -> bool {
        match self.peek() {
            Some(c) if is_name_start(c) => true,
            Some(c) if c.is_ascii_digit() => true,
            Some('$') | Some('"') | Some('\'') | Some('(') | Some('[') | Some('&')
            | Some('#') => true,
            Some('.') => matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()),
            Some('-') => matches!(
                self.peek_at(1),
                Some(c) if c.is_ascii_digit()
                    || c == '.'
                    || c == '$'
                    || c == '('
                    || c == '#'
                    || c == '-'
                    || is_name_start(c)
            ),
            Some('+') => matches!(
                self.peek_at(1),
                Some(c) if c.is_ascii_digit() || c == '.' || c == '$' || c == '('
            ),
            Some('!') => {
                let rest = self.rest()[1..].trim_start();
                rest.len() >= 9 && rest[..9].eq_ignore_ascii_case("important")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::syntax::Syntax;

    fn expr(text: &str) -> Expression {
        let source = format!("a {{ b: {text}; }}");
        let stylesheet = parse(&source, Syntax::Scss, None).unwrap();
        let Statement::StyleRule(ref rule) = stylesheet.statements[0] else {
            panic!("expected style rule");
        };
        let Statement::Declaration(ref decl) = rule.body[0] else {
            panic!("expected declaration, got {:?}", rule.body[0]);
        };
        decl.value.clone().expect("declaration has a value")
    }

    #[test]
    fn precedence_nests_correctly() {
        let e = expr("1 + 2 * 3");
        let Expression::Binary { op, ref right, .. } = e else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Plus);
        assert!(matches!(
            **right,
            Expression::Binary {
                op: BinaryOp::Times,
                ..
            }
        ));
    }

    #[test]
    fn comparison_and_logic() {
        let e = expr("1 < 2 and true or not false");
        assert!(matches!(
            e,
            Expression::Binary {
                op: BinaryOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn space_lists_vs_subtraction() {
        assert!(matches!(
            expr("1 -2"),
            Expression::List(ListExpression {
                ref contents,
                separator: ListSeparator::Space,
                ..
            }) if contents.len() == 2
        ));

        assert!(matches!(
            expr("1 - 2"),
            Expression::Binary {
                op: BinaryOp::Minus,
                ..
            }
        ));

        assert!(matches!(
            expr("1-2"),
            Expression::Binary {
                op: BinaryOp::Minus,
                ..
            }
        ));
    }

    #[test]
    fn comma_lists() {
        let e = expr("1, 2 3, 4");
        let Expression::List(ListExpression {
            ref contents,
            separator: ListSeparator::Comma,
            ..
        }) = e
        else {
            panic!("expected comma list");
        };
        assert_eq!(contents.len(), 3);
        assert!(matches!(
            contents[1],
            Expression::List(ListExpression {
                separator: ListSeparator::Space,
                ..
            })
        ));
    }

    #[test]
    fn numbers_and_units() {
        assert!(matches!(
            expr("1.5px"),
            Expression::Number {
                value,
                unit: Some(ref u),
                ..
            } if value == 1.5 && u == "px"
        ));
        assert!(matches!(
            expr("50%"),
            Expression::Number {
                unit: Some(ref u),
                ..
            } if u == "%"
        ));
        assert!(matches!(
            expr("1e3"),
            Expression::Number { value, unit: None, .. } if value == 1000.0
        ));
        assert!(matches!(
            expr("1em"),
            Expression::Number {
                value,
                unit: Some(ref u),
                ..
            } if value == 1.0 && u == "em"
        ));
    }

    #[test]
    fn colors_hex_and_named() {
        assert!(matches!(
            expr("#abc"),
            Expression::Color {
                red: 0xaa,
                green: 0xbb,
                blue: 0xcc,
                ..
            }
        ));
        assert!(matches!(
            expr("#11223344"),
            Expression::Color { alpha, .. } if (alpha - 0x44 as f64 / 255.0).abs() < 1e-9
        ));
        assert!(matches!(
            expr("rebeccapurple"),
            Expression::Color {
                red: 0x66,
                green: 0x33,
                blue: 0x99,
                ..
            }
        ));
    }

    #[test]
    fn strings_and_escapes() {
        let Expression::String(ref s) = expr("\"a\\\"b\"") else {
            panic!("expected string");
        };
        assert!(s.quoted);
        assert_eq!(s.text.as_plain(), Some("a\"b"));

        let Expression::String(ref s) = expr("\"\\41 b\"") else {
            panic!("expected string");
        };
        assert_eq!(s.text.as_plain(), Some("Ab"));
    }

    #[test]
    fn string_interpolation() {
        let Expression::String(ref s) = expr("\"a#{1 + 2}c\"") else {
            panic!("expected string");
        };
        assert!(s.quoted);
        assert_eq!(s.text.parts.len(), 3);
    }

    #[test]
    fn variables_and_namespaces() {
        assert!(matches!(
            expr("$x"),
            Expression::Variable {
                ref name,
                namespace: None,
                ..
            } if name == "x"
        ));
        assert!(matches!(
            expr("lib.$x"),
            Expression::Variable {
                namespace: Some(ref ns),
                ..
            } if ns == "lib"
        ));
        assert!(matches!(
            expr("lib.double(2)"),
            Expression::FunctionCall(FunctionCall {
                namespace: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn function_calls_with_arguments() {
        let Expression::FunctionCall(ref call) = expr("rgb(255, 0, $b: 4)") else {
            panic!("expected call");
        };
        assert_eq!(call.name, "rgb");
        assert_eq!(call.arguments.positional.len(), 2);
        assert_eq!(call.arguments.named.len(), 1);

        let Expression::FunctionCall(ref call) = expr("join($lists...)") else {
            panic!("expected call");
        };
        assert!(call.arguments.rest.is_some());
    }

    #[test]
    fn url_is_raw() {
        let Expression::String(ref s) = expr("url(http://example.com/a?b=c)") else {
            panic!("expected raw url string");
        };
        assert_eq!(s.text.as_plain(), Some("url(http://example.com/a?b=c)"));
    }

    #[test]
    fn maps_and_lists() {
        let Expression::Map(ref map) = expr("(a: 1, b: 2)") else {
            panic!("expected map");
        };
        assert_eq!(map.pairs.len(), 2);

        let Expression::List(ref list) = expr("[1 2 3]") else {
            panic!("expected list");
        };
        assert!(list.brackets);
        assert_eq!(list.contents.len(), 3);

        assert!(matches!(
            expr("()"),
            Expression::List(ListExpression { ref contents, .. }) if contents.is_empty()
        ));
    }

    #[test]
    fn parens_group() {
        assert!(matches!(expr("(1 + 2) * 3"), Expression::Binary {
            op: BinaryOp::Times,
            ref left,
            ..
        } if matches!(**left, Expression::Paren { .. })));
    }

    #[test]
    fn important_is_a_value() {
        let e = expr("red !important");
        let Expression::List(ListExpression { ref contents, .. }) = e else {
            panic!("expected list");
        };
        assert!(matches!(
            contents[1],
            Expression::String(ref s) if s.text.as_plain() == Some("!important")
        ));
    }

    #[test]
    fn parent_selector_expression() {
        assert!(matches!(expr("&"), Expression::ParentSelector { .. }));
    }
}
