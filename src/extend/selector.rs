//! The selector model shared by nesting resolution and `@extend`.
//!
//! Selectors reach this module as plain text (the output of interpolation
//! resolution), get tokenized with `cssparser`, and become the structural
//! model below: a selector list of complex selectors, each an alternation
//! of compound selectors and combinators, each compound a run of simple
//! selectors.  The model is what the evaluator nests, the extender
//! rewrites, and the serializer prints.

use std::fmt;

use cssparser::{Parser, ParserInput, ToCss, Token};

/// A comma-separated list of complex selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorList {
    pub components: Vec<ComplexSelector>,
}

/// One alternation of compounds and combinators; adjacent compounds imply
/// the descendant combinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComplexSelector {
    pub components: Vec<ComplexComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComplexComponent {
    Compound(CompoundSelector),
    Combinator(Combinator),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    FollowingSibling,
}

impl Combinator {
    fn symbol(self) -> char {
        match self {
            Combinator::Child => '>',
            Combinator::NextSibling => '+',
            Combinator::FollowingSibling => '~',
        }
    }
}

/// A run of simple selectors with no combinators between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundSelector {
    pub components: Vec<SimpleSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    Universal,
    Type(String),
    Class(String),
    Id(String),

    /// `%name`: matches nothing in output; exists to be extended.
    Placeholder(String),

    /// The raw text between `[` and `]`.
    Attribute(String),

    Pseudo {
        name: String,
        element: bool,
        argument: Option<String>,
    },

    /// `&`, replaced during nesting resolution.
    Parent,
}

type SelError<'i> = cssparser::ParseError<'i, String>;

impl SelectorList {
    /// Parses selector text.  Errors are plain messages; the caller
    /// attaches the span of the text's origin.
    pub fn parse(text: &str) -> Result<SelectorList, String> {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);

        let mut components = Vec::new();
        loop {
            let (complex, more) = parse_complex(&mut parser)
                .map_err(|_| format!("Invalid selector: \"{}\"", text.trim()))?;

            if complex.components.is_empty() {
                return Err(format!("Invalid selector: \"{}\"", text.trim()));
            }
            components.push(complex);

            if !more {
                break;
            }
        }

        Ok(SelectorList { components })
    }

    /// Whether nothing in this list produces output (placeholders only).
    pub fn is_invisible(&self) -> bool {
        self.components.iter().all(ComplexSelector::is_invisible)
    }

    /// Resolves the parent selector: `&` substitution where the list
    /// references it, descendant nesting where it does not.
    pub fn resolve_parent(&self, parent: Option<&SelectorList>) -> Result<SelectorList, String> {
        let mut result = Vec::new();

        for complex in &self.components {
            if !complex.contains_parent() {
                match parent {
                    None => result.push(complex.clone()),
                    Some(parent) => {
                        for parent_complex in &parent.components {
                            let mut components = parent_complex.components.clone();
                            components.extend(complex.components.iter().cloned());
                            result.push(ComplexSelector { components });
                        }
                    }
                }
            } else {
                let parent = parent.ok_or_else(|| {
                    String::from(
                        "Top-level selectors may not contain the parent selector \"&\".",
                    )
                })?;
                for parent_complex in &parent.components {
                    result.push(complex.substitute_parent(parent_complex));
                }
            }
        }

        Ok(SelectorList { components: result })
    }

    pub fn to_css_string(&self, compressed: bool) -> String {
        let mut out = String::new();
        let mut first = true;
        for complex in &self.components {
            if !first {
                out.push_str(if compressed { "," } else { ", " });
            }
            first = false;
            complex.write(&mut out, compressed);
        }
        out
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_string(false))
    }
}

impl ComplexSelector {
    pub fn is_invisible(&self) -> bool {
        self.components.iter().any(|c| match c {
            ComplexComponent::Compound(compound) => compound
                .components
                .iter()
                .any(|s| matches!(s, SimpleSelector::Placeholder(_))),
            ComplexComponent::Combinator(_) => false,
        })
    }

    pub fn contains_parent(&self) -> bool {
        self.components.iter().any(|c| match c {
            ComplexComponent::Compound(compound) => compound
                .components
                .iter()
                .any(|s| matches!(s, SimpleSelector::Parent)),
            ComplexComponent::Combinator(_) => false,
        })
    }

    /// Replaces every `&` in this complex selector with `parent`.
    ///
    /// A compound that is exactly `&` is spliced; a compound like `&.b` or
    /// `&-suffix` merges the extra simples into the parent's final
    /// compound.
    fn substitute_parent(&self, parent: &ComplexSelector) -> ComplexSelector {
        let mut out = Vec::new();

        for component in &self.components {
            match component {
                ComplexComponent::Combinator(c) => {
                    out.push(ComplexComponent::Combinator(*c));
                }

                ComplexComponent::Compound(compound)
                    if compound
                        .components
                        .iter()
                        .any(|s| matches!(s, SimpleSelector::Parent)) =>
                {
                    let rest: Vec<SimpleSelector> = compound
                        .components
                        .iter()
                        .filter(|s| !matches!(s, SimpleSelector::Parent))
                        .cloned()
                        .collect();

                    splice_with_suffix(&mut out, parent, rest);
                }

                ComplexComponent::Compound(compound) => {
                    out.push(ComplexComponent::Compound(compound.clone()));
                }
            }
        }

        ComplexSelector { components: out }
    }

    fn write(&self, out: &mut String, compressed: bool) {
        let mut last_was_compound = false;
        for component in &self.components {
            match component {
                ComplexComponent::Compound(compound) => {
                    if last_was_compound {
                        out.push(' ');
                    }
                    compound.write(out);
                    last_was_compound = true;
                }
                ComplexComponent::Combinator(c) => {
                    if !compressed && last_was_compound {
                        out.push(' ');
                    }
                    out.push(c.symbol());
                    if !compressed {
                        out.push(' ');
                    }
                    last_was_compound = false;
                }
            }
        }
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out, false);
        f.write_str(&out)
    }
}

/// Appends `parent`'s components, merging `extra` simples into its final
/// compound.
pub(crate) fn splice_with_suffix(
    out: &mut Vec<ComplexComponent>,
    parent: &ComplexSelector,
    extra: Vec<SimpleSelector>,
) {
    let last_compound_index = parent
        .components
        .iter()
        .rposition(|c| matches!(c, ComplexComponent::Compound(_)));

    for (i, component) in parent.components.iter().enumerate() {
        if Some(i) == last_compound_index {
            if let ComplexComponent::Compound(last) = component {
                let mut merged = last.components.clone();
                merged.extend(extra.iter().cloned());
                out.push(ComplexComponent::Compound(CompoundSelector {
                    components: merged,
                }));
                continue;
            }
        }
        out.push(component.clone());
    }

    if last_compound_index.is_none() && !extra.is_empty() {
        out.push(ComplexComponent::Compound(CompoundSelector { components: extra }));
    }
}

impl CompoundSelector {
    fn write(&self, out: &mut String) {
        for simple in &self.components {
            simple.write(out);
        }
    }
}

impl SimpleSelector {
    fn write(&self, out: &mut String) {
        match *self {
            SimpleSelector::Universal => out.push('*'),
            SimpleSelector::Type(ref name) => out.push_str(name),
            SimpleSelector::Class(ref name) => {
                out.push('.');
                out.push_str(name);
            }
            SimpleSelector::Id(ref name) => {
                out.push('#');
                out.push_str(name);
            }
            SimpleSelector::Placeholder(ref name) => {
                out.push('%');
                out.push_str(name);
            }
            SimpleSelector::Attribute(ref inner) => {
                out.push('[');
                out.push_str(inner);
                out.push(']');
            }
            SimpleSelector::Pseudo {
                ref name,
                element,
                ref argument,
            } => {
                out.push(':');
                if element {
                    out.push(':');
                }
                out.push_str(name);
                if let Some(arg) = argument {
                    out.push('(');
                    out.push_str(arg);
                    out.push(')');
                }
            }
            SimpleSelector::Parent => out.push('&'),
        }
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out);
        f.write_str(&out)
    }
}

/// Parses one complex selector; the boolean is true when a comma follows.
fn parse_complex<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<(ComplexSelector, bool), SelError<'i>> {
    let mut components: Vec<ComplexComponent> = Vec::new();

    loop {
        let state = parser.state();
        let token = match parser.next_including_whitespace() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        match token {
            Token::WhiteSpace(_) => {}

            Token::Comma => {
                check_trailing(&components, parser)?;
                return Ok((ComplexSelector { components }, true));
            }

            Token::Delim(d @ ('>' | '+' | '~')) => {
                if components.is_empty()
                    || matches!(components.last(), Some(ComplexComponent::Combinator(_)))
                {
                    return Err(parser.new_custom_error(String::from("unexpected combinator")));
                }
                components.push(ComplexComponent::Combinator(match d {
                    '>' => Combinator::Child,
                    '+' => Combinator::NextSibling,
                    _ => Combinator::FollowingSibling,
                }));
            }

            _ => {
                parser.reset(&state);
                let compound = parse_compound(parser)?;
                components.push(ComplexComponent::Compound(compound));
            }
        }
    }

    check_trailing(&components, parser)?;
    Ok((ComplexSelector { components }, false))
}

fn check_trailing<'i>(
    components: &[ComplexComponent],
    parser: &Parser<'i, '_>,
) -> Result<(), SelError<'i>> {
    if matches!(components.last(), Some(ComplexComponent::Combinator(_))) {
        return Err(parser.new_custom_error(String::from("trailing combinator")));
    }
    Ok(())
}

fn parse_compound<'i>(parser: &mut Parser<'i, '_>) -> Result<CompoundSelector, SelError<'i>> {
    let mut components = Vec::new();

    loop {
        let state = parser.state();
        let token = match parser.next_including_whitespace() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        match token {
            Token::Ident(name) => components.push(SimpleSelector::Type(name.as_ref().to_owned())),

            Token::Delim('*') => components.push(SimpleSelector::Universal),

            Token::Delim('&') => components.push(SimpleSelector::Parent),

            Token::Delim('.') => {
                let name = expect_ident(parser)?;
                components.push(SimpleSelector::Class(name));
            }

            Token::Delim('%') => {
                let name = expect_ident(parser)?;
                components.push(SimpleSelector::Placeholder(name));
            }

            Token::IDHash(id) | Token::Hash(id) => {
                components.push(SimpleSelector::Id(id.as_ref().to_owned()));
            }

            Token::Colon => {
                let element = {
                    let state = parser.state();
                    match parser.next_including_whitespace() {
                        Ok(&Token::Colon) => true,
                        _ => {
                            parser.reset(&state);
                            false
                        }
                    }
                };

                match parser.next_including_whitespace()?.clone() {
                    Token::Ident(name) => components.push(SimpleSelector::Pseudo {
                        name: name.as_ref().to_owned(),
                        element,
                        argument: None,
                    }),
                    Token::Function(name) => {
                        let argument = parser.parse_nested_block(collect_raw)?;
                        components.push(SimpleSelector::Pseudo {
                            name: name.as_ref().to_owned(),
                            element,
                            argument: Some(argument),
                        });
                    }
                    _ => {
                        return Err(
                            parser.new_custom_error(String::from("expected pseudo-class name"))
                        )
                    }
                }
            }

            Token::SquareBracketBlock => {
                let inner = parser.parse_nested_block(collect_raw)?;
                components.push(SimpleSelector::Attribute(inner));
            }

            // Keyframe selectors like `0%` reach us as percentage tokens.
            Token::Percentage { .. } | Token::Number { .. } | Token::Dimension { .. } => {
                let mut text = String::new();
                let _ = token.to_css(&mut text);
                components.push(SimpleSelector::Type(text));
            }

            _ => {
                parser.reset(&state);
                break;
            }
        }
    }

    if components.is_empty() {
        return Err(parser.new_custom_error(String::from("expected selector")));
    }

    Ok(CompoundSelector { components })
}

fn expect_ident<'i>(parser: &mut Parser<'i, '_>) -> Result<String, SelError<'i>> {
    match parser.next_including_whitespace()?.clone() {
        Token::Ident(name) => Ok(name.as_ref().to_owned()),
        _ => Err(parser.new_custom_error(String::from("expected identifier"))),
    }
}

/// Serializes a nested block's tokens back to text, recursing into inner
/// blocks.
fn collect_raw<'i>(parser: &mut Parser<'i, '_>) -> Result<String, SelError<'i>> {
    let mut out = String::new();

    loop {
        let token = match parser.next_including_whitespace() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };

        let _ = token.to_css(&mut out);

        match token {
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let inner = parser.parse_nested_block(collect_raw)?;
                out.push_str(&inner);
                out.push(match token {
                    Token::SquareBracketBlock => ']',
                    Token::CurlyBracketBlock => '}',
                    _ => ')',
                });
            }
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SelectorList {
        SelectorList::parse(text).unwrap()
    }

    #[test]
    fn parses_and_prints_compounds() {
        assert_eq!(parse("a.b#c").to_string(), "a.b#c");
        assert_eq!(parse("*").to_string(), "*");
        assert_eq!(parse("%place").to_string(), "%place");
    }

    #[test]
    fn parses_combinators_and_lists() {
        assert_eq!(parse("a > b + c ~ d").to_string(), "a > b + c ~ d");
        assert_eq!(parse("a b").to_string(), "a b");
        assert_eq!(parse("a, .b").to_string(), "a, .b");
    }

    #[test]
    fn compressed_output_drops_spaces() {
        let list = parse("a > b, c d");
        assert_eq!(list.to_css_string(true), "a>b,c d");
    }

    #[test]
    fn parses_pseudo_classes_and_elements() {
        assert_eq!(parse("a:hover").to_string(), "a:hover");
        assert_eq!(parse("a::before").to_string(), "a::before");
        assert_eq!(parse("li:nth-child(2n+1)").to_string(), "li:nth-child(2n+1)");
    }

    #[test]
    fn parses_attribute_selectors() {
        assert_eq!(parse("[href]").to_string(), "[href]");
        assert_eq!(parse("a[href^=\"x\"]").to_string(), "a[href^=\"x\"]");
    }

    #[test]
    fn rejects_bogus_combinators() {
        assert!(SelectorList::parse("> a").is_err());
        assert!(SelectorList::parse("a >").is_err());
        assert!(SelectorList::parse("a > > b").is_err());
        assert!(SelectorList::parse("").is_err());
    }

    #[test]
    fn nesting_without_parent_reference_is_descendant() {
        let parent = parse("a, b");
        let child = parse("c");

        let resolved = child.resolve_parent(Some(&parent)).unwrap();
        assert_eq!(resolved.to_string(), "a c, b c");
    }

    #[test]
    fn parent_reference_substitutes() {
        let parent = parse("a");
        let child = parse("&:hover, .x &");

        let resolved = child.resolve_parent(Some(&parent)).unwrap();
        assert_eq!(resolved.to_string(), "a:hover, .x a");
    }

    #[test]
    fn parent_suffix_concatenates() {
        let parent = parse(".btn");
        let child = parse("&-primary");

        let resolved = child.resolve_parent(Some(&parent)).unwrap();
        assert_eq!(resolved.to_string(), ".btn-primary");
    }

    #[test]
    fn top_level_parent_is_an_error() {
        let child = parse("& b");
        assert!(child.resolve_parent(None).is_err());
    }

    #[test]
    fn placeholders_are_invisible() {
        assert!(parse("%a, %b c").is_invisible());
        assert!(!parse("%a, b").is_invisible());
    }
}
