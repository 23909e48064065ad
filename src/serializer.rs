//! Serializing the CSS tree to text.
//!
//! The serializer walks the evaluated tree and produces formatted CSS in
//! the expanded or compressed style, applying the configured indentation
//! and line-feed to every line it emits.  When a source map is requested
//! it records a mapping at each token that traces to an original source,
//! consulting each node's interpolation map for text that interpolation
//! produced.

use crate::css_tree::{self, CssNode, CssNodeData, ResolvedText};
use crate::error::CompileError;
use crate::extend::selector::SelectorList;
use crate::sourcemap::SourceMapBuilder;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputStyle {
    Expanded,
    Compressed,
}

/// How newlines are written.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineFeed {
    Lf,
    Cr,
    CrLf,
    LfCr,
}

impl LineFeed {
    pub fn text(self) -> &'static str {
        match self {
            LineFeed::Lf => "\n",
            LineFeed::Cr => "\r",
            LineFeed::CrLf => "\r\n",
            LineFeed::LfCr => "\n\r",
        }
    }
}

pub struct SerializeOptions {
    pub style: OutputStyle,
    /// One level of indentation, already expanded from the
    /// spaces/width/tabs options.
    pub indent: String,
    pub line_feed: LineFeed,
    /// Prefix a charset marker when the output contains non-ASCII text.
    pub charset: bool,
    pub source_map: bool,
}

pub struct Serialized {
    pub css: String,
    pub map: Option<SourceMapBuilder>,
}

/// Serializes an evaluated CSS tree.
pub fn serialize(root: &CssNode, options: &SerializeOptions) -> Result<Serialized, CompileError> {
    let mut writer = CssWriter {
        out: String::new(),
        options,
        indent_level: 0,
        line: 0,
        column: 0,
        map: if options.source_map {
            Some(SourceMapBuilder::new())
        } else {
            None
        },
    };

    let children: Vec<CssNode> = root
        .children()
        .filter(|c| !css_tree::is_invisible(c))
        .collect();

    let compressed = options.style == OutputStyle::Compressed;
    let mut first = true;
    for child in &children {
        // Compressed output drops comments entirely (except `/*!`).
        if compressed && is_droppable_comment(child) {
            continue;
        }
        if !first {
            if compressed {
                // Rules are self-delimiting in compressed output.
            } else {
                writer.newline();
                writer.newline();
            }
        }
        first = false;
        writer.write_node(child)?;
    }

    if options.charset && writer.out.bytes().any(|b| b >= 0x80) {
        match options.style {
            OutputStyle::Expanded => {
                let prefix = format!("@charset \"UTF-8\";{}", options.line_feed.text());
                writer.out.insert_str(0, &prefix);
                if let Some(ref mut map) = writer.map {
                    map.shift_lines(1);
                }
            }
            OutputStyle::Compressed => {
                writer.out.insert(0, '\u{FEFF}');
                if let Some(ref mut map) = writer.map {
                    map.shift_first_line(1);
                }
            }
        }
    }

    Ok(Serialized {
        css: writer.out,
        map: writer.map,
    })
}

fn is_droppable_comment(node: &CssNode) -> bool {
    match *node.borrow() {
        CssNodeData::Comment(ref comment) => !comment.text.text.starts_with("/*!"),
        _ => false,
    }
}

struct CssWriter<'a> {
    out: String,
    options: &'a SerializeOptions,
    indent_level: usize,
    line: u32,
    column: u32,
    map: Option<SourceMapBuilder>,
}

impl<'a> CssWriter<'a> {
    fn compressed(&self) -> bool {
        self.options.style == OutputStyle::Compressed
    }

    fn write(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.out.push_str(self.options.line_feed.text());
        self.line += 1;
        self.column = 0;
    }

    fn indent(&mut self) {
        for _ in 0..self.indent_level {
            let indent = self.options.indent.clone();
            self.write(&indent);
        }
    }

    /// Records a mapping from the current output position to a span.
    fn mark(&mut self, span: &crate::source::Span) {
        if let Some(ref mut map) = self.map {
            map.add(self.line, self.column, span);
        }
    }

    /// Records mappings for text produced by interpolation: one segment
    /// per region, literal regions projecting linearly and expression
    /// regions pointing at their whole expression.
    fn mark_resolved(&mut self, resolved: &ResolvedText) {
        if self.map.is_none() {
            return;
        }
        for region in &resolved.regions {
            if let Some(span) = resolved.source_at(region.start) {
                let column = self.column + region.start as u32;
                if let Some(ref mut map) = self.map {
                    map.add(self.line, column, &span);
                }
            }
        }
    }

    fn write_node(&mut self, node: &CssNode) -> Result<(), CompileError> {
        let data = node.borrow().clone();
        match data {
            CssNodeData::Root => Ok(()),

            CssNodeData::StyleRule(ref rule) => {
                self.mark_resolved(&rule.selector_text);
                let selector = visible_selector(&rule.selector.borrow());
                let selector_text = selector.to_css_string(self.compressed());
                self.write(&selector_text);

                if self.compressed() {
                    self.write("{");
                } else {
                    self.write(" {");
                }
                self.write_children(node)?;
                self.write("}");
                Ok(())
            }

            CssNodeData::AtRule(ref rule) => {
                self.mark(&rule.span);
                self.write("@");
                self.write(&rule.name.clone());

                if let Some(ref prelude) = rule.prelude {
                    self.write(" ");
                    self.mark_resolved(prelude);
                    let text = prelude.text.clone();
                    self.write(&text);
                }

                if !rule.has_block {
                    self.write(";");
                    return Ok(());
                }

                if self.compressed() {
                    self.write("{");
                } else {
                    self.write(" {");
                }
                self.write_children(node)?;
                self.write("}");
                Ok(())
            }

            CssNodeData::Declaration(ref decl) => {
                self.mark_resolved(&decl.name);
                let name = decl.name.text.clone();
                self.write(&name);
                if self.compressed() {
                    self.write(":");
                } else {
                    self.write(": ");
                }

                self.mark(&decl.value_span);
                let value = decl
                    .value
                    .to_css_string(self.compressed())
                    .map_err(|message| CompileError::runtime(message, decl.value_span.clone()))?;
                self.write(&value);
                Ok(())
            }

            CssNodeData::Comment(ref comment) => {
                self.mark_resolved(&comment.text);
                let text = comment.text.text.clone();
                self.write(&text);
                Ok(())
            }
        }
    }

    /// Writes a block's children between the braces the caller emits.
    fn write_children(&mut self, parent: &CssNode) -> Result<(), CompileError> {
        let children: Vec<CssNode> = parent
            .children()
            .filter(|c| !css_tree::is_invisible(c))
            .collect();

        if self.compressed() {
            // Declarations need a terminator before whatever follows, but
            // the last child in a block goes without one.
            let mut pending_semicolon = false;
            for child in &children {
                if is_droppable_comment(child) {
                    continue;
                }
                if pending_semicolon {
                    self.write(";");
                }
                self.write_node(child)?;
                pending_semicolon = matches!(*child.borrow(), CssNodeData::Declaration(_));
            }
            return Ok(());
        }

        self.indent_level += 1;
        for child in &children {
            self.newline();
            self.indent();
            self.write_node(child)?;
            if matches!(*child.borrow(), CssNodeData::Declaration(_)) {
                self.write(";");
            }
        }
        self.indent_level -= 1;
        self.newline();
        self.indent();
        Ok(())
    }
}

/// The selector list minus placeholder-only complex selectors.
fn visible_selector(selector: &SelectorList) -> SelectorList {
    SelectorList {
        components: selector
            .components
            .iter()
            .filter(|c| !c.is_invisible())
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css_tree::{CssComment, CssDeclaration, CssNodeData, CssStyleRule, ResolvedText};
    use crate::extend::selector::SelectorList;
    use crate::source::{SourceFile, Span};
    use crate::syntax::Syntax;
    use crate::value::{Number, Value};
    use std::cell::RefCell;

    fn span(text: &str) -> Span {
        let file = SourceFile::new(String::from(text), None, Syntax::Scss);
        Span::new(file.clone(), 0, file.text().len())
    }

    fn options(style: OutputStyle) -> SerializeOptions {
        SerializeOptions {
            style,
            indent: String::from("  "),
            line_feed: LineFeed::Lf,
            charset: true,
            source_map: false,
        }
    }

    fn sample_tree() -> CssNode {
        let mut root = css_tree::new_root();
        let mut rule = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
            selector: RefCell::new(SelectorList::parse("a").unwrap()),
            selector_text: ResolvedText::plain("a", span("a { b: c; }")),
            span: span("a { b: c; }"),
        }));
        rule.append(CssNode::new(CssNodeData::Declaration(CssDeclaration {
            name: ResolvedText::plain("b", span("a { b: c; }")),
            value: Value::Number(Number::new(3.0)),
            value_span: span("a { b: c; }"),
            span: span("a { b: c; }"),
        })));
        root.append(rule);
        root
    }

    #[test]
    fn expanded_layout() {
        let css = serialize(&sample_tree(), &options(OutputStyle::Expanded))
            .unwrap()
            .css;
        assert_eq!(css, "a {\n  b: 3;\n}");
    }

    #[test]
    fn compressed_layout() {
        let css = serialize(&sample_tree(), &options(OutputStyle::Compressed))
            .unwrap()
            .css;
        assert_eq!(css, "a{b:3}");
    }

    #[test]
    fn line_feed_applies_to_every_newline() {
        let mut opts = options(OutputStyle::Expanded);
        opts.line_feed = LineFeed::CrLf;
        let css = serialize(&sample_tree(), &opts).unwrap().css;
        assert_eq!(css, "a {\r\n  b: 3;\r\n}");
    }

    #[test]
    fn placeholder_only_rules_are_invisible() {
        let mut root = css_tree::new_root();
        let mut rule = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
            selector: RefCell::new(SelectorList::parse("%base").unwrap()),
            selector_text: ResolvedText::plain("%base", span("%base {}")),
            span: span("%base {}"),
        }));
        rule.append(CssNode::new(CssNodeData::Declaration(CssDeclaration {
            name: ResolvedText::plain("b", span("%base { b: 1; }")),
            value: Value::Number(Number::new(1.0)),
            value_span: span("%base { b: 1; }"),
            span: span("%base { b: 1; }"),
        })));
        root.append(rule);

        let css = serialize(&root, &options(OutputStyle::Expanded)).unwrap().css;
        assert_eq!(css, "");
    }

    #[test]
    fn extended_placeholder_serializes_only_visible_selectors() {
        let mut root = css_tree::new_root();
        let mut rule = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
            selector: RefCell::new(SelectorList::parse("%base, .real").unwrap()),
            selector_text: ResolvedText::plain("%base", span("%base {}")),
            span: span("%base {}"),
        }));
        rule.append(CssNode::new(CssNodeData::Declaration(CssDeclaration {
            name: ResolvedText::plain("b", span("x")),
            value: Value::Number(Number::new(1.0)),
            value_span: span("x"),
            span: span("x"),
        })));
        root.append(rule);

        let css = serialize(&root, &options(OutputStyle::Expanded)).unwrap().css;
        assert_eq!(css, ".real {\n  b: 1;\n}");
    }

    #[test]
    fn charset_prefixes_non_ascii_output() {
        let mut root = css_tree::new_root();
        root.append(CssNode::new(CssNodeData::Comment(CssComment {
            text: ResolvedText::plain("/* ünïcode */", span("/* ünïcode */")),
            span: span("/* ünïcode */"),
        })));

        let expanded = serialize(&root, &options(OutputStyle::Expanded)).unwrap().css;
        assert!(expanded.starts_with("@charset \"UTF-8\";\n"));

        let compressed = serialize(&root, &options(OutputStyle::Compressed)).unwrap();
        // Compressed drops the comment, so nothing non-ASCII remains.
        assert_eq!(compressed.css, "");
    }

    #[test]
    fn source_map_positions_point_at_selectors() {
        let mut opts = options(OutputStyle::Expanded);
        opts.source_map = true;
        let result = serialize(&sample_tree(), &opts).unwrap();
        let map = result.map.unwrap().build(crate::sourcemap::IncludeSources::Never);
        assert!(!map.mappings.is_empty());
    }
}
