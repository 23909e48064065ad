//! The mutable CSS tree the evaluator builds and the serializer walks.
//!
//! The tree uses the [rctree crate][rctree]: children hold a reference to
//! their parent, can detach themselves in O(1), and the evaluator keeps a
//! cursor node it appends under while walking the Sass AST.  After
//! evaluation the extender mutates style-rule selectors in place; from then
//! on the tree is effectively immutable.

use std::cell::RefCell;

use crate::extend::selector::SelectorList;
use crate::source::Span;
use crate::value::Value;

/// Strong reference to a node in the CSS tree.
pub type CssNode = rctree::Node<CssNodeData>;

/// Text produced by resolving an interpolation, with the offset map that
/// ties each output region back to the source fragment that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub text: String,
    pub regions: Vec<InterpolationRegion>,
    pub span: Span,
}

/// One region of resolved text: a literal fragment copied verbatim, or the
/// output of an embedded expression.
#[derive(Debug, Clone)]
pub struct InterpolationRegion {
    pub start: usize,
    pub end: usize,
    pub span: Span,
    pub is_expression: bool,
}

impl ResolvedText {
    /// Text that came from a single literal source region.
    pub fn plain(text: impl Into<String>, span: Span) -> ResolvedText {
        let text = text.into();
        let len = text.len();
        ResolvedText {
            text,
            regions: vec![InterpolationRegion {
                start: 0,
                end: len,
                span: span.clone(),
                is_expression: false,
            }],
            span,
        }
    }

    /// The original source location for an offset into the resolved text.
    ///
    /// Inside a literal region the offset projects linearly into the
    /// region's span; inside an expression region the whole expression
    /// span is the best available answer.
    pub fn source_at(&self, offset: usize) -> Option<Span> {
        let region = self
            .regions
            .iter()
            .find(|r| offset >= r.start && offset < r.end.max(r.start + 1))?;

        if region.is_expression {
            Some(region.span.clone())
        } else {
            let delta = offset - region.start;
            let span_len = region.span.end - region.span.start;
            let projected = region.span.start + delta.min(span_len);
            Some(Span::new(region.span.file.clone(), projected, region.span.end))
        }
    }
}

/// Payload of one CSS node.
#[derive(Debug, Clone)]
pub enum CssNodeData {
    /// The synthetic root; its children are the top-level rules.
    Root,

    StyleRule(CssStyleRule),
    AtRule(CssAtRule),
    Declaration(CssDeclaration),
    Comment(CssComment),
}

#[derive(Debug, Clone)]
pub struct CssStyleRule {
    /// The resolved selector.  The extender rewrites this in place after
    /// the owning module finishes evaluating.
    pub selector: RefCell<SelectorList>,

    /// The selector as produced by interpolation, for source mapping.
    pub selector_text: ResolvedText,

    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CssAtRule {
    pub name: String,
    pub prelude: Option<ResolvedText>,
    pub has_block: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CssDeclaration {
    pub name: ResolvedText,
    pub value: Value,
    pub value_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CssComment {
    pub text: ResolvedText,
    pub span: Span,
}

/// Creates an empty tree.
pub fn new_root() -> CssNode {
    CssNode::new(CssNodeData::Root)
}

/// Deep-copies a subtree, giving every style rule its own selector cell.
pub fn deep_copy(node: &CssNode) -> CssNode {
    let mut copy = CssNode::new(node.borrow().clone());
    for child in node.children() {
        copy.append(deep_copy(&child));
    }
    copy
}

/// Whether a node produces any output at all: at-rules without bodies and
/// comments always do; style rules and block at-rules only when they have
/// visible children and (for style rules) a visible selector.
pub fn is_invisible(node: &CssNode) -> bool {
    let data = node.borrow();
    match *data {
        CssNodeData::Root => node.children().all(|c| is_invisible(&c)),

        CssNodeData::StyleRule(ref rule) => {
            rule.selector.borrow().is_invisible() || node.children().all(|c| is_invisible(&c))
        }

        CssNodeData::AtRule(ref rule) => {
            rule.has_block && node.children().all(|c| is_invisible(&c))
        }

        CssNodeData::Declaration(_) | CssNodeData::Comment(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Syntax;

    fn span(text: &str, start: usize, end: usize) -> Span {
        let file = SourceFile::new(String::from(text), None, Syntax::Scss);
        Span::new(file, start, end)
    }

    #[test]
    fn plain_text_projects_linearly() {
        // Offsets 4..9 of the source hold "hello".
        let resolved = ResolvedText::plain("hello", span("a { hello: 1 }", 4, 9));

        let at_0 = resolved.source_at(0).unwrap();
        assert_eq!(at_0.start, 4);

        let at_3 = resolved.source_at(3).unwrap();
        assert_eq!(at_3.start, 7);
    }

    #[test]
    fn expression_regions_map_to_the_whole_expression() {
        let expr_span = span("a-#{$x}-b", 2, 7);
        let resolved = ResolvedText {
            text: String::from("a-wide-b"),
            regions: vec![
                InterpolationRegion {
                    start: 0,
                    end: 2,
                    span: span("a-#{$x}-b", 0, 2),
                    is_expression: false,
                },
                InterpolationRegion {
                    start: 2,
                    end: 6,
                    span: expr_span,
                    is_expression: true,
                },
                InterpolationRegion {
                    start: 6,
                    end: 8,
                    span: span("a-#{$x}-b", 7, 9),
                    is_expression: false,
                },
            ],
            span: span("a-#{$x}-b", 0, 9),
        };

        // Any offset inside the expression's output maps to its full span.
        let inside = resolved.source_at(4).unwrap();
        assert_eq!((inside.start, inside.end), (2, 7));

        let tail = resolved.source_at(7).unwrap();
        assert_eq!(tail.start, 8);
    }

    #[test]
    fn deep_copy_is_structural() {
        let mut root = new_root();
        let comment = CssNode::new(CssNodeData::Comment(CssComment {
            text: ResolvedText::plain("/* x */", span("/* x */", 0, 7)),
            span: span("/* x */", 0, 7),
        }));
        root.append(comment);

        let copy = deep_copy(&root);
        assert_eq!(copy.children().count(), 1);

        // Detaching from the copy leaves the original alone.
        let mut copied_child = copy.first_child().unwrap();
        copied_child.detach();
        assert_eq!(root.children().count(), 1);
    }
}
