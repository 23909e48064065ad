//! Collecting and applying `@extend`.
//!
//! During evaluation each module's extender records
//! `target extended-by complex` triples.  After the module's CSS is
//! complete, [`Extender::apply`] rewrites the selector lists in the tree:
//! wherever a selector contains the target simple selector, the selectors
//! obtained by substituting the extending complex selector for the target
//! are added, and equivalent selectors are de-duplicated structurally.

pub mod selector;

use std::collections::HashSet;

use crate::css_tree::{CssNode, CssNodeData};
use crate::source::Span;

use self::selector::{
    splice_with_suffix, ComplexComponent, ComplexSelector, SelectorList, SimpleSelector,
};

/// One recorded `@extend`.
#[derive(Debug, Clone)]
pub struct Extension {
    pub target: SimpleSelector,
    pub extender: ComplexSelector,
    pub span: Span,
    pub optional: bool,
}

#[derive(Debug, Default)]
pub struct Extender {
    extensions: Vec<Extension>,
}

/// A mandatory `@extend` whose target appeared nowhere.
pub struct UnsatisfiedExtension {
    pub target: SimpleSelector,
    pub span: Span,
}

impl Extender {
    pub fn new() -> Extender {
        Extender::default()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Records `@extend target` inside a rule whose resolved selector is
    /// `extender`.  Each complex selector in `target` must be a lone
    /// compound; each of its simple selectors becomes a separate
    /// extension, paired with every complex selector of `extender`.
    pub fn add_extension(
        &mut self,
        target: &SelectorList,
        extender: &SelectorList,
        span: &Span,
        optional: bool,
    ) -> Result<(), String> {
        for complex in &target.components {
            let compound = match complex.components.as_slice() {
                [ComplexComponent::Compound(compound)] => compound,
                _ => {
                    return Err(String::from(
                        "complex selectors may not be extended.",
                    ))
                }
            };

            for simple in &compound.components {
                for extender_complex in &extender.components {
                    self.extensions.push(Extension {
                        target: simple.clone(),
                        extender: extender_complex.clone(),
                        span: span.clone(),
                        optional,
                    });
                }
            }
        }

        Ok(())
    }

    /// Copies another extender's extensions after this one's, preserving
    /// each set's internal order.  Used when composing extension sets
    /// across module boundaries, downstream-first.
    pub fn merge(&mut self, other: &Extender) {
        self.extensions.extend(other.extensions.iter().cloned());
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Rewrites every style rule in the tree.  Returns the mandatory
    /// extensions whose targets never matched, for the caller to report.
    pub fn apply(&self, root: &CssNode) -> Vec<UnsatisfiedExtension> {
        let found = self.apply_tracked(root);

        self.extensions
            .iter()
            .zip(found)
            .filter(|(ext, found)| !ext.optional && !found)
            .map(|(ext, _)| UnsatisfiedExtension {
                target: ext.target.clone(),
                span: ext.span.clone(),
            })
            .collect()
    }

    /// Like [`Extender::apply`], but reports which extensions matched at
    /// least once, aligned with [`Extender::extensions`].  Callers that
    /// apply one logical extension set across several trees aggregate
    /// these flags before deciding anything is unsatisfied.
    pub fn apply_tracked(&self, root: &CssNode) -> Vec<bool> {
        let mut found = vec![false; self.extensions.len()];
        if !self.extensions.is_empty() {
            self.apply_node(root, &mut found);
        }
        found
    }

    fn apply_node(&self, node: &CssNode, found: &mut [bool]) {
        if let CssNodeData::StyleRule(ref rule) = *node.borrow() {
            let mut selector = rule.selector.borrow_mut();
            *selector = self.extend_list(&selector, found);
        }

        for child in node.children() {
            self.apply_node(&child, found);
        }
    }

    /// The extended form of a selector list: the original selectors in
    /// order, then every new selector produced by extension (transitively,
    /// so an extension may apply to another's output), de-duplicated.
    fn extend_list(&self, list: &SelectorList, found: &mut [bool]) -> SelectorList {
        let mut components: Vec<ComplexSelector> = Vec::new();
        let mut seen: HashSet<ComplexSelector> = HashSet::new();
        let mut queue: Vec<ComplexSelector> = Vec::new();

        for complex in &list.components {
            if seen.insert(complex.clone()) {
                components.push(complex.clone());
                queue.push(complex.clone());
            }
        }

        // Extensions compose: substituted selectors are themselves
        // candidates for further extension.  The seen-set makes this
        // terminate even for mutually recursive extends.
        while let Some(complex) = queue.pop() {
            for (i, extension) in self.extensions.iter().enumerate() {
                for substituted in substitute(&complex, extension) {
                    found[i] = true;
                    if seen.insert(substituted.clone()) {
                        components.push(substituted.clone());
                        queue.push(substituted);
                    }
                }
            }
        }

        SelectorList { components }
    }
}

/// Every selector derived from `complex` by replacing one occurrence of
/// the extension's target with its extender.
fn substitute(complex: &ComplexSelector, extension: &Extension) -> Vec<ComplexSelector> {
    let mut results = Vec::new();

    for (i, component) in complex.components.iter().enumerate() {
        let ComplexComponent::Compound(compound) = component else {
            continue;
        };
        if !compound.components.contains(&extension.target) {
            continue;
        }

        // The compound minus the target, merged into the extender's final
        // compound.
        let rest: Vec<SimpleSelector> = compound
            .components
            .iter()
            .filter(|s| **s != extension.target)
            .cloned()
            .collect();

        let mut components = complex.components[..i].to_vec();
        splice_with_suffix(&mut components, &extension.extender, rest);
        components.extend(complex.components[i + 1..].iter().cloned());

        results.push(ComplexSelector { components });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Syntax;

    fn span() -> Span {
        let file = SourceFile::new(String::from("@extend x;"), None, Syntax::Scss);
        Span::new(file, 0, 9)
    }

    fn list(text: &str) -> SelectorList {
        SelectorList::parse(text).unwrap()
    }

    fn extended(extender: &Extender, selector: &str) -> String {
        let mut found = vec![false; extender.extensions.len()];
        extender.extend_list(&list(selector), &mut found).to_string()
    }

    #[test]
    fn simple_substitution() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("a"), &list("b"), &span(), false)
            .unwrap();

        assert_eq!(extended(&extender, "a"), "a, b");
        assert_eq!(extended(&extender, "a.x"), "a.x, b.x");
        assert_eq!(extended(&extender, "c a"), "c a, c b");
        assert_eq!(extended(&extender, "c"), "c");
    }

    #[test]
    fn class_targets_and_compound_extenders() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list(".warn"), &list(".alert.bad"), &span(), false)
            .unwrap();

        assert_eq!(extended(&extender, ".warn"), ".warn, .alert.bad");
    }

    #[test]
    fn multi_target_lists_extend_each_simple() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("a, .b"), &list(".new"), &span(), false)
            .unwrap();

        assert_eq!(extended(&extender, "a"), "a, .new");
        assert_eq!(extended(&extender, ".b"), ".b, .new");
    }

    #[test]
    fn extensions_compose_transitively() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("a"), &list("b"), &span(), false)
            .unwrap();
        extender
            .add_extension(&list("b"), &list("c"), &span(), false)
            .unwrap();

        let result = extended(&extender, "a");
        assert!(result.contains("a"));
        assert!(result.contains("b"));
        assert!(result.contains("c"));
    }

    #[test]
    fn mutually_recursive_extends_terminate() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("a"), &list("b"), &span(), false)
            .unwrap();
        extender
            .add_extension(&list("b"), &list("a"), &span(), false)
            .unwrap();

        assert_eq!(extended(&extender, "a"), "a, b");
    }

    #[test]
    fn duplicates_are_removed() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("a"), &list("b"), &span(), false)
            .unwrap();
        extender
            .add_extension(&list("a"), &list("b"), &span(), false)
            .unwrap();

        assert_eq!(extended(&extender, "a"), "a, b");
    }

    #[test]
    fn complex_targets_are_rejected() {
        let mut extender = Extender::new();
        assert!(extender
            .add_extension(&list("a b"), &list("c"), &span(), false)
            .is_err());
    }

    #[test]
    fn unsatisfied_mandatory_extensions_are_reported() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list(".nope"), &list("a"), &span(), false)
            .unwrap();
        extender
            .add_extension(&list(".fine"), &list("a"), &span(), true)
            .unwrap();

        let root = crate::css_tree::new_root();
        let unsatisfied = extender.apply(&root);
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].target, SimpleSelector::Class(String::from("nope")));
    }

    #[test]
    fn placeholder_extension() {
        let mut extender = Extender::new();
        extender
            .add_extension(&list("%base"), &list(".real"), &span(), false)
            .unwrap();

        let result = extended(&extender, "%base");
        assert_eq!(result, "%base, .real");
        assert!(!list(&result).is_invisible());
    }
}
