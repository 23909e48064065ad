//! Modules: the result of evaluating one stylesheet as a loadable unit.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::callable::Callable;
use crate::css_tree::{self, CssNode};
use crate::extend::Extender;
use crate::importer::CanonicalUrl;
use crate::source::Span;
use crate::value::Value;

pub struct Module {
    /// `None` only for the root module of a string compilation without a
    /// URL.
    pub url: Option<CanonicalUrl>,

    variables: RefCell<HashMap<String, Value>>,
    variable_spans: HashMap<String, Span>,
    functions: HashMap<String, Rc<Callable>>,
    mixins: HashMap<String, Rc<Callable>>,

    /// The CSS this module's own top level produced.
    pub css: RefCell<CssNode>,

    /// The extensions this module declared.
    pub extender: Rc<RefCell<Extender>>,

    /// Modules loaded by this one through `@use` and `@forward`, in load
    /// order.
    pub upstream: Vec<Rc<Module>>,
}

impl Module {
    pub fn new(
        url: Option<CanonicalUrl>,
        variables: HashMap<String, Value>,
        variable_spans: HashMap<String, Span>,
        functions: HashMap<String, Rc<Callable>>,
        mixins: HashMap<String, Rc<Callable>>,
        css: CssNode,
        extender: Rc<RefCell<Extender>>,
        upstream: Vec<Rc<Module>>,
    ) -> Module {
        // Callable maps key each entry by its own name, and variable
        // spans (when recorded) share the variable map's key set.
        debug_assert!(functions.iter().all(|(k, v)| k == v.name()));
        debug_assert!(mixins.iter().all(|(k, v)| k == v.name()));
        debug_assert!(variable_spans.keys().all(|k| variables.contains_key(k)));

        Module {
            url,
            variables: RefCell::new(variables),
            variable_spans,
            functions,
            mixins,
            css: RefCell::new(css),
            extender,
            upstream,
        }
    }

    /// Module members do not leak through `@use`: only names declared in
    /// this module, or copied in by `@forward`, are visible.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(name).cloned()
    }

    pub fn variable_span(&self, name: &str) -> Option<&Span> {
        self.variable_spans.get(name)
    }

    /// Assigns to a module variable (`ns.$name: value`).  Returns false if
    /// the module declares no such variable.
    pub fn set_variable(&self, name: &str, value: Value) -> bool {
        if self.variables.borrow().contains_key(name) {
            self.variables.borrow_mut().insert(String::from(name), value);
            return true;
        }
        false
    }

    pub fn function(&self, name: &str) -> Option<Rc<Callable>> {
        self.functions.get(name).cloned()
    }

    pub fn mixin(&self, name: &str) -> Option<Rc<Callable>> {
        self.mixins.get(name).cloned()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.borrow().keys().cloned().collect()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn mixin_names(&self) -> Vec<String> {
        self.mixins.keys().cloned().collect()
    }

    /// Whether this module's own CSS tree has any nodes.
    pub fn has_css(&self) -> bool {
        self.css.borrow().first_child().is_some()
    }

    /// True iff this module's CSS is non-empty or any upstream module
    /// transitively contains CSS.
    pub fn transitively_contains_css(&self) -> bool {
        self.has_css() || self.upstream.iter().any(|m| m.transitively_contains_css())
    }

    /// Same closure property for extensions.
    pub fn transitively_contains_extensions(&self) -> bool {
        !self.extender.borrow().is_empty()
            || self
                .upstream
                .iter()
                .any(|m| m.transitively_contains_extensions())
    }

    /// A copy of this module with its own CSS tree and extender, for
    /// applying extensions in a different extension context without
    /// disturbing the original.
    pub fn clone_css(&self) -> Module {
        let mut extender = Extender::new();
        extender.merge(&self.extender.borrow());

        Module {
            url: self.url.clone(),
            variables: RefCell::new(self.variables.borrow().clone()),
            variable_spans: self.variable_spans.clone(),
            functions: self.functions.clone(),
            mixins: self.mixins.clone(),
            css: RefCell::new(css_tree::deep_copy(&self.css.borrow())),
            extender: Rc::new(RefCell::new(extender)),
            upstream: self.upstream.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css_tree::{CssComment, CssNodeData, ResolvedText};
    use crate::source::SourceFile;
    use crate::syntax::Syntax;
    use crate::value::Number;

    fn span() -> Span {
        let file = SourceFile::new(String::from("$a: 1;"), None, Syntax::Scss);
        Span::new(file, 0, 2)
    }

    fn empty_module(upstream: Vec<Rc<Module>>) -> Module {
        Module::new(
            None,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            css_tree::new_root(),
            Rc::new(RefCell::new(Extender::new())),
            upstream,
        )
    }

    fn module_with_css() -> Module {
        let mut css = css_tree::new_root();
        css.append(CssNode::new(CssNodeData::Comment(CssComment {
            text: ResolvedText::plain("/* x */", span()),
            span: span(),
        })));

        Module::new(
            None,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            css,
            Rc::new(RefCell::new(Extender::new())),
            Vec::new(),
        )
    }

    #[test]
    fn css_containment_is_transitive() {
        let leaf = Rc::new(module_with_css());
        let empty_between = Rc::new(empty_module(vec![leaf]));
        let top = empty_module(vec![empty_between]);

        assert!(!top.has_css());
        assert!(top.transitively_contains_css());
        assert!(!empty_module(Vec::new()).transitively_contains_css());
    }

    #[test]
    fn members_do_not_leak_through_use() {
        let mut vars = HashMap::new();
        vars.insert(String::from("c"), Value::Number(Number::new(1.0)));
        let upstream = Rc::new(Module::new(
            None,
            vars,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            css_tree::new_root(),
            Rc::new(RefCell::new(Extender::new())),
            Vec::new(),
        ));

        assert!(upstream.variable("c").is_some());
        assert!(upstream.set_variable("c", Value::Number(Number::new(2.0))));
        assert_eq!(
            upstream.variable("c"),
            Some(Value::Number(Number::new(2.0)))
        );

        let m = empty_module(vec![upstream]);
        assert!(m.variable("c").is_none());
        assert!(!m.set_variable("c", Value::Number(Number::new(3.0))));
    }

    #[test]
    fn clone_css_detaches_the_tree() {
        let original = module_with_css();
        let clone = original.clone_css();

        let mut child = clone.css.borrow().first_child().unwrap();
        child.detach();

        assert!(!clone.has_css());
        assert!(original.has_css());
    }
}
