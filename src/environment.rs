//! Lexically scoped environments for variables, functions, and mixins.
//!
//! An environment is a stack of scopes whose base scope is global.  Scopes
//! are reference-counted so that closures (function and mixin bodies, and
//! the `@content` block passed to a mixin) can capture the chain they were
//! declared in and keep writing through it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::ContentBlock;
use crate::callable::Callable;
use crate::module::Module;
use crate::source::Span;
use crate::value::Value;

#[derive(Default)]
pub struct Scope {
    variables: HashMap<String, Value>,
    variable_spans: HashMap<String, Span>,
    functions: HashMap<String, Rc<Callable>>,
    mixins: HashMap<String, Rc<Callable>>,
}

/// The `@content` block passed to the mixin currently executing, closed
/// over the environment at the `@include`.
pub struct ContentClosure {
    pub block: Rc<ContentBlock>,
    pub environment: Environment,
}

#[derive(Clone)]
pub struct Environment {
    /// Innermost scope last; `scopes[0]` is global.
    scopes: Vec<Rc<RefCell<Scope>>>,

    /// For each variable name, the scope index it was last found or set
    /// in.  Purely a cache over the scope scan, invalidated when a scope
    /// pops.
    variable_indices: HashMap<String, usize>,

    /// Modules exposed under a namespace by `@use "x" as ns`.
    pub modules: HashMap<String, Rc<Module>>,

    /// Modules exposed without a namespace by `@use "x" as *`, in use
    /// order.
    pub global_modules: Vec<Rc<Module>>,

    /// The content block of the innermost `@include … { … }`, if any.
    pub content: Option<Rc<ContentClosure>>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            scopes: vec![Rc::new(RefCell::new(Scope::default()))],
            variable_indices: HashMap::new(),
            modules: HashMap::new(),
            global_modules: Vec::new(),
            content: None,
        }
    }

    /// A closure over the current chain: shares every scope, so later
    /// writes through either copy are visible to both.
    pub fn closure(&self) -> Environment {
        self.clone()
    }

    /// A closure over only the global scope, used when defining module
    /// members that must not capture transient block scopes.
    pub fn global_closure(&self) -> Environment {
        Environment {
            scopes: vec![self.scopes[0].clone()],
            variable_indices: HashMap::new(),
            modules: self.modules.clone(),
            global_modules: self.global_modules.clone(),
            content: None,
        }
    }

    /// Runs `body` in a fresh innermost scope.  Every name introduced in
    /// the scope disappears when it returns, leaving the set of visible
    /// names exactly as before.
    pub fn scope<T>(&mut self, body: impl FnOnce(&mut Environment) -> T) -> T {
        self.push_scope();
        let result = body(self);
        self.pop_scope();
        result
    }

    /// The paired low-level form of [`Environment::scope`], for callers
    /// that interleave scope lifetime with other state.
    pub fn push_scope(&mut self) {
        self.scopes.push(Rc::new(RefCell::new(Scope::default())));
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        let depth = self.scopes.len();
        self.variable_indices.retain(|_, &mut i| i < depth);
    }

    pub fn at_root(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn get_variable(&mut self, name: &str) -> Option<Value> {
        if let Some(&i) = self.variable_indices.get(name) {
            if let Some(v) = self.scopes[i].borrow().variables.get(name) {
                return Some(v.clone());
            }
        }

        for i in (0..self.scopes.len()).rev() {
            if let Some(v) = self.scopes[i].borrow().variables.get(name) {
                self.variable_indices.insert(String::from(name), i);
                return Some(v.clone());
            }
        }

        // `@use "x" as *` members are visible as if global.
        for module in self.global_modules.iter().rev() {
            if let Some(v) = module.variable(name) {
                return Some(v);
            }
        }

        None
    }

    pub fn variable_exists(&mut self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    pub fn global_variable_exists(&self, name: &str) -> bool {
        self.scopes[0].borrow().variables.contains_key(name)
            || self.global_modules.iter().any(|m| m.variable(name).is_some())
    }

    /// Sets a variable per the language's scoping rules: into the global
    /// scope if `global` is set or only the global scope exists; otherwise
    /// into the scope the name is already known in; otherwise into the
    /// current (innermost) scope.
    pub fn set_variable(&mut self, name: &str, value: Value, span: Span, global: bool) {
        if global || self.scopes.len() == 1 {
            self.variable_indices.insert(String::from(name), 0);
            let mut scope = self.scopes[0].borrow_mut();
            scope.variables.insert(String::from(name), value);
            scope.variable_spans.insert(String::from(name), span);
            return;
        }

        let index = self.known_index(name).unwrap_or(self.scopes.len() - 1);
        self.variable_indices.insert(String::from(name), index);
        let mut scope = self.scopes[index].borrow_mut();
        scope.variables.insert(String::from(name), value);
        scope.variable_spans.insert(String::from(name), span);
    }

    fn known_index(&self, name: &str) -> Option<usize> {
        if let Some(&i) = self.variable_indices.get(name) {
            if self.scopes[i].borrow().variables.contains_key(name) {
                return Some(i);
            }
        }
        (0..self.scopes.len())
            .rev()
            .find(|&i| self.scopes[i].borrow().variables.contains_key(name))
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<Callable>> {
        for scope in self.scopes.iter().rev() {
            if let Some(f) = scope.borrow().functions.get(name) {
                return Some(f.clone());
            }
        }
        for module in self.global_modules.iter().rev() {
            if let Some(f) = module.function(name) {
                return Some(f);
            }
        }
        None
    }

    pub fn set_function(&mut self, callable: Rc<Callable>) {
        let name = String::from(callable.name());
        self.scopes
            .last()
            .unwrap()
            .borrow_mut()
            .functions
            .insert(name, callable);
    }

    pub fn get_mixin(&self, name: &str) -> Option<Rc<Callable>> {
        for scope in self.scopes.iter().rev() {
            if let Some(m) = scope.borrow().mixins.get(name) {
                return Some(m.clone());
            }
        }
        for module in self.global_modules.iter().rev() {
            if let Some(m) = module.mixin(name) {
                return Some(m);
            }
        }
        None
    }

    pub fn set_mixin(&mut self, callable: Rc<Callable>) {
        let name = String::from(callable.name());
        self.scopes
            .last()
            .unwrap()
            .borrow_mut()
            .mixins
            .insert(name, callable);
    }

    pub fn module(&self, namespace: &str) -> Option<&Rc<Module>> {
        self.modules.get(namespace)
    }

    /// The names visible in the global scope, for the scoping invariant
    /// and for building modules.
    pub fn global_variable_names(&self) -> Vec<String> {
        self.scopes[0].borrow().variables.keys().cloned().collect()
    }

    /// Snapshot of the global scope's members, used to build a
    /// [`Module`] when a stylesheet finishes evaluating.
    pub fn global_members(
        &self,
    ) -> (
        HashMap<String, Value>,
        HashMap<String, Span>,
        HashMap<String, Rc<Callable>>,
        HashMap<String, Rc<Callable>>,
    ) {
        let scope = self.scopes[0].borrow();
        (
            scope.variables.clone(),
            scope.variable_spans.clone(),
            scope.functions.clone(),
            scope.mixins.clone(),
        )
    }
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Syntax;
    use crate::value::number::Number;

    fn span() -> Span {
        let file = SourceFile::new(String::from("$a: 1;"), None, Syntax::Scss);
        Span::new(file, 0, 1)
    }

    fn num(n: f64) -> Value {
        Value::Number(Number::new(n))
    }

    #[test]
    fn global_scope_is_the_default_target() {
        let mut env = Environment::new();
        env.set_variable("a", num(1.0), span(), false);
        assert_eq!(env.get_variable("a"), Some(num(1.0)));
    }

    #[test]
    fn scopes_shadow_and_unwind() {
        let mut env = Environment::new();
        env.set_variable("a", num(1.0), span(), false);

        env.scope(|env| {
            // A name unseen in outer scopes lands in the innermost scope.
            env.set_variable("b", num(2.0), span(), false);
            assert_eq!(env.get_variable("b"), Some(num(2.0)));

            // A known name is written where it already lives.
            env.set_variable("a", num(3.0), span(), false);
        });

        assert_eq!(env.get_variable("a"), Some(num(3.0)));
        assert_eq!(env.get_variable("b"), None);
    }

    #[test]
    fn scope_restores_visible_names_exactly() {
        let mut env = Environment::new();
        env.set_variable("a", num(1.0), span(), false);
        let before = env.global_variable_names();

        env.scope(|env| {
            env.set_variable("x", num(9.0), span(), false);
            env.set_variable("y", num(9.0), span(), false);
        });

        let mut after = env.global_variable_names();
        let mut before = before;
        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert!(!env.variable_exists("x"));
    }

    #[test]
    fn global_flag_forces_the_base_scope() {
        let mut env = Environment::new();
        env.scope(|env| {
            env.set_variable("a", num(1.0), span(), true);
        });
        assert_eq!(env.get_variable("a"), Some(num(1.0)));
        assert!(env.global_variable_exists("a"));
    }

    #[test]
    fn closures_share_scopes() {
        let mut env = Environment::new();
        env.set_variable("a", num(1.0), span(), false);

        let mut closure = env.closure();
        closure.set_variable("a", num(2.0), span(), false);

        assert_eq!(env.get_variable("a"), Some(num(2.0)));
    }

    proptest::proptest! {
        /// After `scope(body)` returns, the set of visible names equals
        /// the set before the call, whatever the body introduced.
        #[test]
        fn scope_never_leaks_names(
            names in proptest::collection::vec("[a-z]{1,8}", 1..8)
        ) {
            let mut env = Environment::new();
            env.set_variable("outer", num(1.0), span(), false);

            env.scope(|env| {
                for name in &names {
                    env.set_variable(name, num(2.0), span(), false);
                }
            });

            for name in &names {
                if name != "outer" {
                    proptest::prop_assert!(!env.variable_exists(name));
                }
            }
            proptest::prop_assert!(env.variable_exists("outer"));
        }
    }

    #[test]
    fn stale_index_cache_is_ignored() {
        let mut env = Environment::new();
        env.scope(|env| {
            env.set_variable("a", num(1.0), span(), false);
            assert_eq!(env.get_variable("a"), Some(num(1.0)));
        });

        // The inner scope is gone; the cached index must not resurrect it.
        assert_eq!(env.get_variable("a"), None);

        env.set_variable("a", num(5.0), span(), false);
        assert_eq!(env.get_variable("a"), Some(num(5.0)));
    }
}
