//! The evaluator: reduces a parsed stylesheet to a CSS tree.
//!
//! One [`Evaluator`] walks the AST of the entrypoint and of every module it
//! loads, maintaining the scoped [`Environment`], the module graph, the
//! current insertion point into the mutable CSS tree, and the call stack
//! used for error traces.  When evaluation completes, the per-module CSS
//! trees are concatenated in load order and `@extend`s are applied across
//! the module graph, downstream-first.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::*;
use crate::callable::{Callable, UserCallable};
use crate::context::EvalContext;
use crate::css_tree::{
    self, CssAtRule, CssComment, CssDeclaration, CssNode, CssNodeData, CssStyleRule,
    InterpolationRegion, ResolvedText,
};
use crate::deprecation::Deprecation;
use crate::dispatcher::{InboundResponse, OutboundRequest};
use crate::environment::{ContentClosure, Environment};
use crate::error::{CompileError, ProtocolError, TraceFrame};
use crate::extend::selector::SelectorList;
use crate::extend::Extender;
use crate::functions;
use crate::import_cache::{CachedImport, ImportCache};
use crate::importer::CanonicalUrl;
use crate::limits;
use crate::module::Module;
use crate::parse;
use crate::session::Session;
use crate::source::Span;
use crate::value::{
    ArgList, Color, Keywords, List, ListSeparator, Map, Number, SassFunction, Str, Value,
};

/// Function names that always pass through as plain CSS, arguments
/// rendered from their unevaluated form.
const CSS_PASSTHROUGH_FUNCTIONS: &[&str] =
    &["calc", "clamp", "var", "env", "counter", "counters", "expression", "element"];

pub struct EvalResult {
    /// The combined CSS of every module, extensions applied.
    pub css: CssNode,

    pub root_module: Rc<Module>,
}

/// Evaluates a parsed stylesheet.
///
/// `entry_importer`/`entry_url` identify how the entrypoint was loaded, so
/// relative imports resolve against it; both are `None` for string input.
pub fn evaluate(
    stylesheet: &Stylesheet,
    import_cache: &ImportCache,
    session: &Session,
    custom_functions: &HashMap<String, Rc<Callable>>,
    entry_importer: Option<usize>,
    entry_url: Option<CanonicalUrl>,
) -> Result<EvalResult, CompileError> {
    let mut builtins = HashMap::new();
    for def in functions::all() {
        let (name, signature) = parse::parse_signature(def.signature)
            .unwrap_or_else(|e| panic!("builtin signature {:?} must parse: {e}", def.signature));
        debug_assert_eq!(name, def.name);
        builtins.insert(
            def.name,
            Rc::new(Callable::Builtin(crate::callable::BuiltinCallable {
                name: String::from(def.name),
                signature: Rc::new(signature),
                // A fn pointer is already a `Fn`; no closure needed.
                function: Rc::new(def.function),
            })),
        );
    }

    let root = css_tree::new_root();
    let mut evaluator = Evaluator {
        session,
        import_cache,
        custom_functions,
        builtins,
        env: Environment::new(),
        current: root.clone(),
        root,
        style_rule: None,
        declaration_name: None,
        in_keyframes: false,
        media_queries: Vec::new(),
        extender: Rc::new(RefCell::new(Extender::new())),
        modules: HashMap::new(),
        active_modules: vec![entry_url.clone()],
        upstream: Vec::new(),
        forwarded: Vec::new(),
        configuration: None,
        call_stack: Vec::new(),
        in_mixin: false,
        in_function: false,
        in_parens: false,
        current_importer: entry_importer,
        current_url: entry_url.clone(),
    };

    evaluator
        .visit_statements(&stylesheet.statements)
        .map_err(|e| {
            e.with_frame(TraceFrame {
                name: None,
                span: stylesheet.span.clone(),
            })
        })?;
    let root_module = evaluator.build_module(entry_url)?;
    let css = finish(&root_module)?;

    Ok(EvalResult { css, root_module })
}

/// A module's variable configuration from `@use … with (…)`, shared with
/// the `@forward` rules that pass it along.
struct Configuration {
    values: HashMap<String, (Value, Span)>,
    used: HashSet<String>,
}

type SharedConfiguration = Rc<RefCell<Configuration>>;

struct ForwardedModule {
    module: Rc<Module>,
    prefix: Option<String>,
    visibility: Option<ForwardVisibility>,
}

/// Evaluator state that is per-module, saved and restored around module
/// evaluation.
struct ModuleState {
    env: Environment,
    root: CssNode,
    current: CssNode,
    style_rule: Option<Rc<SelectorList>>,
    declaration_name: Option<String>,
    in_keyframes: bool,
    media_queries: Vec<String>,
    extender: Rc<RefCell<Extender>>,
    upstream: Vec<Rc<Module>>,
    forwarded: Vec<ForwardedModule>,
    configuration: Option<SharedConfiguration>,
    in_mixin: bool,
    in_function: bool,
    current_importer: Option<usize>,
    current_url: Option<CanonicalUrl>,
}

/// The evaluated arguments at one call site, rest arguments flattened.
struct EvaluatedArgs {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

pub struct Evaluator<'a> {
    session: &'a Session,
    import_cache: &'a ImportCache,
    custom_functions: &'a HashMap<String, Rc<Callable>>,
    builtins: HashMap<&'static str, Rc<Callable>>,

    env: Environment,
    root: CssNode,
    current: CssNode,
    style_rule: Option<Rc<SelectorList>>,
    declaration_name: Option<String>,
    in_keyframes: bool,
    media_queries: Vec<String>,
    extender: Rc<RefCell<Extender>>,

    modules: HashMap<CanonicalUrl, Rc<Module>>,
    active_modules: Vec<Option<CanonicalUrl>>,
    upstream: Vec<Rc<Module>>,
    forwarded: Vec<ForwardedModule>,
    configuration: Option<SharedConfiguration>,

    call_stack: Vec<TraceFrame>,
    in_mixin: bool,
    in_function: bool,

    /// Whether evaluation is inside parentheses, which make `/` an
    /// unambiguous division operator.
    in_parens: bool,

    current_importer: Option<usize>,
    current_url: Option<CanonicalUrl>,
}

impl<'a> Evaluator<'a> {
    // ----- statements -----

    fn visit_statements(
        &mut self,
        statements: &[Statement],
    ) -> Result<Option<Value>, CompileError> {
        for statement in statements {
            if let Some(returned) = self.visit_statement(statement)? {
                return Ok(Some(returned));
            }
        }
        Ok(None)
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result<Option<Value>, CompileError> {
        match statement {
            Statement::StyleRule(rule) => self.visit_style_rule(rule),
            Statement::Declaration(decl) => self.visit_declaration(decl).map(|_| None),
            Statement::VariableDecl(decl) => self.visit_variable_decl(decl).map(|_| None),

            Statement::FunctionRule(decl) => {
                let callable = Rc::new(Callable::UserFunction(UserCallable {
                    declaration: decl.clone(),
                    environment: self.env.closure(),
                }));
                self.env.set_function(callable);
                Ok(None)
            }

            Statement::MixinRule(decl) => {
                let callable = Rc::new(Callable::UserMixin(UserCallable {
                    declaration: decl.clone(),
                    environment: self.env.closure(),
                }));
                self.env.set_mixin(callable);
                Ok(None)
            }

            Statement::Include(include) => self.visit_include(include),
            Statement::Content(content) => self.visit_content(content),

            Statement::Return(rule) => {
                if !self.in_function {
                    return Err(CompileError::runtime(
                        "@return may only be used within a function.",
                        rule.span.clone(),
                    ));
                }
                Ok(Some(self.visit_expression(&rule.value)?))
            }

            Statement::If(rule) => self.visit_if(rule),
            Statement::Each(rule) => self.visit_each(rule),
            Statement::For(rule) => self.visit_for(rule),
            Statement::While(rule) => self.visit_while(rule),

            Statement::Use(rule) => self.visit_use(rule).map(|_| None),
            Statement::Forward(rule) => self.visit_forward(rule).map(|_| None),
            Statement::Import(rule) => self.visit_import(rule).map(|_| None),

            Statement::Extend(rule) => self.visit_extend(rule).map(|_| None),
            Statement::Media(rule) => self.visit_media(rule),
            Statement::AtRule(rule) => self.visit_at_rule(rule),

            Statement::Warn(rule) => {
                let value = self.visit_expression(&rule.expression)?;
                let message = match value {
                    Value::String(s) => s.text,
                    other => other.inspect(),
                };
                self.session.warn(
                    &message,
                    Some(&rule.span),
                    Some(&self.call_stack),
                    None,
                )?;
                Ok(None)
            }

            Statement::Debug(rule) => {
                let value = self.visit_expression(&rule.expression)?;
                self.session.debug(&value.inspect(), Some(&rule.span));
                Ok(None)
            }

            Statement::Error(rule) => {
                let value = self.visit_expression(&rule.expression)?;
                let message = match value {
                    Value::String(s) => s.text,
                    other => other.inspect(),
                };
                Err(CompileError::Runtime {
                    message,
                    span: rule.span.clone(),
                    trace: self.call_stack.clone(),
                })
            }

            Statement::LoudComment(comment) => {
                self.visit_loud_comment(comment).map(|_| None)
            }

            Statement::SilentComment(_) => Ok(None),
        }
    }

    fn assert_no_css_in_function(
        &self,
        what: &str,
        span: &Span,
    ) -> Result<(), CompileError> {
        if self.in_function {
            return Err(CompileError::runtime(
                format!("{what} may not be used within a function."),
                span.clone(),
            ));
        }
        Ok(())
    }

    // ----- CSS tree plumbing -----

    /// Appends a node under the current parent.  Rules pass through
    /// enclosing style rules so nested rules land beside their parent in
    /// the output, not inside it.
    fn add_child(&mut self, node: CssNode, through_style_rules: bool) {
        let mut parent = self.current.clone();
        if through_style_rules {
            loop {
                let is_style_rule = matches!(*parent.borrow(), CssNodeData::StyleRule(_));
                if !is_style_rule {
                    break;
                }
                parent = parent.parent().expect("style rules always have a parent");
            }
        }
        parent.append(node);
    }

    fn visit_style_rule(&mut self, rule: &StyleRule) -> Result<Option<Value>, CompileError> {
        self.assert_no_css_in_function("Style rules", &rule.span)?;

        let resolved = self.resolve_interpolation(&rule.selector)?;
        let parsed = SelectorList::parse(&resolved.text)
            .map_err(|e| CompileError::runtime(e, rule.selector.span.clone()))?;

        let selector = if self.in_keyframes {
            parsed
        } else {
            parsed
                .resolve_parent(self.style_rule.as_deref())
                .map_err(|e| CompileError::runtime(e, rule.selector.span.clone()))?
        };

        let node = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
            selector: RefCell::new(selector.clone()),
            selector_text: resolved,
            span: rule.span.clone(),
        }));
        self.add_child(node.clone(), true);

        let old_current = std::mem::replace(&mut self.current, node);
        let old_style_rule = self.style_rule.replace(Rc::new(selector));

        self.env.push_scope();
        let result = self.visit_statements(&rule.body);
        self.env.pop_scope();

        self.current = old_current;
        self.style_rule = old_style_rule;
        result
    }

    fn visit_declaration(&mut self, decl: &Declaration) -> Result<(), CompileError> {
        self.assert_no_css_in_function("Declarations", &decl.span)?;

        if matches!(*self.current.borrow(), CssNodeData::Root) {
            return Err(CompileError::runtime(
                "Declarations may only be used within style rules.",
                decl.span.clone(),
            ));
        }

        let resolved_name = self.resolve_interpolation(&decl.name)?;
        let full_name = match self.declaration_name {
            Some(ref prefix) => prefix_resolved_text(prefix, &resolved_name),
            None => resolved_name,
        };

        if let Some(ref value_expr) = decl.value {
            let value = self.visit_expression(value_expr)?;
            let is_custom = full_name.text.starts_with("--");

            if !value.is_blank() || is_custom {
                let node = CssNode::new(CssNodeData::Declaration(CssDeclaration {
                    name: full_name.clone(),
                    value,
                    value_span: value_expr.span().clone(),
                    span: decl.span.clone(),
                }));
                self.add_child(node, false);
            }
        }

        if let Some(ref body) = decl.body {
            let old = self.declaration_name.replace(full_name.text);
            self.env.push_scope();
            let result = self.visit_statements(body);
            self.env.pop_scope();
            self.declaration_name = old;
            result?;
        }

        Ok(())
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) -> Result<(), CompileError> {
        if let Some(ref namespace) = decl.namespace {
            let value = self.visit_expression(&decl.value)?;
            let module = self
                .env
                .module(namespace)
                .ok_or_else(|| {
                    CompileError::runtime(
                        format!("There is no module with the namespace \"{namespace}\"."),
                        decl.span.clone(),
                    )
                })?
                .clone();

            if !module.set_variable(&decl.name, value) {
                return Err(CompileError::runtime(
                    format!("Undefined variable \"${}\".", decl.name),
                    decl.span.clone(),
                ));
            }
            return Ok(());
        }

        if decl.guarded && self.env.at_root() {
            // A `with` configuration overrides the default outright.
            if let Some(configuration) = self.configuration.clone() {
                let configured = {
                    let mut config = configuration.borrow_mut();
                    let found = config
                        .values
                        .get(&decl.name)
                        .map(|(value, _)| value.clone());
                    if found.is_some() {
                        config.used.insert(decl.name.clone());
                    }
                    found
                };
                if let Some(value) = configured {
                    self.env
                        .set_variable(&decl.name, value, decl.span.clone(), true);
                    return Ok(());
                }
            }
        }

        if decl.guarded {
            if let Some(existing) = self.env.get_variable(&decl.name) {
                if existing != Value::Null {
                    return Ok(());
                }
            }
        }

        let value = self.visit_expression(&decl.value)?;

        if decl.global && !self.env.global_variable_exists(&decl.name) {
            self.session.warn(
                &format!(
                    "As of Sass 2.0.0, !global assignments won't be able to declare new \
                     variables.\nRecommendation: add `${}: null` at the stylesheet root.",
                    decl.name
                ),
                Some(&decl.span),
                Some(&self.call_stack),
                Some(Deprecation::NewGlobal),
            )?;
        }

        self.env
            .set_variable(&decl.name, value, decl.span.clone(), decl.global);
        Ok(())
    }

    // ----- control flow -----

    fn visit_if(&mut self, rule: &IfRule) -> Result<Option<Value>, CompileError> {
        for clause in &rule.clauses {
            if self.visit_expression(&clause.condition)?.is_truthy() {
                self.env.push_scope();
                let result = self.visit_statements(&clause.body);
                self.env.pop_scope();
                return result;
            }
        }

        if let Some(ref body) = rule.else_body {
            self.env.push_scope();
            let result = self.visit_statements(body);
            self.env.pop_scope();
            return result;
        }

        Ok(None)
    }

    fn visit_each(&mut self, rule: &EachRule) -> Result<Option<Value>, CompileError> {
        let list = self.visit_expression(&rule.list)?;

        for element in list.list_contents() {
            self.env.push_scope();

            if rule.variables.len() == 1 {
                self.env.set_variable(
                    &rule.variables[0],
                    element.clone(),
                    rule.span.clone(),
                    false,
                );
            } else {
                // Destructuring: each element is viewed as a list.
                let parts = element.list_contents();
                for (i, variable) in rule.variables.iter().enumerate() {
                    let value = parts.get(i).cloned().unwrap_or(Value::Null);
                    self.env
                        .set_variable(variable, value, rule.span.clone(), false);
                }
            }

            let result = self.visit_statements(&rule.body);
            self.env.pop_scope();
            if let Some(returned) = result? {
                return Ok(Some(returned));
            }
        }

        Ok(None)
    }

    fn visit_for(&mut self, rule: &ForRule) -> Result<Option<Value>, CompileError> {
        let from_value = self.visit_expression(&rule.from)?;
        let to_value = self.visit_expression(&rule.to)?;

        let (from_number, to_number) = match (&from_value, &to_value) {
            (Value::Number(f), Value::Number(t)) => (f.clone(), t.clone()),
            (Value::Number(_), other) | (other, _) => {
                return Err(CompileError::runtime(
                    format!("{} is not a number.", other.inspect()),
                    rule.span.clone(),
                ))
            }
        };

        let from = from_number.as_int().ok_or_else(|| {
            CompileError::runtime(
                format!("{from_number} is not an int."),
                rule.from.span().clone(),
            )
        })?;
        let to = to_number.as_int().ok_or_else(|| {
            CompileError::runtime(format!("{to_number} is not an int."), rule.to.span().clone())
        })?;

        let unit = from_number.numerator_units.first().cloned();
        let descending = to < from;
        let exclusive_adjustment = if rule.exclusive { 1 } else { 0 };

        let mut i = from;
        loop {
            if descending {
                if i <= to - 1 + exclusive_adjustment {
                    break;
                }
            } else if i >= to + 1 - exclusive_adjustment {
                break;
            }

            let value = match unit {
                Some(ref u) => Number::with_unit(i as f64, u.clone()),
                None => Number::new(i as f64),
            };

            self.env.push_scope();
            self.env.set_variable(
                &rule.variable,
                Value::Number(value),
                rule.span.clone(),
                false,
            );
            let result = self.visit_statements(&rule.body);
            self.env.pop_scope();
            if let Some(returned) = result? {
                return Ok(Some(returned));
            }

            i += if descending { -1 } else { 1 };
        }

        Ok(None)
    }

    fn visit_while(&mut self, rule: &WhileRule) -> Result<Option<Value>, CompileError> {
        while self.visit_expression(&rule.condition)?.is_truthy() {
            self.env.push_scope();
            let result = self.visit_statements(&rule.body);
            self.env.pop_scope();
            if let Some(returned) = result? {
                return Ok(Some(returned));
            }
        }
        Ok(None)
    }

    // ----- modules -----

    fn visit_use(&mut self, rule: &UseRule) -> Result<(), CompileError> {
        let configuration = self.build_configuration(&rule.configuration, false)?;
        let module = self.load_module(&rule.url, configuration, &rule.span)?;
        self.upstream.push(module.clone());

        let namespace = match rule.namespace {
            UseNamespace::Global => {
                self.env.global_modules.push(module);
                return Ok(());
            }
            UseNamespace::Named(ref name) => name.clone(),
            UseNamespace::Default => default_namespace(&rule.url),
        };

        if self.env.modules.contains_key(&namespace) {
            return Err(CompileError::runtime(
                format!("There's already a module with namespace \"{namespace}\"."),
                rule.span.clone(),
            ));
        }
        self.env.modules.insert(namespace, module);
        Ok(())
    }

    fn visit_forward(&mut self, rule: &ForwardRule) -> Result<(), CompileError> {
        let configuration = self.build_configuration(&rule.configuration, true)?;
        let module = self.load_module(&rule.url, configuration, &rule.span)?;

        self.upstream.push(module.clone());
        self.forwarded.push(ForwardedModule {
            module,
            prefix: rule.prefix.clone(),
            visibility: rule.visibility.clone(),
        });
        Ok(())
    }

    /// Evaluates a `with (…)` clause.  For `@forward`, the enclosing
    /// module's own configuration is passed through as well.
    fn build_configuration(
        &mut self,
        configured: &[ConfiguredVariable],
        inherit: bool,
    ) -> Result<Option<SharedConfiguration>, CompileError> {
        if configured.is_empty() {
            return Ok(if inherit { self.configuration.clone() } else { None });
        }

        let mut values = HashMap::new();

        if inherit {
            if let Some(ref inherited) = self.configuration {
                let mut inherited = inherited.borrow_mut();
                for (name, entry) in inherited.values.clone() {
                    inherited.used.insert(name.clone());
                    values.insert(name, entry);
                }
            }
        }

        for variable in configured {
            let value = self.visit_expression(&variable.value)?;
            // A guarded entry (`!default` in a @forward configuration)
            // yields to one configured further downstream.
            if variable.guarded && values.contains_key(&variable.name) {
                continue;
            }
            values.insert(variable.name.clone(), (value, variable.span.clone()));
        }

        Ok(Some(Rc::new(RefCell::new(Configuration {
            values,
            used: HashSet::new(),
        }))))
    }

    fn base(&self) -> Option<(usize, &CanonicalUrl)> {
        match (self.current_importer, &self.current_url) {
            (Some(importer), Some(url)) => Some((importer, url)),
            _ => None,
        }
    }

    fn load_module(
        &mut self,
        url: &str,
        configuration: Option<SharedConfiguration>,
        span: &Span,
    ) -> Result<Rc<Module>, CompileError> {
        let resolved = self
            .import_cache
            .canonicalize(url, self.base(), false)
            .map_err(|e| self.attach_span(e, span))?;

        let Some((importer_index, canonical)) = resolved else {
            return Err(CompileError::Runtime {
                message: String::from("Can't find stylesheet to import."),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        };

        self.check_module_cycle(&canonical, span)?;

        if let Some(existing) = self.modules.get(&canonical) {
            if configuration.is_some() {
                return Err(CompileError::runtime(
                    "This module was already loaded, so it can't be configured using \"with\".",
                    span.clone(),
                ));
            }
            return Ok(existing.clone());
        }

        let cached = self
            .import_cache
            .import(importer_index, &canonical, url)
            .map_err(|e| self.attach_span(e, span))?;

        let module = self.evaluate_module(&cached, configuration)?;
        self.modules.insert(canonical, module.clone());
        Ok(module)
    }

    fn check_module_cycle(
        &self,
        canonical: &CanonicalUrl,
        span: &Span,
    ) -> Result<(), CompileError> {
        if !self
            .active_modules
            .iter()
            .any(|active| active.as_ref() == Some(canonical))
        {
            return Ok(());
        }

        let mut message = format!("Module loop: {canonical} is already being loaded.\n");
        for active in self.active_modules.iter().flatten() {
            message.push_str(&format!("  {active}\n"));
        }
        message.push_str(&format!("  {canonical}"));

        Err(CompileError::Runtime {
            message,
            span: span.clone(),
            trace: self.call_stack.clone(),
        })
    }

    /// Evaluates a loaded stylesheet as its own module, with fresh
    /// environment, CSS tree, and extender.
    fn evaluate_module(
        &mut self,
        cached: &Rc<CachedImport>,
        configuration: Option<SharedConfiguration>,
    ) -> Result<Rc<Module>, CompileError> {
        let fresh_root = css_tree::new_root();
        let saved = ModuleState {
            env: std::mem::take(&mut self.env),
            root: std::mem::replace(&mut self.root, fresh_root.clone()),
            current: std::mem::replace(&mut self.current, fresh_root),
            style_rule: self.style_rule.take(),
            declaration_name: self.declaration_name.take(),
            in_keyframes: std::mem::replace(&mut self.in_keyframes, false),
            media_queries: std::mem::take(&mut self.media_queries),
            extender: std::mem::replace(
                &mut self.extender,
                Rc::new(RefCell::new(Extender::new())),
            ),
            upstream: std::mem::take(&mut self.upstream),
            forwarded: std::mem::take(&mut self.forwarded),
            configuration: std::mem::replace(&mut self.configuration, configuration),
            in_mixin: std::mem::replace(&mut self.in_mixin, false),
            in_function: std::mem::replace(&mut self.in_function, false),
            current_importer: std::mem::replace(
                &mut self.current_importer,
                Some(cached.importer_index),
            ),
            current_url: std::mem::replace(
                &mut self.current_url,
                Some(cached.canonical_url.clone()),
            ),
        };

        self.active_modules.push(Some(cached.canonical_url.clone()));
        let result = self
            .visit_statements(&cached.stylesheet.statements)
            .and_then(|_| self.check_configuration_used())
            .and_then(|_| self.build_module(Some(cached.canonical_url.clone())));
        self.active_modules.pop();

        // Restore the outer module's state whether or not evaluation
        // succeeded.
        self.env = saved.env;
        self.root = saved.root;
        self.current = saved.current;
        self.style_rule = saved.style_rule;
        self.declaration_name = saved.declaration_name;
        self.in_keyframes = saved.in_keyframes;
        self.media_queries = saved.media_queries;
        self.extender = saved.extender;
        self.upstream = saved.upstream;
        self.forwarded = saved.forwarded;
        self.configuration = saved.configuration;
        self.in_mixin = saved.in_mixin;
        self.in_function = saved.in_function;
        self.current_importer = saved.current_importer;
        self.current_url = saved.current_url;

        result
    }

    fn check_configuration_used(&self) -> Result<(), CompileError> {
        let Some(ref configuration) = self.configuration else {
            return Ok(());
        };
        let configuration = configuration.borrow();
        for (name, (_, span)) in &configuration.values {
            if !configuration.used.contains(name) {
                return Err(CompileError::runtime(
                    format!(
                        "${name} was not declared with !default in the @used module."
                    ),
                    span.clone(),
                ));
            }
        }
        Ok(())
    }

    fn build_module(&mut self, url: Option<CanonicalUrl>) -> Result<Rc<Module>, CompileError> {
        let (mut variables, mut variable_spans, mut functions, mut mixins) =
            self.env.global_members();

        for forwarded in &self.forwarded {
            let apply_prefix = |name: &str| match forwarded.prefix {
                Some(ref prefix) => format!("{prefix}{name}"),
                None => String::from(name),
            };
            let visible = |name: &str| match forwarded.visibility {
                None => true,
                Some(ref v) => v.names.iter().any(|n| n == name) == v.show,
            };

            for name in forwarded.module.variable_names() {
                if !visible(&name) {
                    continue;
                }
                let exposed = apply_prefix(&name);
                if variables.contains_key(&exposed) {
                    continue;
                }
                if let Some(value) = forwarded.module.variable(&name) {
                    if let Some(span) = forwarded.module.variable_span(&name) {
                        variable_spans.insert(exposed.clone(), span.clone());
                    }
                    variables.insert(exposed, value);
                }
            }

            for name in forwarded.module.function_names() {
                if !visible(&name) {
                    continue;
                }
                let exposed = apply_prefix(&name);
                if functions.contains_key(&exposed) {
                    continue;
                }
                if let Some(inner) = forwarded.module.function(&name) {
                    let callable = if exposed == name {
                        inner
                    } else {
                        Rc::new(Callable::Renamed {
                            name: exposed.clone(),
                            inner,
                        })
                    };
                    functions.insert(exposed, callable);
                }
            }

            for name in forwarded.module.mixin_names() {
                if !visible(&name) {
                    continue;
                }
                let exposed = apply_prefix(&name);
                if mixins.contains_key(&exposed) {
                    continue;
                }
                if let Some(inner) = forwarded.module.mixin(&name) {
                    let callable = if exposed == name {
                        inner
                    } else {
                        Rc::new(Callable::Renamed {
                            name: exposed.clone(),
                            inner,
                        })
                    };
                    mixins.insert(exposed, callable);
                }
            }
        }

        Ok(Rc::new(Module::new(
            url,
            variables,
            variable_spans,
            functions,
            mixins,
            self.root.clone(),
            self.extender.clone(),
            self.upstream.clone(),
        )))
    }

    fn visit_import(&mut self, rule: &ImportRule) -> Result<(), CompileError> {
        for import in &rule.imports {
            match import {
                Import::Css {
                    url,
                    modifiers,
                    span,
                } => {
                    let url_text = self.resolve_interpolation(url)?;
                    let prelude = match modifiers {
                        Some(modifiers) => {
                            let modifier_text = self.resolve_interpolation(modifiers)?;
                            let mut combined = url_text.clone();
                            combined.text.push(' ');
                            let offset = combined.text.len();
                            combined.text.push_str(&modifier_text.text);
                            combined
                                .regions
                                .extend(modifier_text.regions.into_iter().map(|mut r| {
                                    r.start += offset;
                                    r.end += offset;
                                    r
                                }));
                            combined
                        }
                        None => url_text,
                    };

                    let node = CssNode::new(CssNodeData::AtRule(CssAtRule {
                        name: String::from("import"),
                        prelude: Some(prelude),
                        has_block: false,
                        span: span.clone(),
                    }));
                    self.add_child(node, true);
                }

                Import::Sass { url, span } => {
                    self.session.warn(
                        "Sass @import rules are deprecated and will be removed.\n\
                         Use @use instead.",
                        Some(span),
                        Some(&self.call_stack),
                        Some(Deprecation::Import),
                    )?;
                    self.visit_dynamic_import(url, span)?;
                }
            }
        }
        Ok(())
    }

    /// Evaluates a legacy import inline: the imported statements run in
    /// the current scope and emit into the current CSS tree.
    fn visit_dynamic_import(&mut self, url: &str, span: &Span) -> Result<(), CompileError> {
        let resolved = self
            .import_cache
            .canonicalize(url, self.base(), true)
            .map_err(|e| self.attach_span(e, span))?;

        let Some((importer_index, canonical)) = resolved else {
            return Err(CompileError::Runtime {
                message: String::from("Can't find stylesheet to import."),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        };

        self.check_module_cycle(&canonical, span)?;

        let cached = self
            .import_cache
            .import(importer_index, &canonical, url)
            .map_err(|e| self.attach_span(e, span))?;

        let saved_importer =
            std::mem::replace(&mut self.current_importer, Some(importer_index));
        let saved_url = std::mem::replace(&mut self.current_url, Some(canonical.clone()));
        self.active_modules.push(Some(canonical));

        let result = self.visit_statements(&cached.stylesheet.statements);

        self.active_modules.pop();
        self.current_importer = saved_importer;
        self.current_url = saved_url;
        result.map(|_| ())
    }

    // ----- @extend, @media, at-rules, comments -----

    fn visit_extend(&mut self, rule: &ExtendRule) -> Result<(), CompileError> {
        let Some(ref style_rule) = self.style_rule else {
            return Err(CompileError::runtime(
                "@extend may only be used within style rules.",
                rule.span.clone(),
            ));
        };
        let style_rule = style_rule.clone();

        let resolved = self.resolve_interpolation(&rule.selector)?;
        let targets = SelectorList::parse(&resolved.text)
            .map_err(|e| CompileError::runtime(e, rule.span.clone()))?;

        self.extender
            .borrow_mut()
            .add_extension(&targets, &style_rule, &rule.span, rule.optional)
            .map_err(|e| CompileError::runtime(e, rule.span.clone()))?;
        Ok(())
    }

    fn visit_media(&mut self, rule: &MediaRule) -> Result<Option<Value>, CompileError> {
        self.assert_no_css_in_function("@media", &rule.span)?;

        let resolved = self.resolve_interpolation(&rule.query)?;

        if resolved.text.contains(" or ") || resolved.text.trim_start().starts_with("not ") {
            self.session.warn(
                "Logical operations in media queries are only evaluated by the browser.",
                Some(&rule.span),
                Some(&self.call_stack),
                Some(Deprecation::MediaLogic),
            )?;
        }

        let merged = match self.media_queries.last() {
            Some(outer) => merge_media_queries(outer, &resolved.text),
            None => resolved.text.clone(),
        };

        let prelude = if merged == resolved.text {
            resolved
        } else {
            ResolvedText::plain(merged.clone(), rule.query.span.clone())
        };

        let node = CssNode::new(CssNodeData::AtRule(CssAtRule {
            name: String::from("media"),
            prelude: Some(prelude),
            has_block: true,
            span: rule.span.clone(),
        }));
        self.add_child(node.clone(), true);
        self.media_queries.push(merged);

        let result = self.visit_in_rule_copy(node, &rule.body);

        self.media_queries.pop();
        result
    }

    /// Evaluates a block inside `wrapper`.  When the block appears inside
    /// a style rule, a copy of that rule nests inside the wrapper so its
    /// declarations keep applying to the rule's selector.
    fn visit_in_rule_copy(
        &mut self,
        mut wrapper: CssNode,
        body: &[Statement],
    ) -> Result<Option<Value>, CompileError> {
        let new_current = match self.style_rule {
            Some(ref selector) => {
                let copy = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
                    selector: RefCell::new((**selector).clone()),
                    selector_text: ResolvedText::plain(
                        selector.to_css_string(false),
                        wrapper_span(&wrapper),
                    ),
                    span: wrapper_span(&wrapper),
                }));
                wrapper.append(copy.clone());
                copy
            }
            None => wrapper,
        };

        let old_current = std::mem::replace(&mut self.current, new_current);
        self.env.push_scope();
        let result = self.visit_statements(body);
        self.env.pop_scope();
        self.current = old_current;
        result
    }

    fn visit_at_rule(&mut self, rule: &AtRule) -> Result<Option<Value>, CompileError> {
        let name = self.resolve_interpolation(&rule.name)?;

        if name.text == "at-root" {
            return self.visit_at_root(rule);
        }

        self.assert_no_css_in_function("At-rules", &rule.span)?;

        let prelude = match rule.value {
            Some(ref value) => Some(self.resolve_interpolation(value)?),
            None => None,
        };

        let Some(ref body) = rule.body else {
            let node = CssNode::new(CssNodeData::AtRule(CssAtRule {
                name: name.text,
                prelude,
                has_block: false,
                span: rule.span.clone(),
            }));
            self.add_child(node, true);
            return Ok(None);
        };

        let is_keyframes = name.text.ends_with("keyframes");
        let node = CssNode::new(CssNodeData::AtRule(CssAtRule {
            name: name.text,
            prelude,
            has_block: true,
            span: rule.span.clone(),
        }));
        self.add_child(node.clone(), true);

        if is_keyframes {
            let old_current = std::mem::replace(&mut self.current, node);
            let old_style_rule = self.style_rule.take();
            let old_keyframes = std::mem::replace(&mut self.in_keyframes, true);

            self.env.push_scope();
            let result = self.visit_statements(body);
            self.env.pop_scope();

            self.in_keyframes = old_keyframes;
            self.style_rule = old_style_rule;
            self.current = old_current;
            return result;
        }

        self.visit_in_rule_copy(node, body)
    }

    /// `@at-root` hoists its body (or its selector, when one is given)
    /// out of any enclosing style rules.
    fn visit_at_root(&mut self, rule: &AtRule) -> Result<Option<Value>, CompileError> {
        self.assert_no_css_in_function("@at-root", &rule.span)?;
        let Some(ref body) = rule.body else {
            return Err(CompileError::runtime(
                "Expected block.",
                rule.span.clone(),
            ));
        };

        let old_current = std::mem::replace(&mut self.current, self.root.clone());
        let old_style_rule = self.style_rule.take();

        let result = match rule.value {
            Some(ref selector) => {
                let resolved = self.resolve_interpolation(selector)?;
                let parsed = SelectorList::parse(&resolved.text)
                    .map_err(|e| CompileError::runtime(e, selector.span.clone()))?;

                let node = CssNode::new(CssNodeData::StyleRule(CssStyleRule {
                    selector: RefCell::new(parsed.clone()),
                    selector_text: resolved,
                    span: rule.span.clone(),
                }));
                self.current.append(node.clone());
                self.current = node;
                self.style_rule = Some(Rc::new(parsed));

                self.env.push_scope();
                let result = self.visit_statements(body);
                self.env.pop_scope();
                result
            }
            None => {
                self.env.push_scope();
                let result = self.visit_statements(body);
                self.env.pop_scope();
                result
            }
        };

        self.current = old_current;
        self.style_rule = old_style_rule;
        result
    }

    fn visit_loud_comment(&mut self, comment: &LoudComment) -> Result<(), CompileError> {
        if self.in_function {
            return Ok(());
        }
        let text = self.resolve_interpolation(&comment.text)?;
        let node = CssNode::new(CssNodeData::Comment(CssComment {
            text,
            span: comment.span.clone(),
        }));
        self.add_child(node, false);
        Ok(())
    }

    // ----- mixins and content -----

    fn visit_include(&mut self, include: &Include) -> Result<Option<Value>, CompileError> {
        let mixin = match include.namespace {
            Some(ref namespace) => self
                .env
                .module(namespace)
                .ok_or_else(|| {
                    CompileError::runtime(
                        format!("There is no module with the namespace \"{namespace}\"."),
                        include.span.clone(),
                    )
                })?
                .mixin(&include.name),
            None => self.env.get_mixin(&include.name),
        };

        let Some(mixin) = mixin else {
            return Err(CompileError::Runtime {
                message: format!("Undefined mixin \"{}\".", include.name),
                span: include.span.clone(),
                trace: self.call_stack.clone(),
            });
        };

        let resolved = mixin.resolve();
        let Callable::UserMixin(ref user) = *resolved else {
            return Err(CompileError::runtime(
                format!("\"{}\" is not a mixin.", include.name),
                include.span.clone(),
            ));
        };

        let args = self.evaluate_arguments(&include.arguments)?;
        let content = include.content.as_ref().map(|block| {
            Rc::new(ContentClosure {
                block: block.clone(),
                environment: self.env.closure(),
            })
        });

        let declaration = user.declaration.clone();
        let mut callee_env = user.environment.closure();
        callee_env.content = content;

        self.with_call_frame(Some(include.name.clone()), &include.span, |ev| {
            std::mem::swap(&mut ev.env, &mut callee_env);
            ev.env.push_scope();
            let old_in_mixin = std::mem::replace(&mut ev.in_mixin, true);

            let result = ev
                .bind_into_env(&declaration.arguments, args, &include.span)
                .and_then(|keywords| {
                    ev.visit_statements(&declaration.body)?;
                    ev.check_unused_keywords(keywords, &include.span)
                });

            ev.in_mixin = old_in_mixin;
            ev.env.pop_scope();
            std::mem::swap(&mut ev.env, &mut callee_env);
            result
        })?;

        Ok(None)
    }

    fn visit_content(&mut self, content: &ContentInvocation) -> Result<Option<Value>, CompileError> {
        if !self.in_mixin {
            return Err(CompileError::runtime(
                "@content is only allowed within mixin declarations.",
                content.span.clone(),
            ));
        }

        // A mixin invoked without a block: @content does nothing.
        let Some(closure) = self.env.content.clone() else {
            return Ok(None);
        };

        let args = self.evaluate_arguments(&content.arguments)?;
        let block = closure.block.clone();
        let mut content_env = closure.environment.closure();

        self.with_call_frame(None, &content.span, |ev| {
            std::mem::swap(&mut ev.env, &mut content_env);
            ev.env.push_scope();

            let result = ev
                .bind_into_env(&block.arguments, args, &content.span)
                .and_then(|keywords| {
                    ev.visit_statements(&block.body)?;
                    ev.check_unused_keywords(keywords, &content.span)
                });

            ev.env.pop_scope();
            std::mem::swap(&mut ev.env, &mut content_env);
            result
        })?;

        Ok(None)
    }

    // ----- call machinery -----

    fn with_call_frame<T>(
        &mut self,
        name: Option<String>,
        span: &Span,
        body: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.call_stack.len() >= limits::MAX_CALL_DEPTH {
            return Err(CompileError::Runtime {
                message: String::from("Maximum call depth exceeded."),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        }

        self.call_stack.push(TraceFrame {
            name,
            span: span.clone(),
        });
        let result = body(self);
        let frame = self.call_stack.pop().expect("frame pushed above");
        result.map_err(|e| e.with_frame(frame))
    }

    fn evaluate_arguments(
        &mut self,
        invocation: &ArgumentInvocation,
    ) -> Result<EvaluatedArgs, CompileError> {
        let mut positional = Vec::new();
        for expression in &invocation.positional {
            positional.push(self.visit_expression(expression)?);
        }

        let mut named: Vec<(String, Value)> = Vec::new();
        for (name, expression) in &invocation.named {
            let value = self.visit_expression(expression)?;
            named.push((name.clone(), value));
        }

        if let Some(ref rest) = invocation.rest {
            match self.visit_expression(rest)? {
                Value::ArgList(list) => {
                    positional.extend(list.contents);
                    named.extend(list.keywords.access().iter().cloned());
                }
                Value::Map(map) => {
                    add_map_to_named(&map, &mut named, rest.span())?;
                }
                Value::List(list) => positional.extend(list.contents),
                other => positional.push(other),
            }
        }

        if let Some(ref keyword_rest) = invocation.keyword_rest {
            match self.visit_expression(keyword_rest)? {
                Value::Map(map) => add_map_to_named(&map, &mut named, keyword_rest.span())?,
                other => {
                    return Err(CompileError::runtime(
                        format!(
                            "Variable keyword arguments must be a map (was {}).",
                            other.inspect()
                        ),
                        keyword_rest.span().clone(),
                    ))
                }
            }
        }

        Ok(EvaluatedArgs { positional, named })
    }

    /// Binds evaluated arguments to a signature, handing each bound value
    /// to `define`.  Returns the rest parameter's keyword store when the
    /// signature declares one.
    fn bind_arguments(
        &mut self,
        signature: &ArgumentDeclaration,
        args: EvaluatedArgs,
        span: &Span,
        mut define: impl FnMut(&mut Self, &str, Value),
    ) -> Result<Option<Rc<Keywords>>, CompileError> {
        let EvaluatedArgs {
            positional,
            mut named,
        } = args;

        for (i, argument) in signature.arguments.iter().enumerate() {
            let named_index = named.iter().position(|(n, _)| *n == argument.name);

            let value = if i < positional.len() {
                if named_index.is_some() {
                    return Err(CompileError::runtime(
                        format!(
                            "Argument ${} was passed both by position and by name.",
                            argument.name
                        ),
                        span.clone(),
                    ));
                }
                positional[i].clone()
            } else if let Some(index) = named_index {
                named.remove(index).1
            } else if let Some(ref default) = argument.default {
                self.visit_expression(default)?
            } else {
                return Err(CompileError::Runtime {
                    message: format!("Missing argument ${}.", argument.name),
                    span: span.clone(),
                    trace: self.call_stack.clone(),
                });
            };

            define(self, &argument.name, value);
        }

        if let Some(ref rest_name) = signature.rest {
            let rest_positional = if positional.len() > signature.arguments.len() {
                positional[signature.arguments.len()..].to_vec()
            } else {
                Vec::new()
            };
            let keywords = Rc::new(Keywords::new(named));
            let value = Value::ArgList(ArgList {
                contents: rest_positional,
                separator: ListSeparator::Comma,
                keywords: keywords.clone(),
            });
            define(self, rest_name, value);
            return Ok(Some(keywords));
        }

        if positional.len() > signature.arguments.len() {
            return Err(CompileError::Runtime {
                message: format!(
                    "Only {} argument{} allowed, but {} {} passed.",
                    signature.arguments.len(),
                    if signature.arguments.len() == 1 { "" } else { "s" },
                    positional.len(),
                    if positional.len() == 1 { "was" } else { "were" },
                ),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        }

        if let Some((name, _)) = named.first() {
            return Err(CompileError::Runtime {
                message: format!("No argument named ${name}."),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        }

        Ok(None)
    }

    fn bind_into_env(
        &mut self,
        signature: &ArgumentDeclaration,
        args: EvaluatedArgs,
        span: &Span,
    ) -> Result<Option<Rc<Keywords>>, CompileError> {
        let span_for_vars = span.clone();
        self.bind_arguments(signature, args, span, move |ev, name, value| {
            ev.env
                .set_variable(name, value, span_for_vars.clone(), false);
        })
    }

    /// After a call whose signature had a rest parameter: passing unknown
    /// keywords is an error unless the callee looked at them.
    fn check_unused_keywords(
        &self,
        keywords: Option<Rc<Keywords>>,
        span: &Span,
    ) -> Result<(), CompileError> {
        let Some(keywords) = keywords else {
            return Ok(());
        };
        if keywords.were_accessed() || keywords.entries.is_empty() {
            return Ok(());
        }
        let names = keywords
            .entries
            .iter()
            .map(|(n, _)| format!("${n}"))
            .collect::<Vec<_>>()
            .join(", ");
        Err(CompileError::Runtime {
            message: format!("No arguments named {names}."),
            span: span.clone(),
            trace: self.call_stack.clone(),
        })
    }

    fn invoke_function(
        &mut self,
        callable: Rc<Callable>,
        args: EvaluatedArgs,
        span: &Span,
        name: &str,
    ) -> Result<Value, CompileError> {
        let callable = callable.resolve();
        match *callable {
            Callable::UserFunction(ref user) => {
                let declaration = user.declaration.clone();
                let mut callee_env = user.environment.closure();

                self.with_call_frame(Some(String::from(name)), span, |ev| {
                    std::mem::swap(&mut ev.env, &mut callee_env);
                    ev.env.push_scope();
                    let old_in_function = std::mem::replace(&mut ev.in_function, true);

                    let result = ev
                        .bind_into_env(&declaration.arguments, args, span)
                        .and_then(|keywords| {
                            let returned = ev.visit_statements(&declaration.body)?;
                            ev.check_unused_keywords(keywords, span)?;
                            Ok(returned)
                        });

                    ev.in_function = old_in_function;
                    ev.env.pop_scope();
                    std::mem::swap(&mut ev.env, &mut callee_env);

                    match result? {
                        Some(value) => Ok(value),
                        None => Err(CompileError::runtime(
                            "Function finished without @return.",
                            declaration.span.clone(),
                        )),
                    }
                })
            }

            Callable::Builtin(ref builtin) => {
                let signature = builtin.signature.clone();
                let function = builtin.function.clone();

                self.with_call_frame(Some(String::from(name)), span, |ev| {
                    let mut values = Vec::new();
                    let keywords =
                        ev.bind_arguments(&signature, args, span, |_, _, value| {
                            values.push(value);
                        })?;

                    let session = ev.session;
                    let result = {
                        let mut context =
                            EvalContext::new(session, span.clone(), &ev.call_stack);
                        function(&values, &mut context)
                    };

                    let value = result.map_err(|message| CompileError::Runtime {
                        message,
                        span: span.clone(),
                        trace: ev.call_stack.clone(),
                    })?;
                    ev.check_unused_keywords(keywords, span)?;
                    Ok(value)
                })
            }

            Callable::Host(ref host) => {
                let signature = host.signature.clone();
                let function_id = host.function_id;
                let dispatcher = host.dispatcher.clone();

                self.with_call_frame(Some(String::from(name)), span, |ev| {
                    let mut values = Vec::new();
                    let keywords =
                        ev.bind_arguments(&signature, args, span, |_, _, value| {
                            values.push(value);
                        })?;

                    let response = dispatcher
                        .call(OutboundRequest::FunctionCall {
                            function_id,
                            arguments: values,
                        })
                        .map_err(CompileError::Protocol)?;

                    let value = match response {
                        InboundResponse::FunctionResult(Ok(value)) => value,
                        InboundResponse::FunctionResult(Err(message)) => {
                            return Err(CompileError::Runtime {
                                message,
                                span: span.clone(),
                                trace: ev.call_stack.clone(),
                            })
                        }
                        _ => {
                            return Err(CompileError::Protocol(ProtocolError::Params(
                                String::from("unexpected response to FunctionCallRequest"),
                            )))
                        }
                    };

                    ev.check_unused_keywords(keywords, span)?;
                    Ok(value)
                })
            }

            Callable::UserMixin(_) => Err(CompileError::runtime(
                format!("\"{name}\" is a mixin, not a function."),
                span.clone(),
            )),

            Callable::Renamed { .. } => unreachable!("resolve() unwraps renames"),
        }
    }

    /// Function lookup order: lexical scopes (including `@use … as *`
    /// members), caller-supplied functions, then global builtins.
    fn lookup_function(&self, name: &str) -> Option<Rc<Callable>> {
        self.env
            .get_function(name)
            .or_else(|| self.custom_functions.get(name).cloned())
            .or_else(|| self.builtins.get(name).cloned())
    }

    // ----- expressions -----

    fn visit_expression(&mut self, expression: &Expression) -> Result<Value, CompileError> {
        match expression {
            Expression::Boolean { value, .. } => Ok(Value::Bool(*value)),
            Expression::Null { .. } => Ok(Value::Null),

            Expression::Number { value, unit, .. } => Ok(Value::Number(match unit {
                Some(unit) => Number::with_unit(*value, unit.clone()),
                None => Number::new(*value),
            })),

            Expression::Color {
                red,
                green,
                blue,
                alpha,
                original,
                ..
            } => Ok(Value::Color(if *alpha >= 1.0 {
                Color::from_literal(*red, *green, *blue, original.clone())
            } else {
                Color::from_rgba(
                    f64::from(*red),
                    f64::from(*green),
                    f64::from(*blue),
                    *alpha,
                )
            })),

            Expression::String(string) => {
                let resolved = self.resolve_interpolation(&string.text)?;
                Ok(Value::String(Str {
                    text: resolved.text,
                    quoted: string.quoted,
                }))
            }

            Expression::Variable {
                name,
                namespace,
                span,
            } => self.visit_variable(name, namespace.as_deref(), span),

            Expression::List(list) => {
                let mut contents = Vec::new();
                for element in &list.contents {
                    contents.push(self.visit_expression(element)?);
                }
                Ok(Value::List(List {
                    contents,
                    separator: list.separator,
                    brackets: list.brackets,
                }))
            }

            Expression::Map(map) => {
                let mut result = Map::new();
                for (key_expr, value_expr) in &map.pairs {
                    let key = self.visit_expression(key_expr)?;
                    if result.contains_key(&key) {
                        return Err(CompileError::runtime(
                            format!("Duplicate key {}.", key.inspect()),
                            key_expr.span().clone(),
                        ));
                    }
                    let value = self.visit_expression(value_expr)?;
                    result.insert(key, value);
                }
                Ok(Value::Map(result))
            }

            Expression::FunctionCall(call) => self.visit_function_call(call),

            Expression::Binary {
                op,
                left,
                right,
                span,
            } => self.visit_binary(*op, left, right, span),

            Expression::Unary { op, operand, span } => {
                let value = self.visit_expression(operand)?;
                self.apply_unary(*op, value, span)
            }

            Expression::Paren { inner, .. } => {
                let old = std::mem::replace(&mut self.in_parens, true);
                let result = self.visit_expression(inner);
                self.in_parens = old;
                result
            }

            Expression::ParentSelector { .. } => Ok(match self.style_rule {
                Some(ref selector) => {
                    Value::String(Str::unquoted(selector.to_css_string(false)))
                }
                None => Value::Null,
            }),
        }
    }

    fn visit_variable(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        span: &Span,
    ) -> Result<Value, CompileError> {
        if let Some(namespace) = namespace {
            let module = self.env.module(namespace).ok_or_else(|| {
                CompileError::runtime(
                    format!("There is no module with the namespace \"{namespace}\"."),
                    span.clone(),
                )
            })?;
            return module.variable(name).ok_or_else(|| {
                CompileError::runtime(format!("Undefined variable \"${name}\"."), span.clone())
            });
        }

        self.env.get_variable(name).ok_or_else(|| CompileError::Runtime {
            message: format!("Undefined variable \"${name}\"."),
            span: span.clone(),
            trace: self.call_stack.clone(),
        })
    }

    fn visit_function_call(&mut self, call: &FunctionCall) -> Result<Value, CompileError> {
        if call.namespace.is_none() {
            if let Some(value) = self.visit_special_function(call)? {
                return Ok(value);
            }
        }

        if let Some(ref namespace) = call.namespace {
            let module = self
                .env
                .module(namespace)
                .ok_or_else(|| {
                    CompileError::runtime(
                        format!("There is no module with the namespace \"{namespace}\"."),
                        call.span.clone(),
                    )
                })?
                .clone();
            let callable = module.function(&call.name).ok_or_else(|| {
                CompileError::runtime(
                    format!("Undefined function \"{}\".", call.name),
                    call.span.clone(),
                )
            })?;
            let args = self.evaluate_arguments(&call.arguments)?;
            return self.invoke_function(callable, args, &call.span, &call.name);
        }

        // calc() and friends pass through with their arguments rendered
        // from source form.
        let lower = call.name.to_ascii_lowercase();
        if CSS_PASSTHROUGH_FUNCTIONS.contains(&lower.as_str()) {
            return self.render_css_function(call);
        }

        match self.lookup_function(&call.name) {
            Some(callable) => {
                let args = self.evaluate_arguments(&call.arguments)?;

                // CSS min()/max() accept expressions Sass numbers cannot
                // model; those fall through as plain CSS.
                if matches!(lower.as_str(), "min" | "max")
                    && !args.positional.iter().all(|v| matches!(v, Value::Number(_)))
                {
                    return self.render_plain_function(&call.name, args, &call.span);
                }

                self.invoke_function(callable, args, &call.span, &call.name)
            }
            None => {
                let args = self.evaluate_arguments(&call.arguments)?;
                self.render_plain_function(&call.name, args, &call.span)
            }
        }
    }

    /// The special forms that need evaluator state or lazy evaluation.
    fn visit_special_function(
        &mut self,
        call: &FunctionCall,
    ) -> Result<Option<Value>, CompileError> {
        let args = &call.arguments;
        match call.name.as_str() {
            "if" => {
                if args.positional.len() != 3 || !args.named.is_empty() || args.rest.is_some() {
                    return Err(CompileError::runtime(
                        "if() expects exactly three arguments: $condition, $if-true, $if-false.",
                        call.span.clone(),
                    ));
                }
                let condition = self.visit_expression(&args.positional[0])?;
                let chosen = if condition.is_truthy() {
                    &args.positional[1]
                } else {
                    &args.positional[2]
                };
                Ok(Some(self.visit_expression(chosen)?))
            }

            "variable-exists" => {
                let name = self.single_string_argument(call, "name")?;
                Ok(Some(Value::Bool(self.env.variable_exists(&name))))
            }

            "global-variable-exists" => {
                let name = self.single_string_argument(call, "name")?;
                Ok(Some(Value::Bool(self.env.global_variable_exists(&name))))
            }

            "function-exists" => {
                let name = self.single_string_argument(call, "name")?;
                Ok(Some(Value::Bool(self.lookup_function(&name).is_some())))
            }

            "mixin-exists" => {
                let name = self.single_string_argument(call, "name")?;
                Ok(Some(Value::Bool(self.env.get_mixin(&name).is_some())))
            }

            "content-exists" => {
                if !self.in_mixin {
                    return Err(CompileError::runtime(
                        "content-exists() may only be called within a mixin.",
                        call.span.clone(),
                    ));
                }
                Ok(Some(Value::Bool(self.env.content.is_some())))
            }

            "get-function" => {
                let name = self.single_string_argument(call, "name")?;
                let callable = self.lookup_function(&name).ok_or_else(|| {
                    CompileError::runtime(
                        format!("Function not found: {name}"),
                        call.span.clone(),
                    )
                })?;
                Ok(Some(Value::Function(SassFunction { callable })))
            }

            "call" => {
                let mut args = self.evaluate_arguments(&call.arguments)?;
                if args.positional.is_empty() {
                    return Err(CompileError::runtime(
                        "Missing argument $function.",
                        call.span.clone(),
                    ));
                }
                let function = args.positional.remove(0);

                let callable = match function {
                    Value::Function(f) => f.callable,
                    Value::String(s) => {
                        self.session.warn(
                            &format!(
                                "Passing a string to call() is deprecated and will be illegal.\n\
                                 Recommendation: call(get-function(\"{}\"))",
                                s.text
                            ),
                            Some(&call.span),
                            Some(&self.call_stack),
                            Some(Deprecation::CallString),
                        )?;
                        self.lookup_function(&s.text).ok_or_else(|| {
                            CompileError::runtime(
                                format!("Function not found: {}", s.text),
                                call.span.clone(),
                            )
                        })?
                    }
                    other => {
                        return Err(CompileError::runtime(
                            format!("$function: {} is not a function.", other.inspect()),
                            call.span.clone(),
                        ))
                    }
                };

                let name = String::from(callable.name());
                Ok(Some(self.invoke_function(callable, args, &call.span, &name)?))
            }

            _ => Ok(None),
        }
    }

    fn single_string_argument(
        &mut self,
        call: &FunctionCall,
        parameter: &str,
    ) -> Result<String, CompileError> {
        let expression = call
            .arguments
            .positional
            .first()
            .or_else(|| {
                call.arguments
                    .named
                    .iter()
                    .find(|(n, _)| n == parameter)
                    .map(|(_, e)| e)
            })
            .ok_or_else(|| {
                CompileError::runtime(
                    format!("Missing argument ${parameter}."),
                    call.span.clone(),
                )
            })?
            .clone();

        match self.visit_expression(&expression)? {
            Value::String(s) => Ok(s.text),
            other => Err(CompileError::runtime(
                format!("${parameter}: {} is not a string.", other.inspect()),
                expression.span().clone(),
            )),
        }
    }

    /// Renders `calc()`-family calls as text, substituting variables and
    /// interpolation but performing no arithmetic.
    fn render_css_function(&mut self, call: &FunctionCall) -> Result<Value, CompileError> {
        let mut out = String::new();
        out.push_str(&call.name);
        out.push('(');

        let mut first = true;
        for expression in &call.arguments.positional {
            if !first {
                out.push_str(", ");
            }
            first = false;
            let rendered = self.expression_to_css(expression)?;
            out.push_str(&rendered);
        }
        out.push(')');

        Ok(Value::String(Str::unquoted(out)))
    }

    /// Serializes an expression for a CSS passthrough context.
    fn expression_to_css(&mut self, expression: &Expression) -> Result<String, CompileError> {
        Ok(match expression {
            Expression::Binary {
                op, left, right, ..
            } => {
                let left = self.expression_to_css(left)?;
                let right = self.expression_to_css(right)?;
                match op {
                    BinaryOp::Plus => format!("{left} + {right}"),
                    BinaryOp::Minus => format!("{left} - {right}"),
                    BinaryOp::Times => format!("{left} * {right}"),
                    BinaryOp::Div => format!("{left} / {right}"),
                    _ => format!("{left} {} {right}", op.name()),
                }
            }

            Expression::Paren { inner, .. } => {
                format!("({})", self.expression_to_css(inner)?)
            }

            other => {
                let value = self.visit_expression(other)?;
                value.to_css_string(false).map_err(|message| {
                    CompileError::runtime(message, other.span().clone())
                })?
            }
        })
    }

    fn render_plain_function(
        &mut self,
        name: &str,
        args: EvaluatedArgs,
        span: &Span,
    ) -> Result<Value, CompileError> {
        if !args.named.is_empty() {
            return Err(CompileError::Runtime {
                message: format!(
                    "Plain CSS functions don't support keyword arguments.\n\
                     No function named \"{name}\"."
                ),
                span: span.clone(),
                trace: self.call_stack.clone(),
            });
        }

        let mut out = String::new();
        out.push_str(name);
        out.push('(');
        let mut first = true;
        for value in &args.positional {
            if !first {
                out.push_str(", ");
            }
            first = false;
            let rendered = value
                .to_css_string(false)
                .map_err(|message| CompileError::runtime(message, span.clone()))?;
            out.push_str(&rendered);
        }
        out.push(')');

        Ok(Value::String(Str::unquoted(out)))
    }

    // ----- operators -----

    fn visit_binary(
        &mut self,
        op: BinaryOp,
        left_expr: &Expression,
        right_expr: &Expression,
        span: &Span,
    ) -> Result<Value, CompileError> {
        // Short-circuiting first.
        match op {
            BinaryOp::Or => {
                let left = self.visit_expression(left_expr)?;
                return if left.is_truthy() {
                    Ok(left)
                } else {
                    self.visit_expression(right_expr)
                };
            }
            BinaryOp::And => {
                let left = self.visit_expression(left_expr)?;
                return if left.is_truthy() {
                    self.visit_expression(right_expr)
                } else {
                    Ok(left)
                };
            }
            _ => {}
        }

        let left = self.visit_expression(left_expr)?;
        let right = self.visit_expression(right_expr)?;

        let result = match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),

            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                compare_values(op, &left, &right)
            }

            BinaryOp::Plus => add_values(&left, &right),
            BinaryOp::Minus => subtract_values(&left, &right),
            BinaryOp::Times => multiply_values(&left, &right),
            BinaryOp::Mod => modulo_values(&left, &right),

            BinaryOp::Div => {
                return self.divide_values(left, right, left_expr, right_expr, span)
            }

            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        };

        result.map_err(|message| CompileError::Runtime {
            message,
            span: span.clone(),
            trace: self.call_stack.clone(),
        })
    }

    /// `/` is division only when an operand marks the expression as
    /// SassScript (a variable, call, unary, or parenthesized operand);
    /// otherwise the slash passes through to the CSS output.
    fn divide_values(
        &mut self,
        left: Value,
        right: Value,
        left_expr: &Expression,
        right_expr: &Expression,
        span: &Span,
    ) -> Result<Value, CompileError> {
        let unambiguous = self.in_parens
            || matches!(left_expr, Expression::Paren { .. })
            || matches!(right_expr, Expression::Paren { .. });
        let division_context = unambiguous
            || slash_operand_is_scripty(left_expr)
            || slash_operand_is_scripty(right_expr);

        if let (Value::Number(a), Value::Number(b)) = (&left, &right) {
            if division_context {
                // Parenthesized division is unambiguous; the rest warns.
                if !unambiguous {
                    self.session.warn(
                        &format!(
                            "Using / for division is deprecated.\n\
                             Recommendation: math.div({}, {})",
                            a, b
                        ),
                        Some(span),
                        Some(&self.call_stack),
                        Some(Deprecation::SlashDiv),
                    )?;
                }
                return Ok(Value::Number(a.div(b)));
            }
        }

        let rendered = format!(
            "{}/{}",
            left.to_css_string(false)
                .map_err(|m| CompileError::runtime(m, span.clone()))?,
            right
                .to_css_string(false)
                .map_err(|m| CompileError::runtime(m, span.clone()))?
        );
        Ok(Value::String(Str::unquoted(rendered)))
    }

    fn apply_unary(
        &mut self,
        op: UnaryOp,
        value: Value,
        span: &Span,
    ) -> Result<Value, CompileError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),

            UnaryOp::Minus => match value {
                Value::Number(n) => Ok(Value::Number(Number {
                    value: -n.value,
                    numerator_units: n.numerator_units,
                    denominator_units: n.denominator_units,
                })),
                other => {
                    let rendered = other
                        .to_css_string(false)
                        .map_err(|m| CompileError::runtime(m, span.clone()))?;
                    Ok(Value::String(Str::unquoted(format!("-{rendered}"))))
                }
            },

            UnaryOp::Plus => match value {
                Value::Number(n) => Ok(Value::Number(n)),
                other => {
                    let rendered = other
                        .to_css_string(false)
                        .map_err(|m| CompileError::runtime(m, span.clone()))?;
                    Ok(Value::String(Str::unquoted(format!("+{rendered}"))))
                }
            },
        }
    }

    // ----- interpolation -----

    fn resolve_interpolation(
        &mut self,
        interpolation: &Interpolation,
    ) -> Result<ResolvedText, CompileError> {
        let mut text = String::new();
        let mut regions = Vec::new();

        for part in &interpolation.parts {
            match part.kind {
                InterpolationPartKind::Literal(ref literal) => {
                    regions.push(InterpolationRegion {
                        start: text.len(),
                        end: text.len() + literal.len(),
                        span: part.span.clone(),
                        is_expression: false,
                    });
                    text.push_str(literal);
                }
                InterpolationPartKind::Expression(ref expression) => {
                    let value = self.visit_expression(expression)?;
                    let rendered = value.to_interpolated_string().map_err(|message| {
                        CompileError::Runtime {
                            message,
                            span: part.span.clone(),
                            trace: self.call_stack.clone(),
                        }
                    })?;
                    regions.push(InterpolationRegion {
                        start: text.len(),
                        end: text.len() + rendered.len(),
                        span: part.span.clone(),
                        is_expression: true,
                    });
                    text.push_str(&rendered);
                }
            }
        }

        Ok(ResolvedText {
            text,
            regions,
            span: interpolation.span.clone(),
        })
    }

    fn attach_span(&self, error: CompileError, span: &Span) -> CompileError {
        match error {
            CompileError::Io(message) => CompileError::Runtime {
                message,
                span: span.clone(),
                trace: self.call_stack.clone(),
            },
            other => other,
        }
    }
}

// ----- free helpers -----

fn prefix_resolved_text(prefix: &str, name: &ResolvedText) -> ResolvedText {
    let offset = prefix.len() + 1;
    let mut text = String::with_capacity(offset + name.text.len());
    text.push_str(prefix);
    text.push('-');
    text.push_str(&name.text);

    ResolvedText {
        text,
        regions: name
            .regions
            .iter()
            .map(|r| InterpolationRegion {
                start: r.start + offset,
                end: r.end + offset,
                span: r.span.clone(),
                is_expression: r.is_expression,
            })
            .collect(),
        span: name.span.clone(),
    }
}

fn default_namespace(url: &str) -> String {
    let basename = url.rsplit('/').next().unwrap_or(url);
    let without_ext = basename.split('.').next().unwrap_or(basename);
    String::from(without_ext.strip_prefix('_').unwrap_or(without_ext))
}

fn add_map_to_named(
    map: &Map,
    named: &mut Vec<(String, Value)>,
    span: &Span,
) -> Result<(), CompileError> {
    for (key, value) in map.iter() {
        let Value::String(ref name) = *key else {
            return Err(CompileError::runtime(
                format!(
                    "Variable keyword argument map must have string keys.\n\
                     {} is not a string.",
                    key.inspect()
                ),
                span.clone(),
            ));
        };
        named.push((name.text.clone(), value.clone()));
    }
    Ok(())
}

/// Whether an operand of `/` marks the whole expression as SassScript.
fn slash_operand_is_scripty(expression: &Expression) -> bool {
    matches!(
        expression,
        Expression::Variable { .. }
            | Expression::FunctionCall(_)
            | Expression::Paren { .. }
            | Expression::Unary { .. }
    ) || matches!(expression, Expression::Binary { op, .. } if *op != BinaryOp::Div)
}

fn compare_values(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(format!(
            "Undefined operation \"{} {} {}\".",
            left.inspect(),
            op.name(),
            right.inspect()
        ));
    };

    let ordering = a
        .compare(b)
        .ok_or_else(|| format!("Incompatible units {} and {}.", a, b))?;

    use std::cmp::Ordering::*;
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Ge => ordering != Less,
        _ => unreachable!("comparison operator"),
    }))
}

fn add_values(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .add(b)
            .map(Value::Number)
            .ok_or_else(|| format!("Incompatible units {} and {}.", a, b)),

        (Value::Color(_), _) | (_, Value::Color(_)) => Err(format!(
            "Undefined operation \"{} + {}\".",
            left.inspect(),
            right.inspect()
        )),

        // String concatenation; the left operand's quoting wins when it is
        // a string, otherwise the right's.
        _ => {
            let quoted = match (left, right) {
                (Value::String(l), _) => l.quoted,
                (_, Value::String(r)) => r.quoted,
                _ => false,
            };
            let text = format!(
                "{}{}",
                concat_operand(left)?,
                concat_operand(right)?
            );
            Ok(Value::String(Str { text, quoted }))
        }
    }
}

fn concat_operand(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.text.clone()),
        other => other.to_css_string(false),
    }
}

fn subtract_values(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .sub(b)
            .map(Value::Number)
            .ok_or_else(|| format!("Incompatible units {} and {}.", a, b)),

        (Value::Color(_), _) | (_, Value::Color(_)) => Err(format!(
            "Undefined operation \"{} - {}\".",
            left.inspect(),
            right.inspect()
        )),

        _ => Ok(Value::String(Str::unquoted(format!(
            "{}-{}",
            left.to_css_string(false)?,
            right.to_css_string(false)?
        )))),
    }
}

fn multiply_values(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.mul(b))),
        _ => Err(format!(
            "Undefined operation \"{} * {}\".",
            left.inspect(),
            right.inspect()
        )),
    }
}

fn modulo_values(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .rem(b)
            .map(Value::Number)
            .ok_or_else(|| format!("Incompatible units {} and {}.", a, b)),
        _ => Err(format!(
            "Undefined operation \"{} % {}\".",
            left.inspect(),
            right.inspect()
        )),
    }
}

/// Joins nested media queries: each comma alternative of the outer query
/// combines with each alternative of the inner one.
fn merge_media_queries(outer: &str, inner: &str) -> String {
    let mut merged = Vec::new();
    for o in outer.split(',') {
        for i in inner.split(',') {
            merged.push(format!("{} and {}", o.trim(), i.trim()));
        }
    }
    merged.join(", ")
}

fn wrapper_span(node: &CssNode) -> Span {
    match *node.borrow() {
        CssNodeData::AtRule(ref rule) => rule.span.clone(),
        CssNodeData::StyleRule(ref rule) => rule.span.clone(),
        CssNodeData::Declaration(ref decl) => decl.span.clone(),
        CssNodeData::Comment(ref comment) => comment.span.clone(),
        CssNodeData::Root => unreachable!("root nodes never wrap"),
    }
}

// ----- extension application and CSS assembly -----

/// One extension's identity across the per-module extender merges.
type ExtensionKey = (usize, usize, usize, String);

fn extension_key(extension: &crate::extend::Extension) -> ExtensionKey {
    (
        Rc::as_ptr(&extension.span.file) as usize,
        extension.span.start,
        extension.span.end,
        extension.target.to_string(),
    )
}

/// Applies `@extend`s across the module graph and concatenates every
/// module's CSS, upstream first.
fn finish(root_module: &Rc<Module>) -> Result<CssNode, CompileError> {
    // Post-order over the module graph: upstream modules first, each
    // module once.
    let mut order: Vec<Rc<Module>> = Vec::new();
    let mut seen: HashSet<*const Module> = HashSet::new();
    collect_modules(root_module, &mut order, &mut seen);

    // For each module, the set of modules reachable upstream (including
    // itself); used to decide which extensions reach which CSS.
    let mut closures: HashMap<*const Module, HashSet<*const Module>> = HashMap::new();
    for module in &order {
        let mut closure: HashSet<*const Module> = HashSet::new();
        closure.insert(Rc::as_ptr(module));
        for upstream in &module.upstream {
            if let Some(upstream_closure) = closures.get(&Rc::as_ptr(upstream)) {
                closure.extend(upstream_closure.iter().copied());
            }
        }
        closures.insert(Rc::as_ptr(module), closure);
    }

    // How many modules list each module upstream, to know when CSS is
    // shared between extension contexts.
    let mut reference_counts: HashMap<*const Module, usize> = HashMap::new();
    for module in &order {
        for upstream in &module.upstream {
            *reference_counts.entry(Rc::as_ptr(upstream)).or_insert(0) += 1;
        }
    }

    let mut participation: HashMap<ExtensionKey, (bool, bool)> = HashMap::new();
    let mut trees: Vec<CssNode> = Vec::new();

    for target in &order {
        // Extensions that apply to this module's CSS: its own plus every
        // downstream module's, downstream-first.
        let mut merged = Extender::new();
        for source in order.iter().rev() {
            let reaches = closures
                .get(&Rc::as_ptr(source))
                .map_or(false, |c| c.contains(&Rc::as_ptr(target)));
            if reaches {
                merged.merge(&source.extender.borrow());
            }
        }

        let has_foreign = merged.extensions().len() > target.extender.borrow().extensions().len();
        let shared = reference_counts
            .get(&Rc::as_ptr(target))
            .copied()
            .unwrap_or(0)
            > 1;

        // A module whose CSS is visible from several downstream modules
        // gets extensions applied to a copy, leaving the original tree
        // pristine for other contexts.
        let tree = if has_foreign && shared && target.has_css() {
            let clone = target.clone_css();
            let found = merged.apply_tracked(&clone.css.borrow());
            record_participation(&merged, &found, &mut participation);
            let result = clone.css.borrow().clone();
            result
        } else {
            let css = target.css.borrow().clone();
            let found = merged.apply_tracked(&css);
            record_participation(&merged, &found, &mut participation);
            css
        };

        trees.push(tree);
    }

    // A mandatory extension that matched nowhere is an error.
    for target in &order {
        for extension in target.extender.borrow().extensions() {
            if extension.optional {
                continue;
            }
            let key = extension_key(extension);
            if let Some(&(_, found)) = participation.get(&key) {
                if !found {
                    return Err(CompileError::runtime(
                        format!(
                            "The target selector was not found.\n\
                             Use \"@extend {} !optional\" to avoid this error.",
                            extension.target
                        ),
                        extension.span.clone(),
                    ));
                }
            }
        }
    }

    // Concatenate in load order: upstream CSS precedes the module that
    // loaded it.
    let mut combined = css_tree::new_root();
    for tree in trees {
        let children: Vec<CssNode> = tree.children().collect();
        for mut child in children {
            child.detach();
            combined.append(child);
        }
    }

    Ok(combined)
}

fn collect_modules(
    module: &Rc<Module>,
    order: &mut Vec<Rc<Module>>,
    seen: &mut HashSet<*const Module>,
) {
    if !seen.insert(Rc::as_ptr(module)) {
        return;
    }
    for upstream in &module.upstream {
        collect_modules(upstream, order, seen);
    }
    order.push(module.clone());
}

fn record_participation(
    extender: &Extender,
    found: &[bool],
    participation: &mut HashMap<ExtensionKey, (bool, bool)>,
) {
    for (extension, &was_found) in extender.extensions().iter().zip(found) {
        let entry = participation
            .entry(extension_key(extension))
            .or_insert((false, false));
        entry.0 = true;
        if was_found {
            entry.1 = true;
        }
    }
}
