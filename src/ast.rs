//! The parsed stylesheet tree.
//!
//! Statements and expressions are plain tagged enums; every pass over the
//! tree dispatches with a `match` per node kind.  Every node carries a
//! [`Span`] into its source file.  The tree is immutable once built and is
//! shared (`Rc`) between the import cache and the evaluator.

use std::rc::Rc;

use url::Url;

use crate::source::Span;
use crate::syntax::Syntax;
use crate::value::list::ListSeparator;

/// A parsed source file.
#[derive(Debug)]
pub struct Stylesheet {
    pub statements: Vec<Statement>,
    pub span: Span,
    pub url: Option<Url>,
    pub syntax: Syntax,
}

/// A string assembled from literal fragments and embedded expressions.
///
/// The parts alternate between the two kinds, but either kind may begin or
/// end the sequence, and a lone part of either kind is valid.
#[derive(Debug, Clone)]
pub struct Interpolation {
    pub parts: Vec<InterpolationPart>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterpolationPart {
    pub kind: InterpolationPartKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InterpolationPartKind {
    Literal(String),
    Expression(Expression),
}

impl Interpolation {
    /// An interpolation holding a single literal.
    pub fn literal(text: impl Into<String>, span: Span) -> Interpolation {
        Interpolation {
            parts: vec![InterpolationPart {
                kind: InterpolationPartKind::Literal(text.into()),
                span: span.clone(),
            }],
            span,
        }
    }

    /// The text if the interpolation contains no expressions.
    pub fn as_plain(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [InterpolationPart {
                kind: InterpolationPartKind::Literal(ref text),
                ..
            }] => Some(text),
            _ => None,
        }
    }

    /// The literal text leading the interpolation, if any.  Used to decide
    /// at-rule dialects (e.g. whether an `@media` query starts with a
    /// known token) without evaluating anything.
    pub fn initial_plain(&self) -> &str {
        match self.parts.first() {
            Some(InterpolationPart {
                kind: InterpolationPartKind::Literal(ref text),
                ..
            }) => text,
            _ => "",
        }
    }
}

/// A statement in a stylesheet or block body.
#[derive(Debug, Clone)]
pub enum Statement {
    StyleRule(StyleRule),
    Declaration(Declaration),
    VariableDecl(VariableDecl),
    FunctionRule(Rc<CallableDeclaration>),
    MixinRule(Rc<CallableDeclaration>),
    Include(Include),
    Content(ContentInvocation),
    Return(ReturnRule),
    If(IfRule),
    Each(EachRule),
    For(ForRule),
    While(WhileRule),
    Use(UseRule),
    Forward(ForwardRule),
    Import(ImportRule),
    Extend(ExtendRule),
    Media(MediaRule),
    AtRule(AtRule),
    Warn(MessageRule),
    Debug(MessageRule),
    Error(MessageRule),
    LoudComment(LoudComment),
    SilentComment(Span),
}

impl Statement {
    pub fn span(&self) -> &Span {
        match *self {
            Statement::StyleRule(ref s) => &s.span,
            Statement::Declaration(ref s) => &s.span,
            Statement::VariableDecl(ref s) => &s.span,
            Statement::FunctionRule(ref s) => &s.span,
            Statement::MixinRule(ref s) => &s.span,
            Statement::Include(ref s) => &s.span,
            Statement::Content(ref s) => &s.span,
            Statement::Return(ref s) => &s.span,
            Statement::If(ref s) => &s.span,
            Statement::Each(ref s) => &s.span,
            Statement::For(ref s) => &s.span,
            Statement::While(ref s) => &s.span,
            Statement::Use(ref s) => &s.span,
            Statement::Forward(ref s) => &s.span,
            Statement::Import(ref s) => &s.span,
            Statement::Extend(ref s) => &s.span,
            Statement::Media(ref s) => &s.span,
            Statement::AtRule(ref s) => &s.span,
            Statement::Warn(ref s) | Statement::Debug(ref s) | Statement::Error(ref s) => &s.span,
            Statement::LoudComment(ref s) => &s.span,
            Statement::SilentComment(ref span) => span,
        }
    }
}

/// `selector { … }`
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: Interpolation,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `name: value`, optionally with a nested block of child declarations
/// (`font: { family: serif; }`).
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: Interpolation,
    pub value: Option<Expression>,
    pub body: Option<Vec<Statement>>,
    pub span: Span,
}

/// `$name: value`, possibly `!default`/`!global`, possibly
/// namespaced (`ns.$name: value`).
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub namespace: Option<String>,
    pub value: Expression,
    pub guarded: bool,
    pub global: bool,
    pub span: Span,
}

/// The shared shape of `@function` and `@mixin` declarations.
#[derive(Debug)]
pub struct CallableDeclaration {
    pub name: String,
    pub arguments: ArgumentDeclaration,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// A parameter signature: `($a, $b: default, $rest...)`.
#[derive(Debug, Clone)]
pub struct ArgumentDeclaration {
    pub arguments: Vec<Argument>,
    pub rest: Option<String>,
    pub span: Span,
}

impl ArgumentDeclaration {
    pub fn empty(span: Span) -> ArgumentDeclaration {
        ArgumentDeclaration {
            arguments: Vec::new(),
            rest: None,
            span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub default: Option<Expression>,
    pub span: Span,
}

/// The arguments at a call site: `(1, 2, $c: 3, $list..., $kwargs...)`.
#[derive(Debug, Clone)]
pub struct ArgumentInvocation {
    pub positional: Vec<Expression>,
    pub named: Vec<(String, Expression)>,
    pub rest: Option<Box<Expression>>,
    pub keyword_rest: Option<Box<Expression>>,
    pub span: Span,
}

impl ArgumentInvocation {
    pub fn empty(span: Span) -> ArgumentInvocation {
        ArgumentInvocation {
            positional: Vec::new(),
            named: Vec::new(),
            rest: None,
            keyword_rest: None,
            span,
        }
    }
}

/// `@include name(args) { … }`
#[derive(Debug, Clone)]
pub struct Include {
    pub name: String,
    pub namespace: Option<String>,
    pub arguments: ArgumentInvocation,
    pub content: Option<Rc<ContentBlock>>,
    pub span: Span,
}

/// The block passed to a mixin, with its `using ($args)` signature.
#[derive(Debug)]
pub struct ContentBlock {
    pub arguments: ArgumentDeclaration,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `@content(args)` inside a mixin body.
#[derive(Debug, Clone)]
pub struct ContentInvocation {
    pub arguments: ArgumentInvocation,
    pub span: Span,
}

/// `@return value` inside a function body.
#[derive(Debug, Clone)]
pub struct ReturnRule {
    pub value: Expression,
    pub span: Span,
}

/// `@if` / `@else if` / `@else`.
#[derive(Debug, Clone)]
pub struct IfRule {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfClause {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

/// `@each $a, $b in list { … }`
#[derive(Debug, Clone)]
pub struct EachRule {
    pub variables: Vec<String>,
    pub list: Expression,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `@for $i from a through b { … }`
#[derive(Debug, Clone)]
pub struct ForRule {
    pub variable: String,
    pub from: Expression,
    pub to: Expression,
    /// True for `to`, false for `through`.
    pub exclusive: bool,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `@while condition { … }`
#[derive(Debug, Clone)]
pub struct WhileRule {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `@use "url" as ns with (…)`.
#[derive(Debug, Clone)]
pub struct UseRule {
    pub url: String,
    pub namespace: UseNamespace,
    pub configuration: Vec<ConfiguredVariable>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseNamespace {
    /// No `as` clause: the namespace is derived from the URL's basename.
    Default,

    /// `as *`: members are exposed without a namespace.
    Global,

    /// `as name`.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ConfiguredVariable {
    pub name: String,
    pub value: Expression,
    pub guarded: bool,
    pub span: Span,
}

/// `@forward "url" show/hide/as prefix-* with (…)`.
#[derive(Debug, Clone)]
pub struct ForwardRule {
    pub url: String,
    pub prefix: Option<String>,
    pub visibility: Option<ForwardVisibility>,
    pub configuration: Vec<ConfiguredVariable>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForwardVisibility {
    /// True for `show`, false for `hide`.
    pub show: bool,

    /// Member names; variables are listed without their `$`.
    pub names: Vec<String>,
}

/// A legacy `@import` with one or more targets.
#[derive(Debug, Clone)]
pub struct ImportRule {
    pub imports: Vec<Import>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Import {
    /// A Sass import, to be resolved and evaluated inline.
    Sass { url: String, span: Span },

    /// A plain-CSS import (`url(...)`, an `http:` target, a `.css` suffix,
    /// or a media query after the target); passed through to the output.
    Css {
        url: Interpolation,
        modifiers: Option<Interpolation>,
        span: Span,
    },
}

/// `@extend selector !optional`.
#[derive(Debug, Clone)]
pub struct ExtendRule {
    pub selector: Interpolation,
    pub optional: bool,
    pub span: Span,
}

/// `@media query { … }`
#[derive(Debug, Clone)]
pub struct MediaRule {
    pub query: Interpolation,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// An at-rule the evaluator has no special handling for: `@supports`,
/// `@keyframes`, `@font-face`, vendor rules, and anything unknown.
#[derive(Debug, Clone)]
pub struct AtRule {
    pub name: Interpolation,
    pub value: Option<Interpolation>,
    pub body: Option<Vec<Statement>>,
    pub span: Span,
}

/// `@warn`, `@debug`, or `@error`.
#[derive(Debug, Clone)]
pub struct MessageRule {
    pub expression: Expression,
    pub span: Span,
}

/// `/* … */`, which survives to the output (unless compressed).
#[derive(Debug, Clone)]
pub struct LoudComment {
    pub text: Interpolation,
    pub span: Span,
}

/// A SassScript expression.
#[derive(Debug, Clone)]
pub enum Expression {
    Boolean {
        value: bool,
        span: Span,
    },
    Null {
        span: Span,
    },
    Number {
        value: f64,
        unit: Option<String>,
        span: Span,
    },
    Color {
        red: u8,
        green: u8,
        blue: u8,
        alpha: f64,
        /// The original spelling (`#abc`, `cornflowerblue`) for
        /// round-tripping in expanded output.
        original: String,
        span: Span,
    },
    String(StringExpression),
    Variable {
        name: String,
        namespace: Option<String>,
        span: Span,
    },
    List(ListExpression),
    Map(MapExpression),
    FunctionCall(FunctionCall),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        span: Span,
    },
    Paren {
        inner: Box<Expression>,
        span: Span,
    },
    ParentSelector {
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> &Span {
        match *self {
            Expression::Boolean { ref span, .. }
            | Expression::Null { ref span }
            | Expression::Number { ref span, .. }
            | Expression::Color { ref span, .. }
            | Expression::Variable { ref span, .. }
            | Expression::Binary { ref span, .. }
            | Expression::Unary { ref span, .. }
            | Expression::Paren { ref span, .. }
            | Expression::ParentSelector { ref span } => span,
            Expression::String(ref s) => &s.span,
            Expression::List(ref l) => &l.span,
            Expression::Map(ref m) => &m.span,
            Expression::FunctionCall(ref c) => &c.span,
        }
    }
}

/// A quoted string or unquoted identifier-ish token, possibly interpolated.
#[derive(Debug, Clone)]
pub struct StringExpression {
    pub text: Interpolation,
    pub quoted: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ListExpression {
    pub contents: Vec<Expression>,
    pub separator: ListSeparator,
    pub brackets: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MapExpression {
    pub pairs: Vec<(Expression, Expression)>,
    pub span: Span,
}

/// `name(args)` or `ns.name(args)`.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub namespace: Option<String>,
    pub arguments: ArgumentInvocation,
    pub span: Span,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Times,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Times => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}
