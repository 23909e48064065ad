//! Functions and mixins: user-defined, native, and host-remote.

use std::fmt;
use std::rc::Rc;

use crate::ast::{ArgumentDeclaration, CallableDeclaration};
use crate::context::EvalContext;
use crate::dispatcher::Dispatcher;
use crate::environment::Environment;
use crate::value::Value;

/// The implementation of a native (builtin or caller-supplied) function:
/// takes the values bound to the signature's parameters, in declaration
/// order, with the rest parameter (if any) last.  Errors are plain
/// messages; the evaluator attaches the call-site span and trace.
pub type NativeFn = Rc<dyn Fn(&[Value], &mut EvalContext<'_>) -> Result<Value, String>>;

/// A named function or mixin with a parameter signature and a body.
pub enum Callable {
    /// Declared by `@function` in a stylesheet; evaluates its AST body in
    /// a closure over the environment where it was declared.
    UserFunction(UserCallable),

    /// Declared by `@mixin`.
    UserMixin(UserCallable),

    /// Implemented natively in the compiler or supplied by the caller
    /// through the `functions` option.
    Builtin(BuiltinCallable),

    /// Implemented by the host process on the other side of the embedded
    /// protocol.
    Host(HostCallable),

    /// Another callable exposed under a different name, as `@forward
    /// "lib" as lib-*` does.
    Renamed { name: String, inner: Rc<Callable> },
}

pub struct UserCallable {
    pub declaration: Rc<CallableDeclaration>,
    pub environment: Environment,
}

pub struct BuiltinCallable {
    pub name: String,
    pub signature: Rc<ArgumentDeclaration>,
    pub function: NativeFn,
}

/// A callable whose body lives in the host: invoking it serializes the
/// arguments and blocks on a `FunctionCallRequest` round trip.
pub struct HostCallable {
    pub name: String,
    pub signature: Rc<ArgumentDeclaration>,
    pub function_id: u32,
    pub dispatcher: Rc<Dispatcher>,
}

impl Callable {
    pub fn name(&self) -> &str {
        match *self {
            Callable::UserFunction(ref c) | Callable::UserMixin(ref c) => &c.declaration.name,
            Callable::Builtin(ref c) => &c.name,
            Callable::Host(ref c) => &c.name,
            Callable::Renamed { ref name, .. } => name,
        }
    }

    pub fn signature(&self) -> &ArgumentDeclaration {
        match *self {
            Callable::UserFunction(ref c) | Callable::UserMixin(ref c) => &c.declaration.arguments,
            Callable::Builtin(ref c) => &c.signature,
            Callable::Host(ref c) => &c.signature,
            Callable::Renamed { ref inner, .. } => inner.signature(),
        }
    }

    /// The callable that actually runs, unwrapping renames.
    pub fn resolve(self: &Rc<Callable>) -> Rc<Callable> {
        match **self {
            Callable::Renamed { ref inner, .. } => inner.resolve(),
            _ => self.clone(),
        }
    }

    pub fn is_mixin(&self) -> bool {
        match *self {
            Callable::UserMixin(_) => true,
            Callable::Renamed { ref inner, .. } => inner.is_mixin(),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match *self {
            Callable::UserFunction(_) => "function",
            Callable::UserMixin(_) => "mixin",
            Callable::Builtin(_) => "builtin",
            Callable::Host(_) => "host",
            Callable::Renamed { .. } => "renamed",
        };
        write!(f, "Callable::{kind}({})", self.name())
    }
}
