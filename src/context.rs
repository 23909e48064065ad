//! The evaluation context handed to builtin and host code.
//!
//! Builtins need ambient state — where they were called from, and a sink
//! for warnings — without threading the whole evaluator through their
//! signatures.  The context is an explicit value constructed per native
//! invocation rather than hidden process state, so nested compilations
//! each see their own.

use crate::deprecation::Deprecation;
use crate::error::{CompileError, TraceFrame};
use crate::session::Session;
use crate::source::Span;

pub struct EvalContext<'a> {
    session: &'a Session,
    callable_span: Span,
    trace: &'a [TraceFrame],
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(session: &'a Session, callable_span: Span, trace: &'a [TraceFrame]) -> Self {
        EvalContext {
            session,
            callable_span,
            trace,
        }
    }

    /// The span of the call site of the callable currently executing.
    pub fn current_callable_span(&self) -> &Span {
        &self.callable_span
    }

    pub(crate) fn session(&self) -> &Session {
        self.session
    }

    /// Emits a warning attributed to the current call site.  Fails when
    /// the deprecation is configured fatal; native code propagates the
    /// error outward like any other.
    pub fn warn(
        &mut self,
        message: &str,
        deprecation: Option<Deprecation>,
    ) -> Result<(), CompileError> {
        self.session
            .warn(message, Some(&self.callable_span), Some(self.trace), deprecation)
    }

    pub fn debug(&self, message: &str) {
        self.session.debug(message, Some(&self.callable_span));
    }
}
