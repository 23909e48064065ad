//! Error types.

use std::error;
use std::fmt;

use crate::io::IoError;
use crate::source::Span;

/// One frame of the Sass call stack.
///
/// `name` is the mixin or function being executed, or `None` for spans in
/// the root stylesheet or an imported file's top level.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub name: Option<String>,
    pub span: Span,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{}  {}()", self.span.describe(), name),
            None => write!(f, "{}  root stylesheet", self.span.describe()),
        }
    }
}

/// Errors from the embedded-protocol dispatcher.
///
/// Any of these is fatal to the compilation that triggered the host call.
/// The CLI collaborator maps them to exit code 76.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    /// The host sent a message that could not be decoded.
    Parse(String),

    /// The host sent a well-formed message with a bad id or contents.
    Params(String),

    /// Anything else that went wrong on the host side.
    Internal(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Parse(ref s) => write!(f, "protocol parse error: {s}"),
            ProtocolError::Params(ref s) => write!(f, "protocol params error: {s}"),
            ProtocolError::Internal(ref s) => write!(f, "protocol internal error: {s}"),
        }
    }
}

/// Errors that can happen while compiling a stylesheet.
///
/// `Parse` and `Runtime` carry a span pointing into the original source;
/// `Runtime` additionally carries the Sass call stack active when the error
/// was raised.  The `Display` impl renders a caret-annotated excerpt, and
/// the trace when one is present.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum CompileError {
    /// The source could not be parsed.
    Parse { message: String, span: Span },

    /// Evaluation failed: a Sass-level error (`@error`, a failed builtin,
    /// an undefined variable, a missing import, and so on).
    Runtime {
        message: String,
        span: Span,
        trace: Vec<TraceFrame>,
    },

    /// Invalid options were passed to the compiler.
    Usage(String),

    /// An importer failed to read its source.
    Io(String),

    /// The embedded-protocol host misbehaved.
    Protocol(ProtocolError),

    /// A bug in the compiler.
    Internal(String),
}

impl CompileError {
    pub(crate) fn parse(message: impl Into<String>, span: Span) -> CompileError {
        CompileError::Parse {
            message: message.into(),
            span,
        }
    }

    pub(crate) fn runtime(message: impl Into<String>, span: Span) -> CompileError {
        CompileError::Runtime {
            message: message.into(),
            span,
            trace: Vec::new(),
        }
    }

    /// The span the error points at, if it carries one.
    pub fn span(&self) -> Option<&Span> {
        match *self {
            CompileError::Parse { ref span, .. } => Some(span),
            CompileError::Runtime { ref span, .. } => Some(span),
            _ => None,
        }
    }

    /// Pushes a call-stack frame onto a runtime error as it unwinds
    /// through a callable invocation.  Other error kinds pass through
    /// untouched.
    pub(crate) fn with_frame(mut self, frame: TraceFrame) -> CompileError {
        if let CompileError::Runtime { ref mut trace, .. } = self {
            trace.push(frame);
        }
        self
    }
}

impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CompileError::Parse {
                ref message,
                ref span,
            } => {
                writeln!(f, "Error: {message}")?;
                writeln!(f, "{}", span.annotate())?;
                write!(f, "  {}", span.describe())
            }

            CompileError::Runtime {
                ref message,
                ref span,
                ref trace,
            } => {
                writeln!(f, "Error: {message}")?;
                writeln!(f, "{}", span.annotate())?;
                write!(f, "  {}", span.describe())?;
                for frame in trace {
                    write!(f, "\n  {frame}")?;
                }
                Ok(())
            }

            CompileError::Usage(ref s) => write!(f, "{s}"),
            CompileError::Io(ref s) => write!(f, "{s}"),
            CompileError::Protocol(ref e) => e.fmt(f),
            CompileError::Internal(ref s) => write!(
                f,
                "internal error: {s}\n\
                 This is a bug; please report it with the input that triggered it \
                 so a span can be attached."
            ),
        }
    }
}

impl From<IoError> for CompileError {
    fn from(e: IoError) -> CompileError {
        CompileError::Io(e.to_string())
    }
}

impl From<ProtocolError> for CompileError {
    fn from(e: ProtocolError) -> CompileError {
        CompileError::Protocol(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Syntax;
    use std::rc::Rc;

    fn span(text: &str, start: usize, end: usize) -> Span {
        let file = SourceFile::new(String::from(text), None, Syntax::Scss);
        Span::new(file, start, end)
    }

    #[test]
    fn parse_error_display_includes_excerpt() {
        let err = CompileError::parse("expected \"}\"", span("a {\n", 2, 3));
        let rendered = err.to_string();

        assert!(rendered.starts_with("Error: expected \"}\""));
        assert!(rendered.contains("1 | a {"));
        assert!(rendered.contains("- 1:3"));
    }

    #[test]
    fn runtime_error_display_includes_trace() {
        let s = span("a { b: foo() }", 7, 12);
        let mut err = CompileError::runtime("no function", s.clone());
        err = err.with_frame(TraceFrame {
            name: Some(String::from("foo")),
            span: s.clone(),
        });
        err = err.with_frame(TraceFrame {
            name: None,
            span: s,
        });

        let rendered = err.to_string();
        assert!(rendered.contains("foo()"));
        assert!(rendered.contains("root stylesheet"));
    }

    #[test]
    fn frames_only_attach_to_runtime_errors() {
        let err = CompileError::Usage(String::from("bad")).with_frame(TraceFrame {
            name: None,
            span: span("x", 0, 1),
        });
        assert!(matches!(err, CompileError::Usage(_)));
    }

    #[test]
    fn error_chain_from_io() {
        let err: CompileError = IoError::BadDataUrl.into();
        assert!(matches!(err, CompileError::Io(_)));
    }
}
