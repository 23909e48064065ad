//! Tracks metadata for one compilation session.
//!
//! When the calling program uses one of the API entry points there is no
//! context yet where the compiler's code may start to track things.  This
//! struct provides that context: the deprecation-processing logger and the
//! internal-diagnostics flag, cheaply cloneable so every subsystem can hold
//! one.

use std::rc::Rc;

use crate::deprecation::Deprecation;
use crate::error::{CompileError, TraceFrame};
use crate::log;
use crate::logger::DeprecationLogger;
use crate::source::Span;

#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    logger: DeprecationLogger,
    log_enabled: bool,
}

impl Session {
    pub fn new(logger: DeprecationLogger) -> Session {
        Session {
            inner: Rc::new(SessionInner {
                logger,
                log_enabled: log::log_enabled(),
            }),
        }
    }

    /// A session that logs nothing, for tests.
    #[cfg(test)]
    pub fn new_for_test_suite() -> Session {
        use crate::logger::{DeprecationPolicy, NullLogger};

        Session::new(DeprecationLogger::new(
            Rc::new(NullLogger),
            DeprecationPolicy::default(),
            true,
            false,
        ))
    }

    /// Whether internal diagnostics (`sass_log!`) are enabled.
    pub fn log_enabled(&self) -> bool {
        self.inner.log_enabled
    }

    pub fn logger(&self) -> &DeprecationLogger {
        &self.inner.logger
    }

    /// Routes a warning through the deprecation-processing logger.
    pub fn warn(
        &self,
        message: &str,
        span: Option<&Span>,
        trace: Option<&[TraceFrame]>,
        deprecation: Option<Deprecation>,
    ) -> Result<(), CompileError> {
        self.inner.logger.warn(message, span, trace, deprecation)
    }

    pub fn debug(&self, message: &str, span: Option<&Span>) {
        self.inner.logger.debug(message, span);
    }
}
