//! The logger callers supply, and the deprecation-processing wrapper the
//! compiler installs around it.
//!
//! User code only ever sees the [`Logger`] trait.  Internally every warning
//! flows through a [`DeprecationLogger`], which classifies it by
//! [`Deprecation`] id and then silences it, promotes it to a fatal error, or
//! forwards it — counting repetitions so that a dependency warning about the
//! same span ten thousand times produces five messages and one summary line.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use url::Url;

use crate::deprecation::Deprecation;
use crate::error::{CompileError, TraceFrame};
use crate::source::Span;

/// How many warnings for one `(deprecation, location)` pair are emitted
/// before the rest are suppressed and counted for the summary.
const MAX_REPETITIONS: usize = 5;

/// Context attached to a warning.
pub struct WarnEvent<'a> {
    pub span: Option<&'a Span>,
    pub trace: Option<&'a [TraceFrame]>,
    pub deprecation: Option<Deprecation>,
}

/// A sink for warnings and debug messages.
pub trait Logger {
    fn warn(&self, message: &str, event: &WarnEvent<'_>);

    fn debug(&self, message: &str, span: Option<&Span>);
}

/// The default logger: renders warnings to stderr with a source excerpt.
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn warn(&self, message: &str, event: &WarnEvent<'_>) {
        match event.deprecation {
            Some(d) => eprintln!("Deprecation Warning [{d}]: {message}"),
            None => eprintln!("Warning: {message}"),
        }

        if let Some(span) = event.span {
            eprintln!("{}", span.annotate());
            eprintln!("    {}", span.describe());
        }

        if let Some(trace) = event.trace {
            for frame in trace {
                eprintln!("    {frame}");
            }
        }
    }

    fn debug(&self, message: &str, span: Option<&Span>) {
        match span {
            Some(span) => eprintln!("{}: Debug: {message}", span.describe()),
            None => eprintln!("Debug: {message}"),
        }
    }
}

/// A logger that swallows everything.  Used by tests and by hosts that
/// install their own reporting on top of [`crate::CompileResult`].
pub struct NullLogger;

impl Logger for NullLogger {
    fn warn(&self, _message: &str, _event: &WarnEvent<'_>) {}

    fn debug(&self, _message: &str, _span: Option<&Span>) {}
}

/// Per-id deprecation policy, from the compile options.
#[derive(Default, Clone)]
pub struct DeprecationPolicy {
    pub silence: HashSet<Deprecation>,
    pub fatal: HashSet<Deprecation>,
    pub future: HashSet<Deprecation>,
}

impl DeprecationPolicy {
    /// Rejects a policy in which the same id is both silenced and fatal.
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut conflicting: Vec<&str> = self
            .silence
            .intersection(&self.fatal)
            .map(|d| d.id())
            .collect();

        if conflicting.is_empty() {
            return Ok(());
        }

        conflicting.sort_unstable();
        Err(CompileError::Usage(format!(
            "deprecation {} may not be both silenced and fatal",
            conflicting.join(", ")
        )))
    }
}

/// Wraps the user's logger with deprecation policy and repetition limiting.
pub struct DeprecationLogger {
    inner: Rc<dyn Logger>,
    policy: DeprecationPolicy,

    /// When false (the `verbose` option), repeated warnings are never
    /// suppressed.
    limit_repetition: bool,

    /// When true (the `quiet_deps` option), non-fatal deprecation warnings
    /// from files other than the entrypoint are dropped.
    quiet_deps: bool,

    entrypoint_url: RefCell<Option<Url>>,
    counts: RefCell<HashMap<(Deprecation, String), usize>>,
}

impl DeprecationLogger {
    pub fn new(
        inner: Rc<dyn Logger>,
        policy: DeprecationPolicy,
        limit_repetition: bool,
        quiet_deps: bool,
    ) -> DeprecationLogger {
        DeprecationLogger {
            inner,
            policy,
            limit_repetition,
            quiet_deps,
            entrypoint_url: RefCell::new(None),
            counts: RefCell::new(HashMap::new()),
        }
    }

    /// Records the entrypoint's canonical URL so `quiet_deps` can tell
    /// dependency warnings apart from the user's own.
    pub fn set_entrypoint(&self, url: Option<Url>) {
        *self.entrypoint_url.borrow_mut() = url;
    }

    /// Processes one warning.  Returns an error when the warning's
    /// deprecation is configured as fatal.
    pub fn warn(
        &self,
        message: &str,
        span: Option<&Span>,
        trace: Option<&[TraceFrame]>,
        deprecation: Option<Deprecation>,
    ) -> Result<(), CompileError> {
        let Some(d) = deprecation else {
            self.inner.warn(
                message,
                &WarnEvent {
                    span,
                    trace,
                    deprecation: None,
                },
            );
            return Ok(());
        };

        // Future deprecations are opt-in only.
        if d.is_future() && !self.policy.future.contains(&d) {
            return Ok(());
        }

        if self.policy.silence.contains(&d) {
            return Ok(());
        }

        // The fatal check runs before quiet-deps: a fatal deprecation in a
        // dependency still fails the build.
        if self.policy.fatal.contains(&d) {
            let message = format!(
                "{message}\n\
                 This is only an error because you've set the {d} deprecation to be fatal.\n\
                 Remove this setting if you need to keep using this feature."
            );
            return Err(match span {
                Some(span) => CompileError::Runtime {
                    message,
                    span: span.clone(),
                    trace: trace.map(<[TraceFrame]>::to_vec).unwrap_or_default(),
                },
                None => CompileError::Usage(message),
            });
        }

        if self.quiet_deps && !self.is_entrypoint_span(span) {
            return Ok(());
        }

        // Warnings for opted-into future deprecations are never limited.
        if self.limit_repetition && !self.policy.future.contains(&d) {
            let key = (d, span.map(Span::describe).unwrap_or_default());
            let mut counts = self.counts.borrow_mut();
            let count = match counts.entry(key) {
                Entry::Occupied(mut e) => {
                    *e.get_mut() += 1;
                    *e.get()
                }
                Entry::Vacant(e) => *e.insert(1),
            };

            if count > MAX_REPETITIONS {
                return Ok(());
            }
        }

        self.inner.warn(
            message,
            &WarnEvent {
                span,
                trace,
                deprecation: Some(d),
            },
        );
        Ok(())
    }

    pub fn debug(&self, message: &str, span: Option<&Span>) {
        self.inner.debug(message, span);
    }

    /// Emits one final warning per suppressed bucket, reporting how many
    /// repetitions were omitted.  Called by the driver after serialization,
    /// on success and on failure alike.
    pub fn summarize(&self) {
        let counts = self.counts.borrow();

        let mut omitted: HashMap<Deprecation, usize> = HashMap::new();
        for (&(d, _), &count) in counts.iter() {
            if count > MAX_REPETITIONS {
                *omitted.entry(d).or_insert(0) += count - MAX_REPETITIONS;
            }
        }

        let mut omitted: Vec<_> = omitted.into_iter().collect();
        omitted.sort_by_key(|&(d, _)| d.id());

        for (d, count) in omitted {
            self.inner.warn(
                &format!(
                    "{count} repetitive deprecation warnings omitted.\n\
                     Run in verbose mode to see all warnings."
                ),
                &WarnEvent {
                    span: None,
                    trace: None,
                    deprecation: Some(d),
                },
            );
        }
    }

    fn is_entrypoint_span(&self, span: Option<&Span>) -> bool {
        let Some(span) = span else { return true };
        let entrypoint = self.entrypoint_url.borrow();

        match (span.file.url(), entrypoint.as_ref()) {
            (Some(url), Some(entry)) => url == entry,
            // A span with no URL is the string entrypoint itself.
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Syntax;

    struct Recorder {
        warnings: RefCell<Vec<(String, Option<Deprecation>)>>,
    }

    impl Recorder {
        fn new() -> Rc<Recorder> {
            Rc::new(Recorder {
                warnings: RefCell::new(Vec::new()),
            })
        }
    }

    impl Logger for Recorder {
        fn warn(&self, message: &str, event: &WarnEvent<'_>) {
            self.warnings
                .borrow_mut()
                .push((String::from(message), event.deprecation));
        }

        fn debug(&self, _message: &str, _span: Option<&Span>) {}
    }

    fn span_at(line: usize) -> Span {
        let file = SourceFile::new("a\nb\nc\nd\ne\nf\ng\nh\n".into(), None, Syntax::Scss);
        Span::new(file, line * 2, line * 2 + 1)
    }

    fn logger(policy: DeprecationPolicy, limit: bool) -> (DeprecationLogger, Rc<Recorder>) {
        let recorder = Recorder::new();
        (
            DeprecationLogger::new(recorder.clone(), policy, limit, false),
            recorder,
        )
    }

    #[test]
    fn validate_rejects_silenced_and_fatal() {
        let mut policy = DeprecationPolicy::default();
        policy.silence.insert(Deprecation::SlashDiv);
        policy.fatal.insert(Deprecation::SlashDiv);

        assert!(matches!(
            policy.validate(),
            Err(CompileError::Usage(ref s)) if s.contains("slash-div")
        ));
    }

    #[test]
    fn silenced_deprecations_reach_nothing() {
        let mut policy = DeprecationPolicy::default();
        policy.silence.insert(Deprecation::SlashDiv);
        let (logger, recorder) = logger(policy, true);

        logger
            .warn("don't divide", None, None, Some(Deprecation::SlashDiv))
            .unwrap();
        assert!(recorder.warnings.borrow().is_empty());
    }

    #[test]
    fn fatal_deprecations_raise() {
        let mut policy = DeprecationPolicy::default();
        policy.fatal.insert(Deprecation::SlashDiv);
        let (logger, recorder) = logger(policy, true);

        let span = span_at(0);
        let result = logger.warn("don't", Some(&span), None, Some(Deprecation::SlashDiv));
        assert!(matches!(result, Err(CompileError::Runtime { .. })));
        assert!(recorder.warnings.borrow().is_empty());
    }

    #[test]
    fn future_deprecations_are_opt_in() {
        let (logger1, recorder) = logger(DeprecationPolicy::default(), true);
        logger1
            .warn("importing", None, None, Some(Deprecation::Import))
            .unwrap();
        assert!(recorder.warnings.borrow().is_empty());

        let mut policy = DeprecationPolicy::default();
        policy.future.insert(Deprecation::Import);
        let (logger, recorder) = logger(policy, true);
        logger
            .warn("importing", None, None, Some(Deprecation::Import))
            .unwrap();
        assert_eq!(recorder.warnings.borrow().len(), 1);
    }

    #[test]
    fn repetitions_are_limited_and_summarized() {
        let (logger, recorder) = logger(DeprecationPolicy::default(), true);
        let span = span_at(1);

        for _ in 0..12 {
            logger
                .warn("again", Some(&span), None, Some(Deprecation::SlashDiv))
                .unwrap();
        }
        assert_eq!(recorder.warnings.borrow().len(), MAX_REPETITIONS);

        logger.summarize();
        let warnings = recorder.warnings.borrow();
        assert_eq!(warnings.len(), MAX_REPETITIONS + 1);
        assert!(warnings.last().unwrap().0.contains("7 repetitive"));
    }

    #[test]
    fn different_locations_count_separately() {
        let (logger, recorder) = logger(DeprecationPolicy::default(), true);

        for line in 0..4 {
            let span = span_at(line);
            logger
                .warn("again", Some(&span), None, Some(Deprecation::SlashDiv))
                .unwrap();
        }
        assert_eq!(recorder.warnings.borrow().len(), 4);
    }

    #[test]
    fn verbose_disables_limiting() {
        let (logger, recorder) = logger(DeprecationPolicy::default(), false);
        let span = span_at(2);

        for _ in 0..12 {
            logger
                .warn("again", Some(&span), None, Some(Deprecation::SlashDiv))
                .unwrap();
        }
        assert_eq!(recorder.warnings.borrow().len(), 12);

        logger.summarize();
        assert_eq!(recorder.warnings.borrow().len(), 12);
    }

    #[test]
    fn plain_warnings_pass_straight_through() {
        let (logger, recorder) = logger(DeprecationPolicy::default(), true);
        for _ in 0..10 {
            logger.warn("hello", None, None, None).unwrap();
        }
        assert_eq!(recorder.warnings.borrow().len(), 10);
    }
}
