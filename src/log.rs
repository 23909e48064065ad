//! Utilities for logging messages from the library.

use std::env;

/// Whether internal diagnostics are enabled for this process.
///
/// Controlled by the `SASS_LOG` environment variable; any non-empty value
/// other than `0` turns diagnostics on.
pub fn log_enabled() -> bool {
    match env::var("SASS_LOG") {
        Ok(v) => !v.is_empty() && v != "0",
        Err(_) => false,
    }
}

/// Logs an internal diagnostic through a [`Session`](crate::session::Session).
///
/// These messages are for debugging the compiler itself, not for user-facing
/// warnings; those go through the session's logger instead.
#[doc(hidden)]
#[macro_export]
macro_rules! sass_log {
    (
        $session:expr,
        $($arg:tt)+
    ) => {
        if $session.log_enabled() {
            eprintln!("{}", format_args!($($arg)+));
        }
    };
}
