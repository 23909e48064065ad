//! Processing limits to mitigate malicious documents.

/// Maximum nesting depth the parser will accept for blocks, parentheses,
/// and interpolations.
///
/// Parsing is recursive, and a stylesheet consisting of thousands of
/// nested `{` or `(` would otherwise exhaust the stack.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Maximum depth of the Sass call stack during evaluation.
///
/// Mixin and function bodies are evaluated recursively; a recursive
/// function with no base case would otherwise exhaust the stack instead
/// of producing a catchable error.
pub const MAX_CALL_DEPTH: usize = 1024;
