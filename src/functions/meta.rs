//! Introspection builtins.
//!
//! The meta functions that need the evaluator's environment (`call`,
//! `get-function`, the `*-exists` family) and the lazily-evaluated `if()`
//! are special forms in the evaluator; what lives here is the pure
//! remainder.

use crate::context::EvalContext;
use crate::functions::{string_arg, BuiltinDef};
use crate::value::{Str, Value};

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "inspect",
            signature: "inspect($value)",
            function: inspect,
        },
        BuiltinDef {
            name: "type-of",
            signature: "type-of($value)",
            function: type_of,
        },
        BuiltinDef {
            name: "feature-exists",
            signature: "feature-exists($feature)",
            function: feature_exists,
        },
    ]
}

fn inspect(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    Ok(Value::String(Str::unquoted(args[0].inspect())))
}

fn type_of(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let name = match args[0] {
        Value::ArgList(_) => "arglist",
        ref other => other.type_name(),
    };
    Ok(Value::String(Str::unquoted(name)))
}

/// Language features hosts can probe for.
const FEATURES: &[&str] = &[
    "global-variable-shadowing",
    "extend-selector-pseudoclass",
    "units-level-3",
    "at-error",
    "custom-property",
];

fn feature_exists(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let feature = string_arg(args, 0, "feature")?;
    Ok(Value::Bool(FEATURES.contains(&feature.text.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceFrame;
    use crate::session::Session;
    use crate::source::{SourceFile, Span};
    use crate::syntax::Syntax;
    use crate::value::Number;

    fn with_ctx<T>(f: impl FnOnce(&mut EvalContext<'_>) -> T) -> T {
        let session = Session::new_for_test_suite();
        let file = SourceFile::new(String::from("x"), None, Syntax::Scss);
        let span = Span::new(file, 0, 1);
        let trace: Vec<TraceFrame> = Vec::new();
        let mut ctx = EvalContext::new(&session, span, &trace);
        f(&mut ctx)
    }

    #[test]
    fn type_of_reports_value_kinds() {
        with_ctx(|ctx| {
            let out = type_of(&[Value::Number(Number::new(1.0))], ctx).unwrap();
            assert_eq!(out, Value::String(Str::unquoted("number")));

            let out = type_of(&[Value::Null], ctx).unwrap();
            assert_eq!(out, Value::String(Str::unquoted("null")));
        });
    }

    #[test]
    fn inspect_preserves_quoting() {
        with_ctx(|ctx| {
            let out = inspect(&[Value::String(Str::quoted("a"))], ctx).unwrap();
            assert_eq!(out, Value::String(Str::unquoted("\"a\"")));
        });
    }

    #[test]
    fn known_features_exist() {
        with_ctx(|ctx| {
            let yes = feature_exists(&[Value::String(Str::quoted("at-error"))], ctx).unwrap();
            assert_eq!(yes, Value::Bool(true));

            let no = feature_exists(&[Value::String(Str::quoted("nope"))], ctx).unwrap();
            assert_eq!(no, Value::Bool(false));
        });
    }
}
