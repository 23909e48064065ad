//! String builtins.

use crate::context::EvalContext;
use crate::functions::{int_arg, string_arg, BuiltinDef};
use crate::value::{Number, Str, Value};

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "quote",
            signature: "quote($string)",
            function: quote,
        },
        BuiltinDef {
            name: "unquote",
            signature: "unquote($string)",
            function: unquote,
        },
        BuiltinDef {
            name: "str-length",
            signature: "str-length($string)",
            function: str_length,
        },
        BuiltinDef {
            name: "to-upper-case",
            signature: "to-upper-case($string)",
            function: to_upper_case,
        },
        BuiltinDef {
            name: "to-lower-case",
            signature: "to-lower-case($string)",
            function: to_lower_case,
        },
        BuiltinDef {
            name: "str-index",
            signature: "str-index($string, $substring)",
            function: str_index,
        },
        BuiltinDef {
            name: "str-slice",
            signature: "str-slice($string, $start-at, $end-at: -1)",
            function: str_slice,
        },
        BuiltinDef {
            name: "str-insert",
            signature: "str-insert($string, $insert, $index)",
            function: str_insert,
        },
    ]
}

fn quote(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::String(Str::quoted(s.text.clone()))),
        Some(other) => Ok(Value::String(Str::quoted(
            other
                .to_css_string(false)
                .map_err(|e| format!("$string: {e}"))?,
        ))),
        None => Err(String::from("missing argument $string.")),
    }
}

fn unquote(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::String(Str::unquoted(s.text.clone()))),
        Some(other) => Ok(Value::String(Str::unquoted(
            other
                .to_css_string(false)
                .map_err(|e| format!("$string: {e}"))?,
        ))),
        None => Err(String::from("missing argument $string.")),
    }
}

fn str_length(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    Ok(Value::Number(Number::new(s.text.chars().count() as f64)))
}

fn to_upper_case(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    Ok(Value::String(Str {
        text: s.text.to_uppercase(),
        quoted: s.quoted,
    }))
}

fn to_lower_case(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    Ok(Value::String(Str {
        text: s.text.to_lowercase(),
        quoted: s.quoted,
    }))
}

fn str_index(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    let sub = string_arg(args, 1, "substring")?;

    match s.text.find(&sub.text) {
        Some(byte_index) => {
            let char_index = s.text[..byte_index].chars().count() + 1;
            Ok(Value::Number(Number::new(char_index as f64)))
        }
        None => Ok(Value::Null),
    }
}

/// Clamps a one-based, possibly negative string index into `0..=len`.
fn string_offset(index: i64, len: usize) -> usize {
    if index >= 0 {
        (index.max(1) as usize - 1).min(len)
    } else {
        let from_end = len as i64 + index;
        from_end.max(0) as usize
    }
}

fn str_slice(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    let start = int_arg(args, 1, "start-at")?;
    let end = int_arg(args, 2, "end-at")?;

    let chars: Vec<char> = s.text.chars().collect();
    let len = chars.len();

    let start = string_offset(start, len);
    // The end index is inclusive.
    let end = if end >= 0 {
        (end as usize).min(len)
    } else {
        (len as i64 + end + 1).max(0) as usize
    };

    let text: String = if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };

    Ok(Value::String(Str {
        text,
        quoted: s.quoted,
    }))
}

fn str_insert(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let s = string_arg(args, 0, "string")?;
    let insert = string_arg(args, 1, "insert")?;
    let index = int_arg(args, 2, "index")?;

    let chars: Vec<char> = s.text.chars().collect();
    let len = chars.len();

    let offset = if index >= 0 {
        string_offset(index, len)
    } else {
        // Negative indices count from the end, with -1 appending.
        (len as i64 + index + 1).max(0) as usize
    };

    let mut text: String = chars[..offset].iter().collect();
    text.push_str(&insert.text);
    text.extend(&chars[offset..]);

    Ok(Value::String(Str {
        text,
        quoted: s.quoted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceFrame;
    use crate::session::Session;
    use crate::source::{SourceFile, Span};
    use crate::syntax::Syntax;

    fn with_ctx<T>(f: impl FnOnce(&mut EvalContext<'_>) -> T) -> T {
        let session = Session::new_for_test_suite();
        let file = SourceFile::new(String::from("x"), None, Syntax::Scss);
        let span = Span::new(file, 0, 1);
        let trace: Vec<TraceFrame> = Vec::new();
        let mut ctx = EvalContext::new(&session, span, &trace);
        f(&mut ctx)
    }

    fn s(text: &str) -> Value {
        Value::String(Str::quoted(text))
    }

    #[test]
    fn slicing_is_one_based_and_inclusive() {
        with_ctx(|ctx| {
            let out = str_slice(&[s("abcd"), num(2), num(3)], ctx).unwrap();
            assert_eq!(out, s("bc"));

            let out = str_slice(&[s("abcd"), num(2), num(-1)], ctx).unwrap();
            assert_eq!(out, s("bcd"));

            let out = str_slice(&[s("abcd"), num(5), num(-1)], ctx).unwrap();
            assert_eq!(out, s(""));
        });
    }

    #[test]
    fn insert_appends_with_negative_one() {
        with_ctx(|ctx| {
            let out = str_insert(&[s("abc"), s("X"), num(-1)], ctx).unwrap();
            assert_eq!(out, s("abcX"));

            let out = str_insert(&[s("abc"), s("X"), num(1)], ctx).unwrap();
            assert_eq!(out, s("Xabc"));
        });
    }

    #[test]
    fn index_counts_characters() {
        with_ctx(|ctx| {
            let out = str_index(&[s("héllo"), s("llo")], ctx).unwrap();
            assert_eq!(out, Value::Number(Number::new(3.0)));

            let out = str_index(&[s("abc"), s("z")], ctx).unwrap();
            assert_eq!(out, Value::Null);
        });
    }

    fn num(n: i64) -> Value {
        Value::Number(Number::new(n as f64))
    }
}
