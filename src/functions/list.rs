//! List builtins.

use crate::context::EvalContext;
use crate::functions::{int_arg, sass_index, string_arg, BuiltinDef};
use crate::value::{List, ListSeparator, Number, Str, Value};

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "length",
            signature: "length($list)",
            function: length,
        },
        BuiltinDef {
            name: "nth",
            signature: "nth($list, $n)",
            function: nth,
        },
        BuiltinDef {
            name: "set-nth",
            signature: "set-nth($list, $n, $value)",
            function: set_nth,
        },
        BuiltinDef {
            name: "join",
            signature: "join($list1, $list2, $separator: auto, $bracketed: auto)",
            function: join,
        },
        BuiltinDef {
            name: "append",
            signature: "append($list, $val, $separator: auto)",
            function: append,
        },
        BuiltinDef {
            name: "index",
            signature: "index($list, $value)",
            function: index,
        },
        BuiltinDef {
            name: "zip",
            signature: "zip($lists...)",
            function: zip,
        },
        BuiltinDef {
            name: "list-separator",
            signature: "list-separator($list)",
            function: list_separator,
        },
        BuiltinDef {
            name: "is-bracketed",
            signature: "is-bracketed($list)",
            function: is_bracketed,
        },
    ]
}

fn length(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let contents = args[0].list_contents();
    Ok(Value::Number(Number::new(contents.len() as f64)))
}

fn nth(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let contents = args[0].list_contents();
    let n = int_arg(args, 1, "n")?;
    let i = sass_index(contents.len(), n, "n")?;
    Ok(contents[i].clone())
}

fn set_nth(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let mut contents = args[0].list_contents();
    let n = int_arg(args, 1, "n")?;
    let i = sass_index(contents.len(), n, "n")?;
    contents[i] = args[2].clone();

    Ok(Value::List(List {
        contents,
        separator: match args[0].separator() {
            ListSeparator::Undecided => ListSeparator::Space,
            s => s,
        },
        brackets: matches!(args[0], Value::List(ref l) if l.brackets),
    }))
}

/// Parses the `$separator` option shared by `join` and `append`.
fn separator_option(args: &[Value], i: usize) -> Result<Option<ListSeparator>, String> {
    let s = string_arg(args, i, "separator")?;
    match s.text.as_str() {
        "auto" => Ok(None),
        "space" => Ok(Some(ListSeparator::Space)),
        "comma" => Ok(Some(ListSeparator::Comma)),
        "slash" => Ok(Some(ListSeparator::Slash)),
        _ => Err(String::from(
            "$separator: Must be \"space\", \"comma\", \"slash\", or \"auto\".",
        )),
    }
}

fn join(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let mut contents = args[0].list_contents();
    contents.extend(args[1].list_contents());

    let separator = match separator_option(args, 2)? {
        Some(s) => s,
        None => match args[0].separator() {
            ListSeparator::Undecided => match args[1].separator() {
                ListSeparator::Undecided => ListSeparator::Space,
                s => s,
            },
            s => s,
        },
    };

    let brackets = match args.get(3) {
        Some(Value::String(s)) if s.text == "auto" => {
            matches!(args[0], Value::List(ref l) if l.brackets)
        }
        Some(v) => v.is_truthy(),
        None => false,
    };

    Ok(Value::List(List {
        contents,
        separator,
        brackets,
    }))
}

fn append(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let mut contents = args[0].list_contents();
    contents.push(args[1].clone());

    let separator = match separator_option(args, 2)? {
        Some(s) => s,
        None => match args[0].separator() {
            ListSeparator::Undecided => ListSeparator::Space,
            s => s,
        },
    };

    Ok(Value::List(List {
        contents,
        separator,
        brackets: matches!(args[0], Value::List(ref l) if l.brackets),
    }))
}

fn index(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let contents = args[0].list_contents();
    match contents.iter().position(|v| *v == args[1]) {
        Some(i) => Ok(Value::Number(Number::new((i + 1) as f64))),
        None => Ok(Value::Null),
    }
}

fn zip(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let lists: Vec<Vec<Value>> = match args.first() {
        Some(Value::ArgList(a)) => a.contents.iter().map(Value::list_contents).collect(),
        _ => return Err(String::from("missing argument $lists.")),
    };

    let shortest = lists.iter().map(Vec::len).min().unwrap_or(0);
    let contents = (0..shortest)
        .map(|i| {
            Value::List(List::new(
                lists.iter().map(|l| l[i].clone()).collect(),
                ListSeparator::Space,
            ))
        })
        .collect();

    Ok(Value::List(List::new(contents, ListSeparator::Comma)))
}

fn list_separator(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    Ok(Value::String(Str::unquoted(args[0].separator().name())))
}

fn is_bracketed(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    Ok(Value::Bool(
        matches!(args[0], Value::List(ref l) if l.brackets),
    ))
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

    fn num(n: f64) -> Value {
        Value::Number(Number::new(n))
    }

    fn list(values: &[f64], separator: ListSeparator) -> Value {
        Value::List(List::new(
            values.iter().map(|&n| num(n)).collect(),
            separator,
        ))
    }

    fn auto() -> Value {
        Value::String(Str::unquoted("auto"))
    }

    #[test]
    fn scalars_behave_as_singleton_lists() {
        with_ctx(|ctx| {
            assert_eq!(length(&[num(5.0)], ctx).unwrap(), num(1.0));
            assert_eq!(nth(&[num(5.0), num(1.0)], ctx).unwrap(), num(5.0));
        });
    }

    #[test]
    fn join_resolves_auto_separator() {
        with_ctx(|ctx| {
            let joined = join(
                &[
                    list(&[1.0, 2.0], ListSeparator::Comma),
                    list(&[3.0], ListSeparator::Space),
                    auto(),
                    auto(),
                ],
                ctx,
            )
            .unwrap();
            let Value::List(ref l) = joined else {
                panic!("expected list");
            };
            assert_eq!(l.separator, ListSeparator::Comma);
            assert_eq!(l.contents.len(), 3);
        });
    }

    #[test]
    fn append_keeps_the_receiver_separator() {
        with_ctx(|ctx| {
            let appended = append(
                &[list(&[1.0, 2.0], ListSeparator::Comma), num(3.0), auto()],
                ctx,
            )
            .unwrap();
            let Value::List(ref l) = appended else {
                panic!("expected list");
            };
            assert_eq!(l.separator, ListSeparator::Comma);
            assert_eq!(l.contents.len(), 3);
        });
    }

    #[test]
    fn index_uses_structural_equality() {
        with_ctx(|ctx| {
            let l = list(&[10.0, 20.0, 30.0], ListSeparator::Space);
            assert_eq!(index(&[l.clone(), num(20.0)], ctx).unwrap(), num(2.0));
            assert_eq!(index(&[l, num(99.0)], ctx).unwrap(), Value::Null);
        });
    }
}
