//! Map builtins.

use crate::context::EvalContext;
use crate::functions::{map_arg, BuiltinDef};
use crate::value::{List, ListSeparator, Map, Value};

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "map-get",
            signature: "map-get($map, $key)",
            function: map_get,
        },
        BuiltinDef {
            name: "map-has-key",
            signature: "map-has-key($map, $key)",
            function: map_has_key,
        },
        BuiltinDef {
            name: "map-keys",
            signature: "map-keys($map)",
            function: map_keys,
        },
        BuiltinDef {
            name: "map-values",
            signature: "map-values($map)",
            function: map_values,
        },
        BuiltinDef {
            name: "map-merge",
            signature: "map-merge($map1, $map2)",
            function: map_merge,
        },
        BuiltinDef {
            name: "map-remove",
            signature: "map-remove($map, $keys...)",
            function: map_remove,
        },
        BuiltinDef {
            name: "keywords",
            signature: "keywords($args)",
            function: keywords,
        },
    ]
}

fn map_get(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let map = map_arg(args, 0, "map")?;
    Ok(map.get(&args[1]).cloned().unwrap_or(Value::Null))
}

fn map_has_key(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let map = map_arg(args, 0, "map")?;
    Ok(Value::Bool(map.contains_key(&args[1])))
}

fn map_keys(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let map = map_arg(args, 0, "map")?;
    Ok(Value::List(List::new(
        map.keys().cloned().collect(),
        ListSeparator::Comma,
    )))
}

fn map_values(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let map = map_arg(args, 0, "map")?;
    Ok(Value::List(List::new(
        map.values().cloned().collect(),
        ListSeparator::Comma,
    )))
}

fn map_merge(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let map1 = map_arg(args, 0, "map1")?;
    let map2 = map_arg(args, 1, "map2")?;
    Ok(Value::Map(map1.merge(&map2)))
}

fn map_remove(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let mut map = map_arg(args, 0, "map")?;
    let keys = match args.get(1) {
        Some(Value::ArgList(a)) => a.contents.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    for key in &keys {
        map.remove(key);
    }
    Ok(Value::Map(map))
}

/// The keyword arguments passed to a rest parameter, as a map.  Looking at
/// them counts as accessing them, which suppresses the unknown-keyword
/// error at the call site.
fn keywords(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    match args.first() {
        Some(Value::ArgList(a)) => {
            let map: Map = a
                .keywords
                .access()
                .iter()
                .map(|(name, value)| {
                    (
                        Value::String(crate::value::Str::quoted(name.clone())),
                        value.clone(),
                    )
                })
                .collect();
            Ok(Value::Map(map))
        }
        Some(other) => Err(format!("$args: {} is not an argument list.", other.inspect())),
        None => Err(String::from("missing argument $args.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceFrame;
    use crate::session::Session;
    use crate::source::{SourceFile, Span};
    use crate::syntax::Syntax;
    use crate::value::{ArgList, Keywords, Number, Str};
    use std::rc::Rc;

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

    fn sample_map() -> Value {
        let mut m = Map::new();
        m.insert(num(1.0), num(10.0));
        m.insert(num(2.0), num(20.0));
        Value::Map(m)
    }

    #[test]
    fn get_returns_null_for_missing_keys() {
        with_ctx(|ctx| {
            assert_eq!(map_get(&[sample_map(), num(1.0)], ctx).unwrap(), num(10.0));
            assert_eq!(map_get(&[sample_map(), num(9.0)], ctx).unwrap(), Value::Null);
        });
    }

    #[test]
    fn empty_list_is_an_empty_map() {
        with_ctx(|ctx| {
            let empty = Value::List(List::new(Vec::new(), ListSeparator::Undecided));
            assert_eq!(
                map_has_key(&[empty, num(1.0)], ctx).unwrap(),
                Value::Bool(false)
            );
        });
    }

    #[test]
    fn keywords_marks_access() {
        with_ctx(|ctx| {
            let kw = Rc::new(Keywords::new(vec![(
                String::from("size"),
                num(3.0),
            )]));
            let arglist = Value::ArgList(ArgList {
                contents: Vec::new(),
                separator: ListSeparator::Comma,
                keywords: kw.clone(),
            });

            assert!(!kw.were_accessed());
            let result = keywords(&[arglist], ctx).unwrap();
            assert!(kw.were_accessed());

            let Value::Map(ref m) = result else {
                panic!("expected map");
            };
            assert_eq!(
                m.get(&Value::String(Str::quoted("size"))),
                Some(&num(3.0))
            );
        });
    }
}
