//! The global builtin-function registry.
//!
//! Each area module contributes [`BuiltinDef`]s: a name, a signature in
//! Sass syntax, and a native implementation.  Implementations receive the
//! values bound to the signature's parameters in declaration order (the
//! rest parameter, when declared, arrives last as an argument list) plus
//! the evaluation context, and report errors as plain messages for the
//! evaluator to wrap with the call-site span.
//!
//! A handful of `meta` functions (`if`, `call`, `get-function`,
//! `*-exists`) need the evaluator's own state and are implemented as
//! special forms in the evaluator instead.

pub mod color;
pub mod list;
pub mod map;
pub mod math;
pub mod meta;
pub mod string;

use crate::context::EvalContext;
use crate::value::number::fuzzy_as_int;
use crate::value::{Color, Map, Number, Str, Value};

pub type BuiltinFnPtr = fn(&[Value], &mut EvalContext<'_>) -> Result<Value, String>;

pub struct BuiltinDef {
    pub name: &'static str,
    pub signature: &'static str,
    pub function: BuiltinFnPtr,
}

/// Every global builtin, in registration order.
pub fn all() -> Vec<BuiltinDef> {
    let mut defs = Vec::new();
    defs.extend(math::declarations());
    defs.extend(string::declarations());
    defs.extend(list::declarations());
    defs.extend(map::declarations());
    defs.extend(color::declarations());
    defs.extend(meta::declarations());
    defs
}

// ----- argument helpers -----

pub(crate) fn number_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a Number, String> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(n),
        Some(other) => Err(format!("${name}: {} is not a number.", other.inspect())),
        None => Err(format!("missing argument ${name}.")),
    }
}

pub(crate) fn string_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a Str, String> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("${name}: {} is not a string.", other.inspect())),
        None => Err(format!("missing argument ${name}.")),
    }
}

pub(crate) fn color_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a Color, String> {
    match args.get(i) {
        Some(Value::Color(c)) => Ok(c),
        Some(other) => Err(format!("${name}: {} is not a color.", other.inspect())),
        None => Err(format!("missing argument ${name}.")),
    }
}

pub(crate) fn map_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<Map, String> {
    match args.get(i) {
        Some(Value::Map(m)) => Ok(m.clone()),
        // An empty list doubles as an empty map.
        Some(Value::List(l)) if l.contents.is_empty() => Ok(Map::new()),
        Some(other) => Err(format!("${name}: {} is not a map.", other.inspect())),
        None => Err(format!("missing argument ${name}.")),
    }
}

pub(crate) fn int_arg(args: &[Value], i: usize, name: &str) -> Result<i64, String> {
    let number = number_arg(args, i, name)?;
    fuzzy_as_int(number.value)
        .ok_or_else(|| format!("${name}: {} is not an integer.", number))
}

/// Converts a Sass one-based (possibly negative) index into a zero-based
/// offset into a sequence of `len` elements.
pub(crate) fn sass_index(len: usize, index: i64, name: &str) -> Result<usize, String> {
    if index == 0 {
        return Err(format!("${name}: List index may not be 0."));
    }
    let adjusted = if index < 0 {
        index + len as i64
    } else {
        index - 1
    };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(format!(
            "${name}: Invalid index {index} for a list with {len} elements."
        ));
    }
    Ok(adjusted as usize)
}

/// A channel argument for `rgb()`-family functions: a plain number 0–255
/// or a percentage scaled to that range.
pub(crate) fn channel(value: &Value, name: &str) -> Result<f64, String> {
    match value {
        Value::Number(n) => {
            if n.unit_string() == "%" {
                Ok(n.value / 100.0 * 255.0)
            } else if n.is_unitless() {
                Ok(n.value)
            } else {
                Err(format!("${name}: expected {n} to have no units or \"%\"."))
            }
        }
        other => Err(format!("${name}: {} is not a number.", other.inspect())),
    }
}

/// An alpha argument: 0–1, or a percentage.
pub(crate) fn alpha_value(value: &Value, name: &str) -> Result<f64, String> {
    match value {
        Value::Number(n) => {
            if n.unit_string() == "%" {
                Ok(n.value / 100.0)
            } else if n.is_unitless() {
                Ok(n.value)
            } else {
                Err(format!("${name}: expected {n} to have no units or \"%\"."))
            }
        }
        other => Err(format!("${name}: {} is not a number.", other.inspect())),
    }
}

/// A percentage-or-fraction argument for color operations: `50%`, `0.5`,
/// and a bare `50` all mean one half.
pub(crate) fn fraction(value: &Value, name: &str) -> Result<f64, String> {
    let f = match value {
        Value::Number(n) if n.unit_string() == "%" => n.value / 100.0,
        Value::Number(n) if n.is_unitless() => {
            if n.value.abs() <= 1.0 {
                n.value
            } else {
                n.value / 100.0
            }
        }
        Value::Number(n) => {
            return Err(format!("${name}: expected {n} to have no units or \"%\"."))
        }
        other => return Err(format!("${name}: {} is not a number.", other.inspect())),
    };

    if !(0.0..=1.0).contains(&f) {
        return Err(format!("${name}: expected a value between 0 and 100%."));
    }
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn every_signature_parses_and_matches_its_name() {
        for def in all() {
            let (name, _) = parse::parse_signature(def.signature)
                .unwrap_or_else(|e| panic!("bad signature {:?}: {e}", def.signature));
            assert_eq!(name, def.name, "signature name mismatch for {}", def.name);
        }
    }

    #[test]
    fn registry_names_are_unique() {
        let defs = all();
        let mut names: Vec<_> = defs.iter().map(|d| d.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn sass_indices_are_one_based_and_wrap() {
        assert_eq!(sass_index(3, 1, "n").unwrap(), 0);
        assert_eq!(sass_index(3, 3, "n").unwrap(), 2);
        assert_eq!(sass_index(3, -1, "n").unwrap(), 2);
        assert!(sass_index(3, 0, "n").is_err());
        assert!(sass_index(3, 4, "n").is_err());
        assert!(sass_index(0, 1, "n").is_err());
    }
}
