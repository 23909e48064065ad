//! Numeric builtins.

use crate::context::EvalContext;
use crate::functions::{number_arg, BuiltinDef};
use crate::value::number::{fuzzy_round, Number};
use crate::value::Value;

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "abs",
            signature: "abs($number)",
            function: abs,
        },
        BuiltinDef {
            name: "ceil",
            signature: "ceil($number)",
            function: ceil,
        },
        BuiltinDef {
            name: "floor",
            signature: "floor($number)",
            function: floor,
        },
        BuiltinDef {
            name: "round",
            signature: "round($number)",
            function: round,
        },
        BuiltinDef {
            name: "max",
            signature: "max($numbers...)",
            function: max,
        },
        BuiltinDef {
            name: "min",
            signature: "min($numbers...)",
            function: min,
        },
        BuiltinDef {
            name: "percentage",
            signature: "percentage($number)",
            function: percentage,
        },
        BuiltinDef {
            name: "comparable",
            signature: "comparable($number1, $number2)",
            function: comparable,
        },
        BuiltinDef {
            name: "unit",
            signature: "unit($number)",
            function: unit,
        },
        BuiltinDef {
            name: "unitless",
            signature: "unitless($number)",
            function: unitless,
        },
    ]
}

fn map_magnitude(
    args: &[Value],
    f: impl FnOnce(f64) -> f64,
) -> Result<Value, String> {
    let n = number_arg(args, 0, "number")?;
    Ok(Value::Number(Number {
        value: f(n.value),
        numerator_units: n.numerator_units.clone(),
        denominator_units: n.denominator_units.clone(),
    }))
}

fn abs(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    map_magnitude(args, f64::abs)
}

fn ceil(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    map_magnitude(args, f64::ceil)
}

fn floor(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    map_magnitude(args, f64::floor)
}

fn round(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    map_magnitude(args, fuzzy_round)
}

fn extreme(args: &[Value], smallest: bool) -> Result<Value, String> {
    let candidates = match args.first() {
        Some(Value::ArgList(a)) => &a.contents,
        _ => return Err(String::from("missing argument $numbers.")),
    };
    if candidates.is_empty() {
        return Err(String::from("At least one argument must be passed."));
    }

    let mut best: Option<&Number> = None;
    for value in candidates {
        let Value::Number(n) = value else {
            return Err(format!("{} is not a number.", value.inspect()));
        };
        best = match best {
            None => Some(n),
            Some(b) => {
                let ordering = b
                    .compare(n)
                    .ok_or_else(|| format!("incompatible units {} and {}.", b, n))?;
                if (ordering == std::cmp::Ordering::Greater) == smallest {
                    Some(n)
                } else {
                    Some(b)
                }
            }
        };
    }

    Ok(Value::Number(best.expect("non-empty checked").clone()))
}

fn max(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    extreme(args, false)
}

fn min(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    extreme(args, true)
}

fn percentage(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let n = number_arg(args, 0, "number")?;
    if !n.is_unitless() {
        return Err(format!("$number: expected {n} to have no units."));
    }
    Ok(Value::Number(Number::with_unit(n.value * 100.0, "%")))
}

fn comparable(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let a = number_arg(args, 0, "number1")?;
    let b = number_arg(args, 1, "number2")?;
    Ok(Value::Bool(a.is_comparable_to(b)))
}

fn unit(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let n = number_arg(args, 0, "number")?;
    Ok(Value::String(crate::value::Str::quoted(n.unit_string())))
}

fn unitless(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let n = number_arg(args, 0, "number")?;
    Ok(Value::Bool(n.is_unitless()))
}
