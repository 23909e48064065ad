//! Color builtins: constructors, channel accessors, and operations.

use crate::context::EvalContext;
use crate::functions::{
    alpha_value, channel, color_arg, fraction, number_arg, BuiltinDef,
};
use crate::value::{Color, Number, Value};

pub(crate) fn declarations() -> Vec<BuiltinDef> {
    vec![
        BuiltinDef {
            name: "rgb",
            signature: "rgb($red, $green: null, $blue: null, $alpha: null)",
            function: rgb,
        },
        BuiltinDef {
            name: "rgba",
            signature: "rgba($red, $green: null, $blue: null, $alpha: null)",
            function: rgb,
        },
        BuiltinDef {
            name: "hsl",
            signature: "hsl($hue, $saturation, $lightness, $alpha: 1)",
            function: hsl,
        },
        BuiltinDef {
            name: "hsla",
            signature: "hsla($hue, $saturation, $lightness, $alpha: 1)",
            function: hsl,
        },
        BuiltinDef {
            name: "hwb",
            signature: "hwb($hue, $whiteness, $blackness, $alpha: 1)",
            function: hwb,
        },
        BuiltinDef {
            name: "red",
            signature: "red($color)",
            function: red,
        },
        BuiltinDef {
            name: "green",
            signature: "green($color)",
            function: green,
        },
        BuiltinDef {
            name: "blue",
            signature: "blue($color)",
            function: blue,
        },
        BuiltinDef {
            name: "hue",
            signature: "hue($color)",
            function: hue,
        },
        BuiltinDef {
            name: "saturation",
            signature: "saturation($color)",
            function: saturation,
        },
        BuiltinDef {
            name: "lightness",
            signature: "lightness($color)",
            function: lightness,
        },
        BuiltinDef {
            name: "whiteness",
            signature: "whiteness($color)",
            function: whiteness,
        },
        BuiltinDef {
            name: "blackness",
            signature: "blackness($color)",
            function: blackness,
        },
        BuiltinDef {
            name: "alpha",
            signature: "alpha($color)",
            function: alpha,
        },
        BuiltinDef {
            name: "opacity",
            signature: "opacity($color)",
            function: alpha,
        },
        BuiltinDef {
            name: "mix",
            signature: "mix($color1, $color2, $weight: 50%)",
            function: mix,
        },
        BuiltinDef {
            name: "lighten",
            signature: "lighten($color, $amount)",
            function: lighten,
        },
        BuiltinDef {
            name: "darken",
            signature: "darken($color, $amount)",
            function: darken,
        },
        BuiltinDef {
            name: "saturate",
            signature: "saturate($color, $amount)",
            function: saturate,
        },
        BuiltinDef {
            name: "desaturate",
            signature: "desaturate($color, $amount)",
            function: desaturate,
        },
        BuiltinDef {
            name: "grayscale",
            signature: "grayscale($color)",
            function: grayscale,
        },
        BuiltinDef {
            name: "complement",
            signature: "complement($color)",
            function: complement,
        },
        BuiltinDef {
            name: "invert",
            signature: "invert($color, $weight: 100%)",
            function: invert,
        },
        BuiltinDef {
            name: "adjust-hue",
            signature: "adjust-hue($color, $degrees)",
            function: adjust_hue,
        },
        BuiltinDef {
            name: "opacify",
            signature: "opacify($color, $amount)",
            function: opacify,
        },
        BuiltinDef {
            name: "fade-in",
            signature: "fade-in($color, $amount)",
            function: opacify,
        },
        BuiltinDef {
            name: "transparentize",
            signature: "transparentize($color, $amount)",
            function: transparentize,
        },
        BuiltinDef {
            name: "fade-out",
            signature: "fade-out($color, $amount)",
            function: transparentize,
        },
        BuiltinDef {
            name: "change-color",
            signature: "change-color($color, $kwargs...)",
            function: change_color,
        },
        BuiltinDef {
            name: "adjust-color",
            signature: "adjust-color($color, $kwargs...)",
            function: adjust_color,
        },
    ]
}

/// Shared implementation of `rgb()`/`rgba()`: either three channels and an
/// optional alpha, or a color plus an alpha.
fn rgb(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    match (&args[0], &args[1], &args[2], &args[3]) {
        // rgba($color, $alpha)
        (Value::Color(c), a, Value::Null, Value::Null) if !matches!(a, Value::Null) => {
            Ok(Value::Color(c.with_alpha(alpha_value(a, "alpha")?)))
        }

        (r, g, b, a) => {
            let red = channel(r, "red")?;
            let green = channel(g, "green")?;
            let blue = channel(b, "blue")?;
            let alpha = match a {
                Value::Null => 1.0,
                other => alpha_value(other, "alpha")?,
            };
            Ok(Value::Color(Color::from_rgba(red, green, blue, alpha)))
        }
    }
}

fn hsl(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let hue = number_arg(args, 0, "hue")?.value;
    let saturation = fraction(&args[1], "saturation")?;
    let lightness = fraction(&args[2], "lightness")?;
    let alpha = alpha_value(&args[3], "alpha")?;
    Ok(Value::Color(Color::from_hsla(
        hue, saturation, lightness, alpha,
    )))
}

fn hwb(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let hue = number_arg(args, 0, "hue")?.value;
    let whiteness = fraction(&args[1], "whiteness")?;
    let blackness = fraction(&args[2], "blackness")?;
    let alpha = alpha_value(&args[3], "alpha")?;
    Ok(Value::Color(Color::from_hwba(
        hue, whiteness, blackness, alpha,
    )))
}

fn red(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::new(c.rgb8().0 as f64)))
}

fn green(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::new(c.rgb8().1 as f64)))
}

fn blue(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::new(c.rgb8().2 as f64)))
}

fn hue(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::with_unit(c.hue(), "deg")))
}

fn saturation(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::with_unit(c.saturation() * 100.0, "%")))
}

fn lightness(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::with_unit(c.lightness() * 100.0, "%")))
}

fn whiteness(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::with_unit(c.whiteness() * 100.0, "%")))
}

fn blackness(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::with_unit(c.blackness() * 100.0, "%")))
}

fn alpha(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Number(Number::new(c.alpha())))
}

fn mix(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c1 = color_arg(args, 0, "color1")?;
    let c2 = color_arg(args, 1, "color2")?;
    let weight = fraction(&args[2], "weight")?;
    Ok(Value::Color(c1.mix(c2, weight)))
}

fn adjust_lightness(args: &[Value], sign: f64) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    let amount = fraction(&args[1], "amount")?;
    Ok(Value::Color(Color::from_hsla(
        c.hue(),
        c.saturation(),
        (c.lightness() + sign * amount).clamp(0.0, 1.0),
        c.alpha(),
    )))
}

fn lighten(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    adjust_lightness(args, 1.0)
}

fn darken(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    adjust_lightness(args, -1.0)
}

fn adjust_saturation(args: &[Value], sign: f64) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    let amount = fraction(&args[1], "amount")?;
    Ok(Value::Color(Color::from_hsla(
        c.hue(),
        (c.saturation() + sign * amount).clamp(0.0, 1.0),
        c.lightness(),
        c.alpha(),
    )))
}

fn saturate(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    adjust_saturation(args, 1.0)
}

fn desaturate(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    adjust_saturation(args, -1.0)
}

fn grayscale(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    // A number passes through so `grayscale()` keeps working as a plain
    // CSS filter function.
    if let Some(Value::Number(n)) = args.first() {
        return Ok(Value::String(crate::value::Str::unquoted(format!(
            "grayscale({n})"
        ))));
    }
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Color(Color::from_hsla(
        c.hue(),
        0.0,
        c.lightness(),
        c.alpha(),
    )))
}

fn complement(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    Ok(Value::Color(Color::from_hsla(
        c.hue() + 180.0,
        c.saturation(),
        c.lightness(),
        c.alpha(),
    )))
}

fn invert(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    if let Some(Value::Number(n)) = args.first() {
        return Ok(Value::String(crate::value::Str::unquoted(format!(
            "invert({n})"
        ))));
    }
    let c = color_arg(args, 0, "color")?;
    let weight = fraction(&args[1], "weight")?;

    let inverse = c.with_channels(
        255.0 - c.red(),
        255.0 - c.green(),
        255.0 - c.blue(),
    );
    Ok(Value::Color(inverse.mix(c, weight)))
}

fn adjust_hue(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    let degrees = number_arg(args, 1, "degrees")?.value;
    Ok(Value::Color(Color::from_hsla(
        c.hue() + degrees,
        c.saturation(),
        c.lightness(),
        c.alpha(),
    )))
}

fn opacify(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    let amount = fraction(&args[1], "amount")?;
    Ok(Value::Color(c.with_alpha(c.alpha() + amount)))
}

fn transparentize(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?;
    let amount = fraction(&args[1], "amount")?;
    Ok(Value::Color(c.with_alpha(c.alpha() - amount)))
}

/// The HSL/RGB keyword arguments shared by `change-color` and
/// `adjust-color`.
struct ColorKeywords {
    red: Option<f64>,
    green: Option<f64>,
    blue: Option<f64>,
    hue: Option<f64>,
    saturation: Option<f64>,
    lightness: Option<f64>,
    alpha: Option<f64>,
}

fn parse_color_keywords(args: &[Value]) -> Result<ColorKeywords, String> {
    let keywords = match args.get(1) {
        Some(Value::ArgList(a)) => {
            if !a.contents.is_empty() {
                return Err(String::from(
                    "Only one positional argument is allowed. All other arguments must be passed by name.",
                ));
            }
            a.keywords.access().to_vec()
        }
        _ => Vec::new(),
    };

    let mut parsed = ColorKeywords {
        red: None,
        green: None,
        blue: None,
        hue: None,
        saturation: None,
        lightness: None,
        alpha: None,
    };

    for (name, value) in &keywords {
        match name.as_str() {
            "red" => parsed.red = Some(channel(value, "red")?),
            "green" => parsed.green = Some(channel(value, "green")?),
            "blue" => parsed.blue = Some(channel(value, "blue")?),
            "hue" => parsed.hue = Some(number_arg(&[value.clone()], 0, "hue")?.value),
            "saturation" => parsed.saturation = Some(alpha_value(value, "saturation")?),
            "lightness" => parsed.lightness = Some(alpha_value(value, "lightness")?),
            "alpha" => parsed.alpha = Some(alpha_value(value, "alpha")?),
            other => return Err(format!("No argument named ${other}.")),
        }
    }

    let has_rgb = parsed.red.is_some() || parsed.green.is_some() || parsed.blue.is_some();
    let has_hsl =
        parsed.hue.is_some() || parsed.saturation.is_some() || parsed.lightness.is_some();
    if has_rgb && has_hsl {
        return Err(String::from(
            "RGB parameters may not be passed along with HSL parameters.",
        ));
    }

    Ok(parsed)
}

fn change_color(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?.clone();
    let kw = parse_color_keywords(args)?;

    let alpha = kw.alpha.unwrap_or_else(|| c.alpha());

    if kw.hue.is_some() || kw.saturation.is_some() || kw.lightness.is_some() {
        return Ok(Value::Color(Color::from_hsla(
            kw.hue.unwrap_or_else(|| c.hue()),
            kw.saturation.unwrap_or_else(|| c.saturation()),
            kw.lightness.unwrap_or_else(|| c.lightness()),
            alpha,
        )));
    }

    Ok(Value::Color(Color::from_rgba(
        kw.red.unwrap_or_else(|| c.red()),
        kw.green.unwrap_or_else(|| c.green()),
        kw.blue.unwrap_or_else(|| c.blue()),
        alpha,
    )))
}

fn adjust_color(args: &[Value], _ctx: &mut EvalContext<'_>) -> Result<Value, String> {
    let c = color_arg(args, 0, "color")?.clone();
    let kw = parse_color_keywords(args)?;

    let alpha = (c.alpha() + kw.alpha.unwrap_or(0.0)).clamp(0.0, 1.0);

    if kw.hue.is_some() || kw.saturation.is_some() || kw.lightness.is_some() {
        return Ok(Value::Color(Color::from_hsla(
            c.hue() + kw.hue.unwrap_or(0.0),
            (c.saturation() + kw.saturation.unwrap_or(0.0)).clamp(0.0, 1.0),
            (c.lightness() + kw.lightness.unwrap_or(0.0)).clamp(0.0, 1.0),
            alpha,
        )));
    }

    Ok(Value::Color(Color::from_rgba(
        c.red() + kw.red.unwrap_or(0.0),
        c.green() + kw.green.unwrap_or(0.0),
        c.blue() + kw.blue.unwrap_or(0.0),
        alpha,
    )))
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

    fn pct(n: f64) -> Value {
        Value::Number(Number::with_unit(n, "%"))
    }

    #[test]
    fn rgb_accepts_channels_and_percentages() {
        with_ctx(|ctx| {
            let c = rgb(&[num(255.0), num(0.0), num(0.0), Value::Null], ctx).unwrap();
            let Value::Color(ref c) = c else { panic!("expected color") };
            assert_eq!(c.rgb8(), (255, 0, 0));

            let c = rgb(&[pct(100.0), pct(0.0), pct(50.0), Value::Null], ctx).unwrap();
            let Value::Color(ref c) = c else { panic!("expected color") };
            assert_eq!(c.rgb8(), (255, 0, 128));
        });
    }

    #[test]
    fn rgba_overload_takes_color_and_alpha() {
        with_ctx(|ctx| {
            let base = Value::Color(Color::from_rgba(10.0, 20.0, 30.0, 1.0));
            let c = rgb(&[base, num(0.5), Value::Null, Value::Null], ctx).unwrap();
            let Value::Color(ref c) = c else { panic!("expected color") };
            assert_eq!(c.rgb8(), (10, 20, 30));
            assert!((c.alpha() - 0.5).abs() < 1e-9);
        });
    }

    #[test]
    fn lighten_and_darken_move_lightness() {
        with_ctx(|ctx| {
            let red = Value::Color(Color::from_rgba(255.0, 0.0, 0.0, 1.0));
            let lighter = lighten(&[red.clone(), pct(20.0)], ctx).unwrap();
            let Value::Color(ref l) = lighter else { panic!("expected color") };
            assert!(l.lightness() > 0.5);

            let darker = darken(&[red, pct(20.0)], ctx).unwrap();
            let Value::Color(ref d) = darker else { panic!("expected color") };
            assert!(d.lightness() < 0.5);
        });
    }

    #[test]
    fn grayscale_passes_numbers_through() {
        with_ctx(|ctx| {
            let out = grayscale(&[num(0.4)], ctx).unwrap();
            assert_eq!(
                out,
                Value::String(crate::value::Str::unquoted("grayscale(0.4)"))
            );
        });
    }

    #[test]
    fn change_color_rejects_mixed_spaces() {
        with_ctx(|ctx| {
            use crate::value::{ArgList, Keywords, ListSeparator};
            use std::rc::Rc;

            let kwargs = Value::ArgList(ArgList {
                contents: Vec::new(),
                separator: ListSeparator::Comma,
                keywords: Rc::new(Keywords::new(vec![
                    (String::from("red"), num(10.0)),
                    (String::from("hue"), num(10.0)),
                ])),
            });
            let c = Value::Color(Color::from_rgba(0.0, 0.0, 0.0, 1.0));
            assert!(change_color(&[c, kwargs], ctx).is_err());
        });
    }
}
