//! The evaluator's runtime value universe.
//!
//! Everything SassScript computes is a [`Value`].  Equality is structural
//! throughout: numbers compare with unit coercion and the fuzzy tolerance,
//! strings compare by text regardless of quoting, and maps compare by
//! entries regardless of order.

pub mod color;
pub mod list;
pub mod map;
pub mod number;

use std::fmt::Write;
use std::rc::Rc;

use crate::callable::Callable;

pub use self::color::Color;
pub use self::list::{List, ListSeparator};
pub use self::map::Map;
pub use self::number::Number;

/// A string value: text plus whether it was quoted.
#[derive(Debug, Clone)]
pub struct Str {
    pub text: String,
    pub quoted: bool,
}

impl Str {
    pub fn quoted(text: impl Into<String>) -> Str {
        Str {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn unquoted(text: impl Into<String>) -> Str {
        Str {
            text: text.into(),
            quoted: false,
        }
    }
}

/// The keyword arguments attached to an argument list, with the flag that
/// records whether the callee ever looked at them.  When a callable with a
/// rest parameter never touches the keywords, passing unknown keywords is
/// an error at the call site.
#[derive(Debug)]
pub struct Keywords {
    pub entries: Vec<(String, Value)>,
    accessed: std::cell::Cell<bool>,
}

impl Keywords {
    pub fn new(entries: Vec<(String, Value)>) -> Keywords {
        Keywords {
            entries,
            accessed: std::cell::Cell::new(false),
        }
    }

    /// Marks the keywords as observed and returns them.
    pub fn access(&self) -> &[(String, Value)] {
        self.accessed.set(true);
        &self.entries
    }

    pub fn were_accessed(&self) -> bool {
        self.accessed.get()
    }
}

/// The value bound to a rest parameter: a list plus keyword arguments.
#[derive(Debug, Clone)]
pub struct ArgList {
    pub contents: Vec<Value>,
    pub separator: ListSeparator,
    pub keywords: Rc<Keywords>,
}

/// A first-class function.
#[derive(Debug, Clone)]
pub struct SassFunction {
    pub(crate) callable: Rc<Callable>,
}

impl SassFunction {
    /// The function's declared name.
    pub fn name(&self) -> &str {
        self.callable.name()
    }
}

/// A first-class mixin.
#[derive(Debug, Clone)]
pub struct SassMixin {
    pub(crate) callable: Rc<Callable>,
}

impl SassMixin {
    /// The mixin's declared name.
    pub fn name(&self) -> &str {
        self.callable.name()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Color(Color),
    String(Str),
    List(List),
    Map(Map),
    ArgList(ArgList),
    Function(SassFunction),
    Mixin(SassMixin),
}

impl Value {
    pub const TRUE: Value = Value::Bool(true);
    pub const FALSE: Value = Value::Bool(false);

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(*self, Value::Null | Value::Bool(false))
    }

    /// The name `type-of()` reports.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Color(_) => "color",
            Value::String(_) => "string",
            Value::List(_) | Value::ArgList(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Mixin(_) => "mixin",
        }
    }

    /// Whether the value serializes to nothing in CSS output.
    pub fn is_blank(&self) -> bool {
        match *self {
            Value::Null => true,
            Value::List(ref l) => !l.brackets && l.contents.iter().all(Value::is_blank),
            Value::ArgList(ref a) => a.contents.iter().all(Value::is_blank),
            _ => false,
        }
    }

    /// This value viewed as a list, the way `@each` and the list builtins
    /// see it: lists are themselves, maps are lists of `(key value)`
    /// pairs, and anything else is a single-element list.
    pub fn list_contents(&self) -> Vec<Value> {
        match *self {
            Value::List(ref l) => l.contents.clone(),
            Value::ArgList(ref a) => a.contents.clone(),
            Value::Map(ref m) => m
                .iter()
                .map(|(k, v)| {
                    Value::List(List::new(vec![k.clone(), v.clone()], ListSeparator::Space))
                })
                .collect(),
            ref other => vec![other.clone()],
        }
    }

    /// The separator `list-separator()` reports for this value.
    pub fn separator(&self) -> ListSeparator {
        match *self {
            Value::List(ref l) => l.separator,
            Value::ArgList(ref a) => a.separator,
            Value::Map(_) => ListSeparator::Comma,
            _ => ListSeparator::Undecided,
        }
    }

    /// Serializes this value to CSS text.
    ///
    /// Values with no CSS form (maps, functions, mixins, numbers with
    /// compound units) are an error, reported with the value's inspected
    /// form.  `Null` serializes to nothing; declarations whose whole value
    /// is null are dropped before serialization.
    pub fn to_css_string(&self, compressed: bool) -> Result<String, String> {
        let mut out = String::new();
        self.write_css(&mut out, compressed)?;
        Ok(out)
    }

    fn write_css(&self, out: &mut String, compressed: bool) -> Result<(), String> {
        match *self {
            Value::Null => Ok(()),

            Value::Bool(b) => {
                out.push_str(if b { "true" } else { "false" });
                Ok(())
            }

            Value::Number(ref n) => {
                if n.numerator_units.len() > 1 || !n.denominator_units.is_empty() {
                    return Err(format!("{} isn't a valid CSS value.", self.inspect()));
                }
                write_number(out, n, compressed);
                Ok(())
            }

            Value::Color(ref c) => {
                out.push_str(&c.to_css(compressed));
                Ok(())
            }

            Value::String(ref s) => {
                if s.quoted {
                    write_quoted(out, &s.text);
                } else {
                    out.push_str(&s.text);
                }
                Ok(())
            }

            Value::List(ref l) => {
                if l.contents.iter().all(Value::is_blank) && !l.brackets {
                    return Err(format!("{} isn't a valid CSS value.", self.inspect()));
                }
                if l.brackets {
                    out.push('[');
                }
                write_list_contents(out, &l.contents, l.separator, compressed)?;
                if l.brackets {
                    out.push(']');
                }
                Ok(())
            }

            Value::ArgList(ref a) => {
                write_list_contents(out, &a.contents, a.separator, compressed)
            }

            Value::Map(_) | Value::Function(_) | Value::Mixin(_) => {
                Err(format!("{} isn't a valid CSS value.", self.inspect()))
            }
        }
    }

    /// The value's text when embedded via interpolation: like CSS
    /// serialization, except strings lose their quotes and null produces
    /// an empty string.
    pub fn to_interpolated_string(&self) -> Result<String, String> {
        match *self {
            Value::String(ref s) => Ok(s.text.clone()),
            Value::Null => Ok(String::new()),
            _ => self.to_css_string(false),
        }
    }

    /// A developer-facing representation, used by `@debug`, `inspect()`,
    /// and error messages.  Unlike CSS serialization this never fails.
    pub fn inspect(&self) -> String {
        match *self {
            Value::Null => String::from("null"),

            Value::Bool(b) => String::from(if b { "true" } else { "false" }),

            Value::Number(ref n) => n.to_string(),

            Value::Color(ref c) => c.to_css(false),

            Value::String(ref s) => {
                if s.quoted {
                    let mut out = String::new();
                    write_quoted(&mut out, &s.text);
                    out
                } else {
                    s.text.clone()
                }
            }

            Value::List(ref l) => inspect_list(&l.contents, l.separator, l.brackets),

            Value::ArgList(ref a) => inspect_list(&a.contents, a.separator, false),

            Value::Map(ref m) => {
                let mut out = String::from("(");
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: {}", k.inspect(), v.inspect());
                }
                out.push(')');
                out
            }

            Value::Function(ref f) => format!("get-function(\"{}\")", f.callable.name()),

            Value::Mixin(ref m) => format!("get-mixin(\"{}\")", m.callable.name()),
        }
    }
}

fn inspect_list(contents: &[Value], separator: ListSeparator, brackets: bool) -> String {
    if contents.is_empty() {
        return String::from(if brackets { "[]" } else { "()" });
    }

    let sep = match separator {
        ListSeparator::Comma => ", ",
        ListSeparator::Slash => " / ",
        _ => " ",
    };

    let mut out = String::new();
    if brackets {
        out.push('[');
    }
    for (i, v) in contents.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(&v.inspect());
    }
    if contents.len() == 1 && separator == ListSeparator::Comma && !brackets {
        out.push(',');
        return format!("({out})");
    }
    if brackets {
        out.push(']');
    }
    out
}

fn write_list_contents(
    out: &mut String,
    contents: &[Value],
    separator: ListSeparator,
    compressed: bool,
) -> Result<(), String> {
    let sep = if compressed {
        separator.compressed_separator()
    } else {
        separator.separator()
    };

    let mut first = true;
    for value in contents {
        if value.is_blank() {
            continue;
        }
        if !first {
            out.push_str(sep);
        }
        first = false;
        value.write_css(out, compressed)?;
    }
    Ok(())
}

/// Writes a number's magnitude and unit; compressed style drops the zero
/// before a leading decimal point.
fn write_number(out: &mut String, n: &Number, compressed: bool) {
    let mut magnitude = number::format_magnitude(n.value);
    if compressed {
        if let Some(stripped) = magnitude.strip_prefix("0.") {
            magnitude = format!(".{stripped}");
        } else if let Some(stripped) = magnitude.strip_prefix("-0.") {
            magnitude = format!("-.{stripped}");
        }
    }
    out.push_str(&magnitude);
    out.push_str(&n.unit_string());
}

/// Quotes a string, preferring double quotes and escaping as CSS requires.
fn write_quoted(out: &mut String, text: &str) {
    if text.contains('"') && !text.contains('\'') {
        out.push('\'');
        for c in text.chars() {
            if c == '\\' {
                out.push_str("\\\\");
            } else {
                out.push(c);
            }
        }
        out.push('\'');
    } else {
        // cssparser escapes quotes, backslashes, and control characters.
        let _ = cssparser::serialize_string(text, out);
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,

            // Quoting does not participate in equality: "foo" == foo.
            (Value::String(a), Value::String(b)) => a.text == b.text,

            (Value::Map(a), Value::Map(b)) => maps_equal(a, b),

            // An empty map is indistinguishable from an empty list.
            (Value::Map(m), other) | (other, Value::Map(m)) if m.is_empty() => {
                matches!(other.as_list_view(), Some((contents, _, false)) if contents.is_empty())
            }

            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(&a.callable, &b.callable),
            (Value::Mixin(a), Value::Mixin(b)) => Rc::ptr_eq(&a.callable, &b.callable),

            (a, b) => match (a.as_list_view(), b.as_list_view()) {
                (Some((ac, asep, abr)), Some((bc, bsep, bbr))) => {
                    abr == bbr
                        && ac == bc
                        && (asep == bsep || ac.len() <= 1)
                }
                _ => false,
            },
        }
    }
}

impl Value {
    /// The list view of actual list values (not the singleton view of
    /// scalars): contents, separator, brackets.
    fn as_list_view(&self) -> Option<(&[Value], ListSeparator, bool)> {
        match *self {
            Value::List(ref l) => Some((&l.contents, l.separator, l.brackets)),
            Value::ArgList(ref a) => Some((&a.contents, a.separator, false)),
            _ => None,
        }
    }
}

fn maps_equal(a: &Map, b: &Map) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}
