//! Numbers with units, and the fuzzy arithmetic the language defines.
//!
//! Sass reports numbers with `PRECISION` decimal digits, and two numbers
//! closer together than half an ulp of that precision are equal.  Every
//! comparison in the crate goes through the `fuzzy_*` helpers here so the
//! tolerance is applied in exactly one place.

use std::fmt;

use float_cmp::approx_eq;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// The number of decimal digits numbers are emitted with.
pub const PRECISION: usize = 10;

/// The equality tolerance: `1 / (10 · 10^PRECISION)`.
pub const EPSILON: f64 = 1e-11;

pub fn fuzzy_eq(a: f64, b: f64) -> bool {
    approx_eq!(f64, a, b, epsilon = EPSILON)
}

pub fn fuzzy_lt(a: f64, b: f64) -> bool {
    a < b && !fuzzy_eq(a, b)
}

pub fn fuzzy_le(a: f64, b: f64) -> bool {
    a < b || fuzzy_eq(a, b)
}

/// Rounds half away from zero, but snaps values within the tolerance of an
/// integer to that integer first.
pub fn fuzzy_round(value: f64) -> f64 {
    if value > 0.0 {
        if fuzzy_lt(value % 1.0, 0.5) {
            value.floor()
        } else {
            value.ceil()
        }
    } else if fuzzy_le(value % 1.0, -0.5) {
        value.floor()
    } else {
        value.ceil()
    }
}

/// The integer a value fuzzily equals, if any.
pub fn fuzzy_as_int(value: f64) -> Option<i64> {
    let rounded = value.round();
    if fuzzy_eq(value, rounded) {
        Some(rounded as i64)
    } else {
        None
    }
}

/// Formats a magnitude with up to [`PRECISION`] decimal digits, trimming
/// trailing zeros and the decimal point itself when nothing follows it.
pub fn format_magnitude(value: f64) -> String {
    if let Some(int) = fuzzy_as_int(value) {
        return int.to_string();
    }

    let mut s = format!("{:.*}", PRECISION, value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Dimensions that units convert within.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Dimension {
    Length,
    Angle,
    Time,
    Frequency,
    Resolution,
}

/// Factor tables: multiplying a magnitude in the keyed unit by the factor
/// yields the dimension's base unit (px, deg, s, Hz, dpi).
static CONVERSIONS: Lazy<HashMap<&'static str, (Dimension, f64)>> = Lazy::new(|| {
    use Dimension::*;

    let mut m = HashMap::new();
    m.insert("px", (Length, 1.0));
    m.insert("cm", (Length, 96.0 / 2.54));
    m.insert("mm", (Length, 96.0 / 25.4));
    m.insert("q", (Length, 96.0 / 101.6));
    m.insert("in", (Length, 96.0));
    m.insert("pt", (Length, 96.0 / 72.0));
    m.insert("pc", (Length, 16.0));

    m.insert("deg", (Angle, 1.0));
    m.insert("grad", (Angle, 0.9));
    m.insert("rad", (Angle, 180.0 / std::f64::consts::PI));
    m.insert("turn", (Angle, 360.0));

    m.insert("s", (Time, 1.0));
    m.insert("ms", (Time, 0.001));

    m.insert("hz", (Frequency, 1.0));
    m.insert("khz", (Frequency, 1000.0));

    m.insert("dpi", (Resolution, 1.0));
    m.insert("dpcm", (Resolution, 2.54));
    m.insert("dppx", (Resolution, 96.0));

    m
});

/// The factor converting a magnitude in `from` units to `to` units, if the
/// two are compatible.
fn conversion_factor(from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }

    let (from_dim, from_factor) = CONVERSIONS.get(from.to_ascii_lowercase().as_str())?;
    let (to_dim, to_factor) = CONVERSIONS.get(to.to_ascii_lowercase().as_str())?;
    if from_dim != to_dim {
        return None;
    }

    Some(from_factor / to_factor)
}

/// A SassScript number: a magnitude and two unit lists.
///
/// `5px` has numerator units `[px]`; `5px/s` has `[px]` over `[s]`.
/// Multiplication and division combine the lists and cancel compatible
/// units; addition and comparison require the operands to be coercible to a
/// common unit.
#[derive(Debug, Clone)]
pub struct Number {
    pub value: f64,
    pub numerator_units: Vec<String>,
    pub denominator_units: Vec<String>,
}

impl Number {
    pub fn new(value: f64) -> Number {
        Number {
            value,
            numerator_units: Vec::new(),
            denominator_units: Vec::new(),
        }
    }

    pub fn with_unit(value: f64, unit: impl Into<String>) -> Number {
        Number {
            value,
            numerator_units: vec![unit.into()],
            denominator_units: Vec::new(),
        }
    }

    pub fn is_unitless(&self) -> bool {
        self.numerator_units.is_empty() && self.denominator_units.is_empty()
    }

    pub fn is_int(&self) -> bool {
        fuzzy_as_int(self.value).is_some()
    }

    pub fn as_int(&self) -> Option<i64> {
        fuzzy_as_int(self.value)
    }

    /// The unit suffix as written after the magnitude: `px`, `px/s`,
    /// `px*em/s`.  Empty for unitless numbers.
    pub fn unit_string(&self) -> String {
        if self.is_unitless() {
            return String::new();
        }

        let numer = self.numerator_units.join("*");
        if self.denominator_units.is_empty() {
            numer
        } else if self.numerator_units.is_empty() {
            format!("/{}", self.denominator_units.join("*"))
        } else {
            format!("{numer}/{}", self.denominator_units.join("*"))
        }
    }

    /// Whether this number's units can be converted to `other`'s.
    pub fn is_comparable_to(&self, other: &Number) -> bool {
        self.is_unitless() || other.is_unitless() || self.coerce_to_units(other).is_some()
    }

    /// This number's magnitude expressed in `other`'s units, if compatible.
    fn coerce_to_units(&self, other: &Number) -> Option<f64> {
        if self.numerator_units == other.numerator_units
            && self.denominator_units == other.denominator_units
        {
            return Some(self.value);
        }

        if self.numerator_units.len() != other.numerator_units.len()
            || self.denominator_units.len() != other.denominator_units.len()
        {
            return None;
        }

        let mut value = self.value;

        let mut other_numer: Vec<&str> =
            other.numerator_units.iter().map(String::as_str).collect();
        for unit in &self.numerator_units {
            let i = other_numer
                .iter()
                .position(|o| conversion_factor(unit, o).is_some())?;
            value *= conversion_factor(unit, other_numer.remove(i)).unwrap();
        }

        let mut other_denom: Vec<&str> =
            other.denominator_units.iter().map(String::as_str).collect();
        for unit in &self.denominator_units {
            let i = other_denom
                .iter()
                .position(|o| conversion_factor(unit, o).is_some())?;
            value /= conversion_factor(unit, other_denom.remove(i)).unwrap();
        }

        Some(value)
    }

    /// Both magnitudes on a common unit basis, for addition and comparison.
    ///
    /// A unitless operand adopts the other's units.  `None` when the units
    /// are incompatible.
    fn common_basis(&self, other: &Number) -> Option<(f64, f64)> {
        if self.is_unitless() || other.is_unitless() {
            return Some((self.value, other.value));
        }
        other.coerce_to_units(self).map(|o| (self.value, o))
    }

    /// The units the result of `self op other` carries for addition-like
    /// operations: whichever operand has units wins.
    fn result_units(&self, other: &Number) -> (Vec<String>, Vec<String>) {
        if self.is_unitless() {
            (
                other.numerator_units.clone(),
                other.denominator_units.clone(),
            )
        } else {
            (self.numerator_units.clone(), self.denominator_units.clone())
        }
    }

    pub fn add(&self, other: &Number) -> Option<Number> {
        let (a, b) = self.common_basis(other)?;
        let (numer, denom) = self.result_units(other);
        Some(Number {
            value: a + b,
            numerator_units: numer,
            denominator_units: denom,
        })
    }

    pub fn sub(&self, other: &Number) -> Option<Number> {
        let (a, b) = self.common_basis(other)?;
        let (numer, denom) = self.result_units(other);
        Some(Number {
            value: a - b,
            numerator_units: numer,
            denominator_units: denom,
        })
    }

    pub fn mul(&self, other: &Number) -> Number {
        self.multiply_units(
            self.value * other.value,
            other.numerator_units.clone(),
            other.denominator_units.clone(),
        )
    }

    pub fn div(&self, other: &Number) -> Number {
        // Dividing swaps the divisor's unit lists.
        self.multiply_units(
            self.value / other.value,
            other.denominator_units.clone(),
            other.numerator_units.clone(),
        )
    }

    pub fn rem(&self, other: &Number) -> Option<Number> {
        let (a, b) = self.common_basis(other)?;
        let (numer, denom) = self.result_units(other);

        // Sass defines `%` with the sign of the dividend adjusted toward
        // the divisor, like Ruby's modulo.
        let mut result = a % b;
        if result != 0.0 && (result < 0.0) != (b < 0.0) {
            result += b;
        }

        Some(Number {
            value: result,
            numerator_units: numer,
            denominator_units: denom,
        })
    }

    /// Combines unit lists for multiplication, cancelling compatible units
    /// between numerator and denominator.
    fn multiply_units(
        &self,
        mut value: f64,
        other_numer: Vec<String>,
        other_denom: Vec<String>,
    ) -> Number {
        let mut numer = Vec::new();
        let mut denom = self.denominator_units.clone();
        let mut other_denom = other_denom;

        for unit in &self.numerator_units {
            if let Some(i) = other_denom
                .iter()
                .position(|o| conversion_factor(unit, o).is_some())
            {
                value *= conversion_factor(unit, &other_denom.remove(i)).unwrap();
            } else {
                numer.push(unit.clone());
            }
        }

        for unit in other_numer {
            if let Some(i) = denom
                .iter()
                .position(|o| conversion_factor(&unit, o).is_some())
            {
                value /= conversion_factor(&unit, &denom.remove(i)).unwrap();
            } else {
                numer.push(unit);
            }
        }

        denom.extend(other_denom);
        Number {
            value,
            numerator_units: numer,
            denominator_units: denom,
        }
    }

    /// Fuzzy comparison after unit coercion.  `None` for incompatible
    /// units.
    pub fn compare(&self, other: &Number) -> Option<std::cmp::Ordering> {
        let (a, b) = self.common_basis(other)?;
        if fuzzy_eq(a, b) {
            Some(std::cmp::Ordering::Equal)
        } else {
            a.partial_cmp(&b)
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        // Unit mismatch makes numbers unequal rather than an error, except
        // that unitless compares against anything.
        matches!(self.compare(other), Some(std::cmp::Ordering::Equal))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_magnitude(self.value), self.unit_string())
    }
}
