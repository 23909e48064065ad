//! Deprecated language features and their stable identifiers.
//!
//! Every deprecation warning the compiler emits is classified by one of the
//! ids below.  Callers configure per-id policy through the
//! `silence_deprecations` / `fatal_deprecations` / `future_deprecations`
//! options; [`Deprecation::for_version`] expands a compiler version into the
//! set of ids that were already deprecated by that release.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A deprecated feature of the language.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Deprecation {
    /// Passing a string to `call()`.
    CallString,

    /// `@elseif` instead of `@else if`.
    Elseif,

    /// `@-moz-document`, except for the empty url prefix.
    MozDocument,

    /// Imports using relative canonical URLs.
    RelativeCanonical,

    /// Declaring new variables with `!global`.
    NewGlobal,

    /// Treating a number as a color channel count.
    ColorNumber,

    /// Using `/` for division outside of `calc()`.
    SlashDiv,

    /// Leading, trailing, and repeated combinators.
    BogusCombinators,

    /// Ambiguous `+` and `-` operators.
    StrictUnary,

    /// Boolean operators in `@media` queries.
    MediaLogic,

    /// `@import` rules.
    Import,

    /// A deprecation emitted by user code through `warn()`.
    UserAuthored,
}

/// All known deprecations, for iteration and id lookup.
pub const ALL: &[Deprecation] = &[
    Deprecation::CallString,
    Deprecation::Elseif,
    Deprecation::MozDocument,
    Deprecation::RelativeCanonical,
    Deprecation::NewGlobal,
    Deprecation::ColorNumber,
    Deprecation::SlashDiv,
    Deprecation::BogusCombinators,
    Deprecation::StrictUnary,
    Deprecation::MediaLogic,
    Deprecation::Import,
    Deprecation::UserAuthored,
];

impl Deprecation {
    /// The stable kebab-case identifier users configure policy with.
    pub fn id(self) -> &'static str {
        match self {
            Deprecation::CallString => "call-string",
            Deprecation::Elseif => "elseif",
            Deprecation::MozDocument => "moz-document",
            Deprecation::RelativeCanonical => "relative-canonical",
            Deprecation::NewGlobal => "new-global",
            Deprecation::ColorNumber => "color-number",
            Deprecation::SlashDiv => "slash-div",
            Deprecation::BogusCombinators => "bogus-combinators",
            Deprecation::StrictUnary => "strict-unary",
            Deprecation::MediaLogic => "media-logic",
            Deprecation::Import => "import",
            Deprecation::UserAuthored => "user-authored",
        }
    }

    /// The release in which the feature was deprecated, or `None` for
    /// deprecations that are still in the future (or, for
    /// [`Deprecation::UserAuthored`], have no version at all).
    pub fn deprecated_in(self) -> Option<Version> {
        let v = match self {
            Deprecation::CallString => "0.0.0",
            Deprecation::Elseif => "1.3.2",
            Deprecation::MozDocument => "1.7.2",
            Deprecation::RelativeCanonical => "1.14.2",
            Deprecation::NewGlobal => "1.17.2",
            Deprecation::ColorNumber => "1.23.0",
            Deprecation::SlashDiv => "1.33.0",
            Deprecation::BogusCombinators => "1.54.0",
            Deprecation::StrictUnary => "1.55.0",
            Deprecation::MediaLogic | Deprecation::Import | Deprecation::UserAuthored => {
                return None
            }
        };

        // The table above is well-formed by construction.
        Some(v.parse().unwrap())
    }

    /// Whether this deprecation is still in the future: it only warns when
    /// opted into through `future_deprecations`.
    pub fn is_future(self) -> bool {
        !matches!(self, Deprecation::UserAuthored) && self.deprecated_in().is_none()
    }

    /// Looks a deprecation up by its id.
    pub fn from_id(id: &str) -> Option<Deprecation> {
        ALL.iter().copied().find(|d| d.id() == id)
    }

    /// The set of deprecations whose deprecated-in version is at most `v`.
    pub fn for_version(v: &Version) -> HashSet<Deprecation> {
        ALL.iter()
            .copied()
            .filter(|d| matches!(d.deprecated_in(), Some(ref dv) if dv <= v))
            .collect()
    }
}

impl fmt::Display for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A `major.minor.patch` semantic version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Version, String> {
        let mut parts = s.split('.');
        let mut next = |what: &str| -> Result<u32, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {what} version in {s:?}"))?
                .parse::<u32>()
                .map_err(|_| format!("invalid {what} version in {s:?}"))
        };

        let version = Version {
            major: next("major")?,
            minor: next("minor")?,
            patch: next("patch")?,
        };

        if parts.next().is_some() {
            return Err(format!("too many components in version {s:?}"));
        }

        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for &d in ALL {
            assert_eq!(Deprecation::from_id(d.id()), Some(d));
        }
    }

    #[test]
    fn version_ordering() {
        let a: Version = "1.33.0".parse().unwrap();
        let b: Version = "1.54.0".parse().unwrap();
        let c: Version = "1.54.1".parse().unwrap();

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn version_parse_rejects_garbage() {
        assert!("1.2".parse::<Version>().is_err());
        assert!("1.2.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn for_version_is_cumulative() {
        let early = Deprecation::for_version(&"1.3.2".parse().unwrap());
        assert!(early.contains(&Deprecation::CallString));
        assert!(early.contains(&Deprecation::Elseif));
        assert!(!early.contains(&Deprecation::SlashDiv));

        let late = Deprecation::for_version(&"1.55.0".parse().unwrap());
        assert!(late.contains(&Deprecation::SlashDiv));
        assert!(late.contains(&Deprecation::StrictUnary));
        assert!(late.is_superset(&early));
    }

    #[test]
    fn future_deprecations_have_no_version() {
        assert!(Deprecation::MediaLogic.is_future());
        assert!(Deprecation::Import.is_future());
        assert!(!Deprecation::UserAuthored.is_future());
        assert!(!Deprecation::SlashDiv.is_future());
    }
}
