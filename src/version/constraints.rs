//! Version specifiers (`==`, `>=`, `~=`, …) and comma-separated specifier sets.
//!
//! A [`SpecifierSet`] admits a version when every one of its specifiers does;
//! an empty set admits everything. Matching follows PEP 440, including
//! wildcard equality (`==2.*`), compatible release (`~=2.2`), and the rule
//! that `<V` does not admit pre-releases of `V` itself.

use std::fmt;
use std::str::FromStr;

use super::{InvalidVersion, Version};

/// Comparison operator of a single specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `===` arbitrary string equality
    ArbitraryEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `~=`
    Compatible,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
}

impl Operator {
    /// Operators ordered so that longer tokens are tried first when parsing.
    const TOKENS: [(&'static str, Self); 8] = [
        ("===", Self::ArbitraryEqual),
        ("==", Self::Equal),
        ("!=", Self::NotEqual),
        ("~=", Self::Compatible),
        ("<=", Self::LessEqual),
        (">=", Self::GreaterEqual),
        ("<", Self::Less),
        (">", Self::Greater),
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArbitraryEqual => "===",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Compatible => "~=",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::Greater => ">",
        }
    }

    /// Split a leading operator token off `input`.
    fn split_prefix(input: &str) -> Option<(Self, &str)> {
        Self::TOKENS
            .iter()
            .find_map(|(token, op)| input.strip_prefix(token).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error produced when a specifier string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecifierError {
    #[error("missing comparison operator in '{0}'")]
    MissingOperator(String),
    #[error("missing version in '{0}'")]
    MissingVersion(String),
    #[error("'{0}' is not allowed with a wildcard version")]
    WildcardNotAllowed(String),
    #[error("'~=' needs at least two release segments in '{0}'")]
    CompatibleTooShort(String),
    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersion),
}

/// One `(operator, version)` pair as written in a pin file.
///
/// The version is kept as written so re-rendering shows the operator's exact
/// text; matching parses it lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub operator: Operator,
    pub version: String,
}

impl Specifier {
    /// Parse a single specifier such as `>=2.0` or `== 1.4.*`.
    pub fn parse(input: &str) -> Result<Self, SpecifierError> {
        let trimmed = input.trim();
        let (operator, rest) = Operator::split_prefix(trimmed)
            .ok_or_else(|| SpecifierError::MissingOperator(trimmed.to_string()))?;
        let version = rest.trim();
        if version.is_empty() {
            return Err(SpecifierError::MissingVersion(trimmed.to_string()));
        }

        if operator != Operator::ArbitraryEqual {
            let (bare, wildcard) = match version.strip_suffix(".*") {
                Some(bare) => (bare, true),
                None => (version, false),
            };
            if wildcard && !matches!(operator, Operator::Equal | Operator::NotEqual) {
                return Err(SpecifierError::WildcardNotAllowed(trimmed.to_string()));
            }
            let parsed = Version::parse(bare)?;
            if operator == Operator::Compatible && parsed.release().len() < 2 {
                return Err(SpecifierError::CompatibleTooShort(trimmed.to_string()));
            }
        }

        Ok(Self {
            operator,
            version: version.to_string(),
        })
    }

    /// Whether this specifier is an exact `==`/`===` pin without wildcard.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        match self.operator {
            Operator::ArbitraryEqual => true,
            Operator::Equal => !self.version.ends_with(".*"),
            _ => false,
        }
    }

    /// Evaluate the specifier against a candidate version.
    ///
    /// Returns `false` when the specifier's own version does not parse, which
    /// cannot happen for values built through [`Specifier::parse`].
    #[must_use]
    pub fn admits(&self, candidate: &Version) -> bool {
        if self.operator == Operator::ArbitraryEqual {
            return candidate.to_string() == self.version;
        }

        if let Some(prefix) = self.version.strip_suffix(".*") {
            let Ok(prefix) = Version::parse(prefix) else {
                return false;
            };
            let matches = prefix_matches(&prefix, candidate);
            return match self.operator {
                Operator::Equal => matches,
                Operator::NotEqual => !matches,
                _ => false,
            };
        }

        let Ok(spec) = Version::parse(&self.version) else {
            return false;
        };
        // Local labels only take part in comparison when the specifier names one.
        let candidate =
            if spec.local().is_none() { candidate.without_local() } else { candidate.clone() };

        match self.operator {
            Operator::Equal => candidate == spec,
            Operator::NotEqual => candidate != spec,
            Operator::LessEqual => candidate <= spec,
            Operator::GreaterEqual => candidate >= spec,
            Operator::Less => {
                candidate < spec
                    && !(!spec.is_prerelease()
                        && candidate.is_prerelease()
                        && candidate.base() == spec.base())
            }
            Operator::Greater => {
                candidate > spec
                    && !(!spec.is_postrelease()
                        && candidate.is_postrelease()
                        && candidate.base() == spec.base())
            }
            Operator::Compatible => {
                let release = spec.release();
                let prefix = Version::parse(
                    &release[..release.len() - 1]
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("."),
                );
                candidate >= spec && prefix.is_ok_and(|p| prefix_matches(&p, &candidate))
            }
            Operator::ArbitraryEqual => unreachable!("handled above"),
        }
    }
}

/// `==prefix.*` semantics: same epoch and the candidate's release starts with the prefix.
fn prefix_matches(prefix: &Version, candidate: &Version) -> bool {
    if prefix.epoch() != candidate.epoch() {
        return false;
    }
    prefix
        .release()
        .iter()
        .enumerate()
        .all(|(i, segment)| candidate.release().get(i).copied().unwrap_or(0) == *segment)
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

impl FromStr for Specifier {
    type Err = SpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered, comma-separated list of specifiers (`>=2.0,<3.0`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    #[must_use]
    pub const fn new(specifiers: Vec<Specifier>) -> Self {
        Self {
            specifiers,
        }
    }

    /// Parse `>=2.0, <3.0`; an empty or whitespace-only string is the unconstrained set.
    pub fn parse(input: &str) -> Result<Self, SpecifierError> {
        let specifiers = input
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Specifier::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(specifiers))
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Specifier> {
        self.specifiers.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specifiers.len()
    }

    /// True when every specifier admits the candidate.
    #[must_use]
    pub fn admits(&self, candidate: &Version) -> bool {
        self.specifiers.iter().all(|spec| spec.admits(candidate))
    }

    /// The version of the single exact pin (`==X`), if this set is one.
    #[must_use]
    pub fn exact_version(&self) -> Option<&str> {
        match self.specifiers.as_slice() {
            [only] if only.is_exact() => Some(only.version.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.specifiers.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

impl<'a> IntoIterator for &'a SpecifierSet {
    type Item = &'a Specifier;
    type IntoIter = std::slice::Iter<'a, Specifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.specifiers.iter()
    }
}
