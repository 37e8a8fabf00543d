//! Python package versions (PEP 440) and their ordering.
//!
//! Requirement pins, upper constraints and PyPI releases all use PEP 440
//! version strings, which are not semver: `2.31.0`, `1!2.0`, `3.0rc1`,
//! `1.0.post2`, `2.0.dev3+local`. This module parses them into a
//! [`Version`] that orders the way pip does, and [`constraints`] evaluates
//! specifiers such as `>=2.0,<3.0` against them.
//!
//! # Ordering
//!
//! For the same release segment: `dev` < `a` < `b` < `rc` < final < `post`.
//! Trailing zeros in the release are insignificant (`1.0 == 1.0.0`).
//!
//! ```rust
//! use osa_releases::version::Version;
//!
//! let a = Version::parse("2.0rc1").unwrap();
//! let b = Version::parse("2.0").unwrap();
//! let c = Version::parse("2.0.post1").unwrap();
//! assert!(a < b && b < c);
//! ```

pub mod constraints;

pub use constraints::{Operator, Specifier, SpecifierSet};

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:[-_.]?(?P<dev>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        $",
    )
    .expect("static version regex is valid")
});

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// A parsed PEP 440 version.
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

/// Error returned when a string is not a PEP 440 version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid version: '{0}'")]
pub struct InvalidVersion(pub String);

impl Version {
    /// Parse a version string, accepting the normalizations pip accepts
    /// (case-insensitive, leading `v`, `-`/`_`/`.` separators, `alpha` for `a`).
    pub fn parse(input: &str) -> Result<Self, InvalidVersion> {
        let normalized = input.trim().to_ascii_lowercase();
        let caps =
            VERSION_RE.captures(&normalized).ok_or_else(|| InvalidVersion(input.to_string()))?;

        let number = |name: &str| -> Result<Option<u64>, InvalidVersion> {
            caps.name(name)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| InvalidVersion(input.to_string())))
                .transpose()
        };

        let release = caps["release"]
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| InvalidVersion(input.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match caps.name("pre_l").map(|m| m.as_str()) {
            Some("a" | "alpha") => Some((PreRelease::Alpha, number("pre_n")?.unwrap_or(0))),
            Some("b" | "beta") => Some((PreRelease::Beta, number("pre_n")?.unwrap_or(0))),
            Some(_) => Some((PreRelease::Rc, number("pre_n")?.unwrap_or(0))),
            None => None,
        };

        let post = match (number("post_n1")?, number("post_n2")?) {
            (Some(n), _) | (None, Some(n)) => Some(n),
            // "1.0.post" (no number) means post0
            (None, None) if caps.name("post_l").is_some() => Some(0),
            (None, None) => None,
        };

        let dev = if caps.name("dev").is_some() {
            Some(number("dev_n")?.unwrap_or(0))
        } else {
            None
        };

        Ok(Self {
            epoch: number("epoch")?.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: caps.name("local").map(|m| m.as_str().replace(['-', '_'], ".")),
        })
    }

    /// The release segment (`[2, 31, 0]` for `2.31.0`).
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    #[must_use]
    pub const fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    #[must_use]
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// Same version with the local label dropped.
    #[must_use]
    pub fn without_local(&self) -> Self {
        Self {
            local: None,
            ..self.clone()
        }
    }

    /// Epoch and release only: `1!2.0rc1.post3` → `1!2.0`.
    #[must_use]
    pub fn base(&self) -> Self {
        Self {
            epoch: self.epoch,
            release: self.release.clone(),
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    fn release_cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        Ordering::Equal
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        self.dev.map_or(DevKey::Released, DevKey::Dev)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreRelease, u64),
    Final,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Released,
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.release_cmp(other))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(ToString::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{n}", phase.as_str())?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{local}")?;
        }
        Ok(())
    }
}
