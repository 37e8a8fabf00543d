//! Requirements-dialect pin files (`global-requirement-pins.txt`, `upper-constraints.txt`).
//!
//! One package per line, with optional extras, specifiers, environment marker
//! and trailing comment:
//!
//! ```text
//! # pinned for the stable branch
//! requests[security] >= 2.0 , < 3   # inline comments are fine
//! pyOpenSSL===23.2.0;python_version>='3.8'
//! -c https://opendev.org/openstack/requirements/raw/branch/master/upper-constraints.txt
//! ```
//!
//! [`RequirementsFile`] keeps every original line, so an unmodified file
//! renders back byte-for-byte. Pin names are normalized the way pip compares
//! them (lower-case, runs of `-`, `_` and `.` collapsed into `-`), and a name
//! listed twice keeps its last occurrence.

use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::core::ReleaseError;
use crate::version::SpecifierSet;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$")
        .expect("static requirement regex is valid")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#").expect("static comment regex is valid"));

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("static separator regex is valid"));

static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[?&]h=(?P<ref>[^\s&#]+)",
        r"/raw/commit/(?P<ref>[^/\s]+)/",
        r"/raw/branch/(?P<ref>[^\s]+?)/upper-constraints\.txt",
        r"/constraints/upper/(?P<ref>[^\s/#]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static reference regex is valid"))
    .collect()
});

/// How malformed lines are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Abort on the first malformed line.
    Strict,
    /// Skip malformed lines with a warning and keep going.
    #[default]
    Lenient,
}

/// One pinned package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    /// Normalized name (`PyOpenSSL` → `pyopenssl`, `oslo_config` → `oslo-config`)
    pub name: String,
    /// Name as written in the file
    pub raw_name: String,
    /// Extras text between brackets, if any
    pub extras: Option<String>,
    pub specifiers: SpecifierSet,
    /// Environment marker text after `;`, if any
    pub marker: Option<String>,
    /// 1-based source line
    pub line: usize,
}

/// A line that could not be parsed in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

/// A parsed requirements file.
#[derive(Debug, Clone, Default)]
pub struct RequirementsFile {
    source: String,
    lines: Vec<String>,
    pins: Vec<PinRecord>,
    skipped: Vec<SkippedLine>,
}

/// Canonical package name used for lookups and comparisons.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    SEPARATOR_RE.replace_all(name.trim(), "-").to_lowercase()
}

/// Text of `line` up to (not including) a `#` comment.
fn strip_comment(line: &str) -> &str {
    COMMENT_RE.find(line).map_or(line, |m| &line[..m.start()])
}

/// Parse one logical requirement, already stripped of its comment.
fn parse_requirement(text: &str, line: usize) -> Result<PinRecord, String> {
    let (requirement, marker) = match text.split_once(';') {
        Some((req, marker)) => (req.trim(), Some(marker.trim().to_string())),
        None => (text.trim(), None),
    };

    let caps = NAME_RE
        .captures(requirement)
        .ok_or_else(|| format!("'{requirement}' does not start with a package name"))?;
    let raw_name = caps["name"].to_string();
    let extras = caps.name("extras").map(|m| m.as_str().trim().to_string());

    let mut rest = caps["rest"].trim();
    if rest.starts_with('@') {
        return Err("direct URL references are not supported".to_string());
    }
    if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        rest = inner.trim();
    }

    let specifiers = SpecifierSet::parse(rest).map_err(|e| e.to_string())?;

    Ok(PinRecord {
        name: normalize_name(&raw_name),
        raw_name,
        extras,
        specifiers,
        marker: marker.filter(|m| !m.is_empty()),
        line,
    })
}

impl RequirementsFile {
    /// Parse requirements text.
    ///
    /// `source` names the input in warnings and errors (a file path or a URL).
    pub fn parse(text: &str, source: &str, mode: ParseMode) -> Result<Self> {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut pins: Vec<PinRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut skipped = Vec::new();

        for (i, raw) in lines.iter().enumerate() {
            let number = i + 1;
            let content = strip_comment(raw.trim_end_matches(['\n', '\r'])).trim();
            if content.is_empty() || content.starts_with('-') {
                continue;
            }

            match parse_requirement(content, number) {
                Ok(record) => {
                    if let Some(&existing) = index.get(&record.name) {
                        tracing::debug!(
                            "{source}:{number}: '{}' listed again, keeping the later pin",
                            record.name
                        );
                        pins[existing] = record;
                    } else {
                        index.insert(record.name.clone(), pins.len());
                        pins.push(record);
                    }
                }
                Err(reason) => {
                    if mode == ParseMode::Strict {
                        return Err(ReleaseError::ParseError {
                            file: source.to_string(),
                            line: number,
                            content: content.to_string(),
                            reason,
                        }
                        .into());
                    }
                    tracing::warn!("Skipping {source}:{number} '{content}': {reason}");
                    skipped.push(SkippedLine {
                        line: number,
                        content: content.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            lines,
            pins,
            skipped,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Pins in file order.
    #[must_use]
    pub fn pins(&self) -> &[PinRecord] {
        &self.pins
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PinRecord> {
        let name = normalize_name(name);
        self.pins.iter().find(|pin| pin.name == name)
    }

    /// Lines rejected in lenient mode.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Original lines, including their line endings.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Normalized package names in file order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.pins.iter().map(|pin| pin.name.clone()).collect()
    }
}

impl fmt::Display for RequirementsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Find the requirements reference a pin file points its constraints at.
///
/// Looks at comment and option lines for a constraints URL carrying a ref:
/// `?h=<ref>`, `/raw/commit/<ref>/`, `/raw/branch/<ref>/upper-constraints.txt`
/// or `/constraints/upper/<ref>`. The first match wins.
#[must_use]
pub fn discover_constraints_ref(pin_text: &str) -> Option<String> {
    pin_text
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with('#') || trimmed.starts_with('-') || line.contains(" #")
        })
        .find_map(|line| {
            REFERENCE_PATTERNS
                .iter()
                .find_map(|re| re.captures(line).map(|caps| caps["ref"].to_string()))
        })
}
