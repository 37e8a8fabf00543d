//! YAML manifests holding SHAs, versions and branches, and their in-place rewriting.
//!
//! The tool edits three kinds of manifest:
//!
//! - upstream service files (`playbooks/defaults/repo_packages/*.yml`), flat
//!   mappings of `<project>_git_*` keys
//! - `ansible-role-requirements.yml`, a top-level sequence of roles
//! - `ansible-collection-requirements.yml`, a `collections:` sequence
//!
//! A value is addressed with a [`FieldPath`]. [`locate`] finds the byte span
//! of the value and [`rewrite`] replaces exactly those bytes, so quoting,
//! comments, indentation and line endings stay as the authors wrote them.
//! Structure is read with `serde_yaml` where typed access is needed (role and
//! collection entries), but never written back through it.

pub mod locate;
pub mod rewrite;

pub use rewrite::{Edit, FileEdits, FileRewrite, RewriteOutcome, RewriteReport, Rewriter};

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::constants::GIT_SHA_LENGTH;

static VERSION_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?\d+(?:\.\d+)*(?:[-.+_]?[A-Za-z0-9.]+)?$").expect("static version regex is valid")
});

/// Address of a scalar inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPath {
    /// A top-level mapping key, e.g. `nova_git_install_branch`
    Key(String),
    /// `field` of the sequence item whose `name` equals `name`.
    ///
    /// `list` names the top-level key holding the sequence (`collections`),
    /// or is `None` when the document itself is the sequence.
    ListItem {
        list: Option<String>,
        name: String,
        field: String,
    },
}

impl FieldPath {
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    /// `field` of the role or top-level sequence item called `name`.
    #[must_use]
    pub fn item(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ListItem {
            list: None,
            name: name.into(),
            field: field.into(),
        }
    }

    /// `field` of the item called `name` inside the `list` sequence.
    #[must_use]
    pub fn list_item(
        list: impl Into<String>,
        name: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::ListItem {
            list: Some(list.into()),
            name: name.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::ListItem {
                list: None,
                name,
                field,
            } => write!(f, "{name}.{field}"),
            Self::ListItem {
                list: Some(list),
                name,
                field,
            } => write!(f, "{list}[{name}].{field}"),
        }
    }
}

/// Shape of a manifest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 40-character hex commit
    Sha,
    /// Release number, optionally `v`-prefixed
    Version,
    /// Anything else: branch or tag name
    Branch,
}

impl ValueKind {
    #[must_use]
    pub fn classify(value: &str) -> Self {
        if is_sha(value) {
            Self::Sha
        } else if VERSION_LIKE_RE.is_match(value) {
            Self::Version
        } else {
            Self::Branch
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sha => "sha",
            Self::Version => "version",
            Self::Branch => "branch",
        })
    }
}

/// Whether `value` is a full 40-character hex commit id.
#[must_use]
pub fn is_sha(value: &str) -> bool {
    value.len() == GIT_SHA_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// One located value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_path: PathBuf,
    /// Display form of the [`FieldPath`] that located it
    pub project_key: String,
    pub current_value: String,
    pub value_kind: ValueKind,
    /// Byte span of the value in the file
    pub span: Range<usize>,
    /// 1-based line number
    pub line: usize,
}
