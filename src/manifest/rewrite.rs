//! Structure-preserving value replacement.
//!
//! Only the bytes of the addressed value change. When an [`Edit`] asks for
//! it, a trailing `# HEAD of "<branch>" as of DD.MM.YYYY` comment on the same
//! line is refreshed too. Files are replaced with [`atomic_write`].

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::locate::{Found, find_all};
use super::{FieldPath, ManifestEntry, ValueKind};
use crate::core::ReleaseError;
use crate::utils::atomic_write;

static HEAD_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"HEAD of "(?P<branch>[^"]*)" as of (?P<date>\d{2}\.\d{2}\.\d{4})"#)
        .expect("static comment regex is valid")
});

/// One value replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub target: FieldPath,
    pub value: String,
    /// Branch for the `HEAD of` comment; the comment is refreshed only when
    /// present and only when the value actually changes
    pub head_of: Option<String>,
}

impl Edit {
    #[must_use]
    pub fn new(target: FieldPath, value: impl Into<String>) -> Self {
        Self {
            target,
            value: value.into(),
            head_of: None,
        }
    }

    #[must_use]
    pub fn with_head_comment(mut self, branch: impl Into<String>) -> Self {
        self.head_of = Some(branch.into());
        self
    }
}

/// A value that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub target: String,
    pub old: String,
    pub new: String,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Updated(Vec<Change>),
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRewrite {
    pub path: PathBuf,
    pub outcome: RewriteOutcome,
}

/// Edits planned for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdits {
    pub path: PathBuf,
    pub edits: Vec<Edit>,
}

/// Per-file outcomes of one write pass over several files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub target: String,
    pub files: Vec<FileRewrite>,
}

impl RewriteReport {
    #[must_use]
    pub fn updated(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, RewriteOutcome::Updated(_)))
            .map(|f| f.path.as_path())
            .collect()
    }

    #[must_use]
    pub fn unchanged(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|f| f.outcome == RewriteOutcome::Unchanged)
            .map(|f| f.path.as_path())
            .collect()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<(PathBuf, String)> {
        self.files
            .iter()
            .filter_map(|f| match &f.outcome {
                RewriteOutcome::Failed(reason) => Some((f.path.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

/// A replacement already resolved to a byte range.
struct Splice {
    range: Range<usize>,
    text: String,
}

/// Apply `edits` to `text`, returning the new text and the changes made.
///
/// Every edit target must occur exactly once: absent targets fail with
/// [`ReleaseError::TargetNotFound`], repeated ones with
/// [`ReleaseError::AmbiguousTarget`].
pub fn apply_edits(text: &str, edits: &[Edit], date: &str) -> Result<(String, Vec<Change>)> {
    let mut splices = Vec::new();
    let mut changes = Vec::new();

    for edit in edits {
        let found = single(text, &edit.target)?.ok_or_else(|| ReleaseError::TargetNotFound {
            target: edit.target.to_string(),
            searched: 1,
        })?;
        if found.value == edit.value {
            continue;
        }

        if let Some(splice) =
            edit.head_of.as_deref().and_then(|branch| refresh_head_comment(text, &found, branch, date))
        {
            splices.push(splice);
        }
        splices.push(Splice {
            range: found.span.clone(),
            text: edit.value.clone(),
        });
        changes.push(Change {
            target: edit.target.to_string(),
            old: found.value,
            new: edit.value.clone(),
        });
    }

    splices.sort_by_key(|s| s.range.start);
    if let Some(pair) = splices.windows(2).find(|w| w[0].range.end > w[1].range.start) {
        return Err(ReleaseError::AmbiguousTarget {
            target: changes.first().map(|c| c.target.clone()).unwrap_or_default(),
            reason: format!("overlapping edits at bytes {:?} and {:?}", pair[0].range, pair[1].range),
        }
        .into());
    }

    let mut out = text.to_string();
    for splice in splices.iter().rev() {
        out.replace_range(splice.range.clone(), &splice.text);
    }
    Ok((out, changes))
}

/// The one occurrence of `target`, `None` when absent.
fn single(text: &str, target: &FieldPath) -> Result<Option<Found>> {
    let mut found = find_all(text, target);
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => {
            let lines: Vec<String> = found.iter().map(|f| f.line.to_string()).collect();
            Err(ReleaseError::AmbiguousTarget {
                target: target.to_string(),
                reason: format!("found {n} times (lines {})", lines.join(", ")),
            }
            .into())
        }
    }
}

fn refresh_head_comment(text: &str, found: &Found, branch: &str, date: &str) -> Option<Splice> {
    let tail = &text[found.tail.clone()];
    let comment_at = tail.find('#')?;
    let caps = HEAD_COMMENT_RE.captures(&tail[comment_at..])?;
    let whole = caps.get(0)?;
    let start = found.tail.start + comment_at + whole.start();
    Some(Splice {
        range: start..start + whole.len(),
        text: format!("HEAD of \"{branch}\" as of {date}"),
    })
}

/// Occurrences of `target` in already read files.
///
/// Fails when the target repeats inside one file or when its values have
/// different shapes in different files.
fn collect_entries(texts: &[(PathBuf, String)], target: &FieldPath) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    for (path, text) in texts {
        if let Some(found) =
            single(text, target).with_context(|| format!("In manifest {}", path.display()))?
        {
            entries.push(ManifestEntry {
                file_path: path.clone(),
                project_key: target.to_string(),
                value_kind: ValueKind::classify(&found.value),
                current_value: found.value,
                span: found.span,
                line: found.line,
            });
        }
    }

    let kinds: HashSet<ValueKind> = entries.iter().map(|e| e.value_kind).collect();
    if kinds.len() > 1 {
        let forms: Vec<String> = entries
            .iter()
            .map(|e| format!("{} in {}", e.value_kind, e.file_path.display()))
            .collect();
        return Err(ReleaseError::AmbiguousTarget {
            target: target.to_string(),
            reason: format!("conflicting forms: {}", forms.join(", ")),
        }
        .into());
    }
    Ok(entries)
}

/// Reads, checks and writes manifests.
#[derive(Debug, Clone)]
pub struct Rewriter {
    date: String,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Rewriter {
    /// Rewriter stamping `HEAD of` comments with today's local date.
    #[must_use]
    pub fn new() -> Self {
        Self {
            date: chrono::Local::now().format("%d.%m.%Y").to_string(),
        }
    }

    /// Use a fixed `DD.MM.YYYY` date for `HEAD of` comments.
    #[must_use]
    pub fn with_date(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
        }
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))
    }

    fn read_all(files: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
        let mut texts = Vec::with_capacity(files.len());
        for path in files {
            texts.push((path.clone(), Self::read(path)?));
        }
        Ok(texts)
    }

    /// Every occurrence of `target` across `files`.
    ///
    /// Fails when the target repeats inside one file, when its values have
    /// different shapes in different files, or when no file contains it.
    pub fn entries(&self, files: &[PathBuf], target: &FieldPath) -> Result<Vec<ManifestEntry>> {
        let entries = collect_entries(&Self::read_all(files)?, target)?;
        if entries.is_empty() {
            return Err(ReleaseError::TargetNotFound {
                target: target.to_string(),
                searched: files.len(),
            }
            .into());
        }
        Ok(entries)
    }

    /// Check `targets` across `files` before any of them is written.
    ///
    /// A target may be absent from a file, but where present it must occur
    /// once and carry the same shape of value everywhere.
    pub fn check_targets(&self, files: &[PathBuf], targets: &[FieldPath]) -> Result<()> {
        let texts = Self::read_all(files)?;
        for target in targets {
            collect_entries(&texts, target)?;
        }
        Ok(())
    }

    /// Set `target` to `value` in every file that contains it.
    ///
    /// All files are checked before anything is written, then written as in
    /// [`Rewriter::apply_all`].
    pub fn rewrite(
        &self,
        files: &[PathBuf],
        target: &FieldPath,
        value: &str,
        head_of: Option<&str>,
    ) -> Result<RewriteReport> {
        let entries = self.entries(files, target)?;
        let mut edit = Edit::new(target.clone(), value);
        edit.head_of = head_of.map(str::to_string);

        let plans: Vec<FileEdits> = entries
            .into_iter()
            .map(|entry| FileEdits {
                path: entry.file_path,
                edits: vec![edit.clone()],
            })
            .collect();
        self.apply_all(&target.to_string(), &plans)
    }

    /// Write each planned file in turn, one atomic write per file.
    ///
    /// A failing file does not stop the remaining ones. When some file was
    /// written and another failed the result is [`ReleaseError::PartialRewrite`]
    /// and the written files stay. When nothing was written the first
    /// failure is returned as is.
    pub fn apply_all(&self, target: &str, plans: &[FileEdits]) -> Result<RewriteReport> {
        let mut report = RewriteReport {
            target: target.to_string(),
            files: Vec::new(),
        };
        let mut first_error = None;
        for plan in plans {
            let outcome = match self.apply_file(&plan.path, &plan.edits) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Failed to rewrite {}: {e:#}", plan.path.display());
                    let reason = format!("{e:#}");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    RewriteOutcome::Failed(reason)
                }
            };
            report.files.push(FileRewrite {
                path: plan.path.clone(),
                outcome,
            });
        }

        let Some(error) = first_error else {
            return Ok(report);
        };
        let succeeded: Vec<PathBuf> = report.updated().into_iter().map(Path::to_path_buf).collect();
        if succeeded.is_empty() {
            return Err(error);
        }
        Err(ReleaseError::PartialRewrite {
            target: report.target.clone(),
            succeeded,
            failed: report.failed(),
        }
        .into())
    }

    /// Apply several edits to one file with a single atomic write.
    ///
    /// Nothing is written when no value changes.
    pub fn apply_file(&self, path: &Path, edits: &[Edit]) -> Result<RewriteOutcome> {
        let text = Self::read(path)?;
        let (updated, changes) = apply_edits(&text, edits, &self.date)
            .with_context(|| format!("In manifest {}", path.display()))?;

        if changes.is_empty() {
            debug!("{} already up to date", path.display());
            return Ok(RewriteOutcome::Unchanged);
        }

        atomic_write(path, updated.as_bytes())?;
        for change in &changes {
            info!("{}: {} {} -> {}", path.display(), change.target, change.old, change.new);
        }
        Ok(RewriteOutcome::Updated(changes))
    }
}
