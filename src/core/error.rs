//! Error handling for osa-releases
//!
//! Errors follow two rules:
//! 1. **Strongly-typed errors** ([`ReleaseError`]) for anything a caller may want
//!    to match on, such as a missing target or a partial rewrite.
//! 2. **User-friendly messages** ([`ErrorContext`]) at the CLI boundary, with a
//!    details line and an actionable suggestion.
//!
//! Resolution failures (an index lookup that timed out, an unknown package) are
//! not errors at this level: they are absorbed into the report as "unknown".
//! Everything structural (missing targets, ambiguity, partial rewrites) travels
//! up as an [`anyhow::Error`] wrapping a [`ReleaseError`] and is converted with
//! [`user_friendly_error`] in `main`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use osa_releases::core::{ReleaseError, user_friendly_error};
//!
//! let error = ReleaseError::ManifestNotFound {
//!     patterns: vec!["playbooks/defaults/repo_packages/*.yml".to_string()],
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for release operations.
///
/// # Error Categories
///
/// - **Input parsing**: [`ParseError`], [`ManifestParseError`], [`YamlError`]
/// - **Upstream lookups**: [`ResolutionError`], [`NetworkError`], [`ReferenceDiscovery`]
/// - **Manifest rewriting**: [`ManifestNotFound`], [`TargetNotFound`],
///   [`AmbiguousTarget`], [`PartialRewrite`]
/// - **Git**: [`GitNotFound`], [`GitCommandError`], [`GitCloneFailed`]
/// - **Environment**: [`ConfigError`], [`IoError`], [`TomlError`]
///
/// [`ParseError`]: ReleaseError::ParseError
/// [`ManifestParseError`]: ReleaseError::ManifestParseError
/// [`YamlError`]: ReleaseError::YamlError
/// [`ResolutionError`]: ReleaseError::ResolutionError
/// [`NetworkError`]: ReleaseError::NetworkError
/// [`ReferenceDiscovery`]: ReleaseError::ReferenceDiscovery
/// [`ManifestNotFound`]: ReleaseError::ManifestNotFound
/// [`TargetNotFound`]: ReleaseError::TargetNotFound
/// [`AmbiguousTarget`]: ReleaseError::AmbiguousTarget
/// [`PartialRewrite`]: ReleaseError::PartialRewrite
/// [`GitNotFound`]: ReleaseError::GitNotFound
/// [`GitCommandError`]: ReleaseError::GitCommandError
/// [`GitCloneFailed`]: ReleaseError::GitCloneFailed
/// [`ConfigError`]: ReleaseError::ConfigError
/// [`IoError`]: ReleaseError::IoError
/// [`TomlError`]: ReleaseError::TomlError
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// A line of a requirements-style file could not be parsed.
    ///
    /// Only raised in strict mode; lenient parsing skips the line with a warning.
    #[error("Cannot parse line {line} of {file}: {reason}")]
    ParseError {
        /// File the line came from (or `<input>` for in-memory text)
        file: String,
        /// 1-based line number
        line: usize,
        /// The offending line content
        content: String,
        /// Why the line was rejected
        reason: String,
    },

    /// A YAML manifest could not be read into its expected shape
    #[error("Invalid manifest syntax in {file}")]
    ManifestParseError {
        /// Path to the manifest
        file: String,
        /// Parser message
        reason: String,
    },

    /// Looking up the latest version of a package failed.
    ///
    /// Never fatal for a batch: the resolver records the package as unknown.
    #[error("Cannot resolve latest version of '{name}': {reason}")]
    ResolutionError {
        /// Package or collection name
        name: String,
        /// Last failure seen
        reason: String,
    },

    /// The upper-constraints reference could not be determined
    #[error("Cannot determine which requirements reference to use for {file}")]
    ReferenceDiscovery {
        /// Pin file that was inspected
        file: String,
    },

    /// No manifest matched the glob patterns, or none contained the target key
    #[error("No manifest found for patterns: {}", patterns.join(", "))]
    ManifestNotFound {
        /// The glob patterns that were expanded
        patterns: Vec<String>,
    },

    /// The target key is absent from every located manifest
    #[error("Target '{target}' not found in any of {searched} manifest(s)")]
    TargetNotFound {
        /// Human-readable target (key or `name.field`)
        target: String,
        /// Number of files that were searched
        searched: usize,
    },

    /// The target key was found more than once in a file, or in conflicting forms across files
    #[error("Target '{target}' is ambiguous: {reason}")]
    AmbiguousTarget {
        /// Human-readable target
        target: String,
        /// Where and how the conflict shows up
        reason: String,
    },

    /// Some files were rewritten but at least one failed
    #[error("Rewrite of '{target}' partially failed: {} updated, {} failed", succeeded.len(), failed.len())]
    PartialRewrite {
        /// Human-readable target
        target: String,
        /// Files that were written and left in place
        succeeded: Vec<PathBuf>,
        /// Files that failed, with the failure reason
        failed: Vec<(PathBuf, String)>,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git command returned a non-zero exit code or timed out
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "ls-remote")
        operation: String,
        /// Captured stderr
        stderr: String,
    },

    /// Git clone failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// Repository URL
        url: String,
        /// Captured stderr
        reason: String,
    },

    /// A branch or tag does not exist on the remote
    #[error("Reference '{reference}' not found in {url}")]
    ReferenceNotFound {
        /// Repository URL
        url: String,
        /// Branch or tag name
        reference: String,
    },

    /// HTTP request failed or returned an unexpected status
    #[error("Network error: {operation}")]
    NetworkError {
        /// What was being fetched
        operation: String,
        /// Failure reason
        reason: String,
    },

    /// Configuration file problem
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for ReleaseError {
    fn clone(&self) -> Self {
        match self {
            Self::ParseError {
                file,
                line,
                content,
                reason,
            } => Self::ParseError {
                file: file.clone(),
                line: *line,
                content: content.clone(),
                reason: reason.clone(),
            },
            Self::ManifestParseError {
                file,
                reason,
            } => Self::ManifestParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ResolutionError {
                name,
                reason,
            } => Self::ResolutionError {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::ReferenceDiscovery {
                file,
            } => Self::ReferenceDiscovery {
                file: file.clone(),
            },
            Self::ManifestNotFound {
                patterns,
            } => Self::ManifestNotFound {
                patterns: patterns.clone(),
            },
            Self::TargetNotFound {
                target,
                searched,
            } => Self::TargetNotFound {
                target: target.clone(),
                searched: *searched,
            },
            Self::AmbiguousTarget {
                target,
                reason,
            } => Self::AmbiguousTarget {
                target: target.clone(),
                reason: reason.clone(),
            },
            Self::PartialRewrite {
                target,
                succeeded,
                failed,
            } => Self::PartialRewrite {
                target: target.clone(),
                succeeded: succeeded.clone(),
                failed: failed.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitCloneFailed {
                url,
                reason,
            } => Self::GitCloneFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::ReferenceNotFound {
                url,
                reference,
            } => Self::ReferenceNotFound {
                url: url.clone(),
                reference: reference.clone(),
            },
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::YamlError(e) => Self::Other {
                message: format!("YAML parsing error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show:
/// 1. **Error**: the main message in red
/// 2. **Details**: extra context in yellow (optional)
/// 3. **Suggestion**: what to do next in green (optional)
///
/// ```rust,no_run
/// use osa_releases::core::{ReleaseError, ErrorContext};
///
/// let context = ErrorContext::new(ReleaseError::GitNotFound)
///     .with_suggestion("Install git from https://git-scm.com/")
///     .with_details("SHA lookups use 'git ls-remote'");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ReleaseError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: ReleaseError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details and suggestion to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`ReleaseError`] (directly or anywhere in the context chain),
/// [`std::io::Error`], and falls back to [`ReleaseError::Other`] carrying the
/// full `anyhow` chain for anything else.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(release_error) = cause.downcast_ref::<ReleaseError>() {
            return create_error_context(release_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(ReleaseError::Other {
                    message: format!("{error:#}"),
                })
                .with_suggestion("Check that the file exists and the path is correct")
                .with_details("Paths are resolved relative to --root (default: current directory)");
            }
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(ReleaseError::Other {
                    message: format!("{error:#}"),
                })
                .with_suggestion("Check file ownership and permissions of the manifests");
            }
            _ => {}
        }
    }

    ErrorContext::new(ReleaseError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: ReleaseError) -> ErrorContext {
    let (suggestion, details): (Option<String>, Option<String>) = match &error {
        ReleaseError::ParseError {
            file,
            line,
            ..
        } => (
            Some(format!("Fix line {line} of {file} or rerun without --strict")),
            Some("Strict mode aborts on the first malformed requirement line".to_string()),
        ),
        ReleaseError::ManifestParseError {
            reason,
            ..
        } => (Some("Check the YAML syntax of the manifest".to_string()), Some(reason.clone())),
        ReleaseError::ReferenceDiscovery {
            ..
        } => (
            Some("Pass the reference explicitly with --requirements_sha <REF>".to_string()),
            Some(
                "No upper-constraints URL carrying a reference was found in the pin file comments"
                    .to_string(),
            ),
        ),
        ReleaseError::ManifestNotFound {
            ..
        } => (
            Some("Check the --path globs and the --root directory".to_string()),
            Some("Either no file matched or no matched file contains the targeted keys".to_string()),
        ),
        ReleaseError::TargetNotFound {
            target,
            ..
        } => (Some(format!("Add '{target}' to a manifest or remove it from the bump")), None),
        ReleaseError::AmbiguousTarget {
            ..
        } => (
            Some("Remove duplicate entries so every project is defined exactly once".to_string()),
            Some("Ambiguous targets are never rewritten; resolve the conflict manually".to_string()),
        ),
        ReleaseError::PartialRewrite {
            succeeded,
            failed,
            ..
        } => {
            let mut details = String::new();
            for path in succeeded {
                details.push_str(&format!("\n  updated: {}", path.display()));
            }
            for (path, reason) in failed {
                details.push_str(&format!("\n  failed:  {} ({reason})", path.display()));
            }
            (
                Some(
                    "Updated files were left in place; fix the failures and reconcile by hand"
                        .to_string(),
                ),
                Some(details),
            )
        }
        ReleaseError::GitNotFound => (
            Some("Install git from https://git-scm.com/ and make sure it is in PATH".to_string()),
            Some("SHA lookups and release-notes copies run the system git binary".to_string()),
        ),
        ReleaseError::GitCommandError {
            stderr,
            ..
        } => (
            Some("Check network connectivity and the repository URL".to_string()),
            Some(stderr.clone()),
        ),
        ReleaseError::GitCloneFailed {
            url,
            reason,
        } => (Some(format!("Verify that {url} is reachable")), Some(reason.clone())),
        ReleaseError::ReferenceNotFound {
            reference,
            ..
        } => (Some(format!("Check that branch or tag '{reference}' exists upstream")), None),
        ReleaseError::NetworkError {
            reason,
            ..
        } => (
            Some("Check your internet connection and try again".to_string()),
            Some(reason.clone()),
        ),
        ReleaseError::ConfigError {
            ..
        } => (Some("Check the file passed with --config".to_string()), None),
        _ => (None, None),
    };

    ErrorContext {
        error,
        suggestion,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ReleaseError::TargetNotFound {
            target: "nova_git_install_branch".to_string(),
            searched: 2,
        };
        assert_eq!(
            error.to_string(),
            "Target 'nova_git_install_branch' not found in any of 2 manifest(s)"
        );
    }

    #[test]
    fn test_partial_rewrite_display_counts() {
        let error = ReleaseError::PartialRewrite {
            target: "nova".to_string(),
            succeeded: vec![PathBuf::from("a.yml")],
            failed: vec![(PathBuf::from("b.yml"), "denied".to_string())],
        };
        assert_eq!(error.to_string(), "Rewrite of 'nova' partially failed: 1 updated, 1 failed");
    }

    #[test]
    fn test_partial_rewrite_context_lists_files() {
        let ctx = create_error_context(ReleaseError::PartialRewrite {
            target: "nova".to_string(),
            succeeded: vec![PathBuf::from("a.yml")],
            failed: vec![(PathBuf::from("b.yml"), "denied".to_string())],
        });
        let details = ctx.details.unwrap();
        assert!(details.contains("updated: a.yml"));
        assert!(details.contains("failed:  b.yml (denied)"));
    }

    #[test]
    fn test_reference_discovery_suggests_flag() {
        let ctx = create_error_context(ReleaseError::ReferenceDiscovery {
            file: "global-requirement-pins.txt".to_string(),
        });
        assert!(ctx.suggestion.unwrap().contains("--requirements_sha"));
    }

    #[test]
    fn test_user_friendly_error_finds_release_error_in_chain() {
        let error = anyhow::Error::from(ReleaseError::ManifestNotFound {
            patterns: vec!["*.yml".to_string()],
        })
        .context("Failed to bump upstream SHAs");

        let ctx = user_friendly_error(error);
        match ctx.error {
            ReleaseError::ManifestNotFound {
                ..
            } => {}
            _ => panic!("Expected ManifestNotFound"),
        }
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_generic() {
        let ctx = user_friendly_error(anyhow::anyhow!("Generic error"));
        match ctx.error {
            ReleaseError::Other {
                message,
            } => assert_eq!(message, "Generic error"),
            _ => panic!("Expected Other error"),
        }
    }

    #[test]
    fn test_error_clone() {
        let error = ReleaseError::AmbiguousTarget {
            target: "nova".to_string(),
            reason: "defined twice".to_string(),
        };
        assert_eq!(error.to_string(), error.clone().to_string());

        let io = ReleaseError::from(std::io::Error::other("boom"));
        assert!(io.clone().to_string().contains("boom"));
    }

    #[test]
    fn test_error_context_display_format() {
        let ctx = ErrorContext::new(ReleaseError::GitNotFound)
            .with_details("details here")
            .with_suggestion("do this");
        let text = ctx.to_string();
        assert!(text.contains("Git is not installed"));
        assert!(text.contains("Details: details here"));
        assert!(text.contains("Suggestion: do this"));
    }
}
