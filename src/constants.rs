//! Global constants used throughout the crate.
//!
//! Timeouts, retry bounds and the default upstream endpoints live here so the
//! magic numbers are discoverable in one place. Most of them can be overridden
//! through [`crate::config::ReleaseConfig`].

use std::time::Duration;

/// Length of a full git commit SHA in hex characters.
pub const GIT_SHA_LENGTH: usize = 40;

/// Default per-request timeout for HTTP lookups (package index, raw files).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for git network operations (`ls-remote`, shallow clones).
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Attempts per package lookup before it is recorded as unknown.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Starting delay for exponential backoff between lookup attempts (ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 200;

/// Maximum backoff delay between lookup attempts (ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 2_000;

/// Number of package lookups issued before pausing.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Pause between lookup batches (ms).
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 250;

/// PyPI base URL.
pub const DEFAULT_PYPI_URL: &str = "https://pypi.org";

/// Ansible Galaxy base URL.
pub const DEFAULT_GALAXY_URL: &str = "https://galaxy.ansible.com";

/// Raw-file endpoint of the openstack/requirements repository, addressed by commit.
pub const DEFAULT_REQUIREMENTS_RAW_URL: &str =
    "https://opendev.org/openstack/requirements/raw/commit";

/// Upper-constraints file name inside the requirements repository.
pub const DEFAULT_CONSTRAINTS_FILE: &str = "upper-constraints.txt";

/// Git host whose roles count as first-party (release notes are copied for them).
pub const DEFAULT_PRIMARY_GIT_HOST: &str = "opendev.org/openstack";

/// Local directory receiving copied release notes.
pub const DEFAULT_RELEASE_NOTES_DIR: &str = "releasenotes/notes";

/// Default pin file for `check_pins`.
pub const DEFAULT_PIN_FILE: &str = "global-requirement-pins.txt";

/// Default role requirements file.
pub const DEFAULT_ROLE_FILE: &str = "ansible-role-requirements.yml";

/// Default collection requirements file.
pub const DEFAULT_COLLECTION_FILE: &str = "ansible-collection-requirements.yml";

/// Default globs holding upstream service SHAs.
pub const DEFAULT_SHA_GLOBS: [&str; 2] =
    ["playbooks/defaults/repo_packages/*.yml", "inventory/group_vars/*all/*_git.yml"];
