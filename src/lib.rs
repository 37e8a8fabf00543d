//! osa-releases - release tooling for OpenStack-Ansible
//!
//! Keeps the pins of an OpenStack-Ansible checkout in line with upstream:
//!
//! - `check_pins` compares global requirement pins with the latest PyPI
//!   releases and with upper constraints of openstack/requirements
//! - `bump_upstream_shas` moves service `*_git_install_branch` SHAs to the
//!   heads of their track branches
//! - `bump_collections` moves Ansible collections to their latest releases
//! - `bump_roles` moves roles to the heads of their track branches and copies
//!   their release notes
//! - `freeze_roles_for_milestone` / `unfreeze_roles_from_milestone` pin roles
//!   to SHAs for a milestone and restore their tracking branches afterwards
//!
//! # Architecture Overview
//!
//! Manifests are the only state. Every run reads them, asks upstream (PyPI,
//! Galaxy, opendev raw files, git remotes) for the current truth, and rewrites
//! only the values that changed, byte for byte, leaving comments and layout
//! alone.
//!
//! ## Reading
//! - [`requirements`] - requirements-dialect pin files
//! - [`version`] - PEP 440 versions and specifiers
//! - [`manifest`] - locating and rewriting values in YAML manifests
//! - [`pattern`] - manifest discovery by glob
//!
//! ## Upstream
//! - [`upstream`] - PyPI, Galaxy and raw-file lookups with batching and retries
//! - [`constraints`] - upper constraints at a requirements reference
//! - [`git`] - `git ls-remote` and shallow clones through the system git
//! - [`releasenotes`] - copying reno notes from role repositories
//!
//! ## Operations
//! - [`report`] - pin drift report for `check_pins`
//! - [`services`] - upstream service SHA bumps
//! - [`collections`] - collection version bumps
//! - [`roles`] - role bumps and the freeze/unfreeze cycle
//!
//! ## Supporting
//! - [`cli`] - command-line interface
//! - [`config`] - optional TOML configuration
//! - [`core`] - error types and user-facing error formatting
//! - [`constants`] - defaults for endpoints, timeouts and file names
//! - [`utils`] - atomic writes and directory helpers

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

// Reading
pub mod manifest;
pub mod pattern;
pub mod requirements;
pub mod version;

// Upstream
pub mod constraints;
pub mod git;
pub mod releasenotes;
pub mod upstream;

// Operations
pub mod collections;
pub mod report;
pub mod roles;
pub mod services;

pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
