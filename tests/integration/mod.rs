//! Integration test suite for osa-releases
//!
//! End-to-end runs of the binary against temporary openstack-ansible
//! checkouts. Upstream git repositories are local repositories addressed by
//! `file://` URLs, so the suite needs git but no network.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **check_pins**: reference discovery and pin file errors
//! - **collections**: git-sourced collection bumps
//! - **roles**: bump, freeze and unfreeze of role files
//! - **upstream_shas**: service SHA bumps and manifest discovery

#[path = "../common/mod.rs"]
mod common;

mod check_pins;
mod collections;
mod roles;
mod upstream_shas;
