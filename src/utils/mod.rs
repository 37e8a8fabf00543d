//! Filesystem helpers shared by the manifest rewriters and the release-notes copy.

pub mod fs;

pub use fs::{atomic_write, copy_new_files, ensure_dir};
