//! File system utilities.
//!
//! Manifests are only ever replaced atomically (write to a sibling temp
//! file, sync, rename), so an interrupted run leaves each file either fully
//! old or fully new.

pub mod atomic;
pub mod dirs;

pub use atomic::atomic_write;
pub use dirs::{copy_new_files, ensure_dir};
