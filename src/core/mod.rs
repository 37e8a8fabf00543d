//! Core types shared by every command: the error enum and its user-facing context.

pub mod error;

pub use error::{ErrorContext, ReleaseError, user_friendly_error};
