//! Core types shared across Commodore.
//!
//! Currently this is the error taxonomy ([`CommodoreError`]) and the
//! terminal-facing [`ErrorContext`] produced by [`user_friendly_error`].

pub mod error;

pub use error::{CommodoreError, ErrorContext, user_friendly_error};
