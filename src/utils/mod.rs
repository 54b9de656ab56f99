//! Small cross-cutting helpers
//!
//! - [`platform`] - the platform's git executable name
//! - [`progress`] - styled progress bars for the command line

pub mod platform;
pub mod progress;

pub use progress::ProgressBar;
