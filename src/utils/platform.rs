//! Platform-specific helpers
//!
//! Commodore shells out to git for every repository operation, so the only
//! platform difference it cares about is the name of the git executable.

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Returns the git executable name for this platform.
///
/// # Examples
///
/// ```rust
/// use commodore::utils::platform::get_git_command;
///
/// let git = get_git_command();
/// assert!(git == "git" || git == "git.exe");
/// ```
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}
