//! Error handling for Commodore
//!
//! Every failure the component source manager can raise is a variant of
//! [`CommodoreError`]. Operations return [`anyhow::Result`] so that context can
//! be layered on at each call site; callers that need to react to a specific
//! condition recover the typed error with [`anyhow::Error::downcast_ref`].
//!
//! The four user-facing failure classes are:
//!
//! - [`CommodoreError::RefError`] - a version specifier did not resolve to a
//!   branch, tag, or commit after a fresh fetch
//! - [`CommodoreError::RepositoryError`] - an underlying git operation failed
//!   (network, permissions, corruption, disk I/O)
//! - [`CommodoreError::ManifestError`] - the dependency-manifest template could
//!   not be evaluated or produced an invalid manifest
//! - [`CommodoreError::ConfigurationError`] - an alias was declared for a
//!   component that does not support multiple instances
//!
//! The remaining variants are plumbing raised by the git command layer and the
//! configuration loader. The binary converts any error into an
//! [`ErrorContext`] via [`user_friendly_error`] and exits with status 1.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The error type for component source management.
///
/// Each user-facing variant carries the component name and the failing
/// condition so the message printed to the terminal is self-contained.
#[derive(Error, Debug, Clone)]
pub enum CommodoreError {
    /// The requested version does not name a branch, tag, or commit of the
    /// component's repository.
    #[error("Version '{version}' of component '{component}' does not resolve to a branch, tag, or commit")]
    RefError {
        /// Name of the component whose version failed to resolve
        component: String,
        /// The version specifier as declared
        version: String,
    },

    /// A version-control operation on a component's repository failed.
    #[error("Repository operation '{operation}' failed for component '{component}': {reason}")]
    RepositoryError {
        /// Name of the component owning the repository
        component: String,
        /// The operation that failed (e.g. "clone", "fetch", "checkout")
        operation: String,
        /// The underlying failure, usually git's stderr
        reason: String,
    },

    /// Rendering the dependency manifest from its template failed.
    #[error("Failed to render {file} for component '{component}': {reason}")]
    ManifestError {
        /// Name of the component whose template failed
        component: String,
        /// The template file that was evaluated
        file: String,
        /// Why evaluation failed
        reason: String,
    },

    /// A component was aliased although it does not declare multi-instance
    /// support.
    #[error("Component {component} with alias {alias} does not support instantiation.")]
    ConfigurationError {
        /// The canonical component name
        component: String,
        /// The alias under which it was instantiated
        alias: String,
    },

    /// A git command returned a non-zero exit status.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git subcommand that failed (e.g. "fetch", "remote")
        operation: String,
        /// The error output from git
        stderr: String,
    },

    /// Cloning a repository failed.
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The URL that could not be cloned
        url: String,
        /// The reason for the failure
        reason: String,
    },

    /// Checking out a reference failed.
    #[error("Failed to checkout reference '{reference}' in repository")]
    GitCheckoutFailed {
        /// The reference (branch, tag, or commit) that failed to check out
        reference: String,
        /// The reason for the failure
        reason: String,
    },

    /// The git executable could not be found.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// The project configuration file could not be read or is invalid.
    #[error("Invalid configuration in {file}: {reason}")]
    ConfigParseError {
        /// The configuration file
        file: String,
        /// What is wrong with it
        reason: String,
    },

    /// Catch-all for messages without a dedicated variant.
    #[error("{message}")]
    Other {
        /// The error message
        message: String,
    },
}

impl CommodoreError {
    /// Returns the component this error is about, if it names one.
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::RefError { component, .. }
            | Self::RepositoryError { component, .. }
            | Self::ManifestError { component, .. }
            | Self::ConfigurationError { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// A [`CommodoreError`] enriched with an optional suggestion and details for
/// display on the terminal.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CommodoreError,
    /// Optional actionable suggestion
    pub suggestion: Option<String>,
    /// Optional explanation of what happened
    pub details: Option<String>,
}

impl ErrorContext {
    /// Creates a context with neither suggestion nor details.
    #[must_use]
    pub const fn new(error: CommodoreError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Adds a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Adds details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr: error in red, details in yellow,
    /// suggestion in green.
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

fn create_error_context(error: CommodoreError) -> ErrorContext {
    match &error {
        CommodoreError::RefError { version, .. } => {
            let version = version.clone();
            ErrorContext::new(error)
                .with_suggestion(format!(
                    "Check that '{version}' is an existing branch, tag, or commit of the component repository"
                ))
                .with_details("Versions are resolved after fetching, preferring branches over tags over commits")
        }
        CommodoreError::RepositoryError { operation, .. } => {
            let suggestion = match operation.as_str() {
                "clone" | "fetch" => {
                    "Check the repository URL, your network connection and your git credentials"
                }
                _ => "Inspect the component directory with 'git status' and remove it if it is corrupted",
            };
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        CommodoreError::ManifestError { file, .. } => {
            let file = file.clone();
            ErrorContext::new(error).with_suggestion(format!(
                "Fix the template {file} or provide the missing jsonnetfile_parameters"
            ))
        }
        CommodoreError::ConfigurationError { component, .. } => {
            let component = component.clone();
            ErrorContext::new(error).with_suggestion(format!(
                "Remove the alias or use a version of {component} that sets multi_instance: true"
            ))
        }
        CommodoreError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is in your PATH"),
        CommodoreError::ConfigParseError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax and the keys of your commodore.toml"),
        _ => ErrorContext::new(error),
    }
}

/// Converts any error into an [`ErrorContext`] suitable for terminal output.
///
/// Typed [`CommodoreError`]s anywhere in the chain get tailored suggestions;
/// everything else is wrapped as [`CommodoreError::Other`] with the full
/// context chain as details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(commodore_error) = cause.downcast_ref::<CommodoreError>() {
            let context = create_error_context(commodore_error.clone());
            if cause.to_string() == error.to_string() {
                return context;
            }
            return context.with_details(format!("{error:#}"));
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(CommodoreError::Other {
                message: error.to_string(),
            })
            .with_suggestion("Check the ownership and permissions of the working directory");
        }
    }

    ErrorContext::new(CommodoreError::Other {
        message: error.to_string(),
    })
    .with_details(format!("{error:#}"))
}
