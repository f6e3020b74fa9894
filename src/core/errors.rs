//! Error types for the quale-rs library.
//!
//! Errors follow the measurement taxonomy: execution failures and unparsable
//! reports abort a pass, soft analysis failures never surface here (they are
//! recorded as faulty files), and everything else is a configuration, I/O or
//! programming problem that is reported to the caller unchanged.

use std::fmt;
use std::io;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Main result type for quale operations.
pub type Result<T> = std::result::Result<T, QualeError>;

/// A subprocess that exited with a non-zero status.
///
/// Carries everything needed to reproduce and diagnose the failure by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// Adapter that issued the command
    pub tool: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecutionFailure {
    /// The command line as a single shell-like string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Whether either captured stream starts with `marker`.
    pub fn starts_with(&self, marker: &str) -> bool {
        self.stdout.trim_start().starts_with(marker) || self.stderr.trim_start().starts_with(marker)
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "termination by signal".to_string(),
        };
        write!(
            f,
            "{} failed with {} while running command:\n\n{}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            self.tool,
            status,
            self.command_line(),
            self.stdout,
            self.stderr
        )
    }
}

/// Comprehensive error type for all quale operations.
#[derive(Error, Debug)]
pub enum QualeError {
    /// I/O related errors (file operations, process spawning, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An external analysis tool exited unsuccessfully
    #[error("{0}")]
    Execution(Box<ExecutionFailure>),

    /// A tool report that could not be parsed even after sanitization
    #[error("Unreadable {tool} report {path}: {message}")]
    Report {
        /// Adapter that produced the report
        tool: String,
        /// Report location
        path: String,
        /// Parser diagnostic
        message: String,
    },

    /// Cancellation was requested and observed at a batch boundary
    #[error("Measurement cancelled before {stage}")]
    Cancelled {
        /// The unit of work that was not started
        stage: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Mathematical computation errors
    #[error("Mathematical error: {message}")]
    Math {
        /// Error description
        message: String,
        /// Context of the mathematical operation
        context: Option<String>,
    },

    /// Measurement pipeline errors
    #[error("Pipeline error at stage '{stage}': {message}")]
    Pipeline {
        /// Pipeline stage where error occurred
        stage: String,
        /// Error description
        message: String,
    },

    /// Persistence collaborator errors
    #[error("Storage error: {message}")]
    Storage {
        /// Error description
        message: String,
        /// Storage location involved
        location: Option<String>,
    },

    /// Job descriptor rendering errors
    #[error("Template error: {message}")]
    Template {
        /// Error description
        message: String,
        /// Template name
        template: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl QualeError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Wrap a failed subprocess invocation
    pub fn execution(failure: ExecutionFailure) -> Self {
        Self::Execution(Box::new(failure))
    }

    /// Create a new unreadable-report error
    pub fn report(
        tool: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Report {
            tool: tool.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new cancellation error
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new mathematical error
    pub fn math(message: impl Into<String>) -> Self {
        Self::Math {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new pipeline error
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            location: None,
        }
    }

    /// Create a new storage error tied to a location
    pub fn storage_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create a new template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
            template: None,
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Errors that abort the whole measurement pass of a branch.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. } | Self::Validation { .. } | Self::Math { .. }
        )
    }

    /// The failed subprocess, if this error came from one.
    pub fn execution_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::Execution(failure) => Some(failure),
            _ => None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Math { context: ctx, .. } | Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. } | Self::Storage { message, .. } => {
                *message = format!("{}: {}", context.into(), message);
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for QualeError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for QualeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for QualeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<handlebars::RenderError> for QualeError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template {
            message: format!("Failed to render job descriptor: {err}"),
            template: err.template_name.clone(),
        }
    }
}

impl From<handlebars::TemplateError> for QualeError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template {
            message: format!("Invalid job descriptor template: {err}"),
            template: err.template_name.clone(),
        }
    }
}

impl From<quick_xml::Error> for QualeError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Serialization {
            message: format!("XML parsing failed: {err}"),
            data_type: Some("XML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<globset::Error> for QualeError {
    fn from(err: globset::Error) -> Self {
        Self::config_field(format!("Invalid ignore pattern: {err}"), "ingest")
    }
}

impl From<ParseIntError> for QualeError {
    fn from(err: ParseIntError) -> Self {
        Self::validation(format!("Invalid integer: {err}"))
    }
}

impl From<ParseFloatError> for QualeError {
    fn from(err: ParseFloatError) -> Self {
        Self::validation(format!("Invalid float: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<QualeError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
