//! # Error Handling for the Live Annotation Pipeline
//!
//! This module provides the error type shared by the capture, transport,
//! processing and session layers, together with the classification helpers
//! the session uses to decide between "tear everything down" and "skip this
//! frame and keep going".
//!
//! ## Architecture
//!
//! - **Error Types**: `StreamError` struct variants with rich context
//! - **Error Context**: timestamp, context, recovery suggestion, severity
//! - **Classification**: `classify` maps each variant onto the pipeline's
//!   failure taxonomy
//!
//! ## Failure Taxonomy
//!
//! | Class | Variant | Effect |
//! |-------|---------|--------|
//! | acquisition | `Acquisition` | session never connects |
//! | connection | `Connection` | session torn down |
//! | transient send | `Send` | frame skipped |
//! | encode / decode | `Encode`, `Decode` | frame skipped |
//! | config push | `Http`, `Network` | discarded |
//!
//! Nothing is retried automatically; resuming requires a fresh start.
//!
//! ## Usage
//!
//! ```rust
//! use live_annotate::error::{StreamError, classify};
//!
//! let error = StreamError::acquisition("/dev/video0", "permission denied")
//!     .with_recovery_suggestion("Add the user to the 'video' group");
//! assert!(classify::is_fatal_to_session(&error));
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Debug-level errors that don't affect operation
    Debug,
    /// Warnings that only cost a single frame or update
    Warning,
    /// Errors that affect operation
    Error,
    /// Errors that end the current session
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a specific severity
    pub fn with_severity(severity: ErrorSeverity) -> Self {
        Self {
            severity,
            ..Self::default()
        }
    }
}

/// Base error type for the live annotation pipeline
#[derive(Debug)]
pub enum StreamError {
    /// Configuration errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Input validation errors
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// Capture device could not be acquired
    Acquisition {
        device: String,
        reason: String,
        context: ErrorContext,
    },
    /// Duplex connection failed or dropped
    Connection {
        endpoint: String,
        reason: String,
        context: ErrorContext,
    },
    /// A frame could not be handed to the connection
    Send {
        reason: String,
        context: ErrorContext,
    },
    /// Frame downscale / JPEG encode failed
    Encode {
        reason: String,
        context: ErrorContext,
    },
    /// An annotated reply could not be decoded
    Decode {
        reason: String,
        context: ErrorContext,
    },
    /// Invalid state transitions
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// Non-success HTTP status from the service
    Http {
        endpoint: String,
        status: u16,
        context: ErrorContext,
    },
    /// Network errors
    Network {
        operation: String,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl StreamError {
    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an acquisition error
    pub fn acquisition(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Acquisition {
            device: device.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a connection error
    pub fn connection(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a send error
    pub fn send(reason: impl Into<String>) -> Self {
        Self::Send {
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create an encode error
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
            context: ErrorContext::with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an HTTP status error
    pub fn http(endpoint: impl Into<String>, status: u16) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            status,
            context: ErrorContext::new(),
        }
    }

    /// Create a network error
    pub fn network(
        operation: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            operation: operation.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Attach the path an I/O error refers to
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if let Self::Io { path: slot, .. } = &mut self {
            *slot = Some(path.into());
        }
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Acquisition { context, .. } => context,
            Self::Connection { context, .. } => context,
            Self::Send { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Http { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Config { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Acquisition { context, .. } => context,
            Self::Connection { context, .. } => context,
            Self::Send { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Http { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::Acquisition { .. } => "acquisition",
            Self::Connection { .. } => "connection",
            Self::Send { .. } => "send",
            Self::Encode { .. } => "encode",
            Self::Decode { .. } => "decode",
            Self::State { .. } => "state",
            Self::Http { .. } => "http",
            Self::Network { .. } => "network",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            StreamError::Validation {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Validation failed for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
            StreamError::Acquisition { device, reason, .. } => {
                write!(f, "Failed to acquire capture device {}: {}", device, reason)
            }
            StreamError::Connection {
                endpoint, reason, ..
            } => {
                write!(f, "Connection to {} failed: {}", endpoint, reason)
            }
            StreamError::Send { reason, .. } => write!(f, "Frame send failed: {}", reason),
            StreamError::Encode { reason, .. } => write!(f, "Frame encode failed: {}", reason),
            StreamError::Decode { reason, .. } => {
                write!(f, "Annotated frame decode failed: {}", reason)
            }
            StreamError::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Invalid state transition from '{}' when attempting '{}': {}",
                    current_state, attempted_operation, reason
                )
            }
            StreamError::Http {
                endpoint, status, ..
            } => {
                write!(f, "Service returned HTTP {} for {}", status, endpoint)
            }
            StreamError::Network {
                operation, source, ..
            } => {
                if let Some(source) = source {
                    write!(f, "Network error during {}: {}", operation, source)
                } else {
                    write!(f, "Network error during {}", operation)
                }
            }
            StreamError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            StreamError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Network {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type StreamResult<T> = Result<T, StreamError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for StreamError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for StreamError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors that threaten pipeline liveness and end the session
    pub fn is_fatal_to_session(error: &StreamError) -> bool {
        matches!(
            error,
            StreamError::Acquisition { .. } | StreamError::Connection { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Errors that only cost one frame or one config push
    pub fn is_recovered_locally(error: &StreamError) -> bool {
        !is_fatal_to_session(error)
            && matches!(
                error,
                StreamError::Send { .. }
                    | StreamError::Encode { .. }
                    | StreamError::Decode { .. }
                    | StreamError::Http { .. }
                    | StreamError::Network { .. }
            )
    }

    /// Errors caused by bad user input rather than the environment
    pub fn is_user_error(error: &StreamError) -> bool {
        matches!(
            error,
            StreamError::Config { .. } | StreamError::Validation { .. }
        )
    }
}

impl From<std::io::Error> for StreamError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for StreamError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(error: reqwest::Error) -> Self {
        let operation = error
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "request".to_string());
        Self::network(operation, error)
    }
}
