//! Error types for the WebForms core
//!
//! This module contains the error taxonomy of the view state protocol and the
//! control lifecycle. Transport and format problems with an incoming token are
//! grouped in [`ViewStateError`] and are recoverable: the page simply starts
//! fresh. Everything else surfaced through [`WebFormsError`] is a framework
//! failure that must reach the caller.

use crate::control::lifecycle::StateTransitionError;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Transport-level problems with a view state token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewStateError {
    #[error("View state exceeds maximum size ({size} > {max} bytes)")]
    TooLarge { size: usize, max: usize },
    #[error("View state is too short ({actual} bytes, need at least {minimum})")]
    TooShort { actual: usize, minimum: usize },
    #[error("Could not decode base64")]
    InvalidBase64,
    #[error("The view state hash is invalid")]
    HashMismatch,
    #[error("Unknown view state compression kind {kind}")]
    UnknownCompression { kind: u8 },
    #[error("Could not decompress the view state: {reason}")]
    Decompression { reason: String },
    #[error("The view state length does not match the header (expected {expected}, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Malformed record data found while replaying a payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Unexpected end of view state: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("View state contains invalid UTF-8")]
    InvalidUtf8,
    #[error("Invalid value marker {marker:#04x}")]
    InvalidMarker { marker: u8 },
    #[error("Variable-length integer overflow")]
    VarIntOverflow,
    #[error("{count} trailing bytes after the last control record")]
    TrailingBytes { count: usize },
    #[error("Invalid value: {reason}")]
    InvalidValue { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the WebForms framework
#[derive(Debug, thiserror::Error)]
pub enum WebFormsError {
    #[error("View state invalid: {0}")]
    ViewState(#[from] ViewStateError),

    #[error("Malformed view state: {0}")]
    Format(#[from] FormatError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("The control count does not match the view state (expected {expected}, visited {actual})")]
    ControlCountMismatch { expected: usize, actual: usize },

    #[error("{what} too large: {size} (max {max})")]
    PayloadTooLarge {
        what: &'static str,
        size: usize,
        max: usize,
    },

    #[error("No view state serializer registered for {type_name}")]
    SerializerNotFound { type_name: &'static str },

    #[error("Control not found: {control}")]
    ControlNotFound { control: String },

    #[error("Control {control} is already borrowed by a running hook")]
    ControlBusy { control: String },

    #[error("Control {control} is not a {expected}")]
    TypeMismatch {
        control: String,
        expected: &'static str,
    },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Application error: {message}")]
    Application { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl WebFormsError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        WebFormsError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an application error, used by page and event handler code
    pub fn application<T: Into<String>>(message: T) -> Self {
        WebFormsError::Application {
            message: message.into(),
        }
    }

    /// Create a control-not-found error
    pub fn control_not_found<T: Into<String>>(control: T) -> Self {
        WebFormsError::ControlNotFound {
            control: control.into(),
        }
    }

    /// Create an invalid value format error
    pub fn invalid_value<T: Into<String>>(reason: T) -> Self {
        WebFormsError::Format(FormatError::InvalidValue {
            reason: reason.into(),
        })
    }

    /// Whether the lifecycle may recover by treating the request as fresh
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WebFormsError::ViewState(_))
    }

    /// Whether this error originates in the framework rather than in
    /// application handlers
    pub fn is_framework_failure(&self) -> bool {
        !matches!(
            self,
            WebFormsError::Application { .. } | WebFormsError::Cancelled
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, WebFormsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_view_state_errors_are_recoverable() {
        assert!(WebFormsError::from(ViewStateError::HashMismatch).is_recoverable());
        assert!(!WebFormsError::from(FormatError::InvalidUtf8).is_recoverable());
        assert!(!WebFormsError::ControlCountMismatch {
            expected: 2,
            actual: 3
        }
        .is_recoverable());
    }

    #[test]
    fn test_framework_failures_are_distinguishable() {
        assert!(WebFormsError::SerializerNotFound { type_name: "u128" }.is_framework_failure());
        assert!(!WebFormsError::application("boom").is_framework_failure());
    }
}
