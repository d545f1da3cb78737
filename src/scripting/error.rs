//! Error taxonomy shared by the hook engine, the dry-run service and the editor harness.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Every way a hook configuration, a dry-run input or a hook execution can fail.
///
/// `Execution` and `Timeout` carry the engine message verbatim so that
/// authors see exactly what the interpreter reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook is enabled (or a test was requested) but no code is configured.
    #[error("hook script is empty")]
    ScriptEmpty,

    /// Any other configuration problem: no persisted target, unknown provider,
    /// oversized script.
    #[error("{0}")]
    Config(String),

    /// Dry-run header input is not a JSON object of string values.
    #[error("invalid test headers: {0}")]
    InvalidHeaders(String),

    /// Dry-run body input is not valid JSON.
    #[error("invalid test body: {0}")]
    InvalidBody(String),

    /// The script threw, returned the wrong shape, or could not be evaluated.
    #[error("{0}")]
    Execution(String),

    /// The execution budget elapsed before the hook returned.
    #[error("{0}")]
    Timeout(String),

    /// The engine could not be reached.
    #[error("hook engine unreachable: {0}")]
    Transport(String),
}

/// Coarse classification used on the wire and for HTTP status mapping.
///
/// `ScriptEmpty` is the configuration-validation case of an enabled or
/// tested hook without code. It keeps its own kind so clients can prompt for
/// code instead of showing a generic message; [`HookErrorKind::is_validation`]
/// groups it with `ConfigValidation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HookErrorKind {
    ScriptEmpty,
    ConfigValidation,
    InvalidHeaders,
    InvalidBody,
    ExecutionError,
    Timeout,
    TransportError,
}

impl HookErrorKind {
    /// True for failures detected before the engine is ever invoked:
    /// configuration validation (`ConfigValidation` and its `ScriptEmpty`
    /// case) and malformed dry-run input.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            HookErrorKind::ScriptEmpty
                | HookErrorKind::ConfigValidation
                | HookErrorKind::InvalidHeaders
                | HookErrorKind::InvalidBody
        )
    }
}

impl HookError {
    pub fn kind(&self) -> HookErrorKind {
        match self {
            HookError::ScriptEmpty => HookErrorKind::ScriptEmpty,
            HookError::Config(_) => HookErrorKind::ConfigValidation,
            HookError::InvalidHeaders(_) => HookErrorKind::InvalidHeaders,
            HookError::InvalidBody(_) => HookErrorKind::InvalidBody,
            HookError::Execution(_) => HookErrorKind::ExecutionError,
            HookError::Timeout(_) => HookErrorKind::Timeout,
            HookError::Transport(_) => HookErrorKind::TransportError,
        }
    }

    /// The message without the variant prefix, as sent over the wire.
    pub fn detail(&self) -> String {
        match self {
            HookError::ScriptEmpty => "hook script is empty".to_string(),
            HookError::Config(msg)
            | HookError::InvalidHeaders(msg)
            | HookError::InvalidBody(msg)
            | HookError::Execution(msg)
            | HookError::Timeout(msg)
            | HookError::Transport(msg) => msg.clone(),
        }
    }

    /// Rebuild an error from its wire form.
    pub fn from_wire(kind: HookErrorKind, message: String) -> Self {
        match kind {
            HookErrorKind::ScriptEmpty => HookError::ScriptEmpty,
            HookErrorKind::ConfigValidation => HookError::Config(message),
            HookErrorKind::InvalidHeaders => HookError::InvalidHeaders(message),
            HookErrorKind::InvalidBody => HookError::InvalidBody(message),
            HookErrorKind::ExecutionError => HookError::Execution(message),
            HookErrorKind::Timeout => HookError::Timeout(message),
            HookErrorKind::TransportError => HookError::Transport(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_is_verbatim() {
        let err = HookError::Execution("ReferenceError: foo is not defined".to_string());
        assert_eq!(err.to_string(), "ReferenceError: foo is not defined");
        assert_eq!(err.kind(), HookErrorKind::ExecutionError);
    }

    #[test]
    fn test_validation_kinds() {
        assert!(HookError::ScriptEmpty.kind().is_validation());
        assert!(HookError::Config("x".into()).kind().is_validation());
        assert!(HookError::InvalidBody("x".into()).kind().is_validation());
        assert!(!HookError::Timeout("x".into()).kind().is_validation());
        assert!(!HookError::Transport("x".into()).kind().is_validation());
    }

    #[test]
    fn test_wire_round_trip_keeps_detail() {
        let original = HookError::InvalidHeaders("header \"x-a\" must be a string".to_string());
        let rebuilt = HookError::from_wire(original.kind(), original.detail());
        assert_eq!(rebuilt, original);

        let rebuilt = HookError::from_wire(HookErrorKind::ScriptEmpty, String::new());
        assert_eq!(rebuilt, HookError::ScriptEmpty);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&HookErrorKind::ExecutionError).unwrap();
        assert_eq!(json, "\"execution_error\"");
    }
}
