//! Error types for mictl
//!
//! Provides the process-level error type shared by the engine, the CLI and
//! the configuration loader. Per-command failures are reported separately
//! through the engine's completion sinks.

use std::path::PathBuf;

/// Main error type for mictl operations
#[derive(Debug, thiserror::Error)]
pub enum MictlError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Backend Errors ===

    #[error("Failed to spawn debugger backend {program}: {source}")]
    ProcessSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Debugger backend did not expose its {0} stream")]
    MissingStream(&'static str),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MictlError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using MictlError
pub type Result<T> = std::result::Result<T, MictlError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = MictlError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = MictlError::FileRead {
            path: PathBuf::from("/etc/mictl.toml"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/mictl.toml"));
    }

    #[test]
    fn test_error_display_process_spawn() {
        let err = MictlError::ProcessSpawn {
            program: "gdb".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to spawn debugger backend gdb"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_stream() {
        let err = MictlError::MissingStream("stdout");
        assert_eq!(err.to_string(), "Debugger backend did not expose its stdout stream");
    }

    #[test]
    fn test_error_display_config_invalid() {
        let err = MictlError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/mictl/config.toml"),
            message: "syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn test_error_display_config_not_found() {
        let err = MictlError::ConfigNotFound(PathBuf::from("/missing/config.toml"));
        assert!(err.to_string().contains("/missing/config.toml"));
    }

    // ==================== Helper Function Tests ====================

    #[test]
    fn test_config_helper() {
        let err = MictlError::config("window_size must be between 1 and 64");
        assert!(matches!(err, MictlError::Config(_)));
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_internal_helper() {
        let err = MictlError::internal("invariant violated");
        assert!(matches!(err, MictlError::Internal(_)));
        assert_eq!(err.to_string(), "Internal error: invariant violated");
    }

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: MictlError = io_err.into();
        if let MictlError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        } else {
            panic!("Expected Io variant");
        }
    }
}
