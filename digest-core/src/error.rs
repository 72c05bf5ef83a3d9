//! Error types for the digest gateway core

use thiserror::Error;

/// Main error type for gate and configuration operations
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration is structurally valid but semantically wrong
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file could not be parsed
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// File watcher error
    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GateError::ConfigError("login_path must be public".into());
        assert_eq!(err.to_string(), "Configuration error: login_path must be public");
    }

    #[test]
    fn test_parse_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("[gate").unwrap_err();
        let err: GateError = toml_err.into();
        assert!(matches!(err, GateError::ParseError(_)));
    }
}
