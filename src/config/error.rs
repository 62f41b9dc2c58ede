// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the configuration module.

use std::fmt;
use std::io;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested configuration key was not found.
    #[error("configuration key not found")]
    NotFound,

    /// An error occurred while parsing or deserializing a configuration value.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// An IO error occurred (e.g., while reading a configuration file).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An error related to a specific configuration provider.
    #[error("provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    /// A generic error.
    #[error("{0}")]
    Other(String),
}

impl ConfigError {
    /// Create a new provider error.
    pub fn provider<P: fmt::Display, M: fmt::Display>(provider: P, message: M) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_display_variants() {
        assert_eq!(
            ConfigError::NotFound.to_string(),
            "configuration key not found"
        );
        assert_eq!(
            ConfigError::Parse("bad value".to_string()).to_string(),
            "failed to parse configuration: bad value"
        );
        assert_eq!(
            ConfigError::provider("file", "unsupported format").to_string(),
            "provider error: file: unsupported format"
        );
        assert_eq!(
            ConfigError::Other("custom".to_string()).to_string(),
            "custom"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let error: ConfigError = io_error.into();

        match &error {
            ConfigError::Io(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
            _ => panic!("expected Io variant"),
        }
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_source_chain() {
        let io_error = IoError::new(ErrorKind::InvalidData, "bad data");
        let error = ConfigError::Io(io_error);

        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "bad data");

        assert!(ConfigError::NotFound.source().is_none());
    }

    #[test]
    fn test_provider_constructor_accepts_display_types() {
        let error = ConfigError::provider("env", 404);
        match &error {
            ConfigError::Provider { provider, message } => {
                assert_eq!(provider, "env");
                assert_eq!(message, "404");
            }
            _ => panic!("expected Provider variant"),
        }
    }
}
