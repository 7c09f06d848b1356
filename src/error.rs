use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the llm-batch library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Required service setting is absent or blank.
    #[error("{name} is not set. Export it or pass it on the command line.")]
    MissingCredential {
        /// Name of the environment variable
        name: &'static str,
    },

    /// No files found in the input directory.
    #[error("No files found in directory '{path}'")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Transport-level failure talking to the completion service.
    #[error("Request to completion service failed: {message}")]
    Http {
        /// Error message
        message: String,
    },

    /// Completion service answered with a non-success status.
    #[error("Completion service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// Response did not have the expected structure.
    #[error("Unexpected response shape: {message}")]
    Decode {
        /// Error message
        message: String,
    },

    /// Prompt validation judged the rule document unsuitable.
    #[error("Prompt validation failed: {reason}. Use --dry-run to test your prompt.")]
    PromptRejected {
        /// Reason reported by the validator
        reason: String,
    },

    /// A single-file run could not produce output.
    #[error("Failed to process '{input}': {reason}")]
    ItemFailed {
        /// Input that failed
        input: String,
        /// Reason reported by the processor
        reason: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Invalid glob pattern.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Reason why it's invalid
        reason: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    ///
    /// `InvalidData` reads are reported as [`Error::InvalidUtf8`].
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::InvalidData {
            return Self::InvalidUtf8 { path };
        }
        Self::Io {
            path,
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub const fn missing_credential(name: &'static str) -> Self {
        Self::MissingCredential { name }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Creates a response decoding error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // tera hides the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::InvalidUtf8 { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::MissingCredential { .. })
    }

    /// Returns true if the error came from talking to the completion service.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::Decode { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::http(format!("request timed out: {e}"));
        }
        Self::http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn test_invalid_data_maps_to_utf8() {
        let io_err = std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        let err = Error::io("/tmp/blob.bin", io_err);
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_missing_credential() {
        let err = Error::missing_credential("OPENAI_API_KEY");
        assert!(err.is_config());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_service_errors() {
        assert!(Error::http("connection refused").is_service());
        assert!(Error::decode("no choices").is_service());
        let status = Error::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        assert!(status.is_service());
        assert!(status.to_string().contains("429"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::config("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
