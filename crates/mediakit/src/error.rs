//! Error types for Media Services and blob storage operations.
//!
//! Errors are categorized so the retry layer can tell throttling and
//! transient service faults apart from requests that will never succeed.

use serde::Deserialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for mediakit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP 429 - the service asked us to slow down
    Throttled,
    /// 5xx responses and transport failures
    Transient,
    /// The resource or account does not exist
    NotFound,
    /// The resource exists or is in a conflicting state
    Conflict,
    /// The request body was rejected
    BadRequest,
    /// Credentials missing, expired, or lacking permission
    Auth,
    /// Anything else
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled | Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Throttled => "Request throttled",
            Self::Transient => "Transient service or network fault",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource conflict",
            Self::BadRequest => "Request rejected",
            Self::Auth => "Authentication or authorization failure",
            Self::Other => "Unexpected error",
        }
    }

    /// Map an HTTP status code to a category.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::Throttled,
            501 | 505 => Self::Other,
            408 | 500..=599 => Self::Transient,
            404 => Self::NotFound,
            409 | 412 => Self::Conflict,
            400 | 422 => Self::BadRequest,
            401 | 403 => Self::Auth,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Media Services or blob storage.
#[derive(Debug, Error)]
pub enum Error {
    /// The service answered with a non-success status.
    #[error("{code}: {message} (HTTP {status})")]
    Api {
        /// HTTP status code
        status: u16,
        /// Service error code (e.g. "ResourceNotFound")
        code: String,
        /// Service error message
        message: String,
    },

    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("network error: {message}")]
    Transport {
        /// Error message from the HTTP client
        message: String,
    },

    /// Token acquisition failed.
    #[error("authentication failed for tenant {tenant}: {message}")]
    Auth {
        /// Tenant the token was requested for
        tenant: String,
        /// Error description from the identity provider
        message: String,
    },

    /// A server-side blob copy ended in a non-success state.
    #[error("copy of blob {blob} ended with status {status}")]
    CopyFailed {
        /// Blob name
        blob: String,
        /// Final copy status (failed, aborted)
        status: String,
    },

    /// A long-running operation did not finish in time.
    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Configured timeout
        seconds: u64,
    },

    /// Provisioning of a long-running resource ended in failure.
    #[error("provisioning of {name} ended in state {state}")]
    Provisioning {
        /// Resource name
        name: String,
        /// Final provisioning state
        state: String,
    },

    /// JSON body could not be parsed or produced.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// XML body could not be parsed or produced.
    #[error("invalid XML: {0}")]
    Xml(String),

    /// A URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// IO error while streaming content.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an API error.
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build an error from a non-success response body.
    ///
    /// Understands the ARM JSON error envelope and the storage XML error
    /// body; anything else is kept as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<ArmErrorEnvelope>(body) {
            return Self::api(status, envelope.error.code, envelope.error.message);
        }

        let xml = body.trim_start_matches('\u{feff}');
        if let Ok(storage) = quick_xml::de::from_str::<StorageError>(xml) {
            return Self::api(status, storage.code, storage.message.unwrap_or_default());
        }

        let message = body.trim();
        let message = if message.is_empty() {
            format!("empty response body (HTTP {status})")
        } else {
            message.chars().take(512).collect()
        };

        Self::api(status, format!("Http{status}"), message)
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Api { status, .. } => ErrorCategory::from_status(*status),
            Error::Transport { .. } => ErrorCategory::Transient,
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::Io(_) => ErrorCategory::Transient,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Short machine-readable code for run logs.
    pub fn code(&self) -> &str {
        match self {
            Error::Api { code, .. } => code,
            Error::Transport { .. } => "NetworkError",
            Error::Auth { .. } => "AuthenticationFailed",
            Error::CopyFailed { .. } => "BlobCopyFailed",
            Error::Timeout { .. } => "Timeout",
            Error::Provisioning { .. } => "ProvisioningFailed",
            Error::Json(_) | Error::Xml(_) => "InvalidResponse",
            Error::Url(_) => "InvalidUrl",
            Error::Io(_) => "IoError",
            Error::Other(_) => "Error",
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => {
                Self::api(status, format!("Http{status}"), format!("HTTP {status}"))
            }
            ureq::Error::Io(e) => Self::Io(e),
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Xml(err.to_string())
    }
}

// =============================================================================
// Error bodies
// =============================================================================

#[derive(Debug, Deserialize)]
struct ArmErrorEnvelope {
    error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Error", rename_all = "PascalCase")]
struct StorageError {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_status() {
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::Throttled);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Transient);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(409), ErrorCategory::Conflict);
        assert_eq!(ErrorCategory::from_status(400), ErrorCategory::BadRequest);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(501), ErrorCategory::Other);
    }

    #[test]
    fn test_retryable_categories() {
        assert!(ErrorCategory::Throttled.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
    }

    #[test]
    fn test_from_response_arm_envelope() {
        let body = r#"{"error":{"code":"ResourceNotFound","message":"The Resource 'x' was not found."}}"#;
        let err = Error::from_response(404, body);

        assert_eq!(err.code(), "ResourceNotFound");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("was not found"));
    }

    #[test]
    fn test_from_response_storage_xml() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>ServerBusy</Code><Message>The server is busy.</Message></Error>";
        let err = Error::from_response(503, body);

        assert_eq!(err.code(), "ServerBusy");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_response_plain_text() {
        let err = Error::from_response(502, "Bad Gateway");
        assert_eq!(err.code(), "Http502");
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_auth_error_is_not_retried() {
        let err = Error::Auth {
            tenant: "t".into(),
            message: "AADSTS7000215: Invalid client secret".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "AuthenticationFailed");
    }
}
