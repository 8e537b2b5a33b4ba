//! Error types for site-migrate
//!
//! Every failure the engine can hit is a variant of [`Error`]. Most of them are
//! item- or page-scoped: the orchestrator logs them and moves on to the next unit
//! of work. Only [`Error::Authentication`] is fatal to a whole task.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for site-migrate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for site-migrate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "upload.chunk_size")
        key: Option<String>,
    },

    /// Sign-in was rejected or its response could not be used
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Why the sign-in failed
        reason: String,
    },

    /// A signed request was attempted before sign-in succeeded
    #[error("no authenticated session; sign in before issuing signed requests")]
    NotSignedIn,

    /// A URL template still carries placeholder markers after substitution
    #[error("URL template '{endpoint}' is incomplete: {url}")]
    TemplateIncomplete {
        /// Name of the endpoint template
        endpoint: String,
        /// The partially substituted URL
        url: String,
    },

    /// The content URL does not match any known server URL shape
    #[error("unrecognized content URL format: {url}")]
    UnrecognizedUrlFormat {
        /// The URL that could not be parsed
        url: String,
    },

    /// One page of a paginated listing could not be fetched
    #[error("failed to fetch page {page} of {collection}: {source}")]
    PageFetch {
        /// The collection being listed (e.g., "workbooks")
        collection: String,
        /// One-based page number
        page: u32,
        /// The underlying request failure
        #[source]
        source: Box<Error>,
    },

    /// A record in a server response could not be decoded
    #[error("failed to parse {kind} record: {reason}")]
    RecordParse {
        /// The record kind (e.g., "workbook", "project")
        kind: String,
        /// What was wrong with the record
        reason: String,
    },

    /// The server returned a document that does not have the expected shape
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// The server answered a request with a non-success status
    #[error("request to {url} failed with status {status}: {body}")]
    RequestFailed {
        /// The request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// A content download failed
    #[error("download of '{name}' failed: {reason}")]
    Download {
        /// Name of the item being downloaded
        name: String,
        /// Why the download failed
        reason: String,
    },

    /// One phase of the chunked upload protocol failed
    #[error("upload {phase} failed (session {}): {reason}", .session_id.as_deref().unwrap_or("none"))]
    UploadProtocol {
        /// The protocol phase that failed
        phase: UploadPhase,
        /// Server-assigned upload session, when one exists
        session_id: Option<String>,
        /// Why the phase failed
        reason: String,
    },

    /// A chunk exceeds the configured maximum chunk size
    #[error("chunk of {size} bytes exceeds the maximum of {max} bytes")]
    ChunkTooLarge {
        /// Size of the rejected chunk
        size: usize,
        /// Maximum accepted chunk size
        max: usize,
    },

    /// Removing a tag from an item failed
    #[error("failed to remove tag '{tag}' from {item_id}: {reason}")]
    TagMutation {
        /// The item the tag was being removed from
        item_id: String,
        /// The tag being removed
        tag: String,
        /// Why the removal failed
        reason: String,
    },

    /// The import source directory is missing or lacks the expected layout
    #[error("invalid import directory {}: {reason}", .path.display())]
    DirectoryValidation {
        /// The directory that failed validation
        path: PathBuf,
        /// What is missing
        reason: String,
    },

    /// The task was aborted before this step ran
    #[error("task aborted")]
    Aborted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Phase of the chunked upload protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Opening an upload session
    Initiate,
    /// Sending one chunk
    Append,
    /// Committing the session as published content
    Finalize,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Initiate => write!(f, "initiate"),
            UploadPhase::Append => write!(f, "append"),
            UploadPhase::Finalize => write!(f, "finalize"),
        }
    }
}

impl Error {
    /// Machine-readable error code, used to tag error log entries
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Authentication { .. } => "authentication_failure",
            Error::NotSignedIn => "not_signed_in",
            Error::TemplateIncomplete { .. } => "template_incomplete",
            Error::UnrecognizedUrlFormat { .. } => "unrecognized_url_format",
            Error::PageFetch { .. } => "page_fetch_error",
            Error::RecordParse { .. } => "record_parse_error",
            Error::InvalidResponse(_) => "invalid_response",
            Error::RequestFailed { .. } => "request_failed",
            Error::Download { .. } => "download_error",
            Error::UploadProtocol { .. } => "upload_protocol_error",
            Error::ChunkTooLarge { .. } => "chunk_too_large",
            Error::TagMutation { .. } => "tag_mutation_error",
            Error::DirectoryValidation { .. } => "directory_validation_error",
            Error::Aborted => "aborted",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Shorthand for a [`Error::RecordParse`]
    pub(crate) fn record(kind: &str, reason: impl Into<String>) -> Self {
        Error::RecordParse {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Config`] tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, &'static str)> {
        vec![
            (Error::config("upload.chunk_size", "must be > 0"), "config_error"),
            (
                Error::Authentication {
                    reason: "401".into(),
                },
                "authentication_failure",
            ),
            (Error::NotSignedIn, "not_signed_in"),
            (
                Error::TemplateIncomplete {
                    endpoint: "workbooks-list".into(),
                    url: "https://h/api/2.0/sites/{{siteId}}".into(),
                },
                "template_incomplete",
            ),
            (
                Error::UnrecognizedUrlFormat {
                    url: "https://h/x".into(),
                },
                "unrecognized_url_format",
            ),
            (
                Error::PageFetch {
                    collection: "workbooks".into(),
                    page: 2,
                    source: Box::new(Error::Other("boom".into())),
                },
                "page_fetch_error",
            ),
            (Error::record("workbook", "missing id"), "record_parse_error"),
            (Error::InvalidResponse("empty".into()), "invalid_response"),
            (
                Error::RequestFailed {
                    url: "https://h".into(),
                    status: 500,
                    body: String::new(),
                },
                "request_failed",
            ),
            (
                Error::Download {
                    name: "Sales".into(),
                    reason: "timeout".into(),
                },
                "download_error",
            ),
            (
                Error::UploadProtocol {
                    phase: UploadPhase::Append,
                    session_id: Some("abc".into()),
                    reason: "reset".into(),
                },
                "upload_protocol_error",
            ),
            (Error::ChunkTooLarge { size: 10, max: 5 }, "chunk_too_large"),
            (
                Error::TagMutation {
                    item_id: "1".into(),
                    tag: "t".into(),
                    reason: "404".into(),
                },
                "tag_mutation_error",
            ),
            (
                Error::DirectoryValidation {
                    path: PathBuf::from("/import"),
                    reason: "missing".into(),
                },
                "directory_validation_error",
            ),
            (Error::Aborted, "aborted"),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                "io_error",
            ),
            (Error::Other("x".into()), "internal_error"),
        ]
    }

    #[test]
    fn every_variant_has_a_stable_code() {
        for (error, code) in all_error_variants() {
            assert_eq!(error.code(), code, "wrong code for {error}");
        }
    }

    #[test]
    fn upload_error_message_carries_phase_and_session() {
        let err = Error::UploadProtocol {
            phase: UploadPhase::Finalize,
            session_id: Some("sess-42".into()),
            reason: "status 500".into(),
        };
        let text = err.to_string();
        assert!(text.contains("finalize"));
        assert!(text.contains("sess-42"));

        let err = Error::UploadProtocol {
            phase: UploadPhase::Initiate,
            session_id: None,
            reason: "refused".into(),
        };
        assert!(err.to_string().contains("session none"));
    }

    #[test]
    fn page_fetch_exposes_its_source() {
        use std::error::Error as _;
        let err = Error::PageFetch {
            collection: "projects".into(),
            page: 3,
            source: Box::new(Error::Other("socket closed".into())),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("page 3 of projects"));
    }
}
