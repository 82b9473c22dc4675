//! Error Types
//!
//! Typed failures for the link index, the repository API, direct record
//! resolution and configuration loading.

use thiserror::Error;

/// Failures talking to the link index.
#[derive(Debug, Error)]
pub enum LinkIndexError {
    #[error("link index is disabled in configuration")]
    Disabled,

    #[error("link query target must not be empty")]
    EmptyTarget,

    #[error("link index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("link index returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("link index response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures from the authoritative repository API.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The handle, profile or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("repository request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("repository call {method} failed with {status}: {error}: {message}")]
    Xrpc {
        method: String,
        status: u16,
        error: String,
        message: String,
    },

    #[error("repository response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }

    /// Everything except a definite "does not exist" is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !self.is_not_found()
    }
}

/// A record failed the schema check for its record type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("unexpected record type '{found}', expected '{expected}'")]
    WrongType { expected: String, found: String },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("field '{field}' exceeds {limit} {unit}")]
    TooLong {
        field: &'static str,
        limit: usize,
        unit: &'static str,
    },

    #[error("no schema known for collection '{0}'")]
    UnsupportedCollection(String),
}

/// Why a direct fetch produced no record.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid at-uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("could not resolve handle '{handle}': {source}")]
    Handle {
        handle: String,
        #[source]
        source: RepoError,
    },

    #[error("could not fetch profile for {did}: {source}")]
    Profile {
        did: String,
        #[source]
        source: RepoError,
    },

    #[error("could not fetch record {uri}: {source}")]
    Record {
        uri: String,
        #[source]
        source: RepoError,
    },

    #[error("record {uri} failed validation: {source}")]
    Validation {
        uri: String,
        #[source]
        source: ValidationError,
    },
}

/// Failures building or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not build http client: {0}")]
    Client(#[from] reqwest::Error),
}
