//! Error types and result types for client operations.
//!
//! Errors fall into three groups:
//!
//! - construction failures ([`ClientError::InvalidUri`], [`ClientError::CursorUnavailable`],
//!   [`ClientError::Initialization`]): a value could not be built from its inputs;
//! - operation failures ([`ClientError::Driver`] and friends): the engine or server reported
//!   an error, surfaced verbatim as a [`DriverError`];
//! - programming errors ([`ClientError::Programming`]): an internal invariant was violated,
//!   such as a value that cannot be encoded as a document.
//!
//! Nothing in this crate retries. Use [`ClientResult<T>`] as the return type for fallible
//! operations.

use std::fmt;

use bson::error::Error as BsonError;
use thiserror::Error;

/// Subsystem an engine error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    /// Client-side failure that never reached the server.
    Client,
    /// Network transport failure.
    Stream,
    /// Wire protocol violation.
    Protocol,
    /// Cursor misuse or cursor lifecycle failure.
    Cursor,
    /// Invalid database or collection name.
    Namespace,
    /// A document could not be validated or encoded.
    Bson,
    /// No suitable server could be selected.
    ServerSelection,
    /// Authentication failed.
    Authentication,
    /// The write concern could not be satisfied.
    WriteConcern,
    /// Error reported by the server for a query, command or write.
    Server,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorDomain::Client => "client",
            ErrorDomain::Stream => "stream",
            ErrorDomain::Protocol => "protocol",
            ErrorDomain::Cursor => "cursor",
            ErrorDomain::Namespace => "namespace",
            ErrorDomain::Bson => "bson",
            ErrorDomain::ServerSelection => "server selection",
            ErrorDomain::Authentication => "authentication",
            ErrorDomain::WriteConcern => "write concern",
            ErrorDomain::Server => "server",
        };

        f.write_str(name)
    }
}

/// An error reported by an engine, carried to the caller unmodified.
///
/// `code` is the engine's or server's numeric code for the failure. For
/// [`ErrorDomain::Server`] errors it is the server error code (e.g. `11000` for a
/// duplicate key).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{domain} error {code}: {message}")]
pub struct DriverError {
    pub domain: ErrorDomain,
    pub code: i32,
    pub message: String,
}

impl DriverError {
    /// Code for advancing a cursor that has already completed.
    pub const INVALID_CURSOR: i32 = 1;
    /// Code for a document rejected by client-side validation.
    pub const INVALID_DOCUMENT: i32 = 2;
    /// Code for a malformed database or collection name.
    pub const INVALID_NAMESPACE: i32 = 3;
    /// Code for a write concern that requests journaling or fsync without acknowledgment.
    pub const INVALID_WRITE_CONCERN: i32 = 4;

    pub fn new(domain: ErrorDomain, code: i32, message: impl Into<String>) -> Self {
        Self {
            domain,
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an error reported by the server itself.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorDomain::Server, code, message)
    }

    pub(crate) fn completed_cursor() -> Self {
        Self::new(
            ErrorDomain::Cursor,
            Self::INVALID_CURSOR,
            "Cannot advance a completed cursor",
        )
    }

    pub(crate) fn invalid_document(message: impl Into<String>) -> Self {
        Self::new(ErrorDomain::Bson, Self::INVALID_DOCUMENT, message)
    }

    pub(crate) fn invalid_namespace(message: impl Into<String>) -> Self {
        Self::new(ErrorDomain::Namespace, Self::INVALID_NAMESPACE, message)
    }
}

/// Represents all possible errors returned by the client layer.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The connection string does not follow the MongoDB URI grammar.
    #[error("Invalid connection string: {0}")]
    InvalidUri(String),
    /// The engine could not construct a cursor for the given namespace.
    #[error("Could not create a cursor for namespace {0}")]
    CursorUnavailable(String),
    /// The engine could not be initialized.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The engine or server reported an error.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// The cursor has not produced a document yet.
    #[error("The cursor has no current document")]
    NoCurrentDocument,
    /// A document returned by the server could not be decoded into the requested type.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An internal invariant was violated. Not recoverable by retrying.
    #[error("Programming error: {0}")]
    Programming(String),
}

impl ClientError {
    /// Returns the engine error if this is an operation failure.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            ClientError::Driver(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_programming_error(&self) -> bool {
        matches!(self, ClientError::Programming(_))
    }
}

/// A specialized `Result` type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl From<BsonError> for ClientError {
    fn from(err: BsonError) -> Self {
        ClientError::Serialization(err.to_string())
    }
}
