//! Server error codes reported by the in-memory engine.
//!
//! Codes match the ones a MongoDB server reports for the same failure, so callers can
//! handle both engines alike.

use mongolayer_core::error::{DriverError, ErrorDomain};

pub const BAD_VALUE: i32 = 2;
pub const HOST_UNREACHABLE: i32 = 6;
pub const FAILED_TO_PARSE: i32 = 9;
pub const TYPE_MISMATCH: i32 = 14;
pub const NAMESPACE_NOT_FOUND: i32 = 26;
pub const PATH_NOT_VIABLE: i32 = 28;
pub const NAMESPACE_EXISTS: i32 = 48;
pub const COMMAND_NOT_FOUND: i32 = 59;
pub const IMMUTABLE_FIELD: i32 = 66;
pub const DUPLICATE_KEY: i32 = 11000;

pub(crate) fn bad_value(message: impl Into<String>) -> DriverError {
    DriverError::server(BAD_VALUE, message)
}

pub(crate) fn failed_to_parse(message: impl Into<String>) -> DriverError {
    DriverError::server(FAILED_TO_PARSE, message)
}

pub(crate) fn type_mismatch(message: impl Into<String>) -> DriverError {
    DriverError::server(TYPE_MISMATCH, message)
}

pub(crate) fn shut_down() -> DriverError {
    DriverError::new(
        ErrorDomain::Stream,
        HOST_UNREACHABLE,
        "the in-memory engine has been shut down",
    )
}
