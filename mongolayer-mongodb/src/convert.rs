//! Conversions between mongolayer values and the `mongodb` driver's types.

use std::time::Duration;

use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        Acknowledgment as MongoAcknowledgment, CursorType, FindOptions as MongoFindOptions,
        WriteConcern as MongoWriteConcern,
    },
};

use mongolayer_core::{
    error::{DriverError, ErrorDomain},
    options::{FindOptions, QueryFlags},
    write_concern::{Acknowledgment, WriteConcern},
};

/// Code used for driver failures that carry no server code.
pub const UNKNOWN_ERROR: i32 = 8;

/// Maps a driver error onto a [`DriverError`], keeping the server's code where there is one.
pub fn driver_error(err: MongoError) -> DriverError {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => DriverError::server(command.code, command.message.clone()),
        ErrorKind::Write(WriteFailure::WriteError(write)) => {
            DriverError::server(write.code, write.message.clone())
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(concern)) => {
            DriverError::new(ErrorDomain::WriteConcern, concern.code, concern.message.clone())
        }
        ErrorKind::Io(_) => DriverError::new(ErrorDomain::Stream, UNKNOWN_ERROR, err.to_string()),
        ErrorKind::ServerSelection { .. } => {
            DriverError::new(ErrorDomain::ServerSelection, UNKNOWN_ERROR, err.to_string())
        }
        ErrorKind::Authentication { .. } => {
            DriverError::new(ErrorDomain::Authentication, UNKNOWN_ERROR, err.to_string())
        }
        _ => DriverError::new(ErrorDomain::Client, UNKNOWN_ERROR, err.to_string()),
    }
}

/// The driver's write concern for `write_concern`.
///
/// The driver has no `fsync` option; an fsync request is sent as a journaled write.
pub fn write_concern(write_concern: &WriteConcern) -> MongoWriteConcern {
    let mut converted = MongoWriteConcern::default();

    converted.w = match write_concern.write() {
        Acknowledgment::Default => None,
        Acknowledgment::Nodes(nodes) => Some(MongoAcknowledgment::Nodes(*nodes)),
        Acknowledgment::Majority => Some(MongoAcknowledgment::Majority),
        Acknowledgment::Tag(tag) => Some(MongoAcknowledgment::Custom(tag.clone())),
    };
    converted.journal = match (write_concern.journal_option(), write_concern.fsync()) {
        (_, true) => Some(true),
        (journal, false) => journal,
    };
    converted.w_timeout = match write_concern.write_timeout() {
        0 => None,
        ms => Some(Duration::from_millis(u64::from(ms))),
    };

    converted
}

/// The driver's find options for `options`.
pub fn find_options(options: &FindOptions) -> MongoFindOptions {
    let mut converted = MongoFindOptions::default();
    let flags = options.flags;

    if flags.contains(QueryFlags::TAILABLE_CURSOR) {
        converted.cursor_type = Some(if flags.contains(QueryFlags::AWAIT_DATA) {
            CursorType::TailableAwait
        } else {
            CursorType::Tailable
        });
    }
    if flags.contains(QueryFlags::NO_CURSOR_TIMEOUT) {
        converted.no_cursor_timeout = Some(true);
    }
    if flags.contains(QueryFlags::PARTIAL) {
        converted.allow_partial_results = Some(true);
    }
    if options.skip > 0 {
        converted.skip = Some(u64::from(options.skip));
    }
    if options.limit > 0 {
        converted.limit = Some(i64::from(options.limit));
    }
    if options.batch_size > 0 {
        converted.batch_size = Some(options.batch_size);
    }
    converted.projection = options.projection.clone();

    converted
}
