//! Convenient re-exports of commonly used types from mongolayer.
//!
//! ```ignore
//! use mongolayer::prelude::*;
//! ```

pub use mongolayer_core::{
    client::Client,
    collection::Collection,
    cursor::{Cursor, CursorState},
    database::Database,
    document::DocumentExt,
    engine::{CursorHandle, Engine, EngineBuilder},
    error::{ClientError, ClientResult, DriverError, ErrorDomain},
    host::Host,
    options::{FindOptions, InsertFlags, Namespace, QueryFlags, RemoveFlags, UpdateFlags},
    uri::Uri,
    write_concern::{Acknowledgment, WriteConcern},
};
