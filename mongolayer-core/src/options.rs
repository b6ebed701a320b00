//! Operation flags and find options.
//!
//! Each write and query operation takes a closed set of flags combined as a bitmask.
//! Query-time settings that are not flags live in [`FindOptions`], built fluently:
//!
//! ```ignore
//! use mongolayer_core::options::{FindOptions, QueryFlags};
//! use bson::doc;
//!
//! let options = FindOptions::builder()
//!     .flags(QueryFlags::TAILABLE_CURSOR | QueryFlags::AWAIT_DATA)
//!     .skip(10)
//!     .limit(20)
//!     .projection(doc! { "name": 1 })
//!     .build();
//! ```

use std::fmt;

use bitflags::bitflags;
use bson::Document;

use crate::error::DriverError;

bitflags! {
    /// Flags controlling how a query cursor behaves.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueryFlags: u32 {
        /// Keep the cursor open after the last document of a capped collection.
        const TAILABLE_CURSOR = 1 << 1;
        /// Allow the query to run on a secondary.
        const SLAVE_OK = 1 << 2;
        /// Replay an oplog collection efficiently.
        const OPLOG_REPLAY = 1 << 3;
        /// Do not let the server time out an idle cursor.
        const NO_CURSOR_TIMEOUT = 1 << 4;
        /// With `TAILABLE_CURSOR`, block for a while waiting for more data.
        const AWAIT_DATA = 1 << 5;
        /// Stream all batches without waiting for `getMore` requests.
        const EXHAUST = 1 << 6;
        /// Return partial results if some shards are down.
        const PARTIAL = 1 << 7;
    }
}

bitflags! {
    /// Flags for inserting documents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InsertFlags: u32 {
        /// Keep inserting the rest of a batch after a failed document.
        const CONTINUE_ON_ERROR = 1;
        /// Skip client-side key validation.
        const NO_VALIDATE = 1 << 31;
    }
}

bitflags! {
    /// Flags for updating documents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UpdateFlags: u32 {
        /// Insert a document built from the selector when nothing matches.
        const UPSERT = 1;
        /// Update every matching document instead of the first.
        const MULTI_UPDATE = 1 << 1;
        /// Skip client-side validation of the update document.
        const NO_VALIDATE = 1 << 31;
    }
}

bitflags! {
    /// Flags for removing documents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RemoveFlags: u32 {
        /// Remove at most one matching document.
        const SINGLE_REMOVE = 1;
    }
}

/// A fully qualified collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Checks the names against the server's naming rules.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.database.is_empty() {
            return Err(DriverError::invalid_namespace("database name must not be empty"));
        }
        if let Some(c) = self
            .database
            .chars()
            .find(|&c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$' | '\0'))
        {
            return Err(DriverError::invalid_namespace(format!(
                "database name '{}' contains '{c}'",
                self.database
            )));
        }
        if self.collection.is_empty() {
            return Err(DriverError::invalid_namespace("collection name must not be empty"));
        }
        if self.collection.contains(['$', '\0']) {
            return Err(DriverError::invalid_namespace(format!(
                "collection name '{}' contains an invalid character",
                self.collection
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Settings for a query. A value of 0 for `skip`, `limit` or `batch_size` leaves the
/// setting to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub flags: QueryFlags,
    pub skip: u32,
    pub limit: u32,
    pub batch_size: u32,
    /// Fields to include or exclude from returned documents.
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }

    pub fn is_tailable(&self) -> bool {
        self.flags.contains(QueryFlags::TAILABLE_CURSOR)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `flags` to the flags already set.
    pub fn flags(mut self, flags: QueryFlags) -> Self {
        self.options.flags |= flags;
        self
    }

    /// Sets the number of documents to skip before the first returned one.
    pub fn skip(mut self, skip: u32) -> Self {
        self.options.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u32) -> Self {
        self.options.limit = limit;
        self
    }

    /// Sets the number of documents fetched per round trip.
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}
