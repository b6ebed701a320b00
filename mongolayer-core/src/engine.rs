//! Engine abstraction: the contracts the client layer forwards its work to.
//!
//! An engine owns the wire protocol, transport, authentication and server selection.
//! The client layer never interprets documents; it validates inputs, forwards them to
//! the engine, and surfaces whatever the engine reports.
//!
//! # Traits
//!
//! - [`Engine`]: command execution, query issuance and the CRUD passthroughs
//! - [`CursorHandle`]: one server-side query execution context
//! - [`EngineBuilder`]: factory trait for creating engine instances
//!
//! # Examples
//!
//! ```ignore
//! use mongolayer_core::engine::Engine;
//! use bson::doc;
//!
//! let reply = engine.execute(doc! { "ping": 1 }, "admin").await?;
//! assert_eq!(reply.get_f64("ok")?, 1.0);
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Document;

use crate::{
    error::{ClientResult, DriverError},
    host::HostListNode,
    options::{FindOptions, InsertFlags, Namespace, QueryFlags, RemoveFlags, UpdateFlags},
    write_concern::WriteConcern,
};

/// Default maximum size of a BSON document accepted by the server.
pub const DEFAULT_MAX_BSON_SIZE: usize = 16 * 1024 * 1024;

/// Abstract interface for the database engine behind a client.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one engine is shared by a client and every
/// database, collection and cursor created from it.
///
/// # Error Handling
///
/// Every operation reports failures as a [`DriverError`] carrying the engine's
/// category, code and message. Nothing is retried at this layer.
#[async_trait]
pub trait Engine: Send + Sync + Debug {
    /// Runs `command` against `database` and returns the server's reply.
    ///
    /// At most one round trip is made.
    async fn execute(&self, command: Document, database: &str) -> Result<Document, DriverError>;

    /// Creates a cursor for `query` on `namespace`.
    ///
    /// No I/O happens here; the query is sent on the cursor's first
    /// [`CursorHandle::next`]. Returns `None` if no cursor can be constructed at all,
    /// which is distinct from a cursor that fails on its first round trip.
    fn open_cursor(
        &self,
        namespace: &Namespace,
        query: Document,
        options: &FindOptions,
    ) -> Option<Box<dyn CursorHandle>>;

    /// Inserts `document` into `namespace`.
    async fn insert(
        &self,
        namespace: &Namespace,
        document: Document,
        flags: InsertFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError>;

    /// Applies `update` to the documents in `namespace` matching `selector`.
    ///
    /// `update` is either an operator document (`{"$set": {...}}`) or a replacement
    /// document.
    async fn update(
        &self,
        namespace: &Namespace,
        selector: Document,
        update: Document,
        flags: UpdateFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError>;

    /// Removes the documents in `namespace` matching `selector`.
    async fn remove(
        &self,
        namespace: &Namespace,
        selector: Document,
        flags: RemoveFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError>;

    /// Counts the documents in `namespace` matching `query`. A `limit` of 0 counts
    /// everything after `skip`.
    async fn count(
        &self,
        namespace: &Namespace,
        query: Document,
        flags: QueryFlags,
        skip: u64,
        limit: u64,
    ) -> Result<u64, DriverError>;

    /// Largest document, in bytes, the server accepts.
    fn max_bson_size(&self) -> usize {
        DEFAULT_MAX_BSON_SIZE
    }

    /// Releases the engine's connections.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> ClientResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<E> Engine for Arc<E>
where
    E: Engine,
{
    async fn execute(&self, command: Document, database: &str) -> Result<Document, DriverError> {
        (**self).execute(command, database).await
    }

    fn open_cursor(
        &self,
        namespace: &Namespace,
        query: Document,
        options: &FindOptions,
    ) -> Option<Box<dyn CursorHandle>> {
        (**self).open_cursor(namespace, query, options)
    }

    async fn insert(
        &self,
        namespace: &Namespace,
        document: Document,
        flags: InsertFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        (**self)
            .insert(namespace, document, flags, write_concern)
            .await
    }

    async fn update(
        &self,
        namespace: &Namespace,
        selector: Document,
        update: Document,
        flags: UpdateFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        (**self)
            .update(namespace, selector, update, flags, write_concern)
            .await
    }

    async fn remove(
        &self,
        namespace: &Namespace,
        selector: Document,
        flags: RemoveFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        (**self)
            .remove(namespace, selector, flags, write_concern)
            .await
    }

    async fn count(
        &self,
        namespace: &Namespace,
        query: Document,
        flags: QueryFlags,
        skip: u64,
        limit: u64,
    ) -> Result<u64, DriverError> {
        (**self)
            .count(namespace, query, flags, skip, limit)
            .await
    }

    fn max_bson_size(&self) -> usize {
        (**self).max_bson_size()
    }
}

/// One server-side query execution context.
///
/// A handle is created unsent by [`Engine::open_cursor`]. Dropping it releases the
/// server-side cursor.
#[async_trait]
pub trait CursorHandle: Send + Debug {
    /// Fetches the next document, making a round trip when the local batch is empty.
    ///
    /// Returns `Ok(None)` when no document is currently available.
    async fn next(&mut self) -> Result<Option<Document>, DriverError>;

    /// The server's view of whether the cursor can still produce documents.
    fn is_alive(&self) -> bool;

    /// Whether another fetch is worth attempting.
    fn more(&self) -> bool;

    /// The host list the cursor is bound to, or `None` before the first round trip.
    fn host(&self) -> Option<&HostListNode>;

    /// Creates an unsent handle for the same query definition.
    fn duplicate(&self) -> Box<dyn CursorHandle>;
}

#[async_trait]
pub trait EngineBuilder {
    type Engine: Engine;

    async fn build(self) -> ClientResult<Self::Engine>;
}
