//! Collections and the CRUD passthroughs.
//!
//! A [`Collection`] validates its inputs on the client side, then forwards them to the
//! engine with the applicable flags and write concern. Results and errors come back
//! unmodified.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer_core::options::{FindOptions, InsertFlags, UpdateFlags};
//! use bson::doc;
//!
//! let greetings = client.collection("app", "greetings");
//!
//! greetings.insert(doc! { "hello": "world" }, InsertFlags::empty()).await?;
//! greetings
//!     .update(doc! { "hello": "world" }, doc! { "$set": { "hello": "there" } }, UpdateFlags::empty(), None)
//!     .await?;
//!
//! let mut cursor = greetings.find(doc! { "hello": "there" }, FindOptions::new())?;
//! while let Some(document) = cursor.advance().await? {
//!     println!("{document}");
//! }
//! ```

use bson::{Document, doc};
use serde::Serialize;

use crate::{
    client::Client,
    cursor::Cursor,
    document::{encode, encoded_len, validate_keys, validate_update},
    engine::Engine,
    error::{ClientError, ClientResult, DriverError, ErrorDomain},
    options::{FindOptions, InsertFlags, Namespace, QueryFlags, RemoveFlags, UpdateFlags},
    write_concern::WriteConcern,
};

/// A collection on a connected client.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the client borrow
/// * `E` - The engine type
#[derive(Debug)]
pub struct Collection<'a, E: Engine> {
    namespace: Namespace,
    client: &'a Client<E>,
    write_concern: WriteConcern,
}

impl<'a, E: Engine> Collection<'a, E> {
    pub(crate) fn new(
        database: String,
        name: String,
        client: &'a Client<E>,
        write_concern: WriteConcern,
    ) -> Self {
        Self {
            namespace: Namespace::new(database, name),
            client,
            write_concern,
        }
    }

    pub fn name(&self) -> &str {
        &self.namespace.collection
    }

    pub fn database_name(&self) -> &str {
        &self.namespace.database
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn write_concern(&self) -> &WriteConcern {
        &self.write_concern
    }

    pub fn set_write_concern(&mut self, write_concern: WriteConcern) {
        self.write_concern = write_concern;
    }

    fn engine(&self) -> &'a E {
        self.client.engine()
    }

    fn checked_namespace(&self) -> ClientResult<&Namespace> {
        self.namespace.validate()?;
        Ok(&self.namespace)
    }

    fn checked_write_concern<'w>(
        &'w self,
        write_concern: Option<&'w WriteConcern>,
    ) -> ClientResult<&'w WriteConcern> {
        let write_concern = write_concern.unwrap_or(&self.write_concern);

        if !write_concern.is_valid() {
            return Err(DriverError::new(
                ErrorDomain::WriteConcern,
                DriverError::INVALID_WRITE_CONCERN,
                "journal or fsync requires an acknowledged write concern",
            )
            .into());
        }

        Ok(write_concern)
    }

    /// Inserts `document` into the collection.
    ///
    /// # Arguments
    ///
    /// * `document` - The document to insert. The engine adds an `_id` if missing.
    /// * `flags` - Insert flags. Unless `NO_VALIDATE` is set, keys starting with `$` or
    ///   containing `.` are rejected before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns a bson-domain [`DriverError`] for a rejected document, or the engine's
    /// error if the insert fails.
    pub async fn insert(&self, document: Document, flags: InsertFlags) -> ClientResult<()> {
        let namespace = self.checked_namespace()?;
        let write_concern = self.checked_write_concern(None)?;

        if !flags.contains(InsertFlags::NO_VALIDATE) {
            validate_keys(&document)?;
        }

        let size = encoded_len(&document)?;
        let max = self.client.max_bson_size();
        if size > max {
            return Err(DriverError::invalid_document(format!(
                "document is {size} bytes, larger than the maximum of {max}"
            ))
            .into());
        }

        tracing::debug!(%namespace, ?flags, "insert");

        Ok(self
            .engine()
            .insert(namespace, document, flags, write_concern)
            .await?)
    }

    /// Encodes `value` and inserts it.
    ///
    /// # Errors
    ///
    /// A value that does not encode as a document is a
    /// [`ClientError::Programming`] error.
    pub async fn insert_from<T: Serialize + ?Sized>(
        &self,
        value: &T,
        flags: InsertFlags,
    ) -> ClientResult<()> {
        self.insert(encode(value)?, flags).await
    }

    /// Starts a query. No round trip happens until the cursor is first advanced.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CursorUnavailable`] if the engine cannot construct a
    /// cursor for this query at all.
    pub fn find(&self, query: Document, options: FindOptions) -> ClientResult<Cursor<'a>> {
        let namespace = self.checked_namespace()?;

        tracing::debug!(%namespace, flags = ?options.flags, "opening cursor");

        self.engine()
            .open_cursor(namespace, query, &options)
            .map(Cursor::new)
            .ok_or_else(|| ClientError::CursorUnavailable(namespace.to_string()))
    }

    /// Returns the first document matching `query`, if any.
    pub async fn find_one(&self, query: Document) -> ClientResult<Option<Document>> {
        let mut cursor = self.find(query, FindOptions::builder().limit(1).build())?;

        Ok(cursor.advance().await?.cloned())
    }

    /// Updates the documents matching `selector`.
    ///
    /// # Arguments
    ///
    /// * `selector` - Query selecting the documents to update
    /// * `update` - Either only update operators (`{"$set": {...}}`) or a replacement
    ///   document; mixing both is rejected
    /// * `flags` - `UPSERT`, `MULTI_UPDATE`, `NO_VALIDATE`
    /// * `write_concern` - Overrides the collection's write concern
    pub async fn update(
        &self,
        selector: Document,
        update: Document,
        flags: UpdateFlags,
        write_concern: Option<&WriteConcern>,
    ) -> ClientResult<()> {
        let namespace = self.checked_namespace()?;
        let write_concern = self.checked_write_concern(write_concern)?;

        if !flags.contains(UpdateFlags::NO_VALIDATE) {
            validate_update(&update)?;
        }

        tracing::debug!(%namespace, ?flags, "update");

        Ok(self
            .engine()
            .update(namespace, selector, update, flags, write_concern)
            .await?)
    }

    /// Removes the documents matching `selector`, or only the first one with
    /// `SINGLE_REMOVE`.
    pub async fn delete(
        &self,
        selector: Document,
        flags: RemoveFlags,
        write_concern: Option<&WriteConcern>,
    ) -> ClientResult<()> {
        let namespace = self.checked_namespace()?;
        let write_concern = self.checked_write_concern(write_concern)?;

        tracing::debug!(%namespace, ?flags, "delete");

        Ok(self
            .engine()
            .remove(namespace, selector, flags, write_concern)
            .await?)
    }

    /// Counts the documents matching `query`, skipping `skip` and counting at most
    /// `limit` of them (0 = no limit).
    pub async fn count(
        &self,
        query: Document,
        flags: QueryFlags,
        skip: u64,
        limit: u64,
    ) -> ClientResult<u64> {
        let namespace = self.checked_namespace()?;

        Ok(self
            .engine()
            .count(namespace, query, flags, skip, limit)
            .await?)
    }

    /// Drops the collection.
    pub async fn drop(&self) -> ClientResult<()> {
        let namespace = self.checked_namespace()?;

        tracing::debug!(%namespace, "dropping collection");
        self.client
            .command(doc! { "drop": &namespace.collection }, &namespace.database)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::CursorHandle,
        host::HostListNode,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records what reaches the engine.
    #[derive(Debug, Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<(String, Document)>>,
        refuse_cursors: bool,
    }

    impl RecordingEngine {
        fn record(&self, call: String, payload: Document) {
            self.calls.lock().unwrap().push((call, payload));
        }

        fn calls(&self) -> Vec<(String, Document)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct EmptyHandle;

    #[async_trait]
    impl CursorHandle for EmptyHandle {
        async fn next(&mut self) -> Result<Option<Document>, DriverError> {
            Ok(None)
        }

        fn is_alive(&self) -> bool {
            false
        }

        fn more(&self) -> bool {
            false
        }

        fn host(&self) -> Option<&HostListNode> {
            None
        }

        fn duplicate(&self) -> Box<dyn CursorHandle> {
            Box::new(EmptyHandle)
        }
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        async fn execute(&self, command: Document, database: &str) -> Result<Document, DriverError> {
            self.record(format!("execute {database}"), command);
            Ok(doc! { "ok": 1.0 })
        }

        fn open_cursor(
            &self,
            namespace: &Namespace,
            _query: Document,
            _options: &FindOptions,
        ) -> Option<Box<dyn CursorHandle>> {
            self.record(format!("open_cursor {namespace}"), doc! {});
            (!self.refuse_cursors).then(|| Box::new(EmptyHandle) as Box<dyn CursorHandle>)
        }

        async fn insert(
            &self,
            namespace: &Namespace,
            document: Document,
            _flags: InsertFlags,
            write_concern: &WriteConcern,
        ) -> Result<(), DriverError> {
            self.record(
                format!("insert {namespace}"),
                doc! { "document": document, "writeConcern": write_concern.to_document() },
            );
            Ok(())
        }

        async fn update(
            &self,
            namespace: &Namespace,
            _selector: Document,
            _update: Document,
            _flags: UpdateFlags,
            _write_concern: &WriteConcern,
        ) -> Result<(), DriverError> {
            self.record(format!("update {namespace}"), doc! {});
            Ok(())
        }

        async fn remove(
            &self,
            namespace: &Namespace,
            _selector: Document,
            flags: RemoveFlags,
            _write_concern: &WriteConcern,
        ) -> Result<(), DriverError> {
            self.record(format!("remove {namespace}"), doc! { "flags": flags.bits() as i64 });
            Ok(())
        }

        async fn count(
            &self,
            _namespace: &Namespace,
            _query: Document,
            _flags: QueryFlags,
            _skip: u64,
            _limit: u64,
        ) -> Result<u64, DriverError> {
            Ok(7)
        }

        fn max_bson_size(&self) -> usize {
            64
        }
    }

    #[tokio::test]
    async fn test_insert_validates_keys_before_forwarding() {
        let client = Client::new(RecordingEngine::default());
        let collection = client.collection("app", "things");

        let err = collection
            .insert(doc! { "$where": 1 }, InsertFlags::empty())
            .await
            .unwrap_err();
        assert_eq!(err.driver_error().unwrap().domain, ErrorDomain::Bson);
        assert!(client.engine().calls().is_empty());

        collection
            .insert(doc! { "$where": 1 }, InsertFlags::NO_VALIDATE)
            .await
            .unwrap();
        assert_eq!(client.engine().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_oversized_document() {
        let client = Client::new(RecordingEngine::default());

        let err = client
            .collection("app", "things")
            .insert(doc! { "blob": "x".repeat(100) }, InsertFlags::empty())
            .await
            .unwrap_err();

        assert_eq!(err.driver_error().unwrap().code, DriverError::INVALID_DOCUMENT);
        assert!(client.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_write_concern_is_inherited() {
        let mut client = Client::new(RecordingEngine::default());
        client.set_write_concern(WriteConcern::majority(100));

        let collection = client.collection("app", "things");
        assert!(collection.write_concern().write_majority());

        collection.insert(doc! { "a": 1 }, InsertFlags::empty()).await.unwrap();
        assert_eq!(
            client.engine().calls(),
            vec![(
                "insert app.things".to_string(),
                doc! {
                    "document": { "a": 1 },
                    "writeConcern": { "w": "majority", "wtimeout": 100_i64 },
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_invalid_write_concern_is_rejected() {
        let client = Client::new(RecordingEngine::default());
        let collection = client.collection("app", "things");
        let mut write_concern = WriteConcern::unacknowledged();
        write_concern.set_journal(true);

        let err = collection
            .delete(doc! {}, RemoveFlags::empty(), Some(&write_concern))
            .await
            .unwrap_err();

        assert_eq!(err.driver_error().unwrap().domain, ErrorDomain::WriteConcern);
    }

    #[tokio::test]
    async fn test_update_rejects_mixed_documents() {
        let client = Client::new(RecordingEngine::default());
        let collection = client.collection("app", "things");

        let err = collection
            .update(doc! {}, doc! { "$set": { "a": 1 }, "b": 2 }, UpdateFlags::empty(), None)
            .await
            .unwrap_err();

        assert!(err.driver_error().is_some());
        assert!(client.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_find_reports_unavailable_cursor() {
        let client = Client::new(RecordingEngine {
            refuse_cursors: true,
            ..Default::default()
        });

        let err = client
            .collection("app", "things")
            .find(doc! {}, FindOptions::new())
            .unwrap_err();

        assert!(matches!(err, ClientError::CursorUnavailable(ns) if ns == "app.things"));
    }

    #[tokio::test]
    async fn test_invalid_namespace_never_reaches_engine() {
        let client = Client::new(RecordingEngine::default());

        let err = client
            .collection("bad db", "things")
            .count(doc! {}, QueryFlags::empty(), 0, 0)
            .await
            .unwrap_err();

        assert_eq!(err.driver_error().unwrap().domain, ErrorDomain::Namespace);
    }

    #[tokio::test]
    async fn test_drop_commands() {
        let client = Client::new(RecordingEngine::default());

        client.collection("app", "things").drop().await.unwrap();
        client.database("app").drop().await.unwrap();

        assert_eq!(
            client.engine().calls(),
            vec![
                ("execute app".to_string(), doc! { "drop": "things" }),
                ("execute app".to_string(), doc! { "dropDatabase": 1 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_from_encodes_value() {
        #[derive(Serialize)]
        struct Greeting<'s> {
            hello: &'s str,
        }

        let client = Client::new(RecordingEngine::default());
        let collection = client.collection("app", "greetings");

        collection
            .insert_from(&Greeting { hello: "world" }, InsertFlags::empty())
            .await
            .unwrap();
        let err = collection.insert_from(&5_i32, InsertFlags::empty()).await.unwrap_err();

        assert!(err.is_programming_error());
        assert_eq!(collection.count(doc! {}, QueryFlags::empty(), 0, 0).await.unwrap(), 7);
    }
}
