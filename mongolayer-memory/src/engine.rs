//! In-memory engine implementation.
//!
//! Documents are kept per database and collection in insertion order, behind an
//! async-aware read-write lock. Queries scan the whole collection; there are no indexes
//! besides the implicit unique `_id`.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mea::rwlock::RwLock;

use mongolayer_core::{
    document::is_operator_document,
    engine::{CursorHandle, DEFAULT_MAX_BSON_SIZE, Engine, EngineBuilder},
    error::{ClientError, ClientResult, DriverError},
    host::{AddressFamily, HostListNode},
    options::{FindOptions, InsertFlags, Namespace, QueryFlags, RemoveFlags, UpdateFlags},
    uri::DEFAULT_PORT,
    write_concern::WriteConcern,
};

use crate::{
    cursor::MemoryCursor,
    error::{
        COMMAND_NOT_FOUND, DUPLICATE_KEY, NAMESPACE_EXISTS, NAMESPACE_NOT_FOUND, bad_value,
        failed_to_parse, shut_down,
    },
    matcher::matches,
    update::{apply, upsert_document, with_generated_id},
};

pub(crate) type CollectionData = Vec<Document>;
type DatabaseMap = HashMap<String, CollectionData>;
type StoreMap = HashMap<String, DatabaseMap>;

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) store: RwLock<StoreMap>,
    pub(crate) host: HostListNode,
    max_bson_size: usize,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(shut_down());
        }
        Ok(())
    }
}

/// Thread-safe in-memory engine.
///
/// `InMemoryEngine` is cloneable and uses an `Arc`-wrapped internal state; clones share
/// the same data. Shutting down any clone closes all of them.
///
/// # Example
///
/// ```ignore
/// use mongolayer_core::{client::Client, options::InsertFlags};
/// use mongolayer_memory::InMemoryEngine;
/// use bson::doc;
///
/// let client = Client::new(InMemoryEngine::new());
/// client
///     .collection("app", "users")
///     .insert(doc! { "name": "alice" }, InsertFlags::empty())
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryEngine {
    shared: Arc<Shared>,
}

impl InMemoryEngine {
    /// Creates an empty engine reporting itself as `localhost:27017`.
    pub fn new() -> Self {
        let host = HostListNode::new("localhost", DEFAULT_PORT, AddressFamily::Inet)
            .unwrap_or_else(HostListNode::unbound);

        Self::with_parts(host, DEFAULT_MAX_BSON_SIZE)
    }

    fn with_parts(host: HostListNode, max_bson_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: RwLock::new(StoreMap::new()),
                host,
                max_bson_size,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn builder() -> InMemoryEngineBuilder {
        InMemoryEngineBuilder::default()
    }

    /// Names of the collections in `database`, sorted.
    pub async fn collection_names(&self, database: &str) -> Vec<String> {
        let store = self.shared.store.read().await;
        let mut names = store
            .get(database)
            .map(|collections| collections.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();

        names
    }

    fn ok(reply: Document) -> Document {
        reply.into_iter().chain([("ok".to_string(), Bson::Double(1.0))]).collect()
    }

    async fn create(&self, database: &str, name: &str) -> Result<Document, DriverError> {
        let mut store = self.shared.store.write().await;
        let collections = store.entry(database.to_string()).or_default();

        if collections.contains_key(name) {
            return Err(DriverError::server(
                NAMESPACE_EXISTS,
                format!("Collection {database}.{name} already exists."),
            ));
        }
        collections.insert(name.to_string(), CollectionData::new());

        Ok(Self::ok(doc! {}))
    }

    async fn drop_collection(&self, database: &str, name: &str) -> Result<Document, DriverError> {
        let mut store = self.shared.store.write().await;

        match store.get_mut(database).and_then(|collections| collections.remove(name)) {
            Some(_) => Ok(Self::ok(doc! { "ns": format!("{database}.{name}") })),
            None => Err(DriverError::server(NAMESPACE_NOT_FOUND, "ns not found")),
        }
    }

    async fn drop_database(&self, database: &str) -> Result<Document, DriverError> {
        self.shared.store.write().await.remove(database);

        Ok(Self::ok(doc! { "dropped": database }))
    }

    fn write_result(
        result: Result<(), DriverError>,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        match result {
            Err(err) if !write_concern.is_acknowledged() => {
                tracing::debug!(error = %err, "unacknowledged write failed");
                Ok(())
            }
            result => result,
        }
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn name_argument<'a>(command: &'a Document, key: &str) -> Result<&'a str, DriverError> {
    match command.get(key) {
        Some(Bson::String(name)) if !name.is_empty() => Ok(name),
        _ => Err(bad_value(format!("'{key}' must be a non-empty collection name"))),
    }
}

fn duplicate_key(namespace: &Namespace, id: &Bson) -> DriverError {
    DriverError::server(
        DUPLICATE_KEY,
        format!(
            "E11000 duplicate key error collection: {namespace} index: _id_ dup key: {{ _id: {id} }}"
        ),
    )
}

fn insert_unique(
    collection: &mut CollectionData,
    namespace: &Namespace,
    document: Document,
) -> Result<(), DriverError> {
    let document = match document.get("_id") {
        Some(_) => document,
        None => with_generated_id(document),
    };

    if let Some(id) = document.get("_id") {
        if collection.iter().any(|existing| existing.get("_id") == Some(id)) {
            return Err(duplicate_key(namespace, id));
        }
    }

    collection.push(document);

    Ok(())
}

/// Indices of the documents in `collection` matching `filter`, in insertion order.
fn matching_indices(
    collection: &CollectionData,
    filter: &Document,
) -> Result<Vec<usize>, DriverError> {
    let mut indices = Vec::new();

    for (index, document) in collection.iter().enumerate() {
        if matches(document, filter)? {
            indices.push(index);
        }
    }

    Ok(indices)
}

fn update_documents(
    collection: &mut CollectionData,
    namespace: &Namespace,
    selector: &Document,
    update: &Document,
    flags: UpdateFlags,
) -> Result<(), DriverError> {
    let mut indices = matching_indices(collection, selector)?;

    if indices.is_empty() {
        if !flags.contains(UpdateFlags::UPSERT) {
            return Ok(());
        }
        tracing::trace!(%namespace, "upserting document");
        return insert_unique(collection, namespace, upsert_document(selector, update)?);
    }

    if !flags.contains(UpdateFlags::MULTI_UPDATE) {
        indices.truncate(1);
    }

    for index in indices {
        apply(&mut collection[index], update)?;
    }

    Ok(())
}

#[async_trait]
impl Engine for InMemoryEngine {
    async fn execute(&self, command: Document, database: &str) -> Result<Document, DriverError> {
        self.shared.ensure_open()?;

        let Some(name) = command.keys().next().cloned() else {
            return Err(failed_to_parse("empty command document"));
        };

        tracing::debug!(database, command = %name, "executing command");

        match name.as_str() {
            "ping" => Ok(Self::ok(doc! {})),
            "hello" | "isMaster" | "ismaster" => Ok(Self::ok(doc! {
                "isWritablePrimary": true,
                "ismaster": true,
                "maxBsonObjectSize": i64::try_from(self.shared.max_bson_size).unwrap_or(i64::MAX),
                "me": self.shared.host.decode_host_and_port(),
            })),
            "create" => self.create(database, name_argument(&command, "create")?).await,
            "drop" => self.drop_collection(database, name_argument(&command, "drop")?).await,
            "dropDatabase" => self.drop_database(database).await,
            "listCollections" => {
                let batch = self
                    .collection_names(database)
                    .await
                    .into_iter()
                    .map(|name| Bson::Document(doc! { "name": name, "type": "collection" }))
                    .collect::<Vec<_>>();

                Ok(Self::ok(doc! {
                    "cursor": {
                        "id": 0_i64,
                        "ns": format!("{database}.$cmd.listCollections"),
                        "firstBatch": batch,
                    }
                }))
            }
            other => Err(DriverError::server(
                COMMAND_NOT_FOUND,
                format!("no such command: '{other}'"),
            )),
        }
    }

    fn open_cursor(
        &self,
        namespace: &Namespace,
        query: Document,
        options: &FindOptions,
    ) -> Option<Box<dyn CursorHandle>> {
        if self.shared.ensure_open().is_err() {
            tracing::warn!(%namespace, "cursor requested from a shut down engine");
            return None;
        }

        Some(Box::new(MemoryCursor::new(
            Arc::clone(&self.shared),
            namespace.clone(),
            query,
            options.clone(),
        )))
    }

    async fn insert(
        &self,
        namespace: &Namespace,
        document: Document,
        _flags: InsertFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        self.shared.ensure_open()?;

        let mut store = self.shared.store.write().await;
        let collection = store
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default();

        Self::write_result(insert_unique(collection, namespace, document), write_concern)
    }

    async fn update(
        &self,
        namespace: &Namespace,
        selector: Document,
        update: Document,
        flags: UpdateFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        self.shared.ensure_open()?;

        if flags.contains(UpdateFlags::MULTI_UPDATE) && !is_operator_document(&update) {
            return Self::write_result(
                Err(failed_to_parse("multi update is not supported for replacement-style update")),
                write_concern,
            );
        }

        let mut store = self.shared.store.write().await;
        let exists = store
            .get(&namespace.database)
            .is_some_and(|collections| collections.contains_key(&namespace.collection));
        if !exists && !flags.contains(UpdateFlags::UPSERT) {
            return Self::write_result(Ok(()), write_concern);
        }

        let collection = store
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default();

        let result = update_documents(collection, namespace, &selector, &update, flags);

        Self::write_result(result, write_concern)
    }

    async fn remove(
        &self,
        namespace: &Namespace,
        selector: Document,
        flags: RemoveFlags,
        write_concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        self.shared.ensure_open()?;

        let mut store = self.shared.store.write().await;
        let Some(collection) = store
            .get_mut(&namespace.database)
            .and_then(|collections| collections.get_mut(&namespace.collection))
        else {
            return Ok(());
        };

        let result = matching_indices(collection, &selector).map(|mut indices| {
            if flags.contains(RemoveFlags::SINGLE_REMOVE) {
                indices.truncate(1);
            }
            for index in indices.into_iter().rev() {
                collection.remove(index);
            }
        });

        Self::write_result(result, write_concern)
    }

    async fn count(
        &self,
        namespace: &Namespace,
        query: Document,
        _flags: QueryFlags,
        skip: u64,
        limit: u64,
    ) -> Result<u64, DriverError> {
        self.shared.ensure_open()?;

        let store = self.shared.store.read().await;
        let Some(collection) = store
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
        else {
            return Ok(0);
        };

        let matched = matching_indices(collection, &query)?.len() as u64;
        let remaining = matched.saturating_sub(skip);

        Ok(match limit {
            0 => remaining,
            limit => remaining.min(limit),
        })
    }

    fn max_bson_size(&self) -> usize {
        self.shared.max_bson_size
    }

    async fn shutdown(self) -> ClientResult<()> {
        self.shared.closed.store(true, Ordering::Release);
        tracing::debug!("in-memory engine shut down");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryEngine`] instances.
///
/// # Example
///
/// ```ignore
/// use mongolayer_memory::InMemoryEngine;
/// use mongolayer_core::engine::EngineBuilder;
///
/// let engine = InMemoryEngine::builder()
///     .host("db.internal", 27018)
///     .max_bson_size(1024 * 1024)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryEngineBuilder {
    host: String,
    port: u16,
    max_bson_size: usize,
}

impl Default for InMemoryEngineBuilder {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            max_bson_size: DEFAULT_MAX_BSON_SIZE,
        }
    }
}

impl InMemoryEngineBuilder {
    /// Sets the host cursors report they are bound to.
    pub fn host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn max_bson_size(mut self, max_bson_size: usize) -> Self {
        self.max_bson_size = max_bson_size;
        self
    }
}

#[async_trait]
impl EngineBuilder for InMemoryEngineBuilder {
    type Engine = InMemoryEngine;

    async fn build(self) -> ClientResult<Self::Engine> {
        if self.max_bson_size == 0 {
            return Err(ClientError::Initialization(
                "max_bson_size must be greater than zero".to_string(),
            ));
        }

        let host = HostListNode::new(&self.host, self.port, AddressFamily::Inet).ok_or_else(|| {
            ClientError::Initialization(format!("host name '{}' is too long", self.host))
        })?;

        Ok(InMemoryEngine::with_parts(host, self.max_bson_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FAILED_TO_PARSE, HOST_UNREACHABLE, IMMUTABLE_FIELD};
    use mongolayer_core::error::ErrorDomain;

    fn ns() -> Namespace {
        Namespace::new("app", "people")
    }

    async fn seeded() -> InMemoryEngine {
        let engine = InMemoryEngine::new();
        let wc = WriteConcern::new();

        for (i, name) in ["ada", "grace", "linus", "barbara"].into_iter().enumerate() {
            engine
                .insert(&ns(), doc! { "_id": i as i32, "name": name, "n": 1 }, InsertFlags::empty(), &wc)
                .await
                .unwrap();
        }

        engine
    }

    #[tokio::test]
    async fn test_insert_generates_id_first() {
        let engine = InMemoryEngine::new();

        engine
            .insert(&ns(), doc! { "hello": "world" }, InsertFlags::empty(), &WriteConcern::new())
            .await
            .unwrap();

        let store = engine.shared.store.read().await;
        let stored = &store["app"]["people"][0];
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert!(matches!(stored.get("_id"), Some(Bson::ObjectId(_))));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected_unless_unacknowledged() {
        let engine = seeded().await;

        let err = engine
            .insert(&ns(), doc! { "_id": 0 }, InsertFlags::empty(), &WriteConcern::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, DUPLICATE_KEY);

        engine
            .insert(&ns(), doc! { "_id": 0 }, InsertFlags::empty(), &WriteConcern::unacknowledged())
            .await
            .unwrap();
        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 0, 0).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_update_single_multi_and_upsert() {
        let engine = seeded().await;
        let wc = WriteConcern::new();

        engine
            .update(&ns(), doc! { "n": 1 }, doc! { "$inc": { "n": 1 } }, UpdateFlags::empty(), &wc)
            .await
            .unwrap();
        assert_eq!(engine.count(&ns(), doc! { "n": 2 }, QueryFlags::empty(), 0, 0).await.unwrap(), 1);

        engine
            .update(&ns(), doc! {}, doc! { "$set": { "n": 5 } }, UpdateFlags::MULTI_UPDATE, &wc)
            .await
            .unwrap();
        assert_eq!(engine.count(&ns(), doc! { "n": 5 }, QueryFlags::empty(), 0, 0).await.unwrap(), 4);

        engine
            .update(&ns(), doc! { "name": "ken" }, doc! { "$set": { "n": 9 } }, UpdateFlags::empty(), &wc)
            .await
            .unwrap();
        assert_eq!(engine.count(&ns(), doc! { "name": "ken" }, QueryFlags::empty(), 0, 0).await.unwrap(), 0);

        engine
            .update(&ns(), doc! { "name": "ken" }, doc! { "$set": { "n": 9 } }, UpdateFlags::UPSERT, &wc)
            .await
            .unwrap();
        assert_eq!(
            engine.count(&ns(), doc! { "name": "ken", "n": 9 }, QueryFlags::empty(), 0, 0).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_errors() {
        let engine = seeded().await;
        let wc = WriteConcern::new();

        let err = engine
            .update(&ns(), doc! {}, doc! { "name": "x" }, UpdateFlags::MULTI_UPDATE, &wc)
            .await
            .unwrap_err();
        assert_eq!(err.code, FAILED_TO_PARSE);

        let err = engine
            .update(&ns(), doc! { "_id": 1 }, doc! { "$set": { "_id": 10 } }, UpdateFlags::empty(), &wc)
            .await
            .unwrap_err();
        assert_eq!(err.code, IMMUTABLE_FIELD);
    }

    #[tokio::test]
    async fn test_remove_single_and_all() {
        let engine = seeded().await;
        let wc = WriteConcern::new();

        engine
            .remove(&ns(), doc! { "n": 1 }, RemoveFlags::SINGLE_REMOVE, &wc)
            .await
            .unwrap();
        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 0, 0).await.unwrap(), 3);
        assert_eq!(engine.count(&ns(), doc! { "_id": 0 }, QueryFlags::empty(), 0, 0).await.unwrap(), 0);

        engine.remove(&ns(), doc! { "n": 1 }, RemoveFlags::empty(), &wc).await.unwrap();
        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 0, 0).await.unwrap(), 0);

        engine
            .remove(&Namespace::new("app", "missing"), doc! {}, RemoveFlags::empty(), &wc)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_count_with_skip_and_limit() {
        let engine = seeded().await;

        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 1, 0).await.unwrap(), 3);
        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 1, 2).await.unwrap(), 2);
        assert_eq!(engine.count(&ns(), doc! {}, QueryFlags::empty(), 10, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commands() {
        let engine = seeded().await;

        let reply = engine.execute(doc! { "ping": 1 }, "admin").await.unwrap();
        assert_eq!(reply.get_f64("ok").unwrap(), 1.0);

        engine.execute(doc! { "create": "logs" }, "app").await.unwrap();
        let err = engine.execute(doc! { "create": "logs" }, "app").await.unwrap_err();
        assert_eq!(err.code, NAMESPACE_EXISTS);
        assert_eq!(engine.collection_names("app").await, vec!["logs", "people"]);

        engine.execute(doc! { "drop": "logs" }, "app").await.unwrap();
        let err = engine.execute(doc! { "drop": "logs" }, "app").await.unwrap_err();
        assert_eq!(err.code, NAMESPACE_NOT_FOUND);

        engine.execute(doc! { "dropDatabase": 1 }, "app").await.unwrap();
        assert!(engine.collection_names("app").await.is_empty());

        let err = engine.execute(doc! { "frobnicate": 1 }, "app").await.unwrap_err();
        assert_eq!(err.code, COMMAND_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_without_upsert_leaves_missing_collection_absent() {
        let engine = InMemoryEngine::new();
        let wc = WriteConcern::new();

        engine
            .update(&ns(), doc! { "name": "ada" }, doc! { "$set": { "n": 2 } }, UpdateFlags::empty(), &wc)
            .await
            .unwrap();
        assert!(engine.collection_names("app").await.is_empty());
        assert!(!engine.shared.store.read().await.contains_key("app"));

        engine
            .update(&ns(), doc! { "name": "ada" }, doc! { "$set": { "n": 2 } }, UpdateFlags::UPSERT, &wc)
            .await
            .unwrap();
        assert_eq!(engine.collection_names("app").await, vec!["people"]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_clone() {
        let engine = InMemoryEngine::new();
        let clone = engine.clone();

        engine.shutdown().await.unwrap();

        let err = clone.execute(doc! { "ping": 1 }, "admin").await.unwrap_err();
        assert_eq!(err.domain, ErrorDomain::Stream);
        assert_eq!(err.code, HOST_UNREACHABLE);
        assert!(clone.open_cursor(&ns(), doc! {}, &FindOptions::new()).is_none());
    }

    #[tokio::test]
    async fn test_builder() {
        let engine = InMemoryEngine::builder()
            .host("db.internal", 27018)
            .max_bson_size(1024)
            .build()
            .await
            .unwrap();

        assert_eq!(engine.max_bson_size(), 1024);
        assert_eq!(engine.shared.host.decode_host_and_port(), "db.internal:27018");

        let err = InMemoryEngine::builder().max_bson_size(0).build().await.unwrap_err();
        assert!(matches!(err, ClientError::Initialization(_)));
    }
}
