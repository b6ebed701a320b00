use std::time::Duration;

use async_trait::async_trait;
use bson::Document;
use mongodb::{
    Client as MongoClient, Collection as MongoCollection,
    options::{ClientOptions, CountOptions, DeleteOptions, InsertOneOptions, ReplaceOptions, UpdateOptions},
};

use mongolayer_core::{
    document::is_operator_document,
    engine::{CursorHandle, Engine, EngineBuilder},
    error::{ClientError, ClientResult, DriverError},
    host::HostListNode,
    options::{FindOptions, InsertFlags, Namespace, QueryFlags, RemoveFlags, UpdateFlags},
    uri::Uri,
    write_concern::WriteConcern,
};

use crate::{
    convert::{driver_error, write_concern},
    cursor::DriverCursor,
};

/// Engine backed by the official `mongodb` async driver.
#[derive(Debug, Clone)]
pub struct MongoDbEngine {
    client: MongoClient,
    seeds: Option<HostListNode>,
}

impl MongoDbEngine {
    pub fn new(client: MongoClient, seeds: Option<HostListNode>) -> Self {
        Self { client, seeds }
    }

    pub fn builder(uri: Uri) -> MongoDbEngineBuilder {
        MongoDbEngineBuilder::new(uri)
    }

    /// The underlying driver client.
    pub fn driver(&self) -> &MongoClient {
        &self.client
    }

    fn get_collection(&self, namespace: &Namespace) -> MongoCollection<Document> {
        self.client
            .database(&namespace.database)
            .collection(&namespace.collection)
    }
}

#[async_trait]
impl Engine for MongoDbEngine {
    async fn execute(&self, command: Document, database: &str) -> Result<Document, DriverError> {
        self.client
            .database(database)
            .run_command(command)
            .await
            .map_err(driver_error)
    }

    fn open_cursor(
        &self,
        namespace: &Namespace,
        query: Document,
        options: &FindOptions,
    ) -> Option<Box<dyn CursorHandle>> {
        Some(Box::new(DriverCursor::new(
            self.get_collection(namespace),
            namespace.clone(),
            query,
            options.clone(),
            self.seeds.clone(),
        )))
    }

    async fn insert(
        &self,
        namespace: &Namespace,
        document: Document,
        flags: InsertFlags,
        concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        let mut options = InsertOneOptions::default();
        options.write_concern = Some(write_concern(concern));
        if flags.contains(InsertFlags::NO_VALIDATE) {
            options.bypass_document_validation = Some(true);
        }

        self.get_collection(namespace)
            .insert_one(document)
            .with_options(options)
            .await
            .map_err(driver_error)?;

        Ok(())
    }

    async fn update(
        &self,
        namespace: &Namespace,
        selector: Document,
        update: Document,
        flags: UpdateFlags,
        concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        let collection = self.get_collection(namespace);
        let upsert = flags.contains(UpdateFlags::UPSERT).then_some(true);

        if !is_operator_document(&update) {
            let mut options = ReplaceOptions::default();
            options.upsert = upsert;
            options.write_concern = Some(write_concern(concern));

            collection
                .replace_one(selector, update)
                .with_options(options)
                .await
                .map_err(driver_error)?;

            return Ok(());
        }

        let mut options = UpdateOptions::default();
        options.upsert = upsert;
        options.write_concern = Some(write_concern(concern));

        if flags.contains(UpdateFlags::MULTI_UPDATE) {
            collection
                .update_many(selector, update)
                .with_options(options)
                .await
                .map_err(driver_error)?;
        } else {
            collection
                .update_one(selector, update)
                .with_options(options)
                .await
                .map_err(driver_error)?;
        }

        Ok(())
    }

    async fn remove(
        &self,
        namespace: &Namespace,
        selector: Document,
        flags: RemoveFlags,
        concern: &WriteConcern,
    ) -> Result<(), DriverError> {
        let collection = self.get_collection(namespace);
        let mut options = DeleteOptions::default();
        options.write_concern = Some(write_concern(concern));

        if flags.contains(RemoveFlags::SINGLE_REMOVE) {
            collection
                .delete_one(selector)
                .with_options(options)
                .await
                .map_err(driver_error)?;
        } else {
            collection
                .delete_many(selector)
                .with_options(options)
                .await
                .map_err(driver_error)?;
        }

        Ok(())
    }

    async fn count(
        &self,
        namespace: &Namespace,
        query: Document,
        _flags: QueryFlags,
        skip: u64,
        limit: u64,
    ) -> Result<u64, DriverError> {
        let mut options = CountOptions::default();
        options.skip = (skip > 0).then_some(skip);
        options.limit = (limit > 0).then_some(limit);

        self.get_collection(namespace)
            .count_documents(query)
            .with_options(options)
            .await
            .map_err(driver_error)
    }

    async fn shutdown(self) -> ClientResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbEngine`], configured from a connection string.
///
/// # Example
///
/// ```ignore
/// use mongolayer_core::{engine::EngineBuilder, uri::Uri};
/// use mongolayer_mongodb::MongoDbEngine;
///
/// let engine = MongoDbEngine::builder(Uri::parse("mongodb://localhost:27017/app")?)
///     .app_name("inventory")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoDbEngineBuilder {
    uri: Uri,
    app_name: Option<String>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoDbEngineBuilder {
    pub fn new(uri: Uri) -> Self {
        Self {
            uri,
            app_name: None,
            connect_timeout: None,
            server_selection_timeout: None,
        }
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl EngineBuilder for MongoDbEngineBuilder {
    type Engine = MongoDbEngine;

    async fn build(self) -> ClientResult<Self::Engine> {
        let mut options = ClientOptions::parse(self.uri.to_string())
            .await
            .map_err(|e| ClientError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }
        if self.connect_timeout.is_some() {
            options.connect_timeout = self.connect_timeout;
        }
        if self.server_selection_timeout.is_some() {
            options.server_selection_timeout = self.server_selection_timeout;
        }

        let client = MongoClient::with_options(options)
            .map_err(|e| ClientError::Initialization(e.to_string()))?;

        Ok(MongoDbEngine::new(client, self.uri.host_list().cloned()))
    }
}
