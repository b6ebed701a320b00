//! The connection root.
//!
//! A [`Client`] owns its engine. Databases, collections and cursors borrow the client,
//! so none of them can outlive the connection they were created from.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer_core::client::Client;
//! use bson::doc;
//!
//! let client = Client::connect(builder).await?;
//! let reply = client.command(doc! { "ping": 1 }, "admin").await?;
//!
//! let users = client.collection("app", "users");
//! users.insert(doc! { "name": "alice" }, InsertFlags::empty()).await?;
//! ```

use bson::Document;

use crate::{
    collection::Collection,
    database::Database,
    engine::{Engine, EngineBuilder},
    error::ClientResult,
    write_concern::WriteConcern,
};

/// A connection to a MongoDB deployment through engine `E`.
#[derive(Debug)]
pub struct Client<E: Engine> {
    engine: E,
    write_concern: WriteConcern,
}

impl<E: Engine> Client<E> {
    /// Creates a client over an already built engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            write_concern: WriteConcern::default(),
        }
    }

    /// Builds an engine with `builder` and wraps it in a client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Initialization`](crate::error::ClientError::Initialization)
    /// or [`ClientError::InvalidUri`](crate::error::ClientError::InvalidUri) if the
    /// engine could not be built.
    pub async fn connect<B>(builder: B) -> ClientResult<Self>
    where
        B: EngineBuilder<Engine = E>,
    {
        let engine = builder.build().await?;
        tracing::debug!(?engine, "client connected");

        Ok(Self::new(engine))
    }

    /// Runs `command` against `database` and returns the reply.
    ///
    /// # Arguments
    ///
    /// * `command` - The command document, e.g. `{"ping": 1}`
    /// * `database` - The database to run the command in
    pub async fn command(&self, command: Document, database: &str) -> ClientResult<Document> {
        tracing::debug!(database, command = ?command.keys().next(), "running command");

        Ok(self.engine.execute(command, database).await?)
    }

    /// Largest document, in bytes, the server accepts.
    pub fn max_bson_size(&self) -> usize {
        self.engine.max_bson_size()
    }

    pub fn database<'a>(&'a self, name: &str) -> Database<'a, E> {
        Database::new(name.to_string(), self)
    }

    pub fn collection<'a>(&'a self, database: &str, name: &str) -> Collection<'a, E> {
        self.database(database).collection(name)
    }

    /// The write concern inherited by databases and collections created afterwards.
    pub fn write_concern(&self) -> &WriteConcern {
        &self.write_concern
    }

    pub fn set_write_concern(&mut self, write_concern: WriteConcern) {
        self.write_concern = write_concern;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Shuts the engine down, releasing its connections.
    pub async fn shutdown(self) -> ClientResult<()> {
        self.engine.shutdown().await
    }
}
