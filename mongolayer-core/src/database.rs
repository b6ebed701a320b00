//! Databases on a [`Client`].

use bson::{Document, doc};

use crate::{
    client::Client,
    collection::Collection,
    engine::Engine,
    error::ClientResult,
    write_concern::WriteConcern,
};

/// A database on a connected client.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the client borrow
/// * `E` - The engine type
#[derive(Debug)]
pub struct Database<'a, E: Engine> {
    name: String,
    client: &'a Client<E>,
    write_concern: WriteConcern,
}

impl<'a, E: Engine> Database<'a, E> {
    pub(crate) fn new(name: String, client: &'a Client<E>) -> Self {
        Self {
            name,
            write_concern: client.write_concern().clone(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &'a Client<E> {
        self.client
    }

    pub fn collection(&self, name: &str) -> Collection<'a, E> {
        Collection::new(
            self.name.clone(),
            name.to_string(),
            self.client,
            self.write_concern.clone(),
        )
    }

    /// Runs `command` against this database.
    pub async fn command(&self, command: Document) -> ClientResult<Document> {
        self.client.command(command, &self.name).await
    }

    /// Drops the database and every collection in it.
    pub async fn drop(&self) -> ClientResult<()> {
        tracing::debug!(database = %self.name, "dropping database");
        self.command(doc! { "dropDatabase": 1 }).await?;

        Ok(())
    }

    pub fn write_concern(&self) -> &WriteConcern {
        &self.write_concern
    }

    /// Sets the write concern inherited by collections created afterwards.
    pub fn set_write_concern(&mut self, write_concern: WriteConcern) {
        self.write_concern = write_concern;
    }
}
