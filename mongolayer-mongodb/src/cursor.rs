use std::fmt;

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::{Collection as MongoCollection, Cursor as MongoCursor};

use mongolayer_core::{
    engine::CursorHandle,
    error::DriverError,
    host::HostListNode,
    options::{FindOptions, Namespace},
};

use crate::convert::{driver_error, find_options};

enum Stage {
    Unsent,
    Open(MongoCursor<Document>),
    Closed,
}

/// Cursor handle over a driver cursor. The `find` is sent on the first [`next`](CursorHandle::next).
pub(crate) struct DriverCursor {
    collection: MongoCollection<Document>,
    namespace: Namespace,
    query: Document,
    options: FindOptions,
    seeds: Option<HostListNode>,
    host: Option<HostListNode>,
    stage: Stage,
}

impl DriverCursor {
    pub(crate) fn new(
        collection: MongoCollection<Document>,
        namespace: Namespace,
        query: Document,
        options: FindOptions,
        seeds: Option<HostListNode>,
    ) -> Self {
        Self {
            collection,
            namespace,
            query,
            options,
            seeds,
            host: None,
            stage: Stage::Unsent,
        }
    }

    async fn open(&mut self) -> Result<(), DriverError> {
        tracing::debug!(namespace = %self.namespace, "sending find");

        let result = self
            .collection
            .find(self.query.clone())
            .with_options(find_options(&self.options))
            .await;

        match result {
            Ok(cursor) => {
                self.host = self.seeds.clone().or_else(|| Some(HostListNode::unbound()));
                self.stage = Stage::Open(cursor);
                Ok(())
            }
            Err(err) => {
                self.stage = Stage::Closed;
                Err(driver_error(err))
            }
        }
    }
}

#[async_trait]
impl CursorHandle for DriverCursor {
    async fn next(&mut self) -> Result<Option<Document>, DriverError> {
        if matches!(self.stage, Stage::Unsent) {
            self.open().await?;
        }

        let Stage::Open(cursor) = &mut self.stage else {
            return Ok(None);
        };

        match cursor.try_next().await {
            Ok(Some(document)) => Ok(Some(document)),
            Ok(None) => {
                if !self.options.is_tailable() {
                    self.stage = Stage::Closed;
                }
                Ok(None)
            }
            Err(err) => {
                self.stage = Stage::Closed;
                Err(driver_error(err))
            }
        }
    }

    fn is_alive(&self) -> bool {
        !matches!(self.stage, Stage::Closed)
    }

    fn more(&self) -> bool {
        self.is_alive()
    }

    fn host(&self) -> Option<&HostListNode> {
        self.host.as_ref()
    }

    fn duplicate(&self) -> Box<dyn CursorHandle> {
        Box::new(DriverCursor::new(
            self.collection.clone(),
            self.namespace.clone(),
            self.query.clone(),
            self.options.clone(),
            self.seeds.clone(),
        ))
    }
}

impl fmt::Debug for DriverCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            Stage::Unsent => "unsent",
            Stage::Open(_) => "open",
            Stage::Closed => "closed",
        };

        f.debug_struct("DriverCursor")
            .field("namespace", &self.namespace)
            .field("query", &self.query)
            .field("stage", &stage)
            .finish_non_exhaustive()
    }
}
