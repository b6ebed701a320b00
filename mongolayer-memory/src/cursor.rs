use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use bson::Document;

use mongolayer_core::{
    engine::CursorHandle,
    error::DriverError,
    host::HostListNode,
    options::{FindOptions, Namespace},
};

use crate::{
    engine::Shared,
    matcher::{is_truthy, matches},
};

/// Batch size used when the query does not ask for one.
pub const DEFAULT_BATCH_SIZE: usize = 101;

/// Cursor over a collection of an [`InMemoryEngine`](crate::InMemoryEngine).
///
/// The collection is scanned lazily, one batch per round trip. The scan position is an
/// index into the collection, so a tailable cursor picks up documents appended after it
/// reached the end.
#[derive(Debug)]
pub(crate) struct MemoryCursor {
    shared: Arc<Shared>,
    namespace: Namespace,
    query: Document,
    options: FindOptions,
    batch: VecDeque<Document>,
    position: usize,
    skipped: u32,
    returned: u32,
    host: Option<HostListNode>,
    alive: bool,
}

impl MemoryCursor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        namespace: Namespace,
        query: Document,
        options: FindOptions,
    ) -> Self {
        Self {
            shared,
            namespace,
            query,
            options,
            batch: VecDeque::new(),
            position: 0,
            skipped: 0,
            returned: 0,
            host: None,
            alive: true,
        }
    }

    fn batch_size(&self) -> usize {
        match self.options.batch_size {
            0 => DEFAULT_BATCH_SIZE,
            size => size as usize,
        }
    }

    fn limit_reached(&self) -> bool {
        self.options.limit != 0
            && self.returned as usize + self.batch.len() >= self.options.limit as usize
    }

    async fn fetch(&mut self) -> Result<(), DriverError> {
        if let Err(err) = self.shared.ensure_open() {
            self.alive = false;
            return Err(err);
        }

        if self.host.is_none() {
            self.host = Some(self.shared.host.clone());
        }

        let batch_size = self.batch_size();
        let store = self.shared.store.read().await;
        let documents = store
            .get(&self.namespace.database)
            .and_then(|collections| collections.get(&self.namespace.collection))
            .map(Vec::as_slice)
            .unwrap_or_default();

        while self.position < documents.len()
            && self.batch.len() < batch_size
            && !self.limit_reached()
        {
            let document = &documents[self.position];
            self.position += 1;

            match matches(document, &self.query) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    self.alive = false;
                    self.batch.clear();
                    return Err(err);
                }
            }

            if self.skipped < self.options.skip {
                self.skipped += 1;
                continue;
            }

            self.batch
                .push_back(project(document, self.options.projection.as_ref()));
        }

        let at_end = self.position >= documents.len();
        if self.limit_reached() || (at_end && !self.options.is_tailable()) {
            self.alive = false;
        }

        tracing::trace!(
            namespace = %self.namespace,
            fetched = self.batch.len(),
            alive = self.alive,
            "fetched batch"
        );

        Ok(())
    }
}

#[async_trait]
impl CursorHandle for MemoryCursor {
    async fn next(&mut self) -> Result<Option<Document>, DriverError> {
        if self.batch.is_empty() && self.alive {
            self.fetch().await?;
        }

        let document = self.batch.pop_front();
        if document.is_some() {
            self.returned += 1;
        }

        Ok(document)
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn more(&self) -> bool {
        !self.batch.is_empty() || self.alive
    }

    fn host(&self) -> Option<&HostListNode> {
        self.host.as_ref()
    }

    fn duplicate(&self) -> Box<dyn CursorHandle> {
        Box::new(MemoryCursor::new(
            Arc::clone(&self.shared),
            self.namespace.clone(),
            self.query.clone(),
            self.options.clone(),
        ))
    }
}

/// Applies a top-level inclusion or exclusion projection. `_id` is kept unless excluded.
fn project(document: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection.filter(|projection| !projection.is_empty()) else {
        return document.clone();
    };

    let keep_id = projection.get("_id").is_none_or(is_truthy);
    let inclusive = projection
        .iter()
        .any(|(key, value)| key != "_id" && is_truthy(value));

    document
        .iter()
        .filter(|(key, _)| {
            if *key == "_id" {
                keep_id
            } else if inclusive {
                projection.get(key.as_str()).is_some_and(is_truthy)
            } else {
                !projection.contains_key(key.as_str())
            }
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryEngine;
    use bson::{Bson, doc};
    use mongolayer_core::{
        engine::Engine,
        options::{InsertFlags, QueryFlags},
        write_concern::WriteConcern,
    };

    fn ns() -> Namespace {
        Namespace::new("app", "numbers")
    }

    async fn engine_with(count: i32) -> InMemoryEngine {
        let engine = InMemoryEngine::new();

        for n in 0..count {
            engine
                .insert(&ns(), doc! { "_id": n, "n": n, "even": n % 2 == 0 }, InsertFlags::empty(), &WriteConcern::new())
                .await
                .unwrap();
        }

        engine
    }

    async fn drain(cursor: &mut Box<dyn CursorHandle>) -> Vec<i32> {
        let mut seen = Vec::new();
        while let Some(document) = cursor.next().await.unwrap() {
            seen.push(document.get_i32("n").unwrap());
        }
        seen
    }

    #[tokio::test]
    async fn test_batches_until_exhausted() {
        let engine = engine_with(5).await;
        let options = FindOptions::builder().batch_size(2).build();
        let mut cursor = engine.open_cursor(&ns(), doc! {}, &options).unwrap();

        assert!(cursor.host().is_none());
        assert!(cursor.more());

        assert_eq!(cursor.next().await.unwrap().unwrap().get_i32("n").unwrap(), 0);
        assert_eq!(
            cursor.host().map(HostListNode::decode_host_and_port).as_deref(),
            Some("localhost:27017")
        );
        assert!(cursor.is_alive());

        assert_eq!(drain(&mut cursor).await, vec![1, 2, 3, 4]);
        assert!(!cursor.is_alive());
        assert!(!cursor.more());
    }

    #[tokio::test]
    async fn test_filter_skip_limit_and_projection() {
        let engine = engine_with(10).await;
        let options = FindOptions::builder()
            .skip(1)
            .limit(3)
            .projection(doc! { "n": 1, "_id": 0 })
            .build();
        let mut cursor = engine
            .open_cursor(&ns(), doc! { "even": true }, &options)
            .unwrap();

        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first, doc! { "n": 2 });
        assert_eq!(drain(&mut cursor).await, vec![4, 6]);
        assert!(!cursor.is_alive());
    }

    #[test]
    fn test_exclusion_projection() {
        let document = doc! { "_id": 1, "a": 1, "b": 2 };

        assert_eq!(project(&document, Some(&doc! { "b": 0 })), doc! { "_id": 1, "a": 1 });
        assert_eq!(project(&document, Some(&doc! {})), document);
        assert_eq!(project(&document, None), document);
    }

    #[tokio::test]
    async fn test_tailable_cursor_sees_appended_documents() {
        let engine = engine_with(2).await;
        let options = FindOptions::builder()
            .flags(QueryFlags::TAILABLE_CURSOR)
            .build();
        let mut cursor = engine.open_cursor(&ns(), doc! {}, &options).unwrap();

        assert_eq!(drain(&mut cursor).await, vec![0, 1]);
        assert!(cursor.is_alive());

        engine
            .insert(&ns(), doc! { "_id": 2, "n": 2 }, InsertFlags::empty(), &WriteConcern::new())
            .await
            .unwrap();

        assert_eq!(drain(&mut cursor).await, vec![2]);
    }

    #[tokio::test]
    async fn test_bad_query_kills_cursor() {
        let engine = engine_with(1).await;
        let mut cursor = engine
            .open_cursor(&ns(), doc! { "n": { "$near": 1 } }, &FindOptions::new())
            .unwrap();

        assert!(cursor.next().await.is_err());
        assert!(!cursor.is_alive());
        assert!(!cursor.more());
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let engine = InMemoryEngine::new();
        let mut cursor = engine
            .open_cursor(&Namespace::new("app", "nothing"), doc! {}, &FindOptions::new())
            .unwrap();

        assert!(cursor.next().await.unwrap().is_none());
        assert!(!cursor.is_alive());
    }

    #[tokio::test]
    async fn test_duplicate_starts_over() {
        let engine = engine_with(3).await;
        let mut cursor = engine.open_cursor(&ns(), doc! {}, &FindOptions::new()).unwrap();

        assert_eq!(drain(&mut cursor).await, vec![0, 1, 2]);

        let mut copy = cursor.duplicate();
        assert!(copy.host().is_none());
        assert_eq!(
            copy.next().await.unwrap().unwrap().get("n"),
            Some(&Bson::Int32(0))
        );
    }
}
