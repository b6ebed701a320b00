//! Lazy, forward-only iteration over query results.
//!
//! A [`Cursor`] wraps one server-side query execution context. Nothing is sent to the
//! server until the first [`Cursor::advance`]; batching and `getMore` round trips happen
//! inside the engine.
//!
//! ```text
//! Fresh ──advance──▶ Active ──advance (no document)──▶ Exhausted
//!   │                  │                                  │
//!   └──────────────────┴──────── advance (error) ─────────┴──▶ Errored
//! ```
//!
//! `Exhausted` can be advanced again only while the server keeps the cursor alive,
//! which is the case for tailable cursors. `Errored` is terminal.
//!
//! # Example
//!
//! ```ignore
//! let mut cursor = collection.find(doc! { "hello": "world" }, FindOptions::new())?;
//!
//! while let Some(document) = cursor.advance().await? {
//!     println!("{document}");
//! }
//! ```

use std::{fmt, marker::PhantomData};

use bson::Document;
use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;

use crate::{
    document::decode,
    engine::CursorHandle,
    error::{ClientError, ClientResult, DriverError},
    host::Host,
};

/// Where a cursor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No round trip has been made.
    Fresh,
    /// The last advance produced a document.
    Active,
    /// The last advance found no document.
    Exhausted,
    /// An advance failed. Terminal.
    Errored,
}

#[derive(Debug)]
enum Phase {
    Fresh,
    Active,
    Exhausted,
    Errored(DriverError),
}

impl Phase {
    fn state(&self) -> CursorState {
        match self {
            Phase::Fresh => CursorState::Fresh,
            Phase::Active => CursorState::Active,
            Phase::Exhausted => CursorState::Exhausted,
            Phase::Errored(_) => CursorState::Errored,
        }
    }
}

/// A query result cursor.
///
/// The lifetime ties the cursor to the client it was created from. A cursor is driven
/// through `&mut self` and is therefore confined to one task at a time.
#[derive(Debug)]
pub struct Cursor<'a> {
    handle: Box<dyn CursorHandle>,
    phase: Phase,
    current: Option<Document>,
    _client: PhantomData<&'a ()>,
}

impl<'a> Cursor<'a> {
    pub fn new(handle: Box<dyn CursorHandle>) -> Self {
        Self {
            handle,
            phase: Phase::Fresh,
            current: None,
            _client: PhantomData,
        }
    }

    /// Advances to the next document.
    ///
    /// Returns `Ok(Some(document))` when a document was fetched and `Ok(None)` when the
    /// results are exhausted. The returned reference is only valid until the next call;
    /// clone it or use [`Cursor::deserialize_current`] to keep the data.
    ///
    /// # Errors
    ///
    /// - the engine's [`DriverError`] if the round trip fails. The cursor is then
    ///   `Errored` and every later call returns the same error without contacting the
    ///   server.
    /// - a cursor-domain [`DriverError`] if the cursor is exhausted and no longer alive.
    ///   The state is left unchanged.
    pub async fn advance(&mut self) -> ClientResult<Option<&Document>> {
        match &self.phase {
            Phase::Errored(err) => return Err(err.clone().into()),
            Phase::Exhausted if !self.handle.is_alive() => {
                tracing::warn!("advance called on a completed cursor");
                return Err(DriverError::completed_cursor().into());
            }
            _ => {}
        }

        match self.handle.next().await {
            Ok(Some(document)) => {
                self.transition(Phase::Active);
                self.current = Some(document);
                Ok(self.current.as_ref())
            }
            Ok(None) => {
                self.transition(Phase::Exhausted);
                Ok(None)
            }
            Err(err) => {
                self.current = None;
                self.transition(Phase::Errored(err.clone()));
                Err(err.into())
            }
        }
    }

    fn transition(&mut self, next: Phase) {
        if self.phase.state() != next.state() {
            tracing::trace!(from = ?self.phase.state(), to = ?next.state(), "cursor state change");
        }
        self.phase = next;
    }

    /// The last document fetched, without advancing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoCurrentDocument`] before the first document, or the
    /// terminal error once the cursor is `Errored`.
    pub fn current_document(&self) -> ClientResult<&Document> {
        match (&self.phase, &self.current) {
            (Phase::Errored(err), _) => Err(err.clone().into()),
            (_, Some(document)) => Ok(document),
            (_, None) => Err(ClientError::NoCurrentDocument),
        }
    }

    /// Decodes the current document into an owned `T`.
    pub fn deserialize_current<T: DeserializeOwned>(&self) -> ClientResult<T> {
        decode(self.current_document()?)
    }

    pub fn state(&self) -> CursorState {
        self.phase.state()
    }

    /// The error that ended the cursor, if any.
    pub fn last_error(&self) -> Option<&DriverError> {
        match &self.phase {
            Phase::Errored(err) => Some(err),
            _ => None,
        }
    }

    /// The server's view of whether the cursor can still produce documents.
    pub fn is_alive(&self) -> bool {
        self.handle.is_alive()
    }

    /// Whether another advance is worth attempting.
    pub fn has_more(&self) -> bool {
        !matches!(self.phase, Phase::Errored(_)) && self.handle.more()
    }

    /// Hosts the cursor is bound to. Empty until the first round trip.
    pub fn hosts(&self) -> Vec<Host> {
        self.handle
            .host()
            .map(Host::from_host_list)
            .unwrap_or_default()
    }

    /// Converts the cursor into a stream of owned documents.
    ///
    /// The stream ends when the cursor is exhausted. Errors also end the stream and are
    /// only logged; use [`Cursor::advance`] to observe them.
    pub fn into_stream(self) -> impl Stream<Item = Document> + Send + 'a {
        stream::unfold(self, |mut cursor| async move {
            let next = cursor.advance().await.map(|document| document.cloned());

            match next {
                Ok(Some(document)) => Some((document, cursor)),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(error = %err, "cursor stream ended by error");
                    None
                }
            }
        })
    }
}

impl Clone for Cursor<'_> {
    /// Returns a `Fresh` cursor over the same query, which re-executes it on first
    /// advance.
    fn clone(&self) -> Self {
        Self::new(self.handle.duplicate())
    }
}

impl fmt::Display for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hosts = self
            .hosts()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        write!(
            f,
            "Cursor(hosts: [{}], alive: {}, more: {})",
            hosts.join(", "),
            self.is_alive(),
            self.has_more()
        )
    }
}
