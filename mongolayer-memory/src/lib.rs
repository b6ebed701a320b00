//! In-memory engine for mongolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Engine` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development, testing and embedding where no MongoDB server is available.
//!
//! # Features
//!
//! - **Lazy, batched cursors** - Collections are scanned one batch per round trip, tailable cursors included
//! - **Query filters** - Equality, comparison and logical operators over dotted paths
//! - **Update modifiers** - `$set`, `$unset`, `$inc` and `$rename`, replacements and upserts
//! - **Server error codes** - Failures carry the codes a MongoDB server reports ([`error`])
//!
//! # Quick Start
//!
//! ```ignore
//! use mongolayer_core::{client::Client, options::{FindOptions, InsertFlags}};
//! use mongolayer_memory::InMemoryEngine;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(InMemoryEngine::new());
//!     let greetings = client.collection("app", "greetings");
//!
//!     greetings.insert(doc! { "hello": "world" }, InsertFlags::empty()).await?;
//!
//!     let mut cursor = greetings.find(doc! {}, FindOptions::new())?;
//!     while let Some(document) = cursor.advance().await? {
//!         println!("{document}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongolayer_memory;

mod cursor;
pub mod engine;
pub mod error;
mod matcher;
mod update;

pub use cursor::DEFAULT_BATCH_SIZE;
pub use engine::{InMemoryEngine, InMemoryEngineBuilder};
