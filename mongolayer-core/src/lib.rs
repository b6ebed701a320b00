//! A thin client-side layer over a MongoDB engine that gives value semantics to
//! connection resources.
//!
//! This crate is the core of the mongolayer project and provides:
//!
//! - **Cursors** ([`cursor`]) - Lazy, forward-only iteration over query results
//! - **Connection strings** ([`uri`]) - Parsing and canonical serialization of `mongodb://` URIs
//! - **Write concerns** ([`write_concern`]) - Acknowledgment settings for writes
//! - **Copy-on-write handles** ([`handle`]) - Value semantics over exclusively owned engine resources
//! - **Host lists** ([`host`]) - Decoding of the engine's linked host descriptors
//! - **Engine abstraction** ([`engine`]) - Traits implemented by engine crates
//! - **Client, databases and collections** ([`client`], [`database`], [`collection`]) - CRUD passthroughs
//! - **Operation flags** ([`options`]) - Query, insert, update and remove flags
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use mongolayer_core::{client::Client, options::{FindOptions, InsertFlags}};
//! use bson::doc;
//!
//! let client = Client::new(engine);
//! let greetings = client.collection("app", "greetings");
//!
//! greetings.insert(doc! { "hello": "world" }, InsertFlags::empty()).await?;
//!
//! let mut cursor = greetings.find(doc! { "hello": "world" }, FindOptions::new())?;
//! while let Some(document) = cursor.advance().await? {
//!     println!("{document}");
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongolayer_core;

pub mod client;
pub mod collection;
pub mod cursor;
pub mod database;
pub mod document;
pub mod engine;
pub mod error;
pub mod handle;
pub mod host;
pub mod options;
pub mod uri;
pub mod write_concern;
