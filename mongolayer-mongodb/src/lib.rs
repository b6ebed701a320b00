//! MongoDB engine for mongolayer.
//!
//! This crate provides an implementation of the `Engine` trait on top of the official
//! `mongodb` async driver, so the same `Client`, `Collection` and `Cursor` code runs
//! against a real deployment.
//!
//! To use this engine, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mongolayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The engine is configured from a parsed [`Uri`](mongolayer_core::uri::Uri); timeouts
//! and the application name can be set on the builder. Server error codes are passed
//! through unchanged.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::{client::Client, engine::EngineBuilder, mongodb::MongoDbEngine, uri::Uri};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let uri = Uri::parse("mongodb://localhost:27017/app")?;
//!     let client = Client::connect(MongoDbEngine::builder(uri)).await?;
//!
//!     client.command(bson::doc! { "ping": 1 }, "admin").await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongolayer_mongodb;

pub mod convert;
mod cursor;
pub mod engine;

pub use engine::{MongoDbEngine, MongoDbEngineBuilder};
