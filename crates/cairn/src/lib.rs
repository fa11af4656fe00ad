//! Cairn is an embedded, file-backed document store.
//!
//! Each collection lives in one pretty-printed JSON array file,
//! `{root}/{collection}.json`, mirrored by an in-memory cache. Models
//! registered on a [`Store`] validate documents against a [`Schema`] and give
//! out [`Instance`]s that can be saved, looked up and populated.

pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod fs;
pub mod model;
pub mod object_id;
pub mod schema;
pub mod store;
pub mod validate;
pub mod value;

pub use config::{LoadFailureMode, StoreConfig};
pub use document::RawDocument;
pub use error::{CairnError, Result, ViolationKind};
pub use fs::{FileSystem, MemoryFileSystem, TokioFileSystem};
pub use model::{Filter, Instance, Model};
pub use object_id::ObjectId;
pub use schema::{FieldRule, FieldType, Schema};
pub use store::{Connection, Store};
pub use value::{FieldValue, Fields};
