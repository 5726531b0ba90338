//! # lyra-core
//!
//! Core infrastructure for the Lyra analytics pipeline:
//!
//! - **Storage**: Object-storage abstraction with in-memory and local
//!   filesystem backends
//! - **Partitioning**: Hive-style partition keys for columnar table layouts
//! - **Configuration**: Run-scoped storage configuration and credentials
//! - **Observability**: Structured logging initialization
//!
//! Higher layers (`lyra-etl`, `lyra-cli`) build on these types; nothing in
//! this crate knows about the star schema itself.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod observability;
pub mod partition;
pub mod storage;

pub use config::{BackendKind, Credentials, StorageConfig};
pub use error::{CoreError, Result};
pub use partition::{PartitionKey, PartitionValue};
pub use storage::{LocalFsBackend, MemoryBackend, ObjectMeta, StorageBackend};
