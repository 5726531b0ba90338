//! # lyra-etl
//!
//! Star-schema transformation pipeline for song-play analytics.
//!
//! Two raw JSON sources, song metadata records and application usage-log
//! events, are ingested and reduced to five tables:
//!
//! - **songs** (dimension): one row per distinct `song_id`
//! - **artists** (dimension): one row per distinct `artist_id`
//! - **users** (dimension): one row per distinct `userId`
//! - **time** (dimension): one row per distinct play timestamp
//! - **songplays** (fact): one row per log event matched against song
//!   metadata by exact title/artist equality
//!
//! Every run recomputes all five tables from scratch and overwrites their
//! storage locations; there is no incremental state between runs.
//!
//! ## Layout
//!
//! ```text
//! {output}/
//! ├── songs/year=…/artist_id=…/part-00000.parquet
//! ├── artists/part-00000.parquet
//! ├── users/part-00000.parquet
//! ├── time/year=…/month=…/part-00000.parquet
//! └── songplays/year=…/month=…/part-00000.parquet
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod dimensions;
pub mod error;
pub mod parquet_util;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod songplays;
pub mod table;
pub mod writer;

pub use error::{EtlError, Result};
pub use pipeline::{PipelineConfig, RunSummary};
pub use schema::{Field, FieldType, RecordSchema};
pub use table::{Table, Value};
