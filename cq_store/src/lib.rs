//! Frozen columnar storage: chunks, the zone-map index, and the
//! `ColumnarSource` contract the rest of the engine queries against.

pub mod builder;
pub mod chunk;
pub mod column;
pub mod config;
pub mod null_bitmap;
pub mod source;
pub mod table;
pub mod zonemap;

pub use chunk::{Chunk, DEFAULT_CHUNK_SIZE};
pub use column::{Column, ColumnValues};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use null_bitmap::NullBitmap;
pub use source::ColumnarSource;
pub use table::{Table, TableBuilder};
pub use zonemap::{BloomFilter, ZoneMap};
