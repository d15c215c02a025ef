//! Sable common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all Sable components:
//! - Error enum and result alias
//! - Engine configuration sections
//! - Page identifiers and the file id registry
//! - Column types, field values and comparison operators
//! - Tuple descriptors

pub mod config;
pub mod error;
pub mod page;
pub mod schema;
pub mod types;

pub use config::{EngineConfig, LockConfig, StatsConfig, StorageConfig};
pub use error::{Result, SableError};
pub use page::{FileRegistry, PAGE_SIZE, PageId, file_id_for_path};
pub use schema::{Schema, SchemaItem};
pub use types::{Field, Op, STRING_LEN, Type};
