//! Configuration structures for Sable.

use crate::error::{Result, SableError};
use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage configuration for the database engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for data files.
    pub data_dir: PathBuf,
    /// Page size in bytes. Fixed for the lifetime of an engine.
    pub page_size: usize,
    /// Buffer pool size in number of pages.
    pub buffer_pool_pages: usize,
    /// Enable fsync for durability.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: PAGE_SIZE,
            buffer_pool_pages: 1024, // 4 MB with 4 KB pages
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_pages * self.page_size
    }

    /// Checks that the sizes are usable.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SableError::ConfigError(
                "page_size must be positive".to_string(),
            ));
        }
        if self.buffer_pool_pages == 0 {
            return Err(SableError::InvalidParameter {
                name: "buffer_pool_pages".to_string(),
                value: self.buffer_pool_pages.to_string(),
            });
        }
        Ok(())
    }
}

/// Lock acquisition policy used by the page cache.
///
/// The lock manager itself never waits. The cache polls it, sleeping
/// `retry_interval_ms` after the first refusal and doubling up to
/// `max_backoff_ms`, and aborts the transaction once `timeout_ms` has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub retry_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1,
            max_backoff_ms: 50,
            timeout_ms: 2_000,
        }
    }
}

impl LockConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_backoff_ms < self.retry_interval_ms {
            return Err(SableError::ConfigError(format!(
                "max_backoff_ms ({}) is below retry_interval_ms ({})",
                self.max_backoff_ms, self.retry_interval_ms
            )));
        }
        if self.timeout_ms == 0 {
            return Err(SableError::InvalidParameter {
                name: "timeout_ms".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters for table statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Number of equal-width buckets per column histogram.
    pub histogram_buckets: usize,
    /// Cost charged for reading one page during a sequential scan.
    pub io_cost_per_page: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            histogram_buckets: 100,
            io_cost_per_page: 1000,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.histogram_buckets == 0 {
            return Err(SableError::InvalidParameter {
                name: "histogram_buckets".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub lock: LockConfig,
    pub stats: StatsConfig,
}

impl EngineConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.lock.validate()?;
        self.stats.validate()
    }
}
