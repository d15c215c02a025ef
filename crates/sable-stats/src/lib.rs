//! Selectivity estimation for Sable.
//!
//! This crate provides:
//! - Equal-width integer and string histograms
//! - Per-table statistics built from a two-pass scan
//! - A registry holding statistics for every catalog table

mod histogram;
mod table_stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use table_stats::{
    ColumnHistogram, IO_COST_PER_PAGE, NUM_HIST_BINS, TableStats, TableStatsRegistry,
};
