//! Per-table statistics for the query planner.
//!
//! Statistics are built once by scanning the table twice: the first pass
//! finds each integer column's range, the second fills the histograms. After
//! construction a [`TableStats`] never changes; rebuild it to pick up new data.

use crate::histogram::{IntHistogram, StringHistogram};
use parking_lot::RwLock;
use sable_common::{Field, Op, Result, SableError, StatsConfig, Type};
use sable_storage::{Catalog, HeapFile, TupleIterator};
use sable_txn::TransactionId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of histogram buckets per column.
pub const NUM_HIST_BINS: usize = 100;

/// Default cost of reading one page.
pub const IO_COST_PER_PAGE: u64 = 1000;

/// Histogram for one column, matching the column's type.
#[derive(Debug, Clone)]
pub enum ColumnHistogram {
    Int(IntHistogram),
    String(StringHistogram),
}

impl ColumnHistogram {
    pub fn column_type(&self) -> Type {
        match self {
            ColumnHistogram::Int(_) => Type::Int,
            ColumnHistogram::String(_) => Type::String,
        }
    }

    /// Estimates `column op constant`. The constant must have the column's type.
    pub fn estimate_selectivity(&self, op: Op, constant: &Field) -> Result<f64> {
        match (self, constant) {
            (ColumnHistogram::Int(hist), Field::Int(v)) => Ok(hist.estimate_selectivity(op, *v)),
            (ColumnHistogram::String(hist), Field::String(s)) => {
                Ok(hist.estimate_selectivity(op, s))
            }
            _ => Err(SableError::TypeMismatch {
                expected: self.column_type().to_string(),
                actual: constant.field_type().to_string(),
            }),
        }
    }
}

/// Row count, page count and per-column histograms of one table.
#[derive(Debug, Clone)]
pub struct TableStats {
    table_id: u32,
    num_pages: u32,
    io_cost_per_page: u64,
    total_tuples: usize,
    histograms: Vec<ColumnHistogram>,
}

impl TableStats {
    /// Scans `file` and builds statistics for every column.
    ///
    /// The scan runs in its own transaction, which is committed once both
    /// passes finish so its shared locks are released.
    pub fn new(file: &Arc<HeapFile>, io_cost_per_page: u64, buckets: usize) -> Result<Self> {
        let span = tracing::debug_span!("table_stats", table_id = file.id(), buckets);
        let _guard = span.enter();

        let txn = TransactionId::next();
        let built = Self::scan(file, txn, io_cost_per_page, buckets);
        let completed = file.cache().transaction_complete(txn, true);
        let stats = built?;
        completed?;

        debug!(
            total_tuples = stats.total_tuples,
            num_pages = stats.num_pages,
            "computed table statistics"
        );
        Ok(stats)
    }

    /// Builds statistics for a catalog table using the configured constants.
    pub fn for_table(catalog: &Catalog, table_id: u32, config: &StatsConfig) -> Result<Self> {
        config.validate()?;
        let file = catalog.file(table_id)?;
        Self::new(&file, config.io_cost_per_page, config.histogram_buckets)
    }

    fn scan(
        file: &Arc<HeapFile>,
        txn: TransactionId,
        io_cost_per_page: u64,
        buckets: usize,
    ) -> Result<Self> {
        let schema = Arc::clone(file.schema());
        let num_fields = schema.num_fields();
        let mut ranges: Vec<Option<(i32, i32)>> = vec![None; num_fields];
        let mut total_tuples = 0;

        let mut iter = file.iter(txn);
        iter.open()?;
        while iter.has_next()? {
            let tuple = iter.next()?;
            total_tuples += 1;
            for (range, field) in ranges.iter_mut().zip(tuple.fields()) {
                if let Field::Int(v) = *field {
                    *range = Some(match *range {
                        Some((lo, hi)) => (lo.min(v), hi.max(v)),
                        None => (v, v),
                    });
                }
            }
        }

        let mut histograms = schema
            .types()
            .zip(&ranges)
            .map(|(field_type, range)| match field_type {
                Type::Int => {
                    let (lo, hi) = range.unwrap_or((0, 0));
                    IntHistogram::new(buckets, lo, hi).map(ColumnHistogram::Int)
                }
                Type::String => StringHistogram::new(buckets).map(ColumnHistogram::String),
            })
            .collect::<Result<Vec<_>>>()?;

        iter.rewind()?;
        while iter.has_next()? {
            let tuple = iter.next()?;
            for (hist, field) in histograms.iter_mut().zip(tuple.fields()) {
                match (hist, field) {
                    (ColumnHistogram::Int(h), Field::Int(v)) => h.add_value(*v),
                    (ColumnHistogram::String(h), Field::String(s)) => h.add_value(s),
                    _ => {
                        return Err(SableError::Internal(
                            "tuple field does not match column type".to_string(),
                        ));
                    }
                }
            }
        }
        iter.close();

        Ok(Self {
            table_id: file.id(),
            num_pages: file.num_pages()?,
            io_cost_per_page,
            total_tuples,
            histograms,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Cost of a full sequential scan: pages times the per-page I/O cost.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page as f64
    }

    /// Number of rows expected to survive a predicate of the given selectivity.
    pub fn estimate_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity).floor() as usize
    }

    /// Estimates the fraction of rows for which `field op constant` holds.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Field) -> Result<f64> {
        self.histogram(field)?.estimate_selectivity(op, constant)
    }

    pub fn avg_selectivity(&self, _field: usize, _op: Op) -> f64 {
        1.0
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    pub fn histogram(&self, field: usize) -> Result<&ColumnHistogram> {
        self.histograms
            .get(field)
            .ok_or(SableError::FieldIndexOutOfBounds {
                index: field,
                len: self.histograms.len(),
            })
    }
}

/// Statistics for every table, keyed by table name.
#[derive(Debug, Default)]
pub struct TableStatsRegistry {
    stats: RwLock<HashMap<String, Arc<TableStats>>>,
}

impl TableStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<Arc<TableStats>> {
        self.stats.read().get(table).cloned()
    }

    pub fn set(&self, table: &str, stats: TableStats) {
        self.stats.write().insert(table.to_string(), Arc::new(stats));
    }

    pub fn remove(&self, table: &str) -> Option<Arc<TableStats>> {
        self.stats.write().remove(table)
    }

    /// Names with statistics, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stats.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.stats.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.read().is_empty()
    }

    /// Recomputes statistics for every table in `catalog`.
    pub fn compute_all(&self, catalog: &Catalog, config: &StatsConfig) -> Result<usize> {
        info!(tables = catalog.len(), "computing table statistics");
        let mut computed = 0;
        for table_id in catalog.table_ids() {
            let name = catalog.table_name(table_id)?;
            let stats = TableStats::for_table(catalog, table_id, config)?;
            self.set(&name, stats);
            computed += 1;
        }
        info!(computed, "table statistics ready");
        Ok(computed)
    }
}
