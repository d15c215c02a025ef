//! Grouped aggregation over a single column.
//!
//! The child is drained when the operator opens. Groups are emitted in
//! ascending order of the group value. Integer columns support every
//! aggregate; string columns only support `Count`.

use crate::operator::OpIterator;
use sable_common::{Field, Result, SableError, Schema, SchemaItem, Type};
use sable_storage::{Tuple, TupleIterator};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    /// Integer average, rounded toward zero.
    Avg,
    Count,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl Accumulator {
    fn merge(&mut self, field: &Field) {
        self.count += 1;
        if let Field::Int(v) = *field {
            self.sum += i64::from(v);
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    fn finish(&self, op: AggregateOp) -> Result<i32> {
        let value = match op {
            AggregateOp::Count => self.count,
            AggregateOp::Sum => self.sum,
            AggregateOp::Avg if self.count == 0 => 0,
            AggregateOp::Avg => self.sum / self.count,
            AggregateOp::Min => self.min.map_or(0, i64::from),
            AggregateOp::Max => self.max.map_or(0, i64::from),
        };
        i32::try_from(value).map_err(|_| SableError::InvalidParameter {
            name: op.to_string(),
            value: format!("{value} does not fit in INT"),
        })
    }
}

/// Computes one aggregate, optionally grouped by another column.
///
/// Output is `(aggregate)` without grouping or `(group, aggregate)` with it.
/// An empty input produces no rows.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    schema: Arc<Schema>,
    results: Vec<Tuple>,
    position: Option<usize>,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let input = child.schema();
        let agg_type = input.field_type(agg_field)?;
        if agg_type == Type::String && op != AggregateOp::Count {
            return Err(SableError::InvalidParameter {
                name: "aggregate".to_string(),
                value: format!("{op} is not supported on STRING columns"),
            });
        }

        let agg_name = format!("{} ({})", op, input.field_name(agg_field)?);
        let mut items = Vec::with_capacity(2);
        if let Some(g) = group_field {
            items.push(SchemaItem::new(input.field_type(g)?, input.field_name(g)?));
        }
        items.push(SchemaItem::new(Type::Int, agg_name));
        let schema = Arc::new(Schema::from_items(items)?);

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            schema,
            results: Vec::new(),
            position: None,
        })
    }

    pub fn aggregate_field(&self) -> usize {
        self.agg_field
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    fn compute(&mut self) -> Result<Vec<Tuple>> {
        let mut groups: BTreeMap<Option<Field>, Accumulator> = BTreeMap::new();
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let key = match self.group_field {
                Some(g) => Some(tuple.field(g)?.clone()),
                None => None,
            };
            groups.entry(key).or_default().merge(tuple.field(self.agg_field)?);
        }
        debug!(op = %self.op, groups = groups.len(), "aggregated input");

        groups
            .into_iter()
            .map(|(key, acc)| {
                let value = Field::Int(acc.finish(self.op)?);
                let fields = match key {
                    Some(group) => vec![group, value],
                    None => vec![value],
                };
                Tuple::new(Arc::clone(&self.schema), fields)
            })
            .collect()
    }
}

impl TupleIterator for Aggregate {
    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.results = self.compute()?;
        self.position = Some(0);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        Ok(matches!(self.position, Some(i) if i < self.results.len()))
    }

    fn next(&mut self) -> Result<Tuple> {
        match self.position {
            Some(i) if i < self.results.len() => {
                self.position = Some(i + 1);
                Ok(self.results[i].clone())
            }
            _ => Err(SableError::NoSuchElement(
                "aggregate has no more groups".to_string(),
            )),
        }
    }

    /// Replays the computed groups without reading the child again.
    fn rewind(&mut self) -> Result<()> {
        if self.position.is_some() {
            self.position = Some(0);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.position = None;
    }
}

impl OpIterator for Aggregate {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::TupleList;

    fn input(rows: &[(i32, &str)]) -> Box<dyn OpIterator> {
        let schema = Arc::new(
            Schema::new(
                vec![Type::Int, Type::String],
                vec!["score".to_string(), "team".to_string()],
            )
            .unwrap(),
        );
        let tuples = rows
            .iter()
            .map(|(n, s)| {
                Tuple::new(Arc::clone(&schema), vec![Field::Int(*n), Field::string(*s)]).unwrap()
            })
            .collect();
        Box::new(TupleList::new(schema, tuples).unwrap())
    }

    fn run(mut agg: Aggregate) -> Vec<Vec<Field>> {
        agg.open().unwrap();
        let rows = agg
            .collect_remaining()
            .unwrap()
            .into_iter()
            .map(Tuple::into_fields)
            .collect();
        agg.close();
        rows
    }

    const ROWS: &[(i32, &str)] = &[(3, "red"), (8, "blue"), (-2, "red"), (5, "blue"), (4, "red")];

    #[test]
    fn test_ungrouped_int_aggregates() {
        for (op, expected) in [
            (AggregateOp::Min, -2),
            (AggregateOp::Max, 8),
            (AggregateOp::Sum, 18),
            (AggregateOp::Avg, 3),
            (AggregateOp::Count, 5),
        ] {
            let agg = Aggregate::new(input(ROWS), 0, None, op).unwrap();
            assert_eq!(run(agg), vec![vec![Field::Int(expected)]], "{op}");
        }
    }

    #[test]
    fn test_grouped_sum_sorted_by_group() {
        let agg = Aggregate::new(input(ROWS), 0, Some(1), AggregateOp::Sum).unwrap();
        assert_eq!(
            run(agg),
            vec![
                vec![Field::string("blue"), Field::Int(13)],
                vec![Field::string("red"), Field::Int(5)],
            ]
        );
    }

    #[test]
    fn test_avg_truncates_toward_zero() {
        let agg = Aggregate::new(input(&[(-3, "a"), (-4, "a")]), 0, None, AggregateOp::Avg).unwrap();
        assert_eq!(run(agg), vec![vec![Field::Int(-3)]]);
    }

    #[test]
    fn test_string_count_only() {
        let agg = Aggregate::new(input(ROWS), 1, None, AggregateOp::Count).unwrap();
        assert_eq!(run(agg), vec![vec![Field::Int(5)]]);

        let err = Aggregate::new(input(ROWS), 1, None, AggregateOp::Max).err().unwrap();
        assert!(matches!(err, SableError::InvalidParameter { .. }));
    }

    #[test]
    fn test_output_schema_names() {
        let agg = Aggregate::new(input(ROWS), 0, Some(1), AggregateOp::Max).unwrap();
        let schema = agg.schema();
        assert_eq!(schema.num_fields(), 2);
        assert_eq!(schema.field_name(0).unwrap(), "team");
        assert_eq!(schema.field_type(0).unwrap(), Type::String);
        assert_eq!(schema.field_name(1).unwrap(), "max (score)");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let agg = Aggregate::new(input(&[]), 0, None, AggregateOp::Count).unwrap();
        assert!(run(agg).is_empty());
    }

    #[test]
    fn test_sum_overflow_reported() {
        let mut agg =
            Aggregate::new(input(&[(i32::MAX, "a"), (1, "a")]), 0, None, AggregateOp::Sum).unwrap();
        assert!(matches!(agg.open(), Err(SableError::InvalidParameter { .. })));
    }

    #[test]
    fn test_rewind_replays_groups() {
        let mut agg = Aggregate::new(input(ROWS), 0, Some(1), AggregateOp::Count).unwrap();
        agg.open().unwrap();
        assert_eq!(agg.collect_remaining().unwrap().len(), 2);
        assert!(!agg.has_next().unwrap());
        agg.rewind().unwrap();
        assert_eq!(agg.collect_remaining().unwrap().len(), 2);
        assert!(matches!(agg.next(), Err(SableError::NoSuchElement(_))));
    }

    #[test]
    fn test_bad_field_index() {
        assert!(matches!(
            Aggregate::new(input(ROWS), 4, None, AggregateOp::Count),
            Err(SableError::FieldIndexOutOfBounds { .. })
        ));
    }
}
