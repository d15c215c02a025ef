//! Tuple representation and serialization.

use bytes::BufMut;
use sable_common::{Field, PageId, Result, SableError, Schema};
use std::sync::Arc;

/// Index of a slot within a heap page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Location of a stored tuple: the page holding it and its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl TupleId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl std::fmt::Display for TupleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_id.0)
    }
}

/// A row of typed values conforming to a schema.
///
/// The field count and types always match the schema. The tuple id is set
/// once the tuple has been placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    tuple_id: Option<TupleId>,
}

impl Tuple {
    /// Creates a tuple, checking the values against the schema.
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != schema.num_fields() {
            return Err(SableError::SchemaMismatch {
                expected: schema.to_string(),
                actual: format!("{} fields", fields.len()),
            });
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = schema.field_type(i)?;
            if field.field_type() != expected {
                return Err(SableError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: field.field_type().to_string(),
                });
            }
        }
        Ok(Self {
            schema,
            fields,
            tuple_id: None,
        })
    }

    /// Reads one tuple from the front of `buf`.
    pub fn parse(schema: Arc<Schema>, buf: &mut &[u8]) -> Result<Self> {
        let fields = schema
            .types()
            .map(|field_type| field_type.parse(buf))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            fields,
            tuple_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn field(&self, index: usize) -> Result<&Field> {
        self.fields
            .get(index)
            .ok_or(SableError::FieldIndexOutOfBounds {
                index,
                len: self.fields.len(),
            })
    }

    /// Replaces the value at `index`. The new value must have the column's type.
    pub fn set_field(&mut self, index: usize, field: Field) -> Result<()> {
        let len = self.fields.len();
        let expected = self.schema.field_type(index)?;
        if field.field_type() != expected {
            return Err(SableError::TypeMismatch {
                expected: expected.to_string(),
                actual: field.field_type().to_string(),
            });
        }
        let slot = self
            .fields
            .get_mut(index)
            .ok_or(SableError::FieldIndexOutOfBounds { index, len })?;
        *slot = field;
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn tuple_id(&self) -> Option<TupleId> {
        self.tuple_id
    }

    pub fn set_tuple_id(&mut self, tuple_id: Option<TupleId>) {
        self.tuple_id = tuple_id;
    }

    /// Writes exactly `schema.size()` bytes.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        for field in &self.fields {
            field.serialize(buf);
        }
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
