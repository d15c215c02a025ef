//! Tuple descriptors.

use crate::error::{Result, SableError};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One column of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaItem {
    pub field_type: Type,
    pub name: String,
}

impl SchemaItem {
    pub fn new(field_type: Type, name: impl Into<String>) -> Self {
        Self {
            field_type,
            name: name.into(),
        }
    }
}

/// Ordered list of `(type, name)` pairs describing a tuple.
///
/// Immutable after construction and never empty. Two schemas are equal when
/// their type sequences match; names are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<SchemaItem>", into = "Vec<SchemaItem>")]
pub struct Schema {
    items: Vec<SchemaItem>,
}

impl Schema {
    /// Creates a schema from parallel type and name lists.
    pub fn new(types: Vec<Type>, names: Vec<String>) -> Result<Self> {
        if types.len() != names.len() {
            return Err(SableError::InvalidParameter {
                name: "names".to_string(),
                value: format!("{} names for {} types", names.len(), types.len()),
            });
        }
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| SchemaItem { field_type, name })
            .collect();
        Self::from_items(items)
    }

    /// Creates a schema with empty field names.
    pub fn from_types(types: Vec<Type>) -> Result<Self> {
        let names = vec![String::new(); types.len()];
        Self::new(types, names)
    }

    pub fn from_items(items: Vec<SchemaItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(SableError::EmptySchema);
        }
        Ok(Self { items })
    }

    /// Concatenates two schemas, `a` first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let items = a.items.iter().chain(&b.items).cloned().collect();
        Schema { items }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, index: usize) -> Result<Type> {
        self.item(index).map(|item| item.field_type)
    }

    pub fn field_name(&self, index: usize) -> Result<&str> {
        self.item(index).map(|item| item.name.as_str())
    }

    /// Returns the index of the first field named `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.name == name)
            .ok_or_else(|| SableError::FieldNotFound(name.to_string()))
    }

    /// Size in bytes of a tuple with this schema.
    pub fn size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.items.iter().map(|item| item.field_type)
    }

    /// Returns a copy with every field name prefixed by `alias.`.
    pub fn with_prefix(&self, alias: &str) -> Schema {
        let items = self
            .items
            .iter()
            .map(|item| SchemaItem {
                field_type: item.field_type,
                name: format!("{}.{}", alias, item.name),
            })
            .collect();
        Schema { items }
    }

    fn item(&self, index: usize) -> Result<&SchemaItem> {
        self.items
            .get(index)
            .ok_or(SableError::FieldIndexOutOfBounds {
                index,
                len: self.items.len(),
            })
    }
}

impl TryFrom<Vec<SchemaItem>> for Schema {
    type Error = SableError;

    fn try_from(items: Vec<SchemaItem>) -> Result<Self> {
        Self::from_items(items)
    }
}

impl From<Schema> for Vec<SchemaItem> {
    fn from(schema: Schema) -> Self {
        schema.items
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.types().eq(other.types())
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for field_type in self.types() {
            field_type.hash(state);
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", item.field_type, item.name)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schema_size() {
        let schema = Schema::new(vec![Type::Int, Type::String], names(&["id", "name"])).unwrap();
        assert_eq!(schema.num_fields(), 2);
        assert_eq!(schema.size(), 4 + 132);
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(
            Schema::from_types(vec![]),
            Err(SableError::EmptySchema)
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let schema = Schema::new(vec![Type::Int, Type::String], names(&["id", "name"])).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
        assert_eq!(back.field_name(1).unwrap(), "name");
    }

    #[test]
    fn test_deserialize_empty_schema_rejected() {
        assert!(serde_json::from_str::<Schema>("[]").is_err());
    }

    #[test]
    fn test_name_count_mismatch() {
        assert!(Schema::new(vec![Type::Int], names(&["a", "b"])).is_err());
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = Schema::new(vec![Type::Int, Type::Int], names(&["a", "b"])).unwrap();
        let b = Schema::new(vec![Type::Int, Type::Int], names(&["x", "y"])).unwrap();
        let c = Schema::from_types(vec![Type::Int, Type::String]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        use std::collections::HashSet;
        let set: HashSet<Schema> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_field_lookup() {
        let schema = Schema::new(vec![Type::Int, Type::String], names(&["id", "name"])).unwrap();
        assert_eq!(schema.index_of("name").unwrap(), 1);
        assert!(matches!(
            schema.index_of("missing"),
            Err(SableError::FieldNotFound(_))
        ));
        assert_eq!(schema.field_type(0).unwrap(), Type::Int);
        assert_eq!(schema.field_name(1).unwrap(), "name");
        assert!(matches!(
            schema.field_type(2),
            Err(SableError::FieldIndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_merge_and_prefix() {
        let a = Schema::new(vec![Type::Int], names(&["id"])).unwrap();
        let b = Schema::new(vec![Type::String], names(&["name"])).unwrap();
        let merged = Schema::merge(&a, &b);
        assert_eq!(merged.num_fields(), 2);
        assert_eq!(merged.field_type(1).unwrap(), Type::String);

        let prefixed = merged.with_prefix("t");
        assert_eq!(prefixed.field_name(0).unwrap(), "t.id");
        assert_eq!(prefixed.field_name(1).unwrap(), "t.name");
    }

    #[test]
    fn test_display() {
        let schema = Schema::new(vec![Type::Int, Type::String], names(&["id", "name"])).unwrap();
        assert_eq!(schema.to_string(), "(INT(id), STRING(name))");
    }
}
