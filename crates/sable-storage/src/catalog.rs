//! Table catalog: names, schemas, primary keys and heap files.
//!
//! A table's id is the id of its data file. Adding a table under a name that
//! is already taken replaces the older entry.

use crate::cache::PageCache;
use crate::disk::DiskManager;
use crate::heap::HeapFile;
use parking_lot::RwLock;
use sable_common::{Result, SableError, Schema, SchemaItem, Type};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

struct TableEntry {
    name: String,
    primary_key: String,
    file: Arc<HeapFile>,
}

/// Registry of every table in the database.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<u32, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` as table `name`. An empty `primary_key` means none.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) {
        let mut tables = self.tables.write();
        tables.retain(|_, entry| entry.name != name);
        tables.insert(
            file.id(),
            TableEntry {
                name: name.to_string(),
                primary_key: primary_key.to_string(),
                file,
            },
        );
    }

    pub fn table_id(&self, name: &str) -> Result<u32> {
        self.tables
            .read()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(&id, _)| id)
            .ok_or_else(|| SableError::TableNotFound(name.to_string()))
    }

    pub fn schema(&self, table_id: u32) -> Result<Arc<Schema>> {
        self.with_entry(table_id, |entry| Arc::clone(entry.file.schema()))
    }

    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.with_entry(table_id, |entry| Arc::clone(&entry.file))
    }

    pub fn primary_key(&self, table_id: u32) -> Result<String> {
        self.with_entry(table_id, |entry| entry.primary_key.clone())
    }

    pub fn table_name(&self, table_id: u32) -> Result<String> {
        self.with_entry(table_id, |entry| entry.name.clone())
    }

    /// Ids of all registered tables, ascending.
    pub fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }

    /// Loads table definitions from a catalog file.
    ///
    /// Each non-blank line reads `name (field type [pk], ...)`. Table data is
    /// expected at `<catalog dir>/<name>.dat` and is created when missing.
    /// Nothing is registered if any line fails to parse or any table's
    /// file cannot be opened.
    pub fn load_schema(
        &self,
        path: &Path,
        disk: &Arc<DiskManager>,
        cache: &Arc<dyn PageCache>,
    ) -> Result<Vec<u32>> {
        let contents = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let definitions = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| parse_table_line(i + 1, line))
            .collect::<Result<Vec<_>>>()?;

        let opened = definitions
            .into_iter()
            .map(|def| {
                let data_path = base.join(format!("{}.dat", def.name));
                let file = HeapFile::open(
                    &data_path,
                    Arc::new(def.schema),
                    Arc::clone(disk),
                    Arc::clone(cache),
                )?;
                Ok((Arc::new(file), def.name, def.primary_key))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ids = Vec::with_capacity(opened.len());
        for (file, name, primary_key) in opened {
            info!(
                table = %name,
                table_id = file.id(),
                schema = %file.schema(),
                "added table"
            );
            ids.push(file.id());
            self.add_table(file, &name, &primary_key);
        }
        Ok(ids)
    }

    fn with_entry<T>(&self, table_id: u32, f: impl FnOnce(&TableEntry) -> T) -> Result<T> {
        self.tables
            .read()
            .get(&table_id)
            .map(f)
            .ok_or_else(|| SableError::TableNotFound(format!("table id {}", table_id)))
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        let mut names: Vec<&str> = tables.values().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("Catalog").field("tables", &names).finish()
    }
}

#[derive(Debug)]
struct TableDefinition {
    name: String,
    schema: Schema,
    primary_key: String,
}

fn parse_table_line(line_no: usize, line: &str) -> Result<TableDefinition> {
    let fail = |reason: &str| SableError::CatalogParse {
        line_no,
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let open = line.find('(').ok_or_else(|| fail("missing '('"))?;
    let close = line.rfind(')').ok_or_else(|| fail("missing ')'"))?;
    if close < open {
        return Err(fail("')' before '('"));
    }

    let name = line[..open].trim();
    if name.is_empty() {
        return Err(fail("missing table name"));
    }

    let mut items = Vec::new();
    let mut primary_key = String::new();
    for column in line[open + 1..close].split(',') {
        let parts: Vec<&str> = column.split_whitespace().collect();
        let (field, type_name, annotation) = match parts.as_slice() {
            [field, type_name] => (*field, *type_name, None),
            [field, type_name, annotation] => (*field, *type_name, Some(*annotation)),
            _ => return Err(fail(&format!("malformed column '{}'", column.trim()))),
        };
        let field_type =
            Type::from_name(type_name).ok_or_else(|| fail(&format!("unknown type '{}'", type_name)))?;
        match annotation {
            None => {}
            Some("pk") if primary_key.is_empty() => primary_key = field.to_string(),
            Some("pk") => return Err(fail("more than one primary key")),
            Some(other) => return Err(fail(&format!("unknown annotation '{}'", other))),
        }
        items.push(SchemaItem::new(field_type, field));
    }

    let schema = Schema::from_items(items).map_err(|e| fail(&e.to_string()))?;
    Ok(TableDefinition {
        name: name.to_string(),
        schema,
        primary_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_line() {
        let def = parse_table_line(1, "users (id int pk, name string)").unwrap();
        assert_eq!(def.name, "users");
        assert_eq!(def.primary_key, "id");
        assert_eq!(def.schema.num_fields(), 2);
        assert_eq!(def.schema.field_type(1).unwrap(), Type::String);
        assert_eq!(def.schema.field_name(0).unwrap(), "id");
    }

    #[test]
    fn test_parse_type_case_insensitive() {
        let def = parse_table_line(1, "t (a INT, b String)").unwrap();
        assert_eq!(def.schema.field_type(0).unwrap(), Type::Int);
        assert_eq!(def.schema.field_type(1).unwrap(), Type::String);
        assert!(def.primary_key.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        for (line, reason) in [
            ("t a int", "missing '('"),
            ("t (a int", "missing ')'"),
            ("(a int)", "missing table name"),
            ("t (a float)", "unknown type 'float'"),
            ("t (a int key)", "unknown annotation 'key'"),
            ("t (a int pk, b int pk)", "more than one primary key"),
            ("t (a)", "malformed column 'a'"),
        ] {
            match parse_table_line(7, line) {
                Err(SableError::CatalogParse {
                    line_no,
                    line: bad,
                    reason: got,
                }) => {
                    assert_eq!(line_no, 7);
                    assert_eq!(bad, line);
                    assert_eq!(got, reason, "line {:?}", line);
                }
                other => panic!("expected parse error for {:?}, got {:?}", line, other),
            }
        }
    }
}
