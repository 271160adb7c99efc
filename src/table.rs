//! `Table` orchestrates the rest of the engine into the four operations a
//! caller actually performs: insert, select, delete, and update. It owns the
//! schema, the on-disk file handle, and one in-memory index per indexed
//! column, and is the only thing that touches all three at once.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::expr::{self, Expr};
use crate::file_handle::FileHandle;
use crate::index_set::IndexSet;
use crate::planner;
use crate::record::{self, Tuple};
use crate::schema::Schema;
use crate::types::RecordId;
use crate::value::ColumnValue;

pub struct Table {
    schema: Schema,
    file: FileHandle,
    indexes: HashMap<String, IndexSet>,
}

impl Table {
    /// Open (or create) a table backed by `data_path`, described by the
    /// schema text at `schema_path`. Indexes are rebuilt from a full scan of
    /// the data file; the engine keeps no separate persisted index.
    pub fn open(schema_path: impl AsRef<Path>, data_path: impl AsRef<Path>) -> Result<Self> {
        let schema_text = std::fs::read_to_string(schema_path)?;
        let schema = Schema::parse_text(&schema_text)?;
        let file = FileHandle::open(data_path)?;

        let mut indexes = HashMap::new();
        for attr in schema.indexed_columns() {
            indexes.insert(attr.name().to_string(), IndexSet::new(attr.name(), attr.primary()));
        }

        let mut table = Self { schema, file, indexes };
        let mut rebuilt = 0;
        for (rid, bytes) in table.file.scan()? {
            let tuple = record::decode(&bytes, &table.schema)?;
            rebuilt += 1;
            for (name, col) in table.indexed_columns() {
                table
                    .indexes
                    .get_mut(&name)
                    .unwrap()
                    .insert(tuple[col].clone(), rid)?;
            }
        }
        debug!("rebuilt indexes for {} column(s) from {} existing row(s)", table.indexes.len(), rebuilt);
        Ok(table)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }

    fn indexed_columns(&self) -> Vec<(String, usize)> {
        self.schema
            .indexed_columns()
            .map(|a| (a.name().to_string(), self.schema.get_column_index(a.name()).unwrap()))
            .collect()
    }

    fn type_check(&self, tuple: &[ColumnValue]) -> Result<()> {
        let attrs = self.schema.attributes();
        if tuple.len() != attrs.len() {
            return Err(Error::Malformed(format!(
                "expected {} values, got {}",
                attrs.len(),
                tuple.len()
            )));
        }
        for (attr, value) in attrs.iter().zip(tuple) {
            if value.kind() != attr.kind() {
                return Err(Error::TypeMismatch {
                    lhs: attr.kind().name(),
                    rhs: value.kind().name(),
                });
            }
            if attr.not_null() && value.is_null() {
                return Err(Error::SchemaViolation {
                    column: attr.name().to_string(),
                    reason: "NOT NULL column given a null value".to_string(),
                });
            }
            if let ColumnValue::Varchar(tier, Some(s)) = value {
                if s.len() as u32 > tier.bytes() {
                    return Err(Error::SchemaViolation {
                        column: attr.name().to_string(),
                        reason: format!("value of {} bytes exceeds column capacity of {}", s.len(), tier.bytes()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Insert a new row, enforcing type and not-null constraints and primary
    /// key uniqueness. On any index failure, the base row is rolled back so
    /// the table is left exactly as it was before the call.
    pub fn insert(&mut self, tuple: Tuple) -> Result<RecordId> {
        self.type_check(&tuple)?;

        if let Some(primary) = self.schema.primary_column() {
            let col = self.schema.get_column_index(primary.name()).unwrap();
            if !self.indexes[primary.name()].equal(&tuple[col]).is_empty() {
                return Err(Error::UniquenessViolation {
                    column: primary.name().to_string(),
                });
            }
        }

        let bytes = record::encode(&tuple, &self.schema)?;
        let rid = self.file.insert(&bytes)?;

        let indexed = self.indexed_columns();
        let mut committed = Vec::new();
        for (name, col) in &indexed {
            match self.indexes.get_mut(name).unwrap().insert(tuple[*col].clone(), rid) {
                Ok(()) => committed.push((name.clone(), tuple[*col].clone())),
                Err(e) => {
                    warn!("insert of {} rolled back: index '{}' rejected it ({})", rid, name, e);
                    for (name, value) in committed {
                        self.indexes.get_mut(&name).unwrap().remove(&value, rid);
                    }
                    self.file.delete(rid).ok();
                    return Err(e);
                }
            }
        }

        Ok(rid)
    }

    /// Candidate `(RecordId, Tuple)` pairs matching `predicate`, via an
    /// index lookup when possible and a full scan otherwise.
    fn candidates(&mut self, predicate: Option<&Expr>) -> Result<Vec<(RecordId, Tuple)>> {
        let planned = predicate.and_then(|p| planner::plan(p, &self.schema, &self.indexes));

        match planned {
            Some(rids) => {
                let mut out = Vec::with_capacity(rids.len());
                for rid in rids {
                    let bytes = self.file.get(rid)?;
                    out.push((rid, record::decode(&bytes, &self.schema)?));
                }
                Ok(out)
            }
            None => {
                let mut out = Vec::new();
                for (rid, bytes) in self.file.scan()? {
                    let tuple = record::decode(&bytes, &self.schema)?;
                    let matches = match predicate {
                        Some(p) => expr::evaluate(p, &tuple, &self.schema)?,
                        None => true,
                    };
                    if matches {
                        out.push((rid, tuple));
                    }
                }
                Ok(out)
            }
        }
    }

    /// Return every row matching `predicate` (or every row, if `None`),
    /// projected to `projection`'s columns in order (or every column).
    pub fn select(&mut self, predicate: Option<&Expr>, projection: Option<&[String]>) -> Result<Vec<Tuple>> {
        let rows = self.candidates(predicate)?;
        let indices: Option<Vec<usize>> = projection.map(|cols| {
            cols.iter()
                .map(|c| self.schema.get_column_index(c).ok_or_else(|| Error::Malformed(format!("unknown column '{}'", c))))
                .collect::<Result<Vec<_>>>()
        }).transpose()?;

        Ok(rows
            .into_iter()
            .map(|(_, tuple)| match &indices {
                Some(idx) => idx.iter().map(|&i| tuple[i].clone()).collect::<Vec<ColumnValue>>(),
                None => tuple,
            })
            .collect())
    }

    /// Delete every row matching `predicate` (or every row, if `None`).
    /// Matching ids are fully materialized before any mutation begins, so
    /// later deletes on the same page can't shift a not-yet-visited slot.
    pub fn delete(&mut self, predicate: Option<&Expr>) -> Result<usize> {
        let rows = self.candidates(predicate)?;
        let indexed = self.indexed_columns();

        for (rid, tuple) in &rows {
            for (name, col) in &indexed {
                self.indexes.get_mut(name).unwrap().remove(&tuple[*col], *rid);
            }
            self.file.delete(*rid)?;
        }
        Ok(rows.len())
    }

    /// Update every row matching `predicate` (or every row, if `None`) by
    /// overlaying `assignments` onto it. A row's RID is preserved when the
    /// updated encoding still fits its slot; otherwise it moves.
    pub fn update(&mut self, predicate: Option<&Expr>, assignments: &[(String, ColumnValue)]) -> Result<usize> {
        let rows = self.candidates(predicate)?;
        let indexed = self.indexed_columns();

        let mut assignment_indices = Vec::with_capacity(assignments.len());
        for (name, value) in assignments {
            let i = self
                .schema
                .get_column_index(name)
                .ok_or_else(|| Error::Malformed(format!("unknown column '{}'", name)))?;
            assignment_indices.push((i, value.clone()));
        }

        let mut updated = 0;
        for (rid, old_tuple) in rows {
            let mut new_tuple = old_tuple.clone();
            for (i, value) in &assignment_indices {
                new_tuple[*i] = value.clone();
            }
            self.type_check(&new_tuple)?;

            if let Some(primary) = self.schema.primary_column() {
                let col = self.schema.get_column_index(primary.name()).unwrap();
                let conflicting = self.indexes[primary.name()]
                    .equal(&new_tuple[col])
                    .iter()
                    .any(|&r| r != rid);
                if conflicting {
                    return Err(Error::UniquenessViolation {
                        column: primary.name().to_string(),
                    });
                }
            }

            for (name, col) in &indexed {
                self.indexes.get_mut(name).unwrap().remove(&old_tuple[*col], rid);
            }

            let new_bytes = record::encode(&new_tuple, &self.schema)?;
            let final_rid = match self.file.update(rid, &new_bytes) {
                Ok(final_rid) => final_rid,
                Err(err) => {
                    // `file.update` can fail after its own fallback delete
                    // already removed the base row (the reinsert ran out of
                    // space). Find out whether `rid` still holds the row: if
                    // so the index entries removed above just need restoring
                    // under `rid`; if not, the row itself must be put back
                    // first so the index doesn't point at nothing.
                    let restore_rid = match self.file.get(rid) {
                        Ok(_) => rid,
                        Err(_) => self.file.insert(&record::encode(&old_tuple, &self.schema)?)?,
                    };
                    for (name, col) in &indexed {
                        self.indexes
                            .get_mut(name)
                            .unwrap()
                            .insert(old_tuple[*col].clone(), restore_rid)?;
                    }
                    return Err(err);
                }
            };

            for (name, col) in &indexed {
                self.indexes.get_mut(name).unwrap().insert(new_tuple[*col].clone(), final_rid)?;
            }

            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CapacityTier;
    use pretty_assertions::assert_eq;

    fn make_table() -> (tempfile::TempDir, Table) {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.txt");
        std::fs::write(&schema_path, "3\nid\nINT 0 1 1 1\nname\nVARCHAR 32 0 1 0\nage\nINT 0 0 0 0\n").unwrap();
        let data_path = dir.path().join("data.tbl");
        let table = Table::open(&schema_path, &data_path).unwrap();
        (dir, table)
    }

    fn row(id: i32, name: &str, age: i32) -> Tuple {
        vec![
            ColumnValue::Int32(Some(id)),
            ColumnValue::Varchar(CapacityTier::C32, Some(name.to_string())),
            ColumnValue::Int32(Some(age)),
        ]
    }

    #[test]
    fn insert_then_select_all() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();
        table.insert(row(2, "bob", 40)).unwrap();

        let rows = table.select(None, None).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn duplicate_primary_key_is_rejected_and_leaves_no_trace() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();
        assert!(table.insert(row(1, "bob", 40)).is_err());
        assert_eq!(table.select(None, None).unwrap().len(), 1);
    }

    #[test]
    fn select_with_equality_predicate_uses_the_index() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();
        table.insert(row(2, "bob", 40)).unwrap();

        let pred = Expr::col("name").eq(Expr::LiteralString("bob".to_string()));
        let rows = table.select(Some(&pred), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], row(2, "bob", 40));
    }

    #[test]
    fn select_with_projection() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();

        let rows = table.select(None, Some(&["name".to_string()])).unwrap();
        assert_eq!(rows[0], vec![ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string()))]);
    }

    #[test]
    fn delete_removes_matching_rows_and_their_index_entries() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();
        table.insert(row(2, "bob", 40)).unwrap();

        let pred = Expr::col("id").eq(Expr::LiteralInt(1));
        let n = table.delete(Some(&pred)).unwrap();
        assert_eq!(n, 1);
        assert_eq!(table.select(None, None).unwrap().len(), 1);

        // Re-inserting id 1 must succeed now that its old entry is gone.
        table.insert(row(1, "carl", 50)).unwrap();
    }

    #[test]
    fn update_changes_values_and_keeps_indexes_consistent() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();

        let pred = Expr::col("id").eq(Expr::LiteralInt(1));
        let n = table
            .update(Some(&pred), &[("age".to_string(), ColumnValue::Int32(Some(31)))])
            .unwrap();
        assert_eq!(n, 1);

        let rows = table.select(Some(&pred), None).unwrap();
        assert_eq!(rows[0], row(1, "ada", 31));

        let by_name = table
            .select(
                Some(&Expr::col("name").eq(Expr::LiteralString("ada".to_string()))),
                None,
            )
            .unwrap();
        assert_eq!(by_name.len(), 1);
    }

    #[test]
    fn update_rejects_a_primary_key_collision() {
        let (_dir, mut table) = make_table();
        table.insert(row(1, "ada", 30)).unwrap();
        table.insert(row(2, "bob", 40)).unwrap();

        let pred = Expr::col("id").eq(Expr::LiteralInt(2));
        let result = table.update(Some(&pred), &[("id".to_string(), ColumnValue::Int32(Some(1)))]);
        assert!(result.is_err());
    }

    #[test]
    fn insert_rejects_null_in_a_not_null_column() {
        let (_dir, mut table) = make_table();
        let tuple = vec![
            ColumnValue::Int32(None),
            ColumnValue::Varchar(CapacityTier::C32, Some("x".to_string())),
            ColumnValue::Int32(Some(1)),
        ];
        assert!(table.insert(tuple).is_err());
    }
}
