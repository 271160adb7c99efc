//! A single-column index: an ordered map from column value to the set of
//! record ids holding that value, used both to enforce primary-column
//! uniqueness and to answer equality/range lookups during query planning.

use std::collections::BTreeSet;
use std::ops::Bound;

use crate::error::{Error, Result};
use crate::types::RecordId;
use crate::value::ColumnValue;

pub struct IndexSet {
    unique: bool,
    column: String,
    map: std::collections::BTreeMap<ColumnValue, BTreeSet<RecordId>>,
}

impl IndexSet {
    pub fn new(column: &str, unique: bool) -> Self {
        Self {
            unique,
            column: column.to_string(),
            map: std::collections::BTreeMap::new(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Record that `rid` holds `key`. Errs if this index enforces uniqueness
    /// and `key` is already associated with a different rid.
    pub fn insert(&mut self, key: ColumnValue, rid: RecordId) -> Result<()> {
        if self.unique {
            if let Some(existing) = self.map.get(&key) {
                if !existing.is_empty() && !(existing.len() == 1 && existing.contains(&rid)) {
                    return Err(Error::UniquenessViolation {
                        column: self.column.clone(),
                    });
                }
            }
        }
        self.map.entry(key).or_insert_with(BTreeSet::new).insert(rid);
        Ok(())
    }

    /// Undo a prior `insert`. No-op if the pair isn't present.
    pub fn remove(&mut self, key: &ColumnValue, rid: RecordId) {
        if let Some(set) = self.map.get_mut(key) {
            set.remove(&rid);
            if set.is_empty() {
                self.map.remove(key);
            }
        }
    }

    pub fn equal(&self, key: &ColumnValue) -> BTreeSet<RecordId> {
        self.map.get(key).cloned().unwrap_or_default()
    }

    /// Union of every rid whose key falls within `(lower, upper)`.
    pub fn range(&self, lower: Bound<ColumnValue>, upper: Bound<ColumnValue>) -> BTreeSet<RecordId> {
        let mut out = BTreeSet::new();
        for (_, set) in self.map.range((lower, upper)) {
            out.extend(set.iter().copied());
        }
        out
    }
}

pub fn intersect(a: &BTreeSet<RecordId>, b: &BTreeSet<RecordId>) -> BTreeSet<RecordId> {
    a.intersection(b).copied().collect()
}

pub fn union(a: &BTreeSet<RecordId>, b: &BTreeSet<RecordId>) -> BTreeSet<RecordId> {
    a.union(b).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CapacityTier;

    fn rid(p: u32, s: u32) -> RecordId {
        RecordId::new(p, s)
    }

    #[test]
    fn equality_lookup_finds_all_matching_rids() {
        let mut idx = IndexSet::new("age", false);
        idx.insert(ColumnValue::Int32(Some(30)), rid(1, 1)).unwrap();
        idx.insert(ColumnValue::Int32(Some(30)), rid(1, 2)).unwrap();
        idx.insert(ColumnValue::Int32(Some(40)), rid(1, 3)).unwrap();

        let found = idx.equal(&ColumnValue::Int32(Some(30)));
        assert_eq!(found.len(), 2);
        assert!(found.contains(&rid(1, 1)));
        assert!(found.contains(&rid(1, 2)));
    }

    #[test]
    fn unique_index_rejects_a_second_distinct_rid_for_the_same_key() {
        let mut idx = IndexSet::new("id", true);
        idx.insert(ColumnValue::Int32(Some(1)), rid(1, 1)).unwrap();
        assert!(idx.insert(ColumnValue::Int32(Some(1)), rid(1, 2)).is_err());
    }

    #[test]
    fn range_lookup_respects_bounds() {
        let mut idx = IndexSet::new("age", false);
        for (v, s) in [(10, 1), (20, 2), (30, 3), (40, 4)] {
            idx.insert(ColumnValue::Int32(Some(v)), rid(1, s)).unwrap();
        }
        let found = idx.range(
            Bound::Excluded(ColumnValue::Int32(Some(10))),
            Bound::Included(ColumnValue::Int32(Some(30))),
        );
        assert_eq!(found.len(), 2);
        assert!(found.contains(&rid(1, 2)));
        assert!(found.contains(&rid(1, 3)));
    }

    #[test]
    fn remove_drops_the_key_once_its_last_rid_is_gone() {
        let mut idx = IndexSet::new("age", false);
        idx.insert(ColumnValue::Int32(Some(1)), rid(1, 1)).unwrap();
        idx.remove(&ColumnValue::Int32(Some(1)), rid(1, 1));
        assert!(idx.equal(&ColumnValue::Int32(Some(1))).is_empty());
    }

    #[test]
    fn intersection_and_union_combine_rid_sets() {
        let a: BTreeSet<RecordId> = [rid(1, 1), rid(1, 2)].into_iter().collect();
        let b: BTreeSet<RecordId> = [rid(1, 2), rid(1, 3)].into_iter().collect();
        assert_eq!(intersect(&a, &b), [rid(1, 2)].into_iter().collect());
        assert_eq!(union(&a, &b), [rid(1, 1), rid(1, 2), rid(1, 3)].into_iter().collect());
    }

    #[test]
    fn varchar_keys_work_too() {
        let mut idx = IndexSet::new("name", false);
        idx.insert(
            ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string())),
            rid(1, 1),
        )
        .unwrap();
        let found = idx.equal(&ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string())));
        assert_eq!(found.len(), 1);
    }
}
