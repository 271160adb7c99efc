//! Turns a predicate into an index-backed set of candidate record ids when
//! possible, falling back to `None` (meaning: the caller should do a full
//! table scan instead) whenever the predicate isn't expressible as an index
//! lookup.
//!
//! Planning is all-or-nothing: a sub-expression that can't be planned makes
//! its enclosing `AND`/`OR` unplannable too, rather than planning part of
//! the tree and scanning the rest. `NOT` and `!=` are always unplannable --
//! a single ordered index can answer "equal to" or "less/greater than" in
//! one contiguous range, but not "everything except one value" without
//! reading two disjoint ranges, so that case always falls back to a scan.
//! Comparing a column to another column, or a literal to another literal,
//! is never an index lookup either.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use crate::expr::Expr;
use crate::index_set::{self, IndexSet};
use crate::schema::Schema;
use crate::types::RecordId;
use crate::value::{ColumnValue, Kind};

#[derive(Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn flip(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Eq => CmpOp::Eq,
        CmpOp::Ne => CmpOp::Ne,
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
    }
}

fn as_literal(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::LiteralInt(_) | Expr::LiteralString(_) => Some(expr),
        _ => None,
    }
}

/// Pull `(column_name, literal, was_column_on_the_right)` out of a
/// comparison's two operands, or `None` if neither/both sides are columns.
fn column_and_literal<'a>(lhs: &'a Expr, rhs: &'a Expr) -> Option<(&'a str, &'a Expr, bool)> {
    match (lhs, rhs) {
        (Expr::ColumnRef(c), other) if as_literal(other).is_some() => Some((c.as_str(), other, false)),
        (other, Expr::ColumnRef(c)) if as_literal(other).is_some() => Some((c.as_str(), other, true)),
        _ => None,
    }
}

fn literal_to_value(literal: &Expr, kind: Kind) -> Option<ColumnValue> {
    match (literal, kind) {
        (Expr::LiteralInt(v), Kind::Int32) => Some(ColumnValue::Int32(Some(*v))),
        (Expr::LiteralString(s), Kind::Varchar(tier)) => {
            Some(ColumnValue::Varchar(tier, Some(s.clone())))
        }
        _ => None,
    }
}

fn plan_comparison(
    op: CmpOp,
    lhs: &Expr,
    rhs: &Expr,
    schema: &Schema,
    indexes: &HashMap<String, IndexSet>,
) -> Option<BTreeSet<RecordId>> {
    let (column, literal, flipped) = column_and_literal(lhs, rhs)?;
    let attr = schema.get_attribute(column)?;
    if !attr.indexed() {
        return None;
    }
    let index = indexes.get(column)?;
    let value = literal_to_value(literal, attr.kind())?;
    let op = if flipped { flip(op) } else { op };

    Some(match op {
        CmpOp::Eq => index.equal(&value),
        CmpOp::Ne => return None,
        CmpOp::Lt => index.range(Bound::Unbounded, Bound::Excluded(value)),
        CmpOp::Le => index.range(Bound::Unbounded, Bound::Included(value)),
        CmpOp::Gt => index.range(Bound::Excluded(value), Bound::Unbounded),
        CmpOp::Ge => index.range(Bound::Included(value), Bound::Unbounded),
    })
}

pub fn plan(expr: &Expr, schema: &Schema, indexes: &HashMap<String, IndexSet>) -> Option<BTreeSet<RecordId>> {
    let result = plan_inner(expr, schema, indexes);
    match &result {
        Some(rids) => log::debug!("planner: pushed predicate into indexes, {} candidate(s)", rids.len()),
        None => log::debug!("planner: predicate not index-expressible, falling back to a scan"),
    }
    result
}

fn plan_inner(expr: &Expr, schema: &Schema, indexes: &HashMap<String, IndexSet>) -> Option<BTreeSet<RecordId>> {
    match expr {
        Expr::Eq(l, r) => plan_comparison(CmpOp::Eq, l, r, schema, indexes),
        Expr::Ne(l, r) => plan_comparison(CmpOp::Ne, l, r, schema, indexes),
        Expr::Lt(l, r) => plan_comparison(CmpOp::Lt, l, r, schema, indexes),
        Expr::Le(l, r) => plan_comparison(CmpOp::Le, l, r, schema, indexes),
        Expr::Gt(l, r) => plan_comparison(CmpOp::Gt, l, r, schema, indexes),
        Expr::Ge(l, r) => plan_comparison(CmpOp::Ge, l, r, schema, indexes),
        Expr::And(l, r) => {
            let a = plan_inner(l, schema, indexes)?;
            let b = plan_inner(r, schema, indexes)?;
            Some(index_set::intersect(&a, &b))
        }
        Expr::Or(l, r) => {
            let a = plan_inner(l, schema, indexes)?;
            let b = plan_inner(r, schema, indexes)?;
            Some(index_set::union(&a, &b))
        }
        Expr::Not(_) => None,
        Expr::ColumnRef(_) | Expr::LiteralInt(_) | Expr::LiteralString(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::CapacityTier;

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::new("id", Kind::Int32, true, true, true),
            Attribute::new("age", Kind::Int32, false, true, false),
            Attribute::new("bio", Kind::Varchar(CapacityTier::C32), false, false, false),
        ])
    }

    fn indexes_with(entries: &[(&str, i32, RecordId)]) -> HashMap<String, IndexSet> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), IndexSet::new("id", true));
        map.insert("age".to_string(), IndexSet::new("age", false));
        for (col, v, rid) in entries {
            map.get_mut(*col)
                .unwrap()
                .insert(ColumnValue::Int32(Some(*v)), *rid)
                .unwrap();
        }
        map
    }

    #[test]
    fn equality_on_indexed_column_plans_to_an_index_lookup() {
        let rid = RecordId::new(1, 1);
        let indexes = indexes_with(&[("id", 7, rid)]);
        let e = Expr::col("id").eq(Expr::LiteralInt(7));
        let plan = plan(&e, &schema(), &indexes).unwrap();
        assert_eq!(plan, [rid].into_iter().collect());
    }

    #[test]
    fn unindexed_column_is_unplannable() {
        let indexes = indexes_with(&[]);
        let e = Expr::col("bio").eq(Expr::LiteralString("x".to_string()));
        assert!(plan(&e, &schema(), &indexes).is_none());
    }

    #[test]
    fn not_equal_is_unplannable() {
        let indexes = indexes_with(&[]);
        let e = Expr::Ne(
            Box::new(Expr::col("id")),
            Box::new(Expr::LiteralInt(1)),
        );
        assert!(plan(&e, &schema(), &indexes).is_none());
    }

    #[test]
    fn and_with_one_unplannable_side_is_unplannable() {
        let rid = RecordId::new(1, 1);
        let indexes = indexes_with(&[("id", 7, rid)]);
        let e = Expr::col("id")
            .eq(Expr::LiteralInt(7))
            .and(Expr::col("bio").eq(Expr::LiteralString("x".to_string())));
        assert!(plan(&e, &schema(), &indexes).is_none());
    }

    #[test]
    fn and_intersects_both_plannable_sides() {
        let a = RecordId::new(1, 1);
        let b = RecordId::new(1, 2);
        let mut indexes = indexes_with(&[("id", 7, a)]);
        indexes.get_mut("age").unwrap().insert(ColumnValue::Int32(Some(30)), a).unwrap();
        indexes.get_mut("age").unwrap().insert(ColumnValue::Int32(Some(30)), b).unwrap();

        let e = Expr::col("id")
            .eq(Expr::LiteralInt(7))
            .and(Expr::col("age").eq(Expr::LiteralInt(30)));
        let plan = plan(&e, &schema(), &indexes).unwrap();
        assert_eq!(plan, [a].into_iter().collect());
    }

    #[test]
    fn or_unions_both_plannable_sides() {
        let a = RecordId::new(1, 1);
        let b = RecordId::new(1, 2);
        let mut indexes = indexes_with(&[("id", 7, a)]);
        indexes.get_mut("age").unwrap().insert(ColumnValue::Int32(Some(20)), b).unwrap();

        let e = Expr::col("id")
            .eq(Expr::LiteralInt(7))
            .or(Expr::col("age").eq(Expr::LiteralInt(20)));
        let plan = plan(&e, &schema(), &indexes).unwrap();
        assert_eq!(plan, [a, b].into_iter().collect());
    }

    #[test]
    fn column_to_column_comparison_is_unplannable() {
        let indexes = indexes_with(&[]);
        let e = Expr::Eq(Box::new(Expr::col("id")), Box::new(Expr::col("age")));
        assert!(plan(&e, &schema(), &indexes).is_none());
    }
}
