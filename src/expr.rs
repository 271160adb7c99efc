//! Boolean expression tree used to filter rows during `select` and `delete`,
//! plus the evaluator that runs one against a decoded tuple.

use crate::error::{Error, Result};
use crate::record::Tuple;
use crate::schema::Schema;
use crate::value::ColumnValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    ColumnRef(String),
    LiteralInt(i32),
    LiteralString(String),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::ColumnRef(name.into())
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }
}

/// Resolve a leaf expression (column reference or literal) to a value,
/// typed against `schema` when it's a column reference.
fn eval_leaf(expr: &Expr, tuple: &Tuple, schema: &Schema) -> Result<ColumnValue> {
    match expr {
        Expr::ColumnRef(name) => {
            let i = schema
                .get_column_index(name)
                .ok_or_else(|| Error::Malformed(format!("unknown column '{}'", name)))?;
            Ok(tuple[i].clone())
        }
        Expr::LiteralInt(v) => Ok(ColumnValue::Int32(Some(*v))),
        Expr::LiteralString(s) => {
            // A bare string literal has no declared capacity tier; C256 is
            // wide enough to compare against any column and comparison
            // ignores the tier field entirely.
            Ok(ColumnValue::Varchar(crate::value::CapacityTier::C256, Some(s.clone())))
        }
        other => Err(Error::Malformed(format!("{:?} is not a value expression", other))),
    }
}

/// Evaluate a boolean expression tree against a decoded tuple.
pub fn evaluate(expr: &Expr, tuple: &Tuple, schema: &Schema) -> Result<bool> {
    use std::cmp::Ordering;
    match expr {
        Expr::Eq(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? == Ordering::Equal),
        Expr::Ne(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? != Ordering::Equal),
        Expr::Lt(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? == Ordering::Less),
        Expr::Le(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? != Ordering::Greater),
        Expr::Gt(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? == Ordering::Greater),
        Expr::Ge(l, r) => Ok(eval_leaf(l, tuple, schema)?.compare(&eval_leaf(r, tuple, schema)?)? != Ordering::Less),
        Expr::And(l, r) => Ok(evaluate(l, tuple, schema)? && evaluate(r, tuple, schema)?),
        Expr::Or(l, r) => Ok(evaluate(l, tuple, schema)? || evaluate(r, tuple, schema)?),
        Expr::Not(e) => Ok(!evaluate(e, tuple, schema)?),
        other => Err(Error::Malformed(format!("{:?} is not a boolean expression", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::{CapacityTier, Kind};

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::new("id", Kind::Int32, true, true, true),
            Attribute::new("name", Kind::Varchar(CapacityTier::C32), false, true, false),
        ])
    }

    fn tuple() -> Tuple {
        vec![
            ColumnValue::Int32(Some(7)),
            ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string())),
        ]
    }

    #[test]
    fn equality_on_a_matching_column() {
        let e = Expr::col("id").eq(Expr::LiteralInt(7));
        assert!(evaluate(&e, &tuple(), &schema()).unwrap());
    }

    #[test]
    fn and_short_circuits_to_false_on_first_mismatch() {
        let e = Expr::col("id")
            .eq(Expr::LiteralInt(1))
            .and(Expr::col("name").eq(Expr::LiteralString("ada".to_string())));
        assert!(!evaluate(&e, &tuple(), &schema()).unwrap());
    }

    #[test]
    fn or_is_true_if_either_side_is() {
        let e = Expr::col("id")
            .eq(Expr::LiteralInt(1))
            .or(Expr::col("name").eq(Expr::LiteralString("ada".to_string())));
        assert!(evaluate(&e, &tuple(), &schema()).unwrap());
    }

    #[test]
    fn not_negates() {
        let e = Expr::Not(Box::new(Expr::col("id").eq(Expr::LiteralInt(7))));
        assert!(!evaluate(&e, &tuple(), &schema()).unwrap());
    }

    #[test]
    fn unknown_column_is_an_error() {
        let e = Expr::col("missing").eq(Expr::LiteralInt(1));
        assert!(evaluate(&e, &tuple(), &schema()).is_err());
    }
}
