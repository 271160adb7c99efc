//! Column kind and value representation.
//!
//! The storage engine used to dispatch on data types through a runtime-typed
//! pointer hierarchy with four distinct string-capacity variants. Here that
//! collapses into a single tagged sum matched with `match`; comparison
//! dispatches on the pair of tags instead of a type check.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// The four capacity tiers a `Varchar` column may be declared at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityTier {
    C32,
    C64,
    C128,
    C256,
}

impl CapacityTier {
    pub const ALL: [CapacityTier; 4] = [
        CapacityTier::C32,
        CapacityTier::C64,
        CapacityTier::C128,
        CapacityTier::C256,
    ];

    pub fn bytes(self) -> u32 {
        match self {
            CapacityTier::C32 => 32,
            CapacityTier::C64 => 64,
            CapacityTier::C128 => 128,
            CapacityTier::C256 => 256,
        }
    }

    /// Round a declared schema length up to the smallest enclosing tier.
    pub fn from_declared_len(len: u32) -> Result<Self> {
        CapacityTier::ALL
            .into_iter()
            .find(|tier| tier.bytes() >= len)
            .ok_or_else(|| Error::SchemaViolation {
                column: String::new(),
                reason: format!("declared length {} exceeds the largest capacity tier (256)", len),
            })
    }
}

/// The kind of a column, independent of any particular value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int32,
    Varchar(CapacityTier),
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Int32 => "INT",
            Kind::Varchar(_) => "VARCHAR",
        }
    }
}

/// A single column value, tagged by kind, with nullability folded into the
/// variant's `Option`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int32(Option<i32>),
    Varchar(CapacityTier, Option<String>),
}

impl ColumnValue {
    pub fn kind(&self) -> Kind {
        match self {
            ColumnValue::Int32(_) => Kind::Int32,
            ColumnValue::Varchar(tier, _) => Kind::Varchar(*tier),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ColumnValue::Int32(v) => v.is_none(),
            ColumnValue::Varchar(_, v) => v.is_none(),
        }
    }

    /// Number of bytes this value occupies in an encoded record. Fixed-width
    /// columns always report their full width (a null `Int32` still reserves
    /// 4 bytes so fixed-offset columns after it stay addressable); a null
    /// `Varchar` reports 0, same as an empty string.
    pub fn serialized_size(&self) -> u32 {
        match self {
            ColumnValue::Int32(_) => 4,
            ColumnValue::Varchar(_, v) => v.as_ref().map(|s| s.len() as u32).unwrap_or(0),
        }
    }

    /// Compare two values of the same kind. Null sorts below every non-null
    /// value of that kind; two nulls compare equal.
    pub fn compare(&self, other: &ColumnValue) -> Result<Ordering> {
        match (self, other) {
            (ColumnValue::Int32(a), ColumnValue::Int32(b)) => Ok(compare_option(a, b, |x, y| x.cmp(y))),
            (ColumnValue::Varchar(_, a), ColumnValue::Varchar(_, b)) => {
                Ok(compare_option(a, b, |x, y| x.as_bytes().cmp(y.as_bytes())))
            }
            _ => Err(Error::TypeMismatch {
                lhs: self.kind().name(),
                rhs: other.kind().name(),
            }),
        }
    }

    pub fn equals(&self, other: &ColumnValue) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    pub fn print(&self, sink: &mut dyn fmt::Write) -> fmt::Result {
        match self {
            ColumnValue::Int32(Some(v)) => write!(sink, "{}", v),
            ColumnValue::Int32(None) => write!(sink, "NULL"),
            ColumnValue::Varchar(_, Some(s)) => write!(sink, "{}", s),
            ColumnValue::Varchar(_, None) => write!(sink, "NULL"),
        }
    }
}

fn compare_option<T>(a: &Option<T>, b: &Option<T>, cmp: impl FnOnce(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => cmp(x, y),
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f)
    }
}

/// Total order over `ColumnValue`, used as the key type for index maps.
/// Only ever invoked for values sharing a column's kind, so the `TypeMismatch`
/// case collapses to an arbitrary (but consistent) tie-break instead of
/// panicking.
impl Eq for ColumnValue {}

impl PartialOrd for ColumnValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_ordering() {
        let a = ColumnValue::Int32(Some(1));
        let b = ColumnValue::Int32(Some(2));
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.compare(&a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn null_sorts_below_values() {
        let null = ColumnValue::Int32(None);
        let val = ColumnValue::Int32(Some(0));
        assert_eq!(null.compare(&val).unwrap(), Ordering::Less);
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let a = ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string()));
        let b = ColumnValue::Varchar(CapacityTier::C32, Some("bob".to_string()));
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
    }

    #[test]
    fn mismatched_kinds_error() {
        let a = ColumnValue::Int32(Some(1));
        let b = ColumnValue::Varchar(CapacityTier::C32, Some("x".to_string()));
        assert!(a.compare(&b).is_err());
    }

    #[test]
    fn capacity_tier_rounds_up() {
        assert_eq!(CapacityTier::from_declared_len(10).unwrap(), CapacityTier::C32);
        assert_eq!(CapacityTier::from_declared_len(32).unwrap(), CapacityTier::C32);
        assert_eq!(CapacityTier::from_declared_len(33).unwrap(), CapacityTier::C64);
        assert!(CapacityTier::from_declared_len(257).is_err());
    }
}
