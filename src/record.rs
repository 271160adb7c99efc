//! The record codec: serializes an ordered tuple of column values to a byte
//! run and back, driven entirely by the schema (no external framing).
//!
//! Data format:
//! ```text
//! ---------------------------------------------------------------
//!  NULL BITMAP | FIXED-LENGTH VALUES | VARIABLE-LENGTH VALUES
//! ---------------------------------------------------------------
//! ```
//! The null bitmap has one bit per column (LSB-first, column 0 in bit 0 of
//! byte 0). Fixed-length (`Int32`) columns are written 4 bytes each, in
//! schema order, regardless of nullity (a null `Int32` still reserves its 4
//! bytes so later fixed columns stay at a constant offset). Variable-length
//! (`Varchar`) columns follow, also in schema order: every variable column
//! except the last carries a 2-byte little-endian length prefix; the last is
//! unprefixed and consumes whatever bytes remain, which lets `decode` find it
//! without rereading the whole record. A null `Varchar` contributes a
//! zero-length payload; its nullity is recovered from the bitmap, not from an
//! empty string being mistaken for `None`.

use std::convert::TryInto;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::{ColumnValue, Kind};

pub type Tuple = Vec<ColumnValue>;

/// Encode a tuple into its on-page byte representation.
pub fn encode(tuple: &[ColumnValue], schema: &Schema) -> Result<Vec<u8>> {
    let attrs = schema.attributes();
    if tuple.len() != attrs.len() {
        return Err(Error::Malformed(format!(
            "tuple has {} values but schema has {} columns",
            tuple.len(),
            attrs.len()
        )));
    }

    let bitmap_len = (attrs.len() + 7) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    for (i, value) in tuple.iter().enumerate() {
        if value.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }

    let last_var_index = attrs
        .iter()
        .enumerate()
        .filter(|(_, a)| matches!(a.kind(), Kind::Varchar(_)))
        .map(|(i, _)| i)
        .last();

    let mut fixed = Vec::new();
    let mut variable = Vec::new();
    for (i, value) in tuple.iter().enumerate() {
        match value {
            ColumnValue::Int32(v) => fixed.extend_from_slice(&v.unwrap_or(0).to_le_bytes()),
            ColumnValue::Varchar(_, s) => {
                let bytes = s.as_deref().unwrap_or("").as_bytes();
                if Some(i) != last_var_index {
                    variable.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                }
                variable.extend_from_slice(bytes);
            }
        }
    }

    let mut out = bitmap;
    out.extend(fixed);
    out.extend(variable);
    Ok(out)
}

/// Decode a tuple out of its on-page byte representation.
pub fn decode(bytes: &[u8], schema: &Schema) -> Result<Tuple> {
    let attrs = schema.attributes();
    let n = attrs.len();
    let bitmap_len = (n + 7) / 8;
    if bytes.len() < bitmap_len {
        return Err(Error::Malformed("record shorter than its null bitmap".to_string()));
    }
    let bitmap = &bytes[..bitmap_len];
    let is_null = |i: usize| (bitmap[i / 8] >> (i % 8)) & 1 == 1;

    let var_indices: Vec<usize> = attrs
        .iter()
        .enumerate()
        .filter(|(_, a)| matches!(a.kind(), Kind::Varchar(_)))
        .map(|(i, _)| i)
        .collect();
    let last_var_index = var_indices.last().copied();

    let mut pos = bitmap_len;
    let mut fixed_values: Vec<Option<i32>> = vec![None; n];
    for (i, attr) in attrs.iter().enumerate() {
        if let Kind::Int32 = attr.kind() {
            if pos + 4 > bytes.len() {
                return Err(Error::Malformed(format!("truncated fixed column '{}'", attr.name())));
            }
            let raw = i32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
            fixed_values[i] = Some(raw);
            pos += 4;
        }
    }

    let mut var_values: Vec<Option<String>> = vec![None; n];
    for &i in &var_indices {
        if Some(i) == last_var_index {
            continue;
        }
        if pos + 2 > bytes.len() {
            return Err(Error::Malformed(format!(
                "truncated length prefix for column '{}'",
                attrs[i].name()
            )));
        }
        let len = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap()) as usize;
        pos += 2;
        if pos + len > bytes.len() {
            return Err(Error::Malformed(format!("truncated column '{}'", attrs[i].name())));
        }
        let s = String::from_utf8(bytes[pos..pos + len].to_vec())
            .map_err(|_| Error::Malformed(format!("column '{}' is not valid UTF-8", attrs[i].name())))?;
        var_values[i] = Some(s);
        pos += len;
    }
    if let Some(i) = last_var_index {
        let s = String::from_utf8(bytes[pos..].to_vec())
            .map_err(|_| Error::Malformed(format!("column '{}' is not valid UTF-8", attrs[i].name())))?;
        var_values[i] = Some(s);
    }

    let mut out = Vec::with_capacity(n);
    for (i, attr) in attrs.iter().enumerate() {
        let value = match attr.kind() {
            Kind::Int32 => ColumnValue::Int32(if is_null(i) { None } else { fixed_values[i] }),
            Kind::Varchar(tier) => {
                let s = std::mem::take(&mut var_values[i]);
                ColumnValue::Varchar(tier, if is_null(i) { None } else { s })
            }
        };
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::CapacityTier;

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::new("id", Kind::Int32, true, true, true),
            Attribute::new("name", Kind::Varchar(CapacityTier::C32), false, true, false),
            Attribute::new("age", Kind::Int32, false, false, false),
        ])
    }

    #[test]
    fn round_trips_a_simple_tuple() {
        let s = schema();
        let tuple = vec![
            ColumnValue::Int32(Some(1)),
            ColumnValue::Varchar(CapacityTier::C32, Some("ada".to_string())),
            ColumnValue::Int32(Some(37)),
        ];
        let bytes = encode(&tuple, &s).unwrap();
        let decoded = decode(&bytes, &s).unwrap();
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn round_trips_nulls_distinct_from_empty_strings() {
        let s = schema();
        let with_null = vec![
            ColumnValue::Int32(Some(1)),
            ColumnValue::Varchar(CapacityTier::C32, None),
            ColumnValue::Int32(None),
        ];
        let bytes = encode(&with_null, &s).unwrap();
        let decoded = decode(&bytes, &s).unwrap();
        assert_eq!(decoded, with_null);

        let with_empty = vec![
            ColumnValue::Int32(Some(1)),
            ColumnValue::Varchar(CapacityTier::C32, Some(String::new())),
            ColumnValue::Int32(Some(0)),
        ];
        let bytes2 = encode(&with_empty, &s).unwrap();
        let decoded2 = decode(&bytes2, &s).unwrap();
        assert_eq!(decoded2, with_empty);
        assert_ne!(decoded, decoded2);
    }

    #[test]
    fn round_trips_multiple_variable_columns() {
        let s = Schema::new(vec![
            Attribute::new("a", Kind::Varchar(CapacityTier::C32), false, false, false),
            Attribute::new("b", Kind::Varchar(CapacityTier::C64), false, false, false),
            Attribute::new("c", Kind::Varchar(CapacityTier::C32), false, false, false),
        ]);
        let tuple = vec![
            ColumnValue::Varchar(CapacityTier::C32, Some("foo".to_string())),
            ColumnValue::Varchar(CapacityTier::C64, Some("".to_string())),
            ColumnValue::Varchar(CapacityTier::C32, Some("bazbaz".to_string())),
        ];
        let bytes = encode(&tuple, &s).unwrap();
        let decoded = decode(&bytes, &s).unwrap();
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn rejects_wrong_arity() {
        let s = schema();
        let tuple = vec![ColumnValue::Int32(Some(1))];
        assert!(encode(&tuple, &s).is_err());
    }
}
