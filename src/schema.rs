//! A schema defines the structure of the single relation this crate manages.
//! A schema is comprised of attributes, which each describe one column:
//! its name, data kind, and whether it is required, indexed, or primary.
//!
//! Schemas are read once, at session-open time, from the plain-text config
//! format described in the project's interface contract, and are immutable
//! for the lifetime of the session.

use crate::error::{Error, Result};
use crate::value::{CapacityTier, Kind};

/// Describes a single column in the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    kind: Kind,
    not_null: bool,
    indexed: bool,
    primary: bool,
}

impl Attribute {
    pub fn new(name: &str, kind: Kind, not_null: bool, indexed: bool, primary: bool) -> Self {
        Self {
            name: name.to_string(),
            kind,
            not_null,
            indexed,
            primary,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn not_null(&self) -> bool {
        self.not_null
    }

    /// A primary column is indexed by definition even if the config's
    /// `index` bit was left at 0.
    pub fn indexed(&self) -> bool {
        self.indexed || self.primary
    }

    pub fn primary(&self) -> bool {
        self.primary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attr_len(&self) -> usize {
        self.attributes.len()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name() == name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.indexed())
    }

    pub fn primary_column(&self) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.primary())
    }

    /// Parse the plain-text schema description:
    ///
    /// ```text
    /// <N>
    /// <name_1>
    /// <type_1> <len_1> <notnull_1> <index_1> <primary_1>
    /// ...
    /// ```
    pub fn parse_text(text: &str) -> Result<Schema> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let count: usize = lines
            .next()
            .ok_or_else(|| Error::Malformed("schema file is empty".to_string()))?
            .parse()
            .map_err(|_| Error::Malformed("expected column count on first line".to_string()))?;

        let mut attributes = Vec::with_capacity(count);
        for _ in 0..count {
            let name = lines
                .next()
                .ok_or_else(|| Error::Malformed("missing column name".to_string()))?
                .to_string();

            let spec_line = lines
                .next()
                .ok_or_else(|| Error::Malformed(format!("missing type line for column '{}'", name)))?;

            let mut parts = spec_line.split_whitespace();
            let type_tok = parts
                .next()
                .ok_or_else(|| Error::Malformed(format!("missing type for column '{}'", name)))?;
            let len_tok = parts.next().unwrap_or("0");
            let not_null_tok = parts.next().unwrap_or("0");
            let index_tok = parts.next().unwrap_or("0");
            let primary_tok = parts.next().unwrap_or("0");

            let kind = match type_tok.to_ascii_uppercase().as_str() {
                "INT" | "INTEGER" => Kind::Int32,
                "CHAR" | "VARCHAR" => {
                    let len: u32 = len_tok
                        .parse()
                        .map_err(|_| Error::Malformed(format!("invalid length for column '{}'", name)))?;
                    Kind::Varchar(CapacityTier::from_declared_len(len)?)
                }
                other => return Err(Error::Malformed(format!("unknown column type '{}'", other))),
            };

            let not_null = parse_bool(&name, not_null_tok)?;
            let indexed = parse_bool(&name, index_tok)?;
            let primary = parse_bool(&name, primary_tok)?;

            attributes.push(Attribute::new(&name, kind, not_null, indexed, primary));
        }

        Ok(Schema::new(attributes))
    }
}

fn parse_bool(column: &str, tok: &str) -> Result<bool> {
    match tok {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::Malformed(format!(
            "expected 0 or 1 for a flag of column '{}', got '{}'",
            column, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "3\nid\nINT 0 1 1 1\nname\nVARCHAR 32 0 1 0\nage\nINT 0 0 0 0\n";

    #[test]
    fn parses_the_end_to_end_example_schema() {
        let schema = Schema::parse_text(EXAMPLE).unwrap();
        assert_eq!(schema.attr_len(), 3);

        let id = schema.get_attribute("id").unwrap();
        assert_eq!(id.kind(), Kind::Int32);
        assert!(id.not_null());
        assert!(id.indexed());
        assert!(id.primary());

        let name = schema.get_attribute("name").unwrap();
        assert_eq!(name.kind(), Kind::Varchar(CapacityTier::C32));
        assert!(name.indexed());
        assert!(!name.primary());

        let age = schema.get_attribute("age").unwrap();
        assert!(!age.indexed());
    }

    #[test]
    fn primary_implies_indexed_even_if_unset() {
        let text = "1\nid\nINT 0 1 0 1\n";
        let schema = Schema::parse_text(text).unwrap();
        assert!(schema.get_attribute("id").unwrap().indexed());
    }

    #[test]
    fn rejects_unknown_type() {
        let text = "1\nx\nBLOB 0 0 0 0\n";
        assert!(Schema::parse_text(text).is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        let text = "2\nonly_one_column\nINT 0 0 0 0\n";
        assert!(Schema::parse_text(text).is_err());
    }
}
