//! Tiny recursive-descent parser used by the CLI: turns the plain-text
//! forms a user types at the prompt into the structures the rest of the
//! engine operates on -- a `WHERE`-style boolean expression, a comma
//! separated row of values, or a comma separated list of `column = value`
//! assignments.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::record::Tuple;
use crate::schema::Schema;
use crate::value::{ColumnValue, Kind};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i32),
    Str(String),
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '=' {
            tokens.push(Token::Eq);
            i += 1;
        } else if c == '!' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Ne);
            i += 2;
        } else if c == '<' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Le);
            i += 2;
        } else if c == '<' {
            tokens.push(Token::Lt);
            i += 1;
        } else if c == '>' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::Ge);
            i += 2;
        } else if c == '>' {
            tokens.push(Token::Gt);
            i += 1;
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                s.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(Error::Malformed("unterminated string literal".to_string()));
            }
            i += 1;
            tokens.push(Token::Str(s));
        } else if c == '-' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n: i32 = text
                .parse()
                .map_err(|_| Error::Malformed(format!("invalid integer literal '{}'", text)))?;
            tokens.push(Token::Int(n));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.to_ascii_uppercase().as_str() {
                "AND" => tokens.push(Token::And),
                "OR" => tokens.push(Token::Or),
                "NOT" => tokens.push(Token::Not),
                _ => tokens.push(Token::Ident(word)),
            }
        } else {
            return Err(Error::Malformed(format!("unexpected character '{}'", c)));
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.not_expr()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.bump();
            let inner = self.expr()?;
            match self.bump() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(Error::Malformed("expected closing ')'".to_string())),
            }
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.value_expr()?;
        let op = self.bump().cloned();
        let rhs = self.value_expr()?;
        match op {
            Some(Token::Eq) => Ok(Expr::Eq(Box::new(lhs), Box::new(rhs))),
            Some(Token::Ne) => Ok(Expr::Ne(Box::new(lhs), Box::new(rhs))),
            Some(Token::Lt) => Ok(Expr::Lt(Box::new(lhs), Box::new(rhs))),
            Some(Token::Le) => Ok(Expr::Le(Box::new(lhs), Box::new(rhs))),
            Some(Token::Gt) => Ok(Expr::Gt(Box::new(lhs), Box::new(rhs))),
            Some(Token::Ge) => Ok(Expr::Ge(Box::new(lhs), Box::new(rhs))),
            _ => Err(Error::Malformed("expected a comparison operator".to_string())),
        }
    }

    fn value_expr(&mut self) -> Result<Expr> {
        match self.bump() {
            Some(Token::Ident(name)) => Ok(Expr::ColumnRef(name.clone())),
            Some(Token::Int(n)) => Ok(Expr::LiteralInt(*n)),
            Some(Token::Str(s)) => Ok(Expr::LiteralString(s.clone())),
            other => Err(Error::Malformed(format!("expected a value, found {:?}", other))),
        }
    }
}

/// Parse a `WHERE`-style predicate, e.g. `id = 1 AND (name = 'ada' OR age > 30)`.
pub fn parse_expr(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.expr()?;
    if parser.pos != tokens.len() {
        return Err(Error::Malformed("trailing input after expression".to_string()));
    }
    Ok(expr)
}

fn parse_scalar(token: &str, kind: Kind, column: &str) -> Result<ColumnValue> {
    let trimmed = token.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Ok(match kind {
            Kind::Int32 => ColumnValue::Int32(None),
            Kind::Varchar(tier) => ColumnValue::Varchar(tier, None),
        });
    }
    match kind {
        Kind::Int32 => {
            let n: i32 = trimmed
                .parse()
                .map_err(|_| Error::Malformed(format!("column '{}': expected an integer, got '{}'", column, trimmed)))?;
            Ok(ColumnValue::Int32(Some(n)))
        }
        Kind::Varchar(tier) => {
            let s = trimmed.trim_matches(|c| c == '\'' || c == '"');
            Ok(ColumnValue::Varchar(tier, Some(s.to_string())))
        }
    }
}

/// Parse a comma-separated row of values in schema order, e.g. `1, 'ada', 30`.
pub fn parse_tuple(text: &str, schema: &Schema) -> Result<Tuple> {
    let parts: Vec<&str> = text.split(',').collect();
    let attrs = schema.attributes();
    if parts.len() != attrs.len() {
        return Err(Error::Malformed(format!(
            "expected {} values, got {}",
            attrs.len(),
            parts.len()
        )));
    }
    parts
        .iter()
        .zip(attrs)
        .map(|(part, attr)| parse_scalar(part, attr.kind(), attr.name()))
        .collect()
}

/// Parse a comma-separated list of `column = value` assignments, e.g.
/// `age = 31, name = 'bob'`.
pub fn parse_assignments(text: &str, schema: &Schema) -> Result<Vec<(String, ColumnValue)>> {
    text.split(',')
        .map(|clause| {
            let mut parts = clause.splitn(2, '=');
            let name = parts
                .next()
                .ok_or_else(|| Error::Malformed("missing column name in assignment".to_string()))?
                .trim();
            let value_text = parts
                .next()
                .ok_or_else(|| Error::Malformed(format!("assignment to '{}' is missing a value", name)))?;
            let attr = schema
                .get_attribute(name)
                .ok_or_else(|| Error::Malformed(format!("unknown column '{}'", name)))?;
            let value = parse_scalar(value_text, attr.kind(), name)?;
            Ok((name.to_string(), value))
        })
        .collect()
}
