use std::io::{self, BufRead, Write};

use clap::Parser;
use log::{error, info};

use recordstore::expr::Expr;
use recordstore::parser;
use recordstore::table::Table;
use recordstore::value::ColumnValue;

/// Command-line arguments for opening a session against a single table.
#[derive(Parser, Debug)]
#[command(name = "recordstore", about = "A single-table record storage engine")]
struct Args {
    /// Path to the plain-text schema description.
    #[arg(long)]
    schema: String,

    /// Path to the table's data file (created if missing).
    #[arg(long)]
    data: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!("recordstore");
    println!("Enter .help for usage hints");

    let mut table = match Table::open(&args.schema, &args.data) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to open table: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("error reading stdin: {}", e);
                break;
            }
        };
        let line = line.trim();
        if !line.is_empty() {
            if line == ".quit" || line == ".exit" {
                break;
            } else if line == ".help" {
                print_help();
            } else if let Err(e) = run_command(&mut table, line) {
                println!("error: {}", e);
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    if let Err(e) = table.flush() {
        error!("failed to flush table to disk: {}", e);
    }
    info!("session closed");
}

fn print_help() {
    println!(".help                             show this message");
    println!(".quit                             close the session");
    println!("insert <v1>, <v2>, ...            insert a row, in schema column order");
    println!("select [where <predicate>]        print matching rows");
    println!("delete where <predicate>          delete matching rows");
    println!("update set <col=v, ...> [where <predicate>]   update matching rows");
    println!();
    println!("predicate example: id = 1 AND (name = 'ada' OR age > 30)");
}

fn run_command(table: &mut Table, line: &str) -> recordstore::Result<()> {
    let lower = line.to_ascii_lowercase();

    if let Some(rest) = strip_keyword(&lower, line, "insert") {
        let tuple = parser::parse_tuple(rest, table.schema())?;
        let rid = table.insert(tuple)?;
        println!("inserted {}", rid);
    } else if let Some(rest) = strip_keyword(&lower, line, "select") {
        let predicate = parse_optional_where(rest)?;
        let rows = table.select(predicate.as_ref(), None)?;
        for row in &rows {
            println!("{}", format_row(row));
        }
        println!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" });
    } else if let Some(rest) = strip_keyword(&lower, line, "delete") {
        let rest = rest.trim();
        let predicate = if let Some(w) = strip_keyword(&rest.to_ascii_lowercase(), rest, "where") {
            Some(parser::parse_expr(w)?)
        } else if rest.is_empty() {
            None
        } else {
            return Err(recordstore::Error::Malformed("expected 'where <predicate>'".to_string()));
        };
        let n = table.delete(predicate.as_ref())?;
        println!("deleted {} row(s)", n);
    } else if let Some(rest) = strip_keyword(&lower, line, "update") {
        let rest = rest.trim();
        let set_rest = strip_keyword(&rest.to_ascii_lowercase(), rest, "set")
            .ok_or_else(|| recordstore::Error::Malformed("expected 'update set <col=v, ...>'".to_string()))?;
        let (assignments_text, where_text) = split_on_where(set_rest);
        let assignments = parser::parse_assignments(assignments_text, table.schema())?;
        let predicate = match where_text {
            Some(w) => Some(parser::parse_expr(w)?),
            None => None,
        };
        let n = table.update(predicate.as_ref(), &assignments)?;
        println!("updated {} row(s)", n);
    } else {
        return Err(recordstore::Error::Malformed(format!("unrecognized command: '{}'", line)));
    }
    Ok(())
}

fn parse_optional_where(rest: &str) -> recordstore::Result<Option<Expr>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(None);
    }
    let lower = rest.to_ascii_lowercase();
    match strip_keyword(&lower, rest, "where") {
        Some(w) => Ok(Some(parser::parse_expr(w)?)),
        None => Err(recordstore::Error::Malformed("expected 'where <predicate>'".to_string())),
    }
}

/// If `line` (whose lowercased form is `lower`) starts with `keyword` as a
/// whole word, return the remainder of `line` after it.
fn strip_keyword<'a>(lower: &str, line: &'a str, keyword: &str) -> Option<&'a str> {
    if lower == keyword {
        return Some("");
    }
    if let Some(stripped) = lower.strip_prefix(keyword) {
        if stripped.starts_with(char::is_whitespace) {
            return Some(line[keyword.len()..].trim_start());
        }
    }
    None
}

/// Split `"age = 31, name = 'bob' where id = 1"` into the assignment list
/// and an optional trailing `WHERE` clause.
fn split_on_where(text: &str) -> (&str, Option<&str>) {
    let lower = text.to_ascii_lowercase();
    if let Some(idx) = lower.find(" where ") {
        (&text[..idx], Some(text[idx + 7..].trim()))
    } else {
        (text, None)
    }
}

fn format_row(row: &[ColumnValue]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}
