//! Rendering of `@name` placeholders to a dialect's positional parameters.
//!
//! Queries are written with named placeholders; drivers want `$1` (Postgres) or `@P1`
//! (SQL Server). The renderer walks the text once, skipping string literals, quoted
//! identifiers and comments, and replaces every bound name with its position. On
//! Postgres, `E'...'` escape strings and dollar-quoted bodies count as literals too.

use crate::dialect::Dialect;
use crate::params::Params;
use crate::value::Value;
use std::collections::HashMap;

/// Statement text and positional values ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Render `text` against `bags` for `dialect`.
///
/// - A name bound by several bags takes the value of the most recently added one.
/// - Exact names win over case-insensitive matches.
/// - A name used twice maps to a single position.
/// - `@@name` (server variables) and names no bag defines are left untouched.
pub fn bind(text: &str, bags: &[Params], dialect: &dyn Dialect) -> Bound {
    let bytes = text.as_bytes();
    let pg = dialect.postgres_literals();
    let mut sql = String::with_capacity(text.len());
    let mut values = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'E' | b'e'
                if pg && bytes.get(i + 1) == Some(&b'\'') && !is_ident_byte(bytes, i) =>
            {
                i = skip_escape_string(bytes, i + 2);
            }
            b'$' if pg && !is_ident_byte(bytes, i) => i = skip_dollar_quoted(bytes, i),
            b'\'' => i = skip_quoted(bytes, i + 1, b'\''),
            b'"' => i = skip_quoted(bytes, i + 1, b'"'),
            b'[' if dialect.bracket_identifiers() => i = skip_quoted(bytes, i + 1, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = bytes[i + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b'@' if bytes.get(i + 1) == Some(&b'@') => i = ident_end(bytes, i + 2),
            b'@' => {
                let start = i + 1;
                let end = ident_end(bytes, start);
                if end == start || bytes[start].is_ascii_digit() {
                    i = start;
                    continue;
                }
                let name = &text[start..end];
                if let Some(value) = lookup(bags, name) {
                    sql.push_str(&text[copied..i]);
                    let index = *positions.entry(name).or_insert_with(|| {
                        values.push(value.clone());
                        values.len()
                    });
                    sql.push_str(&dialect.placeholder(index));
                    copied = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    sql.push_str(&text[copied..]);
    Bound { sql, values }
}

fn lookup<'a>(bags: &'a [Params], name: &str) -> Option<&'a Value> {
    let exact = bags
        .iter()
        .rev()
        .find_map(|bag| bag.iter().find(|(n, _)| *n == name).map(|(_, v)| v));
    exact.or_else(|| {
        bags.iter().rev().find_map(|bag| {
            bag.iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    })
}

fn ident_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    i
}

// Whether the byte before `i` continues an identifier.
fn is_ident_byte(bytes: &[u8], i: usize) -> bool {
    i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || matches!(bytes[i - 1], b'_' | b'$'))
}

// Backslash escapes the next byte; doubled quotes still apply.
fn skip_escape_string(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

// `$tag$ ... $tag$` with an optional tag. `$1` and a lone `$` are not delimiters.
fn skip_dollar_quoted(bytes: &[u8], start: usize) -> usize {
    let tag_start = start + 1;
    let tag_end = ident_end(bytes, tag_start);
    let is_delimiter = bytes.get(tag_end) == Some(&b'$')
        && bytes.get(tag_start).is_none_or(|b| !b.is_ascii_digit());
    if !is_delimiter {
        return start + 1;
    }
    let delimiter = &bytes[start..=tag_end];
    let body = tag_end + 1;
    bytes[body..]
        .windows(delimiter.len())
        .position(|w| w == delimiter)
        .map_or(bytes.len(), |p| body + p + delimiter.len())
}

// Doubled quotes inside a quoted run are escapes and keep the run open.
fn skip_quoted(bytes: &[u8], mut i: usize, close: u8) -> usize {
    while i < bytes.len() {
        if bytes[i] == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}
