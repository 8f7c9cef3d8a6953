//! Named placeholders in SQL templates.
//!
//! Templates use `:name` or `${name}`. The SQL itself is opaque: the
//! scanner only skips single-quoted literals and `::` casts so that
//! `'a:b'` and `x::int` are never mistaken for parameters.

use std::collections::HashMap;
use std::ops::Range;

/// A placeholder occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Parameter name without sigils
    pub name: String,
    /// Byte range of the whole placeholder, sigils included
    pub span: Range<usize>,
}

/// A template rewritten to positional `$N` markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalSql {
    /// SQL with `$1`, `$2`, ... in place of named placeholders
    pub sql: String,
    /// `order[i]` is the parameter bound to `$(i + 1)`
    pub order: Vec<String>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Find every placeholder in `sql`, in textual order.
pub fn placeholders(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut in_quote = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if b == b'\'' {
                in_quote = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => {
                in_quote = true;
                i += 1;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
            }
            b':' if bytes.get(i + 1).copied().is_some_and(is_ident_start) => {
                let start = i;
                let mut end = i + 1;
                while end < bytes.len() && is_ident_char(bytes[end]) {
                    end += 1;
                }
                found.push(Placeholder {
                    name: sql[start + 1..end].to_string(),
                    span: start..end,
                });
                i = end;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let start = i;
                match sql[i + 2..].find('}') {
                    Some(offset) => {
                        let end = i + 2 + offset;
                        let name = &sql[i + 2..end];
                        if !name.is_empty()
                            && is_ident_start(name.as_bytes()[0])
                            && name.bytes().all(is_ident_char)
                        {
                            found.push(Placeholder {
                                name: name.to_string(),
                                span: start..end + 1,
                            });
                        }
                        i = end + 1;
                    }
                    None => i += 2,
                }
            }
            _ => i += 1,
        }
    }

    found
}

/// Names referenced by `sql`, deduplicated, in first-appearance order.
pub fn referenced_names(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for placeholder in placeholders(sql) {
        if !names.contains(&placeholder.name) {
            names.push(placeholder.name);
        }
    }
    names
}

/// Rewrite named placeholders to positional `$N` markers.
///
/// Markers are numbered in first-appearance order; a name used twice
/// reuses its marker.
pub fn to_positional(sql: &str) -> PositionalSql {
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut cursor = 0;

    for placeholder in placeholders(sql) {
        out.push_str(&sql[cursor..placeholder.span.start]);
        let position = match positions.get(&placeholder.name) {
            Some(position) => *position,
            None => {
                order.push(placeholder.name.clone());
                positions.insert(placeholder.name, order.len());
                order.len()
            }
        };
        out.push('$');
        out.push_str(&position.to_string());
        cursor = placeholder.span.end;
    }
    out.push_str(&sql[cursor..]);

    PositionalSql { sql: out, order }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_placeholders() {
        let names = referenced_names("SELECT NEWORD(:w_id, :d_id, :c_id, :w_id)");
        assert_eq!(names, vec!["w_id", "d_id", "c_id"]);
    }

    #[test]
    fn test_dollar_brace_placeholders() {
        let found = placeholders("UPDATE t SET x = ${x} WHERE id = ${id}");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "x");
        assert_eq!(found[1].span, 33..38);
    }

    #[test]
    fn test_casts_and_literals_are_skipped() {
        let names = referenced_names("SELECT ':fake', x::int, '${nope}' FROM t WHERE a = :real");
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn test_to_positional_reuses_markers() {
        let positional = to_positional("SELECT * FROM f(:a, ${b}, :a)");
        assert_eq!(positional.sql, "SELECT * FROM f($1, $2, $1)");
        assert_eq!(positional.order, vec!["a", "b"]);
    }

    #[test]
    fn test_no_placeholders() {
        let positional = to_positional("SELECT 1");
        assert_eq!(positional.sql, "SELECT 1");
        assert!(positional.order.is_empty());
    }

    #[test]
    fn test_malformed_brace_is_ignored() {
        assert!(placeholders("SELECT ${ FROM t").is_empty());
        assert!(placeholders("SELECT ${1x} FROM t").is_empty());
    }
}
