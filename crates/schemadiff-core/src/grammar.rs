//! Naming conventions and small SQL text helpers.

use crate::ddl::{ForeignKey, Index};

// ================================================================
// Default constraint names
// ================================================================

/// `{table}_{columns}_pk`.
#[must_use]
pub fn default_pk_name(table: &str, columns: &[String]) -> String {
    format!("{table}_{}_pk", columns.join("_"))
}

/// `{table}_{columns}_{tableTo}_{columnsTo}_fk`.
#[must_use]
pub fn default_fk_name(fk: &ForeignKey) -> String {
    format!(
        "{}_{}_{}_{}_fk",
        fk.table,
        fk.columns.join("_"),
        fk.table_to,
        fk.columns_to.join("_")
    )
}

/// `{table}_{columns}_unique`.
#[must_use]
pub fn default_unique_name(table: &str, columns: &[String]) -> String {
    format!("{table}_{}_unique", columns.join("_"))
}

/// `{table}_{columns}_unique` or `{table}_{columns}_index`. Indexes over
/// expressions have no default name and must be named explicitly.
#[must_use]
pub fn default_index_name(index: &Index) -> Option<String> {
    if index.columns.iter().any(|c| c.is_expression) {
        return None;
    }
    let columns: Vec<String> = index.columns.iter().map(|c| c.value.clone()).collect();
    if index.is_unique {
        Some(default_unique_name(&index.table, &columns))
    } else {
        Some(format!("{}_{}_index", index.table, columns.join("_")))
    }
}

// ================================================================
// Type strings
// ================================================================

/// A column type split into base name, parenthesized arguments, and
/// trailing modifiers. Everything is lowercased with single spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlType {
    pub base: String,
    pub args: Option<String>,
    pub modifiers: String,
}

impl SqlType {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize_ws(raw);
        let Some(open) = normalized.find('(') else {
            let (base, modifiers) = split_known_base(&normalized);
            return Self {
                base,
                args: None,
                modifiers,
            };
        };
        let base = normalized[..open].trim().to_string();
        let rest = &normalized[open + 1..];
        let (args, modifiers) = rest
            .find(')')
            .map_or((rest, ""), |close| (&rest[..close], rest[close + 1..].trim()));
        Self {
            base,
            args: Some(args.chars().filter(|c| !c.is_whitespace()).collect()),
            modifiers: modifiers.to_string(),
        }
    }

    /// Reassembles the canonical text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.base.clone();
        if let Some(args) = &self.args {
            out.push('(');
            out.push_str(args);
            out.push(')');
        }
        if !self.modifiers.is_empty() {
            out.push(' ');
            out.push_str(&self.modifiers);
        }
        out
    }
}

/// Multi-word base names that must not be split into base + modifier.
const MULTI_WORD_TYPES: &[&str] = &["double precision", "long varchar", "long varbinary"];

fn split_known_base(normalized: &str) -> (String, String) {
    if let Some(base) = MULTI_WORD_TYPES
        .iter()
        .find(|t| normalized == **t || normalized.starts_with(&format!("{t} ")))
    {
        let modifiers = normalized[base.len()..].trim().to_string();
        return (base.to_string(), modifiers);
    }
    normalized.split_once(' ').map_or_else(
        || (normalized.to_string(), String::new()),
        |(base, modifiers)| (base.to_string(), modifiers.to_string()),
    )
}

/// Lowercases and collapses runs of whitespace.
#[must_use]
pub fn normalize_ws(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether values of this type are dates or times.
#[must_use]
pub fn is_temporal(sql_type: &str) -> bool {
    matches!(
        SqlType::parse(sql_type).base.as_str(),
        "date" | "datetime" | "timestamp" | "time" | "year"
    )
}

/// `serial` is `bigint unsigned not null auto_increment unique`.
#[must_use]
pub fn implies_auto_increment(sql_type: &str) -> bool {
    SqlType::parse(sql_type).base == "serial"
}

// ================================================================
// Expressions and literals
// ================================================================

/// Strips parentheses that wrap the whole expression, repeatedly.
#[must_use]
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut current = expr.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    let last = expr.len() - 1;
    for (idx, ch) in expr.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 && idx != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Unwraps a single-quoted SQL literal, undoing `''` and `\` escapes.
#[must_use]
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal
        .trim()
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            _ => out.push(ch),
        }
    }
    Some(out)
}

/// Quotes a value as a SQL string literal.
#[must_use]
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::IndexColumn;

    #[test]
    fn default_names() {
        assert_eq!(
            default_pk_name("t", &["a".into(), "b".into()]),
            "t_a_b_pk"
        );
        let idx = Index::new("t", vec![IndexColumn::column("a")], false);
        assert_eq!(default_index_name(&idx).as_deref(), Some("t_a_index"));
        let expr = Index::new("t", vec![IndexColumn::expression("lower(`a`)")], false);
        assert_eq!(default_index_name(&expr), None);
    }

    #[test]
    fn parse_type_parts() {
        let t = SqlType::parse("  INT(11)   UNSIGNED ");
        assert_eq!(t.base, "int");
        assert_eq!(t.args.as_deref(), Some("11"));
        assert_eq!(t.modifiers, "unsigned");
        assert_eq!(t.render(), "int(11) unsigned");

        let t = SqlType::parse("decimal(10, 2)");
        assert_eq!(t.args.as_deref(), Some("10,2"));

        let t = SqlType::parse("Double  Precision");
        assert_eq!(t.base, "double precision");
        assert!(t.modifiers.is_empty());

        let t = SqlType::parse("bigint unsigned");
        assert_eq!(t.base, "bigint");
        assert_eq!(t.modifiers, "unsigned");
    }

    #[test]
    fn outer_parens() {
        assert_eq!(strip_outer_parens("((now()))"), "now()");
        assert_eq!(strip_outer_parens("(a) + (b)"), "(a) + (b)");
        assert_eq!(strip_outer_parens("(')')"), "')'");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(unquote("'it''s'").as_deref(), Some("it's"));
        assert_eq!(unquote("'a\\\\b'").as_deref(), Some("a\\b"));
        assert_eq!(unquote("abc"), None);
    }

    #[test]
    fn type_classes() {
        assert!(is_temporal("timestamp(3)"));
        assert!(!is_temporal("int"));
        assert!(implies_auto_increment("SERIAL"));
    }
}
