//! Commutativity rules: suppress alters between values that differ in
//! text but mean the same thing to the database.
//!
//! Every field delta for which a rule holds is removed from its alter
//! record; an alter with no remaining delta is dropped entirely.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ddl::{Catalog, ColumnDefault, DefaultKind, IndexUsing, ReferentialAction};
use crate::diff::{
    Alters, CheckAlter, ColumnAlter, FkAlter, IndexAlter, PkAlter, ViewAlter, ViewColumnAlter,
};
use crate::grammar::{self, SqlType};

/// Diff mode.
///
/// `Default` compares against a previously declared snapshot, where
/// textual fidelity matters for migration history. `Push` compares
/// against an introspected live database and accepts more forms as
/// equal to avoid destructive re-creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Push,
}

impl Mode {
    #[must_use]
    pub const fn is_push(self) -> bool {
        matches!(self, Self::Push)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "push" => Ok(Self::Push),
            other => Err(format!("unknown mode '{other}', expected default|push")),
        }
    }
}

/// Dialect-specific equivalence predicates.
///
/// Implementors supply the value-level predicates; [`filter`] applies
/// them, plus the edge policy, to a set of alters.
///
/// [`filter`]: CommutativityRules::filter
pub trait CommutativityRules {
    /// Column or view-column types that compile to the same physical type.
    fn types_equal(&self, from: &str, to: &str, mode: Mode) -> bool;

    /// Defaults that evaluate to the same value for a column of `sql_type`.
    fn defaults_equal(
        &self,
        from: &ColumnDefault,
        to: &ColumnDefault,
        sql_type: &str,
        mode: Mode,
    ) -> bool;

    fn charsets_equal(&self, from: Option<&str>, to: Option<&str>, mode: Mode) -> bool;

    fn collations_equal(&self, from: Option<&str>, to: Option<&str>, mode: Mode) -> bool;

    /// SQL expressions (checks, generated columns) that are the same.
    fn expressions_equal(&self, from: &str, to: &str, mode: Mode) -> bool;

    /// Removes commutative deltas and empty alters. `from`/`to` provide
    /// primary-key membership for the not-null edge policy.
    fn filter(&self, alters: Alters, from: &Catalog, to: &Catalog, mode: Mode) -> Alters {
        Alters {
            columns: alters
                .columns
                .into_iter()
                .filter_map(|a| self.filter_column(a, from, to, mode))
                .collect(),
            pks: alters.pks.into_iter().filter_map(filter_pk).collect(),
            fks: alters
                .fks
                .into_iter()
                .filter_map(|a| filter_fk(a, mode))
                .collect(),
            indexes: alters
                .indexes
                .into_iter()
                .filter_map(|a| filter_index(a, mode))
                .collect(),
            checks: alters
                .checks
                .into_iter()
                .filter_map(|a| self.filter_check(a, mode))
                .collect(),
            views: alters
                .views
                .into_iter()
                .filter_map(|a| filter_view(a, mode))
                .collect(),
            view_columns: alters
                .view_columns
                .into_iter()
                .filter_map(|a| self.filter_view_column(a, mode))
                .collect(),
        }
    }

    fn filter_column(
        &self,
        mut alter: ColumnAlter,
        from: &Catalog,
        to: &Catalog,
        mode: Mode,
    ) -> Option<ColumnAlter> {
        if let Some(d) = &alter.sql_type {
            if self.types_equal(&d.from, &d.to, mode) {
                alter.sql_type = None;
            }
        }
        if let Some(d) = &alter.default {
            if let (Some(l), Some(r)) = (&d.from, &d.to) {
                if self.defaults_equal(l, r, &alter.right.sql_type, mode) {
                    alter.default = None;
                }
            }
        }
        if alter.not_null.is_some() {
            let column = &alter.right;
            let in_pk = |c: &Catalog| {
                c.pk_of(&column.table)
                    .is_some_and(|pk| pk.columns.contains(&column.name))
            };
            if in_pk(from) || in_pk(to) {
                alter.not_null = None;
            }
        }
        if alter.auto_increment.is_some() && grammar::implies_auto_increment(&alter.right.sql_type)
        {
            alter.auto_increment = None;
        }
        if let Some(d) = &alter.char_set {
            if self.charsets_equal(d.from.as_deref(), d.to.as_deref(), mode) {
                alter.char_set = None;
            }
        }
        if let Some(d) = &alter.collation {
            if self.collations_equal(d.from.as_deref(), d.to.as_deref(), mode) {
                alter.collation = None;
            }
        }
        if let Some(d) = &alter.generated {
            if let (Some(l), Some(r)) = (&d.from, &d.to) {
                if l.kind == r.kind && self.expressions_equal(&l.expression, &r.expression, mode) {
                    alter.generated = None;
                }
            }
        }
        (!alter.is_empty()).then_some(alter)
    }

    fn filter_check(&self, mut alter: CheckAlter, mode: Mode) -> Option<CheckAlter> {
        alter.name_explicit = None;
        if let Some(d) = &alter.value {
            if self.expressions_equal(&d.from, &d.to, mode) {
                alter.value = None;
            }
        }
        (!alter.is_empty()).then_some(alter)
    }

    fn filter_view_column(&self, mut alter: ViewColumnAlter, mode: Mode) -> Option<ViewColumnAlter> {
        if let Some(d) = &alter.sql_type {
            if self.types_equal(&d.from, &d.to, mode) {
                alter.sql_type = None;
            }
        }
        (!alter.is_empty()).then_some(alter)
    }
}

// MySQL always names the primary key `PRIMARY`.
fn filter_pk(mut alter: PkAlter) -> Option<PkAlter> {
    alter.name = None;
    alter.name_explicit = None;
    (!alter.is_empty()).then_some(alter)
}

fn filter_fk(mut alter: FkAlter, mode: Mode) -> Option<FkAlter> {
    alter.name_explicit = None;
    if mode.is_push() {
        let same = |a: ReferentialAction, b: ReferentialAction| {
            let fold = |x| match x {
                ReferentialAction::Restrict => ReferentialAction::NoAction,
                other => other,
            };
            fold(a) == fold(b)
        };
        if alter.on_update.as_ref().is_some_and(|d| same(d.from, d.to)) {
            alter.on_update = None;
        }
        if alter.on_delete.as_ref().is_some_and(|d| same(d.from, d.to)) {
            alter.on_delete = None;
        }
    }
    (!alter.is_empty()).then_some(alter)
}

fn filter_index(mut alter: IndexAlter, mode: Mode) -> Option<IndexAlter> {
    alter.name_explicit = None;
    alter.algorithm = None;
    alter.lock = None;
    if mode.is_push() {
        let using = |u: Option<IndexUsing>| u.unwrap_or(IndexUsing::Btree);
        if alter
            .using
            .as_ref()
            .is_some_and(|d| using(d.from) == using(d.to))
        {
            alter.using = None;
        }
    }
    (!alter.is_empty()).then_some(alter)
}

// Introspected view definitions are rewritten by the server.
fn filter_view(mut alter: ViewAlter, mode: Mode) -> Option<ViewAlter> {
    if mode.is_push() {
        alter.definition = None;
    }
    (!alter.is_empty()).then_some(alter)
}

// ================================================================
// MySQL
// ================================================================

const DEFAULT_CHARSET: &str = "utf8mb4";
const DEFAULT_COLLATION: &str = "utf8mb4_0900_ai_ci";

const INTEGER_TYPES: &[&str] = &["tinyint", "smallint", "mediumint", "int", "bigint"];

/// Rules for MySQL 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlRules;

impl MySqlRules {
    /// Canonical text of a type; equal canonical text means commutative.
    #[must_use]
    pub fn canonical_type(sql_type: &str, mode: Mode) -> String {
        let mut t = SqlType::parse(sql_type);
        match (t.base.as_str(), t.args.as_deref()) {
            ("boolean" | "bool", None) => {
                t.base = "tinyint".into();
                t.args = Some("1".into());
            }
            ("binary" | "char", None) => t.args = Some("1".into()),
            ("integer", _) => t.base = "int".into(),
            ("decimal" | "numeric" | "dec" | "fixed", args) => {
                t.base = "decimal".into();
                t.args = Some(match args {
                    None => "10,0".into(),
                    Some(a) if !a.contains(',') => format!("{a},0"),
                    Some(a) => a.to_string(),
                });
            }
            ("double precision" | "real", _) => t.base = "double".into(),
            ("timestamp" | "datetime" | "time", Some("0")) => t.args = None,
            _ => {}
        }
        if mode.is_push() {
            if t.base == "serial" {
                return "bigint unsigned".into();
            }
            let boolean = t.base == "tinyint" && t.args.as_deref() == Some("1");
            if INTEGER_TYPES.contains(&t.base.as_str()) && !boolean {
                t.args = None;
            }
        }
        t.render()
    }

    /// Canonical text of an expression default.
    fn canonical_expression(value: &str) -> String {
        static NOW: OnceLock<Regex> = OnceLock::new();
        let now = NOW.get_or_init(|| {
            Regex::new(r"^(?:now|current_timestamp|localtime|localtimestamp)\s*(?:\(\s*(\d*)\s*\))?$")
                .expect("valid regex")
        });
        let folded = grammar::normalize_ws(grammar::strip_outer_parens(value));
        let fsp = now
            .captures(&folded)
            .map(|caps| caps.get(1).map_or_else(String::new, |m| m.as_str().to_string()));
        match fsp.as_deref() {
            None => folded,
            Some("" | "0") => "current_timestamp".into(),
            Some(fsp) => format!("current_timestamp({fsp})"),
        }
    }

    /// The literal text behind a default: quoted `unknown` literals are
    /// unwrapped, expressions lose redundant parentheses.
    fn literal(default: &ColumnDefault) -> String {
        match default.kind {
            DefaultKind::Unknown => {
                let stripped = grammar::strip_outer_parens(&default.value);
                grammar::unquote(stripped).unwrap_or_else(|| stripped.to_string())
            }
            DefaultKind::Json | DefaultKind::Text => grammar::unquote(&default.value)
                .unwrap_or_else(|| default.value.clone()),
            _ => default.value.clone(),
        }
    }
}

fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    const DATE_TIME: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    let raw = raw.trim().trim_end_matches('Z');
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .ok()
        .map(|time| NaiveDate::default().and_time(time))
}

/// Plain decimal literal in canonical form: no leading integer zeros,
/// no trailing fraction zeros, no sign on zero. Exponent forms are `None`.
fn canonical_decimal(raw: &str) -> Option<String> {
    let raw = raw.trim().to_ascii_lowercase();
    match raw.as_str() {
        "true" => return Some("1".into()),
        "false" => return Some("0".into()),
        _ => {}
    }
    let negative = raw.starts_with('-');
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(&raw);
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let well_formed = !(int.is_empty() && frac.is_empty())
        && int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit());
    if !well_formed {
        return None;
    }
    let int = match int.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let frac = frac.trim_end_matches('0');
    let mut out = String::new();
    if negative && (int != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(int);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    Some(out)
}

fn numbers_equal(l: &str, r: &str) -> bool {
    if let (Some(a), Some(b)) = (canonical_decimal(l), canonical_decimal(r)) {
        return a == b;
    }
    match (l.trim().parse::<f64>(), r.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < f64::EPSILON,
        _ => false,
    }
}

impl CommutativityRules for MySqlRules {
    fn types_equal(&self, from: &str, to: &str, mode: Mode) -> bool {
        Self::canonical_type(from, mode) == Self::canonical_type(to, mode)
    }

    fn defaults_equal(
        &self,
        from: &ColumnDefault,
        to: &ColumnDefault,
        sql_type: &str,
        mode: Mode,
    ) -> bool {
        if from.kind == to.kind {
            let equal = match from.kind {
                DefaultKind::Unknown => {
                    Self::canonical_expression(&from.value) == Self::canonical_expression(&to.value)
                }
                _ => from.value == to.value,
            };
            if equal {
                return true;
            }
        }
        if !mode.is_push() {
            return false;
        }

        let (l, r) = (Self::literal(from), Self::literal(to));
        if l == r {
            return true;
        }
        if grammar::is_temporal(sql_type) {
            if let (Some(a), Some(b)) = (parse_instant(&l), parse_instant(&r)) {
                return a == b;
            }
        }
        let json = |k: DefaultKind| k == DefaultKind::Json;
        if json(from.kind) || json(to.kind) {
            let parsed = (
                serde_json::from_str::<serde_json::Value>(&l),
                serde_json::from_str::<serde_json::Value>(&r),
            );
            if let (Ok(a), Ok(b)) = parsed {
                return a == b;
            }
        }
        numbers_equal(&l, &r)
    }

    fn charsets_equal(&self, from: Option<&str>, to: Option<&str>, mode: Mode) -> bool {
        if !mode.is_push() {
            return from == to;
        }
        let norm = |c: Option<&str>| {
            let c = c.unwrap_or(DEFAULT_CHARSET).to_ascii_lowercase();
            if c == "utf8" {
                "utf8mb3".to_string()
            } else {
                c
            }
        };
        norm(from) == norm(to)
    }

    fn collations_equal(&self, from: Option<&str>, to: Option<&str>, mode: Mode) -> bool {
        if !mode.is_push() {
            return from == to;
        }
        let norm = |c: Option<&str>| {
            let c = c.unwrap_or(DEFAULT_COLLATION).to_ascii_lowercase();
            c.strip_prefix("utf8_")
                .map_or_else(|| c.clone(), |rest| format!("utf8mb3_{rest}"))
        };
        norm(from) == norm(to)
    }

    fn expressions_equal(&self, from: &str, to: &str, mode: Mode) -> bool {
        if grammar::strip_outer_parens(from) == grammar::strip_outer_parens(to) {
            return true;
        }
        if !mode.is_push() {
            return false;
        }
        let norm = |e: &str| {
            e.chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, '`' | '(' | ')'))
                .collect::<String>()
                .to_lowercase()
        };
        norm(from) == norm(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, PrimaryKey, Table};
    use crate::diff::alters;

    const SYNONYMS: &[(&str, &str)] = &[
        ("boolean", "tinyint(1)"),
        ("bool", "boolean"),
        ("binary", "binary(1)"),
        ("char", "char(1)"),
        ("integer", "int"),
        ("decimal", "decimal(10,0)"),
        ("numeric", "decimal"),
        ("dec", "fixed"),
        ("double", "double precision"),
        ("real", "double"),
        ("timestamp", "timestamp(0)"),
        ("datetime", "datetime(0)"),
        ("time", "time(0)"),
        ("INT", "int"),
        ("varchar( 255 )", "varchar(255)"),
    ];

    #[test]
    fn declared_synonyms_commute_in_both_modes() {
        for (a, b) in SYNONYMS {
            for mode in [Mode::Default, Mode::Push] {
                assert!(MySqlRules.types_equal(a, b, mode), "{a} vs {b} in {mode:?}");
            }
        }
    }

    #[test]
    fn push_only_type_rules() {
        assert!(!MySqlRules.types_equal("int(11)", "int", Mode::Default));
        assert!(MySqlRules.types_equal("int(11)", "int", Mode::Push));
        assert!(MySqlRules.types_equal("bigint(20) unsigned", "serial", Mode::Push));
        assert!(!MySqlRules.types_equal("tinyint(1)", "tinyint", Mode::Push));
        assert!(!MySqlRules.types_equal("varchar(255)", "varchar(256)", Mode::Push));
    }

    #[test]
    fn expression_defaults() {
        let e = ColumnDefault::expression;
        for mode in [Mode::Default, Mode::Push] {
            assert!(MySqlRules.defaults_equal(&e("(now())"), &e("CURRENT_TIMESTAMP"), "timestamp", mode));
            assert!(MySqlRules.defaults_equal(&e("now(3)"), &e("current_timestamp(3)"), "timestamp(3)", mode));
            assert!(!MySqlRules.defaults_equal(&e("now(3)"), &e("now()"), "timestamp(3)", mode));
        }
    }

    #[test]
    fn push_only_default_rules() {
        let date_a = ColumnDefault::string("2024-01-01 00:00:00");
        let date_b = ColumnDefault::string("2024-01-01T00:00:00.000Z");
        assert!(!MySqlRules.defaults_equal(&date_a, &date_b, "datetime", Mode::Default));
        assert!(MySqlRules.defaults_equal(&date_a, &date_b, "datetime", Mode::Push));

        let json_a = ColumnDefault::new(r#"{"a": 1, "b": [1, 2]}"#, DefaultKind::Json);
        let json_b = ColumnDefault::new(r#"('{"b":[1,2],"a":1}')"#, DefaultKind::Unknown);
        assert!(MySqlRules.defaults_equal(&json_a, &json_b, "json", Mode::Push));

        assert!(MySqlRules.defaults_equal(
            &ColumnDefault::number("1.50"),
            &ColumnDefault::number("1.5"),
            "decimal(4,2)",
            Mode::Push
        ));
        assert!(MySqlRules.defaults_equal(
            &ColumnDefault::expression("'abc'"),
            &ColumnDefault::string("abc"),
            "varchar(10)",
            Mode::Push
        ));
    }

    #[test]
    fn push_numeric_defaults_compare_digits() {
        let n = |s: &str| ColumnDefault::number(s);
        let eq = |a: &str, b: &str| MySqlRules.defaults_equal(&n(a), &n(b), "bigint", Mode::Push);
        assert!(!eq("9007199254740993", "9007199254740992"));
        assert!(eq("007", "7"));
        assert!(eq("-0.0", "0"));
        assert!(eq("1e2", "100"));
        assert!(eq("true", "1"));
        assert!(!eq("-1", "1"));
    }

    #[test]
    fn charset_rules_are_push_only() {
        assert!(MySqlRules.charsets_equal(None, Some("UTF8MB4"), Mode::Push));
        assert!(MySqlRules.charsets_equal(Some("utf8"), Some("utf8mb3"), Mode::Push));
        assert!(!MySqlRules.charsets_equal(None, Some("utf8mb4"), Mode::Default));
        assert!(MySqlRules.collations_equal(Some("utf8_general_ci"), Some("utf8mb3_general_ci"), Mode::Push));
    }

    fn one_column(column: Column, pk: bool) -> Catalog {
        let mut c = Catalog::new();
        c.push(Table::new(column.table.clone()));
        if pk {
            c.push(PrimaryKey::new(column.table.clone(), vec![column.name.clone()]));
        }
        c.push(column);
        c
    }

    #[test]
    fn not_null_delta_is_dropped_for_pk_columns() {
        let from = one_column(Column::new("t", "id", "int"), false);
        let to = one_column(Column::new("t", "id", "int").not_null(), true);
        let filtered = MySqlRules.filter(alters(&from, &to), &from, &to, Mode::Default);
        assert!(filtered.columns.is_empty());
    }

    #[test]
    fn auto_increment_delta_dropped_for_serial() {
        let from = one_column(Column::new("t", "id", "serial"), false);
        let to = one_column(Column::new("t", "id", "serial").auto_increment(), false);
        let filtered = MySqlRules.filter(alters(&from, &to), &from, &to, Mode::Default);
        assert!(filtered.is_empty());
    }

    #[test]
    fn real_change_survives_alongside_commutative_one() {
        let from = one_column(Column::new("t", "a", "integer"), false);
        let to = one_column(Column::new("t", "a", "int").not_null(), false);
        let filtered = MySqlRules.filter(alters(&from, &to), &from, &to, Mode::Default);
        assert_eq!(filtered.columns.len(), 1);
        assert!(filtered.columns[0].sql_type.is_none());
        assert!(filtered.columns[0].not_null.is_some());
    }

    #[test]
    fn pk_name_changes_are_ignored() {
        let mut from = one_column(Column::new("t", "a", "int"), false);
        from.push(PrimaryKey::new("t", vec!["a".into()]));
        let mut to = one_column(Column::new("t", "a", "int"), false);
        to.push(PrimaryKey::new("t", vec!["a".into()]).named("custom"));
        let filtered = MySqlRules.filter(alters(&from, &to), &from, &to, Mode::Default);
        assert!(filtered.pks.is_empty());
    }
}
