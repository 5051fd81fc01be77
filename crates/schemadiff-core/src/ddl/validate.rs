//! Hand-written shape checks for raw catalog rows.
//!
//! Each kind has its own function listing the fields it requires. Errors
//! carry a field path (`ddl[3].columns[0].isExpression`) and the expected
//! kind of value.

use serde_json::{Map, Value};

use super::entities::{DefaultKind, EntityType};
use crate::error::ValidationError;

const ACTIONS: &[&str] = &["NO ACTION", "RESTRICT", "CASCADE", "SET NULL", "SET DEFAULT"];
const GENERATED: &[&str] = &["stored", "virtual"];
const USING: &[&str] = &["btree", "hash"];
const ALGORITHM: &[&str] = &["default", "inplace", "copy"];
const LOCK: &[&str] = &["default", "none", "shared", "exclusive"];
const VIEW_ALGORITHM: &[&str] = &["undefined", "merge", "temptable"];
const SQL_SECURITY: &[&str] = &["definer", "invoker"];
const CHECK_OPTION: &[&str] = &["local", "cascaded"];

/// Validates every row of `rows`; paths are prefixed with `prefix[i]`.
#[must_use]
pub fn validate_rows(rows: &[Value], prefix: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        validate_row(row, &format!("{prefix}[{idx}]"), &mut errors);
    }
    errors
}

/// Validates one row, dispatching on its `entityType` tag.
pub fn validate_row(row: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(obj) = row.as_object() else {
        errors.push(ValidationError::new(path, "object"));
        return;
    };
    let Some(kind) = obj
        .get("entityType")
        .and_then(Value::as_str)
        .and_then(EntityType::parse)
    else {
        let tags: Vec<&str> = EntityType::ALL.iter().map(EntityType::as_str).collect();
        errors.push(ValidationError::new(
            format!("{path}.entityType"),
            format!("one of {}", tags.join("|")),
        ));
        return;
    };
    let mut f = Fields { obj, path, errors };
    match kind {
        EntityType::Tables => f.string("name"),
        EntityType::Columns => column(&mut f),
        EntityType::Pks => {
            f.string("table");
            f.string("name");
            f.opt_bool("nameExplicit");
            f.string_array("columns");
        }
        EntityType::Fks => {
            f.string("table");
            f.string("name");
            f.opt_bool("nameExplicit");
            f.string_array("columns");
            f.string("tableTo");
            f.string_array("columnsTo");
            f.opt_enum("onUpdate", ACTIONS);
            f.opt_enum("onDelete", ACTIONS);
        }
        EntityType::Indexes => index(&mut f),
        EntityType::Checks => {
            f.string("table");
            f.string("name");
            f.opt_bool("nameExplicit");
            f.string("value");
        }
        EntityType::Views => {
            f.string("name");
            f.string("definition");
            f.opt_enum("algorithm", VIEW_ALGORITHM);
            f.opt_enum("sqlSecurity", SQL_SECURITY);
            f.opt_enum("withCheckOption", CHECK_OPTION);
        }
        EntityType::ViewColumns => {
            f.string("view");
            f.string("name");
            f.string("type");
            f.boolean("notNull");
        }
    }
}

fn column(f: &mut Fields<'_>) {
    f.string("table");
    f.string("name");
    f.string("type");
    f.boolean("notNull");
    f.opt_bool("autoIncrement");
    f.opt_bool("onUpdateNow");
    f.opt_string("charSet");
    f.opt_string("collation");
    let kinds: Vec<&str> = DefaultKind::ALL.iter().map(DefaultKind::as_str).collect();
    f.opt_object("default", |nested| {
        nested.string("value");
        nested.enumeration("type", &kinds);
    });
    f.opt_object("generated", |nested| {
        nested.enumeration("type", GENERATED);
        nested.string("as");
    });
}

fn index(f: &mut Fields<'_>) {
    f.string("table");
    f.string("name");
    f.opt_bool("nameExplicit");
    f.boolean("isUnique");
    f.opt_enum("using", USING);
    f.opt_enum("algorithm", ALGORITHM);
    f.opt_enum("lock", LOCK);
    match f.obj.get("columns") {
        Some(Value::Array(items)) => {
            for (idx, item) in items.iter().enumerate() {
                let path = format!("{}.columns[{idx}]", f.path);
                let Some(obj) = item.as_object() else {
                    f.errors.push(ValidationError::new(path, "object"));
                    continue;
                };
                let mut nested = Fields {
                    obj,
                    path: &path,
                    errors: &mut *f.errors,
                };
                nested.string("value");
                nested.boolean("isExpression");
            }
        }
        _ => f.error("columns", "array"),
    }
}

/// Field checker over one JSON object.
struct Fields<'a> {
    obj: &'a Map<String, Value>,
    path: &'a str,
    errors: &'a mut Vec<ValidationError>,
}

impl Fields<'_> {
    fn error(&mut self, field: &str, expected: &str) {
        self.errors
            .push(ValidationError::new(format!("{}.{field}", self.path), expected));
    }

    fn string(&mut self, field: &str) {
        if !matches!(self.obj.get(field), Some(Value::String(_))) {
            self.error(field, "string");
        }
    }

    fn opt_string(&mut self, field: &str) {
        if !matches!(self.obj.get(field), None | Some(Value::Null | Value::String(_))) {
            self.error(field, "string or null");
        }
    }

    fn boolean(&mut self, field: &str) {
        if !matches!(self.obj.get(field), Some(Value::Bool(_))) {
            self.error(field, "boolean");
        }
    }

    fn opt_bool(&mut self, field: &str) {
        if !matches!(self.obj.get(field), None | Some(Value::Bool(_))) {
            self.error(field, "boolean");
        }
    }

    fn string_array(&mut self, field: &str) {
        match self.obj.get(field) {
            Some(Value::Array(items)) => {
                for (idx, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        let path = format!("{}.{field}[{idx}]", self.path);
                        self.errors.push(ValidationError::new(path, "string"));
                    }
                }
            }
            _ => self.error(field, "array of strings"),
        }
    }

    fn enumeration(&mut self, field: &str, allowed: &[&str]) {
        let ok = self
            .obj
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|v| allowed.contains(&v));
        if !ok {
            self.error(field, &format!("one of {}", allowed.join("|")));
        }
    }

    fn opt_enum(&mut self, field: &str, allowed: &[&str]) {
        if !matches!(self.obj.get(field), None | Some(Value::Null)) {
            self.enumeration(field, allowed);
        }
    }

    fn opt_object(&mut self, field: &str, check: impl FnOnce(&mut Fields<'_>)) {
        match self.obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Object(obj)) => {
                let path = format!("{}.{field}", self.path);
                let mut nested = Fields {
                    obj,
                    path: &path,
                    errors: &mut *self.errors,
                };
                check(&mut nested);
            }
            Some(_) => self.error(field, "object or null"),
        }
    }
}
