//! Cross-sheet foreign-key resolution.
//!
//! Runs only after every sheet is parsed: a query field's condition values
//! are matched against the target sheet's already-materialized rows. The
//! scan is two-phase — all replacement values are computed against the
//! immutable sheet map first, then applied — so no sheet is mutated while
//! another is being read.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::ResolveError;
use crate::logs::log_warning;
use crate::models::{Cardinality, ForeignKeySpec, SheetRecord};
use crate::value::{convert, Record, Value};

/// Result of the resolution pass.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// Reported resolution problems; the run continues past all of them.
    pub errors: Vec<ResolveError>,
    /// Sheets named as join targets. These are pure lookup tables and are
    /// excluded from the data document regardless of resolution success.
    pub lookup_sheets: BTreeSet<String>,
}

/// Resolve every query field in every list/dict sheet.
///
/// Per record: zero matches resolve the field to null (reported); a missing
/// or wrong-kind target sheet leaves the field's raw conditions in place
/// (reported); empty conditions resolve to null silently.
pub fn resolve(sheets: &mut IndexMap<String, SheetRecord>) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::default();
    let mut updates: Vec<(String, usize, String, Value)> = Vec::new();

    for (sheet_name, sheet) in sheets.iter() {
        if !sheet.kind.has_rows() {
            continue;
        }
        for field in &sheet.fields {
            let Some(spec) = field.foreign_key() else {
                continue;
            };
            outcome.lookup_sheets.insert(spec.target_sheet.clone());

            let Some(target) = sheets.get(&spec.target_sheet) else {
                outcome.errors.push(ResolveError::TargetMissing {
                    sheet: sheet_name.clone(),
                    field: field.name.clone(),
                    target: spec.target_sheet.clone(),
                });
                continue;
            };
            let Some(target_rows) = target.rows() else {
                outcome.errors.push(ResolveError::WrongContainer {
                    sheet: sheet_name.clone(),
                    field: field.name.clone(),
                    target: spec.target_sheet.clone(),
                });
                continue;
            };
            let target_pk = target.primary_key().unwrap_or_default();

            let Some(rows) = sheet.rows() else {
                continue;
            };
            for (index, record) in rows.iter().enumerate() {
                let conditions = condition_values(record.get(&field.name));
                if conditions.is_empty() {
                    updates.push((sheet_name.clone(), index, field.name.clone(), Value::Null));
                    continue;
                }
                match lookup(&conditions, spec, target_rows, target_pk) {
                    Some(value) => {
                        updates.push((sheet_name.clone(), index, field.name.clone(), value));
                    }
                    None => {
                        outcome.errors.push(ResolveError::NoMatch {
                            sheet: sheet_name.clone(),
                            field: field.name.clone(),
                            target: spec.target_sheet.clone(),
                            conditions: conditions.clone(),
                        });
                        updates.push((sheet_name.clone(), index, field.name.clone(), Value::Null));
                    }
                }
            }
        }
    }

    for error in &outcome.errors {
        log_warning(error.to_string());
    }

    for (sheet_name, index, field_name, value) in updates {
        if let Some(rows) = sheets.get_mut(&sheet_name).and_then(SheetRecord::rows_mut) {
            if let Some(record) = rows.get_mut(index) {
                record.insert(field_name, value);
            }
        }
    }

    outcome
}

/// The raw condition values of a query cell, as strings.
fn condition_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(Value::key_string).collect(),
        _ => Vec::new(),
    }
}

/// Scan the target rows in stored order and assemble the result by
/// cardinality.
fn lookup(
    conditions: &[String],
    spec: &ForeignKeySpec,
    target_rows: &[Record],
    target_pk: &str,
) -> Option<Value> {
    match spec.cardinality {
        Cardinality::Object => target_rows
            .iter()
            .find(|row| matches(conditions, &spec.keys, row))
            .map(|row| Value::Map(row.clone())),
        Cardinality::List => {
            let hits: Vec<Value> = target_rows
                .iter()
                .filter(|row| matches(conditions, &spec.keys, row))
                .map(|row| Value::Map(row.clone()))
                .collect();
            if hits.is_empty() {
                None
            } else {
                Some(Value::Array(hits))
            }
        }
        Cardinality::Dict => {
            let mut result = Record::new();
            for row in target_rows {
                if matches(conditions, &spec.keys, row) {
                    let key = row.get(target_pk).map(Value::key_string).unwrap_or_default();
                    result.insert(key, Value::Map(row.clone()));
                }
            }
            if result.is_empty() {
                None
            } else {
                Some(Value::Map(result))
            }
        }
    }
}

/// A candidate row matches when every condition, coerced to the target
/// attribute's runtime kind, equals that attribute. Conditions zip
/// positionally with the join keys; a missing or non-primitive attribute
/// fails the pair.
fn matches(conditions: &[String], keys: &[String], row: &Record) -> bool {
    conditions.iter().zip(keys.iter()).all(|(cond, key)| {
        let Some(attr) = row.get(key) else {
            return false;
        };
        let Some(kind) = attr.kind() else {
            return false;
        };
        &convert(&Value::Str(cond.clone()), kind) == attr
    })
}
