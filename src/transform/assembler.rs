//! Final document assembly.
//!
//! Builds the data document (export name to materialized value) and the
//! meta document from the fully transformed sheet map. Dict sheets are
//! re-keyed here by their first field's value; duplicate keys overwrite
//! silently, last write wins, so layered sheets can rely on override
//! semantics. Sheets that only serve as foreign-key lookup tables are
//! omitted from the data document but keep their meta entry.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::meta::{MetaMap, SheetMeta};
use crate::models::{ContainerKind, SheetData, SheetRecord};
use crate::value::{Record, Value};

/// Build the data document.
pub fn assemble_data(
    sheets: &IndexMap<String, SheetRecord>,
    exclude: &BTreeSet<String>,
) -> IndexMap<String, Value> {
    let mut data = IndexMap::new();
    for (name, sheet) in sheets {
        if exclude.contains(name) {
            continue;
        }
        data.insert(name.clone(), sheet_value(sheet));
    }
    data
}

/// Build the meta document, covering lookup sheets too.
pub fn assemble_meta(sheets: &IndexMap<String, SheetRecord>) -> MetaMap {
    sheets
        .iter()
        .map(|(name, sheet)| (name.clone(), SheetMeta::of_sheet(sheet)))
        .collect()
}

fn sheet_value(sheet: &SheetRecord) -> Value {
    match &sheet.data {
        SheetData::Rows(rows) => match sheet.kind {
            ContainerKind::Dict => keyed_rows(sheet, rows),
            _ => {
                if let Some(values) = simple_array(sheet, rows) {
                    Value::Array(values)
                } else {
                    Value::Array(rows.iter().cloned().map(Value::Map).collect())
                }
            }
        },
        SheetData::Single(record) => Value::Map(record.clone()),
        SheetData::Matrix(payload) => {
            let mut map = Record::new();
            map.insert("matrix".to_string(), Value::Array(payload.matrix.clone()));
            map.insert("col_head".to_string(), Value::Array(payload.col_head.clone()));
            map.insert("row_head".to_string(), Value::Array(payload.row_head.clone()));
            Value::Map(map)
        }
    }
}

/// Re-key dict rows by the primary field's value.
fn keyed_rows(sheet: &SheetRecord, rows: &[Record]) -> Value {
    let Some(key_field) = sheet.primary_key() else {
        return Value::Array(rows.iter().cloned().map(Value::Map).collect());
    };
    let mut keyed = Record::new();
    for row in rows {
        let key = row.get(key_field).map(Value::key_string).unwrap_or_default();
        keyed.insert(key, Value::Map(row.clone()));
    }
    Value::Map(keyed)
}

/// A list sheet whose only field is named `_` compiles to a plain array of
/// that field's values.
fn simple_array(sheet: &SheetRecord, rows: &[Record]) -> Option<Vec<Value>> {
    if sheet.kind != ContainerKind::List || sheet.fields.len() != 1 {
        return None;
    }
    let field = &sheet.fields[0];
    if field.name != "_" {
        return None;
    }
    Some(
        rows.iter()
            .map(|row| row.get("_").cloned().unwrap_or(Value::Null))
            .collect(),
    )
}
