//! Field filtering by tag predicate.
//!
//! A filter token selects the allow-set of fields by their header tags:
//!
//! | token | keeps fields whose tag... |
//! |-------|---------------------------|
//! | `-*`  | is empty                  |
//! | `*`   | is non-empty              |
//! | `-s`  | does not contain `s`      |
//! | `+s`  | is empty or contains `s`  |
//! | `s`   | contains `s`              |
//!
//! The rules are checked in this order: the `-*`/`*` exact tokens first,
//! then the prefix rules, then the verbatim-contains fallback. Disallowed
//! fields are removed from the descriptor list and from every record; the
//! removal set is computed first, then applied. Matrix sheets carry no
//! taggable fields and are left untouched.

use indexmap::IndexMap;

use crate::models::{SheetData, SheetRecord};

/// Whether a field with `tag` survives the filter `token`.
pub fn allowed(tag: &str, token: &str) -> bool {
    if token == "-*" {
        tag.is_empty()
    } else if token == "*" {
        !tag.is_empty()
    } else if let Some(rest) = token.strip_prefix('-') {
        !tag.contains(rest)
    } else if let Some(rest) = token.strip_prefix('+') {
        tag.is_empty() || tag.contains(rest)
    } else {
        tag.contains(token)
    }
}

/// Remove all fields outside the allow-set from every sheet.
pub fn apply(sheets: &mut IndexMap<String, SheetRecord>, token: &str) {
    if token.is_empty() {
        return;
    }
    for sheet in sheets.values_mut() {
        apply_sheet(sheet, token);
    }
}

fn apply_sheet(sheet: &mut SheetRecord, token: &str) {
    if matches!(sheet.data, SheetData::Matrix(_)) {
        return;
    }

    let removed: Vec<String> = sheet
        .fields
        .iter()
        .filter(|f| !allowed(&f.filter_tag, token))
        .map(|f| f.name.clone())
        .collect();
    if removed.is_empty() {
        return;
    }

    sheet.fields.retain(|f| allowed(&f.filter_tag, token));
    match &mut sheet.data {
        SheetData::Rows(rows) => {
            for record in rows {
                for name in &removed {
                    record.shift_remove(name);
                }
            }
        }
        SheetData::Single(record) => {
            for name in &removed {
                record.shift_remove(name);
            }
        }
        SheetData::Matrix(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sheet;
    use crate::source::MemorySource;
    use crate::value::Value;

    /// Fields a/b/c tagged "", "s", "c".
    fn tagged_sheets() -> IndexMap<String, SheetRecord> {
        let source = MemorySource::from_rows(
            "cfg",
            &[
                &["list"],
                &["a", "b", "c"],
                &["int", "int", "int"],
                &["", "*s", "*c"],
                &["1", "2", "3"],
            ],
        );
        let sheet = parse_sheet(&source).unwrap();
        let mut sheets = IndexMap::new();
        sheets.insert(sheet.name.clone(), sheet);
        sheets
    }

    fn field_names(sheets: &IndexMap<String, SheetRecord>) -> Vec<String> {
        sheets["cfg"].fields.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn test_minus_token_excludes_tagged_field_only() {
        let mut sheets = tagged_sheets();
        apply(&mut sheets, "-s");
        assert_eq!(field_names(&sheets), vec!["a", "c"]);

        let row = &sheets["cfg"].rows().unwrap()[0];
        assert!(row.get("b").is_none());
        assert_eq!(row["a"], Value::Int(1));
        assert_eq!(row["c"], Value::Int(3));
    }

    #[test]
    fn test_plus_token_keeps_untagged_and_matching() {
        let mut sheets = tagged_sheets();
        apply(&mut sheets, "+s");
        assert_eq!(field_names(&sheets), vec!["a", "b"]);
    }

    #[test]
    fn test_verbatim_token_keeps_matching_only() {
        let mut sheets = tagged_sheets();
        apply(&mut sheets, "s");
        assert_eq!(field_names(&sheets), vec!["b"]);
    }

    #[test]
    fn test_star_tokens_split_on_empty_tag() {
        let mut sheets = tagged_sheets();
        apply(&mut sheets, "*");
        assert_eq!(field_names(&sheets), vec!["b", "c"]);

        let mut sheets = tagged_sheets();
        apply(&mut sheets, "-*");
        assert_eq!(field_names(&sheets), vec!["a"]);
    }

    #[test]
    fn test_empty_token_is_a_no_op() {
        let mut sheets = tagged_sheets();
        apply(&mut sheets, "");
        assert_eq!(field_names(&sheets), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_object_sheet_fields_filtered() {
        let source = MemorySource::from_rows(
            "settings",
            &[
                &["object"],
                &["version", "int", "", "3"],
                &["secret", "string", "*s", "hush"],
            ],
        );
        let sheet = parse_sheet(&source).unwrap();
        let mut sheets = IndexMap::new();
        sheets.insert(sheet.name.clone(), sheet);

        apply(&mut sheets, "-s");
        let SheetData::Single(record) = &sheets["settings"].data else {
            panic!("expected single record");
        };
        assert!(record.get("secret").is_none());
        assert_eq!(record["version"], Value::Int(3));
    }
}
