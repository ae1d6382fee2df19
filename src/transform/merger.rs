//! Indexed-field merging: `ids_0, ids_1, ...` collapse into one array field.
//!
//! A field joins a merge group when its name ends in `_<digits>`, the base
//! name is not itself a declared field, and every member of the group shares
//! the same declared scalar type. Collection order follows the parsed
//! numeric suffix ascending, not column order. A group with mixed or
//! non-scalar types is left unmerged.

use indexmap::IndexMap;

use crate::models::{FieldDescriptor, FieldKind, SheetData, SheetRecord};
use crate::value::{PrimitiveType, Value};

/// Merge indexed field groups in every sheet.
pub fn merge_indexed_fields(sheets: &mut IndexMap<String, SheetRecord>) {
    for sheet in sheets.values_mut() {
        merge_sheet(sheet);
    }
}

/// Split a trailing `_<digits>` suffix off a field name.
fn split_indexed(name: &str) -> Option<(&str, u64)> {
    let pos = name.rfind('_')?;
    if pos == 0 {
        return None;
    }
    let suffix = &name[pos + 1..];
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&name[..pos], suffix.parse().ok()?))
}

struct MergeGroup {
    base: String,
    elem: PrimitiveType,
    /// Member field names sorted by ascending numeric suffix.
    members: Vec<String>,
    position: usize,
    filter_tag: String,
}

fn merge_sheet(sheet: &mut SheetRecord) {
    if matches!(sheet.data, SheetData::Matrix(_)) {
        return;
    }

    // Phase 1: collect groups from the current field list.
    let mut candidates: IndexMap<String, Vec<(u64, usize)>> = IndexMap::new();
    for (index, field) in sheet.fields.iter().enumerate() {
        let Some((base, suffix)) = split_indexed(&field.name) else {
            continue;
        };
        if sheet.fields.iter().any(|f| f.name == base) {
            continue;
        }
        candidates.entry(base.to_string()).or_default().push((suffix, index));
    }

    let mut groups: Vec<MergeGroup> = Vec::new();
    for (base, mut members) in candidates {
        let first = &sheet.fields[members[0].1];
        let FieldKind::Scalar(elem) = first.kind else {
            continue;
        };
        let uniform = members
            .iter()
            .all(|(_, index)| sheet.fields[*index].kind == FieldKind::Scalar(elem));
        if !uniform {
            continue;
        }
        members.sort_by_key(|(suffix, _)| *suffix);
        let lowest = &sheet.fields[members[0].1];
        groups.push(MergeGroup {
            base,
            elem,
            members: members.iter().map(|(_, index)| sheet.fields[*index].name.clone()).collect(),
            position: lowest.position,
            filter_tag: lowest.filter_tag.clone(),
        });
    }

    if groups.is_empty() {
        return;
    }

    // Phase 2: rebuild the field list and consolidate record values.
    for group in &groups {
        sheet.fields.retain(|f| !group.members.contains(&f.name));
        sheet.fields.push(FieldDescriptor {
            name: group.base.clone(),
            declared: format!("{}[]", group.elem.token()),
            kind: FieldKind::Array { elem: group.elem, delim: ",".to_string() },
            position: group.position,
            filter_tag: group.filter_tag.clone(),
        });
    }

    match &mut sheet.data {
        SheetData::Rows(rows) => {
            for record in rows {
                for group in &groups {
                    consolidate(record, group);
                }
            }
        }
        SheetData::Single(record) => {
            for group in &groups {
                consolidate(record, group);
            }
        }
        SheetData::Matrix(_) => {}
    }
}

/// Pull the group's values out of a record, in suffix order, and append the
/// combined array.
fn consolidate(record: &mut crate::value::Record, group: &MergeGroup) {
    let mut values = Vec::with_capacity(group.members.len());
    for member in &group.members {
        if let Some(value) = record.shift_remove(member) {
            values.push(value);
        }
    }
    record.insert(group.base.clone(), Value::Array(values));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_sheet;
    use crate::source::MemorySource;

    fn sheets_of(source: &MemorySource) -> IndexMap<String, SheetRecord> {
        let sheet = parse_sheet(source).unwrap();
        let mut sheets = IndexMap::new();
        sheets.insert(sheet.name.clone(), sheet);
        sheets
    }

    #[test]
    fn test_merge_follows_numeric_suffix_order() {
        // columns deliberately out of suffix order
        let source = MemorySource::from_rows(
            "npc",
            &[
                &["list"],
                &["ids_2", "ids_0", "ids_1"],
                &["int", "int", "int"],
                &["3", "1", "2"],
            ],
        );
        let mut sheets = sheets_of(&source);
        merge_indexed_fields(&mut sheets);

        let sheet = &sheets["npc"];
        assert_eq!(sheet.fields.len(), 1);
        assert_eq!(sheet.fields[0].name, "ids");
        assert_eq!(sheet.fields[0].declared, "int[]");

        let row = &sheet.rows().unwrap()[0];
        assert_eq!(
            row["ids"],
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_existing_base_name_blocks_merge() {
        let source = MemorySource::from_rows(
            "npc",
            &[
                &["list"],
                &["ids", "ids_0"],
                &["string", "int"],
                &["x", "1"],
            ],
        );
        let mut sheets = sheets_of(&source);
        merge_indexed_fields(&mut sheets);

        let sheet = &sheets["npc"];
        assert_eq!(sheet.fields.len(), 2);
        assert_eq!(sheet.rows().unwrap()[0]["ids_0"], Value::Int(1));
    }

    #[test]
    fn test_mixed_types_skip_merge() {
        let source = MemorySource::from_rows(
            "npc",
            &[
                &["list"],
                &["ids_0", "ids_1"],
                &["int", "string"],
                &["1", "x"],
            ],
        );
        let mut sheets = sheets_of(&source);
        merge_indexed_fields(&mut sheets);

        let sheet = &sheets["npc"];
        assert_eq!(sheet.fields.len(), 2);
    }

    #[test]
    fn test_merged_descriptor_inherits_lowest_suffix_member() {
        let source = MemorySource::from_rows(
            "npc",
            &[
                &["list"],
                &["hp", "ids_1", "ids_0"],
                &["int", "int", "int"],
                &["", "*a", "*b"],
                &["9", "2", "1"],
            ],
        );
        let mut sheets = sheets_of(&source);
        merge_indexed_fields(&mut sheets);

        let sheet = &sheets["npc"];
        let merged = sheet.field("ids").unwrap();
        // ids_0 is the lowest suffix: its column and tag carry over
        assert_eq!(merged.position, 2);
        assert_eq!(merged.filter_tag, "b");
        // merged field is appended after surviving fields
        assert_eq!(sheet.fields.last().unwrap().name, "ids");
        assert_eq!(sheet.fields[0].name, "hp");
    }

    #[test]
    fn test_object_sheet_merges_rows() {
        let source = MemorySource::from_rows(
            "settings",
            &[
                &["object"],
                &["slot_1", "int", "20"],
                &["title", "string", "Hi"],
                &["slot_0", "int", "10"],
            ],
        );
        let mut sheets = sheets_of(&source);
        merge_indexed_fields(&mut sheets);

        let SheetData::Single(record) = &sheets["settings"].data else {
            panic!("expected single record");
        };
        assert_eq!(
            record["slot"],
            Value::Array(vec![Value::Int(10), Value::Int(20)])
        );
        assert!(record.get("slot_0").is_none());
    }

    #[test]
    fn test_underscore_only_names_are_not_indexed() {
        assert_eq!(split_indexed("ids_0"), Some(("ids", 0)));
        assert_eq!(split_indexed("a_b_12"), Some(("a_b", 12)));
        assert_eq!(split_indexed("_0"), None);
        assert_eq!(split_indexed("ids_"), None);
        assert_eq!(split_indexed("ids_x1"), None);
        assert_eq!(split_indexed("ids"), None);
    }
}
