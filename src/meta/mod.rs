//! Sheet metadata, prior-meta persistence, and schema drift detection.
//!
//! The meta document records, per sheet, its container type, source file,
//! primary key and ordered field declarations. It is persisted next to the
//! sources and compared on the next run: a field whose recorded type changed
//! is schema drift, and drift blocks every artifact write until the prior
//! meta is reviewed and removed.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CompileResult;
use crate::models::{ContainerKind, SheetRecord};
use crate::source::export_name;

/// One field entry in the meta document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Meta entry for one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetMeta {
    /// Container kind token.
    #[serde(rename = "type")]
    pub ty: String,
    /// Export name of the source file.
    pub filename: String,
    /// Primary-key field name; empty unless the sheet is a dict.
    pub primary_key: String,
    /// Ordered field declarations, query types truncated to the target sheet.
    pub fields: Vec<FieldMeta>,
}

impl SheetMeta {
    /// Build the meta entry for a fully transformed sheet.
    pub fn of_sheet(sheet: &SheetRecord) -> Self {
        let primary_key = if sheet.kind == ContainerKind::Dict {
            sheet.primary_key().unwrap_or_default().to_string()
        } else {
            String::new()
        };
        Self {
            ty: sheet.kind.as_str().to_string(),
            filename: export_name(&sheet.filename),
            primary_key,
            fields: sheet
                .fields
                .iter()
                .map(|f| FieldMeta { name: f.name.clone(), ty: f.meta_type() })
                .collect(),
        }
    }
}

/// The meta document: export name to sheet meta, in compilation order.
pub type MetaMap = IndexMap<String, SheetMeta>;

// =============================================================================
// Drift detection
// =============================================================================

/// Compare a prior meta document against the current one.
///
/// Drift is field-granular: a field whose name exists in both versions of a
/// sheet but whose recorded type differs. Added or removed fields and new
/// sheets are not drift. Returns the changed items as `filename.fieldname`.
pub fn diff(prior: &MetaMap, current: &MetaMap) -> Vec<String> {
    let mut items = Vec::new();
    for (name, meta) in current {
        let Some(old) = prior.get(name) else {
            continue;
        };
        for field in &meta.fields {
            let Some(old_field) = old.fields.iter().find(|f| f.name == field.name) else {
                continue;
            };
            if old_field.ty != field.ty {
                items.push(format!("{}.{}", meta.filename, field.name));
            }
        }
    }
    items
}

// =============================================================================
// Persistence
// =============================================================================

/// On-disk form of the meta document.
#[derive(Debug, Serialize, Deserialize)]
struct StoredMeta {
    /// RFC 3339 generation time.
    generated_at: String,
    sheets: MetaMap,
}

/// Loads and saves the prior-meta document.
pub struct MetaStore;

impl MetaStore {
    /// Load a persisted meta document. A missing file is `None` (first run).
    pub fn load(path: impl AsRef<Path>) -> CompileResult<Option<MetaMap>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let stored: StoredMeta = serde_json::from_str(&content)?;
        Ok(Some(stored.sheets))
    }

    /// Persist a meta document as pretty JSON.
    pub fn save(path: impl AsRef<Path>, meta: &MetaMap) -> CompileResult<()> {
        let stored = StoredMeta {
            generated_at: chrono::Utc::now().to_rfc3339(),
            sheets: meta.clone(),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(ty: &str) -> MetaMap {
        let mut map = MetaMap::new();
        map.insert(
            "items".to_string(),
            SheetMeta {
                ty: "dict".to_string(),
                filename: "items".to_string(),
                primary_key: "id".to_string(),
                fields: vec![
                    FieldMeta { name: "id".into(), ty: ty.into() },
                    FieldMeta { name: "name".into(), ty: "string".into() },
                ],
            },
        );
        map
    }

    #[test]
    fn test_diff_reports_changed_field_type() {
        let items = diff(&meta_with("int"), &meta_with("string"));
        assert_eq!(items, vec!["items.id"]);
    }

    #[test]
    fn test_diff_ignores_identical_meta() {
        assert!(diff(&meta_with("int"), &meta_with("int")).is_empty());
    }

    #[test]
    fn test_diff_ignores_new_sheets_and_fields() {
        let prior = MetaMap::new();
        assert!(diff(&prior, &meta_with("int")).is_empty());

        let mut current = meta_with("int");
        current
            .get_mut("items")
            .unwrap()
            .fields
            .push(FieldMeta { name: "grade".into(), ty: "int".into() });
        assert!(diff(&meta_with("int"), &current).is_empty());
    }

    #[test]
    fn test_store_round_trip() {
        let dir = std::env::temp_dir().join("tabforge-meta-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meta.json");

        let meta = meta_with("int");
        MetaStore::save(&path, &meta).unwrap();
        let loaded = MetaStore::load(&path).unwrap().unwrap();
        assert_eq!(loaded, meta);

        fs::remove_file(&path).unwrap();
        assert!(MetaStore::load(&path).unwrap().is_none());
    }
}
