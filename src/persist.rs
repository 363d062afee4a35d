//! Persisted table configuration and the key-value store port behind it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::column::{Column, SortDirection};
use crate::pagination::Pagination;

/// Opaque key-value store behind table persistence.
///
/// The engine defines the blob shape only; where blobs live is the
/// embedder's business. Implementations are best-effort and must swallow
/// their own failures: a table must come up with defaults rather than fail
/// because its stored configuration is gone.
pub trait ConfigStore {
    /// Returns the blob stored under `id`, if any.
    fn load(&self, id: &str) -> Option<String>;

    /// Stores `blob` under `id`.
    fn save(&self, id: &str, blob: &str);
}

impl<S: ConfigStore + ?Sized> ConfigStore for Rc<S> {
    fn load(&self, id: &str) -> Option<String> {
        (**self).load(id)
    }

    fn save(&self, id: &str, blob: &str) {
        (**self).save(id, blob)
    }
}

/// In-memory store for tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, id: &str) -> Option<String> {
        self.blobs.borrow().get(id).cloned()
    }

    fn save(&self, id: &str, blob: &str) {
        self.blobs
            .borrow_mut()
            .insert(id.to_string(), blob.to_string());
    }
}

/// Directory-backed store: one JSON file per table id.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, id: &str) -> PathBuf {
        // Table ids may contain separators; keep each blob a direct child.
        let name: String = id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl ConfigStore for FileStore {
    fn load(&self, id: &str) -> Option<String> {
        match fs::read_to_string(self.path(id)) {
            Ok(blob) => Some(blob),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, id, "failed to read table config");
                None
            }
        }
    }

    fn save(&self, id: &str, blob: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(error = %e, id, "failed to create config directory");
            return;
        }
        if let Err(e) = fs::write(self.path(id), blob) {
            warn!(error = %e, id, "failed to write table config");
        }
    }
}

/// Persisted per-column state. Absent fields leave the column's own default
/// in place when the blob is merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub selected: Option<bool>,
    #[serde(default)]
    pub sort: Option<SortDirection>,
}

/// Persisted pagination state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// The persistence blob: per-column state in column-definition order plus
/// the page size. JSON-encoded; everything else about the table (filters,
/// search, selection, current page) is deliberately not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub pagination: PageConfig,
}

impl TableConfig {
    pub(crate) fn snapshot<T>(columns: &[Column<T>], pagination: &Pagination) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| ColumnConfig {
                    selected: Some(c.selected),
                    sort: Some(c.sort),
                })
                .collect(),
            pagination: PageConfig {
                page_size: Some(pagination.page_size()),
            },
        }
    }

    /// Merges the blob onto current state, positionally for columns.
    /// Entries beyond the defined columns are ignored.
    pub(crate) fn apply<T>(&self, columns: &mut [Column<T>], pagination: &mut Pagination) {
        for (column, config) in columns.iter_mut().zip(&self.columns) {
            if let Some(selected) = config.selected {
                column.selected = selected;
            }
            if let Some(sort) = config.sort {
                column.sort = sort;
            }
        }
        if let Some(size) = self.pagination.page_size {
            pagination.set_page_size(size);
        }
    }

    pub fn encode(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(error = %e, "failed to encode table config");
                None
            }
        }
    }

    /// Decodes a stored blob; malformed data is discarded, never fatal.
    pub fn decode(blob: &str) -> Option<Self> {
        match serde_json::from_str(blob) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "discarding malformed table config");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnSpec;
    use crate::pagination::DEFAULT_PAGE_SIZES;

    fn columns() -> Vec<Column<()>> {
        vec![
            Column::from_spec(ColumnSpec::new("name", "Name")).0,
            Column::from_spec(ColumnSpec::new("country", "Country")).0,
        ]
    }

    fn pager() -> Pagination {
        Pagination::new(10, DEFAULT_PAGE_SIZES.to_vec())
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let mut columns = columns();
        columns[1].selected = false;
        columns[0].sort = SortDirection::Desc;
        let config = TableConfig::snapshot(&columns, &pager());

        let blob = config.encode().unwrap();
        let decoded = TableConfig::decode(&blob).unwrap();
        assert_eq!(decoded, config);

        let mut fresh = self::columns();
        let mut pager = pager();
        decoded.apply(&mut fresh, &mut pager);
        assert!(!fresh[1].selected);
        assert_eq!(fresh[0].sort, SortDirection::Desc);
        assert_eq!(pager.page_size(), 10);
    }

    #[test]
    fn partial_blobs_merge_onto_defaults() {
        let config = TableConfig::decode(r#"{"pagination":{"page_size":25}}"#).unwrap();
        let mut columns = columns();
        let mut pager = pager();
        config.apply(&mut columns, &mut pager);
        assert_eq!(pager.page_size(), 25);
        assert!(columns[0].selected);

        let config =
            TableConfig::decode(r#"{"columns":[{"sort":"asc"}]}"#).unwrap();
        config.apply(&mut columns, &mut pager);
        assert_eq!(columns[0].sort, SortDirection::Asc);
        assert!(columns[0].selected);
        assert_eq!(pager.page_size(), 25);
    }

    #[test]
    fn extra_column_entries_are_ignored() {
        let config = TableConfig::decode(
            r#"{"columns":[{"selected":false},{"selected":false},{"selected":false}]}"#,
        )
        .unwrap();
        let mut columns = columns();
        let mut pager = pager();
        config.apply(&mut columns, &mut pager);
        assert!(!columns[0].selected);
        assert!(!columns[1].selected);
    }

    #[test]
    fn malformed_blobs_are_discarded() {
        assert!(TableConfig::decode("not json").is_none());
        assert!(TableConfig::decode(r#"{"columns":42}"#).is_none());
        assert!(TableConfig::decode(r#"{"pagination":{"page_size":"ten"}}"#).is_none());
    }

    #[test]
    fn zero_page_size_in_a_blob_is_rejected() {
        let config = TableConfig::decode(r#"{"pagination":{"page_size":0}}"#).unwrap();
        let mut columns = columns();
        let mut pager = pager();
        config.apply(&mut columns, &mut pager);
        assert_eq!(pager.page_size(), 10);
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("t").is_none());
        store.save("t", "blob");
        assert_eq!(store.load("t").as_deref(), Some("blob"));
        store.save("t", "blob2");
        assert_eq!(store.load("t").as_deref(), Some("blob2"));
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load("users").is_none());
        store.save("users", r#"{"columns":[]}"#);
        assert_eq!(store.load("users").as_deref(), Some(r#"{"columns":[]}"#));
    }

    #[test]
    fn file_store_sanitizes_separators_in_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save("app/users", "blob");
        assert_eq!(store.load("app/users").as_deref(), Some("blob"));
        assert!(dir.path().join("app_users.json").exists());
    }
}
