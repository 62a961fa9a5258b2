use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Date;

use crate::config::{ConfigPaths, StorageOptions};
use crate::deadline;

mod ids;

pub use ids::IdGenerator;

pub const STORE_FILE_NAME: &str = "neta_db.json";
const STORE_TMP_EXTENSION: &str = "json.tmp";
const STORE_BACKUP_EXTENSION: &str = "json.bak";

/// One neta. Serialized with the camelCase field names of the persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub is_permanent: bool,
    /// Fields we do not model, kept so imported records round-trip untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    pub fn dated(id: i64, text: impl Into<String>, deadline: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            deadline: Some(deadline.into()),
            is_permanent: false,
            extra: Map::new(),
        }
    }

    pub fn permanent(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            deadline: None,
            is_permanent: true,
            extra: Map::new(),
        }
    }

    /// Lifts one JSON element into an item without validating it.
    ///
    /// `id` is kept only when it is a positive integer; anything else comes
    /// back as `0` for the store to reissue. `text` and `deadline` are
    /// coerced to strings (`42` becomes `"42"`, `null` and missing fields
    /// become empty), and `isPermanent` follows JavaScript truthiness. A
    /// non-object element becomes an empty record. Every other field rides
    /// along in `extra` unchanged.
    pub fn from_value(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let id = fields.remove("id").as_ref().and_then(integral_id).unwrap_or(0);
        let text = match fields.remove("text") {
            Some(Value::String(text)) => text,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let deadline = match fields.remove("deadline") {
            Some(Value::String(deadline)) => Some(deadline),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let is_permanent = fields.remove("isPermanent").is_some_and(|flag| truthy(&flag));
        Self {
            id,
            text,
            deadline,
            is_permanent,
            extra: fields,
        }
    }

    pub fn deadline_date(&self) -> Option<Date> {
        if self.is_permanent {
            return None;
        }
        self.deadline.as_deref().and_then(deadline::parse_deadline)
    }
}

/// Owns the in-memory list and mirrors it to a single JSON file.
///
/// Every mutating method writes the whole list back before returning, so a
/// caller that re-renders afterwards never shows state that a reload would
/// lose.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    items: Vec<Item>,
    ids: IdGenerator,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut items = load(&path);
        let mut ids = IdGenerator::seeded(&items);
        let reissued = reissue_unusable_ids(&mut items, &mut ids);
        tracing::debug!(count = items.len(), path = %path.display(), "loaded neta store");
        if reissued > 0 {
            // Persist right away so ids stay stable between runs.
            match save(&path, &items) {
                Ok(()) => tracing::info!(reissued, "reissued duplicate or non-integer neta ids"),
                Err(err) => tracing::warn!(?err, reissued, "could not persist reissued neta ids"),
            }
        }
        Self { path, items, ids }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn next_id(&mut self) -> i64 {
        self.ids.next_id()
    }

    pub fn save(&self) -> Result<()> {
        save(&self.path, &self.items)
    }

    pub fn push(&mut self, item: Item) -> Result<()> {
        self.ids.observe(item.id);
        self.items.push(item);
        self.save()
    }

    pub fn remove(&mut self, id: i64) -> Result<Option<Item>> {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(None);
        };
        let removed = self.items.remove(index);
        self.save()?;
        Ok(Some(removed))
    }

    /// Drops expired dated items. Writes only when something was removed.
    pub fn sweep(&mut self, today: Date) -> Result<usize> {
        let before = self.items.len();
        let kept = deadline::sweep(std::mem::take(&mut self.items), today);
        self.items = kept;
        let removed = before - self.items.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Appends records under freshly issued ids.
    pub fn append(&mut self, records: Vec<Item>) -> Result<usize> {
        let count = records.len();
        for mut record in records {
            record.id = self.ids.next_id();
            self.items.push(record);
        }
        self.save()?;
        Ok(count)
    }
}

/// Gives every item whose id is not positive, or repeats an earlier one, a
/// fresh id. Returns how many were changed.
fn reissue_unusable_ids(items: &mut [Item], ids: &mut IdGenerator) -> usize {
    let mut seen = HashSet::with_capacity(items.len());
    let mut reissued = 0;
    for item in items.iter_mut() {
        if item.id <= 0 || !seen.insert(item.id) {
            item.id = ids.next_id();
            seen.insert(item.id);
            reissued += 1;
        }
    }
    reissued
}

fn integral_id(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(id) = number.as_i64() {
        return Some(id);
    }
    let float = number.as_f64()?;
    let in_range = float >= i64::MIN as f64 && float < i64::MAX as f64;
    (float.fract() == 0.0 && in_range).then_some(float as i64)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<Store> {
    let store_path = if storage.store_path.as_os_str().is_empty() {
        paths.store_path.clone()
    } else {
        storage.store_path.clone()
    };
    if let Some(parent) = store_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    Ok(Store::open(store_path))
}

/// Reads the persisted list. A missing file is an empty list; so is a file
/// that cannot be read or is not a JSON array, in which case a copy is kept
/// next to it before the next save replaces it. Records inside the array are
/// lifted one by one, so a single odd record never drops the rest.
pub fn load(path: &Path) -> Vec<Item> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!(?err, path = %path.display(), "unreadable neta store, starting empty");
            keep_unreadable_copy(path);
            return Vec::new();
        }
    };
    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Array(entries)) => entries.into_iter().map(Item::from_value).collect(),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "neta store is not a JSON array, starting empty");
            keep_unreadable_copy(path);
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(?err, path = %path.display(), "unparseable neta store, starting empty");
            keep_unreadable_copy(path);
            Vec::new()
        }
    }
}

fn keep_unreadable_copy(path: &Path) {
    let backup = path.with_extension(STORE_BACKUP_EXTENSION);
    match fs::copy(path, &backup) {
        Ok(_) => tracing::warn!(backup = %backup.display(), "kept a copy of the unreadable store"),
        Err(err) => tracing::warn!(?err, backup = %backup.display(), "could not copy the unreadable store"),
    }
}

pub fn save(path: &Path, items: &[Item]) -> Result<()> {
    let json = serde_json::to_vec(items).context("serialising neta list")?;
    let tmp_path = path.with_extension(STORE_TMP_EXTENSION);
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temporary store {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("atomically persisting store {}", path.display()))?;
    tracing::debug!(count = items.len(), path = %path.display(), "saved neta store");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::date;

    fn store_in(temp: &TempDir) -> Store {
        Store::open(temp.path().join(STORE_FILE_NAME))
    }

    #[test]
    fn missing_file_loads_as_empty_list() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        assert!(store.is_empty());
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn unparseable_file_loads_as_empty_list() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        fs::write(&path, "{not json")?;
        assert!(load(&path).is_empty());
        let backup = path.with_extension(STORE_BACKUP_EXTENSION);
        assert_eq!(fs::read_to_string(&backup)?, "{not json");

        fs::write(&path, r#"{"text":"object, not array"}"#)?;
        assert!(load(&path).is_empty());
        assert_eq!(fs::read_to_string(&backup)?, r#"{"text":"object, not array"}"#);
        Ok(())
    }

    #[test]
    fn fractional_id_does_not_drop_the_rest_of_the_store() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        fs::write(
            &path,
            r#"[
                {"id":1,"text":"first","deadline":null,"isPermanent":true},
                {"id":1700000000000.5,"text":"imported","deadline":"2999-01-01","isPermanent":false}
            ]"#,
        )?;
        let mut store = Store::open(&path);
        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].id, 1);
        let reissued = store.items()[1].id;
        assert!(reissued > 1);

        let id = store.next_id();
        store.push(Item::permanent(id, "new"))?;
        let reloaded = store_in(&temp);
        let texts: Vec<&str> = reloaded.items().iter().map(|item| item.text.as_str()).collect();
        assert_eq!(texts, ["first", "imported", "new"]);
        assert_eq!(reloaded.items()[1].id, reissued);
        assert!(!path.with_extension(STORE_BACKUP_EXTENSION).exists());
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_reissued_on_open() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        fs::write(
            &path,
            r#"[{"id":5,"text":"a","isPermanent":true},{"id":5,"text":"b","isPermanent":true},{"text":"c","isPermanent":true}]"#,
        )?;
        let store = Store::open(&path);
        let ids: HashSet<i64> = store.items().iter().map(|item| item.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.items()[0].id, 5);
        assert_eq!(store_in(&temp).items(), store.items());
        Ok(())
    }

    #[test]
    fn push_persists_before_returning() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        let id = store.next_id();
        store.push(Item::dated(id, "buy milk", "2025-01-01"))?;

        let reloaded = store_in(&temp);
        assert_eq!(reloaded.items(), store.items());
        assert!(!store.path().with_extension(STORE_TMP_EXTENSION).exists());
        Ok(())
    }

    #[test]
    fn persisted_shape_uses_camel_case_and_null_deadline() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        store.push(Item::permanent(7, "keep forever"))?;

        let raw: Value = serde_json::from_slice(&fs::read(store.path())?)?;
        assert_eq!(
            raw,
            serde_json::json!([
                {"id": 7, "text": "keep forever", "deadline": null, "isPermanent": true}
            ])
        );
        Ok(())
    }

    #[test]
    fn remove_unknown_id_is_a_no_op() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        store.push(Item::permanent(1, "a"))?;
        assert!(store.remove(99)?.is_none());
        assert_eq!(store.len(), 1);

        let removed = store.remove(1)?.expect("item removed");
        assert_eq!(removed.text, "a");
        assert!(store_in(&temp).is_empty());
        Ok(())
    }

    #[test]
    fn sweep_skips_write_when_nothing_expired() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        store.items.push(Item::dated(1, "future", "2030-05-01"));
        assert_eq!(store.sweep(date!(2030 - 01 - 01))?, 0);
        assert!(!store.path().exists());

        store.items.push(Item::dated(2, "past", "2029-12-31"));
        assert_eq!(store.sweep(date!(2030 - 01 - 01))?, 1);
        assert_eq!(store_in(&temp).len(), 1);
        Ok(())
    }

    #[test]
    fn append_reissues_ids_above_existing_ones() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        store.push(Item::permanent(i64::MAX - 10, "existing"))?;
        let imported = vec![
            Item::permanent(i64::MAX - 10, "dup"),
            Item::permanent(i64::MAX - 10, "dup"),
        ];
        assert_eq!(store.append(imported)?, 2);

        let mut ids: Vec<i64> = store.items().iter().map(|item| item.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        Ok(())
    }

    #[test]
    fn append_after_largest_possible_id_still_issues_unique_ids() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut store = store_in(&temp);
        store.push(Item::permanent(i64::MAX, "existing"))?;
        let imported = vec![Item::permanent(0, "one"), Item::permanent(0, "two")];
        assert_eq!(store.append(imported)?, 2);

        let ids: HashSet<i64> = store.items().iter().map(|item| item.id).collect();
        assert_eq!(ids.len(), 3);
        Ok(())
    }

    #[test]
    fn unknown_fields_survive_a_save_cycle() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        fs::write(
            &path,
            r#"[{"id":3,"text":"t","deadline":"2030-01-01","isPermanent":false,"color":"red"}]"#,
        )?;
        let store = Store::open(&path);
        store.save()?;
        let raw: Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(raw[0]["color"], "red");
        Ok(())
    }
}
