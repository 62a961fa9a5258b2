//! Manual backup of the whole list as a JSON file, and merge-on-import.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use time::Date;

use crate::storage::Item;

const BACKUP_PREFIX: &str = "neta_backup_";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("There is nothing to export.")]
    Empty,
    #[error("could not encode backup: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not write backup {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read the file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("The file is not in the expected format (a JSON list).")]
    InvalidFormat,
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

pub fn backup_file_name(date: Date) -> String {
    format!("{BACKUP_PREFIX}{date}.json")
}

pub fn export_json(items: &[Item]) -> Result<String, ExportError> {
    if items.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(serde_json::to_string_pretty(items)?)
}

/// Writes `neta_backup_<date>.json` into `dir`, replacing a same-day backup.
pub fn export_to_dir(items: &[Item], dir: &Path, date: Date) -> Result<PathBuf, ExportError> {
    let json = export_json(items)?;
    let path = dir.join(backup_file_name(date));
    fs::create_dir_all(dir).map_err(|source| ExportError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(count = items.len(), path = %path.display(), "exported neta backup");
    Ok(path)
}

/// Parses a backup into records without validating them. Each element is
/// lifted with [`Item::from_value`], so non-string `text` or `deadline`
/// values come back as their JSON text. Ids are reset to zero; the store
/// assigns fresh ones when it appends them.
pub fn parse_import(contents: &str) -> Result<Vec<Item>, ImportError> {
    let value: Value = serde_json::from_str(contents)?;
    let Value::Array(entries) = value else {
        return Err(ImportError::InvalidFormat);
    };
    Ok(entries
        .into_iter()
        .map(|entry| Item {
            id: 0,
            ..Item::from_value(entry)
        })
        .collect())
}

pub fn read_import(path: &Path) -> Result<Vec<Item>, ImportError> {
    let contents = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_import(&contents)
}
