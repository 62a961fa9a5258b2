use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;
use time::Date;

use crate::app::input::{self, ValidationError};
use crate::backup::{self, ExportError, ImportError};
use crate::storage::{Item, Store};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

/// Borrows the store for one handler invocation. Every method that changes
/// the list has already persisted it when it returns.
pub struct ActionDispatcher<'a> {
    store: &'a mut Store,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(store: &'a mut Store) -> Self {
        Self { store }
    }

    pub fn submit(
        &mut self,
        text: &str,
        deadline: &str,
        is_permanent: bool,
    ) -> Result<Item, SubmitError> {
        let submission = input::validate(text, deadline, is_permanent)?;
        let id = self.store.next_id();
        let item = match submission.deadline {
            Some(deadline) if !submission.is_permanent => {
                Item::dated(id, submission.text, deadline)
            }
            _ => Item::permanent(id, submission.text),
        };
        self.store.push(item.clone())?;
        tracing::info!(id = item.id, permanent = item.is_permanent, "added neta");
        Ok(item)
    }

    pub fn delete(&mut self, id: i64) -> Result<Option<Item>> {
        let removed = self.store.remove(id)?;
        if removed.is_some() {
            tracing::info!(id, "deleted neta");
        }
        Ok(removed)
    }

    pub fn sweep(&mut self, today: Date) -> Result<usize> {
        let removed = self.store.sweep(today)?;
        if removed > 0 {
            tracing::info!(removed, %today, "swept expired neta");
        }
        Ok(removed)
    }

    pub fn export(&self, dir: &Path, date: Date) -> Result<PathBuf, ExportError> {
        backup::export_to_dir(self.store.items(), dir, date)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<usize, ImportError> {
        let records = backup::read_import(path)?;
        let count = self.store.append(records)?;
        tracing::info!(count, path = %path.display(), "imported neta backup");
        Ok(count)
    }
}
