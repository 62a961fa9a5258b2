use time::format_description::OwnedFormatItem;
use time::Date;

use crate::app::input::InputForm;
use crate::storage::Item;
use crate::ui::rows::{display_rows, DisplayRow, RowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Form,
    List,
}

#[derive(Debug, Clone)]
pub struct DeleteOverlay {
    pub item_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportPathOverlay {
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    /// Confirmation naming the item about to be deleted.
    ConfirmDelete(DeleteOverlay),
    /// Warning that imports append to a non-empty list.
    ConfirmImport,
    /// Stand-in for the file picker.
    ImportPath(ImportPathOverlay),
    /// Blocking notice dismissed with any key.
    Notice(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub total: usize,
    pub expired: usize,
    pub permanent: usize,
}

pub struct AppState {
    pub form: InputForm,
    pub focus: FocusPane,
    pub selected: usize,
    pub status_message: Option<String>,
    rows: Vec<DisplayRow>,
    overlay: Option<OverlayState>,
    deadline_format: OwnedFormatItem,
}

impl AppState {
    pub fn new(deadline_format: OwnedFormatItem) -> Self {
        Self {
            form: InputForm::default(),
            focus: FocusPane::Form,
            selected: 0,
            status_message: None,
            rows: Vec::new(),
            overlay: None,
            deadline_format,
        }
    }

    /// Rebuilds every row from the list. Keeps the cursor on the same item
    /// when it still exists.
    pub fn render_from(&mut self, items: &[Item], today: Date) {
        let selected_id = self.selected_row().map(|row| row.id);
        self.rows = display_rows(items, today, &self.deadline_format);
        if let Some(id) = selected_id {
            if let Some(index) = self.rows.iter().position(|row| row.id == id) {
                self.selected = index;
                return;
            }
        }
        self.clamp_selection();
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn counts(&self) -> RowCounts {
        RowCounts {
            total: self.rows.len(),
            expired: self
                .rows
                .iter()
                .filter(|row| row.status == RowStatus::Expired)
                .count(),
            permanent: self
                .rows
                .iter()
                .filter(|row| row.status == RowStatus::Permanent)
                .count(),
        }
    }

    pub fn selected_row(&self) -> Option<&DisplayRow> {
        self.rows.get(self.selected)
    }

    pub fn select_id(&mut self, id: i64) {
        if let Some(index) = self.rows.iter().position(|row| row.id == id) {
            self.selected = index;
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            self.selected = 0;
            return;
        }
        let len = self.rows.len() as isize;
        let next = (self.selected as isize + delta).rem_euclid(len);
        self.selected = next as usize;
    }

    fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Form => FocusPane::List,
            FocusPane::List => FocusPane::Form,
        };
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn notify<S: Into<String>>(&mut self, message: S) {
        self.overlay = Some(OverlayState::Notice(message.into()));
    }

    pub fn open_delete(&mut self) -> bool {
        let Some(row) = self.selected_row() else {
            return false;
        };
        self.overlay = Some(OverlayState::ConfirmDelete(DeleteOverlay {
            item_id: row.id,
            text: row.text.clone(),
        }));
        true
    }

    pub fn delete_overlay(&self) -> Option<&DeleteOverlay> {
        match self.overlay.as_ref()? {
            OverlayState::ConfirmDelete(draft) => Some(draft),
            _ => None,
        }
    }

    /// Starts an import; asks first when the list already has items.
    pub fn open_import(&mut self, list_is_empty: bool) {
        self.overlay = Some(if list_is_empty {
            OverlayState::ImportPath(ImportPathOverlay::default())
        } else {
            OverlayState::ConfirmImport
        });
    }

    pub fn confirm_import(&mut self) {
        if matches!(self.overlay, Some(OverlayState::ConfirmImport)) {
            self.overlay = Some(OverlayState::ImportPath(ImportPathOverlay::default()));
        }
    }

    pub fn import_overlay(&self) -> Option<&ImportPathOverlay> {
        match self.overlay.as_ref()? {
            OverlayState::ImportPath(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn import_overlay_mut(&mut self) -> Option<&mut ImportPathOverlay> {
        match self.overlay.as_mut()? {
            OverlayState::ImportPath(draft) => Some(draft),
            _ => None,
        }
    }
}
