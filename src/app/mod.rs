use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::backup::{ExportError, ImportError};
use crate::config::AppConfig;
use crate::deadline::{self, SweepSchedule};
use crate::storage::Store;
use crate::ui;

pub mod actions;
pub mod input;
pub mod state;

pub use actions::{ActionDispatcher, SubmitError};
pub use input::{FormField, InputForm, ValidationError};
pub use state::{AppState, FocusPane, OverlayState};

const MAX_PATH_LEN: usize = 4096;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ToggleFocus,
    DeleteSelected,
    Export,
    Import,
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: Store,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    sweep: SweepSchedule,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: Store) -> Result<Self> {
        let state = AppState::new(config.deadline_display_format());
        let sweep = SweepSchedule::new(config.sweep_interval());
        let mut app = Self {
            config,
            store,
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(250),
            sweep,
        };
        // Catch up on whatever expired while the app was closed.
        app.run_sweep();
        app.render_list();
        Ok(app)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let palette = self.config.theme.palette();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state, &palette);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.sweep.due() {
            self.run_sweep();
        }
    }

    fn render_list(&mut self) {
        self.state.render_from(self.store.items(), deadline::today());
    }

    fn run_sweep(&mut self) {
        match ActionDispatcher::new(&mut self.store).sweep(deadline::today()) {
            Ok(0) => {}
            Ok(removed) => {
                self.render_list();
                self.state
                    .set_status_message(Some(format!("Removed {removed} expired neta")));
            }
            Err(err) => {
                tracing::error!(?err, "periodic sweep failed");
                self.state
                    .set_status_message(Some("Expiry sweep failed; see logs"));
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.handle_overlay_key(key) {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            let action = match key.code {
                KeyCode::Char('e') => Some(Action::Export),
                KeyCode::Char('o') => Some(Action::Import),
                KeyCode::Char('q') => Some(Action::Quit),
                _ => None,
            };
            if let Some(action) = action {
                self.handle_action(action);
            }
            return;
        }

        match self.state.focus {
            FocusPane::Form => self.handle_form_key(key),
            FocusPane::List => {
                let action = match key.code {
                    KeyCode::Char('q') => Some(Action::Quit),
                    KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
                    KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
                    KeyCode::Tab | KeyCode::Esc | KeyCode::Char('a') => Some(Action::ToggleFocus),
                    KeyCode::Char('d') | KeyCode::Delete => Some(Action::DeleteSelected),
                    KeyCode::Char('x') => Some(Action::Export),
                    KeyCode::Char('i') => Some(Action::Import),
                    _ => None,
                };
                if let Some(action) = action {
                    self.handle_action(action);
                }
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ToggleFocus => self.state.toggle_focus(),
            Action::DeleteSelected => {
                if !self.state.open_delete() {
                    self.state.set_status_message(Some("No neta selected"));
                }
            }
            Action::Export => self.handle_export(),
            Action::Import => self.state.open_import(self.store.is_empty()),
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab => self.state.form.next_field(),
            KeyCode::BackTab => self.state.form.previous_field(),
            KeyCode::Esc | KeyCode::Down => self.state.toggle_focus(),
            KeyCode::Backspace => self.state.form.pop_char(),
            KeyCode::Char(ch)
                if !key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) =>
            {
                self.state.form.push_char(ch);
            }
            _ => {}
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::Notice(_)) => {
                self.state.close_overlay();
                true
            }
            Some(OverlayState::ConfirmDelete(_)) => {
                match key.code {
                    KeyCode::Enter | KeyCode::Char('y') => self.submit_delete(),
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::ConfirmImport) => {
                match key.code {
                    KeyCode::Enter | KeyCode::Char('y') => self.state.confirm_import(),
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Import canceled"));
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::ImportPath(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Import canceled"));
                    }
                    KeyCode::Enter => self.submit_import(),
                    KeyCode::Backspace => {
                        if let Some(draft) = self.state.import_overlay_mut() {
                            draft.path.pop();
                        }
                    }
                    KeyCode::Char(ch)
                        if !key.modifiers.intersects(
                            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                        ) =>
                    {
                        if let Some(draft) = self.state.import_overlay_mut() {
                            if draft.path.len() < MAX_PATH_LEN {
                                draft.path.push(ch);
                            }
                        }
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn submit_form(&mut self) {
        let form = self.state.form.clone();
        let result = ActionDispatcher::new(&mut self.store).submit(
            &form.text,
            &form.deadline,
            form.permanent,
        );
        match result {
            Ok(item) => {
                self.render_list();
                self.state.select_id(item.id);
                self.state.form.reset();
                self.state.set_status_message(Some("Neta added"));
            }
            Err(SubmitError::Invalid(err)) => {
                self.state.notify(err.to_string());
            }
            Err(SubmitError::Persist(err)) => {
                tracing::error!(?err, "failed to add neta");
                self.render_list();
                self.state
                    .set_status_message(Some("Failed to save neta; see logs"));
            }
        }
    }

    fn submit_delete(&mut self) {
        let Some(item_id) = self.state.delete_overlay().map(|draft| draft.item_id) else {
            return;
        };
        self.state.close_overlay();
        match ActionDispatcher::new(&mut self.store).delete(item_id) {
            Ok(Some(_)) => {
                self.render_list();
                self.state.set_status_message(Some("Neta deleted"));
            }
            Ok(None) => {
                self.render_list();
                self.state.set_status_message(Some("Neta was already gone"));
            }
            Err(err) => {
                tracing::error!(?err, item_id, "failed to delete neta");
                self.render_list();
                self.state
                    .set_status_message(Some("Failed to delete neta; see logs"));
            }
        }
    }

    fn handle_export(&mut self) {
        let dir = self.config.storage.export_dir.clone();
        let date = OffsetDateTime::now_utc().date();
        match ActionDispatcher::new(&mut self.store).export(&dir, date) {
            Ok(path) => {
                self.state
                    .set_status_message(Some(format!("Exported to {}", path.display())));
            }
            Err(ExportError::Empty) => self.state.notify(ExportError::Empty.to_string()),
            Err(err) => {
                tracing::error!(?err, "export failed");
                self.state.notify(err.to_string());
            }
        }
    }

    fn submit_import(&mut self) {
        let Some(raw) = self.state.import_overlay().map(|draft| draft.path.trim().to_string())
        else {
            return;
        };
        // Closing the prompt empties the path so the same file can be picked again.
        self.state.close_overlay();
        if raw.is_empty() {
            self.state.set_status_message(Some("Import canceled"));
            return;
        }
        let path = PathBuf::from(raw);
        match ActionDispatcher::new(&mut self.store).import_file(&path) {
            Ok(count) => {
                self.render_list();
                self.state
                    .notify(format!("Imported {count} neta from {}", path.display()));
            }
            Err(ImportError::Persist(err)) => {
                tracing::error!(?err, "failed to persist imported neta");
                self.render_list();
                self.state
                    .set_status_message(Some("Imported, but saving failed; see logs"));
            }
            Err(err) => {
                tracing::debug!(%err, path = %path.display(), "import rejected");
                self.state.notify(err.to_string());
            }
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Item, STORE_FILE_NAME};
    use crossterm::event::KeyEventState;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn app_in(temp: &TempDir) -> Result<App> {
        let mut config = AppConfig::default();
        config.storage.export_dir = temp.path().join("backups");
        let store = Store::open(temp.path().join(STORE_FILE_NAME));
        App::new(Arc::new(config), store)
    }

    #[test]
    fn startup_sweeps_items_that_expired_while_closed() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        crate::storage::save(
            &path,
            &[
                Item::dated(1, "ancient", "2000-01-01"),
                Item::permanent(2, "forever"),
            ],
        )?;
        let app = app_in(&temp)?;
        assert_eq!(app.store().len(), 1);
        assert_eq!(crate::storage::load(&path).len(), 1);
        assert_eq!(app.state().rows().len(), 1);
        Ok(())
    }

    #[test]
    fn due_tick_sweeps_and_rerenders() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        let id = app.store.next_id();
        app.store.push(Item::dated(id, "late", "2000-01-01"))?;
        app.store.push(Item::permanent(id + 1, "forever"))?;
        app.render_list();
        assert_eq!(app.state().rows().len(), 2);

        app.sweep = SweepSchedule::new(Duration::ZERO);
        app.on_tick();

        assert_eq!(app.store().len(), 1);
        assert_eq!(crate::storage::load(app.store().path()).len(), 1);
        let texts: Vec<&str> = app.state().rows().iter().map(|row| row.text.as_str()).collect();
        assert_eq!(texts, ["forever"]);
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("Removed 1 expired neta")
        );
        Ok(())
    }

    #[test]
    fn idle_tick_leaves_list_and_file_alone() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        let id = app.store.next_id();
        app.store.push(Item::dated(id, "late", "2000-01-01"))?;
        app.render_list();
        let before = std::fs::read(app.store().path())?;

        app.on_tick();

        assert_eq!(app.store().len(), 1);
        assert_eq!(app.state().rows().len(), 1);
        assert_eq!(std::fs::read(app.store().path())?, before);
        assert!(app.state().status_message.is_none());
        Ok(())
    }

    #[test]
    fn startup_survives_a_sweep_that_cannot_save() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join(STORE_FILE_NAME);
        crate::storage::save(
            &path,
            &[
                Item::dated(1, "ancient", "2000-01-01"),
                Item::permanent(2, "forever"),
            ],
        )?;
        // A directory where the temporary file goes makes every save fail.
        std::fs::create_dir(path.with_extension("json.tmp"))?;

        let app = app_in(&temp)?;
        assert_eq!(app.store().len(), 1);
        assert_eq!(app.state().rows().len(), 1);
        assert_eq!(
            app.state().status_message.as_deref(),
            Some("Expiry sweep failed; see logs")
        );
        Ok(())
    }

    #[test]
    fn typing_and_enter_adds_a_permanent_item_and_resets_form() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        type_text(&mut app, "buy milk");
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.state().form.permanent);
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.store().len(), 1);
        assert_eq!(app.state().rows()[0].text, "buy milk");
        assert!(app.state().form.text.is_empty());
        assert!(!app.state().form.permanent);
        assert_eq!(app.state().form.field, FormField::Text);
        Ok(())
    }

    #[test]
    fn invalid_submission_raises_notice_and_keeps_form() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        type_text(&mut app, "x");
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.state().overlay(), Some(OverlayState::Notice(_))));
        assert_eq!(app.state().form.text, "x");
        assert!(app.store().is_empty());

        app.handle_key(key(KeyCode::Char('z')));
        assert!(app.state().overlay().is_none());
        assert_eq!(app.state().form.text, "x");
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        ActionDispatcher::new(&mut app.store).submit("keep", "", true)?;
        app.render_list();
        app.state.toggle_focus();

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.store().len(), 1);

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Enter));
        assert!(app.store().is_empty());
        assert!(app.state().is_empty());
        Ok(())
    }

    #[test]
    fn export_of_empty_list_shows_notice_without_file() -> Result<()> {
        let temp = TempDir::new()?;
        let mut app = app_in(&temp)?;
        app.handle_export();
        assert!(matches!(app.state().overlay(), Some(OverlayState::Notice(_))));
        assert!(!temp.path().join("backups").exists());
        Ok(())
    }

    #[test]
    fn import_prompt_confirms_merge_then_reads_path() -> Result<()> {
        let temp = TempDir::new()?;
        let backup = temp.path().join("in.json");
        std::fs::write(&backup, r#"[{"text":"imported","deadline":null,"isPermanent":true}]"#)?;
        let mut app = app_in(&temp)?;
        ActionDispatcher::new(&mut app.store).submit("mine", "", true)?;

        app.handle_action(Action::Import);
        assert!(matches!(app.state().overlay(), Some(OverlayState::ConfirmImport)));
        app.handle_key(key(KeyCode::Char('y')));
        type_text(&mut app, &backup.display().to_string());
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.store().len(), 2);
        assert!(matches!(app.state().overlay(), Some(OverlayState::Notice(_))));

        app.handle_key(key(KeyCode::Enter));
        app.handle_action(Action::Import);
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.state().import_overlay().map(|o| o.path.as_str()), Some(""));
        Ok(())
    }
}
