use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::input::{FormField, InputForm};
use crate::app::state::{AppState, FocusPane, OverlayState};
use crate::config::themes::Palette;

pub mod rows;

use self::rows::{DisplayRow, RowStatus, EMPTY_PLACEHOLDER};

const LABEL_WIDTH: usize = 11;

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState, palette: &Palette) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let form_focused = state.focus == FocusPane::Form;
    draw_form(frame, vertical[0], &state.form, form_focused, palette);

    let list_border = if form_focused {
        Style::default()
    } else {
        Style::default().fg(palette.accent)
    };
    let items: Vec<ListItem> = if state.is_empty() {
        vec![ListItem::new(Span::styled(
            EMPTY_PLACEHOLDER,
            Style::default().fg(palette.muted),
        ))]
    } else {
        state
            .rows()
            .iter()
            .map(|row| ListItem::new(row_line(row, palette)))
            .collect()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title("Neta")
                .borders(Borders::ALL)
                .border_style(list_border),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .fg(palette.selection_fg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, vertical[1], list_state);

    let status = Paragraph::new(build_status_line(state, palette))
        .style(Style::default().fg(palette.muted));
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, state, palette);
}

fn draw_form(frame: &mut Frame, area: Rect, form: &InputForm, focused: bool, palette: &Palette) {
    let border = if focused {
        Style::default().fg(palette.accent)
    } else {
        Style::default()
    };
    let field_style = |field: FormField| {
        if focused && form.field == field {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        }
    };
    let cursor = |field: FormField| if focused && form.field == field { "▌" } else { "" };

    let deadline_value = if form.deadline_enabled() {
        Span::styled(
            format!("{}{}", form.deadline, cursor(FormField::Deadline)),
            field_style(FormField::Deadline),
        )
    } else {
        Span::styled("(disabled)", Style::default().fg(palette.muted))
    };
    let checkbox = if form.permanent { "[x]" } else { "[ ]" };

    let lines = vec![
        Line::from(vec![
            Span::styled("Neta", field_style(FormField::Text)),
            Span::raw(pad_to(4)),
            Span::raw(format!("{}{}", form.text, cursor(FormField::Text))),
        ]),
        Line::from(vec![
            Span::styled("Deadline", field_style(FormField::Deadline)),
            Span::raw(pad_to(8)),
            deadline_value,
            Span::styled("  YYYY-MM-DD", Style::default().fg(palette.muted)),
        ]),
        Line::from(vec![
            Span::styled("Permanent", field_style(FormField::Permanent)),
            Span::raw(pad_to(9)),
            Span::styled(
                format!("{checkbox}{}", cursor(FormField::Permanent)),
                field_style(FormField::Permanent),
            ),
        ]),
    ];
    let form_widget = Paragraph::new(lines).block(
        Block::default()
            .title("Add neta")
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(form_widget, area);
}

fn pad_to(used: usize) -> String {
    " ".repeat(LABEL_WIDTH.saturating_sub(used).max(1))
}

fn row_line(row: &DisplayRow, palette: &Palette) -> Line<'static> {
    let (label_style, text_style) = match row.status {
        RowStatus::Upcoming => (
            Style::default().fg(palette.upcoming),
            Style::default().fg(palette.text),
        ),
        RowStatus::Expired => (
            Style::default()
                .fg(palette.expired)
                .add_modifier(Modifier::BOLD),
            Style::default()
                .fg(palette.expired)
                .add_modifier(Modifier::CROSSED_OUT),
        ),
        RowStatus::Permanent => (
            Style::default()
                .fg(palette.permanent)
                .add_modifier(Modifier::ITALIC),
            Style::default().fg(palette.text),
        ),
        RowStatus::InvalidDate => (
            Style::default()
                .fg(palette.invalid)
                .add_modifier(Modifier::ITALIC),
            Style::default().fg(palette.text),
        ),
    };
    let label_width = UnicodeWidthStr::width(row.label.as_str());
    let padding = " ".repeat(12usize.saturating_sub(label_width).max(1));
    Line::from(vec![
        Span::styled(row.label.clone(), label_style),
        Span::raw(padding),
        Span::styled(row.text.clone(), text_style),
    ])
}

fn build_status_line(state: &AppState, palette: &Palette) -> Text<'static> {
    let counts = state.counts();
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, counts.total)
    };
    let focus = match state.focus {
        FocusPane::Form => "Form",
        FocusPane::List => "List",
    };

    let mut spans = vec![
        Span::raw(format!("Total: {} ", counts.total)),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | Focus: "),
        Span::styled(focus, Style::default().add_modifier(Modifier::BOLD)),
    ];
    if counts.expired > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} expired", counts.expired),
            Style::default().fg(palette.expired),
        ));
    }
    if counts.permanent > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} permanent", counts.permanent),
            Style::default().fg(palette.permanent),
        ));
    }
    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(palette.accent),
        ));
    }

    let keys = match state.focus {
        FocusPane::Form => "Tab field • Space toggle permanent • Enter add • Esc list • Ctrl-e export • Ctrl-o import • Ctrl-q quit",
        FocusPane::List => "j/k move • d delete • x export • i import • Tab form • q quit",
    };
    Text::from(vec![
        Line::from(spans),
        Line::from(vec![
            Span::styled(
                "Keys: ",
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(keys, Style::default().fg(palette.muted)),
        ]),
    ])
}

fn render_overlay(frame: &mut Frame, state: &AppState, palette: &Palette) {
    let Some(overlay) = state.overlay() else {
        return;
    };
    let (title, lines, border) = match overlay {
        OverlayState::Notice(message) => (
            "Notice",
            vec![
                Line::from(message.clone()),
                Line::from(""),
                hint_line("Press any key", palette),
            ],
            palette.accent,
        ),
        OverlayState::ConfirmDelete(draft) => (
            "Delete neta",
            vec![
                Line::from(format!("Delete \"{}\"?", draft.text)),
                Line::from(""),
                hint_line("Enter/y delete • Esc/n cancel", palette),
            ],
            palette.expired,
        ),
        OverlayState::ConfirmImport => (
            "Import",
            vec![
                Line::from("Imported neta are added to the current list."),
                Line::from("(The same entries may end up duplicated.)"),
                Line::from(""),
                Line::from("To replace the list instead, delete every neta first."),
                Line::from(""),
                hint_line("Enter/y continue • Esc/n cancel", palette),
            ],
            palette.invalid,
        ),
        OverlayState::ImportPath(draft) => (
            "Import from file",
            vec![
                Line::from("Path to a neta backup (.json):"),
                Line::from(""),
                Line::from(format!("{}▌", draft.path)),
                Line::from(""),
                hint_line("Enter import • Esc cancel", palette),
            ],
            palette.accent,
        ),
    };
    let area = centered_rect(60, 35, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(paragraph, area);
}

fn hint_line(text: &'static str, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().fg(palette.muted)))
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemeName;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::Terminal;
    use time::format_description;
    use time::macros::date;

    use crate::storage::Item;

    fn buffer_text(buffer: &Buffer) -> String {
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    fn draw(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        let palette = ThemeName::Dark.palette();
        let mut list_state = ListState::default();
        terminal
            .draw(|frame| draw_app(frame, state, &mut list_state, &palette))
            .expect("draw");
        buffer_text(terminal.backend().buffer())
    }

    fn state() -> AppState {
        AppState::new(
            format_description::parse_owned::<2>("[year]/[month padding:none]/[day padding:none]")
                .expect("format"),
        )
    }

    #[test]
    fn empty_list_draws_placeholder_row() {
        let screen = draw(&state());
        assert!(screen.contains("No neta yet."));
    }

    #[test]
    fn rows_show_labels_in_display_order() {
        let mut state = state();
        state.render_from(
            &[
                Item::permanent(1, "someday"),
                Item::dated(2, "buy milk", "2025-01-01"),
            ],
            date!(2025 - 01 - 02),
        );
        let screen = draw(&state);
        let milk = screen.find("buy milk").expect("dated row drawn");
        let someday = screen.find("someday").expect("permanent row drawn");
        assert!(milk < someday);
        assert!(screen.contains("2025/1/1"));
        assert!(screen.contains("permanent"));
        assert!(screen.contains("1 expired"));
    }

    #[test]
    fn disabled_deadline_is_shown_when_permanent() {
        let mut state = state();
        state.form.toggle_permanent();
        let screen = draw(&state);
        assert!(screen.contains("(disabled)"));
        assert!(screen.contains("[x]"));
    }
}
