use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::deadline::parse_deadline;

const MAX_TEXT_LEN: usize = 200;
const MAX_DEADLINE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter the neta text first.")]
    EmptyText,
    #[error("Set a deadline, or mark the neta as permanent.")]
    MissingDeadline,
    #[error("Deadline '{0}' is not a YYYY-MM-DD date.")]
    InvalidDeadline(String),
}

/// Validated form contents, ready to become an item once it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub deadline: Option<String>,
    pub is_permanent: bool,
}

pub fn validate(
    text: &str,
    deadline: &str,
    is_permanent: bool,
) -> Result<Submission, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if is_permanent {
        return Ok(Submission {
            text: text.to_owned(),
            deadline: None,
            is_permanent: true,
        });
    }
    let deadline = deadline.trim();
    if deadline.is_empty() {
        return Err(ValidationError::MissingDeadline);
    }
    if parse_deadline(deadline).is_none() {
        return Err(ValidationError::InvalidDeadline(deadline.to_owned()));
    }
    Ok(Submission {
        text: text.to_owned(),
        deadline: Some(deadline.to_owned()),
        is_permanent: false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Text,
    Deadline,
    Permanent,
}

#[derive(Debug, Clone, Default)]
pub struct InputForm {
    pub text: String,
    pub deadline: String,
    pub permanent: bool,
    pub field: FormField,
}

impl InputForm {
    pub fn deadline_enabled(&self) -> bool {
        !self.permanent
    }

    /// Checking "permanent" clears and locks the deadline; unchecking unlocks it.
    pub fn toggle_permanent(&mut self) -> bool {
        self.permanent = !self.permanent;
        if self.permanent {
            self.deadline.clear();
            if self.field == FormField::Deadline {
                self.field = FormField::Permanent;
            }
        }
        self.permanent
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Text if self.deadline_enabled() => FormField::Deadline,
            FormField::Text | FormField::Deadline => FormField::Permanent,
            FormField::Permanent => FormField::Text,
        };
    }

    pub fn previous_field(&mut self) {
        self.field = match self.field {
            FormField::Text => FormField::Permanent,
            FormField::Deadline => FormField::Text,
            FormField::Permanent if self.deadline_enabled() => FormField::Deadline,
            FormField::Permanent => FormField::Text,
        };
    }

    pub fn push_char(&mut self, ch: char) {
        match self.field {
            FormField::Text => {
                if self.text.graphemes(true).count() < MAX_TEXT_LEN {
                    self.text.push(ch);
                }
            }
            FormField::Deadline => {
                if self.deadline_enabled()
                    && (ch.is_ascii_digit() || ch == '-')
                    && self.deadline.len() < MAX_DEADLINE_LEN
                {
                    self.deadline.push(ch);
                }
            }
            FormField::Permanent => {
                if ch == ' ' {
                    self.toggle_permanent();
                }
            }
        }
    }

    pub fn pop_char(&mut self) {
        let buffer = match self.field {
            FormField::Text => &mut self.text,
            FormField::Deadline => &mut self.deadline,
            FormField::Permanent => return,
        };
        if let Some((offset, _)) = buffer.grapheme_indices(true).next_back() {
            buffer.truncate(offset);
        }
    }

    pub fn validate(&self) -> Result<Submission, ValidationError> {
        validate(&self.text, &self.deadline, self.permanent)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_dated_submission_and_trims_text() {
        let submission = validate("  buy milk ", "2025-01-01", false).expect("valid");
        assert_eq!(submission.text, "buy milk");
        assert_eq!(submission.deadline.as_deref(), Some("2025-01-01"));
        assert!(!submission.is_permanent);
    }

    #[test]
    fn rejects_blank_text_before_checking_deadline() {
        assert_matches!(validate("", "", false), Err(ValidationError::EmptyText));
        assert_matches!(validate("   ", "2025-01-01", true), Err(ValidationError::EmptyText));
    }

    #[test]
    fn rejects_missing_deadline_unless_permanent() {
        assert_matches!(validate("x", "", false), Err(ValidationError::MissingDeadline));
        let permanent = validate("x", "", true).expect("permanent is fine");
        assert_eq!(permanent.deadline, None);
    }

    #[test]
    fn permanent_submission_drops_typed_deadline() {
        let submission = validate("x", "2025-01-01", true).expect("valid");
        assert_eq!(submission.deadline, None);
        assert!(submission.is_permanent);
    }

    #[test]
    fn rejects_deadline_that_is_not_a_date() {
        assert_matches!(
            validate("x", "2025-13-01", false),
            Err(ValidationError::InvalidDeadline(raw)) if raw == "2025-13-01"
        );
    }

    #[test]
    fn toggling_permanent_clears_and_locks_deadline() {
        let mut form = InputForm {
            deadline: "2025-01-01".into(),
            field: FormField::Deadline,
            ..InputForm::default()
        };
        assert!(form.toggle_permanent());
        assert!(form.deadline.is_empty());
        assert!(!form.deadline_enabled());
        assert_eq!(form.field, FormField::Permanent);

        form.field = FormField::Deadline;
        form.push_char('2');
        assert!(form.deadline.is_empty());

        assert!(!form.toggle_permanent());
        assert!(form.deadline_enabled());
        form.push_char('2');
        assert_eq!(form.deadline, "2");
    }

    #[test]
    fn field_cycle_skips_locked_deadline() {
        let mut form = InputForm::default();
        form.next_field();
        assert_eq!(form.field, FormField::Deadline);

        form.reset();
        form.toggle_permanent();
        form.field = FormField::Text;
        form.next_field();
        assert_eq!(form.field, FormField::Permanent);
        form.previous_field();
        assert_eq!(form.field, FormField::Text);
    }

    #[test]
    fn backspace_removes_whole_grapheme() {
        let mut form = InputForm::default();
        for ch in "ネタ👍🏽".chars() {
            form.push_char(ch);
        }
        form.pop_char();
        assert_eq!(form.text, "ネタ");
    }

    #[test]
    fn reset_restores_defaults() {
        let mut form = InputForm {
            text: "x".into(),
            permanent: true,
            field: FormField::Permanent,
            ..InputForm::default()
        };
        form.reset();
        assert!(form.text.is_empty());
        assert!(!form.permanent);
        assert!(form.deadline_enabled());
        assert_eq!(form.field, FormField::Text);
    }
}
