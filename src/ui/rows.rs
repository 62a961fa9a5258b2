use time::format_description::OwnedFormatItem;
use time::Date;

use crate::storage::Item;

pub const PERMANENT_LABEL: &str = "permanent";
pub const EMPTY_PLACEHOLDER: &str = "No neta yet. Type one above and press Enter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Upcoming,
    Expired,
    Permanent,
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub id: i64,
    pub text: String,
    pub label: String,
    pub status: RowStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Dated(Date),
    Undated,
    Permanent,
}

fn sort_key(item: &Item) -> SortKey {
    if item.is_permanent {
        return SortKey::Permanent;
    }
    match item.deadline_date() {
        Some(date) => SortKey::Dated(date),
        None => SortKey::Undated,
    }
}

/// Projects the list into display order: earliest deadline first, then
/// records with an unusable deadline, then permanent items. Rebuilt from
/// scratch on every call.
pub fn display_rows(items: &[Item], today: Date, format: &OwnedFormatItem) -> Vec<DisplayRow> {
    let mut ordered: Vec<&Item> = items.iter().collect();
    ordered.sort_by_key(|item| sort_key(item));
    ordered
        .into_iter()
        .map(|item| build_row(item, today, format))
        .collect()
}

fn build_row(item: &Item, today: Date, format: &OwnedFormatItem) -> DisplayRow {
    let (label, status) = match sort_key(item) {
        SortKey::Permanent => (PERMANENT_LABEL.to_string(), RowStatus::Permanent),
        SortKey::Dated(date) => {
            let label = date.format(format).unwrap_or_else(|_| date.to_string());
            let status = if date < today {
                RowStatus::Expired
            } else {
                RowStatus::Upcoming
            };
            (label, status)
        }
        SortKey::Undated => {
            let raw = item.deadline.as_deref().unwrap_or("");
            (format!("invalid date {raw}").trim_end().to_string(), RowStatus::InvalidDate)
        }
    };
    DisplayRow {
        id: item.id,
        text: item.text.clone(),
        label,
        status,
    }
}
