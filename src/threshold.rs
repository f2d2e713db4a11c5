use chrono::{DateTime, Utc};

use crate::types::ThresholdState;

/// Classify a due date into an urgency tier relative to `now`.
///
/// Compares calendar dates only: both instants are truncated to their UTC
/// date, so the tier is independent of time-of-day.
///
/// - `diff_days < 0` -> `Overdue`
/// - `0..=1` -> `Critical`
/// - `2..=3` -> `Warning`
/// - `4..=7` -> `Watch`
/// - `> 7`, or no due date -> `Normal`
pub fn classify(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ThresholdState {
    let Some(due) = due_date else {
        return ThresholdState::Normal;
    };

    let diff_days = (due.date_naive() - now.date_naive()).num_days();

    match diff_days {
        d if d < 0 => ThresholdState::Overdue,
        0..=1 => ThresholdState::Critical,
        2..=3 => ThresholdState::Warning,
        4..=7 => ThresholdState::Watch,
        _ => ThresholdState::Normal,
    }
}
