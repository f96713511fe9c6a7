use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::shift::{Shift, ShiftId, ShiftStatus, UserId};

pub const MISSING_DAY_LABEL: &str = "Geen dag opgegeven";
pub const INITIAL_PLACEHOLDER: &str = "?";

/// Shifts reserved by `user_id`, in feed order.
pub fn my_planned_shifts<'a>(shifts: &'a [Shift], user_id: &UserId) -> Vec<&'a Shift> {
    shifts
        .iter()
        .filter(|shift| shift.is_reserved_by(user_id))
        .collect()
}

/// Shifts nobody holds yet, in feed order.
pub fn available_shifts(shifts: &[Shift]) -> Vec<&Shift> {
    shifts
        .iter()
        .filter(|shift| shift.status == ShiftStatus::Available)
        .collect()
}

/// The first shift of the unfiltered feed.
///
/// This is whatever the store delivered first, not the earliest scheduled
/// shift and not necessarily one of the worker's own. See [`upcoming_shift`]
/// for the chronological reading.
pub fn next_shift(shifts: &[Shift]) -> Option<&Shift> {
    shifts.first()
}

/// Earliest shift reserved by `user_id` that starts at or after `now`.
pub fn upcoming_shift<'a>(
    shifts: &'a [Shift],
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Option<&'a Shift> {
    shifts
        .iter()
        .filter(|shift| shift.is_reserved_by(user_id) && shift.start_time >= now)
        .min_by_key(|shift| shift.start_time)
}

pub fn planned_count(shifts: &[Shift], user_id: &UserId) -> usize {
    my_planned_shifts(shifts, user_id).len()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextShiftPolicy {
    /// Head of the feed, whatever its status or owner.
    #[default]
    FirstArrived,
    /// The worker's own earliest shift that has not started yet.
    EarliestUpcoming,
}

pub fn select_next_shift<'a>(
    policy: NextShiftPolicy,
    shifts: &'a [Shift],
    user_id: Option<&UserId>,
    now: DateTime<Utc>,
) -> Option<&'a Shift> {
    match (policy, user_id) {
        (NextShiftPolicy::FirstArrived, _) => next_shift(shifts),
        (NextShiftPolicy::EarliestUpcoming, Some(user_id)) => upcoming_shift(shifts, user_id, now),
        (NextShiftPolicy::EarliestUpcoming, None) => None,
    }
}

/// Letter shown in the profile button. Never indexes into an empty name.
pub fn greeting_initial(first_name: &str) -> String {
    match first_name.trim_start().chars().next() {
        Some(first) => first.to_uppercase().collect(),
        None => INITIAL_PLACEHOLDER.to_string(),
    }
}

/// A shift as the lists on the home screen show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftCard {
    pub id: ShiftId,
    pub day: String,
    pub date: String,
    pub start: String,
    pub status: ShiftStatus,
}

impl ShiftCard {
    pub fn new(shift: &Shift, timezone: Tz) -> Self {
        let local = shift.start_time.with_timezone(&timezone);
        Self {
            id: shift.id.clone(),
            day: shift
                .day
                .clone()
                .unwrap_or_else(|| MISSING_DAY_LABEL.to_string()),
            date: local.format("%-d-%-m-%Y").to_string(),
            start: local.format("%H:%M:%S").to_string(),
            status: shift.status,
        }
    }
}

pub fn cards<'a>(shifts: impl IntoIterator<Item = &'a Shift>, timezone: Tz) -> Vec<ShiftCard> {
    shifts
        .into_iter()
        .map(|shift| ShiftCard::new(shift, timezone))
        .collect()
}
