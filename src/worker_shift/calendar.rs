//! The "Mijn planning" month view.
//!
//! Weeks start on Monday. The grid always covers whole weeks, so the first
//! row is padded with the tail of the previous month and the last row with
//! the head of the next one; those cells are flagged `outside_month`.

use std::collections::HashSet;

use chrono::{Datelike, Days, Months, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use super::projection::my_planned_shifts;
use super::shift::{Shift, UserId};

pub const WEEKDAY_LABELS: [&str; 7] = ["ma", "di", "wo", "do", "vr", "za", "zo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthView {
    first_day: NaiveDate,
    selected: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub outside_month: bool,
    pub is_selected: bool,
    pub has_planned_shift: bool,
}

impl CalendarDay {
    pub fn day_of_month(&self) -> u32 {
        self.date.day()
    }
}

impl MonthView {
    /// `None` when `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        Some(Self {
            first_day: NaiveDate::from_ymd_opt(year, month, 1)?,
            selected: None,
        })
    }

    /// The month containing `date`, with `date` selected.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date - Days::new(u64::from(date.day0())),
            selected: Some(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn selected(&self) -> Option<NaiveDate> {
        self.selected
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next_month().first_day - Days::new(1)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    /// e.g. `"December 2024"`.
    pub fn title(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }

    pub fn previous_month(&self) -> Self {
        Self {
            first_day: self.first_day - Months::new(1),
            selected: self.selected,
        }
    }

    pub fn next_month(&self) -> Self {
        Self {
            first_day: self.first_day + Months::new(1),
            selected: self.selected,
        }
    }

    /// Selects `date`. A grayed day from a neighbouring month moves the view
    /// to that month.
    pub fn select_day(&mut self, date: NaiveDate) {
        if !self.contains(date) {
            self.first_day = date - Days::new(u64::from(date.day0()));
        }
        self.selected = Some(date);
        tracing::debug!(%date, "day selected");
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Cells of the month in row-major order, seven per week.
    pub fn grid(&self, planned_days: &HashSet<NaiveDate>) -> Vec<CalendarDay> {
        let first_day = self.first_day;
        let last_day = self.last_day();
        let grid_start =
            first_day - Days::new(u64::from(first_day.weekday().num_days_from_monday()));
        let grid_end =
            last_day + Days::new(u64::from(6 - last_day.weekday().num_days_from_monday()));

        grid_start
            .iter_days()
            .take_while(|date| *date <= grid_end)
            .map(|date| CalendarDay {
                date,
                outside_month: !self.contains(date),
                is_selected: self.selected == Some(date),
                has_planned_shift: planned_days.contains(&date),
            })
            .collect()
    }
}

/// Local dates on which `user_id` has a reserved shift.
pub fn planned_days(shifts: &[Shift], user_id: &UserId, timezone: Tz) -> HashSet<NaiveDate> {
    my_planned_shifts(shifts, user_id)
        .into_iter()
        .map(|shift| shift.start_time.with_timezone(&timezone).date_naive())
        .collect()
}

pub fn month_grid(
    view: &MonthView,
    shifts: &[Shift],
    user_id: Option<&UserId>,
    timezone: Tz,
) -> Vec<CalendarDay> {
    let planned = match user_id {
        Some(user_id) => planned_days(shifts, user_id, timezone),
        None => HashSet::new(),
    };
    view.grid(&planned)
}

/// The worker's shifts starting on local date `date`, in feed order.
pub fn shifts_on_day<'a>(
    shifts: &'a [Shift],
    user_id: &UserId,
    date: NaiveDate,
    timezone: Tz,
) -> Vec<&'a Shift> {
    my_planned_shifts(shifts, user_id)
        .into_iter()
        .filter(|shift| shift.start_time.with_timezone(&timezone).date_naive() == date)
        .collect()
}
