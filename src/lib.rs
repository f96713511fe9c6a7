//! Client side of a worker shift-scheduling app: a live feed of shifts, the
//! worker home screen that reserves and cancels them, and the month calendar.

pub mod worker_shift;

pub use worker_shift::calendar::{month_grid, CalendarDay, MonthView};
pub use worker_shift::config::PlannerConfig;
pub use worker_shift::controller::{Phase, ShiftOverview, ShiftViewController};
pub use worker_shift::error::RepositoryError;
pub use worker_shift::repository::{
    subscribe_with, ShiftRepository, ShiftSnapshot, ShiftSubscription, SubscriptionHandle,
};
pub use worker_shift::screen::ShiftScreen;
pub use worker_shift::session::Session;
pub use worker_shift::shift::{Shift, ShiftDataset, ShiftId, ShiftStatus, UserId, UserProfile};
pub use worker_shift::store::InMemoryShiftStore;
