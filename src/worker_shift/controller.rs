//! State machine behind the worker home screen.
//!
//! [`ShiftViewController::handle`] is synchronous and performs no I/O: it
//! folds one [`Event`] into the screen state and returns the [`Command`]s the
//! driver has to carry out. Results of those commands come back as further
//! events. Once torn down the controller drops every event and emits nothing.
//!
//! ```text
//! Uninitialized -> Loading -> Ready <-> Refreshing
//!                      \_________\__________\____-> TornDown
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::PlannerConfig;
use super::error::RepositoryError;
use super::projection::{
    available_shifts, cards, greeting_initial, my_planned_shifts, select_next_shift, ShiftCard,
};
use super::repository::ShiftSnapshot;
use super::session::Session;
use super::shift::{ShiftId, UserId, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    /// Subscription opened and profile requested; waiting for both.
    Loading,
    Ready,
    Refreshing,
    TornDown,
}

/// Identifies one opened subscription so deliveries from a replaced one can
/// be told apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// A write waiting for the worker to say yes or no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Reserve(ShiftId),
    Cancel(ShiftId),
}

impl Confirmation {
    pub fn shift_id(&self) -> &ShiftId {
        match self {
            Confirmation::Reserve(shift_id) | Confirmation::Cancel(shift_id) => shift_id,
        }
    }

    pub fn kind(&self) -> WriteKind {
        match self {
            Confirmation::Reserve(_) => WriteKind::Reserve,
            Confirmation::Cancel(_) => WriteKind::Cancel,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Confirmation::Reserve(_) => "Shift reserveren",
            Confirmation::Cancel(_) => "Shift annuleren",
        }
    }

    pub fn question(&self) -> &'static str {
        match self {
            Confirmation::Reserve(_) => "Wil je deze shift reserveren?",
            Confirmation::Cancel(_) => "Weet je zeker dat je deze shift wilt annuleren?",
        }
    }

    pub fn prompt(&self) -> ConfirmationPrompt {
        ConfirmationPrompt {
            action: self.kind(),
            shift_id: self.shift_id().clone(),
            title: self.title().to_string(),
            question: self.question().to_string(),
        }
    }
}

/// The confirmation dialog as rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPrompt {
    pub action: WriteKind,
    pub shift_id: ShiftId,
    pub title: String,
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Reserve,
    Cancel,
}

/// A recoverable failure shown to the worker until dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub shift_id: Option<ShiftId>,
    pub message: String,
}

impl Notice {
    fn from_error(shift_id: Option<ShiftId>, error: &RepositoryError) -> Self {
        Self {
            shift_id,
            message: error.notice_text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftListState {
    /// Latest delivery, in arrival order.
    pub shifts: ShiftSnapshot,
    pub refreshing: bool,
    pub profile: UserProfile,
}

impl Default for ShiftListState {
    fn default() -> Self {
        Self {
            shifts: Arc::new(Vec::new()),
            refreshing: false,
            profile: UserProfile::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Activate,
    SessionChanged(Option<Session>),
    ProfileFetched {
        user_id: UserId,
        result: Result<UserProfile, RepositoryError>,
    },
    ShiftsDelivered {
        subscription: SubscriptionId,
        shifts: ShiftSnapshot,
    },
    SubscriptionFailed {
        subscription: SubscriptionId,
        error: RepositoryError,
    },
    RefreshRequested,
    RefreshDelayElapsed,
    ReserveRequested(ShiftId),
    CancelRequested(ShiftId),
    ReserveConfirmed(ShiftId),
    CancelConfirmed(ShiftId),
    ConfirmationAborted,
    WriteCompleted {
        kind: WriteKind,
        shift_id: ShiftId,
        result: Result<(), RepositoryError>,
    },
    NoticeDismissed,
    ProfileOpened,
    TearDown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchProfile(UserId),
    /// Open a feed alongside any existing one.
    Subscribe(SubscriptionId),
    Unsubscribe(SubscriptionId),
    StartRefreshDelay(Duration),
    Reserve {
        shift_id: ShiftId,
        by_user: UserId,
    },
    Cancel {
        shift_id: ShiftId,
    },
    NavigateToProfile(UserProfile),
    Render,
}

/// Everything the home screen draws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShiftOverview {
    pub phase: Phase,
    /// Account name from the identity provider, independent of the profile.
    pub signed_in_as: Option<String>,
    pub greeting: String,
    pub initial: String,
    pub planned_count: usize,
    pub next_shift: Option<ShiftCard>,
    pub planned_shifts: Vec<ShiftCard>,
    pub available_shifts: Vec<ShiftCard>,
    pub refreshing: bool,
    pub confirmation: Option<ConfirmationPrompt>,
    pub notice: Option<Notice>,
}

pub struct ShiftViewController {
    config: PlannerConfig,
    session: Option<Session>,
    phase: Phase,
    state: ShiftListState,
    confirmation: Option<Confirmation>,
    notice: Option<Notice>,
    profile_settled: bool,
    shifts_received: bool,
    feed_failed: bool,
    /// Feed whose deliveries are rendered.
    subscription: SubscriptionId,
    /// Feed opened by a refresh; replaces `subscription` on its first delivery.
    pending: Option<SubscriptionId>,
    opened: u64,
}

impl ShiftViewController {
    pub fn new(session: Option<Session>, config: PlannerConfig) -> Self {
        Self {
            config,
            session,
            phase: Phase::Uninitialized,
            state: ShiftListState::default(),
            confirmation: None,
            notice: None,
            profile_settled: false,
            shifts_received: false,
            feed_failed: false,
            subscription: SubscriptionId::default(),
            pending: None,
            opened: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &ShiftListState {
        &self.state
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        if self.phase == Phase::TornDown {
            tracing::trace!("dropping event for a torn down screen");
            return Vec::new();
        }

        match event {
            Event::Activate => self.activate(),
            Event::SessionChanged(session) => self.change_session(session),
            Event::ProfileFetched { user_id, result } => self.profile_fetched(user_id, result),
            Event::ShiftsDelivered {
                subscription,
                shifts,
            } => self.shifts_delivered(subscription, shifts),
            Event::SubscriptionFailed {
                subscription,
                error,
            } => self.subscription_failed(subscription, error),
            Event::RefreshRequested => self.start_refresh(),
            Event::RefreshDelayElapsed => self.finish_refresh(),
            Event::ReserveRequested(shift_id) => {
                self.request_confirmation(Confirmation::Reserve(shift_id))
            }
            Event::CancelRequested(shift_id) => {
                self.request_confirmation(Confirmation::Cancel(shift_id))
            }
            Event::ReserveConfirmed(shift_id) => {
                self.confirm(&Confirmation::Reserve(shift_id))
            }
            Event::CancelConfirmed(shift_id) => self.confirm(&Confirmation::Cancel(shift_id)),
            Event::ConfirmationAborted => match self.confirmation.take() {
                Some(_) => vec![Command::Render],
                None => Vec::new(),
            },
            Event::WriteCompleted {
                kind,
                shift_id,
                result,
            } => self.write_completed(kind, shift_id, result),
            Event::NoticeDismissed => match self.notice.take() {
                Some(_) => vec![Command::Render],
                None => Vec::new(),
            },
            Event::ProfileOpened => {
                if self.phase == Phase::Uninitialized {
                    return Vec::new();
                }
                vec![Command::NavigateToProfile(self.state.profile.clone())]
            }
            Event::TearDown => {
                tracing::debug!(from = ?self.phase, "tearing down shift screen");
                self.phase = Phase::TornDown;
                self.confirmation = None;
                let mut commands = vec![Command::Unsubscribe(self.subscription)];
                commands.extend(self.pending.take().map(Command::Unsubscribe));
                commands
            }
        }
    }

    /// Projects the current state for rendering.
    pub fn overview(&self, now: DateTime<Utc>) -> ShiftOverview {
        let shifts = self.state.shifts.as_slice();
        let timezone = self.config.timezone;
        let user_id = self.session.as_ref().map(|session| &session.user_id);

        let planned = match user_id {
            Some(user_id) => my_planned_shifts(shifts, user_id),
            None => Vec::new(),
        };
        let first_name = &self.state.profile.first_name;

        ShiftOverview {
            phase: self.phase,
            signed_in_as: self
                .session
                .as_ref()
                .and_then(|session| session.display_name.clone()),
            greeting: format!("Hallo {first_name}").trim_end().to_string(),
            initial: greeting_initial(first_name),
            planned_count: planned.len(),
            next_shift: select_next_shift(self.config.next_shift_policy, shifts, user_id, now)
                .map(|shift| ShiftCard::new(shift, timezone)),
            planned_shifts: cards(planned, timezone),
            available_shifts: cards(available_shifts(shifts), timezone),
            refreshing: self.state.refreshing,
            confirmation: self.confirmation.as_ref().map(Confirmation::prompt),
            notice: self.notice.clone(),
        }
    }

    fn activate(&mut self) -> Vec<Command> {
        if self.phase != Phase::Uninitialized {
            return Vec::new();
        }
        self.phase = Phase::Loading;

        let mut commands = Vec::with_capacity(3);
        match &self.session {
            Some(session) => {
                self.state.profile = UserProfile::empty(session.user_id.clone());
                commands.push(Command::FetchProfile(session.user_id.clone()));
            }
            None => self.profile_settled = true,
        }
        self.subscription = self.open_subscription();
        commands.push(Command::Subscribe(self.subscription));
        commands.push(Command::Render);
        commands
    }

    fn change_session(&mut self, session: Option<Session>) -> Vec<Command> {
        if session == self.session {
            return Vec::new();
        }
        self.session = session;
        self.confirmation = None;
        if self.phase == Phase::Uninitialized {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        match &self.session {
            Some(session) => {
                tracing::info!(user = %session.user_id, "session changed");
                self.state.profile = UserProfile::empty(session.user_id.clone());
                self.profile_settled = false;
                commands.push(Command::FetchProfile(session.user_id.clone()));
            }
            None => {
                tracing::info!("signed out");
                self.state.profile = UserProfile::default();
                self.profile_settled = true;
            }
        }
        self.settle();
        commands.push(Command::Render);
        commands
    }

    fn profile_fetched(
        &mut self,
        user_id: UserId,
        result: Result<UserProfile, RepositoryError>,
    ) -> Vec<Command> {
        let current = self.session.as_ref().map(|session| &session.user_id);
        if self.phase == Phase::Uninitialized || current != Some(&user_id) {
            return Vec::new();
        }

        match result {
            Ok(profile) => self.state.profile = profile,
            Err(RepositoryError::NotFound { .. }) => {
                tracing::info!(user = %user_id, "User does not exist");
                self.state.profile = UserProfile::empty(user_id);
            }
            Err(error) => {
                tracing::warn!(user = %user_id, %error, "Error fetching user data");
            }
        }
        self.profile_settled = true;
        self.settle();
        vec![Command::Render]
    }

    fn shifts_delivered(
        &mut self,
        subscription: SubscriptionId,
        shifts: ShiftSnapshot,
    ) -> Vec<Command> {
        if self.phase == Phase::Uninitialized {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        if self.pending == Some(subscription) {
            self.pending = None;
            let replaced = std::mem::replace(&mut self.subscription, subscription);
            commands.push(Command::Unsubscribe(replaced));
        } else if subscription != self.subscription {
            return Vec::new();
        }

        tracing::debug!(shifts = shifts.len(), "shift feed delivered");
        self.state.shifts = shifts;
        self.shifts_received = true;
        self.feed_failed = false;
        self.settle();
        commands.push(Command::Render);
        commands
    }

    fn subscription_failed(
        &mut self,
        subscription: SubscriptionId,
        error: RepositoryError,
    ) -> Vec<Command> {
        if self.phase == Phase::Uninitialized {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        if self.pending == Some(subscription) {
            // the previous feed stays live
            self.pending = None;
            commands.push(Command::Unsubscribe(subscription));
        } else if subscription == self.subscription {
            self.feed_failed = true;
        } else {
            return Vec::new();
        }

        tracing::warn!(%error, "could not open shift feed");
        self.notice = Some(Notice::from_error(None, &error));
        commands.push(Command::Render);
        commands
    }

    fn start_refresh(&mut self) -> Vec<Command> {
        let allowed = match self.phase {
            Phase::Ready => true,
            // the only way out when the first subscription never opened
            Phase::Loading => self.feed_failed,
            _ => false,
        };
        if !allowed {
            return Vec::new();
        }

        self.phase = Phase::Refreshing;
        self.state.refreshing = true;

        let mut commands = Vec::with_capacity(5);
        if let Some(session) = &self.session {
            commands.push(Command::FetchProfile(session.user_id.clone()));
        }
        let opened = self.open_subscription();
        if let Some(stale) = self.pending.replace(opened) {
            commands.push(Command::Unsubscribe(stale));
        }
        commands.push(Command::Subscribe(opened));
        commands.push(Command::StartRefreshDelay(self.config.refresh_min_visible()));
        commands.push(Command::Render);
        commands
    }

    fn finish_refresh(&mut self) -> Vec<Command> {
        if self.phase != Phase::Refreshing {
            return Vec::new();
        }
        self.state.refreshing = false;
        self.phase = if self.profile_settled && self.shifts_received {
            Phase::Ready
        } else {
            Phase::Loading
        };
        vec![Command::Render]
    }

    fn request_confirmation(&mut self, confirmation: Confirmation) -> Vec<Command> {
        if self.phase == Phase::Uninitialized {
            return Vec::new();
        }
        if self.session.is_none() {
            tracing::warn!(
                shift = %confirmation.shift_id(),
                "write requested without a signed-in user"
            );
            self.notice = Some(Notice::from_error(
                Some(confirmation.shift_id().clone()),
                &RepositoryError::Unauthenticated,
            ));
            return vec![Command::Render];
        }
        self.confirmation = Some(confirmation);
        vec![Command::Render]
    }

    fn confirm(&mut self, answered: &Confirmation) -> Vec<Command> {
        if self.confirmation.as_ref() != Some(answered) {
            return Vec::new();
        }
        self.confirmation = None;

        let Some(session) = &self.session else {
            return vec![Command::Render];
        };
        let command = match answered {
            Confirmation::Reserve(shift_id) => Command::Reserve {
                shift_id: shift_id.clone(),
                by_user: session.user_id.clone(),
            },
            Confirmation::Cancel(shift_id) => Command::Cancel {
                shift_id: shift_id.clone(),
            },
        };
        vec![command, Command::Render]
    }

    fn write_completed(
        &mut self,
        kind: WriteKind,
        shift_id: ShiftId,
        result: Result<(), RepositoryError>,
    ) -> Vec<Command> {
        match result {
            Ok(()) => {
                tracing::info!(shift = %shift_id, ?kind, "shift updated");
                // the feed will carry the new status
                Vec::new()
            }
            Err(error) => {
                tracing::warn!(shift = %shift_id, ?kind, %error, "shift update failed");
                self.notice = Some(Notice::from_error(Some(shift_id), &error));
                vec![Command::Render]
            }
        }
    }

    fn open_subscription(&mut self) -> SubscriptionId {
        self.opened += 1;
        SubscriptionId(self.opened)
    }

    fn settle(&mut self) {
        if self.phase == Phase::Loading && self.profile_settled && self.shifts_received {
            tracing::debug!("shift screen ready");
            self.phase = Phase::Ready;
        }
    }
}
