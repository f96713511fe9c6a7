//! Runs a [`ShiftViewController`] against a [`ShiftRepository`].
//!
//! The controller lives on a single task and sees one event at a time.
//! Repository calls, the subscription feed and the refresh timer run on
//! their own tasks and report back through the event channel, so the screen
//! keeps taking intents while requests are in flight. After teardown the
//! channel is closed and late results are dropped on send.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::config::PlannerConfig;
use super::controller::{
    Command, Event, Phase, ShiftOverview, ShiftViewController, SubscriptionId, WriteKind,
};
use super::repository::ShiftRepository;
use super::session::Session;
use super::shift::{ShiftId, UserProfile};

pub struct ShiftScreen {
    events: mpsc::UnboundedSender<Event>,
    overview: watch::Receiver<ShiftOverview>,
    navigation: mpsc::UnboundedReceiver<UserProfile>,
    task: Option<JoinHandle<()>>,
}

impl ShiftScreen {
    /// Activates the screen: opens the shift feed and requests the profile.
    pub fn activate(
        repository: Arc<dyn ShiftRepository>,
        session: Option<Session>,
        config: PlannerConfig,
    ) -> Self {
        let controller = ShiftViewController::new(session, config);
        let (overview_sender, overview) = watch::channel(controller.overview(Utc::now()));
        let (events, receiver) = mpsc::unbounded_channel();
        let (navigation_sender, navigation) = mpsc::unbounded_channel();

        let _ = events.send(Event::Activate);
        let driver = Driver {
            controller,
            repository,
            events: events.clone(),
            overview: overview_sender,
            navigation: navigation_sender,
            feeds: HashMap::new(),
        };
        let task = tokio::spawn(driver.run(receiver));

        Self {
            events,
            overview,
            navigation,
            task: Some(task),
        }
    }

    pub fn refresh(&self) {
        self.send(Event::RefreshRequested);
    }

    /// Opens the reservation prompt for `shift_id`.
    pub fn request_reserve(&self, shift_id: impl Into<ShiftId>) {
        self.send(Event::ReserveRequested(shift_id.into()));
    }

    pub fn confirm_reserve(&self, shift_id: impl Into<ShiftId>) {
        self.send(Event::ReserveConfirmed(shift_id.into()));
    }

    /// Opens the cancellation prompt for `shift_id`.
    pub fn request_cancel(&self, shift_id: impl Into<ShiftId>) {
        self.send(Event::CancelRequested(shift_id.into()));
    }

    pub fn confirm_cancel(&self, shift_id: impl Into<ShiftId>) {
        self.send(Event::CancelConfirmed(shift_id.into()));
    }

    pub fn abort(&self) {
        self.send(Event::ConfirmationAborted);
    }

    pub fn dismiss_notice(&self) {
        self.send(Event::NoticeDismissed);
    }

    pub fn navigate_to_profile(&self) {
        self.send(Event::ProfileOpened);
    }

    pub fn change_session(&self, session: Option<Session>) {
        self.send(Event::SessionChanged(session));
    }

    /// Latest rendered overview.
    pub fn current(&self) -> ShiftOverview {
        self.overview.borrow().clone()
    }

    /// A receiver that observes every render.
    pub fn renders(&self) -> watch::Receiver<ShiftOverview> {
        self.overview.clone()
    }

    /// Waits until a render satisfies `predicate`. `None` if the screen went
    /// away first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<ShiftOverview>
    where
        F: FnMut(&ShiftOverview) -> bool,
    {
        let mut renders = self.overview.clone();
        let overview = renders.wait_for(|overview| predicate(overview)).await.ok()?;
        Some(overview.clone())
    }

    pub async fn wait_for_phase(&self, phase: Phase) -> Option<ShiftOverview> {
        self.wait_for(|overview| overview.phase == phase).await
    }

    /// Next profile the worker asked to open.
    pub async fn next_navigation(&mut self) -> Option<UserProfile> {
        self.navigation.recv().await
    }

    /// Tears the screen down and waits for the controller task to stop.
    /// Requests still in flight complete against the store; their results
    /// are discarded.
    pub async fn tear_down(mut self) {
        self.send(Event::TearDown);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::error!(%error, "shift screen task failed");
            }
        }
    }

    fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("intent sent to a closed shift screen");
        }
    }
}

impl Drop for ShiftScreen {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.events.send(Event::TearDown);
        }
    }
}

struct Driver {
    controller: ShiftViewController,
    repository: Arc<dyn ShiftRepository>,
    events: mpsc::UnboundedSender<Event>,
    overview: watch::Sender<ShiftOverview>,
    navigation: mpsc::UnboundedSender<UserProfile>,
    /// Open feeds. A refresh keeps the old one until the controller drops it.
    feeds: HashMap<SubscriptionId, JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = receiver.recv().await {
            for command in self.controller.handle(event) {
                self.execute(command);
            }
            if self.controller.phase() == Phase::TornDown {
                break;
            }
        }
        receiver.close();
        for (_, feed) in self.feeds.drain() {
            feed.abort();
        }
        tracing::debug!("shift screen stopped");
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::FetchProfile(user_id) => {
                let repository = Arc::clone(&self.repository);
                self.spawn_reporting(async move {
                    let result = repository.fetch_user(&user_id).await;
                    Event::ProfileFetched { user_id, result }
                });
            }
            Command::Subscribe(subscription) => self.open_feed(subscription),
            Command::Unsubscribe(subscription) => self.close_feed(subscription),
            Command::StartRefreshDelay(delay) => {
                self.spawn_reporting(async move {
                    tokio::time::sleep(delay).await;
                    Event::RefreshDelayElapsed
                });
            }
            Command::Reserve { shift_id, by_user } => {
                let repository = Arc::clone(&self.repository);
                self.spawn_reporting(async move {
                    let result = repository.reserve(&shift_id, &by_user).await;
                    Event::WriteCompleted {
                        kind: WriteKind::Reserve,
                        shift_id,
                        result,
                    }
                });
            }
            Command::Cancel { shift_id } => {
                let repository = Arc::clone(&self.repository);
                self.spawn_reporting(async move {
                    let result = repository.cancel(&shift_id).await;
                    Event::WriteCompleted {
                        kind: WriteKind::Cancel,
                        shift_id,
                        result,
                    }
                });
            }
            Command::NavigateToProfile(profile) => {
                let _ = self.navigation.send(profile);
            }
            Command::Render => {
                self.overview
                    .send_replace(self.controller.overview(Utc::now()));
            }
        }
    }

    fn spawn_reporting<F>(&self, request: F)
    where
        F: std::future::Future<Output = Event> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = request.await;
            if events.send(event).is_err() {
                tracing::debug!("discarding result for a torn down screen");
            }
        });
    }

    fn open_feed(&mut self, subscription: SubscriptionId) {
        let repository = Arc::clone(&self.repository);
        let events = self.events.clone();
        let feed = tokio::spawn(async move {
            let mut feed = match repository.subscribe().await {
                Ok(feed) => feed,
                Err(error) => {
                    let _ = events.send(Event::SubscriptionFailed {
                        subscription,
                        error,
                    });
                    return;
                }
            };
            while let Some(shifts) = feed.next().await {
                let delivered = Event::ShiftsDelivered {
                    subscription,
                    shifts,
                };
                if events.send(delivered).is_err() {
                    break;
                }
            }
        });
        if let Some(replaced) = self.feeds.insert(subscription, feed) {
            replaced.abort();
        }
    }

    fn close_feed(&mut self, subscription: SubscriptionId) {
        if let Some(feed) = self.feeds.remove(&subscription) {
            feed.abort();
        }
    }
}
