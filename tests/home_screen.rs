use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use worker_shift_planner::worker_shift::projection::{my_planned_shifts, planned_count};
use worker_shift_planner::{
    subscribe_with, InMemoryShiftStore, Phase, PlannerConfig, RepositoryError, Session, Shift,
    ShiftDataset, ShiftId, ShiftOverview, ShiftRepository, ShiftScreen, ShiftStatus, UserId,
    UserProfile,
};

fn shift(id: &str, day: u32) -> Shift {
    Shift::available(id, Utc.with_ymd_and_hms(2024, 12, day, 8, 0, 0).unwrap())
}

fn profile(id: &str, first_name: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        first_name: first_name.to_string(),
        last_name: "Jansen".to_string(),
    }
}

fn store_with(shifts: Vec<Shift>) -> Arc<InMemoryShiftStore> {
    let store = InMemoryShiftStore::new();
    for shift in shifts {
        store.insert_shift(shift);
    }
    store.put_user(profile("u1", "bram"));
    Arc::new(store)
}

fn open(store: &Arc<InMemoryShiftStore>, user: Option<&str>) -> ShiftScreen {
    ShiftScreen::activate(
        store.clone(),
        user.map(Session::new),
        PlannerConfig::default(),
    )
}

async fn until<F>(screen: &ShiftScreen, predicate: F) -> ShiftOverview
where
    F: FnMut(&ShiftOverview) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), screen.wait_for(predicate))
        .await
        .expect("screen never reached the expected state")
        .expect("screen closed")
}

#[tokio::test]
async fn test_reserve_is_reflected_by_the_feed() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));

    let overview = until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(overview.greeting, "Hallo bram");
    assert_eq!(overview.initial, "B");
    assert_eq!(overview.planned_count, 0);
    assert_eq!(overview.available_shifts.len(), 1);

    screen.request_reserve("a");
    let overview = until(&screen, |o| o.confirmation.is_some()).await;
    let prompt = overview.confirmation.unwrap();
    assert_eq!(prompt.shift_id, ShiftId::new("a"));
    assert_eq!(prompt.question, "Wil je deze shift reserveren?");

    screen.confirm_reserve("a");
    let overview = until(&screen, |o| o.planned_count == 1).await;
    assert_eq!(overview.planned_shifts[0].id, ShiftId::new("a"));
    assert!(overview.available_shifts.is_empty());
    assert!(overview.notice.is_none());

    let stored = store.shift(&ShiftId::new("a")).unwrap();
    assert_eq!(stored.status, ShiftStatus::Reserved);
    assert_eq!(stored.reserved_by, Some(UserId::new("u1")));

    screen.tear_down().await;
}

#[tokio::test]
async fn test_subscription_delivery_after_reserve() {
    let store = store_with(vec![shift("a", 3)]);
    let (sender, mut deliveries) = tokio::sync::mpsc::unbounded_channel();
    let handle = subscribe_with(&*store, move |snapshot| {
        let _ = sender.send(snapshot);
    })
    .await
    .unwrap();

    let initial = deliveries.recv().await.unwrap();
    assert_eq!(initial[0].status, ShiftStatus::Available);

    store
        .reserve(&ShiftId::new("a"), &UserId::new("u1"))
        .await
        .unwrap();
    let updated = deliveries.recv().await.unwrap();
    let user = UserId::new("u1");
    assert_eq!(my_planned_shifts(&updated, &user), vec![&updated[0]]);
    assert_eq!(planned_count(&updated, &user), 1);

    handle.cancel();
}

#[tokio::test]
async fn test_missing_profile_degrades_greeting() {
    let store = store_with(vec![]);
    let screen = open(&store, Some("stranger"));

    let overview = until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(overview.greeting, "Hallo");
    assert_eq!(overview.initial, "?");
    assert!(overview.notice.is_none());

    screen.tear_down().await;
}

#[tokio::test]
async fn test_empty_feed() {
    let store = store_with(vec![]);
    let screen = open(&store, Some("u1"));

    let overview = until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(overview.next_shift, None);
    assert_eq!(overview.planned_count, 0);
    assert!(overview.available_shifts.is_empty());
    assert!(overview.planned_shifts.is_empty());

    screen.tear_down().await;
}

#[tokio::test]
async fn test_lost_race_shows_notice_and_keeps_list() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    screen.request_reserve("a");
    until(&screen, |o| o.confirmation.is_some()).await;

    // another worker claims it while the prompt is open
    store
        .reserve(&ShiftId::new("a"), &UserId::new("u2"))
        .await
        .unwrap();
    screen.confirm_reserve("a");

    let overview = until(&screen, |o| o.notice.is_some()).await;
    let notice = overview.notice.unwrap();
    assert_eq!(notice.shift_id, Some(ShiftId::new("a")));
    assert_eq!(
        notice.message,
        RepositoryError::PreconditionFailed {
            shift_id: ShiftId::new("a"),
            expected: ShiftStatus::Available,
            actual: ShiftStatus::Reserved,
        }
        .notice_text()
    );
    assert_eq!(overview.planned_count, 0);
    assert_eq!(
        store.shift(&ShiftId::new("a")).unwrap().reserved_by,
        Some(UserId::new("u2"))
    );

    screen.dismiss_notice();
    let overview = until(&screen, |o| o.notice.is_none()).await;
    assert_eq!(overview.phase, Phase::Ready);

    screen.tear_down().await;
}

#[tokio::test]
async fn test_offline_cancel_leaves_state_unchanged() {
    let store = store_with(vec![shift("a", 3)]);
    store
        .reserve(&ShiftId::new("a"), &UserId::new("u1"))
        .await
        .unwrap();
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready && o.planned_count == 1).await;

    store.set_offline(true);
    screen.request_cancel("a");
    until(&screen, |o| o.confirmation.is_some()).await;
    screen.confirm_cancel("a");

    let overview = until(&screen, |o| o.notice.is_some()).await;
    assert_eq!(overview.planned_count, 1);
    assert_eq!(
        store.shift(&ShiftId::new("a")).unwrap().status,
        ShiftStatus::Reserved
    );

    store.set_offline(false);
    screen.request_cancel("a");
    until(&screen, |o| o.confirmation.is_some()).await;
    screen.confirm_cancel("a");
    let overview = until(&screen, |o| o.planned_count == 0).await;
    assert!(overview.available_shifts.is_empty());

    screen.tear_down().await;
}

#[tokio::test]
async fn test_aborted_prompt_writes_nothing() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    screen.request_reserve("a");
    until(&screen, |o| o.confirmation.is_some()).await;
    screen.abort();
    until(&screen, |o| o.confirmation.is_none()).await;

    assert_eq!(
        store.shift(&ShiftId::new("a")).unwrap().status,
        ShiftStatus::Available
    );
    screen.tear_down().await;
}

#[tokio::test]
async fn test_signed_out_worker_cannot_write() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, None);

    let overview = until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(overview.available_shifts.len(), 1);

    screen.request_reserve("a");
    let overview = until(&screen, |o| o.notice.is_some()).await;
    assert!(overview.confirmation.is_none());
    assert_eq!(
        overview.notice.unwrap().message,
        RepositoryError::Unauthenticated.notice_text()
    );
    assert_eq!(
        store.shift(&ShiftId::new("a")).unwrap().status,
        ShiftStatus::Available
    );

    screen.tear_down().await;
}

#[tokio::test]
async fn test_changes_from_other_clients_are_rendered() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    store.insert_shift(shift("b", 4));
    let overview = until(&screen, |o| o.available_shifts.len() == 2).await;
    assert_eq!(overview.available_shifts[1].id, ShiftId::new("b"));

    store.remove_shift(&ShiftId::new("a"));
    let overview = until(&screen, |o| o.available_shifts.len() == 1).await;
    assert_eq!(overview.next_shift.unwrap().id, ShiftId::new("b"));

    screen.tear_down().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_indicator_stays_for_minimum_delay() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    store.put_user(profile("u1", "sanne"));
    let started = tokio::time::Instant::now();
    screen.refresh();

    let overview = until(&screen, |o| o.refreshing).await;
    assert_eq!(overview.phase, Phase::Refreshing);

    let overview = until(&screen, |o| !o.refreshing && o.phase == Phase::Ready).await;
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(overview.greeting, "Hallo sanne");
    // the replaced feed is released
    assert_eq!(store.live_subscriptions(), 1);

    screen.tear_down().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_live_feed() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(store.live_subscriptions(), 1);

    store.set_offline(true);
    screen.refresh();
    let overview = until(&screen, |o| o.notice.is_some()).await;
    assert_eq!(
        overview.notice.unwrap().message,
        RepositoryError::Transport(String::new()).notice_text()
    );

    let overview = until(&screen, |o| o.phase == Phase::Ready && !o.refreshing).await;
    assert_eq!(overview.available_shifts.len(), 1);
    assert_eq!(store.live_subscriptions(), 1);

    store.set_offline(false);
    store.insert_shift(shift("b", 4));
    let overview = until(&screen, |o| o.available_shifts.len() == 2).await;
    assert_eq!(overview.available_shifts[1].id, ShiftId::new("b"));

    screen.tear_down().await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_during_write_discards_result() {
    let store = store_with(vec![shift("a", 3)]);
    let screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    store.set_latency(Duration::from_millis(200));
    screen.request_reserve("a");
    until(&screen, |o| o.confirmation.is_some()).await;
    screen.confirm_reserve("a");
    until(&screen, |o| o.confirmation.is_none()).await;

    let renders = screen.renders();
    screen.tear_down().await;
    let last = renders.borrow().clone();

    tokio::time::sleep(Duration::from_millis(500)).await;

    // the request itself still lands in the store
    assert_eq!(
        store.shift(&ShiftId::new("a")).unwrap().status,
        ShiftStatus::Reserved
    );
    assert_eq!(*renders.borrow(), last);
    assert_eq!(last.planned_count, 0);
    assert!(renders.has_changed().is_err());
    assert_eq!(store.live_subscriptions(), 0);
}

#[tokio::test]
async fn test_profile_navigation() {
    let store = store_with(vec![]);
    let mut screen = open(&store, Some("u1"));
    until(&screen, |o| o.phase == Phase::Ready).await;

    screen.navigate_to_profile();
    let opened = screen.next_navigation().await.unwrap();
    assert_eq!(opened, profile("u1", "bram"));

    screen.tear_down().await;
}

#[tokio::test]
async fn test_dataset_home_screen() {
    let path = PathBuf::from_str("./test_datasets/shifts.json").unwrap();
    let dataset = ShiftDataset::from_json_file(&path).unwrap();
    let store = Arc::new(InMemoryShiftStore::from_dataset(&dataset).unwrap());
    let screen = open(&store, Some("worker-anna"));

    let overview = until(&screen, |o| o.phase == Phase::Ready).await;
    assert_eq!(overview.greeting, "Hallo Anna");
    assert_eq!(overview.planned_count, 2);
    assert_eq!(overview.planned_shifts[0].id, ShiftId::new("shift-002"));
    assert_eq!(overview.planned_shifts[1].date, "3-12-2024");
    assert_eq!(overview.planned_shifts[1].start, "00:30:00");
    assert_eq!(overview.available_shifts.len(), 2);
    // head of the feed, although it is neither Anna's nor the earliest
    assert_eq!(overview.next_shift.unwrap().id, ShiftId::new("shift-001"));

    screen.tear_down().await;
}
