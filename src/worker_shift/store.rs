//! In-process document store with the two collections the screens use.
//!
//! Every mutation happens under one lock and publishes the resulting
//! collection to live subscriptions before the lock is released, so
//! subscribers observe mutations in the order they were applied.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::error::RepositoryError;
use super::repository::{ShiftRepository, ShiftSnapshot, ShiftSubscription};
use super::shift::{Shift, ShiftDataset, ShiftId, ShiftStatus, UserId, UserProfile};

pub const SHIFTS: &str = "shifts";
pub const USERS: &str = "users";

#[derive(Default)]
struct Collections {
    shifts: Vec<Shift>,
    users: HashMap<UserId, UserProfile>,
}

pub struct InMemoryShiftStore {
    collections: Mutex<Collections>,
    feed: watch::Sender<ShiftSnapshot>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for InMemoryShiftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryShiftStore {
    pub fn new() -> Self {
        let (feed, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            collections: Mutex::new(Collections::default()),
            feed,
            offline: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn from_dataset(dataset: &ShiftDataset) -> Result<Self, Error> {
        let store = Self::new();
        {
            let mut collections = store.collections.lock();
            collections.shifts = dataset.validated_shifts()?;
            for profile in dataset.profiles() {
                collections.users.insert(profile.id.clone(), profile);
            }
            store.publish(&collections);
        }
        tracing::debug!(
            shifts = dataset.shifts.len(),
            users = dataset.users.len(),
            "seeded shift store"
        );
        Ok(store)
    }

    /// Adds a shift, or replaces the one with the same id in place.
    pub fn insert_shift(&self, shift: Shift) {
        let mut collections = self.collections.lock();
        match collections.shifts.iter_mut().find(|s| s.id == shift.id) {
            Some(existing) => *existing = shift,
            None => collections.shifts.push(shift),
        }
        self.publish(&collections);
    }

    pub fn remove_shift(&self, shift_id: &ShiftId) -> Option<Shift> {
        let mut collections = self.collections.lock();
        let position = collections.shifts.iter().position(|s| &s.id == shift_id)?;
        let removed = collections.shifts.remove(position);
        self.publish(&collections);
        Some(removed)
    }

    pub fn put_user(&self, profile: UserProfile) {
        self.collections
            .lock()
            .users
            .insert(profile.id.clone(), profile);
    }

    pub fn shift(&self, shift_id: &ShiftId) -> Option<Shift> {
        self.collections
            .lock()
            .shifts
            .iter()
            .find(|s| &s.id == shift_id)
            .cloned()
    }

    pub fn shifts(&self) -> Vec<Shift> {
        self.collections.lock().shifts.clone()
    }

    /// Every request fails with [`RepositoryError::Transport`] while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay applied to every request before it reaches the collections.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    pub fn live_subscriptions(&self) -> usize {
        self.feed.receiver_count()
    }

    fn publish(&self, collections: &Collections) {
        self.feed.send_replace(Arc::new(collections.shifts.clone()));
    }

    async fn round_trip(&self) -> Result<(), RepositoryError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Transport("store is offline".to_string()));
        }
        Ok(())
    }

    fn compare_and_reserve(
        &self,
        shift_id: &ShiftId,
        by_user: &UserId,
    ) -> Result<(), RepositoryError> {
        let mut collections = self.collections.lock();
        let shift = collections
            .shifts
            .iter_mut()
            .find(|s| &s.id == shift_id)
            .ok_or_else(|| RepositoryError::not_found(SHIFTS, shift_id.as_str()))?;

        if shift.status != ShiftStatus::Available {
            return Err(RepositoryError::PreconditionFailed {
                shift_id: shift_id.clone(),
                expected: ShiftStatus::Available,
                actual: shift.status,
            });
        }
        shift.mark_reserved(by_user);

        self.publish(&collections);
        Ok(())
    }

    fn apply_cancel(&self, shift_id: &ShiftId) -> Result<(), RepositoryError> {
        let mut collections = self.collections.lock();
        let shift = collections
            .shifts
            .iter_mut()
            .find(|s| &s.id == shift_id)
            .ok_or_else(|| RepositoryError::not_found(SHIFTS, shift_id.as_str()))?;

        if shift.mark_cancelled() {
            self.publish(&collections);
        }
        Ok(())
    }
}

#[async_trait]
impl ShiftRepository for InMemoryShiftStore {
    async fn subscribe(&self) -> Result<ShiftSubscription, RepositoryError> {
        self.round_trip().await?;
        Ok(ShiftSubscription::new(self.feed.subscribe()))
    }

    async fn reserve(&self, shift_id: &ShiftId, by_user: &UserId) -> Result<(), RepositoryError> {
        self.round_trip().await?;
        self.compare_and_reserve(shift_id, by_user)
    }

    async fn cancel(&self, shift_id: &ShiftId) -> Result<(), RepositoryError> {
        self.round_trip().await?;
        self.apply_cancel(shift_id)
    }

    async fn fetch_user(&self, user_id: &UserId) -> Result<UserProfile, RepositoryError> {
        self.round_trip().await?;
        let profile = self.collections.lock().users.get(user_id).cloned();
        profile.ok_or_else(|| RepositoryError::not_found(USERS, user_id.as_str()))
    }
}
