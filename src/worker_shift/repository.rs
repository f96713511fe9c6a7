//! The seam between the screens and the document store.
//!
//! A [`ShiftRepository`] hands out live [`ShiftSubscription`]s over the whole
//! `shifts` collection and accepts the two writes a worker can make. Writes
//! are requests: their effect becomes visible through the subscription, never
//! through the write's return value.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::error::RepositoryError;
use super::shift::{Shift, ShiftId, UserId, UserProfile};

/// One delivery of the full `shifts` collection, in store order.
pub type ShiftSnapshot = Arc<Vec<Shift>>;

#[async_trait]
pub trait ShiftRepository: Send + Sync {
    /// Opens a live query over every shift. The first [`ShiftSubscription::next`]
    /// yields the current contents.
    async fn subscribe(&self) -> Result<ShiftSubscription, RepositoryError>;

    /// Conditional transition `available -> reserved`, applied atomically by
    /// the store. Fails with [`RepositoryError::PreconditionFailed`] when the
    /// shift is no longer available.
    async fn reserve(&self, shift_id: &ShiftId, by_user: &UserId) -> Result<(), RepositoryError>;

    /// Unconditional transition to `cancelled`. Cancelling twice is not an error.
    async fn cancel(&self, shift_id: &ShiftId) -> Result<(), RepositoryError>;

    async fn fetch_user(&self, user_id: &UserId) -> Result<UserProfile, RepositoryError>;
}

/// Stops a [`ShiftSubscription`]. Clones share the same switch.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancelled: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                cancelled: Arc::new(sender),
            },
            receiver,
        )
    }

    pub fn cancel(&self) {
        self.cancelled.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

/// A live feed of [`ShiftSnapshot`]s.
///
/// Deliveries are serialized by `&mut self`. A consumer that falls behind
/// skips intermediate snapshots but always receives the latest one.
#[derive(Debug)]
pub struct ShiftSubscription {
    feed: watch::Receiver<ShiftSnapshot>,
    cancelled: watch::Receiver<bool>,
    handle: SubscriptionHandle,
    primed: bool,
}

impl ShiftSubscription {
    pub fn new(feed: watch::Receiver<ShiftSnapshot>) -> Self {
        let (handle, cancelled) = SubscriptionHandle::new();
        Self {
            feed,
            cancelled,
            handle,
            primed: false,
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Waits for the next snapshot. Returns `None` once cancelled or once the
    /// store has gone away.
    pub async fn next(&mut self) -> Option<ShiftSnapshot> {
        if *self.cancelled.borrow() {
            return None;
        }

        if !self.primed {
            self.primed = true;
            return Some(self.feed.borrow_and_update().clone());
        }

        let changed = tokio::select! {
            biased;
            _ = self.cancelled.wait_for(|cancelled| *cancelled) => false,
            result = self.feed.changed() => result.is_ok(),
        };
        if !changed {
            return None;
        }

        Some(self.feed.borrow_and_update().clone())
    }
}

/// Callback form of [`ShiftRepository::subscribe`]: `on_update` runs once
/// with the current contents and again after every change, one call at a
/// time, until the returned handle is cancelled.
pub async fn subscribe_with<F>(
    repository: &dyn ShiftRepository,
    mut on_update: F,
) -> Result<SubscriptionHandle, RepositoryError>
where
    F: FnMut(ShiftSnapshot) + Send + 'static,
{
    let mut subscription = repository.subscribe().await?;
    let handle = subscription.handle();

    tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            on_update(snapshot);
        }
        tracing::debug!("shift subscription closed");
    });

    Ok(handle)
}
