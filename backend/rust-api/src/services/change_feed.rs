//! Push-based invalidation for live views.
//!
//! Writers publish a [`ChangeEvent`] per (user, topic) after a successful
//! store write; readers hold a [`Subscription`] and re-read whatever they
//! render. Dropping a subscription unregisters it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::LearningError;
use crate::models::dashboard::{AttemptSummary, ChangeEvent, ChangeTopic, DashboardSnapshot};
use crate::models::AttemptQuery;
use crate::services::store::ProgressStore;

const CHANNEL_CAPACITY: usize = 64;

type ChannelKey = (String, ChangeTopic);

#[derive(Clone, Default)]
pub struct ChangeFeed {
    channels: Arc<Mutex<HashMap<ChannelKey, broadcast::Sender<ChangeEvent>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, user_id: &str, topic: ChangeTopic) {
        let channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sender) = channels.get(&(user_id.to_string(), topic)) {
            let event = ChangeEvent {
                user_id: user_id.to_string(),
                topic,
                timestamp: Utc::now(),
            };
            // No receivers is fine: nobody is watching this user right now.
            let _ = sender.send(event);
        }
    }

    pub fn subscribe(&self, user_id: &str, topic: ChangeTopic) -> Subscription {
        let key = (user_id.to_string(), topic);
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let receiver = channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        tracing::debug!("Subscribed to {:?} changes for user {}", topic, user_id);
        Subscription {
            key,
            receiver: Some(receiver),
            feed: self.clone(),
        }
    }

    pub fn subscriber_count(&self, user_id: &str, topic: ChangeTopic) -> usize {
        let channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .get(&(user_id.to_string(), topic))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn prune(&self, key: &ChannelKey) {
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if channels
            .get(key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(key);
        }
    }
}

pub struct Subscription {
    key: ChannelKey,
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    feed: ChangeFeed,
}

impl Subscription {
    /// Waits for the next change. A lagging receiver gets a single coalesced
    /// event, which is enough since readers re-read the documents anyway.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "Subscription for user {} lagged by {} events",
                    self.key.0,
                    skipped
                );
                Some(ChangeEvent {
                    user_id: self.key.0.clone(),
                    topic: self.key.1,
                    timestamp: Utc::now(),
                })
            }
            Err(RecvError::Closed) => None,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let event = subscription.recv().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Release the receiver first so the channel can be pruned.
        self.receiver.take();
        self.feed.prune(&self.key);
        tracing::debug!(
            "Unsubscribed from {:?} changes for user {}",
            self.key.1,
            self.key.0
        );
    }
}

/// Reads the current dashboard snapshot for a user.
pub async fn dashboard_snapshot(
    store: &dyn ProgressStore,
    user_id: &str,
) -> Result<DashboardSnapshot, LearningError> {
    let query = AttemptQuery::for_user(user_id);
    let (profile, attempts) =
        futures::try_join!(store.get_profile(user_id), store.list_attempts(&query))?;

    Ok(DashboardSnapshot {
        user_id: user_id.to_string(),
        profile,
        attempts: AttemptSummary::from_attempts(&attempts),
        generated_at: Utc::now(),
    })
}

/// Snapshot stream composed from the profile and attempt-log subscriptions:
/// one snapshot immediately, then one per change.
pub fn dashboard_stream(
    store: Arc<dyn ProgressStore>,
    feed: &ChangeFeed,
    user_id: String,
) -> impl Stream<Item = Result<DashboardSnapshot, LearningError>> + Send + 'static {
    // Subscribe before the first read so no change slips between the two.
    let profile_changes = feed.subscribe(&user_id, ChangeTopic::Profile).into_stream();
    let attempt_changes = feed.subscribe(&user_id, ChangeTopic::Attempts).into_stream();

    let triggers = stream::once(async {})
        .chain(stream::select(profile_changes, attempt_changes).map(|_| ()));

    triggers.then(move |_| {
        let store = store.clone();
        let user_id = user_id.clone();
        async move { dashboard_snapshot(store.as_ref(), &user_id).await }
    })
}
