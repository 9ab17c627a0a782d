//! Change notifications for views of the collection.

use entities::RecipeId;
use tokio::sync::broadcast;

/// Capacity of the change notification channel.
const CHANNEL_CAPACITY: usize = 256;

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Emitted after the in-memory collection changes. Views re-project on
/// receipt; the revision only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    /// The whole collection was replaced by a snapshot.
    Replaced { revision: u64, count: usize },
    /// One record was created, updated or deleted in place.
    Mutated {
        revision: u64,
        id: RecipeId,
        change: ChangeKind,
    },
}

impl CollectionEvent {
    /// Revision of the collection after this change.
    pub fn revision(&self) -> u64 {
        match self {
            Self::Replaced { revision, .. } | Self::Mutated { revision, .. } => *revision,
        }
    }
}

/// Broadcaster for collection events.
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<CollectionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event.
    pub fn broadcast(&self, event: CollectionEvent) {
        tracing::trace!(?event, "Collection changed");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.broadcast(CollectionEvent::Replaced {
            revision: 1,
            count: 0,
        });
        assert_eq!(rx.recv().await.unwrap().revision(), 1);
    }

    #[test]
    fn test_broadcast_without_subscribers_is_fine() {
        EventBroadcaster::new().broadcast(CollectionEvent::Mutated {
            revision: 3,
            id: RecipeId::new("r1"),
            change: ChangeKind::Deleted,
        });
    }
}
