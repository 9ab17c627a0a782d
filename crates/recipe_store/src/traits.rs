//! Persistence gateway trait definitions.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use entities::{NewRecipe, Recipe, RecipeId, RecipePatch};
use tokio::sync::mpsc;

use crate::GatewayResult;

/// How a backend makes its own writes visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A write is durable and visible as soon as the call returns, so callers
    /// may mirror it into memory directly.
    Immediate,
    /// A write is only reflected by a later snapshot on the subscription.
    Subscription,
}

/// Trait for recipe persistence backends.
#[async_trait]
pub trait RecipeGateway: Send + Sync {
    /// Reports how writes become visible.
    fn delivery(&self) -> Delivery;

    /// Fetches the whole collection, newest first.
    async fn fetch_all(&self) -> GatewayResult<Vec<Recipe>>;

    /// Starts a subscription that receives the current collection right away
    /// and a fresh snapshot after every committed write.
    async fn subscribe(&self) -> GatewayResult<Subscription>;

    /// Inserts a new record. The backend assigns the id and may replace the
    /// creation timestamp.
    async fn insert(&self, recipe: NewRecipe) -> GatewayResult<Recipe>;

    /// Writes only the fields present in the patch.
    async fn patch(&self, id: &RecipeId, patch: &RecipePatch) -> GatewayResult<()>;

    /// Removes a record. Removing an absent record succeeds.
    async fn remove(&self, id: &RecipeId) -> GatewayResult<()>;
}

/// A live feed of collection snapshots. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Vec<Recipe>>,
}

impl Subscription {
    /// Waits for the next snapshot. Returns `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<Vec<Recipe>> {
        self.receiver.recv().await
    }

    /// Returns a snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<Vec<Recipe>> {
        self.receiver.try_recv().ok()
    }
}

/// Fans snapshots out to every live subscription, in publish order.
#[derive(Debug, Default)]
pub struct SnapshotHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Vec<Recipe>>>>,
}

impl SnapshotHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and queues the initial snapshot for it.
    pub fn subscribe(&self, initial: Vec<Recipe>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is alive.
        let _ = sender.send(initial);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        Subscription { receiver }
    }

    /// Sends a snapshot to every subscriber, dropping the ones that hung up.
    pub fn publish(&self, snapshot: &[Recipe]) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(snapshot.to_vec()).is_ok());
        tracing::trace!(
            subscribers = subscribers.len(),
            recipes = snapshot.len(),
            "Published snapshot"
        );
    }

    /// Number of subscriptions that were alive at the last publish.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }
}
