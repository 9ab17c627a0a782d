//! In-process document store with live snapshots.
//!
//! Behaves like a remote sync store: ids and creation timestamps are assigned
//! by the "server", and every committed write is pushed to subscribers as a
//! full snapshot ordered by creation time, newest first.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use entities::{NewRecipe, Recipe, RecipeId, RecipePatch};
use tokio::sync::RwLock;

use crate::{Delivery, GatewayError, GatewayResult, RecipeGateway, SnapshotHub, Subscription};

/// Document store backend with subscription delivery.
#[derive(Debug, Default)]
pub struct DocumentGateway {
    documents: RwLock<HashMap<RecipeId, Recipe>>,
    hub: SnapshotHub,
    offline: AtomicBool,
}

impl DocumentGateway {
    /// Creates an empty document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with documents.
    pub fn with_documents(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let documents = recipes.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    /// Simulates losing or regaining the connection. While unavailable every
    /// call fails and nothing is written.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn ensure_available(&self) -> GatewayResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable("document store is offline"));
        }
        Ok(())
    }

    fn snapshot(documents: &HashMap<RecipeId, Recipe>) -> Vec<Recipe> {
        let mut result: Vec<Recipe> = documents.values().cloned().collect();
        result.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        result
    }

    /// Server timestamp, kept strictly increasing so creation order is total.
    fn server_timestamp(documents: &HashMap<RecipeId, Recipe>) -> DateTime<Utc> {
        let now = Utc::now();
        match documents.values().map(|r| r.created_at).max() {
            Some(latest) if latest >= now => latest + Duration::microseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl RecipeGateway for DocumentGateway {
    fn delivery(&self) -> Delivery {
        Delivery::Subscription
    }

    async fn fetch_all(&self) -> GatewayResult<Vec<Recipe>> {
        self.ensure_available()?;
        let documents = self.documents.read().await;
        Ok(Self::snapshot(&documents))
    }

    async fn subscribe(&self) -> GatewayResult<Subscription> {
        self.ensure_available()?;
        // Hold the lock so no write slips between the initial snapshot and
        // registration.
        let documents = self.documents.read().await;
        Ok(self.hub.subscribe(Self::snapshot(&documents)))
    }

    async fn insert(&self, recipe: NewRecipe) -> GatewayResult<Recipe> {
        self.ensure_available()?;
        let mut documents = self.documents.write().await;
        let mut recipe = recipe.into_recipe(RecipeId::generate());
        recipe.created_at = Self::server_timestamp(&documents);
        documents.insert(recipe.id.clone(), recipe.clone());
        self.hub.publish(&Self::snapshot(&documents));
        Ok(recipe)
    }

    async fn patch(&self, id: &RecipeId, patch: &RecipePatch) -> GatewayResult<()> {
        self.ensure_available()?;
        let mut documents = self.documents.write().await;
        let Some(recipe) = documents.get_mut(id) else {
            return Err(GatewayError::NotFound(id.to_string()));
        };
        patch.apply_to(recipe);
        self.hub.publish(&Self::snapshot(&documents));
        Ok(())
    }

    async fn remove(&self, id: &RecipeId) -> GatewayResult<()> {
        self.ensure_available()?;
        let mut documents = self.documents.write().await;
        if documents.remove(id).is_some() {
            self.hub.publish(&Self::snapshot(&documents));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use entities::{Rating, RecipeDraft};
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn draft(name: &str) -> NewRecipe {
        RecipeDraft::new(name, format!("https://example.com/{name}"))
            .validate(Utc::now(), None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_document_crud() {
        let store = DocumentGateway::new();

        // Create
        let created = store.insert(draft("Curry")).await.unwrap();
        assert_eq!(created.name, "Curry");

        // Patch
        let patch = RecipePatch::new().with_rating(Rating::new(3).unwrap());
        assert_ok!(store.patch(&created.id, &patch).await);
        let all = store.fetch_all().await.unwrap();
        assert_eq!(all[0].rating.value(), 3);

        // Remove twice
        assert_ok!(store.remove(&created.id).await);
        assert_ok!(store.remove(&created.id).await);
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_are_newest_first() {
        let store = DocumentGateway::new();
        store.insert(draft("first")).await.unwrap();
        store.insert(draft("second")).await.unwrap();
        store.insert(draft("third")).await.unwrap();

        let names: Vec<String> = store
            .fetch_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_subscription_sees_every_write() {
        let store = DocumentGateway::new();
        let mut subscription = store.subscribe().await.unwrap();
        assert!(subscription.next().await.unwrap().is_empty());

        let created = store.insert(draft("Curry")).await.unwrap();
        assert_eq!(subscription.next().await.unwrap().len(), 1);

        store
            .patch(&created.id, &RecipePatch::new().with_cooked(true))
            .await
            .unwrap();
        let snapshot = subscription.next().await.unwrap();
        assert!(snapshot[0].cooked);
    }

    #[tokio::test]
    async fn test_patch_unknown_document_fails() {
        let store = DocumentGateway::new();
        let result = store
            .patch(&RecipeId::new("missing"), &RecipePatch::new().with_cooked(true))
            .await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offline_store_writes_nothing() {
        let store = DocumentGateway::new();
        store.set_available(false);
        assert_err!(store.insert(draft("Curry")).await);

        store.set_available(true);
        assert!(store.fetch_all().await.unwrap().is_empty());
    }
}
