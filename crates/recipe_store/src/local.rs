//! Local key-value backend.
//!
//! The entire collection lives as one JSON array under a single storage key
//! and is read and rewritten wholesale on every mutation.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use entities::{NewRecipe, Recipe, RecipeId, RecipePatch};
use tokio::sync::{Mutex, RwLock};

use crate::{Delivery, GatewayError, GatewayResult, RecipeGateway, SnapshotHub, Subscription};

/// Default key the collection is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "recipes";

/// A string key-value store.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    async fn get(&self, key: &str) -> GatewayResult<Option<String>>;

    /// Replaces the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> GatewayResult<()>;
}

/// In-memory key-value storage for testing purposes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, like a full quota.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> GatewayResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable("storage quota exceeded"));
        }
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Gateway over a local key-value store with immediate delivery.
#[derive(Debug)]
pub struct LocalGateway<S> {
    storage: S,
    key: String,
    hub: SnapshotHub,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl<S: KeyValueStorage> LocalGateway<S> {
    /// Creates a gateway storing its collection under [`DEFAULT_STORAGE_KEY`].
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    /// Creates a gateway storing its collection under the given key.
    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            hub: SnapshotHub::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn read_all(&self) -> GatewayResult<Vec<Recipe>> {
        match self.storage.get(&self.key).await? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                tracing::error!(key = %self.key, error = %e, "Stored recipe collection is corrupt");
                GatewayError::corrupt(&self.key, e)
            }),
        }
    }

    async fn write_all(&self, recipes: &[Recipe]) -> GatewayResult<()> {
        let raw = serde_json::to_string(recipes)?;
        self.storage.set(&self.key, &raw).await?;
        self.hub.publish(recipes);
        Ok(())
    }

    /// Millisecond timestamp id, bumped past any numeric id already in use.
    fn next_id(recipes: &[Recipe]) -> RecipeId {
        let now = Utc::now().timestamp_millis();
        let latest = recipes
            .iter()
            .filter_map(|r| r.id.as_str().parse::<i64>().ok())
            .max();
        let id = match latest {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        };
        RecipeId::new(id.to_string())
    }
}

#[async_trait]
impl<S: KeyValueStorage> RecipeGateway for LocalGateway<S> {
    fn delivery(&self) -> Delivery {
        Delivery::Immediate
    }

    async fn fetch_all(&self) -> GatewayResult<Vec<Recipe>> {
        self.read_all().await
    }

    async fn subscribe(&self) -> GatewayResult<Subscription> {
        let _guard = self.write_lock.lock().await;
        let recipes = self.read_all().await?;
        Ok(self.hub.subscribe(recipes))
    }

    async fn insert(&self, recipe: NewRecipe) -> GatewayResult<Recipe> {
        let _guard = self.write_lock.lock().await;
        let mut recipes = self.read_all().await?;
        let recipe = recipe.into_recipe(Self::next_id(&recipes));
        recipes.insert(0, recipe.clone());
        self.write_all(&recipes).await?;
        Ok(recipe)
    }

    async fn patch(&self, id: &RecipeId, patch: &RecipePatch) -> GatewayResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut recipes = self.read_all().await?;
        let Some(recipe) = recipes.iter_mut().find(|r| &r.id == id) else {
            return Err(GatewayError::NotFound(id.to_string()));
        };
        patch.apply_to(recipe);
        self.write_all(&recipes).await
    }

    async fn remove(&self, id: &RecipeId) -> GatewayResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut recipes = self.read_all().await?;
        let before = recipes.len();
        recipes.retain(|r| &r.id != id);
        if recipes.len() == before {
            return Ok(());
        }
        self.write_all(&recipes).await
    }
}

#[cfg(test)]
mod tests {
    use entities::{LogDraft, LogEntry, RecipeDraft};
    use tokio_test::assert_ok;

    use super::*;

    fn draft(name: &str) -> NewRecipe {
        RecipeDraft::new(name, format!("https://example.com/{name}"))
            .validate(Utc::now(), None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_storage_is_empty_collection() {
        let gateway = LocalGateway::new(MemoryStorage::new());
        assert!(gateway.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_prepends_and_persists_whole_array() {
        let gateway = LocalGateway::new(MemoryStorage::new());
        let first = gateway.insert(draft("first")).await.unwrap();
        let second = gateway.insert(draft("second")).await.unwrap();
        assert_ne!(first.id, second.id);

        let raw = gateway.storage().get(DEFAULT_STORAGE_KEY).await.unwrap().unwrap();
        let stored: Vec<Recipe> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].name, "second");
        assert_eq!(stored[1].name, "first");
    }

    #[tokio::test]
    async fn test_patch_replaces_logs() {
        let gateway = LocalGateway::new(MemoryStorage::new());
        let recipe = gateway.insert(draft("Curry")).await.unwrap();

        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let logs = vec![LogEntry::from_draft(1, LogDraft::new(date), None)];
        let patch = RecipePatch::new().with_logs(logs).with_cooked(true);
        assert_ok!(gateway.patch(&recipe.id, &patch).await);

        let stored = gateway.fetch_all().await.unwrap();
        assert_eq!(stored[0].logs.len(), 1);
        assert!(stored[0].cooked);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let gateway = LocalGateway::new(MemoryStorage::new());
        let recipe = gateway.insert(draft("Curry")).await.unwrap();

        assert_ok!(gateway.remove(&recipe.id).await);
        assert_ok!(gateway.remove(&recipe.id).await);
        assert!(gateway.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_storage_fails_fast() {
        let storage = MemoryStorage::new();
        storage.set(DEFAULT_STORAGE_KEY, "{not json").await.unwrap();
        let gateway = LocalGateway::new(storage);

        let result = gateway.fetch_all().await;
        assert!(matches!(result, Err(GatewayError::CorruptState { .. })));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_storage_untouched() {
        let gateway = LocalGateway::new(MemoryStorage::new());
        gateway.insert(draft("Curry")).await.unwrap();
        gateway.storage().set_read_only(true);

        assert!(gateway.insert(draft("Soup")).await.is_err());
        assert_eq!(gateway.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_key() {
        let gateway = LocalGateway::with_key(MemoryStorage::new(), "family");
        gateway.insert(draft("Curry")).await.unwrap();
        assert!(gateway.storage().get("family").await.unwrap().is_some());
        assert!(gateway.storage().get(DEFAULT_STORAGE_KEY).await.unwrap().is_none());
    }
}
