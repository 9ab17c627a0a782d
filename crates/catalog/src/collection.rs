//! The authoritative in-memory recipe collection.
//!
//! Reads are served from memory. Writes go to the gateway first and only
//! touch memory once the backend has accepted them: directly for backends
//! with immediate delivery, through the next subscription snapshot otherwise.

use std::{
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};

use chrono::Utc;
use entities::{
    next_log_id, Author, LogDraft, LogEntry, LogId, Rating, Recipe, RecipeDraft, RecipeId,
    RecipePatch,
};
use recipe_store::{Delivery, GatewayError, RecipeGateway};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};

use crate::{
    derive_categories, project, CatalogError, CatalogResult, CategoryFilter, ChangeKind,
    CollectionEvent, EventBroadcaster, Projection, SortKey,
};

/// How long a write on a subscription backend waits for its own snapshot.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// A consistent copy of the collection at one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    /// Records in delivered order (newest first).
    pub recipes: Vec<Recipe>,
    /// Derived category list.
    pub categories: Vec<String>,
    /// Revision this copy was taken at.
    pub revision: u64,
}

#[derive(Debug, Default)]
struct CollectionState {
    recipes: Vec<Recipe>,
    categories: Vec<String>,
    revision: u64,
}

impl CollectionState {
    fn replace(&mut self, recipes: Vec<Recipe>) -> CollectionEvent {
        self.recipes = recipes;
        self.categories = derive_categories(&self.recipes);
        self.revision += 1;
        CollectionEvent::Replaced {
            revision: self.revision,
            count: self.recipes.len(),
        }
    }

    fn mutated(&mut self, id: RecipeId, change: ChangeKind) -> CollectionEvent {
        self.categories = derive_categories(&self.recipes);
        self.revision += 1;
        CollectionEvent::Mutated {
            revision: self.revision,
            id,
            change,
        }
    }

    fn find(&self, id: &RecipeId) -> Option<&Recipe> {
        self.recipes.iter().find(|r| &r.id == id)
    }
}

/// Owns the recipe collection and applies mutations through a gateway.
pub struct RecipeCollectionStore {
    gateway: Arc<dyn RecipeGateway>,
    state: RwLock<CollectionState>,
    events: EventBroadcaster,
    identity: std::sync::RwLock<Option<Author>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
    // Serializes read-write-apply. On subscription backends it is held until
    // the write's snapshot has been applied, so the next whole-array write
    // never starts from a stale record.
    mutation_lock: tokio::sync::Mutex<()>,
}

impl RecipeCollectionStore {
    /// Creates an empty store over the given gateway.
    pub fn new(gateway: Arc<dyn RecipeGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(CollectionState::default()),
            events: EventBroadcaster::new(),
            identity: std::sync::RwLock::new(None),
            sync_task: Mutex::new(None),
            mutation_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// How the underlying gateway delivers writes.
    pub fn delivery(&self) -> Delivery {
        self.gateway.delivery()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Sets the signed-in author used to attribute new recipes and logs.
    pub fn sign_in(&self, author: Author) {
        tracing::info!(uid = %author.uid, "Signed in");
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(author);
    }

    /// Clears the identity and tears down any live subscription.
    pub fn sign_out(&self) {
        self.stop_sync();
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("Signed out");
    }

    /// The signed-in author, if any.
    pub fn identity(&self) -> Option<Author> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Loading and synchronization
    // =========================================================================

    /// Fetches the whole collection and replaces the in-memory set with it.
    pub async fn load_all(&self) -> CatalogResult<Vec<Recipe>> {
        let recipes = self.gateway.fetch_all().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load recipes");
            CatalogError::from(e)
        })?;
        self.apply_snapshot(recipes.clone()).await;
        Ok(recipes)
    }

    /// Replaces the in-memory collection atomically.
    pub async fn apply_snapshot(&self, recipes: Vec<Recipe>) {
        let event = {
            let mut state = self.state.write().await;
            state.replace(recipes)
        };
        tracing::debug!(revision = event.revision(), "Applied snapshot");
        self.events.broadcast(event);
    }

    /// Subscribes to the gateway and applies every snapshot it delivers, in
    /// order. Any previous subscription is torn down first, so at most one is
    /// ever active.
    pub async fn start_sync(self: &Arc<Self>) -> CatalogResult<()> {
        self.stop_sync();

        let mut subscription = self.gateway.subscribe().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to subscribe to recipes");
            CatalogError::from(e)
        })?;

        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.apply_snapshot(snapshot).await;
            }
            tracing::debug!("Recipe subscription ended");
        });

        let previous = self
            .sync_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::info!("Recipe sync started");
        Ok(())
    }

    /// Stops applying snapshots. Does nothing when no sync is running.
    pub fn stop_sync(&self) {
        let handle = self
            .sync_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Recipe sync stopped");
        }
    }

    /// Whether a subscription task is running.
    pub fn is_syncing(&self) -> bool {
        self.sync_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Subscribes to change notifications.
    pub fn events(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// A consistent copy of the collection.
    pub async fn snapshot(&self) -> CollectionSnapshot {
        let state = self.state.read().await;
        CollectionSnapshot {
            recipes: state.recipes.clone(),
            categories: state.categories.clone(),
            revision: state.revision,
        }
    }

    /// All recipes, newest first.
    pub async fn recipes(&self) -> Vec<Recipe> {
        self.state.read().await.recipes.clone()
    }

    /// Looks up one recipe.
    pub async fn get(&self, id: &RecipeId) -> Option<Recipe> {
        self.state.read().await.find(id).cloned()
    }

    /// The derived category list.
    pub async fn categories(&self) -> Vec<String> {
        self.state.read().await.categories.clone()
    }

    /// Current revision; grows with every applied change.
    pub async fn revision(&self) -> u64 {
        self.state.read().await.revision
    }

    /// Projects the current collection for display.
    pub async fn project(&self, sort: SortKey, filter: &CategoryFilter) -> Projection {
        let state = self.state.read().await;
        project(&state.recipes, sort, filter)
    }

    /// Waits until the collection satisfies `predicate`. Used to observe a
    /// write settling on subscription backends.
    pub async fn wait_until<F>(&self, predicate: F)
    where
        F: Fn(&[Recipe]) -> bool,
    {
        self.wait_for(|state| predicate(&state.recipes)).await;
    }

    /// Waits until at least `revision` changes have been applied.
    pub async fn wait_for_revision(&self, revision: u64) {
        self.wait_for(|state| state.revision >= revision).await;
    }

    async fn wait_for<F>(&self, predicate: F)
    where
        F: Fn(&CollectionState) -> bool,
    {
        let mut events = self.events.subscribe();
        loop {
            if predicate(&*self.state.read().await) {
                return;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                // The sender lives in `self`, so this cannot happen while we
                // hold `&self`.
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validates and stores a new recipe.
    ///
    /// With a subscription backend the record reaches the collection through
    /// the next snapshot. While sync is running this returns once that
    /// snapshot has been applied.
    pub async fn create(&self, draft: RecipeDraft) -> CatalogResult<Recipe> {
        let author = self.identity();
        let new_recipe = draft.validate(Utc::now(), author.as_ref()).map_err(|e| {
            tracing::warn!(field = e.field, "Rejected recipe draft");
            CatalogError::from(e)
        })?;

        let _guard = self.mutation_lock.lock().await;
        let recipe = self
            .gateway
            .insert(new_recipe)
            .await
            .map_err(|e| Self::persistence_failure("create", None, e))?;

        tracing::info!(recipe_id = %recipe.id, name = %recipe.name, "Created recipe");

        match self.delivery() {
            Delivery::Immediate => {
                let event = {
                    let mut state = self.state.write().await;
                    state.recipes.insert(0, recipe.clone());
                    state.mutated(recipe.id.clone(), ChangeKind::Created)
                };
                self.events.broadcast(event);
            }
            Delivery::Subscription => {
                self.settle_write(&recipe.id, |stored| stored.is_some()).await;
            }
        }
        Ok(recipe)
    }

    /// Writes only the supplied fields.
    ///
    /// Returns the record as it looks with the patch applied. With a
    /// subscription backend the collection itself catches up on the next
    /// snapshot.
    pub async fn update(&self, id: &RecipeId, patch: RecipePatch) -> CatalogResult<Recipe> {
        let _guard = self.mutation_lock.lock().await;
        let Some(recipe) = self.current(id).await? else {
            tracing::warn!(recipe_id = %id, "Update targets unknown recipe");
            return Err(CatalogError::not_found("Recipe", id));
        };
        self.update_locked(recipe, patch).await
    }

    // Caller holds `mutation_lock` and passes the record as it currently
    // stands in the backend.
    async fn update_locked(&self, mut recipe: Recipe, patch: RecipePatch) -> CatalogResult<Recipe> {
        if patch.is_empty() {
            return Ok(recipe);
        }
        let id = recipe.id.clone();

        self.gateway
            .patch(&id, &patch)
            .await
            .map_err(|e| Self::persistence_failure("update", Some(&id), e))?;

        tracing::info!(recipe_id = %id, fields = ?patch.field_names(), "Updated recipe");
        patch.apply_to(&mut recipe);

        match self.delivery() {
            Delivery::Immediate => {
                let event = {
                    let mut state = self.state.write().await;
                    if let Some(stored) = state.recipes.iter_mut().find(|r| r.id == id) {
                        patch.apply_to(stored);
                    }
                    state.mutated(id.clone(), ChangeKind::Updated)
                };
                self.events.broadcast(event);
            }
            Delivery::Subscription => {
                self.settle_write(&id, |stored| stored == Some(&recipe)).await;
            }
        }
        Ok(recipe)
    }

    /// Removes a recipe and its logs. Deleting an absent recipe is a no-op.
    pub async fn delete(&self, id: &RecipeId) -> CatalogResult<()> {
        let _guard = self.mutation_lock.lock().await;
        if self.current(id).await?.is_none() {
            tracing::debug!(recipe_id = %id, "Recipe already absent");
            return Ok(());
        }

        self.gateway
            .remove(id)
            .await
            .map_err(|e| Self::persistence_failure("delete", Some(id), e))?;

        tracing::info!(recipe_id = %id, "Deleted recipe");

        match self.delivery() {
            Delivery::Immediate => {
                let event = {
                    let mut state = self.state.write().await;
                    state.recipes.retain(|r| &r.id != id);
                    state.mutated(id.clone(), ChangeKind::Deleted)
                };
                self.events.broadcast(event);
            }
            Delivery::Subscription => {
                self.settle_write(id, |stored| stored.is_none()).await;
            }
        }
        Ok(())
    }

    /// Replaces the rating. Values above five are rejected before anything is
    /// written.
    pub async fn set_rating(&self, id: &RecipeId, rating: u8) -> CatalogResult<Recipe> {
        let rating = Rating::new(rating)?;
        self.update(id, RecipePatch::new().with_rating(rating)).await
    }

    /// Sets the cooked flag.
    pub async fn set_cooked(&self, id: &RecipeId, cooked: bool) -> CatalogResult<Recipe> {
        self.update(id, RecipePatch::new().with_cooked(cooked)).await
    }

    /// Prepends a cooking log entry and marks the recipe cooked.
    ///
    /// The whole log array is rewritten, so it is built from the backend's
    /// current record under the mutation lock.
    pub async fn add_log(&self, id: &RecipeId, draft: LogDraft) -> CatalogResult<LogEntry> {
        let _guard = self.mutation_lock.lock().await;
        let Some(recipe) = self.current(id).await? else {
            tracing::warn!(recipe_id = %id, "Log targets unknown recipe");
            return Err(CatalogError::not_found("Recipe", id));
        };

        let created_by = self.identity().and_then(|a| a.display_name);
        let entry = LogEntry::from_draft(next_log_id(&recipe.logs), draft, created_by);

        let mut logs = Vec::with_capacity(recipe.logs.len() + 1);
        logs.push(entry.clone());
        logs.extend(recipe.logs.iter().cloned());

        let patch = RecipePatch::new().with_logs(logs).with_cooked(true);
        self.update_locked(recipe, patch).await?;
        tracing::info!(recipe_id = %id, log_id = entry.id, "Added cooking log");
        Ok(entry)
    }

    /// Removes one cooking log entry, keeping the others in order. The cooked
    /// flag is left alone.
    pub async fn delete_log(&self, id: &RecipeId, log_id: LogId) -> CatalogResult<()> {
        let _guard = self.mutation_lock.lock().await;
        let Some(recipe) = self.current(id).await? else {
            tracing::warn!(recipe_id = %id, "Log deletion targets unknown recipe");
            return Err(CatalogError::not_found("Recipe", id));
        };
        if recipe.log(log_id).is_none() {
            tracing::warn!(recipe_id = %id, log_id, "Unknown cooking log");
            return Err(CatalogError::not_found("LogEntry", log_id));
        }

        let logs: Vec<LogEntry> = recipe.logs.iter().filter(|l| l.id != log_id).cloned().collect();
        self.update_locked(recipe, RecipePatch::new().with_logs(logs))
            .await?;
        tracing::info!(recipe_id = %id, log_id, "Deleted cooking log");
        Ok(())
    }

    /// The record a write should start from. Immediate backends are mirrored
    /// exactly in memory; subscription backends may be ahead of the last
    /// applied snapshot, so they are asked directly.
    async fn current(&self, id: &RecipeId) -> CatalogResult<Option<Recipe>> {
        match self.delivery() {
            Delivery::Immediate => Ok(self.get(id).await),
            Delivery::Subscription => {
                let recipes = self.gateway.fetch_all().await.map_err(|e| {
                    tracing::error!(recipe_id = %id, error = %e, "Failed to read recipe before write");
                    CatalogError::from(e)
                })?;
                Ok(recipes.into_iter().find(|r| &r.id == id))
            }
        }
    }

    /// Holds the caller (and the mutation lock) until the subscription has
    /// delivered a snapshot in which `applied` holds for the record. Bounded
    /// by `SETTLE_TIMEOUT`; without a running sync there is nothing to wait
    /// for.
    async fn settle_write<F>(&self, id: &RecipeId, applied: F)
    where
        F: Fn(Option<&Recipe>) -> bool,
    {
        if !self.is_syncing() {
            return;
        }
        let wait = self.wait_until(|recipes| applied(recipes.iter().find(|r| &r.id == id)));
        if tokio::time::timeout(SETTLE_TIMEOUT, wait).await.is_err() {
            tracing::warn!(recipe_id = %id, "Write not yet reflected by the subscription");
        }
    }

    fn persistence_failure(
        operation: &'static str,
        id: Option<&RecipeId>,
        err: GatewayError,
    ) -> CatalogError {
        match id {
            Some(id) => tracing::error!(operation, recipe_id = %id, error = %err, "Write failed"),
            None => tracing::error!(operation, error = %err, "Write failed"),
        }
        CatalogError::from(err)
    }
}

impl Drop for RecipeCollectionStore {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sync_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RecipeCollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeCollectionStore")
            .field("delivery", &self.delivery())
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}
