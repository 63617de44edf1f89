use super::factory::ModelBuilder;
use crate::core::catalog::{ModelCatalog, ModelIdentifier};
use crate::core::error::PredictionError;
use crate::core::lock::ConstructionLock;
use crate::core::prediction::PredictionModel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Storage for constructed instances. Entries are only ever added.
pub trait InstanceStore<M>: Send + Sync {
    fn get(&self, id: ModelIdentifier) -> Option<Arc<M>>;
    fn insert(&self, id: ModelIdentifier, instance: Arc<M>);
    fn identifiers(&self) -> Vec<ModelIdentifier>;
}

pub struct MemoryStore<M> {
    instances: RwLock<HashMap<ModelIdentifier, Arc<M>>>,
}

impl<M> MemoryStore<M> {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }
}

impl<M> Default for MemoryStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + Sync> InstanceStore<M> for MemoryStore<M> {
    fn get(&self, id: ModelIdentifier) -> Option<Arc<M>> {
        self.instances.read().get(&id).cloned()
    }

    fn insert(&self, id: ModelIdentifier, instance: Arc<M>) {
        self.instances.write().insert(id, instance);
    }

    fn identifiers(&self) -> Vec<ModelIdentifier> {
        let mut ids: Vec<_> = self.instances.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Lazily builds and caches one instance per catalog entry.
///
/// Lookups of built instances only take the store's read lock. Construction
/// is double-checked under a single [`ConstructionLock`], so each identifier
/// is built at most once no matter how many callers race for it. A failed
/// construction stores nothing and the next call retries.
pub struct PredictionRegistry<M = PredictionModel> {
    catalog: ModelCatalog,
    store: Box<dyn InstanceStore<M>>,
    builder: ModelBuilder<M>,
    lock: ConstructionLock,
    lock_timeout: Duration,
}

impl<M: Send + Sync + 'static> PredictionRegistry<M> {
    pub fn new(catalog: ModelCatalog, builder: ModelBuilder<M>) -> Self {
        Self {
            catalog,
            store: Box::new(MemoryStore::new()),
            builder,
            lock: ConstructionLock::in_process(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_store<S: InstanceStore<M> + 'static>(mut self, store: S) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_lock(mut self, lock: ConstructionLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Resolves `name` against the catalog and returns its shared instance.
    pub fn instance(&self, name: &str) -> Result<Arc<M>, PredictionError> {
        let (id, _) = self.catalog.resolve(name)?;
        self.instance_of(id)
    }

    pub fn instance_of(&self, id: ModelIdentifier) -> Result<Arc<M>, PredictionError> {
        // Catalog membership is checked before the lock and regardless of the store.
        let spec = self
            .catalog
            .spec(id)
            .ok_or_else(|| PredictionError::UnknownModel(id.to_string()))?;

        if let Some(instance) = self.store.get(id) {
            return Ok(instance);
        }

        let _guard = self.lock.acquire(id, self.lock_timeout)?;
        if let Some(instance) = self.store.get(id) {
            return Ok(instance);
        }

        let instance = (self.builder)(id, spec)
            .map(Arc::new)
            .map_err(|e| PredictionError::model_load(id, e))?;
        self.store.insert(id, Arc::clone(&instance));
        Ok(instance)
    }

    pub fn is_loaded(&self, id: ModelIdentifier) -> bool {
        self.store.get(id).is_some()
    }

    pub fn loaded(&self) -> Vec<ModelIdentifier> {
        self.store.identifiers()
    }

    /// Builds every catalog entry, reporting each outcome.
    pub fn warm_up(&self) -> Vec<(ModelIdentifier, Result<(), PredictionError>)> {
        self.catalog
            .identifiers()
            .map(|id| {
                tracing::info!("Preloading model {}", id);
                let outcome = self.instance_of(id).map(|_| ());
                if let Err(e) = &outcome {
                    tracing::warn!("Preloading {} failed: {}", id, e);
                }
                (id, outcome)
            })
            .collect()
    }
}
