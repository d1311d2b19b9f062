use crate::{
    domain::definition::WorkflowDefinition,
    domain::instance::EntityType,
    domain::repository::DefinitionStore,
    CoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Service for registering and resolving workflow definitions
///
/// Definitions are cached in memory after first load. Cache invalidation is
/// explicit (re-registration), never time-based: definitions change rarely,
/// and a stale definition silently applied to in-flight instances would
/// corrupt them.
pub struct DefinitionService {
    /// Durable store for definitions
    store: Arc<dyn DefinitionStore>,

    /// Definitions already loaded, keyed by entity type
    cache: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl DefinitionService {
    /// Create a new definition service over a store
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the definition for an entity type, cache-first
    pub async fn get_definition(
        &self,
        entity_type: &EntityType,
    ) -> Result<Arc<WorkflowDefinition>, CoreError> {
        {
            let cache = self.cache.read().await;
            if let Some(definition) = cache.get(&entity_type.0) {
                return Ok(definition.clone());
            }
        }

        let definition = self
            .store
            .load(entity_type)
            .await?
            .ok_or_else(|| CoreError::DefinitionNotFound(entity_type.0.clone()))?;

        let definition = Arc::new(definition);
        let mut cache = self.cache.write().await;
        cache.insert(entity_type.0.clone(), definition.clone());

        Ok(definition)
    }

    /// Validate and register a definition version, replacing the cache entry
    pub async fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<(), CoreError> {
        definition.validate()?;

        // Behavior changes require a new version; in-place mutation of a
        // version already seen is refused
        if let Some(existing) = self.current_version(&definition.entity_type).await? {
            if definition.version <= existing {
                return Err(CoreError::InvalidDefinition(format!(
                    "Version {} for {} does not supersede registered version {}",
                    definition.version, definition.entity_type, existing
                )));
            }
        }

        self.store.save(&definition).await?;

        tracing::info!(
            entity_type = %definition.entity_type,
            version = definition.version,
            stages = definition.stages.len(),
            "Workflow definition registered"
        );

        let mut cache = self.cache.write().await;
        cache.insert(definition.entity_type.0.clone(), Arc::new(definition));

        Ok(())
    }

    /// List all registered definitions from the store
    pub async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>, CoreError> {
        self.store.load_all().await
    }

    async fn current_version(&self, entity_type: &EntityType) -> Result<Option<u32>, CoreError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&entity_type.0) {
                return Ok(Some(cached.version));
            }
        }

        Ok(self.store.load(entity_type).await?.map(|def| def.version))
    }
}
