//! In-memory repository implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use stagegate_core::{
    ApprovalAction, CoreError, DefinitionStore, EntityRef, EntityType, InstanceId,
    InstanceRepository, InstanceStatus, WorkflowDefinition, WorkflowInstance,
};

/// All instance state behind one lock, so the version check and the write
/// (including the audit append) are a single atomic step
#[derive(Default)]
struct InstanceState {
    /// Instances keyed by instance ID
    instances: HashMap<String, WorkflowInstance>,

    /// Instance IDs per entity key, in creation order
    entity_index: HashMap<String, Vec<String>>,

    /// Append-only audit log per instance ID
    actions: HashMap<String, Vec<ApprovalAction>>,
}

/// In-memory implementation of the workflow instance repository
#[derive(Clone, Default)]
pub struct InMemoryInstanceRepository {
    state: Arc<RwLock<InstanceState>>,
}

impl InMemoryInstanceRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

fn entity_key(entity: &EntityRef) -> String {
    format!("{}::{}", entity.entity_type.0, entity.entity_id)
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn insert_new(
        &self,
        instance: &WorkflowInstance,
        action: &ApprovalAction,
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        let key = entity_key(&instance.entity);

        // Uniqueness constraint: at most one ACTIVE instance per entity key
        if let Some(ids) = state.entity_index.get(&key) {
            for id in ids {
                if let Some(existing) = state.instances.get(id) {
                    if existing.status == InstanceStatus::Active {
                        return Err(CoreError::DuplicateActiveWorkflow(format!(
                            "{} already has active instance {}",
                            instance.entity, existing.id.0
                        )));
                    }
                }
            }
        }

        state
            .instances
            .insert(instance.id.0.clone(), instance.clone());
        state
            .entity_index
            .entry(key)
            .or_default()
            .push(instance.id.0.clone());
        state
            .actions
            .insert(instance.id.0.clone(), vec![action.clone()]);

        debug!(instance_id = %instance.id.0, entity = %instance.entity, "Instance inserted");
        Ok(())
    }

    async fn find_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, CoreError> {
        let state = self.state.read().await;
        Ok(state.instances.get(&id.0).cloned())
    }

    async fn find_active(&self, entity: &EntityRef) -> Result<Option<WorkflowInstance>, CoreError> {
        let state = self.state.read().await;
        let Some(ids) = state.entity_index.get(&entity_key(entity)) else {
            return Ok(None);
        };

        Ok(ids
            .iter()
            .filter_map(|id| state.instances.get(id))
            .find(|instance| instance.status == InstanceStatus::Active)
            .cloned())
    }

    async fn find_latest(&self, entity: &EntityRef) -> Result<Option<WorkflowInstance>, CoreError> {
        let state = self.state.read().await;
        let Some(ids) = state.entity_index.get(&entity_key(entity)) else {
            return Ok(None);
        };

        Ok(ids
            .last()
            .and_then(|id| state.instances.get(id))
            .cloned())
    }

    async fn update_versioned(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        action: &ApprovalAction,
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;

        let stored_version = state
            .instances
            .get(&instance.id.0)
            .map(|stored| stored.version)
            .ok_or_else(|| {
                CoreError::StateStoreError(format!("Unknown instance: {}", instance.id.0))
            })?;

        if stored_version != expected_version {
            return Err(CoreError::ConcurrentModification(format!(
                "Instance {} is at version {}, expected {}",
                instance.id.0, stored_version, expected_version
            )));
        }

        let mut updated = instance.clone();
        updated.version = expected_version + 1;
        state.instances.insert(instance.id.0.clone(), updated);
        state
            .actions
            .entry(instance.id.0.clone())
            .or_default()
            .push(action.clone());

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<WorkflowInstance>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .instances
            .values()
            .filter(|instance| instance.status == InstanceStatus::Active)
            .cloned()
            .collect())
    }

    async fn find_due_for_escalation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .instances
            .values()
            .filter(|instance| {
                instance.status == InstanceStatus::Active
                    && !instance.stage_escalated
                    && instance.stage_due_at.is_some_and(|due| due <= now)
            })
            .cloned()
            .collect())
    }

    async fn actions_for_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Vec<ApprovalAction>, CoreError> {
        let state = self.state.read().await;
        Ok(state.actions.get(&id.0).cloned().unwrap_or_default())
    }
}

/// In-memory implementation of the workflow definition store
///
/// Holds the current version per entity type; superseded versions are
/// replaced (version monotonicity is enforced by the definition service).
#[derive(Clone, Default)]
pub struct InMemoryDefinitionStore {
    definitions: Arc<RwLock<HashMap<String, WorkflowDefinition>>>,
}

impl InMemoryDefinitionStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn load(
        &self,
        entity_type: &EntityType,
    ) -> Result<Option<WorkflowDefinition>, CoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions.get(&entity_type.0).cloned())
    }

    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), CoreError> {
        let mut definitions = self.definitions.write().await;
        definitions.insert(definition.entity_type.0.clone(), definition.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, CoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions.values().cloned().collect())
    }
}
