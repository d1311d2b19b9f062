use crate::{
    application::approver_resolver::{ApproverResolver, DelegationPolicy},
    application::definition_service::DefinitionService,
    application::escalation_scheduler::{EscalationHandle, EscalationScheduler},
    application::task_query_service::{
        DashboardStats, PendingTask, TaskFilters, TaskQueryService, WorkflowStatusView,
    },
    application::transition_processor::{
        ActOutcome, ActionRequest, CancelOutcome, InitiateOutcome, InitiateRequest,
        TransitionProcessor,
    },
    domain::action::ApprovalAction,
    domain::definition::WorkflowDefinition,
    domain::instance::{EntityRef, EntityType, UserId},
    domain::repository::{DefinitionStore, InstanceRepository, NotificationSink, RoleMembership},
    CoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Engine configuration supplied by the embedding process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Seconds between escalation sweeps
    pub escalation_interval_secs: u64,

    /// Total attempts for `act_with_retry` before surfacing the conflict
    pub act_retry_attempts: u32,

    /// Base backoff between retry attempts, multiplied per attempt
    pub act_retry_backoff_ms: u64,

    /// What delegation does to the delegator's eligibility
    pub delegation_policy: DelegationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escalation_interval_secs: 300,
            act_retry_attempts: 3,
            act_retry_backoff_ms: 25,
            delegation_policy: DelegationPolicy::default(),
        }
    }
}

/// The approval workflow engine
///
/// One value constructed at process start, holding only references to its
/// collaborators; entity-specific services call through it and never touch
/// instance state directly. All state lives behind the injected repository.
pub struct ApprovalEngine {
    definitions: Arc<DefinitionService>,
    processor: TransitionProcessor,
    tasks: TaskQueryService,
    scheduler: Arc<EscalationScheduler>,
    config: EngineConfig,
}

impl ApprovalEngine {
    /// Wire an engine from its collaborators
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        definition_store: Arc<dyn DefinitionStore>,
        roles: Arc<dyn RoleMembership>,
        notifications: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        let definitions = Arc::new(DefinitionService::new(definition_store));
        let resolver = Arc::new(ApproverResolver::new(roles, config.delegation_policy));

        let processor = TransitionProcessor::new(
            instances.clone(),
            definitions.clone(),
            resolver.clone(),
            notifications.clone(),
        );

        let tasks = TaskQueryService::new(instances.clone(), definitions.clone(), resolver.clone());

        let scheduler = Arc::new(EscalationScheduler::new(
            instances,
            definitions.clone(),
            resolver,
            notifications,
            Duration::from_secs(config.escalation_interval_secs),
        ));

        Self {
            definitions,
            processor,
            tasks,
            scheduler,
            config,
        }
    }

    /// Validate and register a workflow definition version
    pub async fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<(), CoreError> {
        self.definitions.register_definition(definition).await
    }

    /// Resolve the definition for an entity type
    pub async fn get_definition(
        &self,
        entity_type: &EntityType,
    ) -> Result<Arc<WorkflowDefinition>, CoreError> {
        self.definitions.get_definition(entity_type).await
    }

    /// List all registered definitions
    pub async fn list_definitions(&self) -> Result<Vec<WorkflowDefinition>, CoreError> {
        self.definitions.list_definitions().await
    }

    /// Initiate a workflow for an entity
    pub async fn initiate(&self, request: InitiateRequest) -> Result<InitiateOutcome, CoreError> {
        self.processor.initiate(request).await
    }

    /// Apply a decision to an entity's active workflow
    pub async fn act(&self, request: ActionRequest) -> Result<ActOutcome, CoreError> {
        self.processor.act(request).await
    }

    /// Apply a decision, retrying the read-act cycle a bounded number of
    /// times when a concurrent writer wins the version check
    pub async fn act_with_retry(&self, request: ActionRequest) -> Result<ActOutcome, CoreError> {
        let mut attempt: u32 = 1;
        loop {
            match self.processor.act(request.clone()).await {
                Err(CoreError::ConcurrentModification(msg))
                    if attempt < self.config.act_retry_attempts =>
                {
                    debug!(
                        entity = %request.entity,
                        attempt,
                        "Retrying action after concurrent modification: {}",
                        msg
                    );
                    tokio::time::sleep(Duration::from_millis(
                        self.config.act_retry_backoff_ms * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Administratively cancel an entity's active workflow
    pub async fn cancel(
        &self,
        entity: &EntityRef,
        reason: String,
        cancelled_by: UserId,
    ) -> Result<CancelOutcome, CoreError> {
        self.processor.cancel(entity, reason, cancelled_by).await
    }

    /// Read-side workflow status for an entity
    pub async fn status_for(&self, entity: &EntityRef) -> Result<WorkflowStatusView, CoreError> {
        self.tasks.status_for(entity).await
    }

    /// Tasks currently awaiting a user's decision
    pub async fn pending_tasks_for_user(
        &self,
        user: &UserId,
        filters: &TaskFilters,
    ) -> Result<Vec<PendingTask>, CoreError> {
        self.tasks.pending_tasks_for_user(user, filters).await
    }

    /// Aggregate dashboard counts
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
        self.tasks.dashboard_stats().await
    }

    /// The audit trail for an entity's most recent instance
    pub async fn history_for(&self, entity: &EntityRef) -> Result<Vec<ApprovalAction>, CoreError> {
        self.tasks.history_for(entity).await
    }

    /// Start the background escalation loop
    pub fn start_escalation_sweeps(&self) -> EscalationHandle {
        self.scheduler.clone().start()
    }

    /// The escalation scheduler, for deterministic sweeps in tests and tools
    pub fn escalation_scheduler(&self) -> Arc<EscalationScheduler> {
        self.scheduler.clone()
    }
}
