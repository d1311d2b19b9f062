use crate::{
    application::approver_resolver::ApproverResolver,
    application::definition_service::DefinitionService,
    domain::action::ApprovalAction,
    domain::instance::{EntityRef, EntityType, InstanceId, InstanceStatus, UserId},
    domain::repository::InstanceRepository,
    types::Priority,
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A task awaiting a user's decision, derived from ACTIVE instances
///
/// Non-authoritative: computed on read from the instance repository and the
/// approver resolver, tolerating brief staleness of the underlying store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTask {
    /// The instance awaiting action
    pub instance_id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// Name of the stage awaiting approval
    pub stage_name: String,

    /// Ordinal of the stage awaiting approval
    pub stage_ordinal: u32,

    /// Instance priority
    pub priority: Priority,

    /// Whether approving will demand a signature block
    pub requires_signature: bool,

    /// When the stage was entered
    pub assigned_at: DateTime<Utc>,

    /// SLA deadline of the stage, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_by: Option<DateTime<Utc>>,

    /// Whether the deadline has already passed
    pub overdue: bool,
}

/// Filters for pending-task queries
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    /// Only tasks for this entity type
    pub entity_type: Option<EntityType>,

    /// Only tasks at this priority
    pub priority: Option<Priority>,
}

/// Read-side status of an entity's workflow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatusView {
    /// Whether an ACTIVE instance exists
    pub has_active_workflow: bool,

    /// Status of the most recent instance, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InstanceStatus>,

    /// Name of the stage awaiting approval, for an ACTIVE instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,

    /// Completed stages over total stages, as a percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<u8>,
}

/// Aggregate counts over ACTIVE instances
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// All ACTIVE instances
    pub active_total: usize,

    /// ACTIVE instances per entity type
    pub by_entity_type: HashMap<String, usize>,

    /// ACTIVE instances per priority
    pub by_priority: HashMap<String, usize>,

    /// ACTIVE instances past their stage SLA
    pub overdue: usize,
}

/// Read-only projections over the instance repository
///
/// Queries never mutate instance state; instances that cannot be projected
/// (missing definition, unresolvable stage) are logged and skipped rather
/// than failing the whole listing.
pub struct TaskQueryService {
    instances: Arc<dyn InstanceRepository>,
    definitions: Arc<DefinitionService>,
    resolver: Arc<ApproverResolver>,
}

impl TaskQueryService {
    /// Create a new task query service
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        definitions: Arc<DefinitionService>,
        resolver: Arc<ApproverResolver>,
    ) -> Self {
        Self {
            instances,
            definitions,
            resolver,
        }
    }

    /// Tasks currently awaiting the user's decision
    ///
    /// A user sees an instance when the current stage's eligible set
    /// contains them, except parallel stages they already approved during
    /// this stage occurrence. Sorted by priority, then due date, then age.
    pub async fn pending_tasks_for_user(
        &self,
        user: &UserId,
        filters: &TaskFilters,
    ) -> Result<Vec<PendingTask>, CoreError> {
        let now = Utc::now();
        let mut tasks = Vec::new();

        for instance in self.instances.list_active().await? {
            if let Some(entity_type) = &filters.entity_type {
                if &instance.entity.entity_type != entity_type {
                    continue;
                }
            }
            if let Some(priority) = filters.priority {
                if instance.priority != priority {
                    continue;
                }
            }

            let definition = match self
                .definitions
                .get_definition(&instance.entity.entity_type)
                .await
            {
                Ok(definition) => definition,
                Err(err) => {
                    warn!(entity = %instance.entity, error = %err, "Skipping instance in task query");
                    continue;
                }
            };
            let stage = match instance.current_stage_definition(&definition) {
                Ok(stage) => stage,
                Err(err) => {
                    warn!(entity = %instance.entity, error = %err, "Skipping instance in task query");
                    continue;
                }
            };

            let eligible = match self.resolver.resolve_eligible(stage, &instance).await {
                Ok(eligible) => eligible,
                Err(err) => {
                    warn!(entity = %instance.entity, error = %err, "Skipping instance in task query");
                    continue;
                }
            };

            if !eligible.contains(user) {
                continue;
            }

            // A parallel stage needs distinct actors; someone who already
            // approved this occurrence has no task left here
            if stage.allow_parallel_approvers && instance.stage_actors.contains(user) {
                continue;
            }

            tasks.push(PendingTask {
                instance_id: instance.id.clone(),
                entity: instance.entity.clone(),
                stage_name: stage.name.clone(),
                stage_ordinal: stage.ordinal,
                priority: instance.priority,
                requires_signature: stage.requires_signature,
                assigned_at: instance.stage_entered_at,
                due_by: instance.stage_due_at,
                overdue: instance.stage_due_at.is_some_and(|due| due <= now),
            });
        }

        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    /// Status of an entity's workflow, active or most recent
    pub async fn status_for(&self, entity: &EntityRef) -> Result<WorkflowStatusView, CoreError> {
        if let Some(instance) = self.instances.find_active(entity).await? {
            let definition = self
                .definitions
                .get_definition(&instance.entity.entity_type)
                .await?;
            let stage = instance.current_stage_definition(&definition)?;

            return Ok(WorkflowStatusView {
                has_active_workflow: true,
                status: Some(instance.status),
                current_stage: Some(stage.name.clone()),
                completion_percentage: Some(completion(
                    instance.current_stage,
                    definition.total_stages(),
                )),
            });
        }

        match self.instances.find_latest(entity).await? {
            Some(terminal) => {
                let percentage = match terminal.status {
                    InstanceStatus::Approved => 100,
                    _ => {
                        let total = self
                            .definitions
                            .get_definition(&terminal.entity.entity_type)
                            .await
                            .map(|def| def.total_stages())
                            .unwrap_or(0);
                        completion(terminal.current_stage, total)
                    }
                };

                Ok(WorkflowStatusView {
                    has_active_workflow: false,
                    status: Some(terminal.status),
                    current_stage: None,
                    completion_percentage: Some(percentage),
                })
            }
            None => Ok(WorkflowStatusView {
                has_active_workflow: false,
                status: None,
                current_stage: None,
                completion_percentage: None,
            }),
        }
    }

    /// Aggregate dashboard counts over ACTIVE instances
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
        let now = Utc::now();
        let mut stats = DashboardStats::default();

        for instance in self.instances.list_active().await? {
            stats.active_total += 1;
            *stats
                .by_entity_type
                .entry(instance.entity.entity_type.0.clone())
                .or_insert(0) += 1;
            *stats
                .by_priority
                .entry(instance.priority.to_string())
                .or_insert(0) += 1;
            if instance.stage_due_at.is_some_and(|due| due <= now) {
                stats.overdue += 1;
            }
        }

        Ok(stats)
    }

    /// The append-only audit trail for an entity's most recent instance
    ///
    /// Empty when the entity never had a workflow; read-side queries do not
    /// fail on absence.
    pub async fn history_for(&self, entity: &EntityRef) -> Result<Vec<ApprovalAction>, CoreError> {
        match self.instances.find_latest(entity).await? {
            Some(instance) => self.instances.actions_for_instance(&instance.id).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Completed stages over total stages as a whole percentage
fn completion(current_stage: u32, total_stages: u32) -> u8 {
    if total_stages == 0 {
        return 0;
    }
    ((u64::from(current_stage) * 100) / u64::from(total_stages)) as u8
}

/// Priority first, earliest deadline next, oldest assignment last
fn sort_tasks(tasks: &mut [PendingTask]) {
    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a.due_by, b.due_by) {
                (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.assigned_at.cmp(&b.assigned_at))
    });
}
