use crate::{
    domain::definition::{StageDefinition, WorkflowDefinition},
    domain::events::{DomainEvent, StageAdvanced, WorkflowEscalated, WorkflowInitiated, WorkflowTerminated},
    types::Priority,
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Value object: Workflow instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

/// Value object: Entity type key (e.g. WORK_INSTRUCTION, FAI_REPORT, NCR)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(pub String);

/// Value object: User ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Value object: Role ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl EntityType {
    /// Work instruction documents
    pub fn work_instruction() -> Self {
        EntityType("WORK_INSTRUCTION".to_string())
    }

    /// First-article-inspection reports
    pub fn fai_report() -> Self {
        EntityType("FAI_REPORT".to_string())
    }

    /// Quality process definitions
    pub fn quality_process() -> Self {
        EntityType("QUALITY_PROCESS".to_string())
    }

    /// Non-conformance records
    pub fn ncr() -> Self {
        EntityType("NCR".to_string())
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the business entity a workflow instance governs
///
/// Entity-specific services fix the `entity_type` field; the engine itself
/// has a single code path for all types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// The entity type key
    pub entity_type: EntityType,

    /// The entity's identifier within its own service
    pub entity_id: String,
}

impl EntityRef {
    /// Create an entity reference
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type.0, self.entity_id)
    }
}

/// Workflow instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Awaiting approvals at some stage
    Active,

    /// All stages approved
    Approved,

    /// Rejected at some stage
    Rejected,

    /// Administratively cancelled
    Cancelled,
}

impl InstanceStatus {
    /// Whether the status accepts no further actions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

/// Outcome of applying an APPROVE to the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalProgress {
    /// Stage still waiting on coverage from other required roles
    AwaitingRoles,

    /// Stage completed; the instance advanced to the next stage
    Advanced,

    /// Final stage completed; the workflow is fully approved
    Completed,
}

/// Aggregate: one live execution of a workflow definition against an entity
///
/// Exclusively mutated by the transition processor; all transitions go
/// through the guarded methods below, which record domain events for the
/// application layer to drain.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique identifier
    pub id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// Version of the definition this instance executes
    pub definition_version: u32,

    /// Ordinal of the stage currently awaiting approval
    pub current_stage: u32,

    /// Current status
    pub status: InstanceStatus,

    /// Instance priority
    pub priority: Priority,

    /// Opaque caller-supplied payload
    pub metadata: serde_json::Value,

    /// User who initiated the workflow; excluded from eligibility for life
    pub initiated_by: UserId,

    /// Per-instance replacement for every stage's required roles
    pub role_override: Option<Vec<RoleId>>,

    /// Roles with at least one APPROVE in the current stage occurrence
    pub approved_roles: HashSet<RoleId>,

    /// Users who approved during the current stage occurrence
    pub stage_actors: HashSet<UserId>,

    /// Delegations standing for the current stage occurrence (delegate -> delegator)
    pub stage_delegates: HashMap<UserId, UserId>,

    /// Whether the current stage occurrence has already been escalated
    pub stage_escalated: bool,

    /// When the current stage was entered
    pub stage_entered_at: DateTime<Utc>,

    /// SLA deadline of the current stage, if it has one
    pub stage_due_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency version; bumped by the repository on write
    pub version: u64,

    /// Domain events recorded by transitions, drained by the application layer
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

// Manually implement Clone; domain events are not cloned
impl Clone for WorkflowInstance {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            entity: self.entity.clone(),
            definition_version: self.definition_version,
            current_stage: self.current_stage,
            status: self.status,
            priority: self.priority,
            metadata: self.metadata.clone(),
            initiated_by: self.initiated_by.clone(),
            role_override: self.role_override.clone(),
            approved_roles: self.approved_roles.clone(),
            stage_actors: self.stage_actors.clone(),
            stage_delegates: self.stage_delegates.clone(),
            stage_escalated: self.stage_escalated,
            stage_entered_at: self.stage_entered_at,
            stage_due_at: self.stage_due_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
            events: Vec::new(),
        }
    }
}

impl WorkflowInstance {
    /// Create a new instance at stage 0 of the given definition
    pub fn new(
        definition: &WorkflowDefinition,
        entity: EntityRef,
        priority: Priority,
        metadata: serde_json::Value,
        initiated_by: UserId,
        role_override: Option<Vec<RoleId>>,
    ) -> Result<Self, CoreError> {
        let first_stage = definition.stage(0).ok_or_else(|| {
            CoreError::InvalidDefinition(format!(
                "Definition for {} has no stages",
                definition.entity_type
            ))
        })?;

        if let Some(roles) = &role_override {
            if roles.is_empty() {
                return Err(CoreError::InvalidDefinition(
                    "Role override must name at least one role".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let instance_id = InstanceId(Uuid::new_v4().to_string());

        let mut instance = Self {
            id: instance_id.clone(),
            entity: entity.clone(),
            definition_version: definition.version,
            current_stage: 0,
            status: InstanceStatus::Active,
            priority,
            metadata,
            initiated_by,
            role_override,
            approved_roles: HashSet::new(),
            stage_actors: HashSet::new(),
            stage_delegates: HashMap::new(),
            stage_escalated: false,
            stage_entered_at: now,
            stage_due_at: first_stage.due_at(now),
            created_at: now,
            updated_at: now,
            version: 1,
            events: Vec::with_capacity(4),
        };

        instance.record_event(Box::new(WorkflowInitiated {
            instance_id,
            entity,
            stage_name: first_stage.name.clone(),
            timestamp: now,
        }));

        Ok(instance)
    }

    /// The required roles in effect for a stage of this instance
    pub fn effective_roles<'a>(&'a self, stage: &'a StageDefinition) -> &'a [RoleId] {
        self.role_override
            .as_deref()
            .unwrap_or(&stage.required_roles)
    }

    /// Apply an APPROVE decision by `actor` covering `covered_roles`
    ///
    /// For a parallel stage, coverage accumulates until every effective
    /// required role has at least one approval; a non-parallel stage
    /// completes on the first approval. Completion of the last stage
    /// approves the workflow; otherwise the instance advances one stage.
    pub fn apply_approval(
        &mut self,
        actor: &UserId,
        covered_roles: &HashSet<RoleId>,
        definition: &WorkflowDefinition,
    ) -> Result<ApprovalProgress, CoreError> {
        self.ensure_active()?;
        let stage = self.current_stage_definition(definition)?.clone();

        self.stage_actors.insert(actor.clone());

        if stage.allow_parallel_approvers {
            let required: Vec<RoleId> = self.effective_roles(&stage).to_vec();
            for role in covered_roles {
                if required.contains(role) {
                    self.approved_roles.insert(role.clone());
                }
            }

            let satisfied = required.iter().all(|role| self.approved_roles.contains(role));
            if !satisfied {
                self.touch();
                return Ok(ApprovalProgress::AwaitingRoles);
            }
        }

        if self.current_stage >= definition.last_ordinal() {
            self.status = InstanceStatus::Approved;
            self.touch();
            self.record_terminal_event();
            Ok(ApprovalProgress::Completed)
        } else {
            let from_stage = stage.name.clone();
            self.current_stage += 1;
            let next = self.current_stage_definition(definition)?.clone();
            self.enter_stage(&next);
            self.record_event(Box::new(StageAdvanced {
                instance_id: self.id.clone(),
                entity: self.entity.clone(),
                from_stage,
                to_stage: next.name,
                timestamp: Utc::now(),
            }));
            Ok(ApprovalProgress::Advanced)
        }
    }

    /// Apply a REJECT decision; one reject terminates the workflow
    pub fn apply_rejection(&mut self) -> Result<(), CoreError> {
        self.ensure_active()?;
        self.status = InstanceStatus::Rejected;
        self.touch();
        self.record_terminal_event();
        Ok(())
    }

    /// Apply an administrative cancellation
    pub fn apply_cancellation(&mut self) -> Result<(), CoreError> {
        self.ensure_active()?;
        self.status = InstanceStatus::Cancelled;
        self.touch();
        self.record_terminal_event();
        Ok(())
    }

    /// Record an identity-based delegation for the current stage occurrence
    ///
    /// The instance stays ACTIVE at the same stage; the delegate becomes
    /// eligible even when outside the resolved role set.
    pub fn apply_delegation(&mut self, from: &UserId, to: &UserId) -> Result<(), CoreError> {
        self.ensure_active()?;
        self.stage_delegates.insert(to.clone(), from.clone());
        self.touch();
        Ok(())
    }

    /// Mark the current stage occurrence as escalated past its SLA
    ///
    /// Changes who is eligible, never the stage ordinal or status.
    pub fn apply_escalation(&mut self, definition: &WorkflowDefinition) -> Result<(), CoreError> {
        self.ensure_active()?;
        let stage_name = self.current_stage_definition(definition)?.name.clone();
        self.stage_escalated = true;
        self.touch();
        self.record_event(Box::new(WorkflowEscalated {
            instance_id: self.id.clone(),
            entity: self.entity.clone(),
            stage_name,
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// The stage definition for the instance's current ordinal
    pub fn current_stage_definition<'a>(
        &self,
        definition: &'a WorkflowDefinition,
    ) -> Result<&'a StageDefinition, CoreError> {
        definition.stage(self.current_stage).ok_or_else(|| {
            CoreError::InvalidDefinition(format!(
                "Instance {} at stage {} but definition {} v{} has {} stages",
                self.id.0,
                self.current_stage,
                definition.entity_type,
                definition.version,
                definition.total_stages()
            ))
        })
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Drain recorded events for publication
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    fn ensure_active(&self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::WorkflowTerminated(format!(
                "{} is {:?}",
                self.entity, self.status
            )));
        }
        Ok(())
    }

    fn enter_stage(&mut self, stage: &StageDefinition) {
        let now = Utc::now();
        self.approved_roles.clear();
        self.stage_actors.clear();
        self.stage_delegates.clear();
        self.stage_escalated = false;
        self.stage_entered_at = now;
        self.stage_due_at = stage.due_at(now);
        self.touch();
    }

    fn record_terminal_event(&mut self) {
        self.record_event(Box::new(WorkflowTerminated {
            instance_id: self.id.clone(),
            entity: self.entity.clone(),
            status: self.status,
            timestamp: Utc::now(),
        }));
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
