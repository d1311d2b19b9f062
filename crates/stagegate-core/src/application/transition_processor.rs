use crate::{
    application::approver_resolver::ApproverResolver,
    application::definition_service::DefinitionService,
    domain::action::{ActionKind, ActorId, ApprovalAction},
    domain::instance::{EntityRef, InstanceId, InstanceStatus, RoleId, UserId, WorkflowInstance},
    domain::repository::{InstanceRepository, NotificationSink},
    types::{Priority, SignatureBlock},
    CoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// An approval decision submitted by an actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Approve the current stage
    Approve,

    /// Reject and terminate the workflow
    Reject,

    /// Reassign the task to another user, identity-based
    #[serde(rename_all = "camelCase")]
    Delegate {
        /// The user receiving the task
        delegate_to: UserId,
    },
}

/// Request to initiate a workflow for an entity
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// The entity to govern
    pub entity: EntityRef,

    /// Optional per-instance replacement for every stage's required roles
    pub role_override: Option<Vec<RoleId>>,

    /// Instance priority
    pub priority: Priority,

    /// Opaque caller-supplied payload
    pub metadata: serde_json::Value,

    /// The initiating user
    pub initiated_by: UserId,
}

/// Request to act on an entity's active workflow
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// The governed entity
    pub entity: EntityRef,

    /// The decision
    pub decision: Decision,

    /// The acting user
    pub actor: UserId,

    /// Free-form comments
    pub comments: Option<String>,

    /// Signature block, mandatory on APPROVE at signing stages
    pub signature: Option<SignatureBlock>,
}

/// Result of a successful Initiate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateOutcome {
    /// The new instance
    pub instance_id: InstanceId,

    /// Name of the first stage awaiting approval
    pub current_stage: String,

    /// Users eligible to act on the first stage, for caller notification
    pub eligible_approvers: HashSet<UserId>,
}

/// Result of a successful Act
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActOutcome {
    /// The instance acted upon
    pub instance_id: InstanceId,

    /// Status after the action
    pub status: InstanceStatus,

    /// Name of the stage now awaiting approval; `None` once terminal
    pub current_stage: Option<String>,

    /// Users now eligible to act, for caller notification; empty once terminal
    pub eligible_approvers: HashSet<UserId>,
}

/// Result of a successful Cancel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    /// The cancelled instance
    pub instance_id: InstanceId,

    /// Always `Cancelled`
    pub status: InstanceStatus,
}

/// The state machine core: validates and applies workflow transitions
///
/// The transition processor is the only writer of workflow instances. Every
/// mutation follows the same shape: load, mutate the aggregate, resolve the
/// resulting eligibility, then a single version-checked write that persists
/// the instance and appends the audit record atomically. A conflicting
/// concurrent writer surfaces as `ConcurrentModification` and the whole
/// read-act cycle is retried by the caller.
pub struct TransitionProcessor {
    instances: Arc<dyn InstanceRepository>,
    definitions: Arc<DefinitionService>,
    resolver: Arc<ApproverResolver>,
    notifications: Arc<dyn NotificationSink>,
}

impl TransitionProcessor {
    /// Create a new transition processor
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        definitions: Arc<DefinitionService>,
        resolver: Arc<ApproverResolver>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            instances,
            definitions,
            resolver,
            notifications,
        }
    }

    /// Initiate a workflow instance for an entity at stage 0
    pub async fn initiate(&self, request: InitiateRequest) -> Result<InitiateOutcome, CoreError> {
        let definition = self
            .definitions
            .get_definition(&request.entity.entity_type)
            .await?;

        if let Some(existing) = self.instances.find_active(&request.entity).await? {
            return Err(CoreError::DuplicateActiveWorkflow(format!(
                "{} already has active instance {}",
                request.entity, existing.id.0
            )));
        }

        let mut instance = WorkflowInstance::new(
            &definition,
            request.entity,
            request.priority,
            request.metadata,
            request.initiated_by.clone(),
            request.role_override,
        )?;

        let first_stage = instance.current_stage_definition(&definition)?;

        // Surface an unresolvable first stage before anything is persisted
        let eligible = self.resolver.resolve_eligible(first_stage, &instance).await?;

        let action = ApprovalAction::new(
            instance.id.clone(),
            0,
            ActionKind::Initiated,
            ActorId::User(request.initiated_by),
        );

        self.instances.insert_new(&instance, &action).await?;
        self.publish_events(&mut instance).await;

        info!(
            instance_id = %instance.id.0,
            entity = %instance.entity,
            stage = %first_stage.name,
            eligible = eligible.len(),
            "Workflow initiated"
        );

        Ok(InitiateOutcome {
            instance_id: instance.id.clone(),
            current_stage: first_stage.name.clone(),
            eligible_approvers: eligible,
        })
    }

    /// Apply an approve/reject/delegate decision to an entity's workflow
    pub async fn act(&self, request: ActionRequest) -> Result<ActOutcome, CoreError> {
        let mut instance = self.load_active(&request.entity).await?;
        let expected_version = instance.version;

        let definition = self
            .definitions
            .get_definition(&instance.entity.entity_type)
            .await?;
        let stage = instance.current_stage_definition(&definition)?.clone();

        let eligible = self.resolver.resolve_eligible(&stage, &instance).await?;
        if !eligible.contains(&request.actor) {
            return Err(CoreError::NotAuthorizedForStage(format!(
                "{} may not act on stage '{}' of {}",
                request.actor.0, stage.name, instance.entity
            )));
        }

        let action = match &request.decision {
            Decision::Approve => {
                if stage.requires_signature && request.signature.is_none() {
                    return Err(CoreError::SignatureRequired(stage.name.clone()));
                }

                let covered = self
                    .resolver
                    .roles_covered_by(&request.actor, &stage, &instance)
                    .await?;
                instance.apply_approval(&request.actor, &covered, &definition)?;

                ApprovalAction::new(
                    instance.id.clone(),
                    stage.ordinal,
                    ActionKind::Approved,
                    ActorId::User(request.actor.clone()),
                )
                .with_comments(request.comments.clone())
                .with_signature(request.signature.clone())
            }
            Decision::Reject => {
                instance.apply_rejection()?;

                ApprovalAction::new(
                    instance.id.clone(),
                    stage.ordinal,
                    ActionKind::Rejected,
                    ActorId::User(request.actor.clone()),
                )
                .with_comments(request.comments.clone())
            }
            Decision::Delegate { delegate_to } => {
                instance.apply_delegation(&request.actor, delegate_to)?;

                ApprovalAction::new(
                    instance.id.clone(),
                    stage.ordinal,
                    ActionKind::Delegated,
                    ActorId::User(request.actor.clone()),
                )
                .with_comments(request.comments.clone())
                .with_delegate(delegate_to.clone())
            }
        };

        // Resolve who acts next before the write, so an unresolvable next
        // stage aborts the transition instead of stranding the instance
        let (current_stage, eligible_approvers) = if instance.status.is_terminal() {
            (None, HashSet::new())
        } else {
            let now_stage = instance.current_stage_definition(&definition)?;
            let eligible = self.resolver.resolve_eligible(now_stage, &instance).await?;
            (Some(now_stage.name.clone()), eligible)
        };

        self.instances
            .update_versioned(&instance, expected_version, &action)
            .await?;
        self.publish_events(&mut instance).await;

        info!(
            instance_id = %instance.id.0,
            entity = %instance.entity,
            actor = %request.actor.0,
            kind = ?action.kind,
            status = ?instance.status,
            stage = instance.current_stage,
            "Workflow action applied"
        );

        Ok(ActOutcome {
            instance_id: instance.id.clone(),
            status: instance.status,
            current_stage,
            eligible_approvers,
        })
    }

    /// Administratively cancel an entity's active workflow
    ///
    /// Permitted from any stage regardless of role; restricting who may call
    /// this is the boundary's responsibility, not the engine's.
    pub async fn cancel(
        &self,
        entity: &EntityRef,
        reason: String,
        cancelled_by: UserId,
    ) -> Result<CancelOutcome, CoreError> {
        let mut instance = self.load_active(entity).await?;
        let expected_version = instance.version;

        instance.apply_cancellation()?;

        let action = ApprovalAction::new(
            instance.id.clone(),
            instance.current_stage,
            ActionKind::Cancelled,
            ActorId::User(cancelled_by.clone()),
        )
        .with_comments(Some(reason));

        self.instances
            .update_versioned(&instance, expected_version, &action)
            .await?;
        self.publish_events(&mut instance).await;

        info!(
            instance_id = %instance.id.0,
            entity = %instance.entity,
            cancelled_by = %cancelled_by.0,
            "Workflow cancelled"
        );

        Ok(CancelOutcome {
            instance_id: instance.id.clone(),
            status: instance.status,
        })
    }

    /// Load the ACTIVE instance for an entity, distinguishing "never
    /// initiated" from "already terminal"
    async fn load_active(&self, entity: &EntityRef) -> Result<WorkflowInstance, CoreError> {
        if let Some(instance) = self.instances.find_active(entity).await? {
            return Ok(instance);
        }

        match self.instances.find_latest(entity).await? {
            Some(terminal) => Err(CoreError::WorkflowTerminated(format!(
                "{} is {:?}",
                entity, terminal.status
            ))),
            None => Err(CoreError::NoActiveWorkflow(entity.to_string())),
        }
    }

    /// Drain recorded domain events into the notification sink
    ///
    /// Delivery is fire-and-forget; a failed publish never fails the
    /// transition that produced the event.
    async fn publish_events(&self, instance: &mut WorkflowInstance) {
        for event in instance.take_events() {
            let event_type = event.event_type();
            if let Err(err) = self.notifications.publish(event).await {
                warn!(
                    instance_id = %instance.id.0,
                    event_type,
                    error = %err,
                    "Failed to publish workflow event"
                );
            }
        }
    }
}
