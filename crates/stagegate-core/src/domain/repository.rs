//! Repository and collaborator traits for the Stagegate engine
//!
//! This module defines the interfaces the engine consumes. External crates
//! implement these traits to provide persistence (a database-backed
//! instance store), organizational data (role membership) and notification
//! delivery; the engine itself is pure orchestration logic over them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::action::ApprovalAction;
use super::definition::WorkflowDefinition;
use super::events::DomainEvent;
use super::instance::{EntityRef, EntityType, InstanceId, RoleId, UserId, WorkflowInstance};
use crate::CoreError;

/// Durable store for workflow instances and their audit trail
///
/// The instance row is the only mutable shared resource in the system.
/// Implementations must enforce at most one ACTIVE instance per entity key
/// and must make `update_versioned` an atomic check-and-write: the instance
/// update and the audit append succeed or fail together.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Persist a brand-new instance together with its Initiated audit record
    ///
    /// Fails with `DuplicateActiveWorkflow` when an ACTIVE instance already
    /// exists for the same entity.
    async fn insert_new(
        &self,
        instance: &WorkflowInstance,
        action: &ApprovalAction,
    ) -> Result<(), CoreError>;

    /// Find an instance by ID
    async fn find_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, CoreError>;

    /// Find the ACTIVE instance for an entity, if any
    async fn find_active(&self, entity: &EntityRef) -> Result<Option<WorkflowInstance>, CoreError>;

    /// Find the most recently created instance for an entity, active or terminal
    async fn find_latest(&self, entity: &EntityRef) -> Result<Option<WorkflowInstance>, CoreError>;

    /// Write back a mutated instance and append an audit record atomically
    ///
    /// Fails with `ConcurrentModification` when the stored version no longer
    /// matches `expected_version`; the stored version is bumped on success.
    async fn update_versioned(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        action: &ApprovalAction,
    ) -> Result<(), CoreError>;

    /// List all ACTIVE instances
    async fn list_active(&self) -> Result<Vec<WorkflowInstance>, CoreError>;

    /// ACTIVE instances whose stage SLA deadline has passed and which have
    /// not yet been escalated for the current stage occurrence
    async fn find_due_for_escalation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowInstance>, CoreError>;

    /// The append-only audit trail of an instance, in application order
    async fn actions_for_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Vec<ApprovalAction>, CoreError>;
}

/// Durable store for workflow definitions
///
/// Rows are immutable per version; the application layer caches loaded
/// definitions and invalidates only on explicit re-registration.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Load the current definition for an entity type
    async fn load(&self, entity_type: &EntityType)
        -> Result<Option<WorkflowDefinition>, CoreError>;

    /// Persist a definition version
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), CoreError>;

    /// Load all registered definitions
    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, CoreError>;
}

/// Organizational role lookup
///
/// Backed by whatever directory the deployment uses; the engine only ever
/// asks these two questions.
#[async_trait]
pub trait RoleMembership: Send + Sync {
    /// Users currently holding the role
    async fn members_of_role(&self, role: &RoleId) -> Result<HashSet<UserId>, CoreError>;

    /// The next-level role a stage escalates to, if the organization has one
    async fn next_escalation_role(&self, role: &RoleId) -> Result<Option<RoleId>, CoreError>;
}

/// Fire-and-forget event emission for downstream notification delivery
///
/// The engine publishes lifecycle events and does not know or care how they
/// are rendered or delivered. Failures are logged by the caller, never
/// propagated into the state machine.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish one lifecycle event
    async fn publish(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}
