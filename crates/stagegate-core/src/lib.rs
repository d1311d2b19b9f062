//!
//! Stagegate Core - Approval workflow engine
//!
//! This crate defines the domain model and application services for the
//! Stagegate multi-stage approval workflow engine. Business entities (work
//! instructions, FAI reports, quality processes, non-conformance records)
//! plug into one generic engine through declarative workflow definitions;
//! persistence, role membership and notification delivery are external
//! collaborators behind the traits in [`domain::repository`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - core business models, entities, and rules
pub mod domain;

/// Application services - core application logic
pub mod application;

/// Shared value types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;
pub use types::{Priority, SignatureBlock};

// Re-export main API types for easy use
pub use application::approver_resolver::{ApproverResolver, DelegationPolicy};
pub use application::definition_service::DefinitionService;
pub use application::engine::{ApprovalEngine, EngineConfig};
pub use application::escalation_scheduler::{EscalationHandle, EscalationScheduler, EscalationSweep};
pub use application::task_query_service::{
    DashboardStats, PendingTask, TaskFilters, TaskQueryService, WorkflowStatusView,
};
pub use application::transition_processor::{
    ActOutcome, ActionRequest, CancelOutcome, Decision, InitiateOutcome, InitiateRequest,
    TransitionProcessor,
};
pub use domain::action::{ActionId, ActionKind, ActorId, ApprovalAction};
pub use domain::definition::{StageDefinition, WorkflowDefinition};
pub use domain::events::DomainEvent;
pub use domain::instance::{
    EntityRef, EntityType, InstanceId, InstanceStatus, RoleId, UserId, WorkflowInstance,
};
pub use domain::repository::{
    DefinitionStore, InstanceRepository, NotificationSink, RoleMembership,
};
