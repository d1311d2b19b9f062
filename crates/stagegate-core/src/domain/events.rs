use crate::domain::instance::{EntityRef, InstanceId, InstanceStatus};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all workflow lifecycle events
///
/// Events are recorded on the instance aggregate during transitions and
/// drained by the application layer into the notification sink. Delivery is
/// fire-and-forget; the engine does not know how notifications are rendered.
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the workflow instance ID this event is associated with
    fn instance_id(&self) -> &InstanceId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Event: a workflow instance was initiated at its first stage
#[derive(Debug)]
pub struct WorkflowInitiated {
    /// The unique identifier of the instance
    pub instance_id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// Name of the first stage awaiting approval
    pub stage_name: String,

    /// When the instance was created
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowInitiated {
    fn event_type(&self) -> &'static str {
        "workflow.initiated"
    }

    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: a stage completed and the instance advanced to the next stage
#[derive(Debug)]
pub struct StageAdvanced {
    /// The unique identifier of the instance
    pub instance_id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// Name of the completed stage
    pub from_stage: String,

    /// Name of the stage now awaiting approval
    pub to_stage: String,

    /// When the advancement occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StageAdvanced {
    fn event_type(&self) -> &'static str {
        "workflow.stage_advanced"
    }

    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: the current stage exceeded its SLA and was escalated
#[derive(Debug)]
pub struct WorkflowEscalated {
    /// The unique identifier of the instance
    pub instance_id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// Name of the overdue stage
    pub stage_name: String,

    /// When the escalation was recorded
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowEscalated {
    fn event_type(&self) -> &'static str {
        "workflow.escalated"
    }

    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: the instance reached a terminal status
#[derive(Debug)]
pub struct WorkflowTerminated {
    /// The unique identifier of the instance
    pub instance_id: InstanceId,

    /// The governed entity
    pub entity: EntityRef,

    /// The terminal status (Approved, Rejected or Cancelled)
    pub status: InstanceStatus,

    /// When the terminal transition occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowTerminated {
    fn event_type(&self) -> &'static str {
        "workflow.terminated"
    }

    fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
