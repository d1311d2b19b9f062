use crate::{
    domain::instance::{InstanceId, UserId},
    types::SignatureBlock,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value object: Approval action ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

/// Who performed an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorId {
    /// A human user
    User(UserId),

    /// The engine itself (escalation sweeps)
    System,
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorId::User(user) => write!(f, "{}", user.0),
            ActorId::System => write!(f, "SYSTEM"),
        }
    }
}

/// Kind of audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Workflow instance created
    Initiated,

    /// APPROVE decision recorded
    Approved,

    /// REJECT decision recorded
    Rejected,

    /// Task reassigned to a delegate
    Delegated,

    /// SLA missed; stage escalated by the scheduler
    Escalated,

    /// Administrative cancellation
    Cancelled,
}

/// Immutable audit record of one action against a workflow instance
///
/// Actions form the append-only audit trail; they are never updated or
/// deleted. Signatures are stored verbatim as captured at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalAction {
    /// Unique identifier
    pub id: ActionId,

    /// The instance this action was applied to
    pub instance_id: InstanceId,

    /// Stage ordinal at the time of the action
    pub stage_ordinal: u32,

    /// What happened
    pub kind: ActionKind,

    /// Who acted
    pub actor: ActorId,

    /// Free-form comments (rejection reasons, cancellation reasons)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    /// Signature block, present when the stage demanded one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBlock>,

    /// Delegate receiving the task, for Delegated actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<UserId>,

    /// When the action was applied
    pub applied_at: DateTime<Utc>,
}

impl ApprovalAction {
    /// Create a new audit record
    pub fn new(instance_id: InstanceId, stage_ordinal: u32, kind: ActionKind, actor: ActorId) -> Self {
        Self {
            id: ActionId(Uuid::new_v4().to_string()),
            instance_id,
            stage_ordinal,
            kind,
            actor,
            comments: None,
            signature: None,
            delegated_to: None,
            applied_at: Utc::now(),
        }
    }

    /// Attach comments
    pub fn with_comments(mut self, comments: Option<String>) -> Self {
        self.comments = comments;
        self
    }

    /// Attach a signature block, stored verbatim
    pub fn with_signature(mut self, signature: Option<SignatureBlock>) -> Self {
        self.signature = signature;
        self
    }

    /// Record the delegate for a Delegated action
    pub fn with_delegate(mut self, delegate: UserId) -> Self {
        self.delegated_to = Some(delegate);
        self
    }
}
