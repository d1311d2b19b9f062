use thiserror::Error;

/// Core error type for the Stagegate engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No workflow definition is registered for the entity type
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(String),

    /// A workflow definition failed validation
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// An ACTIVE instance already exists for the entity
    #[error("Duplicate active workflow: {0}")]
    DuplicateActiveWorkflow(String),

    /// No workflow instance exists for the entity
    #[error("No active workflow: {0}")]
    NoActiveWorkflow(String),

    /// The instance reached a terminal status and accepts no further actions
    #[error("Workflow terminated: {0}")]
    WorkflowTerminated(String),

    /// The actor is not in the eligible approver set for the current stage
    #[error("Not authorized for stage: {0}")]
    NotAuthorizedForStage(String),

    /// The stage requires a signature block on approval
    #[error("Signature required: {0}")]
    SignatureRequired(String),

    /// A required role resolved to an empty membership set
    #[error("No eligible approvers: {0}")]
    NoEligibleApprovers(String),

    /// A concurrent writer won the version check; the caller may retry
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::StateStoreError(err)
    }
}
