use crate::domain::instance::{EntityType, RoleId};
use crate::CoreError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Represents a validated approval workflow definition for one entity type
///
/// Definitions are immutable once referenced by an active instance; changing
/// behavior requires registering a new version, never mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Entity type this workflow applies to (e.g. WORK_INSTRUCTION, FAI_REPORT)
    pub entity_type: EntityType,

    /// Definition version, bumped on every behavioral change
    pub version: u32,

    /// Human-readable name of the workflow
    pub name: String,

    /// Description of the workflow
    pub description: Option<String>,

    /// The ordered approval stages
    pub stages: Vec<StageDefinition>,
}

/// Represents one approval stage in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage name shown in task lists
    pub name: String,

    /// Position in the stage order, dense from 0
    pub ordinal: u32,

    /// Roles whose approval this stage requires (at least one)
    pub required_roles: Vec<RoleId>,

    /// Whether an APPROVE at this stage must carry a signature block
    pub requires_signature: bool,

    /// Escalation threshold; `None` means the stage never escalates
    pub sla_hours: Option<u32>,

    /// Whether completion requires one approval per required role
    /// (N-of-M by role coverage) instead of any single approval
    pub allow_parallel_approvers: bool,
}

impl StageDefinition {
    /// Deadline for this stage given the moment it was entered
    pub fn due_at(&self, entered_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.sla_hours
            .map(|hours| entered_at + Duration::hours(i64::from(hours)))
    }
}

impl WorkflowDefinition {
    /// Validate the workflow definition
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidDefinition(
                "Workflow must have a name".to_string(),
            ));
        }

        if self.stages.is_empty() {
            return Err(CoreError::InvalidDefinition(
                "Workflow must have at least one stage".to_string(),
            ));
        }

        // Ordinals must form a dense total order 0..n so stage advancement
        // is a plain increment with no gaps or cycles
        for (position, stage) in self.stages.iter().enumerate() {
            if stage.ordinal as usize != position {
                return Err(CoreError::InvalidDefinition(format!(
                    "Stage '{}' has ordinal {} but appears at position {}",
                    stage.name, stage.ordinal, position
                )));
            }

            if stage.required_roles.is_empty() {
                return Err(CoreError::InvalidDefinition(format!(
                    "Stage '{}' must name at least one required role",
                    stage.name
                )));
            }
        }

        let mut names = std::collections::HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "Duplicate stage name: {}",
                    stage.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a stage by ordinal
    pub fn stage(&self, ordinal: u32) -> Option<&StageDefinition> {
        self.stages.get(ordinal as usize)
    }

    /// Number of stages in the workflow
    pub fn total_stages(&self) -> u32 {
        self.stages.len() as u32
    }

    /// Ordinal of the final stage
    pub fn last_ordinal(&self) -> u32 {
        (self.stages.len() as u32).saturating_sub(1)
    }
}
