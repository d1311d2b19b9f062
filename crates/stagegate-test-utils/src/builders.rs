//! Builders for test workflow definitions and signatures.

use chrono::Utc;
use stagegate_core::{
    EntityType, RoleId, SignatureBlock, StageDefinition, UserId, WorkflowDefinition,
};

/// Fluent builder for workflow definitions in tests
///
/// Stages are appended in order; ordinals are assigned automatically so the
/// result always passes validation when each stage names a role.
pub struct DefinitionBuilder {
    entity_type: EntityType,
    version: u32,
    name: String,
    stages: Vec<StageDefinition>,
}

impl DefinitionBuilder {
    /// Start a definition for an entity type
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            name: format!("{} workflow", entity_type),
            entity_type,
            version: 1,
            stages: Vec::new(),
        }
    }

    /// Set the definition version
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Append a plain stage: one approval from any listed role completes it
    pub fn stage(mut self, name: &str, roles: &[&str]) -> Self {
        self.push_stage(name, roles, false, false);
        self
    }

    /// Append a stage completed only by coverage of every listed role
    pub fn parallel_stage(mut self, name: &str, roles: &[&str]) -> Self {
        self.push_stage(name, roles, true, false);
        self
    }

    /// Append a stage whose approvals must carry a signature block
    pub fn signed_stage(mut self, name: &str, roles: &[&str]) -> Self {
        self.push_stage(name, roles, false, true);
        self
    }

    /// Set the SLA of the most recently appended stage
    pub fn sla_hours(mut self, hours: u32) -> Self {
        if let Some(stage) = self.stages.last_mut() {
            stage.sla_hours = Some(hours);
        }
        self
    }

    /// Mark the most recently appended stage as parallel
    pub fn parallel(mut self) -> Self {
        if let Some(stage) = self.stages.last_mut() {
            stage.allow_parallel_approvers = true;
        }
        self
    }

    /// Build the definition
    pub fn build(self) -> WorkflowDefinition {
        WorkflowDefinition {
            entity_type: self.entity_type,
            version: self.version,
            name: self.name,
            description: None,
            stages: self.stages,
        }
    }

    fn push_stage(&mut self, name: &str, roles: &[&str], parallel: bool, signed: bool) {
        self.stages.push(StageDefinition {
            name: name.to_string(),
            ordinal: self.stages.len() as u32,
            required_roles: roles.iter().map(|r| RoleId(r.to_string())).collect(),
            requires_signature: signed,
            sla_hours: None,
            allow_parallel_approvers: parallel,
        });
    }
}

/// A signature block for tests, signed now by the given user
pub fn signature(signer: &str) -> SignatureBlock {
    SignatureBlock {
        reason: "Approved per review".to_string(),
        signer: UserId(signer.to_string()),
        signed_at: Utc::now(),
        client_context: Some("test-client".to_string()),
    }
}
