//! Integration test harness for the Stagegate engine.
//!
//! Wires a real engine over the in-memory state store with static role
//! membership and a recording notification sink, so scenario tests read
//! like the operations callers actually perform.

use std::sync::Arc;

use stagegate_core::{
    ActionRequest, ApprovalEngine, Decision, EngineConfig, EntityRef, EntityType,
    InitiateRequest, InstanceRepository, Priority, SignatureBlock, UserId, WorkflowDefinition,
};
use stagegate_state_inmemory::InMemoryStateStoreProvider;
use stagegate_test_utils::{RecordingNotificationSink, StaticRoleMembership};

/// An engine wired against in-memory collaborators, plus handles for
/// inspecting what it did
pub struct TestHarness {
    /// The engine under test
    pub engine: Arc<ApprovalEngine>,

    /// Direct repository access for state assertions
    pub repository: Arc<dyn InstanceRepository>,

    /// Events published by the engine
    pub sink: Arc<RecordingNotificationSink>,
}

/// Build a harness with the given roles, definitions and config
pub async fn harness_with(
    roles: StaticRoleMembership,
    definitions: Vec<WorkflowDefinition>,
    config: EngineConfig,
) -> TestHarness {
    let provider = InMemoryStateStoreProvider::new();
    let repository = provider.instance_repository();
    let sink = Arc::new(RecordingNotificationSink::new());

    let engine = Arc::new(ApprovalEngine::new(
        repository.clone(),
        provider.definition_store(),
        Arc::new(roles),
        sink.clone(),
        config,
    ));

    for definition in definitions {
        engine
            .register_definition(definition)
            .await
            .expect("test definition must be valid");
    }

    TestHarness {
        engine,
        repository,
        sink,
    }
}

/// Build a harness with the default engine config
pub async fn harness(
    roles: StaticRoleMembership,
    definitions: Vec<WorkflowDefinition>,
) -> TestHarness {
    harness_with(roles, definitions, EngineConfig::default()).await
}

/// A membership table covering the roles the scenario tests use
pub fn default_roles() -> StaticRoleMembership {
    StaticRoleMembership::new()
        .with_role("engineer", &["eng-1", "eng-2"])
        .with_role("quality_manager", &["qm-1", "qm-2"])
        .with_role("production_manager", &["pm-1"])
        .with_role("site_director", &["dir-1"])
        .with_escalation("quality_manager", "site_director")
        .with_escalation("engineer", "site_director")
}

/// A work-instruction entity reference
pub fn wi(entity_id: &str) -> EntityRef {
    EntityRef::new(EntityType::work_instruction(), entity_id)
}

/// A first-article-inspection entity reference
pub fn fai(entity_id: &str) -> EntityRef {
    EntityRef::new(EntityType::fai_report(), entity_id)
}

/// An initiate request by "author" at normal priority
pub fn initiate(entity: EntityRef) -> InitiateRequest {
    InitiateRequest {
        entity,
        role_override: None,
        priority: Priority::Normal,
        metadata: serde_json::json!({}),
        initiated_by: UserId("author".to_string()),
    }
}

/// An APPROVE request without a signature
pub fn approve(entity: EntityRef, actor: &str) -> ActionRequest {
    ActionRequest {
        entity,
        decision: Decision::Approve,
        actor: UserId(actor.to_string()),
        comments: None,
        signature: None,
    }
}

/// An APPROVE request carrying a signature block
pub fn approve_signed(entity: EntityRef, actor: &str, signature: SignatureBlock) -> ActionRequest {
    ActionRequest {
        entity,
        decision: Decision::Approve,
        actor: UserId(actor.to_string()),
        comments: None,
        signature: Some(signature),
    }
}

/// A REJECT request with a reason
pub fn reject(entity: EntityRef, actor: &str, reason: &str) -> ActionRequest {
    ActionRequest {
        entity,
        decision: Decision::Reject,
        actor: UserId(actor.to_string()),
        comments: Some(reason.to_string()),
        signature: None,
    }
}

/// A DELEGATE request
pub fn delegate(entity: EntityRef, actor: &str, to: &str) -> ActionRequest {
    ActionRequest {
        entity,
        decision: Decision::Delegate {
            delegate_to: UserId(to.to_string()),
        },
        actor: UserId(actor.to_string()),
        comments: None,
        signature: None,
    }
}
