//! Read-side projections: pending tasks, status views, dashboards, history.

use pretty_assertions::assert_eq;

use stagegate_core::{
    ActionKind, EntityType, InstanceStatus, Priority, TaskFilters, UserId,
};
use stagegate_test_utils::DefinitionBuilder;
use stagegate_tests::*;

fn wi_definition() -> stagegate_core::WorkflowDefinition {
    DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Technical Review", &["engineer"])
        .sla_hours(24)
        .stage("Quality Release", &["quality_manager"])
        .build()
}

fn fai_definition() -> stagegate_core::WorkflowDefinition {
    DefinitionBuilder::new(EntityType::fai_report())
        .stage("Inspection Review", &["quality_manager"])
        .build()
}

#[tokio::test]
async fn pending_tasks_follow_eligibility_and_priority_order() {
    let h = harness(default_roles(), vec![wi_definition(), fai_definition()]).await;

    h.engine.initiate(initiate(wi("wi-low"))).await.unwrap();

    let mut critical = initiate(wi("wi-critical"));
    critical.priority = Priority::Critical;
    h.engine.initiate(critical).await.unwrap();

    h.engine.initiate(initiate(fai("fai-1"))).await.unwrap();

    // Both work instructions sit at the engineer stage
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("eng-1".to_string()), &TaskFilters::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].entity.entity_id, "wi-critical");
    assert_eq!(tasks[0].priority, Priority::Critical);
    assert_eq!(tasks[1].entity.entity_id, "wi-low");
    assert!(tasks.iter().all(|task| task.stage_name == "Technical Review"));
    assert!(tasks.iter().all(|task| !task.overdue));

    // The quality manager only sees the FAI at this point
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("qm-1".to_string()), &TaskFilters::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].entity.entity_id, "fai-1");

    // Filters narrow by entity type and priority
    let filter = TaskFilters {
        entity_type: Some(EntityType::work_instruction()),
        priority: Some(Priority::Critical),
    };
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("eng-1".to_string()), &filter)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].entity.entity_id, "wi-critical");
}

#[tokio::test]
async fn parallel_stage_tasks_drop_actors_who_already_approved() {
    let definition = DefinitionBuilder::new(EntityType::work_instruction())
        .parallel_stage(
            "Joint Release",
            &["quality_manager", "production_manager"],
        )
        .build();
    let h = harness(default_roles(), vec![definition]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    h.engine.act(approve(wi("wi-1"), "qm-1")).await.unwrap();

    // qm-1 already acted on this occurrence; pm-1 still has the task
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("qm-1".to_string()), &TaskFilters::default())
        .await
        .unwrap();
    assert!(tasks.is_empty());

    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("pm-1".to_string()), &TaskFilters::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].requires_signature);
}

#[tokio::test]
async fn initiator_never_sees_their_own_entity_as_a_task() {
    let roles = stagegate_test_utils::StaticRoleMembership::new()
        .with_role("quality_manager", &["author", "qm-1"]);
    let definition = DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Quality Release", &["quality_manager"])
        .build();
    let h = harness(roles, vec![definition]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("author".to_string()), &TaskFilters::default())
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn status_reports_completion_through_the_lifecycle() {
    let h = harness(default_roles(), vec![wi_definition()]).await;

    // Never initiated
    let status = h.engine.status_for(&wi("wi-1")).await.unwrap();
    assert!(!status.has_active_workflow);
    assert_eq!(status.status, None);
    assert_eq!(status.completion_percentage, None);

    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();
    let status = h.engine.status_for(&wi("wi-1")).await.unwrap();
    assert!(status.has_active_workflow);
    assert_eq!(status.current_stage, Some("Technical Review".to_string()));
    assert_eq!(status.completion_percentage, Some(0));

    h.engine.act(approve(wi("wi-1"), "eng-1")).await.unwrap();
    let status = h.engine.status_for(&wi("wi-1")).await.unwrap();
    assert_eq!(status.current_stage, Some("Quality Release".to_string()));
    assert_eq!(status.completion_percentage, Some(50));

    h.engine.act(approve(wi("wi-1"), "qm-1")).await.unwrap();
    let status = h.engine.status_for(&wi("wi-1")).await.unwrap();
    assert!(!status.has_active_workflow);
    assert_eq!(status.status, Some(InstanceStatus::Approved));
    assert_eq!(status.completion_percentage, Some(100));
}

#[tokio::test]
async fn status_of_rejected_workflow_keeps_partial_completion() {
    let h = harness(default_roles(), vec![wi_definition()]).await;

    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();
    h.engine.act(approve(wi("wi-1"), "eng-1")).await.unwrap();
    h.engine
        .act(reject(wi("wi-1"), "qm-1", "Torque spec missing"))
        .await
        .unwrap();

    let status = h.engine.status_for(&wi("wi-1")).await.unwrap();
    assert!(!status.has_active_workflow);
    assert_eq!(status.status, Some(InstanceStatus::Rejected));
    assert_eq!(status.completion_percentage, Some(50));
    assert_eq!(status.current_stage, None);
}

#[tokio::test]
async fn dashboard_counts_by_type_and_priority() {
    let h = harness(default_roles(), vec![wi_definition(), fai_definition()]).await;

    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let mut high = initiate(wi("wi-2"));
    high.priority = Priority::High;
    h.engine.initiate(high).await.unwrap();

    h.engine.initiate(initiate(fai("fai-1"))).await.unwrap();

    // Terminal instances leave the dashboard
    h.engine.initiate(initiate(fai("fai-done"))).await.unwrap();
    h.engine.act(approve(fai("fai-done"), "qm-1")).await.unwrap();

    let stats = h.engine.dashboard_stats().await.unwrap();
    assert_eq!(stats.active_total, 3);
    assert_eq!(stats.by_entity_type.get("WORK_INSTRUCTION"), Some(&2));
    assert_eq!(stats.by_entity_type.get("FAI_REPORT"), Some(&1));
    assert_eq!(stats.by_priority.get("NORMAL"), Some(&2));
    assert_eq!(stats.by_priority.get("HIGH"), Some(&1));
    assert_eq!(stats.overdue, 0);
}

#[tokio::test]
async fn history_returns_the_full_trail_in_order() {
    let h = harness(default_roles(), vec![wi_definition()]).await;

    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();
    h.engine.act(approve(wi("wi-1"), "eng-1")).await.unwrap();
    h.engine.act(approve(wi("wi-1"), "qm-1")).await.unwrap();

    let history = h.engine.history_for(&wi("wi-1")).await.unwrap();
    let kinds: Vec<ActionKind> = history.iter().map(|action| action.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::Initiated,
            ActionKind::Approved,
            ActionKind::Approved
        ]
    );
    assert_eq!(history[1].stage_ordinal, 0);
    assert_eq!(history[2].stage_ordinal, 1);

    // Entities with no instances read as an empty trail
    let history = h.engine.history_for(&wi("never")).await.unwrap();
    assert!(history.is_empty());
}
