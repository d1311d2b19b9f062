//! Escalation scheduler scenarios: SLA sweeps over the shared store.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use stagegate_core::{ActionKind, ActorId, CoreError, EntityType, InstanceStatus, UserId};
use stagegate_test_utils::DefinitionBuilder;
use stagegate_tests::*;

fn sla_definition() -> stagegate_core::WorkflowDefinition {
    DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Quality Release", &["quality_manager"])
        .sla_hours(4)
        .build()
}

#[tokio::test]
async fn sweep_escalates_overdue_instances_once() {
    let h = harness(default_roles(), vec![sla_definition()]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let scheduler = h.engine.escalation_scheduler();

    // Within the SLA nothing happens
    let sweep = scheduler.sweep_once(Utc::now()).await.unwrap();
    assert_eq!(sweep.examined, 0);

    let later = Utc::now() + Duration::hours(8);
    let sweep = scheduler.sweep_once(later).await.unwrap();
    assert_eq!(sweep.examined, 1);
    assert_eq!(sweep.escalated, 1);
    assert_eq!(sweep.failed, 0);

    // Escalation never advances or terminates
    let active = h.repository.find_active(&wi("wi-1")).await.unwrap().unwrap();
    assert_eq!(active.status, InstanceStatus::Active);
    assert_eq!(active.current_stage, 0);
    assert!(active.stage_escalated);

    // Exactly one ESCALATED audit entry, attributed to the system
    let history = h.engine.history_for(&wi("wi-1")).await.unwrap();
    let escalations: Vec<_> = history
        .iter()
        .filter(|action| action.kind == ActionKind::Escalated)
        .collect();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].actor, ActorId::System);

    assert!(h
        .sink
        .event_types()
        .contains(&"workflow.escalated".to_string()));

    // A second sweep finds nothing left to escalate
    let sweep = scheduler.sweep_once(later).await.unwrap();
    assert_eq!(sweep.examined, 0);
}

#[tokio::test]
async fn escalation_widens_eligibility_to_the_next_level() {
    let h = harness(default_roles(), vec![sla_definition()]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    // Before escalation the site director is not eligible
    let err = h.engine.act(approve(wi("wi-1"), "dir-1")).await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthorizedForStage(_)));

    let later = Utc::now() + Duration::hours(8);
    h.engine
        .escalation_scheduler()
        .sweep_once(later)
        .await
        .unwrap();

    // The director now sees the task, flagged overdue
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("dir-1".to_string()), &Default::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].overdue);

    // Original approvers stay eligible; the workflow is approved late
    let tasks = h
        .engine
        .pending_tasks_for_user(&UserId("qm-1".to_string()), &Default::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);

    let outcome = h.engine.act(approve(wi("wi-1"), "dir-1")).await.unwrap();
    assert_eq!(outcome.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn stages_without_sla_never_escalate() {
    let definition = DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Quality Release", &["quality_manager"])
        .build();
    let h = harness(default_roles(), vec![definition]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let far_future = Utc::now() + Duration::days(365);
    let sweep = h
        .engine
        .escalation_scheduler()
        .sweep_once(far_future)
        .await
        .unwrap();
    assert_eq!(sweep.examined, 0);
}

#[tokio::test]
async fn advancing_a_stage_resets_the_escalation_clock() {
    let definition = DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Technical Review", &["engineer"])
        .sla_hours(4)
        .stage("Quality Release", &["quality_manager"])
        .sla_hours(4)
        .build();
    let h = harness(default_roles(), vec![definition]).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let later = Utc::now() + Duration::hours(8);
    let sweep = h
        .engine
        .escalation_scheduler()
        .sweep_once(later)
        .await
        .unwrap();
    assert_eq!(sweep.escalated, 1);

    // Advancing enters a fresh stage occurrence with its own deadline
    h.engine.act(approve(wi("wi-1"), "eng-1")).await.unwrap();

    let active = h.repository.find_active(&wi("wi-1")).await.unwrap().unwrap();
    assert!(!active.stage_escalated);

    // The new stage only escalates once its own SLA elapses; one hour in,
    // its four hour budget is still open
    let soon = Utc::now() + Duration::hours(1);
    let sweep = h
        .engine
        .escalation_scheduler()
        .sweep_once(soon)
        .await
        .unwrap();
    assert_eq!(sweep.examined, 0);
}

#[tokio::test]
async fn background_loop_escalates_without_requests() {
    let mut config = stagegate_core::EngineConfig::default();
    config.escalation_interval_secs = 1;

    let definition = DefinitionBuilder::new(EntityType::work_instruction())
        .stage("Quality Release", &["quality_manager"])
        .sla_hours(0)
        .build();
    let h = harness_with(default_roles(), vec![definition], config).await;
    h.engine.initiate(initiate(wi("wi-1"))).await.unwrap();

    let handle = h.engine.start_escalation_sweeps();
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    handle.shutdown().await;

    let active = h.repository.find_active(&wi("wi-1")).await.unwrap().unwrap();
    assert!(active.stage_escalated);
}
