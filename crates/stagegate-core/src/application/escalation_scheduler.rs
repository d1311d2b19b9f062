use crate::{
    application::approver_resolver::ApproverResolver,
    application::definition_service::DefinitionService,
    domain::action::{ActionKind, ActorId, ApprovalAction},
    domain::instance::WorkflowInstance,
    domain::repository::{InstanceRepository, NotificationSink},
    CoreError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Accounting for one escalation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationSweep {
    /// Instances found past their stage SLA
    pub examined: usize,

    /// Instances escalated this sweep
    pub escalated: usize,

    /// Instances that failed to escalate (logged and skipped)
    pub failed: usize,
}

/// Periodic sweep that escalates instances past their stage SLA
///
/// Runs independently of request handling on a fixed interval. Escalation
/// changes who is eligible and records that the SLA was missed; it never
/// advances a stage or terminates an instance. Failures are isolated per
/// instance and per sweep: a failed sweep leaves concurrent `Act` calls
/// untouched, and an `Act` winning the version race simply causes that
/// instance to be skipped until the next sweep.
pub struct EscalationScheduler {
    instances: Arc<dyn InstanceRepository>,
    definitions: Arc<DefinitionService>,
    resolver: Arc<ApproverResolver>,
    notifications: Arc<dyn NotificationSink>,
    interval: Duration,
}

/// Handle to a running escalation loop
pub struct EscalationHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EscalationHandle {
    /// Signal the loop to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

impl EscalationScheduler {
    /// Create a new escalation scheduler
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        definitions: Arc<DefinitionService>,
        resolver: Arc<ApproverResolver>,
        notifications: Arc<dyn NotificationSink>,
        interval: Duration,
    ) -> Self {
        Self {
            instances,
            definitions,
            resolver,
            notifications,
            interval,
        }
    }

    /// Run one sweep against the given clock reading
    ///
    /// The repository query is the only fatal failure; individual instance
    /// escalations are isolated, counted and logged.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<EscalationSweep, CoreError> {
        let due = self.instances.find_due_for_escalation(now).await?;
        let mut sweep = EscalationSweep {
            examined: due.len(),
            ..Default::default()
        };

        for instance in due {
            let instance_id = instance.id.clone();
            match self.escalate_instance(instance).await {
                Ok(()) => sweep.escalated += 1,
                Err(CoreError::ConcurrentModification(_)) => {
                    // A request-driven Act won the version race; the next
                    // sweep re-evaluates the instance against its new stage
                    debug!(instance_id = %instance_id.0, "Escalation lost version race; skipping");
                    sweep.failed += 1;
                }
                Err(err) => {
                    error!(
                        instance_id = %instance_id.0,
                        error = %err,
                        "Failed to escalate instance"
                    );
                    sweep.failed += 1;
                }
            }
        }

        if sweep.examined > 0 {
            info!(
                examined = sweep.examined,
                escalated = sweep.escalated,
                failed = sweep.failed,
                "Escalation sweep complete"
            );
        }

        Ok(sweep)
    }

    /// Consume the scheduler into a background loop
    pub fn start(self: Arc<Self>) -> EscalationHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh start
            // does not race instances created in the same instant
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_once(Utc::now()).await {
                            error!(error = %err, "Escalation sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Escalation scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        EscalationHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn escalate_instance(&self, mut instance: WorkflowInstance) -> Result<(), CoreError> {
        let expected_version = instance.version;
        let definition = self
            .definitions
            .get_definition(&instance.entity.entity_type)
            .await?;
        let stage = instance.current_stage_definition(&definition)?.clone();

        instance.apply_escalation(&definition)?;

        // Re-resolve with the escalation level included, so the widened set
        // is known (and an organizational gap surfaces) before the write
        let eligible = self.resolver.resolve_eligible(&stage, &instance).await?;

        let action = ApprovalAction::new(
            instance.id.clone(),
            stage.ordinal,
            ActionKind::Escalated,
            ActorId::System,
        )
        .with_comments(Some(format!("Stage '{}' exceeded its SLA", stage.name)));

        self.instances
            .update_versioned(&instance, expected_version, &action)
            .await?;

        for event in instance.take_events() {
            let event_type = event.event_type();
            if let Err(err) = self.notifications.publish(event).await {
                warn!(
                    instance_id = %instance.id.0,
                    event_type,
                    error = %err,
                    "Failed to publish escalation event"
                );
            }
        }

        info!(
            instance_id = %instance.id.0,
            entity = %instance.entity,
            stage = %stage.name,
            eligible = eligible.len(),
            "Stage escalated past SLA"
        );

        Ok(())
    }
}
