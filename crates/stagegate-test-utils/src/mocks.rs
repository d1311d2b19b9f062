//! Mock implementations of the engine's external collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use stagegate_core::{
    CoreError, DomainEvent, NotificationSink, RoleId, RoleMembership, UserId,
};

/// Role membership backed by a fixed table
#[derive(Default)]
pub struct StaticRoleMembership {
    members: HashMap<String, HashSet<UserId>>,
    escalations: HashMap<String, RoleId>,
}

impl StaticRoleMembership {
    /// Create an empty membership table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add users to a role
    pub fn with_role(mut self, role: &str, users: &[&str]) -> Self {
        self.members
            .entry(role.to_string())
            .or_default()
            .extend(users.iter().map(|u| UserId(u.to_string())));
        self
    }

    /// Map a role to its next escalation level
    pub fn with_escalation(mut self, role: &str, next: &str) -> Self {
        self.escalations
            .insert(role.to_string(), RoleId(next.to_string()));
        self
    }
}

#[async_trait]
impl RoleMembership for StaticRoleMembership {
    async fn members_of_role(&self, role: &RoleId) -> Result<HashSet<UserId>, CoreError> {
        Ok(self.members.get(&role.0).cloned().unwrap_or_default())
    }

    async fn next_escalation_role(&self, role: &RoleId) -> Result<Option<RoleId>, CoreError> {
        Ok(self.escalations.get(&role.0).cloned())
    }
}

/// Notification sink that records published events for assertions
#[derive(Default)]
pub struct RecordingNotificationSink {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingNotificationSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// The (event_type, instance_id) pairs published so far, in order
    pub fn received(&self) -> Vec<(String, String)> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// The event types published so far, in order
    pub fn event_types(&self) -> Vec<String> {
        self.received().into_iter().map(|(kind, _)| kind).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn publish(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.events
            .lock()
            .expect("sink lock poisoned")
            .push((event.event_type().to_string(), event.instance_id().0.clone()));
        Ok(())
    }
}

/// Notification sink that always fails, for fire-and-forget assertions
#[derive(Default)]
pub struct FailingNotificationSink;

#[async_trait]
impl NotificationSink for FailingNotificationSink {
    async fn publish(&self, _event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        Err(CoreError::StateStoreError(
            "notification channel unavailable".to_string(),
        ))
    }
}
