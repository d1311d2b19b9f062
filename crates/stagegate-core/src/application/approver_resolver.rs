use crate::{
    domain::definition::StageDefinition,
    domain::instance::{RoleId, UserId, WorkflowInstance},
    domain::repository::RoleMembership,
    CoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// What happens to the original approver's eligibility when they delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationPolicy {
    /// The delegator stays eligible alongside the delegate
    #[default]
    RetainDelegator,

    /// The delegator loses eligibility while the delegation stands
    RevokeDelegator,
}

/// Computes the set of users eligible to act on a stage
///
/// Eligibility is the union of role memberships over the stage's effective
/// required roles, widened by standing delegations and (once a stage has
/// escalated) one level of organizational escalation, then narrowed by
/// conflict-of-interest exclusion: the user who initiated the workflow can
/// never approve their own entity. That exclusion is a hard invariant, not
/// a per-stage setting.
pub struct ApproverResolver {
    roles: Arc<dyn RoleMembership>,
    delegation_policy: DelegationPolicy,
}

impl ApproverResolver {
    /// Create a resolver over a role-membership collaborator
    pub fn new(roles: Arc<dyn RoleMembership>, delegation_policy: DelegationPolicy) -> Self {
        Self {
            roles,
            delegation_policy,
        }
    }

    /// Resolve the eligible approver set for the instance's current stage
    pub async fn resolve_eligible(
        &self,
        stage: &StageDefinition,
        instance: &WorkflowInstance,
    ) -> Result<HashSet<UserId>, CoreError> {
        let mut eligible = HashSet::new();

        for role in instance.effective_roles(stage) {
            let members = self.roles.members_of_role(role).await?;
            if members.is_empty() {
                tracing::error!(
                    role = %role.0,
                    entity = %instance.entity,
                    stage = %stage.name,
                    "Required role has no members; approval cannot progress"
                );
                return Err(CoreError::NoEligibleApprovers(role.0.clone()));
            }
            eligible.extend(members);

            if instance.stage_escalated {
                if let Some(next) = self.roles.next_escalation_role(role).await? {
                    eligible.extend(self.roles.members_of_role(&next).await?);
                }
            }
        }

        for (delegate, delegator) in &instance.stage_delegates {
            eligible.insert(delegate.clone());
            if self.delegation_policy == DelegationPolicy::RevokeDelegator {
                eligible.remove(delegator);
            }
        }

        eligible.remove(&instance.initiated_by);

        if eligible.is_empty() {
            tracing::error!(
                entity = %instance.entity,
                stage = %stage.name,
                "Eligible approver set is empty after exclusions"
            );
            return Err(CoreError::NoEligibleApprovers(stage.name.clone()));
        }

        Ok(eligible)
    }

    /// The effective required roles an actor's APPROVE covers
    ///
    /// An actor covers the roles they hold directly; a delegate additionally
    /// covers the roles held by whoever delegated to them.
    pub async fn roles_covered_by(
        &self,
        actor: &UserId,
        stage: &StageDefinition,
        instance: &WorkflowInstance,
    ) -> Result<HashSet<RoleId>, CoreError> {
        let delegator = instance.stage_delegates.get(actor);
        let mut covered = HashSet::new();

        for role in instance.effective_roles(stage) {
            let members = self.roles.members_of_role(role).await?;
            if members.contains(actor) || delegator.is_some_and(|d| members.contains(d)) {
                covered.insert(role.clone());
            }
        }

        Ok(covered)
    }
}
