//! Shared value types used across the domain and application layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::instance::UserId;

/// Priority of a workflow instance, carried into pending-task views
///
/// Ordered so that comparisons and sorting treat `Critical` as the highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Can wait
    Low,

    /// Default priority
    #[default]
    Normal,

    /// Expedite
    High,

    /// Line-down / ship-hold urgency
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        write!(f, "{}", name)
    }
}

/// Electronic signature captured at the boundary and stored verbatim
///
/// The engine never recomputes or verifies the signature content; it only
/// enforces presence where a stage demands one and persists the block
/// unmodified in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureBlock {
    /// Stated reason for signing (e.g. "Approved per AS9102 review")
    pub reason: String,

    /// Identity of the signer as asserted by the boundary
    pub signer: UserId,

    /// When the signature was captured
    pub signed_at: DateTime<Utc>,

    /// Opaque client context (IP address, user agent) captured by the boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_context: Option<String>,
}
