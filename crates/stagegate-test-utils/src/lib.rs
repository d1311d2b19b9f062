//! Testing utilities for the Stagegate platform.
//!
//! This crate provides standardized testing utilities for the Stagegate
//! engine: definition builders and mock implementations of the external
//! collaborator traits (role membership, notification sink).

pub mod builders;
pub mod mocks;

pub use builders::{signature, DefinitionBuilder};
pub use mocks::{FailingNotificationSink, RecordingNotificationSink, StaticRoleMembership};
