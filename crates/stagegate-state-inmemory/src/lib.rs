//! In-memory state store implementation for the Stagegate engine
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in the stagegate-core crate. It is primarily useful
//! for development, testing, and simple deployments where persistence is
//! not required; a database-backed store implements the same traits and
//! the same constraints (one ACTIVE instance per entity, version-checked
//! writes, append-only audit log).

use std::sync::Arc;

use stagegate_core::{DefinitionStore, InstanceRepository};

pub mod repositories;
pub use repositories::{InMemoryDefinitionStore, InMemoryInstanceRepository};


/// Provider for in-memory state store repositories
///
/// Repositories handed out by one provider share storage, so an engine and
/// a test inspecting its state observe the same instances.
#[derive(Default)]
pub struct InMemoryStateStoreProvider {
    instances: InMemoryInstanceRepository,
    definitions: InMemoryDefinitionStore,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared instance repository
    pub fn instance_repository(&self) -> Arc<dyn InstanceRepository> {
        Arc::new(self.instances.clone())
    }

    /// The shared definition store
    pub fn definition_store(&self) -> Arc<dyn DefinitionStore> {
        Arc::new(self.definitions.clone())
    }
}
