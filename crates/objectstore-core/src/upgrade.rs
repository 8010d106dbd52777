//! Destructive schema upgrade
//!
//! The engine only reports that the database version changed, never which
//! store changed. Every upgrade therefore drops and recreates every declared
//! store with its indexes, in declaration order. Records held in a recreated
//! store are lost on every version bump.

use tracing::{debug, info, warn};

use crate::config::{DatabaseConfig, IndexConfig};
use crate::engine::UpgradeTransaction;
use crate::error::{UpgradeError, UpgradeStepKind};
use crate::logging::prefix;

/// A single schema operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStep {
    DropStore {
        store: String,
    },
    CreateStore {
        store: String,
        key_path: String,
    },
    CreateIndex {
        store: String,
        index: IndexConfig,
    },
}

impl UpgradeStep {
    pub fn store(&self) -> &str {
        match self {
            UpgradeStep::DropStore { store }
            | UpgradeStep::CreateStore { store, .. }
            | UpgradeStep::CreateIndex { store, .. } => store,
        }
    }

    fn kind(&self) -> UpgradeStepKind {
        match self {
            UpgradeStep::DropStore { .. } => UpgradeStepKind::DropStore,
            UpgradeStep::CreateStore { .. } => UpgradeStepKind::CreateStore,
            UpgradeStep::CreateIndex { index, .. } => UpgradeStepKind::CreateIndex(index.name.clone()),
        }
    }
}

/// Ordered list of steps that reconciles the engine with the declared schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradePlan {
    pub steps: Vec<UpgradeStep>,
}

impl UpgradePlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of existing stores this plan drops.
    pub fn dropped_stores(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, UpgradeStep::DropStore { .. }))
            .count()
    }
}

/// Recreates every declared store during a version change.
#[derive(Debug, Clone)]
pub struct SchemaUpgrader {
    config: DatabaseConfig,
}

impl SchemaUpgrader {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Build the drop-and-recreate plan.
    ///
    /// `exists` reports whether a store is currently present on the connection.
    pub fn plan(&self, exists: impl Fn(&str) -> bool) -> UpgradePlan {
        let mut steps = Vec::new();
        for store in &self.config.store_configs {
            let name = store.store_name.clone();
            if exists(&name) {
                steps.push(UpgradeStep::DropStore {
                    store: name.clone(),
                });
            }
            steps.push(UpgradeStep::CreateStore {
                store: name.clone(),
                key_path: store.key_path().to_string(),
            });
            for index in &store.indexes {
                steps.push(UpgradeStep::CreateIndex {
                    store: name.clone(),
                    index: index.clone(),
                });
            }
        }
        UpgradePlan { steps }
    }

    /// Apply the plan against a live version change.
    ///
    /// Stops at the first failing step. The engine is expected to abort the
    /// version change so that no partial schema survives.
    pub fn upgrade(&self, tx: &mut dyn UpgradeTransaction) -> Result<(), UpgradeError> {
        let plan = self.plan(|name| tx.contains_store(name));
        info!(
            old_version = tx.old_version(),
            new_version = tx.new_version(),
            steps = plan.len(),
            dropped = plan.dropped_stores(),
            "{} Upgrade needed",
            prefix::UPGRADE
        );

        for step in &plan.steps {
            debug!(store = step.store(), step = %step.kind(), "Applying schema step");
            let result = match step {
                UpgradeStep::DropStore { store } => tx.delete_store(store),
                UpgradeStep::CreateStore { store, key_path } => tx.create_store(store, key_path),
                UpgradeStep::CreateIndex { store, index } => tx.create_index(store, index),
            };
            if let Err(source) = result {
                let err = UpgradeError {
                    store: step.store().to_string(),
                    step: step.kind(),
                    source,
                };
                warn!("{} Schema upgrade failed: {}", prefix::UPGRADE, err);
                return Err(err);
            }
        }

        info!(new_version = tx.new_version(), "{} Upgrade complete", prefix::UPGRADE);
        Ok(())
    }
}
