// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The lifecycle every phase implements and the context it runs with.

use crate::config::{Config, EtcdSettings, RollbackConfig};
use crate::errors::PhaseError;
use crate::progress::Progress;
use crate::state::{StateDir, StateDirError};
use async_trait::async_trait;
use node_utils::{BoxedExecutor, NodeRunner};
use phase_types::{OperationKey, OperationPlan, Phase};
use slog::Logger;
use std::sync::Arc;

/// One step of a cluster operation.
///
/// The scheduler calls `pre_check`, `execute` and `post_check` in order, and
/// calls `rollback` on phases that already ran, in reverse order, when the
/// operation fails. The four methods are never called concurrently on the
/// same executor.
///
/// Every method is cancelled by dropping its future. Commands started on
/// the node are killed when that happens.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    /// Validates preconditions. Must not have side effects.
    async fn pre_check(&self) -> Result<(), PhaseError> {
        Ok(())
    }

    /// Performs the phase's side effect.
    async fn execute(&self) -> Result<(), PhaseError>;

    /// Validates that `execute` took effect.
    async fn post_check(&self) -> Result<(), PhaseError> {
        Ok(())
    }

    /// Undoes `execute`, where that is safe.
    async fn rollback(&self) -> Result<(), PhaseError>;
}

/// Per-phase context handed to every executor constructor.
///
/// Executors read the plan and phase but never change them.
#[derive(Clone)]
pub struct ExecutorParams {
    pub plan: Arc<OperationPlan>,
    pub phase: Phase,
    pub progress: Arc<dyn Progress>,
    pub log: Logger,
}

impl ExecutorParams {
    pub fn key(&self) -> OperationKey {
        self.plan.key()
    }

    pub fn operation_id(&self) -> &str {
        &self.plan.operation_id
    }
}

/// Process-wide state shared by every phase on this node.
#[derive(Clone)]
pub struct PhaseEnv {
    pub state_dir: StateDir,
    pub etcd: EtcdSettings,
    pub rollback: RollbackConfig,
    pub runner: NodeRunner,
}

impl PhaseEnv {
    pub fn new(
        state_dir: StateDir,
        etcd: EtcdSettings,
        rollback: RollbackConfig,
        runner: NodeRunner,
    ) -> Self {
        Self { state_dir, etcd, rollback, runner }
    }

    /// Resolves the state directory named by `config` and wires `executor`
    /// up to run commands inside the node's managed environment.
    pub fn from_config(
        config: &Config,
        executor: BoxedExecutor,
        log: &Logger,
    ) -> Result<Self, StateDirError> {
        let state_dir = StateDir::resolve(&config.state_dir)?;
        let runner = NodeRunner::new(log, executor, config.commands.clone());
        Ok(Self::new(
            state_dir,
            config.etcd.clone(),
            config.rollback.clone(),
            runner,
        ))
    }
}
