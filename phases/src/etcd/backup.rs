// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::write_backup;
use crate::errors::PhaseError;
use crate::executor::{ExecutorParams, PhaseEnv, PhaseExecutor};
use crate::logger::phase_logger;
use crate::operator::Operator;
use crate::state::StateDir;
use async_trait::async_trait;
use node_utils::NodeRunner;
use slog::{Logger, info};
use std::sync::Arc;

/// Backs up etcd data on this node before the cluster is changed.
///
/// The backup stays in place after the operation; there is nothing to roll
/// back.
pub struct EtcdBackupExecutor {
    params: ExecutorParams,
    log: Logger,
    state_dir: StateDir,
    runner: NodeRunner,
}

impl EtcdBackupExecutor {
    pub fn new(
        params: ExecutorParams,
        operator: Arc<dyn Operator>,
        env: &PhaseEnv,
    ) -> Self {
        let log =
            phase_logger(&params.log, &params.phase, params.key(), operator);
        Self {
            params,
            log,
            state_dir: env.state_dir.clone(),
            runner: env.runner.clone(),
        }
    }
}

#[async_trait]
impl PhaseExecutor for EtcdBackupExecutor {
    async fn execute(&self) -> Result<(), PhaseError> {
        self.params.progress.next_step("Backing up etcd data");
        let operation_id = self.params.operation_id();
        let path = self.state_dir.backup_path(operation_id).await?;
        write_backup(
            &self.log,
            &self.runner,
            &path,
            operation_id,
            "failed to back up etcd data",
        )
        .await?;
        info!(self.log, "Backed up etcd data to {}.", path);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), PhaseError> {
        Ok(())
    }
}
