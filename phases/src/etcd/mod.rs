// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Phases that change the cluster's etcd membership.

use crate::errors::PhaseError;
use camino::{Utf8Path, Utf8PathBuf};
use node_utils::NodeRunner;
use phase_types::OperationPlan;
use slog::{Logger, warn};
use slog_error_chain::InlineErrorChain;

mod backup;
mod join;

pub use backup::EtcdBackupExecutor;
pub use join::EtcdJoinExecutor;

/// Client API URLs of every master in `plan`, in plan order.
pub fn master_endpoints(plan: &OperationPlan, api_port: u16) -> Vec<String> {
    plan.masters().map(|server| server.https_url(api_port)).collect()
}

/// Runs `etcd backup <path>`.
///
/// Unless the command succeeds, whatever it left at `path` is removed so
/// that a partial backup is never mistaken for a complete one. That includes
/// the future being dropped while the command is still running.
async fn write_backup(
    log: &Logger,
    runner: &NodeRunner,
    path: &Utf8Path,
    operation_id: &str,
    description: &'static str,
) -> Result<(), PhaseError> {
    let mut partial = PartialBackup::new(log, path);
    runner.etcd(["backup", path.as_str()]).await.map_err(|err| {
        partial.remove();
        PhaseError::command(description, operation_id, err)
    })?;
    partial.keep();
    Ok(())
}

/// A backup file being written. Removed on drop unless [`Self::keep`] was
/// called.
struct PartialBackup {
    log: Logger,
    path: Option<Utf8PathBuf>,
}

impl PartialBackup {
    fn new(log: &Logger, path: &Utf8Path) -> Self {
        Self { log: log.clone(), path: Some(path.to_owned()) }
    }

    fn keep(&mut self) {
        self.path = None;
    }

    fn remove(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        // Also runs from Drop, which cannot await.
        match std::fs::remove_file(&path) {
            Ok(()) => {
                warn!(self.log, "removed partial etcd backup"; "path" => %path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    self.log,
                    "failed to remove partial etcd backup";
                    "path" => %path,
                    InlineErrorChain::new(&e),
                );
            }
        }
    }
}

impl Drop for PartialBackup {
    fn drop(&mut self) {
        self.remove();
    }
}
