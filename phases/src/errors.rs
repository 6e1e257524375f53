// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::state::BackupPathError;
use camino::Utf8PathBuf;
use etcd_members_client::EtcdClientError;
use node_utils::ExecutionError;
use slog_error_chain::SlogInlineError;

/// An executor could not be constructed.
#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum BuildError {
    #[error("phase {phase_id} does not name the server it acts on")]
    MissingServer { phase_id: String },

    #[error("failed to create etcd client for phase {phase_id}")]
    EtcdClient {
        phase_id: String,
        #[source]
        err: EtcdClientError,
    },
}

/// A phase lifecycle step failed.
#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum PhaseError {
    #[error("failed to resolve backup path")]
    BackupPath(#[from] BackupPathError),

    #[error("etcd backup {path} is missing, refusing to touch etcd")]
    BackupMissing {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("etcd backup {path} is empty, refusing to touch etcd")]
    BackupEmpty { path: Utf8PathBuf },

    #[error(
        "etcd backup {path} is not a regular file, refusing to touch etcd"
    )]
    BackupNotAFile { path: Utf8PathBuf },

    #[error(
        "failed to add etcd member {peer_url} for operation {operation_id}"
    )]
    AddMember {
        operation_id: String,
        peer_url: String,
        #[source]
        err: EtcdClientError,
    },

    #[error(
        "{description} for operation {operation_id}: {}",
        display_output(.output)
    )]
    Command {
        description: &'static str,
        operation_id: String,
        /// Combined output of the failed command.
        output: String,
        #[source]
        err: ExecutionError,
    },
}

impl PhaseError {
    pub(crate) fn command(
        description: &'static str,
        operation_id: &str,
        err: ExecutionError,
    ) -> Self {
        PhaseError::Command {
            description,
            operation_id: operation_id.to_string(),
            output: err.combined_output(),
            err,
        }
    }
}

fn display_output(output: &str) -> &str {
    if output.is_empty() { "<no output>" } else { output }
}
