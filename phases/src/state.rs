// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The local state directory and the files phases keep in it.

use camino::{Utf8Path, Utf8PathBuf};
use slog_error_chain::SlogInlineError;
use std::io;

/// Mode for directories shared between phases: owner writes, everyone
/// reads.
pub const SHARED_DIR_MODE: u32 = 0o755;

const SECRETS_DIR: &str = "secrets";
const BACKUP_DIR: &str = "backup";

#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum StateDirError {
    #[error("state directory {path} is not accessible")]
    Inaccessible {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("state directory {path} is not a directory")]
    NotADirectory { path: Utf8PathBuf },
}

#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum BackupPathError {
    #[error("operation ID {operation_id:?} cannot be used in a file name")]
    InvalidOperationId { operation_id: String },
    #[error("failed to create backup directory {path}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },
}

/// The node's local state directory.
///
/// Resolved once per process and handed to every phase, so that the backup
/// writer and the restore reader always agree on paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDir {
    root: Utf8PathBuf,
}

impl StateDir {
    /// Checks that `path` exists and is a directory.
    pub fn resolve(path: &Utf8Path) -> Result<Self, StateDirError> {
        let metadata = std::fs::metadata(path).map_err(|err| {
            StateDirError::Inaccessible { path: path.to_owned(), err }
        })?;
        if !metadata.is_dir() {
            return Err(StateDirError::NotADirectory { path: path.to_owned() });
        }
        Ok(Self { root: path.to_owned() })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding TLS material for talking to cluster services.
    pub fn secrets_dir(&self) -> Utf8PathBuf {
        self.root.join(SECRETS_DIR)
    }

    pub fn backup_dir(&self) -> Utf8PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Path of the etcd backup taken for `operation_id`, creating the backup
    /// directory if needed.
    pub async fn backup_path(
        &self,
        operation_id: &str,
    ) -> Result<Utf8PathBuf, BackupPathError> {
        self.backup_file(&format!("join-{operation_id}.backup"), operation_id)
            .await
    }

    /// Path of the backup a join rollback takes before touching etcd.
    pub async fn rollback_backup_path(
        &self,
        operation_id: &str,
    ) -> Result<Utf8PathBuf, BackupPathError> {
        self.backup_file(
            &format!("rollback-{operation_id}.backup"),
            operation_id,
        )
        .await
    }

    async fn backup_file(
        &self,
        file_name: &str,
        operation_id: &str,
    ) -> Result<Utf8PathBuf, BackupPathError> {
        if operation_id.contains(['/', '\0']) {
            return Err(BackupPathError::InvalidOperationId {
                operation_id: operation_id.to_string(),
            });
        }
        let dir = self.backup_dir();
        tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(SHARED_DIR_MODE)
            .create(&dir)
            .await
            .map_err(|err| BackupPathError::CreateDir {
                path: dir.clone(),
                err,
            })?;
        Ok(dir.join(file_name))
    }
}
