// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The slice of the cluster operator API phases use: attaching log entries
//! to an operation.

use chrono::{DateTime, Utc};
use phase_types::{OperationKey, Server};
use serde::{Deserialize, Serialize};
use slog_error_chain::SlogInlineError;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A log line attached to an operation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    /// The server the entry concerns, if any.
    pub server: Option<Server>,
    pub message: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum OperatorError {
    #[error("operator API unavailable: {0}")]
    Unavailable(String),
}

/// Handle to the cluster operator.
///
/// Called from inside the logging path, so implementations must not block
/// for long; queue the entry and deliver it in the background if the
/// transport is slow.
pub trait Operator: Send + Sync {
    fn create_log_entry(
        &self,
        key: &OperationKey,
        entry: LogEntry,
    ) -> Result<(), OperatorError>;
}
