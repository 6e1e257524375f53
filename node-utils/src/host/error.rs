// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog_error_chain::SlogInlineError;
use std::time::Duration;

#[derive(Debug)]
pub struct CommandFailureInfo {
    pub command: String,
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailureInfo {
    /// Returns stdout followed by stderr, the way a shell would interleave
    /// them for a command whose streams were merged.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

impl std::fmt::Display for CommandFailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Command [{}] executed and failed with status: {}",
            self.command, self.status
        )?;
        write!(f, "  stdout: {}", self.stdout)?;
        write!(f, "  stderr: {}", self.stderr)
    }
}

#[derive(thiserror::Error, Debug, SlogInlineError)]
pub enum ExecutionError {
    #[error("Failed to start execution of [{command}]")]
    ExecutionStart {
        command: String,
        #[source]
        err: std::io::Error,
    },

    #[error("{0}")]
    CommandFailure(Box<CommandFailureInfo>),

    #[error("Command [{command}] did not complete within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

impl ExecutionError {
    /// Returns whatever the command wrote before failing.
    ///
    /// Empty if the command never ran or was killed before exiting.
    pub fn combined_output(&self) -> String {
        match self {
            ExecutionError::CommandFailure(info) => info.combined_output(),
            ExecutionError::ExecutionStart { .. }
            | ExecutionError::TimedOut { .. } => String::new(),
        }
    }
}
