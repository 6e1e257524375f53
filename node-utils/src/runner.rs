// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running commands inside the node's managed environment.

use crate::host::{BoxedExecutor, ExecutionError, Input, Output};
use serde::{Deserialize, Serialize};
use slog::{Logger, o};
use std::ffi::OsStr;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_ETCD: &str = "etcd";
pub const DEFAULT_SYSTEMCTL: &str = "/bin/systemctl";
pub const DEFAULT_ETCD_SERVICE: &str = "etcd";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

fn default_enter() -> Vec<String> {
    ["/usr/bin/gravity", "planet", "enter", "--", "--notty"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_etcd() -> String {
    DEFAULT_ETCD.to_string()
}

fn default_systemctl() -> String {
    DEFAULT_SYSTEMCTL.to_string()
}

fn default_etcd_service() -> String {
    DEFAULT_ETCD_SERVICE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// How commands reach the node's managed environment.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RunnerConfig {
    /// Command prefix that enters the managed environment. Each command is
    /// appended to it. An empty prefix runs commands directly on the host.
    #[serde(default = "default_enter")]
    pub enter: Vec<String>,
    /// etcd program inside the environment.
    #[serde(default = "default_etcd")]
    pub etcd: String,
    /// systemctl program inside the environment.
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
    /// Unit name of the etcd service.
    #[serde(default = "default_etcd_service")]
    pub etcd_service: String,
    /// Upper bound on a single command's run time.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enter: default_enter(),
            etcd: default_etcd(),
            systemctl: default_systemctl(),
            etcd_service: default_etcd_service(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RunnerConfig {
    /// A configuration that runs commands directly on the host.
    pub fn direct() -> Self {
        Self { enter: Vec::new(), ..Default::default() }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Runs commands inside the node's managed environment.
///
/// Commands are killed if the returned future is dropped, so cancelling the
/// caller cancels the command.
#[derive(Clone)]
pub struct NodeRunner {
    log: Logger,
    executor: BoxedExecutor,
    config: RunnerConfig,
    timeout: Duration,
}

impl NodeRunner {
    pub fn new(
        log: &Logger,
        executor: BoxedExecutor,
        config: RunnerConfig,
    ) -> Self {
        let timeout = config.timeout();
        Self {
            log: log.new(o!("component" => "NodeRunner")),
            executor,
            config,
            timeout,
        }
    }

    /// Overrides the configured per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `program` with `args` inside the managed environment.
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
    ) -> Result<Output, ExecutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = match self.config.enter.split_first() {
            Some((enter, enter_args)) => {
                let mut command = Command::new(enter);
                command.args(enter_args).arg(program);
                command
            }
            None => Command::new(program),
        };
        command.args(args).kill_on_drop(true);

        let command_str = Input::from(command.as_std()).to_string();
        match tokio::time::timeout(
            self.timeout,
            self.executor.execute_async(&mut command),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => {
                slog::warn!(
                    self.log,
                    "command timed out";
                    "command" => command_str.as_str(),
                    "timeout" => ?self.timeout,
                );
                Err(ExecutionError::TimedOut {
                    command: command_str,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Runs the etcd program with `args`.
    pub async fn etcd<I, S>(&self, args: I) -> Result<Output, ExecutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run(&self.config.etcd, args).await
    }

    /// Applies a systemctl `action` (`stop`, `start`, ...) to the etcd
    /// service.
    pub async fn etcd_service(
        &self,
        action: &str,
    ) -> Result<Output, ExecutionError> {
        let unit = self.config.etcd_service.as_str();
        self.run(&self.config.systemctl, [action, unit]).await
    }
}
