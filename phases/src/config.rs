// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files for the phase executors

use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigLogging;
use node_utils::RunnerConfig;
use serde::{Deserialize, Serialize};
use slog::Logger;
use slog_error_chain::SlogInlineError;
use std::time::Duration;
use thiserror::Error;

/// Port etcd members serve the client API on.
pub const ETCD_API_PORT: u16 = 2379;
/// Port etcd members talk to each other on.
pub const ETCD_PEER_PORT: u16 = 2380;
pub const ETCD_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration shared by every phase executor in the process
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Local state directory. Secrets and backups live underneath it.
    pub state_dir: Utf8PathBuf,
    #[serde(default)]
    pub etcd: EtcdSettings,
    /// How commands reach the node's managed environment.
    #[serde(default)]
    pub commands: RunnerConfig,
    #[serde(default)]
    pub rollback: RollbackConfig,
    /// Process-wide logging configuration.
    pub log: ConfigLogging,
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config_parsed: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config_parsed)
    }

    /// Builds the process's root logger from the `[log]` table.
    pub fn to_logger(&self) -> Result<Logger, std::io::Error> {
        self.log.to_logger("expand-phases")
    }
}

fn default_api_port() -> u16 {
    ETCD_API_PORT
}

fn default_peer_port() -> u16 {
    ETCD_PEER_PORT
}

fn default_request_timeout_secs() -> u64 {
    ETCD_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct EtcdSettings {
    /// Client API port; master endpoints are addressed on it.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Peer port; a joining member is announced on it.
    #[serde(default = "default_peer_port")]
    pub peer_port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EtcdSettings {
    fn default() -> Self {
        Self {
            api_port: ETCD_API_PORT,
            peer_port: ETCD_PEER_PORT,
            request_timeout_secs: ETCD_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl EtcdSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Extra steps taken when a join is rolled back.
///
/// With everything off, rolling back a join only stops the etcd service.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct RollbackConfig {
    /// After stopping etcd, restore its data from the operation's backup and
    /// start it again.
    #[serde(default)]
    pub restore_from_backup: bool,
    /// Before stopping etcd, take another backup of its current data.
    #[serde(default)]
    pub safety_backup: bool,
}

#[derive(Debug, Error, SlogInlineError)]
pub enum LoadError {
    #[error("error reading \"{path}\"")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}
