// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::OperationKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// The role a server plays in the cluster.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRole {
    /// Runs control-plane services, including an etcd member.
    Master,
    /// Runs workloads only.
    Node,
}

impl fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterRole::Master => write!(f, "master"),
            ClusterRole::Node => write!(f, "node"),
        }
    }
}

/// A node taking part in an operation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Server {
    pub hostname: String,
    /// Address other cluster members reach this server on.
    pub advertise_ip: IpAddr,
    pub cluster_role: ClusterRole,
}

impl Server {
    pub fn is_master(&self) -> bool {
        self.cluster_role == ClusterRole::Master
    }

    /// HTTPS URL of a service listening on `port` at the advertised address.
    ///
    /// IPv6 addresses are bracketed.
    pub fn https_url(&self, port: u16) -> String {
        format!("https://{}", SocketAddr::new(self.advertise_ip, port))
    }
}

/// A single cluster operation and the servers taking part in it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OperationPlan {
    pub account_id: String,
    pub cluster_name: String,
    pub operation_id: String,
    /// One entry per participating node.
    pub servers: Vec<Server>,
}

impl OperationPlan {
    /// Servers running control-plane services, in plan order.
    pub fn masters(&self) -> impl Iterator<Item = &Server> + '_ {
        self.servers.iter().filter(|server| server.is_master())
    }

    /// Key addressing this operation in the operator API.
    pub fn key(&self) -> OperationKey {
        OperationKey::from(self)
    }
}

/// Phase-specific payload.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PhaseData {
    /// The server this phase acts on, if it acts on one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<Server>,
}

/// One step of an operation plan.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Phase {
    /// Unique within the plan, e.g. `/etcd/node-2`.
    pub id: String,
    #[serde(default)]
    pub data: PhaseData,
}
