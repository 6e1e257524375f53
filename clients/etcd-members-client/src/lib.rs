// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface for managing etcd cluster membership
//!
//! Speaks the etcd v2 members API over mutually-authenticated TLS, trying
//! each configured endpoint in turn.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use slog_error_chain::SlogInlineError;
use std::fmt;
use std::io;

pub mod fakes;
mod http;
mod tls;

pub use http::Client;
pub use tls::CLIENT_CERT;
pub use tls::CLIENT_KEY;
pub use tls::EtcdConfig;
pub use tls::ROOT_CERT;

/// A participant in the etcd consensus cluster.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Member {
    /// Hex-encoded member ID assigned by etcd.
    #[serde(default)]
    pub id: String,
    /// Empty until the member has started and published its name.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "peerURLs", default)]
    pub peer_urls: Vec<String>,
    #[serde(rename = "clientURLs", default)]
    pub client_urls: Vec<String>,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} name={:?} peer_urls=[{}] client_urls=[{}]",
            self.id,
            self.name,
            self.peer_urls.join(","),
            self.client_urls.join(","),
        )
    }
}

/// Operations on etcd cluster membership.
#[async_trait]
pub trait EtcdMembers: Send + Sync {
    /// Announces a new member reachable at `peer_url`.
    ///
    /// The member is expected to start and join shortly afterwards.
    async fn add(&self, peer_url: &str) -> Result<Member, EtcdClientError>;
}

/// Why a single endpoint could not serve a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: String,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum EtcdClientError {
    #[error("no etcd endpoints configured")]
    NoEndpoints,
    #[error("invalid etcd endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
    #[error("failed to read TLS material from {path}")]
    ReadTls {
        path: Utf8PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("invalid TLS material in {path}")]
    ParseTls {
        path: Utf8PathBuf,
        #[source]
        err: reqwest::Error,
    },
    #[error("failed to build etcd HTTP client")]
    BuildClient(#[source] reqwest::Error),
    #[error("etcd member with peer URL {peer_url} already exists: {message}")]
    MemberExists { peer_url: String, message: String },
    #[error("etcd endpoint {endpoint} rejected request ({status}): {message}")]
    Rejected { endpoint: String, status: u16, message: String },
    #[error("invalid response from etcd endpoint {endpoint}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        err: reqwest::Error,
    },
    #[error(
        "all etcd endpoints failed: {}",
        .failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    )]
    AllEndpointsFailed { failures: Vec<EndpointFailure> },
}
