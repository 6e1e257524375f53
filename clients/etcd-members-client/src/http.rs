// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{EndpointFailure, EtcdClientError, EtcdMembers, Member};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use slog::{Logger, debug, warn};
use slog_error_chain::InlineErrorChain;

const MEMBERS_PATH: &str = "v2/members";

#[derive(Debug, Serialize)]
struct AddMemberRequest<'a> {
    #[serde(rename = "peerURLs")]
    peer_urls: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the etcd v2 members API.
///
/// Requests go to the first endpoint that answers. Transport failures and
/// server errors move on to the next endpoint; any other response is final.
#[derive(Clone, Debug)]
pub struct Client {
    endpoints: Vec<Url>,
    client: reqwest::Client,
    log: Logger,
}

impl Client {
    /// Creates a client for `endpoints` using an already configured
    /// `reqwest::Client`.
    pub fn new_with_client<S: AsRef<str>>(
        endpoints: &[S],
        client: reqwest::Client,
        log: Logger,
    ) -> Result<Self, EtcdClientError> {
        if endpoints.is_empty() {
            return Err(EtcdClientError::NoEndpoints);
        }
        let endpoints = endpoints
            .iter()
            .map(|endpoint| {
                let endpoint = endpoint.as_ref();
                Url::parse(endpoint).map_err(|err| {
                    EtcdClientError::InvalidEndpoint {
                        endpoint: endpoint.to_string(),
                        message: err.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { endpoints, client, log })
    }
}

/// Extracts etcd's error message from a response body, falling back to the
/// raw body.
async fn error_message(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.message,
            Err(_) => body.trim().to_string(),
        },
        Err(err) => InlineErrorChain::new(&err).to_string(),
    }
}

#[async_trait]
impl EtcdMembers for Client {
    async fn add(&self, peer_url: &str) -> Result<Member, EtcdClientError> {
        let body = AddMemberRequest { peer_urls: [peer_url] };
        let mut failures = Vec::new();

        for endpoint in &self.endpoints {
            let url = endpoint.join(MEMBERS_PATH).map_err(|err| {
                EtcdClientError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    message: err.to_string(),
                }
            })?;
            debug!(self.log, "client request";
                "method" => "POST",
                "uri" => %url,
                "peer_url" => peer_url,
            );

            let response = match self.client.post(url).json(&body).send().await
            {
                Ok(response) => response,
                Err(err) => {
                    warn!(self.log, "etcd endpoint unreachable";
                        "endpoint" => %endpoint,
                        InlineErrorChain::new(&err),
                    );
                    failures.push(EndpointFailure {
                        endpoint: endpoint.to_string(),
                        reason: InlineErrorChain::new(&err).to_string(),
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(self.log, "client response";
                "endpoint" => %endpoint,
                "status" => status.as_u16(),
            );
            if status.is_success() {
                return response.json::<Member>().await.map_err(|err| {
                    EtcdClientError::InvalidResponse {
                        endpoint: endpoint.to_string(),
                        err,
                    }
                });
            }
            if status == StatusCode::CONFLICT {
                return Err(EtcdClientError::MemberExists {
                    peer_url: peer_url.to_string(),
                    message: error_message(response).await,
                });
            }
            if status.is_server_error() {
                let message = error_message(response).await;
                warn!(self.log, "etcd endpoint failed request";
                    "endpoint" => %endpoint,
                    "status" => status.as_u16(),
                    "message" => message.as_str(),
                );
                failures.push(EndpointFailure {
                    endpoint: endpoint.to_string(),
                    reason: format!("{status}: {message}"),
                });
                continue;
            }
            return Err(EtcdClientError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        Err(EtcdClientError::AllEndpointsFailed { failures })
    }
}
