// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fake implementation of [crate::EtcdMembers].

use crate::{EtcdClientError, EtcdMembers, Member};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records every member it is asked to add.
///
/// Succeeds by default; [FakeMembers::fail_with] makes every subsequent call
/// fail with a [EtcdClientError::Rejected] error.
#[derive(Debug, Default)]
pub struct FakeMembers {
    added: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeMembers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Peer URLs passed to `add`, in call order.
    pub fn added(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl EtcdMembers for FakeMembers {
    async fn add(&self, peer_url: &str) -> Result<Member, EtcdClientError> {
        self.added.lock().unwrap().push(peer_url.to_string());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(EtcdClientError::Rejected {
                endpoint: "fake".to_string(),
                status: 500,
                message,
            });
        }
        let id = self.added.lock().unwrap().len();
        Ok(Member {
            id: format!("{id:x}"),
            name: String::new(),
            peer_urls: vec![peer_url.to_string()],
            client_urls: Vec::new(),
        })
    }
}
