// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::OperationPlan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an operation in the operator API.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct OperationKey {
    pub account_id: String,
    /// The cluster's name.
    pub site_domain: String,
    pub operation_id: String,
}

impl From<&OperationPlan> for OperationKey {
    fn from(plan: &OperationPlan) -> Self {
        Self {
            account_id: plan.account_id.clone(),
            site_domain: plan.cluster_name.clone(),
            operation_id: plan.operation_id.clone(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.account_id, self.site_domain, self.operation_id
        )
    }
}
