// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types describing a cluster operation: the plan, its phases and the
//! servers taking part.
//!
//! These types are owned by whatever schedules the operation. Phases only
//! ever read them.

mod key;
mod plan;

pub use key::OperationKey;
pub use plan::ClusterRole;
pub use plan::OperationPlan;
pub use plan::Phase;
pub use plan::PhaseData;
pub use plan::Server;
