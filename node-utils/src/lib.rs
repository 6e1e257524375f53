// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wrappers around commands run on a cluster node.
//!
//! Commands either run directly on the host or, through [`NodeRunner`],
//! inside the node's managed environment (the container hosting etcd and the
//! rest of the control plane).

pub mod host;
pub mod runner;

pub use host::BoxedExecutor;
pub use host::CommandFailureInfo;
pub use host::ExecutionError;
pub use host::Executor;
pub use host::FakeExecutor;
pub use host::HostExecutor;
pub use host::Input;
pub use host::Output;
pub use host::OutputExt;
pub use host::StaticHandler;
pub use runner::NodeRunner;
pub use runner::RunnerConfig;
