// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Phase executors for expanding a cluster with a new etcd member.
//!
//! An operation is split into phases, each implementing [`PhaseExecutor`].
//! [`EtcdBackupExecutor`] takes a backup of etcd data on the node before the
//! cluster changes; [`EtcdJoinExecutor`] announces the joining node to the
//! existing etcd members and, on rollback, stops etcd on that node once the
//! backup is known to be in place.

pub mod config;
mod errors;
pub mod etcd;
mod executor;
pub mod fakes;
mod logger;
pub mod operator;
pub mod progress;
pub mod sequence;
pub mod state;

pub use config::Config;
pub use errors::BuildError;
pub use errors::PhaseError;
pub use etcd::EtcdBackupExecutor;
pub use etcd::EtcdJoinExecutor;
pub use executor::ExecutorParams;
pub use executor::PhaseEnv;
pub use executor::PhaseExecutor;
pub use logger::phase_logger;
pub use operator::Operator;
pub use progress::LogProgress;
pub use progress::Progress;
pub use sequence::PhaseSequence;
pub use sequence::SequenceError;
pub use state::StateDir;
