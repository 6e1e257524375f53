// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process execution on the host, with a fake for tests.

mod error;
mod executor;
mod input;
mod output;

pub use error::CommandFailureInfo;
pub use error::ExecutionError;
pub use executor::BoxedExecutor;
pub use executor::DynamicHandler;
pub use executor::Executor;
pub use executor::FakeExecutor;
pub use executor::HostExecutor;
pub use executor::StaticHandler;
pub use input::Input;
pub use output::Output;
pub use output::OutputExt;
pub use output::output_to_exec_error;
