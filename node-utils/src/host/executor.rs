// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::host::error::ExecutionError;
use crate::host::input::Input;
use crate::host::output::{Output, OutputExt, output_to_exec_error};

use async_trait::async_trait;
use slog::{Logger, debug, info, warn};
use slog_error_chain::InlineErrorChain;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// An executor shared between everything that runs commands on a node.
pub type BoxedExecutor = Arc<dyn Executor>;

/// Runs commands and collects their output.
///
/// [HostExecutor] spawns real processes; [FakeExecutor] lets tests decide
/// what each command "prints".
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` to completion.
    ///
    /// A command that exits unsuccessfully is an
    /// [ExecutionError::CommandFailure] carrying what it wrote.
    async fn execute_async(
        &self,
        command: &mut tokio::process::Command,
    ) -> Result<Output, ExecutionError>;
}

/// Numbers invocations so that the start and end of each command can be
/// matched up in the log.
struct CommandLog {
    log: Logger,
    next_id: AtomicU64,
}

impl CommandLog {
    fn new(log: Logger) -> Self {
        Self { log, next_id: AtomicU64::new(0) }
    }

    fn count(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    fn started(&self, input: &Input) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!(self.log, "running command"; "id" => id, "command" => %input);
        id
    }

    /// Logs how the command ended and turns a failed exit into an error.
    fn finished(
        &self,
        id: u64,
        input: &Input,
        output: Output,
    ) -> Result<Output, ExecutionError> {
        let code = output
            .status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        info!(
            self.log,
            "command finished";
            "id" => id,
            "success" => output.status.success(),
            "code" => code,
        );
        let streams = [("stdout", &output.stdout), ("stderr", &output.stderr)];
        for (stream, bytes) in streams {
            if !bytes.is_empty() {
                debug!(
                    self.log,
                    "command output";
                    "id" => id,
                    "stream" => stream,
                    "text" => %String::from_utf8_lossy(bytes),
                );
            }
        }
        if !output.status.success() {
            return Err(output_to_exec_error(input.to_string(), &output));
        }
        Ok(output)
    }
}

/// Runs commands as child processes of this one.
pub struct HostExecutor {
    commands: CommandLog,
}

impl HostExecutor {
    pub fn new(log: Logger) -> Arc<Self> {
        Arc::new(Self { commands: CommandLog::new(log) })
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }
}

#[async_trait]
impl Executor for HostExecutor {
    async fn execute_async(
        &self,
        command: &mut tokio::process::Command,
    ) -> Result<Output, ExecutionError> {
        let input = Input::from(command.as_std());
        let id = self.commands.started(&input);
        let output = match command.output().await {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    self.commands.log,
                    "command could not be started";
                    "id" => id,
                    "command" => %input,
                    InlineErrorChain::new(&err),
                );
                return Err(ExecutionError::ExecutionStart {
                    command: input.to_string(),
                    err,
                });
            }
        };
        self.commands.finished(id, &input, output)
    }
}

/// Produces the output of a command a [FakeExecutor] was asked to run.
pub type DynamicHandler = Box<dyn FnMut(Input) -> Output + Send>;

/// Pretends to run commands, answering each with a handler's output.
///
/// Succeeds silently until a handler is installed.
pub struct FakeExecutor {
    commands: CommandLog,
    handler: Mutex<DynamicHandler>,
    observed: Mutex<Vec<Input>>,
}

impl FakeExecutor {
    pub fn new(log: Logger) -> Arc<FakeExecutor> {
        Arc::new(Self {
            commands: CommandLog::new(log),
            handler: Mutex::new(Box::new(|_input| Output::success())),
            observed: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the handler answering commands.
    pub fn set_wait_handler(&self, handler: DynamicHandler) {
        *self.handler.lock().unwrap() = handler;
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }

    /// Number of commands run so far.
    pub fn commands_run(&self) -> u64 {
        self.commands.count()
    }

    /// Every command run so far, oldest first.
    pub fn observed(&self) -> Vec<Input> {
        self.observed.lock().unwrap().clone()
    }

    fn run(&self, command: &Command) -> Result<Output, ExecutionError> {
        let input = Input::from(command);
        let id = self.commands.started(&input);
        self.observed.lock().unwrap().push(input.clone());
        let output = (self.handler.lock().unwrap())(input.clone());
        self.commands.finished(id, &input, output)
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    // Handlers are synchronous; nothing here awaits.
    async fn execute_async(
        &self,
        command: &mut tokio::process::Command,
    ) -> Result<Output, ExecutionError> {
        self.run(command.as_std())
    }
}

enum Expected {
    Exact { input: Input, output: Output },
    Dynamic(DynamicHandler),
}

/// A script of the commands a test expects, in order, and what each one
/// outputs.
///
/// Install it with [Self::register]. An unexpected command panics, and so
/// does dropping the script before every expected command ran.
#[derive(Default)]
pub struct StaticHandler {
    expected: Vec<Expected>,
    next: usize,
}

impl StaticHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `executor` answer commands from this script.
    pub fn register(mut self, executor: &FakeExecutor) {
        executor.set_wait_handler(Box::new(move |input| self.answer(input)));
    }

    /// Expects exactly `input`, answering with `output`.
    pub fn expect(&mut self, input: Input, output: Output) {
        self.expected.push(Expected::Exact { input, output });
    }

    /// Expects the whitespace-separated command `input` to succeed quietly.
    pub fn expect_ok<S: AsRef<str>>(&mut self, input: S) {
        self.expect(Input::shell(input), Output::success())
    }

    /// Expects some command, leaving it to `handler` to check it and decide
    /// the output.
    pub fn expect_dynamic(&mut self, handler: DynamicHandler) {
        self.expected.push(Expected::Dynamic(handler));
    }

    fn answer(&mut self, observed: Input) -> Output {
        let Some(expected) = self.expected.get_mut(self.next) else {
            panic!("unexpected command: {observed}");
        };
        self.next += 1;
        match expected {
            Expected::Exact { input, output } => {
                assert_eq!(&observed, input, "unexpected command");
                output.clone()
            }
            Expected::Dynamic(handler) => handler(observed),
        }
    }
}

impl Drop for StaticHandler {
    fn drop(&mut self) {
        let Some(missing) = self.expected.get(self.next) else {
            return;
        };
        let missing = match missing {
            Expected::Exact { input, .. } => input.to_string(),
            Expected::Dynamic(_) => "<dynamic handler>".to_string(),
        };
        let message = format!(
            "ran {} of {} expected commands; next expected: {missing}",
            self.next,
            self.expected.len(),
        );
        if std::thread::panicking() {
            eprintln!("{message}");
        } else {
            panic!("{message}");
        }
    }
}
