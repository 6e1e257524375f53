// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runs phases one after another, rolling back on failure.

use crate::errors::PhaseError;
use crate::executor::PhaseExecutor;
use slog::{Logger, error, info, o, warn};
use slog_error_chain::{InlineErrorChain, SlogInlineError};
use std::fmt;

/// A lifecycle step that can fail a sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    PreCheck,
    Execute,
    PostCheck,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::PreCheck => "pre-check",
            Step::Execute => "execute",
            Step::PostCheck => "post-check",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to roll back phase {phase_id}")]
pub struct RollbackFailure {
    pub phase_id: String,
    #[source]
    pub err: PhaseError,
}

#[derive(Debug, thiserror::Error, SlogInlineError)]
pub enum SequenceError {
    /// A phase failed and every phase that needed it rolled back cleanly.
    #[error("phase {phase_id} failed during {step}")]
    Failed {
        phase_id: String,
        step: Step,
        #[source]
        err: PhaseError,
    },

    /// A phase failed and at least one rollback failed as well.
    #[error(
        "phase {phase_id} failed during {step}, and {} phase(s) could not \
         be rolled back",
        .rollback_failures.len()
    )]
    RollbackFailed {
        phase_id: String,
        step: Step,
        #[source]
        err: PhaseError,
        rollback_failures: Vec<RollbackFailure>,
    },
}

struct Stage {
    id: String,
    executor: Box<dyn PhaseExecutor>,
}

/// An ordered list of phases.
///
/// On failure, every phase whose `execute` was started (the failing one
/// included) is rolled back, most recent first. A failing rollback does not
/// stop the remaining ones.
pub struct PhaseSequence {
    log: Logger,
    stages: Vec<Stage>,
}

impl PhaseSequence {
    pub fn new(log: &Logger) -> Self {
        Self {
            log: log.new(o!("component" => "PhaseSequence")),
            stages: Vec::new(),
        }
    }

    pub fn push<S: Into<String>>(
        &mut self,
        id: S,
        executor: Box<dyn PhaseExecutor>,
    ) {
        self.stages.push(Stage { id: id.into(), executor });
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self) -> Result<(), SequenceError> {
        for (index, stage) in self.stages.iter().enumerate() {
            let (step, err) = match Self::run_stage(stage).await {
                Ok(()) => {
                    info!(self.log, "phase completed"; "phase" => &stage.id);
                    continue;
                }
                Err(failure) => failure,
            };
            error!(
                self.log,
                "phase failed";
                "phase" => &stage.id,
                "step" => %step,
                InlineErrorChain::new(&err),
            );

            // A phase that failed its pre-check never changed anything.
            let executed =
                if step == Step::PreCheck { index } else { index + 1 };
            let rollback_failures = self.rollback(executed).await;
            let phase_id = stage.id.clone();
            if rollback_failures.is_empty() {
                return Err(SequenceError::Failed { phase_id, step, err });
            }
            return Err(SequenceError::RollbackFailed {
                phase_id,
                step,
                err,
                rollback_failures,
            });
        }
        Ok(())
    }

    async fn run_stage(stage: &Stage) -> Result<(), (Step, PhaseError)> {
        let executor = &stage.executor;
        executor.pre_check().await.map_err(|err| (Step::PreCheck, err))?;
        executor.execute().await.map_err(|err| (Step::Execute, err))?;
        executor.post_check().await.map_err(|err| (Step::PostCheck, err))?;
        Ok(())
    }

    /// Rolls back the first `count` stages in reverse order.
    async fn rollback(&self, count: usize) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();
        for stage in self.stages[..count].iter().rev() {
            match stage.executor.rollback().await {
                Ok(()) => {
                    info!(self.log, "phase rolled back"; "phase" => &stage.id);
                }
                Err(err) => {
                    warn!(
                        self.log,
                        "phase rollback failed";
                        "phase" => &stage.id,
                        InlineErrorChain::new(&err),
                    );
                    failures.push(RollbackFailure {
                        phase_id: stage.id.clone(),
                        err,
                    });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use expand_test_utils::dev::test_setup_log;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<String>>>;

    /// Records its calls and fails the configured ones.
    struct Scripted {
        name: &'static str,
        calls: Calls,
        fail: Vec<&'static str>,
    }

    impl Scripted {
        fn boxed(
            name: &'static str,
            calls: &Calls,
            fail: &[&'static str],
        ) -> Box<dyn PhaseExecutor> {
            Box::new(Self {
                name,
                calls: calls.clone(),
                fail: fail.to_vec(),
            })
        }

        fn call(&self, method: &'static str) -> Result<(), PhaseError> {
            self.calls.lock().unwrap().push(format!("{}.{method}", self.name));
            if self.fail.contains(&method) {
                return Err(PhaseError::BackupEmpty {
                    path: format!("/{}/{method}", self.name).into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PhaseExecutor for Scripted {
        async fn pre_check(&self) -> Result<(), PhaseError> {
            self.call("pre_check")
        }

        async fn execute(&self) -> Result<(), PhaseError> {
            self.call("execute")
        }

        async fn post_check(&self) -> Result<(), PhaseError> {
            self.call("post_check")
        }

        async fn rollback(&self) -> Result<(), PhaseError> {
            self.call("rollback")
        }
    }

    fn calls(calls: &Calls) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_runs_phases_in_order() {
        let logctx = test_setup_log("test_runs_phases_in_order");
        let recorded = Calls::default();
        let mut sequence = PhaseSequence::new(&logctx.log);
        sequence.push("/a", Scripted::boxed("a", &recorded, &[]));
        sequence.push("/b", Scripted::boxed("b", &recorded, &[]));
        assert_eq!(sequence.len(), 2);

        sequence.run().await.unwrap();
        assert_eq!(
            calls(&recorded),
            vec![
                "a.pre_check",
                "a.execute",
                "a.post_check",
                "b.pre_check",
                "b.execute",
                "b.post_check",
            ]
        );

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_failed_execute_rolls_back_in_reverse() {
        let logctx =
            test_setup_log("test_failed_execute_rolls_back_in_reverse");
        let recorded = Calls::default();
        let mut sequence = PhaseSequence::new(&logctx.log);
        sequence.push("/a", Scripted::boxed("a", &recorded, &[]));
        sequence.push("/b", Scripted::boxed("b", &recorded, &[]));
        sequence.push("/c", Scripted::boxed("c", &recorded, &["execute"]));
        sequence.push("/d", Scripted::boxed("d", &recorded, &[]));

        let err = sequence.run().await.unwrap_err();
        match err {
            SequenceError::Failed { phase_id, step, .. } => {
                assert_eq!(phase_id, "/c");
                assert_eq!(step, Step::Execute);
            }
            other => panic!("unexpected error: {other}"),
        }
        let recorded = calls(&recorded);
        assert_eq!(
            recorded[recorded.len() - 3..],
            ["c.rollback", "b.rollback", "a.rollback"]
        );
        assert!(!recorded.iter().any(|call| call.starts_with("d.")));

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_failed_pre_check_skips_own_rollback() {
        let logctx = test_setup_log("test_failed_pre_check_skips_own_rollback");
        let recorded = Calls::default();
        let mut sequence = PhaseSequence::new(&logctx.log);
        sequence.push("/a", Scripted::boxed("a", &recorded, &[]));
        sequence.push("/b", Scripted::boxed("b", &recorded, &["pre_check"]));

        let err = sequence.run().await.unwrap_err();
        assert!(matches!(
            err,
            SequenceError::Failed { step: Step::PreCheck, .. }
        ));
        let recorded = calls(&recorded);
        assert_eq!(recorded.last().unwrap(), "a.rollback");
        assert!(!recorded.contains(&"b.rollback".to_string()));

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rollback_failures_are_collected() {
        let logctx = test_setup_log("test_rollback_failures_are_collected");
        let recorded = Calls::default();
        let mut sequence = PhaseSequence::new(&logctx.log);
        sequence.push("/a", Scripted::boxed("a", &recorded, &[]));
        sequence.push("/b", Scripted::boxed("b", &recorded, &["rollback"]));
        sequence.push(
            "/c",
            Scripted::boxed("c", &recorded, &["post_check", "rollback"]),
        );

        let err = sequence.run().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "phase /c failed during post-check, and 2 phase(s) could not be \
             rolled back"
        );
        match err {
            SequenceError::RollbackFailed { rollback_failures, .. } => {
                let failed: Vec<_> = rollback_failures
                    .iter()
                    .map(|failure| failure.phase_id.as_str())
                    .collect();
                assert_eq!(failed, vec!["/c", "/b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The first rollback failure does not stop the rest.
        assert_eq!(calls(&recorded).last().unwrap(), "a.rollback");

        logctx.cleanup_successful();
    }
}
