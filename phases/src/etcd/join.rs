// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{master_endpoints, write_backup};
use crate::config::{EtcdSettings, RollbackConfig};
use crate::errors::{BuildError, PhaseError};
use crate::executor::{ExecutorParams, PhaseEnv, PhaseExecutor};
use crate::logger::phase_logger;
use crate::operator::Operator;
use crate::state::StateDir;
use async_trait::async_trait;
use camino::Utf8Path;
use etcd_members_client::{EtcdClientError, EtcdConfig, EtcdMembers};
use node_utils::NodeRunner;
use phase_types::Server;
use slog::{Logger, debug, info};
use std::sync::Arc;

/// Adds the phase's server to the etcd cluster as a new member.
///
/// Rolling back stops the etcd service on this node, and only once a backup
/// of etcd data for the operation is known to exist.
pub struct EtcdJoinExecutor {
    params: ExecutorParams,
    log: Logger,
    /// The server joining the cluster.
    server: Server,
    members: Arc<dyn EtcdMembers>,
    state_dir: StateDir,
    etcd: EtcdSettings,
    rollback: RollbackConfig,
    runner: NodeRunner,
}

impl EtcdJoinExecutor {
    /// Builds the executor with a TLS client against every master in the
    /// plan.
    pub fn new(
        params: ExecutorParams,
        operator: Arc<dyn Operator>,
        env: &PhaseEnv,
    ) -> Result<Self, BuildError> {
        Self::with_connector(params, operator, env, |config, log| {
            let client: Arc<dyn EtcdMembers> = Arc::new(config.connect(log)?);
            Ok(client)
        })
    }

    /// Like [`Self::new`], with `connect` building the membership client.
    pub fn with_connector<F>(
        params: ExecutorParams,
        operator: Arc<dyn Operator>,
        env: &PhaseEnv,
        connect: F,
    ) -> Result<Self, BuildError>
    where
        F: FnOnce(
            &EtcdConfig,
            &Logger,
        ) -> Result<Arc<dyn EtcdMembers>, EtcdClientError>,
    {
        let phase_id = params.phase.id.clone();
        let server = params.phase.data.server.clone().ok_or_else(|| {
            BuildError::MissingServer { phase_id: phase_id.clone() }
        })?;
        let log =
            phase_logger(&params.log, &params.phase, params.key(), operator);

        let config = EtcdConfig {
            endpoints: master_endpoints(&params.plan, env.etcd.api_port),
            secrets_dir: env.state_dir.secrets_dir(),
            request_timeout: env.etcd.request_timeout(),
        };
        debug!(log, "connecting to etcd"; "endpoints" => ?config.endpoints);
        let members = connect(&config, &log)
            .map_err(|err| BuildError::EtcdClient { phase_id, err })?;

        Ok(Self {
            params,
            log,
            server,
            members,
            state_dir: env.state_dir.clone(),
            etcd: env.etcd.clone(),
            rollback: env.rollback.clone(),
            runner: env.runner.clone(),
        })
    }

    fn operation_id(&self) -> &str {
        self.params.operation_id()
    }

    /// Fails unless a non-empty backup file exists at `path`.
    async fn check_backup(&self, path: &Utf8Path) -> Result<(), PhaseError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|err| {
            PhaseError::BackupMissing { path: path.to_owned(), err }
        })?;
        if !metadata.is_file() {
            return Err(PhaseError::BackupNotAFile { path: path.to_owned() });
        }
        if metadata.len() == 0 {
            return Err(PhaseError::BackupEmpty { path: path.to_owned() });
        }
        Ok(())
    }

    async fn service(
        &self,
        action: &str,
        description: &'static str,
    ) -> Result<(), PhaseError> {
        self.runner.etcd_service(action).await.map_err(|err| {
            PhaseError::command(description, self.operation_id(), err)
        })?;
        Ok(())
    }
}

#[async_trait]
impl PhaseExecutor for EtcdJoinExecutor {
    async fn execute(&self) -> Result<(), PhaseError> {
        self.params.progress.next_step("Adding etcd member");
        let peer_url = self.server.https_url(self.etcd.peer_port);
        let member = self.members.add(&peer_url).await.map_err(|err| {
            PhaseError::AddMember {
                operation_id: self.operation_id().to_string(),
                peer_url: peer_url.clone(),
                err,
            }
        })?;
        info!(self.log, "Added etcd member: {}.", member);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), PhaseError> {
        self.params.progress.next_step("Restoring etcd data");
        let operation_id = self.operation_id();
        let backup = self.state_dir.backup_path(operation_id).await?;
        self.check_backup(&backup).await?;

        if self.rollback.safety_backup {
            let path = self.state_dir.rollback_backup_path(operation_id).await?;
            write_backup(
                &self.log,
                &self.runner,
                &path,
                operation_id,
                "failed to take safety backup of etcd data",
            )
            .await?;
            info!(self.log, "Saved current etcd data to {}.", path);
        }

        self.service("stop", "failed to stop etcd service").await?;

        if self.rollback.restore_from_backup {
            self.runner.etcd(["restore", backup.as_str()]).await.map_err(
                |err| {
                    PhaseError::command(
                        "failed to restore etcd data",
                        operation_id,
                        err,
                    )
                },
            )?;
            self.service("start", "failed to start etcd service").await?;
        }

        info!(self.log, "Restored etcd data."; "backup" => %backup);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fakes::{RecordingOperator, RecordingProgress};
    use camino_tempfile::Utf8TempDir;
    use etcd_members_client::fakes::FakeMembers;
    use expand_test_utils::dev::{LogContext, test_setup_log};
    use node_utils::{
        FakeExecutor, Input, Output, OutputExt, RunnerConfig, StaticHandler,
    };
    use phase_types::{ClusterRole, OperationPlan, Phase, PhaseData};
    use std::sync::Mutex;

    struct Harness {
        dir: Utf8TempDir,
        executor: Arc<FakeExecutor>,
        progress: Arc<RecordingProgress>,
        operator: Arc<RecordingOperator>,
        members: Arc<FakeMembers>,
    }

    impl Harness {
        fn new(logctx: &LogContext) -> Self {
            Self {
                dir: Utf8TempDir::new().unwrap(),
                executor: FakeExecutor::new(logctx.log.clone()),
                progress: RecordingProgress::new(),
                operator: RecordingOperator::new(),
                members: FakeMembers::new(),
            }
        }

        fn env(
            &self,
            logctx: &LogContext,
            rollback: RollbackConfig,
        ) -> PhaseEnv {
            PhaseEnv::new(
                StateDir::resolve(self.dir.path()).unwrap(),
                EtcdSettings::default(),
                rollback,
                NodeRunner::new(
                    &logctx.log,
                    self.executor.clone().as_executor(),
                    RunnerConfig::direct(),
                ),
            )
        }

        fn params(
            &self,
            logctx: &LogContext,
            data: PhaseData,
        ) -> ExecutorParams {
            let plan = OperationPlan {
                account_id: "acct".to_string(),
                cluster_name: "example.com".to_string(),
                operation_id: "op-7".to_string(),
                servers: vec![Server {
                    hostname: "node-1".to_string(),
                    advertise_ip: "10.0.0.1".parse().unwrap(),
                    cluster_role: ClusterRole::Master,
                }],
            };
            ExecutorParams {
                plan: Arc::new(plan),
                phase: Phase { id: "/etcd/node-5".to_string(), data },
                progress: self.progress.clone(),
                log: logctx.log.clone(),
            }
        }

        fn build(
            &self,
            logctx: &LogContext,
            rollback: RollbackConfig,
        ) -> EtcdJoinExecutor {
            let data = PhaseData { server: Some(joining()) };
            let members: Arc<dyn EtcdMembers> = self.members.clone();
            EtcdJoinExecutor::with_connector(
                self.params(logctx, data),
                self.operator.clone(),
                &self.env(logctx, rollback),
                move |_config, _log| Ok(members),
            )
            .unwrap()
        }

        fn write_join_backup(&self) -> camino::Utf8PathBuf {
            let path = self.dir.path().join("backup/join-op-7.backup");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "snapshot").unwrap();
            path
        }
    }

    fn joining() -> Server {
        Server {
            hostname: "node-5".to_string(),
            advertise_ip: "10.0.0.5".parse().unwrap(),
            cluster_role: ClusterRole::Master,
        }
    }

    #[test]
    fn test_build_requires_server() {
        let logctx = test_setup_log("test_build_requires_server");
        let harness = Harness::new(&logctx);

        let result = EtcdJoinExecutor::with_connector(
            harness.params(&logctx, PhaseData::default()),
            harness.operator.clone(),
            &harness.env(&logctx, RollbackConfig::default()),
            |_config, _log| panic!("must not connect without a server"),
        );
        match result {
            Err(BuildError::MissingServer { phase_id }) => {
                assert_eq!(phase_id, "/etcd/node-5")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("built executor without a server"),
        }

        logctx.cleanup_successful();
    }

    #[test]
    fn test_build_wraps_client_errors() {
        let logctx = test_setup_log("test_build_wraps_client_errors");
        let harness = Harness::new(&logctx);
        let seen = Arc::new(Mutex::new(None));

        let seen_by_connector = seen.clone();
        let result = EtcdJoinExecutor::with_connector(
            harness.params(&logctx, PhaseData { server: Some(joining()) }),
            harness.operator.clone(),
            &harness.env(&logctx, RollbackConfig::default()),
            move |config, _log| {
                *seen_by_connector.lock().unwrap() = Some(config.clone());
                Err(EtcdClientError::NoEndpoints)
            },
        );
        assert!(matches!(
            result,
            Err(BuildError::EtcdClient {
                err: EtcdClientError::NoEndpoints,
                ..
            })
        ));

        let config = seen.lock().unwrap().clone().unwrap();
        assert_eq!(config.endpoints, vec!["https://10.0.0.1:2379"]);
        assert_eq!(config.secrets_dir, harness.dir.path().join("secrets"));

        logctx.cleanup_successful();
    }

    #[test]
    fn test_build_fails_without_tls_material() {
        let logctx = test_setup_log("test_build_fails_without_tls_material");
        let harness = Harness::new(&logctx);

        let result = EtcdJoinExecutor::new(
            harness.params(&logctx, PhaseData { server: Some(joining()) }),
            harness.operator.clone(),
            &harness.env(&logctx, RollbackConfig::default()),
        );
        assert!(matches!(
            result,
            Err(BuildError::EtcdClient {
                err: EtcdClientError::ReadTls { .. },
                ..
            })
        ));

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_execute_wraps_add_failure() {
        let logctx = test_setup_log("test_execute_wraps_add_failure");
        let harness = Harness::new(&logctx);
        harness.members.fail_with("etcdserver: unhealthy cluster");
        let executor = harness.build(&logctx, RollbackConfig::default());

        let err = executor.execute().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("https://10.0.0.5:2380"), "{message}");
        assert!(message.contains("op-7"), "{message}");
        assert_eq!(harness.progress.steps(), vec!["Adding etcd member"]);
        assert!(harness.operator.messages().is_empty());

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rollback_rejects_empty_backup() {
        let logctx = test_setup_log("test_rollback_rejects_empty_backup");
        let harness = Harness::new(&logctx);
        let path = harness.write_join_backup();
        std::fs::write(&path, "").unwrap();
        let executor = harness.build(&logctx, RollbackConfig::default());

        let err = executor.rollback().await.unwrap_err();
        assert!(matches!(err, PhaseError::BackupEmpty { .. }));
        assert_eq!(harness.executor.commands_run(), 0);

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rollback_rejects_directory_backup() {
        let logctx = test_setup_log("test_rollback_rejects_directory_backup");
        let harness = Harness::new(&logctx);
        let path = harness.dir.path().join("backup/join-op-7.backup");
        std::fs::create_dir_all(path.join("member")).unwrap();
        let executor = harness.build(&logctx, RollbackConfig::default());

        let err = executor.rollback().await.unwrap_err();
        assert!(matches!(err, PhaseError::BackupNotAFile { .. }), "{err}");
        assert_eq!(harness.executor.commands_run(), 0);

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rollback_stop_failure_reports_output() {
        let logctx =
            test_setup_log("test_rollback_stop_failure_reports_output");
        let harness = Harness::new(&logctx);
        harness.write_join_backup();
        let mut handler = StaticHandler::new();
        handler.expect(
            Input::shell("/bin/systemctl stop etcd"),
            Output::failure().set_stderr("Failed to stop etcd.service"),
        );
        handler.register(&harness.executor);
        let executor = harness.build(&logctx, RollbackConfig::default());

        let err = executor.rollback().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to stop etcd service"), "{message}");
        assert!(message.contains("Failed to stop etcd.service"), "{message}");
        assert!(
            !harness
                .operator
                .messages()
                .iter()
                .any(|m| m == "Restored etcd data.")
        );

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_rollback_with_restore_and_safety_backup() {
        let logctx =
            test_setup_log("test_rollback_with_restore_and_safety_backup");
        let harness = Harness::new(&logctx);
        let backup = harness.write_join_backup();
        let safety = harness.dir.path().join("backup/rollback-op-7.backup");
        let mut handler = StaticHandler::new();
        handler.expect_ok(format!("etcd backup {safety}"));
        handler.expect_ok("/bin/systemctl stop etcd");
        handler.expect_ok(format!("etcd restore {backup}"));
        handler.expect_ok("/bin/systemctl start etcd");
        handler.register(&harness.executor);
        let executor = harness.build(
            &logctx,
            RollbackConfig { restore_from_backup: true, safety_backup: true },
        );

        executor.rollback().await.unwrap();
        assert_eq!(harness.executor.commands_run(), 4);
        assert_eq!(harness.progress.steps(), vec!["Restoring etcd data"]);
        let messages = harness.operator.messages();
        assert_eq!(
            messages,
            vec![
                format!("Saved current etcd data to {safety}."),
                "Restored etcd data.".to_string(),
            ]
        );

        logctx.cleanup_successful();
    }

    #[tokio::test]
    async fn test_failed_safety_backup_leaves_service_running() {
        let logctx =
            test_setup_log("test_failed_safety_backup_leaves_service_running");
        let harness = Harness::new(&logctx);
        harness.write_join_backup();
        let safety = harness.dir.path().join("backup/rollback-op-7.backup");
        let partial = safety.clone();
        let mut handler = StaticHandler::new();
        handler.expect_dynamic(Box::new(move |_input| {
            std::fs::write(&partial, "half a snap").unwrap();
            Output::failure().set_stderr("no space left on device")
        }));
        handler.register(&harness.executor);
        let executor = harness.build(
            &logctx,
            RollbackConfig { restore_from_backup: false, safety_backup: true },
        );

        let err = executor.rollback().await.unwrap_err();
        assert!(
            err.to_string().contains("no space left on device"),
            "{err}"
        );
        assert_eq!(harness.executor.commands_run(), 1);
        assert!(!safety.exists());

        logctx.cleanup_successful();
    }
}
