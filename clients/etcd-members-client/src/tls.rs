// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{Client, EtcdClientError};
use camino::{Utf8Path, Utf8PathBuf};
use slog::{Logger, o};
use std::time::Duration;

/// Client certificate, relative to the secrets directory.
pub const CLIENT_CERT: &str = "etcd.cert";
/// Private key for [`CLIENT_CERT`].
pub const CLIENT_KEY: &str = "etcd.key";
/// CA certificate the etcd members are signed with.
pub const ROOT_CERT: &str = "root.cert";

/// What is needed to reach the etcd members API.
#[derive(Clone, Debug)]
pub struct EtcdConfig {
    /// `https://<ip>:<port>` URLs of the client API on each member.
    pub endpoints: Vec<String>,
    /// Directory holding [`CLIENT_CERT`], [`CLIENT_KEY`] and [`ROOT_CERT`].
    pub secrets_dir: Utf8PathBuf,
    pub request_timeout: Duration,
}

impl EtcdConfig {
    /// Builds a client authenticating with the TLS material in the secrets
    /// directory.
    pub fn connect(&self, log: &Logger) -> Result<Client, EtcdClientError> {
        let client = self.http_client()?;
        Client::new_with_client(
            &self.endpoints,
            client,
            log.new(o!("component" => "EtcdMembersClient")),
        )
    }

    fn http_client(&self) -> Result<reqwest::Client, EtcdClientError> {
        let cert_path = self.secrets_dir.join(CLIENT_CERT);
        let key_path = self.secrets_dir.join(CLIENT_KEY);
        let root_path = self.secrets_dir.join(ROOT_CERT);

        let mut identity_pem = read_pem(&cert_path)?;
        identity_pem.push(b'\n');
        identity_pem.extend(read_pem(&key_path)?);
        let identity =
            reqwest::Identity::from_pem(&identity_pem).map_err(|err| {
                EtcdClientError::ParseTls { path: cert_path, err }
            })?;

        let root = reqwest::Certificate::from_pem(&read_pem(&root_path)?)
            .map_err(|err| EtcdClientError::ParseTls {
                path: root_path,
                err,
            })?;

        reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(root)
            .identity(identity)
            .timeout(self.request_timeout)
            .build()
            .map_err(EtcdClientError::BuildClient)
    }
}

fn read_pem(path: &Utf8Path) -> Result<Vec<u8>, EtcdClientError> {
    std::fs::read(path).map_err(|err| EtcdClientError::ReadTls {
        path: path.to_owned(),
        err,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use expand_test_utils::dev::test_setup_log;

    #[test]
    fn test_missing_tls_material() {
        let logctx = test_setup_log("test_missing_tls_material");
        let secrets = Utf8TempDir::new().unwrap();
        let config = EtcdConfig {
            endpoints: vec!["https://10.0.0.1:2379".to_string()],
            secrets_dir: secrets.path().to_owned(),
            request_timeout: Duration::from_secs(5),
        };

        let err = config.connect(&logctx.log).unwrap_err();
        match err {
            EtcdClientError::ReadTls { path, .. } => {
                assert_eq!(path, secrets.path().join(CLIENT_CERT));
            }
            other => panic!("unexpected error: {other}"),
        }
        logctx.cleanup_successful();
    }

    #[test]
    fn test_garbage_tls_material() {
        let logctx = test_setup_log("test_garbage_tls_material");
        let secrets = Utf8TempDir::new().unwrap();
        for name in [CLIENT_CERT, CLIENT_KEY, ROOT_CERT] {
            std::fs::write(secrets.path().join(name), "not a pem").unwrap();
        }
        let config = EtcdConfig {
            endpoints: vec!["https://10.0.0.1:2379".to_string()],
            secrets_dir: secrets.path().to_owned(),
            request_timeout: Duration::from_secs(5),
        };

        let err = config.connect(&logctx.log).unwrap_err();
        assert!(
            matches!(err, EtcdClientError::ParseTls { .. }),
            "unexpected error: {err}"
        );
        logctx.cleanup_successful();
    }
}
