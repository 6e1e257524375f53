// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-phase logging.
//!
//! A phase logs to the caller's logger, tagged with the phase, and mirrors
//! everything at `Info` and above to the operator so that it shows up in the
//! operation's log.

use crate::operator::{LogEntry, Operator, Severity};
use chrono::Utc;
use phase_types::{OperationKey, Phase, Server};
use slog::{Drain, Level, Logger, Never, OwnedKVList, Record, o};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Forwards records to the operator API.
struct OperatorDrain {
    key: OperationKey,
    server: Option<Server>,
    // Operators are only ever called with owned data, and a panicking
    // operator leaves nothing of ours half-updated.
    operator: AssertUnwindSafe<Arc<dyn Operator>>,
}

impl Drain for OperatorDrain {
    type Ok = ();
    type Err = Never;

    fn log(
        &self,
        record: &Record<'_>,
        _values: &OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        let severity = match record.level() {
            Level::Critical | Level::Error => Severity::Error,
            Level::Warning => Severity::Warning,
            Level::Info => Severity::Info,
            Level::Debug | Level::Trace => return Ok(()),
        };
        let entry = LogEntry {
            severity,
            server: self.server.clone(),
            message: record.msg().to_string(),
            created: Utc::now(),
        };
        // Mirroring is best-effort; the record still reaches the local log.
        let _ = self.operator.create_log_entry(&self.key, entry);
        Ok(())
    }
}

/// Builds the logger for `phase` of the operation identified by `key`.
pub fn phase_logger(
    log: &Logger,
    phase: &Phase,
    key: OperationKey,
    operator: Arc<dyn Operator>,
) -> Logger {
    let server = phase.data.server.clone();
    let local = match &server {
        Some(server) => log.new(o!(
            "phase" => phase.id.clone(),
            "server" => server.hostname.clone(),
        )),
        None => log.new(o!("phase" => phase.id.clone())),
    };
    let mirror = OperatorDrain {
        key,
        server,
        operator: AssertUnwindSafe(operator),
    };
    let drain = slog::Duplicate::new(local, mirror).fuse();
    Logger::root(drain, o!())
}
