// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog::{Logger, info};
use std::sync::atomic::{AtomicU32, Ordering};

/// Receives human-readable milestones as a phase runs.
///
/// Reporting is best-effort: implementations must return promptly and must
/// not fail the phase.
pub trait Progress: Send + Sync {
    fn next_step(&self, message: &str);
}

/// Reports progress to a log.
pub struct LogProgress {
    log: Logger,
    step: AtomicU32,
}

impl LogProgress {
    pub fn new(log: &Logger) -> Self {
        Self {
            log: log.new(slog::o!("component" => "Progress")),
            step: AtomicU32::new(0),
        }
    }
}

impl Progress for LogProgress {
    fn next_step(&self, message: &str) {
        let step = self.step.fetch_add(1, Ordering::Relaxed) + 1;
        info!(self.log, "{}", message; "step" => step);
    }
}
