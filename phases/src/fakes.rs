// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording implementations of [`Progress`] and [`Operator`] for tests.

use crate::operator::{LogEntry, Operator, OperatorError};
use crate::progress::Progress;
use phase_types::OperationKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Remembers every step reported to it.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    steps: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }
}

impl Progress for RecordingProgress {
    fn next_step(&self, message: &str) {
        self.steps.lock().unwrap().push(message.to_string());
    }
}

/// Remembers every log entry created through it.
///
/// While marked unavailable, calls fail and nothing is recorded.
#[derive(Debug, Default)]
pub struct RecordingOperator {
    entries: Mutex<Vec<(OperationKey, LogEntry)>>,
    unavailable: AtomicBool,
}

impl RecordingOperator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<(OperationKey, LogEntry)> {
        self.entries.lock().unwrap().clone()
    }

    /// Just the messages, in order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entry)| entry.message.clone())
            .collect()
    }
}

impl Operator for RecordingOperator {
    fn create_log_entry(
        &self,
        key: &OperationKey,
        entry: LogEntry,
    ) -> Result<(), OperatorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OperatorError::Unavailable(
                "marked unavailable".to_string(),
            ));
        }
        self.entries.lock().unwrap().push((key.clone(), entry));
        Ok(())
    }
}
