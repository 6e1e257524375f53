// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use itertools::Itertools;
use std::process::Command;

/// A command as observed by an executor: the program and its arguments.
///
/// Environment variables are deliberately left out so that expectations in
/// tests stay readable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub program: String,
    pub args: Vec<String>,
}

impl Input {
    pub fn new<P: AsRef<str>>(program: P, args: Vec<&str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: args.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Short-hand for a whitespace-separated string, which can be provided
    /// "like a shell command".
    pub fn shell<S: AsRef<str>>(input: S) -> Self {
        let mut split = input.as_ref().split_whitespace();
        Self {
            program: split.next().unwrap_or_default().to_string(),
            args: split.map(|s| s.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args.iter().join(" "))?;
        }
        Ok(())
    }
}

impl From<&Command> for Input {
    fn from(command: &Command) -> Self {
        Self {
            program: command.get_program().to_string_lossy().to_string(),
            args: command
                .get_args()
                .map(|arg| arg.to_string_lossy().to_string())
                .collect(),
        }
    }
}
