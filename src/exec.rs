// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Execution seam for the vendor display tools.
//!
//! All hardware access goes through [`CommandRunner`]: an invocation
//! (program, arguments, environment) in, a structured [`ExecOutput`] out.
//! Production code uses [`SystemRunner`]; tests substitute a scripted fake so
//! backend and dispatcher logic run without display hardware.

use std::fmt;

use tokio::process::Command;

use crate::error::HardwareError;

/// A single vendor tool invocation.
///
/// # Examples
///
/// ```
/// use displayctl::Invocation;
///
/// let invocation = Invocation::new("vcgencmd").arg("display_power").arg("1");
/// assert_eq!(invocation.rendered(), "vcgencmd display_power 1");
/// ```
#[derive(Debug, Clone)]
pub struct Invocation {
    program: &'static str,
    args: Vec<String>,
    envs: Vec<(&'static str, String)>,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: &'static str) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.envs.push((key, value.into()));
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Returns the program and arguments as a single display string.
    #[must_use]
    pub fn rendered(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Returns whether the invocation exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Converts a failed invocation into a [`HardwareError`].
    #[must_use]
    pub fn into_failure(self, invocation: &Invocation) -> HardwareError {
        HardwareError::CommandFailed {
            command: invocation.rendered(),
            code: self.code.unwrap_or(-1),
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Executes vendor tool invocations.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Runs the invocation to completion and captures its output.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Spawn`] if the program cannot be started.
    /// A non-zero exit is not an error at this layer; callers decide whether
    /// it is tolerable.
    async fn run(&self, invocation: &Invocation) -> Result<ExecOutput, HardwareError>;
}

/// Runner backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecOutput, HardwareError> {
        tracing::debug!(command = %invocation, "Running display tool");

        let output = Command::new(invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (*k, v.as_str())))
            .output()
            .await
            .map_err(|source| HardwareError::Spawn {
                program: invocation.program.to_string(),
                source,
            })?;

        Ok(ExecOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner for hardware-free tests.

    use std::sync::Mutex;
    use std::time::Duration;

    use super::{CommandRunner, ExecOutput, Invocation};
    use crate::error::HardwareError;

    type Script = dyn Fn(&Invocation) -> Result<ExecOutput, HardwareError> + Send + Sync;

    /// A [`CommandRunner`] that answers from a closure and records every
    /// invocation it sees.
    pub(crate) struct FakeRunner {
        script: Box<Script>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub(crate) fn new(
            script: impl Fn(&Invocation) -> Result<ExecOutput, HardwareError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Answers every invocation with a successful, empty-output exit.
        pub(crate) fn silent() -> Self {
            Self::new(|_| Ok(ok("")))
        }

        /// Sleeps before answering, for exercising execution bounds.
        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Rendered invocations, in call order.
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, invocation: &Invocation) -> Result<ExecOutput, HardwareError> {
            self.calls.lock().unwrap().push(invocation.rendered());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.script)(invocation)
        }
    }

    /// A successful exit with the given stdout.
    pub(crate) fn ok(stdout: &str) -> ExecOutput {
        ExecOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit with the given stderr.
    pub(crate) fn failed(code: i32, stderr: &str) -> ExecOutput {
        ExecOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_rendered() {
        let invocation = Invocation::new("tvservice").arg("-p");
        assert_eq!(invocation.rendered(), "tvservice -p");
    }

    #[test]
    fn exec_output_success() {
        assert!(fake::ok("").success());
        assert!(!fake::failed(1, "boom").success());
        assert!(
            !ExecOutput {
                code: None,
                ..ExecOutput::default()
            }
            .success()
        );
    }

    #[test]
    fn into_failure_carries_invocation() {
        let invocation = Invocation::new("tvservice").arg("-o");
        let err = fake::failed(2, "no device\n").into_failure(&invocation);
        match err {
            HardwareError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "tvservice -o");
                assert_eq!(code, 2);
                assert_eq!(stderr, "no device");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn system_runner_spawn_error() {
        let invocation = Invocation::new("displayctl-no-such-tool");
        let result = SystemRunner.run(&invocation).await;
        assert!(matches!(result, Err(HardwareError::Spawn { .. })));
    }

    #[tokio::test]
    async fn fake_runner_records_calls() {
        let runner = fake::FakeRunner::silent();
        runner
            .run(&Invocation::new("vcgencmd").arg("version"))
            .await
            .unwrap();
        assert_eq!(runner.calls(), vec!["vcgencmd version".to_string()]);
    }
}
