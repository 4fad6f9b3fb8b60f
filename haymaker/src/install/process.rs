//! External command execution with a wall-clock limit

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// How an external command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited with a code (`None` when killed by a signal)
    Exited(Option<i32>),

    /// Killed after exceeding the time limit
    TimedOut,
}

/// Result of running an external command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub program: String,
    pub exit: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit == ExitOutcome::Exited(Some(0))
    }

    pub fn timed_out(&self) -> bool {
        self.exit == ExitOutcome::TimedOut
    }

    pub fn code(&self) -> Option<i32> {
        match self.exit {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::TimedOut => None,
        }
    }
}

/// A command to run: program, arguments, working directory, env, stdin
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Build the tokio command; the child dies if the handle is dropped
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }

    /// Run to completion or until `limit` elapses, capturing output.
    ///
    /// Failing to spawn is an `Err`; everything after that is described by the
    /// returned outcome.
    pub async fn run(&self, limit: Duration) -> std::io::Result<CommandOutcome> {
        debug!("Running {} {:?} (limit {:?})", self.program, self.args, limit);
        let started = Instant::now();

        let mut command = self.command();
        command
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;

        if let (Some(input), Some(mut stdin)) = (&self.stdin, child.stdin.take()) {
            // A child that exits without reading its input is not our failure
            let _ = stdin.write_all(input).await;
            drop(stdin);
        }

        let outcome = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                CommandOutcome {
                    program: self.program.clone(),
                    exit: ExitOutcome::Exited(output.status.code()),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed: started.elapsed(),
                }
            }
            // Dropping the wait future drops the child, which kills it
            Err(_) => CommandOutcome {
                program: self.program.clone(),
                exit: ExitOutcome::TimedOut,
                stdout: String::new(),
                stderr: String::new(),
                elapsed: started.elapsed(),
            },
        };

        debug!(
            "{} finished: {:?} after {:?}",
            self.program, outcome.exit, outcome.elapsed
        );
        Ok(outcome)
    }
}
