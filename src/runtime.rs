//! Process execution.
//!
//! Everything that leaves the process (spawning a compiler, querying a
//! package locator, re-executing ourselves) goes through the [`Runtime`]
//! trait so the build logic can be exercised against a recording fake.

use std::io;
use std::process::Command;
use std::{env, fmt};

use tracing::info;

use crate::error::{Error, Result};

/// How the standard streams of a child are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Buffer stdout and stderr in memory.
    Output,
    /// Share the parent's streams; nothing is captured.
    Inherit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub returncode: i32,
    /// `None` when the command ran with [`Capture::Inherit`].
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    pub fn stdout_lossy(&self) -> String {
        lossy(self.stdout.as_deref())
    }

    pub fn stderr_lossy(&self) -> String {
        lossy(self.stderr.as_deref())
    }
}

fn lossy(bytes: Option<&[u8]>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

pub trait Runtime: 'static {
    // env
    fn get_env(&self, key: &str) -> Option<String>;

    // process
    fn run_command(&self, argv: &[String], capture: Capture) -> Result<CommandOutput>;

    /// Replaces the current process image with `argv`.
    ///
    /// Only returns if the replacement could not happen.
    fn replace_process(&self, argv: &[String]) -> Error;
}

/// Runs `argv` with its output captured.
pub fn execute(runtime: &dyn Runtime, argv: &[String]) -> Result<CommandOutput> {
    run(runtime, argv, Capture::Output)
}

pub fn run(runtime: &dyn Runtime, argv: &[String], capture: Capture) -> Result<CommandOutput> {
    info!("Executing command: {}", render_command(argv));
    runtime.run_command(argv, capture)
}

/// Renders `argv` the way it would be typed in a shell, for log lines.
pub fn render_command(argv: &[String]) -> String {
    RenderedCommand(argv).to_string()
}

struct RenderedCommand<'a>(&'a [String]);

impl fmt::Display for RenderedCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, arg) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            if idx == 0 || !arg.contains([' ', '"', '\'']) {
                f.write_str(arg)?;
                continue;
            }
            f.write_str("\"")?;
            for ch in arg.chars() {
                match ch {
                    '"' => f.write_str("\\\"")?,
                    '\\' => f.write_str("\\\\")?,
                    ch => write!(f, "{ch}")?,
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct System;

fn split_program(argv: &[String]) -> Result<(&String, &[String])> {
    argv.split_first().ok_or_else(|| Error::Spawn {
        program: String::new(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
    })
}

impl Runtime for System {
    fn get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn run_command(&self, argv: &[String], capture: Capture) -> Result<CommandOutput> {
        let (program, args) = split_program(argv)?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let spawn_error = |source| Error::Spawn {
            program: program.clone(),
            source,
        };

        match capture {
            Capture::Output => {
                let output = cmd.output().map_err(spawn_error)?;
                Ok(CommandOutput {
                    returncode: output.status.code().unwrap_or(-1),
                    stdout: Some(output.stdout),
                    stderr: Some(output.stderr),
                })
            }
            Capture::Inherit => {
                let status = cmd.status().map_err(spawn_error)?;
                Ok(CommandOutput {
                    returncode: status.code().unwrap_or(-1),
                    stdout: None,
                    stderr: None,
                })
            }
        }
    }

    #[cfg(unix)]
    fn replace_process(&self, argv: &[String]) -> Error {
        use std::os::unix::process::CommandExt as _;

        let (program, args) = match split_program(argv) {
            Ok(split) => split,
            Err(e) => return e,
        };
        let source = Command::new(program).args(args).exec();
        Error::Spawn {
            program: program.clone(),
            source,
        }
    }

    #[cfg(not(unix))]
    fn replace_process(&self, argv: &[String]) -> Error {
        match self.run_command(argv, Capture::Inherit) {
            Ok(output) => std::process::exit(output.returncode),
            Err(e) => e,
        }
    }
}
