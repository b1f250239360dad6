//! Self-rebuilding build programs.
//!
//! A build program calls [`Bootstrap::run`] first thing in `main`. When its
//! source is newer than the running executable, the source is recompiled
//! over the executable and the process image is replaced with the fresh
//! binary, started with the same arguments.

use std::path::PathBuf;
use std::rc::Rc;
use std::{env, io};

use tracing::{debug, info};

use crate::compiler::{self, Language};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::session::Session;
use crate::staleness::is_newer;

#[derive(Debug, Clone)]
pub struct Bootstrap {
    source: PathBuf,
    flags: Vec<String>,
}

/// Outcome of [`Bootstrap::ensure_fresh`].
#[derive(Debug)]
pub enum Freshness {
    /// The executable is up to date; carry on building.
    Current(Session),
    /// The executable was rebuilt and must be restarted.
    Restart(Restart),
}

/// A pending restart of a freshly rebuilt build program.
///
/// Nothing after a restart may run in the old process.
#[must_use = "a rebuilt program must be restarted with `Restart::exec`"]
pub struct Restart {
    runtime: Rc<dyn Runtime>,
    argv: Vec<String>,
}

impl Restart {
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Replaces the current process with the rebuilt program.
    ///
    /// Returns only if the replacement failed.
    pub fn exec(self) -> Error {
        info!("Restarting {}", self.argv[0]);
        self.runtime.replace_process(&self.argv)
    }
}

impl core::fmt::Debug for Restart {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Restart").field("argv", &self.argv).finish()
    }
}

fn resolve_executable(argv0: &str) -> PathBuf {
    let path = PathBuf::from(argv0);
    if path.exists() {
        return path;
    }
    match env::current_exe() {
        Ok(exe) => {
            debug!("{argv0} not found, using {}", exe.display());
            exe
        }
        Err(e) => {
            debug!("Cannot locate the running executable: {e}");
            path
        }
    }
}

impl Bootstrap {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            flags: Vec::new(),
        }
    }

    /// Adds a compiler flag used when the program rebuilds itself.
    pub fn flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.flags.push(flag.into());
        self
    }

    pub fn flags<I, S>(&mut self, flags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Rebuilds the running program when its source changed.
    ///
    /// `argv` is the program's own command line; `argv[0]` is the executable
    /// that gets overwritten. When `argv[0]` names no file, as after a `PATH`
    /// lookup, the running executable is used instead.
    ///
    /// Rust programs linking against this crate need the matching flags, e.g.
    /// `--edition=2024 -L target/debug/deps --extern picobuild`.
    pub fn ensure_fresh(&self, runtime: impl Runtime, argv: Vec<String>) -> Result<Freshness> {
        let Some(executable) = argv.first().map(|argv0| resolve_executable(argv0)) else {
            return Err(Error::Spawn {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "missing argv[0]"),
            });
        };

        let session = Session::new(runtime)
            .with_executable(&executable)
            .with_script(&self.source);

        if !is_newer(&self.source, &executable)? {
            return Ok(Freshness::Current(session));
        }

        let language =
            Language::from_path(&self.source).ok_or_else(|| Error::UnsupportedSource {
                path: self.source.clone(),
            })?;

        info!("Self-rebuilding {}", executable.display());
        compiler::compile(
            session.runtime(),
            language,
            &self.source,
            &executable,
            &self.flags,
            true,
        )?;

        Ok(Freshness::Restart(Restart {
            runtime: session.shared_runtime(),
            argv,
        }))
    }

    /// [`ensure_fresh`](Self::ensure_fresh), restarting the process when the
    /// program was rebuilt.
    pub fn run(&self, runtime: impl Runtime, argv: Vec<String>) -> Result<Session> {
        match self.ensure_fresh(runtime, argv)? {
            Freshness::Current(session) => Ok(session),
            Freshness::Restart(restart) => Err(restart.exec()),
        }
    }
}
