//! A small build orchestrator whose build description is a program.
//!
//! A build program bootstraps itself, describes one or more [`Target`]s and
//! builds them:
//!
//! ```no_run
//! use picobuild::{Bootstrap, PackageScope, System, Target};
//!
//! fn main() -> std::process::ExitCode {
//!     picobuild::init_logging();
//!     picobuild::guard(|| {
//!         let session = Bootstrap::new(file!())
//!             .flags(["--edition=2024", "-L", "target/debug/deps", "--extern", "picobuild"])
//!             .run(System, std::env::args().collect())?;
//!         Target::new("game")
//!             .add_source_dir("src")?
//!             .cxx_std("c++23")
//!             .add_package_named(&session, "raylib", PackageScope::Cxx)?
//!             .build(&session)?;
//!         Ok(())
//!     })
//! }
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

mod bootstrap;
pub mod compile_db;
pub mod compiler;
mod error;
pub mod flags;
pub mod invoke;
pub mod linker;
pub mod pkg_config;
pub mod runtime;
mod session;
pub mod staleness;
pub mod target;

#[cfg(test)]
mod testutil;

pub use crate::bootstrap::{Bootstrap, Freshness, Restart};
pub use crate::compile_db::{CompilationDatabase, CompileOperation};
pub use crate::compiler::Language;
pub use crate::error::{Error, Result};
pub use crate::linker::ArtifactKind;
pub use crate::pkg_config::{Package, PkgConfig};
pub use crate::runtime::{Capture, CommandOutput, Runtime, System};
pub use crate::session::Session;
pub use crate::target::{PackageScope, Target};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "PICOBUILD_LOG";

/// Rebuilds and restarts the running program when `own_source` changed.
///
/// Call this first thing in `main`. When a rebuild happens this function
/// does not return on success; the process continues as the new binary.
/// Programs that need rebuild flags, such as Rust programs using this crate,
/// go through [`Bootstrap`] instead.
pub fn bootstrap(own_source: impl Into<PathBuf>) -> Result<Session> {
    Bootstrap::new(own_source).run(System, env::args().collect())
}

/// Logs to stderr, filtered by [`LOG_ENV`] (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Runs the body of a build program, turning an error into a failing exit.
pub fn guard(body: impl FnOnce() -> anyhow::Result<()>) -> ExitCode {
    match body() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
