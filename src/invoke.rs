//! Running independent child build programs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::compiler::{self, Language};
use crate::error::{Error, IoContext as _, Result};
use crate::runtime::{Capture, run};
use crate::session::Session;

/// Changes the working directory and restores the previous one on drop.
pub(crate) struct DirGuard {
    previous: PathBuf,
}

impl DirGuard {
    pub(crate) fn enter(dir: &Path) -> Result<Self> {
        let previous = env::current_dir().with_path(".")?;
        env::set_current_dir(dir).with_path(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!(
                "Failed to return to {}: {e}",
                self.previous.display()
            );
        }
    }
}

/// Runs the build program whose source is `child` from the child's directory.
///
/// The program is compiled next to its source, named after the source file
/// without extension, if it does not exist yet. Once built it is responsible
/// for rebuilding itself. Its output goes straight to our own streams.
pub fn invoke(session: &Session, child: impl AsRef<Path>, args: &[String]) -> Result<()> {
    let child = child.as_ref();
    let dir = child
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let script = child
        .file_name()
        .map(Path::new)
        .ok_or_else(|| Error::UnsupportedSource {
            path: child.to_path_buf(),
        })?;

    let _cwd = DirGuard::enter(dir)?;

    let language = Language::from_path(script).ok_or_else(|| Error::UnsupportedSource {
        path: child.to_path_buf(),
    })?;
    let binary = Path::new(".").join(script.file_stem().unwrap_or(script.as_os_str()));

    let runtime = session.runtime();
    if !binary.exists() {
        info!("Bootstrapping {}", child.display());
        compiler::compile(runtime, language, script, &binary, &[], true)?;
    }

    let mut argv = vec![binary.to_string_lossy().into_owned()];
    argv.extend(args.iter().cloned());

    let output = run(runtime, &argv, Capture::Inherit).map_err(|e| Error::Invocation {
        child: child.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !output.success() {
        return Err(Error::Invocation {
            child: child.to_path_buf(),
            reason: format!("exited with status {}", output.returncode),
        });
    }
    Ok(())
}

/// Invokes `<subdir>/<script_name>` for every subdirectory of `dir` that has one.
///
/// Subdirectories are visited in name order. Returns how many programs ran.
pub fn invoke_all(
    session: &Session,
    dir: impl AsRef<Path>,
    script_name: &str,
    args: &[String],
) -> Result<usize> {
    let dir = dir.as_ref();
    let path_error = |source| Error::Path {
        path: dir.to_path_buf(),
        source,
    };

    let mut subdirs = fs::read_dir(dir)
        .map_err(path_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(path_error)?;
    subdirs.retain(|p| p.is_dir());
    subdirs.sort();

    let mut count = 0;
    for subdir in subdirs {
        let script = subdir.join(script_name);
        if !script.is_file() {
            continue;
        }
        invoke(session, &script, args)?;
        count += 1;
    }
    Ok(count)
}
