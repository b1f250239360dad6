use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::compiler::{LDFLAGS, Language};
use crate::error::{Error, Result};
use crate::flags::{env_flags, tokenize};
use crate::runtime::{Runtime, execute};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactKind {
    #[default]
    Executable,
    SharedLibrary,
    StaticLibrary,
}

pub const AR: &str = "AR";

/// The on-disk file name of an artifact called `name`.
pub fn artifact_file_name(name: &str, kind: ArtifactKind) -> String {
    match kind {
        ArtifactKind::SharedLibrary => shared_library_name(name),
        ArtifactKind::Executable | ArtifactKind::StaticLibrary => name.to_string(),
    }
}

fn shared_library_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_vendor = "apple") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}

/// Archiver command line, `$AR` or `ar`.
pub fn archiver(runtime: &dyn Runtime) -> Vec<String> {
    let command = runtime
        .get_env(AR)
        .map(|value| tokenize(&value))
        .unwrap_or_default();
    if command.is_empty() {
        return vec!["ar".into()];
    }
    command
}

/// Links `objects` into an artifact.
///
/// `artifact` is the requested path; shared libraries are renamed following
/// the platform's conventions, so the produced path is returned. `use_cxx`
/// selects the C++ compiler as the linker front-end.
///
/// Static libraries are created by the archiver, which does not receive
/// `flags`.
pub fn link(
    runtime: &dyn Runtime,
    objects: &[PathBuf],
    artifact: &Path,
    flags: &[String],
    kind: ArtifactKind,
    use_cxx: bool,
) -> Result<PathBuf> {
    let artifact = match kind {
        ArtifactKind::SharedLibrary => {
            let name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            artifact.with_file_name(shared_library_name(&name))
        }
        ArtifactKind::Executable | ArtifactKind::StaticLibrary => artifact.to_path_buf(),
    };

    let mut args = match kind {
        ArtifactKind::StaticLibrary => {
            if !flags.is_empty() {
                debug!("Archiver does not take link flags, dropping {flags:?}");
            }
            let mut args = archiver(runtime);
            args.push("rcs".into());
            args.push(artifact.to_string_lossy().into_owned());
            args
        }
        ArtifactKind::Executable | ArtifactKind::SharedLibrary => {
            let language = if use_cxx { Language::Cxx } else { Language::C };
            let mut args = language.compiler(runtime);
            if kind == ArtifactKind::SharedLibrary {
                args.push("-shared".into());
            }
            args.push("-o".into());
            args.push(artifact.to_string_lossy().into_owned());
            args.extend(flags.iter().cloned());
            args.extend(env_flags(runtime, LDFLAGS));
            args
        }
    };
    args.extend(objects.iter().map(|o| o.to_string_lossy().into_owned()));

    let output = execute(runtime, &args)?;
    if !output.success() {
        let stderr = output.stderr_lossy();
        error!("Linking failed with: \n{stderr}");
        return Err(Error::Link { artifact, stderr });
    }
    Ok(artifact)
}
