use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("compilation of {} failed:\n{stderr}", source_file.display())]
    Compilation { source_file: PathBuf, stderr: String },

    #[error("linking {} failed:\n{stderr}", artifact.display())]
    Link { artifact: PathBuf, stderr: String },

    #[error("package `{name}` not found")]
    PackageNotFound { name: String },

    #[error("cannot read metadata of {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build program {} failed: {reason}", child.display())]
    Invocation { child: PathBuf, reason: String },

    #[error("{} is not a C, C++ or Rust source file", path.display())]
    UnsupportedSource { path: PathBuf },

    #[error("failed to render compilation database: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) trait IoContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
