//! Pending compile operations and the `compile_commands.json` they produce.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::compiler::{self, Language};
use crate::error::{IoContext as _, Result};
use crate::runtime::Runtime;
use crate::staleness::is_newer;

pub const COMPILE_COMMANDS: &str = "compile_commands.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOperation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub flags: Vec<String>,
    pub link_executable: bool,
    pub language: Language,
}

impl CompileOperation {
    fn is_up_to_date(&self) -> Result<bool> {
        Ok(self.destination.exists() && is_newer(&self.destination, &self.source)?)
    }

    fn invocation(&self, runtime: &dyn Runtime) -> Vec<String> {
        compiler::invocation(
            runtime,
            self.language,
            &self.source,
            &self.destination,
            &self.flags,
            self.link_executable,
        )
    }
}

#[derive(Debug, Serialize)]
struct Entry {
    arguments: Vec<String>,
    directory: String,
    file: String,
    output: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    operations: Vec<CompileOperation>,
    dummy: bool,
}

impl CompilationDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database that compiles but never renders a log.
    pub fn dummy() -> Self {
        Self {
            operations: Vec::new(),
            dummy: true,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    pub fn operations(&self) -> &[CompileOperation] {
        &self.operations
    }

    pub fn add(&mut self, operation: CompileOperation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    pub fn compile_c_source(
        &mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        flags: &[String],
        link_executable: bool,
    ) -> &mut Self {
        self.add_source(Language::C, source, destination, flags, link_executable)
    }

    pub fn compile_cxx_source(
        &mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        flags: &[String],
        link_executable: bool,
    ) -> &mut Self {
        self.add_source(Language::Cxx, source, destination, flags, link_executable)
    }

    fn add_source(
        &mut self,
        language: Language,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        flags: &[String],
        link_executable: bool,
    ) -> &mut Self {
        self.add(CompileOperation {
            source: source.into(),
            destination: destination.into(),
            flags: flags.to_vec(),
            link_executable,
            language,
        })
    }

    /// Runs the registered operations in order.
    ///
    /// With `lazy`, operations whose destination exists and is newer than the
    /// source are skipped. Returns the number of compiler invocations.
    pub fn perform(&self, runtime: &dyn Runtime, lazy: bool) -> Result<usize> {
        let mut compiled = 0;
        for op in &self.operations {
            if lazy && op.is_up_to_date()? {
                debug!("{} is up to date", op.destination.display());
                continue;
            }
            compiler::compile(
                runtime,
                op.language,
                &op.source,
                &op.destination,
                &op.flags,
                op.link_executable,
            )?;
            compiled += 1;
        }
        Ok(compiled)
    }

    /// Renders the database as a JSON array, one entry per source file.
    ///
    /// The last registration of a source wins. Returns `None` for a dummy
    /// database.
    pub fn render(&self, runtime: &dyn Runtime) -> Result<Option<String>> {
        if self.dummy {
            return Ok(None);
        }

        let directory = env::current_dir().with_path(".")?;

        let mut index: HashMap<&Path, usize> = HashMap::new();
        let mut latest: Vec<&CompileOperation> = Vec::new();
        for op in &self.operations {
            match index.get(op.source.as_path()) {
                Some(&pos) => latest[pos] = op,
                None => {
                    index.insert(op.source.as_path(), latest.len());
                    latest.push(op);
                }
            }
        }

        let entries = latest
            .into_iter()
            .map(|op| {
                Ok(Entry {
                    arguments: op.invocation(runtime),
                    directory: directory.to_string_lossy().into_owned(),
                    file: absolute(&op.source)?,
                    output: absolute(&op.destination)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(serde_json::to_string_pretty(&entries)?))
    }

    /// Performs the pending operations lazily, then writes the rendered log
    /// to `path`. Returns the number of compiler invocations.
    pub fn write(&self, runtime: &dyn Runtime, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let compiled = self.perform(runtime, true)?;
        if let Some(json) = self.render(runtime)? {
            fs::write(path, json).with_path(path)?;
            info!("Wrote {}", path.display());
        }
        Ok(compiled)
    }

    /// [`write`](Self::write) to `compile_commands.json` in the current directory.
    pub fn build(&self, runtime: &dyn Runtime) -> Result<usize> {
        self.write(runtime, COMPILE_COMMANDS)
    }
}

fn absolute(path: &Path) -> Result<String> {
    let path = std::path::absolute(path).with_path(path)?;
    Ok(path.to_string_lossy().into_owned())
}
