use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::runtime::Runtime;

/// Context of one run of a build program.
///
/// Carries the runtime used for every spawned command and the identity of
/// the build script. Targets compare their build marker against
/// [`script`](Session::script) to detect that the build logic changed.
#[derive(Clone)]
pub struct Session {
    runtime: Rc<dyn Runtime>,
    executable: Option<PathBuf>,
    script: Option<PathBuf>,
}

impl Session {
    pub fn new(runtime: impl Runtime) -> Self {
        Self {
            runtime: Rc::new(runtime),
            executable: None,
            script: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn runtime(&self) -> &dyn Runtime {
        &*self.runtime
    }

    pub(crate) fn shared_runtime(&self) -> Rc<dyn Runtime> {
        self.runtime.clone()
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("executable", &self.executable)
            .field("script", &self.script)
            .finish_non_exhaustive()
    }
}
