use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::runtime::{Capture, CommandOutput, Runtime, render_command};

pub fn write_file(path: impl AsRef<Path>, content: &str) -> PathBuf {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

pub fn set_mtime(path: impl AsRef<Path>, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct Call {
    pub argv: Vec<String>,
    pub capture: Capture,
}

#[derive(Default)]
struct State {
    env: HashMap<String, String>,
    rules: Vec<(String, CommandOutput)>,
    missing: Vec<String>,
    calls: Vec<Call>,
    replaced: Vec<Vec<String>>,
}

/// Records every command instead of running it.
///
/// Successful commands emulate their side effects: the path following `-o`
/// is created, and `ar rcs <archive>` creates the archive.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Rc<RefCell<State>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(self, key: &str, value: &str) -> Self {
        self.state
            .borrow_mut()
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Commands whose rendered form contains `pattern` produce `output`.
    pub fn on(self, pattern: &str, output: CommandOutput) -> Self {
        self.state
            .borrow_mut()
            .rules
            .push((pattern.to_string(), output));
        self
    }

    pub fn fail_on(self, pattern: &str, stderr: &str) -> Self {
        self.on(
            pattern,
            CommandOutput {
                returncode: 1,
                stdout: Some(vec![]),
                stderr: Some(stderr.as_bytes().to_vec()),
            },
        )
    }

    pub fn stdout_on(self, pattern: &str, stdout: &str) -> Self {
        self.on(
            pattern,
            CommandOutput {
                returncode: 0,
                stdout: Some(stdout.as_bytes().to_vec()),
                stderr: Some(vec![]),
            },
        )
    }

    pub fn missing(self, program: &str) -> Self {
        self.state.borrow_mut().missing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().map(|c| c.argv).collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn replaced(&self) -> Vec<Vec<String>> {
        self.state.borrow().replaced.clone()
    }
}

fn touch(path: &str) {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).unwrap();
        }
    }
    fs::write(path, "").unwrap();
    set_mtime(path, SystemTime::now());
}

fn emulate_side_effects(argv: &[String]) {
    if let Some(pos) = argv.iter().position(|a| a == "-o") {
        if let Some(dest) = argv.get(pos + 1) {
            touch(dest);
        }
    } else if argv.get(1).is_some_and(|a| a == "rcs") {
        if let Some(archive) = argv.get(2) {
            touch(archive);
        }
    }
}

impl Runtime for FakeRuntime {
    fn get_env(&self, key: &str) -> Option<String> {
        self.state.borrow().env.get(key).cloned()
    }

    fn run_command(&self, argv: &[String], capture: Capture) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call {
            argv: argv.to_vec(),
            capture,
        });

        let program = argv.first().cloned().unwrap_or_default();
        if argv.is_empty() || state.missing.contains(&program) {
            return Err(Error::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            });
        }

        let rendered = render_command(argv);
        let output = state
            .rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                returncode: 0,
                stdout: Some(vec![]),
                stderr: Some(vec![]),
            });
        drop(state);

        if output.success() {
            emulate_side_effects(argv);
        }

        Ok(match capture {
            Capture::Output => output,
            Capture::Inherit => CommandOutput {
                returncode: output.returncode,
                stdout: None,
                stderr: None,
            },
        })
    }

    fn replace_process(&self, argv: &[String]) -> Error {
        self.state.borrow_mut().replaced.push(argv.to_vec());
        Error::Spawn {
            program: argv.first().cloned().unwrap_or_default(),
            source: io::Error::other("process replacement is not available in tests"),
        }
    }
}
