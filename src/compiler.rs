use std::fmt;
use std::path::Path;

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::flags::{env_flags, tokenize};
use crate::runtime::{Runtime, execute};
use crate::staleness::needs_rebuild;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cxx,
    /// Only used to rebuild build programs; targets never compile Rust.
    Rust,
}

impl Language {
    /// Classifies a source file by its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        match ext {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "C" => Some(Language::Cxx),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// C and C++ compile to objects that targets link together.
    pub fn is_c_family(self) -> bool {
        matches!(self, Language::C | Language::Cxx)
    }

    pub fn compiler_var(self) -> &'static str {
        match self {
            Language::C => "CC",
            Language::Cxx => "CXX",
            Language::Rust => "RUSTC",
        }
    }

    pub fn flags_var(self) -> &'static str {
        match self {
            Language::C => "CFLAGS",
            Language::Cxx => "CXXFLAGS",
            Language::Rust => "RUSTFLAGS",
        }
    }

    pub fn default_compiler(self) -> &'static str {
        match self {
            Language::C => "cc",
            Language::Cxx => "c++",
            Language::Rust => "rustc",
        }
    }

    /// The compiler command, honoring the environment override.
    ///
    /// The override may carry a launcher prefix such as `ccache cc`.
    pub fn compiler(self, runtime: &dyn Runtime) -> Vec<String> {
        let command = runtime
            .get_env(self.compiler_var())
            .map(|value| tokenize(&value))
            .unwrap_or_default();
        if command.is_empty() {
            return vec![self.default_compiler().to_string()];
        }
        command
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::C => write!(f, "c"),
            Language::Cxx => write!(f, "c++"),
            Language::Rust => write!(f, "rust"),
        }
    }
}

pub const LDFLAGS: &str = "LDFLAGS";

/// Builds the compiler command line for one source file.
///
/// The order is: compiler, `-c` when only compiling, `-o destination`,
/// `flags`, flags from the language's environment variable, `LDFLAGS` when
/// linking, and the source last.
///
/// `rustc` takes `--emit=obj` instead of `-c` and never sees `LDFLAGS`.
pub fn invocation(
    runtime: &dyn Runtime,
    language: Language,
    source: &Path,
    destination: &Path,
    flags: &[String],
    link_executable: bool,
) -> Vec<String> {
    let mut args = language.compiler(runtime);

    if !link_executable {
        args.push(match language {
            Language::Rust => "--emit=obj".into(),
            Language::C | Language::Cxx => "-c".into(),
        });
    }
    args.push("-o".into());
    args.push(destination.to_string_lossy().into_owned());

    args.extend(flags.iter().cloned());
    args.extend(env_flags(runtime, language.flags_var()));

    if link_executable && language.is_c_family() {
        args.extend(env_flags(runtime, LDFLAGS));
    }

    args.push(source.to_string_lossy().into_owned());
    args
}

pub fn compile(
    runtime: &dyn Runtime,
    language: Language,
    source: &Path,
    destination: &Path,
    flags: &[String],
    link_executable: bool,
) -> Result<()> {
    let argv = invocation(runtime, language, source, destination, flags, link_executable);
    let output = execute(runtime, &argv)?;
    if !output.success() {
        let stderr = output.stderr_lossy();
        error!("Compilation failed with: \n{stderr}");
        return Err(Error::Compilation {
            source_file: source.to_path_buf(),
            stderr,
        });
    }
    Ok(())
}

/// Compiles `source` only when `destination` is missing or older.
///
/// Returns whether the compiler ran.
pub fn compile_if_necessary(
    runtime: &dyn Runtime,
    language: Language,
    source: &Path,
    destination: &Path,
    flags: &[String],
    link_executable: bool,
) -> Result<bool> {
    if !needs_rebuild(source, destination)? {
        debug!("{} is up to date", destination.display());
        return Ok(false);
    }
    compile(runtime, language, source, destination, flags, link_executable)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::testutil::{FakeRuntime, set_mtime, strings, write_file};

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path("src/main.c"), Some(Language::C));
        assert_eq!(Language::from_path("a.cc"), Some(Language::Cxx));
        assert_eq!(Language::from_path("a.cpp"), Some(Language::Cxx));
        assert_eq!(Language::from_path("a.cxx"), Some(Language::Cxx));
        assert_eq!(Language::from_path("a.c++"), Some(Language::Cxx));
        assert_eq!(Language::from_path("build/main.rs"), Some(Language::Rust));
        assert!(!Language::Rust.is_c_family());
        assert_eq!(Language::from_path("include/a.h"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_compile_only_invocation() {
        let rt = FakeRuntime::new();
        let argv = invocation(
            &rt,
            Language::C,
            Path::new("main.c"),
            Path::new("main.o"),
            &strings(&["-O2"]),
            false,
        );
        assert_eq!(argv, strings(&["cc", "-c", "-o", "main.o", "-O2", "main.c"]));
    }

    #[test]
    fn test_link_invocation_uses_environment() {
        let rt = FakeRuntime::new()
            .env("CXX", "ccache g++")
            .env("CXXFLAGS", "-Wall '-DNAME=a b'")
            .env("CFLAGS", "-ignored")
            .env("LDFLAGS", "-lm");
        let argv = invocation(
            &rt,
            Language::Cxx,
            Path::new("main.cc"),
            Path::new("main"),
            &strings(&["-std=c++23"]),
            true,
        );
        assert_eq!(
            argv,
            strings(&[
                "ccache", "g++", "-o", "main", "-std=c++23", "-Wall", "-DNAME=a b", "-lm",
                "main.cc"
            ])
        );
    }

    #[test]
    fn test_ldflags_skipped_when_compiling_only() {
        let rt = FakeRuntime::new().env("LDFLAGS", "-lm").env("CC", "clang");
        let argv = invocation(&rt, Language::C, Path::new("a.c"), Path::new("a.o"), &[], false);
        assert_eq!(argv, strings(&["clang", "-c", "-o", "a.o", "a.c"]));
    }

    #[test]
    fn test_rust_invocation() {
        let rt = FakeRuntime::new()
            .env("RUSTFLAGS", "-C opt-level=2")
            .env("LDFLAGS", "-lm")
            .env("CFLAGS", "-ignored");

        let argv = invocation(
            &rt,
            Language::Rust,
            Path::new("build.rs"),
            Path::new("build"),
            &strings(&["--edition=2024"]),
            true,
        );
        assert_eq!(
            argv,
            strings(&["rustc", "-o", "build", "--edition=2024", "-C", "opt-level=2", "build.rs"])
        );

        let rt = FakeRuntime::new().env("RUSTC", "/opt/rust/bin/rustc");
        let argv = invocation(&rt, Language::Rust, Path::new("a.rs"), Path::new("a.o"), &[], false);
        assert_eq!(
            argv,
            strings(&["/opt/rust/bin/rustc", "--emit=obj", "-o", "a.o", "a.rs"])
        );
    }

    #[test]
    fn test_compile_failure_carries_stderr() {
        let rt = FakeRuntime::new().fail_on("broken.c", "broken.c:1: error: expected ';'");
        let err = compile(
            &rt,
            Language::C,
            Path::new("broken.c"),
            Path::new("broken.o"),
            &[],
            false,
        )
        .unwrap_err();
        match err {
            Error::Compilation { source_file, stderr } => {
                assert_eq!(source_file, Path::new("broken.c"));
                assert!(stderr.contains("expected ';'"));
            }
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_compile_if_necessary_skips_fresh_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(dir.path().join("main.cc"), "int main() {}");
        let dest = dir.path().join("main");
        set_mtime(&src, SystemTime::now() - Duration::from_secs(60));

        let rt = FakeRuntime::new();
        assert!(compile_if_necessary(&rt, Language::Cxx, &src, &dest, &[], true).unwrap());
        assert!(dest.exists());
        assert!(!compile_if_necessary(&rt, Language::Cxx, &src, &dest, &[], true).unwrap());
        assert_eq!(rt.calls().len(), 1);
    }
}
