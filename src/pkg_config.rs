use tracing::debug;

use crate::error::{Error, Result};
use crate::flags::tokenize;
use crate::runtime::{Runtime, execute};

pub const PKG_CONFIG: &str = "PKG_CONFIG";

/// Compile and link flags of an installed library.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    pub cflags: Vec<String>,
    pub libs: Vec<String>,
}

impl Package {
    pub fn add_cflags_to(&self, flags: &mut Vec<String>) {
        flags.extend(self.cflags.iter().cloned());
    }

    pub fn add_libs_to(&self, flags: &mut Vec<String>) {
        flags.extend(self.libs.iter().cloned());
    }
}

/// Queries `pkg-config` (or the tool named by `PKG_CONFIG`).
pub struct PkgConfig<'a> {
    runtime: &'a dyn Runtime,
    tool: String,
}

impl<'a> PkgConfig<'a> {
    pub fn new(runtime: &'a dyn Runtime) -> Self {
        let tool = runtime
            .get_env(PKG_CONFIG)
            .filter(|tool| !tool.trim().is_empty())
            .unwrap_or_else(|| "pkg-config".into());
        Self { runtime, tool }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Whether the locator can be run at all. Spawn failures count as absent.
    pub fn is_available(&self) -> bool {
        let argv = vec![self.tool.clone(), "--version".into()];
        match execute(self.runtime, &argv) {
            Ok(output) => output.success(),
            Err(e) => {
                debug!("{} is not available: {e}", self.tool);
                false
            }
        }
    }

    pub fn find(&self, name: &str) -> Result<Package> {
        let cflags = self.query("--cflags", name)?;
        let libs = self.query("--libs", name)?;
        Ok(Package {
            cflags: tokenize(&cflags),
            libs: tokenize(&libs),
        })
    }

    fn query(&self, what: &str, name: &str) -> Result<String> {
        let argv = vec![self.tool.clone(), what.into(), name.into()];
        let output = execute(self.runtime, &argv)?;
        if !output.success() {
            debug!("{} {what} {name}: {}", self.tool, output.stderr_lossy().trim());
            return Err(Error::PackageNotFound { name: name.into() });
        }
        Ok(output.stdout_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CommandOutput;
    use crate::testutil::{FakeRuntime, strings};

    #[test]
    fn test_find_tokenizes_both_queries() {
        let rt = FakeRuntime::new()
            .stdout_on("--cflags raylib", "-I/usr/include/raylib -DPLATFORM_DESKTOP\n")
            .stdout_on("--libs raylib", "-L/usr/lib -lraylib -lm\n");

        let package = PkgConfig::new(&rt).find("raylib").unwrap();

        assert_eq!(
            package,
            Package {
                cflags: strings(&["-I/usr/include/raylib", "-DPLATFORM_DESKTOP"]),
                libs: strings(&["-L/usr/lib", "-lraylib", "-lm"]),
            }
        );
        assert_eq!(
            rt.commands(),
            vec![
                strings(&["pkg-config", "--cflags", "raylib"]),
                strings(&["pkg-config", "--libs", "raylib"]),
            ]
        );
    }

    #[test]
    fn test_find_reports_missing_package() {
        let rt = FakeRuntime::new().fail_on("nosuchlib", "Package nosuchlib was not found");
        let err = PkgConfig::new(&rt).find("nosuchlib").unwrap_err();
        assert!(matches!(err, Error::PackageNotFound { name } if name == "nosuchlib"));
    }

    #[test]
    fn test_find_fails_when_libs_query_fails() {
        let rt = FakeRuntime::new()
            .stdout_on("--cflags half", "-I/opt/half")
            .fail_on("--libs half", "");
        let err = PkgConfig::new(&rt).find("half").unwrap_err();
        assert!(matches!(err, Error::PackageNotFound { .. }));
    }

    #[test]
    fn test_tool_override() {
        let rt = FakeRuntime::new().env("PKG_CONFIG", "pkgconf");
        let pc = PkgConfig::new(&rt);
        assert_eq!(pc.tool(), "pkgconf");
        assert!(pc.is_available());
        assert_eq!(rt.commands(), vec![strings(&["pkgconf", "--version"])]);
    }

    #[test]
    fn test_unavailable_when_missing_or_failing() {
        let rt = FakeRuntime::new().missing("pkg-config");
        assert!(!PkgConfig::new(&rt).is_available());

        let rt = FakeRuntime::new().on(
            "--version",
            CommandOutput {
                returncode: 127,
                ..Default::default()
            },
        );
        assert!(!PkgConfig::new(&rt).is_available());
    }

    #[test]
    fn test_package_merge_helpers() {
        let package = Package {
            cflags: strings(&["-I/a"]),
            libs: strings(&["-la"]),
        };
        let mut flags = strings(&["-std=c++23"]);
        package.add_cflags_to(&mut flags);
        package.add_libs_to(&mut flags);
        assert_eq!(flags, strings(&["-std=c++23", "-I/a", "-la"]));
    }
}
