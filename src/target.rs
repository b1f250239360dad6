//! Buildable units.
//!
//! A [`Target`] gathers sources and flags, then [`Target::build`] turns them
//! into an artifact inside its own build tree:
//!
//! ```text
//! <build>/obj/<escaped source path>.o
//! <build>/dest/<artifact>
//! <build>/.picobuild-stamp
//! ```
//!
//! The stamp records the last successful build. When the build script is
//! newer than the stamp, the whole tree is thrown away before building.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::compile_db::{COMPILE_COMMANDS, CompilationDatabase, CompileOperation};
use crate::compiler::Language;
use crate::error::{Error, IoContext as _, Result};
use crate::linker::{self, ArtifactKind, artifact_file_name};
use crate::pkg_config::{Package, PkgConfig};
use crate::session::Session;
use crate::staleness::is_newer;

pub const MARKER: &str = ".picobuild-stamp";

/// Which flag lists a [`Package`]'s compile flags are merged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageScope {
    C,
    Cxx,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub language: Language,
}

#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: ArtifactKind,
    build_dir: PathBuf,
    sources: Vec<Source>,
    c_flags: Vec<String>,
    cxx_flags: Vec<String>,
    link_flags: Vec<String>,
    compile_commands: Option<PathBuf>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ArtifactKind::default(),
            build_dir: PathBuf::from("build"),
            sources: Vec::new(),
            c_flags: Vec::new(),
            cxx_flags: Vec::new(),
            link_flags: Vec::new(),
            compile_commands: Some(PathBuf::from(COMPILE_COMMANDS)),
        }
    }

    pub fn build_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.build_dir = dir.into();
        self
    }

    pub fn kind(&mut self, kind: ArtifactKind) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn executable(&mut self) -> &mut Self {
        self.kind(ArtifactKind::Executable)
    }

    pub fn shared_library(&mut self) -> &mut Self {
        self.kind(ArtifactKind::SharedLibrary)
    }

    pub fn static_library(&mut self) -> &mut Self {
        self.kind(ArtifactKind::StaticLibrary)
    }

    /// Where to write the compilation database; `None` disables it.
    pub fn compile_commands(&mut self, path: Option<impl Into<PathBuf>>) -> &mut Self {
        self.compile_commands = path.map(Into::into);
        self
    }

    /// Registers a source file. Files that are neither C nor C++ are skipped.
    pub fn add_source(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        match Language::from_path(&path).filter(|l| l.is_c_family()) {
            Some(language) => self.sources.push(Source { path, language }),
            None => warn!("Ignoring {}: not a C or C++ source", path.display()),
        }
        self
    }

    pub fn add_sources<I, P>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.add_source(path);
        }
        self
    }

    /// Registers every C and C++ source below `dir`, in file name order.
    pub fn add_source_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = dir.as_ref();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Path {
                path: e.path().unwrap_or(dir).to_path_buf(),
                source: io::Error::from(e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let language = Language::from_path(entry.path()).filter(|l| l.is_c_family());
            if let Some(language) = language {
                self.sources.push(Source {
                    path: entry.into_path(),
                    language,
                });
            }
        }
        Ok(self)
    }

    pub fn c_flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.c_flags.push(flag.into());
        self
    }

    pub fn cxx_flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.cxx_flags.push(flag.into());
        self
    }

    /// Adds a compile flag for both languages.
    pub fn flag(&mut self, flag: impl Into<String>) -> &mut Self {
        let flag = flag.into();
        self.c_flags.push(flag.clone());
        self.cxx_flags.push(flag);
        self
    }

    pub fn c_std(&mut self, std: &str) -> &mut Self {
        self.c_flag(format!("-std={std}"))
    }

    pub fn cxx_std(&mut self, std: &str) -> &mut Self {
        self.cxx_flag(format!("-std={std}"))
    }

    pub fn optimize(&mut self, level: &str) -> &mut Self {
        self.flag(format!("-O{level}"))
    }

    pub fn debug_info(&mut self) -> &mut Self {
        self.flag("-g")
    }

    pub fn include_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.flag(format!("-I{}", dir.as_ref().display()))
    }

    pub fn library_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.link_flag(format!("-L{}", dir.as_ref().display()))
    }

    pub fn link_library(&mut self, name: &str) -> &mut Self {
        self.link_flag(format!("-l{name}"))
    }

    pub fn rpath(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.link_flag(format!("-Wl,-rpath,{}", dir.as_ref().display()))
    }

    pub fn link_flag(&mut self, flag: impl Into<String>) -> &mut Self {
        self.link_flags.push(flag.into());
        self
    }

    /// Merges a package's flags into this target.
    ///
    /// Compile flags go to the languages selected by `scope`; link flags are
    /// always merged.
    pub fn add_package(&mut self, package: &Package, scope: PackageScope) -> &mut Self {
        if matches!(scope, PackageScope::C | PackageScope::Both) {
            package.add_cflags_to(&mut self.c_flags);
        }
        if matches!(scope, PackageScope::Cxx | PackageScope::Both) {
            package.add_cflags_to(&mut self.cxx_flags);
        }
        package.add_libs_to(&mut self.link_flags);
        self
    }

    /// Looks `name` up with the package locator and merges it.
    pub fn add_package_named(
        &mut self,
        session: &Session,
        name: &str,
        scope: PackageScope,
    ) -> Result<&mut Self> {
        let package = PkgConfig::new(session.runtime()).find(name)?;
        Ok(self.add_package(&package, scope))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artifact_kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn build_directory(&self) -> &Path {
        &self.build_dir
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn sources_of(&self, language: Language) -> impl Iterator<Item = &Path> {
        self.sources
            .iter()
            .filter(move |s| s.language == language)
            .map(|s| s.path.as_path())
    }

    pub fn c_flags(&self) -> &[String] {
        &self.c_flags
    }

    pub fn cxx_flags(&self) -> &[String] {
        &self.cxx_flags
    }

    pub fn link_flags(&self) -> &[String] {
        &self.link_flags
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dest_dir().join(artifact_file_name(&self.name, self.kind))
    }

    pub fn object_path(&self, source: impl AsRef<Path>) -> PathBuf {
        self.obj_dir().join(escape_object_name(source))
    }

    fn obj_dir(&self) -> PathBuf {
        self.build_dir.join("obj")
    }

    fn dest_dir(&self) -> PathBuf {
        self.build_dir.join("dest")
    }

    fn marker(&self) -> PathBuf {
        self.build_dir.join(MARKER)
    }

    fn create_tree(&self) -> Result<()> {
        for dir in [self.obj_dir(), self.dest_dir()] {
            fs::create_dir_all(&dir).with_path(dir)?;
        }
        Ok(())
    }

    fn flags_for(&self, language: Language) -> &[String] {
        match language {
            Language::C => &self.c_flags,
            Language::Cxx => &self.cxx_flags,
            Language::Rust => &[],
        }
    }

    /// Prepares the build tree, discarding it when the build script changed.
    fn prepare(&self, session: &Session) -> Result<()> {
        self.create_tree()?;

        let marker = self.marker();
        if !marker.exists() {
            return touch(&marker);
        }

        let Some(script) = session.script() else {
            return Ok(());
        };
        if is_newer(script, &marker)? {
            info!(
                "{} changed, rebuilding {} from scratch",
                script.display(),
                self.name
            );
            self.clean()?;
            self.create_tree()?;
            touch(&marker)?;
        }
        Ok(())
    }

    /// Compiles stale objects and links the artifact. Returns the artifact path.
    pub fn build(&self, session: &Session) -> Result<PathBuf> {
        let runtime = session.runtime();
        self.prepare(session)?;

        let (mut db, log) = match &self.compile_commands {
            Some(path) => (CompilationDatabase::new(), path.as_path()),
            None => (CompilationDatabase::dummy(), Path::new(COMPILE_COMMANDS)),
        };

        let mut objects = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let object = self.object_path(&source.path);
            db.add(CompileOperation {
                source: source.path.clone(),
                destination: object.clone(),
                flags: self.flags_for(source.language).to_vec(),
                link_executable: false,
                language: source.language,
            });
            objects.push(object);
        }

        let compiled = db.write(runtime, log)?;
        info!(
            "{}: compiled {compiled} of {} sources",
            self.name,
            objects.len()
        );

        let use_cxx = self.sources.iter().any(|s| s.language == Language::Cxx);
        let artifact = linker::link(
            runtime,
            &objects,
            &self.dest_dir().join(&self.name),
            &self.link_flags,
            self.kind,
            use_cxx,
        )?;

        touch(&self.marker())?;
        info!("Built {}", artifact.display());
        Ok(artifact)
    }

    /// Deletes the whole build directory.
    pub fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.build_dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result.with_path(&self.build_dir),
        }
    }
}

fn touch(path: &Path) -> Result<()> {
    fs::File::create(path)
        .and_then(|file| file.set_modified(SystemTime::now()))
        .with_path(path)
}

/// Flattens a source path into an object file name.
///
/// `/` becomes `$P`, `$` becomes `$$` and `.` becomes `$d`. Bytes that are
/// not valid UTF-8 become `$x` and two hex digits. Distinct paths never
/// collide and the name can be decoded with [`unescape_object_name`].
pub fn escape_object_name(path: impl AsRef<Path>) -> String {
    let bytes = path.as_ref().as_os_str().as_encoded_bytes();
    let mut name = String::with_capacity(bytes.len() + 2);
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            match ch {
                '/' => name.push_str("$P"),
                '$' => name.push_str("$$"),
                '.' => name.push_str("$d"),
                ch => name.push(ch),
            }
        }
        for byte in chunk.invalid() {
            name.push_str(&format!("$x{byte:02x}"));
        }
    }
    name.push_str(".o");
    name
}

/// Decodes a name produced by [`escape_object_name`].
///
/// Names decoding to non-UTF-8 paths are only supported on unix.
pub fn unescape_object_name(name: &str) -> Option<PathBuf> {
    let escaped = name.strip_suffix(".o")?;
    let mut bytes = Vec::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '$' => match chars.next()? {
                'P' => bytes.push(b'/'),
                '$' => bytes.push(b'$'),
                'd' => bytes.push(b'.'),
                'x' => {
                    let hi = chars.next()?.to_digit(16)?;
                    let lo = chars.next()?.to_digit(16)?;
                    bytes.push(u8::try_from(hi * 16 + lo).ok()?);
                }
                _ => return None,
            },
            '.' => return None,
            ch => bytes.extend_from_slice(ch.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
    path_from_bytes(bytes)
}

fn path_from_bytes(bytes: Vec<u8>) -> Option<PathBuf> {
    match String::from_utf8(bytes) {
        Ok(path) => Some(PathBuf::from(path)),
        #[cfg(unix)]
        Err(e) => {
            use std::os::unix::ffi::OsStringExt as _;
            Some(PathBuf::from(std::ffi::OsString::from_vec(e.into_bytes())))
        }
        #[cfg(not(unix))]
        Err(_) => None,
    }
}
