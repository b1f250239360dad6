use std::process::ExitCode;

use anyhow::Context;
use picobuild::{
    ArtifactKind, Language, PackageScope, PkgConfig, Session, System, Target, invoke, linker,
};
use tracing::info;

mod cli;

use cli::{BuildArgs, Command, Kind};

fn main() -> ExitCode {
    let args = cli::parse();
    picobuild::init_logging();
    picobuild::guard(|| run(args.command))
}

fn run(command: Command) -> anyhow::Result<()> {
    let session = Session::new(System);
    match command {
        Command::Run { script, args } => {
            invoke::invoke(&session, &script, &args)
                .with_context(|| format!("Failed to run {}", script.display()))?;
        }
        Command::Walk { dir, script, args } => {
            let count = invoke::invoke_all(&session, &dir, &script, &args)?;
            info!("Ran {count} build programs under {}", dir.display());
        }
        Command::Build(args) => build(&session, args)?,
        Command::Clean { build_dir } => {
            Target::new("clean").build_dir(&build_dir).clean()?;
            info!("Removed {}", build_dir.display());
        }
        Command::Tools => tools(&session),
    }
    Ok(())
}

fn build(session: &Session, args: BuildArgs) -> anyhow::Result<()> {
    let mut target = Target::new(&args.name);
    target.build_dir(&args.build_dir).kind(match args.kind {
        Kind::Executable => ArtifactKind::Executable,
        Kind::Shared => ArtifactKind::SharedLibrary,
        Kind::Static => ArtifactKind::StaticLibrary,
    });
    if args.no_compile_commands {
        target.compile_commands(None::<&str>);
    }

    for dir in &args.source_dirs {
        target.add_source_dir(dir)?;
    }
    target.add_sources(&args.files);
    if target.sources().is_empty() {
        anyhow::bail!("No sources given for {}", args.name);
    }

    if let Some(standard) = &args.standard {
        if standard.contains("++") {
            target.cxx_std(standard);
        } else {
            target.c_std(standard);
        }
    }
    if let Some(level) = &args.optimize {
        target.optimize(level);
    }
    if args.debug {
        target.debug_info();
    }

    let pkg_config = PkgConfig::new(session.runtime());
    for name in &args.packages {
        let package = pkg_config.find(name)?;
        target.add_package(&package, PackageScope::Both);
    }

    let artifact = target.build(session)?;
    println!("{}", artifact.display());
    Ok(())
}

fn tools(session: &Session) {
    let runtime = session.runtime();
    let pkg_config = PkgConfig::new(runtime);
    let tools = [
        ("C compiler", Language::C.compiler(runtime)),
        ("C++ compiler", Language::Cxx.compiler(runtime)),
        ("Rust compiler", Language::Rust.compiler(runtime)),
        ("Archiver", linker::archiver(runtime)),
        ("Package locator", vec![pkg_config.tool().to_string()]),
    ];

    for (role, command) in tools {
        let location = command
            .first()
            .and_then(|program| which::which(program).ok())
            .map_or_else(|| "not found".to_string(), |path| path.display().to_string());
        println!("{role}: {} ({location})", command.join(" "));
    }
    println!(
        "Package locator available: {}",
        if pkg_config.is_available() { "yes" } else { "no" }
    );
}
