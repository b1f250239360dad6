use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum Kind {
    /// Linked executable
    #[default]
    Executable,

    /// Shared library
    Shared,

    /// Static archive
    Static,
}

#[derive(Parser, Debug)]
#[command(name = "picobuild")]
#[command(about = "A minimal self-rebuilding build orchestrator")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a child build program from its own directory
    Run {
        /// Source of the child build program
        script: PathBuf,

        /// Arguments passed to the child
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run the build program of every subdirectory
    Walk {
        /// Directory whose subdirectories are visited
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// File name of the build program in each subdirectory
        #[arg(long, value_name = "file", default_value = "oinb.cc")]
        script: String,

        /// Arguments passed to every child
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Build a target from sources given on the command line
    Build(BuildArgs),

    /// Remove a build directory
    Clean {
        /// Build directory
        #[arg(long, value_name = "dir", default_value = "build")]
        build_dir: PathBuf,
    },

    /// Show the tools picked up from the environment
    Tools,
}

#[derive(ClapArgs, Debug)]
pub struct BuildArgs {
    /// Artifact name
    pub name: String,

    /// Source directories, walked recursively (can be used multiple times)
    #[arg(long = "src", value_name = "dir")]
    pub source_dirs: Vec<PathBuf>,

    /// Source files (can be used multiple times)
    #[arg(long = "file", value_name = "file")]
    pub files: Vec<PathBuf>,

    /// Build directory
    #[arg(long, value_name = "dir", default_value = "build")]
    pub build_dir: PathBuf,

    /// Artifact kind
    #[arg(long, value_name = "kind", default_value = "executable")]
    pub kind: Kind,

    /// Packages resolved with pkg-config (can be used multiple times)
    #[arg(long = "package", value_name = "name")]
    pub packages: Vec<String>,

    /// Language standard, e.g. c11 or c++20
    #[arg(long = "std", value_name = "standard")]
    pub standard: Option<String>,

    /// Optimization level
    #[arg(short = 'O', value_name = "level")]
    pub optimize: Option<String>,

    /// Emit debug information
    #[arg(short = 'g')]
    pub debug: bool,

    /// Do not write compile_commands.json
    #[arg(long)]
    pub no_compile_commands: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
