//! CLI driver: reads one or more source files, runs the full
//! preprocess → lex → parse → check → generate pipeline, and writes the
//! resulting assembly listing to `--output` (or stdout).
//!
//! Thin by design (spec.md §6): all compiler behavior lives in the
//! library; this binary only owns argument parsing, logging setup, and
//! exit-code mapping for the driver contract.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use ikac::codegen::TargetOs;
use ikac::diagnostic::{self, Level};
use ikac::types::source::SourceState;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    Linux,
    Windows,
}

impl From<Target> for TargetOs {
    fn from(t: Target) -> Self {
        match t {
            Target::Linux => TargetOs::Linux,
            Target::Windows => TargetOs::Windows,
        }
    }
}

/// Ahead-of-time compiler for a small C-like systems language, emitting
/// x86-32 AT&T assembly.
#[derive(Parser, Debug)]
#[command(name = "ikac", version, about)]
struct Cli {
    /// Source file to compile. Only one translation unit per invocation;
    /// pass `#include` directives inside the source to pull in more.
    input: PathBuf,

    /// Where to write the generated assembly. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the function to wrap as the program entry point, if the
    /// source doesn't already define one by this name.
    #[arg(long, default_value = "main")]
    entry: String,

    /// Target OS, selecting symbol mangling (underscore prefix on
    /// Windows, stdcall `@<args_size>` suffix on both).
    #[arg(long, value_enum, default_value_t = Target::Linux)]
    target: Target,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ikac: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut src = SourceState::new();
    let target: TargetOs = cli.target.into();

    let output = ikac::compile_file(&mut src, &cli.input, &cli.entry, target).map_err(|e| {
        match (e.pos(), e.message()) {
            (Some(pos), Some(message)) => {
                let rendered = diagnostic::render(Level::Error, &src, pos, message);
                anyhow::anyhow!("{rendered}")
            }
            _ => anyhow::Error::new(e),
        }
    })?;

    match &cli.output {
        Some(path) => {
            fs::write(path, output.assembly).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            std::io::stdout().write_all(output.assembly.as_bytes()).context("writing assembly to stdout")?;
        }
    }
    Ok(())
}
