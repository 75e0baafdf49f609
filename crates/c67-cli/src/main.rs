//! The `c67` command-line driver.
//!
//! Parses arguments, loads optional C-header constant maps, and runs the
//! parse → emit → link → write pipeline. All diagnostics print as
//! `file:line:col: message` and exit nonzero.

use anyhow::{bail, Context, Result};
use c67_codegen::{compile, CHeaderConstants, CHeaderMap, EmitOptions, Target};
use c67_parser::Parser as C67Parser;
use clap::{Parser, Subcommand};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "c67")]
#[command(about = "C67 ahead-of-time compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to a native executable
    #[command(alias = "b")]
    Build {
        /// Source file (.c67)
        input: PathBuf,
        /// Output path; defaults to the input name without extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Target as <arch>-<os>, e.g. x86_64-linux, arm64-darwin
        #[arg(short, long, default_value = "x86_64-linux")]
        target: String,
        /// C header constants: namespace=path.json (repeatable)
        #[arg(long = "cheader", value_name = "NS=PATH")]
        cheaders: Vec<String>,
        /// Verbose emission and layout logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// List the supported targets
    Targets,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            output,
            target,
            cheaders,
            verbose,
        } => build(&input, output, &target, &cheaders, verbose),
        Commands::Targets => {
            for target in [
                "x86_64-linux",
                "arm64-linux",
                "riscv64-linux",
                "arm64-darwin",
                "x86_64-windows",
            ] {
                println!("{}", target);
            }
            Ok(())
        }
    }
}

fn build(
    input: &Path,
    output: Option<PathBuf>,
    target: &str,
    cheader_args: &[String],
    verbose: bool,
) -> Result<()> {
    let mut logger = env_logger::Builder::from_default_env();
    if verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    let target = Target::parse(target)
        .with_context(|| format!("unknown target '{}'", target))
        .and_then(|t| {
            if t.is_supported() {
                Ok(t)
            } else {
                bail!("target {} has no container format", t)
            }
        })?;

    let cheaders = load_cheaders(cheader_args)?;
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let file = input.display();

    let program = C67Parser::new(&source)
        .and_then(|p| p.parse())
        .map_err(|e| anyhow::anyhow!("{}:{}", file, e))?;
    debug!("parsed {} top-level statements", program.statements.len());

    let mut artifact = compile(&program, target, &cheaders, EmitOptions { verbose })
        .map_err(|e| anyhow::anyhow!("{}:{}", file, e))?;
    let image = c67_object::write_executable(&mut artifact)
        .map_err(|e| anyhow::anyhow!("{}: {}", file, e))?;

    let output = output.unwrap_or_else(|| input.with_extension(""));
    std::fs::write(&output, &image)
        .with_context(|| format!("cannot write {}", output.display()))?;
    make_executable(&output)?;
    debug!("wrote {} ({} bytes)", output.display(), image.len());
    Ok(())
}

fn load_cheaders(args: &[String]) -> Result<CHeaderMap> {
    let mut map = CHeaderMap::default();
    for arg in args {
        let (namespace, path) = arg
            .split_once('=')
            .with_context(|| format!("--cheader wants NS=PATH, got '{}'", arg))?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read header map {}", path))?;
        let constants: CHeaderConstants = serde_json::from_str(&text)
            .with_context(|| format!("bad header map {}", path))?;
        map.insert(namespace.to_string(), constants);
    }
    Ok(map)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cheader_argument_shape() {
        assert!(load_cheaders(&["broken".to_string()]).is_err());
        assert!(load_cheaders(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_target_parsing() {
        assert!(Target::parse("x86_64-linux").is_some());
        assert!(Target::parse("arm64-darwin").is_some());
        assert!(Target::parse("sparc-solaris").is_none());
        // Parseable but without a container.
        let t = Target::parse("riscv64-windows").unwrap();
        assert!(!t.is_supported());
    }
}
