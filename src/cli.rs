use crate::config::VmConfig;
use crate::function::Unit;
use crate::scheduler::Scheduler;
use crate::unit_file;
use crate::value::Value;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glos")]
#[command(about = "Glos - run compiled Glos units", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides glos.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a unit's entry function and print what it returns
    Run {
        /// Unit file (JSON or binary)
        unit: PathBuf,

        /// Integer argument passed to the entry function (repeatable)
        #[arg(long = "arg", allow_negative_numbers = true)]
        args: Vec<i64>,
    },

    /// Convert a unit file to the binary format
    Compile {
        /// Unit file (JSON or binary)
        unit: PathBuf,

        /// Where to write the binary unit
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the effective VM configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

/// Binary units are recognized by their magic number, anything else is JSON
fn load_unit(path: &Path) -> Result<Unit> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read unit file {}", path.display()))?;
    if unit_file::is_binary_unit(&bytes) {
        return unit_file::deserialize(&bytes)
            .with_context(|| format!("Invalid binary unit {}", path.display()));
    }
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid unit file {}", path.display()))
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = VmConfig::builder().config_path(cli.config).build()?;

    match cli.command {
        Commands::Run { unit, args } => {
            let parsed = load_unit(&unit)?;

            let args: Vec<Value> = args.into_iter().map(Value::Integer).collect();
            let mut scheduler = Scheduler::new(config);
            let results = scheduler
                .execute_unit(Rc::new(parsed), Some(args.as_slice()), None)
                .with_context(|| format!("Execution of {} failed", unit.display()))?;

            for value in results {
                println!("{}", scheduler.stringify(&value)?);
            }
        }

        Commands::Compile { unit, output } => {
            let parsed = load_unit(&unit)?;
            std::fs::write(&output, unit_file::serialize(&parsed))
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_accepts_repeated_and_negative_args() {
        let cli = Cli::try_parse_from(["glos", "run", "unit.json", "--arg", "1", "--arg", "-2"])
            .expect("parses");
        match cli.command {
            Commands::Run { unit, args } => {
                assert_eq!(unit, PathBuf::from("unit.json"));
                assert_eq!(args, vec![1, -2]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_compile_requires_output() {
        assert!(Cli::try_parse_from(["glos", "compile", "unit.json"]).is_err());
        let cli = Cli::try_parse_from(["glos", "compile", "unit.json", "-o", "unit.glos"])
            .expect("parses");
        assert!(matches!(cli.command, Commands::Compile { .. }));
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["glos", "config", "--config", "vm.toml"]).expect("parses");
        assert_eq!(cli.config, Some(PathBuf::from("vm.toml")));
        assert!(matches!(cli.command, Commands::Config));
    }
}
