mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cmd::ConfigArgs;
use output::OutputFormat;

/// Resolve and run templated multi-target image builds
#[derive(Parser)]
#[command(name = "bake")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  config: ConfigArgs,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve the configuration and print the build plan
  Plan {
    /// Groups, targets or jobs to plan (default: the `default` group)
    targets: Vec<String>,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Resolve the configuration and build every job of the plan
  Build {
    /// Groups, targets or jobs to build (default: the `default` group)
    targets: Vec<String>,

    /// Maximum number of concurrent builds (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Keep starting later batches after a failure
    #[arg(short, long)]
    keep_going: bool,

    /// Push images instead of loading them locally
    #[arg(long)]
    push: bool,

    /// Log what would be built without building
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Print the resolved variable environment
  Vars {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Plan { targets, output } => cmd::cmd_plan(&cli.config, &targets, output),
    Commands::Build {
      targets,
      jobs,
      keep_going,
      push,
      dry_run,
      output,
    } => cmd::cmd_build(
      &cli.config,
      &targets,
      &cmd::BuildArgs {
        jobs,
        keep_going,
        push,
        dry_run,
      },
      output,
    ),
    Commands::Vars { output } => cmd::cmd_vars(&cli.config, output),
  };

  match result {
    Ok(code) => code,
    Err(e) => {
      output::print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
