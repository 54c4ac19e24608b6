use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tickwork_cli::commands;
use tickwork_cli::logging;
use tickwork_cli::RunOptions;

#[derive(Parser)]
#[command(version, about = "Drive tickwork timers from a TOML definition file")]
struct Cli {
    /// Also write logs to this file (rotated at 10 MB)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the definitions and pump frames until all timers finish
    Run {
        #[arg(short, long)]
        definitions: PathBuf,
        #[arg(short, long, default_value_t = 600)]
        frames: u64,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long)]
        time_scale: Option<f64>,
        /// Service config file (defaults to the per-user config)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse and validate a definition file
    Check {
        #[arg(short, long)]
        definitions: PathBuf,
    },
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_file.as_deref());

    match cli.command {
        Commands::Run {
            definitions,
            frames,
            fps,
            time_scale,
            config,
        } => {
            let summary = commands::run(&RunOptions {
                definitions,
                frames,
                fps,
                time_scale,
                config,
            })?;
            commands::print_summary(&summary)
        }
        Commands::Check { definitions } => {
            let count = commands::check(&definitions)?;
            println!("{} timer definitions ok", count);
            Ok(())
        }
    }
}
