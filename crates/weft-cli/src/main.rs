//! weft CLI: batch simulation, resume, and output inspection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weft_types::constants;

mod commands;

#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about = "weft: adaptive cloth simulation driver")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene from the start.
    Run {
        /// Path to the scene file (JSON).
        scene: PathBuf,

        /// Directory to write frames into. Nothing is saved without one.
        out_dir: Option<PathBuf>,

        /// Stop after this many frames.
        #[arg(short, long, default_value_t = constants::DEFAULT_NUM_FRAMES)]
        frames: u32,
    },

    /// Continue a run from a saved frame.
    Resume {
        /// Output directory of the interrupted run.
        out_dir: PathBuf,

        /// Frame to resume from.
        frame: u32,
    },

    /// Check a scene file without running it.
    Validate {
        /// Path to the scene file (JSON).
        scene: PathBuf,
    },

    /// Print statistics of a saved frame.
    Inspect {
        /// Output directory of a run.
        out_dir: PathBuf,

        /// Frame to inspect.
        frame: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            scene,
            out_dir,
            frames,
        } => commands::run(&scene, out_dir.as_deref(), frames),
        Commands::Resume { out_dir, frame } => commands::resume(&out_dir, frame),
        Commands::Validate { scene } => commands::validate(&scene),
        Commands::Inspect { out_dir, frame } => commands::inspect(&out_dir, frame),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
