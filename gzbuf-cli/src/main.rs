//! gzbuf CLI - whole-buffer gzip from the command line.

mod commands;
mod utils;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "GZBUF_LOG";

#[derive(Parser)]
#[command(name = "gzbuf")]
#[command(author, version, about = "Whole-buffer gzip compression and decompression")]
#[command(long_about = "
gzbuf reads a whole file (or stdin) into memory and writes it back as a single
gzip member, or the reverse.

Examples:
  gzbuf compress notes.txt
  gzbuf compress -l 9 -k notes.txt
  gzbuf decompress notes.txt.gz
  cat data | gzbuf compress - > data.gz
  gzbuf info --json notes.txt.gz
  gzbuf completions bash
")]
struct Cli {
    /// Log engine activity (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file to FILE.gz
    #[command(alias = "c")]
    Compress {
        /// Input file, or - for stdin
        input: PathBuf,

        /// Output file (defaults to INPUT.gz, or stdout for stdin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression level 0-9 (-1 for the default)
        #[arg(short, long, allow_negative_numbers = true)]
        level: Option<i32>,

        /// Keep the input file
        #[arg(short, long)]
        keep: bool,

        /// Overwrite existing output without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress FILE.gz
    #[command(alias = "d")]
    Decompress {
        /// Input file, or - for stdin
        input: PathBuf,

        /// Output file (defaults to INPUT without .gz, or stdout for stdin)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the input file
        #[arg(short, long)]
        keep: bool,

        /// Overwrite existing output without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Show gzip header fields and sizes
    #[command(alias = "i")]
    Info {
        /// gzip file to inspect
        input: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            level,
            keep,
            force,
        } => commands::cmd_compress(&input, output.as_deref(), level, keep, force),
        Commands::Decompress {
            input,
            output,
            keep,
            force,
        } => commands::cmd_decompress(&input, output.as_deref(), keep, force),
        Commands::Info { input, json } => commands::cmd_info(&input, json),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "gzbuf", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
