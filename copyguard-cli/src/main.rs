//! Copyguard CLI - fingerprinting and policy checks for operators.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (unknown media type or policy)
  65  Data error (malformed hash code, undecodable image)
  66  Input file cannot be read
  70  Internal error (policy engine defect)";

#[derive(Parser)]
#[command(name = "copyguard")]
#[command(author, version, about = "Copyright match fingerprinting and policy checks", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the perceptual hash (or text simHash) of local files
    Fingerprint {
        /// Files to fingerprint
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Treat files as UTF-8 text and compute a simHash
        #[arg(long)]
        text: bool,
    },

    /// Score query hash codes against a candidate's hash codes
    Score {
        /// image, video, audio or text
        #[arg(long, default_value = "image")]
        media_type: String,

        /// Query hash code (repeatable)
        #[arg(long = "query", value_name = "HEX", required = true)]
        query: Vec<String>,

        /// Candidate hash code (repeatable)
        #[arg(long = "candidate", value_name = "HEX", required = true)]
        candidate: Vec<String>,
    },

    /// Evaluate the policy engine for a similarity score
    Decide {
        /// image, video, audio or text
        #[arg(long, default_value = "image")]
        media_type: String,

        /// Similarity score in [0, 1]
        #[arg(long)]
        score: f64,

        /// block, track or allow
        #[arg(long)]
        policy: String,
    },

    /// Fingerprint two files and decide as if one were a protected reference
    Compare {
        /// Content to check
        #[arg(value_name = "CONTENT")]
        content: PathBuf,

        /// Protected reference work
        #[arg(value_name = "REFERENCE")]
        reference: PathBuf,

        /// Compare as UTF-8 text instead of images
        #[arg(long)]
        text: bool,

        /// Policy attached to the reference
        #[arg(long, default_value = "block")]
        policy: String,
    },
}

fn init_tracing(verbose: bool) {
    if !verbose {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copyguard=debug,copyguard_core=debug".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Fingerprint { files, text } => commands::fingerprint::execute(files, text, json),
        Commands::Score {
            media_type,
            query,
            candidate,
        } => commands::score::execute(media_type, query, candidate, json),
        Commands::Decide {
            media_type,
            score,
            policy,
        } => commands::decide::execute(media_type, score, policy, json),
        Commands::Compare {
            content,
            reference,
            text,
            policy,
        } => commands::compare::execute(content, reference, text, policy, json),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
