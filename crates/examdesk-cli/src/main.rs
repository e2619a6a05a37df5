//! examdesk CLI: take a timed multiple-choice exam in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "examdesk", version, about = "Timed multiple-choice exams with reliable result delivery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume an exam
    Take {
        /// Candidate name or ID; saved progress is keyed by it
        #[arg(long)]
        candidate: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a question file for authoring problems
    Validate {
        /// Path to a question-set JSON file
        #[arg(long)]
        questions: PathBuf,
    },

    /// Score an answers file offline
    Score {
        /// Path to a question-set JSON file
        #[arg(long)]
        questions: PathBuf,

        /// JSON object mapping question ID to the chosen option
        #[arg(long)]
        answers: PathBuf,

        /// Show the per-question breakdown
        #[arg(long)]
        review: bool,

        /// Config file path (for the marking scheme)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete a candidate's saved progress and any unsent result
    Discard {
        #[arg(long)]
        candidate: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and sample question set
    Init,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("examdesk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take { candidate, config } => commands::take::execute(candidate, config).await,
        Commands::Validate { questions } => commands::validate::execute(questions),
        Commands::Score {
            questions,
            answers,
            review,
            config,
        } => commands::score::execute(questions, answers, review, config),
        Commands::Discard { candidate, config } => commands::discard::execute(candidate, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
