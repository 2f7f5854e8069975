//! # docqa CLI
//!
//! Ask questions about your own documents. Answers are generated only from
//! retrieved passages; when the closest passage is too far from the
//! question, docqa says it does not know instead of guessing.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa index <PATHS>...` | Extract, chunk and embed documents; report per file |
//! | `docqa ask "<question>" --docs <PATHS>...` | Index documents and answer one question |
//! | `docqa chat --docs <PATHS>...` | Index once, answer questions from stdin |
//!
//! ## Examples
//!
//! ```bash
//! docqa index ./policies --dry-run
//! docqa ask "How long is the refund window?" --docs ./policies --top-k 3
//! docqa chat --docs handbook.pdf faq.docx --threshold 1.0
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docqa::config::{self, DISTANCE_THRESHOLD_RANGE, TOP_K_RANGE};
use docqa::{ask, ingest, logging};

/// docqa: grounded question answering over local documents.
///
/// Configuration is read from `--config`, or `./config/docqa.toml` when it
/// exists. See `config/docqa.example.toml` for every option.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents and report what was indexed or skipped.
    Index {
        /// Files or directories (pdf, txt, md, csv, docx).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Extract and chunk only; no embedding backend is contacted.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer one question from the given documents.
    Ask {
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer questions read from stdin, one per line, until EOF.
    Chat {
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
}

#[derive(clap::Args)]
struct RetrievalArgs {
    /// Documents to index before answering.
    #[arg(long, num_args = 1.., required = true)]
    docs: Vec<PathBuf>,

    /// Number of chunks to retrieve (1-10).
    #[arg(long, value_parser = parse_top_k)]
    top_k: Option<usize>,

    /// Maximum squared L2 distance of the closest chunk (0.1-5.0).
    #[arg(long, value_parser = parse_threshold)]
    threshold: Option<f32>,
}

impl RetrievalArgs {
    fn apply(&self, cfg: &mut config::Config) {
        if let Some(top_k) = self.top_k {
            cfg.retrieval.top_k = top_k;
        }
        if let Some(threshold) = self.threshold {
            cfg.retrieval.distance_threshold = threshold;
        }
    }
}

fn parse_top_k(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a whole number", s))?;
    if !TOP_K_RANGE.contains(&value) {
        return Err(format!(
            "must be between {} and {}",
            TOP_K_RANGE.start(),
            TOP_K_RANGE.end()
        ));
    }
    Ok(value)
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !DISTANCE_THRESHOLD_RANGE.contains(&value) {
        return Err(format!(
            "must be between {} and {}",
            DISTANCE_THRESHOLD_RANGE.start(),
            DISTANCE_THRESHOLD_RANGE.end()
        ));
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut cfg = config::resolve_config(cli.config.as_deref())?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Index { paths, dry_run } => {
            ingest::run_index(&cfg, &paths, dry_run).await?;
        }
        Commands::Ask {
            question,
            retrieval,
            json,
        } => {
            retrieval.apply(&mut cfg);
            ask::run_ask(&cfg, &retrieval.docs, &question, json).await?;
        }
        Commands::Chat { retrieval } => {
            retrieval.apply(&mut cfg);
            ask::run_chat(&cfg, &retrieval.docs).await?;
        }
    }

    Ok(())
}
