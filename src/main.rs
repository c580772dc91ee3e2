#![forbid(unsafe_code)]
//! # chat_galaxy CLI
//!
//! Command-line front end for the `chat_galaxy` crate. It turns exported chat
//! transcripts (`{"messages": [...]}` JSON) into visualization artifacts.
//!
//! ## Features
//! - Process a single export or every `.json` export below a directory.
//! - Write plain JSON or a `window.CHAT_DATA = ...;` script.
//! - Tune keywords per message, worker count, ranking size and stopwords.
//! - Annotate a loose batch request (`--annotate-batch`) and print the response.
//!
//! ## Example
//! ```bash
//! RUST_LOG=info cargo run --release -- path/to/data.json --format js --output web/data.js
//! ```
//!
//! See `--help` for all available options.

use clap::Parser;
use log::error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chat_galaxy::service::{self, BatchResponse};
use chat_galaxy::{
    AnnotatorKind, OutputFormat, PipelineConfig, collect_files, output_path_for,
    print_diagnostics, process_file,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Chat export file, or directory of exports, to process
    path: String,

    /// Output file (single input) or directory (several inputs)
    #[arg(long)]
    output: Option<String>,

    /// Output format (json, js)
    #[arg(long, default_value = "json")]
    format: OutputFormat,

    /// Optional path to additional stopword file (.txt, one word per line)
    #[arg(long)]
    stopwords: Option<String>,

    /// Maximum keywords kept per message
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Upper bound for parallel workers (also capped by available CPUs)
    #[arg(long, default_value_t = 8)]
    max_workers: usize,

    /// Only process the last N messages of each export
    #[arg(long)]
    max_messages: Option<usize>,

    /// Number of keywords exported in the ranking list
    #[arg(long, default_value_t = 100)]
    ranking_size: usize,

    /// Skip text analysis: every message is neutral without keywords (default: false)
    #[arg(long, default_value_t = false)]
    fallback: bool,

    /// Stem Latin-script keywords for the detected language (default: false)
    #[arg(long, default_value_t = false)]
    stem: bool,

    /// Treat PATH as a batch annotation request and print the response as JSON
    #[arg(long, default_value_t = false)]
    annotate_batch: bool,
}

impl Cli {
    fn config(&self) -> chat_galaxy::Result<PipelineConfig> {
        let config = PipelineConfig {
            top_k: self.top_k,
            max_workers: self.max_workers,
            ranking_size: self.ranking_size,
            max_messages: self.max_messages,
            stem: self.stem,
            ..PipelineConfig::default()
        };
        match &self.stopwords {
            Some(path) => config.with_stopword_file(path),
            None => Ok(config),
        }
    }

    fn annotator_kind(&self) -> AnnotatorKind {
        if self.fallback {
            AnnotatorKind::Fallback
        } else {
            AnnotatorKind::Lexicon
        }
    }
}

fn run_batch(cli: &Cli, config: &PipelineConfig) -> bool {
    let response = match fs::read_to_string(&cli.path) {
        Ok(body) => match service::parse_batch_request(&body) {
            Ok(request) => {
                let annotator = cli.annotator_kind().build(config);
                service::process_batch(annotator.as_ref(), request, config)
            }
            Err(response) => response,
        },
        Err(e) => {
            error!("Error reading {}: {}", cli.path, e);
            return false;
        }
    };
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("Error: {}", e);
            return false;
        }
    }
    matches!(response, BatchResponse::Success { .. })
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };

    if cli.annotate_batch {
        if !run_batch(&cli, &config) {
            process::exit(1);
        }
        return;
    }

    let root = Path::new(&cli.path);
    let files = collect_files(root);
    if files.is_empty() {
        error!("No input files found at {}", cli.path);
        process::exit(1);
    }

    let annotator = cli.annotator_kind().build(&config);
    let output = cli.output.as_ref().map(PathBuf::from);
    let single = files.len() == 1;
    let mut any_errors = false;
    for file in files {
        let target = output_path_for(&file, root, output.as_deref(), cli.format, single);
        match process_file(&file, &target, cli.format, annotator.as_ref(), &config) {
            Ok(report) => {
                println!(
                    "{} -> {} ({} messages, {} nodes, {} links)",
                    report.input.display(),
                    report.output.display(),
                    report.messages,
                    report.nodes,
                    report.links
                );
                print_diagnostics(&report.input, &report.diagnostics);
            }
            Err(e) => {
                error!("Error processing {}: {}", file.display(), e);
                any_errors = true;
            }
        }
    }
    if any_errors {
        process::exit(1);
    }
}
