#![forbid(unsafe_code)]
//! # chat_galaxy
//!
//! Turns an exported chat transcript into an annotated message stream and a keyword
//! co-occurrence graph, ready for a spatial visualization frontend.
//!
//! The pipeline runs in a single batch pass:
//! 1. [`normalize`](normalize::normalize) filters placeholder and empty messages
//!    and converts timestamps to epoch seconds.
//! 2. [`schedule`](schedule::schedule) splits the messages into contiguous chunks
//!    and annotates them on a bounded worker pool.
//! 3. [`merge`](merge::merge) stitches the chunks back together in document order,
//!    rebasing keyword indices and assigning sender ids.
//! 4. [`build_graph`](graph::build_graph) picks keyword nodes and co-occurrence
//!    links using thresholds scaled to the corpus size.
//! 5. [`assemble`](artifact::assemble) packages everything into one [`Artifact`].
//!
//! ## Example
//! ```
//! use chat_galaxy::{FallbackAnnotator, PipelineConfig, run_json};
//!
//! let input = r#"{"messages": [
//!     {"content": {"text": "hello there"}, "sender": {"name": "amy"}, "timestamp": 1704508800}
//! ]}"#;
//! let report = run_json(input, &FallbackAnnotator, &PipelineConfig::default()).unwrap();
//! assert_eq!(report.artifact.messages.len(), 1);
//! assert_eq!(report.artifact.meta.senders, vec!["amy".to_string()]);
//! ```

pub mod annotate;
pub mod artifact;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod merge;
pub mod normalize;
pub mod schedule;
pub mod service;

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

pub use annotate::{
    Annotation, Annotator, AnnotatorKind, FallbackAnnotator, LexiconAnnotator, Sentiment,
};
pub use artifact::{Artifact, OutputFormat};
pub use config::PipelineConfig;
pub use error::{AnnotationError, Diagnostic, PipelineError, Result};
pub use graph::Thresholds;
pub use normalize::RawMessage;

/// Suffix of every written artifact, also used to skip earlier outputs when walking
/// a directory.
pub const OUTPUT_SUFFIX: &str = "_chat_data";

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub artifact: Artifact,
    pub thresholds: Thresholds,
    /// Non-fatal issues, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of processing one input file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub messages: usize,
    pub nodes: usize,
    pub links: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs every stage over already-parsed raw messages.
pub fn run_pipeline(
    raw: &[RawMessage],
    annotator: &dyn Annotator,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    run_pipeline_with_workers(raw, annotator, config, schedule::worker_count(config))
}

/// [`run_pipeline`] with an explicit worker count, capped by `config.max_workers`.
/// The output does not depend on it.
pub fn run_pipeline_with_workers(
    raw: &[RawMessage],
    annotator: &dyn Annotator,
    config: &PipelineConfig,
    workers: usize,
) -> Result<PipelineReport> {
    let normalized = normalize::normalize(raw, config);
    let mut diagnostics = normalized.diagnostics;
    if normalized.messages.is_empty() {
        warn!("No messages left after filtering {} records", raw.len());
        diagnostics.push(Diagnostic::EmptyResult);
    }

    let chunks = schedule::schedule_with_workers(&normalized.messages, annotator, config, workers)?;
    let mut merged = merge::merge(chunks)?;
    diagnostics.append(&mut merged.diagnostics);

    let graph = graph::build_graph(&merged.keywords, &merged.messages, config);
    let thresholds = graph.thresholds;
    Ok(PipelineReport {
        artifact: artifact::assemble(merged, graph),
        thresholds,
        diagnostics,
    })
}

/// Parses an input document and runs the pipeline on it.
pub fn run_json(
    json: &str,
    annotator: &dyn Annotator,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    let raw = normalize::parse_input(json)?;
    info!("Loaded {} raw messages", raw.len());
    run_pipeline(&raw, annotator, config)
}

/// Returns `path` itself if it is a file, otherwise every `.json` file below it,
/// sorted, excluding previously written artifacts.
pub fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "json")
                && !p
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.ends_with(OUTPUT_SUFFIX))
        })
        .collect();
    files.sort();
    files
}

/// Where the artifact for `input` goes.
///
/// With `output` naming a file (and a single input) the artifact is written there.
/// Otherwise it is written as `<stem>_chat_data.<ext>` into `output` or the working
/// directory, below the same subdirectories `input` has relative to `root`, so
/// exports sharing a file name in different folders do not overwrite each other.
pub fn output_path_for(
    input: &Path,
    root: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    single_input: bool,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chat".to_string());
    let name = format!("{stem}{OUTPUT_SUFFIX}.{}", format.extension());
    let relative_dir = input
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    match output {
        Some(out) if single_input && !out.is_dir() => out.to_path_buf(),
        Some(dir) => dir.join(relative_dir).join(name),
        None => relative_dir.join(name),
    }
}

/// Renders the artifact and writes it to `path`, creating parent directories.
pub fn write_artifact(artifact: &Artifact, format: OutputFormat, path: &Path) -> Result<PathBuf> {
    let rendered = artifact.render(format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, rendered)?;
    Ok(path.to_path_buf())
}

/// Reads one input file, runs the pipeline and writes the artifact to `output`.
pub fn process_file(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    annotator: &dyn Annotator,
    config: &PipelineConfig,
) -> Result<FileReport> {
    info!("Processing {}", input.display());
    let json = fs::read_to_string(input)?;
    let report = run_json(&json, annotator, config)?;
    let output = write_artifact(&report.artifact, format, output)?;
    info!("Saved {}", output.display());
    Ok(FileReport {
        input: input.to_path_buf(),
        output,
        messages: report.artifact.messages.len(),
        nodes: report.artifact.graph.nodes.len(),
        links: report.artifact.graph.links.len(),
        diagnostics: report.diagnostics,
    })
}

/// Prints a short summary of recovered issues to stderr.
pub fn print_diagnostics(input: &Path, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    eprintln!(
        "\n{} issue(s) while processing {}:",
        diagnostics.len(),
        input.display()
    );
    for d in diagnostics.iter().take(20) {
        eprintln!("  - {d}");
    }
    if diagnostics.len() > 20 {
        eprintln!("  ... and {} more", diagnostics.len() - 20);
    }
}
