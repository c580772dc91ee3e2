use std::any::Any;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use log::{debug, info};
use rayon::prelude::*;

use crate::annotate::{Annotator, Sentiment, annotate_message};
use crate::config::PipelineConfig;
use crate::error::{Diagnostic, PipelineError, Result};
use crate::index::KeywordIndex;
use crate::normalize::NormalizedMessage;

/// An annotated message still carrying its chunk-local index and sender name.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMessage {
    pub index: usize,
    pub sender: String,
    pub timestamp: f64,
    pub text: String,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
}

/// Everything one worker produced for its chunk, returned in one piece.
#[derive(Debug, Clone, Default)]
pub struct ChunkResult {
    /// Position of the chunk in document order.
    pub chunk: usize,
    /// Global index of the chunk's first message.
    pub start: usize,
    pub messages: Vec<ChunkMessage>,
    /// Indices are local to the chunk.
    pub keywords: KeywordIndex,
    pub senders: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Pool size: available parallelism, capped by `config.max_workers`, at least 1.
pub fn worker_count(config: &PipelineConfig) -> usize {
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4);
    available.min(config.max_workers).max(1)
}

/// Splits `0..len` into at most `workers` contiguous ranges of `ceil(len / workers)`.
/// Empty trailing ranges are not produced.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunk_size = len.div_ceil(workers.max(1));
    (0..workers.max(1))
        .map(|i| (i * chunk_size)..((i + 1) * chunk_size).min(len))
        .take_while(|r| r.start < r.end)
        .collect()
}

/// Annotates one chunk sequentially.
pub fn process_chunk(
    chunk: usize,
    start: usize,
    messages: &[NormalizedMessage],
    annotator: &dyn Annotator,
    config: &PipelineConfig,
) -> ChunkResult {
    let mut result = ChunkResult {
        chunk,
        start,
        ..ChunkResult::default()
    };
    for msg in messages {
        let (annotation, diagnostic) = annotate_message(annotator, msg.index, &msg.text, config);
        result.diagnostics.extend(diagnostic);
        let local = result.messages.len();
        for keyword in &annotation.keywords {
            result.keywords.record(keyword, local);
        }
        result.senders.insert(msg.sender.clone());
        result.messages.push(ChunkMessage {
            index: local,
            sender: msg.sender.clone(),
            timestamp: msg.timestamp,
            text: msg.text.clone(),
            sentiment: annotation.sentiment,
            keywords: annotation.keywords,
        });
    }
    debug!(
        "Chunk {chunk} done: {} messages, {} keywords",
        result.messages.len(),
        result.keywords.len()
    );
    result
}

/// Runs [`process_chunk`] over every chunk on a pool of [`worker_count`] threads.
pub fn schedule(
    messages: &[NormalizedMessage],
    annotator: &dyn Annotator,
    config: &PipelineConfig,
) -> Result<Vec<ChunkResult>> {
    schedule_with_workers(messages, annotator, config, worker_count(config))
}

/// Like [`schedule`] with an explicit worker count, still capped by
/// `config.max_workers`.
///
/// Results come back in chunk order no matter which worker finishes first. A panic
/// in any worker fails the whole call.
pub fn schedule_with_workers(
    messages: &[NormalizedMessage],
    annotator: &dyn Annotator,
    config: &PipelineConfig,
    workers: usize,
) -> Result<Vec<ChunkResult>> {
    let workers = workers.clamp(1, config.max_workers.max(1));
    let ranges = partition(messages.len(), workers);
    info!(
        "Annotating {} messages in {} chunks with {} workers ({} annotator)",
        messages.len(),
        ranges.len(),
        workers,
        annotator.name()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("annotate-{i}"))
        .build()?;

    pool.install(|| {
        ranges
            .into_par_iter()
            .enumerate()
            .map(|(chunk, range)| {
                let start = range.start;
                panic::catch_unwind(AssertUnwindSafe(|| {
                    process_chunk(chunk, start, &messages[range], annotator, config)
                }))
                .map_err(|payload| PipelineError::Worker {
                    chunk,
                    reason: panic_message(payload.as_ref()),
                })
            })
            .collect::<Result<Vec<_>>>()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
