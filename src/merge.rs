use std::collections::{BTreeSet, HashMap};

use log::info;

use crate::annotate::Sentiment;
use crate::error::{Diagnostic, PipelineError, Result};
use crate::index::KeywordIndex;
use crate::schedule::ChunkResult;

/// Final in-memory message record. Serialized as a compact tuple in the artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedMessage {
    pub index: usize,
    pub sender_id: usize,
    pub timestamp: f64,
    pub text: String,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub messages: Vec<AnnotatedMessage>,
    pub keywords: KeywordIndex,
    /// Sorted; a sender's id is its position here.
    pub senders: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Concatenates chunk results into the global message list and keyword index.
///
/// Chunks must arrive in document order: each one has to start where the previous
/// one ended, otherwise rebasing would corrupt indices and `ChunkOrder` is returned.
pub fn merge(chunks: Vec<ChunkResult>) -> Result<Merged> {
    let mut sender_set = BTreeSet::new();
    for chunk in &chunks {
        sender_set.extend(chunk.senders.iter().cloned());
    }
    let senders: Vec<String> = sender_set.into_iter().collect();
    let sender_ids: HashMap<&str, usize> = senders
        .iter()
        .enumerate()
        .map(|(id, name)| (name.as_str(), id))
        .collect();

    let total = chunks.iter().map(|c| c.messages.len()).sum();
    let mut messages = Vec::with_capacity(total);
    let mut keywords = KeywordIndex::new();
    let mut diagnostics = Vec::new();
    let mut base = 0usize;

    for chunk in chunks {
        if chunk.start != base {
            return Err(PipelineError::ChunkOrder {
                expected: base,
                found: chunk.start,
            });
        }
        let count = chunk.messages.len();
        keywords.extend_rebased(chunk.keywords, base);
        messages.extend(chunk.messages.into_iter().map(|m| AnnotatedMessage {
            index: m.index + base,
            sender_id: sender_ids.get(m.sender.as_str()).copied().unwrap_or(0),
            timestamp: m.timestamp,
            text: m.text,
            sentiment: m.sentiment,
            keywords: m.keywords,
        }));
        diagnostics.extend(chunk.diagnostics);
        base += count;
    }

    info!(
        "Merged {} messages, {} keywords, {} senders",
        messages.len(),
        keywords.len(),
        senders.len()
    );
    Ok(Merged {
        messages,
        keywords,
        senders,
        diagnostics,
    })
}
