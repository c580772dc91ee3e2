use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Generic filler terms never worth a graph node: media placeholders, function words,
/// chat acknowledgements and URL fragments.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "图片", "表情", "语音", "视频", "通话", "位置", "文件", "引用", "现在", "可以", "知道",
    "觉得", "感觉", "时候", "什么", "怎么", "因为", "所以", "虽然", "但是", "如果", "就是",
    "还是", "那个", "这个", "一个", "一下", "一点", "一些", "已经", "可能", "真的", "没有",
    "不是", "不用", "不要", "不好", "不行", "不错", "好吧", "好的", "收到", "嗯嗯", "哈哈",
    "嘻嘻", "呵呵", "哦哦", "嘿嘿", "ok", "http", "https", "www", "com", "cn",
];

/// Immutable settings shared read-only by every pipeline stage and worker.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum keywords kept per message.
    pub top_k: usize,
    /// Upper bound for the worker pool, further capped by available parallelism.
    pub max_workers: usize,
    /// Length of the keyword ranking exported for display.
    pub ranking_size: usize,
    /// Keep only the last N raw records, if set.
    pub max_messages: Option<usize>,
    /// Lowercased stop words removed from every keyword list.
    pub stop_words: HashSet<String>,
    /// Stem Latin-script keywords in the lexicon annotator.
    pub stem: bool,
    /// Largest batch accepted by the batch annotation adapter.
    pub max_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_workers: 8,
            ranking_size: 100,
            max_messages: None,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            stem: false,
            max_batch: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(&word.to_lowercase())
    }

    /// Adds the words from a stopword file to the built-in list.
    pub fn with_stopword_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.stop_words.extend(load_stopwords(path)?);
        Ok(self)
    }
}

/// Reads a stopword file: one word per line, blank lines and `#` comments ignored.
pub fn load_stopwords<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| PipelineError::Stopwords {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect())
}
