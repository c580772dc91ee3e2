//! Sentiment and keyword annotation.
//!
//! The pipeline only depends on the [`Annotator`] trait. Two providers ship with the
//! crate: [`LexiconAnnotator`], a rule-based analyzer, and [`FallbackAnnotator`],
//! which labels everything neutral. Whatever a provider returns is passed through
//! [`annotate_message`], which enforces the keyword contract and turns failures into
//! neutral defaults.

use std::collections::{HashMap, HashSet};

use log::warn;
use rust_stemmers::{Algorithm, Stemmer};
use whatlang::Lang;

use crate::config::PipelineConfig;
use crate::error::{AnnotationError, Diagnostic};

/// Text containing any of these is a question, whatever its score.
pub const QUESTION_MARKERS: &[&str] = &["?", "？", "什么", "怎么", "为何", "what", "how"];

const SAD_BELOW: f64 = 0.4;
const HAPPY_ABOVE: f64 = 0.6;

const POSITIVE_WORDS: &[&str] = &[
    "好", "棒", "优秀", "厉害", "喜欢", "爱", "开心", "快乐", "高兴", "幸福", "满意", "赞",
    "支持", "感谢", "谢谢", "美好", "精彩", "给力", "加油", "期待", "可爱", "温暖", "舒服",
    "轻松", "愉快", "兴奋", "惊喜", "享受", "满足", "good", "great", "love", "nice", "thanks",
    "happy", "awesome",
];

const NEGATIVE_WORDS: &[&str] = &[
    "不好", "不舒服", "不开心", "不行", "差", "坏", "烂", "糟糕", "讨厌", "烦", "生气", "愤怒",
    "难过", "伤心", "痛苦", "失望", "郁闷", "累", "疲惫", "难受", "失败", "没用", "垃圾", "恶心",
    "害怕", "担心", "焦虑", "下雨", "bad", "sad", "hate", "angry", "tired", "awful",
];

/// Sentiment label, encoded as a small integer in the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sentiment {
    #[default]
    Neutral,
    Happy,
    Question,
    Sad,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Neutral,
        Sentiment::Happy,
        Sentiment::Question,
        Sentiment::Sad,
    ];

    pub fn code(self) -> u8 {
        match self {
            Sentiment::Neutral => 0,
            Sentiment::Happy => 1,
            Sentiment::Question => 2,
            Sentiment::Sad => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sentiment::Neutral => "neutral",
            Sentiment::Happy => "happy",
            Sentiment::Question => "question",
            Sentiment::Sad => "sad",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotation {
    pub sentiment: Sentiment,
    /// Ranked, most relevant first.
    pub keywords: Vec<String>,
}

/// A text-analysis provider. Called concurrently from every worker.
pub trait Annotator: Send + Sync {
    fn annotate(&self, text: &str) -> Result<Annotation, AnnotationError>;

    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Provider choice, made once when the pipeline is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotatorKind {
    #[default]
    Lexicon,
    Fallback,
}

impl AnnotatorKind {
    pub fn build(self, config: &PipelineConfig) -> Box<dyn Annotator> {
        match self {
            AnnotatorKind::Lexicon => Box::new(LexiconAnnotator::new(config)),
            AnnotatorKind::Fallback => Box::new(FallbackAnnotator),
        }
    }
}

/// Question markers override the score; otherwise the score is bucketed.
pub fn classify_sentiment(text: &str, score: f64) -> Sentiment {
    let lower = text.to_lowercase();
    if QUESTION_MARKERS.iter().any(|m| lower.contains(m)) {
        Sentiment::Question
    } else if score < SAD_BELOW {
        Sentiment::Sad
    } else if score > HAPPY_ABOVE {
        Sentiment::Happy
    } else {
        Sentiment::Neutral
    }
}

/// Calls the annotator and enforces the keyword contract on its answer.
///
/// Keywords come back deduplicated, without stop words or single characters, and
/// capped at `config.top_k`. A failing annotator yields a neutral annotation plus a
/// diagnostic; it never aborts the batch.
pub fn annotate_message(
    annotator: &dyn Annotator,
    index: usize,
    text: &str,
    config: &PipelineConfig,
) -> (Annotation, Option<Diagnostic>) {
    match annotator.annotate(text) {
        Ok(annotation) => (
            Annotation {
                sentiment: annotation.sentiment,
                keywords: filter_keywords(annotation.keywords, config),
            },
            None,
        ),
        Err(e) => {
            warn!("Annotation of message {index} failed: {e}");
            (
                Annotation::default(),
                Some(Diagnostic::Annotation {
                    index,
                    reason: e.to_string(),
                }),
            )
        }
    }
}

fn filter_keywords(keywords: Vec<String>, config: &PipelineConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| k.chars().count() > 1 && !config.is_stop_word(k))
        .filter(|k| seen.insert(k.clone()))
        .take(config.top_k)
        .collect()
}

/// Always neutral, never any keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAnnotator;

impl Annotator for FallbackAnnotator {
    fn annotate(&self, _text: &str) -> Result<Annotation, AnnotationError> {
        Ok(Annotation::default())
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Rule-based annotator: lexicon sentiment plus frequency-ranked terms.
///
/// Han runs are cut into character bigrams, other scripts into words. Latin words
/// can optionally be stemmed for the detected language.
pub struct LexiconAnnotator {
    top_k: usize,
    stop_words: HashSet<String>,
    stem: bool,
}

impl LexiconAnnotator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            top_k: config.top_k,
            stop_words: config.stop_words.clone(),
            stem: config.stem,
        }
    }

    /// Lexicon score in [0, 1]; 0.5 when nothing matches.
    pub fn score(text: &str) -> f64 {
        let mut residue = text.to_lowercase();
        let mut negative = 0usize;
        for word in NEGATIVE_WORDS {
            negative += residue.matches(word).count();
            residue = residue.replace(word, " ");
        }
        let positive: usize = POSITIVE_WORDS
            .iter()
            .map(|w| residue.matches(w).count())
            .sum();
        (positive as f64 + 1.0) / ((positive + negative) as f64 + 2.0)
    }

    fn stemmer_for(text: &str) -> Option<Stemmer> {
        let algorithm = match whatlang::detect(text)?.lang() {
            Lang::Eng => Algorithm::English,
            Lang::Deu => Algorithm::German,
            Lang::Fra => Algorithm::French,
            Lang::Spa => Algorithm::Spanish,
            Lang::Ita => Algorithm::Italian,
            Lang::Por => Algorithm::Portuguese,
            Lang::Nld => Algorithm::Dutch,
            Lang::Swe => Algorithm::Swedish,
            Lang::Rus => Algorithm::Russian,
            _ => return None,
        };
        Some(Stemmer::create(algorithm))
    }

    /// Candidate terms in order of appearance.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let stemmer = if self.stem {
            Self::stemmer_for(text)
        } else {
            None
        };
        let mut terms = Vec::new();
        let mut run = String::new();
        let mut run_is_han = false;

        let flush = |run: &mut String, is_han: bool, terms: &mut Vec<String>| {
            if run.is_empty() {
                return;
            }
            if is_han {
                let chars: Vec<char> = run.chars().collect();
                if chars.len() == 1 {
                    terms.push(run.clone());
                }
                terms.extend(chars.windows(2).map(|w| w.iter().collect::<String>()));
            } else {
                let word = run.to_lowercase();
                let term = match &stemmer {
                    Some(s) => s.stem(&word).into_owned(),
                    None => word,
                };
                terms.push(term);
            }
            run.clear();
        };

        for c in text.chars() {
            let han = is_han(c);
            if han || c.is_alphanumeric() {
                if !run.is_empty() && han != run_is_han {
                    flush(&mut run, run_is_han, &mut terms);
                }
                run_is_han = han;
                run.push(c);
            } else {
                flush(&mut run, run_is_han, &mut terms);
            }
        }
        flush(&mut run, run_is_han, &mut terms);
        terms
    }

    /// Most frequent terms first, earliest appearance breaking ties.
    pub fn keywords(&self, text: &str) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (pos, term) in self.segment(text).into_iter().enumerate() {
            if term.chars().count() < 2
                || term.chars().all(|c| c.is_ascii_digit())
                || self.stop_words.contains(&term)
            {
                continue;
            }
            counts.entry(term).or_insert((0, pos)).0 += 1;
        }
        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(self.top_k)
            .map(|(term, _)| term)
            .collect()
    }
}

impl Annotator for LexiconAnnotator {
    fn annotate(&self, text: &str) -> Result<Annotation, AnnotationError> {
        Ok(Annotation {
            sentiment: classify_sentiment(text, Self::score(text)),
            keywords: self.keywords(text),
        })
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Annotator for Failing {
        fn annotate(&self, _text: &str) -> Result<Annotation, AnnotationError> {
            Err(AnnotationError::Unavailable("model not loaded".into()))
        }
    }

    struct Fixed(Vec<&'static str>);

    impl Annotator for Fixed {
        fn annotate(&self, _text: &str) -> Result<Annotation, AnnotationError> {
            Ok(Annotation {
                sentiment: Sentiment::Happy,
                keywords: self.0.iter().map(|k| k.to_string()).collect(),
            })
        }
    }

    #[test]
    fn question_markers_override_score() {
        assert_eq!(classify_sentiment("这个怎么用", 0.9), Sentiment::Question);
        assert_eq!(classify_sentiment("really?", 0.1), Sentiment::Question);
        assert_eq!(classify_sentiment("How are you", 0.5), Sentiment::Question);
    }

    #[test]
    fn score_thresholds_are_exclusive() {
        assert_eq!(classify_sentiment("ok", 0.39), Sentiment::Sad);
        assert_eq!(classify_sentiment("ok", 0.4), Sentiment::Neutral);
        assert_eq!(classify_sentiment("ok", 0.6), Sentiment::Neutral);
        assert_eq!(classify_sentiment("ok", 0.61), Sentiment::Happy);
    }

    #[test]
    fn sentiment_codes_match_legend_order() {
        let codes: Vec<u8> = Sentiment::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
        assert_eq!(Sentiment::Question.label(), "question");
    }

    #[test]
    fn failure_falls_back_to_neutral_with_diagnostic() {
        let config = PipelineConfig::default();
        let (annotation, diag) = annotate_message(&Failing, 7, "随便说说", &config);
        assert_eq!(annotation, Annotation::default());
        assert!(matches!(diag, Some(Diagnostic::Annotation { index: 7, .. })));
    }

    #[test]
    fn keyword_contract_is_enforced() {
        let config = PipelineConfig::default();
        let annotator = Fixed(vec!["天气", "哈哈", "a", "天气", "运动", "公园", "晚饭"]);
        let (annotation, diag) = annotate_message(&annotator, 0, "whatever", &config);
        assert!(diag.is_none());
        assert_eq!(annotation.sentiment, Sentiment::Happy);
        assert_eq!(annotation.keywords, vec!["天气", "运动", "公园"]);
    }

    #[test]
    fn lexicon_scores_negation_as_negative() {
        assert!(LexiconAnnotator::score("今天心情不好") < SAD_BELOW);
        assert!(LexiconAnnotator::score("今天天气真好") > HAPPY_ABOVE);
        assert_eq!(LexiconAnnotator::score("明天开会"), 0.5);
    }

    #[test]
    fn lexicon_segments_han_into_bigrams() {
        let annotator = LexiconAnnotator::new(&PipelineConfig::default());
        assert_eq!(
            annotator.segment("今天天气, ok Rust!"),
            vec!["今天", "天天", "天气", "ok", "rust"]
        );
    }

    #[test]
    fn lexicon_ranks_by_frequency_then_position() {
        let annotator = LexiconAnnotator::new(&PipelineConfig::default());
        let keywords = annotator.keywords("rust code, more rust code, and tests 2024");
        assert_eq!(keywords, vec!["rust", "code", "more"]);
    }

    #[test]
    fn lexicon_stems_latin_words_when_enabled() {
        let config = PipelineConfig {
            stem: true,
            ..PipelineConfig::default()
        };
        let annotator = LexiconAnnotator::new(&config);
        let terms = annotator.segment("The runners were running and jumping over the fences");
        assert!(terms.contains(&"run".to_string()));
        assert!(!terms.contains(&"running".to_string()));
    }

    #[test]
    fn fallback_is_always_neutral() {
        let annotation = FallbackAnnotator.annotate("我很开心").unwrap();
        assert_eq!(annotation.sentiment, Sentiment::Neutral);
        assert!(annotation.keywords.is_empty());
    }
}
