use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;

use crate::annotate::Sentiment;
use crate::error::Result;
use crate::graph::{Graph, GraphLink, GraphNode, LayoutConfig, RankEntry};
use crate::merge::{AnnotatedMessage, Merged};

/// Global the frontend reads when the artifact is embedded as a script.
pub const JS_GLOBAL: &str = "window.CHAT_DATA";

/// Encoding of the written artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain JSON document.
    #[default]
    Json,
    /// `window.CHAT_DATA = {...};` for direct inclusion in a page.
    Js,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Js => "js",
        }
    }
}

// [index, senderId, timestamp, text, sentimentCode, [keywords]]
impl Serialize for AnnotatedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(6)?;
        tuple.serialize_element(&self.index)?;
        tuple.serialize_element(&self.sender_id)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&self.text)?;
        tuple.serialize_element(&self.sentiment.code())?;
        tuple.serialize_element(&self.keywords)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub senders: Vec<String>,
    pub sentiment_map: BTreeMap<String, &'static str>,
    pub layout: LayoutConfig,
    pub ranking: Vec<RankEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub meta: Meta,
    pub messages: Vec<AnnotatedMessage>,
    pub graph: GraphData,
}

/// Sentiment code (as a string key) to label.
pub fn sentiment_legend() -> BTreeMap<String, &'static str> {
    Sentiment::ALL
        .iter()
        .map(|s| (s.code().to_string(), s.label()))
        .collect()
}

/// Packages the merged messages and the graph. No computation happens here.
pub fn assemble(merged: Merged, graph: Graph) -> Artifact {
    Artifact {
        meta: Meta {
            senders: merged.senders,
            sentiment_map: sentiment_legend(),
            layout: graph.layout,
            ranking: graph.ranking,
        },
        messages: merged.messages,
        graph: GraphData {
            nodes: graph.nodes,
            links: graph.links,
        },
    }
}

impl Artifact {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        let json = self.to_json()?;
        Ok(match format {
            OutputFormat::Json => json,
            OutputFormat::Js => format!("{JS_GLOBAL} = {json};"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LayoutConfig, Thresholds};
    use crate::index::KeywordIndex;

    fn sample() -> Artifact {
        let merged = Merged {
            messages: vec![AnnotatedMessage {
                index: 0,
                sender_id: 1,
                timestamp: 1704508800.5,
                text: "今天天气真好".into(),
                sentiment: Sentiment::Happy,
                keywords: vec!["天气".into()],
            }],
            keywords: KeywordIndex::new(),
            senders: vec!["amy".into(), "bob".into()],
            diagnostics: Vec::new(),
        };
        let graph = Graph {
            nodes: Vec::new(),
            links: Vec::new(),
            layout: LayoutConfig::for_nodes(0, 0),
            ranking: vec![RankEntry {
                name: "天气".into(),
                count: 1,
            }],
            thresholds: Thresholds::for_messages(1),
        };
        assemble(merged, graph)
    }

    #[test]
    fn messages_serialize_as_tuples() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(
            json["messages"][0],
            serde_json::json!([0, 1, 1704508800.5, "今天天气真好", 1, ["天气"]])
        );
    }

    #[test]
    fn meta_carries_legend_and_layout() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(
            json["meta"]["sentiment_map"],
            serde_json::json!({"0": "neutral", "1": "happy", "2": "question", "3": "sad"})
        );
        assert_eq!(json["meta"]["layout"]["layout_radius"], 350);
        assert_eq!(json["meta"]["layout"]["star_min"], 525);
        assert_eq!(json["meta"]["ranking"][0]["name"], "天气");
        assert_eq!(json["graph"]["nodes"], serde_json::json!([]));
        assert_eq!(json["graph"]["links"], serde_json::json!([]));
    }

    #[test]
    fn js_format_wraps_json_and_keeps_unicode() {
        let artifact = sample();
        let js = artifact.render(OutputFormat::Js).unwrap();
        assert!(js.starts_with("window.CHAT_DATA = {"));
        assert!(js.ends_with("};"));
        assert!(js.contains("今天天气真好"));
        assert_eq!(
            artifact.render(OutputFormat::Json).unwrap(),
            artifact.to_json().unwrap()
        );
    }
}
