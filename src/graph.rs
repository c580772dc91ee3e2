//! Keyword co-occurrence graph with thresholds that scale with the corpus.
//!
//! Node count grows with the fourth root of the corpus size and is hard-capped at
//! 1000. Occurrence and link floors grow logarithmically, so a larger corpus drops
//! rare noise terms while keeping some of the long tail. The layout radius grows
//! with the square root of the node count to keep node density on the frontend's
//! spherical shell roughly constant.

use std::cmp::Ordering;

use log::{debug, info};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::index::KeywordIndex;
use crate::merge::AnnotatedMessage;

const BASE_MESSAGES: f64 = 5000.0;
const BASE_NODES: f64 = 400.0;
const NODE_CAP: usize = 1000;
const BASE_RADIUS: f64 = 350.0;

/// Selection thresholds derived from the number of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub max_nodes: usize,
    pub min_occurrence: usize,
    pub min_link_weight: usize,
}

impl Thresholds {
    pub fn for_messages(total: usize) -> Self {
        let ratio = (total as f64 / BASE_MESSAGES).max(1.0);
        let max_nodes = ((BASE_NODES * ratio.powf(0.25)).round() as usize).min(NODE_CAP);
        let ln = (total.max(1) as f64).ln();
        Self {
            max_nodes,
            min_occurrence: ((ln * 0.8).round() as usize).max(3),
            min_link_weight: ((ln * 0.4).round() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub value: usize,
    pub category: &'static str,
    pub first_seen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub value: usize,
    pub first_seen: f64,
}

/// Scale parameters for the rendering frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutConfig {
    pub layout_radius: u64,
    pub star_min: u64,
    pub star_max: u64,
    pub max_node_value: usize,
}

impl LayoutConfig {
    pub fn for_nodes(node_count: usize, max_node_value: usize) -> Self {
        let scale = (node_count.max(100) as f64 / BASE_NODES).sqrt();
        let radius = ((BASE_RADIUS * scale).round() as u64).max(BASE_RADIUS as u64);
        Self {
            layout_radius: radius,
            star_min: (radius as f64 * 1.5).round() as u64,
            star_max: (radius as f64 * 4.0).round() as u64,
            max_node_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub layout: LayoutConfig,
    pub ranking: Vec<RankEntry>,
    pub thresholds: Thresholds,
}

/// Keywords by descending count; first-seen order breaks ties.
pub fn rank_keywords(keywords: &KeywordIndex) -> Vec<(&str, &[usize])> {
    let mut ranked: Vec<(&str, &[usize])> = keywords.iter().collect();
    // stable sort keeps first-seen order among equal counts
    ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    ranked
}

/// Number of elements shared by two strictly increasing index lists.
pub fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn earliest(indices: &[usize], messages: &[AnnotatedMessage]) -> f64 {
    indices
        .iter()
        .filter_map(|&i| messages.get(i).map(|m| m.timestamp))
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Selects nodes, computes links and derives layout parameters.
pub fn build_graph(
    keywords: &KeywordIndex,
    messages: &[AnnotatedMessage],
    config: &PipelineConfig,
) -> Graph {
    let thresholds = Thresholds::for_messages(messages.len());
    debug!(
        "Dynamic thresholds for {} messages: max_nodes={}, min_occurrence={}, min_link_weight={}",
        messages.len(),
        thresholds.max_nodes,
        thresholds.min_occurrence,
        thresholds.min_link_weight
    );

    let ranked = rank_keywords(keywords);
    let ranking: Vec<RankEntry> = ranked
        .iter()
        .take(config.ranking_size)
        .map(|(name, indices)| RankEntry {
            name: name.to_string(),
            count: indices.len(),
        })
        .collect();

    let selected: Vec<(&str, &[usize])> = ranked
        .into_iter()
        .filter(|(_, indices)| indices.len() >= thresholds.min_occurrence)
        .take(thresholds.max_nodes)
        .collect();

    let nodes: Vec<GraphNode> = selected
        .iter()
        .map(|(name, indices)| GraphNode {
            id: name.to_string(),
            name: name.to_string(),
            value: indices.len(),
            category: "Keyword",
            first_seen: earliest(indices, messages),
        })
        .collect();

    let mut links = Vec::new();
    for (i, (source, a)) in selected.iter().enumerate() {
        for (target, b) in &selected[i + 1..] {
            let shared = intersect_sorted(a, b);
            if shared.len() >= thresholds.min_link_weight {
                links.push(GraphLink {
                    source: source.to_string(),
                    target: target.to_string(),
                    value: shared.len(),
                    first_seen: earliest(&shared, messages),
                });
            }
        }
    }

    let max_node_value = nodes.iter().map(|n| n.value).max().unwrap_or(0);
    let layout = LayoutConfig::for_nodes(nodes.len(), max_node_value);
    info!(
        "Built graph: {} nodes, {} links, layout radius {}",
        nodes.len(),
        links.len(),
        layout.layout_radius
    );

    Graph {
        nodes,
        links,
        layout,
        ranking,
        thresholds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Sentiment;

    fn message(index: usize, timestamp: f64, keywords: &[&str]) -> AnnotatedMessage {
        AnnotatedMessage {
            index,
            sender_id: 0,
            timestamp,
            text: String::new(),
            sentiment: Sentiment::Neutral,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn index_of(messages: &[AnnotatedMessage]) -> KeywordIndex {
        let mut index = KeywordIndex::new();
        for m in messages {
            for k in &m.keywords {
                index.record(k, m.index);
            }
        }
        index
    }

    #[test]
    fn thresholds_at_reference_size() {
        assert_eq!(
            Thresholds::for_messages(5000),
            Thresholds {
                max_nodes: 400,
                min_occurrence: 7,
                min_link_weight: 3,
            }
        );
    }

    #[test]
    fn thresholds_have_floors_and_caps() {
        let tiny = Thresholds::for_messages(0);
        assert_eq!(tiny.max_nodes, 400);
        assert_eq!(tiny.min_occurrence, 3);
        assert_eq!(tiny.min_link_weight, 1);
        assert_eq!(Thresholds::for_messages(250_000).max_nodes, 1000);
        assert_eq!(Thresholds::for_messages(100_000_000).max_nodes, 1000);
    }

    #[test]
    fn thresholds_are_monotonic() {
        let mut prev = Thresholds::for_messages(0);
        for total in (1..2_000_000).step_by(997) {
            let t = Thresholds::for_messages(total);
            assert!(t.max_nodes >= prev.max_nodes);
            assert!(t.min_occurrence >= prev.min_occurrence);
            assert!(t.min_link_weight >= prev.min_link_weight);
            prev = t;
        }
    }

    #[test]
    fn layout_grows_with_sqrt_of_nodes() {
        let small = LayoutConfig::for_nodes(0, 0);
        assert_eq!(small.layout_radius, 350);
        assert_eq!(small.star_min, 525);
        assert_eq!(small.star_max, 1400);
        assert_eq!(LayoutConfig::for_nodes(400, 9).layout_radius, 350);
        let big = LayoutConfig::for_nodes(1600, 9);
        assert_eq!(big.layout_radius, 700);
        assert_eq!(big.star_max, 2800);
        assert_eq!(big.max_node_value, 9);
    }

    #[test]
    fn intersection_of_sorted_lists() {
        assert_eq!(intersect_sorted(&[0, 2, 4, 6], &[1, 2, 3, 6, 9]), vec![2, 6]);
        assert!(intersect_sorted(&[], &[1]).is_empty());
    }

    #[test]
    fn nodes_respect_min_occurrence_and_links_are_exact() {
        let mut messages = Vec::new();
        for i in 0..4 {
            messages.push(message(i, 100.0 - i as f64, &["天气", "运动"]));
        }
        messages.push(message(4, 50.0, &["天气"]));
        messages.push(message(5, 10.0, &["晚饭"]));
        let index = index_of(&messages);
        let graph = build_graph(&index, &messages, &PipelineConfig::default());

        let names: Vec<_> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["天气", "运动"]);
        assert_eq!(graph.nodes[0].value, 5);
        assert_eq!(graph.nodes[0].first_seen, 50.0);
        assert_eq!(graph.nodes[1].first_seen, 97.0);

        assert_eq!(graph.links.len(), 1);
        let link = &graph.links[0];
        assert_eq!((link.source.as_str(), link.target.as_str()), ("天气", "运动"));
        assert_eq!(link.value, 4);
        assert_eq!(link.first_seen, 97.0);
        assert!(link.value <= graph.nodes[0].value.min(graph.nodes[1].value));

        assert_eq!(graph.ranking.len(), 3);
        assert_eq!(graph.ranking[2].name, "晚饭");
        assert_eq!(graph.layout.max_node_value, 5);
    }

    #[test]
    fn ranking_ties_follow_first_seen_order() {
        let messages = vec![
            message(0, 0.0, &["b"]),
            message(1, 0.0, &["a"]),
            message(2, 0.0, &["c", "a"]),
            message(3, 0.0, &["b"]),
        ];
        let index = index_of(&messages);
        let ranked: Vec<_> = rank_keywords(&index).into_iter().map(|(k, _)| k).collect();
        assert_eq!(ranked, vec!["b", "a", "c"]);
    }

    #[test]
    fn ranking_is_truncated_independently_of_thresholds() {
        let messages: Vec<_> = (0..5)
            .map(|i| message(i, 0.0, &[["k0", "k1", "k2", "k3", "k4"][i]]))
            .collect();
        let config = PipelineConfig {
            ranking_size: 2,
            ..PipelineConfig::default()
        };
        let graph = build_graph(&index_of(&messages), &messages, &config);
        assert!(graph.nodes.is_empty());
        assert_eq!(graph.ranking.len(), 2);
    }

    #[test]
    fn empty_corpus_gives_empty_graph() {
        let graph = build_graph(&KeywordIndex::new(), &[], &PipelineConfig::default());
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
        assert_eq!(graph.layout.max_node_value, 0);
        assert_eq!(graph.layout.layout_radius, 350);
    }
}
