//! Request/response adapter for annotating a batch of loose messages.
//!
//! Mirrors the body of the remote annotation endpoint so the same payloads can be
//! processed offline: `{messages: [{id, text, ...}]}` in, `{success, results, stats}`
//! out. Every message goes through the same fallback contract as the pipeline.

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotate::{Annotator, annotate_message};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub messages: Vec<BatchMessage>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMessage {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Value>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    pub sentiment: u8,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchResponse {
    Success {
        success: bool,
        results: Vec<BatchResult>,
        stats: BatchStats,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl BatchResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        BatchResponse::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchResponse::Success { .. })
    }
}

/// Parses a request body; invalid JSON maps to a failure response.
pub fn parse_batch_request(body: &str) -> Result<BatchRequest, BatchResponse> {
    serde_json::from_str(body).map_err(|e| {
        warn!("Rejecting batch request: {e}");
        BatchResponse::failure("Invalid JSON format")
    })
}

/// Annotates every message of the batch.
pub fn process_batch(
    annotator: &dyn Annotator,
    request: BatchRequest,
    config: &PipelineConfig,
) -> BatchResponse {
    let messages = request.messages;
    if messages.is_empty() {
        return BatchResponse::failure("No messages provided");
    }
    if messages.len() > config.max_batch {
        return BatchResponse::failure(format!(
            "Too many messages. Maximum {} allowed.",
            config.max_batch
        ));
    }
    info!("Processing batch of {} messages", messages.len());

    let results: Vec<BatchResult> = messages
        .into_iter()
        .enumerate()
        .map(|(i, msg)| {
            let (annotation, diagnostic) = annotate_message(annotator, i, &msg.text, config);
            BatchResult {
                id: msg.id,
                sender_name: msg.sender_name,
                sender_id: msg.sender_id,
                text: msg.text,
                timestamp: msg.timestamp,
                sentiment: annotation.sentiment.code(),
                keywords: annotation.keywords,
                error: diagnostic.map(|d| d.to_string()),
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let stats = BatchStats {
        total: results.len(),
        processed: results.len() - failed,
        failed,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    BatchResponse::Success {
        success: true,
        results,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{Annotation, FallbackAnnotator, LexiconAnnotator, Sentiment};
    use crate::error::AnnotationError;

    struct FailsOnEmpty;

    impl Annotator for FailsOnEmpty {
        fn annotate(&self, text: &str) -> Result<Annotation, AnnotationError> {
            if text.is_empty() {
                Err(AnnotationError::Failed("empty text".into()))
            } else {
                Ok(Annotation {
                    sentiment: Sentiment::Happy,
                    keywords: vec!["天气".into()],
                })
            }
        }
    }

    #[test]
    fn empty_and_oversized_batches_fail() {
        let config = PipelineConfig::default();
        let response = process_batch(&FallbackAnnotator, BatchRequest::default(), &config);
        assert_eq!(response, BatchResponse::failure("No messages provided"));

        let small = PipelineConfig {
            max_batch: 1,
            ..PipelineConfig::default()
        };
        let request: BatchRequest =
            serde_json::from_str(r#"{"messages": [{"id": 1, "text": "a"}, {"id": 2, "text": "b"}]}"#)
                .unwrap();
        let response = process_batch(&FallbackAnnotator, request, &small);
        assert!(!response.is_success());
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = parse_batch_request("{not json").unwrap_err();
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "error": "Invalid JSON format"})
        );
    }

    #[test]
    fn failed_messages_are_counted_and_kept() {
        let request = parse_batch_request(
            r#"{"messages": [{"id": "msg_1", "senderName": "张三", "text": "今天天气真好"}, {"id": "msg_2", "text": ""}]}"#,
        )
        .unwrap();
        let response = process_batch(&FailsOnEmpty, request, &PipelineConfig::default());
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["total"], 2);
        assert_eq!(body["stats"]["processed"], 1);
        assert_eq!(body["stats"]["failed"], 1);
        assert_eq!(body["results"][0]["senderName"], "张三");
        assert_eq!(body["results"][0]["sentiment"], 1);
        assert_eq!(body["results"][0]["keywords"], serde_json::json!(["天气"]));
        assert_eq!(body["results"][1]["sentiment"], 0);
        assert!(body["results"][1]["error"].is_string());
    }

    #[test]
    fn lexicon_annotator_flags_questions() {
        let config = PipelineConfig::default();
        let annotator = LexiconAnnotator::new(&config);
        let request = parse_batch_request(
            r#"{"messages": [{"id": "q", "text": "这个功能怎么用？有人能帮我吗？"}]}"#,
        )
        .unwrap();
        let body = serde_json::to_value(process_batch(&annotator, request, &config)).unwrap();
        assert_eq!(body["results"][0]["sentiment"], 2);
    }
}
