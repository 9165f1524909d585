//! HTTP message types for the RAG backend. Client ↔ server JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::ValidationError;

/// Characters of chunk text shown before the preview is cut.
pub const CHUNK_PREVIEW_CHARS: usize = 200;

/// Retrieval knobs attached to every question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParameters {
    pub top_k: u32,
    pub threshold: f64,
}

impl Default for RetrievalParameters {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.6,
        }
    }
}

impl RetrievalParameters {
    /// `top_k` must be positive and `threshold` within `[0, 1]`.
    pub fn new(top_k: u32, threshold: f64) -> Option<Self> {
        if top_k == 0 || !(0.0..=1.0).contains(&threshold) {
            return None;
        }
        Some(Self { top_k, threshold })
    }
}

/// Client → server: body of `POST /ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub query: &'a str,
    pub top_k: u32,
    pub threshold: f64,
}

impl<'a> AskRequest<'a> {
    pub fn new(query: &'a str, params: &RetrievalParameters) -> Self {
        Self {
            query,
            top_k: params.top_k,
            threshold: params.threshold,
        }
    }
}

/// One retrieved passage backing the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl Chunk {
    /// Leading part of the text for display, with `...` when cut.
    pub fn preview(&self) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(CHUNK_PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }

    fn from_json(index: usize, value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| malformed(format!("chunk at index {index} is not an object")))?;

        let text = match obj.get("text") {
            None | Some(Value::Null) => {
                return Err(malformed(format!(
                    "chunk at index {index} missing text field"
                )))
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(malformed(format!(
                    "chunk at index {index} text is not a string"
                )))
            }
        };

        let rank = optional_number(obj, "rank", index)?;
        let source = optional_string(obj, "source")
            .map_err(|field| malformed(format!("chunk at index {index} {field} is not a string")))?;
        let similarity_score = optional_number(obj, "similarity_score", index)?;

        if rank.is_none() {
            warn!("Chunk at index {} missing rank field", index);
        }
        if source.is_none() {
            warn!("Chunk at index {} missing source field", index);
        }
        if similarity_score.is_none() {
            warn!("Chunk at index {} missing similarity_score field", index);
        }

        Ok(Chunk {
            rank,
            text,
            source,
            similarity_score,
        })
    }
}

/// Server → client: body of a successful `POST /ask`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_chunks: Option<Vec<Chunk>>,
    /// Error reported by the backend alongside a 2xx status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnswerResponse {
    /// Checks the payload shape and converts it.
    ///
    /// Missing `answer`, `sources` or `matched_chunks` are only logged. A field that is present
    /// with the wrong shape, or a chunk without `text`, is a
    /// [`ValidationError::MalformedResponse`].
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| malformed("response is not an object"))?;

        if !obj.contains_key("answer") {
            warn!("Response missing answer field");
        }
        let answer = optional_string(obj, "answer")
            .map_err(|field| malformed(format!("{field} is not a string")))?;

        let sources = match obj.get("sources") {
            None => {
                warn!("Response missing sources field");
                None
            }
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        item.as_str()
                            .map(str::to_owned)
                            .ok_or_else(|| malformed(format!("source at index {i} is not a string")))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(malformed("sources is not an array")),
        };

        let matched_chunks = match obj.get("matched_chunks") {
            None => {
                warn!("Response missing matched_chunks field");
                None
            }
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Chunk::from_json(i, item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(malformed("matched_chunks is not an array")),
        };

        let error = optional_string(obj, "error")
            .map_err(|field| malformed(format!("{field} is not a string")))?;

        Ok(AnswerResponse {
            answer,
            sources,
            matched_chunks,
            error,
        })
    }
}

/// Server → client: `GET /health` payload. Unknown fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn malformed(detail: impl Into<String>) -> ValidationError {
    ValidationError::MalformedResponse {
        detail: detail.into(),
    }
}

/// `null` counts as absent. Err carries the offending field name.
fn optional_string<'k>(obj: &Map<String, Value>, field: &'k str) -> Result<Option<String>, &'k str> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(field),
    }
}

fn optional_number(
    obj: &Map<String, Value>,
    field: &str,
    index: usize,
) -> Result<Option<f64>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            malformed(format!("chunk at index {index} {field} is not a number"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_response_converts() {
        let value = json!({
            "answer": "ROS 2 is a middleware.",
            "sources": ["https://docs.example.com/ros2"],
            "matched_chunks": [
                {"rank": 1, "text": "ROS 2 ...", "source": "https://docs.example.com/ros2", "similarity_score": 0.91}
            ],
            "error": null
        });
        let resp = AnswerResponse::from_json(&value).unwrap();
        assert_eq!(resp.answer.as_deref(), Some("ROS 2 is a middleware."));
        assert_eq!(resp.sources.as_ref().unwrap().len(), 1);
        let chunk = &resp.matched_chunks.as_ref().unwrap()[0];
        assert_eq!(chunk.rank, Some(1.0));
        assert_eq!(chunk.similarity_score, Some(0.91));
        assert_eq!(resp.error, None);
    }

    #[test]
    fn missing_optional_fields_are_tolerated() {
        let resp = AnswerResponse::from_json(&json!({})).unwrap();
        assert_eq!(resp, AnswerResponse::default());

        let resp = AnswerResponse::from_json(&json!({"matched_chunks": [{"text": "t"}]})).unwrap();
        let chunk = &resp.matched_chunks.unwrap()[0];
        assert_eq!(chunk.text, "t");
        assert_eq!(chunk.source, None);
    }

    #[test]
    fn chunk_without_text_is_malformed() {
        let value = json!({"answer": "x", "matched_chunks": [{"source": "s", "similarity_score": 0.9}]});
        let err = AnswerResponse::from_json(&value).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedResponse {
                detail: "chunk at index 0 missing text field".into()
            }
        );
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        for value in [
            json!("plain text"),
            json!(null),
            json!({"sources": "a.md"}),
            json!({"sources": null}),
            json!({"sources": [1]}),
            json!({"matched_chunks": {"text": "t"}}),
            json!({"matched_chunks": ["t"]}),
            json!({"matched_chunks": [{"text": 3}]}),
            json!({"matched_chunks": [{"text": "t", "similarity_score": "high"}]}),
            json!({"answer": 42}),
        ] {
            let result = AnswerResponse::from_json(&value);
            assert!(
                matches!(result, Err(ValidationError::MalformedResponse { .. })),
                "expected malformed for {value}"
            );
        }
    }

    #[test]
    fn preview_cuts_long_text() {
        let chunk = Chunk {
            rank: None,
            text: "é".repeat(250),
            source: None,
            similarity_score: None,
        };
        let preview = chunk.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), CHUNK_PREVIEW_CHARS + 3);

        let short = Chunk {
            text: "short".into(),
            ..chunk
        };
        assert_eq!(short.preview(), "short");
    }

    #[test]
    fn ask_request_serializes_params() {
        let params = RetrievalParameters::default();
        let body = serde_json::to_value(AskRequest::new("what is a URDF?", &params)).unwrap();
        assert_eq!(
            body,
            json!({"query": "what is a URDF?", "top_k": 5, "threshold": 0.6})
        );
    }

    #[test]
    fn retrieval_parameters_bounds() {
        assert!(RetrievalParameters::new(0, 0.5).is_none());
        assert!(RetrievalParameters::new(3, 1.5).is_none());
        assert!(RetrievalParameters::new(3, -0.1).is_none());
        assert_eq!(
            RetrievalParameters::new(3, 1.0),
            Some(RetrievalParameters {
                top_k: 3,
                threshold: 1.0
            })
        );
    }
}
