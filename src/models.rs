use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// Open metadata carried by a document. Keys are field names from the index.
pub type Fields = BTreeMap<String, FieldValue>;

/// The value kinds a document field can hold.
///
/// A `null` field is dropped on the way in so that absent metadata stays
/// absent on the way out. `Null` only appears as a list item, where dropping
/// it would shift the positions of the items after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    /// Convert a JSON field value, returning `None` for `null`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            other => Some(Self::from_json_item(other)),
        }
    }

    fn from_json_item(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Integer(i),
                (None, Some(f)) => Self::Float(f),
                (None, None) => Self::Text(n.to_string()),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json_item).collect())
            }
            Value::Object(map) => Self::Map(fields_from_json(map)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Convert a JSON object into document fields, dropping nulls.
pub fn fields_from_json(map: serde_json::Map<String, Value>) -> Fields {
    map.into_iter()
        .filter_map(|(key, value)| FieldValue::from_json(value).map(|v| (key, v)))
        .collect()
}

/// A single hit from the search index.
///
/// Deserializes from either this type's own JSON shape or a raw
/// Elasticsearch hit (`_id`, `_index`, `_score`, `_source`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct Document {
    pub id: String,
    pub source_index: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<f64>,
    pub fields: Fields,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default, alias = "_id")]
    id: String,
    #[serde(default, alias = "_index")]
    source_index: String,
    #[serde(default, alias = "_score")]
    raw_score: Option<f64>,
    #[serde(default, alias = "_source")]
    fields: Option<serde_json::Map<String, Value>>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        Self {
            id: raw.id,
            source_index: raw.source_index,
            raw_score: raw.raw_score,
            fields: raw.fields.map(fields_from_json).unwrap_or_default(),
        }
    }
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        source_index: impl Into<String>,
        raw_score: Option<f64>,
        fields: Fields,
    ) -> Self {
        Self {
            id: id.into(),
            source_index: source_index.into(),
            raw_score,
            fields,
        }
    }

    /// The `text` field, if present and textual.
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(FieldValue::as_text)
    }

    /// The `text` field when it holds something other than whitespace.
    pub fn usable_text(&self) -> Option<&str> {
        self.text().filter(|t| !t.trim().is_empty())
    }
}

/// A document with the relevance model's score attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    pub relevance_score: f64,
}

/// Search flow response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub initial_hits_count: usize,
    pub reranked_hits: Vec<ScoredDocument>,
}

/// Optional overrides for `GET /search/{query}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub size: Option<usize>,
    pub top_k: Option<usize>,
}

/// A single chat turn sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trim a query and reject it when nothing is left.
pub fn validate_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::Validation("Query is required".to_string()));
    }
    Ok(query.to_string())
}

/// Read the required `query` string from a JSON request body.
pub fn query_from_payload(payload: &Value) -> Result<String> {
    let Some(body) = payload.as_object() else {
        return Err(PipelineError::Validation(
            "Request body must be a JSON object".to_string(),
        ));
    };
    match body.get("query") {
        Some(Value::String(q)) => validate_query(q),
        _ => Err(PipelineError::Validation(
            "`query` must be a non-empty string".to_string(),
        )),
    }
}

/// Body of `POST /summarize_documents_stream`.
#[derive(Debug, Clone)]
pub struct DocumentsPayload {
    pub query: String,
    pub documents: Vec<Document>,
}

impl DocumentsPayload {
    /// Validate a caller-supplied body: a query plus a non-empty list of
    /// document objects.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let query = query_from_payload(payload)?;

        let items = match payload.get("documents") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(PipelineError::Validation(
                    "`documents` must be a list".to_string(),
                ))
            }
            None => {
                return Err(PipelineError::Validation(
                    "`documents` is required".to_string(),
                ))
            }
        };
        if items.is_empty() {
            return Err(PipelineError::Validation(
                "`documents` must not be empty".to_string(),
            ));
        }

        let documents = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if !item.is_object() {
                    return Err(PipelineError::Validation(format!(
                        "documents[{i}] must be an object"
                    )));
                }
                serde_json::from_value::<Document>(item.clone()).map_err(|e| {
                    PipelineError::Validation(format!("documents[{i}] is malformed: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { query, documents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_from_elasticsearch_hit() {
        let hit = json!({
            "_index": "serp-ai",
            "_id": "abc",
            "_score": 7.5,
            "_source": {
                "title": "Attention Is All You Need",
                "text": "We propose the Transformer.",
                "year": 2017,
                "authors": ["Vaswani", "Shazeer"],
                "url": null
            }
        });
        let doc: Document = serde_json::from_value(hit).unwrap();
        assert_eq!(doc.id, "abc");
        assert_eq!(doc.source_index, "serp-ai");
        assert_eq!(doc.raw_score, Some(7.5));
        assert_eq!(doc.text(), Some("We propose the Transformer."));
        assert_eq!(doc.fields.get("year"), Some(&FieldValue::Integer(2017)));
        assert!(!doc.fields.contains_key("url"));
    }

    #[test]
    fn test_null_fields_stay_absent_in_output() {
        let doc: Document = serde_json::from_value(json!({
            "id": "1",
            "fields": { "text": "hello", "booktitle": null }
        }))
        .unwrap();
        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["fields"], json!({ "text": "hello" }));
        assert!(out.get("raw_score").is_none());
    }

    #[test]
    fn test_null_list_items_keep_their_position() {
        let doc: Document = serde_json::from_value(json!({
            "id": "1",
            "fields": { "authors": ["Vaswani", null, "Parmar"], "editor": null }
        }))
        .unwrap();
        assert_eq!(
            doc.fields.get("authors"),
            Some(&FieldValue::List(vec![
                FieldValue::Text("Vaswani".into()),
                FieldValue::Null,
                FieldValue::Text("Parmar".into()),
            ]))
        );
        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["fields"]["authors"], json!(["Vaswani", null, "Parmar"]));
        assert!(out["fields"].get("editor").is_none());
    }

    #[test]
    fn test_scored_document_flattens_document() {
        let mut fields = Fields::new();
        fields.insert("text".into(), FieldValue::Text("body".into()));
        let scored = ScoredDocument {
            document: Document::new("d1", "serp-ai", Some(1.0), fields),
            relevance_score: 0.25,
        };
        let out = serde_json::to_value(&scored).unwrap();
        assert_eq!(out["id"], "d1");
        assert_eq!(out["source_index"], "serp-ai");
        assert_eq!(out["fields"]["text"], "body");
        assert_eq!(out["relevance_score"], 0.25);
    }

    #[test]
    fn test_scored_output_reads_back_as_document() {
        let mut fields = Fields::new();
        fields.insert("text".into(), FieldValue::Text("body".into()));
        let doc = Document::new("d1", "serp-ai", Some(1.0), fields);
        let scored = ScoredDocument {
            document: doc.clone(),
            relevance_score: 3.0,
        };
        let back: Document = serde_json::from_value(serde_json::to_value(&scored).unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_usable_text_rejects_whitespace_and_non_text() {
        let mut fields = Fields::new();
        fields.insert("text".into(), FieldValue::Text("   \n".into()));
        assert!(Document::new("a", "i", None, fields).usable_text().is_none());

        let mut fields = Fields::new();
        fields.insert("text".into(), FieldValue::Integer(3));
        assert!(Document::new("b", "i", None, fields).text().is_none());
    }

    #[test]
    fn test_validate_query_trims() {
        assert_eq!(validate_query("  transformers ").unwrap(), "transformers");
        assert!(matches!(
            validate_query("   "),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_documents_payload_rejects_non_list() {
        let err = DocumentsPayload::from_json(&json!({
            "query": "q",
            "documents": "not a list"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("must be a list"));
    }

    #[test]
    fn test_documents_payload_rejects_empty_list_and_missing_query() {
        assert!(DocumentsPayload::from_json(&json!({ "query": "q", "documents": [] })).is_err());
        assert!(DocumentsPayload::from_json(&json!({ "documents": [{ "id": "x" }] })).is_err());
        assert!(DocumentsPayload::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_documents_payload_rejects_scalar_items() {
        let err = DocumentsPayload::from_json(&json!({ "query": "q", "documents": [{}, 5] }))
            .unwrap_err();
        assert!(err.to_string().contains("documents[1]"));
    }

    #[test]
    fn test_documents_payload_accepts_mixed_shapes() {
        let payload = DocumentsPayload::from_json(&json!({
            "query": " graph neural networks ",
            "documents": [
                { "_id": "1", "_source": { "text": "first" } },
                { "id": "2", "fields": { "text": "second" }, "relevance_score": 0.4 }
            ]
        }))
        .unwrap();
        assert_eq!(payload.query, "graph neural networks");
        assert_eq!(payload.documents.len(), 2);
        assert_eq!(payload.documents[1].text(), Some("second"));
    }
}
