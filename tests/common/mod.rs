//! In-process stand-ins for the index, relevance model and generation
//! backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;

use paper_search::config::Config;
use paper_search::index::{IndexError, IndexQuery, SearchIndex};
use paper_search::llm::{BackendStream, CompletionRequest, GenerationBackend, RelevanceModel};
use paper_search::models::{Document, FieldValue, Fields};
use paper_search::pipeline::{Pipeline, PipelineSettings};
use paper_search::state::AppState;

pub fn doc(id: &str, text: Option<&str>) -> Document {
    let mut fields = Fields::new();
    if let Some(t) = text {
        fields.insert("text".into(), FieldValue::Text(t.into()));
    }
    fields.insert("title".into(), FieldValue::Text(format!("Paper {id}")));
    Document::new(id, "serp-ai", Some(1.0), fields)
}

/// `n` distinct words tagged with `tag`.
pub fn words(n: usize, tag: &str) -> String {
    (0..n)
        .map(|i| format!("{tag}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub enum IndexBehavior {
    Hits(Vec<Document>),
    Unavailable,
    Rejects,
}

pub struct FakeIndex {
    behavior: IndexBehavior,
    pub queries: Mutex<Vec<IndexQuery>>,
}

impl FakeIndex {
    pub fn with_hits(hits: Vec<Document>) -> Arc<Self> {
        Self::new(IndexBehavior::Hits(hits))
    }

    pub fn new(behavior: IndexBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn search(&self, query: &IndexQuery) -> Result<Vec<Document>, IndexError> {
        self.queries.lock().unwrap().push(query.clone());
        match &self.behavior {
            IndexBehavior::Hits(hits) => Ok(hits.iter().take(query.size).cloned().collect()),
            IndexBehavior::Unavailable => {
                Err(IndexError::Unavailable("connection refused".into()))
            }
            IndexBehavior::Rejects => Err(IndexError::Query("parsing_exception".into())),
        }
    }
}

/// Returns a fixed score list, scores by text length, or fails.
pub struct FakeModel {
    scores: Option<Vec<f64>>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeModel {
    pub fn scores(scores: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            scores: Some(scores),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Longer texts score higher.
    pub fn by_length() -> Arc<Self> {
        Arc::new(Self {
            scores: None,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Every call fails as if the model server errored.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            scores: None,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceModel for FakeModel {
    async fn score_batch(&self, _query: &str, texts: &[String]) -> anyhow::Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("reranker returned 502 Bad Gateway");
        }
        Ok(match &self.scores {
            Some(scores) => scores.clone(),
            None => texts.iter().map(|t| t.len() as f64).collect(),
        })
    }
}

/// Emits scripted items; an `Err` item simulates a dropped connection.
pub struct FakeBackend {
    items: Vec<Result<String, String>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeBackend {
    pub fn new(items: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            items,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(chunks: &[&str]) -> Arc<Self> {
        Self::new(chunks.iter().map(|c| Ok(c.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// User turn of the `n`th request.
    pub fn user_prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].messages[1].content.clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn stream_complete(&self, request: CompletionRequest) -> anyhow::Result<BackendStream> {
        self.requests.lock().unwrap().push(request);
        let items: Vec<anyhow::Result<String>> = self
            .items
            .iter()
            .map(|i| i.clone().map_err(|e| anyhow::anyhow!(e)))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub fn pipeline(
    index: Arc<FakeIndex>,
    model: Arc<FakeModel>,
    backend: Arc<FakeBackend>,
    settings: PipelineSettings,
) -> Pipeline {
    Pipeline::new(index, model, backend, settings)
}

pub fn app_state(
    config: Config,
    index: Arc<FakeIndex>,
    model: Arc<FakeModel>,
    backend: Arc<FakeBackend>,
) -> AppState {
    AppState::from_parts(config, index, model, backend)
}
