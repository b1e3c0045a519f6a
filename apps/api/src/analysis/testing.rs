//! In-memory doubles for every external seam of the pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use super::error::PipelineError;
use super::sources::{ContentFetcher, FetchResult, FetchStrategy, FetcherFactory};
use super::store::{CollectionKind, RecordStore};
use crate::llm_client::{
    DocumentService, DocumentState, GenerationRequest, LlmError, ProviderOutput, RemoteDocumentHandle, TextGenerator,
};
use crate::storage::{ObjectStore, StorageError};

// ────────────────────────────────────────────────────────────────────────────
// Text generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(String),
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub prompt: String,
    /// Display names of the attached documents, in order.
    pub attachments: Vec<String>,
    pub url_context: bool,
}

/// Answers each call with the first rule whose needle appears in the prompt.
#[derive(Default)]
pub struct ScriptedGenerator {
    rules: Vec<(String, Script)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &str, text: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Reply(text.to_string())));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Fail(message.to_string())));
        self
    }

    /// Calls matching `needle` never complete.
    pub fn hang(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Script::Hang));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.prompt.contains(needle)).count()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderOutput, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: request.system.map(str::to_string),
            prompt: request.prompt.to_string(),
            attachments: request.attachments.iter().map(|h| h.display_name.clone()).collect(),
            url_context: request.url_context,
        });

        let script = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, script)| script.clone());

        match script {
            Some(Script::Reply(text)) => Ok(ProviderOutput::PlainText(text)),
            Some(Script::Fail(message)) => Err(LlmError::Api { status: 500, message }),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(LlmError::Api {
                status: 404,
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document service
// ────────────────────────────────────────────────────────────────────────────

/// Documents become ACTIVE on upload unless a state sequence is scripted for
/// their display name: the first state is returned by `upload`, later ones by
/// successive `get_status` calls, and the last one repeats.
#[derive(Default)]
pub struct FakeDocumentService {
    scripts: Mutex<HashMap<String, Vec<DocumentState>>>,
    failing_upload: Option<String>,
    failing_delete: bool,
    hanging_delete: bool,
    next_id: AtomicUsize,
    status_calls: AtomicUsize,
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, display_name: &str, states: &[DocumentState]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(display_name.to_string(), states.to_vec());
        self
    }

    pub fn failing_upload(mut self, display_name: &str) -> Self {
        self.failing_upload = Some(display_name.to_string());
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.failing_delete = true;
        self
    }

    /// `delete` records the call and then never completes.
    pub fn hanging_delete(mut self) -> Self {
        self.hanging_delete = true;
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    /// Remote names passed to `delete`, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn next_state(&self, display_name: &str) -> DocumentState {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(display_name) {
            Some(states) if states.len() > 1 => states.remove(0),
            Some(states) => states.first().copied().unwrap_or(DocumentState::Active),
            None => DocumentState::Active,
        }
    }
}

#[async_trait]
impl DocumentService for FakeDocumentService {
    async fn upload(&self, bytes: Bytes, display_name: &str) -> Result<RemoteDocumentHandle, LlmError> {
        if self.failing_upload.as_deref() == Some(display_name) {
            return Err(LlmError::Api {
                status: 400,
                message: format!("upload rejected: {display_name}"),
            });
        }
        self.uploaded.lock().unwrap().push(display_name.to_string());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(RemoteDocumentHandle {
            name: format!("files/{id}"),
            uri: format!("https://files.example.invalid/files/{id}"),
            display_name: display_name.to_string(),
            state: self.next_state(display_name),
            size_bytes: Some(bytes.len() as u64),
        })
    }

    async fn get_status(&self, handle: &RemoteDocumentHandle) -> Result<DocumentState, LlmError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_state(&handle.display_name))
    }

    async fn delete(&self, handle: &RemoteDocumentHandle) -> Result<(), LlmError> {
        self.deleted.lock().unwrap().push(handle.name.clone());
        if self.hanging_delete {
            std::future::pending::<()>().await;
        }
        if self.failing_delete {
            return Err(LlmError::Api {
                status: 503,
                message: "delete unavailable".to_string(),
            });
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: HashMap<String, Bytes>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, key: &str) -> Self {
        self.objects
            .insert(key.to_string(), Bytes::from(format!("%PDF-1.4 {key}")));
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content fetchers
// ────────────────────────────────────────────────────────────────────────────

/// Serves canned page text; unknown URLs fail with HTTP 404.
#[derive(Default)]
pub struct ScriptedFetcherFactory {
    pages: HashMap<String, String>,
    fetched: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedFetcherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    /// Every URL fetched by any fetcher from this factory, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FetcherFactory for ScriptedFetcherFactory {
    fn create(&self) -> Box<dyn ContentFetcher> {
        Box::new(ScriptedFetcher {
            pages: self.pages.clone(),
            fetched: Arc::clone(&self.fetched),
            closed: Arc::clone(&self.closed),
            is_closed: false,
        })
    }
}

struct ScriptedFetcher {
    pages: HashMap<String, String>,
    fetched: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::ReaderProxy
    }

    async fn fetch(&mut self, url: &str) -> FetchResult {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(text) => FetchResult::ok(url, text.clone()),
            None => FetchResult::failed(url, "HTTP error: 404"),
        }
    }

    async fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Record store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<(CollectionKind, String, String, Value)>>,
    saved: Mutex<Vec<CollectionKind>>,
    failing: bool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `save` fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Pre-existing record; not counted by `saved_kinds`.
    pub fn seed(self, kind: CollectionKind, subject: &str, record: Value) -> Self {
        let id = format!("seed-{}", self.records.lock().unwrap().len() + 1);
        self.records
            .lock()
            .unwrap()
            .push((kind, subject.to_string(), id, record));
        self
    }

    pub fn saved_kinds(&self) -> Vec<CollectionKind> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn save(&self, kind: CollectionKind, subject: &str, record: &Value) -> Result<String, PipelineError> {
        if self.failing {
            return Err(PipelineError::Persistence("connection refused".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let id = format!("rec-{}", records.len() + 1);
        records.push((kind, subject.to_string(), id.clone(), record.clone()));
        self.saved.lock().unwrap().push(kind);
        Ok(id)
    }

    async fn find(&self, kind: CollectionKind, subject: &str) -> Result<Option<Value>, PipelineError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .find(|(k, s, _, _)| *k == kind && s == subject)
            .map(|(_, _, id, record)| {
                let mut record = record.clone();
                if let Value::Object(map) = &mut record {
                    map.insert("_id".to_string(), Value::String(id.clone()));
                }
                record
            }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider output fixtures
// ────────────────────────────────────────────────────────────────────────────

pub mod fixtures {
    use serde_json::json;

    fn evidence(doc: &str, quote: &str) -> serde_json::Value {
        json!([{"doc_id": doc, "line_refs": ["L1"], "quote": quote}])
    }

    pub fn collected_company_json() -> String {
        json!({
            "company_info_fields": {
                "company_name": "토스",
                "tech_stack": ["Kotlin", "Spring", "Kubernetes"],
                "culture_signals": ["autonomy", "responsibility"]
            },
            "evidence": evidence("job_posting", "Kotlin and Spring")
        })
        .to_string()
    }

    pub fn organization_record_json(name: &str) -> String {
        json!({
            "schema_version": "2.0",
            "profile_meta": {"company_name": name},
            "company_info_fields": {"tech_stack": ["Kotlin"]},
            "scoring_axes": {
                "technical_fit_company": {"score": 3, "confidence": "high", "summary": "Kotlin services",
                    "evidence": evidence("job_posting", "Kotlin and Spring")},
                "execution_style_company": {"score": 2, "confidence": "medium", "summary": "fast iteration",
                    "evidence": evidence("culture", "ship weekly")},
                "collaboration_style_company": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []},
                "ownership_company": {"score": 3, "confidence": "medium", "summary": "owners decide",
                    "evidence": evidence("culture", "DRI owns the decision")},
                "growth_orientation_company": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []},
                "work_expectation_company": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []}
            },
            "extraction_quality": {"unknown_policy_applied": true, "notes": []}
        })
        .to_string()
    }

    pub fn applicant_record_json(name: &str) -> String {
        json!({
            "schema_version": "2.1",
            "profile_keywords": {"summary_keywords": ["backend", "rust"]},
            "profile_meta": {"candidate_name": name},
            "scoring_axes": {
                "technical_fit_user": {"score": 3, "confidence": "medium", "summary": "Rust backend",
                    "evidence": evidence("resume.pdf", "Rust services in production")},
                "execution_style_user": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []},
                "collaboration_style_user": {"score": 2, "confidence": "medium", "summary": "code review",
                    "evidence": evidence("portfolio.pdf", "led code reviews")},
                "ownership_user": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []},
                "growth_orientation_user": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []},
                "work_expectation_user": {"score": 0, "confidence": "low", "summary": "unknown", "evidence": []}
            },
            "extraction_quality": {"unknown_policy_applied": true, "notes": ["no essay provided"]}
        })
        .to_string()
    }

    pub fn comparison_json() -> String {
        let both = |company: &str, developer: &str| {
            json!({
                "company_evidence": evidence("company", company),
                "developer_evidence": evidence("developer", developer)
            })
        };
        let mut technical = both("Kotlin and Spring", "Rust services in production");
        technical["status"] = json!("scored");
        technical["axis_score"] = json!(75);
        technical["summary"] = json!("백엔드 기술 스택이 부분적으로 겹칩니다.");

        let mut collaboration = both("DRI owns the decision", "led code reviews");
        collaboration["status"] = json!("scored");
        collaboration["axis_score"] = json!(50);

        json!({
            "axis_comparisons": {
                "technical_fit": technical,
                "execution_style": {"status": "unknown"},
                "collaboration_style": collaboration,
                "growth_learning_orientation": {"status": "unknown"},
                "product_user_impact_orientation": {"status": "unknown"},
                "ops_quality_responsibility": {"status": "unknown"}
            },
            "overall": {"match_score": 90, "confidence": 0.9, "score_band": "high", "overall_notes": "..."}
        })
        .to_string()
    }
}
