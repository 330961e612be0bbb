//! Scenario tests and shared test doubles.


use crate::corpus::{parse_jsonl, CorpusSource, CorpusStore};
use skylens_core::{AppError, AppResult};
use skylens_llm::{GenerationBackend, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generation client that returns a fixed reply or a fixed failure.
pub(crate) struct ScriptedLlm {
    name: &'static str,
    reply: Result<String, String>,
    delay_millis: AtomicU64,
    calls: AtomicUsize,
    last_request: Mutex<Option<LlmRequest>>,
}

impl ScriptedLlm {
    pub(crate) fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self::with_reply(Ok(text.to_string())))
    }

    /// Like [`ScriptedLlm::replying`], reporting `name` as its provider.
    pub(crate) fn replying_as(name: &'static str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            ..Self::with_reply(Ok(text.to_string()))
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self::with_reply(Err(message.to_string())))
    }

    fn with_reply(reply: Result<String, String>) -> Self {
        Self {
            name: "scripted",
            reply,
            delay_millis: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        self.delay_millis
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        self.name
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let delay = self.delay_millis.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match &self.reply {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(100, 20),
                finish_reason: Some("stop".to_string()),
            }),
            Err(message) => Err(AppError::BackendUnavailable(message.clone())),
        }
    }
}

pub(crate) fn generation_backend(llm: Arc<ScriptedLlm>) -> GenerationBackend {
    GenerationBackend {
        client: llm,
        model: "scripted-model".to_string(),
    }
}

/// Store holding the curated EGLL/EGLC notices.
pub(crate) fn builtin_store() -> Arc<CorpusStore> {
    let contents = CorpusSource::Builtin.read().unwrap();
    Arc::new(CorpusStore::from_records(parse_jsonl(&contents).unwrap()).unwrap())
}
