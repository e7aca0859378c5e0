//! In-process test doubles for the two collaborator seams.
//!
//! Used by this crate's tests and by downstream crates that drive a whole
//! run without a tracker or a model server.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::GenerationOptions;
use crate::driver::GenerationBackend;
use crate::error::{FetchError, GenerationError};
use crate::model::{Revision, WorkItem};
use crate::source::WorkItemSource;

// ── MockSource ────────────────────────────────────────────────────────────────

/// Tracker backed by in-memory maps.
///
/// Unknown ids answer like the tracker does for a missing item: a 404.
#[derive(Debug, Default)]
pub struct MockSource {
    items: HashMap<u64, WorkItem>,
    linked: HashMap<u64, Vec<WorkItem>>,
    history: HashMap<u64, Vec<Revision>>,
    failing_links: HashSet<u64>,
    failing_history: HashSet<u64>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: WorkItem) -> Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn with_linked(mut self, id: u64, linked: Vec<WorkItem>) -> Self {
        self.linked.insert(id, linked);
        self
    }

    pub fn with_history(mut self, id: u64, history: Vec<Revision>) -> Self {
        self.history.insert(id, history);
        self
    }

    /// Make link lookups for `id` fail.
    pub fn failing_links(mut self, id: u64) -> Self {
        self.failing_links.insert(id);
        self
    }

    /// Make history lookups for `id` fail.
    pub fn failing_history(mut self, id: u64) -> Self {
        self.failing_history.insert(id);
        self
    }

    fn not_found(what: String) -> FetchError {
        FetchError::Http {
            what,
            status: 404,
            body: "not found".to_string(),
        }
    }
}

#[async_trait]
impl WorkItemSource for MockSource {
    async fn fetch_item(&self, id: u64) -> Result<WorkItem, FetchError> {
        self.items
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("work item {id}")))
    }

    async fn fetch_linked_items(&self, id: u64) -> Result<Vec<WorkItem>, FetchError> {
        if self.failing_links.contains(&id) {
            return Err(FetchError::Transport {
                what: format!("relations of {id}"),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.linked.get(&id).cloned().unwrap_or_default())
    }

    async fn fetch_history(&self, id: u64) -> Result<Vec<Revision>, FetchError> {
        if self.failing_history.contains(&id) {
            return Err(Self::not_found(format!("updates of {id}")));
        }
        Ok(self.history.get(&id).cloned().unwrap_or_default())
    }
}

// ── ScriptedBackend ───────────────────────────────────────────────────────────

/// Generation backend that plays back a script of replies.
///
/// Once the script runs out every call gets the fallback reply.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    calls: AtomicU32,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(
        script: impl IntoIterator<Item = Result<String, GenerationError>>,
        fallback: Result<String, GenerationError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self::new([], Ok(reply.into()))
    }

    /// Fails every call with `err`.
    pub fn failing(err: GenerationError) -> Self {
        Self::new([], Err(err))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Contexts received, in call order.
    pub fn contexts(&self) -> Vec<String> {
        self.contexts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        _system_prompt: &str,
        context: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context.to_string());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
