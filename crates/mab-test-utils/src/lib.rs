//! Testing utilities for MAB workspace
//!
//! Scripted provider and gate doubles, plus session fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use mab_artifact::{Artifact, Turn};
use mab_core::{
    CodeGenProvider, EntitlementGate, NoEntitlements, ProviderError, SessionConfig,
    SessionController,
};
use mab_store::{ArtifactStore, MemoryBlobStore};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One call observed by [`ScriptedProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Generate {
        instruction: String,
    },
    Revise {
        body: String,
        history: Vec<Turn>,
        instruction: String,
    },
}

impl ProviderCall {
    pub fn instruction(&self) -> &str {
        match self {
            Self::Generate { instruction } | Self::Revise { instruction, .. } => instruction,
        }
    }
}

/// Provider double that replays queued outcomes.
///
/// With nothing queued, `generate` answers `<html>{instruction}</html>` and
/// `revise` appends `<!-- {instruction} -->` to the body. A held provider
/// parks every call until [`release`](Self::release) grants a permit.
#[derive(Debug)]
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<ProviderCall>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Provider whose calls wait for [`release`](Self::release)
    #[must_use]
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Queue a successful body
    #[must_use]
    pub fn succeed(self, body: impl Into<String>) -> Self {
        self.outcomes.lock().push_back(Ok(body.into()));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn fail(self, error: ProviderError) -> Self {
        self.outcomes.lock().push_back(Err(error));
        self
    }

    /// Queue a successful body on a shared provider
    pub fn push_ok(&self, body: impl Into<String>) {
        self.outcomes.lock().push_back(Ok(body.into()));
    }

    /// Queue a failure on a shared provider
    pub fn push_err(&self, error: ProviderError) {
        self.outcomes.lock().push_back(Err(error));
    }

    /// Let `n` held calls complete
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Calls started so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls started and not yet answered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls running at the same time
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        call: ProviderCall,
        fallback: String,
    ) -> Result<String, ProviderError> {
        self.calls.lock().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let outcome = self.outcomes.lock().pop_front().unwrap_or(Ok(fallback));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl CodeGenProvider for ScriptedProvider {
    async fn generate(&self, instruction: &str) -> Result<String, ProviderError> {
        let call = ProviderCall::Generate {
            instruction: instruction.to_string(),
        };
        self.answer(call, format!("<html>{instruction}</html>")).await
    }

    async fn revise(
        &self,
        body: &str,
        prior_history: &[Turn],
        instruction: &str,
    ) -> Result<String, ProviderError> {
        let call = ProviderCall::Revise {
            body: body.to_string(),
            history: prior_history.to_vec(),
            instruction: instruction.to_string(),
        };
        self.answer(call, format!("{body}<!-- {instruction} -->")).await
    }
}

/// Gate with fixed answers
#[derive(Debug, Default)]
pub struct StaticGate {
    entitled: AtomicBool,
    purchase_ok: AtomicBool,
    restore_ok: AtomicBool,
    checks: AtomicUsize,
}

impl StaticGate {
    #[must_use]
    pub fn entitled() -> Self {
        let gate = Self::default();
        gate.entitled.store(true, Ordering::SeqCst);
        gate
    }

    #[must_use]
    pub fn denied() -> Self {
        Self::default()
    }

    /// Purchases succeed and grant the entitlement
    #[must_use]
    pub fn with_purchase(self) -> Self {
        self.purchase_ok.store(true, Ordering::SeqCst);
        self
    }

    /// Restores succeed and grant the entitlement
    #[must_use]
    pub fn with_restore(self) -> Self {
        self.restore_ok.store(true, Ordering::SeqCst);
        self
    }

    /// Number of `is_entitled` checks
    #[must_use]
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementGate for StaticGate {
    async fn is_entitled(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.entitled.load(Ordering::SeqCst)
    }

    async fn purchase(&self, _offer_id: &str) -> bool {
        let ok = self.purchase_ok.load(Ordering::SeqCst);
        if ok {
            self.entitled.store(true, Ordering::SeqCst);
        }
        ok
    }

    async fn restore(&self) -> bool {
        let ok = self.restore_ok.load(Ordering::SeqCst);
        if ok {
            self.entitled.store(true, Ordering::SeqCst);
        }
        ok
    }
}

/// Store over a fresh in-memory blob
pub fn memory_store() -> (ArtifactStore, Arc<MemoryBlobStore>) {
    memory_store_with(Arc::new(MemoryBlobStore::new()))
}

pub fn memory_store_with(blob: Arc<MemoryBlobStore>) -> (ArtifactStore, Arc<MemoryBlobStore>) {
    (ArtifactStore::new(blob.clone()), blob)
}

/// Opened session over an in-memory blob without entitlements
pub async fn setup_test_session(
    provider: Arc<ScriptedProvider>,
) -> (SessionController, Arc<MemoryBlobStore>) {
    setup_test_session_with(provider, Arc::new(NoEntitlements), Arc::new(MemoryBlobStore::new()))
        .await
}

pub async fn setup_test_session_with(
    provider: Arc<ScriptedProvider>,
    gate: Arc<dyn EntitlementGate>,
    blob: Arc<MemoryBlobStore>,
) -> (SessionController, Arc<MemoryBlobStore>) {
    let (store, blob) = memory_store_with(blob);
    let session = SessionController::open(&SessionConfig::default(), provider, gate, store).await;
    (session, blob)
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Await `future`, failing the test after five seconds
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for session"),
    }
}

/// `Ready` artifact with `body`
pub fn ready_artifact(instruction: &str, body: &str) -> Artifact {
    let mut artifact = Artifact::new(instruction);
    let _ = artifact.complete_generation(body);
    artifact
}
