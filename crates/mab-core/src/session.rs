//! Session controller
//!
//! Owns the artifact store and orchestrates create/edit requests against the
//! code-generation provider:
//! - every operation returns immediately; provider calls run on tokio tasks
//! - each artifact has a lane, so at most one request per artifact is ever
//!   outstanding and later edits see the turns of earlier ones
//! - completions are compare-and-set on the artifact's revision ticket
//! - provider and persistence failures become status transitions, turns or
//!   log lines, never caller errors

use crate::catalog::{Catalog, TemplateDescriptor};
use crate::config::SessionConfig;
use crate::entitlement::EntitlementGate;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::provider::CodeGenProvider;
use crate::worker::{Lane, Persister, Request};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use mab_artifact::{
    Artifact, ArtifactId, ArtifactStatus, EditDispatch, TransitionError, Turn,
};
use mab_store::ArtifactStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Failure reason recorded when a fresh creation fails
pub const CREATE_FAILURE_REASON: &str = "Failed to generate code. Please try again.";
/// Failure reason recorded when a template-seeded creation fails
pub const TEMPLATE_FAILURE_REASON: &str = "Failed to generate template.";
/// Failure reason for creations interrupted by a restart
pub const INTERRUPTED_REASON: &str = "Generation was interrupted. Please try again.";
/// Assistant turn appended after a successful edit
pub const EDIT_CONFIRMATION: &str = "I have updated the app based on your request.";
/// Assistant turn appended after a failed edit
pub const EDIT_APOLOGY: &str = "Sorry, I encountered an error while updating the app.";

/// Outcome of applying a provider response
enum Completion {
    Applied,
    Stale { current: u64 },
    Rejected(TransitionError),
}

pub(crate) struct Inner {
    store: Arc<ArtifactStore>,
    provider: Arc<dyn CodeGenProvider>,
    gate: Arc<dyn EntitlementGate>,
    entitled: AtomicBool,
    active: Mutex<Option<ArtifactId>>,
    lanes: DashMap<ArtifactId, Lane>,
    persister: Persister,
    events: broadcast::Sender<SessionEvent>,
}

/// Orchestrates the artifact lifecycle
///
/// Cheap to clone; clones share the same session. Must be created inside a
/// tokio runtime (it spawns its workers).
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("artifacts", &self.inner.store.len())
            .field("active", &*self.inner.active.lock())
            .field("lanes", &self.inner.lanes.len())
            .field("entitled", &self.is_entitled())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Controller over `store` as it currently is (no load)
    #[must_use]
    pub fn new(
        config: &SessionConfig,
        provider: Arc<dyn CodeGenProvider>,
        gate: Arc<dyn EntitlementGate>,
        store: ArtifactStore,
    ) -> Self {
        let store = Arc::new(store);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                persister: Persister::spawn(store.clone()),
                store,
                provider,
                gate,
                entitled: AtomicBool::new(false),
                active: Mutex::new(None),
                lanes: DashMap::new(),
                events,
            }),
        }
    }

    /// Load the stored collection and recover interrupted artifacts.
    ///
    /// A load failure starts the session with an empty collection.
    pub async fn open(
        config: &SessionConfig,
        provider: Arc<dyn CodeGenProvider>,
        gate: Arc<dyn EntitlementGate>,
        store: ArtifactStore,
    ) -> Self {
        let controller = Self::new(config, provider, gate, store);
        let store = &controller.inner.store;

        if let Err(e) = store.load_all().await {
            tracing::warn!(
                error = %e,
                location = %store.location(),
                "failed to load artifact collection, starting empty"
            );
            store.replace_all(Vec::new());
        }

        let recovered = controller.inner.recover_interrupted();
        if recovered > 0 {
            tracing::info!(recovered, "recovered interrupted artifacts");
            controller.inner.persister.request_save();
        }
        controller
    }

    /// Create an artifact from a natural-language instruction.
    ///
    /// The artifact is inserted `Pending` at the front, becomes active, and
    /// its generation starts in the background.
    ///
    /// # Errors
    /// `SessionError::EmptyInstruction` for a blank instruction.
    pub fn create(&self, instruction: impl Into<String>) -> Result<ArtifactId, SessionError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(SessionError::EmptyInstruction);
        }
        Ok(self.launch(Artifact::new(instruction), CREATE_FAILURE_REASON))
    }

    /// Create an artifact seeded from a catalog template.
    ///
    /// The artifact shows `Template: <label>` as its instruction, starts
    /// with one `User` turn naming the template, and is generated from the
    /// template's seed instruction.
    ///
    /// # Errors
    /// `SessionError::EntitlementRequired` for a gated template without an
    /// active entitlement (see [`refresh_entitlement`](Self::refresh_entitlement)).
    pub fn create_from_template(
        &self,
        template: &TemplateDescriptor,
    ) -> Result<ArtifactId, SessionError> {
        if template.gated && !self.is_entitled() {
            tracing::info!(template = template.id, "gated template refused without entitlement");
            return Err(SessionError::EntitlementRequired(template.id.to_string()));
        }

        let artifact = Artifact::new(format!("Template: {}", template.label))
            .with_generation_instruction(template.seed_instruction)
            .with_seed_turn(Turn::user(format!("Init from template: {}", template.label)));
        Ok(self.launch(artifact, TEMPLATE_FAILURE_REASON))
    }

    /// [`create_from_template`](Self::create_from_template) by catalog id
    ///
    /// # Errors
    /// `SessionError::UnknownTemplate` plus the errors of `create_from_template`.
    pub fn create_from_template_id(&self, template_id: &str) -> Result<ArtifactId, SessionError> {
        let template = Catalog::find(template_id)
            .ok_or_else(|| SessionError::UnknownTemplate(template_id.to_string()))?;
        self.create_from_template(template)
    }

    fn launch(&self, mut artifact: Artifact, failure_reason: &'static str) -> ArtifactId {
        let id = artifact.id();
        let instruction = artifact.generation_instruction().to_string();
        let ticket = artifact.bump_revision();
        let seed_turns = artifact.history().to_vec();

        self.inner.store.insert_front(artifact);
        tracing::info!(artifact = %id, "artifact created");
        self.inner.emit(SessionEvent::Created { id });
        for turn in seed_turns {
            self.inner.emit(SessionEvent::TurnAppended { id, turn });
        }
        self.set_active(Some(id));
        self.inner.persister.request_save();

        self.lane(id).submit(Request::Generate {
            instruction,
            failure_reason,
            ticket,
        });
        id
    }

    /// Refine an artifact with a follow-up instruction.
    ///
    /// If nothing is outstanding for the artifact the user turn is appended
    /// and the artifact moves to `Revising` before this returns. Otherwise
    /// the edit waits on the artifact's lane and is submitted once earlier
    /// requests have resolved. Unknown ids are ignored.
    ///
    /// # Errors
    /// `SessionError::EmptyInstruction` for a blank instruction.
    pub fn edit(&self, id: ArtifactId, instruction: impl Into<String>) -> Result<(), SessionError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(SessionError::EmptyInstruction);
        }
        if !self.inner.store.contains(id) {
            tracing::debug!(artifact = %id, "edit ignored: artifact not found");
            return Ok(());
        }

        let mut lane = self.lane(id);
        if lane.outstanding > 0 {
            tracing::debug!(artifact = %id, queued = lane.outstanding, "edit queued behind outstanding request");
            lane.submit(Request::Revise {
                instruction,
                dispatch: None,
            });
            return Ok(());
        }

        if let Some(dispatch) = self.inner.begin_edit(id, &instruction) {
            lane.submit(Request::Revise {
                instruction,
                dispatch: Some(dispatch),
            });
        }
        Ok(())
    }

    /// Delete an artifact unconditionally.
    ///
    /// Clears the active selection if it pointed at `id`. A request still
    /// running for the artifact is discarded when it completes.
    pub fn remove(&self, id: ArtifactId) {
        if self.inner.store.remove_by_id(id).is_none() {
            tracing::debug!(artifact = %id, "remove ignored: artifact not found");
            return;
        }
        self.inner.lanes.remove(&id);
        tracing::info!(artifact = %id, "artifact removed");
        self.inner.emit(SessionEvent::Removed { id });

        let cleared = {
            let mut active = self.inner.active.lock();
            if *active == Some(id) {
                *active = None;
                true
            } else {
                false
            }
        };
        if cleared {
            self.inner.emit(SessionEvent::ActiveChanged { id: None });
        }
        self.inner.persister.request_save();
    }

    /// Change the active selection; unknown ids are ignored
    pub fn set_active(&self, id: Option<ArtifactId>) {
        if let Some(target) = id {
            if !self.inner.store.contains(target) {
                tracing::debug!(artifact = %target, "selection ignored: artifact not found");
                return;
            }
        }

        let changed = {
            let mut active = self.inner.active.lock();
            let changed = *active != id;
            *active = id;
            changed
        };
        if changed {
            self.inner.emit(SessionEvent::ActiveChanged { id });
        }
    }

    #[must_use]
    pub fn active_id(&self) -> Option<ArtifactId> {
        *self.inner.active.lock()
    }

    #[must_use]
    pub fn active(&self) -> Option<Artifact> {
        self.active_id().and_then(|id| self.inner.store.get(id))
    }

    #[must_use]
    pub fn artifact(&self, id: ArtifactId) -> Option<Artifact> {
        self.inner.store.get(id)
    }

    /// Snapshot of the collection, newest first
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.inner.store.snapshot()
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.inner.store
    }

    /// Observe session changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until every request queued so far for `id` has resolved
    pub async fn settle(&self, id: ArtifactId) {
        let barrier = self.inner.lanes.get(&id).and_then(|lane| lane.barrier());
        if let Some(done) = barrier {
            let _ = done.await;
        }
    }

    /// Settle every artifact, then wait for pending saves
    pub async fn settle_all(&self) {
        let ids: Vec<ArtifactId> = self.inner.lanes.iter().map(|e| *e.key()).collect();
        futures::future::join_all(ids.into_iter().map(|id| self.settle(id))).await;
        self.flush().await;
    }

    /// Wait until every save requested so far has been attempted
    pub async fn flush(&self) {
        self.inner.persister.flush().await;
    }

    /// Cached entitlement flag used for gated templates
    #[inline]
    #[must_use]
    pub fn is_entitled(&self) -> bool {
        self.inner.entitled.load(Ordering::SeqCst)
    }

    /// Ask the gate again and cache the answer
    pub async fn refresh_entitlement(&self) -> bool {
        let entitled = self.inner.gate.is_entitled().await;
        self.inner.entitled.store(entitled, Ordering::SeqCst);
        tracing::info!(entitled, "entitlement refreshed");
        entitled
    }

    /// Purchase `offer_id`; a success unlocks gated templates
    pub async fn purchase(&self, offer_id: &str) -> bool {
        let ok = self.inner.gate.purchase(offer_id).await;
        if ok {
            self.inner.entitled.store(true, Ordering::SeqCst);
        }
        tracing::info!(offer = offer_id, ok, "purchase finished");
        ok
    }

    /// Restore earlier purchases; a success unlocks gated templates
    pub async fn restore_purchases(&self) -> bool {
        let ok = self.inner.gate.restore().await;
        if ok {
            self.inner.entitled.store(true, Ordering::SeqCst);
        }
        tracing::info!(ok, "restore finished");
        ok
    }

    fn lane(&self, id: ArtifactId) -> RefMut<'_, ArtifactId, Lane> {
        self.inner
            .lanes
            .entry(id)
            .or_insert_with(|| Lane::spawn(id, Arc::downgrade(&self.inner)))
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_status(&self, id: ArtifactId) {
        if let Some(artifact) = self.store.get(id) {
            self.emit(SessionEvent::StatusChanged {
                id,
                status: artifact.status(),
            });
        }
    }

    fn emit_last_turn(&self, id: ArtifactId) {
        if let Some(turn) = self.store.get(id).and_then(|a| a.history().last().cloned()) {
            self.emit(SessionEvent::TurnAppended { id, turn });
        }
    }

    /// Submit an edit on the artifact: append the user turn, move to
    /// `Revising`, capture the provider context.
    fn begin_edit(&self, id: ArtifactId, instruction: &str) -> Option<EditDispatch> {
        match self.store.update_by_id(id, |a| a.submit_edit(instruction)) {
            Some(Ok(dispatch)) => {
                tracing::info!(artifact = %id, ticket = dispatch.ticket, "edit submitted");
                self.emit_last_turn(id);
                self.emit_status(id);
                self.persister.request_save();
                Some(dispatch)
            }
            Some(Err(e)) => {
                tracing::warn!(artifact = %id, error = %e, "edit rejected");
                None
            }
            None => {
                tracing::debug!(artifact = %id, "edit dropped: artifact not found");
                None
            }
        }
    }

    pub(crate) async fn run_generation(
        &self,
        id: ArtifactId,
        instruction: &str,
        failure_reason: &'static str,
        ticket: u64,
    ) {
        let result = self.provider.generate(instruction).await;
        if let Err(e) = &result {
            tracing::error!(
                artifact = %id,
                error = %e,
                transient = e.is_transient(),
                "generation failed"
            );
        }

        let completion = self.store.update_by_id(id, |a| {
            if a.revision() != ticket {
                return Completion::Stale {
                    current: a.revision(),
                };
            }
            let applied = match result {
                Ok(body) => a.complete_generation(body),
                Err(_) => a.fail_generation(failure_reason),
            };
            applied.map_or_else(Completion::Rejected, |()| Completion::Applied)
        });
        self.finish_completion(id, ticket, completion);
    }

    pub(crate) async fn run_revision(
        &self,
        id: ArtifactId,
        instruction: &str,
        dispatch: Option<EditDispatch>,
    ) {
        let dispatch = match dispatch {
            Some(d) => d,
            None => match self.begin_edit(id, instruction) {
                Some(d) => d,
                None => return,
            },
        };

        let result = self
            .provider
            .revise(&dispatch.body, &dispatch.prior_history, instruction)
            .await;
        if let Err(e) = &result {
            tracing::error!(
                artifact = %id,
                error = %e,
                transient = e.is_transient(),
                "revision failed"
            );
        }

        let ticket = dispatch.ticket;
        let completion = self.store.update_by_id(id, |a| {
            if a.revision() != ticket {
                return Completion::Stale {
                    current: a.revision(),
                };
            }
            let applied = match result {
                Ok(body) => a.complete_edit(body, EDIT_CONFIRMATION),
                Err(_) => a.fail_edit(EDIT_APOLOGY),
            };
            applied.map_or_else(Completion::Rejected, |()| Completion::Applied)
        });
        if matches!(completion, Some(Completion::Applied)) {
            self.emit_last_turn(id);
        }
        self.finish_completion(id, ticket, completion);
    }

    fn finish_completion(&self, id: ArtifactId, ticket: u64, completion: Option<Completion>) {
        match completion {
            Some(Completion::Applied) => {
                self.emit_status(id);
                if let Some(a) = self.store.get(id) {
                    tracing::info!(artifact = %id, status = %a.status(), "request resolved");
                }
                self.persister.request_save();
            }
            Some(Completion::Stale { current }) => {
                tracing::warn!(artifact = %id, ticket, current, "stale completion discarded");
            }
            Some(Completion::Rejected(e)) => {
                tracing::warn!(artifact = %id, error = %e, "completion rejected");
            }
            None => {
                tracing::debug!(artifact = %id, "completion discarded: artifact removed");
            }
        }
    }

    pub(crate) fn finish_request(&self, id: ArtifactId) {
        if let Some(mut lane) = self.lanes.get_mut(&id) {
            lane.outstanding = lane.outstanding.saturating_sub(1);
        }
    }

    /// Resolve requests that were in flight when the collection was saved:
    /// `Pending` fails, `Revising` falls back to its last good body.
    fn recover_interrupted(&self) -> usize {
        let mut recovered = 0;
        for id in self.store.ids() {
            let result = self.store.update_by_id(id, |a| match a.status() {
                ArtifactStatus::Pending => Some(a.fail_generation(INTERRUPTED_REASON)),
                ArtifactStatus::Revising => Some(a.fail_edit(EDIT_APOLOGY)),
                ArtifactStatus::Ready | ArtifactStatus::Failed => None,
            });
            match result.flatten() {
                Some(Ok(())) => {
                    tracing::debug!(artifact = %id, "interrupted request resolved");
                    recovered += 1;
                }
                Some(Err(e)) => tracing::warn!(artifact = %id, error = %e, "recovery rejected"),
                None => {}
            }
        }
        recovered
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::NoEntitlements;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use mab_artifact::Speaker;
    use mab_store::MemoryBlobStore;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Provider whose calls block until released, one permit per call
    struct GatedProvider {
        permits: Semaphore,
        started: AtomicUsize,
    }

    impl GatedProvider {
        fn new() -> Self {
            Self {
                permits: Semaphore::new(0),
                started: AtomicUsize::new(0),
            }
        }

        async fn wait_started(&self, n: usize) {
            tokio::time::timeout(Duration::from_secs(5), async {
                while self.started.load(Ordering::SeqCst) < n {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("provider call never started");
        }

        fn release(&self) {
            self.permits.add_permits(1);
        }

        async fn hold(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.permits.acquire().await.unwrap().forget();
        }
    }

    #[async_trait]
    impl CodeGenProvider for GatedProvider {
        async fn generate(&self, instruction: &str) -> Result<String, ProviderError> {
            self.hold().await;
            Ok(format!("<html>{instruction}</html>"))
        }

        async fn revise(
            &self,
            _body: &str,
            _prior_history: &[Turn],
            instruction: &str,
        ) -> Result<String, ProviderError> {
            self.hold().await;
            Ok(format!("<html>{instruction}</html>"))
        }
    }

    fn session(provider: Arc<GatedProvider>) -> SessionController {
        SessionController::new(
            &SessionConfig::default(),
            provider,
            Arc::new(NoEntitlements),
            ArtifactStore::new(Arc::new(MemoryBlobStore::new())),
        )
    }

    #[tokio::test]
    async fn late_generation_after_revision_bump_is_discarded() {
        let provider = Arc::new(GatedProvider::new());
        let session = session(provider.clone());

        let id = session.create("red button").unwrap();
        provider.wait_started(1).await;
        let bumped = session.store().update_by_id(id, Artifact::bump_revision).unwrap();

        provider.release();
        session.settle(id).await;

        let a = session.artifact(id).unwrap();
        assert_eq!(a.status(), ArtifactStatus::Pending);
        assert!(a.body().is_empty());
        assert_eq!(a.revision(), bumped);
    }

    #[tokio::test]
    async fn late_revision_after_revision_bump_is_discarded() {
        let provider = Arc::new(GatedProvider::new());
        let session = session(provider.clone());

        let id = session.create("red button").unwrap();
        provider.release();
        session.settle(id).await;
        assert_eq!(session.artifact(id).unwrap().body(), "<html>red button</html>");

        session.edit(id, "make it blue").unwrap();
        provider.wait_started(2).await;
        session.store().update_by_id(id, Artifact::bump_revision);

        provider.release();
        session.settle(id).await;

        let a = session.artifact(id).unwrap();
        assert_eq!(a.status(), ArtifactStatus::Revising);
        assert_eq!(a.body(), "<html>red button</html>");
        let last = a.history().last().unwrap();
        assert_eq!(last.speaker, Speaker::User);
        assert_eq!(last.text, "make it blue");
    }
}
