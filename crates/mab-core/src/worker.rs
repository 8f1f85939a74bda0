//! Background workers
//!
//! - One lane per artifact: an mpsc-fed task that runs create/edit requests
//!   for that artifact strictly one after another
//! - One persister per session: coalesces save requests and writes the
//!   whole collection

use crate::session::Inner;
use mab_artifact::{ArtifactId, EditDispatch};
use mab_store::ArtifactStore;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

/// Work queued on an artifact's lane
#[derive(Debug)]
pub(crate) enum Request {
    /// First generation for a freshly created artifact
    Generate {
        instruction: String,
        failure_reason: &'static str,
        ticket: u64,
    },
    /// Edit; `dispatch` is `None` when the edit was queued behind another
    /// request and still has to be submitted on the artifact
    Revise {
        instruction: String,
        dispatch: Option<EditDispatch>,
    },
    /// Resolves once every earlier request on the lane has finished
    Barrier(oneshot::Sender<()>),
}

/// Sender side of an artifact's lane
#[derive(Debug)]
pub(crate) struct Lane {
    tx: mpsc::UnboundedSender<Request>,
    /// Generate/Revise requests queued or running
    pub(crate) outstanding: usize,
}

impl Lane {
    /// Spawn the lane task for `id`
    pub(crate) fn spawn(id: ArtifactId, inner: Weak<Inner>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lane(id, inner, rx));
        Self { tx, outstanding: 0 }
    }

    /// Queue a Generate/Revise request
    pub(crate) fn submit(&mut self, request: Request) {
        self.outstanding += 1;
        if self.tx.send(request).is_err() {
            self.outstanding -= 1;
            tracing::warn!("lane closed, request dropped");
        }
    }

    /// Queue a barrier; `None` if the lane task is gone
    pub(crate) fn barrier(&self) -> Option<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Request::Barrier(tx)).ok().map(|()| rx)
    }
}

async fn run_lane(id: ArtifactId, inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match request {
            Request::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
            Request::Generate {
                instruction,
                failure_reason,
                ticket,
            } => {
                inner
                    .run_generation(id, &instruction, failure_reason, ticket)
                    .await;
            }
            Request::Revise {
                instruction,
                dispatch,
            } => {
                inner.run_revision(id, &instruction, dispatch).await;
            }
        }

        inner.finish_request(id);
    }
    tracing::trace!(artifact = %id, "lane closed");
}

enum PersistRequest {
    Save,
    Flush(oneshot::Sender<()>),
}

/// Handle to the session's persister task
#[derive(Debug)]
pub(crate) struct Persister {
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl Persister {
    pub(crate) fn spawn(store: Arc<ArtifactStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persister(store, rx));
        Self { tx }
    }

    /// Ask for the current collection to be written
    pub(crate) fn request_save(&self) {
        let _ = self.tx.send(PersistRequest::Save);
    }

    /// Wait until every save requested so far has been attempted
    pub(crate) async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(PersistRequest::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_persister(store: Arc<ArtifactStore>, mut rx: mpsc::UnboundedReceiver<PersistRequest>) {
    while let Some(request) = rx.recv().await {
        let mut flushes = Vec::new();
        let mut save = false;
        match request {
            PersistRequest::Save => save = true,
            PersistRequest::Flush(done) => flushes.push(done),
        }

        // Coalesce everything already queued into one write
        while let Ok(next) = rx.try_recv() {
            match next {
                PersistRequest::Save => save = true,
                PersistRequest::Flush(done) => flushes.push(done),
            }
        }

        if save {
            if let Err(e) = store.persist().await {
                tracing::warn!(
                    error = %e,
                    location = %store.location(),
                    "failed to persist artifact collection, keeping in-memory state"
                );
            }
        }

        for done in flushes {
            let _ = done.send(());
        }
    }
}
