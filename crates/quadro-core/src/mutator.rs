use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::api::TaskBackend;
use crate::drag::PendingMutation;
use crate::error::ApiError;
use crate::notify::{Notice, Notifier};
use crate::store::{TaskCache, TaskUpdate, TaskUpdateListener};

#[derive(Debug)]
pub enum MutationOutcome {
    /// The backend accepted the patch and the listener was told.
    Confirmed,
    /// The backend refused or was unreachable; patched fields were restored.
    RolledBack(ApiError),
    /// Nothing to send.
    Skipped,
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// Applies a patch to the local cache before the backend confirms it.
///
/// On failure every field named by the patch is restored from the snapshot
/// taken at drag start and a warning notice is emitted. Authorization
/// failures roll back silently since the session layer reports them.
pub struct OptimisticMutator<B> {
    backend: Arc<B>,
    cache: TaskCache,
    notifier: Arc<dyn Notifier>,
    listener: Option<Arc<dyn TaskUpdateListener>>,
}

impl<B: TaskBackend> OptimisticMutator<B> {
    pub fn new(backend: Arc<B>, cache: TaskCache, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            cache,
            notifier,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn TaskUpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    /// Merges the patch into the local cache. Callers render the result
    /// right away and hand the mutation to [`send`](Self::send) later.
    pub fn stage(&self, mutation: &PendingMutation) {
        if mutation.patch.is_empty() {
            return;
        }
        if !self.cache.merge(mutation.task_id, &mutation.patch) {
            warn!(id = %mutation.task_id, "optimistic target missing from cache; sending anyway");
        }
    }

    /// Sends a staged patch. Mutations on different tasks may be in flight
    /// at the same time; each one only rolls back its own fields.
    #[instrument(skip(self, mutation), fields(id = %mutation.task_id))]
    pub async fn send(&self, mutation: PendingMutation) -> MutationOutcome {
        let PendingMutation {
            task_id,
            patch,
            snapshot,
        } = mutation;
        if patch.is_empty() {
            return MutationOutcome::Skipped;
        }

        match self.backend.update_task(task_id, &patch).await {
            Ok(()) => {
                info!("task update confirmed");
                if let Some(listener) = &self.listener {
                    listener.task_updated(task_id, &TaskUpdate::Patched(patch));
                }
                MutationOutcome::Confirmed
            }
            Err(err) => {
                warn!(error = %err, "task update failed; rolling back");
                self.cache.revert(&snapshot, &patch);
                if !err.is_authorization() {
                    self.notifier.notify(Notice::warning(format!(
                        "Could not move \"{}\": {}",
                        snapshot.title,
                        err.user_message()
                    )));
                }
                MutationOutcome::RolledBack(err)
            }
        }
    }

    pub async fn apply(&self, mutation: PendingMutation) -> MutationOutcome {
        self.stage(&mutation);
        self.send(mutation).await
    }
}
