use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::api::TaskBackend;
use crate::drag::{DragCoordinator, DropResolution, DropTarget, NoOpReason, PendingMutation};
use crate::mutator::{MutationOutcome, OptimisticMutator};
use crate::organizer::{Bucket, BucketStyle, ViewMode, organize};
use crate::store::TaskCache;
use crate::task::{Status, Task, TaskId, TaskPatch};

/// One rendered kanban column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    pub style: BucketStyle,
    pub tasks: Vec<Task>,
}

impl From<Bucket> for Column {
    fn from(bucket: Bucket) -> Self {
        Self {
            id: bucket.id,
            style: bucket.style,
            tasks: bucket.tasks,
        }
    }
}

#[derive(Debug)]
pub enum BoardDrop {
    Ignored(NoOpReason),
    Applied {
        task_id: TaskId,
        patch: TaskPatch,
        outcome: MutationOutcome,
    },
}

impl BoardDrop {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Applied { outcome, .. } if outcome.is_confirmed())
    }
}

/// The board's own copy of the (tab-filtered) task list plus the drag and
/// mutation machinery acting on it.
pub struct KanbanBoard<B> {
    cache: TaskCache,
    mode: ViewMode,
    tz: Tz,
    drag: DragCoordinator,
    mutator: OptimisticMutator<B>,
}

impl<B: TaskBackend> KanbanBoard<B> {
    pub fn new(mutator: OptimisticMutator<B>, mode: ViewMode, tz: Tz) -> Self {
        Self {
            cache: mutator.cache().clone(),
            mode,
            tz,
            drag: DragCoordinator::new(),
            mutator,
        }
    }

    pub fn sync(&self, tasks: Vec<Task>) {
        self.cache.replace_all(tasks);
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.cache.snapshot()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.cache.get(id)
    }

    pub fn view_mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.drag.cancel();
        self.mode = mode;
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// The status board leaves archived tasks to the lazily loaded archived
    /// column.
    pub fn columns(&self, now: DateTime<Utc>) -> Vec<Column> {
        let tasks = self.cache.snapshot();
        organize(&tasks, &self.mode, now, &self.tz)
            .into_iter()
            .filter(|bucket| !(self.mode == ViewMode::Status && bucket.id == Status::Archived.as_str()))
            .map(Column::from)
            .collect()
    }

    pub fn drag_start(&mut self, id: TaskId) -> bool {
        match self.cache.get(id) {
            Some(task) => {
                self.drag.start(&task);
                true
            }
            None => {
                debug!(%id, "drag start on unknown task");
                false
            }
        }
    }

    pub fn drag_cancel(&mut self) {
        self.drag.cancel();
    }

    /// Resolves the drop and applies the patch to the board's cache right
    /// away. The drag session ends here, so another card can be dragged
    /// while the returned mutation is still being committed.
    #[instrument(skip(self), fields(target = target.bucket_id()))]
    pub fn begin_drop(&mut self, target: &DropTarget) -> Result<PendingMutation, NoOpReason> {
        let current = self.drag.active_task().and_then(|id| self.cache.get(id));
        match self.drag.drop_on(target, &self.mode, current.as_ref()) {
            DropResolution::NoOp(reason) => Err(reason),
            DropResolution::Mutate(mutation) => {
                self.mutator.stage(&mutation);
                self.drag.settle();
                Ok(mutation)
            }
        }
    }

    /// Sends a mutation from [`begin_drop`](Self::begin_drop), rolling its
    /// fields back if the backend refuses it.
    pub async fn commit(&self, mutation: PendingMutation) -> BoardDrop {
        let task_id = mutation.task_id;
        let patch = mutation.patch.clone();
        let outcome = self.mutator.send(mutation).await;
        BoardDrop::Applied {
            task_id,
            patch,
            outcome,
        }
    }

    pub async fn drop(&mut self, target: &DropTarget) -> BoardDrop {
        match self.begin_drop(target) {
            Ok(mutation) => self.commit(mutation).await,
            Err(reason) => BoardDrop::Ignored(reason),
        }
    }

    /// Drag of `id` straight onto the column `bucket`.
    pub async fn move_task(&mut self, id: TaskId, bucket: &str) -> BoardDrop {
        if !self.drag_start(id) {
            return BoardDrop::Ignored(NoOpReason::TaskGone);
        }
        self.drop(&DropTarget::column(bucket)).await
    }
}
