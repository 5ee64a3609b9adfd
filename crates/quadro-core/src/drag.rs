//! Drag-and-drop state machine: turns a drop on a column into at most one
//! single-field patch.

use std::fmt;

use tracing::{debug, warn};

use crate::organizer::{BoardField, ViewMode};
use crate::task::{Priority, Status, Task, TaskId, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub task_id: TaskId,
    /// The task as it was when the drag started; used for rollback.
    pub snapshot: Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(DragSession),
    Resolving(DragSession),
}

/// What the pointer was released over. A drop on a card inside a column
/// reports the card as `id` and the column as `sortable_container_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub id: String,
    pub sortable_container_id: Option<String>,
}

impl DropTarget {
    pub fn column(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sortable_container_id: None,
        }
    }

    pub fn card_in(card: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            id: card.into(),
            sortable_container_id: Some(column.into()),
        }
    }

    pub fn bucket_id(&self) -> &str {
        self.sortable_container_id.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoOpReason {
    NotDragging,
    UncontrolledView,
    TaskGone,
    SameBucket,
    UnknownBucket(String),
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDragging => f.write_str("no drag in progress"),
            Self::UncontrolledView => f.write_str("view mode does not control a task field"),
            Self::TaskGone => f.write_str("dragged task no longer exists"),
            Self::SameBucket => f.write_str("task already in that column"),
            Self::UnknownBucket(id) => write!(f, "unknown column '{id}'"),
        }
    }
}

/// A patch the mutator should apply, with the state to roll back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub task_id: TaskId,
    pub patch: TaskPatch,
    pub snapshot: Task,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResolution {
    NoOp(NoOpReason),
    Mutate(PendingMutation),
}

#[derive(Debug, Default)]
pub struct DragCoordinator {
    phase: DragPhase,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn active_task(&self) -> Option<TaskId> {
        match &self.phase {
            DragPhase::Idle => None,
            DragPhase::Dragging(session) | DragPhase::Resolving(session) => Some(session.task_id),
        }
    }

    /// Starts a drag, replacing any session already in progress.
    pub fn start(&mut self, task: &Task) {
        if let Some(previous) = self.active_task() {
            debug!(%previous, "replacing drag session");
        }
        debug!(task = %task.id, "drag start");
        self.phase = DragPhase::Dragging(DragSession {
            task_id: task.id,
            snapshot: task.clone(),
        });
    }

    /// Drag ended without a drop target.
    pub fn cancel(&mut self) {
        self.phase = DragPhase::Idle;
    }

    /// Resolves a drop. `current` is the live cached task, which may have
    /// changed since the drag started. A `Mutate` result leaves the
    /// coordinator in `Resolving` until [`settle`](Self::settle).
    #[tracing::instrument(skip(self, current), fields(target = target.bucket_id(), mode = %mode))]
    pub fn drop_on(&mut self, target: &DropTarget, mode: &ViewMode, current: Option<&Task>) -> DropResolution {
        let session = match std::mem::take(&mut self.phase) {
            DragPhase::Dragging(session) => session,
            other => {
                self.phase = other;
                return DropResolution::NoOp(NoOpReason::NotDragging);
            }
        };

        match resolve(&session, target.bucket_id(), mode, current) {
            Ok(patch) => {
                let mutation = PendingMutation {
                    task_id: session.task_id,
                    patch,
                    snapshot: session.snapshot.clone(),
                };
                self.phase = DragPhase::Resolving(session);
                DropResolution::Mutate(mutation)
            }
            Err(reason) => {
                debug!(%reason, "drop ignored");
                DropResolution::NoOp(reason)
            }
        }
    }

    /// The last drop has been handed to the mutator.
    pub fn settle(&mut self) {
        if matches!(self.phase, DragPhase::Resolving(_)) {
            self.phase = DragPhase::Idle;
        }
    }
}

fn resolve(
    session: &DragSession,
    destination: &str,
    mode: &ViewMode,
    current: Option<&Task>,
) -> Result<TaskPatch, NoOpReason> {
    let field = mode.controlled_field().ok_or(NoOpReason::UncontrolledView)?;
    let current = current
        .filter(|t| t.id == session.task_id)
        .ok_or(NoOpReason::TaskGone)?;

    match field {
        BoardField::Status => {
            let Some(status) = Status::from_wire(destination) else {
                warn!(destination, "drop on a column that is not a status");
                return Err(NoOpReason::UnknownBucket(destination.to_string()));
            };
            if current.status == status {
                return Err(NoOpReason::SameBucket);
            }
            Ok(TaskPatch::status(status))
        }
        BoardField::Priority => {
            let Some(priority) = Priority::from_wire(destination) else {
                warn!(destination, "drop on a column that is not a priority");
                return Err(NoOpReason::UnknownBucket(destination.to_string()));
            };
            if current.priority == priority {
                return Err(NoOpReason::SameBucket);
            }
            Ok(TaskPatch::priority(priority))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::UserId;

    fn task(id: u64) -> Task {
        Task::new(TaskId(id), format!("t{id}"), UserId(1))
    }

    #[test]
    fn drop_on_other_status_column_yields_single_field_patch() {
        let t = task(1);
        let mut drag = DragCoordinator::new();
        drag.start(&t);

        let resolution = drag.drop_on(&DropTarget::column("in_progress"), &ViewMode::Status, Some(&t));
        assert_eq!(
            resolution,
            DropResolution::Mutate(PendingMutation {
                task_id: TaskId(1),
                patch: TaskPatch::status(Status::InProgress),
                snapshot: t.clone(),
            })
        );
        assert!(matches!(drag.phase(), DragPhase::Resolving(_)));

        drag.settle();
        assert_eq!(drag.phase(), &DragPhase::Idle);
    }

    #[test]
    fn container_id_wins_over_card_id() {
        let t = task(1);
        let mut drag = DragCoordinator::new();
        drag.start(&t);

        let target = DropTarget::card_in("42", "alta");
        let resolution = drag.drop_on(&target, &ViewMode::Priority, Some(&t));
        assert!(matches!(
            resolution,
            DropResolution::Mutate(PendingMutation { ref patch, .. }) if *patch == TaskPatch::priority(Priority::Alta)
        ));
    }

    #[test]
    fn same_bucket_and_uncontrolled_views_are_no_ops() {
        let t = task(1);
        let mut drag = DragCoordinator::new();

        drag.start(&t);
        assert_eq!(
            drag.drop_on(&DropTarget::column("pending"), &ViewMode::Status, Some(&t)),
            DropResolution::NoOp(NoOpReason::SameBucket)
        );
        assert_eq!(drag.phase(), &DragPhase::Idle);

        drag.start(&t);
        assert_eq!(
            drag.drop_on(&DropTarget::column("today"), &ViewMode::DueDate, Some(&t)),
            DropResolution::NoOp(NoOpReason::UncontrolledView)
        );

        drag.start(&t);
        assert_eq!(
            drag.drop_on(&DropTarget::column("someday"), &ViewMode::Status, Some(&t)),
            DropResolution::NoOp(NoOpReason::UnknownBucket("someday".to_string()))
        );

        assert_eq!(
            drag.drop_on(&DropTarget::column("done"), &ViewMode::Status, Some(&t)),
            DropResolution::NoOp(NoOpReason::NotDragging)
        );
    }

    #[test]
    fn compares_against_current_task_not_snapshot() {
        let original = task(1);
        let mut drag = DragCoordinator::new();
        drag.start(&original);

        let mut current = original.clone();
        current.status = Status::Done;

        let resolution = drag.drop_on(&DropTarget::column("done"), &ViewMode::Status, Some(&current));
        assert_eq!(resolution, DropResolution::NoOp(NoOpReason::SameBucket));
    }

    #[test]
    fn new_drag_replaces_previous_session_and_cancel_resets() {
        let mut drag = DragCoordinator::new();
        drag.start(&task(1));
        drag.start(&task(2));
        assert_eq!(drag.active_task(), Some(TaskId(2)));

        drag.cancel();
        assert_eq!(drag.active_task(), None);
    }
}
