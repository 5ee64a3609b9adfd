//! The task listing page: owns the master task list, the signed-in user,
//! tab and view preferences, the board and the archived column.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, instrument, warn};

use crate::api::TaskBackend;
use crate::archive::{ArchiveBadge, ArchivedColumn};
use crate::board::{BoardDrop, Column, KanbanBoard};
use crate::drag::{DropTarget, NoOpReason, PendingMutation};
use crate::error::{ApiError, ApiResult};
use crate::mutator::OptimisticMutator;
use crate::notify::{Notice, Notifier};
use crate::organizer::ViewMode;
use crate::preferences::{PreferenceStore, Preferences};
use crate::store::{TaskCache, TaskUpdate};
use crate::tabs::{TabCounts, TaskTab, filter_tasks};
use crate::task::{Comment, CurrentUser, Status, Task, TaskDraft, TaskId, TaskPatch};

#[derive(Debug, Clone)]
pub struct PageSettings {
    pub timezone: Tz,
    pub archive_page_size: u32,
}

pub struct TasksPage<B> {
    backend: Arc<B>,
    master: TaskCache,
    user: Option<CurrentUser>,
    tab: TaskTab,
    board: KanbanBoard<B>,
    archive: ArchivedColumn,
    prefs: Arc<dyn PreferenceStore>,
    notifier: Arc<dyn Notifier>,
    mounted: bool,
}

impl<B: TaskBackend> TasksPage<B> {
    pub fn new(
        backend: Arc<B>,
        prefs: Arc<dyn PreferenceStore>,
        notifier: Arc<dyn Notifier>,
        settings: PageSettings,
    ) -> Self {
        let master = TaskCache::default();
        let mutator = OptimisticMutator::new(Arc::clone(&backend), TaskCache::default(), Arc::clone(&notifier))
            .with_listener(Arc::new(master.clone()));
        Self {
            board: KanbanBoard::new(mutator, ViewMode::default(), settings.timezone),
            archive: ArchivedColumn::new(settings.archive_page_size),
            backend,
            master,
            user: None,
            tab: TaskTab::default(),
            prefs,
            notifier,
            mounted: false,
        }
    }

    /// Restores the saved tab and view mode. Only the first call reads the
    /// store.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        let prefs = Preferences::load(self.prefs.as_ref());
        info!(tab = %prefs.tab, view = %prefs.view_mode, "restored preferences");
        self.tab = prefs.tab;
        self.board.set_view_mode(prefs.view_mode);
    }

    /// Fetches the user and the task list. On failure the page is left empty
    /// and the error is returned after being reported.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> ApiResult<()> {
        let user = match self.backend.current_user().await {
            Ok(user) => user,
            Err(err) => {
                self.clear();
                return Err(self.report("Could not load your profile", err));
            }
        };
        self.user = Some(user);

        let tasks = match self.backend.list_tasks().await {
            Ok(tasks) => tasks,
            Err(err) => {
                self.clear();
                return Err(self.report("Could not load tasks", err));
            }
        };
        info!(count = tasks.len(), "tasks loaded");
        self.master.replace_all(tasks);
        self.resync();
        Ok(())
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn tab(&self) -> TaskTab {
        self.tab
    }

    pub fn view_mode(&self) -> &ViewMode {
        self.board.view_mode()
    }

    pub fn set_tab(&mut self, tab: TaskTab) {
        self.tab = tab;
        if let Err(err) = Preferences::save_tab(self.prefs.as_ref(), tab) {
            warn!(error = %format!("{err:#}"), "failed to save active tab");
        }
        self.resync();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if let Err(err) = Preferences::save_view_mode(self.prefs.as_ref(), &mode) {
            warn!(error = %format!("{err:#}"), "failed to save view mode");
        }
        self.board.set_view_mode(mode);
    }

    /// Applies a change confirmed elsewhere (board, edit form, delete).
    pub fn handle_task_update(&self, id: TaskId, update: TaskUpdate) {
        self.master.apply_update(id, &update);
        self.resync();
    }

    pub fn master_tasks(&self) -> Vec<Task> {
        self.master.snapshot()
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        filter_tasks(&self.master.snapshot(), self.tab, self.user.as_ref())
    }

    pub fn tab_counts(&self) -> TabCounts {
        TabCounts::compute(&self.master.snapshot(), self.user.as_ref())
    }

    pub fn board(&self) -> &KanbanBoard<B> {
        &self.board
    }

    pub fn columns(&self, now: DateTime<Utc>) -> Vec<Column> {
        self.board.columns(now)
    }

    pub fn drag_start(&mut self, id: TaskId) -> bool {
        self.board.drag_start(id)
    }

    /// Applies a drop to the board at once. The page is free again when
    /// this returns: columns show the change and other cards can be dragged
    /// while [`commit`](Self::commit) is pending.
    pub fn begin_drop(&mut self, target: &DropTarget) -> Result<PendingMutation, NoOpReason> {
        self.board.begin_drop(target)
    }

    /// Pass the result to [`settle_drop`](Self::settle_drop) afterwards.
    pub async fn commit(&self, mutation: PendingMutation) -> BoardDrop {
        self.board.commit(mutation).await
    }

    pub async fn drop(&mut self, target: &DropTarget) -> BoardDrop {
        let result = self.board.drop(target).await;
        self.settle_drop(&result);
        result
    }

    pub async fn move_task(&mut self, id: TaskId, bucket: &str) -> BoardDrop {
        let result = self.board.move_task(id, bucket).await;
        self.settle_drop(&result);
        result
    }

    /// A confirmed move to archived invalidates the loaded archive pages.
    pub fn settle_drop(&mut self, result: &BoardDrop) {
        if let BoardDrop::Applied { patch, .. } = result
            && result.is_confirmed()
        {
            self.archive_changed(patch);
        }
    }

    fn archive_changed(&mut self, patch: &TaskPatch) {
        if patch.status == Some(Status::Archived) {
            self.archive.reset();
        }
    }

    pub fn archive(&self) -> &ArchivedColumn {
        &self.archive
    }

    pub async fn toggle_archived(&mut self) -> bool {
        self.archive.toggle(self.backend.as_ref()).await
    }

    pub async fn load_more_archived(&mut self) -> usize {
        self.archive.load_more(self.backend.as_ref()).await
    }

    pub fn archived_tasks(&self) -> Vec<Task> {
        self.archive.visible(self.tab, self.user.as_ref())
    }

    pub fn archived_badge(&self) -> ArchiveBadge {
        self.archive.badge(self.tab, self.user.as_ref())
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_task(&mut self, draft: &TaskDraft) -> ApiResult<Task> {
        match self.backend.create_task(draft).await {
            Ok(task) => {
                self.master.insert(task.clone());
                self.resync();
                self.notifier.notify(Notice::success(format!("Created \"{}\"", task.title)));
                Ok(task)
            }
            Err(err) => Err(self.report("Could not create the task", err)),
        }
    }

    /// Saves an edit made outside the board. Only the fields set in `patch`
    /// are sent and nothing changes locally until the backend accepts them.
    #[instrument(skip(self, patch))]
    pub async fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> ApiResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        match self.backend.update_task(id, patch).await {
            Ok(()) => {
                self.handle_task_update(id, TaskUpdate::Patched(patch.clone()));
                self.archive_changed(patch);
                Ok(())
            }
            Err(err) => Err(self.report("Could not save the task", err)),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&mut self, id: TaskId) -> ApiResult<()> {
        match self.backend.delete_task(id).await {
            Ok(()) => {
                self.handle_task_update(id, TaskUpdate::Deleted);
                Ok(())
            }
            Err(err) => Err(self.report("Could not delete the task", err)),
        }
    }

    pub async fn comments(&self, id: TaskId) -> ApiResult<Vec<Comment>> {
        self.backend
            .comments(id)
            .await
            .map_err(|err| self.report("Could not load comments", err))
    }

    pub async fn add_comment(&self, id: TaskId, content: &str) -> ApiResult<Comment> {
        self.backend
            .add_comment(id, content)
            .await
            .map_err(|err| self.report("Could not post the comment", err))
    }

    fn clear(&self) {
        self.master.replace_all(vec![]);
        self.resync();
    }

    fn resync(&self) {
        self.board.sync(self.filtered_tasks());
    }

    /// Authorization errors are left to the global handler.
    fn report(&self, what: &str, err: ApiError) -> ApiError {
        if !err.is_authorization() {
            self.notifier
                .notify(Notice::error(format!("{what}: {}", err.user_message())));
        }
        err
    }
}
