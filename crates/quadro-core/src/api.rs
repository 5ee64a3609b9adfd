use std::future::Future;

use crate::error::ApiResult;
use crate::task::{Comment, CurrentUser, Task, TaskDraft, TaskId, TaskPatch};

/// One page of archived tasks plus the server-side total.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchivedPage {
    pub items: Vec<Task>,
    pub total: usize,
}

/// Backend collaborator the board talks to. Every method is one request;
/// payloads come back already normalized into domain types.
pub trait TaskBackend: Send + Sync {
    fn current_user(&self) -> impl Future<Output = ApiResult<CurrentUser>> + Send;

    fn list_tasks(&self) -> impl Future<Output = ApiResult<Vec<Task>>> + Send;

    fn update_task(
        &self,
        id: TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// `page` is 1-based.
    fn archived_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<ArchivedPage>> + Send;

    fn create_task(&self, draft: &TaskDraft) -> impl Future<Output = ApiResult<Task>> + Send;

    fn delete_task(&self, id: TaskId) -> impl Future<Output = ApiResult<()>> + Send;

    fn comments(&self, id: TaskId) -> impl Future<Output = ApiResult<Vec<Comment>>> + Send;

    fn add_comment(
        &self,
        id: TaskId,
        content: &str,
    ) -> impl Future<Output = ApiResult<Comment>> + Send;
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ApiError;
    use crate::task::{TeamMembership, UserId};

    /// Records every call; `fail_next(op)` makes the next call of `op` fail.
    #[derive(Default)]
    pub struct MockBackend {
        pub tasks: Mutex<Vec<Task>>,
        pub archived: Mutex<Vec<Task>>,
        pub user: Option<CurrentUser>,
        updates: Mutex<Vec<(TaskId, TaskPatch)>>,
        archived_requests: Mutex<Vec<(u32, u32)>>,
        failing: Mutex<BTreeSet<&'static str>>,
    }

    impl MockBackend {
        pub fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                user: Some(CurrentUser {
                    id: UserId(1),
                    username: "ana".to_string(),
                    is_admin: false,
                    roles: vec![],
                    teams: vec![TeamMembership {
                        team: crate::task::TeamId(1),
                        is_manager: false,
                    }],
                }),
                ..Self::default()
            }
        }

        pub fn with_archived(archived: Vec<Task>) -> Self {
            Self {
                archived: Mutex::new(archived),
                ..Self::default()
            }
        }

        /// A task archived after some pages were read; later pages shift.
        pub fn archive_now(&self, task: Task) {
            self.archived.lock().insert(0, task);
        }

        pub fn fail_next(&self, op: &'static str) {
            self.failing.lock().insert(op);
        }

        pub fn updates(&self) -> Vec<(TaskId, TaskPatch)> {
            self.updates.lock().clone()
        }

        pub fn archived_requests(&self) -> Vec<(u32, u32)> {
            self.archived_requests.lock().clone()
        }

        fn check(&self, op: &'static str) -> ApiResult<()> {
            if self.failing.lock().remove(op) {
                return Err(ApiError::Backend(format!("{op} failed")));
            }
            Ok(())
        }
    }

    impl TaskBackend for MockBackend {
        async fn current_user(&self) -> ApiResult<CurrentUser> {
            self.check("user")?;
            self.user
                .clone()
                .ok_or_else(|| ApiError::Unauthorized("no user".to_string()))
        }

        async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
            self.check("list")?;
            Ok(self.tasks.lock().clone())
        }

        async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<()> {
            self.updates.lock().push((id, patch.clone()));
            self.check("update")
        }

        async fn archived_page(&self, page: u32, page_size: u32) -> ApiResult<ArchivedPage> {
            self.archived_requests.lock().push((page, page_size));
            self.check("archived")?;
            let start = ((page.max(1) - 1) * page_size) as usize;
            let archived = self.archived.lock();
            Ok(ArchivedPage {
                items: archived
                    .iter()
                    .skip(start)
                    .take(page_size as usize)
                    .cloned()
                    .collect(),
                total: archived.len(),
            })
        }

        async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
            self.check("create")?;
            let mut tasks = self.tasks.lock();
            let id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
            let mut task = Task::new(TaskId(id), draft.title.clone(), UserId(1));
            task.status = draft.status;
            task.priority = draft.priority;
            tasks.push(task.clone());
            Ok(task)
        }

        async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
            self.check("delete")?;
            self.tasks.lock().retain(|t| t.id != id);
            Ok(())
        }

        async fn comments(&self, _id: TaskId) -> ApiResult<Vec<Comment>> {
            self.check("comments")?;
            Ok(vec![])
        }

        async fn add_comment(&self, _id: TaskId, content: &str) -> ApiResult<Comment> {
            self.check("comment")?;
            Ok(Comment {
                id: 1,
                author: Some("ana".to_string()),
                content: content.to_string(),
                created_at: None,
            })
        }
    }
}
