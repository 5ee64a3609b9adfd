use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quadro_shared::{
    AttachmentDto, CommentDto, TagDto, TaskCreate, TaskDto, UserDto, UserRefDto,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::datetime::{format_backend_datetime, parse_backend_datetime};
use crate::error::IngestError;

pub use quadro_shared::{TaskPatch, TaskPriority as Priority, TaskStatus as Status};

const DEFAULT_MIME: &str = "application/octet-stream";
const NEUTRAL_TAG_COLOR: &str = "#95a5a6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TaskId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub color: Option<String>,
}

impl Tag {
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(NEUTRAL_TAG_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtask {
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub required: bool,
    pub status: ApprovalStatus,
    pub approver: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub owner: UserId,
    pub assigned_by: Option<UserId>,
    pub team: Option<TeamId>,
    pub assignees: BTreeSet<UserId>,
    pub collaborators: BTreeSet<UserId>,
    pub tags: Vec<Tag>,
    pub attachments: Vec<Attachment>,
    pub subtasks: Vec<Subtask>,
    pub approval: Option<Approval>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Settings needed to turn wire payloads into tasks.
#[derive(Debug, Clone)]
pub struct IngestContext {
    /// Base URL stored filenames are resolved against.
    pub uploads_url: String,
}

impl IngestContext {
    pub fn new(uploads_url: impl Into<String>) -> Self {
        Self {
            uploads_url: uploads_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn upload_url(&self, name: &str) -> String {
        format!("{}/{}", self.uploads_url, name)
    }
}

impl Task {
    /// Minimal pending task, mostly for tests and drafts echoed back by the backend.
    pub fn new(id: TaskId, title: impl Into<String>, owner: UserId) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            status: Status::Pending,
            priority: Priority::Media,
            due_date: None,
            owner,
            assigned_by: None,
            team: None,
            assignees: BTreeSet::new(),
            collaborators: BTreeSet::new(),
            tags: vec![],
            attachments: vec![],
            subtasks: vec![],
            approval: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Normalizes a wire payload. Every loosely-shaped field is resolved here
    /// so nothing downstream branches on payload shape.
    pub fn from_dto(dto: TaskDto, ctx: &IngestContext) -> Result<Self, IngestError> {
        let id = dto.id.ok_or(IngestError::MissingId)?;
        let status = match dto.status.as_deref() {
            None => Status::Pending,
            Some(raw) => parse_status(raw).ok_or_else(|| IngestError::UnknownStatus {
                id,
                status: raw.to_string(),
            })?,
        };
        let priority = match dto.prioridade.as_deref() {
            Some(raw) => parse_priority(raw).unwrap_or_else(|| {
                warn!(task = id, priority = raw, "unknown priority; using media");
                Priority::Media
            }),
            None => Priority::Media,
        };
        let owner = dto.user_id.ok_or(IngestError::MissingOwner { id })?;

        let approval = match (dto.requires_approval, dto.approval_status.as_deref()) {
            (None, None) => None,
            (required, status) => Some(Approval {
                required: required.unwrap_or(false),
                status: status.map(ApprovalStatus::parse).unwrap_or(ApprovalStatus::None),
                approver: dto.approved_by_user_id.map(UserId),
                decided_at: dto.approved_at.as_deref().and_then(parse_backend_datetime),
            }),
        };

        Ok(Self {
            id: TaskId(id),
            title: dto.title,
            description: dto.description.unwrap_or_default(),
            status,
            priority,
            due_date: dto.due_date.as_deref().and_then(parse_backend_datetime),
            owner: UserId(owner),
            assigned_by: dto.assigned_by_user_id.map(UserId),
            team: dto.team_id.map(TeamId),
            assignees: user_set(dto.assignees),
            collaborators: user_set(dto.collaborators),
            tags: dto
                .tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(normalize_tag)
                .collect(),
            attachments: dto
                .anexos
                .unwrap_or_default()
                .into_iter()
                .filter_map(|raw| normalize_attachment(raw, ctx))
                .collect(),
            subtasks: dto
                .subtasks
                .unwrap_or_default()
                .into_iter()
                .map(|s| Subtask {
                    title: s.title,
                    done: s.done,
                })
                .collect(),
            approval,
            created_at: dto.created_at.as_deref().and_then(parse_backend_datetime),
            updated_at: dto.updated_at.as_deref().and_then(parse_backend_datetime),
        })
    }

    /// Merges `patch` into this task.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone().unwrap_or_default();
        }
        if let Some(due) = &patch.due_date {
            match due.as_deref() {
                None => self.due_date = None,
                Some(raw) => match parse_backend_datetime(raw) {
                    Some(parsed) => self.due_date = Some(parsed),
                    None => warn!(task = %self.id, due = raw, "ignoring unparseable due date"),
                },
            }
        }
    }

    /// Restores every field named by `patch` to its value in `snapshot`,
    /// leaving fields the patch did not touch alone.
    pub fn revert_fields(&mut self, snapshot: &Task, patch: &TaskPatch) {
        if patch.status.is_some() {
            self.status = snapshot.status;
        }
        if patch.priority.is_some() {
            self.priority = snapshot.priority;
        }
        if patch.title.is_some() {
            self.title = snapshot.title.clone();
        }
        if patch.description.is_some() {
            self.description = snapshot.description.clone();
        }
        if patch.due_date.is_some() {
            self.due_date = snapshot.due_date;
        }
    }

    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.done).count();
        (done, self.subtasks.len())
    }
}

/// Accepts the enumerated wire ids in any case, accent or separator spelling.
pub fn parse_status(raw: &str) -> Option<Status> {
    Status::from_wire(&fold(raw).replace([' ', '-'], "_"))
}

pub fn parse_priority(raw: &str) -> Option<Priority> {
    Priority::from_wire(&fold(raw))
}

fn fold(raw: &str) -> String {
    deunicode::deunicode(raw.trim()).to_lowercase()
}

fn user_set(raw: Option<Vec<UserRefDto>>) -> BTreeSet<UserId> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|r| UserId(r.id()))
        .collect()
}

fn normalize_tag(raw: TagDto) -> Option<Tag> {
    let (name, color) = match raw {
        TagDto::Name(name) => (name, None),
        TagDto::Styled { name, color } => (name, color.filter(|c| !c.trim().is_empty())),
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(Tag { name, color })
}

fn normalize_attachment(raw: AttachmentDto, ctx: &IngestContext) -> Option<Attachment> {
    match raw {
        AttachmentDto::FileName(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(Attachment {
                url: ctx.upload_url(&name),
                name,
                size: 0,
                mime_type: DEFAULT_MIME.to_string(),
            })
        }
        AttachmentDto::Descriptor(obj) => {
            let name = obj
                .name
                .filter(|n| !n.trim().is_empty())
                .or_else(|| {
                    obj.url
                        .as_deref()
                        .and_then(|u| u.rsplit('/').next())
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                })?;
            Some(Attachment {
                url: obj.url.unwrap_or_else(|| ctx.upload_url(&name)),
                size: obj.size.unwrap_or(0),
                mime_type: obj.mime.unwrap_or_else(|| DEFAULT_MIME.to_string()),
                name,
            })
        }
    }
}

/// Ingests a batch, dropping (and logging) payloads that violate the task
/// invariants instead of failing the whole list.
pub fn ingest_all(dtos: Vec<TaskDto>, ctx: &IngestContext) -> Vec<Task> {
    dtos.into_iter()
        .filter_map(|dto| match Task::from_dto(dto, ctx) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(error = %err, "dropping malformed task payload");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMembership {
    pub team: TeamId,
    pub is_manager: bool,
}

/// The signed-in user, as far as task visibility rules are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub roles: Vec<String>,
    pub teams: Vec<TeamMembership>,
}

const MANAGER_ROLES: [&str; 4] = ["manager", "gestor", "admin", "administrador"];

impl CurrentUser {
    pub fn from_dto(dto: UserDto) -> Self {
        Self {
            id: UserId(dto.id),
            username: dto.username,
            is_admin: dto.is_admin,
            roles: dto
                .roles
                .unwrap_or_default()
                .iter()
                .map(|r| r.name().to_string())
                .collect(),
            teams: dto
                .equipes
                .unwrap_or_default()
                .into_iter()
                .filter_map(|row| {
                    row.team_key().map(|id| TeamMembership {
                        team: TeamId(id),
                        is_manager: row.is_manager,
                    })
                })
                .collect(),
        }
    }

    pub fn is_manager(&self) -> bool {
        self.is_admin
            || self
                .roles
                .iter()
                .any(|r| MANAGER_ROLES.contains(&r.trim().to_lowercase().as_str()))
            || self.teams.iter().any(|t| t.is_manager)
    }

    pub fn team_ids(&self) -> BTreeSet<TeamId> {
        self.teams.iter().map(|t| t.team).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub author: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<CommentDto> for Comment {
    fn from(dto: CommentDto) -> Self {
        Self {
            id: dto.id,
            author: dto.user.and_then(|u| u.name.or(u.username)),
            content: dto.content,
            created_at: dto.created_at.as_deref().and_then(parse_backend_datetime),
        }
    }
}

/// Fields collected by a task form before the backend assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub team: Option<TeamId>,
    pub collaborators: Vec<UserId>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: Status::Pending,
            priority: Priority::Media,
            due_date: None,
            tags: vec![],
            team: None,
            collaborators: vec![],
        }
    }

    pub fn to_wire(&self) -> TaskCreate {
        TaskCreate {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            prioridade: self.priority,
            due_date: self.due_date.map(format_backend_datetime),
            tags: self.tags.clone(),
            team_id: self.team.map(|t| t.0),
            collaborators: self.collaborators.iter().map(|u| u.0).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use quadro_shared::{AttachmentObject, SubtaskDto};

    use super::*;

    fn ctx() -> IngestContext {
        IngestContext::new("http://files.local/uploads/")
    }

    fn dto(id: u64) -> TaskDto {
        TaskDto {
            id: Some(id),
            title: format!("task {id}"),
            status: Some("pending".to_string()),
            prioridade: Some("alta".to_string()),
            user_id: Some(1),
            ..TaskDto::default()
        }
    }

    #[test]
    fn normalizes_tags_and_attachments_at_ingestion() {
        let mut raw = dto(5);
        raw.tags = Some(vec![
            TagDto::Name(" interno ".to_string()),
            TagDto::Name("".to_string()),
            TagDto::Styled {
                name: "cliente".to_string(),
                color: Some("#e74c3c".to_string()),
            },
        ]);
        raw.anexos = Some(vec![
            AttachmentDto::FileName("ata.pdf".to_string()),
            AttachmentDto::Descriptor(AttachmentObject {
                name: None,
                url: Some("http://cdn.local/x/plan.xlsx".to_string()),
                size: Some(10),
                mime: None,
            }),
        ]);
        raw.subtasks = Some(vec![
            SubtaskDto {
                title: "a".to_string(),
                done: true,
            },
            SubtaskDto {
                title: "b".to_string(),
                done: false,
            },
        ]);

        let task = Task::from_dto(raw, &ctx()).expect("valid task");
        assert_eq!(
            task.tags,
            vec![
                Tag {
                    name: "interno".to_string(),
                    color: None
                },
                Tag {
                    name: "cliente".to_string(),
                    color: Some("#e74c3c".to_string())
                },
            ]
        );
        assert_eq!(task.tags[0].color_or_default(), NEUTRAL_TAG_COLOR);
        assert_eq!(task.attachments[0].url, "http://files.local/uploads/ata.pdf");
        assert_eq!(task.attachments[0].mime_type, DEFAULT_MIME);
        assert_eq!(task.attachments[1].name, "plan.xlsx");
        assert_eq!(task.attachments[1].size, 10);
        assert_eq!(task.subtask_progress(), (1, 2));
    }

    #[test]
    fn rejects_payloads_without_id_or_with_unknown_status() {
        let mut raw = dto(1);
        raw.id = None;
        assert_eq!(Task::from_dto(raw, &ctx()), Err(IngestError::MissingId));

        let mut raw = dto(2);
        raw.status = Some("A fazer".to_string());
        assert!(matches!(
            Task::from_dto(raw, &ctx()),
            Err(IngestError::UnknownStatus { id: 2, .. })
        ));

        let mut ok = dto(3);
        ok.status = None;
        let mut bad = dto(4);
        bad.id = None;
        let tasks = ingest_all(vec![ok, bad], &ctx());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, Status::Pending);
    }

    #[test]
    fn priority_spellings_are_folded() {
        assert_eq!(parse_priority("Média"), Some(Priority::Media));
        assert_eq!(parse_priority("ALTA"), Some(Priority::Alta));
        assert_eq!(parse_priority("critica"), None);
        assert_eq!(parse_status("In Progress"), Some(Status::InProgress));

        let mut raw = dto(9);
        raw.prioridade = Some("critica".to_string());
        let task = Task::from_dto(raw, &ctx()).expect("valid task");
        assert_eq!(task.priority, Priority::Media);
    }

    #[test]
    fn patch_then_revert_restores_only_patched_fields() {
        let mut task = Task::new(TaskId(1), "Plan", UserId(1));
        let snapshot = task.clone();

        let patch = TaskPatch::status(Status::Done);
        task.apply_patch(&patch);
        task.title = "Plan v2".to_string();
        assert_eq!(task.status, Status::Done);

        task.revert_fields(&snapshot, &patch);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(task.title, "Plan v2");
    }

    #[test]
    fn due_date_patch_sets_and_clears() {
        let mut task = Task::new(TaskId(1), "Plan", UserId(1));
        task.apply_patch(&TaskPatch {
            due_date: Some(Some("2025-02-01T12:00:00Z".to_string())),
            ..TaskPatch::default()
        });
        assert_eq!(
            task.due_date,
            Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).single()
        );

        task.apply_patch(&TaskPatch {
            due_date: Some(Some("soon".to_string())),
            ..TaskPatch::default()
        });
        assert!(task.due_date.is_some());

        task.apply_patch(&TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        });
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn manager_detection_covers_flag_role_and_team() {
        let base = CurrentUser {
            id: UserId(1),
            username: "ana".to_string(),
            is_admin: false,
            roles: vec!["viewer".to_string()],
            teams: vec![TeamMembership {
                team: TeamId(3),
                is_manager: false,
            }],
        };
        assert!(!base.is_manager());

        let mut by_role = base.clone();
        by_role.roles.push(" Gestor ".to_string());
        assert!(by_role.is_manager());

        let mut by_team = base.clone();
        by_team.teams[0].is_manager = true;
        assert!(by_team.is_manager());

        let mut by_flag = base;
        by_flag.is_admin = true;
        assert!(by_flag.is_manager());
    }
}
