//! Wire types exchanged with the task
//! backend.
//!
//! These mirror the JSON the backend
//! actually sends, including its loose
//! shapes (tags and attachments may be a
//! bare string or an object, list fields
//! may be `null`). Normalization into the
//! domain model happens in `quadro_core`.

use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Done,
  Cancelled,
  Archived
}

impl TaskStatus {
  pub const ALL: [TaskStatus; 5] = [
    TaskStatus::Pending,
    TaskStatus::InProgress,
    TaskStatus::Done,
    TaskStatus::Cancelled,
    TaskStatus::Archived
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | TaskStatus::Pending => "pending",
      | TaskStatus::InProgress => {
        "in_progress"
      }
      | TaskStatus::Done => "done",
      | TaskStatus::Cancelled => {
        "cancelled"
      }
      | TaskStatus::Archived => {
        "archived"
      }
    }
  }

  pub fn from_wire(
    raw: &str
  ) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|status| {
        status.as_str() == raw
      })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
  Urgente,
  Alta,
  Media,
  Baixa
}

impl TaskPriority {
  pub const ALL: [TaskPriority; 4] = [
    TaskPriority::Urgente,
    TaskPriority::Alta,
    TaskPriority::Media,
    TaskPriority::Baixa
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | TaskPriority::Urgente => {
        "urgente"
      }
      | TaskPriority::Alta => "alta",
      | TaskPriority::Media => "media",
      | TaskPriority::Baixa => "baixa"
    }
  }

  pub fn from_wire(
    raw: &str
  ) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|priority| {
        priority.as_str() == raw
      })
  }
}

/// A tag is either a bare name or a
/// `{name, color}` object.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum TagDto {
  Name(String),
  Styled {
    name:  String,
    #[serde(default)]
    color: Option<String>
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct AttachmentObject {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub url:  Option<String>,
  #[serde(default)]
  pub size: Option<u64>,
  #[serde(
    default,
    rename = "type",
    alias = "mime_type"
  )]
  pub mime: Option<String>
}

/// Attachments arrive either as a stored
/// filename or as a full descriptor.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum AttachmentDto {
  FileName(String),
  Descriptor(AttachmentObject)
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum UserRefDto {
  Id(u64),
  Object { id: u64 }
}

impl UserRefDto {
  pub fn id(self) -> u64 {
    match self {
      | UserRefDto::Id(id)
      | UserRefDto::Object { id } => id
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SubtaskDto {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub done:  bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct TaskDto {
  pub id: Option<u64>,
  #[serde(default)]
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub status:      Option<String>,
  #[serde(
    default,
    alias = "priority"
  )]
  pub prioridade:  Option<String>,
  #[serde(default)]
  pub due_date:    Option<String>,
  #[serde(default)]
  pub user_id:     Option<u64>,
  #[serde(default)]
  pub assigned_by_user_id:
    Option<u64>,
  #[serde(default)]
  pub team_id:     Option<u64>,
  #[serde(
    default,
    alias = "assigned_users"
  )]
  pub assignees:
    Option<Vec<UserRefDto>>,
  #[serde(default)]
  pub collaborators:
    Option<Vec<UserRefDto>>,
  #[serde(default)]
  pub tags: Option<Vec<TagDto>>,
  #[serde(
    default,
    alias = "attachments"
  )]
  pub anexos:
    Option<Vec<AttachmentDto>>,
  #[serde(default)]
  pub subtasks:
    Option<Vec<SubtaskDto>>,
  #[serde(default)]
  pub requires_approval: Option<bool>,
  #[serde(default)]
  pub approval_status: Option<String>,
  #[serde(default)]
  pub approved_by_user_id: Option<u64>,
  #[serde(default)]
  pub approved_at: Option<String>,
  #[serde(default)]
  pub created_at:  Option<String>,
  #[serde(default)]
  pub updated_at:  Option<String>
}

/// Partial update body for
/// `PUT /tasks/{id}`. Absent fields are
/// not serialized; `Some(None)` clears a
/// nullable field.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub status: Option<TaskStatus>,
  #[serde(
    default,
    rename = "prioridade",
    skip_serializing_if = "Option::is_none"
  )]
  pub priority: Option<TaskPriority>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date: Option<Option<String>>
}

impl TaskPatch {
  pub fn status(
    status: TaskStatus
  ) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }

  pub fn priority(
    priority: TaskPriority
  ) -> Self {
    Self {
      priority: Some(priority),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }
}

/// Fields of `POST /tasks`. The backend
/// reads them as multipart form fields,
/// with `tags` JSON-encoded.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TaskCreate {
  pub title:         String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:   Option<String>,
  pub status:        TaskStatus,
  pub prioridade:    TaskPriority,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:      Option<String>,
  pub tags:          Vec<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub team_id:       Option<u64>,
  pub collaborators: Vec<u64>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct ArchivedPageDto {
  #[serde(default)]
  pub items: Vec<TaskDto>,
  #[serde(default)]
  pub total: u64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum RoleRefDto {
  Name(String),
  Object { name: String }
}

impl RoleRefDto {
  pub fn name(&self) -> &str {
    match self {
      | RoleRefDto::Name(name)
      | RoleRefDto::Object { name } => {
        name
      }
    }
  }
}

/// Membership rows come as `{id, ...}`
/// from `/users/me` and as
/// `{team_id, ...}` from older payloads.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TeamMembershipDto {
  #[serde(default)]
  pub id:         Option<u64>,
  #[serde(default)]
  pub team_id:    Option<u64>,
  #[serde(default)]
  pub name:       Option<String>,
  #[serde(default)]
  pub is_manager: bool
}

impl TeamMembershipDto {
  pub fn team_key(&self) -> Option<u64> {
    self.team_id.or(self.id)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct UserDto {
  pub id:         u64,
  #[serde(default)]
  pub username:   String,
  #[serde(default)]
  pub email:      Option<String>,
  #[serde(default)]
  pub is_admin:   bool,
  #[serde(default)]
  pub is_manager: bool,
  #[serde(default)]
  pub roles: Option<Vec<RoleRefDto>>,
  #[serde(
    default,
    alias = "teams",
    alias = "user_teams"
  )]
  pub equipes:
    Option<Vec<TeamMembershipDto>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct CommentAuthorDto {
  pub id:       u64,
  #[serde(default)]
  pub name:     Option<String>,
  #[serde(default)]
  pub username: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct CommentDto {
  pub id:         u64,
  #[serde(default)]
  pub content:    String,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub task_id:    Option<u64>,
  #[serde(default)]
  pub user_id:    Option<u64>,
  #[serde(default)]
  pub user: Option<CommentAuthorDto>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CommentCreate {
  pub content: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginResponse {
  pub access_token:  String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub user:          Option<UserDto>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RefreshResponse {
  pub access_token:  String,
  #[serde(default)]
  pub refresh_token: Option<String>
}

/// Error payload. The backend uses
/// `error` for validation failures and
/// `msg` for auth failures.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct ErrorBody {
  #[serde(default)]
  pub error:   Option<String>,
  #[serde(default)]
  pub msg:     Option<String>,
  #[serde(default)]
  pub message: Option<String>
}

impl ErrorBody {
  pub fn into_message(
    self
  ) -> Option<String> {
    self
      .error
      .or(self.msg)
      .or(self.message)
      .filter(|text| {
        !text.trim().is_empty()
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_dto_accepts_mixed_tag_and_attachment_shapes()
   {
    let raw = r##"{
      "id": 7,
      "title": "Relatório",
      "status": "pending",
      "prioridade": "alta",
      "tags": ["interno", {"name": "cliente", "color": "#e74c3c"}],
      "anexos": ["ata.pdf", {"name": "plan.xlsx", "size": 2048, "type": "application/vnd.ms-excel"}],
      "collaborators": [3, {"id": 4}],
      "subtasks": null
    }"##;

    let dto: TaskDto =
      serde_json::from_str(raw)
        .expect("task dto parses");

    assert_eq!(dto.id, Some(7));
    let tags =
      dto.tags.expect("tags present");
    assert_eq!(
      tags[0],
      TagDto::Name(
        "interno".to_string()
      )
    );
    assert!(matches!(
      &tags[1],
      TagDto::Styled { name, color: Some(_) } if name == "cliente"
    ));

    let anexos = dto
      .anexos
      .expect("attachments present");
    assert_eq!(
      anexos[0],
      AttachmentDto::FileName(
        "ata.pdf".to_string()
      )
    );
    match &anexos[1] {
      | AttachmentDto::Descriptor(
        obj
      ) => {
        assert_eq!(obj.size, Some(2048));
        assert_eq!(
          obj.mime.as_deref(),
          Some(
            "application/vnd.ms-excel"
          )
        );
      }
      | other => {
        panic!(
          "unexpected attachment \
           shape: {other:?}"
        )
      }
    }

    let collaborators: Vec<u64> = dto
      .collaborators
      .expect("collaborators present")
      .into_iter()
      .map(UserRefDto::id)
      .collect();
    assert_eq!(collaborators, vec![3, 4]);
    assert!(dto.subtasks.is_none());
  }

  #[test]
  fn patch_serializes_only_present_fields()
   {
    let patch = TaskPatch::status(
      TaskStatus::InProgress
    );
    let json =
      serde_json::to_string(&patch)
        .expect("patch serializes");
    assert_eq!(
      json,
      r#"{"status":"in_progress"}"#
    );

    let patch = TaskPatch::priority(
      TaskPriority::Urgente
    );
    let json =
      serde_json::to_string(&patch)
        .expect("patch serializes");
    assert_eq!(
      json,
      r#"{"prioridade":"urgente"}"#
    );

    let cleared = TaskPatch {
      due_date: Some(None),
      ..TaskPatch::default()
    };
    let json =
      serde_json::to_string(&cleared)
        .expect("patch serializes");
    assert_eq!(
      json,
      r#"{"due_date":null}"#
    );
  }

  #[test]
  fn user_dto_reads_team_rows_in_either_shape()
   {
    let raw = r#"{
      "id": 1,
      "username": "ana",
      "roles": ["Gestor", {"name": "viewer"}],
      "user_teams": [{"team_id": 10, "is_manager": true}, {"id": 11}]
    }"#;
    let user: UserDto =
      serde_json::from_str(raw)
        .expect("user parses");
    let teams = user
      .equipes
      .expect("teams present");
    assert_eq!(
      teams[0].team_key(),
      Some(10)
    );
    assert!(teams[0].is_manager);
    assert_eq!(
      teams[1].team_key(),
      Some(11)
    );
    let roles = user
      .roles
      .expect("roles present");
    assert_eq!(roles[0].name(), "Gestor");
    assert_eq!(roles[1].name(), "viewer");
  }

  #[test]
  fn error_body_prefers_error_then_msg()
   {
    let body: ErrorBody =
      serde_json::from_str(
        r#"{"msg": "Token expirado"}"#
      )
      .expect("error body parses");
    assert_eq!(
      body.into_message().as_deref(),
      Some("Token expirado")
    );

    let empty: ErrorBody =
      serde_json::from_str(
        r#"{"error": "  "}"#
      )
      .expect("error body parses");
    assert!(
      empty.into_message().is_none()
    );
  }
}
