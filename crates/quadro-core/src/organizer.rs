//! Partitions a flat task list into kanban buckets for a view mode.
//!
//! Buckets are ephemeral: they are recomputed from `(tasks, mode, now)` on
//! every call and never cached.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::datetime::local_date;
use crate::task::{Priority, Status, Task};

pub const ALL_BUCKET: &str = "all";
pub const OVERDUE_BUCKET: &str = "overdue";
pub const TODAY_BUCKET: &str = "today";
pub const THIS_WEEK_BUCKET: &str = "this_week";
pub const NO_DATE_BUCKET: &str = "no_date";

const NEUTRAL_COLOR: &str = "#95a5a6";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    #[default]
    Status,
    Priority,
    DueDate,
    Alphabetical,
    /// Any identifier the board does not know; rendered as one unsorted bucket.
    Other(String),
}

/// Task field a drag between buckets rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardField {
    Status,
    Priority,
}

impl ViewMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "status" => Self::Status,
            "priority" => Self::Priority,
            "due_date" => Self::DueDate,
            "alphabetical" => Self::Alphabetical,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::Priority => "priority",
            Self::DueDate => "due_date",
            Self::Alphabetical => "alphabetical",
            Self::Other(raw) => raw,
        }
    }

    /// Only status and priority boards mutate tasks on drop.
    pub fn controlled_field(&self) -> Option<BoardField> {
        match self {
            Self::Status => Some(BoardField::Status),
            Self::Priority => Some(BoardField::Priority),
            _ => None,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStyle {
    pub title: String,
    pub icon: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub id: String,
    pub style: BucketStyle,
    pub tasks: Vec<Task>,
}

impl Bucket {
    fn new(mode: &ViewMode, id: &str, tasks: Vec<Task>) -> Self {
        Self {
            id: id.to_string(),
            style: column_style(mode, id),
            tasks,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Bucket ids in display order.
pub fn bucket_ids(mode: &ViewMode) -> Vec<&'static str> {
    match mode {
        ViewMode::Status => Status::ALL.iter().map(|s| s.as_str()).collect(),
        ViewMode::Priority => Priority::ALL.iter().map(|p| p.as_str()).collect(),
        ViewMode::DueDate => vec![OVERDUE_BUCKET, TODAY_BUCKET, THIS_WEEK_BUCKET, NO_DATE_BUCKET],
        ViewMode::Alphabetical | ViewMode::Other(_) => vec![ALL_BUCKET],
    }
}

#[tracing::instrument(skip_all, fields(count = tasks.len(), mode = %mode))]
pub fn organize(tasks: &[Task], mode: &ViewMode, now: DateTime<Utc>, tz: &Tz) -> Vec<Bucket> {
    match mode {
        ViewMode::Status => Status::ALL
            .iter()
            .map(|status| {
                let matching = tasks.iter().filter(|t| t.status == *status).cloned().collect();
                Bucket::new(mode, status.as_str(), matching)
            })
            .collect(),
        ViewMode::Priority => Priority::ALL
            .iter()
            .map(|priority| {
                let matching = tasks
                    .iter()
                    .filter(|t| t.priority == *priority)
                    .cloned()
                    .collect();
                Bucket::new(mode, priority.as_str(), matching)
            })
            .collect(),
        ViewMode::DueDate => organize_by_due_date(tasks, mode, now, tz),
        ViewMode::Alphabetical => vec![Bucket::new(mode, ALL_BUCKET, sort_by_title(tasks))],
        ViewMode::Other(_) => vec![Bucket::new(mode, ALL_BUCKET, tasks.to_vec())],
    }
}

/// Date buckets overlap: a task due earlier today is both overdue and today,
/// and a done task with a past due date lands in neither.
fn organize_by_due_date(tasks: &[Task], mode: &ViewMode, now: DateTime<Utc>, tz: &Tz) -> Vec<Bucket> {
    let today = local_date(now, tz);
    let week_end = now + Duration::days(7);

    vec![
        Bucket::new(mode, OVERDUE_BUCKET, select(tasks, |t| is_overdue(t, now))),
        Bucket::new(
            mode,
            TODAY_BUCKET,
            select(tasks, |t| t.due_date.is_some_and(|due| local_date(due, tz) == today)),
        ),
        Bucket::new(
            mode,
            THIS_WEEK_BUCKET,
            select(tasks, |t| t.due_date.is_some_and(|due| due > now && due <= week_end)),
        ),
        Bucket::new(mode, NO_DATE_BUCKET, select(tasks, |t| t.due_date.is_none())),
    ]
}

fn select(tasks: &[Task], pred: impl Fn(&Task) -> bool) -> Vec<Task> {
    tasks.iter().filter(|t| pred(t)).cloned().collect()
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != Status::Done && task.due_date.is_some_and(|due| due < now)
}

/// Case-insensitive, accent-folded title order approximating pt-BR
/// collation. The key is a total order, so sorting is idempotent.
pub fn sort_by_title(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by_cached_key(|t| {
        let lower = t.title.trim().to_lowercase();
        (collation_key(&lower), lower, t.title.clone(), t.id)
    });
    sorted
}

/// Symbols and punctuation sort before digits, digits before letters.
/// Only letters are folded; emoji keep their own code point.
fn collation_key(lower: &str) -> Vec<(u8, String)> {
    lower
        .chars()
        .map(|c| {
            if c.is_alphabetic() {
                let folded = deunicode::deunicode_char(c)
                    .filter(|ascii| !ascii.is_empty() && ascii.chars().all(|a| a.is_ascii_alphabetic()));
                (2, folded.map_or_else(|| c.to_string(), str::to_string))
            } else if c.is_numeric() {
                (1, c.to_string())
            } else {
                (0, c.to_string())
            }
        })
        .collect()
}

pub fn column_style(mode: &ViewMode, id: &str) -> BucketStyle {
    let (title, icon, color) = match (mode, id) {
        (ViewMode::Status, "pending") => ("Pendentes", "◷", "#95a5a6"),
        (ViewMode::Status, "in_progress") => ("Em Andamento", "↻", "#3498db"),
        (ViewMode::Status, "done") => ("Concluídas", "✓", "#27ae60"),
        (ViewMode::Status, "cancelled") => ("Canceladas", "✗", "#e74c3c"),
        (ViewMode::Status, "archived") => ("Arquivadas", "▣", "#7f8c8d"),
        (ViewMode::Priority, "urgente") => ("Urgente", "⚠", "#e74c3c"),
        (ViewMode::Priority, "alta") => ("Alta", "!", "#f39c12"),
        (ViewMode::Priority, "media") => ("Média", "−", "#f1c40f"),
        (ViewMode::Priority, "baixa") => ("Baixa", "↓", "#27ae60"),
        (ViewMode::DueDate, OVERDUE_BUCKET) => ("Atrasadas", "⚠", "#e74c3c"),
        (ViewMode::DueDate, TODAY_BUCKET) => ("Hoje", "▦", "#f39c12"),
        (ViewMode::DueDate, THIS_WEEK_BUCKET) => ("Esta Semana", "▦", "#3498db"),
        (ViewMode::DueDate, NO_DATE_BUCKET) => ("Sem Data", "▤", NEUTRAL_COLOR),
        (_, ALL_BUCKET) => ("Todas", "▤", NEUTRAL_COLOR),
        (_, other) => {
            return BucketStyle {
                title: other.to_string(),
                icon: "▤",
                color: NEUTRAL_COLOR,
            };
        }
    };
    BucketStyle {
        title: title.to_string(),
        icon,
        color,
    }
}
