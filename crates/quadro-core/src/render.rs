use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::archive::ArchiveBadge;
use crate::board::Column;
use crate::config::Config;
use crate::datetime::format_local;
use crate::organizer::is_overdue;
use crate::tabs::{TabCounts, TaskTab};
use crate::task::{Comment, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color, tz })
    }

    pub fn print_tabs(&self, active: TaskTab, counts: &TabCounts) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let tabs = TaskTab::ALL
            .iter()
            .map(|tab| {
                let label = format!("{} ({})", tab.label(), counts.get(*tab));
                if *tab == active {
                    self.paint(&format!("[{label}]"), "1")
                } else {
                    label
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{tabs}")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, columns, now))]
    pub fn print_board(&self, columns: &[Column], now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for column in columns {
            writeln!(out)?;
            let header = format!(
                "{} {} ({})",
                column.style.icon,
                column.style.title,
                column.tasks.len()
            );
            writeln!(out, "{}", self.paint(&header, "1"))?;
            if column.tasks.is_empty() {
                writeln!(out, "  (empty)")?;
                continue;
            }
            write_table(&mut out, task_headers(), self.task_rows(&column.tasks, now))?;
        }
        Ok(())
    }

    pub fn print_archived(&self, tasks: &[Task], badge: &ArchiveBadge, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(&format!("▣ Arquivadas ({badge})"), "1"))?;
        if tasks.is_empty() {
            writeln!(out, "  (empty)")?;
            return Ok(());
        }
        write_table(&mut out, task_headers(), self.task_rows(tasks, now))?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "status      {}", task.status.as_str())?;
        writeln!(out, "priority    {}", task.priority.as_str())?;
        if !task.description.is_empty() {
            writeln!(out, "description {}", task.description)?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_local(due, &self.tz))?;
        }
        writeln!(out, "owner       {}", task.owner.0)?;
        if let Some(by) = task.assigned_by {
            writeln!(out, "assigned by {}", by.0)?;
        }
        if let Some(team) = task.team {
            writeln!(out, "team        {}", team.0)?;
        }
        if !task.tags.is_empty() {
            let tags = task
                .tags
                .iter()
                .map(|tag| format!("{} {}", tag.name, tag.color_or_default()))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "tags        {tags}")?;
        }
        if !task.subtasks.is_empty() {
            let (done, total) = task.subtask_progress();
            writeln!(out, "subtasks    {done}/{total}")?;
            for subtask in &task.subtasks {
                let mark = if subtask.done { "x" } else { " " };
                writeln!(out, "  [{mark}] {}", subtask.title)?;
            }
        }
        for attachment in &task.attachments {
            writeln!(
                out,
                "attachment  {} ({}, {} bytes) {}",
                attachment.name, attachment.mime_type, attachment.size, attachment.url
            )?;
        }
        if let Some(approval) = &task.approval
            && approval.required
        {
            writeln!(out, "approval    {:?}", approval.status)?;
        }
        if let Some(created) = task.created_at {
            writeln!(out, "created     {}", format_local(created, &self.tz))?;
        }
        if let Some(updated) = task.updated_at {
            writeln!(out, "updated     {}", format_local(updated, &self.tz))?;
        }

        Ok(())
    }

    pub fn print_comments(&self, comments: &[Comment]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if comments.is_empty() {
            writeln!(out, "no comments")?;
            return Ok(());
        }
        for comment in comments {
            let when = comment
                .created_at
                .map(|dt| format_local(dt, &self.tz))
                .unwrap_or_default();
            let author = comment.author.as_deref().unwrap_or("?");
            writeln!(out, "{} {}", self.paint(author, "36"), when)?;
            writeln!(out, "  {}", comment.content)?;
        }
        Ok(())
    }

    fn task_rows(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<Vec<String>> {
        tasks
            .iter()
            .map(|task| {
                let due = task
                    .due_date
                    .map(|due| format_local(due, &self.tz))
                    .unwrap_or_default();
                let due = if is_overdue(task, now) {
                    self.paint(&due, "31")
                } else {
                    due
                };
                let tags = task
                    .tags
                    .iter()
                    .map(|tag| format!("+{}", tag.name))
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    task.title.clone(),
                    task.priority.as_str().to_string(),
                    due,
                    tags,
                ]
            })
            .collect()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn task_headers() -> Vec<String> {
    ["ID", "Title", "Priority", "Due", "Tags"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{:width$} ", header, width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["\x1b[33m1\x1b[0m".to_string(), "Média".to_string()],
                vec!["22".to_string(), "日本".to_string()],
            ],
        )
        .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "ID Title ");
        assert_eq!(lines[1], "-- ----- ");
        assert_eq!(strip_ansi(lines[2]), "1  Média ");
        assert_eq!(lines[3], "22 日本  ");
    }
}
