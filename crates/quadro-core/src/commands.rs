use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::api::TaskBackend;
use crate::board::BoardDrop;
use crate::cli::Command;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{format_backend_datetime, parse_local_datetime};
use crate::error::{AlreadyReported, ApiError};
use crate::http::{HttpBackend, HttpSettings};
use crate::mutator::MutationOutcome;
use crate::notify::StderrNotifier;
use crate::organizer::ViewMode;
use crate::page::{PageSettings, TasksPage};
use crate::preferences::{FilePreferenceStore, Preferences};
use crate::render::Renderer;
use crate::session::SessionStore;
use crate::tabs::TaskTab;
use crate::task::{TaskDraft, TaskId, TaskPatch, TeamId, parse_priority, parse_status};

/// Everything a command needs, wired from the config and data directory.
pub struct App {
    backend: Arc<HttpBackend>,
    prefs: Arc<FilePreferenceStore>,
    renderer: Renderer,
    settings: PageSettings,
}

impl App {
    pub fn new(cfg: &Config, store: &DataStore, tz: Tz) -> anyhow::Result<Self> {
        let session = Arc::new(SessionStore::open(&store.session_path));
        let settings = HttpSettings {
            base_url: cfg.base_url(),
            uploads_url: cfg.uploads_url(),
            timeout: cfg.timeout()?,
        };
        Ok(Self {
            backend: Arc::new(HttpBackend::new(&settings, session)?),
            prefs: Arc::new(FilePreferenceStore::open(&store.preferences_path)),
            renderer: Renderer::new(cfg, tz)?,
            settings: PageSettings {
                timezone: tz,
                archive_page_size: cfg.archive_page_size()?,
            },
        })
    }

    fn page(&self) -> TasksPage<HttpBackend> {
        let mut page = TasksPage::new(
            Arc::clone(&self.backend),
            self.prefs.clone(),
            Arc::new(StderrNotifier),
            self.settings.clone(),
        );
        page.mount();
        page
    }
}

#[instrument(skip(app, command))]
pub async fn dispatch(app: &App, command: Command) -> anyhow::Result<()> {
    let now = Utc::now();
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let user = app.backend.login(&email, &password).await?;
            info!(user = %user.username, "logged in");
            println!("logged in as {} (id {})", user.username, user.id.0);
        }
        Command::Logout => {
            app.backend.logout().await?;
            println!("logged out");
        }
        Command::Whoami => {
            let user = app.backend.current_user().await?;
            println!("id       {}", user.id.0);
            println!("username {}", user.username);
            println!("manager  {}", if user.is_manager() { "yes" } else { "no" });
            if !user.roles.is_empty() {
                println!("roles    {}", user.roles.join(", "));
            }
            for team in &user.teams {
                let role = if team.is_manager { " (manager)" } else { "" };
                println!("team     {}{role}", team.team.0);
            }
        }
        Command::Health => {
            let body = app.backend.health().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Board { view, tab } => {
            let mut page = app.page();
            apply_selection(&mut page, view.as_deref(), tab.as_deref())?;
            page.load().await.map_err(surfaced)?;

            app.renderer.print_tabs(page.tab(), &page.tab_counts())?;
            app.renderer.print_board(&page.columns(now), now)?;
            if page.view_mode() == &ViewMode::Status {
                println!();
                println!("▣ Arquivadas: `quadro archived` to expand");
            }
        }
        Command::Move { id, column, view } => {
            let mut page = app.page();
            apply_selection(&mut page, view.as_deref(), None)?;
            page.load().await.map_err(surfaced)?;

            let result = page.move_task(TaskId(id), &column).await;
            println!("{}", move_summary(id, &column, result)?);
        }
        Command::Archived { pages, tab } => {
            let mut page = app.page();
            apply_selection(&mut page, None, tab.as_deref())?;
            page.load().await.map_err(surfaced)?;

            page.toggle_archived().await;
            for _ in 1..pages.max(1) {
                if page.load_more_archived().await == 0 {
                    break;
                }
            }
            app.renderer
                .print_archived(&page.archived_tasks(), &page.archived_badge(), now)?;
        }
        Command::Show { id } => {
            let task = app.backend.task(TaskId(id)).await?;
            app.renderer.print_task_info(&task)?;
        }
        Command::Add {
            title,
            description,
            priority,
            status,
            due,
            tags,
            team,
        } => {
            let mut draft = TaskDraft::new(title.trim());
            if draft.title.is_empty() {
                return Err(anyhow!("title cannot be empty"));
            }
            draft.description = description;
            if let Some(raw) = priority {
                draft.priority = parse_priority(&raw).ok_or_else(|| anyhow!("unknown priority: {raw}"))?;
            }
            if let Some(raw) = status {
                draft.status = parse_status(&raw).ok_or_else(|| anyhow!("unknown status: {raw}"))?;
            }
            if let Some(raw) = due {
                draft.due_date = Some(
                    parse_local_datetime(&raw, &app.settings.timezone)
                        .ok_or_else(|| anyhow!("unrecognized due date: {raw}"))?,
                );
            }
            draft.tags = tags;
            draft.team = team.map(TeamId);

            let mut page = app.page();
            let task = page.create_task(&draft).await.map_err(surfaced)?;
            println!("created task {}", task.id);
        }
        Command::Edit {
            id,
            title,
            description,
            clear_description,
            due,
            clear_due,
        } => {
            let edit = TaskEdit {
                title,
                description,
                clear_description,
                due,
                clear_due,
            };
            let patch = edit.into_patch(&app.settings.timezone)?;
            app.page()
                .update_task(TaskId(id), &patch)
                .await
                .map_err(surfaced)?;
            println!("updated task {id}");
        }
        Command::Delete { id } => {
            let mut page = app.page();
            page.delete_task(TaskId(id)).await.map_err(surfaced)?;
            println!("deleted task {id}");
        }
        Command::Comments { id } => {
            let comments = app.page().comments(TaskId(id)).await.map_err(surfaced)?;
            app.renderer.print_comments(&comments)?;
        }
        Command::Comment { id, text } => {
            if text.trim().is_empty() {
                return Err(anyhow!("comment cannot be empty"));
            }
            app.page()
                .add_comment(TaskId(id), &text)
                .await
                .map_err(surfaced)?;
            println!("comment added to task {id}");
        }
        Command::Prefs => {
            let prefs = Preferences::load(app.prefs.as_ref());
            println!("tab  {}", prefs.tab);
            println!("view {}", prefs.view_mode);
        }
    }
    Ok(())
}

/// Page operations notify their own failures, so only authorization errors
/// travel on as-is to pick up the re-login hint.
fn surfaced(err: ApiError) -> anyhow::Error {
    if err.is_authorization() {
        err.into()
    } else {
        AlreadyReported(err).into()
    }
}

fn move_summary(id: u64, column: &str, result: BoardDrop) -> anyhow::Result<String> {
    match result {
        BoardDrop::Ignored(reason) => Ok(format!("nothing to do: {reason}")),
        BoardDrop::Applied { outcome, .. } => match outcome {
            MutationOutcome::Confirmed => Ok(format!("moved task {id} to {column}")),
            MutationOutcome::Skipped => Ok("nothing to do".to_string()),
            MutationOutcome::RolledBack(err) => Err(surfaced(err)),
        },
    }
}

/// `quadro edit` flags before they become a patch.
#[derive(Debug, Default)]
struct TaskEdit {
    title: Option<String>,
    description: Option<String>,
    clear_description: bool,
    due: Option<String>,
    clear_due: bool,
}

impl TaskEdit {
    fn into_patch(self, tz: &Tz) -> anyhow::Result<TaskPatch> {
        let mut patch = TaskPatch::default();
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(anyhow!("title cannot be empty"));
            }
            patch.title = Some(title.to_string());
        }
        if self.clear_description {
            patch.description = Some(None);
        } else if let Some(description) = self.description {
            patch.description = Some(Some(description));
        }
        if self.clear_due {
            patch.due_date = Some(None);
        } else if let Some(raw) = self.due {
            let due = parse_local_datetime(&raw, tz).ok_or_else(|| anyhow!("unrecognized due date: {raw}"))?;
            patch.due_date = Some(Some(format_backend_datetime(due)));
        }
        if patch.is_empty() {
            return Err(anyhow!("nothing to change; pass --title, --description or --due"));
        }
        Ok(patch)
    }
}

/// Flags passed on the command line count as user changes and are saved.
fn apply_selection<B: TaskBackend>(
    page: &mut TasksPage<B>,
    view: Option<&str>,
    tab: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(raw) = tab {
        let tab = TaskTab::parse(raw).ok_or_else(|| anyhow!("unknown tab: {raw}"))?;
        page.set_tab(tab);
    }
    if let Some(raw) = view {
        let mode = ViewMode::parse(raw);
        if let ViewMode::Other(other) = &mode {
            debug!(view = %other, "unrecognized view mode; showing one column");
        }
        page.set_view_mode(mode);
    }
    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("password: ");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("password cannot be empty"));
    }
    Ok(password)
}
