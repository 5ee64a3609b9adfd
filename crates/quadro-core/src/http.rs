//! REST backend over HTTP with bearer tokens from the session store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use quadro_shared::{
    ArchivedPageDto, CommentCreate, CommentDto, ErrorBody, LoginRequest, LoginResponse,
    RefreshResponse, TaskCreate, TaskDto, UserDto,
};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::api::{ArchivedPage, TaskBackend};
use crate::error::{ApiError, ApiResult};
use crate::session::{Session, SessionStore};
use crate::task::{
    Comment, CurrentUser, IngestContext, Task, TaskDraft, TaskId, TaskPatch, ingest_all,
};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: String,
    pub uploads_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Access,
    Refresh,
    Anonymous,
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(&'static str, String)>),
}

#[derive(Debug, Clone)]
struct Call {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Body,
    auth: Auth,
}

impl Call {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: vec![],
            body: Body::Empty,
            auth: Auth::Access,
        }
    }

    fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    fn json<T: Serialize>(mut self, body: &T) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        self.body = Body::Json(value);
        Ok(self)
    }

    fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
    ingest: IngestContext,
}

impl HttpBackend {
    pub fn new(settings: &HttpSettings, session: Arc<SessionStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self::with_client(client, settings, session))
    }

    fn with_client(client: Client, settings: &HttpSettings, session: Arc<SessionStore>) -> Self {
        info!(base_url = %settings.base_url, timeout = ?settings.timeout, "http backend initialized");
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            session,
            ingest: IngestContext::new(settings.uploads_url.clone()),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<CurrentUser> {
        let call = Call::post("/login")
            .auth(Auth::Anonymous)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })?;
        let response: LoginResponse = self.execute(&call).await?.json().await?;

        let user = response.user.map(CurrentUser::from_dto);
        self.session
            .save(Session {
                access_token: response.access_token,
                refresh_token: response.refresh_token,
                user_id: user.as_ref().map(|u| u.id.0),
                username: user.as_ref().map(|u| u.username.clone()),
                saved_at: Utc::now(),
            })
            .map_err(ApiError::Session)?;

        match user {
            Some(user) => Ok(user),
            None => self.current_user().await,
        }
    }

    /// Ends the session server-side when possible; the local tokens are
    /// dropped either way.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> ApiResult<()> {
        if let Err(err) = self.execute(&Call::post("/logout")).await {
            warn!(error = %err, "server logout failed");
        }
        self.session.purge().map_err(ApiError::Session)
    }

    pub async fn health(&self) -> ApiResult<serde_json::Value> {
        let call = Call::get("/health").auth(Auth::Anonymous);
        Ok(self.execute(&call).await?.json().await?)
    }

    pub async fn task(&self, id: TaskId) -> ApiResult<Task> {
        let dto: TaskDto = self.execute(&Call::get(format!("/tasks/{id}"))).await?.json().await?;
        self.ingest_one(dto)
    }

    fn ingest_one(&self, dto: TaskDto) -> ApiResult<Task> {
        Task::from_dto(dto, &self.ingest).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn fetch<T: DeserializeOwned>(&self, call: &Call) -> ApiResult<T> {
        Ok(self.execute(call).await?.json().await?)
    }

    /// Sends `call`; an access-token 401 is retried once after a refresh.
    async fn execute(&self, call: &Call) -> ApiResult<Response> {
        let response = self.send_once(call).await?;
        if response.status() == StatusCode::UNAUTHORIZED
            && call.auth == Auth::Access
            && self.refresh().await?
        {
            debug!(path = %call.path, "retrying after token refresh");
            let retried = self.send_once(call).await?;
            return self.check(call, retried).await;
        }
        self.check(call, response).await
    }

    async fn send_once(&self, call: &Call) -> ApiResult<Response> {
        let url = join_url(&self.base_url, &call.path);
        let mut request = self.client.request(call.method.clone(), &url);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        let token = match call.auth {
            Auth::Access => self.session.access_token(),
            Auth::Refresh => self.session.refresh_token(),
            Auth::Anonymous => None,
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = match &call.body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::Form(fields) => {
                let form = fields
                    .iter()
                    .fold(Form::new(), |form, (name, value)| form.text(*name, value.clone()));
                request.multipart(form)
            }
        };

        debug!(method = %call.method, url = %url, "backend request");
        Ok(request.send().await?)
    }

    async fn check(&self, call: &Call, response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let err = error_from_body(status, &text);
        warn!(path = %call.path, %status, error = %err, "backend request failed");

        if err.is_authorization()
            && call.auth != Auth::Anonymous
            && let Err(purge) = self.session.purge()
        {
            warn!(error = %format!("{purge:#}"), "failed to purge session");
        }
        Err(err)
    }

    /// Returns whether a new access token was obtained.
    async fn refresh(&self) -> ApiResult<bool> {
        if self.session.refresh_token().is_none() {
            return Ok(false);
        }
        let call = Call::post("/refresh").auth(Auth::Refresh);
        let response = self.send_once(&call).await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "token refresh refused");
            return Ok(false);
        }
        let body: RefreshResponse = response.json().await?;
        self.session
            .rotate(body.access_token, body.refresh_token)
            .map_err(ApiError::Session)?;
        info!("access token refreshed");
        Ok(true)
    }
}

impl TaskBackend for HttpBackend {
    async fn current_user(&self) -> ApiResult<CurrentUser> {
        let dto: UserDto = self.fetch(&Call::get("/users/me")).await?;
        Ok(CurrentUser::from_dto(dto))
    }

    #[instrument(skip(self))]
    async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
        let dtos: Vec<TaskDto> = self.fetch(&Call::get("/tasks")).await?;
        Ok(ingest_all(dtos, &self.ingest))
    }

    #[instrument(skip(self, patch))]
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> ApiResult<()> {
        let call = Call::new(Method::PUT, format!("/tasks/{id}")).json(patch)?;
        self.execute(&call).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn archived_page(&self, page: u32, page_size: u32) -> ApiResult<ArchivedPage> {
        let mut call = Call::get("/tasks/archived");
        call.query = vec![("page", page.to_string()), ("page_size", page_size.to_string())];
        let dto: ArchivedPageDto = self.fetch(&call).await?;
        Ok(ArchivedPage {
            items: ingest_all(dto.items, &self.ingest),
            total: usize::try_from(dto.total).unwrap_or(usize::MAX),
        })
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        let mut call = Call::post("/tasks");
        call.body = Body::Form(form_fields(&draft.to_wire())?);
        let dto: TaskDto = self.fetch(&call).await?;
        self.ingest_one(dto)
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: TaskId) -> ApiResult<()> {
        self.execute(&Call::new(Method::DELETE, format!("/tasks/{id}"))).await?;
        Ok(())
    }

    async fn comments(&self, id: TaskId) -> ApiResult<Vec<Comment>> {
        let dtos: Vec<CommentDto> = self.fetch(&Call::get(format!("/tasks/{id}/comments"))).await?;
        Ok(dtos.into_iter().map(Comment::from).collect())
    }

    async fn add_comment(&self, id: TaskId, content: &str) -> ApiResult<Comment> {
        let call = Call::post(format!("/tasks/{id}/comments")).json(&CommentCreate {
            content: content.trim().to_string(),
        })?;
        let dto: CommentDto = self.fetch(&call).await?;
        Ok(Comment::from(dto))
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Maps a failed response to the taxonomy, using the `{error}`/`{msg}` body
/// text when the server sent one.
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message);
    ApiError::from_status(status, message)
}

fn form_fields(create: &TaskCreate) -> ApiResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("title", create.title.clone()),
        ("status", create.status.as_str().to_string()),
        ("prioridade", create.prioridade.as_str().to_string()),
        ("tags", encode_json(&create.tags)?),
        ("collaborators", encode_json(&create.collaborators)?),
    ];
    if let Some(description) = &create.description {
        fields.push(("description", description.clone()));
    }
    if let Some(due) = &create.due_date {
        fields.push(("due_date", due.clone()));
    }
    if let Some(team) = create.team_id {
        fields.push(("team_id", team.to_string()));
    }
    Ok(fields)
}

fn encode_json<T: Serialize>(value: &T) -> ApiResult<String> {
    serde_json::to_string(value).map_err(|err| ApiError::Decode(err.to_string()))
}
