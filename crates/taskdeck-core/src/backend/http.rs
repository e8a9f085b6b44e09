use anyhow::{Context, bail};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use taskdeck_shared::{
    ApiErrorResponse, MessageResponse, PasswordChange, ProfileResponse, ProfileUpdate, Task,
    TaskCreate, TaskDetailResponse, TaskListResponse, TaskQuery, TaskUpdate, User,
};
use tracing::{debug, instrument, warn};

use super::{ProfileBackend, RequestContext, TaskBackend};
use crate::error::{TaskError, TaskResult};

/// Client for the task REST API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid api base url: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("api base url cannot carry a path: {base_url}");
        }
        let client = Client::builder()
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/{user_id}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, ctx: &RequestContext, segments: &[&str]) -> TaskResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| TaskError::unavailable("api base url cannot carry a path"))?;
            path.pop_if_empty().push("api").push(&ctx.user_id);
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(&self, ctx: &RequestContext, method: Method, url: Url) -> TaskResult<RequestBuilder> {
        let token = ctx.bearer()?;
        debug!(%method, %url, "api request");
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn dispatch(&self, req: RequestBuilder, task_id: Option<&str>) -> TaskResult<Response> {
        let response = req.send().await.map_err(|err| {
            warn!(error = %err, "api request failed");
            TaskError::unavailable(err.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = error_from_response(status, &body, task_id);
        warn!(%status, code = err.code(), "api returned an error");
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        task_id: Option<&str>,
    ) -> TaskResult<T> {
        self.dispatch(req, task_id)
            .await?
            .json::<T>()
            .await
            .map_err(|err| TaskError::unavailable(format!("malformed api response: {err}")))
    }
}

/// Maps a non-2xx response onto the error taxonomy.
fn error_from_response(status: StatusCode, body: &str, task_id: Option<&str>) -> TaskError {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|resp| resp.error);
    let code = parsed.as_ref().map(|err| err.code.as_str());

    if status == StatusCode::UNAUTHORIZED || code == Some("AUTH_REQUIRED") {
        return TaskError::Unauthorized;
    }
    if status == StatusCode::NOT_FOUND || code == Some("NOT_FOUND") {
        return TaskError::not_found(task_id.unwrap_or_default());
    }
    match parsed {
        Some(err) => TaskError::Remote {
            code: err.code,
            message: err.message,
        },
        None if status.is_server_error() => {
            TaskError::unavailable(format!("server responded with {status}"))
        }
        None => TaskError::Remote {
            code: "HTTP_ERROR".to_string(),
            message: format!("server responded with {status}"),
        },
    }
}

impl TaskBackend for HttpBackend {
    #[instrument(skip(self, ctx, query), fields(user_id = %ctx.user_id))]
    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskQuery,
    ) -> TaskResult<TaskListResponse> {
        let mut url = self.endpoint(ctx, &["tasks"])?;
        let pairs = query.to_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let req = self.request(ctx, Method::GET, url)?;
        self.fetch(req, None).await
    }

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        let url = self.endpoint(ctx, &["tasks", task_id])?;
        let req = self.request(ctx, Method::GET, url)?;
        self.fetch::<TaskDetailResponse>(req, Some(task_id))
            .await
            .map(|resp| resp.task)
    }

    #[instrument(skip(self, ctx, create), fields(user_id = %ctx.user_id))]
    async fn create_task(&self, ctx: &RequestContext, create: &TaskCreate) -> TaskResult<Task> {
        let url = self.endpoint(ctx, &["tasks"])?;
        let req = self.request(ctx, Method::POST, url)?.json(create);
        self.fetch::<TaskDetailResponse>(req, None)
            .await
            .map(|resp| resp.task)
    }

    #[instrument(skip(self, ctx, update), fields(user_id = %ctx.user_id))]
    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: &TaskUpdate,
    ) -> TaskResult<Task> {
        let url = self.endpoint(ctx, &["tasks", task_id])?;
        let req = self.request(ctx, Method::PUT, url)?.json(update);
        self.fetch::<TaskDetailResponse>(req, Some(task_id))
            .await
            .map(|resp| resp.task)
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    async fn delete_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()> {
        let url = self.endpoint(ctx, &["tasks", task_id])?;
        let req = self.request(ctx, Method::DELETE, url)?;
        self.dispatch(req, Some(task_id)).await.map(|_| ())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    async fn toggle_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        let url = self.endpoint(ctx, &["tasks", task_id, "complete"])?;
        let req = self.request(ctx, Method::PATCH, url)?;
        self.fetch::<TaskDetailResponse>(req, Some(task_id))
            .await
            .map(|resp| resp.task)
    }
}

impl ProfileBackend for HttpBackend {
    async fn get_profile(&self, ctx: &RequestContext) -> TaskResult<ProfileResponse> {
        let url = self.endpoint(ctx, &["profile"])?;
        let req = self.request(ctx, Method::GET, url)?;
        self.fetch(req, None).await
    }

    async fn update_profile(
        &self,
        ctx: &RequestContext,
        update: &ProfileUpdate,
    ) -> TaskResult<User> {
        let url = self.endpoint(ctx, &["profile"])?;
        let req = self.request(ctx, Method::PUT, url)?.json(update);
        self.fetch::<UserEnvelope>(req, None)
            .await
            .map(|resp| resp.user)
    }

    async fn change_password(
        &self,
        ctx: &RequestContext,
        change: &PasswordChange,
    ) -> TaskResult<MessageResponse> {
        let url = self.endpoint(ctx, &["password"])?;
        let req = self.request(ctx, Method::PUT, url)?.json(change);
        self.fetch(req, None).await
    }
}
