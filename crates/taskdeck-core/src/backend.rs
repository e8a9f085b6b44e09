//! Boundary to the remote task storage service.
//!
//! Every call takes an explicit [`RequestContext`] carrying the user id and
//! bearer token; no backend keeps credentials of its own.

pub mod http;
pub mod mock;

use taskdeck_shared::{
    MessageResponse, PasswordChange, ProfileResponse, ProfileUpdate, Session, Task, TaskCreate,
    TaskListResponse, TaskQuery, TaskUpdate, User,
};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{TaskError, TaskResult};

pub use http::HttpBackend;
pub use mock::MockBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub token: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: Some(token.into()),
        }
    }

    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: None,
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::new(session.user.id.clone(), session.token.clone())
    }

    /// The bearer credential, or `Unauthorized` when there is none.
    pub fn bearer(&self) -> TaskResult<&str> {
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(TaskError::Unauthorized),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait TaskBackend {
    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskQuery,
    ) -> TaskResult<TaskListResponse>;

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task>;

    async fn create_task(&self, ctx: &RequestContext, create: &TaskCreate) -> TaskResult<Task>;

    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: &TaskUpdate,
    ) -> TaskResult<Task>;

    async fn delete_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()>;

    async fn toggle_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task>;
}

#[allow(async_fn_in_trait)]
pub trait ProfileBackend {
    async fn get_profile(&self, ctx: &RequestContext) -> TaskResult<ProfileResponse>;

    async fn update_profile(&self, ctx: &RequestContext, update: &ProfileUpdate)
    -> TaskResult<User>;

    async fn change_password(
        &self,
        ctx: &RequestContext,
        change: &PasswordChange,
    ) -> TaskResult<MessageResponse>;
}

/// The backend selected by configuration: the in-memory mock in demo mode,
/// the HTTP API otherwise.
#[derive(Debug, Clone)]
pub enum Backend {
    Demo(MockBackend),
    Remote(HttpBackend),
}

impl Backend {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        if cfg.demo_mode {
            info!(latency_ms = cfg.mock_latency_ms, "demo mode: using mock backend");
            Ok(Backend::Demo(
                MockBackend::demo().with_latency(cfg.mock_latency()),
            ))
        } else {
            info!(base_url = %cfg.api_base_url, "using remote backend");
            Ok(Backend::Remote(HttpBackend::new(&cfg.api_base_url)?))
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Backend::Demo(_))
    }
}

impl TaskBackend for Backend {
    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskQuery,
    ) -> TaskResult<TaskListResponse> {
        match self {
            Backend::Demo(mock) => mock.list_tasks(ctx, query).await,
            Backend::Remote(http) => http.list_tasks(ctx, query).await,
        }
    }

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        match self {
            Backend::Demo(mock) => mock.get_task(ctx, task_id).await,
            Backend::Remote(http) => http.get_task(ctx, task_id).await,
        }
    }

    async fn create_task(&self, ctx: &RequestContext, create: &TaskCreate) -> TaskResult<Task> {
        match self {
            Backend::Demo(mock) => mock.create_task(ctx, create).await,
            Backend::Remote(http) => http.create_task(ctx, create).await,
        }
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: &TaskUpdate,
    ) -> TaskResult<Task> {
        match self {
            Backend::Demo(mock) => mock.update_task(ctx, task_id, update).await,
            Backend::Remote(http) => http.update_task(ctx, task_id, update).await,
        }
    }

    async fn delete_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()> {
        match self {
            Backend::Demo(mock) => mock.delete_task(ctx, task_id).await,
            Backend::Remote(http) => http.delete_task(ctx, task_id).await,
        }
    }

    async fn toggle_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        match self {
            Backend::Demo(mock) => mock.toggle_task(ctx, task_id).await,
            Backend::Remote(http) => http.toggle_task(ctx, task_id).await,
        }
    }
}

impl ProfileBackend for Backend {
    async fn get_profile(&self, ctx: &RequestContext) -> TaskResult<ProfileResponse> {
        match self {
            Backend::Demo(mock) => mock.get_profile(ctx).await,
            Backend::Remote(http) => http.get_profile(ctx).await,
        }
    }

    async fn update_profile(
        &self,
        ctx: &RequestContext,
        update: &ProfileUpdate,
    ) -> TaskResult<User> {
        match self {
            Backend::Demo(mock) => mock.update_profile(ctx, update).await,
            Backend::Remote(http) => http.update_profile(ctx, update).await,
        }
    }

    async fn change_password(
        &self,
        ctx: &RequestContext,
        change: &PasswordChange,
    ) -> TaskResult<MessageResponse> {
        match self {
            Backend::Demo(mock) => mock.change_password(ctx, change).await,
            Backend::Remote(http) => http.change_password(ctx, change).await,
        }
    }
}
