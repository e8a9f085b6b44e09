use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, TimeDelta, Utc};
use parking_lot::Mutex;
use taskdeck_shared::{
    Category, MessageResponse, PasswordChange, Priority, ProfileResponse, ProfileStats,
    ProfileUpdate, Task, TaskCreate, TaskListResponse, TaskQuery, TaskUpdate, User,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{ProfileBackend, RequestContext, TaskBackend};
use crate::datetime;
use crate::error::{TaskError, TaskResult};
use crate::filter::{self, FilterSelection};

pub const DEMO_USER_ID: &str = "demo-user-123";
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_NAME: &str = "Demo User";
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(300);

/// In-memory stand-in for the task API. Clones share one store, so a test
/// can keep a handle to flip availability while a cache owns another.
#[derive(Debug, Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
    latency: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    tasks: HashMap<String, Vec<Task>>,
    users: HashMap<String, User>,
    unavailable: bool,
    requests: usize,
}

impl MockBackend {
    /// Empty store with no artificial latency.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState::default())),
            latency: Duration::ZERO,
        }
    }

    /// Store seeded with the demo account's tasks and the default latency.
    pub fn demo() -> Self {
        let backend = Self::empty().with_latency(DEFAULT_LATENCY);
        backend.reset();
        backend
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Restores the demo seed, dropping every other user's data.
    pub fn reset(&self) {
        let now = Utc::now();
        let mut state = self.inner.lock();
        state.tasks.clear();
        state.users.clear();
        state
            .tasks
            .insert(DEMO_USER_ID.to_string(), demo_tasks(now));
        state.users.insert(
            DEMO_USER_ID.to_string(),
            User {
                id: DEMO_USER_ID.to_string(),
                email: DEMO_EMAIL.to_string(),
                name: Some(DEMO_NAME.to_string()),
                created_at: now - TimeDelta::days(30),
            },
        );
        debug!("mock backend reset to demo seed");
    }

    /// Replaces one user's tasks wholesale.
    pub fn seed(&self, user_id: &str, tasks: Vec<Task>) {
        self.inner.lock().tasks.insert(user_id.to_string(), tasks);
    }

    /// While unavailable every call fails with `RemoteUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().unavailable = !available;
    }

    pub fn request_count(&self) -> usize {
        self.inner.lock().requests
    }

    /// Snapshot of a user's stored tasks, in storage order.
    pub fn stored_tasks(&self, user_id: &str) -> Vec<Task> {
        self.inner
            .lock()
            .tasks
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn round_trip(&self, ctx: &RequestContext) -> TaskResult<()> {
        self.inner.lock().requests += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.inner.lock().unavailable {
            return Err(TaskError::unavailable("mock backend is offline"));
        }
        ctx.bearer().map(|_| ())
    }

    fn with_task<T>(
        &self,
        user_id: &str,
        task_id: &str,
        f: impl FnOnce(&mut Task) -> T,
    ) -> TaskResult<T> {
        let mut state = self.inner.lock();
        state
            .tasks
            .get_mut(user_id)
            .and_then(|tasks| tasks.iter_mut().find(|task| task.id == task_id))
            .map(f)
            .ok_or_else(|| TaskError::not_found(task_id))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::demo()
    }
}

impl TaskBackend for MockBackend {
    #[instrument(skip(self, ctx, query), fields(user_id = %ctx.user_id))]
    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskQuery,
    ) -> TaskResult<TaskListResponse> {
        self.round_trip(ctx).await?;
        let stored = self.stored_tasks(&ctx.user_id);
        let tasks = filter::apply(&stored, &FilterSelection::from_query(query));
        let completed_count = tasks.iter().filter(|task| task.completed).count();
        debug!(total = tasks.len(), "mock list");
        Ok(TaskListResponse {
            total: tasks.len(),
            completed_count,
            pending_count: tasks.len() - completed_count,
            tasks,
        })
    }

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        self.round_trip(ctx).await?;
        self.with_task(&ctx.user_id, task_id, |task| task.clone())
    }

    #[instrument(skip(self, ctx, create), fields(user_id = %ctx.user_id))]
    async fn create_task(&self, ctx: &RequestContext, create: &TaskCreate) -> TaskResult<Task> {
        self.round_trip(ctx).await?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: create.title.clone(),
            description: create.description.clone(),
            completed: false,
            priority: create.priority,
            category: create.category,
            due_date: create.due_date,
            created_at: now,
            updated_at: now,
            user_id: ctx.user_id.clone(),
        };
        self.inner
            .lock()
            .tasks
            .entry(ctx.user_id.clone())
            .or_default()
            .insert(0, task.clone());
        debug!(task_id = %task.id, "mock create");
        Ok(task)
    }

    #[instrument(skip(self, ctx, update), fields(user_id = %ctx.user_id))]
    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: &TaskUpdate,
    ) -> TaskResult<Task> {
        self.round_trip(ctx).await?;
        self.with_task(&ctx.user_id, task_id, |task| {
            task.title = update.title.clone();
            task.description = update.description.clone();
            task.priority = update.priority;
            task.category = update.category;
            task.due_date = update.due_date;
            if let Some(completed) = update.completed {
                task.completed = completed;
            }
            task.updated_at = touched(task.updated_at);
            task.clone()
        })
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    async fn delete_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()> {
        self.round_trip(ctx).await?;
        let mut state = self.inner.lock();
        let tasks = state.tasks.entry(ctx.user_id.clone()).or_default();
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id);
        if tasks.len() == before {
            return Err(TaskError::not_found(task_id));
        }
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    async fn toggle_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        self.round_trip(ctx).await?;
        self.with_task(&ctx.user_id, task_id, |task| {
            task.completed = !task.completed;
            task.updated_at = touched(task.updated_at);
            task.clone()
        })
    }
}

impl ProfileBackend for MockBackend {
    async fn get_profile(&self, ctx: &RequestContext) -> TaskResult<ProfileResponse> {
        self.round_trip(ctx).await?;
        let state = self.inner.lock();
        let user = state
            .users
            .get(&ctx.user_id)
            .cloned()
            .unwrap_or_else(|| placeholder_user(&ctx.user_id));
        let tasks = state.tasks.get(&ctx.user_id).map(Vec::as_slice).unwrap_or_default();
        let completed_tasks = tasks.iter().filter(|task| task.completed).count();
        Ok(ProfileResponse {
            user,
            stats: Some(ProfileStats {
                total_tasks: tasks.len(),
                completed_tasks,
                pending_tasks: tasks.len() - completed_tasks,
            }),
        })
    }

    async fn update_profile(
        &self,
        ctx: &RequestContext,
        update: &ProfileUpdate,
    ) -> TaskResult<User> {
        self.round_trip(ctx).await?;
        let mut state = self.inner.lock();
        let user = state
            .users
            .entry(ctx.user_id.clone())
            .or_insert_with(|| placeholder_user(&ctx.user_id));
        user.name = Some(update.name.trim().to_string());
        Ok(user.clone())
    }

    async fn change_password(
        &self,
        ctx: &RequestContext,
        _change: &PasswordChange,
    ) -> TaskResult<MessageResponse> {
        self.round_trip(ctx).await?;
        Ok(MessageResponse {
            message: "Password changed successfully".to_string(),
        })
    }
}

/// Strictly later than `previous`, even when the wall clock is not.
fn touched(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::milliseconds(1)
    }
}

fn placeholder_user(user_id: &str) -> User {
    User {
        id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        name: None,
        created_at: Utc::now(),
    }
}

fn demo_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let today = datetime::today();
    let seed = |id: &str,
                title: &str,
                description: &str,
                (priority, category): (Priority, Category),
                due_in_days: Option<u64>,
                (created_mins, updated_mins): (i64, i64)| Task {
        id: id.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        completed: false,
        priority,
        category,
        due_date: due_in_days.and_then(|days| today.checked_add_days(Days::new(days))),
        created_at: now - TimeDelta::minutes(created_mins),
        updated_at: now - TimeDelta::minutes(updated_mins),
        user_id: DEMO_USER_ID.to_string(),
    };

    let mut groceries = seed(
        "task-2",
        "Buy groceries",
        "Milk, eggs, bread, and fresh vegetables",
        (Priority::Low, Category::Shopping),
        Some(0),
        (48 * 60, 24 * 60),
    );
    groceries.completed = true;

    vec![
        seed(
            "task-1",
            "Complete project documentation",
            "Write comprehensive documentation for the todo app",
            (Priority::High, Category::Work),
            Some(2),
            (24 * 60, 24 * 60),
        ),
        groceries,
        seed(
            "task-3",
            "Morning workout",
            "30 minutes cardio and strength training",
            (Priority::Medium, Category::Health),
            None,
            (2 * 60, 2 * 60),
        ),
        seed(
            "task-4",
            "Call mom",
            "Check in and catch up over the weekend",
            (Priority::Medium, Category::Personal),
            Some(7),
            (60, 60),
        ),
        seed(
            "task-5",
            "Plan weekend trip",
            "Research destinations and book accommodation",
            (Priority::Low, Category::Other),
            None,
            (30, 30),
        ),
    ]
}
