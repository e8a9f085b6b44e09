use std::time::Duration;

use taskdeck_core::backend::mock::DEMO_USER_ID;
use taskdeck_core::backend::{MockBackend, RequestContext, TaskBackend};
use taskdeck_core::cache::{TaskCache, TaskStats};
use taskdeck_core::{TaskError, TaskResult};
use taskdeck_shared::{
    Category, Priority, Task, TaskCreate, TaskListResponse, TaskQuery, TaskUpdate,
};

const LATENCY: Duration = Duration::from_millis(300);

fn setup() -> (TaskCache<MockBackend>, MockBackend, RequestContext) {
    let backend = MockBackend::demo().with_latency(LATENCY);
    let cache = TaskCache::new(backend.clone());
    (cache, backend, RequestContext::new(DEMO_USER_ID, "demo-token"))
}

fn completed(cache: &TaskCache<MockBackend>, task_id: &str) -> Option<bool> {
    cache.get(DEMO_USER_ID, task_id).map(|task| task.completed)
}

fn stored_completed(backend: &MockBackend, task_id: &str) -> Option<bool> {
    backend
        .stored_tasks(DEMO_USER_ID)
        .into_iter()
        .find(|task| task.id == task_id)
        .map(|task| task.completed)
}

fn new_task(title: &str) -> TaskCreate {
    TaskCreate {
        title: title.to_string(),
        description: None,
        priority: Priority::High,
        category: Category::Work,
        due_date: None,
    }
}

/// Reads the store as soon as a listing is requested and only then waits,
/// like a server whose response is slow to arrive. Writes are instant.
struct SlowListing {
    inner: MockBackend,
}

impl TaskBackend for SlowListing {
    async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskQuery,
    ) -> TaskResult<TaskListResponse> {
        let listing = self.inner.list_tasks(ctx, query).await;
        tokio::time::sleep(LATENCY).await;
        listing
    }

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        self.inner.get_task(ctx, task_id).await
    }

    async fn create_task(&self, ctx: &RequestContext, create: &TaskCreate) -> TaskResult<Task> {
        self.inner.create_task(ctx, create).await
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: &TaskUpdate,
    ) -> TaskResult<Task> {
        self.inner.update_task(ctx, task_id, update).await
    }

    async fn delete_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()> {
        self.inner.delete_task(ctx, task_id).await
    }

    async fn toggle_task(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        self.inner.toggle_task(ctx, task_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn load_serves_cache_until_stale() {
    let (cache, backend, ctx) = setup();

    let first = cache.load(&ctx).await.expect("first load");
    assert_eq!(first.total, 5);
    assert_eq!(backend.request_count(), 1);

    tokio::time::advance(Duration::from_secs(60)).await;
    cache.load(&ctx).await.expect("cached load");
    assert_eq!(backend.request_count(), 1);
    assert_eq!(cache.peek(DEMO_USER_ID).map(|c| c.stale), Some(false));

    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    assert_eq!(cache.peek(DEMO_USER_ID).map(|c| c.stale), Some(true));
    cache.load(&ctx).await.expect("refetch");
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_refetch() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");
    cache.invalidate(DEMO_USER_ID);
    cache.load(&ctx).await.expect("reload");
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn offline_load_with_nothing_cached_fails() {
    let (cache, backend, ctx) = setup();
    backend.set_available(false);

    let err = cache.load(&ctx).await.expect_err("offline");
    assert!(matches!(err, TaskError::RemoteUnavailable(_)));
    assert!(cache.peek(DEMO_USER_ID).is_none());
    assert_eq!(cache.stats(DEMO_USER_ID), None);
}

#[tokio::test(start_paused = true)]
async fn blank_title_never_reaches_the_backend() {
    let (cache, backend, ctx) = setup();
    let before = cache.load(&ctx).await.expect("load");

    let err = cache
        .create(&ctx, new_task(""))
        .await
        .expect_err("blank title");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(
        err.field_errors().and_then(|e| e.message_for("title")),
        Some("Title is required")
    );
    assert_eq!(backend.request_count(), 1);
    assert_eq!(
        cache.peek(DEMO_USER_ID).map(|c| c.listing),
        Some(before)
    );
}

#[tokio::test(start_paused = true)]
async fn create_appends_and_marks_stale() {
    let (cache, _backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");

    let task = cache
        .create(&ctx, new_task("Write changelog"))
        .await
        .expect("create");
    let cached = cache.peek(DEMO_USER_ID).expect("cached");
    assert!(cached.stale);
    assert_eq!(cached.listing.total, 6);
    assert_eq!(cached.listing.pending_count, 5);
    assert_eq!(cached.listing.tasks.last().map(|t| t.id.as_str()), Some(task.id.as_str()));
}

#[tokio::test(start_paused = true)]
async fn failed_create_leaves_cache_alone() {
    let (cache, backend, ctx) = setup();
    let before = cache.load(&ctx).await.expect("load");
    backend.set_available(false);

    let err = cache
        .create(&ctx, new_task("Write changelog"))
        .await
        .expect_err("offline");
    assert_eq!(err.code(), "NETWORK_ERROR");
    let cached = cache.peek(DEMO_USER_ID).expect("cached");
    assert_eq!(cached.listing, before);
    assert!(!cached.stale);
    assert_eq!(backend.stored_tasks(DEMO_USER_ID).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn fetch_started_before_a_create_does_not_undo_it() {
    let backend = MockBackend::demo().with_latency(Duration::ZERO);
    let cache = TaskCache::new(SlowListing {
        inner: backend.clone(),
    });
    let ctx = RequestContext::new(DEMO_USER_ID, "demo-token");
    cache.load(&ctx).await.expect("load");

    let (fetched, created) = tokio::join!(
        cache.refresh(&ctx),
        cache.create(&ctx, new_task("Write changelog"))
    );
    let created = created.expect("create");
    let fetched = fetched.expect("refresh");
    assert!(fetched.get(&created.id).is_some());
    assert_eq!(backend.stored_tasks(DEMO_USER_ID).len(), 6);

    let cached = cache.peek(DEMO_USER_ID).expect("cached");
    assert!(cached.stale);
    assert_eq!(cached.listing.total, 6);
    assert!(cached.listing.get(&created.id).is_some());

    let reloaded = cache.load(&ctx).await.expect("reload");
    assert_eq!(reloaded.total, 6);
    assert!(reloaded.get(&created.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn toggle_commits_server_state_and_reconciles() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");
    let before = cache.get(DEMO_USER_ID, "task-1").expect("cached");
    assert!(!before.completed);

    let task = cache
        .toggle_completion(&ctx, "task-1")
        .await
        .expect("toggle");
    assert!(task.completed);
    assert!(task.updated_at > before.updated_at);
    assert_eq!(completed(&cache, "task-1"), Some(true));
    assert_eq!(stored_completed(&backend, "task-1"), Some(true));
    // toggle plus reconciling reload
    assert_eq!(backend.request_count(), 3);
    assert_eq!(
        cache.stats(DEMO_USER_ID),
        Some(TaskStats {
            total: 5,
            completed: 2,
            pending: 3
        })
    );
}

#[tokio::test(start_paused = true)]
async fn optimistic_flip_is_visible_before_the_backend_answers() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");

    let ticket = cache.begin_toggle(&ctx, "task-2");
    assert_eq!(ticket.optimistic_value(), Some(false));
    assert_eq!(completed(&cache, "task-2"), Some(false));
    assert_eq!(backend.request_count(), 1);

    cache.settle_toggle(&ctx, ticket).await.expect("settle");
    assert_eq!(stored_completed(&backend, "task-2"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn failed_toggle_rolls_back() {
    let (cache, backend, ctx) = setup();
    let before = cache.load(&ctx).await.expect("load");
    backend.set_available(false);

    let ticket = cache.begin_toggle(&ctx, "task-3");
    assert_eq!(completed(&cache, "task-3"), Some(true));

    let err = cache
        .settle_toggle(&ctx, ticket)
        .await
        .expect_err("backend offline");
    assert!(matches!(err, TaskError::RemoteUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(completed(&cache, "task-3"), Some(false));
    assert_eq!(
        cache.peek(DEMO_USER_ID).map(|c| c.listing),
        Some(before)
    );
    assert_eq!(stored_completed(&backend, "task-3"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn superseded_fetch_does_not_clobber_optimistic_state() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");

    let (fetched, toggled) = tokio::join!(
        cache.refresh(&ctx),
        cache.toggle_completion(&ctx, "task-3")
    );

    let fetched = fetched.expect("refresh");
    assert_eq!(
        fetched.get("task-3").map(|task| task.completed),
        Some(true)
    );
    assert!(toggled.expect("toggle").completed);
    assert_eq!(completed(&cache, "task-3"), Some(true));
    assert_eq!(stored_completed(&backend, "task-3"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn overlapping_toggles_on_different_tasks_both_land() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");

    let (a, b) = tokio::join!(
        cache.toggle_completion(&ctx, "task-1"),
        cache.toggle_completion(&ctx, "task-2")
    );
    assert!(a.expect("first").completed);
    assert!(!b.expect("second").completed);

    assert_eq!(completed(&cache, "task-1"), Some(true));
    assert_eq!(completed(&cache, "task-2"), Some(false));
    assert_eq!(stored_completed(&backend, "task-1"), Some(true));
    assert_eq!(stored_completed(&backend, "task-2"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn delete_updates_counts() {
    let (cache, _backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");

    cache.delete(&ctx, "task-1").await.expect("delete");
    assert!(cache.get(DEMO_USER_ID, "task-1").is_none());
    assert_eq!(
        cache.stats(DEMO_USER_ID),
        Some(TaskStats {
            total: 4,
            completed: 1,
            pending: 3
        })
    );
}

#[tokio::test(start_paused = true)]
async fn failed_delete_keeps_task_and_counts() {
    let (cache, backend, ctx) = setup();
    let before = cache.load(&ctx).await.expect("load");
    backend.set_available(false);

    let err = cache.delete(&ctx, "task-1").await.expect_err("offline");
    assert!(err.is_retryable());
    assert!(cache.get(DEMO_USER_ID, "task-1").is_some());
    assert_eq!(
        cache.peek(DEMO_USER_ID).map(|c| c.listing),
        Some(before)
    );
    assert_eq!(
        cache.stats(DEMO_USER_ID),
        Some(TaskStats {
            total: 5,
            completed: 1,
            pending: 4
        })
    );
}

#[tokio::test(start_paused = true)]
async fn failed_update_leaves_cache_alone() {
    let (cache, backend, ctx) = setup();
    let before = cache.load(&ctx).await.expect("load");
    backend.set_available(false);

    let err = cache
        .update(&ctx, "task-1", TaskUpdate::from(new_task("Renamed")))
        .await
        .expect_err("offline");
    assert_eq!(err.code(), "NETWORK_ERROR");
    assert_eq!(
        cache.peek(DEMO_USER_ID).map(|c| c.listing),
        Some(before)
    );
}

#[tokio::test(start_paused = true)]
async fn vanished_task_is_dropped_from_cache() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");
    backend
        .delete_task(&ctx, "task-4")
        .await
        .expect("delete behind the cache's back");

    let err = cache
        .update(&ctx, "task-4", TaskUpdate::from(new_task("Call dad")))
        .await
        .expect_err("gone");
    assert_eq!(err, TaskError::not_found("task-4"));
    assert!(cache.get(DEMO_USER_ID, "task-4").is_none());
    assert_eq!(cache.stats(DEMO_USER_ID).map(|s| s.total), Some(4));
}

#[tokio::test(start_paused = true)]
async fn toggling_a_vanished_task_drops_it() {
    let (cache, backend, ctx) = setup();
    cache.load(&ctx).await.expect("load");
    backend
        .delete_task(&ctx, "task-5")
        .await
        .expect("delete behind the cache's back");

    let err = cache
        .toggle_completion(&ctx, "task-5")
        .await
        .expect_err("gone");
    assert_eq!(err, TaskError::not_found("task-5"));
    assert!(cache.get(DEMO_USER_ID, "task-5").is_none());
    assert_eq!(
        cache.stats(DEMO_USER_ID),
        Some(TaskStats {
            total: 4,
            completed: 1,
            pending: 3
        })
    );
}

#[tokio::test(start_paused = true)]
async fn missing_token_is_unauthorized() {
    let (cache, _backend, _ctx) = setup();
    let anon = RequestContext::anonymous(DEMO_USER_ID);

    assert_eq!(cache.load(&anon).await, Err(TaskError::Unauthorized));
    assert!(cache.peek(DEMO_USER_ID).is_none());
}

#[tokio::test(start_paused = true)]
async fn users_are_cached_independently() {
    let (cache, backend, ctx) = setup();
    let other = RequestContext::new("someone-else", "tok");

    assert_eq!(cache.load(&ctx).await.expect("demo").total, 5);
    assert_eq!(cache.load(&other).await.expect("other").total, 0);
    cache.invalidate("someone-else");
    cache.load(&ctx).await.expect("demo again");
    assert_eq!(backend.request_count(), 2);
}
