//! Client-side cache of each user's task list.
//!
//! Listings are keyed by user id and considered fresh for `stale_after`
//! after a successful fetch. Create, update and delete are pessimistic: the
//! cache changes only once the backend confirms. Completion toggles are
//! optimistic and go through [`TaskCache::begin_toggle`] and
//! [`TaskCache::settle_toggle`], which commit or roll back and then reload.
//!
//! Each slot carries a generation counter. Every local change bumps it,
//! and a fetch that started under an older generation is discarded when it
//! lands so it cannot overwrite newer local state.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use taskdeck_shared::{Task, TaskCreate, TaskListResponse, TaskQuery, TaskUpdate};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::backend::{RequestContext, TaskBackend};
use crate::datetime;
use crate::error::{TaskError, TaskResult};
use crate::validation;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// A user's full task list with its derived counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskListing {
    pub tasks: Vec<Task>,
    pub total: usize,
    pub completed_count: usize,
    pub pending_count: usize,
}

impl TaskListing {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut listing = Self {
            tasks,
            ..Self::default()
        };
        listing.recount();
        listing
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    fn recount(&mut self) {
        self.total = self.tasks.len();
        self.completed_count = self.tasks.iter().filter(|task| task.completed).count();
        self.pending_count = self.total - self.completed_count;
    }

    fn replace(&mut self, task: Task) -> bool {
        let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) else {
            return false;
        };
        *slot = task;
        self.recount();
        true
    }

    fn remove(&mut self, task_id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| task.id == task_id)?;
        let task = self.tasks.remove(idx);
        self.recount();
        Some(task)
    }

    fn set_completed(&mut self, task_id: &str, completed: bool) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|task| task.id == task_id)?;
        let previous = task.completed;
        task.completed = completed;
        self.recount();
        Some(previous)
    }
}

impl From<TaskListResponse> for TaskListing {
    fn from(resp: TaskListResponse) -> Self {
        let listing = Self::from_tasks(resp.tasks);
        if listing.total != resp.total || listing.completed_count != resp.completed_count {
            debug!(
                reported_total = resp.total,
                reported_completed = resp.completed_count,
                "recounted listing differs from reported counts"
            );
        }
        listing
    }
}

/// Cached listing plus whether it is due for a refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedListing {
    pub listing: TaskListing,
    pub stale: bool,
}

/// Per-user completion counts, read from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Handle for an optimistic toggle that has been applied locally but not yet
/// confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleTicket {
    task_id: String,
    previous: Option<bool>,
}

impl ToggleTicket {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// The locally displayed value, when the task was cached.
    pub fn optimistic_value(&self) -> Option<bool> {
        self.previous.map(|previous| !previous)
    }
}

#[derive(Debug, Default)]
struct CacheSlot {
    listing: Option<TaskListing>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    generation: u64,
}

impl CacheSlot {
    fn is_fresh(&self, now: Instant, stale_after: Duration) -> bool {
        !self.invalidated
            && self.listing.is_some()
            && self
                .fetched_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_after)
    }
}

pub struct TaskCache<B> {
    backend: B,
    stale_after: Duration,
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl<B: TaskBackend> TaskCache<B> {
    pub fn new(backend: B) -> Self {
        Self::with_stale_after(backend, DEFAULT_STALE_AFTER)
    }

    pub fn with_stale_after(backend: B, stale_after: Duration) -> Self {
        Self {
            backend,
            stale_after,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the cached listing when fresh, otherwise fetches it.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn load(&self, ctx: &RequestContext) -> TaskResult<TaskListing> {
        let cached = {
            let slots = self.slots.lock();
            slots
                .get(&ctx.user_id)
                .filter(|slot| slot.is_fresh(Instant::now(), self.stale_after))
                .and_then(|slot| slot.listing.clone())
        };
        if let Some(listing) = cached {
            debug!("serving fresh cached listing");
            return Ok(listing);
        }
        self.refresh(ctx).await
    }

    /// Fetches unconditionally. A fetch overtaken by a local change
    /// yields the current cached listing instead of its own result.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn refresh(&self, ctx: &RequestContext) -> TaskResult<TaskListing> {
        let started = self
            .slots
            .lock()
            .entry(ctx.user_id.clone())
            .or_default()
            .generation;

        let fetched = self
            .backend
            .list_tasks(ctx, &TaskQuery::default())
            .await;

        let mut slots = self.slots.lock();
        let slot = slots.entry(ctx.user_id.clone()).or_default();
        if slot.generation != started
            && let Some(current) = slot.listing.clone()
        {
            debug!(
                started,
                current = slot.generation,
                "discarding superseded fetch"
            );
            return Ok(current);
        }

        match fetched {
            Ok(resp) => {
                let listing = TaskListing::from(resp);
                slot.listing = Some(listing.clone());
                slot.fetched_at = Some(Instant::now());
                slot.invalidated = false;
                debug!(total = listing.total, "listing cached");
                Ok(listing)
            }
            Err(err) => {
                warn!(error = %err, "listing fetch failed");
                Err(err)
            }
        }
    }

    /// Cached listing without fetching.
    pub fn peek(&self, user_id: &str) -> Option<CachedListing> {
        let slots = self.slots.lock();
        let slot = slots.get(user_id)?;
        let listing = slot.listing.clone()?;
        Some(CachedListing {
            listing,
            stale: !slot.is_fresh(Instant::now(), self.stale_after),
        })
    }

    /// Marks the user's listing stale; the next `load` refetches.
    pub fn invalidate(&self, user_id: &str) {
        if let Some(slot) = self.slots.lock().get_mut(user_id) {
            slot.invalidated = true;
            debug!(user_id, "listing invalidated");
        }
    }

    pub fn get(&self, user_id: &str, task_id: &str) -> Option<Task> {
        self.slots
            .lock()
            .get(user_id)?
            .listing
            .as_ref()?
            .get(task_id)
            .cloned()
    }

    pub fn stats(&self, user_id: &str) -> Option<TaskStats> {
        let slots = self.slots.lock();
        let listing = slots.get(user_id)?.listing.as_ref()?;
        Some(TaskStats {
            total: listing.total,
            completed: listing.completed_count,
            pending: listing.pending_count,
        })
    }

    #[instrument(skip(self, ctx, create), fields(user_id = %ctx.user_id))]
    pub async fn create(&self, ctx: &RequestContext, create: TaskCreate) -> TaskResult<Task> {
        validation::validate_create(&create, datetime::today())?;
        let task = self
            .backend
            .create_task(ctx, &create)
            .await
            .inspect_err(|err| warn!(error = %err, "create failed"))?;

        self.patch(&ctx.user_id, |listing| {
            listing.tasks.push(task.clone());
            listing.recount();
        });
        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self, ctx, update), fields(user_id = %ctx.user_id))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        update: TaskUpdate,
    ) -> TaskResult<Task> {
        validation::validate_update(&update, datetime::today())?;
        match self.backend.update_task(ctx, task_id, &update).await {
            Ok(task) => {
                self.patch(&ctx.user_id, |listing| {
                    listing.replace(task.clone());
                });
                info!(task_id, "task updated");
                Ok(task)
            }
            Err(err) => Err(self.absorb_failure(ctx, task_id, err, "update")),
        }
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn delete(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<()> {
        match self.backend.delete_task(ctx, task_id).await {
            Ok(()) => {
                self.patch(&ctx.user_id, |listing| {
                    listing.remove(task_id);
                });
                info!(task_id, "task deleted");
                Ok(())
            }
            Err(err) => Err(self.absorb_failure(ctx, task_id, err, "delete")),
        }
    }

    /// Flips the cached completion flag right away and returns a ticket for
    /// [`settle_toggle`](Self::settle_toggle). In-flight fetches for the user
    /// are superseded.
    pub fn begin_toggle(&self, ctx: &RequestContext, task_id: &str) -> ToggleTicket {
        let mut slots = self.slots.lock();
        let slot = slots.entry(ctx.user_id.clone()).or_default();
        slot.generation += 1;
        let previous = slot.listing.as_mut().and_then(|listing| {
            let current = listing.get(task_id)?.completed;
            listing.set_completed(task_id, !current)
        });
        debug!(
            user_id = %ctx.user_id,
            task_id,
            ?previous,
            generation = slot.generation,
            "optimistic toggle applied"
        );
        ToggleTicket {
            task_id: task_id.to_string(),
            previous,
        }
    }

    /// Sends the toggle, then commits the server's task or restores the
    /// previous flag, and finally reloads to reconcile.
    #[instrument(skip(self, ctx, ticket), fields(user_id = %ctx.user_id, task_id = %ticket.task_id))]
    pub async fn settle_toggle(&self, ctx: &RequestContext, ticket: ToggleTicket) -> TaskResult<Task> {
        let outcome = self.backend.toggle_task(ctx, &ticket.task_id).await;
        match &outcome {
            Ok(task) => {
                self.patch(&ctx.user_id, |listing| {
                    listing.replace(task.clone());
                });
                info!(completed = task.completed, "toggle confirmed");
            }
            Err(TaskError::NotFound { .. }) => {
                self.patch(&ctx.user_id, |listing| {
                    listing.remove(&ticket.task_id);
                });
                warn!("toggled task no longer exists");
            }
            Err(err) => {
                if let Some(previous) = ticket.previous {
                    self.patch(&ctx.user_id, |listing| {
                        listing.set_completed(&ticket.task_id, previous);
                    });
                }
                warn!(error = %err, "toggle failed, rolled back");
            }
        }

        if let Err(err) = self.refresh(ctx).await {
            warn!(error = %err, "reconciling reload failed");
        }
        outcome
    }

    pub async fn toggle_completion(&self, ctx: &RequestContext, task_id: &str) -> TaskResult<Task> {
        let ticket = self.begin_toggle(ctx, task_id);
        self.settle_toggle(ctx, ticket).await
    }

    /// Applies `f` to the cached listing, if any, and marks it for refetch.
    /// Fetches already in flight are superseded.
    fn patch(&self, user_id: &str, f: impl FnOnce(&mut TaskListing)) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(user_id) {
            if let Some(listing) = slot.listing.as_mut() {
                f(listing);
            }
            slot.invalidated = true;
            slot.generation += 1;
        }
    }

    /// A task the backend no longer knows is dropped locally; every other
    /// failure leaves the cache untouched.
    fn absorb_failure(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        err: TaskError,
        op: &'static str,
    ) -> TaskError {
        if matches!(err, TaskError::NotFound { .. }) {
            self.patch(&ctx.user_id, |listing| {
                listing.remove(task_id);
            });
        }
        warn!(op, task_id, error = %err, "mutation failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use taskdeck_shared::{Category, Priority};

    use super::*;

    fn task(id: &str, completed: bool) -> Task {
        let ts = Utc
            .with_ymd_and_hms(2026, 1, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: None,
            completed,
            priority: Priority::Medium,
            category: Category::Other,
            due_date: None,
            created_at: ts,
            updated_at: ts,
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn listing_counts_stay_consistent() {
        let mut listing = TaskListing::from_tasks(vec![task("a", false), task("b", true)]);
        assert_eq!((listing.total, listing.completed_count, listing.pending_count), (2, 1, 1));

        assert_eq!(listing.set_completed("a", true), Some(false));
        assert_eq!(listing.completed_count, 2);
        assert_eq!(listing.pending_count, 0);

        assert!(listing.remove("b").is_some());
        assert!(listing.remove("b").is_none());
        assert_eq!((listing.total, listing.completed_count), (1, 1));

        assert!(!listing.replace(task("zzz", false)));
        assert!(listing.replace(task("a", false)));
        assert_eq!(listing.pending_count, 1);
    }

    #[test]
    fn response_counts_are_recomputed() {
        let listing = TaskListing::from(TaskListResponse {
            tasks: vec![task("a", true)],
            total: 7,
            completed_count: 0,
            pending_count: 7,
        });
        assert_eq!((listing.total, listing.completed_count, listing.pending_count), (1, 1, 0));
    }

    #[test]
    fn ticket_reports_the_optimistic_value() {
        let ticket = ToggleTicket {
            task_id: "a".to_string(),
            previous: Some(false),
        };
        assert_eq!(ticket.optimistic_value(), Some(true));
        let uncached = ToggleTicket {
            task_id: "a".to_string(),
            previous: None,
        };
        assert_eq!(uncached.optimistic_value(), None);
    }
}
