//! Interactive session: one task view with its filter state, driven by
//! commands typed at a prompt or passed on the command line.

use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow, bail};
use taskdeck_shared::{PasswordChange, ProfileUpdate, Task, TaskUpdate};
use tracing::{debug, info, instrument};

use crate::auth::{DemoSessions, SessionProvider};
use crate::backend::{Backend, ProfileBackend, RequestContext, TaskBackend};
use crate::cache::TaskCache;
use crate::cli::{self, ShellCommand};
use crate::config::AppConfig;
use crate::datetime;
use crate::error::TaskError;
use crate::filter_state::{FilterChange, FilterState};
use crate::render::{Renderer, short_id};
use crate::validation::{self, TaskForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<B> {
    cache: TaskCache<B>,
    filters: FilterState,
    ctx: RequestContext,
    renderer: Renderer,
}

impl<B: TaskBackend + ProfileBackend> Shell<B> {
    pub fn new(cache: TaskCache<B>, ctx: RequestContext, renderer: Renderer) -> Self {
        Self {
            cache,
            filters: FilterState::new(),
            ctx,
            renderer,
        }
    }

    pub fn cache(&self) -> &TaskCache<B> {
        &self.cache
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    #[instrument(skip(self, out), fields(user_id = %self.ctx.user_id))]
    pub async fn execute<W: Write>(
        &mut self,
        command: ShellCommand,
        out: &mut W,
    ) -> anyhow::Result<Flow> {
        debug!(?command, "executing");
        match command {
            ShellCommand::List => self.list(out).await?,
            ShellCommand::Stats => {
                let listing = self.cache.load(&self.ctx).await?;
                let visible = self.filters.visible(&listing.tasks).len();
                if let Some(stats) = self.cache.stats(&self.ctx.user_id) {
                    self.renderer.print_stats(
                        out,
                        stats,
                        visible,
                        self.filters.active_filter_count(),
                    )?;
                }
            }
            ShellCommand::Show { id } => {
                let task = self.resolve(&id).await?;
                self.renderer.print_task_info(out, &task)?;
            }
            ShellCommand::Add {
                title,
                description,
                priority,
                category,
                due,
            } => {
                let form = TaskForm {
                    title: title.join(" "),
                    description: description.unwrap_or_default(),
                    priority,
                    category,
                    due_date: due.unwrap_or_default(),
                };
                let create = form.parse(datetime::today())?;
                let task = self.cache.create(&self.ctx, create).await?;
                writeln!(out, "created {} {}", short_id(&task.id), task.title)?;
            }
            ShellCommand::Edit {
                id,
                title,
                description,
                priority,
                category,
                due,
                clear_description,
                clear_due,
            } => {
                let current = self.resolve(&id).await?;
                let form = TaskForm {
                    title: title.unwrap_or_else(|| current.title.clone()),
                    description: if clear_description {
                        String::new()
                    } else {
                        description
                            .or_else(|| current.description.clone())
                            .unwrap_or_default()
                    },
                    priority: priority.unwrap_or_else(|| current.priority.to_string()),
                    category: category.unwrap_or_else(|| current.category.to_string()),
                    due_date: if clear_due {
                        String::new()
                    } else {
                        due.or_else(|| current.due_date.map(|d| d.format("%Y-%m-%d").to_string()))
                            .unwrap_or_default()
                    },
                };
                let update = TaskUpdate::from(form.parse(datetime::today())?);
                let task = self.cache.update(&self.ctx, &current.id, update).await?;
                writeln!(out, "updated {} {}", short_id(&task.id), task.title)?;
            }
            ShellCommand::Toggle { id } => {
                let task_id = self.resolve(&id).await?.id;
                let ticket = self.cache.begin_toggle(&self.ctx, &task_id);
                if let Some(completed) = ticket.optimistic_value() {
                    writeln!(
                        out,
                        "{} marked {}",
                        short_id(&task_id),
                        if completed { "completed" } else { "pending" }
                    )?;
                    out.flush()?;
                }
                self.cache.settle_toggle(&self.ctx, ticket).await?;
            }
            ShellCommand::Delete { id } => {
                let task = self.resolve(&id).await?;
                self.cache.delete(&self.ctx, &task.id).await?;
                writeln!(out, "deleted {} {}", short_id(&task.id), task.title)?;
            }
            ShellCommand::Search { text } => {
                self.filters.set_search(text.join(" "));
                self.list(out).await?;
            }
            ShellCommand::Filter { key, value } => {
                self.filters.set_filter(FilterChange::parse(&key, &value)?);
                self.list(out).await?;
            }
            ShellCommand::Sort { field, order } => {
                let order = order.unwrap_or(self.filters.selection().sort.order);
                self.filters.set_sort(field, order);
                self.list(out).await?;
            }
            ShellCommand::Clear => {
                self.filters.clear();
                self.list(out).await?;
            }
            ShellCommand::Reset => {
                self.filters.reset();
                self.list(out).await?;
            }
            ShellCommand::Refresh => {
                let listing = self.cache.refresh(&self.ctx).await?;
                writeln!(out, "fetched {} tasks", listing.total)?;
            }
            ShellCommand::Profile => {
                let profile = self.cache.backend().get_profile(&self.ctx).await?;
                self.renderer.print_profile(out, &profile)?;
            }
            ShellCommand::Rename { name } => {
                let update = ProfileUpdate {
                    name: name.join(" "),
                };
                validation::validate_profile_update(&update)?;
                let user = self
                    .cache
                    .backend()
                    .update_profile(&self.ctx, &update)
                    .await?;
                self.renderer.print_user(out, &user)?;
            }
            ShellCommand::Password { current, new } => {
                let change = PasswordChange {
                    current_password: current,
                    confirm_password: new.clone(),
                    new_password: new,
                };
                validation::validate_password_change(&change)?;
                let resp = self
                    .cache
                    .backend()
                    .change_password(&self.ctx, &change)
                    .await?;
                writeln!(out, "{}", resp.message)?;
            }
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Parses and runs one prompt line. Errors are reported to `out` and do
    /// not end the session.
    pub async fn execute_line<W: Write>(&mut self, line: &str, out: &mut W) -> anyhow::Result<Flow> {
        let words = match cli::split_words(line) {
            Ok(words) => words,
            Err(err) => {
                writeln!(out, "error: {err:#}")?;
                return Ok(Flow::Continue);
            }
        };
        if words.is_empty() {
            return Ok(Flow::Continue);
        }
        let command = match cli::parse_shell_words(&words) {
            Ok(command) => command,
            Err(err) => {
                write!(out, "{}", err.render())?;
                return Ok(Flow::Continue);
            }
        };
        match self.execute(command, out).await {
            Ok(flow) => Ok(flow),
            Err(err) => {
                self.report(out, &err)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn report<W: Write>(&self, out: &mut W, err: &anyhow::Error) -> anyhow::Result<()> {
        match err.downcast_ref::<TaskError>() {
            Some(task_err) => self.renderer.print_error(out, task_err),
            None => {
                writeln!(out, "error: {err:#}")?;
                Ok(())
            }
        }
    }

    fn prompt(&self) -> String {
        match self.filters.active_filter_count() {
            0 => "taskdeck> ".to_string(),
            n => format!("taskdeck[{n}]> "),
        }
    }

    async fn list<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let listing = self.cache.load(&self.ctx).await?;
        let visible = self.filters.visible(&listing.tasks);
        self.renderer
            .print_task_table(out, &visible, datetime::today())?;
        if self.filters.has_active_filters() {
            writeln!(out, "{} of {} tasks shown", visible.len(), listing.total)?;
        }
        Ok(())
    }

    /// Finds a cached task by exact id or unique id prefix.
    async fn resolve(&self, id: &str) -> anyhow::Result<Task> {
        let listing = self.cache.load(&self.ctx).await?;
        if let Some(task) = listing.get(id) {
            return Ok(task.clone());
        }
        let mut matches = listing.tasks.iter().filter(|task| task.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.clone()),
            (None, _) => Err(TaskError::not_found(id).into()),
            (Some(_), Some(_)) => bail!("id prefix {id} matches more than one task"),
        }
    }
}

/// Builds the backend and identity from `cfg`, then runs `one_shot` if
/// given or an interactive prompt otherwise.
pub async fn run_session(cfg: AppConfig, one_shot: Vec<String>) -> anyhow::Result<()> {
    let backend = Backend::from_config(&cfg)?;
    let ctx = if backend.is_demo() {
        let sessions = DemoSessions::seeded();
        let session = sessions
            .sign_in_demo()
            .await
            .context("demo sign in failed")?;
        RequestContext::from_session(&session)
    } else {
        cfg.request_context().ok_or_else(|| {
            anyhow!(
                "remote mode needs credentials: set TASKDECK_USER_ID and TASKDECK_TOKEN, \
                 add [credentials] to the config file, or pass --demo"
            )
        })?
    };
    info!(user_id = %ctx.user_id, demo = backend.is_demo(), "session ready");

    let cache = TaskCache::with_stale_after(backend, cfg.stale_after());
    let mut shell = Shell::new(cache, ctx, Renderer::for_stdout());
    let mut out = io::stdout().lock();

    if !one_shot.is_empty() {
        let command = cli::parse_shell_words(&one_shot)
            .map_err(|err| anyhow!("{}", err.render()))?;
        shell.execute(command, &mut out).await?;
        return Ok(());
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        write!(out, "{}", shell.prompt())?;
        out.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        if shell.execute_line(&line, &mut out).await? == Flow::Quit {
            break;
        }
    }
    info!("session ended");
    Ok(())
}
