use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use taskdeck_shared::{Priority, ProfileResponse, Task, User};
use unicode_width::UnicodeWidthStr;

use crate::cache::TaskStats;
use crate::datetime::format_timestamp;
use crate::error::TaskError;

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Colors only when stdout is a terminal.
    pub fn for_stdout() -> Self {
        Self::new(io::stdout().is_terminal())
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Done", "Priority", "Category", "Due", "Title"]
            .map(String::from)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(short_id(&task.id), "33");
            let done = if task.completed { "[x]" } else { "[ ]" }.to_string();
            let priority = match task.priority {
                Priority::High => self.paint(task.priority.as_str(), "31"),
                Priority::Medium => self.paint(task.priority.as_str(), "33"),
                Priority::Low => task.priority.as_str().to_string(),
            };
            let due = match task.due_date {
                Some(due) if due < today && !task.completed => {
                    self.paint(&due.format("%Y-%m-%d").to_string(), "31")
                }
                Some(due) => due.format("%Y-%m-%d").to_string(),
                None => String::new(),
            };
            let title = if task.completed {
                self.paint(&task.title, "2")
            } else {
                task.title.clone()
            };

            rows.push(vec![
                id,
                done,
                priority,
                task.category.to_string(),
                due,
                title,
            ]);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn print_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(
            out,
            "status    {}",
            if task.completed { "completed" } else { "pending" }
        )?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "category  {}", task.category)?;
        if let Some(description) = &task.description {
            writeln!(out, "desc      {description}")?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due       {}", due.format("%Y-%m-%d"))?;
        }
        writeln!(out, "created   {}", format_timestamp(task.created_at))?;
        writeln!(out, "updated   {}", format_timestamp(task.updated_at))?;
        Ok(())
    }

    pub fn print_stats<W: Write>(
        &self,
        out: &mut W,
        stats: TaskStats,
        visible: usize,
        active_filters: usize,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} total, {} completed, {} pending",
            stats.total, stats.completed, stats.pending
        )?;
        if active_filters > 0 {
            writeln!(
                out,
                "{visible} shown with {active_filters} active filter{}",
                if active_filters == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }

    pub fn print_profile<W: Write>(
        &self,
        out: &mut W,
        profile: &ProfileResponse,
    ) -> anyhow::Result<()> {
        self.print_user(out, &profile.user)?;
        if let Some(stats) = &profile.stats {
            writeln!(
                out,
                "tasks     {} total, {} completed, {} pending",
                stats.total_tasks, stats.completed_tasks, stats.pending_tasks
            )?;
        }
        Ok(())
    }

    pub fn print_user<W: Write>(&self, out: &mut W, user: &User) -> anyhow::Result<()> {
        writeln!(out, "name      {}", user.name.as_deref().unwrap_or("-"))?;
        writeln!(out, "email     {}", user.email)?;
        writeln!(out, "member    {}", format_timestamp(user.created_at))?;
        Ok(())
    }

    /// Validation failures print one line per field.
    pub fn print_error<W: Write>(&self, out: &mut W, err: &TaskError) -> anyhow::Result<()> {
        match err.field_errors() {
            Some(errors) => {
                for field in errors.errors() {
                    writeln!(
                        out,
                        "{} {}: {}",
                        self.paint("error:", "31"),
                        field.field,
                        field.message
                    )?;
                }
            }
            None => writeln!(out, "{} {err}", self.paint("error:", "31"))?,
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// First eight characters of an id; ids are matched by prefix in the shell.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(widths.iter().copied()) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in widths.iter().copied() {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(widths.iter().copied()) {
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
