use taskdeck_shared::{
    CategoryFilter, PriorityFilter, SortField, SortOrder, StatusFilter, Task,
};
use tracing::debug;

use crate::error::{TaskError, TaskResult};
use crate::filter::{self, FilterSelection, SortSpec};

/// A replacement for exactly one of the three enumerated filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    Status(StatusFilter),
    Priority(PriorityFilter),
    Category(CategoryFilter),
}

impl FilterChange {
    pub fn parse(key: &str, value: &str) -> TaskResult<Self> {
        let key = key.trim().to_ascii_lowercase();
        match key.as_str() {
            "status" => value
                .parse()
                .map(FilterChange::Status)
                .map_err(|_| TaskError::validation("status", "Status must be all, pending, or completed")),
            "priority" => value
                .parse()
                .map(FilterChange::Priority)
                .map_err(|_| {
                    TaskError::validation("priority", "Priority must be all, low, medium, or high")
                }),
            "category" => value.parse().map(FilterChange::Category).map_err(|_| {
                TaskError::validation(
                    "category",
                    "Category must be all, work, personal, shopping, health, or other",
                )
            }),
            _ => Err(TaskError::validation(
                "filter",
                format!("unknown filter key: {key}"),
            )),
        }
    }
}

/// Owns the ephemeral selection for one task view. Created with defaults
/// when the view mounts and only changed by explicit user actions.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    selection: FilterSelection,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.selection.search = text.into();
        debug!(search = %self.selection.search, "search updated");
    }

    pub fn set_filter(&mut self, change: FilterChange) {
        match change {
            FilterChange::Status(status) => self.selection.status = status,
            FilterChange::Priority(priority) => self.selection.priority = priority,
            FilterChange::Category(category) => self.selection.category = category,
        }
        debug!(?change, "filter updated");
    }

    pub fn set_sort(&mut self, field: SortField, order: SortOrder) {
        self.selection.sort = SortSpec::new(field, order);
        debug!(%field, %order, "sort updated");
    }

    /// Resets filters and search. Sort is left alone.
    pub fn clear(&mut self) {
        self.selection.status = StatusFilter::All;
        self.selection.priority = PriorityFilter::All;
        self.selection.category = CategoryFilter::All;
        self.selection.search.clear();
        debug!("filters cleared");
    }

    /// Resets everything, sort included.
    pub fn reset(&mut self) {
        self.selection = FilterSelection::default();
        debug!("filter state reset");
    }

    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }

    pub fn active_filter_count(&self) -> usize {
        let sel = &self.selection;
        [
            !sel.search.trim().is_empty(),
            sel.status != StatusFilter::All,
            sel.priority != PriorityFilter::All,
            sel.category != CategoryFilter::All,
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn visible(&self, tasks: &[Task]) -> Vec<Task> {
        filter::apply(tasks, &self.selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_view_mount_state() {
        let state = FilterState::new();
        let sel = state.selection();
        assert_eq!(sel.status, StatusFilter::All);
        assert_eq!(sel.priority, PriorityFilter::All);
        assert_eq!(sel.category, CategoryFilter::All);
        assert_eq!(sel.search, "");
        assert_eq!(sel.sort, SortSpec::new(SortField::CreatedAt, SortOrder::Desc));
        assert!(!state.has_active_filters());
    }

    #[test]
    fn set_filter_replaces_only_that_field() {
        let mut state = FilterState::new();
        state.set_filter(FilterChange::Priority(PriorityFilter::High));
        state.set_filter(FilterChange::Category(CategoryFilter::Work));
        state.set_filter(FilterChange::Priority(PriorityFilter::Low));

        let sel = state.selection();
        assert_eq!(sel.priority, PriorityFilter::Low);
        assert_eq!(sel.category, CategoryFilter::Work);
        assert_eq!(sel.status, StatusFilter::All);
        assert_eq!(state.active_filter_count(), 2);
    }

    #[test]
    fn clear_keeps_sort_but_reset_does_not() {
        let mut state = FilterState::new();
        state.set_search("milk");
        state.set_filter(FilterChange::Status(StatusFilter::Completed));
        state.set_sort(SortField::Title, SortOrder::Asc);

        state.clear();
        assert!(!state.has_active_filters());
        assert_eq!(state.selection().search, "");
        assert_eq!(
            state.selection().sort,
            SortSpec::new(SortField::Title, SortOrder::Asc)
        );

        state.reset();
        assert_eq!(state.selection(), &FilterSelection::default());
    }

    #[test]
    fn whitespace_search_and_sort_never_count_as_active() {
        let mut state = FilterState::new();
        state.set_search("   \t");
        state.set_sort(SortField::DueDate, SortOrder::Asc);
        assert!(!state.has_active_filters());

        state.set_search(" report ");
        assert!(state.has_active_filters());
        assert_eq!(state.active_filter_count(), 1);
    }

    #[test]
    fn parses_filter_changes_from_text() {
        assert_eq!(
            FilterChange::parse("Status", "pending").expect("valid"),
            FilterChange::Status(StatusFilter::Pending)
        );
        assert_eq!(
            FilterChange::parse("category", "ALL").expect("valid"),
            FilterChange::Category(CategoryFilter::All)
        );
        let err = FilterChange::parse("priority", "urgent").expect_err("invalid");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(FilterChange::parse("colour", "red").is_err());
    }
}
