use std::cmp::Ordering;

use taskdeck_shared::{
  CategoryFilter,
  PriorityFilter,
  SortField,
  SortOrder,
  StatusFilter,
  Task,
  TaskQuery
};
use tracing::trace;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct SortSpec {
  pub field: SortField,
  pub order: SortOrder
}

impl SortSpec {
  pub fn new(
    field: SortField,
    order: SortOrder
  ) -> Self {
    Self {
      field,
      order
    }
  }
}

/// The user's current status, priority,
/// category, search and sort choices.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct FilterSelection {
  pub status:   StatusFilter,
  pub priority: PriorityFilter,
  pub category: CategoryFilter,
  pub search:   String,
  pub sort:     SortSpec
}

impl FilterSelection {
  pub fn from_query(
    query: &TaskQuery
  ) -> Self {
    Self {
      status:   query
        .status
        .unwrap_or_default(),
      priority: query
        .priority
        .unwrap_or_default(),
      category: query
        .category
        .unwrap_or_default(),
      search:   query
        .search
        .clone()
        .unwrap_or_default(),
      sort:     SortSpec {
        field: query
          .sort_by
          .unwrap_or_default(),
        order: query
          .order
          .unwrap_or_default()
      }
    }
  }

  pub fn to_query(&self) -> TaskQuery {
    TaskQuery {
      status:   Some(self.status),
      priority: Some(self.priority),
      category: Some(self.category),
      search:   Some(
        self.search.trim().to_string()
      )
      .filter(|term| !term.is_empty()),
      sort_by:  Some(self.sort.field),
      order:    Some(self.sort.order)
    }
  }

  /// Lowercased, trimmed search term;
  /// `None` when blank.
  pub fn search_needle(
    &self
  ) -> Option<String> {
    let trimmed = self.search.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(trimmed.to_lowercase())
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    matches_with(
      task,
      self,
      self.search_needle().as_deref()
    )
  }
}

/// Filters then stable-sorts `tasks`.
/// Tasks comparing equal keep their
/// input order.
#[tracing::instrument(skip(
  tasks, selection
), fields(input = tasks.len()))]
pub fn apply(
  tasks: &[Task],
  selection: &FilterSelection
) -> Vec<Task> {
  let needle = selection.search_needle();

  let mut visible: Vec<Task> = tasks
    .iter()
    .filter(|task| {
      matches_with(
        task,
        selection,
        needle.as_deref()
      )
    })
    .cloned()
    .collect();

  sort_tasks(
    &mut visible,
    selection.sort
  );

  trace!(
    visible = visible.len(),
    "applied filter selection"
  );
  visible
}

pub fn sort_tasks(
  tasks: &mut [Task],
  sort: SortSpec
) {
  tasks.sort_by(|a, b| compare(a, b, sort));
}

pub fn compare(
  a: &Task,
  b: &Task,
  sort: SortSpec
) -> Ordering {
  match sort.field {
    | SortField::Title => {
      let folded = a
        .title
        .to_lowercase()
        .cmp(&b.title.to_lowercase());
      directed(
        folded.then_with(|| {
          a.title.cmp(&b.title)
        }),
        sort.order
      )
    }
    | SortField::Priority => directed(
      a.priority
        .weight()
        .cmp(&b.priority.weight()),
      sort.order
    ),
    | SortField::DueDate => {
      // Undated tasks go last in both
      // directions.
      match (a.due_date, b.due_date) {
        | (Some(x), Some(y)) => {
          directed(x.cmp(&y), sort.order)
        }
        | (Some(_), None) => {
          Ordering::Less
        }
        | (None, Some(_)) => {
          Ordering::Greater
        }
        | (None, None) => Ordering::Equal
      }
    }
    | SortField::CreatedAt => directed(
      a.created_at.cmp(&b.created_at),
      sort.order
    )
  }
}

fn directed(
  ordering: Ordering,
  order: SortOrder
) -> Ordering {
  match order {
    | SortOrder::Asc => ordering,
    | SortOrder::Desc => {
      ordering.reverse()
    }
  }
}

fn matches_with(
  task: &Task,
  selection: &FilterSelection,
  needle: Option<&str>
) -> bool {
  if !selection
    .status
    .accepts(task.completed)
  {
    return false;
  }

  if !selection
    .priority
    .accepts(task.priority)
  {
    return false;
  }

  if !selection
    .category
    .accepts(task.category)
  {
    return false;
  }

  let Some(needle) = needle else {
    return true;
  };

  let title_match = task
    .title
    .to_lowercase()
    .contains(needle);
  let description_match = task
    .description
    .as_deref()
    .is_some_and(|description| {
      description
        .to_lowercase()
        .contains(needle)
    });

  title_match || description_match
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };
  use taskdeck_shared::{
    Category,
    CategoryFilter,
    Priority,
    PriorityFilter,
    SortField,
    SortOrder,
    StatusFilter,
    Task
  };

  use super::{
    FilterSelection,
    SortSpec,
    apply
  };

  fn task(
    id: &str,
    title: &str,
    priority: Priority,
    category: Category,
    completed: bool
  ) -> Task {
    let base = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .single()
      .expect("valid timestamp");
    let offset: i64 = id
      .trim_start_matches('t')
      .parse()
      .unwrap_or(0);
    let created =
      base + Duration::minutes(offset);
    Task {
      id: id.to_string(),
      title: title.to_string(),
      description: None,
      completed,
      priority,
      category,
      due_date: None,
      created_at: created,
      updated_at: created,
      user_id: "u1".to_string()
    }
  }

  fn milk_and_report() -> Vec<Task> {
    vec![
      task(
        "t1",
        "Buy milk",
        Priority::Low,
        Category::Shopping,
        true
      ),
      task(
        "t2",
        "Write report",
        Priority::High,
        Category::Work,
        false
      ),
    ]
  }

  fn fixture() -> Vec<Task> {
    let mut tasks = vec![
      task(
        "t1",
        "Buy milk",
        Priority::Low,
        Category::Shopping,
        true
      ),
      task(
        "t2",
        "Write report",
        Priority::High,
        Category::Work,
        false
      ),
      task(
        "t3",
        "morning workout",
        Priority::Medium,
        Category::Health,
        false
      ),
      task(
        "t4",
        "Call mom",
        Priority::Medium,
        Category::Personal,
        true
      ),
      task(
        "t5",
        "Plan trip",
        Priority::Low,
        Category::Other,
        false
      ),
      task(
        "t6",
        "buy stamps",
        Priority::High,
        Category::Shopping,
        false
      ),
    ];
    tasks[2].description = Some(
      "30 minutes of MILKshake-free cardio"
        .to_string()
    );
    tasks[1].due_date =
      NaiveDate::from_ymd_opt(2026, 3, 1);
    tasks[4].due_date =
      NaiveDate::from_ymd_opt(2026, 2, 20);
    tasks[5].due_date =
      NaiveDate::from_ymd_opt(2026, 3, 1);
    tasks
  }

  fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks
      .iter()
      .map(|task| task.id.as_str())
      .collect()
  }

  #[test]
  fn pending_status_keeps_only_open_tasks()
  {
    let selection = FilterSelection {
      status: StatusFilter::Pending,
      ..FilterSelection::default()
    };
    let visible =
      apply(&milk_and_report(), &selection);
    assert_eq!(ids(&visible), vec!["t2"]);
    assert_eq!(
      visible[0].title,
      "Write report"
    );
  }

  #[test]
  fn search_is_case_insensitive_and_ignores_status()
   {
    let selection = FilterSelection {
      search: "MILK".to_string(),
      ..FilterSelection::default()
    };
    let visible =
      apply(&milk_and_report(), &selection);
    assert_eq!(ids(&visible), vec!["t1"]);
  }

  #[test]
  fn search_matches_descriptions() {
    let selection = FilterSelection {
      search: "  milk ".to_string(),
      sort: SortSpec::new(
        SortField::CreatedAt,
        SortOrder::Asc
      ),
      ..FilterSelection::default()
    };
    let visible =
      apply(&fixture(), &selection);
    assert_eq!(
      ids(&visible),
      vec!["t1", "t3"]
    );
  }

  #[test]
  fn empty_collection_yields_empty_result()
  {
    let selection = FilterSelection {
      status: StatusFilter::Completed,
      search: "anything".to_string(),
      ..FilterSelection::default()
    };
    assert!(
      apply(&[], &selection).is_empty()
    );
  }

  #[test]
  fn default_selection_only_sorts() {
    let visible = apply(
      &fixture(),
      &FilterSelection::default()
    );
    assert_eq!(
      ids(&visible),
      vec!["t6", "t5", "t4", "t3", "t2", "t1"]
    );
  }

  #[test]
  fn every_selection_is_sound_and_complete()
  {
    let tasks = fixture();
    let searches =
      ["", "milk", "BUY", "  ", "zzz"];

    for status in StatusFilter::ALL {
      for priority in PriorityFilter::ALL {
        for category in CategoryFilter::ALL
        {
          for search in searches {
            let selection =
              FilterSelection {
                status: *status,
                priority: *priority,
                category: *category,
                search: search
                  .to_string(),
                ..FilterSelection::default()
              };
            let visible =
              apply(&tasks, &selection);

            for shown in &visible {
              assert!(
                selection.matches(shown),
                "{} shown for {selection:?}",
                shown.id
              );
            }
            for candidate in &tasks {
              let expected = usize::from(
                selection
                  .matches(candidate)
              );
              let count = visible
                .iter()
                .filter(|shown| {
                  shown.id == candidate.id
                })
                .count();
              assert_eq!(
                count, expected,
                "{} for {selection:?}",
                candidate.id
              );
            }
          }
        }
      }
    }
  }

  #[test]
  fn priority_sort_uses_weights_and_is_stable()
   {
    let selection = FilterSelection {
      sort: SortSpec::new(
        SortField::Priority,
        SortOrder::Desc
      ),
      ..FilterSelection::default()
    };
    let visible =
      apply(&fixture(), &selection);
    assert_eq!(
      ids(&visible),
      vec!["t2", "t6", "t3", "t4", "t1", "t5"]
    );
  }

  #[test]
  fn undated_tasks_sort_last_in_both_directions()
   {
    for order in SortOrder::ALL {
      let selection = FilterSelection {
        sort: SortSpec::new(
          SortField::DueDate,
          *order
        ),
        ..FilterSelection::default()
      };
      let visible =
        apply(&fixture(), &selection);
      let first_undated = visible
        .iter()
        .position(|task| {
          task.due_date.is_none()
        })
        .expect("fixture has undated tasks");
      assert!(
        visible[first_undated..]
          .iter()
          .all(|task| task.due_date.is_none()),
        "{order:?}"
      );
      assert_eq!(first_undated, 3);
    }

    let asc = apply(
      &fixture(),
      &FilterSelection {
        sort: SortSpec::new(
          SortField::DueDate,
          SortOrder::Asc
        ),
        ..FilterSelection::default()
      }
    );
    assert_eq!(
      ids(&asc),
      vec!["t5", "t2", "t6", "t1", "t3", "t4"]
    );
  }

  #[test]
  fn title_sort_folds_case_first() {
    let selection = FilterSelection {
      sort: SortSpec::new(
        SortField::Title,
        SortOrder::Asc
      ),
      ..FilterSelection::default()
    };
    let visible =
      apply(&fixture(), &selection);
    assert_eq!(
      ids(&visible),
      vec!["t1", "t6", "t4", "t3", "t5", "t2"]
    );
  }

  #[test]
  fn sorting_twice_is_idempotent() {
    for field in SortField::ALL {
      for order in SortOrder::ALL {
        let selection = FilterSelection {
          sort: SortSpec::new(
            *field, *order
          ),
          ..FilterSelection::default()
        };
        let once =
          apply(&fixture(), &selection);
        let twice =
          apply(&once, &selection);
        assert_eq!(once, twice);
      }
    }
  }
}
