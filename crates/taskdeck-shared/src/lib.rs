use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
  pub kind:  &'static str,
  pub value: String
}

impl fmt::Display for ParseEnumError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown {} value: {:?}",
      self.kind, self.value
    )
  }
}

impl std::error::Error
  for ParseEnumError
{
}

macro_rules! wire_enum {
  (
    $name:ident, $kind:literal,
    { $($variant:ident => $text:literal),+ $(,)? }
  ) => {
    impl $name {
      pub const ALL: &'static [$name] =
        &[$($name::$variant),+];

      pub fn as_str(&self) -> &'static str {
        match self {
          $(| $name::$variant => $text),+
        }
      }
    }

    impl fmt::Display for $name {
      fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
      ) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $name {
      type Err = ParseEnumError;

      fn from_str(
        s: &str
      ) -> Result<Self, Self::Err> {
        let lower =
          s.trim().to_ascii_lowercase();
        match lower.as_str() {
          $(| $text => Ok($name::$variant),)+
          | _ => Err(ParseEnumError {
            kind:  $kind,
            value: s.to_string()
          })
        }
      }
    }
  };
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  Medium,
  High
}

wire_enum!(Priority, "priority", {
  Low => "low",
  Medium => "medium",
  High => "high",
});

impl Priority {
  /// Sort weight: high 3, medium 2,
  /// low 1.
  pub fn weight(&self) -> u8 {
    match self {
      | Priority::Low => 1,
      | Priority::Medium => 2,
      | Priority::High => 3
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Work,
  Personal,
  Shopping,
  Health,
  Other
}

wire_enum!(Category, "category", {
  Work => "work",
  Personal => "personal",
  Shopping => "shopping",
  Health => "health",
  Other => "other",
});

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

wire_enum!(StatusFilter, "status", {
  All => "all",
  Pending => "pending",
  Completed => "completed",
});

impl StatusFilter {
  pub fn accepts(
    &self,
    completed: bool
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Pending => {
        !completed
      }
      | StatusFilter::Completed => {
        completed
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
  #[default]
  All,
  Low,
  Medium,
  High
}

wire_enum!(PriorityFilter, "priority", {
  All => "all",
  Low => "low",
  Medium => "medium",
  High => "high",
});

impl PriorityFilter {
  pub fn priority(
    &self
  ) -> Option<Priority> {
    match self {
      | PriorityFilter::All => None,
      | PriorityFilter::Low => {
        Some(Priority::Low)
      }
      | PriorityFilter::Medium => {
        Some(Priority::Medium)
      }
      | PriorityFilter::High => {
        Some(Priority::High)
      }
    }
  }

  pub fn accepts(
    &self,
    priority: Priority
  ) -> bool {
    self
      .priority()
      .is_none_or(|wanted| wanted == priority)
  }
}

impl From<Priority> for PriorityFilter {
  fn from(priority: Priority) -> Self {
    match priority {
      | Priority::Low => {
        PriorityFilter::Low
      }
      | Priority::Medium => {
        PriorityFilter::Medium
      }
      | Priority::High => {
        PriorityFilter::High
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
  #[default]
  All,
  Work,
  Personal,
  Shopping,
  Health,
  Other
}

wire_enum!(CategoryFilter, "category", {
  All => "all",
  Work => "work",
  Personal => "personal",
  Shopping => "shopping",
  Health => "health",
  Other => "other",
});

impl CategoryFilter {
  pub fn category(
    &self
  ) -> Option<Category> {
    match self {
      | CategoryFilter::All => None,
      | CategoryFilter::Work => {
        Some(Category::Work)
      }
      | CategoryFilter::Personal => {
        Some(Category::Personal)
      }
      | CategoryFilter::Shopping => {
        Some(Category::Shopping)
      }
      | CategoryFilter::Health => {
        Some(Category::Health)
      }
      | CategoryFilter::Other => {
        Some(Category::Other)
      }
    }
  }

  pub fn accepts(
    &self,
    category: Category
  ) -> bool {
    self
      .category()
      .is_none_or(|wanted| wanted == category)
  }
}

impl From<Category> for CategoryFilter {
  fn from(category: Category) -> Self {
    match category {
      | Category::Work => {
        CategoryFilter::Work
      }
      | Category::Personal => {
        CategoryFilter::Personal
      }
      | Category::Shopping => {
        CategoryFilter::Shopping
      }
      | Category::Health => {
        CategoryFilter::Health
      }
      | Category::Other => {
        CategoryFilter::Other
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
  #[default]
  CreatedAt,
  DueDate,
  Priority,
  Title
}

wire_enum!(SortField, "sort field", {
  CreatedAt => "created_at",
  DueDate => "due_date",
  Priority => "priority",
  Title => "title",
});

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  #[default]
  Desc
}

wire_enum!(SortOrder, "sort order", {
  Asc => "asc",
  Desc => "desc",
});

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:          String,
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(default)]
  pub completed:   bool,
  pub priority:    Priority,
  pub category:    Category,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<NaiveDate>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub user_id:     String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskCreate {
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  pub priority:    Priority,
  pub category:    Category,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<NaiveDate>
}

/// Full replacement of a task's
/// editable fields.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskUpdate {
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  pub priority:    Priority,
  pub category:    Category,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<NaiveDate>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>
}

impl From<TaskCreate> for TaskUpdate {
  fn from(create: TaskCreate) -> Self {
    Self {
      title:       create.title,
      description: create.description,
      priority:    create.priority,
      category:    create.category,
      due_date:    create.due_date,
      completed:   None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
pub struct TaskQuery {
  pub status:   Option<StatusFilter>,
  pub priority: Option<PriorityFilter>,
  pub category: Option<CategoryFilter>,
  pub search:   Option<String>,
  pub sort_by:  Option<SortField>,
  pub order:    Option<SortOrder>
}

impl TaskQuery {
  /// Query-string pairs; `all` filters
  /// and empty searches are left out.
  pub fn to_pairs(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(status) = self.status
      && status != StatusFilter::All
    {
      pairs.push((
        "status",
        status.to_string()
      ));
    }
    if let Some(priority) = self.priority
      && priority != PriorityFilter::All
    {
      pairs.push((
        "priority",
        priority.to_string()
      ));
    }
    if let Some(category) = self.category
      && category != CategoryFilter::All
    {
      pairs.push((
        "category",
        category.to_string()
      ));
    }
    if let Some(search) =
      self.search.as_ref()
      && !search.is_empty()
    {
      pairs.push((
        "search",
        search.clone()
      ));
    }
    if let Some(sort_by) = self.sort_by {
      pairs.push((
        "sort_by",
        sort_by.to_string()
      ));
    }
    if let Some(order) = self.order {
      pairs.push((
        "order",
        order.to_string()
      ));
    }
    pairs
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskListResponse {
  pub tasks:           Vec<Task>,
  pub total:           usize,
  pub completed_count: usize,
  pub pending_count:   usize
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskDetailResponse {
  pub task: Task
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct ApiErrorDetails {
  #[serde(default)]
  pub field: Option<String>,
  #[serde(default)]
  pub issue: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ApiErrorBody {
  pub code:    String,
  pub message: String,
  #[serde(default)]
  pub details: Option<ApiErrorDetails>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ApiErrorResponse {
  pub error: ApiErrorBody
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct User {
  pub id:         String,
  pub email:      String,
  #[serde(default)]
  pub name:       Option<String>,
  pub created_at: DateTime<Utc>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Session {
  pub user:       User,
  pub token:      String,
  pub expires_at: DateTime<Utc>
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct ProfileStats {
  pub total_tasks:     usize,
  pub completed_tasks: usize,
  pub pending_tasks:   usize
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProfileResponse {
  pub user:  User,
  #[serde(default)]
  pub stats: Option<ProfileStats>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ProfileUpdate {
  pub name: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password:     String,
  pub confirm_password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SignIn {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SignUp {
  pub name:             String,
  pub email:            String,
  pub password:         String,
  pub confirm_password: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct MessageResponse {
  pub message: String
}
