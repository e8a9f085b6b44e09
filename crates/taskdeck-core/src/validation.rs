//! Local, pre-network validation of task and account input.
//!
//! Every check collects all field failures at once so a form can show them
//! inline; nothing here performs I/O.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use taskdeck_shared::{
    Category, PasswordChange, Priority, ProfileUpdate, SignIn, SignUp, TaskCreate, TaskUpdate,
};

use crate::datetime::parse_due_date;
use crate::error::{TaskError, TaskResult, ValidationErrors};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 8;

const EMAIL_PATTERN: &str = r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$";

/// Raw, untyped task form input as typed by a user.
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
    pub due_date: String,
}

impl TaskForm {
    /// Parses and validates the form into a create request. Blank
    /// description and due date mean "not set".
    #[tracing::instrument(skip(self), fields(title_len = self.title.len()))]
    pub fn parse(&self, today: NaiveDate) -> TaskResult<TaskCreate> {
        let mut errors = ValidationErrors::default();

        check_title(&self.title, &mut errors);

        let description = non_blank(&self.description);
        check_description(description.as_deref(), &mut errors);

        let priority = if self.priority.trim().is_empty() {
            errors.push("priority", "Priority is required");
            None
        } else {
            match self.priority.parse::<Priority>() {
                Ok(priority) => Some(priority),
                Err(_) => {
                    errors.push("priority", "Priority must be low, medium, or high");
                    None
                }
            }
        };

        let category = if self.category.trim().is_empty() {
            errors.push("category", "Category is required");
            None
        } else {
            match self.category.parse::<Category>() {
                Ok(category) => Some(category),
                Err(_) => {
                    errors.push(
                        "category",
                        "Category must be work, personal, shopping, health, or other",
                    );
                    None
                }
            }
        };

        let due_date = match non_blank(&self.due_date) {
            None => None,
            Some(raw) => match parse_due_date(&raw, today) {
                Ok(date) => {
                    check_due_date(Some(date), today, &mut errors);
                    Some(date)
                }
                Err(err) => {
                    errors.push("due_date", err.to_string());
                    None
                }
            },
        };

        match (priority, category) {
            (Some(priority), Some(category)) if errors.is_empty() => Ok(TaskCreate {
                title: self.title.clone(),
                description,
                priority,
                category,
                due_date,
            }),
            _ => Err(TaskError::Validation(errors)),
        }
    }
}

pub fn validate_create(create: &TaskCreate, today: NaiveDate) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    check_title(&create.title, &mut errors);
    check_description(create.description.as_deref(), &mut errors);
    check_due_date(create.due_date, today, &mut errors);
    errors.into_result()
}

pub fn validate_update(update: &TaskUpdate, today: NaiveDate) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    check_title(&update.title, &mut errors);
    check_description(update.description.as_deref(), &mut errors);
    check_due_date(update.due_date, today, &mut errors);
    errors.into_result()
}

pub fn validate_sign_in(req: &SignIn) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    check_email(&req.email, &mut errors);
    if req.password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.into_result()
}

pub fn validate_sign_up(req: &SignUp) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    check_name(&req.name, &mut errors);
    check_email(&req.email, &mut errors);
    check_new_password("password", &req.password, &mut errors);
    if req.confirm_password.is_empty() {
        errors.push("confirm_password", "Please confirm your password");
    } else if req.password != req.confirm_password {
        errors.push("confirm_password", "Passwords do not match");
    }
    errors.into_result()
}

pub fn validate_profile_update(req: &ProfileUpdate) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    check_name(&req.name, &mut errors);
    errors.into_result()
}

pub fn validate_password_change(req: &PasswordChange) -> TaskResult<()> {
    let mut errors = ValidationErrors::default();
    if req.current_password.is_empty() {
        errors.push("current_password", "Current password is required");
    }
    check_new_password("new_password", &req.new_password, &mut errors);
    if req.confirm_password.is_empty() {
        errors.push("confirm_password", "Please confirm your password");
    } else if req.new_password != req.confirm_password {
        errors.push("confirm_password", "Passwords do not match");
    }
    errors.into_result()
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

fn check_title(title: &str, errors: &mut ValidationErrors) {
    if title.trim().is_empty() {
        errors.push("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push("title", "Title must be 200 characters or less");
    }
}

fn check_description(description: Option<&str>, errors: &mut ValidationErrors) {
    if let Some(description) = description
        && description.chars().count() > MAX_DESCRIPTION_LEN
    {
        errors.push("description", "Description must be 1000 characters or less");
    }
}

fn check_due_date(due: Option<NaiveDate>, today: NaiveDate, errors: &mut ValidationErrors) {
    if let Some(due) = due
        && due < today
    {
        errors.push("due_date", "Due date must be today or in the future");
    }
}

fn check_name(name: &str, errors: &mut ValidationErrors) {
    let len = name.trim().chars().count();
    if len == 0 {
        errors.push("name", "Name is required");
    } else if len < MIN_NAME_LEN {
        errors.push("name", "Name must be at least 2 characters");
    } else if len > MAX_NAME_LEN {
        errors.push("name", "Name must be 50 characters or less");
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.trim().is_empty() {
        errors.push("email", "Email is required");
    } else if !is_valid_email(email.trim()) {
        errors.push("email", "Please enter a valid email address");
    }
}

fn check_new_password(field: &'static str, password: &str, errors: &mut ValidationErrors) {
    if password.is_empty() {
        errors.push(field, "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(field, "Password must be at least 8 characters");
    }
}

fn non_blank(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
