use std::fmt;

use thiserror::Error;

/// One field-level validation failure, worded for inline form display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|err| err.field == field)
            .map(|err| err.message.as_str())
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), TaskError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TaskError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("task not found: {task_id}")]
    NotFound { task_id: String },

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{code}: {message}")]
    Remote { code: String, message: String },
}

impl TaskError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::default();
        errors.push(field, message);
        TaskError::Validation(errors)
    }

    pub fn not_found(task_id: impl Into<String>) -> Self {
        TaskError::NotFound {
            task_id: task_id.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        TaskError::RemoteUnavailable(msg.into())
    }

    /// Machine-readable code, matching the backend's error vocabulary.
    pub fn code(&self) -> &str {
        match self {
            TaskError::Validation(_) => "VALIDATION_ERROR",
            TaskError::NotFound { .. } => "NOT_FOUND",
            TaskError::RemoteUnavailable(_) => "NETWORK_ERROR",
            TaskError::Unauthorized => "AUTH_REQUIRED",
            TaskError::Remote { code, .. } => code,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::RemoteUnavailable(_) | TaskError::Remote { .. }
        )
    }

    pub fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            TaskError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
