use std::fmt;

use serde::Serialize;

/// A single failed field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// ValidationErrors
///
/// Accumulates every violated constraint of a value so the caller sees all of
/// them at once rather than the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Checks that `value` is between `min` and `max` characters (inclusive).
    pub fn check_length(&mut self, field: &'static str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min || len > max {
            self.push(
                field,
                format!("{field} must be between {min} and {max} characters long"),
            );
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Declared field constraints of a value. Entities and drafts implement this;
/// the lifecycle manager calls it before anything is committed.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

// Field bounds shared by drafts, entities and request payloads.
pub const USERNAME_LEN: (usize, usize) = (5, 50);
pub const PASSWORD_LEN: (usize, usize) = (4, 100);
pub const TITLE_LEN: (usize, usize) = (1, 50);
pub const DESCRIPTION_LEN: (usize, usize) = (1, 250);
pub const DIRECTOR_LEN: (usize, usize) = (1, 50);
pub const GENRE_LEN: (usize, usize) = (1, 50);
