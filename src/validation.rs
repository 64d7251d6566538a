//! Validation of create/update payloads and projected rows.
//!
//! Payload types implement [`Validatable`]; [`CRUDResource::validate_create`] and
//! [`CRUDResource::validate_update`] call it before anything is written. Projection
//! reports every failing field at once through [`ValidationErrors`].
//!
//! ```rust,ignore
//! impl Validatable for ArticleCreate {
//!     fn validate(&self) -> Result<(), ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         errors.check(validators::validate_required("title", &self.title));
//!         errors.check(validators::validate_email("author_email", &self.author_email));
//!         errors.result()
//!     }
//! }
//! ```
//!
//! [`CRUDResource::validate_create`]: crate::CRUDResource::validate_create
//! [`CRUDResource::validate_update`]: crate::CRUDResource::validate_update

use serde::Serialize;
use std::fmt;

/// A single failing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Every failing field of one payload or row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a validator result, if any.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(error) = result {
            self.add(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether `field` has at least one error
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Implemented by create/update payloads that need checks beyond their types.
pub trait Validatable {
    /// # Errors
    ///
    /// Returns every failing field.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Reusable field validators
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// Length in characters must be within `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when out of range.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }

        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }

        Ok(())
    }

    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when out of range.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }

        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }

        Ok(())
    }

    /// Shape check only: one `@`, a non-empty local part and a dotted domain.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when malformed.
    pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.len() > 255 {
            return Err(ValidationError::new(field, "Email must be at most 255 characters"));
        }

        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !value.contains(char::is_whitespace)
            }
            None => false,
        };

        if valid {
            Ok(())
        } else {
            Err(ValidationError::new(field, "Invalid email format"))
        }
    }

    /// Absolute `http`/`https` URL with a host.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when malformed.
    pub fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
        match url::Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
            _ => Err(ValidationError::new(field, "Invalid URL format")),
        }
    }

    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` when blank.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }
}
