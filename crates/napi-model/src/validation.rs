use serde::Serialize;

/// The per-field error codes specified in §7. `validate` never returns on
/// the first violation: every field error discovered for a single request
/// is collected into one [`ValidationError`] so the caller gets the full
/// picture in one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum FieldErrorCode {
    InvalidParameter,
    MissingParameter,
    Duplicate,
    UsedBy,
    UnknownParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: FieldErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<Vec<String>>,
}

impl FieldError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: FieldErrorCode::InvalidParameter,
            message: message.into(),
            invalid: None,
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} is required"),
            field,
            code: FieldErrorCode::MissingParameter,
            invalid: None,
        }
    }

    pub fn duplicate(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: FieldErrorCode::Duplicate,
            message: message.into(),
            invalid: None,
        }
    }

    pub fn unknown(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("unknown parameter: {field}"),
            field,
            code: FieldErrorCode::UnknownParameters,
            invalid: None,
        }
    }

    pub fn with_invalid(mut self, invalid: Vec<String>) -> Self {
        self.invalid = Some(invalid);
        self
    }
}

/// Aggregated validation failure: every [`FieldError`] found while
/// validating one request, per §7's `InvalidParams` policy.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("invalid parameters: {}", summarize(&self.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Accumulates field errors across a sequence of checks, following the
/// "collect everything, fail once" discipline of §7.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn require<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(FieldError::missing(field));
        }
        value
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.push(FieldError::invalid(field, message));
        }
    }

    pub fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
