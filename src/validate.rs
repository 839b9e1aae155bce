//! Client-side checks run before sending registration, profile and article
//! requests. The server validates again; these give earlier, clearer errors.

use crate::config::ValidationError;
use crate::model::{ArticleRequest, UpdateProfileRequest};
use once_cell::sync::Lazy;
use regex::Regex;

const USERNAME_MIN: usize = 2;
const USERNAME_MAX: usize = 100;
const PASSWORD_MIN: usize = 6;
const TITLE_MAX: usize = 500;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("valid email regex"));

fn error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

pub fn username(value: &str) -> Option<ValidationError> {
    let len = value.trim().chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Some(error(
            "username",
            format!(
                "must be between {} and {} characters",
                USERNAME_MIN, USERNAME_MAX
            ),
        ));
    }
    None
}

pub fn email(value: &str) -> Option<ValidationError> {
    if !EMAIL_RE.is_match(value.trim()) {
        return Some(error("email", format!("'{}' is not a valid address", value)));
    }
    None
}

pub fn password(value: &str) -> Option<ValidationError> {
    if value.chars().count() < PASSWORD_MIN {
        return Some(error(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN),
        ));
    }
    None
}

pub fn registration(name: &str, mail: &str, pass: &str) -> Vec<ValidationError> {
    [username(name), email(mail), password(pass)]
        .into_iter()
        .flatten()
        .collect()
}

pub fn profile_update(request: &UpdateProfileRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if request.is_empty() {
        errors.push(error("profile", "change at least one field"));
    }
    errors.extend(request.username.as_deref().and_then(username));
    errors.extend(request.email.as_deref().and_then(email));
    if let Some(new_password) = &request.new_password {
        errors.extend(password(new_password));
        if request.current_password.as_deref().unwrap_or("").is_empty() {
            errors.push(error(
                "currentPassword",
                "required when changing the password",
            ));
        }
    }
    errors
}

/// Checks a normalized article request
pub fn article(request: &ArticleRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let len = request.title.chars().count();
    if len == 0 {
        errors.push(error("title", "must not be blank"));
    } else if len > TITLE_MAX {
        errors.push(error(
            "title",
            format!("must be at most {} characters", TITLE_MAX),
        ));
    }
    errors
}

/// Join validation errors into one line for display
pub fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
