use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::ApiError;
use crate::constants::{recipe, user};

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[\w.@+-]+$")
}

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^#[A-Fa-f0-9]{6}$")
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"^[-a-zA-Z0-9_]+$")
}

/// Trims and rejects empty or over-long text.
pub fn validate_text(field: &str, value: &str, max_len: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::validation(format!(
            "{field} must be {max_len} characters or less"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = validate_text("email", email, user::MAX_EMAIL_LENGTH)?;
    if !email_regex().is_match(&email) {
        return Err(ApiError::validation("Enter a valid email address"));
    }
    Ok(email.to_lowercase())
}

pub fn validate_username(username: &str) -> Result<String, ApiError> {
    let username = validate_text("username", username, user::MAX_USERNAME_LENGTH)?;
    if !username_regex().is_match(&username) {
        return Err(ApiError::validation(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    Ok(username)
}

pub fn validate_person_name(field: &str, value: &str) -> Result<String, ApiError> {
    validate_text(field, value, user::MAX_NAME_LENGTH)
}

pub fn validate_password(password: &str, min_len: usize) -> Result<(), ApiError> {
    if password.trim().is_empty() {
        return Err(ApiError::validation("password cannot be empty"));
    }
    if password.chars().count() < min_len {
        return Err(ApiError::validation(format!(
            "password must be at least {min_len} characters"
        )));
    }
    Ok(())
}

pub fn validate_tag_color(color: &str) -> Result<String, ApiError> {
    let color = color.trim();
    if !color_regex().is_match(color) {
        return Err(ApiError::validation("color must look like #RRGGBB"));
    }
    Ok(color.to_uppercase())
}

pub fn validate_tag_slug(slug: &str) -> Result<String, ApiError> {
    let slug = validate_text("slug", slug, recipe::MAX_NAME_LENGTH)?;
    if !slug_regex().is_match(&slug) {
        return Err(ApiError::validation(
            "slug may contain only letters, digits, hyphens and underscores",
        ));
    }
    Ok(slug)
}

pub fn validate_cooking_time(minutes: i32) -> Result<i32, ApiError> {
    if !(recipe::MIN_COOKING_TIME..=recipe::MAX_COOKING_TIME).contains(&minutes) {
        return Err(ApiError::validation(format!(
            "cooking_time must be between {} and {}",
            recipe::MIN_COOKING_TIME,
            recipe::MAX_COOKING_TIME
        )));
    }
    Ok(minutes)
}

/// Non-empty and free of duplicates.
pub fn validate_tag_ids(ids: &[i32]) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Err(ApiError::validation("tags cannot be empty"));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ApiError::validation(format!("tag {dup} is listed twice")));
    }
    Ok(())
}

/// Non-empty, free of duplicate ingredient ids, every amount at least 1.
pub fn validate_ingredient_lines(lines: &[(i32, i32)]) -> Result<(), ApiError> {
    if lines.is_empty() {
        return Err(ApiError::validation("ingredients cannot be empty"));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for &(id, amount) in lines {
        if !seen.insert(id) {
            return Err(ApiError::validation(format!(
                "ingredient {id} is listed twice"
            )));
        }
        if amount < recipe::MIN_AMOUNT {
            return Err(ApiError::validation(format!(
                "amount for ingredient {id} must be at least {}",
                recipe::MIN_AMOUNT
            )));
        }
    }
    Ok(())
}

/// `recipes_limit` query value: absent means no cap.
pub fn parse_recipes_limit(raw: Option<&str>) -> Result<Option<u64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            ApiError::validation("recipes_limit must be a non-negative integer")
        }),
    }
}

/// `1`/`true` and `0`/`false` flags used by the recipe filters.
pub fn parse_flag(field: &str, raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ApiError::validation(format!("{field} must be 0 or 1"))),
    }
}
