//! crates/newswatcher_core/src/validation.rs
//!
//! Input rules for every document a client can submit. The rules are pure so
//! handlers can reject a request before touching the store.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{NewsFilter, Story};

/// Longest comment text that is stored.
pub const MAX_COMMENT_CHARS: usize = 250;
/// Most keywords a single filter may carry.
pub const MAX_FILTER_KEYWORDS: usize = 10;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*";

/// A rejected field and the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid field: {field} ({reason})")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

type Validation = Result<(), ValidationError>;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
            .expect("email pattern compiles")
    })
}

fn filter_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-_ a-zA-Z0-9]+$").expect("filter name pattern compiles"))
}

fn char_len_between(field: &str, value: &str, min: usize, max: usize) -> Validation {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::new(
            field,
            format!("must be {} to {} characters", min, max),
        ));
    }
    Ok(())
}

//=========================================================================================
// Accounts
//=========================================================================================

pub fn validate_email(email: &str) -> Validation {
    char_len_between("email", email, 7, 50)?;
    if !email_pattern().is_match(email) {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }
    Ok(())
}

/// 7 to 15 characters from `[a-zA-Z0-9!@#$%^&*]`, with at least one digit
/// and at least one symbol.
pub fn validate_password(password: &str) -> Validation {
    let reason = "7 to 15 (one number, one special character)";
    let len = password.chars().count();
    let charset_ok = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if !(7..=15).contains(&len) || !charset_ok || !has_digit || !has_symbol {
        return Err(ValidationError::new("password", reason));
    }
    Ok(())
}

pub fn validate_display_name(display_name: &str) -> Validation {
    char_len_between("displayName", display_name, 3, 50)?;
    if !display_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("displayName", "must be alphanumeric"));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Validation {
    validate_email(email)?;
    validate_password(password)
}

pub fn validate_registration(display_name: &str, email: &str, password: &str) -> Validation {
    validate_display_name(display_name)?;
    validate_email(email)?;
    validate_password(password)
}

//=========================================================================================
// Filters
//=========================================================================================

/// Trims surrounding whitespace from every keyword.
pub fn trim_keywords(filter: &mut NewsFilter) {
    for keyword in filter.key_words.iter_mut() {
        let trimmed = keyword.trim();
        if trimmed.len() != keyword.len() {
            *keyword = trimmed.to_string();
        }
    }
}

pub fn validate_filter(filter: &NewsFilter) -> Validation {
    char_len_between("name", &filter.name, 1, 30)?;
    if !filter_name_pattern().is_match(&filter.name) {
        return Err(ValidationError::new(
            "name",
            "letters, digits, spaces, '-' and '_' only",
        ));
    }
    if filter.key_words.len() > MAX_FILTER_KEYWORDS {
        return Err(ValidationError::new(
            "keyWords",
            format!("at most {} keywords", MAX_FILTER_KEYWORDS),
        ));
    }
    if let Some(keyword) = filter.key_words.iter().find(|k| k.chars().count() > 20) {
        return Err(ValidationError::new(
            "keyWords",
            format!("'{}' is longer than 20 characters", keyword),
        ));
    }
    if filter.alert_frequency < 0 {
        return Err(ValidationError::new("alertFrequency", "must not be negative"));
    }
    if filter.delete_time < 0 {
        return Err(ValidationError::new("deleteTime", "must not be negative"));
    }
    if filter.time_of_last_scan < 0 {
        return Err(ValidationError::new("timeOfLastScan", "must not be negative"));
    }
    Ok(())
}

//=========================================================================================
// Stories and comments
//=========================================================================================

pub fn validate_story(story: &Story) -> Validation {
    char_len_between("storyID", &story.story_id, 1, 100)?;
    char_len_between("title", &story.title, 1, 200)?;
    char_len_between("link", &story.link, 1, 300)?;
    char_len_between("source", &story.source, 1, 50)?;
    char_len_between("imageUrl", &story.image_url, 1, 300)?;
    char_len_between("contentSnippet", &story.content_snippet, 0, 200)?;
    if let Some(hours) = &story.hours {
        char_len_between("hours", hours, 0, 20)?;
    }
    Ok(())
}

pub fn validate_comment(text: &str) -> Validation {
    char_len_between("comment", text, 1, MAX_COMMENT_CHARS)
}

/// Cuts `text` to at most [`MAX_COMMENT_CHARS`] characters.
pub fn truncate_comment(text: &str) -> String {
    text.chars().take(MAX_COMMENT_CHARS).collect()
}
