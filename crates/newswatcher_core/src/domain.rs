//! crates/newswatcher_core/src/domain.rs
//!
//! Defines the core documents of the application.
//! Field names on the wire follow the document store's camelCase layout,
//! so the same types are used for persistence (as JSON) and for responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the filter every new account starts with.
pub const DEFAULT_FILTER_NAME: &str = "Technology Companies";

/// Keywords of the seeded filter.
pub const DEFAULT_FILTER_KEYWORDS: [&str; 6] =
    ["Apple", "Microsoft", "IBM", "Amazon", "Google", "Intel"];

/// A single news story, as produced by the indexing worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(rename = "storyID")]
    pub story_id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub image_url: String,
    #[serde(default)]
    pub content_snippet: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    pub keep: bool,
}

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "requireWIFI")]
    pub require_wifi: bool,
    pub enable_alerts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            require_wifi: true,
            enable_alerts: false,
        }
    }
}

/// A keyword filter the worker matches incoming stories against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsFilter {
    pub name: String,
    pub key_words: Vec<String>,
    #[serde(default)]
    pub enable_alert: bool,
    #[serde(default)]
    pub alert_frequency: i64,
    #[serde(default)]
    pub enable_auto_delete: bool,
    /// Epoch milliseconds, 0 when unset.
    #[serde(default)]
    pub delete_time: i64,
    /// Epoch milliseconds, 0 when the worker has not scanned yet.
    #[serde(default)]
    pub time_of_last_scan: i64,
    #[serde(default)]
    pub news_stories: Vec<Story>,
}

impl NewsFilter {
    /// The filter seeded into every new account.
    pub fn technology_companies() -> Self {
        Self {
            name: DEFAULT_FILTER_NAME.to_string(),
            key_words: DEFAULT_FILTER_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            enable_alert: false,
            alert_frequency: 0,
            enable_auto_delete: false,
            delete_time: 0,
            time_of_last_scan: 0,
            news_stories: Vec::new(),
        }
    }
}

/// The public projection of a user document. The password hash never leaves
/// the store through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub settings: Settings,
    pub news_filters: Vec<NewsFilter>,
    pub saved_stories: Vec<Story>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub hashed_password: String,
}

/// Everything needed to insert a user; the store assigns `id` and `date`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub email: String,
    pub password_hash: String,
    pub settings: Settings,
    pub news_filters: Vec<NewsFilter>,
}

impl NewUser {
    /// Builds a registration with default settings and the seeded filter.
    pub fn with_defaults(display_name: String, email: String, password_hash: String) -> Self {
        Self {
            display_name,
            email,
            password_hash,
            settings: Settings::default(),
            news_filters: vec![NewsFilter::technology_companies()],
        }
    }
}

/// A comment on a shared story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub display_name: String,
    pub user_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub text: String,
}

/// A story shared to the public feed. Keyed by the wrapped story's `storyID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStory {
    pub story: Story,
    pub comments: Vec<Comment>,
}

impl SharedStory {
    pub fn story_id(&self) -> &str {
        &self.story.story_id
    }
}

/// The aggregate document backing the unauthenticated home page feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeNews {
    pub id: String,
    pub home_news_stories: Vec<Story>,
}

/// The decoded payload of a session token. Never persisted.
///
/// Every field has a default so that a token with a missing field still
/// decodes and is then rejected by [`SessionClaim::is_authorized`] rather
/// than by a deserialization fault.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaim {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "sessionIP", default)]
    pub session_ip: String,
    #[serde(rename = "sessionUA", default)]
    pub session_ua: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub exp: i64,
}

impl SessionClaim {
    /// A claim grants access only when it is flagged authorized and names a user.
    pub fn is_authorized(&self) -> bool {
        self.authorized && !self.user_id.is_empty()
    }

    /// True when the claim belongs to the user addressed by `id`.
    pub fn owns(&self, id: &str) -> bool {
        self.user_id == id
    }
}

/// Messages for the background story-refresh worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    RefreshStories { document: User },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_seeded_with_technology_filter() {
        let user = NewUser::with_defaults("Al1ce".into(), "alice@example.com".into(), "h".into());
        assert_eq!(user.settings, Settings::default());
        assert_eq!(user.news_filters.len(), 1);
        assert_eq!(user.news_filters[0].name, DEFAULT_FILTER_NAME);
        assert_eq!(user.news_filters[0].key_words.len(), 6);
        assert!(user.news_filters[0].news_stories.is_empty());
    }

    #[test]
    fn story_uses_document_field_names() {
        let json = serde_json::json!({
            "storyID": "abc",
            "title": "t",
            "link": "http://x",
            "source": "s",
            "imageUrl": "http://img",
            "date": "2024-01-01T00:00:00Z",
            "keep": false
        });
        let story: Story = serde_json::from_value(json).unwrap();
        assert_eq!(story.story_id, "abc");
        assert_eq!(story.content_snippet, "");
        let back = serde_json::to_value(&story).unwrap();
        assert_eq!(back["imageUrl"], "http://img");
        assert!(back.get("hours").is_none());
    }

    #[test]
    fn claim_without_user_is_not_authorized() {
        let claim = SessionClaim {
            authorized: true,
            ..Default::default()
        };
        assert!(!claim.is_authorized());
    }

    #[test]
    fn worker_event_is_tagged() {
        let user = User {
            id: Uuid::nil(),
            display_name: "bob".into(),
            email: "bob@example.com".into(),
            date: Utc::now(),
            settings: Settings::default(),
            news_filters: vec![],
            saved_stories: vec![],
        };
        let value = serde_json::to_value(WorkerEvent::RefreshStories { document: user }).unwrap();
        assert_eq!(value["event"], "refresh_stories");
        assert_eq!(value["document"]["displayName"], "bob");
        assert_eq!(value["document"]["settings"]["requireWIFI"], true);
    }
}
