//! crates/newswatcher_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store and worker transport.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Comment, HomeNews, NewUser, NewsFilter, Settings, SharedStory, Story, User, UserCredentials,
    WorkerEvent,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The document store.
///
/// Every method is atomic with respect to a single document. Conditional
/// writes return `Ok(None)` when their predicate matched no document; callers
/// disambiguate the cause with a read beforehand.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---

    /// Inserts a user. Fails with `Conflict` when the email is taken.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    /// Overwrites `settings` and `newsFilters`, returning the updated document.
    async fn replace_profile(
        &self,
        user_id: Uuid,
        settings: Settings,
        news_filters: Vec<NewsFilter>,
    ) -> PortResult<User>;

    /// Returns the number of documents removed.
    async fn delete_user(&self, user_id: Uuid) -> PortResult<u64>;

    /// Appends `story` only if no saved story shares its `storyID` and the
    /// user holds fewer than `max_saved` stories.
    async fn add_saved_story(
        &self,
        user_id: Uuid,
        story: Story,
        max_saved: usize,
    ) -> PortResult<Option<User>>;

    /// Pulls the saved story with `story_id`, returning the document as it
    /// was before the removal.
    async fn remove_saved_story(&self, user_id: Uuid, story_id: &str) -> PortResult<Option<User>>;

    // --- Shared News ---

    async fn list_shared_stories(&self) -> PortResult<Vec<SharedStory>>;

    async fn count_shared_stories(&self) -> PortResult<u64>;

    async fn get_shared_story(&self, story_id: &str) -> PortResult<SharedStory>;

    /// Inserts a shared story. Fails with `Conflict` when its `storyID` exists.
    async fn insert_shared_story(&self, shared: SharedStory) -> PortResult<SharedStory>;

    /// Returns the number of documents removed.
    async fn delete_shared_story(&self, story_id: &str) -> PortResult<u64>;

    /// Appends `comment` only if the story exists and holds fewer than
    /// `max_comments` comments.
    async fn append_comment(
        &self,
        story_id: &str,
        comment: Comment,
        max_comments: usize,
    ) -> PortResult<Option<SharedStory>>;

    // --- Home News ---

    async fn get_home_news(&self, id: &str) -> PortResult<HomeNews>;
}

/// Fire-and-forget delivery to the background worker.
///
/// Implementations must never block and never fail the caller.
pub trait NotificationService: Send + Sync {
    fn notify(&self, event: WorkerEvent);
}
