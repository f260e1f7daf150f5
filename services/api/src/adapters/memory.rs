//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port, selected with
//! `DATABASE_URL=memory://`. Each operation runs under one write lock, which
//! gives the same single-document atomicity the Postgres adapter gets from
//! its conditional statements.

use async_trait::async_trait;
use chrono::Utc;
use newswatcher_core::domain::{
    Comment, HomeNews, NewUser, NewsFilter, Settings, SharedStory, Story, User, UserCredentials,
};
use newswatcher_core::ports::{DatabaseService, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, StoredUser>,
    /// Kept in insertion order, like the Postgres listing.
    shared: Vec<SharedStory>,
    home_news: HashMap<String, HomeNews>,
}

/// A document store held entirely in memory.
#[derive(Default)]
pub struct MemoryAdapter {
    inner: RwLock<Collections>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the home page aggregate, as the indexing worker would.
    pub async fn put_home_news(&self, home_news: HomeNews) {
        let mut inner = self.inner.write().await;
        inner.home_news.insert(home_news.id.clone(), home_news);
    }
}

fn user_not_found(user_id: Uuid) -> PortError {
    PortError::NotFound(format!("User {} not found", user_id))
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.user.email == new_user.email) {
            return Err(PortError::Conflict(format!(
                "Email {} already registered",
                new_user.email
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            display_name: new_user.display_name,
            email: new_user.email,
            date: Utc::now(),
            settings: new_user.settings,
            news_filters: new_user.news_filters,
            saved_stories: Vec::new(),
        };
        inner.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(&user_id)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| user_not_found(user_id))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let inner = self.inner.read().await;
        inner
            .users
            .values()
            .find(|stored| stored.user.email == email)
            .map(|stored| UserCredentials {
                user_id: stored.user.id,
                email: stored.user.email.clone(),
                display_name: stored.user.display_name.clone(),
                hashed_password: stored.password_hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))
    }

    async fn replace_profile(
        &self,
        user_id: Uuid,
        settings: Settings,
        news_filters: Vec<NewsFilter>,
    ) -> PortResult<User> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        stored.user.settings = settings;
        stored.user.news_filters = news_filters;
        Ok(stored.user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<u64> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.remove(&user_id).map_or(0, |_| 1))
    }

    async fn add_saved_story(
        &self,
        user_id: Uuid,
        story: Story,
        max_saved: usize,
    ) -> PortResult<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        let saved = &mut stored.user.saved_stories;
        if saved.len() >= max_saved || saved.iter().any(|s| s.story_id == story.story_id) {
            return Ok(None);
        }
        saved.push(story);
        Ok(Some(stored.user.clone()))
    }

    async fn remove_saved_story(&self, user_id: Uuid, story_id: &str) -> PortResult<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        let before = stored.user.clone();
        stored.user.saved_stories.retain(|s| s.story_id != story_id);
        Ok(Some(before))
    }

    async fn list_shared_stories(&self) -> PortResult<Vec<SharedStory>> {
        Ok(self.inner.read().await.shared.clone())
    }

    async fn count_shared_stories(&self) -> PortResult<u64> {
        Ok(self.inner.read().await.shared.len() as u64)
    }

    async fn get_shared_story(&self, story_id: &str) -> PortResult<SharedStory> {
        let inner = self.inner.read().await;
        inner
            .shared
            .iter()
            .find(|s| s.story_id() == story_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Shared story {} not found", story_id)))
    }

    async fn insert_shared_story(&self, shared: SharedStory) -> PortResult<SharedStory> {
        let mut inner = self.inner.write().await;
        if inner.shared.iter().any(|s| s.story_id() == shared.story_id()) {
            return Err(PortError::Conflict(format!(
                "Story {} already shared",
                shared.story_id()
            )));
        }
        inner.shared.push(shared.clone());
        Ok(shared)
    }

    async fn delete_shared_story(&self, story_id: &str) -> PortResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.shared.len();
        inner.shared.retain(|s| s.story_id() != story_id);
        Ok((before - inner.shared.len()) as u64)
    }

    async fn append_comment(
        &self,
        story_id: &str,
        comment: Comment,
        max_comments: usize,
    ) -> PortResult<Option<SharedStory>> {
        let mut inner = self.inner.write().await;
        let Some(shared) = inner.shared.iter_mut().find(|s| s.story_id() == story_id) else {
            return Ok(None);
        };
        if shared.comments.len() >= max_comments {
            return Ok(None);
        }
        shared.comments.push(comment);
        Ok(Some(shared.clone()))
    }

    async fn get_home_news(&self, id: &str) -> PortResult<HomeNews> {
        let inner = self.inner.read().await;
        inner
            .home_news
            .get(id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Home news document {} not found", id)))
    }
}
