//! services/api/src/adapters/db.rs
//!
//! This module contains the PostgreSQL adapter, the production implementation
//! of the `DatabaseService` port from the `core` crate. Nested documents live
//! in JSONB columns, and every conditional write is a single
//! `UPDATE ... WHERE <predicate> RETURNING` statement so the check and the
//! write happen atomically on one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newswatcher_core::domain::{
    Comment, HomeNews, NewUser, NewsFilter, Settings, SharedStory, Story, User, UserCredentials,
};
use newswatcher_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Postgres reports unique constraint violations with this SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn map_insert_error(e: sqlx::Error, conflict: String) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PortError::Conflict(conflict)
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    display_name: String,
    email: String,
    created_at: DateTime<Utc>,
    settings: Json<Settings>,
    news_filters: Json<Vec<NewsFilter>>,
    saved_stories: Json<Vec<Story>>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            display_name: self.display_name,
            email: self.email,
            date: self.created_at,
            settings: self.settings.0,
            news_filters: self.news_filters.0,
            saved_stories: self.saved_stories.0,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    display_name: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            display_name: self.display_name,
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct SharedStoryRecord {
    story: Json<Story>,
    comments: Json<Vec<Comment>>,
}
impl SharedStoryRecord {
    fn to_domain(self) -> SharedStory {
        SharedStory {
            story: self.story.0,
            comments: self.comments.0,
        }
    }
}

#[derive(FromRow)]
struct HomeNewsRecord {
    id: String,
    home_news_stories: Json<Vec<Story>>,
}
impl HomeNewsRecord {
    fn to_domain(self) -> HomeNews {
        HomeNews {
            id: self.id,
            home_news_stories: self.home_news_stories.0,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let email = new_user.email.clone();
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, display_name, email, password_hash, settings, news_filters, saved_stories) \
             VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb) \
             RETURNING id, display_name, email, created_at, settings, news_filters, saved_stories",
        )
        .bind(Uuid::new_v4())
        .bind(new_user.display_name)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(Json(new_user.settings))
        .bind(Json(new_user.news_filters))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, format!("Email {} already registered", email)))?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, display_name, email, created_at, settings, news_filters, saved_stories \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, display_name, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User with email {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn replace_profile(
        &self,
        user_id: Uuid,
        settings: Settings,
        news_filters: Vec<NewsFilter>,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET settings = $2, news_filters = $3 WHERE id = $1 \
             RETURNING id, display_name, email, created_at, settings, news_filters, saved_stories",
        )
        .bind(user_id)
        .bind(Json(settings))
        .bind(Json(news_filters))
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn add_saved_story(
        &self,
        user_id: Uuid,
        story: Story,
        max_saved: usize,
    ) -> PortResult<Option<User>> {
        let story_id = story.story_id.clone();
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET saved_stories = saved_stories || jsonb_build_array($2::jsonb) \
             WHERE id = $1 \
               AND jsonb_array_length(saved_stories) < $3 \
               AND NOT saved_stories @> jsonb_build_array(jsonb_build_object('storyID', $4::text)) \
             RETURNING id, display_name, email, created_at, settings, news_filters, saved_stories",
        )
        .bind(user_id)
        .bind(Json(story))
        .bind(max_saved as i64)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn remove_saved_story(&self, user_id: Uuid, story_id: &str) -> PortResult<Option<User>> {
        // Self-join so RETURNING can hand back the row as it was before the update.
        let record = sqlx::query_as::<_, UserRecord>(
            "UPDATE users AS u SET saved_stories = COALESCE( \
                 (SELECT jsonb_agg(e.s ORDER BY e.ord) \
                  FROM jsonb_array_elements(prev.saved_stories) WITH ORDINALITY AS e(s, ord) \
                  WHERE e.s->>'storyID' <> $2), \
                 '[]'::jsonb) \
             FROM users AS prev \
             WHERE u.id = $1 AND prev.id = u.id \
             RETURNING prev.id, prev.display_name, prev.email, prev.created_at, \
                       prev.settings, prev.news_filters, prev.saved_stories",
        )
        .bind(user_id)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn list_shared_stories(&self) -> PortResult<Vec<SharedStory>> {
        let records = sqlx::query_as::<_, SharedStoryRecord>(
            "SELECT story, comments FROM shared_stories ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn count_shared_stories(&self) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shared_stories")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }

    async fn get_shared_story(&self, story_id: &str) -> PortResult<SharedStory> {
        let record = sqlx::query_as::<_, SharedStoryRecord>(
            "SELECT story, comments FROM shared_stories WHERE story_id = $1",
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Shared story {} not found", story_id)))?;
        Ok(record.to_domain())
    }

    async fn insert_shared_story(&self, shared: SharedStory) -> PortResult<SharedStory> {
        let story_id = shared.story.story_id.clone();
        let record = sqlx::query_as::<_, SharedStoryRecord>(
            "INSERT INTO shared_stories (story_id, story, comments) VALUES ($1, $2, $3) \
             ON CONFLICT (story_id) DO NOTHING \
             RETURNING story, comments",
        )
        .bind(&story_id)
        .bind(Json(shared.story))
        .bind(Json(shared.comments))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, format!("Story {} already shared", story_id)))?
        .ok_or_else(|| PortError::Conflict(format!("Story {} already shared", story_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_shared_story(&self, story_id: &str) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM shared_stories WHERE story_id = $1")
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn append_comment(
        &self,
        story_id: &str,
        comment: Comment,
        max_comments: usize,
    ) -> PortResult<Option<SharedStory>> {
        let record = sqlx::query_as::<_, SharedStoryRecord>(
            "UPDATE shared_stories SET comments = comments || jsonb_build_array($2::jsonb) \
             WHERE story_id = $1 AND jsonb_array_length(comments) < $3 \
             RETURNING story, comments",
        )
        .bind(story_id)
        .bind(Json(comment))
        .bind(max_comments as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SharedStoryRecord::to_domain))
    }

    async fn get_home_news(&self, id: &str) -> PortResult<HomeNews> {
        let record = sqlx::query_as::<_, HomeNewsRecord>(
            "SELECT id, home_news_stories FROM home_news WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Home news document {} not found", id)))?;
        Ok(record.to_domain())
    }
}
