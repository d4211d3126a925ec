use crate::record::{PostRecord, UserRecord};
use inkpost_common::model::{
    Id, ModelValidationError,
    password::PasswordHash,
    post::{Post, PostContent, PostMarker},
    user::{Email, User, UserAccount, UserMarker},
};
use sqlx::{
    SqlitePool,
    migrate::{MigrateError, Migrator},
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tracing::debug;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a write waits for another connection's write lock before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A user with email {0} already exists")]
    EmailTaken(String),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Handle to the credential store.
///
/// Every method checks a connection out of the pool for the duration of one
/// statement; it goes back to the pool when the call returns, successful or not.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool on `database_url` with foreign keys enforced. Writers on
    /// different connections queue for up to [`BUSY_TIMEOUT`], so a losing
    /// duplicate signup sees the unique constraint rather than a locked database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new user. Fails with [`DbError::EmailTaken`] when the email is
    /// already registered, including when a concurrent signup wins the race.
    pub async fn create_user(&self, email: &Email, password_hash: &PasswordHash) -> Result<User> {
        let id = query_scalar::<_, i64>(
            "
            INSERT INTO users (email, hashed_password)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(email.get())
        .bind(password_hash.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::EmailTaken(email.get().to_owned())
            }
            err => DbError::Sqlx(err),
        })?;

        debug!(user_id = id, "Created user");

        Ok(User {
            id: id.into(),
            email: email.clone(),
        })
    }

    pub async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.id,
                users.email,
                users.hashed_password
            FROM
                users
            WHERE
                users.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(UserAccount::try_from).transpose()?;
        Ok(account)
    }

    pub async fn create_post(&self, post: &PostContent, author: Id<UserMarker>) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts (text, user_id)
            VALUES ($1, $2)
            RETURNING id, text, user_id
            ",
        )
        .bind(&post.text)
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        debug!(post_id = record.id, user_id = record.user_id, "Created post");

        Ok(record.into())
    }

    pub async fn fetch_user_posts(&self, author: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.text,
                posts.user_id
            FROM
                posts
            WHERE
                posts.user_id = $1
            ORDER BY
                posts.id
            ",
        )
        .bind(author.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    /// Deletes the post only if `author` owns it. Returns whether a post was
    /// deleted; a post owned by someone else is indistinguishable from a
    /// missing one.
    pub async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            DELETE FROM posts
            WHERE
                posts.id = $1
                AND posts.user_id = $2
            ",
        )
        .bind(post_id.get())
        .bind(author.get())
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(%post_id, user_id = %author, "Deleted post");
        }

        Ok(deleted)
    }
}
