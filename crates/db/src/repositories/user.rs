use chrono::Utc;
use sqlx::Row;

use docflow_core::domain::user::{Role, User, UserId};
use docflow_core::errors::StoreError;
use docflow_core::store::IdentityProvider;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlUserDirectory {
    pool: DbPool,
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let username: String =
        row.try_get("username").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let full_name: String =
        row.try_get("full_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(User { id: UserId(id), username, full_name, role: Role::parse(&role) })
}

impl SqlUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_user(
        &self,
        username: &str,
        full_name: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO users (username, full_name, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(full_name)
        .bind(role.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: UserId(inserted.last_insert_rowid()),
            username: username.to_owned(),
            full_name: full_name.to_owned(),
            role,
        })
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query("SELECT user_id, username, full_name, role FROM users WHERE user_id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query("SELECT user_id, username, full_name, role FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_user(row)?)),
            None => Ok(None),
        }
    }
}

/// Identity provider backed by the user directory: the session user is fixed
/// at construction (the CLI resolves it from `--as-user`), the row is read
/// per call so role changes are picked up.
pub struct SqlIdentityProvider {
    directory: SqlUserDirectory,
    session_user: UserId,
}

impl SqlIdentityProvider {
    pub fn new(pool: DbPool, session_user: UserId) -> Self {
        Self { directory: SqlUserDirectory::new(pool), session_user }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SqlIdentityProvider {
    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        self.directory.find_by_id(self.session_user).await.map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use docflow_core::domain::user::{Role, UserId};
    use docflow_core::store::IdentityProvider;

    use super::{SqlIdentityProvider, SqlUserDirectory};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let pool = setup().await;
        let directory = SqlUserDirectory::new(pool);

        let created =
            directory.create_user("petrov", "Ivan Petrov", Role::Manager).await.expect("create");

        let by_id = directory.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(by_id.username, "petrov");
        assert_eq!(by_id.role, Role::Manager);

        let by_name =
            directory.find_by_username("petrov").await.expect("find").expect("exists");
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn identity_provider_resolves_the_session_user() {
        let pool = setup().await;
        let directory = SqlUserDirectory::new(pool.clone());
        let user =
            directory.create_user("kim", "Olga Kim", Role::Employee).await.expect("create");

        let identity = SqlIdentityProvider::new(pool.clone(), user.id);
        let current = identity.current_user().await.expect("query").expect("exists");
        assert_eq!(current.id, user.id);

        let missing = SqlIdentityProvider::new(pool, UserId(404));
        assert!(missing.current_user().await.expect("query").is_none());
    }
}
