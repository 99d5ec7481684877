use chrono::Utc;
use sqlx::Row;

use docflow_core::domain::document::{Document, DocumentId, DocumentStatus};
use docflow_core::errors::StoreError;
use docflow_core::store::DocumentCatalog;

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlDocumentCatalog {
    pool: DbPool,
}

impl SqlDocumentCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Registers a new draft document in the catalog.
    pub async fn create_document(
        &self,
        name: &str,
        category: Option<&str>,
    ) -> Result<Document, RepositoryError> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO documents (name, category, status, created_at, updated_at)
             VALUES (?, ?, 'draft', ?, ?)",
        )
        .bind(name)
        .bind(category)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Document {
            id: DocumentId(inserted.last_insert_rowid()),
            name: name.to_owned(),
            category: category.map(str::to_owned),
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }

    async fn try_document(&self, id: DocumentId) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(
            "SELECT document_id, name, category, status, created_at, updated_at
             FROM documents WHERE document_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document_id: i64 =
            row.try_get("document_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let name: String =
            row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let category: Option<String> =
            row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let status: String =
            row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let created_at: String =
            row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let updated_at: String =
            row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(Some(Document {
            id: DocumentId(document_id),
            name,
            category,
            status: DocumentStatus::parse(&status),
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        }))
    }

    async fn try_set_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE document_id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentCatalog for SqlDocumentCatalog {
    async fn document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        self.try_document(id).await.map_err(StoreError::from)
    }

    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<(), StoreError> {
        self.try_set_status(id, status).await.map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use docflow_core::domain::document::{DocumentId, DocumentStatus};
    use docflow_core::store::DocumentCatalog;

    use super::SqlDocumentCatalog;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn create_and_find_document() {
        let catalog = SqlDocumentCatalog::new(setup().await);

        let created =
            catalog.create_document("Vacation policy", Some("hr")).await.expect("create");
        let found = catalog.document(created.id).await.expect("find").expect("should exist");

        assert_eq!(found.name, "Vacation policy");
        assert_eq!(found.category.as_deref(), Some("hr"));
        assert_eq!(found.status, DocumentStatus::Draft);
    }

    #[tokio::test]
    async fn set_status_updates_row() {
        let catalog = SqlDocumentCatalog::new(setup().await);
        let created = catalog.create_document("Budget 2026", None).await.expect("create");

        catalog.set_document_status(created.id, DocumentStatus::Review).await.expect("update");

        let found = catalog.document(created.id).await.expect("find").expect("should exist");
        assert_eq!(found.status, DocumentStatus::Review);
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let catalog = SqlDocumentCatalog::new(setup().await);
        assert!(catalog.document(DocumentId(404)).await.expect("query").is_none());
    }
}
