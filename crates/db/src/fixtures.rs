//! Deterministic demo dataset: a small user directory and a couple of draft
//! documents, enough to exercise a full approval chain from the CLI.

use docflow_core::domain::user::Role;

use crate::repositories::{RepositoryError, SqlDocumentCatalog, SqlUserDirectory};
use crate::DbPool;

const DEMO_USERS: &[(&str, &str, Role)] = &[
    ("petrov", "Ivan Petrov", Role::Admin),
    ("sidorova", "Elena Sidorova", Role::Manager),
    ("kim", "Olga Kim", Role::Manager),
    ("volkov", "Dmitry Volkov", Role::Employee),
];

const DEMO_DOCUMENTS: &[(&str, Option<&str>)] = &[
    ("Supply contract 2026-014", Some("contracts")),
    ("Vacation policy v3", Some("hr")),
    ("Q3 marketing budget", Some("finance")),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users_created: usize,
    pub documents_created: usize,
}

/// Seeds demo users and documents. Safe to re-run: existing usernames and
/// document names are left untouched.
pub async fn seed_demo(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let directory = SqlUserDirectory::new(pool.clone());
    let catalog = SqlDocumentCatalog::new(pool.clone());
    let mut summary = SeedSummary::default();

    for (username, full_name, role) in DEMO_USERS {
        if directory.find_by_username(username).await?.is_none() {
            directory.create_user(username, full_name, *role).await?;
            summary.users_created += 1;
        }
    }

    for (name, category) in DEMO_DOCUMENTS {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT document_id FROM documents WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if existing.is_none() {
            catalog.create_document(name, *category).await?;
            summary.documents_created += 1;
        }
    }

    tracing::info!(
        event_name = "fixtures.seeded",
        users_created = summary.users_created,
        documents_created = summary.documents_created,
        "demo fixtures applied"
    );

    Ok(summary)
}
