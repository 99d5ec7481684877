pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_demo, SeedSummary};
pub use repositories::{
    RepositoryError, SqlDocumentCatalog, SqlIdentityProvider, SqlUserDirectory, SqlWorkflowStore,
};
