use shopfront_db::{DbClient, DbConfig};
use std::sync::Arc;

/// Connect with `SHOPFRONT_DB_*` settings and bring the schema up to date.
pub async fn test_db_client() -> Arc<DbClient> {
    let config = DbConfig::from_env();
    let db = DbClient::connect(&config)
        .await
        .expect("Failed to connect to test database");
    db.migrate().await.expect("Failed to migrate test database");
    Arc::new(db)
}

/// Identifier no other test run will reuse.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::now_v7().simple())
}
