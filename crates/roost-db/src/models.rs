use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

// ── ServerMapping ───────────────────────────────────────────────────

/// Links one billing service to the panel resources provisioned for it.
///
/// The billing service id is the primary key: a service has at most one
/// server, and a second create for the same service must fail before it
/// reaches the panel.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServerMapping {
    pub service_id: i64,
    pub panel_user_id: i64,
    pub panel_server_id: i64,
    pub created_at: DateTime<Utc>,
}

pub struct NewServerMapping {
    pub service_id: i64,
    pub panel_user_id: i64,
    pub panel_server_id: i64,
}

impl ServerMapping {
    pub async fn insert(pool: &SqlitePool, mapping: &NewServerMapping) -> sqlx::Result<Self> {
        sqlx::query_as(
            r#"INSERT INTO server_mappings (service_id, panel_user_id, panel_server_id, created_at)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(mapping.service_id)
        .bind(mapping.panel_user_id)
        .bind(mapping.panel_server_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_service(pool: &SqlitePool, service_id: i64) -> sqlx::Result<Option<Self>> {
        sqlx::query_as("SELECT * FROM server_mappings WHERE service_id = ?")
            .bind(service_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, service_id: i64) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM server_mappings WHERE service_id = ?")
            .bind(service_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
