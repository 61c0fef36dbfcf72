use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent-login token. The selector is a public lookup key; the validator
/// and the client user-agent are stored only as SHA-256 hashes.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RememberToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub selector: String,
    pub validator_hash: String,
    pub user_agent_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
