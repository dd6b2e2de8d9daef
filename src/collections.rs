use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

/// A user-defined grouping, attachable to both entries and chapters
///
/// Names are unique across the whole table, not per user, mirroring the
/// unique index of the original schema
#[derive(Clone, Debug)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
