use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Chapter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub color: String,
    pub slug: String,
    pub is_archived: bool,
    pub is_favourite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
