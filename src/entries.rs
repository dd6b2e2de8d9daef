use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub is_archived: bool,
    pub is_favourite: bool,
    pub mood_id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
