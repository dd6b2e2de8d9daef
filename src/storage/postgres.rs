//! Postgres storage
//!
//! Runs the embedded migrations on startup. Multi-table operations run in a
//! single transaction, an early return before `commit` rolls everything back.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Postgres as Pg;
use sqlx::Transaction;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::chapters::Chapter;
use crate::collections::Collection;
use crate::entries::Entry;
use crate::moods::Mood;
use crate::users::User;

use super::ChapterDetail;
use super::CreateChapterValues;
use super::CreateCollectionValues;
use super::CreateEntryValues;
use super::CreateMoodValues;
use super::CreateUserValues;
use super::EntryDetail;
use super::Error;
use super::Result;
use super::Storage;
use super::UpdateChapterValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// The user columns the application works with
///
/// The table carries more (`phone`, `profile_picture`), nothing reads them
const USER_COLUMNS: &str = "id, email, name, hashed_password, is_verified, is_staff, \
     is_superuser, otp_code, otp_expires_at, created_at, updated_at";

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage from the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    ///
    /// # Errors
    ///
    /// Will return `Err` when the variable is missing, the database is
    /// unreachable, or migrations fail
    pub async fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Connection("`DATABASE_URL` is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await
            .map_err(connection_error)?;

        Self::from_pool(pool).await
    }

    /// Create Postgres storage from an existing pool
    ///
    /// Migrations will be run
    ///
    /// # Errors
    ///
    /// Will return `Err` when migrations fail
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        MIGRATOR.run(&pool).await.map_err(connection_error)?;

        Ok(Self { pool })
    }

    /// Collections attached to a set of entries, keyed by entry
    async fn entry_collection_map(
        &self,
        entry_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Collection>>> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, LinkedCollection>(
            r"
            SELECT ec.entry_id AS linked_id,
                c.id, c.user_id, c.name, c.slug, c.color, c.last_used, c.created_at, c.updated_at
            FROM entry_collections ec
            JOIN collections c ON c.id = ec.collection_id
            WHERE ec.entry_id = ANY($1)
            ORDER BY c.created_at",
        )
        .bind(entry_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)?;

        Ok(group_linked(rows))
    }

    /// Collections attached to a set of chapters, keyed by chapter
    async fn chapter_collection_map(
        &self,
        chapter_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Collection>>> {
        if chapter_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, LinkedCollection>(
            r"
            SELECT cc.chapter_id AS linked_id,
                c.id, c.user_id, c.name, c.slug, c.color, c.last_used, c.created_at, c.updated_at
            FROM chapter_collections cc
            JOIN collections c ON c.id = cc.collection_id
            WHERE cc.chapter_id = ANY($1)
            ORDER BY c.created_at",
        )
        .bind(chapter_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)?;

        Ok(group_linked(rows))
    }

    /// Assemble the detail payloads for a batch of entries
    async fn entry_details(&self, entries: Vec<Entry>) -> Result<Vec<EntryDetail>> {
        let entry_ids = entries.iter().map(|entry| entry.id).collect::<Vec<Uuid>>();
        let mut collections = self.entry_collection_map(&entry_ids).await?;

        let mood_ids = entries
            .iter()
            .filter_map(|entry| entry.mood_id)
            .collect::<Vec<Uuid>>();
        let moods = if mood_ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, Mood>("SELECT * FROM moods WHERE id = ANY($1)")
                .bind(&mood_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(connection_error)?
                .into_iter()
                .map(|mood| (mood.id, mood))
                .collect::<HashMap<Uuid, Mood>>()
        };

        let chapter_ids = entries
            .iter()
            .filter_map(|entry| entry.chapter_id)
            .collect::<Vec<Uuid>>();
        let chapters = if chapter_ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, Chapter>("SELECT * FROM chapters WHERE id = ANY($1)")
                .bind(&chapter_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(connection_error)?
                .into_iter()
                .map(|chapter| (chapter.id, chapter))
                .collect::<HashMap<Uuid, Chapter>>()
        };

        Ok(entries
            .into_iter()
            .map(|entry| EntryDetail {
                collections: collections.remove(&entry.id).unwrap_or_default(),
                mood: entry.mood_id.and_then(|id| moods.get(&id).cloned()),
                chapter: entry.chapter_id.and_then(|id| chapters.get(&id).cloned()),
                entry,
            })
            .collect())
    }

    /// Assemble the detail payloads for a batch of chapters
    async fn chapter_details(&self, chapters: Vec<Chapter>) -> Result<Vec<ChapterDetail>> {
        let chapter_ids = chapters
            .iter()
            .map(|chapter| chapter.id)
            .collect::<Vec<Uuid>>();
        let mut collections = self.chapter_collection_map(&chapter_ids).await?;

        let mut entries: HashMap<Uuid, Vec<Entry>> = HashMap::new();
        if !chapter_ids.is_empty() {
            let rows = sqlx::query_as::<_, Entry>(
                "SELECT * FROM entries WHERE chapter_id = ANY($1) ORDER BY created_at DESC",
            )
            .bind(&chapter_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(connection_error)?;

            for entry in rows {
                if let Some(chapter_id) = entry.chapter_id {
                    entries.entry(chapter_id).or_default().push(entry);
                }
            }
        }

        Ok(chapters
            .into_iter()
            .map(|chapter| ChapterDetail {
                collections: collections.remove(&chapter.id).unwrap_or_default(),
                entries: entries.remove(&chapter.id).unwrap_or_default(),
                chapter,
            })
            .collect())
    }

    /// Assemble the detail payload of a single chapter
    async fn chapter_detail(&self, chapter: Chapter) -> Result<ChapterDetail> {
        let mut details = self.chapter_details(vec![chapter]).await?;

        Ok(details.remove(0))
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_error)
    }

    async fn find_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_error)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let query = format!(
            "INSERT INTO users (id, email, name, hashed_password, otp_code, otp_expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(values.email)
            .bind(values.name)
            .bind(values.hashed_password)
            .bind(values.otp_code)
            .bind(values.otp_expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unique_or_connection_error("email"))
    }

    async fn set_otp(
        &self,
        user_id: &Uuid,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users
             SET otp_code = $1, otp_expires_at = $2, updated_at = CURRENT_TIMESTAMP
             WHERE id = $3",
        )
        .bind(otp_code)
        .bind(otp_expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("user"))
    }

    async fn mark_verified(&self, user_id: &Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users
             SET is_verified = TRUE, otp_code = NULL, otp_expires_at = NULL,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("user"))
    }

    async fn create_mood(&self, values: &CreateMoodValues) -> Result<Mood> {
        sqlx::query_as::<_, Mood>(
            "INSERT INTO moods (id, user_id, name, color, emoji)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(values.user_id)
        .bind(values.name)
        .bind(values.color)
        .bind(values.emoji)
        .fetch_one(&self.pool)
        .await
        .map_err(connection_error)
    }

    async fn find_all_moods(&self, user_id: &Uuid) -> Result<Vec<Mood>> {
        sqlx::query_as::<_, Mood>(
            "SELECT * FROM moods WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)
    }

    async fn delete_mood(&self, user_id: &Uuid, mood_id: &Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        assert_record_owned(&mut tx, "moods", "mood", mood_id, *user_id).await?;

        // entries keep existing, they just lose the mood reference
        sqlx::query("UPDATE entries SET mood_id = NULL WHERE mood_id = $1 AND user_id = $2")
            .bind(mood_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        sqlx::query("DELETE FROM moods WHERE id = $1 AND user_id = $2")
            .bind(mood_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        tx.commit().await.map_err(connection_error)
    }

    async fn create_collection(&self, values: &CreateCollectionValues) -> Result<Collection> {
        sqlx::query_as::<_, Collection>(
            "INSERT INTO collections (id, user_id, name, slug, color, last_used)
             VALUES ($1, $2, $3, $4, $5, CURRENT_TIMESTAMP)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(values.user_id)
        .bind(values.name)
        .bind(values.slug)
        .bind(values.color)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_or_connection_error("collection name"))
    }

    async fn find_all_collections(&self, user_id: &Uuid) -> Result<Vec<Collection>> {
        sqlx::query_as::<_, Collection>(
            "SELECT * FROM collections WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)
    }

    async fn delete_collection(&self, user_id: &Uuid, collection_id: &Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        assert_record_owned(&mut tx, "collections", "collection", collection_id, *user_id).await?;

        sqlx::query("DELETE FROM entry_collections WHERE collection_id = $1")
            .bind(collection_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        sqlx::query("DELETE FROM chapter_collections WHERE collection_id = $1")
            .bind(collection_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        sqlx::query("DELETE FROM collections WHERE id = $1 AND user_id = $2")
            .bind(collection_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        tx.commit().await.map_err(connection_error)
    }

    async fn create_entry(&self, values: &CreateEntryValues) -> Result<EntryDetail> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        // all ownership checks happen before the first mutating statement
        if let Some(chapter_id) = values.chapter_id {
            assert_reference_owned(&mut tx, "chapters", "chapter", &chapter_id, values.user_id)
                .await?;
        }

        if let Some(mood_id) = values.mood_id {
            assert_reference_owned(&mut tx, "moods", "mood", &mood_id, values.user_id).await?;
        }

        let collection_ids =
            assert_owned_collections(&mut tx, values.user_id, values.collection_ids).await?;

        let entry = sqlx::query_as::<_, Entry>(
            "INSERT INTO entries (id, user_id, title, content, slug, mood_id, chapter_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(values.user_id)
        .bind(values.title)
        .bind(values.content)
        .bind(values.slug)
        .bind(values.mood_id)
        .bind(values.chapter_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(connection_error)?;

        attach_collections(&mut tx, "entry_collections", "entry_id", &entry.id, &collection_ids)
            .await?;

        tx.commit().await.map_err(connection_error)?;

        let mut details = self.entry_details(vec![entry]).await?;

        Ok(details.remove(0))
    }

    async fn find_all_entries(&self, user_id: &Uuid) -> Result<Vec<EntryDetail>> {
        let entries = sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)?;

        self.entry_details(entries).await
    }

    async fn find_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<Option<EntryDetail>> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT * FROM entries WHERE id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(connection_error)?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        let mut details = self.entry_details(vec![entry]).await?;

        Ok(Some(details.remove(0)))
    }

    async fn delete_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        assert_record_owned(&mut tx, "entries", "entry", entry_id, *user_id).await?;

        sqlx::query("DELETE FROM entry_collections WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        tx.commit().await.map_err(connection_error)
    }

    async fn set_entry_favourite(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entries
             SET is_favourite = $1, updated_at = CURRENT_TIMESTAMP
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_favourite)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("entry"))
    }

    async fn set_entry_archived(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_archived: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entries
             SET is_archived = $1, updated_at = CURRENT_TIMESTAMP
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_archived)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("entry"))
    }

    async fn create_chapter(&self, values: &CreateChapterValues) -> Result<ChapterDetail> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        let collection_ids =
            assert_owned_collections(&mut tx, values.user_id, values.collection_ids).await?;
        let entry_ids = assert_owned_entries(&mut tx, values.user_id, values.entry_ids).await?;

        let chapter = sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (id, user_id, title, description, color, slug)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(values.user_id)
        .bind(values.title)
        .bind(values.description)
        .bind(values.color)
        .bind(values.slug)
        .fetch_one(&mut *tx)
        .await
        .map_err(connection_error)?;

        attach_collections(
            &mut tx,
            "chapter_collections",
            "chapter_id",
            &chapter.id,
            &collection_ids,
        )
        .await?;

        if !entry_ids.is_empty() {
            sqlx::query("UPDATE entries SET chapter_id = $1 WHERE id = ANY($2) AND user_id = $3")
                .bind(chapter.id)
                .bind(&entry_ids)
                .bind(values.user_id)
                .execute(&mut *tx)
                .await
                .map_err(connection_error)?;
        }

        tx.commit().await.map_err(connection_error)?;

        self.chapter_detail(chapter).await
    }

    async fn find_all_chapters(&self, user_id: &Uuid) -> Result<Vec<ChapterDetail>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT * FROM chapters WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)?;

        self.chapter_details(chapters).await
    }

    async fn update_chapter(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        values: &UpdateChapterValues,
    ) -> Result<ChapterDetail> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        let owned = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM chapters WHERE id = $1 AND user_id = $2 LIMIT 1",
        )
        .bind(chapter_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(connection_error)?;

        if owned.is_none() {
            return Err(Error::NotFound("chapter"));
        }

        // validate both replacement sets before the first mutating statement
        let collection_ids = match values.collection_ids {
            Some(ids) => Some(assert_owned_collections(&mut tx, *user_id, ids).await?),
            None => None,
        };
        let entry_ids = match values.entry_ids {
            Some(ids) => Some(assert_owned_entries(&mut tx, *user_id, ids).await?),
            None => None,
        };

        let chapter = sqlx::query_as::<_, Chapter>(
            "UPDATE chapters
             SET title = COALESCE($1, title),
                 description = COALESCE($2, description),
                 color = COALESCE($3, color),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $4
             RETURNING *",
        )
        .bind(values.title.map(str::trim))
        .bind(values.description.map(str::trim))
        .bind(values.color)
        .bind(chapter_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(connection_error)?;

        if let Some(collection_ids) = collection_ids {
            sqlx::query("DELETE FROM chapter_collections WHERE chapter_id = $1")
                .bind(chapter_id)
                .execute(&mut *tx)
                .await
                .map_err(connection_error)?;

            attach_collections(
                &mut tx,
                "chapter_collections",
                "chapter_id",
                chapter_id,
                &collection_ids,
            )
            .await?;
        }

        if let Some(entry_ids) = entry_ids {
            // detach every current member, then attach exactly the new set
            sqlx::query(
                "UPDATE entries SET chapter_id = NULL WHERE chapter_id = $1 AND user_id = $2",
            )
            .bind(chapter_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

            if !entry_ids.is_empty() {
                sqlx::query(
                    "UPDATE entries SET chapter_id = $1 WHERE id = ANY($2) AND user_id = $3",
                )
                .bind(chapter_id)
                .bind(&entry_ids)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(connection_error)?;
            }
        }

        tx.commit().await.map_err(connection_error)?;

        self.chapter_detail(chapter).await
    }

    async fn delete_chapter(&self, user_id: &Uuid, chapter_id: &Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(connection_error)?;

        assert_record_owned(&mut tx, "chapters", "chapter", chapter_id, *user_id).await?;

        sqlx::query("DELETE FROM chapter_collections WHERE chapter_id = $1")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        // member entries survive, unfiled
        sqlx::query("UPDATE entries SET chapter_id = NULL WHERE chapter_id = $1 AND user_id = $2")
            .bind(chapter_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        sqlx::query("DELETE FROM chapters WHERE id = $1 AND user_id = $2")
            .bind(chapter_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(connection_error)?;

        tx.commit().await.map_err(connection_error)
    }

    async fn set_chapter_favourite(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chapters
             SET is_favourite = $1, updated_at = CURRENT_TIMESTAMP
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_favourite)
        .bind(chapter_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("chapter"))
    }

    async fn set_chapter_archived(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_archived: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chapters
             SET is_archived = $1, updated_at = CURRENT_TIMESTAMP
             WHERE id = $2 AND user_id = $3",
        )
        .bind(is_archived)
        .bind(chapter_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        affected_or(result.rows_affected(), Error::NotFound("chapter"))
    }
}

/// A collection row joined through an association table
#[derive(sqlx::FromRow)]
struct LinkedCollection {
    /// The entry or chapter on the other side of the association
    linked_id: Uuid,

    #[sqlx(flatten)]
    collection: Collection,
}

/// Group joined collection rows by the record they are attached to
fn group_linked(rows: Vec<LinkedCollection>) -> HashMap<Uuid, Vec<Collection>> {
    let mut map: HashMap<Uuid, Vec<Collection>> = HashMap::new();

    for row in rows {
        map.entry(row.linked_id).or_default().push(row.collection);
    }

    map
}

/// A referenced record must exist under the given owner
async fn assert_reference_owned(
    tx: &mut Transaction<'_, Pg>,
    table: &str,
    entity: &'static str,
    id: &Uuid,
    user_id: Uuid,
) -> Result<()> {
    if record_owned(tx, table, id, user_id).await? {
        Ok(())
    } else {
        Err(Error::ForeignReference(entity))
    }
}

/// The record being operated on must exist under the given owner
///
/// A record under another owner behaves like a missing one
async fn assert_record_owned(
    tx: &mut Transaction<'_, Pg>,
    table: &str,
    entity: &'static str,
    id: &Uuid,
    user_id: Uuid,
) -> Result<()> {
    if record_owned(tx, table, id, user_id).await? {
        Ok(())
    } else {
        Err(Error::NotFound(entity))
    }
}

async fn record_owned(
    tx: &mut Transaction<'_, Pg>,
    table: &str,
    id: &Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let query = format!("SELECT id FROM {table} WHERE id = $1 AND user_id = $2 LIMIT 1");

    let found = sqlx::query_scalar::<_, Uuid>(&query)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(connection_error)?;

    Ok(found.is_some())
}

/// Every referenced collection must exist under the given owner
///
/// Returns the deduplicated ID set, a count mismatch aborts
async fn assert_owned_collections(
    tx: &mut Transaction<'_, Pg>,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    assert_owned_set(tx, "collections", "collection", user_id, ids).await
}

/// Every referenced entry must exist under the given owner
///
/// Returns the deduplicated ID set, a count mismatch aborts
async fn assert_owned_entries(
    tx: &mut Transaction<'_, Pg>,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    assert_owned_set(tx, "entries", "entry", user_id, ids).await
}

async fn assert_owned_set(
    tx: &mut Transaction<'_, Pg>,
    table: &str,
    entity: &'static str,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    let unique = ids
        .iter()
        .copied()
        .collect::<HashSet<Uuid>>()
        .into_iter()
        .collect::<Vec<Uuid>>();

    if unique.is_empty() {
        return Ok(unique);
    }

    let query = format!("SELECT COUNT(*) FROM {table} WHERE id = ANY($1) AND user_id = $2");

    let found = sqlx::query_scalar::<_, i64>(&query)
        .bind(&unique)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(connection_error)?;

    if usize::try_from(found).unwrap_or(0) != unique.len() {
        return Err(Error::ForeignReference(entity));
    }

    Ok(unique)
}

/// Insert association rows for a set of collections
async fn attach_collections(
    tx: &mut Transaction<'_, Pg>,
    table: &str,
    column: &str,
    id: &Uuid,
    collection_ids: &[Uuid],
) -> Result<()> {
    if collection_ids.is_empty() {
        return Ok(());
    }

    let query = format!(
        "INSERT INTO {table} ({column}, collection_id) SELECT $1::uuid, unnest($2::uuid[])"
    );

    sqlx::query(&query)
        .bind(id)
        .bind(collection_ids)
        .execute(&mut **tx)
        .await
        .map_err(connection_error)?;

    Ok(())
}

/// Map "zero rows touched" to the given error
fn affected_or(rows_affected: u64, error: Error) -> Result<()> {
    if rows_affected == 0 { Err(error) } else { Ok(()) }
}

/// Convert `SQLx` to storage connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}

/// Unique violations become [`Error::Duplicate`], anything else a connection
/// error
fn unique_or_connection_error(entity: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Duplicate(entity),
        _ => Error::Connection(err.to_string()),
    }
}
