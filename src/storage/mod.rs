//! All things related to the storage of diary records
//!
//! Every operation on user-owned records is keyed by `(record id, owner id)`,
//! a record that exists under another owner behaves exactly like a record
//! that does not exist. Multi-table mutations are atomic within a single
//! backend call.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::chapters::Chapter;
use crate::collections::Collection;
use crate::entries::Entry;
use crate::moods::Mood;
use crate::users::User;

#[cfg(any(test, not(feature = "postgres")))]
pub use memory::Memory;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

#[cfg(any(test, not(feature = "postgres")))]
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
///
/// # Errors
///
/// Will return `Err` when the database is unreachable or migrations fail
#[cfg(feature = "postgres")]
pub async fn setup() -> Result<Postgres> {
    Postgres::from_env().await
}

/// Setup the storage
///
/// # Errors
///
/// The in-memory backend can not fail to initialize
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> Result<Memory> {
    tracing::warn!("Using the in-memory storage backend, records are lost on shutdown");

    Ok(Memory::new())
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// The record is absent, or owned by somebody else
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A referenced record is absent, or owned by somebody else
    #[error("invalid {0} reference")]
    ForeignReference(&'static str),

    /// A unique field is already taken
    #[error("{0} already exists")]
    Duplicate(&'static str),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// Display name
    pub name: &'a str,

    /// Unique email address
    pub email: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,

    /// The initial verification code
    pub otp_code: &'a str,

    /// When the initial verification code stops being valid
    pub otp_expires_at: DateTime<Utc>,
}

/// Values to create a Mood
pub struct CreateMoodValues<'a> {
    /// Owning user
    pub user_id: Uuid,

    /// Mood name
    pub name: &'a str,

    /// Display color
    pub color: &'a str,

    /// Display emoji
    pub emoji: &'a str,
}

/// Values to create a Collection
pub struct CreateCollectionValues<'a> {
    /// Owning user
    pub user_id: Uuid,

    /// Collection name, unique across the whole table
    pub name: &'a str,

    /// Slug derived from the name
    pub slug: &'a str,

    /// Display color
    pub color: &'a str,
}

/// Values to create an Entry
pub struct CreateEntryValues<'a> {
    /// Owning user
    pub user_id: Uuid,

    /// Entry title
    pub title: &'a str,

    /// Entry body
    pub content: &'a str,

    /// Slug derived from the title
    pub slug: &'a str,

    /// Optional mood, must belong to the owning user
    pub mood_id: Option<Uuid>,

    /// Optional chapter, must belong to the owning user
    pub chapter_id: Option<Uuid>,

    /// Collections to attach, every single one must belong to the owning user
    pub collection_ids: &'a [Uuid],
}

/// Values to create a Chapter
pub struct CreateChapterValues<'a> {
    /// Owning user
    pub user_id: Uuid,

    /// Chapter title
    pub title: &'a str,

    /// Chapter description
    pub description: &'a str,

    /// Display color
    pub color: &'a str,

    /// Slug derived from the title
    pub slug: &'a str,

    /// Collections to attach, every single one must belong to the owning user
    pub collection_ids: &'a [Uuid],

    /// Existing entries to move into the chapter, all owned by the user
    pub entry_ids: &'a [Uuid],
}

/// Values to update a Chapter
///
/// `None` fields are left untouched. A supplied collection list *replaces*
/// the association set, a supplied entry list detaches all current members
/// and attaches exactly the given ones.
#[derive(Default)]
pub struct UpdateChapterValues<'a> {
    /// New title, the slug is not regenerated
    pub title: Option<&'a str>,

    /// New description
    pub description: Option<&'a str>,

    /// New display color
    pub color: Option<&'a str>,

    /// Replacement collection set
    pub collection_ids: Option<&'a [Uuid]>,

    /// Replacement member entry set
    pub entry_ids: Option<&'a [Uuid]>,
}

/// An entry with its associations, the way detail payloads carry it
#[derive(Clone, Debug)]
pub struct EntryDetail {
    /// The entry itself
    pub entry: Entry,

    /// Attached collections
    pub collections: Vec<Collection>,

    /// The mood, when one is set
    pub mood: Option<Mood>,

    /// The chapter the entry is filed under, when any
    pub chapter: Option<Chapter>,
}

/// A chapter with its associations
#[derive(Clone, Debug)]
pub struct ChapterDetail {
    /// The chapter itself
    pub chapter: Chapter,

    /// Attached collections
    pub collections: Vec<Collection>,

    /// Entries filed under the chapter
    pub entries: Vec<Entry>,
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Finds a single user by its email address
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Create a single user in the unverified state
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Install a fresh verification code on a user
    async fn set_otp(
        &self,
        user_id: &Uuid,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark a user verified and consume the verification code
    async fn mark_verified(&self, user_id: &Uuid) -> Result<()>;

    /// Create a mood
    async fn create_mood(&self, values: &CreateMoodValues) -> Result<Mood>;

    /// Find all moods of a user
    async fn find_all_moods(&self, user_id: &Uuid) -> Result<Vec<Mood>>;

    /// Delete a mood, entries referencing it lose the reference
    async fn delete_mood(&self, user_id: &Uuid, mood_id: &Uuid) -> Result<()>;

    /// Create a collection
    async fn create_collection(&self, values: &CreateCollectionValues) -> Result<Collection>;

    /// Find all collections of a user
    async fn find_all_collections(&self, user_id: &Uuid) -> Result<Vec<Collection>>;

    /// Delete a collection and its association rows
    async fn delete_collection(&self, user_id: &Uuid, collection_id: &Uuid) -> Result<()>;

    /// Create an entry with its associations, all-or-nothing
    async fn create_entry(&self, values: &CreateEntryValues) -> Result<EntryDetail>;

    /// Find all entries of a user, associations included
    async fn find_all_entries(&self, user_id: &Uuid) -> Result<Vec<EntryDetail>>;

    /// Find a single entry of a user, associations included
    async fn find_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<Option<EntryDetail>>;

    /// Delete an entry, clearing its collection links first
    async fn delete_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<()>;

    /// Flip the favourite flag on an entry
    async fn set_entry_favourite(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()>;

    /// Flip the archived flag on an entry
    async fn set_entry_archived(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_archived: bool,
    ) -> Result<()>;

    /// Create a chapter with its associations, all-or-nothing
    async fn create_chapter(&self, values: &CreateChapterValues) -> Result<ChapterDetail>;

    /// Find all chapters of a user, associations included
    async fn find_all_chapters(&self, user_id: &Uuid) -> Result<Vec<ChapterDetail>>;

    /// Update a chapter, all-or-nothing
    ///
    /// See [`UpdateChapterValues`] for the replace semantics of the
    /// association lists
    async fn update_chapter(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        values: &UpdateChapterValues,
    ) -> Result<ChapterDetail>;

    /// Delete a chapter
    ///
    /// Member entries survive unfiled, attached collections survive detached
    async fn delete_chapter(&self, user_id: &Uuid, chapter_id: &Uuid) -> Result<()>;

    /// Flip the favourite flag on a chapter
    async fn set_chapter_favourite(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()>;

    /// Flip the archived flag on a chapter
    async fn set_chapter_archived(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_archived: bool,
    ) -> Result<()>;
}
