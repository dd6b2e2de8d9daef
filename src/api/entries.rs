//! Entries API endpoints
//!
//! Everything related to the diary entries themselves

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::chapters::Chapter;
use crate::slug::slugify;
use crate::storage::CreateEntryValues;
use crate::storage::EntryDetail;
use crate::storage::Storage;

use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::collections::CollectionResponse;
use super::current_user::BearerClaims;
use super::moods::MoodResponse;

/// The chapter an entry is filed under, as carried by entry payloads
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedChapter {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub color: String,
}

impl NestedChapter {
    fn from_chapter(chapter: Chapter) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title,
            slug: chapter.slug,
            color: chapter.color,
        }
    }
}

/// Entry response going to the user, associations included
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub is_archived: bool,
    pub is_favourite: bool,
    pub mood: Option<MoodResponse>,
    pub chapter: Option<NestedChapter>,
    pub collections: Vec<CollectionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryResponse {
    fn from_detail(detail: EntryDetail) -> Self {
        Self {
            id: detail.entry.id,
            title: detail.entry.title,
            content: detail.entry.content,
            slug: detail.entry.slug,
            is_archived: detail.entry.is_archived,
            is_favourite: detail.entry.is_favourite,
            mood: detail.mood.map(MoodResponse::from_mood),
            chapter: detail.chapter.map(NestedChapter::from_chapter),
            collections: CollectionResponse::from_collection_multiple(detail.collections),
            created_at: detail.entry.created_at,
            updated_at: detail.entry.updated_at,
        }
    }

    fn from_detail_multiple(details: Vec<EntryDetail>) -> Vec<Self> {
        details.into_iter().map(Self::from_detail).collect()
    }
}

/// Create entry form
///
/// `collection`, `mood` and `chapter` carry IDs of records that must belong
/// to the caller
#[derive(Debug, Deserialize)]
pub struct CreateEntryForm {
    title: String,
    content: String,
    #[serde(default, rename = "collection")]
    collections: Vec<Uuid>,
    #[serde(rename = "mood")]
    mood_id: Option<Uuid>,
    #[serde(rename = "chapter")]
    chapter_id: Option<Uuid>,
}

/// Create an entry with its associations
///
/// Every referenced mood/chapter/collection is checked against the caller
/// before anything is written, one bad reference aborts the whole create
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "First entry", "content": "Dear diary...", "collection": ["<uuid>"] }' \
///     http://localhost:3000/entries/create-new
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    Form(form): Form<CreateEntryForm>,
) -> Result<Success<EntryResponse>, Error> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(Error::bad_request("Title can not be empty"));
    }

    if form.content.is_empty() {
        return Err(Error::bad_request("Content can not be empty"));
    }

    let slug = slugify(title);
    let values = CreateEntryValues {
        user_id: claims.0.sub,
        title,
        content: &form.content,
        slug: &slug,
        mood_id: form.mood_id,
        chapter_id: form.chapter_id,
        collection_ids: &form.collections,
    };

    let detail = storage.create_entry(&values).await?;

    Ok(Success::created(EntryResponse::from_detail(detail)))
}

/// List all entries of the caller, associations included
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
) -> Result<Success<Vec<EntryResponse>>, Error> {
    let details = storage.find_all_entries(&claims.0.sub).await?;

    Ok(Success::ok(EntryResponse::from_detail_multiple(details)))
}

/// Get a single entry
///
/// Somebody else's entry is indistinguishable from a missing one
pub async fn detail<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(entry_id): PathParameters<Uuid>,
) -> Result<Success<EntryResponse>, Error> {
    storage
        .find_entry(&claims.0.sub, &entry_id)
        .await?
        .map_or_else(
            || Err(Error::not_found("entry not found")),
            |detail| Ok(Success::ok(EntryResponse::from_detail(detail))),
        )
}

/// Delete an entry
///
/// Attached collections survive, only the association rows go
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(entry_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    storage.delete_entry(&claims.0.sub, &entry_id).await?;

    Ok(Success::<&'static str>::no_content())
}

/// Favourite toggle form
#[derive(Debug, Deserialize)]
pub struct FavouriteForm {
    is_favourite: bool,
}

/// The toggle response
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub updated: bool,
}

/// Mark or unmark an entry as favourite
pub async fn mark_favourite<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(entry_id): PathParameters<Uuid>,
    Form(form): Form<FavouriteForm>,
) -> Result<Success<ToggleResponse>, Error> {
    storage
        .set_entry_favourite(&claims.0.sub, &entry_id, form.is_favourite)
        .await?;

    Ok(Success::ok(ToggleResponse { updated: true }))
}

/// Archive toggle form
#[derive(Debug, Deserialize)]
pub struct ArchiveForm {
    is_archived: bool,
}

/// Move an entry in or out of the archive
pub async fn archive<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(entry_id): PathParameters<Uuid>,
    Form(form): Form<ArchiveForm>,
) -> Result<Success<ToggleResponse>, Error> {
    storage
        .set_entry_archived(&claims.0.sub, &entry_id, form.is_archived)
        .await?;

    Ok(Success::ok(ToggleResponse { updated: true }))
}
