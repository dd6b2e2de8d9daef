//! Chapters API endpoints
//!
//! Chapters group entries and carry their own collection associations, which
//! makes create/update/delete multi-table affairs — the storage layer runs
//! them all-or-nothing

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::entries::Entry;
use crate::slug::slugify;
use crate::storage::ChapterDetail;
use crate::storage::CreateChapterValues;
use crate::storage::Storage;
use crate::storage::UpdateChapterValues;

use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::collections::CollectionResponse;
use super::current_user::BearerClaims;
use super::entries::ToggleResponse;

/// A member entry, as carried by chapter payloads
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedEntry {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub is_archived: bool,
    pub is_favourite: bool,
}

impl NestedEntry {
    fn from_entry(entry: Entry) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            slug: entry.slug,
            is_archived: entry.is_archived,
            is_favourite: entry.is_favourite,
        }
    }
}

/// Chapter response going to the user, associations included
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub color: String,
    pub slug: String,
    pub is_archived: bool,
    pub is_favourite: bool,
    pub collections: Vec<CollectionResponse>,
    pub entries: Vec<NestedEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChapterResponse {
    fn from_detail(detail: ChapterDetail) -> Self {
        Self {
            id: detail.chapter.id,
            title: detail.chapter.title,
            description: detail.chapter.description,
            color: detail.chapter.color,
            slug: detail.chapter.slug,
            is_archived: detail.chapter.is_archived,
            is_favourite: detail.chapter.is_favourite,
            collections: CollectionResponse::from_collection_multiple(detail.collections),
            entries: detail.entries.into_iter().map(NestedEntry::from_entry).collect(),
            created_at: detail.chapter.created_at,
            updated_at: detail.chapter.updated_at,
        }
    }

    fn from_detail_multiple(details: Vec<ChapterDetail>) -> Vec<Self> {
        details.into_iter().map(Self::from_detail).collect()
    }
}

/// Create chapter form
///
/// `collection` attaches existing collections, `entries` moves existing
/// entries into the new chapter — all IDs must belong to the caller
#[derive(Debug, Deserialize)]
pub struct CreateChapterForm {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    color: String,
    #[serde(default, rename = "collection")]
    collections: Vec<Uuid>,
    #[serde(default)]
    entries: Vec<Uuid>,
}

/// Create a chapter with its associations
///
/// One bad collection or entry reference aborts the whole create
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    Form(form): Form<CreateChapterForm>,
) -> Result<Success<ChapterResponse>, Error> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(Error::bad_request("Title can not be empty"));
    }

    let slug = slugify(title);
    let values = CreateChapterValues {
        user_id: claims.0.sub,
        title,
        description: form.description.trim(),
        color: &form.color,
        slug: &slug,
        collection_ids: &form.collections,
        entry_ids: &form.entries,
    };

    let detail = storage.create_chapter(&values).await?;

    Ok(Success::created(ChapterResponse::from_detail(detail)))
}

/// List all chapters of the caller, associations included
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
) -> Result<Success<Vec<ChapterResponse>>, Error> {
    let details = storage.find_all_chapters(&claims.0.sub).await?;

    Ok(Success::ok(ChapterResponse::from_detail_multiple(details)))
}

/// Update chapter form
///
/// Absent fields are left untouched. A supplied `collection` list replaces
/// the association set, a supplied `entries` list replaces the membership:
/// current members are unfiled, the listed ones are filed under the chapter.
#[derive(Debug, Deserialize)]
pub struct UpdateChapterForm {
    title: Option<String>,
    description: Option<String>,
    color: Option<String>,
    #[serde(rename = "collection")]
    collections: Option<Vec<Uuid>>,
    entries: Option<Vec<Uuid>>,
}

/// Update a chapter
///
/// The whole update is one transaction: a bad reference anywhere leaves
/// every field and every association exactly as it was
///
/// Request:
/// ```sh
/// curl -v -XPUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Summer", "entries": ["<uuid>"] }' \
///     http://localhost:3000/chapters/update/<uuid>
/// ```
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(chapter_id): PathParameters<Uuid>,
    Form(form): Form<UpdateChapterForm>,
) -> Result<Success<ChapterResponse>, Error> {
    if let Some(title) = &form.title {
        if title.trim().is_empty() {
            return Err(Error::bad_request("Title can not be empty"));
        }
    }

    let values = UpdateChapterValues {
        title: form.title.as_deref(),
        description: form.description.as_deref(),
        color: form.color.as_deref(),
        collection_ids: form.collections.as_deref(),
        entry_ids: form.entries.as_deref(),
    };

    let detail = storage
        .update_chapter(&claims.0.sub, &chapter_id, &values)
        .await?;

    Ok(Success::ok(ChapterResponse::from_detail(detail)))
}

/// Delete a chapter
///
/// Member entries survive unfiled, attached collections survive detached
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(chapter_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    storage.delete_chapter(&claims.0.sub, &chapter_id).await?;

    Ok(Success::<&'static str>::no_content())
}

/// Favourite toggle form
#[derive(Debug, Deserialize)]
pub struct FavouriteForm {
    is_favourite: bool,
}

/// Mark or unmark a chapter as favourite
pub async fn mark_favourite<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(chapter_id): PathParameters<Uuid>,
    Form(form): Form<FavouriteForm>,
) -> Result<Success<ToggleResponse>, Error> {
    storage
        .set_chapter_favourite(&claims.0.sub, &chapter_id, form.is_favourite)
        .await?;

    Ok(Success::ok(ToggleResponse { updated: true }))
}

/// Archive toggle form
#[derive(Debug, Deserialize)]
pub struct ArchiveForm {
    is_archived: bool,
}

/// Move a chapter in or out of the archive
pub async fn archive<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(chapter_id): PathParameters<Uuid>,
    Form(form): Form<ArchiveForm>,
) -> Result<Success<ToggleResponse>, Error> {
    storage
        .set_chapter_archived(&claims.0.sub, &chapter_id, form.is_archived)
        .await?;

    Ok(Success::ok(ToggleResponse { updated: true }))
}
