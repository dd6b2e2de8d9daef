//! Collections API endpoints

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::collections::Collection;
use crate::slug::slugify;
use crate::storage::CreateCollectionValues;
use crate::storage::Storage;

use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::current_user::BearerClaims;

/// Collection response going to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionResponse {
    pub fn from_collection(collection: Collection) -> Self {
        Self {
            id: collection.id,
            name: collection.name,
            slug: collection.slug,
            color: collection.color,
            last_used: collection.last_used,
            created_at: collection.created_at,
            updated_at: collection.updated_at,
        }
    }

    pub fn from_collection_multiple(collections: Vec<Collection>) -> Vec<Self> {
        collections.into_iter().map(Self::from_collection).collect()
    }
}

/// Create collection form
#[derive(Debug, Deserialize)]
pub struct CreateCollectionForm {
    name: String,
    color: String,
}

/// Create a collection
///
/// Collection names are unique across all users, a taken name is a 409
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    Form(form): Form<CreateCollectionForm>,
) -> Result<Success<CollectionResponse>, Error> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(Error::bad_request("Name can not be empty"));
    }

    if form.color.is_empty() {
        return Err(Error::bad_request("Color is required"));
    }

    let slug = slugify(name);
    let values = CreateCollectionValues {
        user_id: claims.0.sub,
        name,
        slug: &slug,
        color: &form.color,
    };

    let collection = storage.create_collection(&values).await?;

    Ok(Success::created(CollectionResponse::from_collection(
        collection,
    )))
}

/// List all collections of the caller
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
) -> Result<Success<Vec<CollectionResponse>>, Error> {
    let collections = storage.find_all_collections(&claims.0.sub).await?;

    Ok(Success::ok(CollectionResponse::from_collection_multiple(
        collections,
    )))
}

/// Delete a collection
///
/// Entries and chapters keep existing, they only lose the association
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(collection_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    storage
        .delete_collection(&claims.0.sub, &collection_id)
        .await?;

    Ok(Success::<&'static str>::no_content())
}
