//! Moods API endpoints

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::moods::Mood;
use crate::storage::CreateMoodValues;
use crate::storage::Storage;

use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::current_user::BearerClaims;

/// Mood response going to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodResponse {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MoodResponse {
    pub fn from_mood(mood: Mood) -> Self {
        Self {
            id: mood.id,
            name: mood.name,
            color: mood.color,
            emoji: mood.emoji,
            created_at: mood.created_at,
            updated_at: mood.updated_at,
        }
    }

    fn from_mood_multiple(moods: Vec<Mood>) -> Vec<Self> {
        moods.into_iter().map(Self::from_mood).collect()
    }
}

/// Create mood form
#[derive(Debug, Deserialize)]
pub struct CreateMoodForm {
    name: String,
    color: String,
    emoji: String,
}

/// Create a mood
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    Form(form): Form<CreateMoodForm>,
) -> Result<Success<MoodResponse>, Error> {
    if form.name.trim().is_empty() {
        return Err(Error::bad_request("Name can not be empty"));
    }

    if form.color.is_empty() || form.emoji.is_empty() {
        return Err(Error::bad_request("Color and emoji are required"));
    }

    let values = CreateMoodValues {
        user_id: claims.0.sub,
        name: form.name.trim(),
        color: &form.color,
        emoji: &form.emoji,
    };

    let mood = storage.create_mood(&values).await?;

    Ok(Success::created(MoodResponse::from_mood(mood)))
}

/// List all moods of the caller
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
) -> Result<Success<Vec<MoodResponse>>, Error> {
    let moods = storage.find_all_moods(&claims.0.sub).await?;

    Ok(Success::ok(MoodResponse::from_mood_multiple(moods)))
}

/// Delete a mood
///
/// Entries referencing the mood keep existing without it
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    claims: BearerClaims,
    PathParameters(mood_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    storage.delete_mood(&claims.0.sub, &mood_id).await?;

    Ok(Success::<&'static str>::no_content())
}
