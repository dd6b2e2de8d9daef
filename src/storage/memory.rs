//! Memory storage
//!
//! Will be destroyed on system shutdown. One mutex guards the whole state,
//! which is what makes the multi-table operations atomic: ownership checks
//! run before the first mutation, and nothing else can interleave.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;
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

/// All records of the in-memory backend
#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    moods: HashMap<Uuid, Mood>,
    collections: HashMap<Uuid, Collection>,
    chapters: HashMap<Uuid, Chapter>,
    entries: HashMap<Uuid, Entry>,

    /// `(entry id, collection id)` association rows
    entry_collections: HashSet<(Uuid, Uuid)>,

    /// `(chapter id, collection id)` association rows
    chapter_collections: HashSet<(Uuid, Uuid)>,
}

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    state: Arc<Mutex<State>>,
}

impl Memory {
    /// Create a new empty Memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Every referenced collection must exist under the given owner
fn assert_owned_collections(state: &State, user_id: Uuid, ids: &[Uuid]) -> Result<()> {
    for id in ids {
        let owned = state
            .collections
            .get(id)
            .is_some_and(|collection| collection.user_id == user_id);

        if !owned {
            return Err(Error::ForeignReference("collection"));
        }
    }

    Ok(())
}

/// Every referenced entry must exist under the given owner
fn assert_owned_entries(state: &State, user_id: Uuid, ids: &[Uuid]) -> Result<()> {
    for id in ids {
        let owned = state
            .entries
            .get(id)
            .is_some_and(|entry| entry.user_id == user_id);

        if !owned {
            return Err(Error::ForeignReference("entry"));
        }
    }

    Ok(())
}

/// Assemble an entry with its associations
fn entry_detail(state: &State, entry: Entry) -> EntryDetail {
    let mut collections = state
        .entry_collections
        .iter()
        .filter(|(entry_id, _)| *entry_id == entry.id)
        .filter_map(|(_, collection_id)| state.collections.get(collection_id).cloned())
        .collect::<Vec<Collection>>();
    collections.sort_by_key(|collection| collection.created_at);

    let mood = entry.mood_id.and_then(|id| state.moods.get(&id).cloned());
    let chapter = entry.chapter_id.and_then(|id| state.chapters.get(&id).cloned());

    EntryDetail {
        entry,
        collections,
        mood,
        chapter,
    }
}

/// Assemble a chapter with its associations
fn chapter_detail(state: &State, chapter: Chapter) -> ChapterDetail {
    let mut collections = state
        .chapter_collections
        .iter()
        .filter(|(chapter_id, _)| *chapter_id == chapter.id)
        .filter_map(|(_, collection_id)| state.collections.get(collection_id).cloned())
        .collect::<Vec<Collection>>();
    collections.sort_by_key(|collection| collection.created_at);

    let mut entries = state
        .entries
        .values()
        .filter(|entry| entry.chapter_id == Some(chapter.id))
        .cloned()
        .collect::<Vec<Entry>>();
    entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at));

    ChapterDetail {
        chapter,
        collections,
        entries,
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(id).cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|user| user.email == values.email) {
            return Err(Error::Duplicate("email"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: values.email.to_string(),
            name: values.name.to_string(),
            hashed_password: values.hashed_password.to_string(),
            is_verified: false,
            is_staff: false,
            is_superuser: false,
            otp_code: Some(values.otp_code.to_string()),
            otp_expires_at: Some(values.otp_expires_at),
            created_at: now,
            updated_at: now,
        };

        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn set_otp(
        &self,
        user_id: &Uuid,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let user = state.users.get_mut(user_id).ok_or(Error::NotFound("user"))?;

        user.otp_code = Some(otp_code.to_string());
        user.otp_expires_at = Some(otp_expires_at);
        user.updated_at = Utc::now();

        Ok(())
    }

    async fn mark_verified(&self, user_id: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        let user = state.users.get_mut(user_id).ok_or(Error::NotFound("user"))?;

        user.is_verified = true;
        user.otp_code = None;
        user.otp_expires_at = None;
        user.updated_at = Utc::now();

        Ok(())
    }

    async fn create_mood(&self, values: &CreateMoodValues) -> Result<Mood> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        let mood = Mood {
            id: Uuid::new_v4(),
            user_id: values.user_id,
            name: values.name.to_string(),
            color: values.color.to_string(),
            emoji: values.emoji.to_string(),
            created_at: now,
            updated_at: now,
        };

        state.moods.insert(mood.id, mood.clone());

        Ok(mood)
    }

    async fn find_all_moods(&self, user_id: &Uuid) -> Result<Vec<Mood>> {
        let state = self.state.lock().await;

        let mut moods = state
            .moods
            .values()
            .filter(|mood| mood.user_id == *user_id)
            .cloned()
            .collect::<Vec<Mood>>();
        moods.sort_by_key(|mood| std::cmp::Reverse(mood.created_at));

        Ok(moods)
    }

    async fn delete_mood(&self, user_id: &Uuid, mood_id: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        let owned = state
            .moods
            .get(mood_id)
            .is_some_and(|mood| mood.user_id == *user_id);

        if !owned {
            return Err(Error::NotFound("mood"));
        }

        state.moods.remove(mood_id);

        // entries keep existing, they just lose the mood reference
        for entry in state.entries.values_mut() {
            if entry.mood_id == Some(*mood_id) {
                entry.mood_id = None;
            }
        }

        Ok(())
    }

    async fn create_collection(&self, values: &CreateCollectionValues) -> Result<Collection> {
        let mut state = self.state.lock().await;

        // the name is unique table-wide, not per user
        if state
            .collections
            .values()
            .any(|collection| collection.name == values.name)
        {
            return Err(Error::Duplicate("collection name"));
        }

        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4(),
            user_id: values.user_id,
            name: values.name.to_string(),
            slug: values.slug.to_string(),
            color: values.color.to_string(),
            last_used: now,
            created_at: now,
            updated_at: now,
        };

        state.collections.insert(collection.id, collection.clone());

        Ok(collection)
    }

    async fn find_all_collections(&self, user_id: &Uuid) -> Result<Vec<Collection>> {
        let state = self.state.lock().await;

        let mut collections = state
            .collections
            .values()
            .filter(|collection| collection.user_id == *user_id)
            .cloned()
            .collect::<Vec<Collection>>();
        collections.sort_by_key(|collection| std::cmp::Reverse(collection.created_at));

        Ok(collections)
    }

    async fn delete_collection(&self, user_id: &Uuid, collection_id: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        let owned = state
            .collections
            .get(collection_id)
            .is_some_and(|collection| collection.user_id == *user_id);

        if !owned {
            return Err(Error::NotFound("collection"));
        }

        state
            .entry_collections
            .retain(|(_, linked)| linked != collection_id);
        state
            .chapter_collections
            .retain(|(_, linked)| linked != collection_id);
        state.collections.remove(collection_id);

        Ok(())
    }

    async fn create_entry(&self, values: &CreateEntryValues) -> Result<EntryDetail> {
        let mut state = self.state.lock().await;

        // all ownership checks happen before the first mutation
        if let Some(chapter_id) = values.chapter_id {
            let owned = state
                .chapters
                .get(&chapter_id)
                .is_some_and(|chapter| chapter.user_id == values.user_id);

            if !owned {
                return Err(Error::ForeignReference("chapter"));
            }
        }

        if let Some(mood_id) = values.mood_id {
            let owned = state
                .moods
                .get(&mood_id)
                .is_some_and(|mood| mood.user_id == values.user_id);

            if !owned {
                return Err(Error::ForeignReference("mood"));
            }
        }

        assert_owned_collections(&state, values.user_id, values.collection_ids)?;

        let now = Utc::now();
        let entry = Entry {
            id: Uuid::new_v4(),
            user_id: values.user_id,
            title: values.title.to_string(),
            content: values.content.to_string(),
            slug: values.slug.to_string(),
            is_archived: false,
            is_favourite: false,
            mood_id: values.mood_id,
            chapter_id: values.chapter_id,
            created_at: now,
            updated_at: now,
        };

        state.entries.insert(entry.id, entry.clone());

        for collection_id in values.collection_ids {
            state.entry_collections.insert((entry.id, *collection_id));
        }

        Ok(entry_detail(&state, entry))
    }

    async fn find_all_entries(&self, user_id: &Uuid) -> Result<Vec<EntryDetail>> {
        let state = self.state.lock().await;

        let mut entries = state
            .entries
            .values()
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .collect::<Vec<Entry>>();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at));

        Ok(entries
            .into_iter()
            .map(|entry| entry_detail(&state, entry))
            .collect())
    }

    async fn find_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<Option<EntryDetail>> {
        let state = self.state.lock().await;

        Ok(state
            .entries
            .get(entry_id)
            .filter(|entry| entry.user_id == *user_id)
            .cloned()
            .map(|entry| entry_detail(&state, entry)))
    }

    async fn delete_entry(&self, user_id: &Uuid, entry_id: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        let owned = state
            .entries
            .get(entry_id)
            .is_some_and(|entry| entry.user_id == *user_id);

        if !owned {
            return Err(Error::NotFound("entry"));
        }

        state.entry_collections.retain(|(linked, _)| linked != entry_id);
        state.entries.remove(entry_id);

        Ok(())
    }

    async fn set_entry_favourite(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .entries
            .get_mut(entry_id)
            .filter(|entry| entry.user_id == *user_id)
            .ok_or(Error::NotFound("entry"))?;

        entry.is_favourite = is_favourite;
        entry.updated_at = Utc::now();

        Ok(())
    }

    async fn set_entry_archived(
        &self,
        user_id: &Uuid,
        entry_id: &Uuid,
        is_archived: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .entries
            .get_mut(entry_id)
            .filter(|entry| entry.user_id == *user_id)
            .ok_or(Error::NotFound("entry"))?;

        entry.is_archived = is_archived;
        entry.updated_at = Utc::now();

        Ok(())
    }

    async fn create_chapter(&self, values: &CreateChapterValues) -> Result<ChapterDetail> {
        let mut state = self.state.lock().await;

        assert_owned_collections(&state, values.user_id, values.collection_ids)?;
        assert_owned_entries(&state, values.user_id, values.entry_ids)?;

        let now = Utc::now();
        let chapter = Chapter {
            id: Uuid::new_v4(),
            user_id: values.user_id,
            title: values.title.to_string(),
            description: values.description.to_string(),
            color: values.color.to_string(),
            slug: values.slug.to_string(),
            is_archived: false,
            is_favourite: false,
            created_at: now,
            updated_at: now,
        };

        state.chapters.insert(chapter.id, chapter.clone());

        for collection_id in values.collection_ids {
            state.chapter_collections.insert((chapter.id, *collection_id));
        }

        for entry_id in values.entry_ids {
            if let Some(entry) = state.entries.get_mut(entry_id) {
                entry.chapter_id = Some(chapter.id);
            }
        }

        Ok(chapter_detail(&state, chapter))
    }

    async fn find_all_chapters(&self, user_id: &Uuid) -> Result<Vec<ChapterDetail>> {
        let state = self.state.lock().await;

        let mut chapters = state
            .chapters
            .values()
            .filter(|chapter| chapter.user_id == *user_id)
            .cloned()
            .collect::<Vec<Chapter>>();
        chapters.sort_by_key(|chapter| std::cmp::Reverse(chapter.created_at));

        Ok(chapters
            .into_iter()
            .map(|chapter| chapter_detail(&state, chapter))
            .collect())
    }

    async fn update_chapter(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        values: &UpdateChapterValues,
    ) -> Result<ChapterDetail> {
        let mut state = self.state.lock().await;

        let owned = state
            .chapters
            .get(chapter_id)
            .is_some_and(|chapter| chapter.user_id == *user_id);

        if !owned {
            return Err(Error::NotFound("chapter"));
        }

        // validate both replacement sets before touching anything, a failure
        // here must leave fields and memberships exactly as they were
        if let Some(collection_ids) = values.collection_ids {
            assert_owned_collections(&state, *user_id, collection_ids)?;
        }

        if let Some(entry_ids) = values.entry_ids {
            assert_owned_entries(&state, *user_id, entry_ids)?;
        }

        let chapter = state
            .chapters
            .get_mut(chapter_id)
            .expect("Ownership was checked above");

        if let Some(title) = values.title {
            chapter.title = title.trim().to_string();
        }

        if let Some(description) = values.description {
            chapter.description = description.trim().to_string();
        }

        if let Some(color) = values.color {
            chapter.color = color.to_string();
        }

        chapter.updated_at = Utc::now();
        let chapter = chapter.clone();

        if let Some(collection_ids) = values.collection_ids {
            state
                .chapter_collections
                .retain(|(linked, _)| linked != chapter_id);

            for collection_id in collection_ids {
                state.chapter_collections.insert((*chapter_id, *collection_id));
            }
        }

        if let Some(entry_ids) = values.entry_ids {
            // detach every current member, then attach exactly the new set
            for entry in state.entries.values_mut() {
                if entry.chapter_id == Some(*chapter_id) {
                    entry.chapter_id = None;
                }
            }

            for entry_id in entry_ids {
                if let Some(entry) = state.entries.get_mut(entry_id) {
                    entry.chapter_id = Some(*chapter_id);
                }
            }
        }

        Ok(chapter_detail(&state, chapter))
    }

    async fn delete_chapter(&self, user_id: &Uuid, chapter_id: &Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        let owned = state
            .chapters
            .get(chapter_id)
            .is_some_and(|chapter| chapter.user_id == *user_id);

        if !owned {
            return Err(Error::NotFound("chapter"));
        }

        state
            .chapter_collections
            .retain(|(linked, _)| linked != chapter_id);

        // member entries survive, unfiled
        for entry in state.entries.values_mut() {
            if entry.chapter_id == Some(*chapter_id) {
                entry.chapter_id = None;
            }
        }

        state.chapters.remove(chapter_id);

        Ok(())
    }

    async fn set_chapter_favourite(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_favourite: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let chapter = state
            .chapters
            .get_mut(chapter_id)
            .filter(|chapter| chapter.user_id == *user_id)
            .ok_or(Error::NotFound("chapter"))?;

        chapter.is_favourite = is_favourite;
        chapter.updated_at = Utc::now();

        Ok(())
    }

    async fn set_chapter_archived(
        &self,
        user_id: &Uuid,
        chapter_id: &Uuid,
        is_archived: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let chapter = state
            .chapters
            .get_mut(chapter_id)
            .filter(|chapter| chapter.user_id == *user_id)
            .ok_or(Error::NotFound("chapter"))?;

        chapter.is_archived = is_archived;
        chapter.updated_at = Utc::now();

        Ok(())
    }
}
