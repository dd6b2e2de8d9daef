//! Cross-user isolation
//!
//! Records of one user must behave like missing records for everybody else,
//! on every access path

use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;
use crate::tests::helper::TestApp;

/// Two users, each with one of everything owned by the first
struct TwoUsers {
    app: TestApp,
    ann: String,
    ben: String,
    entry_id: uuid::Uuid,
    chapter_id: uuid::Uuid,
    collection_id: uuid::Uuid,
    mood_id: uuid::Uuid,
}

async fn setup_two_users() -> TwoUsers {
    let app = helper::setup_test_app();
    let ann = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;
    let ben = helper::register_and_login(&app, "Ben", "ben@x.com", "longpass1").await;

    let (_, entry) =
        helper::create_entry(&app, &ann, json!({ "title": "Anns", "content": "C" })).await;
    let (_, chapter) = helper::create_chapter(&app, &ann, json!({ "title": "Summer" })).await;
    let (_, collection) = helper::create_collection(&app, &ann, "Travel").await;
    let (_, mood) = helper::create_mood(&app, &ann, "Happy").await;

    TwoUsers {
        entry_id: helper::data_id(&entry),
        chapter_id: helper::data_id(&chapter),
        collection_id: helper::data_id(&collection),
        mood_id: helper::data_id(&mood),
        app,
        ann,
        ben,
    }
}

#[tokio::test]
async fn test_entry_access_is_owner_scoped() {
    let t = setup_two_users().await;

    let (status_code, _) = helper::entry_detail(&t.app, &t.ben, &t.entry_id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::DELETE,
        &format!("/entries/delete/{}", t.entry_id),
        Some(&t.ben),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::POST,
        &format!("/entries/mark-favourite/{}", t.entry_id),
        Some(&t.ben),
        Some(json!({ "is_favourite": true })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::POST,
        &format!("/entries/archive/{}", t.entry_id),
        Some(&t.ben),
        Some(json!({ "is_archived": true })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    // and the entry is untouched for its owner
    let (status_code, body) = helper::entry_detail(&t.app, &t.ann, &t.entry_id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(body["data"]["isFavourite"], false);
    assert_eq!(body["data"]["isArchived"], false);
}

#[tokio::test]
async fn test_chapter_access_is_owner_scoped() {
    let t = setup_two_users().await;

    let (status_code, _) = helper::send(
        &t.app,
        Method::PUT,
        &format!("/chapters/update/{}", t.chapter_id),
        Some(&t.ben),
        Some(json!({ "title": "Mine now" })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::DELETE,
        &format!("/chapters/delete/{}", t.chapter_id),
        Some(&t.ben),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::POST,
        &format!("/chapters/mark-favourite/{}", t.chapter_id),
        Some(&t.ben),
        Some(json!({ "is_favourite": true })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (_, body) = helper::list_chapters(&t.app, &t.ann).await;
    assert_eq!(body["data"][0]["title"], "Summer");
}

#[tokio::test]
async fn test_collection_and_mood_access_is_owner_scoped() {
    let t = setup_two_users().await;

    let (status_code, _) = helper::send(
        &t.app,
        Method::DELETE,
        &format!("/collections/delete/{}", t.collection_id),
        Some(&t.ben),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, _) = helper::send(
        &t.app,
        Method::DELETE,
        &format!("/moods/delete/{}", t.mood_id),
        Some(&t.ben),
        None,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_lists_only_carry_own_records() {
    let t = setup_two_users().await;

    for uri in ["/entries/all", "/collections/all", "/moods/all", "/chapters/all"] {
        let (status_code, body) = helper::send(&t.app, Method::GET, uri, Some(&t.ben), None).await;
        assert_eq!(StatusCode::OK, status_code);
        assert_eq!(body["data"].as_array().unwrap().len(), 0, "{uri}");
    }
}

/// Attaching somebody else's records to your own is a rejected reference,
/// not a quiet success
#[tokio::test]
async fn test_cross_user_references_are_rejected() {
    let t = setup_two_users().await;

    let (status_code, _) = helper::create_entry(
        &t.app,
        &t.ben,
        json!({ "title": "T", "content": "C", "collection": [t.collection_id] }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    let (status_code, _) = helper::create_entry(
        &t.app,
        &t.ben,
        json!({ "title": "T", "content": "C", "mood": t.mood_id }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    let (status_code, _) = helper::create_entry(
        &t.app,
        &t.ben,
        json!({ "title": "T", "content": "C", "chapter": t.chapter_id }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    let (status_code, _) = helper::create_chapter(
        &t.app,
        &t.ben,
        json!({ "title": "Ch", "collection": [t.collection_id] }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
}
