use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::tests::helper;

#[tokio::test]
async fn test_chapter_create_with_collections_and_entries() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, collection) = helper::create_collection(&app, &token, "Travel").await;
    let (_, entry) =
        helper::create_entry(&app, &token, json!({ "title": "Unfiled", "content": "C" })).await;
    let entry_id = helper::data_id(&entry);

    let (status_code, body) = helper::create_chapter(
        &app,
        &token,
        json!({
            "title": "Summer 2025",
            "description": "  The warm months  ",
            "color": "#ff8800",
            "collection": [helper::data_id(&collection)],
            "entries": [entry_id],
        }),
    )
    .await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert_eq!(body["data"]["slug"], "summer-2025");
    assert_eq!(body["data"]["collections"][0]["name"], "Travel");
    assert_eq!(body["data"]["entries"][0]["title"], "Unfiled");

    // the entry was re-parented into the new chapter
    let (_, body_detail) = helper::entry_detail(&app, &token, &entry_id).await;
    assert_eq!(body_detail["data"]["chapter"]["title"], "Summer 2025");
}

#[tokio::test]
async fn test_chapter_create_with_foreign_entry_aborts() {
    let app = helper::setup_test_app();
    let ann = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;
    let ben = helper::register_and_login(&app, "Ben", "ben@x.com", "longpass1").await;

    let (_, ben_entry) =
        helper::create_entry(&app, &ben, json!({ "title": "Bens", "content": "C" })).await;

    let (status_code, _) = helper::create_chapter(
        &app,
        &ann,
        json!({ "title": "Stolen", "entries": [helper::data_id(&ben_entry)] }),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    // nothing was created
    let (_, body) = helper::list_chapters(&app, &ann).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

/// Only the supplied fields change, the slug stays put
#[tokio::test]
async fn test_chapter_update_partial_fields() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, chapter) = helper::create_chapter(
        &app,
        &token,
        json!({ "title": "Summer", "description": "Warm", "color": "#ff8800" }),
    )
    .await;
    let chapter_id = helper::data_id(&chapter);

    let (status_code, body) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{chapter_id}"),
        Some(&token),
        Some(json!({ "title": "Winter" })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(body["data"]["title"], "Winter");
    assert_eq!(body["data"]["description"], "Warm");
    assert_eq!(body["data"]["color"], "#ff8800");
    assert_eq!(body["data"]["slug"], "summer");
}

/// A supplied collection list replaces the set, it does not merge
#[tokio::test]
async fn test_chapter_update_replaces_collections() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, c1) = helper::create_collection(&app, &token, "Travel").await;
    let (_, c2) = helper::create_collection(&app, &token, "Food").await;

    let (_, chapter) = helper::create_chapter(
        &app,
        &token,
        json!({ "title": "Summer", "collection": [helper::data_id(&c1)] }),
    )
    .await;
    let chapter_id = helper::data_id(&chapter);

    let (status_code, body) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{chapter_id}"),
        Some(&token),
        Some(json!({ "collection": [helper::data_id(&c2)] })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(
        helper::collection_names(&body["data"]["collections"]),
        vec!["Food".to_string()]
    );

    // an empty list clears the set
    let (status_code, body) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{chapter_id}"),
        Some(&token),
        Some(json!({ "collection": [] })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(body["data"]["collections"].as_array().unwrap().len(), 0);
}

/// A supplied entry list detaches the current members and attaches exactly
/// the new set
#[tokio::test]
async fn test_chapter_update_replaces_entries() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, e1) = helper::create_entry(&app, &token, json!({ "title": "One", "content": "C" })).await;
    let (_, e2) = helper::create_entry(&app, &token, json!({ "title": "Two", "content": "C" })).await;
    let e1_id = helper::data_id(&e1);
    let e2_id = helper::data_id(&e2);

    let (_, chapter) = helper::create_chapter(
        &app,
        &token,
        json!({ "title": "Summer", "entries": [e1_id] }),
    )
    .await;
    let chapter_id = helper::data_id(&chapter);

    let (status_code, body) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{chapter_id}"),
        Some(&token),
        Some(json!({ "entries": [e2_id] })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);

    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["title"], "Two");

    // the former member is unfiled, not deleted
    let (status_code, body) = helper::entry_detail(&app, &token, &e1_id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(body["data"]["chapter"].is_null());
}

/// A foreign entry in the list aborts the whole update, fields and
/// memberships included
#[tokio::test]
async fn test_chapter_update_with_foreign_entry_aborts() {
    let app = helper::setup_test_app();
    let ann = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;
    let ben = helper::register_and_login(&app, "Ben", "ben@x.com", "longpass1").await;

    let (_, c1) = helper::create_collection(&app, &ann, "Travel").await;
    let (_, ann_entry) =
        helper::create_entry(&app, &ann, json!({ "title": "Anns", "content": "C" })).await;
    let ann_entry_id = helper::data_id(&ann_entry);

    let (_, chapter) = helper::create_chapter(
        &app,
        &ann,
        json!({
            "title": "Summer",
            "collection": [helper::data_id(&c1)],
            "entries": [ann_entry_id],
        }),
    )
    .await;
    let chapter_id = helper::data_id(&chapter);

    let (_, ben_entry) =
        helper::create_entry(&app, &ben, json!({ "title": "Bens", "content": "C" })).await;

    let (status_code, _) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{chapter_id}"),
        Some(&ann),
        Some(json!({
            "title": "Taken over",
            "collection": [],
            "entries": [helper::data_id(&ben_entry)],
        })),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    // the chapter is untouched: title, collections and membership
    let (_, body) = helper::list_chapters(&app, &ann).await;
    let chapters = body["data"].as_array().unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0]["title"], "Summer");
    assert_eq!(chapters[0]["collections"].as_array().unwrap().len(), 1);
    assert_eq!(chapters[0]["entries"].as_array().unwrap().len(), 1);

    let (_, body) = helper::entry_detail(&app, &ann, &ann_entry_id).await;
    assert_eq!(body["data"]["chapter"]["title"], "Summer");
}

/// Deleting a chapter never deletes its entries, they survive unfiled
#[tokio::test]
async fn test_chapter_delete_preserves_entries_and_collections() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, collection) = helper::create_collection(&app, &token, "Travel").await;
    let (_, entry) =
        helper::create_entry(&app, &token, json!({ "title": "One", "content": "C" })).await;
    let entry_id = helper::data_id(&entry);

    let (_, chapter) = helper::create_chapter(
        &app,
        &token,
        json!({
            "title": "Summer",
            "collection": [helper::data_id(&collection)],
            "entries": [entry_id],
        }),
    )
    .await;
    let chapter_id = helper::data_id(&chapter);

    let (status_code, _) = helper::send(
        &app,
        Method::DELETE,
        &format!("/chapters/delete/{chapter_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);

    let (_, body) = helper::list_chapters(&app, &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // the entry exists with no chapter
    let (status_code, body) = helper::entry_detail(&app, &token, &entry_id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert!(body["data"]["chapter"].is_null());

    // the collection survives too
    let (_, body) = helper::send(&app, Method::GET, "/collections/all", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chapter_toggles() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (_, chapter) = helper::create_chapter(&app, &token, json!({ "title": "Summer" })).await;
    let chapter_id = helper::data_id(&chapter);

    let (status_code, body) = helper::send(
        &app,
        Method::POST,
        &format!("/chapters/mark-favourite/{chapter_id}"),
        Some(&token),
        Some(json!({ "is_favourite": true })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(body["data"]["updated"], true);

    let (status_code, _) = helper::send(
        &app,
        Method::POST,
        &format!("/chapters/archive/{chapter_id}"),
        Some(&token),
        Some(json!({ "is_archived": true })),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);

    let (_, body) = helper::list_chapters(&app, &token).await;
    assert_eq!(body["data"][0]["isFavourite"], true);
    assert_eq!(body["data"][0]["isArchived"], true);

    let (status_code, _) = helper::send(
        &app,
        Method::POST,
        &format!("/chapters/mark-favourite/{}", Uuid::new_v4()),
        Some(&token),
        Some(json!({ "is_favourite": true })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_chapter_update_unknown_id() {
    let app = helper::setup_test_app();
    let token = helper::register_and_login(&app, "Ann", "ann@x.com", "longpass1").await;

    let (status_code, _) = helper::send(
        &app,
        Method::PUT,
        &format!("/chapters/update/{}", Uuid::new_v4()),
        Some(&token),
        Some(json!({ "title": "Nope" })),
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}
