//! All API endpoint setup

use axum::Router;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;

pub use current_user::JwtKeys;
pub use current_user::issue_token;
pub use request::Form;
pub use request::PathParameters;
pub use response::Error;
pub use response::Success;

use crate::storage::Storage;

mod auth;
mod chapters;
mod collections;
mod current_user;
mod entries;
mod moods;
mod request;
mod response;

/// Get the Axum router for all API routes
///
/// The route layout mirrors what the frontend calls, auth at the root and
/// the diary groups under their plural names
pub fn router<S: Storage>() -> Router {
    let auth = Router::new()
        .route("/validate", get(auth::validate::<S>))
        .route("/logout", post(auth::logout))
        .route("/jwt/create", post(auth::login::<S>))
        .route("/isActivated", get(auth::is_activated::<S>));

    let entries = Router::new()
        .route("/create-new", post(entries::create::<S>))
        .route("/all", get(entries::list::<S>))
        .route("/details/{id}", get(entries::detail::<S>))
        .route("/delete/{id}", delete(entries::delete::<S>))
        .route("/mark-favourite/{id}", post(entries::mark_favourite::<S>))
        .route("/archive/{id}", post(entries::archive::<S>));

    let collections = Router::new()
        .route("/create-new", post(collections::create::<S>))
        .route("/all", get(collections::list::<S>))
        .route("/delete/{id}", delete(collections::delete::<S>));

    let moods = Router::new()
        .route("/create-new", post(moods::create::<S>))
        .route("/all", get(moods::list::<S>))
        .route("/delete/{id}", delete(moods::delete::<S>));

    let chapters = Router::new()
        .route("/create-new", post(chapters::create::<S>))
        .route("/all", get(chapters::list::<S>))
        .route("/update/{id}", put(chapters::update::<S>))
        .route("/delete/{id}", delete(chapters::delete::<S>))
        .route("/mark-favourite/{id}", post(chapters::mark_favourite::<S>))
        .route("/archive/{id}", post(chapters::archive::<S>));

    Router::new()
        .route("/signup", post(auth::signup::<S>))
        .route("/verify-otp", post(auth::verify_otp::<S>))
        .route("/login", post(auth::login::<S>))
        .nest("/auth", auth)
        .nest("/entries", entries)
        .nest("/collections", collections)
        .nest("/moods", moods)
        .nest("/chapters", chapters)
}
