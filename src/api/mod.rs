//! HTTP surface of the photo portfolio.
//!
//! The same routes are mounted at the root and under `/api` so that both the
//! gallery pages and older clients keep working.

pub mod auth;
pub mod handlers;
pub mod upload;

use actix_web::web;

use crate::api::handlers::{
    debug_config, delete_photo, get_photo, health, list_photos, login, serve_upload, upload_photo,
};

/// Register every photo route on `cfg`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/photos", web::get().to(list_photos))
        .route("/photos", web::post().to(upload_photo))
        .route("/photos/{id}", web::get().to(get_photo))
        .route("/photos/{id}", web::delete().to(delete_photo))
        .route("/auth", web::post().to(login))
        .route("/health", web::get().to(health))
        .route("/debug", web::get().to(debug_config))
        .route("/uploads/{key:.*}", web::get().to(serve_upload));
}

/// Mount the routes under `/api` and at the root
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(configure)).configure(configure);
}
