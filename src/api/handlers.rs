// Photo portfolio request handlers
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

use crate::api::auth::{check_password, require_admin};
use crate::api::upload::parse_upload;
use crate::app_state::{extract_app_state, AppState};
use crate::error::Result;
use crate::metadata::config::KvBackend;
use crate::metadata::redis_store::redact_url;
use crate::storage::validate_key;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub password: String,
}

/// GET /photos
pub async fn list_photos(app_state: web::Data<AppState>) -> HttpResponse {
    let photos = extract_app_state(&app_state).repository.list().await;
    debug!("Listing {} photos", photos.len());
    HttpResponse::Ok().json(photos)
}

/// GET /photos/{id}
pub async fn get_photo(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let photo = app_state.repository.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(photo))
}

/// POST /photos (multipart: title, description, photo)
pub async fn upload_photo(
    req: HttpRequest,
    payload: Multipart,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let state = extract_app_state(&app_state);
    require_admin(&req, &state.config.auth.admin_password)?;

    let new_photo = parse_upload(payload, state.config.upload.max_file_size).await?;
    let photo = state.repository.put(new_photo).await?;
    info!("Uploaded photo {} ({})", photo.id, photo.title);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Photo uploaded successfully",
        "photo": photo,
    })))
}

/// DELETE /photos/{id}
pub async fn delete_photo(
    req: HttpRequest,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let state = extract_app_state(&app_state);
    require_admin(&req, &state.config.auth.admin_password)?;

    let id = path.into_inner();
    state.repository.delete(&id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Photo deleted successfully",
    })))
}

/// POST /auth
pub async fn login(body: web::Json<AuthRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    check_password(&body.password, &app_state.config.auth.admin_password)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
    })))
}

/// GET /health
pub async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    let stats = app_state.repository.stats().await;
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Photo portfolio API is running",
        "timestamp": Utc::now().to_rfc3339(),
        "variant": stats.variant,
        "state": stats.state,
        "photosCount": stats.photos_count,
    }))
}

fn truncated(value: &str, keep: usize) -> String {
    if value.chars().count() <= keep {
        value.to_string()
    } else {
        format!("{}...", value.chars().take(keep).collect::<String>())
    }
}

/// GET /debug: configuration summary without secrets
pub async fn debug_config(app_state: web::Data<AppState>) -> HttpResponse {
    let config = &app_state.config;
    let redis_url = match config.metadata.backend {
        KvBackend::Redis => truncated(&redact_url(&config.metadata.redis_url), 30),
        _ => "not-set".to_string(),
    };
    HttpResponse::Ok().json(json!({
        "success": true,
        "config": {
            "storageBackend": config.storage.backend,
            "storageDirectory": config.storage.base_path,
            "publicBaseUrl": config.storage.public_base_url,
            "metadataBackend": config.metadata.backend,
            "metadataVariant": config.metadata.variant,
            "redisUrl": redis_url,
            "hasAdminPassword": !config.auth.admin_password.is_empty(),
            "maxFileSize": config.upload.max_file_size,
            "state": app_state.repository.state(),
            "timestamp": Utc::now().to_rfc3339(),
        },
    }))
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// GET /uploads/{key}: raw bytes of a stored object
pub async fn serve_upload(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = path.into_inner();
    validate_key(&key)?;
    let data = app_state.repository.object_store().get(&key).await?;
    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&key))
        .insert_header(("Cache-Control", "public, max-age=31536000, immutable"))
        .body(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated() {
        assert_eq!(truncated("redis://cache.example:6379", 30), "redis://cache.example:6379");
        assert_eq!(truncated("redis://a-very-long-host-name.example.com:6379", 10), "redis://a-...");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("photos/a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("photos/a.PNG"), "image/png");
        assert_eq!(content_type_for("photos/a"), "application/octet-stream");
    }
}
