//! # rr-api Handlers
//!
//! These modules coordinate the flow between HTTP requests and Core traits.

pub mod incidents;
pub mod stats;
pub mod users;

use crate::error::ApiError;
use crate::payload::UploadedFile;
use crate::state::AppState;
use actix_web::{HttpResponse, Responder};
use rr_core::access::can_access;
use rr_core::models::{Incident, User};
use serde_json::json;

pub const PHOTO_FOLDER: &str = "incidents/photos";
pub const VOICE_NOTE_FOLDER: &str = "incidents/voice_notes";
pub const MEDIA_FOLDER: &str = "incidents/media";

/// `GET /api/health`
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Loads an incident `user` may see. Missing and forbidden look the same.
pub async fn accessible_incident(state: &AppState, user: &User, id: i64) -> Result<Incident, ApiError> {
    match state.repo.get_incident(id).await? {
        Some(incident) if can_access(user, &incident) => Ok(incident),
        _ => Err(ApiError::not_found()),
    }
}

pub async fn store_upload(state: &AppState, folder: &str, file: UploadedFile) -> Result<String, ApiError> {
    let key = state
        .store
        .save_upload(folder, file.data, &file.content_type, file.filename.as_deref())
        .await?;
    log::info!("Stored upload {}", key);
    Ok(key)
}

/// Removes files no row references any more. Failures are only logged.
pub async fn discard_files(state: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = state.store.delete(key).await {
            log::warn!("Could not delete stored file {}: {:#}", key, e);
        }
    }
}

/// Rolls back uploads stored for a write that then failed. Content-addressed
/// keys another row already points at are kept.
pub async fn discard_new_uploads(state: &AppState, keys: Vec<String>) {
    if keys.is_empty() {
        return;
    }
    match state.repo.unreferenced_keys(keys).await {
        Ok(orphaned) => discard_files(state, &orphaned).await,
        Err(e) => log::warn!("Could not check uploads left by a failed write: {:#}", e),
    }
}
