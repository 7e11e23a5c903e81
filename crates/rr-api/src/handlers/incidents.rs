//! Incident CRUD for API clients, scoped by ownership.

use super::{
    accessible_incident, discard_files, discard_new_uploads, store_upload, MEDIA_FOLDER, PHOTO_FOLDER,
    VOICE_NOTE_FOLDER,
};
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::payload::{read_form, read_multipart, FormData};
use crate::serializers::{IncidentView, MediaUrls, MediaView};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use rr_core::access::IncidentScope;
use rr_core::error::FieldErrors;
use rr_core::models::{Attachment, IncidentFilter, MediaType, NewIncidentMedia, Ordering};
use rr_core::validation::{IncidentDraft, Mode, REQUIRED};
use std::collections::HashMap;
use std::str::FromStr;

/// Builds a listing filter from `status`, `incident_type`, `search` and
/// `ordering` query parameters. Unknown orderings fall back to newest first.
pub fn filter_from_query(query: &HashMap<String, String>) -> Result<IncidentFilter, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut filter = IncidentFilter::default();

    if let Some(raw) = query.get("status").filter(|s| !s.is_empty()) {
        match raw.parse() {
            Ok(status) => filter.status = Some(status),
            Err(message) => errors.add("status", message),
        }
    }
    if let Some(raw) = query.get("incident_type").filter(|s| !s.is_empty()) {
        match raw.parse() {
            Ok(kind) => filter.incident_type = Some(kind),
            Err(message) => errors.add("incident_type", message),
        }
    }
    filter.search = query
        .get("search")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(raw) = query.get("ordering") {
        filter.ordering = Ordering::from_str(raw.trim()).unwrap_or_default();
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}

/// Stores uploaded `photo` / `voice_note` parts and points the attachments
/// at them. Everything is checked before anything is written. Returns the
/// stored keys so the caller can roll them back if its own write fails.
pub async fn attach_uploads(
    state: &AppState,
    form: &mut FormData,
    photo: &mut Attachment,
    voice_note: &mut Attachment,
) -> Result<Vec<String>, ApiError> {
    let photo_file = form.take_file("photo");
    let voice_file = form.take_file("voice_note");

    if let Some(file) = &photo_file {
        if !file.content_type.starts_with("image/") {
            return Err(ApiError::invalid(
                "photo",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            ));
        }
    }

    let mut stored = Vec::new();
    let uploads = [(photo_file, PHOTO_FOLDER, photo), (voice_file, VOICE_NOTE_FOLDER, voice_note)];
    for (file, folder, attachment) in uploads {
        let Some(file) = file else { continue };
        match store_upload(state, folder, file).await {
            Ok(key) => {
                attachment.file = Some(key.clone());
                stored.push(key);
            }
            Err(e) => {
                discard_new_uploads(state, stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// `GET /api/incidents/`
pub async fn list(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError> {
    let filter = IncidentScope::for_user(&user.0).restrict(filter_from_query(&query)?);
    let incidents = data.repo.list_incidents(&filter).await?;

    let urls = MediaUrls::new(&req, data.store.as_ref());
    let body: Vec<IncidentView> = incidents.iter().map(|i| IncidentView::new(i, &urls)).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// `POST /api/incidents/` (JSON or multipart)
pub async fn create(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let mut form = read_form(&req, payload).await?;
    let draft = IncidentDraft::parse(&form.fields, Mode::Create)?;

    let mut new = draft.into_new(user.0.id);
    let stored = attach_uploads(&data, &mut form, &mut new.photo, &mut new.voice_note).await?;
    let incident = match data.repo.create_incident(new).await {
        Ok(incident) => incident,
        Err(e) => {
            discard_new_uploads(&data, stored).await;
            return Err(e.into());
        }
    };
    log::info!("User {} reported incident {}", user.0.id, incident.id);

    let urls = MediaUrls::new(&req, data.store.as_ref());
    Ok(HttpResponse::Created().json(IncidentView::new(&incident, &urls).with_media(&[], &urls)))
}

/// `GET /api/incidents/{id}/`
pub async fn retrieve(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let incident = accessible_incident(&data, &user.0, path.into_inner()).await?;
    let media = data.repo.list_media(incident.id).await?;

    let urls = MediaUrls::new(&req, data.store.as_ref());
    Ok(HttpResponse::Ok().json(IncidentView::new(&incident, &urls).with_media(&media, &urls)))
}

async fn save(
    data: &AppState,
    user: AuthUser,
    req: HttpRequest,
    payload: web::Payload,
    id: i64,
    mode: Mode,
) -> Result<HttpResponse, ApiError> {
    let mut incident = accessible_incident(data, &user.0, id).await?;
    let mut form = read_form(&req, payload).await?;
    let draft = IncidentDraft::parse(&form.fields, mode)?;

    draft.apply(&mut incident);
    let stored = attach_uploads(data, &mut form, &mut incident.photo, &mut incident.voice_note).await?;
    let saved = match data.repo.update_incident(&incident).await {
        Ok(saved) => saved,
        Err(e) => {
            discard_new_uploads(data, stored).await;
            return Err(e.into());
        }
    };
    let media = data.repo.list_media(saved.id).await?;

    let urls = MediaUrls::new(&req, data.store.as_ref());
    Ok(HttpResponse::Ok().json(IncidentView::new(&saved, &urls).with_media(&media, &urls)))
}

/// `PUT /api/incidents/{id}/`
pub async fn update(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    save(&data, user, req, payload, path.into_inner(), Mode::Create).await
}

/// `PATCH /api/incidents/{id}/`
pub async fn partial_update(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    save(&data, user, req, payload, path.into_inner(), Mode::Partial).await
}

/// `DELETE /api/incidents/{id}/`
pub async fn destroy(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let incident = accessible_incident(&data, &user.0, path.into_inner()).await?;
    let purged = data
        .repo
        .delete_incident(incident.id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    discard_files(&data, &purged.storage_keys).await;
    log::info!("User {} deleted incident {}", user.0.id, incident.id);
    Ok(HttpResponse::NoContent().finish())
}

/// Validates a media upload form and stores the file.
pub async fn add_media_from_form(
    data: &AppState,
    incident_id: i64,
    mut form: FormData,
) -> Result<rr_core::models::IncidentMedia, ApiError> {
    let mut errors = FieldErrors::new();
    let media_type = match form.text("media_type").map(str::trim) {
        None | Some("") => {
            errors.add("media_type", REQUIRED);
            None
        }
        Some(raw) => match MediaType::from_str(raw) {
            Ok(kind) => Some(kind),
            Err(message) => {
                errors.add("media_type", message);
                None
            }
        },
    };
    let file = form.take_file("file");
    if file.is_none() {
        errors.add("file", "No file was submitted.");
    }
    let (Some(media_type), Some(file)) = (media_type, file) else {
        return Err(errors.into());
    };

    let caption = form
        .text("caption")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let key = store_upload(data, MEDIA_FOLDER, file).await?;
    let added = data
        .repo
        .add_media(NewIncidentMedia {
            incident_id,
            file: key.clone(),
            media_type,
            caption,
        })
        .await;
    match added {
        Ok(media) => Ok(media),
        Err(e) => {
            discard_new_uploads(data, vec![key]).await;
            Err(e.into())
        }
    }
}

/// `POST /api/incidents/{id}/media/`
pub async fn upload_media(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    path: web::Path<i64>,
    multipart: Multipart,
) -> Result<HttpResponse, ApiError> {
    let incident = accessible_incident(&data, &user.0, path.into_inner()).await?;
    let form = read_multipart(multipart).await?;
    let media = add_media_from_form(&data, incident.id, form).await?;

    let urls = MediaUrls::new(&req, data.store.as_ref());
    Ok(HttpResponse::Created().json(MediaView::new(&media, &urls)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::models::{IncidentStatus, OrderField};

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_listing_filters() {
        let filter = filter_from_query(&query(&[
            ("status", "in_progress"),
            ("search", "  pipe "),
            ("ordering", "updated_at"),
        ]))
        .unwrap();
        assert_eq!(filter.status, Some(IncidentStatus::InProgress));
        assert_eq!(filter.search.as_deref(), Some("pipe"));
        assert_eq!(filter.ordering.field, OrderField::UpdatedAt);
        assert!(!filter.ordering.descending);
    }

    #[test]
    fn unknown_choices_are_field_errors_but_orderings_are_ignored() {
        let errors = filter_from_query(&query(&[("status", "lost"), ("incident_type", "flood")])).unwrap_err();
        assert!(errors.contains("status"));
        assert!(errors.contains("incident_type"));

        let filter = filter_from_query(&query(&[("ordering", "-title")])).unwrap();
        assert_eq!(filter.ordering, Ordering::default());
    }
}
