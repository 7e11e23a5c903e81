//! JSON shapes returned by the API.

use actix_web::HttpRequest;
use chrono::{DateTime, Utc};
use rr_core::models::{
    Attachment, Incident, IncidentMedia, IncidentStatus, IncidentType, MediaType, SyncStatus,
};
use rr_core::traits::MediaStore;
use serde::Serialize;

/// Builds absolute media URLs from the request's scheme and host.
pub struct MediaUrls<'a> {
    origin: String,
    store: &'a dyn MediaStore,
}

impl<'a> MediaUrls<'a> {
    pub fn new(req: &HttpRequest, store: &'a dyn MediaStore) -> Self {
        let info = req.connection_info();
        Self {
            origin: format!("{}://{}", info.scheme(), info.host()),
            store,
        }
    }

    pub fn absolute(&self, key: &str) -> String {
        let path = self.store.get_url(key);
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}{}", self.origin, path)
        }
    }

    pub fn thumbnail(&self, key: &str) -> Option<String> {
        let path = self.store.get_thumbnail_url(key)?;
        Some(format!("{}{}", self.origin, path))
    }

    /// Stored file wins over the remote URL.
    fn attachment_url(&self, attachment: &Attachment) -> Option<String> {
        match &attachment.file {
            Some(key) => Some(self.absolute(key)),
            None => attachment.url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub id: i64,
    pub incident: i64,
    pub file: String,
    pub thumbnail: Option<String>,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MediaView {
    pub fn new(media: &IncidentMedia, urls: &MediaUrls<'_>) -> Self {
        Self {
            id: media.id,
            incident: media.incident_id,
            file: urls.absolute(&media.file),
            thumbnail: match media.media_type {
                MediaType::Image => urls.thumbnail(&media.file),
                MediaType::Video => None,
            },
            media_type: media.media_type,
            caption: media.caption.clone(),
            created_at: media.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IncidentView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub status: IncidentStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo: Option<String>,
    pub photo_url: Option<String>,
    pub photo_local_path: Option<String>,
    pub voice_note: Option<String>,
    pub voice_note_url: Option<String>,
    pub voice_note_local_path: Option<String>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaView>>,
}

impl IncidentView {
    pub fn new(incident: &Incident, urls: &MediaUrls<'_>) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            description: incident.description.clone(),
            incident_type: incident.incident_type,
            status: incident.status,
            latitude: incident.latitude,
            longitude: incident.longitude,
            photo: incident.photo.file.as_deref().map(|k| urls.absolute(k)),
            photo_url: urls.attachment_url(&incident.photo),
            photo_local_path: incident.photo.local_path.clone(),
            voice_note: incident.voice_note.file.as_deref().map(|k| urls.absolute(k)),
            voice_note_url: urls.attachment_url(&incident.voice_note),
            voice_note_local_path: incident.voice_note.local_path.clone(),
            sync_status: incident.sync_status,
            created_at: incident.created_at,
            updated_at: incident.updated_at,
            user: incident.user_id,
            media: None,
        }
    }

    pub fn with_media(mut self, media: &[IncidentMedia], urls: &MediaUrls<'_>) -> Self {
        self.media = Some(media.iter().map(|m| MediaView::new(m, urls)).collect());
        self
    }
}
