#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use chrono::Duration;
use rr_api::extract::SESSION_COOKIE;
use rr_api::AppState;
use rr_auth_jwt::JwtAuthProvider;
use rr_core::models::{Incident, IncidentStatus, IncidentType, NewIncident, NewUser, Role, User};
use rr_core::traits::MediaStore;
use rr_db_sqlite::SqliteReportRepo;
use rr_storage_local::LocalMediaStore;
use tempfile::TempDir;

pub const PASSWORD: &str = "Sturdy-pass-42";
pub const BOUNDARY: &str = "rr-test-boundary";

/// Builds the routed service for a `web::Data<AppState>`.
macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .configure(rr_api::configure_routes),
        )
        .await
    };
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    /// Keeps the media root alive for the duration of the test.
    pub media: TempDir,
}

pub async fn setup() -> TestContext {
    setup_with(|store| Box::new(store)).await
}

/// Like [`setup`], but every voice note write fails.
pub async fn setup_without_voice_notes() -> TestContext {
    setup_with(|store| Box::new(VoiceNotesOffline(store))).await
}

async fn setup_with(wrap: impl FnOnce(LocalMediaStore) -> Box<dyn MediaStore>) -> TestContext {
    let repo = SqliteReportRepo::new("sqlite::memory:").await.unwrap();
    let media = tempfile::tempdir().unwrap();
    let store = LocalMediaStore::new(media.path().to_path_buf(), "/media".into());
    let auth = JwtAuthProvider::new(b"integration-secret", Duration::minutes(30), Duration::days(1));

    let state = web::Data::new(AppState {
        repo: Box::new(repo),
        store: wrap(store),
        auth: Box::new(auth),
        maps_api_key: None,
        secure_cookies: false,
    });
    TestContext { state, media }
}

pub struct VoiceNotesOffline(LocalMediaStore);

#[async_trait]
impl MediaStore for VoiceNotesOffline {
    async fn save_upload(
        &self,
        folder: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> anyhow::Result<String> {
        if folder == rr_api::handlers::VOICE_NOTE_FOLDER {
            anyhow::bail!("voice note volume is read-only");
        }
        self.0.save_upload(folder, data, content_type, filename).await
    }

    fn get_url(&self, key: &str) -> String {
        self.0.get_url(key)
    }

    fn get_thumbnail_url(&self, key: &str) -> Option<String> {
        self.0.get_thumbnail_url(key)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.0.delete(key).await
    }
}

/// Every regular file under `dir`, recursively.
pub fn stored_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(stored_files(&path));
        } else {
            files.push(path);
        }
    }
    files
}

pub async fn create_user(ctx: &TestContext, username: &str, role: Role) -> User {
    let password_hash = ctx.state.auth.hash_password(PASSWORD).unwrap();
    ctx.state
        .repo
        .create_user(NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash,
            role,
            phone_number: "0550000000".into(),
            name: None,
        })
        .await
        .unwrap()
}

pub async fn create_incident(ctx: &TestContext, owner: &User, title: &str, kind: IncidentType) -> Incident {
    ctx.state
        .repo
        .create_incident(NewIncident {
            title: title.to_string(),
            description: format!("{} description", title),
            incident_type: kind,
            status: IncidentStatus::Pending,
            latitude: Some(36.752887),
            longitude: Some(3.042048),
            photo: Default::default(),
            voice_note: Default::default(),
            sync_status: Default::default(),
            user_id: owner.id,
        })
        .await
        .unwrap()
}

pub fn access_token(ctx: &TestContext, user: &User) -> String {
    ctx.state.auth.issue_tokens(user).unwrap().access
}

pub fn bearer(ctx: &TestContext, user: &User) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", access_token(ctx, user)))
}

/// Panel session cookie for `user`.
pub fn session_cookie(ctx: &TestContext, user: &User) -> actix_web::cookie::Cookie<'static> {
    actix_web::cookie::Cookie::new(SESSION_COOKIE, access_token(ctx, user))
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

/// Encodes a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> (&'static str, String) {
    ("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY))
}

/// Value of the `Location` header.
pub fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
