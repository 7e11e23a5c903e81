//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use crate::error::Result;
use crate::models::{
    Incident, IncidentFilter, IncidentMedia, IncidentStatus, IncidentType, NewIncident,
    NewIncidentMedia, NewUser, Page, ProfileUpdate, Purged, User, UserFilter, UserSummary,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data persistence contract for users, incidents, and media.
#[async_trait]
pub trait ReportRepo: Send + Sync {
    // User Operations
    async fn create_user(&self, user: NewUser) -> anyhow::Result<User>;
    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn update_profile(&self, id: i64, update: ProfileUpdate) -> anyhow::Result<Option<User>>;
    /// Stores (or clears) the refresh token id a user may present next.
    async fn set_user_token(&self, id: i64, token: Option<&str>) -> anyhow::Result<()>;
    async fn list_users(&self, filter: &UserFilter) -> anyhow::Result<Page<UserSummary>>;
    async fn latest_users(&self, limit: i64) -> anyhow::Result<Vec<User>>;
    /// Returns `(total, active)`.
    async fn count_users(&self) -> anyhow::Result<(i64, i64)>;
    /// Deletes a user and every incident they own. `None` if no such user.
    async fn delete_user(&self, id: i64) -> anyhow::Result<Option<Purged>>;

    // Incident Operations
    async fn create_incident(&self, incident: NewIncident) -> anyhow::Result<Incident>;
    async fn get_incident(&self, id: i64) -> anyhow::Result<Option<Incident>>;
    async fn list_incidents(&self, filter: &IncidentFilter) -> anyhow::Result<Vec<Incident>>;
    async fn count_incidents(&self, filter: &IncidentFilter) -> anyhow::Result<i64>;
    /// Writes the client-editable columns of `incident` and bumps `updated_at`.
    /// `status` is left as stored; only [`ReportRepo::update_status`] changes it.
    async fn update_incident(&self, incident: &Incident) -> anyhow::Result<Incident>;
    /// Writes only the status column. `None` if no such incident.
    async fn update_status(&self, id: i64, status: IncidentStatus) -> anyhow::Result<Option<Incident>>;
    async fn delete_incident(&self, id: i64) -> anyhow::Result<Option<Purged>>;
    /// Keeps the storage keys no incident or media row points at.
    async fn unreferenced_keys(&self, keys: Vec<String>) -> anyhow::Result<Vec<String>>;

    // Aggregates
    async fn count_by_status(&self, owner: Option<i64>) -> anyhow::Result<Vec<(IncidentStatus, i64)>>;
    async fn count_by_type(&self, owner: Option<i64>) -> anyhow::Result<Vec<(IncidentType, i64)>>;
    async fn incident_timestamps(&self, owner: Option<i64>) -> anyhow::Result<Vec<DateTime<Utc>>>;

    // Media Operations
    async fn add_media(&self, media: NewIncidentMedia) -> anyhow::Result<IncidentMedia>;
    async fn list_media(&self, incident_id: i64) -> anyhow::Result<Vec<IncidentMedia>>;
}

/// Media storage contract for handling uploads.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes under `folder` and returns a storage key.
    async fn save_upload(
        &self,
        folder: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> anyhow::Result<String>;
    /// Returns the public path of a stored file.
    fn get_url(&self, key: &str) -> String;
    /// Returns the public path of a thumbnail, if one exists for this key.
    fn get_thumbnail_url(&self, key: &str) -> Option<String>;
    /// Removes a stored file and its derivatives. Missing files are not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id, as a string.
    pub sub: String,
    pub username: String,
    pub role: crate::models::Role,
    pub token_type: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    /// `jti` of `refresh`, persisted on the user for rotation.
    #[serde(skip)]
    pub refresh_jti: String,
}

/// Identity contract: password hashing and token handling.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Produces an Argon2 PHC string for storage.
    fn hash_password(&self, password: &str) -> anyhow::Result<String>;

    /// Verifies a password against a stored hash.
    async fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Issues an access token and a refresh token for `user`.
    fn issue_tokens(&self, user: &User) -> anyhow::Result<TokenPair>;

    /// Decodes and checks a token, including its kind and expiry.
    fn verify_token(&self, token: &str, kind: TokenKind) -> Result<TokenClaims>;
}
