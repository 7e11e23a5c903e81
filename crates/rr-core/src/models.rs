//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Report.
//! Identifiers are database-assigned integers so mobile clients can echo
//! them back during a sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates the string mapping shared by every closed enumeration below.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The value stored in the database and used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Human-readable name shown in the admin panel.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("\"{}\" is not a valid choice.", other)),
                }
            }
        }
    };
}

choice_enum! {
    /// Account role gating read/write scope.
    #[derive(Default)]
    pub enum Role {
        #[default]
        Citizen => ("citizen", "Citizen"),
        Admin => ("admin", "Administrator"),
    }
}

choice_enum! {
    /// What kind of problem the citizen is reporting.
    #[derive(Default)]
    pub enum IncidentType {
        #[default]
        General => ("general", "General"),
        Fire => ("fire", "Fire"),
        Accident => ("accident", "Accident"),
        Medical => ("medical", "Medical Emergency"),
        Crime => ("crime", "Crime"),
        Other => ("other", "Other"),
    }
}

choice_enum! {
    /// Triage state, changed by staff only.
    #[derive(Default)]
    pub enum IncidentStatus {
        #[default]
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        Resolved => ("resolved", "Resolved"),
        Closed => ("closed", "Closed"),
    }
}

choice_enum! {
    /// Client-side indicator of whether a record reached the server.
    #[derive(Default)]
    pub enum SyncStatus {
        #[default]
        Pending => ("pending", "Pending"),
        Synced => ("synced", "Synced"),
        Failed => ("failed", "Failed"),
    }
}

choice_enum! {
    pub enum MediaType {
        Image => ("image", "Image"),
        Video => ("video", "Video"),
    }
}

/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone_number: String,
    pub name: Option<String>,
    /// `jti` of the only refresh token currently accepted for this user.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Data required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone_number: String,
    pub name: Option<String>,
}

/// Editable profile fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub phone_number: Option<String>,
}

/// A user row joined with the number of incidents they own.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub incident_count: i64,
}

/// A media attachment: either a stored file, a remote URL, or both,
/// plus the path the mobile client captured it under while offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Storage key handled by `MediaStore`.
    pub file: Option<String>,
    pub url: Option<String>,
    pub local_path: Option<String>,
}

impl Attachment {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.url.is_none() && self.local_path.is_none()
    }
}

/// A citizen-submitted report of an urban problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub status: IncidentStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo: Attachment,
    pub voice_note: Attachment,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
}

impl Incident {
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Storage keys of the files this incident references directly.
    pub fn stored_files(&self) -> Vec<String> {
        [&self.photo.file, &self.voice_note.file]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Data required to insert an incident.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub status: IncidentStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo: Attachment,
    pub voice_note: Attachment,
    pub sync_status: SyncStatus,
    pub user_id: i64,
}

/// A file attached to an incident after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentMedia {
    pub id: i64,
    pub incident_id: i64,
    pub file: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIncidentMedia {
    pub incident_id: i64,
    pub file: String,
    pub media_type: MediaType,
    pub caption: Option<String>,
}

/// Sortable incident columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    UpdatedAt,
    Status,
}

/// Column plus direction, parsed from `created_at` / `-created_at` style strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for Ordering {
    fn default() -> Self {
        Self {
            field: OrderField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for Ordering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "created_at" => OrderField::CreatedAt,
            "updated_at" => OrderField::UpdatedAt,
            "status" => OrderField::Status,
            other => return Err(format!("cannot order by \"{}\"", other)),
        };
        Ok(Self { field, descending })
    }
}

/// Query parameters for incident listings. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    /// Restrict to a single owner (citizen scope).
    pub owner: Option<i64>,
    pub status: Option<IncidentStatus>,
    pub incident_type: Option<IncidentType>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
    pub with_location: bool,
    pub ordering: Ordering,
    pub limit: Option<i64>,
}

/// Query parameters for the admin user list.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Matches username, email or phone number.
    pub search: Option<String>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            role: None,
            search: None,
            page: 1,
            per_page: 20,
        }
    }
}

/// One page of results plus what the template needs to draw pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn num_pages(&self) -> i64 {
        if self.total == 0 {
            1
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages()
    }
}

/// What a cascading delete removed, so callers can clean up storage.
#[derive(Debug, Clone, Default)]
pub struct Purged {
    pub incidents: u64,
    pub storage_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_start_in_the_first_state() {
        assert_eq!(Role::default(), Role::Citizen);
        assert_eq!(IncidentType::default(), IncidentType::General);
        assert_eq!(IncidentStatus::default(), IncidentStatus::Pending);
        assert_eq!(SyncStatus::default(), SyncStatus::Pending);
    }

    #[test]
    fn choices_parse_their_wire_values_only() {
        assert_eq!("in_progress".parse::<IncidentStatus>(), Ok(IncidentStatus::InProgress));
        assert_eq!(
            "In Progress".parse::<IncidentStatus>(),
            Err("\"In Progress\" is not a valid choice.".to_string())
        );
    }
}
