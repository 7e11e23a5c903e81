//! # rr-ui
//!
//! Askama templates for the staff panel plus the flat view models they
//! render. Handlers build these from domain models; templates never call
//! back into the core.

use askama::Template;
use chrono::{DateTime, Utc};
use rr_core::error::FieldErrors;
use rr_core::models::{Incident, IncidentMedia, User, UserSummary};
use rr_core::stats::StatEntry;
use serde::Serialize;

const DATE_FORMAT: &str = "%b %d, %Y %H:%M";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(DATE_FORMAT).to_string()
}

/// Serializes `value` for embedding inside a `<script>` element.
pub fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".into())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    /// `success` or `error`; used as a CSS class.
    pub level: String,
    pub message: String,
}

/// Shared chrome rendered by `base.html`.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub title: String,
    pub username: Option<String>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    pub fn new(title: impl Into<String>, user: Option<&User>, flashes: Vec<Flash>) -> Self {
        Self {
            title: title.into(),
            username: user.map(|u| u.username.clone()),
            flashes,
        }
    }
}

/// An `<option>` with its selection precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl Choice {
    pub fn list(options: &[(&'static str, &'static str)], current: &str) -> Vec<Choice> {
        options
            .iter()
            .map(|(value, label)| Choice {
                value,
                label,
                selected: *value == current,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct IncidentRow {
    pub id: i64,
    pub title: String,
    pub type_key: &'static str,
    pub type_label: &'static str,
    pub status_key: &'static str,
    pub status_label: &'static str,
    pub reporter: String,
    pub created: String,
    pub has_location: bool,
}

impl IncidentRow {
    pub fn new(incident: &Incident, reporter: &str) -> Self {
        Self {
            id: incident.id,
            title: incident.title.clone(),
            type_key: incident.incident_type.as_str(),
            type_label: incident.incident_type.label(),
            status_key: incident.status.as_str(),
            status_label: incident.status.label(),
            reporter: reporter.to_string(),
            created: format_timestamp(&incident.created_at),
            has_location: incident.has_location(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role_label: &'static str,
    pub is_admin: bool,
    pub is_active: bool,
    pub incident_count: i64,
    pub joined: String,
}

impl UserRow {
    pub fn new(user: &User, incident_count: i64) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone_number.clone(),
            role_label: user.role.label(),
            is_admin: user.is_admin(),
            is_active: user.is_active,
            incident_count,
            joined: format_timestamp(&user.date_joined),
        }
    }

    pub fn from_summary(summary: &UserSummary) -> Self {
        Self::new(&summary.user, summary.incident_count)
    }
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub is_image: bool,
    pub caption: String,
    pub created: String,
}

impl MediaRow {
    pub fn new(media: &IncidentMedia, url: String, thumbnail_url: Option<String>) -> Self {
        Self {
            url,
            thumbnail_url,
            is_image: media.media_type == rr_core::models::MediaType::Image,
            caption: media.caption.clone().unwrap_or_default(),
            created: format_timestamp(&media.created_at),
        }
    }
}

/// A map pin on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub id: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: &'static str,
    pub incident_type: &'static str,
}

impl Marker {
    pub fn from_incident(incident: &Incident) -> Option<Self> {
        Some(Self {
            id: incident.id,
            title: incident.title.clone(),
            latitude: incident.latitude?,
            longitude: incident.longitude?,
            status: incident.status.as_str(),
            incident_type: incident.incident_type.as_str(),
        })
    }
}

/// `{labels, data}` payload consumed by the chart script.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub labels: Vec<&'static str>,
    pub data: Vec<i64>,
}

impl ChartData {
    pub fn from_entries(entries: &[StatEntry]) -> Self {
        Self {
            labels: entries.iter().map(|e| e.label).collect(),
            data: entries.iter().map(|e| e.count).collect(),
        }
    }
}

/// Inline form errors, looked up by field name from templates.
#[derive(Debug, Clone, Default)]
pub struct FormErrors(pub FieldErrors);

impl FormErrors {
    pub fn first(&self, field: &str) -> &str {
        self.0.first(field).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Errors on fields the form does not render.
    pub fn other(&self, rendered: &[&str]) -> Vec<String> {
        self.0
            .iter()
            .filter(|(field, _)| !rendered.contains(&field.as_str()))
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{}: {}", field, m)))
            .collect()
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub total_incidents: i64,
    pub recent_incidents: i64,
    pub total_users: i64,
    pub active_users: i64,
    pub latest_users: Vec<UserRow>,
    pub status_stats: Vec<StatEntry>,
    pub type_stats: Vec<StatEntry>,
    pub latest_incidents: Vec<IncidentRow>,
    pub markers_json: String,
    pub maps_api_key: String,
}

#[derive(Template)]
#[template(path = "incidents.html")]
pub struct IncidentListTemplate {
    pub layout: Layout,
    pub incidents: Vec<IncidentRow>,
    pub q: String,
    pub status_options: Vec<Choice>,
    pub type_options: Vec<Choice>,
    pub all_statuses: Vec<Choice>,
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub status_chart_json: String,
    pub type_chart_json: String,
}

#[derive(Template)]
#[template(path = "incident_detail.html")]
pub struct IncidentDetailTemplate {
    pub layout: Layout,
    pub incident: IncidentRow,
    pub description: String,
    pub latitude: String,
    pub longitude: String,
    pub sync_status: &'static str,
    pub updated: String,
    pub photo_url: Option<String>,
    pub voice_note_url: Option<String>,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reporter_phone: String,
    pub media: Vec<MediaRow>,
    pub media_types: Vec<Choice>,
    pub is_resolved: bool,
}

/// Create form and status-only edit form share this template; `editing`
/// disables everything except `status`.
#[derive(Template)]
#[template(path = "incident_form.html")]
pub struct IncidentFormTemplate {
    pub layout: Layout,
    pub editing: bool,
    pub action: String,
    pub cancel_url: String,
    pub title: String,
    pub description: String,
    pub latitude: String,
    pub longitude: String,
    pub photo_url: String,
    pub voice_note_url: String,
    pub type_options: Vec<Choice>,
    pub status_options: Vec<Choice>,
    pub errors: FormErrors,
    pub other_errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users.html")]
pub struct UserListTemplate {
    pub layout: Layout,
    pub users: Vec<UserRow>,
    pub search: String,
    pub role_options: Vec<Choice>,
    pub total: i64,
    pub page: i64,
    pub num_pages: i64,
    pub previous_link: Option<String>,
    pub next_link: Option<String>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub layout: Layout,
    pub status: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::models::{Attachment, IncidentStatus, IncidentType, Role, SyncStatus};

    fn incident() -> Incident {
        Incident {
            id: 7,
            title: "Burst <pipe>".into(),
            description: "Water everywhere".into(),
            incident_type: IncidentType::Other,
            status: IncidentStatus::InProgress,
            latitude: Some(-1.2921),
            longitude: Some(36.8219),
            photo: Attachment::default(),
            voice_note: Attachment::default(),
            sync_status: SyncStatus::Synced,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user_id: 1,
        }
    }

    fn admin() -> User {
        User {
            id: 1,
            username: "staff".into(),
            email: "staff@example.com".into(),
            password_hash: String::new(),
            role: Role::Admin,
            phone_number: String::new(),
            name: None,
            token: None,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn script_json_cannot_close_the_script_element() {
        let marker = Marker::from_incident(&Incident {
            title: "</script><b>".into(),
            ..incident()
        })
        .unwrap();
        let json = script_json(&vec![marker]);
        assert!(!json.contains("</script>"));
        assert!(json.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn markers_require_both_coordinates() {
        assert!(Marker::from_incident(&incident()).is_some());
        let unplaced = Incident {
            longitude: None,
            ..incident()
        };
        assert!(Marker::from_incident(&unplaced).is_none());
    }

    #[test]
    fn choice_list_marks_current_value() {
        let options = Choice::list(&[("", "All"), ("pending", "Pending"), ("resolved", "Resolved")], "resolved");
        let selected: Vec<_> = options.iter().filter(|c| c.selected).map(|c| c.value).collect();
        assert_eq!(selected, vec!["resolved"]);
    }

    #[test]
    fn detail_page_escapes_user_content() {
        let page = IncidentDetailTemplate {
            layout: Layout::new("Incident", Some(&admin()), vec![]),
            incident: IncidentRow::new(&incident(), "citizen"),
            description: "<script>alert(1)</script>".into(),
            latitude: "-1.292100".into(),
            longitude: "36.821900".into(),
            sync_status: "Synced",
            updated: String::new(),
            photo_url: None,
            voice_note_url: None,
            reporter_name: "citizen".into(),
            reporter_email: "c@example.com".into(),
            reporter_phone: String::new(),
            media: vec![],
            media_types: vec![],
            is_resolved: false,
        };
        let html = page.render().unwrap();
        assert!(html.contains("Burst &lt;pipe&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("/admin-panel/incidents/7/resolve/"));
    }

    #[test]
    fn form_errors_render_inline() {
        let mut errors = FieldErrors::new();
        errors.add("status", "\"bogus\" is not a valid choice.");
        errors.add("photo", "Upload failed.");
        let form = IncidentFormTemplate {
            layout: Layout::new("Edit", Some(&admin()), vec![]),
            editing: true,
            action: "/admin-panel/incidents/7/edit/".into(),
            cancel_url: "/admin-panel/incidents/7/".into(),
            title: "Burst pipe".into(),
            description: "Water".into(),
            latitude: String::new(),
            longitude: String::new(),
            photo_url: String::new(),
            voice_note_url: String::new(),
            type_options: vec![],
            status_options: vec![],
            other_errors: FormErrors(errors.clone()).other(&["status"]),
            errors: FormErrors(errors),
        };
        let html = form.render().unwrap();
        assert!(html.contains("&quot;bogus&quot; is not a valid choice."));
        assert!(html.contains("photo: Upload failed."));
        assert!(html.contains("disabled"));
    }
}
