//! # Input Validation
//!
//! Turns loosely-typed request fields (JSON objects or multipart text parts)
//! into typed drafts, collecting every problem into a [`FieldErrors`] map
//! instead of stopping at the first one.

use crate::error::FieldErrors;
use crate::models::{
    Attachment, Incident, IncidentStatus, IncidentType, NewIncident, ProfileUpdate, SyncStatus,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_A_NUMBER: &str = "A valid number is required.";
pub const NOT_AN_INTEGER: &str = "A valid integer is required.";
pub const NOT_A_URL: &str = "Enter a valid URL.";
pub const NOT_A_STRING: &str = "Not a valid string.";

const TITLE_MAX: usize = 255;
const USERNAME_MAX: usize = 150;
const PHONE_MAX: usize = 15;
const PASSWORD_MIN: usize = 8;
const COORDINATE_SCALE: f64 = 1_000_000.0;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "admin123", "letmein1", "welcome1",
    "abc12345", "11111111", "00000000", "sunshine", "football", "baseball",
];

/// Raw request fields, keyed by name.
pub type Fields = Map<String, Value>;

/// Builds a field map from multipart/urlencoded text parts.
pub fn fields_from_text(parts: &HashMap<String, String>) -> Fields {
    parts
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// Whether missing required fields are errors (`Create`) or simply
/// left unchanged (`Partial`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Partial,
}

/// Validated incident fields. Outer `None` means "not supplied";
/// `Some(None)` on optional columns means "clear it".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub incident_type: Option<IncidentType>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub photo_url: Option<Option<String>>,
    pub photo_local_path: Option<Option<String>>,
    pub voice_note_url: Option<Option<String>>,
    pub voice_note_local_path: Option<Option<String>>,
    pub sync_status: Option<SyncStatus>,
}

impl IncidentDraft {
    /// Validates `fields`. `status` is read-only here and ignored.
    pub fn parse(fields: &Fields, mode: Mode) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = required_text(&mut errors, fields, "title", Some(TITLE_MAX), mode);
        let description = required_text(&mut errors, fields, "description", None, mode);
        let incident_type = choice::<IncidentType>(&mut errors, fields, "incident_type");
        let latitude = coordinate(&mut errors, fields, "latitude", 90.0);
        let longitude = coordinate(&mut errors, fields, "longitude", 180.0);
        let photo_url = remote_url(&mut errors, fields, "photo_url");
        let voice_note_url = remote_url(&mut errors, fields, "voice_note_url");
        let photo_local_path = optional_text(&mut errors, fields, "photo_local_path");
        let voice_note_local_path = optional_text(&mut errors, fields, "voice_note_local_path");
        let sync_status = choice::<SyncStatus>(&mut errors, fields, "sync_status");

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            title,
            description,
            incident_type,
            latitude,
            longitude,
            photo_url,
            photo_local_path,
            voice_note_url,
            voice_note_local_path,
            sync_status,
        })
    }

    /// Builds an insertable incident. Only valid on drafts parsed in `Create` mode.
    pub fn into_new(self, user_id: i64) -> NewIncident {
        NewIncident {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            incident_type: self.incident_type.unwrap_or_default(),
            status: IncidentStatus::default(),
            latitude: self.latitude.flatten(),
            longitude: self.longitude.flatten(),
            photo: Attachment {
                file: None,
                url: self.photo_url.flatten(),
                local_path: self.photo_local_path.flatten(),
            },
            voice_note: Attachment {
                file: None,
                url: self.voice_note_url.flatten(),
                local_path: self.voice_note_local_path.flatten(),
            },
            sync_status: self.sync_status.unwrap_or_default(),
            user_id,
        }
    }

    /// Overwrites only the supplied fields of `incident`.
    pub fn apply(self, incident: &mut Incident) {
        if let Some(title) = self.title {
            incident.title = title;
        }
        if let Some(description) = self.description {
            incident.description = description;
        }
        if let Some(kind) = self.incident_type {
            incident.incident_type = kind;
        }
        if let Some(latitude) = self.latitude {
            incident.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            incident.longitude = longitude;
        }
        if let Some(url) = self.photo_url {
            incident.photo.url = url;
        }
        if let Some(path) = self.photo_local_path {
            incident.photo.local_path = path;
        }
        if let Some(url) = self.voice_note_url {
            incident.voice_note.url = url;
        }
        if let Some(path) = self.voice_note_local_path {
            incident.voice_note.local_path = path;
        }
        if let Some(sync_status) = self.sync_status {
            incident.sync_status = sync_status;
        }
    }
}

/// Reads the optional integer `id` a sync payload may carry.
pub fn payload_id(fields: &Fields) -> Result<Option<i64>, FieldErrors> {
    match fields.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| FieldErrors::single("id", NOT_AN_INTEGER)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FieldErrors::single("id", NOT_AN_INTEGER)),
        Some(_) => Err(FieldErrors::single("id", NOT_AN_INTEGER)),
    }
}

/// Reads a staff-supplied `status`; absent means "leave as is".
pub fn parse_status(fields: &Fields) -> Result<Option<IncidentStatus>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let status = choice::<IncidentStatus>(&mut errors, fields, "status");
    if errors.is_empty() {
        Ok(status)
    } else {
        Err(errors)
    }
}

/// Status-only edit form for staff.
///
/// Every field is bound to the incident's stored value; only `status` is
/// taken from the submission, so whatever else was posted is discarded
/// before validation.
#[derive(Debug, Clone)]
pub struct StatusOnlyForm {
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sync_status: SyncStatus,
    pub status: String,
}

impl StatusOnlyForm {
    /// Unbound form showing the stored values.
    pub fn initial(original: &Incident) -> Self {
        Self::bind(original, &HashMap::new())
    }

    pub fn bind(original: &Incident, submitted: &HashMap<String, String>) -> Self {
        Self {
            title: original.title.clone(),
            description: original.description.clone(),
            incident_type: original.incident_type,
            latitude: original.latitude,
            longitude: original.longitude,
            sync_status: original.sync_status,
            status: submitted
                .get("status")
                .cloned()
                .unwrap_or_else(|| original.status.as_str().to_string()),
        }
    }

    pub fn validate(&self) -> Result<IncidentStatus, FieldErrors> {
        let status = self.status.trim();
        if status.is_empty() {
            return Err(FieldErrors::single("status", REQUIRED));
        }
        IncidentStatus::from_str(status).map_err(|msg| FieldErrors::single("status", msg))
    }
}

/// Validated registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

impl RegistrationDraft {
    /// Checks shape and password strength. Uniqueness is the caller's job.
    pub fn parse(fields: &Fields) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = required_text(&mut errors, fields, "username", Some(USERNAME_MAX), Mode::Create)
            .unwrap_or_default();
        if !username.is_empty() && !valid_username(&username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let email = required_text(&mut errors, fields, "email", None, Mode::Create)
            .unwrap_or_default();
        if !email.is_empty() && !valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        let password = raw_text(&mut errors, fields, "password").unwrap_or_default();
        let password2 = raw_text(&mut errors, fields, "password2").unwrap_or_default();
        if password.is_empty() && !errors.contains("password") {
            errors.add("password", REQUIRED);
        }
        if password2.is_empty() && !errors.contains("password2") {
            errors.add("password2", REQUIRED);
        }
        if !password.is_empty() {
            for message in password_problems(&password, &username) {
                errors.add("password", message);
            }
            if !password2.is_empty() && password != password2 {
                errors.add("password", "Password fields didn't match.");
            }
        }

        let phone_number = phone(&mut errors, fields).unwrap_or_default();

        if errors.is_empty() {
            Ok(Self {
                username,
                email,
                password,
                phone_number,
            })
        } else {
            Err(errors)
        }
    }
}

/// Validated profile edit. `email` is read-only and silently ignored.
pub fn parse_profile(fields: &Fields, mode: Mode) -> Result<ProfileUpdate, FieldErrors> {
    let mut errors = FieldErrors::new();
    let username = required_text(&mut errors, fields, "username", Some(USERNAME_MAX), mode);
    if let Some(name) = &username {
        if !valid_username(name) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }
    let phone_number = phone(&mut errors, fields);
    if errors.is_empty() {
        Ok(ProfileUpdate {
            username,
            phone_number,
        })
    } else {
        Err(errors)
    }
}

/// Password rules: length, numeric-only, common list, similarity to username.
pub fn password_problems(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN {
        problems.push("This password is too short. It must contain at least 8 characters.");
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.");
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.");
    }
    let user = username.to_lowercase();
    if user.len() >= 3 && (lowered.contains(&user) || user.contains(&lowered)) {
        problems.push("The password is too similar to the username.");
    }
    problems
}

fn valid_username(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(char::is_whitespace)
}

/// A string value without trimming; `None` when absent.
fn raw_text(errors: &mut FieldErrors, fields: &Fields, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        _ => {
            errors.add(name, NOT_A_STRING);
            None
        }
    }
}

fn required_text(
    errors: &mut FieldErrors,
    fields: &Fields,
    name: &str,
    max_len: Option<usize>,
    mode: Mode,
) -> Option<String> {
    let value = match fields.get(name) {
        None => {
            if mode == Mode::Create {
                errors.add(name, REQUIRED);
            }
            return None;
        }
        Some(Value::Null) => {
            errors.add(name, "This field may not be null.");
            return None;
        }
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            errors.add(name, NOT_A_STRING);
            return None;
        }
    };

    if value.is_empty() {
        errors.add(name, BLANK);
        return None;
    }
    if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(
                name,
                format!("Ensure this field has no more than {} characters.", max),
            );
            return None;
        }
    }
    Some(value)
}

fn optional_text(errors: &mut FieldErrors, fields: &Fields, name: &str) -> Option<Option<String>> {
    match fields.get(name)? {
        Value::Null => Some(None),
        Value::String(s) if s.trim().is_empty() => Some(None),
        Value::String(s) => Some(Some(s.trim().to_string())),
        _ => {
            errors.add(name, NOT_A_STRING);
            None
        }
    }
}

fn phone(errors: &mut FieldErrors, fields: &Fields) -> Option<String> {
    let value = optional_text(errors, fields, "phone_number")?.unwrap_or_default();
    if value.chars().count() > PHONE_MAX {
        errors.add(
            "phone_number",
            format!("Ensure this field has no more than {} characters.", PHONE_MAX),
        );
        return None;
    }
    Some(value)
}

fn choice<T>(errors: &mut FieldErrors, fields: &Fields, name: &str) -> Option<T>
where
    T: FromStr<Err = String>,
{
    match fields.get(name)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse() {
            Ok(v) => Some(v),
            Err(msg) => {
                errors.add(name, msg);
                None
            }
        },
        Value::Null => None,
        other => {
            errors.add(name, format!("\"{}\" is not a valid choice.", other));
            None
        }
    }
}

fn coordinate(errors: &mut FieldErrors, fields: &Fields, name: &str, bound: f64) -> Option<Option<f64>> {
    let raw = match fields.get(name)? {
        Value::Null => return Some(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Some(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let Some(value) = raw.filter(|v| v.is_finite()) else {
        errors.add(name, NOT_A_NUMBER);
        return None;
    };
    if value < -bound || value > bound {
        errors.add(
            name,
            format!("Ensure this value is between -{} and {}.", bound, bound),
        );
        return None;
    }
    Some(Some(round_coordinate(value)))
}

/// Rounds to the six decimal places the schema keeps.
pub fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_SCALE).round() / COORDINATE_SCALE
}

fn remote_url(errors: &mut FieldErrors, fields: &Fields, name: &str) -> Option<Option<String>> {
    let value = optional_text(errors, fields, name)?;
    match value {
        None => Some(None),
        Some(raw) => match url::Url::parse(&raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(Some(raw)),
            _ => {
                errors.add(name, NOT_A_URL);
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn sample_incident() -> Incident {
        Incident {
            id: 7,
            title: "Broken hydrant".into(),
            description: "Water everywhere".into(),
            incident_type: IncidentType::Other,
            status: IncidentStatus::Pending,
            latitude: Some(18.0735),
            longitude: Some(-15.9582),
            photo: Attachment::default(),
            voice_note: Attachment::default(),
            sync_status: SyncStatus::Synced,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user_id: 1,
        }
    }

    #[test]
    fn create_requires_title_and_description() {
        let err = IncidentDraft::parse(&fields(json!({})), Mode::Create).unwrap_err();
        assert_eq!(err.first("title"), Some(REQUIRED));
        assert_eq!(err.first("description"), Some(REQUIRED));
    }

    #[test]
    fn partial_accepts_empty_payload() {
        let draft = IncidentDraft::parse(&fields(json!({})), Mode::Partial).unwrap();
        assert_eq!(draft, IncidentDraft::default());
    }

    #[test]
    fn collects_every_field_error() {
        let err = IncidentDraft::parse(
            &fields(json!({
                "title": "  ",
                "description": "ok",
                "incident_type": "flood",
                "latitude": "north",
                "longitude": 200,
                "photo_url": "ftp://example.com/a.jpg",
            })),
            Mode::Create,
        )
        .unwrap_err();
        assert_eq!(err.first("title"), Some(BLANK));
        assert_eq!(err.first("incident_type"), Some("\"flood\" is not a valid choice."));
        assert_eq!(err.first("latitude"), Some(NOT_A_NUMBER));
        assert!(err.contains("longitude"));
        assert_eq!(err.first("photo_url"), Some(NOT_A_URL));
    }

    #[test]
    fn title_length_is_capped() {
        let long = "x".repeat(256);
        let err = IncidentDraft::parse(
            &fields(json!({ "title": long, "description": "d" })),
            Mode::Create,
        )
        .unwrap_err();
        assert_eq!(
            err.first("title"),
            Some("Ensure this field has no more than 255 characters.")
        );
    }

    #[test]
    fn coordinates_round_to_six_places_and_accept_strings() {
        let draft = IncidentDraft::parse(
            &fields(json!({
                "title": "t",
                "description": "d",
                "latitude": "18.07351234",
                "longitude": -15.9582009,
            })),
            Mode::Create,
        )
        .unwrap();
        assert_eq!(draft.latitude, Some(Some(18.073512)));
        assert_eq!(draft.longitude, Some(Some(-15.958201)));
    }

    #[test]
    fn create_defaults_type_and_ignores_status() {
        let draft = IncidentDraft::parse(
            &fields(json!({ "title": "t", "description": "d", "status": "closed" })),
            Mode::Create,
        )
        .unwrap();
        let new = draft.into_new(3);
        assert_eq!(new.incident_type, IncidentType::General);
        assert_eq!(new.status, IncidentStatus::Pending);
        assert_eq!(new.sync_status, SyncStatus::Pending);
        assert_eq!(new.user_id, 3);
    }

    #[test]
    fn partial_apply_only_touches_supplied_fields() {
        let mut incident = sample_incident();
        let draft = IncidentDraft::parse(
            &fields(json!({ "title": "Hydrant fixed?", "latitude": null })),
            Mode::Partial,
        )
        .unwrap();
        draft.apply(&mut incident);
        assert_eq!(incident.title, "Hydrant fixed?");
        assert_eq!(incident.description, "Water everywhere");
        assert_eq!(incident.latitude, None);
        assert_eq!(incident.longitude, Some(-15.9582));
    }

    #[test]
    fn payload_id_accepts_numbers_and_numeric_strings() {
        assert_eq!(payload_id(&fields(json!({ "id": 4 }))).unwrap(), Some(4));
        assert_eq!(payload_id(&fields(json!({ "id": "12" }))).unwrap(), Some(12));
        assert_eq!(payload_id(&fields(json!({ "id": null }))).unwrap(), None);
        assert!(payload_id(&fields(json!({ "id": "abc" }))).is_err());
    }

    #[test]
    fn status_only_form_discards_other_fields() {
        let incident = sample_incident();
        let submitted: HashMap<String, String> = [
            ("title", "Hacked"),
            ("description", "Changed"),
            ("incident_type", "fire"),
            ("latitude", "0"),
            ("status", "in_progress"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let form = StatusOnlyForm::bind(&incident, &submitted);
        assert_eq!(form.title, incident.title);
        assert_eq!(form.description, incident.description);
        assert_eq!(form.incident_type, IncidentType::Other);
        assert_eq!(form.latitude, incident.latitude);
        assert_eq!(form.validate().unwrap(), IncidentStatus::InProgress);
    }

    #[test]
    fn status_only_form_rejects_unknown_status() {
        let incident = sample_incident();
        let submitted = HashMap::from([("status".to_string(), "rejected".to_string())]);
        let err = StatusOnlyForm::bind(&incident, &submitted).validate().unwrap_err();
        assert!(err.contains("status"));
    }

    #[test]
    fn registration_checks_password_rules() {
        let err = RegistrationDraft::parse(&fields(json!({
            "username": "amina",
            "email": "amina@example.org",
            "password": "12345678",
            "password2": "12345678",
        })))
        .unwrap_err();
        let messages = err.get("password").unwrap();
        assert!(messages.contains(&"This password is entirely numeric.".to_string()));
        assert!(messages.contains(&"This password is too common.".to_string()));
    }

    #[test]
    fn registration_requires_matching_passwords() {
        let err = RegistrationDraft::parse(&fields(json!({
            "username": "amina",
            "email": "amina@example.org",
            "password": "river-stone-42",
            "password2": "river-stone-43",
        })))
        .unwrap_err();
        assert_eq!(err.first("password"), Some("Password fields didn't match."));
    }

    #[test]
    fn registration_rejects_bad_email_and_accepts_good_input() {
        let err = RegistrationDraft::parse(&fields(json!({
            "username": "amina",
            "email": "not-an-email",
            "password": "river-stone-42",
            "password2": "river-stone-42",
        })))
        .unwrap_err();
        assert!(err.contains("email"));

        let ok = RegistrationDraft::parse(&fields(json!({
            "username": "amina",
            "email": "amina@example.org",
            "password": "river-stone-42",
            "password2": "river-stone-42",
            "phone_number": "+22245000000",
        })))
        .unwrap();
        assert_eq!(ok.phone_number, "+22245000000");
    }

    #[test]
    fn profile_ignores_email() {
        let update = parse_profile(
            &fields(json!({ "email": "new@example.org", "phone_number": "123" })),
            Mode::Partial,
        )
        .unwrap();
        assert_eq!(update.username, None);
        assert_eq!(update.phone_number.as_deref(), Some("123"));
    }
}
