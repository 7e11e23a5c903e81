//! Server-rendered staff panel: dashboard, incident triage, user management,
//! and the cookie-based sign-in that guards it.

use crate::error::ApiError;
use crate::extract::{PanelRejection, StaffUser, SESSION_COOKIE};
use crate::flash;
use crate::handlers::incidents::{add_media_from_form, attach_uploads};
use crate::handlers::{discard_files, discard_new_uploads};
use crate::payload::read_multipart;
use crate::serializers::MediaUrls;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use askama::Template;
use chrono::{Duration, Utc};
use rr_core::error::{AppError, FieldErrors};
use rr_core::models::{
    Attachment, Incident, IncidentFilter, IncidentStatus, IncidentType, MediaType, Role, User, UserFilter,
};
use rr_core::stats::{status_breakdown, type_breakdown};
use rr_core::validation::{parse_status, IncidentDraft, Mode, StatusOnlyForm};
use rr_ui::{
    format_timestamp, script_json, ChartData, Choice, DashboardTemplate, Flash, FormErrors,
    IncidentDetailTemplate, IncidentFormTemplate, IncidentListTemplate, IncidentRow, Layout,
    LoginTemplate, Marker, MediaRow, UserListTemplate, UserRow,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

type PanelResult = Result<HttpResponse, PanelRejection>;

const DASHBOARD: &str = "/admin-panel/";
const INCIDENTS: &str = "/admin-panel/incidents/";
const USERS: &str = "/admin-panel/users/";
const LATEST_LIMIT: i64 = 5;
const USERS_PER_PAGE: i64 = 20;
const FORM_FIELDS: &[&str] = &[
    "title",
    "description",
    "incident_type",
    "status",
    "latitude",
    "longitude",
    "photo_url",
    "voice_note_url",
];

fn detail_url(id: i64) -> String {
    format!("/admin-panel/incidents/{}/", id)
}

/// Renders `template`, clearing the flash cookie if its messages were shown.
fn page<T: Template>(template: &T, flashes_shown: bool) -> PanelResult {
    let html = template
        .render()
        .map_err(|e| ApiError(AppError::Internal(format!("template rendering failed: {}", e))))?;
    let mut builder = HttpResponse::Ok();
    flash::clear_if_shown(&mut builder, flashes_shown);
    Ok(builder.content_type("text/html; charset=utf-8").body(html))
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

fn layout(title: impl Into<String>, user: &User, req: &HttpRequest) -> (Layout, bool) {
    let flashes = flash::take(req);
    let shown = !flashes.is_empty();
    (Layout::new(title, Some(user), flashes), shown)
}

fn status_choices() -> Vec<(&'static str, &'static str)> {
    IncidentStatus::ALL.iter().map(|s| (s.as_str(), s.label())).collect()
}

fn type_choices() -> Vec<(&'static str, &'static str)> {
    IncidentType::ALL.iter().map(|t| (t.as_str(), t.label())).collect()
}

fn with_blank(blank: &'static str, mut options: Vec<(&'static str, &'static str)>) -> Vec<(&'static str, &'static str)> {
    options.insert(0, ("", blank));
    options
}

fn coordinate_text(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

/// Usernames of the owners of `incidents`, by user id.
async fn reporter_names(state: &AppState, incidents: &[Incident]) -> Result<HashMap<i64, String>, PanelRejection> {
    let mut names = HashMap::new();
    for incident in incidents {
        if names.contains_key(&incident.user_id) {
            continue;
        }
        let name = state
            .repo
            .get_user(incident.user_id)
            .await?
            .map(|u| u.username)
            .unwrap_or_default();
        names.insert(incident.user_id, name);
    }
    Ok(names)
}

async fn incident_rows(state: &AppState, incidents: &[Incident]) -> Result<Vec<IncidentRow>, PanelRejection> {
    let names = reporter_names(state, incidents).await?;
    Ok(incidents
        .iter()
        .map(|i| IncidentRow::new(i, names.get(&i.user_id).map(String::as_str).unwrap_or("")))
        .collect())
}

async fn load_incident(state: &AppState, id: i64) -> Result<Incident, PanelRejection> {
    state
        .repo
        .get_incident(id)
        .await?
        .ok_or(PanelRejection::NotFound)
}

// ── Sign in / out ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

/// Only same-site paths are followed after sign-in.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\") {
        next
    } else {
        DASHBOARD
    }
}

/// `GET /accounts/login/`
pub async fn login_form(req: HttpRequest, query: web::Query<HashMap<String, String>>) -> PanelResult {
    let flashes = flash::take(&req);
    let shown = !flashes.is_empty();
    let next = query.get("next").map(String::as_str).unwrap_or(DASHBOARD);
    page(
        &LoginTemplate {
            layout: Layout::new("Sign in", None, flashes),
            next: safe_next(next).to_string(),
            username: String::new(),
            error: None,
        },
        shown,
    )
}

/// `POST /accounts/login/`
pub async fn login(data: web::Data<AppState>, form: web::Form<LoginForm>) -> PanelResult {
    let form = form.into_inner();
    let user = match data.repo.find_user_by_username(form.username.trim()).await? {
        Some(user) if user.is_active => Some(user),
        _ => None,
    };
    let verified = match &user {
        Some(user) => data.auth.verify_password(&form.password, &user.password_hash).await,
        None => false,
    };
    let user = match user {
        Some(user) if verified => user,
        _ => {
            log::info!("Failed panel sign-in for {}", form.username);
            return page(
                &LoginTemplate {
                    layout: Layout::new("Sign in", None, Vec::new()),
                    next: safe_next(&form.next).to_string(),
                    username: form.username,
                    error: Some("Please enter a correct username and password.".into()),
                },
                false,
            );
        }
    };

    // Only the access token is used here; the stored refresh id is left
    // alone so the user's mobile session keeps working.
    let pair = data.auth.issue_tokens(&user)?;
    let session = Cookie::build(SESSION_COOKIE, pair.access)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(data.secure_cookies)
        .finish();
    log::info!("User {} signed in to the panel", user.username);
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, safe_next(&form.next).to_string()))
        .cookie(session)
        .finish())
}

/// `POST /accounts/logout/`
pub async fn logout() -> HttpResponse {
    let mut session = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    session.make_removal();
    let mut response = flash::redirect("/accounts/login/", flash::success("You have been signed out."));
    if let Err(e) = response.add_cookie(&session) {
        log::warn!("Could not clear session cookie: {}", e);
    }
    response
}

// ── Dashboard ────────────────────────────────────────────────────────────────

/// `GET /` and `GET /admin-panel/`
pub async fn dashboard(data: web::Data<AppState>, staff: StaffUser, req: HttpRequest) -> PanelResult {
    let repo = &data.repo;
    let total = repo.count_incidents(&IncidentFilter::default()).await?;
    let recent = repo
        .count_incidents(&IncidentFilter {
            created_since: Some(Utc::now() - Duration::days(7)),
            ..Default::default()
        })
        .await?;
    let (total_users, active_users) = repo.count_users().await?;
    let latest_users = repo.latest_users(LATEST_LIMIT).await?;
    let by_status = repo.count_by_status(None).await?;
    let by_type = repo.count_by_type(None).await?;
    let latest = repo
        .list_incidents(&IncidentFilter {
            limit: Some(LATEST_LIMIT),
            ..Default::default()
        })
        .await?;
    let located = repo
        .list_incidents(&IncidentFilter {
            with_location: true,
            ..Default::default()
        })
        .await?;
    let markers: Vec<Marker> = located.iter().filter_map(Marker::from_incident).collect();

    let (layout, shown) = layout("Dashboard", &staff.0, &req);
    page(
        &DashboardTemplate {
            layout,
            total_incidents: total,
            recent_incidents: recent,
            total_users,
            active_users,
            latest_users: latest_users.iter().map(|u| UserRow::new(u, 0)).collect(),
            status_stats: status_breakdown(&by_status, total),
            type_stats: type_breakdown(&by_type, total),
            latest_incidents: incident_rows(&data, &latest).await?,
            markers_json: script_json(&markers),
            maps_api_key: data.maps_api_key.clone().unwrap_or_default(),
        },
        shown,
    )
}

// ── Incidents ────────────────────────────────────────────────────────────────

/// `GET /admin-panel/incidents/?status=&type=&q=`
pub async fn incident_list(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> PanelResult {
    let status_filter = query.get("status").cloned().unwrap_or_default();
    let type_filter = query.get("type").cloned().unwrap_or_default();
    let q = query.get("q").map(|s| s.trim().to_string()).unwrap_or_default();

    let filter = IncidentFilter {
        status: IncidentStatus::from_str(&status_filter).ok(),
        incident_type: IncidentType::from_str(&type_filter).ok(),
        search: Some(q.clone()).filter(|s| !s.is_empty()),
        ..Default::default()
    };
    let incidents = data.repo.list_incidents(&filter).await?;

    // Counters and charts cover every incident, not just the filtered page.
    let by_status = data.repo.count_by_status(None).await?;
    let by_type = data.repo.count_by_type(None).await?;
    let total: i64 = by_status.iter().map(|(_, c)| c).sum();
    let count_of = |status: IncidentStatus| {
        by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    };
    let status_chart = ChartData {
        labels: IncidentStatus::ALL.iter().map(|s| s.label()).collect(),
        data: IncidentStatus::ALL.iter().map(|s| count_of(*s)).collect(),
    };
    let type_chart = ChartData::from_entries(&type_breakdown(&by_type, total));

    let (layout, shown) = layout("Incidents", &staff.0, &req);
    page(
        &IncidentListTemplate {
            layout,
            incidents: incident_rows(&data, &incidents).await?,
            q,
            status_options: Choice::list(&with_blank("All statuses", status_choices()), &status_filter),
            type_options: Choice::list(&with_blank("All types", type_choices()), &type_filter),
            all_statuses: Choice::list(&status_choices(), ""),
            total,
            pending: count_of(IncidentStatus::Pending),
            in_progress: count_of(IncidentStatus::InProgress),
            resolved: count_of(IncidentStatus::Resolved),
            status_chart_json: script_json(&status_chart),
            type_chart_json: script_json(&type_chart),
        },
        shown,
    )
}

/// `GET /admin-panel/incidents/{id}/`
pub async fn incident_detail(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    path: web::Path<i64>,
) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    let reporter = data.repo.get_user(incident.user_id).await?;
    let media = data.repo.list_media(incident.id).await?;

    let urls = MediaUrls::new(&req, data.store.as_ref());
    let attachment_url = |a: &Attachment| match &a.file {
        Some(key) => Some(urls.absolute(key)),
        None => a.url.clone(),
    };
    let media_rows = media
        .iter()
        .map(|m| {
            let thumb = match m.media_type {
                MediaType::Image => urls.thumbnail(&m.file),
                MediaType::Video => None,
            };
            MediaRow::new(m, urls.absolute(&m.file), thumb)
        })
        .collect();

    let reporter_name = reporter
        .as_ref()
        .map(|u| u.name.clone().unwrap_or_else(|| u.username.clone()))
        .unwrap_or_default();
    let (layout, shown) = layout(format!("Incident #{}", incident.id), &staff.0, &req);
    page(
        &IncidentDetailTemplate {
            layout,
            incident: IncidentRow::new(&incident, reporter.as_ref().map(|u| u.username.as_str()).unwrap_or("")),
            description: incident.description.clone(),
            latitude: coordinate_text(incident.latitude),
            longitude: coordinate_text(incident.longitude),
            sync_status: incident.sync_status.label(),
            updated: format_timestamp(&incident.updated_at),
            photo_url: attachment_url(&incident.photo),
            voice_note_url: attachment_url(&incident.voice_note),
            reporter_name,
            reporter_email: reporter.as_ref().map(|u| u.email.clone()).unwrap_or_default(),
            reporter_phone: reporter.as_ref().map(|u| u.phone_number.clone()).unwrap_or_default(),
            media: media_rows,
            media_types: Choice::list(
                &MediaType::ALL.iter().map(|m| (m.as_str(), m.label())).collect::<Vec<_>>(),
                MediaType::Image.as_str(),
            ),
            is_resolved: incident.status == IncidentStatus::Resolved,
        },
        shown,
    )
}

fn create_form(layout: Layout, values: &HashMap<String, String>, errors: FieldErrors) -> IncidentFormTemplate {
    let value = |name: &str| values.get(name).cloned().unwrap_or_default();
    let kind = values.get("incident_type").map(String::as_str).unwrap_or("general");
    let status = values.get("status").map(String::as_str).unwrap_or("pending");
    let errors = FormErrors(errors);
    IncidentFormTemplate {
        layout,
        editing: false,
        action: "/admin-panel/incidents/create/".into(),
        cancel_url: INCIDENTS.into(),
        title: value("title"),
        description: value("description"),
        latitude: value("latitude"),
        longitude: value("longitude"),
        photo_url: value("photo_url"),
        voice_note_url: value("voice_note_url"),
        type_options: Choice::list(&type_choices(), kind),
        status_options: Choice::list(&status_choices(), status),
        other_errors: errors.other(FORM_FIELDS),
        errors,
    }
}

/// `GET /admin-panel/incidents/create/`
pub async fn incident_create_form(staff: StaffUser, req: HttpRequest) -> PanelResult {
    let (layout, shown) = layout("Report an incident", &staff.0, &req);
    page(&create_form(layout, &HashMap::new(), FieldErrors::new()), shown)
}

/// `POST /admin-panel/incidents/create/`: the new incident belongs to the signed-in staff member.
pub async fn incident_create(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    multipart: Multipart,
) -> PanelResult {
    let mut form = read_multipart(multipart).await?;
    let values = form.text_map();

    let draft = IncidentDraft::parse(&form.fields, Mode::Create);
    let status = parse_status(&form.fields);
    let (draft, status) = match (draft, status) {
        (Ok(draft), Ok(status)) => (draft, status),
        (draft, status) => {
            let mut errors = FieldErrors::new();
            for failed in [draft.err(), status.err()].into_iter().flatten() {
                for (field, messages) in failed.iter() {
                    for message in messages {
                        errors.add(field, message.clone());
                    }
                }
            }
            let (layout, _) = layout("Report an incident", &staff.0, &req);
            return page(&create_form(layout, &values, errors), false);
        }
    };

    let mut new = draft.into_new(staff.0.id);
    new.status = status.unwrap_or_default();
    let stored = match attach_uploads(&data, &mut form, &mut new.photo, &mut new.voice_note).await {
        Ok(stored) => stored,
        Err(err) => {
            return match err.0 {
                AppError::ValidationError(errors) => {
                    let (layout, _) = layout("Report an incident", &staff.0, &req);
                    page(&create_form(layout, &values, errors), false)
                }
                other => Err(ApiError(other).into()),
            };
        }
    };

    let incident = match data.repo.create_incident(new).await {
        Ok(incident) => incident,
        Err(e) => {
            discard_new_uploads(&data, stored).await;
            return Err(ApiError::from(e).into());
        }
    };
    log::info!("Staff {} created incident {}", staff.0.username, incident.id);
    Ok(flash::redirect(
        &detail_url(incident.id),
        flash::success(format!("Incident #{} was created successfully.", incident.id)),
    ))
}

fn status_form(layout: Layout, id: i64, form: &StatusOnlyForm, errors: FieldErrors) -> IncidentFormTemplate {
    let errors = FormErrors(errors);
    IncidentFormTemplate {
        layout,
        editing: true,
        action: format!("/admin-panel/incidents/{}/edit/", id),
        cancel_url: detail_url(id),
        title: form.title.clone(),
        description: form.description.clone(),
        latitude: coordinate_text(form.latitude),
        longitude: coordinate_text(form.longitude),
        photo_url: String::new(),
        voice_note_url: String::new(),
        type_options: Choice::list(&type_choices(), form.incident_type.as_str()),
        status_options: Choice::list(&status_choices(), &form.status),
        other_errors: errors.other(&["status"]),
        errors,
    }
}

/// `GET /admin-panel/incidents/{id}/edit/`
pub async fn incident_edit_form(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    path: web::Path<i64>,
) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    let (layout, shown) = layout(format!("Edit incident #{}", incident.id), &staff.0, &req);
    page(
        &status_form(layout, incident.id, &StatusOnlyForm::initial(&incident), FieldErrors::new()),
        shown,
    )
}

/// `POST /admin-panel/incidents/{id}/edit/`: only `status` is ever written.
pub async fn incident_edit(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    path: web::Path<i64>,
    submitted: web::Form<HashMap<String, String>>,
) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    let form = StatusOnlyForm::bind(&incident, &submitted);

    match form.validate() {
        Ok(status) => {
            data.repo
                .update_status(incident.id, status)
                .await?
                .ok_or(PanelRejection::NotFound)?;
            log::info!("Staff {} set incident {} to {}", staff.0.username, incident.id, status);
            Ok(flash::redirect(
                &detail_url(incident.id),
                flash::success(format!("Status of incident #{} was updated successfully.", incident.id)),
            ))
        }
        Err(errors) => {
            let (layout, _) = layout(format!("Edit incident #{}", incident.id), &staff.0, &req);
            page(&status_form(layout, incident.id, &form, errors), false)
        }
    }
}

/// `POST /admin-panel/incidents/{id}/resolve/`
pub async fn incident_resolve(data: web::Data<AppState>, staff: StaffUser, path: web::Path<i64>) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    if incident.status == IncidentStatus::Resolved {
        return Ok(see_other(&detail_url(incident.id)));
    }
    data.repo.update_status(incident.id, IncidentStatus::Resolved).await?;
    log::info!("Staff {} resolved incident {}", staff.0.username, incident.id);
    Ok(flash::redirect(
        &detail_url(incident.id),
        flash::success(format!("Incident #{} has been marked as resolved.", incident.id)),
    ))
}

/// Path and query of a same-site `Referer`, if there is one.
fn referer_path(req: &HttpRequest) -> Option<String> {
    let raw = req.headers().get(header::REFERER)?.to_str().ok()?;
    let parsed = url::Url::parse(raw).ok()?;
    let host = req.connection_info().host().to_string();
    let origin = match parsed.port() {
        Some(port) => format!("{}:{}", parsed.host_str()?, port),
        None => parsed.host_str()?.to_string(),
    };
    if origin != host {
        return None;
    }
    Some(match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    })
}

/// `POST /admin-panel/incidents/{id}/status/`: quick change from the list.
pub async fn incident_set_status(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    path: web::Path<i64>,
    submitted: web::Form<HashMap<String, String>>,
) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    let back = referer_path(&req).unwrap_or_else(|| INCIDENTS.to_string());

    let message: Flash = match submitted.get("status").map(|s| IncidentStatus::from_str(s)) {
        Some(Ok(status)) => {
            data.repo.update_status(incident.id, status).await?;
            log::info!("Staff {} set incident {} to {}", staff.0.username, incident.id, status);
            flash::success(format!("Status of incident #{} was updated successfully.", incident.id))
        }
        _ => flash::error("Invalid status."),
    };
    Ok(flash::redirect(&back, message))
}

/// `POST /admin-panel/incidents/{id}/delete/`
pub async fn incident_delete(data: web::Data<AppState>, staff: StaffUser, path: web::Path<i64>) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    match data.repo.delete_incident(incident.id).await {
        Ok(Some(purged)) => {
            discard_files(&data, &purged.storage_keys).await;
            log::info!("Staff {} deleted incident {}", staff.0.username, incident.id);
            Ok(flash::redirect(
                INCIDENTS,
                flash::success(format!("Incident #{} was deleted successfully.", incident.id)),
            ))
        }
        Ok(None) => Err(PanelRejection::NotFound),
        Err(e) => {
            log::error!("Deleting incident {} failed: {:#}", incident.id, e);
            Ok(flash::redirect(
                &detail_url(incident.id),
                flash::error(format!("Error while deleting the incident: {}", e)),
            ))
        }
    }
}

/// `POST /admin-panel/incidents/{id}/media/`
pub async fn incident_add_media(
    data: web::Data<AppState>,
    staff: StaffUser,
    path: web::Path<i64>,
    multipart: Multipart,
) -> PanelResult {
    let incident = load_incident(&data, path.into_inner()).await?;
    let target = detail_url(incident.id);
    let outcome = match read_multipart(multipart).await {
        Ok(form) => add_media_from_form(&data, incident.id, form).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(media) => {
            log::info!("Staff {} attached media {} to incident {}", staff.0.username, media.id, incident.id);
            Ok(flash::redirect(&target, flash::success("Media attached.")))
        }
        Err(ApiError(AppError::ValidationError(errors))) => {
            Ok(flash::redirect(&target, flash::error(format!("Could not attach media: {}", errors))))
        }
        Err(other) => Err(other.into()),
    }
}

// ── Users ────────────────────────────────────────────────────────────────────

fn users_link(role: &str, search: &str, page: i64) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if !role.is_empty() {
        query.append_pair("role", role);
    }
    if !search.is_empty() {
        query.append_pair("search", search);
    }
    query.append_pair("page", &page.to_string());
    format!("{}?{}", USERS, query.finish())
}

/// `GET /admin-panel/users/?role=&search=&page=`
pub async fn user_list(
    data: web::Data<AppState>,
    staff: StaffUser,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> PanelResult {
    let role = query.get("role").cloned().unwrap_or_default();
    let search = query.get("search").map(|s| s.trim().to_string()).unwrap_or_default();
    let requested = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);

    let users = data
        .repo
        .list_users(&UserFilter {
            role: Role::from_str(&role).ok(),
            search: Some(search.clone()).filter(|s| !s.is_empty()),
            page: requested,
            per_page: USERS_PER_PAGE,
        })
        .await?;

    let role_options = with_blank(
        "All roles",
        Role::ALL.iter().map(|r| (r.as_str(), r.label())).collect(),
    );
    let (layout, shown) = layout("Users", &staff.0, &req);
    page(
        &UserListTemplate {
            layout,
            users: users.items.iter().map(UserRow::from_summary).collect(),
            role_options: Choice::list(&role_options, &role),
            total: users.total,
            page: users.page,
            num_pages: users.num_pages(),
            previous_link: users
                .has_previous()
                .then(|| users_link(&role, &search, users.page - 1)),
            next_link: users.has_next().then(|| users_link(&role, &search, users.page + 1)),
            search,
        },
        shown,
    )
}

/// `POST /admin-panel/users/{id}/delete/`: removes the user and every incident they own.
pub async fn user_delete(data: web::Data<AppState>, staff: StaffUser, path: web::Path<i64>) -> PanelResult {
    let id = path.into_inner();
    if id == staff.0.id {
        return Ok(flash::redirect(USERS, flash::error("You cannot delete your own account.")));
    }
    let user = data.repo.get_user(id).await?.ok_or(PanelRejection::NotFound)?;

    match data.repo.delete_user(id).await {
        Ok(Some(purged)) => {
            discard_files(&data, &purged.storage_keys).await;
            log::info!(
                "Staff {} deleted user {} and {} incidents",
                staff.0.username,
                user.username,
                purged.incidents
            );
            Ok(flash::redirect(
                USERS,
                flash::success(format!("User {} and all of their incidents were deleted.", user.username)),
            ))
        }
        Ok(None) => Err(PanelRejection::NotFound),
        Err(e) => {
            log::error!("Deleting user {} failed: {:#}", id, e);
            Ok(flash::redirect(
                USERS,
                flash::error(format!("Error while deleting the user: {}", e)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next("/admin-panel/users/?page=2"), "/admin-panel/users/?page=2");
        assert_eq!(safe_next("//evil.example/"), DASHBOARD);
        assert_eq!(safe_next("https://evil.example/"), DASHBOARD);
        assert_eq!(safe_next(""), DASHBOARD);
    }

    #[test]
    fn pagination_links_keep_filters() {
        assert_eq!(users_link("admin", "a b", 2), "/admin-panel/users/?role=admin&search=a+b&page=2");
        assert_eq!(users_link("", "", 1), "/admin-panel/users/?page=1");
    }

    #[test]
    fn referer_is_reduced_to_a_local_path() {
        let req = actix_web::test::TestRequest::default()
            .insert_header((header::HOST, "panel.test"))
            .insert_header((header::REFERER, "http://panel.test/admin-panel/incidents/?status=pending"))
            .to_http_request();
        assert_eq!(referer_path(&req).as_deref(), Some("/admin-panel/incidents/?status=pending"));

        let foreign = actix_web::test::TestRequest::default()
            .insert_header((header::HOST, "panel.test"))
            .insert_header((header::REFERER, "http://elsewhere.test/"))
            .to_http_request();
        assert_eq!(referer_path(&foreign), None);
    }
}
