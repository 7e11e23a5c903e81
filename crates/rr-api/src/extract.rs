//! Request extractors for the two ways of signing in: bearer tokens on
//! the JSON API, and the `rr_session` cookie on the staff panel.

use crate::error::ApiError;
use crate::state::AppState;
use actix_web::dev::Payload;
use actix_web::http::{header, StatusCode};
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use askama::Template;
use futures_util::future::LocalBoxFuture;
use rr_core::error::AppError;
use rr_core::models::User;
use rr_core::traits::TokenKind;
use rr_ui::{ErrorTemplate, Layout};
use std::fmt;

pub const SESSION_COOKIE: &str = "rr_session";
const NO_CREDENTIALS: &str = "Authentication credentials were not provided.";

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ApiError(AppError::Internal("application state is not configured".into())))
}

pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

/// Resolves an access token to an active user.
pub async fn user_for_token(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.auth.verify_token(token, TokenKind::Access)?;
    let id = claims
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Token contained no recognizable user identification".into()))?;
    match state.repo.get_user(id).await? {
        Some(user) if user.is_active => Ok(user),
        Some(_) => Err(AppError::Unauthorized("User is inactive".into())),
        None => Err(AppError::Unauthorized("User not found".into())),
    }
}

/// The caller of an API endpoint, authenticated by `Authorization: Bearer`.
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_token(req);
        Box::pin(async move {
            let state = state?;
            let token = token.ok_or_else(|| ApiError::unauthorized(NO_CREDENTIALS))?;
            Ok(AuthUser(user_for_token(&state, &token).await?))
        })
    }
}

/// Why a panel request was turned away.
#[derive(Debug)]
pub enum PanelRejection {
    /// Not signed in: send to the login page, then back to `next`.
    Login { next: String },
    /// Signed in, but not staff.
    Forbidden,
    NotFound,
    Internal(ApiError),
}

impl From<ApiError> for PanelRejection {
    fn from(err: ApiError) -> Self {
        match err.0 {
            AppError::NotFound(..) => PanelRejection::NotFound,
            _ => PanelRejection::Internal(err),
        }
    }
}

impl From<AppError> for PanelRejection {
    fn from(err: AppError) -> Self {
        ApiError(err).into()
    }
}

impl From<anyhow::Error> for PanelRejection {
    fn from(err: anyhow::Error) -> Self {
        ApiError::from(err).into()
    }
}

fn error_page(status: u16, message: &str) -> HttpResponse {
    let page = ErrorTemplate {
        layout: Layout::new(if status == 404 { "Not found" } else { "Forbidden" }, None, Vec::new()),
        status,
        message: message.to_string(),
    };
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match page.render() {
        Ok(html) => HttpResponse::build(code).content_type("text/html; charset=utf-8").body(html),
        Err(e) => {
            log::error!("Template rendering failed: {}", e);
            HttpResponse::build(code).finish()
        }
    }
}

impl fmt::Display for PanelRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelRejection::Login { next } => write!(f, "login required for {}", next),
            PanelRejection::Forbidden => f.write_str("staff only"),
            PanelRejection::NotFound => f.write_str("not found"),
            PanelRejection::Internal(err) => err.fmt(f),
        }
    }
}

pub fn login_location(next: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("/accounts/login/?{}", query)
}

impl ResponseError for PanelRejection {
    fn status_code(&self) -> StatusCode {
        match self {
            PanelRejection::Login { .. } => StatusCode::SEE_OTHER,
            PanelRejection::Forbidden => StatusCode::FORBIDDEN,
            PanelRejection::NotFound => StatusCode::NOT_FOUND,
            PanelRejection::Internal(err) => err.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            PanelRejection::Login { next } => HttpResponse::SeeOther()
                .insert_header((header::LOCATION, login_location(next)))
                .finish(),
            PanelRejection::Forbidden => {
                error_page(403, "You do not have permission to access the staff panel.")
            }
            PanelRejection::NotFound => error_page(404, "The requested page does not exist."),
            PanelRejection::Internal(err) => err.error_response(),
        }
    }
}

/// A signed-in staff member on the admin panel.
pub struct StaffUser(pub User);

impl FromRequest for StaffUser {
    type Error = PanelRejection;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let next = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/admin-panel/".into());
        Box::pin(async move {
            let state = state.map_err(PanelRejection::Internal)?;
            let token = token.ok_or_else(|| PanelRejection::Login { next: next.clone() })?;
            let user = match user_for_token(&state, &token).await {
                Ok(user) => user,
                Err(AppError::Unauthorized(_)) => return Err(PanelRejection::Login { next }),
                Err(e) => return Err(PanelRejection::Internal(ApiError(e))),
            };
            if !user.is_admin() {
                return Err(PanelRejection::Forbidden);
            }
            Ok(StaffUser(user))
        })
    }
}
