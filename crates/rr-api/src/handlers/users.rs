//! Registration, JWT issuance and the caller's profile.

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::payload::{expect_object, read_json};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use rr_core::error::{AppError, FieldErrors, UniqueViolation};
use rr_core::models::{NewUser, Role, User};
use rr_core::traits::{TokenKind, TokenPair};
use rr_core::validation::{parse_profile, Fields, Mode, RegistrationDraft, REQUIRED};
use serde_json::json;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";
const INVALID_REFRESH: &str = "Token is invalid or expired";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "user with this email already exists.";

/// Reports a UNIQUE clash from the repository (two requests racing past the
/// lookups) the same way the lookups do.
fn taken(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<UniqueViolation>().map(|v| v.field.as_str()) {
        Some("username") => ApiError::invalid("username", USERNAME_TAKEN),
        Some("email") => ApiError::invalid("email", EMAIL_TAKEN),
        _ => err.into(),
    }
}

fn required_strings<const N: usize>(fields: &Fields, names: [&str; N]) -> Result<[String; N], FieldErrors> {
    let mut errors = FieldErrors::new();
    let values = names.map(|name| match fields.get(name).and_then(|v| v.as_str()) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => {
            errors.add(name, REQUIRED);
            String::new()
        }
    });
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Issues a pair and records the refresh `jti` so older refresh tokens die.
async fn issue(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let pair = state.auth.issue_tokens(user)?;
    state.repo.set_user_token(user.id, Some(&pair.refresh_jti)).await?;
    Ok(pair)
}

/// `POST /api/users/register/`
pub async fn register(data: web::Data<AppState>, payload: web::Payload) -> Result<HttpResponse, ApiError> {
    let fields = expect_object(read_json(payload).await?)?;
    let draft = RegistrationDraft::parse(&fields)?;

    let mut errors = FieldErrors::new();
    if data.repo.find_user_by_username(&draft.username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if data.repo.find_user_by_email(&draft.email).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let user = data
        .repo
        .create_user(NewUser {
            username: draft.username,
            email: draft.email,
            password_hash: data.auth.hash_password(&draft.password)?,
            role: Role::Citizen,
            phone_number: draft.phone_number,
            name: None,
        })
        .await
        .map_err(taken)?;
    log::info!("Registered user {} ({})", user.id, user.username);
    Ok(HttpResponse::Created().json(user))
}

/// `POST /api/users/token/`
pub async fn obtain_token(data: web::Data<AppState>, payload: web::Payload) -> Result<HttpResponse, ApiError> {
    let fields = expect_object(read_json(payload).await?)?;
    let [username, password] = required_strings(&fields, ["username", "password"])?;

    let user = match data.repo.find_user_by_username(&username).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::unauthorized(BAD_CREDENTIALS)),
    };
    if !data.auth.verify_password(&password, &user.password_hash).await {
        log::info!("Failed sign-in for {}", username);
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let pair = issue(&data, &user).await?;
    Ok(HttpResponse::Ok().json(json!({
        "access": pair.access,
        "refresh": pair.refresh,
        "user": user,
    })))
}

/// `POST /api/users/token/refresh/`
///
/// Refresh tokens rotate: the presented token must carry the `jti` stored
/// on the user, and a successful refresh replaces it.
pub async fn refresh_token(data: web::Data<AppState>, payload: web::Payload) -> Result<HttpResponse, ApiError> {
    let fields = expect_object(read_json(payload).await?)?;
    let [refresh] = required_strings(&fields, ["refresh"])?;

    let claims = data.auth.verify_token(&refresh, TokenKind::Refresh)?;
    let user = match claims.user_id() {
        Some(id) => data.repo.get_user(id).await?,
        None => None,
    };
    let user = match user {
        Some(user) if user.is_active && user.token.as_deref() == Some(claims.jti.as_str()) => user,
        _ => return Err(ApiError::unauthorized(INVALID_REFRESH)),
    };

    let pair = issue(&data, &user).await?;
    Ok(HttpResponse::Ok().json(json!({
        "access": pair.access,
        "refresh": pair.refresh,
    })))
}

/// `GET /api/users/profile/`
pub async fn get_profile(user: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(user.0)
}

async fn save_profile(
    data: &AppState,
    user: User,
    payload: web::Payload,
    mode: Mode,
) -> Result<HttpResponse, ApiError> {
    let fields = expect_object(read_json(payload).await?)?;
    let update = parse_profile(&fields, mode)?;

    if let Some(username) = &update.username {
        if let Some(other) = data.repo.find_user_by_username(username).await? {
            if other.id != user.id {
                return Err(ApiError::invalid("username", USERNAME_TAKEN));
            }
        }
    }

    let updated = data
        .repo
        .update_profile(user.id, update)
        .await
        .map_err(taken)?
        .ok_or_else(|| ApiError(AppError::not_found("User", user.id)))?;
    Ok(HttpResponse::Ok().json(updated))
}

/// `PUT /api/users/profile/`
pub async fn put_profile(
    data: web::Data<AppState>,
    user: AuthUser,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    save_profile(&data, user.0, payload, Mode::Create).await
}

/// `PATCH /api/users/profile/`
pub async fn patch_profile(
    data: web::Data<AppState>,
    user: AuthUser,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    save_profile(&data, user.0, payload, Mode::Partial).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_errors(err: ApiError) -> FieldErrors {
        match err.0 {
            AppError::ValidationError(errors) => errors,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn unique_clashes_become_field_errors() {
        let err = taken(UniqueViolation { field: "email".into() }.into());
        assert_eq!(field_errors(err), FieldErrors::single("email", EMAIL_TAKEN));

        let err = taken(UniqueViolation { field: "username".into() }.into());
        assert_eq!(field_errors(err), FieldErrors::single("username", USERNAME_TAKEN));
    }

    #[test]
    fn other_repository_failures_stay_internal() {
        let err = taken(anyhow::anyhow!("disk I/O error"));
        assert!(matches!(err.0, AppError::Internal(_)));
    }
}
