//! Bulk upsert of incidents captured offline.
//!
//! Each item is written on its own; there is no batch transaction, so a
//! failure midway leaves earlier items committed. The response always
//! carries one result per item.

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::payload::{json_kind, read_json};
use crate::serializers::{IncidentView, MediaUrls};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use rr_core::access::can_access;
use rr_core::error::{AppError, FieldErrors};
use rr_core::models::{Incident, SyncStatus, User};
use rr_core::validation::{payload_id, IncidentDraft, Mode};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SyncResult {
    Saved {
        success: bool,
        id: i64,
        created: bool,
        incident: IncidentView,
    },
    Failed {
        success: bool,
        index: usize,
        errors: Value,
    },
}

enum ItemError {
    Invalid(FieldErrors),
    Failed(AppError),
}

impl From<FieldErrors> for ItemError {
    fn from(errors: FieldErrors) -> Self {
        ItemError::Invalid(errors)
    }
}

impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        ItemError::Failed(AppError::from(err))
    }
}

/// Pulls the item list out of a bare array or `{"incidents": [...]}`.
fn items_of(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("incidents") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ApiError::invalid(
                "incidents",
                format!("Expected a list of items but got type \"{}\".", json_kind(&other)),
            )),
            None => Err(ApiError::invalid("incidents", rr_core::validation::REQUIRED)),
        },
        other => Err(ApiError::invalid(
            "non_field_errors",
            format!("Expected a list of items but got type \"{}\".", json_kind(&other)),
        )),
    }
}

/// Updates the caller's incident named by `id`, or inserts a new one.
async fn upsert(state: &AppState, user: &User, item: Value) -> Result<(Incident, bool), ItemError> {
    let fields = match item {
        Value::Object(fields) => fields,
        other => {
            return Err(FieldErrors::single(
                "non_field_errors",
                format!("Invalid data. Expected a dictionary, but got {}.", json_kind(&other)),
            )
            .into())
        }
    };

    let existing = match payload_id(&fields)? {
        Some(id) => state.repo.get_incident(id).await?,
        None => None,
    };

    match existing {
        Some(mut incident) => {
            if !can_access(user, &incident) {
                return Err(FieldErrors::single("id", "Not found.").into());
            }
            let draft = IncidentDraft::parse(&fields, Mode::Partial)?;
            draft.apply(&mut incident);
            incident.sync_status = SyncStatus::Synced;
            Ok((state.repo.update_incident(&incident).await?, false))
        }
        None => {
            let draft = IncidentDraft::parse(&fields, Mode::Create)?;
            let mut new = draft.into_new(user.id);
            new.sync_status = SyncStatus::Synced;
            Ok((state.repo.create_incident(new).await?, true))
        }
    }
}

/// `POST /api/incidents/sync/`
pub async fn sync(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let items = items_of(read_json(payload).await?)?;
    let urls = MediaUrls::new(&req, data.store.as_ref());

    let mut results = Vec::with_capacity(items.len());
    let (mut created, mut updated, mut failed) = (0, 0, 0);
    for (index, item) in items.into_iter().enumerate() {
        let result = match upsert(&data, &user.0, item).await {
            Ok((incident, was_created)) => {
                if was_created {
                    created += 1;
                } else {
                    updated += 1;
                }
                SyncResult::Saved {
                    success: true,
                    id: incident.id,
                    created: was_created,
                    incident: IncidentView::new(&incident, &urls),
                }
            }
            Err(ItemError::Invalid(errors)) => {
                failed += 1;
                SyncResult::Failed {
                    success: false,
                    index,
                    errors: serde_json::to_value(&errors).unwrap_or(Value::Null),
                }
            }
            Err(ItemError::Failed(err)) => {
                log::error!("Sync item {} for user {} failed: {}", index, user.0.id, err);
                failed += 1;
                SyncResult::Failed {
                    success: false,
                    index,
                    errors: serde_json::json!({ "non_field_errors": ["A server error occurred."] }),
                }
            }
        };
        results.push(result);
    }

    log::info!(
        "Sync for user {}: {} created, {} updated, {} failed",
        user.0.id,
        created,
        updated,
        failed
    );
    Ok(HttpResponse::Ok().json(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bare_lists_and_wrapped_lists() {
        assert_eq!(items_of(json!([{}, {}])).unwrap().len(), 2);
        assert_eq!(items_of(json!({ "incidents": [{}] })).unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_list_bodies() {
        assert!(items_of(json!({ "title": "x" })).is_err());
        assert!(items_of(json!({ "incidents": "nope" })).is_err());
        assert!(items_of(json!(42)).is_err());
    }
}
