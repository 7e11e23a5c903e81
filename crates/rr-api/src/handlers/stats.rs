//! Aggregate endpoints built on grouped repository counts.

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::serializers::{IncidentView, MediaUrls};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use rr_core::access::IncidentScope;
use rr_core::models::{IncidentFilter, IncidentStatus};
use rr_core::stats::{status_counts, type_counts, IncidentStatistics};
use serde_json::json;

const RECENT_LIMIT: i64 = 5;

/// `GET /api/incidents/statistics/`: everything for staff, own incidents otherwise.
pub async fn statistics(data: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let scope = IncidentScope::for_user(&user.0);
    let owner = scope.owner();

    let total = data.repo.count_incidents(&scope.restrict(IncidentFilter::default())).await?;
    let by_status = data.repo.count_by_status(owner).await?;
    let by_type = data.repo.count_by_type(owner).await?;
    let timestamps = data.repo.incident_timestamps(owner).await?;

    Ok(HttpResponse::Ok().json(IncidentStatistics::build(total, &by_status, &by_type, &timestamps)))
}

/// `GET /api/incidents/user-dashboard/`: always the caller's own incidents.
pub async fn user_dashboard(
    data: web::Data<AppState>,
    user: AuthUser,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let owner = Some(user.0.id);
    let by_status = data.repo.count_by_status(owner).await?;
    let by_type = data.repo.count_by_type(owner).await?;
    let recent = data
        .repo
        .list_incidents(&IncidentFilter {
            owner,
            limit: Some(RECENT_LIMIT),
            ..Default::default()
        })
        .await?;

    let count_of = |status: IncidentStatus| {
        by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    };
    let total: i64 = by_status.iter().map(|(_, c)| c).sum();

    let urls = MediaUrls::new(&req, data.store.as_ref());
    let recent: Vec<IncidentView> = recent.iter().map(|i| IncidentView::new(i, &urls)).collect();
    Ok(HttpResponse::Ok().json(json!({
        "total_incidents": total,
        "by_status": status_counts(&by_status),
        "by_type": type_counts(&by_type),
        "pending": count_of(IncidentStatus::Pending),
        "in_progress": count_of(IncidentStatus::InProgress),
        "resolved": count_of(IncidentStatus::Resolved),
        "recent_incidents": recent,
    })))
}
