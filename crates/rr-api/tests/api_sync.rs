#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{bearer, create_incident, create_user, setup};
use rr_core::models::{IncidentType, Role, SyncStatus};
use serde_json::{json, Value};

#[actix_web::test]
async fn sync_inserts_updates_and_reports_each_item() {
    let ctx = setup().await;
    let user = create_user(&ctx, "amina", Role::Citizen).await;
    let existing = create_incident(&ctx, &user, "Captured offline", IncidentType::General).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!([
            { "title": "New from phone", "description": "Queued while offline", "incident_type": "medical" },
            { "description": "missing title" },
            { "id": existing.id, "title": "Captured offline (edited)" },
        ]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["created"], true);
    assert_eq!(results[0]["incident"]["sync_status"], "synced");
    assert_eq!(results[0]["incident"]["incident_type"], "medical");

    // A failing item does not stop the ones after it.
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["index"], 1);
    assert_eq!(results[1]["errors"]["title"][0], "This field is required.");

    assert_eq!(results[2]["success"], true);
    assert_eq!(results[2]["created"], false);
    assert_eq!(results[2]["id"], existing.id);

    let updated = ctx.state.repo.get_incident(existing.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "Captured offline (edited)");
    assert_eq!(updated.description, "Captured offline description");
    assert_eq!(updated.sync_status, SyncStatus::Synced);
    assert_eq!(ctx.state.repo.count_incidents(&Default::default()).await.unwrap(), 2);
}

#[actix_web::test]
async fn sync_never_touches_someone_elses_incident() {
    let ctx = setup().await;
    let owner = create_user(&ctx, "owner", Role::Citizen).await;
    let intruder = create_user(&ctx, "intruder", Role::Citizen).await;
    let target = create_incident(&ctx, &owner, "Original", IncidentType::Crime).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .insert_header(bearer(&ctx, &intruder))
        .set_json(json!({ "incidents": [{ "id": target.id, "title": "Hijacked" }] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["success"], false);
    assert_eq!(body[0]["errors"], json!({ "id": ["Not found."] }));

    let untouched = ctx.state.repo.get_incident(target.id).await.unwrap().unwrap();
    assert_eq!(untouched.title, "Original");
}

#[actix_web::test]
async fn unknown_ids_are_inserted_as_new_incidents() {
    let ctx = setup().await;
    let user = create_user(&ctx, "amina", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!([{ "id": 9999, "title": "Client id", "description": "Server picks the id" }]))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["success"], true);
    assert_eq!(body[0]["created"], true);
    assert_ne!(body[0]["id"], 9999);
}

#[actix_web::test]
async fn sync_rejects_bodies_that_are_not_lists() {
    let ctx = setup().await;
    let user = create_user(&ctx, "amina", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!({ "title": "single object" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!("text"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/incidents/sync/")
        .set_json(json!([]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
