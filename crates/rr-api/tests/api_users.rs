#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{bearer, create_user, setup, PASSWORD};
use rr_core::models::Role;
use serde_json::{json, Value};

#[actix_web::test]
async fn register_creates_a_citizen_without_exposing_the_hash() {
    let ctx = setup().await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/users/register/")
        .set_json(json!({
            "username": "amina",
            "email": "amina@example.com",
            "password": PASSWORD,
            "password2": PASSWORD,
            "phone_number": "0551234567",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["username"], "amina");
    assert_eq!(body["role"], "citizen");
    assert_eq!(body["phone_number"], "0551234567");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("token").is_none());
}

#[actix_web::test]
async fn register_reports_every_problem_at_once() {
    let ctx = setup().await;
    create_user(&ctx, "taken", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/users/register/")
        .set_json(json!({
            "username": "someone",
            "email": "taken@example.com",
            "password": "12345",
            "password2": "54321",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    let password = body["password"].as_array().unwrap();
    assert!(password.contains(&json!("This password is too short. It must contain at least 8 characters.")));
    assert!(password.contains(&json!("This password is entirely numeric.")));
    assert!(body.get("email").is_none(), "uniqueness is checked only for valid input");

    let req = test::TestRequest::post()
        .uri("/api/users/register/")
        .set_json(json!({
            "username": "someone",
            "email": "taken@example.com",
            "password": PASSWORD,
            "password2": PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["email"][0], "user with this email already exists.");
}

#[actix_web::test]
async fn token_pair_is_issued_for_valid_credentials_only() {
    let ctx = setup().await;
    create_user(&ctx, "karim", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/users/token/")
        .set_json(json!({ "username": "karim", "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "No active account found with the given credentials");

    let req = test::TestRequest::post()
        .uri("/api/users/token/")
        .set_json(json!({ "username": "karim", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["username"], "karim");
}

#[actix_web::test]
async fn refresh_tokens_rotate_and_cannot_be_replayed() {
    let ctx = setup().await;
    create_user(&ctx, "lina", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/users/token/")
        .set_json(json!({ "username": "lina", "password": PASSWORD }))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    let refresh = first["refresh"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/users/token/refresh/")
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = test::read_body_json(resp).await;
    assert_ne!(rotated["refresh"], first["refresh"]);

    let req = test::TestRequest::post()
        .uri("/api/users/token/refresh/")
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // An access token is not a refresh token.
    let req = test::TestRequest::post()
        .uri("/api/users/token/refresh/")
        .set_json(json!({ "refresh": first["access"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn profile_requires_a_token_and_keeps_email_read_only() {
    let ctx = setup().await;
    let user = create_user(&ctx, "yacine", Role::Citizen).await;
    create_user(&ctx, "other", Role::Citizen).await;
    let app = init_app!(ctx.state);

    let req = test::TestRequest::get().uri("/api/users/profile/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let req = test::TestRequest::patch()
        .uri("/api/users/profile/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!({ "phone_number": "0770000000", "email": "new@example.com" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["phone_number"], "0770000000");
    assert_eq!(body["email"], "yacine@example.com");
    assert_eq!(body["username"], "yacine");

    let req = test::TestRequest::patch()
        .uri("/api/users/profile/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!({ "username": "other" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/api/users/profile/")
        .insert_header(bearer(&ctx, &user))
        .set_json(json!({ "phone_number": "0660000000" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["username"][0], "This field is required.");
}
