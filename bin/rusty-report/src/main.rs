//! # Rusty-Report Binary
//!
//! The entry point that assembles the application based on compile-time features.

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use rr_api::middleware::{cors_policy, security_headers, standard_middleware};
use rr_api::AppState;
use rr_config::Settings;
use rr_core::models::{NewUser, Role};
use rr_core::traits::{AuthProvider, ReportRepo};
use secrecy::ExposeSecret;

#[cfg(feature = "db-sqlite")]
use rr_db_sqlite::SqliteReportRepo;

#[cfg(feature = "storage-local")]
use rr_storage_local::LocalMediaStore;

#[cfg(feature = "auth-jwt")]
use rr_auth_jwt::JwtAuthProvider;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::load().context("loading settings")?;
    if settings.uses_development_secret() {
        log::warn!("Using the built-in development JWT secret; set RUSTY_REPORT__AUTH__JWT_SECRET in production");
    }

    // 1. Database
    #[cfg(feature = "db-sqlite")]
    let repo = SqliteReportRepo::new(&settings.database.url)
        .await
        .with_context(|| format!("opening database {}", settings.database.url))?;

    // 2. Media storage
    tokio::fs::create_dir_all(&settings.media.root)
        .await
        .with_context(|| format!("creating media root {}", settings.media.root.display()))?;
    #[cfg(feature = "storage-local")]
    let store = LocalMediaStore::new(settings.media.root.clone(), settings.media.url_prefix.clone());

    // 3. Auth
    #[cfg(feature = "auth-jwt")]
    let auth = JwtAuthProvider::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::minutes(settings.auth.access_ttl_minutes),
        chrono::Duration::days(settings.auth.refresh_ttl_days),
    );

    bootstrap_admin(&settings, &repo, &auth).await?;

    let state = web::Data::new(AppState {
        repo: Box::new(repo),
        store: Box::new(store),
        auth: Box::new(auth),
        maps_api_key: settings.maps_api_key.clone().filter(|key| !key.is_empty()),
        secure_cookies: settings.server.secure_cookies,
    });

    let allow_all = settings.cors.allow_all;
    let origins = settings.cors.allowed_origins.clone();
    let media_prefix = settings.media.url_prefix.clone();
    let media_root = settings.media.root.clone();
    let (host, port) = settings.bind_address();

    log::info!("Rusty-Report starting on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_policy(allow_all, &origins))
            .wrap(security_headers())
            .wrap(standard_middleware())
            .service(Files::new(&media_prefix, &media_root))
            .configure(rr_api::configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

/// Creates the configured staff account if it is not there yet.
async fn bootstrap_admin(
    settings: &Settings,
    repo: &dyn ReportRepo,
    auth: &dyn AuthProvider,
) -> anyhow::Result<()> {
    let Some(admin) = settings.admin_bootstrap() else {
        return Ok(());
    };
    if repo.find_user_by_username(admin.username).await?.is_some() {
        log::info!("Admin account {} already exists", admin.username);
        return Ok(());
    }

    let password_hash = auth.hash_password(admin.password.expose_secret())?;
    let user = repo
        .create_user(NewUser {
            username: admin.username.to_string(),
            email: admin.email.to_string(),
            password_hash,
            role: Role::Admin,
            phone_number: String::new(),
            name: None,
        })
        .await?;
    log::info!("Created admin account {} (id {})", user.username, user.id);
    Ok(())
}
