//! # rr-api
//!
//! The web routing and orchestration layer for Rusty-Report: the JSON API
//! used by the mobile client and the staff panel.

pub mod admin;
pub mod error;
pub mod extract;
pub mod flash;
pub mod handlers;
pub mod middleware;
pub mod payload;
pub mod serializers;
pub mod state;
pub mod sync;

pub use state::AppState;

use actix_web::web;
use handlers::{incidents, stats, users};

/// Configures every route. The binary adds `/media` file serving and the
/// middleware stack around this.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/users")
                    .route("/register/", web::post().to(users::register))
                    .route("/token/", web::post().to(users::obtain_token))
                    .route("/token/refresh/", web::post().to(users::refresh_token))
                    .service(
                        web::resource("/profile/")
                            .route(web::get().to(users::get_profile))
                            .route(web::put().to(users::put_profile))
                            .route(web::patch().to(users::patch_profile)),
                    ),
            )
            .service(
                web::scope("/incidents")
                    .service(
                        web::resource("/")
                            .route(web::get().to(incidents::list))
                            .route(web::post().to(incidents::create)),
                    )
                    .route("/sync/", web::post().to(sync::sync))
                    .route("/statistics/", web::get().to(stats::statistics))
                    .route("/user-dashboard/", web::get().to(stats::user_dashboard))
                    .service(
                        web::resource("/{id:\\d+}/")
                            .route(web::get().to(incidents::retrieve))
                            .route(web::put().to(incidents::update))
                            .route(web::patch().to(incidents::partial_update))
                            .route(web::delete().to(incidents::destroy)),
                    )
                    .route("/{id:\\d+}/media/", web::post().to(incidents::upload_media)),
            ),
    )
    .service(
        web::scope("/accounts")
            .service(
                web::resource("/login/")
                    .route(web::get().to(admin::login_form))
                    .route(web::post().to(admin::login)),
            )
            .route("/logout/", web::post().to(admin::logout)),
    )
    .route("/", web::get().to(admin::dashboard))
    .service(
        web::scope("/admin-panel")
            .route("/", web::get().to(admin::dashboard))
            .route("/incidents/", web::get().to(admin::incident_list))
            .service(
                web::resource("/incidents/create/")
                    .route(web::get().to(admin::incident_create_form))
                    .route(web::post().to(admin::incident_create)),
            )
            .route("/incidents/{id:\\d+}/", web::get().to(admin::incident_detail))
            .service(
                web::resource("/incidents/{id:\\d+}/edit/")
                    .route(web::get().to(admin::incident_edit_form))
                    .route(web::post().to(admin::incident_edit)),
            )
            .route("/incidents/{id:\\d+}/resolve/", web::post().to(admin::incident_resolve))
            .route("/incidents/{id:\\d+}/status/", web::post().to(admin::incident_set_status))
            .route("/incidents/{id:\\d+}/delete/", web::post().to(admin::incident_delete))
            .route("/incidents/{id:\\d+}/media/", web::post().to(admin::incident_add_media))
            .route("/users/", web::get().to(admin::user_list))
            .route("/users/{id:\\d+}/delete/", web::post().to(admin::user_delete)),
    );
}
