use rr_core::traits::{AuthProvider, MediaStore, ReportRepo};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub repo: Box<dyn ReportRepo>,
    pub store: Box<dyn MediaStore>,
    pub auth: Box<dyn AuthProvider>,
    /// Embedded in the dashboard map; empty disables the map script.
    pub maps_api_key: Option<String>,
    /// Adds `Secure` to the staff session cookie.
    pub secure_cookies: bool,
}
