//! # rr-config
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `RUSTY_REPORT__SECTION__KEY` environment variables.

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "RUSTY_REPORT";
const DEFAULT_FILE: &str = "rusty-report.toml";
const DEV_SECRET: &str = "insecure-development-secret";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    pub maps_api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Marks the staff session cookie `Secure`; enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// sqlx connection string, e.g. `sqlite:rusty_report.db`.
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

/// Optional staff account created at startup when it does not exist yet.
#[derive(Debug, Default, Deserialize)]
pub struct AdminSettings {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<SecretString>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CorsSettings {
    #[serde(default)]
    pub allow_all: bool,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Credentials for the bootstrap admin.
pub struct AdminBootstrap<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a SecretString,
}

impl Settings {
    /// Loads `.env`, then the file named by `RUSTY_REPORT_CONFIG`
    /// (default `rusty-report.toml`, optional), then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = std::env::var("RUSTY_REPORT_CONFIG").unwrap_or_else(|_| DEFAULT_FILE.into());
        log::debug!("Reading settings from {} (if present) and the environment", path);
        Self::from_sources(Some(Path::new(&path)), environment())
    }

    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("database.url", "sqlite:rusty_report.db")?
            .set_default("media.root", "./media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("auth.jwt_secret", DEV_SECRET)?
            .set_default("auth.access_ttl_minutes", 1440)?
            .set_default("auth.refresh_ttl_days", 7)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.access_ttl_minutes <= 0 || self.auth.refresh_ttl_days <= 0 {
            return Err(ConfigError::Invalid("token lifetimes must be positive".into()));
        }
        if !self.media.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid("media.url_prefix must start with '/'".into()));
        }
        let admin = &self.admin;
        let given = [admin.username.is_some(), admin.email.is_some(), admin.password.is_some()];
        if given.iter().any(|g| *g) && !given.iter().all(|g| *g) {
            return Err(ConfigError::Invalid(
                "admin.username, admin.email and admin.password must be set together".into(),
            ));
        }
        Ok(())
    }

    pub fn uses_development_secret(&self) -> bool {
        self.auth.jwt_secret.expose_secret() == DEV_SECRET
    }

    pub fn admin_bootstrap(&self) -> Option<AdminBootstrap<'_>> {
        Some(AdminBootstrap {
            username: self.admin.username.as_deref()?,
            email: self.admin.email.as_deref()?,
            password: self.admin.password.as_ref()?,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

/// `RUSTY_REPORT__AUTH__JWT_SECRET` maps to `auth.jwt_secret`.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("cors.allowed_origins")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::from_sources(None, env_from(&[])).unwrap();
        assert_eq!(settings.bind_address(), ("127.0.0.1".to_string(), 8000));
        assert_eq!(settings.auth.access_ttl_minutes, 1440);
        assert_eq!(settings.auth.refresh_ttl_days, 7);
        assert_eq!(settings.media.url_prefix, "/media");
        assert!(settings.uses_development_secret());
        assert!(settings.admin_bootstrap().is_none());
        assert!(!settings.cors.allow_all);
    }

    #[test]
    fn file_then_environment_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "maps_api_key = \"from-file\"\n[server]\nport = 9000\n[auth]\njwt_secret = \"file-secret\"\n",
        )
        .unwrap();

        let env = env_from(&[
            ("RUSTY_REPORT__SERVER__PORT", "9100"),
            ("RUSTY_REPORT__CORS__ALLOWED_ORIGINS", "https://a.test,https://b.test"),
        ]);
        let settings = Settings::from_sources(Some(&path), env).unwrap();

        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.maps_api_key.as_deref(), Some("from-file"));
        assert_eq!(settings.auth.jwt_secret.expose_secret(), "file-secret");
        assert_eq!(settings.cors.allowed_origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn partial_admin_bootstrap_is_rejected() {
        let env = env_from(&[("RUSTY_REPORT__ADMIN__USERNAME", "root")]);
        let err = Settings::from_sources(None, env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let env = env_from(&[
            ("RUSTY_REPORT__ADMIN__USERNAME", "root"),
            ("RUSTY_REPORT__ADMIN__EMAIL", "root@example.com"),
            ("RUSTY_REPORT__ADMIN__PASSWORD", "s3cret-pass"),
        ]);
        let settings = Settings::from_sources(None, env).unwrap();
        let admin = settings.admin_bootstrap().unwrap();
        assert_eq!(admin.username, "root");
        assert_eq!(admin.password.expose_secret(), "s3cret-pass");
    }
}
