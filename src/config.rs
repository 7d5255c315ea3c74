use std::{env, path::PathBuf, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub permission_cache_ttl: Duration,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let session_secret = env::var("SESSION_SECRET").context("SESSION_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT").unwrap_or(3000);
        let session_ttl_hours = parse_var("SESSION_TTL_HOURS").unwrap_or(24);
        let cookie_secure = parse_var("COOKIE_SECURE").unwrap_or(false);
        let permission_cache_ttl =
            Duration::from_secs(parse_var("PERMISSION_CACHE_TTL_SECS").unwrap_or(60));
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let upload_max_bytes = parse_var("UPLOAD_MAX_BYTES").unwrap_or(5 * 1024 * 1024);

        Ok(Self {
            database_url,
            host,
            port,
            session_secret,
            session_ttl_hours,
            cookie_secure,
            permission_cache_ttl,
            upload_dir,
            upload_max_bytes,
        })
    }

    /// Defaults for everything except the two secrets; used by tests and tooling.
    pub fn with_defaults(database_url: impl Into<String>, session_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            session_secret: session_secret.into(),
            session_ttl_hours: 24,
            cookie_secure: false,
            permission_cache_ttl: Duration::from_secs(60),
            upload_dir: PathBuf::from("uploads"),
            upload_max_bytes: 5 * 1024 * 1024,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}
