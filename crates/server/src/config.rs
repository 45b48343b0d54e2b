// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. Individual modules (DB pool, CORS) may still read their own
// env vars — this module covers the core server settings.

use std::net::SocketAddr;

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// JWT signing secret for access tokens.
    pub jwt_secret: String,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `colloquy_server=debug`).
    pub log_filter: String,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `COLLOQUY_SERVER_HOST` | `0.0.0.0` |
    /// | `COLLOQUY_SERVER_PORT` | `8080` |
    /// | `COLLOQUY_SERVER_JWT_SECRET` | dev-only placeholder |
    /// | `COLLOQUY_SERVER_DATABASE_URL` | *(none)* |
    /// | `COLLOQUY_SERVER_CORS_ORIGINS` | *(none — cors.rs uses dev defaults)* |
    /// | `COLLOQUY_SERVER_LOG_FILTER` | `info` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("COLLOQUY_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("COLLOQUY_SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let jwt_secret = env("COLLOQUY_SERVER_JWT_SECRET").unwrap_or_else(|_| {
            "colloquy_local_development_jwt_secret_must_be_32_chars".into()
        });

        let database_url = env("COLLOQUY_SERVER_DATABASE_URL").ok();
        let cors_origins = env("COLLOQUY_SERVER_CORS_ORIGINS").ok();

        let log_filter =
            env("COLLOQUY_SERVER_LOG_FILTER").unwrap_or_else(|_| "info".into());

        Self { listen_addr, jwt_secret, database_url, cors_origins, log_filter }
    }

    /// Returns true when using the development-only JWT secret.
    pub fn is_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == "colloquy_local_development_jwt_secret_must_be_32_chars"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key)
                .map(|v| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = ServerConfig::from_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.listen_addr.ip().to_string(), "0.0.0.0");
        assert!(cfg.is_dev_jwt_secret());
        assert!(cfg.database_url.is_none());
        assert!(cfg.cors_origins.is_none());
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn custom_host_and_port() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_HOST", "127.0.0.1");
        m.insert("COLLOQUY_SERVER_PORT", "3000");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn custom_jwt_secret_is_not_dev() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_JWT_SECRET", "production_secret_at_least_32_chars!!");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert!(!cfg.is_dev_jwt_secret());
        assert_eq!(cfg.jwt_secret, "production_secret_at_least_32_chars!!");
    }

    #[test]
    fn database_url_from_env() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_DATABASE_URL", "postgres://u:p@host/db");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://u:p@host/db"));
    }

    #[test]
    fn cors_origins_from_env() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_CORS_ORIGINS", "https://app.colloquy.dev");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.cors_origins.as_deref(), Some("https://app.colloquy.dev"));
    }

    #[test]
    fn log_filter_override() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_LOG_FILTER", "debug,tower_http=trace");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.log_filter, "debug,tower_http=trace");
    }

    #[test]
    fn invalid_port_uses_default() {
        let mut m = HashMap::new();
        m.insert("COLLOQUY_SERVER_PORT", "not_a_number");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.port(), 8080);
    }
}
