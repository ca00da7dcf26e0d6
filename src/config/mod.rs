// Configuration module entry point
// Loads layered configuration (defaults, optional file, environment)

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, LoggingConfig, PerformanceConfig, ServerConfig};

/// Config file looked up when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "rootserve";

/// Environment variable prefix, e.g. `ROOTSERVE_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "ROOTSERVE";

impl Config {
    /// Load configuration from the specified file path (extension optional).
    /// A missing file is not an error; the defaults serve the current
    /// directory on `0.0.0.0:80`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::load_with_env(config_path, environment())
    }

    fn load_with_env(
        config_path: &str,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(env)
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 80)?
            .set_default("server.root", ".")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.request_timeout", 30)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

/// `ROOTSERVE_` prefix, `__` between nested keys
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let cfg = Config::load_from(missing.to_str().unwrap()).unwrap();

        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 80);
        assert_eq!(cfg.server.root, ".");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.performance.request_timeout, 30);
        assert!(cfg.performance.max_connections.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[server]\nport = 8080\nroot = \"public\"\n\n[logging]\naccess_log = false\n",
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.root, "public");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(!cfg.logging.access_log);
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let vars = config::Map::from([
            ("ROOTSERVE_SERVER__PORT".to_string(), "8081".to_string()),
            ("ROOTSERVE_SERVER__ROOT".to_string(), "/srv/www".to_string()),
            ("ROOTSERVE_LOGGING__ACCESS_LOG".to_string(), "false".to_string()),
        ]);
        let cfg =
            Config::load_with_env(path.to_str().unwrap(), environment().source(Some(vars)))
                .unwrap();

        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.server.root, "/srv/www");
        assert!(!cfg.logging.access_log);
    }

    #[test]
    fn test_double_underscore_prefix_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");

        let vars = config::Map::from([(
            "ROOTSERVE__SERVER__PORT".to_string(),
            "8082".to_string(),
        )]);
        let cfg =
            Config::load_with_env(missing.to_str().unwrap(), environment().source(Some(vars)))
                .unwrap();

        assert_eq!(cfg.server.port, 80);
    }

    #[test]
    fn test_socket_addr() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let mut cfg = Config::load_from(missing.to_str().unwrap()).unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "0.0.0.0:80");

        cfg.server.host = "not a host".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }
}
