//! Server Configuration
//!
//! This module locates and loads the configuration file for the binary.

use std::path::Path;

use nola_analytics::config::ApplicationConfig;

/// Load configuration from file or environment
///
/// Priority:
/// 1. NOLA_CONFIG environment variable
/// 2. application.toml
/// 3. Default configuration
///
/// Environment overrides (DB_*, REDIS_URL, NOLA_LISTEN_ADDR, RUST_LOG) are
/// applied on top of whichever source was used.
pub fn load_config() -> ApplicationConfig {
    // Check for NOLA_CONFIG environment variable
    if let Ok(path) = std::env::var("NOLA_CONFIG") {
        match ApplicationConfig::load_with_env(&path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from: {}", path);
                return config;
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to load config from {}: {}. Trying defaults.",
                    path, e
                );
            },
        }
    }

    let app_toml_path = Path::new("application.toml");
    if app_toml_path.exists() {
        match ApplicationConfig::load_with_env(app_toml_path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from application.toml");
                return config;
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to parse application.toml: {}. Using defaults.",
                    e
                );
            },
        }
    }

    eprintln!("[config] Using default configuration");
    let mut config = ApplicationConfig::default();
    if let Err(e) = config.apply_env_overrides() {
        eprintln!("[config] Failed to apply environment overrides: {}", e);
    }
    config
}
