use evalhub_auth::AuthConfig;
use evalhub_core::{HierarchyConfig, HierarchyDeclaration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Session settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Resource hierarchy, join registry and soft-delete set
    #[serde(default)]
    pub hierarchy: HierarchyDeclaration,
    /// Seed data created at startup
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        self.hierarchy_config()
            .map_err(|e| format!("hierarchy config error: {e}"))?;
        if let Some(seed) = &self.bootstrap.institution {
            seed.validate()?;
        }
        Ok(())
    }

    /// Builds the validated hierarchy from the `[hierarchy]` section.
    pub fn hierarchy_config(&self) -> Result<HierarchyConfig, evalhub_core::HierarchyError> {
        HierarchyConfig::from_declaration(&self.hierarchy)
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Institution (with its first instructor) created on startup if absent
    #[serde(default)]
    pub institution: Option<SeedInstitution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedInstitution {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructor: Option<SeedInstructor>,
}

impl SeedInstitution {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("bootstrap.institution.name must not be empty".into());
        }
        if let Some(instructor) = &self.instructor {
            if instructor.email.trim().is_empty() || instructor.password.is_empty() {
                return Err(
                    "bootstrap.institution.instructor requires email and password".into(),
                );
            }
        }
        Ok(())
    }
}

/// For security, prefer `EVALHUB__BOOTSTRAP__INSTITUTION__INSTRUCTOR__PASSWORD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedInstructor {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "evalhub.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., EVALHUB__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("EVALHUB")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
