//! Configuration management for the hook engine server.
//!
//! Configuration is read from an optional YAML file with environment
//! variable expansion, then overridden by individual environment variables.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::OnceLock;

use crate::scripting::sandbox::{DEFAULT_MAX_STACK_SIZE, DEFAULT_MEMORY_LIMIT, MAX_SCRIPT_SIZE};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer token required by the admin API
    #[serde(default)]
    pub admin_key: Option<String>,

    /// Hook engine limits
    #[serde(default)]
    pub hooks: HookEngineConfig,

    /// Providers hooks can be attached to
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// JSON file backing the hook store; in-memory only when unset
    #[serde(default)]
    pub store_path: Option<String>,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Limits applied to every hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEngineConfig {
    /// Budget used when a hook config has no `timeoutMs`
    #[serde(default = "default_hook_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "default_memory_limit")]
    pub memory_limit_bytes: usize,

    #[serde(default = "default_max_stack_size")]
    pub max_stack_size_bytes: usize,

    #[serde(default = "default_max_script_size")]
    pub max_script_size_bytes: usize,
}

impl Default for HookEngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_hook_timeout_ms(),
            memory_limit_bytes: default_memory_limit(),
            max_stack_size_bytes: default_max_stack_size(),
            max_script_size_bytes: default_max_script_size(),
        }
    }
}

/// A provider a hook can be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier, unique within an app
    pub id: String,

    /// Display name exposed to scripts as `context.provider.name`
    #[serde(default)]
    pub name: String,

    /// Logical application owning this provider
    pub app: String,

    /// Base URL for the provider's API
    pub api_base: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    18100
}

fn default_hook_timeout_ms() -> u64 {
    3000
}

fn default_memory_limit() -> usize {
    DEFAULT_MEMORY_LIMIT
}

fn default_max_stack_size() -> usize {
    DEFAULT_MAX_STACK_SIZE
}

fn default_max_script_size() -> usize {
    MAX_SCRIPT_SIZE
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hookgate::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("hookgate.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = serde_yaml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        config.apply_env_overrides();
        config.normalize();
        Ok(config)
    }

    /// Build configuration from defaults and environment variables only.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }

        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(key) = std::env::var("ADMIN_KEY") {
            if !key.is_empty() {
                self.admin_key = Some(key);
            }
        }

        if let Ok(timeout_str) = std::env::var("HOOK_TIMEOUT_MS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                self.hooks.default_timeout_ms = timeout;
            }
        }

        if let Ok(path) = std::env::var("HOOK_STORE_PATH") {
            if !path.is_empty() {
                self.store_path = Some(path);
            }
        }
    }

    fn normalize(&mut self) {
        for provider in &mut self.providers {
            if provider.name.is_empty() {
                provider.name = provider.id.clone();
            }
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\$\{([^}:]+)(?::-?([^}]*))?\}"#).expect("env var pattern is valid")
    })
}

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    env_var_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}
