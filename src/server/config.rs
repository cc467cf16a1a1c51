//! Configuration loading for muninnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.muninn/secrets.toml` (user, must be 0600)
//! 2. `/etc/muninn/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::cache::CachePolicy;
use crate::model::GenerationConfig;
use crate::store::{KeyValueStore, MemoryStore};
use crate::types::Operation;
use crate::{MuninnError, Result};

/// Environment variable consulted when no access token is in the secrets file.
pub const ACCESS_TOKEN_ENV_VAR: &str = "VERTEX_ACCESS_TOKEN";

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CachePolicy,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8080).
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

/// Resource limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent requests (default: 100).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Request timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_concurrent() -> usize {
    100
}

fn default_timeout() -> u64 {
    60
}

/// Vertex AI model settings, shared by both operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub project_id: String,
    pub location: String,
    pub model_name: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Endpoint override (default: `https://{location}-aiplatform.googleapis.com`).
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Decoding parameters with unset fields at their defaults.
    pub fn generation(&self) -> GenerationConfig {
        let mut generation = GenerationConfig::default();
        if let Some(t) = self.temperature {
            generation = generation.temperature(t);
        }
        if let Some(p) = self.top_p {
            generation = generation.top_p(p);
        }
        if let Some(n) = self.max_output_tokens {
            generation = generation.max_output_tokens(n);
        }
        generation
    }
}

/// Prompt template files, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding the templates (default: `prompts`).
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
    /// Default: `profile.txt`.
    #[serde(default = "default_profile_file")]
    pub profile_file: String,
    /// Default: `tags.txt`.
    #[serde(default = "default_tags_file")]
    pub tags_file: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
            profile_file: default_profile_file(),
            tags_file: default_tags_file(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_profile_file() -> String {
    "profile.txt".to_string()
}

fn default_tags_file() -> String {
    "tags.txt".to_string()
}

impl PromptsConfig {
    pub fn path_for(&self, operation: Operation) -> PathBuf {
        match operation {
            Operation::Profile => self.dir.join(&self.profile_file),
            Operation::Tags => self.dir.join(&self.tags_file),
        }
    }

    /// Read the template used for `operation`.
    pub fn template(&self, operation: Operation) -> Result<String> {
        let path = self.path_for(operation);
        fs::read_to_string(&path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read prompt template {path:?}: {e}"))
        })
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
    Memory {
        #[serde(default)]
        max_entries: Option<u64>,
    },
    Redis {
        url: String,
        #[serde(default)]
        key_prefix: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("muninn.db")
}

impl StorageConfig {
    /// Open the configured backend.
    ///
    /// Fails with a configuration error when the backend's cargo feature is
    /// not compiled in.
    pub fn open(&self) -> Result<Arc<dyn KeyValueStore>> {
        match self {
            StorageConfig::Memory { max_entries } => Ok(Arc::new(match max_entries {
                Some(n) => MemoryStore::with_max_entries(*n),
                None => MemoryStore::new(),
            })),
            #[cfg(feature = "sqlite")]
            StorageConfig::Sqlite { path } => Ok(Arc::new(crate::store::SqliteStore::open(path)?)),
            #[cfg(not(feature = "sqlite"))]
            StorageConfig::Sqlite { .. } => Err(MuninnError::Configuration(
                "sqlite storage requires the `sqlite` feature".to_string(),
            )),
            #[cfg(feature = "redis")]
            StorageConfig::Redis { url, key_prefix } => Ok(Arc::new(
                crate::store::RedisStore::new(url, key_prefix.clone())?,
            )),
            #[cfg(not(feature = "redis"))]
            StorageConfig::Redis { .. } => Err(MuninnError::Configuration(
                "redis storage requires the `redis` feature".to_string(),
            )),
        }
    }
}

/// Secrets configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub vertex: Option<VertexSecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VertexSecret {
    pub access_token: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MuninnError::Configuration(
            "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                .to_string(),
        ))
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the token may come from
    /// [`ACCESS_TOKEN_ENV_VAR`]).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".muninn").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/muninn/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // group or other bits set
        if mode & 0o077 != 0 {
            return Err(MuninnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Vertex access token, falling back to [`ACCESS_TOKEN_ENV_VAR`].
    pub fn access_token(&self) -> Option<String> {
        self.vertex
            .as_ref()
            .map(|v| v.access_token.clone())
            .or_else(|| std::env::var(ACCESS_TOKEN_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ConflictPolicy, WriteFailurePolicy};

    const MINIMAL: &str = r#"
        [model]
        project_id = "proj"
        location = "us-central1"
        model_name = "gemini-1.5-pro"
    "#;

    #[test]
    fn parse_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:8080");
        assert_eq!(config.server.limits.max_concurrent_requests, 100);
        assert_eq!(config.server.limits.request_timeout_secs, 60);
        assert_eq!(config.cache, CachePolicy::default());
        assert_eq!(config.batch.max_concurrency, 16);
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("muninn.db")
            }
        );
        assert_eq!(config.model.generation(), GenerationConfig::default());
    }

    #[test]
    fn model_section_is_required() {
        let result: std::result::Result<Config, _> = toml::from_str("[server]\n");
        assert!(result.is_err());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:9000"

            [server.limits]
            max_concurrent_requests = 10
            request_timeout_secs = 5

            [model]
            project_id = "proj"
            location = "europe-west4"
            model_name = "gemini-1.5-flash"
            temperature = 0.2
            max_output_tokens = 500
            base_url = "http://localhost:1234"

            [prompts]
            dir = "/opt/muninn/prompts"
            tags_file = "tagging.txt"

            [storage]
            backend = "memory"
            max_entries = 1000

            [cache]
            on_conflict = "reject"
            on_write_failure = "best_effort"

            [batch]
            max_concurrency = 4
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.limits.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.model.base_url.as_deref(), Some("http://localhost:1234"));
        let generation = config.model.generation();
        assert_eq!(generation.temperature, 0.2);
        assert_eq!(generation.top_p, 0.95);
        assert_eq!(generation.max_output_tokens, 500);
        assert_eq!(
            config.prompts.path_for(Operation::Profile),
            PathBuf::from("/opt/muninn/prompts/profile.txt")
        );
        assert_eq!(
            config.prompts.path_for(Operation::Tags),
            PathBuf::from("/opt/muninn/prompts/tagging.txt")
        );
        assert_eq!(
            config.storage,
            StorageConfig::Memory {
                max_entries: Some(1000)
            }
        );
        assert_eq!(config.cache.on_conflict, ConflictPolicy::Reject);
        assert_eq!(config.cache.on_write_failure, WriteFailurePolicy::BestEffort);
        assert_eq!(config.batch.max_concurrency, 4);
    }

    #[test]
    fn parse_redis_storage() {
        let toml = format!(
            "{MINIMAL}\n[storage]\nbackend = \"redis\"\nurl = \"redis://127.0.0.1/\"\n"
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Redis {
                url: "redis://127.0.0.1/".to_string(),
                key_prefix: None
            }
        );
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [vertex]
            access_token = "ya29.test"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.access_token(), Some("ya29.test".to_string()));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn memory_storage_opens() {
        let store = StorageConfig::Memory { max_entries: None }.open().unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[vertex]\naccess_token = \"x\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(Secrets::check_permissions(&path).is_err());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(Secrets::check_permissions(&path).is_ok());
    }
}
