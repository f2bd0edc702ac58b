use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::{
    AssistantRequest, ExpiresAfter, FileSearchResources, Tool, ToolResources, VectorStoreRequest,
};
use crate::error::{PlanError, Result};
use crate::poller::PollPolicy;

/// Environment variable consulted when no key is stored in the config file
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL for the assistant service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// How the assistant is configured when created
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// How runs are polled
    #[serde(default)]
    pub poll: PollConfig,
}

/// Fixed configuration submitted when creating the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_instructions")]
    pub instructions: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Name given to the vector store created for each upload
    #[serde(default = "default_name")]
    pub vector_store_name: String,

    /// Days of inactivity before the vector store expires
    #[serde(default = "default_expires_after_days")]
    pub expires_after_days: u32,
}

fn default_name() -> String {
    "ihaveaplan".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo-0125".to_string()
}

fn default_description() -> String {
    "Create a learning plan from your documents.".to_string()
}

fn default_instructions() -> String {
    "You are helpfull assistant that can generate learning plan based on user goals and options."
        .to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_expires_after_days() -> u32 {
    1
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            model: default_model(),
            description: default_description(),
            instructions: default_instructions(),
            temperature: default_temperature(),
            vector_store_name: default_name(),
            expires_after_days: default_expires_after_days(),
        }
    }
}

impl AssistantConfig {
    /// Build the create-assistant request with a single file search tool bound to `vector_store_id`
    pub fn assistant_request(&self, vector_store_id: &str) -> AssistantRequest {
        AssistantRequest {
            model: self.model.clone(),
            description: self.description.clone(),
            instructions: self.instructions.clone(),
            name: self.name.clone(),
            temperature: self.temperature,
            tools: vec![Tool {
                kind: "file_search".to_string(),
            }],
            tool_resources: ToolResources {
                file_search: FileSearchResources {
                    vector_store_ids: vec![vector_store_id.to_string()],
                },
            },
        }
    }

    /// Build the create-vector-store request seeded with one file
    pub fn vector_store_request(&self, file_id: &str) -> VectorStoreRequest {
        VectorStoreRequest {
            name: self.vector_store_name.clone(),
            file_ids: vec![file_id.to_string()],
            expires_after: ExpiresAfter::last_active(self.expires_after_days),
        }
    }
}

/// Run polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between run status checks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Give up after this many status checks. Unset or 0 means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts.filter(|&n| n > 0),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, returning defaults if it doesn't exist
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").map_err(|_| PlanError::Config("HOME not set".into()))?;
        Ok(PathBuf::from(home).join(".config/ihaveaplan/config.toml"))
    }

    /// Get the API key from config or environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .filter(|k| !k.is_empty())
    }
}
