use crate::chunking::ChunkingConfig;
use crate::embeddings::{OpenAiSettings, DEFAULT_EMBEDDING_DIMENSIONS};
use crate::error::ConfigError;
use crate::records::{DEFAULT_EXCERPT_MAX_BYTES, DEFAULT_METADATA_MAX_BYTES, TRUNCATION_MARKER};
use crate::stores::PineconeSettings;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "Default";
pub const DEFAULT_BATCH_SIZE: usize = 4;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Credentials and endpoints for the two external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub openai: OpenAiSettings,
    pub pinecone: PineconeSettings,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);
        let openai_api_key = env.required("OPENAI_API_KEY");
        let pinecone = pinecone_settings(&mut env);
        env.finish()?;

        let mut openai = OpenAiSettings::new(openai_api_key);
        if let Some(base_url) = env.optional("OPENAI_BASE_URL") {
            openai.base_url = base_url;
        }
        if let Some(model) = env.optional("OPENAI_EMBEDDING_MODEL") {
            openai.model = model;
        }
        openai.dimensions = embedding_dimensions(&env)?;

        Ok(Self { openai, pinecone })
    }
}

impl PineconeSettings {
    /// Index credentials alone, for commands that never embed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut env = EnvReader::new(|key: &str| std::env::var(key).ok());
        let settings = pinecone_settings(&mut env);
        env.finish()?;
        Ok(settings)
    }
}

/// `EMBEDDING_DIMENSIONS`, defaulting to the `text-embedding-3-large` size.
pub fn embedding_dimensions_from_env() -> Result<usize, ConfigError> {
    embedding_dimensions(&EnvReader::new(|key: &str| std::env::var(key).ok()))
}

fn pinecone_settings<F>(env: &mut EnvReader<F>) -> PineconeSettings
where
    F: Fn(&str) -> Option<String>,
{
    PineconeSettings {
        api_key: env.required("PINECONE_API_KEY"),
        host: env.required("PINECONE_INDEX_HOST"),
    }
}

fn embedding_dimensions<F>(env: &EnvReader<F>) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env.optional("EMBEDDING_DIMENSIONS") {
        Some(raw) => parse_positive("EMBEDDING_DIMENSIONS", &raw),
        None => Ok(DEFAULT_EMBEDDING_DIMENSIONS),
    }
}

/// Collects every missing required key so they can be reported together.
struct EnvReader<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn finish(&mut self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVariables(std::mem::take(&mut self.missing)))
        }
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        Ok(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            details: "must be greater than zero".to_string(),
        }),
        Err(error) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            details: error.to_string(),
        }),
    }
}

/// Tunables for one upload run.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub namespace: String,
    pub batch_size: usize,
    pub chunking: ChunkingConfig,
    pub excerpt_max_bytes: usize,
    pub metadata_max_bytes: usize,
    /// Courtesy pause between successful batch submissions.
    pub batch_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            chunking: ChunkingConfig::default(),
            excerpt_max_bytes: DEFAULT_EXCERPT_MAX_BYTES,
            metadata_max_bytes: DEFAULT_METADATA_MAX_BYTES,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than zero"));
        }
        if self.excerpt_max_bytes <= TRUNCATION_MARKER.len() {
            return Err(invalid(
                "excerpt_max_bytes",
                "must leave room for the truncation marker",
            ));
        }
        if self.metadata_max_bytes < self.excerpt_max_bytes {
            return Err(invalid(
                "metadata_max_bytes",
                "must be at least excerpt_max_bytes",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, details: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        details: details.to_string(),
    }
}
