use crate::{
    env::EnvContext,
    settings::{error::SettingsError, output::OutputSettings},
};
use engine_core::{
    connectors::{format::parse_delimiter, sink::OpenMode},
    pool::{PoolConfig, RejectionPolicy},
};
use model::{pagination::sort::SortKey, records::record::Record};
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr};
use tracing::info;

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_PAGE_SIZE: usize = 10;

const ENV_CHUNK_SIZE: &str = "BATCH_CHUNK_SIZE";
const ENV_PAGE_SIZE: &str = "BATCH_PAGE_SIZE";
const ENV_SORT_KEY: &str = "BATCH_SORT_KEY";
const ENV_POOL_CORE_SIZE: &str = "BATCH_POOL_CORE_SIZE";
const ENV_POOL_MAX_SIZE: &str = "BATCH_POOL_MAX_SIZE";
const ENV_POOL_QUEUE_CAPACITY: &str = "BATCH_POOL_QUEUE_CAPACITY";
const ENV_REJECTION_POLICY: &str = "BATCH_REJECTION_POLICY";
const ENV_OUTPUT_PATH: &str = "BATCH_OUTPUT_PATH";
const ENV_OUTPUT_DELIMITER: &str = "BATCH_OUTPUT_DELIMITER";

/// Parameters of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Records per committed chunk
    pub chunk_size: usize,
    /// Records per backing-store query
    pub page_size: usize,
    /// Ascending key the store is paged by
    pub sort_key: SortKey,
    /// Transform worker pool
    pub pool: PoolConfig,
    /// Output file
    pub output: OutputSettings,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            sort_key: SortKey::Id,
            pool: PoolConfig::default(),
            output: OutputSettings::default(),
        }
    }
}

impl RunSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&json)
    }

    /// Reads the file, applies environment overrides and validates the result.
    pub async fn load(path: impl AsRef<Path>, env: &EnvContext) -> Result<Self, SettingsError> {
        let settings = Self::from_json_file(path).await?.with_env(env)?;
        settings.validate()?;

        info!(
            chunk_size = settings.chunk_size,
            page_size = settings.page_size,
            sort_key = %settings.sort_key,
            output = %settings.output.path.display(),
            "Run settings loaded"
        );
        Ok(settings)
    }

    /// Applies `BATCH_*` environment overrides on top of these settings.
    pub fn with_env(mut self, env: &EnvContext) -> Result<Self, SettingsError> {
        if let Some(v) = parse_override::<usize>(env, ENV_CHUNK_SIZE)? {
            self.chunk_size = v;
        }
        if let Some(v) = parse_override::<usize>(env, ENV_PAGE_SIZE)? {
            self.page_size = v;
        }
        if let Some(v) = parse_override::<SortKey>(env, ENV_SORT_KEY)? {
            self.sort_key = v;
        }
        if let Some(v) = parse_override::<usize>(env, ENV_POOL_CORE_SIZE)? {
            self.pool.core_size = v;
        }
        if let Some(v) = parse_override::<usize>(env, ENV_POOL_MAX_SIZE)? {
            self.pool.max_size = v;
        }
        if let Some(v) = parse_override::<usize>(env, ENV_POOL_QUEUE_CAPACITY)? {
            self.pool.queue_capacity = v;
        }
        if let Some(v) = parse_override::<RejectionPolicy>(env, ENV_REJECTION_POLICY)? {
            self.pool.rejection_policy = v;
        }
        if let Some(v) = env.get(ENV_OUTPUT_PATH) {
            self.output.path = v.into();
        }
        if let Some(v) = env.get(ENV_OUTPUT_DELIMITER) {
            self.output.delimiter = v.to_string();
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(invalid("page_size", "must be at least 1"));
        }
        self.pool.validate()?;

        let output = &self.output;
        if output.path.as_os_str().is_empty() {
            return Err(invalid("output.path", "must not be empty"));
        }
        if parse_delimiter(&output.delimiter).is_err() {
            return Err(invalid(
                "output.delimiter",
                "must be a single ASCII character other than a line break",
            ));
        }
        if output.fields.is_empty() {
            return Err(invalid("output.fields", "at least one field is required"));
        }
        if let Some(field) = output.fields.iter().find(|f| !Record::is_known_field(f)) {
            return Err(invalid("output.fields", format!("unknown field '{field}'")));
        }
        Ok(())
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn with_sort_key(mut self, key: SortKey) -> Self {
        self.sort_key = key;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output.path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.output.delimiter = delimiter.into();
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_open_mode(mut self, mode: OpenMode) -> Self {
        self.output.mode = mode;
        self
    }
}

fn invalid(setting: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        setting,
        reason: reason.into(),
    }
}

fn parse_override<T>(env: &EnvContext, key: &str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env.get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| SettingsError::InvalidOverride {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
