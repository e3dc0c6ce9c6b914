use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::triples::geocode::DEFAULT_GEOCODER_URL;
use crate::triples::DeterministicIds;
use crate::vocabulary::DEFAULT_NAMESPACE;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// One source table and the template that maps it.
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
pub struct FileJob {
    #[serde(alias = "FILE")]
    #[validate(length(min = 1, message = "Input file path cannot be empty"))]
    pub file: String,

    #[serde(alias = "SPEC")]
    #[validate(length(min = 1, message = "Template spec path cannot be empty"))]
    pub spec: String,
}

/// Run configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tables to convert, in order
    #[serde(alias = "FILES")]
    #[validate(length(min = 1, message = "At least one input file is required"), nested)]
    pub files: Vec<FileJob>,

    /// Directory chunk files are written to
    #[serde(alias = "OUTPUTDIR", default = "default_output_dir")]
    #[validate(length(min = 1, message = "Output directory cannot be empty"))]
    pub output_dir: String,

    /// Source rows per output chunk
    #[serde(alias = "CHUNKSIZE", default = "default_chunk_size")]
    #[validate(range(
        min = 1,
        max = 10_000_000,
        message = "Chunk size must be between 1 and 10000000"
    ))]
    pub chunk_size: usize,

    /// Schema document (path or http(s) URL) declaring property ranges
    #[serde(alias = "SCHEMA", default)]
    pub schema: Option<String>,

    #[serde(alias = "DETERMINISTIC_IDS", default)]
    pub deterministic_ids: DeterministicIds,

    /// Namespace bare class and property names are placed in
    #[serde(alias = "NAMESPACE", default = "default_namespace")]
    #[validate(custom(function = "validate_namespace"))]
    pub namespace: String,

    /// Root URL of a Nominatim-compatible geocoding service
    #[serde(alias = "GEOCODER_URL", default = "default_geocoder_url")]
    #[validate(custom(function = "validate_http_url"))]
    pub geocoder_url: String,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_chunk_size() -> usize {
    100_000
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_geocoder_url() -> String {
    DEFAULT_GEOCODER_URL.to_string()
}

fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    if namespace.contains("://") || namespace.starts_with("urn:") {
        Ok(())
    } else {
        Err(ValidationError::new("namespace_not_absolute"))
    }
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("geocoder_url_not_http"))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            output_dir: default_output_dir(),
            chunk_size: default_chunk_size(),
            schema: None,
            deterministic_ids: DeterministicIds::None,
            namespace: default_namespace(),
            geocoder_url: default_geocoder_url(),
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a `.yaml`/`.yml` or `.json` file, apply
    /// environment overrides and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "config_file".to_string(),
            value: path.display().to_string(),
            source: Box::new(e),
        })?;

        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                field: "json_content".to_string(),
                value: path.display().to_string(),
                source: Box::new(e),
            })?,
            _ => serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                field: "yaml_content".to_string(),
                value: path.display().to_string(),
                source: Box::new(e),
            })?,
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `TABLEGRAPH_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(dir) = env_string("TABLEGRAPH_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(size) = parse_env_var("TABLEGRAPH_CHUNK_SIZE")? {
            self.chunk_size = size;
        }
        if let Some(schema) = env_string("TABLEGRAPH_SCHEMA") {
            self.schema = Some(schema);
        }
        if let Some(value) = env_string("TABLEGRAPH_DETERMINISTIC_IDS") {
            self.deterministic_ids = value.parse().map_err(|e: String| ConfigError::Parse {
                field: "TABLEGRAPH_DETERMINISTIC_IDS".to_string(),
                value,
                source: e.into(),
            })?;
        }
        if let Some(namespace) = env_string("TABLEGRAPH_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(url) = env_string("TABLEGRAPH_GEOCODER_URL") {
            self.geocoder_url = url;
        }
        Ok(())
    }

    /// Apply command line overrides, which take precedence over the file
    /// and the environment, then re-validate.
    pub fn merge_cli(&mut self, cli: CliOverrides) -> Result<(), ConfigError> {
        if let Some(dir) = cli.output_dir {
            self.output_dir = dir;
        }
        if let Some(size) = cli.chunk_size {
            self.chunk_size = size;
        }
        if let Some(mode) = cli.deterministic_ids {
            self.deterministic_ids = mode;
        }
        self.validate()?;
        Ok(())
    }
}

/// CLI overrides (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub output_dir: Option<String>,
    pub chunk_size: Option<usize>,
    pub deterministic_ids: Option<DeterministicIds>,
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable when it is set
fn parse_env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(value) = env_string(key) else {
        return Ok(None);
    };
    value.trim().parse().map(Some).map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
