//! TOML configuration: decoding limits and extra registry types.
//!
//! ```toml
//! [limits]
//! max_depth = 32
//! max_encoded_bytes = 1048576
//!
//! [[aggregation_types]]
//! name = "geotile_grid"
//!
//! [[pipeline_types]]
//! name = "moving_avg"
//! paths = { exactly = 1 }
//! placement = "sequential_parent"
//! ```

use crate::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENCODED_BYTES,
    registry::{AggregationTraits, RegistryError, TypeRegistry},
    request::RequestParser,
    validate::{PathArity, PipelineRules, Placement},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;
use tracing::debug;

///
/// ConfigError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("failed to read config [{path}]: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config: {reason}")]
    Parse { reason: String },

    #[error("config limit [{field}] must be greater than zero")]
    InvalidLimit { field: &'static str },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub limits: Limits,

    #[serde(default)]
    pub aggregation_types: Vec<AggregationTypeConfig>,

    #[serde(default)]
    pub pipeline_types: Vec<PipelineTypeConfig>,
}

impl Config {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        debug!(path = %path.display(), "loaded config");

        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse {
            reason: err.to_string(),
        })?;
        config.limits.check()?;

        Ok(config)
    }

    /// The default registry extended with every configured type.
    pub fn registry(&self) -> Result<TypeRegistry, ConfigError> {
        let mut registry = TypeRegistry::with_defaults();
        self.extend_registry(&mut registry)?;

        Ok(registry)
    }

    /// Register the configured types. A name that is already registered
    /// fails with `DuplicateType`.
    pub fn extend_registry(&self, registry: &mut TypeRegistry) -> Result<(), ConfigError> {
        for entry in &self.aggregation_types {
            let traits = entry.traits();
            registry.register_aggregation(entry.name.as_str(), move |_| Ok(traits))?;
        }

        for entry in &self.pipeline_types {
            let rules = entry.rules();
            registry.register_pipeline(entry.name.as_str(), move |_| Ok(rules))?;
        }
        debug!(
            aggregation_types = self.aggregation_types.len(),
            pipeline_types = self.pipeline_types.len(),
            "extended type registry"
        );

        Ok(())
    }

    /// A request parser bound to `registry` and these limits.
    #[must_use]
    pub const fn request_parser<'a>(&self, registry: &'a TypeRegistry) -> RequestParser<'a> {
        RequestParser::new(registry).with_max_depth(self.limits.max_depth)
    }
}

///
/// Limits
///
/// Bounds applied to untrusted input, parsed or decoded.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub max_depth: usize,
    pub max_encoded_bytes: usize,
}

impl Limits {
    fn check(self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidLimit { field: "max_depth" });
        }
        if self.max_encoded_bytes == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "max_encoded_bytes",
            });
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_encoded_bytes: DEFAULT_MAX_ENCODED_BYTES,
        }
    }
}

///
/// AggregationTypeConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationTypeConfig {
    pub name: String,

    #[serde(default)]
    pub global: bool,

    #[serde(default)]
    pub sequential: bool,

    #[serde(default = "default_concurrent_search")]
    pub concurrent_search: bool,
}

impl AggregationTypeConfig {
    #[must_use]
    pub const fn traits(&self) -> AggregationTraits {
        let mut traits = AggregationTraits::new();
        if self.global {
            traits = traits.global();
        }
        if self.sequential {
            traits = traits.sequential();
        }
        if !self.concurrent_search {
            traits = traits.without_concurrent_search();
        }

        traits
    }
}

const fn default_concurrent_search() -> bool {
    true
}

///
/// PipelineTypeConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineTypeConfig {
    pub name: String,

    #[serde(default = "default_paths")]
    pub paths: PathArity,

    #[serde(default)]
    pub placement: Placement,
}

impl PipelineTypeConfig {
    #[must_use]
    pub const fn rules(&self) -> PipelineRules {
        PipelineRules::new(self.paths, self.placement)
    }
}

const fn default_paths() -> PathArity {
    PathArity::Any
}

///
/// TESTS
///
