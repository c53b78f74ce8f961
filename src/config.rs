use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "resolvent";

/// Settings for query expansion, read from `resolvent.toml` (or the file
/// given explicitly) and overridden by `RESOLVENT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Bodies instantiated at this depth are kept but not expanded further.
    pub max_depth: usize,
    /// Rule applications allowed in one expansion before it is abandoned.
    pub max_steps: usize,
    /// Default tracing filter for the binary, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_steps: 10_000,
            log_filter: "info".to_owned(),
        }
    }
}

impl ReasonerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(p) => builder.add_source(config::File::from(p)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        let settings = builder
            .add_source(config::Environment::with_prefix("RESOLVENT").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize::<ReasonerConfig>()?)
    }
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}
