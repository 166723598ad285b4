//! Mapper selection loaded from a TOML file.
//!
//! ```toml
//! mappers = ["array-init", "textual-quantifiers"]
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::err_msg;
use crate::errors::MapperError;
use crate::mappers::{array_init, hidden_processes, quantifiers};

/// Looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "uppaal-mapper.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Mapper ids in pipeline order.
    pub mappers: Vec<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            mappers: vec![
                array_init::ID.to_string(),
                quantifiers::ID.to_string(),
                hidden_processes::ID.to_string(),
            ],
        }
    }
}

impl MapperConfig {
    pub fn from_toml(text: &str) -> Result<Self, MapperError> {
        toml::from_str(text).map_err(|e| err_msg!(Config, "invalid configuration: {}", e.message()))
    }

    /// # Errors
    /// `MapperError::Config` if the file is missing or not a valid
    /// configuration.
    pub fn load(path: &Path) -> Result<Self, MapperError> {
        if !path.exists() {
            return Err(err_msg!(Config, "configuration file {} does not exist", path.display()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            MapperError::Config { message, ctx } => MapperError::Config {
                message: format!("{}: {message}", path.display()),
                ctx,
            },
            other => other,
        })
    }
}

/// Loads `path` if given, else [`CONFIG_FILE_NAME`] from the working
/// directory if present, else the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MapperConfig, MapperError> {
    if let Some(path) = path {
        return MapperConfig::load(path);
    }
    let local = Path::new(CONFIG_FILE_NAME);
    if local.is_file() {
        debug!(path:? = local; "Using configuration from working directory");
        return MapperConfig::load(local);
    }
    Ok(MapperConfig::default())
}
