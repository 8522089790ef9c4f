//! Configuration loading for MargaNav

use crate::error::{NavError, Result};
use crate::route::TrackerConfig;
use marga_map::{FacilityLayout, GridConfig, PathfinderConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub pathfinder: PathfinderConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,

    /// TOML facility description; the built-in layout when absent
    #[serde(default)]
    pub facility_path: Option<PathBuf>,
}

/// Waypoint server settings
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port number (default: 9999)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bytes requested per socket read (default: 1024)
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,

    /// Largest JSON object accepted, in bytes (default: 65536)
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// How waypoints become a route
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Straight legs from the entrance through each waypoint
    #[default]
    Direct,
    /// Grid-planned legs around blocked cells
    Grid,
}

/// Route building settings
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            read_buffer: default_read_buffer(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9999
}
fn default_read_buffer() -> usize {
    1024
}
fn default_max_frame_len() -> usize {
    64 * 1024
}

impl ServerConfig {
    /// Full listen address
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.read_buffer == 0 {
            return Err(NavError::Config("server.read_buffer must be > 0".into()));
        }
        if self.server.max_frame_len == 0 {
            return Err(NavError::Config("server.max_frame_len must be > 0".into()));
        }
        let upm = self.tracker.units_per_meter;
        if !upm.is_finite() || upm <= 0.0 {
            return Err(NavError::Config(
                "tracker.units_per_meter must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Facility layout named by `facility_path`, or the built-in one.
    ///
    /// A relative path is resolved against `base_dir` (normally the config
    /// file's directory).
    pub fn load_facility(&self, base_dir: Option<&Path>) -> Result<FacilityLayout> {
        let Some(path) = &self.facility_path else {
            return Ok(FacilityLayout::standard());
        };

        let path = match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.clone(),
        };
        let content = std::fs::read_to_string(&path).map_err(|e| {
            NavError::Config(format!("Failed to read facility file {:?}: {}", path, e))
        })?;
        let layout: FacilityLayout = toml::from_str(&content)?;
        layout.validate()?;
        Ok(layout)
    }
}
