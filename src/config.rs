use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default tile edge length: 5 miles in meters
pub const DEFAULT_TILE_SIZE_M: f64 = 8046.72;

/// Reference-line sampling resolution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Minimum stations per geometry element, regardless of its length
    pub min_samples: usize,
    /// One extra station per interval on long elements (meters)
    pub interval_m: f64,
    /// Station spacing for edge shapes and via points (meters)
    pub shape_interval_m: f64,
    /// Stations allowed per geometry element; more marks the road malformed
    pub max_samples: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            min_samples: 10,
            interval_m: 5.0,
            shape_interval_m: 2.0,
            max_samples: 200_000,
        }
    }
}

impl SamplingConfig {
    /// Coarser variant used for edge shapes and via points
    pub fn for_shapes(&self) -> SamplingConfig {
        SamplingConfig {
            min_samples: 3,
            interval_m: self.shape_interval_m,
            shape_interval_m: self.shape_interval_m,
            max_samples: self.max_samples,
        }
    }
}

/// External netconvert invocation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetconvertConfig {
    pub binary: PathBuf,
    pub timeout_secs: u64,
    pub verbose: bool,
}

impl Default for NetconvertConfig {
    fn default() -> Self {
        NetconvertConfig {
            binary: default_netconvert_binary(),
            timeout_secs: 600,
            verbose: false,
        }
    }
}

/// `$SUMO_HOME/bin/netconvert` when SUMO_HOME is set, else rely on PATH
fn default_netconvert_binary() -> PathBuf {
    match std::env::var_os("SUMO_HOME") {
        Some(home) => {
            let candidate = PathBuf::from(home).join("bin").join("netconvert");
            if candidate.exists() {
                candidate
            } else {
                PathBuf::from("netconvert")
            }
        }
        None => PathBuf::from("netconvert"),
    }
}

/// Settings for one tiled conversion run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TilingConfig {
    pub tile_size_m: f64,
    pub run_netconvert: bool,
    pub sampling: SamplingConfig,
    pub netconvert: NetconvertConfig,
}

impl Default for TilingConfig {
    fn default() -> Self {
        TilingConfig {
            tile_size_m: DEFAULT_TILE_SIZE_M,
            run_netconvert: true,
            sampling: SamplingConfig::default(),
            netconvert: NetconvertConfig::default(),
        }
    }
}

impl TilingConfig {
    pub fn with_tile_size(mut self, tile_size_m: f64) -> Self {
        self.tile_size_m = tile_size_m;
        self
    }

    pub fn with_netconvert(mut self, run_netconvert: bool) -> Self {
        self.run_netconvert = run_netconvert;
        self
    }
}
