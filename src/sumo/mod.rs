pub mod converter;
pub mod netconvert;
pub mod plain;

pub use converter::{ConversionOutputs, PlainXmlConverter, TileConverter};
pub use netconvert::{read_net_stats, run_netconvert, NetStats};
pub use plain::{NodeType, PlainConnection, PlainEdge, PlainLane, PlainNetwork, PlainNode};

use std::path::{Path, PathBuf};

/// `{prefix}{suffix}`, e.g. `out/map_tile_0_0` + `.nod.xml`
pub fn prefixed_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}
