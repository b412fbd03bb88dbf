//! Tiled OpenDRIVE to SUMO Plain-XML conversion
//!
//! A large `.xodr` map is cut into a square grid, each non-empty tile is
//! written as a standalone OpenDRIVE subset, and every subset is converted
//! to SUMO node/edge/connection files (optionally compiled by netconvert).

pub mod config;
pub mod error;
pub mod opendrive;
pub mod sumo;
pub mod tiling;

#[cfg(test)]
mod test_support;

pub use config::{NetconvertConfig, SamplingConfig, TilingConfig, DEFAULT_TILE_SIZE_M};
pub use error::{ConvertError, Result};
pub use opendrive::OpenDriveDocument;
pub use sumo::{ConversionOutputs, PlainXmlConverter, TileConverter};
pub use tiling::{convert_with_converter, convert_with_tiling, plan_tiles, ConversionReport};
