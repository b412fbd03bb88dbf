use std::path::Path;
use thiserror::Error;

/// Conversion error types
///
/// Map-level variants (`EmptyMap`, `InvalidTileSize`, `GridTooLarge`,
/// `Parse`) abort a run.
/// Per-road and per-tile variants are recovered by the caller and recorded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Map contains no usable roads")]
    EmptyMap,

    #[error("Invalid tile size: {0} (must be > 0 meters)")]
    InvalidTileSize(f64),

    #[error("Tile grid of {rows} x {cols} exceeds {limit} tiles; use a larger tile size")]
    GridTooLarge { rows: usize, cols: usize, limit: usize },

    #[error("Geometry sampling failed for road {road_id}: {reason}")]
    GeometrySampling { road_id: String, reason: String },

    #[error("Failed to write tile {tile_id}: {reason}")]
    TileWrite { tile_id: String, reason: String },

    #[error("Conversion failed for tile {tile_id}: {reason}")]
    TileConversion { tile_id: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("netconvert failed: {0}")]
    Netconvert(String),
}

impl ConvertError {
    pub(crate) fn io(path: &Path, error: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.display().to_string(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn sampling(road_id: &str, reason: impl Into<String>) -> Self {
        ConvertError::GeometrySampling {
            road_id: road_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConvertError::InvalidTileSize(-5.0).to_string(),
            "Invalid tile size: -5 (must be > 0 meters)"
        );
        assert_eq!(
            ConvertError::sampling("12", "empty planView").to_string(),
            "Geometry sampling failed for road 12: empty planView"
        );
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = ConvertError::io(
            Path::new("/tmp/missing.xodr"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        match err {
            ConvertError::Io { path, .. } => assert_eq!(path, "/tmp/missing.xodr"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
