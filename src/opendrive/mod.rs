pub mod geometry;
pub mod model;
pub mod parser;

pub use geometry::{road_bounding_rect, sample_road, RoadPoint};
pub use model::{
    Connection, ContactPoint, ElementType, Geometry, GeometryKind, Junction, Lane, LaneLink,
    OpenDriveDocument, Road, RoadLink, NO_JUNCTION,
};
