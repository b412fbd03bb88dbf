use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

/// Junction attribute value of a road that is not part of any junction
pub const NO_JUNCTION: &str = "-1";

/// Target kind of a road predecessor/successor link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Road,
    Junction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactPoint {
    Start,
    End,
}

/// Predecessor or successor descriptor of a road
#[derive(Clone, Debug, PartialEq)]
pub struct RoadLink {
    pub element_type: ElementType,
    pub element_id: String,
    pub contact_point: Option<ContactPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamRange {
    ArcLength,
    Normalized,
}

/// Reference-line primitive of one planView geometry element
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryKind {
    Line,
    Arc { curvature: f64 },
    Spiral { curv_start: f64, curv_end: f64 },
    Poly3 { a: f64, b: f64, c: f64, d: f64 },
    ParamPoly3 {
        au: f64,
        bu: f64,
        cu: f64,
        du: f64,
        av: f64,
        bv: f64,
        cv: f64,
        dv: f64,
        p_range: ParamRange,
    },
}

/// planView geometry element, starting at station `s`
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub hdg: f64,
    pub length: f64,
    pub kind: GeometryKind,
}

/// Elevation polynomial: a + b*ds + c*ds^2 + d*ds^3
#[derive(Clone, Debug, PartialEq)]
pub struct Elevation {
    pub s: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// Lane of the first lane section (positive id = left, negative = right)
#[derive(Clone, Debug, PartialEq)]
pub struct Lane {
    pub id: i32,
    pub lane_type: String,
    pub width: f64,
    pub predecessor: Option<i32>,
    pub successor: Option<i32>,
}

impl Lane {
    /// Lane types that become SUMO lanes
    pub fn is_drivable(&self) -> bool {
        matches!(
            self.lane_type.as_str(),
            "driving" | "entry" | "exit" | "onRamp" | "offRamp" | "bidirectional"
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub id: String,
    pub name: String,
    pub length: f64,
    /// Junction membership, `NO_JUNCTION` when standalone
    pub junction: String,
    pub predecessor: Option<RoadLink>,
    pub successor: Option<RoadLink>,
    pub plan_view: Vec<Geometry>,
    pub elevation: Vec<Elevation>,
    /// Road type speed limit in m/s
    pub speed_limit: Option<f64>,
    pub left_lanes: Vec<Lane>,
    pub right_lanes: Vec<Lane>,
    /// Byte range of the `<road>` element in the source text
    pub span: Range<usize>,
}

impl Road {
    pub fn junction_id(&self) -> Option<&str> {
        if self.junction.is_empty() || self.junction == NO_JUNCTION {
            None
        } else {
            Some(&self.junction)
        }
    }

    pub fn links(&self) -> impl Iterator<Item = &RoadLink> {
        self.predecessor.iter().chain(self.successor.iter())
    }

    /// IDs of roads this road links to directly (junction links excluded)
    pub fn linked_roads(&self) -> impl Iterator<Item = &str> {
        self.links()
            .filter(|link| link.element_type == ElementType::Road)
            .map(|link| link.element_id.as_str())
    }

    pub fn lane(&self, id: i32) -> Option<&Lane> {
        if id > 0 {
            self.left_lanes.iter().find(|lane| lane.id == id)
        } else {
            self.right_lanes.iter().find(|lane| lane.id == id)
        }
    }
}

/// Lane-to-lane pair inside a junction connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneLink {
    pub from: i32,
    pub to: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: String,
    pub incoming_road: String,
    pub connecting_road: String,
    pub contact_point: ContactPoint,
    pub lane_links: Vec<LaneLink>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Junction {
    pub id: String,
    pub name: String,
    /// Keyed by connection id
    pub connections: BTreeMap<String, Connection>,
    pub controller_ids: Vec<String>,
    pub span: Range<usize>,
}

impl Junction {
    /// Incoming and connecting roads of every connection
    pub fn member_roads(&self) -> BTreeSet<&str> {
        self.connections
            .values()
            .flat_map(|conn| [conn.incoming_road.as_str(), conn.connecting_road.as_str()])
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// Root-level signal controller, copied into tiles that reference it
#[derive(Clone, Debug, PartialEq)]
pub struct Controller {
    pub id: String,
    pub span: Range<usize>,
}

/// Parsed OpenDRIVE file
///
/// Keeps the source text so elements can be re-emitted byte-for-byte
/// (see `tiling::writer`). Read-only once parsed.
#[derive(Clone, Debug)]
pub struct OpenDriveDocument {
    pub(crate) source: String,
    /// `<OpenDRIVE ...>` start tag, attributes included
    pub(crate) root_start_tag: Range<usize>,
    pub(crate) header: Option<Range<usize>>,
    /// Root-level geoReference; when nested in the header it travels with it
    pub(crate) geo_reference: Option<Range<usize>>,
    pub(crate) roads: Vec<Road>,
    pub(crate) junctions: Vec<Junction>,
    pub(crate) controllers: Vec<Controller>,
    pub(crate) road_index: HashMap<String, usize>,
    pub(crate) junction_index: HashMap<String, usize>,
}

impl OpenDriveDocument {
    /// Roads in source order
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// Junctions in source order
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn road(&self, id: &str) -> Option<&Road> {
        self.road_index.get(id).map(|&idx| &self.roads[idx])
    }

    pub fn junction(&self, id: &str) -> Option<&Junction> {
        self.junction_index.get(id).map(|&idx| &self.junctions[idx])
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    /// Source text covered by an element span
    pub fn text(&self, span: &Range<usize>) -> &str {
        &self.source[span.clone()]
    }
}
