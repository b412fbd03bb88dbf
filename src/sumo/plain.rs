use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::Serialize;

/// Default edge speed when the road has no speed record (50 km/h)
pub const DEFAULT_SPEED_MS: f64 = 13.89;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeType {
    Priority,
    TrafficLight,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Priority => "priority",
            NodeType::TrafficLight => "traffic_light",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlainNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub node_type: NodeType,
}

/// One SUMO lane; `index` 0 is the rightmost lane in driving direction
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlainLane {
    pub index: usize,
    pub width: f64,
    /// OpenDRIVE lane id this lane was built from
    pub source_lane: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlainEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub speed: f64,
    pub name: String,
    pub shape: Vec<(f64, f64)>,
    pub lanes: Vec<PlainLane>,
}

impl PlainEdge {
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlainConnection {
    pub from_edge: String,
    pub to_edge: String,
    pub from_lane: usize,
    pub to_lane: usize,
    /// Turning path through the junction, boundaries excluded
    pub via: Vec<(f64, f64)>,
}

/// Node, edge and connection tables for one conversion
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlainNetwork {
    pub nodes: Vec<PlainNode>,
    pub edges: Vec<PlainEdge>,
    pub connections: Vec<PlainConnection>,
}

impl PlainNetwork {
    pub fn node(&self, id: &str) -> Option<&PlainNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&PlainEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn nodes_xml(&self) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = document_writer()?;
        writer.write_event(Event::Start(BytesStart::new("nodes")))?;

        for node in &self.nodes {
            let mut elem = BytesStart::new("node");
            elem.push_attribute(("id", node.id.as_str()));
            elem.push_attribute(("x", format!("{:.2}", node.x).as_str()));
            elem.push_attribute(("y", format!("{:.2}", node.y).as_str()));
            elem.push_attribute(("type", node.node_type.as_str()));
            writer.write_event(Event::Empty(elem))?;
        }

        writer.write_event(Event::End(BytesEnd::new("nodes")))?;
        Ok(writer.into_inner())
    }

    pub fn edges_xml(&self) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = document_writer()?;
        writer.write_event(Event::Start(BytesStart::new("edges")))?;

        for edge in &self.edges {
            let mut elem = BytesStart::new("edge");
            elem.push_attribute(("id", edge.id.as_str()));
            elem.push_attribute(("from", edge.from.as_str()));
            elem.push_attribute(("to", edge.to.as_str()));
            elem.push_attribute(("numLanes", edge.num_lanes().to_string().as_str()));
            elem.push_attribute(("speed", format!("{:.2}", edge.speed).as_str()));
            if !edge.name.is_empty() {
                elem.push_attribute(("name", edge.name.as_str()));
            }
            if edge.shape.len() >= 2 {
                elem.push_attribute(("shape", format_points(&edge.shape).as_str()));
            }

            if edge.lanes.is_empty() {
                writer.write_event(Event::Empty(elem))?;
                continue;
            }

            writer.write_event(Event::Start(elem))?;
            for lane in &edge.lanes {
                let mut lane_elem = BytesStart::new("lane");
                lane_elem.push_attribute(("index", lane.index.to_string().as_str()));
                lane_elem.push_attribute(("width", format!("{:.2}", lane.width).as_str()));
                writer.write_event(Event::Empty(lane_elem))?;
            }
            writer.write_event(Event::End(BytesEnd::new("edge")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("edges")))?;
        Ok(writer.into_inner())
    }

    pub fn connections_xml(&self) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = document_writer()?;
        writer.write_event(Event::Start(BytesStart::new("connections")))?;

        for conn in &self.connections {
            let mut elem = BytesStart::new("connection");
            elem.push_attribute(("from", conn.from_edge.as_str()));
            elem.push_attribute(("to", conn.to_edge.as_str()));
            elem.push_attribute(("fromLane", conn.from_lane.to_string().as_str()));
            elem.push_attribute(("toLane", conn.to_lane.to_string().as_str()));
            if !conn.via.is_empty() {
                elem.push_attribute(("via", format_points(&conn.via).as_str()));
            }
            writer.write_event(Event::Empty(elem))?;
        }

        writer.write_event(Event::End(BytesEnd::new("connections")))?;
        Ok(writer.into_inner())
    }
}

fn document_writer() -> Result<Writer<Vec<u8>>, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

/// `x,y` pairs separated by spaces, centimetre precision
fn format_points(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{:.2},{:.2}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
}
