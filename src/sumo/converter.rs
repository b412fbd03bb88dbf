use super::netconvert::{self, read_net_stats, NetStats};
use super::plain::{
    NodeType, PlainConnection, PlainEdge, PlainLane, PlainNetwork, PlainNode, DEFAULT_SPEED_MS,
};
use super::prefixed_path;
use crate::config::{NetconvertConfig, SamplingConfig};
use crate::error::{ConvertError, Result};
use crate::opendrive::geometry::{nominal_end, nominal_start, road_shape};
use crate::opendrive::{
    Connection, ContactPoint, ElementType, Lane, OpenDriveDocument, Road, RoadLink,
};
use geo::Coord;
use log::{debug, info, warn};
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Road endpoints closer than this share one node (meters, per axis)
const NODE_MERGE_M: f64 = 0.01;

/// Single-file OpenDRIVE to SUMO conversion, run once per tile
///
/// Implementations must not carry state from one call to the next; the
/// orchestrator relies on tiles converting independently.
pub trait TileConverter {
    /// Convert `xodr` into `{prefix}.nod.xml`, `{prefix}.edg.xml`,
    /// optionally `{prefix}.con.xml`, and `{prefix}.net.xml` when
    /// `run_netconvert` is set.
    fn convert(&self, xodr: &Path, prefix: &Path, run_netconvert: bool)
        -> Result<ConversionOutputs>;
}

/// Files and element counts produced for one input file
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConversionOutputs {
    pub nodes_file: PathBuf,
    pub edges_file: PathBuf,
    pub connections_file: Option<PathBuf>,
    pub network_file: Option<PathBuf>,
    pub node_count: usize,
    pub edge_count: usize,
    pub connection_count: usize,
    pub net_stats: Option<NetStats>,
}

/// Converter writing SUMO Plain-XML, optionally compiled with netconvert
///
/// # Architecture
/// - Every call parses its input and builds a fresh `ConversionContext`;
///   the converter itself only holds configuration.
/// - Junctions collapse to one node each; normal roads become a forward
///   (`{road}.0`, right lanes) and a backward (`{road}.1`, left lanes) edge.
/// - Junction connections become lane-to-lane connections whose `via`
///   points follow the connecting road.
#[derive(Clone, Debug, Default)]
pub struct PlainXmlConverter {
    pub sampling: SamplingConfig,
    pub netconvert: NetconvertConfig,
}

impl PlainXmlConverter {
    pub fn new(sampling: SamplingConfig, netconvert: NetconvertConfig) -> Self {
        PlainXmlConverter {
            sampling,
            netconvert,
        }
    }

    /// Build the Plain-XML tables for a parsed document
    pub fn build_network(&self, doc: &OpenDriveDocument) -> PlainNetwork {
        ConversionContext::new(doc, self.sampling.for_shapes()).run()
    }
}

impl TileConverter for PlainXmlConverter {
    fn convert(
        &self,
        xodr: &Path,
        prefix: &Path,
        run_netconvert: bool,
    ) -> Result<ConversionOutputs> {
        let doc = OpenDriveDocument::load(xodr)?;
        let network = self.build_network(&doc);
        if network.edges.is_empty() {
            warn!("{}: conversion produced no edges", xodr.display());
        }

        let nodes_file = prefixed_path(prefix, ".nod.xml");
        write_xml(&nodes_file, network.nodes_xml())?;
        let edges_file = prefixed_path(prefix, ".edg.xml");
        write_xml(&edges_file, network.edges_xml())?;

        let connections_file = if network.connections.is_empty() {
            None
        } else {
            let path = prefixed_path(prefix, ".con.xml");
            write_xml(&path, network.connections_xml())?;
            Some(path)
        };

        let (network_file, net_stats) = if run_netconvert {
            let net = netconvert::run_netconvert(
                &self.netconvert,
                prefix,
                connections_file.is_some(),
            )?;
            let stats = match read_net_stats(&net) {
                Ok(stats) => {
                    info!(
                        "Network {}: {} junctions ({} internal), {} edges ({} internal), {} connections",
                        net.display(),
                        stats.junctions,
                        stats.internal_junctions,
                        stats.edges,
                        stats.internal_edges,
                        stats.connections
                    );
                    Some(stats)
                }
                Err(e) => {
                    warn!("Could not summarise {}: {}", net.display(), e);
                    None
                }
            };
            (Some(net), stats)
        } else {
            (None, None)
        };

        Ok(ConversionOutputs {
            nodes_file,
            edges_file,
            connections_file,
            network_file,
            node_count: network.nodes.len(),
            edge_count: network.edges.len(),
            connection_count: network.connections.len(),
            net_stats,
        })
    }
}

fn write_xml(path: &Path, bytes: std::result::Result<Vec<u8>, quick_xml::Error>) -> Result<()> {
    let bytes = bytes.map_err(|e| ConvertError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, bytes).map_err(|e| ConvertError::io(path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Junction id of a link that targets a junction
fn junction_link(link: Option<&RoadLink>) -> Option<&str> {
    link.filter(|l| l.element_type == ElementType::Junction)
        .map(|l| l.element_id.as_str())
}

/// Mutable state of one conversion; dropped when the network is returned
struct ConversionContext<'a> {
    doc: &'a OpenDriveDocument,
    shape_config: SamplingConfig,
    /// Roads named as `connectingRoad` by any junction connection
    connecting_roads: HashSet<&'a str>,
    network: PlainNetwork,
    junction_nodes: HashMap<String, String>,
    /// Non-junction endpoint nodes keyed by position, data is the index
    /// into `network.nodes`
    endpoint_nodes: RTree<GeomWithData<[f64; 2], usize>>,
    /// Edge id -> index into `network.edges`
    edge_index: HashMap<String, usize>,
    /// (road id, OpenDRIVE lane id) -> (edge id, SUMO lane index)
    lane_map: HashMap<(&'a str, i32), (String, usize)>,
}

impl<'a> ConversionContext<'a> {
    fn new(doc: &'a OpenDriveDocument, shape_config: SamplingConfig) -> Self {
        let connecting_roads = doc
            .junctions()
            .iter()
            .flat_map(|j| j.connections.values())
            .map(|c| c.connecting_road.as_str())
            .collect();

        ConversionContext {
            doc,
            shape_config,
            connecting_roads,
            network: PlainNetwork::default(),
            junction_nodes: HashMap::new(),
            endpoint_nodes: RTree::new(),
            edge_index: HashMap::new(),
            lane_map: HashMap::new(),
        }
    }

    fn run(mut self) -> PlainNetwork {
        self.create_junction_nodes();
        self.create_edges();
        self.create_connections();

        info!(
            "Built Plain-XML network: {} nodes, {} edges, {} connections",
            self.network.nodes.len(),
            self.network.edges.len(),
            self.network.connections.len()
        );
        self.network
    }

    /// Standalone road that is not reused as a junction connecting road
    fn is_normal_road(&self, road: &Road) -> bool {
        road.junction_id().is_none() && !self.connecting_roads.contains(road.id.as_str())
    }

    /// One node per junction, at the centroid of the road ends that touch it
    ///
    /// Junctions only referenced by links (their definition lives in a
    /// neighbouring tile) still get a node. Junctions without attached
    /// normal roads fall back to the ends of their internal roads.
    fn create_junction_nodes(&mut self) {
        let doc = self.doc;
        let mut attached: BTreeMap<&str, Vec<Coord<f64>>> = BTreeMap::new();
        let mut internal: BTreeMap<&str, Vec<&Road>> = BTreeMap::new();

        for road in doc.roads() {
            if let Some(junction_id) = road.junction_id() {
                internal.entry(junction_id).or_default().push(road);
                continue;
            }
            if !self.is_normal_road(road) {
                continue;
            }
            let start = junction_link(road.predecessor.as_ref()).zip(nominal_start(road));
            let end = junction_link(road.successor.as_ref()).zip(nominal_end(road));
            for (junction_id, point) in start.into_iter().chain(end) {
                attached.entry(junction_id).or_default().push(point);
            }
        }

        let junction_ids: BTreeSet<&str> =
            attached.keys().chain(internal.keys()).copied().collect();

        for junction_id in junction_ids {
            let members = internal.get(junction_id).map(Vec::as_slice).unwrap_or(&[]);
            let points: Vec<Coord<f64>> = match attached.get(junction_id) {
                Some(points) => points.clone(),
                None => members
                    .iter()
                    .flat_map(|r| [nominal_start(r), nominal_end(r)])
                    .flatten()
                    .collect(),
            };

            if points.is_empty() {
                debug!("Junction {} has no locatable roads; no node created", junction_id);
                continue;
            }

            let n = points.len() as f64;
            let node = PlainNode {
                id: format!("junction_{}", junction_id),
                x: points.iter().map(|p| p.x).sum::<f64>() / n,
                y: points.iter().map(|p| p.y).sum::<f64>() / n,
                node_type: junction_type(members),
            };
            debug!(
                "Junction node {} at ({:.2}, {:.2}) from {} points",
                node.id, node.x, node.y, points.len()
            );
            self.junction_nodes.insert(junction_id.to_string(), node.id.clone());
            self.network.nodes.push(node);
        }
    }

    /// Node at one end of a normal road: its junction node, or a
    /// position-merged endpoint node
    fn endpoint_node(&mut self, road: &Road, at_start: bool) -> Option<String> {
        let link = if at_start {
            road.predecessor.as_ref()
        } else {
            road.successor.as_ref()
        };
        if let Some(junction_id) = junction_link(link) {
            return self.junction_nodes.get(junction_id).cloned();
        }

        let point = if at_start {
            nominal_start(road)
        } else {
            nominal_end(road)
        }?;

        let window = AABB::from_corners(
            [point.x - NODE_MERGE_M, point.y - NODE_MERGE_M],
            [point.x + NODE_MERGE_M, point.y + NODE_MERGE_M],
        );
        let existing = self
            .endpoint_nodes
            .locate_in_envelope_intersecting(&window)
            .filter(|entry| {
                let [x, y] = *entry.geom();
                (x - point.x).abs() < NODE_MERGE_M && (y - point.y).abs() < NODE_MERGE_M
            })
            .min_by_key(|entry| entry.data)
            .map(|entry| &self.network.nodes[entry.data]);
        if let Some(node) = existing {
            return Some(node.id.clone());
        }

        let id = format!("node_{}_{}", road.id, if at_start { "start" } else { "end" });
        self.endpoint_nodes
            .insert(GeomWithData::new([point.x, point.y], self.network.nodes.len()));
        self.network.nodes.push(PlainNode {
            id: id.clone(),
            x: point.x,
            y: point.y,
            node_type: NodeType::Priority,
        });
        Some(id)
    }

    fn create_edges(&mut self) {
        let doc = self.doc;
        let normal_roads: Vec<&'a Road> = doc
            .roads()
            .iter()
            .filter(|r| self.is_normal_road(r))
            .collect();

        for road in normal_roads {
            let from = self.endpoint_node(road, true);
            let to = self.endpoint_node(road, false);
            let (Some(from), Some(to)) = (from, to) else {
                warn!("Cannot determine nodes for road {}; no edges created", road.id);
                continue;
            };
            if from == to {
                warn!("Road {} starts and ends at node {}; no edges created", road.id, from);
                continue;
            }

            let shape = road_shape(road, &self.shape_config).unwrap_or_else(|e| {
                warn!("{}; edge shape omitted", e);
                Vec::new()
            });

            let mut forward: Vec<&Lane> =
                road.right_lanes.iter().filter(|l| l.is_drivable()).collect();
            forward.sort_by_key(|l| l.id);
            let mut backward: Vec<&Lane> =
                road.left_lanes.iter().filter(|l| l.is_drivable()).collect();
            backward.sort_by_key(|l| std::cmp::Reverse(l.id));

            if !forward.is_empty() {
                let edge = self.edge_for(road, 0, &from, &to, shape.clone(), &forward);
                self.push_edge(edge);
            }
            if !backward.is_empty() {
                let reversed = shape.iter().rev().copied().collect();
                let edge = self.edge_for(road, 1, &to, &from, reversed, &backward);
                self.push_edge(edge);
            }
        }
    }

    fn push_edge(&mut self, edge: PlainEdge) {
        self.edge_index.insert(edge.id.clone(), self.network.edges.len());
        self.network.edges.push(edge);
    }

    fn edge(&self, id: &str) -> Option<&PlainEdge> {
        self.edge_index.get(id).map(|&idx| &self.network.edges[idx])
    }

    /// Edge `{road}.{direction}` with lanes ordered outermost first and
    /// registered in the lane map
    fn edge_for(
        &mut self,
        road: &'a Road,
        direction: u8,
        from: &str,
        to: &str,
        shape: Vec<(f64, f64)>,
        lanes: &[&Lane],
    ) -> PlainEdge {
        let id = format!("{}.{}", road.id, direction);
        let lanes = lanes
            .iter()
            .enumerate()
            .map(|(index, lane)| {
                self.lane_map
                    .insert((road.id.as_str(), lane.id), (id.clone(), index));
                PlainLane {
                    index,
                    width: lane.width,
                    source_lane: lane.id,
                }
            })
            .collect();

        PlainEdge {
            id,
            from: from.to_string(),
            to: to.to_string(),
            speed: road.speed_limit.unwrap_or(DEFAULT_SPEED_MS),
            name: road.name.clone(),
            shape,
            lanes,
        }
    }

    fn create_connections(&mut self) {
        let doc = self.doc;
        let (mut created, mut skipped) = (0usize, 0usize);

        for junction in doc.junctions() {
            let Some(node_id) = self.junction_nodes.get(&junction.id).cloned() else {
                debug!("Junction {} has no node; its connections are skipped", junction.id);
                skipped += junction.connections.len();
                continue;
            };
            for conn in junction.connections.values() {
                let (ok, failed) = self.connect(conn, &node_id);
                created += ok;
                skipped += failed;
            }
        }

        info!("Connections: {} created, {} skipped", created, skipped);
    }

    /// Lane-level connections for one junction connection
    ///
    /// Returns (created, skipped) lane links.
    fn connect(&mut self, conn: &Connection, node_id: &str) -> (usize, usize) {
        let doc = self.doc;
        let (Some(incoming), Some(connecting)) =
            (doc.road(&conn.incoming_road), doc.road(&conn.connecting_road))
        else {
            debug!(
                "Connection {}: road {} or {} not in this file",
                conn.id, conn.incoming_road, conn.connecting_road
            );
            return (0, conn.lane_links.len().max(1));
        };

        let outgoing = match conn.contact_point {
            ContactPoint::Start => connecting.successor.as_ref(),
            ContactPoint::End => connecting.predecessor.as_ref(),
        };
        let Some(outgoing_id) = outgoing
            .filter(|l| l.element_type == ElementType::Road)
            .map(|l| l.element_id.as_str())
        else {
            warn!("Cannot determine outgoing road for connecting road {}", connecting.id);
            return (0, conn.lane_links.len().max(1));
        };

        let via = self.via_points(connecting, conn.contact_point);
        let (mut created, mut skipped) = (0usize, 0usize);

        for link in &conn.lane_links {
            let outgoing_lane = connecting
                .lane(link.to)
                .and_then(|lane| match conn.contact_point {
                    ContactPoint::Start => lane.successor,
                    ContactPoint::End => lane.predecessor,
                })
                .unwrap_or(link.to);

            let from = self.lane_map.get(&(incoming.id.as_str(), link.from));
            let to = self.lane_map.get(&(outgoing_id, outgoing_lane));
            let (Some((from_edge, from_lane)), Some((to_edge, to_lane))) = (from, to) else {
                debug!(
                    "No SUMO lane for {}:{} -> {}:{}",
                    incoming.id, link.from, outgoing_id, outgoing_lane
                );
                skipped += 1;
                continue;
            };

            let valid = match (self.edge(from_edge), self.edge(to_edge)) {
                (Some(f), Some(t)) => {
                    f.to == node_id
                        && t.from == node_id
                        && *from_lane < f.num_lanes()
                        && *to_lane < t.num_lanes()
                }
                _ => false,
            };
            if !valid {
                debug!(
                    "Edges {} -> {} do not meet at {}; connection skipped",
                    from_edge, to_edge, node_id
                );
                skipped += 1;
                continue;
            }

            let connection = PlainConnection {
                from_edge: from_edge.clone(),
                to_edge: to_edge.clone(),
                from_lane: *from_lane,
                to_lane: *to_lane,
                via: via.clone(),
            };
            self.network.connections.push(connection);
            created += 1;
        }

        (created, skipped)
    }

    /// Interior points of the connecting road in travel direction
    fn via_points(&self, connecting: &Road, contact_point: ContactPoint) -> Vec<(f64, f64)> {
        let mut shape = match road_shape(connecting, &self.shape_config) {
            Ok(shape) => shape,
            Err(e) => {
                debug!("{}; connection without via points", e);
                return Vec::new();
            }
        };
        if contact_point == ContactPoint::End {
            shape.reverse();
        }
        if shape.len() > 2 {
            shape[1..shape.len() - 1].to_vec()
        } else {
            Vec::new()
        }
    }
}

/// `traffic_light` for four or more connected roads carrying more than
/// six lanes in total, `priority` otherwise
fn junction_type(internal_roads: &[&Road]) -> NodeType {
    let connected: BTreeSet<&str> = internal_roads
        .iter()
        .flat_map(|r| r.linked_roads())
        .collect();
    let lanes: usize = internal_roads
        .iter()
        .map(|r| r.left_lanes.len() + r.right_lanes.len())
        .sum();

    if connected.len() >= 4 && lanes > 6 {
        NodeType::TrafficLight
    } else {
        NodeType::Priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{four_way_junction, XodrBuilder};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    fn network(doc: &OpenDriveDocument) -> PlainNetwork {
        PlainXmlConverter::default().build_network(doc)
    }

    #[test]
    fn test_four_way_nodes_and_edges() {
        let net = network(&four_way_junction().document());

        let junction = net.node("junction_J1").unwrap();
        assert_relative_eq!(junction.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(junction.y, 50.0, epsilon = 1e-9);
        assert_eq!(junction.node_type, NodeType::Priority);
        assert_eq!(net.nodes.len(), 5);

        let ids: Vec<&str> = net.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1.0", "1.1", "2.0", "2.1", "3.0", "3.1", "4.0", "4.1"]);

        let e = net.edge("1.0").unwrap();
        assert_eq!((e.from.as_str(), e.to.as_str()), ("node_1_start", "junction_J1"));
        let e = net.edge("1.1").unwrap();
        assert_eq!((e.from.as_str(), e.to.as_str()), ("junction_J1", "node_1_start"));
        assert_eq!(e.shape.first(), Some(&(40.0, 50.0)));
        assert_relative_eq!(e.speed, DEFAULT_SPEED_MS);
    }

    #[test]
    fn test_four_way_connections_follow_junction() {
        let net = network(&four_way_junction().document());

        let pairs: Vec<(&str, &str)> = net
            .connections
            .iter()
            .map(|c| (c.from_edge.as_str(), c.to_edge.as_str()))
            .collect();
        assert_eq!(pairs, vec![("1.0", "2.0"), ("3.0", "4.0")]);

        let west_east = &net.connections[0];
        assert_eq!((west_east.from_lane, west_east.to_lane), (0, 0));
        assert!(!west_east.via.is_empty());
        assert!(west_east.via.iter().all(|&(x, y)| x > 40.0 && x < 60.0 && y == 50.0));
    }

    #[test]
    fn test_busy_junction_gets_traffic_light() {
        let doc = four_way_junction()
            .line_road_in_junction("103", "J1", (60.0, 50.0), PI, 20.0)
            .predecessor("103", "road", "2")
            .successor("103", "road", "1")
            .line_road_in_junction("104", "J1", (50.0, 60.0), -PI / 2.0, 20.0)
            .predecessor("104", "road", "4")
            .successor("104", "road", "3")
            .document();
        let net = network(&doc);
        assert_eq!(net.node("junction_J1").unwrap().node_type, NodeType::TrafficLight);
    }

    #[test]
    fn test_junction_from_neighbouring_tile() {
        // Only road 2 survives in this tile; J1 is defined elsewhere
        let doc = XodrBuilder::new()
            .line_road("2", (60.0, 50.0), 0.0, 90.0)
            .predecessor("2", "junction", "J1")
            .document();
        let net = network(&doc);

        let junction = net.node("junction_J1").unwrap();
        assert_relative_eq!(junction.x, 60.0);
        let e = net.edge("2.0").unwrap();
        assert_eq!((e.from.as_str(), e.to.as_str()), ("junction_J1", "node_2_end"));
        assert!(net.connections.is_empty());
    }

    #[test]
    fn test_chained_roads_share_node() {
        let doc = XodrBuilder::new()
            .line_road("1", (0.0, 0.0), 0.0, 50.0)
            .successor("1", "road", "2")
            .line_road("2", (50.0, 0.0), 0.0, 50.0)
            .predecessor("2", "road", "1")
            .document();
        let net = network(&doc);

        assert_eq!(net.nodes.len(), 3);
        assert_eq!(net.edge("1.0").unwrap().to, net.edge("2.0").unwrap().from);
    }

    #[test]
    fn test_endpoint_merge_tolerance() {
        let doc = XodrBuilder::new()
            .line_road("a", (0.0, 0.0), 0.0, 10.0)
            .line_road("b", (10.005, 0.0), 0.0, 10.0)
            .line_road("c", (20.025, 0.0), 0.0, 10.0)
            .document();
        let net = network(&doc);

        assert_eq!(net.edge("b.0").unwrap().from, "node_a_end");
        assert_eq!(net.edge("c.0").unwrap().from, "node_c_start");
        assert_eq!(net.nodes.len(), 5);
    }

    #[test]
    fn test_long_chain_shares_nodes() {
        let mut builder = XodrBuilder::new();
        for i in 0..300 {
            builder = builder.line_road(&format!("r{}", i), (10.0 * i as f64, 0.0), 0.0, 10.0);
        }
        let net = network(&builder.document());

        assert_eq!(net.nodes.len(), 301);
        assert_eq!(net.edges.len(), 600);
        for i in 1..300 {
            let prev = net.edge(&format!("r{}.0", i - 1)).unwrap();
            let next = net.edge(&format!("r{}.0", i)).unwrap();
            assert_eq!(prev.to, next.from);
        }
    }

    #[test]
    fn test_lane_order_outermost_first() {
        let text = r#"<OpenDRIVE><header/>
  <road id="7" name="Main" length="100" junction="-1">
    <type s="0" type="town"><speed max="36" unit="km/h"/></type>
    <planView><geometry s="0" x="0" y="0" hdg="0" length="100"><line/></geometry></planView>
    <lanes><laneSection s="0">
      <left>
        <lane id="2" type="sidewalk"><width sOffset="0" a="2.0" b="0" c="0" d="0"/></lane>
        <lane id="1" type="driving"><width sOffset="0" a="3.5" b="0" c="0" d="0"/></lane>
      </left>
      <center><lane id="0" type="none"/></center>
      <right>
        <lane id="-1" type="driving"><width sOffset="0" a="3.5" b="0" c="0" d="0"/></lane>
        <lane id="-2" type="driving"><width sOffset="0" a="3.0" b="0" c="0" d="0"/></lane>
        <lane id="-3" type="shoulder"><width sOffset="0" a="1.0" b="0" c="0" d="0"/></lane>
      </right>
    </laneSection></lanes>
  </road>
</OpenDRIVE>"#;
        let doc = OpenDriveDocument::parse(text.to_string(), "inline").unwrap();
        let net = network(&doc);

        let forward = net.edge("7.0").unwrap();
        let sources: Vec<i32> = forward.lanes.iter().map(|l| l.source_lane).collect();
        assert_eq!(sources, vec![-2, -1]);
        assert_relative_eq!(forward.lanes[0].width, 3.0);
        assert_relative_eq!(forward.speed, 10.0, epsilon = 1e-9);
        assert_eq!(forward.name, "Main");

        let backward = net.edge("7.1").unwrap();
        assert_eq!(backward.num_lanes(), 1);
        assert_eq!(backward.lanes[0].source_lane, 1);
    }

    #[test]
    fn test_connecting_roads_produce_no_edges() {
        let net = network(&four_way_junction().document());
        assert!(net.edge("101.0").is_none());
        assert!(net.edge("102.1").is_none());
    }

    #[test]
    fn test_repeated_builds_are_independent() {
        let converter = PlainXmlConverter::default();
        let first = converter.build_network(&four_way_junction().document());
        let other = XodrBuilder::new()
            .line_road("9", (0.0, 0.0), 0.0, 10.0)
            .document();
        assert_eq!(converter.build_network(&other).edges.len(), 2);
        let again = converter.build_network(&four_way_junction().document());
        assert_eq!(first, again);
    }

    #[test]
    fn test_convert_writes_plain_files() {
        let dir = TempDir::new().unwrap();
        let xodr = dir.path().join("map.xodr");
        std::fs::write(&xodr, four_way_junction().build()).unwrap();
        let prefix = dir.path().join("map");

        let outputs = PlainXmlConverter::default()
            .convert(&xodr, &prefix, false)
            .unwrap();

        assert_eq!(outputs.edge_count, 8);
        assert_eq!(outputs.connection_count, 2);
        assert!(outputs.network_file.is_none());
        assert!(outputs.nodes_file.exists());
        assert!(outputs.edges_file.exists());
        let con = outputs.connections_file.unwrap();
        assert_eq!(con, dir.path().join("map.con.xml"));

        let text = std::fs::read_to_string(&con).unwrap();
        assert!(text.contains("from=\"1.0\" to=\"2.0\""));
    }

    #[test]
    fn test_convert_missing_input() {
        let dir = TempDir::new().unwrap();
        let result = PlainXmlConverter::default().convert(
            &dir.path().join("absent.xodr"),
            &dir.path().join("absent"),
            false,
        );
        assert!(matches!(result, Err(ConvertError::Io { .. })));
    }
}
