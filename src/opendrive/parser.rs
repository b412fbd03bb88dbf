use super::model::*;
use crate::error::{ConvertError, Result};
use log::{debug, info, warn};
use roxmltree::Node;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

impl OpenDriveDocument {
    /// Load an OpenDRIVE file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::parse(text, &path.display().to_string())
    }

    /// Parse OpenDRIVE XML text
    ///
    /// `origin` only labels errors and log lines.
    pub fn parse(text: String, origin: &str) -> Result<Self> {
        let parsed = parse_elements(&text, origin)?;

        info!(
            "Loaded OpenDRIVE '{}' with {} roads, {} junctions",
            origin,
            parsed.roads.len(),
            parsed.junctions.len()
        );

        Ok(OpenDriveDocument {
            source: text,
            root_start_tag: parsed.root_start_tag,
            header: parsed.header,
            geo_reference: parsed.geo_reference,
            road_index: index_by_id(parsed.roads.iter().map(|r| r.id.as_str()), "road"),
            junction_index: index_by_id(
                parsed.junctions.iter().map(|j| j.id.as_str()),
                "junction",
            ),
            roads: parsed.roads,
            junctions: parsed.junctions,
            controllers: parsed.controllers,
        })
    }
}

/// Owned parse output, detached from the roxmltree borrow of the text
struct ParsedElements {
    root_start_tag: Range<usize>,
    header: Option<Range<usize>>,
    geo_reference: Option<Range<usize>>,
    roads: Vec<Road>,
    junctions: Vec<Junction>,
    controllers: Vec<Controller>,
}

fn parse_elements(text: &str, origin: &str) -> Result<ParsedElements> {
    let doc = roxmltree::Document::parse(text).map_err(|e| ConvertError::Parse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "OpenDRIVE" {
        return Err(ConvertError::Parse {
            path: origin.to_string(),
            reason: format!(
                "root element must be <OpenDRIVE>, found <{}>",
                root.tag_name().name()
            ),
        });
    }

    let root_start = root.range().start;
    let root_start_tag = root_start..start_tag_end(text, root_start);

    let mut roads = Vec::new();
    let mut junctions = Vec::new();
    let mut controllers = Vec::new();

    for node in root.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "road" => match parse_road(&node) {
                Some(road) => roads.push(road),
                None => warn!("Skipping <road> without id at byte {}", node.range().start),
            },
            "junction" => match parse_junction(&node) {
                Some(junction) => junctions.push(junction),
                None => warn!(
                    "Skipping <junction> without id at byte {}",
                    node.range().start
                ),
            },
            "controller" => {
                if let Some(id) = node.attribute("id") {
                    controllers.push(Controller {
                        id: id.to_string(),
                        span: node.range(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(ParsedElements {
        root_start_tag,
        header: child(&root, "header").map(|n| n.range()),
        geo_reference: child(&root, "geoReference").map(|n| n.range()),
        roads,
        junctions,
        controllers,
    })
}

/// First-wins id index; duplicates are reported and shadowed
fn index_by_id<'a>(ids: impl Iterator<Item = &'a str>, kind: &str) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (idx, id) in ids.enumerate() {
        if index.contains_key(id) {
            warn!("Duplicate {} id '{}', keeping the first definition", kind, id);
            continue;
        }
        index.insert(id.to_string(), idx);
    }
    index
}

/// Byte offset just past the `>` closing the start tag at `start`
///
/// Quoted attribute values may contain `>`, so quotes are tracked.
pub(crate) fn start_tag_end(text: &str, start: usize) -> usize {
    let mut quote: Option<u8> = None;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match (quote, *byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*byte),
            (None, b'>') => return start + offset + 1,
            (None, _) => {}
        }
    }
    text.len()
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: &Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.tag_name().name() == name)
}

fn attr<T: FromStr>(node: &Node, name: &str) -> Option<T> {
    node.attribute(name).and_then(|s| s.trim().parse().ok())
}

fn attr_or(node: &Node, name: &str, default: f64) -> f64 {
    attr(node, name).unwrap_or(default)
}

fn parse_road(node: &Node) -> Option<Road> {
    let id = node.attribute("id")?.to_string();

    let mut road = Road {
        name: node.attribute("name").unwrap_or("").to_string(),
        length: attr_or(node, "length", 0.0),
        junction: node.attribute("junction").unwrap_or(NO_JUNCTION).to_string(),
        predecessor: None,
        successor: None,
        plan_view: Vec::new(),
        elevation: Vec::new(),
        speed_limit: None,
        left_lanes: Vec::new(),
        right_lanes: Vec::new(),
        span: node.range(),
        id,
    };

    if let Some(link) = child(node, "link") {
        road.predecessor = child(&link, "predecessor").and_then(|n| parse_road_link(&n));
        road.successor = child(&link, "successor").and_then(|n| parse_road_link(&n));
    }

    if let Some(plan_view) = child(node, "planView") {
        road.plan_view = children(&plan_view, "geometry")
            .map(|n| parse_geometry(&n))
            .collect();
    }

    if let Some(profile) = child(node, "elevationProfile") {
        road.elevation = children(&profile, "elevation")
            .map(|n| Elevation {
                s: attr_or(&n, "s", 0.0),
                a: attr_or(&n, "a", 0.0),
                b: attr_or(&n, "b", 0.0),
                c: attr_or(&n, "c", 0.0),
                d: attr_or(&n, "d", 0.0),
            })
            .collect();
    }

    road.speed_limit = children(node, "type")
        .filter_map(|t| child(&t, "speed"))
        .find_map(|speed| parse_speed(&speed));

    // Lane counts follow the first lane section
    if let Some(section) = child(node, "lanes").and_then(|lanes| child(&lanes, "laneSection")) {
        if let Some(left) = child(&section, "left") {
            road.left_lanes = children(&left, "lane").filter_map(|n| parse_lane(&n)).collect();
        }
        if let Some(right) = child(&section, "right") {
            road.right_lanes = children(&right, "lane").filter_map(|n| parse_lane(&n)).collect();
        }
    }

    debug!(
        "Parsed road {} (length {:.1}, junction {}, {} geometries)",
        road.id,
        road.length,
        road.junction,
        road.plan_view.len()
    );

    Some(road)
}

fn parse_road_link(node: &Node) -> Option<RoadLink> {
    let element_type = match node.attribute("elementType") {
        Some("road") => ElementType::Road,
        Some("junction") => ElementType::Junction,
        _ => return None,
    };

    Some(RoadLink {
        element_type,
        element_id: node.attribute("elementId")?.to_string(),
        contact_point: parse_contact_point(node.attribute("contactPoint")),
    })
}

fn parse_contact_point(value: Option<&str>) -> Option<ContactPoint> {
    match value {
        Some("start") => Some(ContactPoint::Start),
        Some("end") => Some(ContactPoint::End),
        _ => None,
    }
}

fn parse_geometry(node: &Node) -> Geometry {
    let kind = if let Some(arc) = child(node, "arc") {
        GeometryKind::Arc {
            curvature: attr_or(&arc, "curvature", 0.0),
        }
    } else if let Some(spiral) = child(node, "spiral") {
        GeometryKind::Spiral {
            curv_start: attr_or(&spiral, "curvStart", 0.0),
            curv_end: attr_or(&spiral, "curvEnd", 0.0),
        }
    } else if let Some(poly) = child(node, "poly3") {
        GeometryKind::Poly3 {
            a: attr_or(&poly, "a", 0.0),
            b: attr_or(&poly, "b", 0.0),
            c: attr_or(&poly, "c", 0.0),
            d: attr_or(&poly, "d", 0.0),
        }
    } else if let Some(pp) = child(node, "paramPoly3") {
        GeometryKind::ParamPoly3 {
            au: attr_or(&pp, "aU", 0.0),
            bu: attr_or(&pp, "bU", 0.0),
            cu: attr_or(&pp, "cU", 0.0),
            du: attr_or(&pp, "dU", 0.0),
            av: attr_or(&pp, "aV", 0.0),
            bv: attr_or(&pp, "bV", 0.0),
            cv: attr_or(&pp, "cV", 0.0),
            dv: attr_or(&pp, "dV", 0.0),
            p_range: match pp.attribute("pRange") {
                Some("normalized") => ParamRange::Normalized,
                _ => ParamRange::ArcLength,
            },
        }
    } else {
        GeometryKind::Line
    };

    Geometry {
        s: attr_or(node, "s", 0.0),
        x: attr_or(node, "x", f64::NAN),
        y: attr_or(node, "y", f64::NAN),
        hdg: attr_or(node, "hdg", 0.0),
        length: attr_or(node, "length", 0.0),
        kind,
    }
}

/// `<speed max=".." unit=".."/>` to m/s; OpenDRIVE defaults to m/s
fn parse_speed(node: &Node) -> Option<f64> {
    let max: f64 = attr(node, "max")?;
    let factor = match node.attribute("unit") {
        Some("km/h") => 1.0 / 3.6,
        Some("mph") => 0.44704,
        _ => 1.0,
    };
    let speed = max * factor;
    (speed.is_finite() && speed > 0.0).then_some(speed)
}

fn parse_lane(node: &Node) -> Option<Lane> {
    let id: i32 = attr(node, "id")?;
    let link = child(node, "link");

    Some(Lane {
        id,
        lane_type: node.attribute("type").unwrap_or("none").to_string(),
        width: child(node, "width")
            .and_then(|w| attr(&w, "a"))
            .unwrap_or(3.5),
        predecessor: link
            .and_then(|l| child(&l, "predecessor"))
            .and_then(|p| attr(&p, "id")),
        successor: link
            .and_then(|l| child(&l, "successor"))
            .and_then(|s| attr(&s, "id")),
    })
}

fn parse_junction(node: &Node) -> Option<Junction> {
    let id = node.attribute("id")?.to_string();
    let mut connections = BTreeMap::new();

    for (idx, conn) in children(node, "connection").enumerate() {
        let mut key = conn.attribute("id").unwrap_or("").to_string();
        if key.is_empty() || connections.contains_key(&key) {
            warn!(
                "Junction {}: connection #{} has a missing or duplicate id",
                id, idx
            );
            key = format!("#{}", idx);
        }

        let lane_links = children(&conn, "laneLink")
            .filter_map(|l| {
                Some(LaneLink {
                    from: attr(&l, "from")?,
                    to: attr(&l, "to")?,
                })
            })
            .collect();

        connections.insert(
            key.clone(),
            Connection {
                id: key,
                incoming_road: conn.attribute("incomingRoad").unwrap_or("").to_string(),
                connecting_road: conn.attribute("connectingRoad").unwrap_or("").to_string(),
                contact_point: parse_contact_point(conn.attribute("contactPoint"))
                    .unwrap_or(ContactPoint::Start),
                lane_links,
            },
        );
    }

    let controller_ids = children(node, "controller")
        .filter_map(|c| c.attribute("id").map(str::to_string))
        .collect();

    Some(Junction {
        name: node.attribute("name").unwrap_or("").to_string(),
        connections,
        controller_ids,
        span: node.range(),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::XodrBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_non_opendrive_root() {
        let result = OpenDriveDocument::parse("<nodes/>".to_string(), "bad.xml");
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn test_rejects_malformed_xml() {
        let result = OpenDriveDocument::parse("<OpenDRIVE><road>".to_string(), "broken.xodr");
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
    }

    #[test]
    fn test_parse_roads_links_and_lanes() {
        let text = XodrBuilder::new()
            .line_road("1", (0.0, 0.0), 0.0, 100.0)
            .successor("1", "road", "2")
            .line_road("2", (100.0, 0.0), 0.0, 50.0)
            .predecessor("2", "road", "1")
            .build();
        let doc = OpenDriveDocument::parse(text, "test").unwrap();

        assert_eq!(doc.road_count(), 2);
        let road = doc.road("1").unwrap();
        assert_relative_eq!(road.length, 100.0);
        assert_eq!(road.junction_id(), None);
        assert_eq!(road.linked_roads().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(road.right_lanes.len(), 1);
        assert_eq!(road.left_lanes.len(), 1);
        assert_relative_eq!(road.right_lanes[0].width, 3.5);
        assert_eq!(doc.road("2").unwrap().predecessor.as_ref().unwrap().element_id, "1");
    }

    #[test]
    fn test_parse_junction_connections() {
        let text = XodrBuilder::new()
            .line_road("1", (0.0, 0.0), 0.0, 40.0)
            .line_road("2", (60.0, 0.0), 0.0, 40.0)
            .line_road_in_junction("100", "J1", (40.0, 0.0), 0.0, 20.0)
            .junction("J1", &[("c0", "1", "100")])
            .build();
        let doc = OpenDriveDocument::parse(text, "test").unwrap();

        let junction = doc.junction("J1").unwrap();
        assert_eq!(junction.connections.len(), 1);
        let conn = &junction.connections["c0"];
        assert_eq!(conn.incoming_road, "1");
        assert_eq!(conn.connecting_road, "100");
        assert_eq!(conn.lane_links, vec![LaneLink { from: -1, to: -1 }]);
        assert_eq!(
            junction.member_roads().into_iter().collect::<Vec<_>>(),
            vec!["1", "100"]
        );
        assert_eq!(doc.road("100").unwrap().junction_id(), Some("J1"));
    }

    #[test]
    fn test_geometry_kinds_and_speed() {
        let text = r#"<?xml version="1.0"?>
<OpenDRIVE>
  <header revMajor="1" revMinor="6"/>
  <road id="7" length="30" junction="-1">
    <type s="0" type="town"><speed max="36" unit="km/h"/></type>
    <planView>
      <geometry s="0" x="1" y="2" hdg="0" length="10"><arc curvature="0.01"/></geometry>
      <geometry s="10" x="11" y="2" hdg="0.1" length="10"><spiral curvStart="0" curvEnd="0.02"/></geometry>
      <geometry s="20" x="21" y="3" hdg="0.2" length="10"><paramPoly3 aU="0" bU="1" cU="0" dU="0" aV="0" bV="0" cV="0.1" dV="0" pRange="normalized"/></geometry>
    </planView>
  </road>
</OpenDRIVE>"#;
        let doc = OpenDriveDocument::parse(text.to_string(), "test").unwrap();
        let road = doc.road("7").unwrap();

        assert_eq!(road.plan_view.len(), 3);
        assert_eq!(road.plan_view[0].kind, GeometryKind::Arc { curvature: 0.01 });
        assert!(matches!(road.plan_view[1].kind, GeometryKind::Spiral { .. }));
        assert!(matches!(
            road.plan_view[2].kind,
            GeometryKind::ParamPoly3 { p_range: ParamRange::Normalized, .. }
        ));
        assert_relative_eq!(road.speed_limit.unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spans_cover_elements() {
        let text = XodrBuilder::new()
            .line_road("1", (0.0, 0.0), 0.0, 10.0)
            .build();
        let doc = OpenDriveDocument::parse(text, "test").unwrap();

        let road_text = doc.text(&doc.road("1").unwrap().span);
        assert!(road_text.starts_with("<road"));
        assert!(road_text.ends_with("</road>"));
        assert!(doc.text(&doc.root_start_tag).starts_with("<OpenDRIVE"));
        assert!(doc.text(&doc.root_start_tag).ends_with('>'));
        assert!(doc.text(doc.header.as_ref().unwrap()).starts_with("<header"));
    }

    #[test]
    fn test_start_tag_end_skips_quoted_gt() {
        let text = r#"<OpenDRIVE note="a>b" x='>'><header/></OpenDRIVE>"#;
        let end = start_tag_end(text, 0);
        assert_eq!(&text[..end], r#"<OpenDRIVE note="a>b" x='>'>"#);
    }

    #[test]
    fn test_duplicate_road_keeps_first() {
        let text = XodrBuilder::new()
            .line_road("1", (0.0, 0.0), 0.0, 10.0)
            .line_road("1", (50.0, 0.0), 0.0, 10.0)
            .build();
        let doc = OpenDriveDocument::parse(text, "test").unwrap();
        assert_eq!(doc.road_count(), 2);
        assert_relative_eq!(doc.road("1").unwrap().plan_view[0].x, 0.0);
    }
}
