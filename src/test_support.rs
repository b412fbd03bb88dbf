//! Synthetic OpenDRIVE documents for unit tests

use crate::opendrive::OpenDriveDocument;

struct RoadSpec {
    id: String,
    junction: String,
    start: (f64, f64),
    hdg: f64,
    length: f64,
    curvature: Option<f64>,
    predecessor: Option<(String, String)>,
    successor: Option<(String, String)>,
}

struct JunctionSpec {
    id: String,
    connections: Vec<(String, String, String)>,
}

/// Builds small OpenDRIVE maps: straight or arc roads with one lane per side
#[derive(Default)]
pub struct XodrBuilder {
    roads: Vec<RoadSpec>,
    junctions: Vec<JunctionSpec>,
    geo_reference: Option<String>,
}

impl XodrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_road(self, id: &str, start: (f64, f64), hdg: f64, length: f64) -> Self {
        self.push_road(id, "-1", start, hdg, length, None)
    }

    pub fn arc_road(
        self,
        id: &str,
        start: (f64, f64),
        hdg: f64,
        length: f64,
        curvature: f64,
    ) -> Self {
        self.push_road(id, "-1", start, hdg, length, Some(curvature))
    }

    pub fn line_road_in_junction(
        self,
        id: &str,
        junction: &str,
        start: (f64, f64),
        hdg: f64,
        length: f64,
    ) -> Self {
        self.push_road(id, junction, start, hdg, length, None)
    }

    pub fn predecessor(mut self, road: &str, element_type: &str, target: &str) -> Self {
        if let Some(spec) = self.roads.iter_mut().find(|r| r.id == road) {
            spec.predecessor = Some((element_type.to_string(), target.to_string()));
        }
        self
    }

    pub fn successor(mut self, road: &str, element_type: &str, target: &str) -> Self {
        if let Some(spec) = self.roads.iter_mut().find(|r| r.id == road) {
            spec.successor = Some((element_type.to_string(), target.to_string()));
        }
        self
    }

    /// Connections as (connection id, incoming road, connecting road)
    pub fn junction(mut self, id: &str, connections: &[(&str, &str, &str)]) -> Self {
        self.junctions.push(JunctionSpec {
            id: id.to_string(),
            connections: connections
                .iter()
                .map(|(c, i, r)| (c.to_string(), i.to_string(), r.to_string()))
                .collect(),
        });
        self
    }

    pub fn geo_reference(mut self, proj: &str) -> Self {
        self.geo_reference = Some(proj.to_string());
        self
    }

    fn push_road(
        mut self,
        id: &str,
        junction: &str,
        start: (f64, f64),
        hdg: f64,
        length: f64,
        curvature: Option<f64>,
    ) -> Self {
        self.roads.push(RoadSpec {
            id: id.to_string(),
            junction: junction.to_string(),
            start,
            hdg,
            length,
            curvature,
            predecessor: None,
            successor: None,
        });
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<OpenDRIVE>\n");
        xml.push_str("  <header revMajor=\"1\" revMinor=\"6\" name=\"fixture\">");
        if let Some(proj) = &self.geo_reference {
            xml.push_str(&format!("<geoReference><![CDATA[{}]]></geoReference>", proj));
        }
        xml.push_str("</header>\n");

        for road in &self.roads {
            xml.push_str(&format!(
                "  <road id=\"{}\" name=\"road {}\" length=\"{}\" junction=\"{}\">\n",
                road.id, road.id, road.length, road.junction
            ));
            if road.predecessor.is_some() || road.successor.is_some() {
                xml.push_str("    <link>");
                if let Some((kind, target)) = &road.predecessor {
                    xml.push_str(&format!(
                        "<predecessor elementType=\"{}\" elementId=\"{}\" contactPoint=\"end\"/>",
                        kind, target
                    ));
                }
                if let Some((kind, target)) = &road.successor {
                    xml.push_str(&format!(
                        "<successor elementType=\"{}\" elementId=\"{}\" contactPoint=\"start\"/>",
                        kind, target
                    ));
                }
                xml.push_str("</link>\n");
            }
            xml.push_str(&format!(
                "    <planView><geometry s=\"0\" x=\"{}\" y=\"{}\" hdg=\"{}\" length=\"{}\">",
                road.start.0, road.start.1, road.hdg, road.length
            ));
            match road.curvature {
                Some(curvature) => xml.push_str(&format!("<arc curvature=\"{}\"/>", curvature)),
                None => xml.push_str("<line/>"),
            }
            xml.push_str("</geometry></planView>\n");
            xml.push_str(concat!(
                "    <lanes><laneSection s=\"0\">",
                "<left><lane id=\"1\" type=\"driving\"><width sOffset=\"0\" a=\"3.5\" b=\"0\" c=\"0\" d=\"0\"/></lane></left>",
                "<center><lane id=\"0\" type=\"none\"/></center>",
                "<right><lane id=\"-1\" type=\"driving\"><width sOffset=\"0\" a=\"3.5\" b=\"0\" c=\"0\" d=\"0\"/></lane></right>",
                "</laneSection></lanes>\n"
            ));
            xml.push_str("  </road>\n");
        }

        for junction in &self.junctions {
            xml.push_str(&format!("  <junction id=\"{}\" name=\"\">\n", junction.id));
            for (conn_id, incoming, connecting) in &junction.connections {
                xml.push_str(&format!(
                    "    <connection id=\"{}\" incomingRoad=\"{}\" connectingRoad=\"{}\" contactPoint=\"start\"><laneLink from=\"-1\" to=\"-1\"/></connection>\n",
                    conn_id, incoming, connecting
                ));
            }
            xml.push_str("  </junction>\n");
        }

        xml.push_str("</OpenDRIVE>\n");
        xml
    }

    pub fn document(&self) -> OpenDriveDocument {
        OpenDriveDocument::parse(self.build(), "fixture").unwrap()
    }
}

/// Four-way junction `J1` centred at (50, 50)
///
/// Incoming roads W(1), S(3), N(4) sit inside x < 100; E(2) runs from
/// x = 60 to x = 150 and so crosses into a second 100 m tile.
/// Connecting roads 101 (W->E) and 102 (S->N) belong to the junction.
pub fn four_way_junction() -> XodrBuilder {
    XodrBuilder::new()
        .line_road("1", (5.0, 50.0), 0.0, 35.0)
        .successor("1", "junction", "J1")
        .line_road("2", (60.0, 50.0), 0.0, 90.0)
        .predecessor("2", "junction", "J1")
        .line_road("3", (50.0, 5.0), std::f64::consts::FRAC_PI_2, 35.0)
        .successor("3", "junction", "J1")
        .line_road("4", (50.0, 60.0), std::f64::consts::FRAC_PI_2, 35.0)
        .predecessor("4", "junction", "J1")
        .line_road_in_junction("101", "J1", (40.0, 50.0), 0.0, 20.0)
        .predecessor("101", "road", "1")
        .successor("101", "road", "2")
        .line_road_in_junction("102", "J1", (50.0, 40.0), std::f64::consts::FRAC_PI_2, 20.0)
        .predecessor("102", "road", "3")
        .successor("102", "road", "4")
        .junction("J1", &[("0", "1", "101"), ("1", "3", "102")])
}
