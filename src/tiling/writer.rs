use super::grid::TileBounds;
use crate::error::{ConvertError, Result};
use crate::opendrive::OpenDriveDocument;
use std::collections::BTreeSet;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Serialize the tile's subset of the source document
///
/// # Output
/// - The source `<OpenDRIVE>` start tag, header and root-level geoReference,
///   copied verbatim so coordinates keep their reference frame.
/// - Roads in the tile's road set, in source order, byte-for-byte. Links to
///   roads outside the tile stay untouched.
/// - Junctions in the tile's junction set, in source order, with all
///   connections and lane links.
/// - Controllers referenced by those junctions.
///
/// The result depends only on the document and the membership sets, so
/// writing the same tile twice yields identical bytes.
///
/// # Errors
/// `TileWrite` when the tile is empty, names an element the document lacks,
/// or the assembled text does not re-parse as the expected OpenDRIVE tree.
pub fn write_tile(doc: &OpenDriveDocument, tile: &TileBounds) -> Result<String> {
    let tile_id = tile.id.to_string();
    let fail = |reason: String| ConvertError::TileWrite {
        tile_id: tile_id.clone(),
        reason,
    };

    if tile.is_empty() {
        return Err(fail("tile has no roads".to_string()));
    }
    if let Some(missing) = tile.roads.iter().find(|id| doc.road(id).is_none()) {
        return Err(fail(format!("road {} not in source document", missing)));
    }
    if let Some(missing) = tile.junctions.iter().find(|id| doc.junction(id).is_none()) {
        return Err(fail(format!("junction {} not in source document", missing)));
    }

    let mut out = String::with_capacity(estimate_size(doc, tile));
    out.push_str(XML_DECLARATION);
    out.push_str(&open_root_tag(doc.text(&doc.root_start_tag)));
    out.push('\n');

    if let Some(header) = &doc.header {
        push_element(&mut out, doc.text(header));
    }
    if let Some(geo) = &doc.geo_reference {
        push_element(&mut out, doc.text(geo));
    }

    // Duplicate ids resolve to the first definition, as in the document index
    for road in doc
        .roads()
        .iter()
        .filter(|r| tile.roads.contains(&r.id) && is_indexed(doc.road(&r.id), r))
    {
        push_element(&mut out, doc.text(&road.span));
    }

    let mut controller_ids: BTreeSet<&str> = BTreeSet::new();
    for junction in doc
        .junctions()
        .iter()
        .filter(|j| tile.junctions.contains(&j.id) && is_indexed(doc.junction(&j.id), j))
    {
        push_element(&mut out, doc.text(&junction.span));
        controller_ids.extend(junction.controller_ids.iter().map(String::as_str));
    }

    for controller in doc
        .controllers()
        .iter()
        .filter(|c| controller_ids.contains(c.id.as_str()))
    {
        push_element(&mut out, doc.text(&controller.span));
    }

    out.push_str("</OpenDRIVE>\n");

    validate(&out, tile.roads.len(), tile.junctions.len()).map_err(fail)?;
    Ok(out)
}

/// Root start tag as an opening tag (a self-closing root becomes `<OpenDRIVE ...>`)
fn open_root_tag(tag: &str) -> String {
    match tag.strip_suffix("/>") {
        Some(head) => format!("{}>", head.trim_end()),
        None => tag.to_string(),
    }
}

fn is_indexed<T>(indexed: Option<&T>, element: &T) -> bool {
    indexed.map_or(false, |first| std::ptr::eq(first, element))
}

fn push_element(out: &mut String, element: &str) {
    out.push_str("  ");
    out.push_str(element);
    out.push('\n');
}

fn estimate_size(doc: &OpenDriveDocument, tile: &TileBounds) -> usize {
    let roads: usize = doc
        .roads()
        .iter()
        .filter(|r| tile.roads.contains(&r.id))
        .map(|r| r.span.len() + 3)
        .sum();
    roads + 1024
}

fn validate(
    text: &str,
    expected_roads: usize,
    expected_junctions: usize,
) -> std::result::Result<(), String> {
    let parsed = roxmltree::Document::parse(text)
        .map_err(|e| format!("output is not well-formed: {}", e))?;
    let root = parsed.root_element();
    if root.tag_name().name() != "OpenDRIVE" {
        return Err(format!("unexpected root <{}>", root.tag_name().name()));
    }

    let count = |name: &str| {
        root.children()
            .filter(|n| n.is_element() && n.tag_name().name() == name)
            .count()
    };

    let roads = count("road");
    if roads != expected_roads {
        return Err(format!("expected {} roads, serialized {}", expected_roads, roads));
    }
    let junctions = count("junction");
    if junctions != expected_junctions {
        return Err(format!(
            "expected {} junctions, serialized {}",
            expected_junctions, junctions
        ));
    }

    Ok(())
}
