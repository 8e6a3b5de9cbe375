//! Verbatim XML slicing.
//!
//! The pipeline never re-serializes feature bodies through a DOM: both the
//! OSM API and osmium-tool hand us well-formed documents, and the change
//! applier expects the untouched bytes back. These helpers walk documents
//! with a `quick-xml` reader purely to find element boundaries, then copy
//! byte ranges out of the original text. Everything not explicitly removed
//! survives byte-for-byte, including attribute order and escaping.

use crate::id::{FeatureId, Kind};
use crate::Result;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Extract the headless body of feature `id` from `doc`, verbatim.
///
/// `doc` may be a full API response (`<osm>...</osm>` envelope) or any other
/// document containing the feature; the first element whose name matches the
/// kind and whose `id` attribute matches the numeric id wins. Returns `None`
/// when the document holds no such element.
pub fn extract_feature(doc: &str, id: FeatureId) -> Result<Option<String>> {
    let mut reader = Reader::from_str(doc);
    loop {
        let start = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) => {
                if is_feature(&e, id)? {
                    reader.read_to_end(e.name())?;
                    let end = reader.buffer_position();
                    return Ok(Some(doc[start..end].to_string()));
                }
            }
            Event::Empty(e) => {
                if is_feature(&e, id)? {
                    let end = reader.buffer_position();
                    return Ok(Some(doc[start..end].to_string()));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Remove every reference to `child` from a parent body.
///
/// Drops `<nd ref="N"/>` entries when the child is a node (way parents) and
/// `<member type="..." ref="..."/>` entries whose `(type, ref)` pair matches
/// the child (relation parents). All other bytes are preserved verbatim.
/// Returns the filtered body and whether anything was actually removed.
pub fn strip_refs(body: &str, child: FeatureId) -> Result<(String, bool)> {
    let mut reader = Reader::from_str(body);
    let mut out = String::with_capacity(body.len());
    let mut copied = 0usize;
    let mut removed = false;
    loop {
        let start = reader.buffer_position();
        match reader.read_event()? {
            Event::Empty(e) => {
                if references(&e, child)? {
                    out.push_str(&body[copied..start]);
                    copied = reader.buffer_position();
                    removed = true;
                }
            }
            Event::Start(e) => {
                if references(&e, child)? {
                    reader.read_to_end(e.name())?;
                    out.push_str(&body[copied..start]);
                    copied = reader.buffer_position();
                    removed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out.push_str(&body[copied..]);
    Ok((out, removed))
}

fn is_feature(e: &BytesStart<'_>, id: FeatureId) -> Result<bool> {
    if e.name().as_ref() != id.kind.as_tag().as_bytes() {
        return Ok(false);
    }
    Ok(attr_u64(e, "id")? == Some(id.num))
}

fn references(e: &BytesStart<'_>, child: FeatureId) -> Result<bool> {
    match e.name().as_ref() {
        b"nd" if child.kind == Kind::Node => Ok(attr_u64(e, "ref")? == Some(child.num)),
        b"member" => {
            let kind = attr(e, "type")?
                .map(|a| a.unescape_value().map(|v| Kind::from_tag(&v)))
                .transpose()?
                .flatten();
            Ok(kind == Some(child.kind) && attr_u64(e, "ref")? == Some(child.num))
        }
        _ => Ok(false),
    }
}

fn attr<'a>(e: &'a BytesStart<'_>, name: &str) -> Result<Option<Attribute<'a>>> {
    Ok(e.try_get_attribute(name).map_err(quick_xml::Error::from)?)
}

fn attr_u64(e: &BytesStart<'_>, name: &str) -> Result<Option<u64>> {
    let Some(a) = attr(e, name)? else {
        return Ok(None);
    };
    // Non-numeric ids never match anything we are looking for.
    Ok(a.unescape_value()?.parse::<u64>().ok())
}
