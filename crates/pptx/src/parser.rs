//! Slide-XML and relationship-part parsing.

use quick_xml::events::Event;
use quick_xml::Reader;
use slidelink_core::{Error, Result};
use std::collections::HashMap;

use crate::document::{FontProps, Paragraph, Run, Shape, Slide, TextBody};

/// Relationship type URI for external hyperlinks.
pub(crate) const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// One `<Relationship>` entry from a `.rels` part.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Parse a `.rels` part into its relationship entries.
pub(crate) fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                };

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => rel.id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Type" => rel.rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => {
                            let raw = String::from_utf8_lossy(&attr.value).to_string();
                            rel.target = unescape_xml(&raw);
                        }
                        _ => {}
                    }
                }

                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Get the ordered list of slide part paths from the presentation
/// relationships part.
pub(crate) fn slide_order(presentation_rels_xml: &str) -> Result<Vec<String>> {
    let rels = parse_relationships(presentation_rels_xml)?;
    let mut slides: Vec<(String, Option<usize>)> = Vec::new();

    for rel in rels {
        // Slide relationships, excluding layouts and masters.
        if rel.rel_type.contains("/slide")
            && !rel.rel_type.contains("slideLayout")
            && !rel.rel_type.contains("slideMaster")
        {
            let order_num =
                extract_slide_number(&rel.id).or_else(|| extract_slide_number(&rel.target));
            let full_path = if let Some(stripped) = rel.target.strip_prefix('/') {
                stripped.to_string()
            } else {
                format!("ppt/{}", rel.target)
            };
            slides.push((full_path, order_num));
        }
    }

    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(path, _)| path).collect())
}

/// Parse one slide part into the document model.
///
/// `hyperlink_rels` maps relationship ids from the slide's own `.rels`
/// part to external target URLs, for resolving `<a:hlinkClick r:id>`.
///
/// Each paragraph records its ordinal among all `<a:p>` elements of the
/// part, counted in document order. The saver counts the same way when
/// splicing rewritten runs, so the two passes always line up.
pub(crate) fn parse_slide_xml(
    xml: &str,
    hyperlink_rels: &HashMap<String, String>,
    number: usize,
    path: &str,
) -> Result<Slide> {
    let mut reader = Reader::from_str(xml);

    let mut slide = Slide::with_path(number, path);

    let mut shape_open = false;
    let mut in_tx_body = false;
    let mut in_run = false;
    let mut in_rpr = false;
    let mut in_text = false;

    let mut paragraph_ordinal: usize = 0;
    let mut shape_paragraphs: Vec<Paragraph> = Vec::new();
    let mut current_runs: Vec<Run> = Vec::new();
    let mut current_para_ordinal: usize = 0;
    let mut in_paragraph = false;
    let mut current_run: Option<Run> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" | b"pic" => {
                        shape_open = true;
                        shape_paragraphs.clear();
                    }
                    b"txBody" if shape_open => {
                        in_tx_body = true;
                    }
                    b"p" => {
                        // Count every paragraph element in the part, even
                        // outside captured shapes, to keep ordinals stable.
                        if in_tx_body {
                            in_paragraph = true;
                            current_runs.clear();
                            current_para_ordinal = paragraph_ordinal;
                        }
                        paragraph_ordinal += 1;
                    }
                    b"r" if in_paragraph => {
                        in_run = true;
                        current_run = Some(Run::default());
                    }
                    b"rPr" if in_run => {
                        in_rpr = true;
                        if let Some(run) = current_run.as_mut() {
                            apply_run_properties(e, &mut run.font);
                        }
                    }
                    b"t" if in_run => {
                        in_text = true;
                    }
                    b"latin" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_latin(e, &mut run.font);
                        }
                    }
                    b"srgbClr" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_color(e, &mut run.font);
                        }
                    }
                    b"hlinkClick" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_hyperlink(e, hyperlink_rels, &mut run.hyperlink);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"p" => {
                        paragraph_ordinal += 1;
                    }
                    b"rPr" if in_run => {
                        if let Some(run) = current_run.as_mut() {
                            apply_run_properties(e, &mut run.font);
                        }
                    }
                    b"latin" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_latin(e, &mut run.font);
                        }
                    }
                    b"srgbClr" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_color(e, &mut run.font);
                        }
                    }
                    b"hlinkClick" if in_rpr => {
                        if let Some(run) = current_run.as_mut() {
                            apply_hyperlink(e, hyperlink_rels, &mut run.hyperlink);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    if let Some(run) = current_run.as_mut() {
                        let text = e.unescape().unwrap_or_default();
                        run.text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"t" => in_text = false,
                    b"rPr" => in_rpr = false,
                    b"r" => {
                        in_run = false;
                        if let Some(run) = current_run.take() {
                            current_runs.push(run);
                        }
                    }
                    b"p" => {
                        if in_paragraph {
                            shape_paragraphs.push(Paragraph::with_ordinal(
                                std::mem::take(&mut current_runs),
                                current_para_ordinal,
                            ));
                            in_paragraph = false;
                        }
                    }
                    b"txBody" => {
                        in_tx_body = false;
                    }
                    b"sp" | b"pic" => {
                        if shape_open {
                            let text_body = if shape_paragraphs.is_empty() {
                                None
                            } else {
                                Some(TextBody::new(std::mem::take(&mut shape_paragraphs)))
                            };
                            slide.shapes.push(Shape { text_body });
                            shape_open = false;
                            in_tx_body = false;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("XML parsing error in {}: {}", path, e);
                break;
            }
            _ => {}
        }
    }

    Ok(slide)
}

/// Read run-level formatting attributes from an `<a:rPr>` element.
fn apply_run_properties(e: &quick_xml::events::BytesStart<'_>, font: &mut FontProps) {
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"sz" => {
                // Size is stored in hundredths of a point.
                if let Ok(hundredths) = value.parse::<f32>() {
                    font.size_points = Some(hundredths / 100.0);
                }
            }
            b"b" => font.bold = parse_ooxml_bool(&value),
            b"i" => font.italic = parse_ooxml_bool(&value),
            b"u" => font.underline = Some(value != "none"),
            _ => {}
        }
    }
}

/// Read the typeface from an `<a:latin>` element.
fn apply_latin(e: &quick_xml::events::BytesStart<'_>, font: &mut FontProps) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"typeface" {
            font.family_name = Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
}

/// Read the fill color from an `<a:srgbClr>` element.
fn apply_color(e: &quick_xml::events::BytesStart<'_>, font: &mut FontProps) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"val" {
            font.color_rgb = Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
}

/// Resolve an `<a:hlinkClick r:id>` through the slide's relationships.
fn apply_hyperlink(
    e: &quick_xml::events::BytesStart<'_>,
    hyperlink_rels: &HashMap<String, String>,
    hyperlink: &mut Option<String>,
) {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == b"id" {
            let rid = String::from_utf8_lossy(&attr.value).to_string();
            match hyperlink_rels.get(&rid) {
                Some(target) => *hyperlink = Some(target.clone()),
                None => log::warn!("Hyperlink relationship '{}' not found in slide rels", rid),
            }
        }
    }
}

/// Parse an OOXML boolean attribute value.
fn parse_ooxml_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Decode the XML entities that can appear in attribute values.
fn unescape_xml(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
  <p:cSld><p:spTree>
    <p:sp>
      <p:txBody>
        <a:bodyPr/>
        <a:p>
          <a:r>
            <a:rPr lang="en-US" sz="1800" b="1" u="sng">
              <a:solidFill><a:srgbClr val="FF0000"/></a:solidFill>
              <a:latin typeface="Calibri"/>
            </a:rPr>
            <a:t>see </a:t>
          </a:r>
          <a:r>
            <a:rPr lang="en-US">
              <a:hlinkClick xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:id="rId2"/>
            </a:rPr>
            <a:t>https://a.co/x.mp4</a:t>
          </a:r>
        </a:p>
        <a:p>
          <a:r><a:t>plain &amp; simple</a:t></a:r>
        </a:p>
      </p:txBody>
    </p:sp>
  </p:spTree></p:cSld>
</p:sld>"#;

    fn rels() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("rId2".to_string(), "https://a.co/x.mp4".to_string());
        map
    }

    #[test]
    fn parses_runs_with_formatting() {
        let slide = parse_slide_xml(SLIDE_XML, &rels(), 1, "ppt/slides/slide1.xml").unwrap();
        assert_eq!(slide.shapes.len(), 1);

        let body = slide.shapes[0].text_body.as_ref().unwrap();
        assert_eq!(body.paragraphs.len(), 2);

        let first = &body.paragraphs[0];
        assert_eq!(first.text(), "see https://a.co/x.mp4");
        assert_eq!(first.runs.len(), 2);

        let font = &first.runs[0].font;
        assert_eq!(font.family_name.as_deref(), Some("Calibri"));
        assert_eq!(font.size_points, Some(18.0));
        assert_eq!(font.bold, Some(true));
        assert_eq!(font.italic, None);
        assert_eq!(font.underline, Some(true));
        assert_eq!(font.color_rgb.as_deref(), Some("FF0000"));
    }

    #[test]
    fn resolves_hyperlinks_through_slide_rels() {
        let slide = parse_slide_xml(SLIDE_XML, &rels(), 1, "ppt/slides/slide1.xml").unwrap();
        let body = slide.shapes[0].text_body.as_ref().unwrap();
        assert_eq!(
            body.paragraphs[0].runs[1].hyperlink.as_deref(),
            Some("https://a.co/x.mp4")
        );
        assert_eq!(body.paragraphs[0].runs[0].hyperlink, None);
    }

    #[test]
    fn unescapes_run_text() {
        let slide = parse_slide_xml(SLIDE_XML, &rels(), 1, "ppt/slides/slide1.xml").unwrap();
        let body = slide.shapes[0].text_body.as_ref().unwrap();
        assert_eq!(body.paragraphs[1].text(), "plain & simple");
    }

    #[test]
    fn paragraph_ordinals_count_in_document_order() {
        let slide = parse_slide_xml(SLIDE_XML, &rels(), 1, "ppt/slides/slide1.xml").unwrap();
        let body = slide.shapes[0].text_body.as_ref().unwrap();
        assert_eq!(body.paragraphs[0].ordinal, 0);
        assert_eq!(body.paragraphs[1].ordinal, 1);
    }

    #[test]
    fn parses_relationship_entries() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://a.co/x.mp4?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[1].id, "rId2");
        assert_eq!(rels[1].target, "https://a.co/x.mp4?a=1&b=2");
    }

    #[test]
    fn slide_order_sorts_by_relationship_number() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
</Relationships>"#;
        let order = slide_order(xml).unwrap();
        assert_eq!(
            order,
            vec!["ppt/slides/slide1.xml", "ppt/slides/slide2.xml"]
        );
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
