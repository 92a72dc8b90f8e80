//! The packaged-XML container: a .pptx archive held in memory.
//!
//! Loading reads every member up front; saving copies untouched members
//! verbatim and re-emits only the slide parts whose paragraphs were
//! rewritten, splicing new run lists into the original XML and adding
//! hyperlink relationships to the slide's `.rels` part.

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use slidelink_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};
use zip::ZipArchive;

use crate::document::{Document, Run};
use crate::parser::{self, local_name, HYPERLINK_REL_TYPE};

/// Relationships namespace declared on emitted `<a:hlinkClick>` elements.
const OFFICE_REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Path of the presentation relationships part, which defines slide order.
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Skeleton for a slide `.rels` part created from scratch.
const EMPTY_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>";

/// An opened slide-deck package.
#[derive(Debug)]
pub struct DeckPackage {
    /// Members in archive order: (path, raw bytes).
    members: Vec<(String, Vec<u8>)>,
}

impl DeckPackage {
    /// Open a package from raw bytes. A corrupt archive is fatal for the
    /// whole job; an unreadable individual member is logged and skipped.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Package(format!("Failed to open archive: {}", e)))?;

        let mut members = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = match archive.by_index(index) {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("Skipping unreadable archive member #{}: {}", index, e);
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            if let Err(e) = file.read_to_end(&mut content) {
                log::warn!("Skipping unreadable archive member '{}': {}", name, e);
                continue;
            }
            members.push((name, content));
        }

        Ok(Self { members })
    }

    /// Raw bytes of a member, if present.
    pub fn member(&self, path: &str) -> Option<&[u8]> {
        self.members
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, content)| content.as_slice())
    }

    fn member_str(&self, path: &str) -> Option<&str> {
        self.member(path).and_then(|bytes| {
            std::str::from_utf8(bytes)
                .map_err(|e| log::warn!("Member '{}' is not valid UTF-8: {}", path, e))
                .ok()
        })
    }

    /// Text parts of the package: members whose path ends in a markup or
    /// relationship suffix, decoded as UTF-8. Undecodable parts are
    /// logged and skipped.
    pub fn text_parts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members
            .iter()
            .filter(|(name, _)| name.ends_with(".xml") || name.ends_with(".rels"))
            .filter_map(|(name, content)| match std::str::from_utf8(content) {
                Ok(text) => Some((name.as_str(), text)),
                Err(e) => {
                    log::warn!("Skipping non-UTF-8 text part '{}': {}", name, e);
                    None
                }
            })
    }

    /// Load the rich-text document model from the slide parts.
    pub fn load_document(&self) -> Result<Document> {
        let rels_xml = self.member_str(PRESENTATION_RELS).ok_or_else(|| {
            Error::Package(format!("Missing presentation relationships: {}", PRESENTATION_RELS))
        })?;
        let order = parser::slide_order(rels_xml)?;

        let mut document = Document::new();
        for (idx, slide_path) in order.iter().enumerate() {
            let xml = self.member_str(slide_path).ok_or_else(|| {
                Error::Package(format!("Missing slide part: {}", slide_path))
            })?;

            let hyperlink_rels = match self.member_str(&slide_rels_path(slide_path)) {
                Some(rels) => parser::parse_relationships(rels)?
                    .into_iter()
                    .filter(|rel| rel.rel_type == HYPERLINK_REL_TYPE)
                    .map(|rel| (rel.id, rel.target))
                    .collect(),
                None => HashMap::new(),
            };

            let slide = parser::parse_slide_xml(xml, &hyperlink_rels, idx + 1, slide_path)?;
            document.add_slide(slide);
        }

        Ok(document)
    }

    /// Serialize the package with the document's modifications applied.
    pub fn save(&self, document: &Document) -> Result<Vec<u8>> {
        let plans = self.build_plans(document)?;
        let rels_by_path: HashMap<&str, &SlidePlan> =
            plans.values().map(|plan| (plan.rels_path.as_str(), plan)).collect();

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, content) in &self.members {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| Error::Package(format!("Failed to write '{}': {}", name, e)))?;

            if let Some(plan) = plans.get(name.as_str()) {
                let xml = std::str::from_utf8(content).map_err(|e| {
                    Error::Package(format!("Slide part '{}' is not valid UTF-8: {}", name, e))
                })?;
                let rewritten = rewrite_slide_xml(xml, plan)?;
                writer.write_all(rewritten.as_bytes())?;
            } else if let Some(plan) = rels_by_path.get(name.as_str()) {
                let xml = std::str::from_utf8(content).map_err(|e| {
                    Error::Package(format!("Rels part '{}' is not valid UTF-8: {}", name, e))
                })?;
                let appended = append_relationships(xml, &plan.new_rels)?;
                writer.write_all(appended.as_bytes())?;
            } else {
                writer.write_all(content)?;
            }
        }

        // Slides that gained hyperlinks but had no .rels part yet.
        for plan in plans.values() {
            if self.member(&plan.rels_path).is_none() && !plan.new_rels.is_empty() {
                writer
                    .start_file(plan.rels_path.as_str(), options)
                    .map_err(|e| {
                        Error::Package(format!("Failed to write '{}': {}", plan.rels_path, e))
                    })?;
                let content = append_relationships(EMPTY_RELS, &plan.new_rels)?;
                writer.write_all(content.as_bytes())?;
            }
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::Package(format!("Failed to finish archive: {}", e)))?;
        Ok(cursor.into_inner())
    }

    /// Work out, per modified slide, which paragraphs to splice and which
    /// hyperlink relationships to add or reuse.
    fn build_plans(&self, document: &Document) -> Result<HashMap<String, SlidePlan>> {
        let mut plans = HashMap::new();

        for slide in document.slides.iter().filter(|s| s.is_modified()) {
            let rels_path = slide_rels_path(slide.path());
            let existing = match self.member_str(&rels_path) {
                Some(xml) => parser::parse_relationships(xml)?,
                None => Vec::new(),
            };

            let mut next_id = existing
                .iter()
                .filter_map(|rel| trailing_number(&rel.id))
                .max()
                .unwrap_or(0);

            // Reuse an existing relationship when the target already has one.
            let mut link_ids: HashMap<String, String> = existing
                .iter()
                .filter(|rel| rel.rel_type == HYPERLINK_REL_TYPE)
                .map(|rel| (rel.target.clone(), rel.id.clone()))
                .collect();

            let mut plan = SlidePlan {
                rels_path,
                paragraphs: BTreeMap::new(),
                link_ids: HashMap::new(),
                new_rels: Vec::new(),
            };

            for paragraph in slide.paragraphs().filter(|p| p.is_modified()) {
                for run in &paragraph.runs {
                    if let Some(address) = &run.hyperlink {
                        if !link_ids.contains_key(address) {
                            next_id += 1;
                            let rid = format!("rId{}", next_id);
                            plan.new_rels.push((rid.clone(), address.clone()));
                            link_ids.insert(address.clone(), rid);
                        }
                    }
                }
                plan.paragraphs.insert(paragraph.ordinal, paragraph.runs.clone());
            }

            plan.link_ids = link_ids;
            plans.insert(slide.path().to_string(), plan);
        }

        Ok(plans)
    }
}

/// Rewrite instructions for one slide part.
struct SlidePlan {
    /// Path of the slide's `.rels` part (may not exist yet).
    rels_path: String,
    /// New run lists keyed by paragraph ordinal within the part.
    paragraphs: BTreeMap<usize, Vec<Run>>,
    /// Hyperlink address to relationship id, existing and new.
    link_ids: HashMap<String, String>,
    /// Relationships to append: (id, target).
    new_rels: Vec<(String, String)>,
}

/// `.rels` path of a slide part: "ppt/slides/slide1.xml" becomes
/// "ppt/slides/_rels/slide1.xml.rels".
fn slide_rels_path(slide_path: &str) -> String {
    match slide_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", slide_path),
    }
}

/// Trailing decimal digits of a relationship id like "rId7".
fn trailing_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}

/// Stream a slide part, replacing the run lists of planned paragraphs.
///
/// Paragraph properties (`<a:pPr>`) of a replaced paragraph are kept;
/// its runs, breaks, fields, and trailing run properties are dropped in
/// favor of the new run list. Everything outside planned paragraphs is
/// copied verbatim.
fn rewrite_slide_xml(xml: &str, plan: &SlidePlan) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut ordinal: usize = 0;
    let mut replacing: Option<usize> = None;
    let mut ppr_depth: usize = 0;

    loop {
        let ev = reader
            .read_event()
            .map_err(|e| Error::Xml(format!("Error rewriting slide XML: {}", e)))?;

        match &ev {
            Event::Eof => break,
            Event::Start(e) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if name == b"p" && replacing.is_none() {
                    let index = ordinal;
                    ordinal += 1;
                    write_event(&mut writer, ev.clone())?;
                    if plan.paragraphs.contains_key(&index) {
                        replacing = Some(index);
                        ppr_depth = 0;
                    }
                    continue;
                }

                if replacing.is_some() {
                    if ppr_depth > 0 {
                        ppr_depth += 1;
                        write_event(&mut writer, ev.clone())?;
                    } else if name == b"pPr" {
                        ppr_depth = 1;
                        write_event(&mut writer, ev.clone())?;
                    }
                    // Other content of a replaced paragraph is dropped.
                } else {
                    write_event(&mut writer, ev.clone())?;
                }
            }
            Event::Empty(e) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if name == b"p" && replacing.is_none() {
                    // Self-closing paragraph: counts toward ordinals but
                    // has no runs to replace.
                    ordinal += 1;
                    write_event(&mut writer, ev.clone())?;
                    continue;
                }

                if replacing.is_some() {
                    if ppr_depth > 0 || name == b"pPr" {
                        write_event(&mut writer, ev.clone())?;
                    }
                } else {
                    write_event(&mut writer, ev.clone())?;
                }
            }
            Event::End(e) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if let Some(index) = replacing {
                    if ppr_depth > 0 {
                        ppr_depth -= 1;
                        write_event(&mut writer, ev.clone())?;
                    } else if name == b"p" {
                        if let Some(runs) = plan.paragraphs.get(&index) {
                            write_runs(&mut writer, runs, &plan.link_ids)?;
                        }
                        write_event(&mut writer, ev.clone())?;
                        replacing = None;
                    }
                    // Other end tags inside the replaced paragraph are dropped.
                } else {
                    write_event(&mut writer, ev.clone())?;
                }
            }
            _ => {
                if replacing.is_some() && ppr_depth == 0 {
                    // Text and other content of dropped runs.
                } else {
                    write_event(&mut writer, ev.clone())?;
                }
            }
        }
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Xml(format!("Rewritten XML is not UTF-8: {}", e)))
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Xml(format!("Error writing slide XML: {}", e)))
}

/// Emit `<a:r>` elements for a rewritten run list.
///
/// Only formatting attributes present on the run are written; absent
/// fields are omitted so inheritance is untouched.
fn write_runs(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    runs: &[Run],
    link_ids: &HashMap<String, String>,
) -> Result<()> {
    for run in runs {
        write_event(writer, Event::Start(BytesStart::new("a:r")))?;

        let mut rpr = BytesStart::new("a:rPr");
        if let Some(size) = run.font.size_points {
            let hundredths = (size * 100.0).round() as i64;
            rpr.push_attribute(("sz", hundredths.to_string().as_str()));
        }
        if let Some(bold) = run.font.bold {
            rpr.push_attribute(("b", if bold { "1" } else { "0" }));
        }
        if let Some(italic) = run.font.italic {
            rpr.push_attribute(("i", if italic { "1" } else { "0" }));
        }
        if let Some(underline) = run.font.underline {
            rpr.push_attribute(("u", if underline { "sng" } else { "none" }));
        }

        let has_children = run.font.color_rgb.is_some()
            || run.font.family_name.is_some()
            || run.hyperlink.is_some();

        if has_children {
            write_event(writer, Event::Start(rpr))?;

            if let Some(color) = &run.font.color_rgb {
                write_event(writer, Event::Start(BytesStart::new("a:solidFill")))?;
                let mut clr = BytesStart::new("a:srgbClr");
                clr.push_attribute(("val", color.as_str()));
                write_event(writer, Event::Empty(clr))?;
                write_event(writer, Event::End(BytesEnd::new("a:solidFill")))?;
            }

            if let Some(typeface) = &run.font.family_name {
                let mut latin = BytesStart::new("a:latin");
                latin.push_attribute(("typeface", typeface.as_str()));
                write_event(writer, Event::Empty(latin))?;
            }

            if let Some(address) = &run.hyperlink {
                let rid = link_ids.get(address).ok_or_else(|| {
                    Error::Package(format!("No relationship id for hyperlink '{}'", address))
                })?;
                let mut hlink = BytesStart::new("a:hlinkClick");
                hlink.push_attribute(("xmlns:r", OFFICE_REL_NS));
                hlink.push_attribute(("r:id", rid.as_str()));
                write_event(writer, Event::Empty(hlink))?;
            }

            write_event(writer, Event::End(BytesEnd::new("a:rPr")))?;
        } else {
            write_event(writer, Event::Empty(rpr))?;
        }

        write_event(writer, Event::Start(BytesStart::new("a:t")))?;
        write_event(writer, Event::Text(BytesText::new(&run.text)))?;
        write_event(writer, Event::End(BytesEnd::new("a:t")))?;
        write_event(writer, Event::End(BytesEnd::new("a:r")))?;
    }

    Ok(())
}

/// Insert `<Relationship>` entries before the closing tag of a `.rels`
/// part, marked `TargetMode="External"`.
fn append_relationships(xml: &str, new_rels: &[(String, String)]) -> Result<String> {
    if new_rels.is_empty() {
        return Ok(xml.to_string());
    }

    let close = xml
        .rfind("</Relationships>")
        .ok_or_else(|| Error::Xml("Malformed relationships part".to_string()))?;

    let mut out = String::with_capacity(xml.len() + new_rels.len() * 128);
    out.push_str(&xml[..close]);
    for (id, target) in new_rels {
        out.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\" TargetMode=\"External\"/>",
            id,
            HYPERLINK_REL_TYPE,
            escape(target)
        ));
    }
    out.push_str(&xml[close..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FontProps, Run};
    use zip::write::FileOptions;

    const PRESENTATION_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
</Relationships>"#;

    fn slide_xml(text: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p><a:pPr algn="l"/><a:r><a:rPr sz="1800" b="1"><a:latin typeface="Calibri"/></a:rPr><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld>
</p:sld>"#,
            text
        )
    }

    fn fixture_package(slide1_text: &str, slide2_text: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        let members = [
            (
                "[Content_Types].xml",
                "<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"><Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/><Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>".to_string(),
            ),
            ("ppt/_rels/presentation.xml.rels", PRESENTATION_RELS_XML.to_string()),
            ("ppt/slides/slide1.xml", slide_xml(slide1_text)),
            ("ppt/slides/slide2.xml", slide_xml(slide2_text)),
        ];

        for (name, content) in members {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn open_rejects_corrupt_archives() {
        let err = DeckPackage::open(b"not a zip file").unwrap_err();
        assert!(matches!(err, Error::Package(_)));
    }

    #[test]
    fn loads_slides_in_relationship_order() {
        let bytes = fixture_package("first slide", "second slide");
        let package = DeckPackage::open(&bytes).unwrap();
        let document = package.load_document().unwrap();

        assert_eq!(document.slides.len(), 2);
        assert_eq!(document.slides[0].number, 1);
        assert_eq!(
            document.slides[0].paragraphs().next().unwrap().text(),
            "first slide"
        );
        assert_eq!(
            document.slides[1].paragraphs().next().unwrap().text(),
            "second slide"
        );
    }

    #[test]
    fn text_parts_cover_xml_and_rels_members() {
        let bytes = fixture_package("a", "b");
        let package = DeckPackage::open(&bytes).unwrap();
        let paths: Vec<&str> = package.text_parts().map(|(path, _)| path).collect();
        assert!(paths.contains(&"ppt/slides/slide1.xml"));
        assert!(paths.contains(&"ppt/_rels/presentation.xml.rels"));
        assert!(paths.contains(&"[Content_Types].xml"));
    }

    #[test]
    fn save_round_trips_a_rewritten_paragraph() {
        let bytes = fixture_package("see https://a.co/x.mp4 now", "untouched");
        let package = DeckPackage::open(&bytes).unwrap();
        let mut document = package.load_document().unwrap();

        // Split the paragraph around the URL, hyperlinking the middle run.
        let font = FontProps {
            family_name: Some("Calibri".to_string()),
            size_points: Some(18.0),
            bold: Some(true),
            ..FontProps::default()
        };
        {
            let paragraph = document.slides[0].paragraphs_mut().next().unwrap();
            paragraph.replace_runs(vec![
                Run::new("see ").with_font(font.clone()),
                Run::new("https://a.co/x.mp4")
                    .with_font(font.clone())
                    .with_hyperlink("https://a.co/x.mp4"),
                Run::new(" now").with_font(font),
            ]);
        }

        let saved = package.save(&document).unwrap();
        let reopened = DeckPackage::open(&saved).unwrap();
        let reloaded = reopened.load_document().unwrap();

        let paragraph = reloaded.slides[0].paragraphs().next().unwrap();
        assert_eq!(paragraph.runs.len(), 3);
        assert_eq!(paragraph.runs[0].text, "see ");
        assert_eq!(paragraph.runs[1].text, "https://a.co/x.mp4");
        assert_eq!(
            paragraph.runs[1].hyperlink.as_deref(),
            Some("https://a.co/x.mp4")
        );
        assert_eq!(paragraph.runs[2].text, " now");
        assert_eq!(paragraph.text(), "see https://a.co/x.mp4 now");

        // Formatting propagated to the new runs.
        assert_eq!(paragraph.runs[0].font.family_name.as_deref(), Some("Calibri"));
        assert_eq!(paragraph.runs[1].font.size_points, Some(18.0));
        assert_eq!(paragraph.runs[2].font.bold, Some(true));

        // The slide gained a hyperlink relationship part.
        let rels = reopened
            .member_str("ppt/slides/_rels/slide1.xml.rels")
            .expect("slide rels created");
        assert!(rels.contains(HYPERLINK_REL_TYPE));
        assert!(rels.contains("TargetMode=\"External\""));

        // Untouched members are carried over byte for byte.
        assert_eq!(
            reopened.member("ppt/slides/slide2.xml"),
            package.member("ppt/slides/slide2.xml")
        );
    }

    #[test]
    fn save_escapes_hyperlink_targets_in_rels() {
        let bytes = fixture_package("https://h/index.html?data_url=https://h/b.json&amp;v=1", "x");
        let package = DeckPackage::open(&bytes).unwrap();
        let mut document = package.load_document().unwrap();

        let url = "https://h/index.html?data_url=https://h/b.json&v=1";
        {
            let paragraph = document.slides[0].paragraphs_mut().next().unwrap();
            paragraph.replace_runs(vec![Run::new(url).with_hyperlink(url)]);
        }

        let saved = package.save(&document).unwrap();
        let reopened = DeckPackage::open(&saved).unwrap();
        let rels = reopened
            .member_str("ppt/slides/_rels/slide1.xml.rels")
            .unwrap();
        assert!(rels.contains("data_url=https://h/b.json&amp;v=1"));

        // And it resolves back to the unescaped address on reload.
        let reloaded = reopened.load_document().unwrap();
        let paragraph = reloaded.slides[0].paragraphs().next().unwrap();
        assert_eq!(paragraph.runs[0].hyperlink.as_deref(), Some(url));
    }

    #[test]
    fn slide_rels_path_layout() {
        assert_eq!(
            slide_rels_path("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
    }

    #[test]
    fn trailing_number_parses_relationship_ids() {
        assert_eq!(trailing_number("rId7"), Some(7));
        assert_eq!(trailing_number("rId12"), Some(12));
        assert_eq!(trailing_number("rels"), None);
    }
}
