//! Word (.docx) to HTML conversion
//!
//! This module reads the OOXML package directly with `zip` and `quick-xml`
//! and produces simple semantic HTML:
//! - Paragraph styles named `heading N` (or `Title`) and paragraphs with an
//!   outline level become `<h1>`..`<h6>`
//! - Bold, italic, underline, strike-through and super-/subscript runs
//! - Hyperlinks, tables, numbered and bulleted lists
//! - Embedded images, in document order, with the `src` chosen by the caller
//! - Footnotes and endnotes, appended as one ordered list with back-references
//!
//! Anything else in the package (headers, comments, text boxes, fields) is
//! ignored.

use crate::page::escape_html;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Main document part of a WordprocessingML package
const DOCUMENT_PART: &str = "word/document.xml";

/// Markup shown in place of a document that converts to nothing
pub const NO_CONTENT: &str = "<p>No content found</p>";

/// Errors that can occur while converting a .docx package
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("not a valid .docx package: {0}")]
    Package(#[from] ZipError),

    #[error("missing package part {0}")]
    MissingPart(String),

    #[error("failed to read package part {part}: {source}")]
    Read {
        part: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },
}

/// An image embedded in the converted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// Raw image bytes
    pub data: Vec<u8>,
    /// Declared (or sniffed) media type, e.g. `image/png`
    pub content_type: String,
}

/// Result of converting a document
#[derive(Debug, Clone, Default)]
pub struct ConvertedDocument {
    /// Rendered body markup
    pub html: String,
    /// Embedded images in the order they appear
    pub images: Vec<EmbeddedImage>,
    /// Non-fatal problems found during conversion
    pub messages: Vec<String>,
}

/// Converts .docx packages to HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxConverter;

impl DocxConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert a .docx package
    ///
    /// `image_src` is called once per embedded image, in document order, and
    /// returns the `src` attribute to use for it.
    pub fn convert(
        &self,
        bytes: &[u8],
        image_src: &mut dyn FnMut(&EmbeddedImage) -> String,
    ) -> Result<ConvertedDocument, ConvertError> {
        let mut package = Package::open(bytes)?;

        let document = package
            .part(DOCUMENT_PART)?
            .ok_or_else(|| ConvertError::MissingPart(DOCUMENT_PART.to_string()))?;
        let document_events = read_events(DOCUMENT_PART, &document)?;

        let styles = match package.part("word/styles.xml")? {
            Some(data) => Styles::parse(&read_events("word/styles.xml", &data)?),
            None => Styles::default(),
        };
        let numbering = match package.part("word/numbering.xml")? {
            Some(data) => Numbering::parse(&read_events("word/numbering.xml", &data)?),
            None => Numbering::default(),
        };
        let content_types = match package.part("[Content_Types].xml")? {
            Some(data) => ContentTypes::parse(&read_events("[Content_Types].xml", &data)?),
            None => ContentTypes::default(),
        };
        let rels = package.relationships(DOCUMENT_PART)?;

        let mut ctx = ConversionContext {
            package,
            styles,
            numbering,
            content_types,
            image_src,
            images: Vec::new(),
            note_refs: Vec::new(),
            messages: Vec::new(),
        };

        let mut body = BodyState::new("word");
        for event in &document_events {
            body.handle(event, &mut ctx, &rels)?;
        }
        let mut html = body.finish(&ctx.numbering);
        html.push_str(&convert_notes(&mut ctx)?);

        log::info!(
            "Converted document: {} bytes of markup, {} images",
            html.len(),
            ctx.images.len()
        );
        for message in &ctx.messages {
            log::warn!("{}", message);
        }

        Ok(ConvertedDocument {
            html,
            images: ctx.images,
            messages: ctx.messages,
        })
    }

    /// Convert a .docx package with images inlined as `data:` URLs
    pub fn convert_inline(&self, bytes: &[u8]) -> Result<ConvertedDocument, ConvertError> {
        self.convert(bytes, &mut data_url)
    }
}

/// Encode an image as a `data:` URL
pub fn data_url(image: &EmbeddedImage) -> String {
    format!(
        "data:{};base64,{}",
        image.content_type,
        STANDARD.encode(&image.data)
    )
}

/// An opened .docx (zip) package
struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    fn open(bytes: &'a [u8]) -> Result<Self, ConvertError> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes))?,
        })
    }

    /// Read a part, returning `None` when it does not exist
    fn part(&mut self, name: &str) -> Result<Option<Vec<u8>>, ConvertError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|source| ConvertError::Read {
                part: name.to_string(),
                source,
            })?;
        Ok(Some(data))
    }

    /// Relationships of a part, e.g. `word/_rels/document.xml.rels` for `word/document.xml`
    fn relationships(&mut self, part: &str) -> Result<Relationships, ConvertError> {
        let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
        let rels_path = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };
        match self.part(&rels_path)? {
            Some(data) => Ok(Relationships::parse(&read_events(&rels_path, &data)?)),
            None => Ok(Relationships::default()),
        }
    }
}

/// A flattened XML event with namespace prefixes stripped
#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlEvent {
    Open {
        name: String,
        attrs: HashMap<String, String>,
    },
    Close {
        name: String,
    },
    Text(String),
}

impl XmlEvent {
    fn attr(&self, key: &str) -> Option<&str> {
        match self {
            XmlEvent::Open { attrs, .. } => attrs.get(key).map(String::as_str),
            _ => None,
        }
    }
}

/// Read a whole XML part into events; empty elements become an open/close pair
fn read_events(part: &str, data: &[u8]) -> Result<Vec<XmlEvent>, ConvertError> {
    let xml_error = |source| ConvertError::Xml {
        part: part.to_string(),
        source,
    };

    let mut reader = Reader::from_reader(data);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut events = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(ref e) => events.push(open_event(&reader, e)),
            Event::Empty(ref e) => {
                events.push(open_event(&reader, e));
                events.push(XmlEvent::Close {
                    name: local_name(e.name().as_ref()),
                });
            }
            Event::End(ref e) => events.push(XmlEvent::Close {
                name: local_name(e.name().as_ref()),
            }),
            Event::Text(ref t) => {
                let text = t.unescape().map_err(xml_error)?;
                events.push(XmlEvent::Text(text.into_owned()));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(events)
}

fn open_event(reader: &Reader<&[u8]>, element: &BytesStart) -> XmlEvent {
    let mut attrs = HashMap::new();
    for attr in element.attributes().with_checks(false).flatten() {
        if let Ok(value) = attr.decode_and_unescape_value(reader) {
            attrs.insert(local_name(attr.key.as_ref()), value.into_owned());
        }
    }
    XmlEvent::Open {
        name: local_name(element.name().as_ref()),
        attrs,
    }
}

fn local_name(name: &[u8]) -> String {
    let local = match name.iter().position(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    String::from_utf8_lossy(local).into_owned()
}

/// Resolve a relationship target against the directory of its source part
fn resolve_part_path(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[derive(Debug, Clone)]
struct Relationship {
    target: String,
    external: bool,
}

#[derive(Debug, Default)]
struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    fn parse(events: &[XmlEvent]) -> Self {
        let mut by_id = HashMap::new();
        for event in events {
            let XmlEvent::Open { name, attrs } = event else {
                continue;
            };
            if name != "Relationship" {
                continue;
            }
            if let (Some(id), Some(target)) = (attrs.get("Id"), attrs.get("Target")) {
                by_id.insert(
                    id.clone(),
                    Relationship {
                        target: target.clone(),
                        external: attrs.get("TargetMode").map(String::as_str) == Some("External"),
                    },
                );
            }
        }
        Self { by_id }
    }

    fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }
}

/// Media types declared in `[Content_Types].xml`
#[derive(Debug, Default)]
struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(events: &[XmlEvent]) -> Self {
        let mut types = Self::default();
        for event in events {
            let XmlEvent::Open { name, attrs } = event else {
                continue;
            };
            let Some(content_type) = attrs.get("ContentType") else {
                continue;
            };
            match name.as_str() {
                "Default" => {
                    if let Some(ext) = attrs.get("Extension") {
                        types
                            .defaults
                            .insert(ext.to_lowercase(), content_type.clone());
                    }
                }
                "Override" => {
                    if let Some(part) = attrs.get("PartName") {
                        types.overrides.insert(
                            part.trim_start_matches('/').to_string(),
                            content_type.clone(),
                        );
                    }
                }
                _ => {}
            }
        }
        types
    }

    fn lookup(&self, part: &str) -> Option<&str> {
        if let Some(content_type) = self.overrides.get(part) {
            return Some(content_type.as_str());
        }
        let (_, ext) = part.rsplit_once('.')?;
        self.defaults.get(&ext.to_lowercase()).map(String::as_str)
    }
}

/// Guess an image media type from its leading bytes
fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    use imagesize::ImageType;
    match imagesize::image_type(data).ok()? {
        ImageType::Png => Some("image/png"),
        ImageType::Jpeg => Some("image/jpeg"),
        ImageType::Gif => Some("image/gif"),
        ImageType::Bmp => Some("image/bmp"),
        ImageType::Webp => Some("image/webp"),
        _ => None,
    }
}

/// Heading level implied by a style name such as `heading 2` or `Title`
fn heading_level_for_style(name: &str) -> Option<u8> {
    let lower = name.trim().to_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let level: u8 = lower.strip_prefix("heading")?.trim().parse().ok()?;
    (1..=6).contains(&level).then_some(level)
}

/// Paragraph style id → heading level, from `word/styles.xml`
#[derive(Debug, Default)]
struct Styles {
    heading_levels: HashMap<String, u8>,
}

impl Styles {
    fn parse(events: &[XmlEvent]) -> Self {
        let mut heading_levels = HashMap::new();
        let mut current: Option<(String, Option<String>, Option<u8>)> = None;

        for event in events {
            match event {
                XmlEvent::Open { name, attrs } if name == "style" => {
                    let is_paragraph = attrs.get("type").map_or(true, |t| t == "paragraph");
                    current = match (is_paragraph, attrs.get("styleId")) {
                        (true, Some(id)) => Some((id.clone(), None, None)),
                        _ => None,
                    };
                }
                XmlEvent::Open { name, attrs } if name == "name" => {
                    if let Some((_, style_name, _)) = current.as_mut() {
                        *style_name = attrs.get("val").cloned();
                    }
                }
                XmlEvent::Open { name, attrs } if name == "outlineLvl" => {
                    if let Some((_, _, outline)) = current.as_mut() {
                        *outline = attrs
                            .get("val")
                            .and_then(|v| v.parse::<u8>().ok())
                            .filter(|v| *v < 6)
                            .map(|v| v + 1);
                    }
                }
                XmlEvent::Close { name } if name == "style" => {
                    if let Some((id, style_name, outline)) = current.take() {
                        let level = style_name
                            .as_deref()
                            .and_then(heading_level_for_style)
                            .or(outline);
                        if let Some(level) = level {
                            heading_levels.insert(id, level);
                        }
                    }
                }
                _ => {}
            }
        }

        Self { heading_levels }
    }

    fn heading_level(&self, style_id: &str) -> Option<u8> {
        self.heading_levels
            .get(style_id)
            .copied()
            .or_else(|| heading_level_for_style(style_id))
    }
}

/// List formats from `word/numbering.xml`
#[derive(Debug, Default)]
struct Numbering {
    /// abstractNumId → (ilvl → ordered)
    abstract_formats: HashMap<String, HashMap<String, bool>>,
    /// numId → abstractNumId
    nums: HashMap<String, String>,
}

impl Numbering {
    fn parse(events: &[XmlEvent]) -> Self {
        let mut numbering = Self::default();
        let mut current_abstract: Option<String> = None;
        let mut current_level: Option<String> = None;
        let mut current_num: Option<String> = None;

        for event in events {
            match event {
                XmlEvent::Open { name, attrs } => match name.as_str() {
                    "abstractNum" => current_abstract = attrs.get("abstractNumId").cloned(),
                    "lvl" => current_level = attrs.get("ilvl").cloned(),
                    "numFmt" => {
                        if let (Some(abstract_id), Some(level), Some(format)) =
                            (&current_abstract, &current_level, attrs.get("val"))
                        {
                            numbering
                                .abstract_formats
                                .entry(abstract_id.clone())
                                .or_default()
                                .insert(level.clone(), format != "bullet" && format != "none");
                        }
                    }
                    "num" => current_num = attrs.get("numId").cloned(),
                    "abstractNumId" => {
                        if let (Some(num_id), Some(abstract_id)) = (&current_num, attrs.get("val"))
                        {
                            numbering.nums.insert(num_id.clone(), abstract_id.clone());
                        }
                    }
                    _ => {}
                },
                XmlEvent::Close { name } => match name.as_str() {
                    "abstractNum" => current_abstract = None,
                    "lvl" => current_level = None,
                    "num" => current_num = None,
                    _ => {}
                },
                XmlEvent::Text(_) => {}
            }
        }

        numbering
    }

    fn is_ordered(&self, num_id: &str, level: &str) -> bool {
        self.nums
            .get(num_id)
            .and_then(|abstract_id| self.abstract_formats.get(abstract_id))
            .and_then(|levels| levels.get(level))
            .copied()
            .unwrap_or(false)
    }
}

/// Shared state for one conversion
struct ConversionContext<'a, 'f> {
    package: Package<'a>,
    styles: Styles,
    numbering: Numbering,
    content_types: ContentTypes,
    image_src: &'f mut dyn FnMut(&EmbeddedImage) -> String,
    images: Vec<EmbeddedImage>,
    /// Referenced notes in order of first reference
    note_refs: Vec<(NoteKind, String)>,
    messages: Vec<String>,
}

impl ConversionContext<'_, '_> {
    /// 1-based display number for a note reference
    ///
    /// Footnotes and endnotes share one sequence.
    fn note_number(&mut self, kind: NoteKind, id: &str) -> usize {
        if let Some(index) = self
            .note_refs
            .iter()
            .position(|(k, r)| *k == kind && r == id)
        {
            return index + 1;
        }
        self.note_refs.push((kind, id.to_string()));
        self.note_refs.len()
    }

    /// Load an image referenced from a part and return its `<img>` markup
    fn image_html(
        &mut self,
        rel_id: &str,
        alt: Option<&str>,
        rels: &Relationships,
        part_dir: &str,
    ) -> Result<Option<String>, ConvertError> {
        let Some(rel) = rels.get(rel_id) else {
            self.messages
                .push(format!("Image relationship {} not found", rel_id));
            return Ok(None);
        };
        if rel.external {
            self.messages
                .push(format!("Skipped linked (external) image {}", rel.target));
            return Ok(None);
        }

        let path = resolve_part_path(part_dir, &rel.target);
        let Some(data) = self.package.part(&path)? else {
            self.messages.push(format!("Image part {} is missing", path));
            return Ok(None);
        };

        let content_type = self
            .content_types
            .lookup(&path)
            .filter(|t| t.starts_with("image/"))
            .map(str::to_string)
            .or_else(|| sniff_image_type(&data).map(str::to_string))
            .unwrap_or_else(|| "image/png".to_string());
        if matches!(content_type.as_str(), "image/x-emf" | "image/x-wmf") {
            self.messages.push(format!(
                "Image {} uses {}, which browsers may not display",
                path, content_type
            ));
        }

        let image = EmbeddedImage { data, content_type };
        let src = (self.image_src)(&image);
        self.images.push(image);

        let mut html = format!("<img src=\"{}\"", escape_html(&src));
        if let Some(alt) = alt.filter(|a| !a.is_empty()) {
            html.push_str(&format!(" alt=\"{}\"", escape_html(alt)));
        }
        html.push('>');
        Ok(Some(html))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    superscript: bool,
    subscript: bool,
}

#[derive(Debug, Default)]
struct ParagraphState {
    html: String,
    heading: Option<u8>,
    num_id: Option<String>,
    num_level: Option<String>,
}

/// Which list is currently open in the output
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenList {
    num_id: String,
    ordered: bool,
}

/// Streaming converter from body events to HTML blocks
struct BodyState {
    part_dir: String,
    html: String,
    list: Option<OpenList>,
    paragraph: Option<ParagraphState>,
    pending_text: String,
    run: RunFormat,
    in_run: bool,
    in_run_props: bool,
    in_paragraph_props: bool,
    in_text: bool,
    /// Depth inside a drawing / VML picture, where only image references matter
    drawing_depth: usize,
    /// Depth inside content that is skipped entirely (`mc:Fallback`)
    skip_depth: usize,
    image_alt: Option<String>,
    /// Whether each open hyperlink emitted an `<a>`
    links: Vec<bool>,
}

/// Whether a toggle property such as `<w:b w:val="0"/>` is switched on
fn toggle_on(event: &XmlEvent) -> bool {
    !matches!(event.attr("val"), Some("0" | "false" | "none"))
}

impl BodyState {
    fn new(part_dir: &str) -> Self {
        Self {
            part_dir: part_dir.to_string(),
            html: String::new(),
            list: None,
            paragraph: None,
            pending_text: String::new(),
            run: RunFormat::default(),
            in_run: false,
            in_run_props: false,
            in_paragraph_props: false,
            in_text: false,
            drawing_depth: 0,
            skip_depth: 0,
            image_alt: None,
            links: Vec::new(),
        }
    }

    fn handle(
        &mut self,
        event: &XmlEvent,
        ctx: &mut ConversionContext<'_, '_>,
        rels: &Relationships,
    ) -> Result<(), ConvertError> {
        if self.skip_depth > 0 {
            match event {
                XmlEvent::Open { .. } => self.skip_depth += 1,
                XmlEvent::Close { .. } => self.skip_depth -= 1,
                XmlEvent::Text(_) => {}
            }
            return Ok(());
        }
        if self.drawing_depth > 0 {
            return self.handle_drawing(event, ctx, rels);
        }

        match event {
            XmlEvent::Open { name, .. } => self.open(name, event, ctx, rels),
            XmlEvent::Close { name } => {
                self.close(name, &ctx.numbering);
                Ok(())
            }
            XmlEvent::Text(text) => {
                if self.in_text && self.paragraph.is_some() {
                    self.pending_text.push_str(text);
                }
                Ok(())
            }
        }
    }

    fn handle_drawing(
        &mut self,
        event: &XmlEvent,
        ctx: &mut ConversionContext<'_, '_>,
        rels: &Relationships,
    ) -> Result<(), ConvertError> {
        match event {
            XmlEvent::Open { name, .. } => {
                self.drawing_depth += 1;
                let rel_id = match name.as_str() {
                    "docPr" => {
                        self.image_alt = event
                            .attr("descr")
                            .filter(|d| !d.is_empty())
                            .or_else(|| event.attr("title"))
                            .map(str::to_string);
                        None
                    }
                    "blip" => event.attr("embed"),
                    "imagedata" => {
                        if self.image_alt.is_none() {
                            self.image_alt = event.attr("title").map(str::to_string);
                        }
                        event.attr("id")
                    }
                    _ => None,
                };
                if let Some(rel_id) = rel_id {
                    let alt = self.image_alt.clone();
                    if let Some(img) = ctx.image_html(rel_id, alt.as_deref(), rels, &self.part_dir)? {
                        self.push_inline(&img);
                    }
                }
            }
            XmlEvent::Close { .. } => self.drawing_depth -= 1,
            XmlEvent::Text(_) => {}
        }
        Ok(())
    }

    fn open(
        &mut self,
        name: &str,
        event: &XmlEvent,
        ctx: &mut ConversionContext<'_, '_>,
        rels: &Relationships,
    ) -> Result<(), ConvertError> {
        match name {
            "Fallback" => self.skip_depth = 1,
            "drawing" | "pict" | "object" => {
                self.flush_text();
                self.drawing_depth = 1;
                self.image_alt = None;
            }
            "p" => {
                self.paragraph = Some(ParagraphState::default());
                self.pending_text.clear();
            }
            "pPr" => self.in_paragraph_props = true,
            "pStyle" if self.in_paragraph_props => {
                let level = event.attr("val").and_then(|id| ctx.styles.heading_level(id));
                if let (Some(paragraph), Some(level)) = (self.paragraph.as_mut(), level) {
                    paragraph.heading = Some(level);
                }
            }
            "outlineLvl" if self.in_paragraph_props => {
                let level = event
                    .attr("val")
                    .and_then(|v| v.parse::<u8>().ok())
                    .filter(|v| *v < 6);
                if let (Some(paragraph), Some(level)) = (self.paragraph.as_mut(), level) {
                    paragraph.heading = Some(level + 1);
                }
            }
            "numId" if self.in_paragraph_props => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.num_id = event.attr("val").map(str::to_string);
                }
            }
            "ilvl" if self.in_paragraph_props => {
                if let Some(paragraph) = self.paragraph.as_mut() {
                    paragraph.num_level = event.attr("val").map(str::to_string);
                }
            }
            "r" => {
                self.in_run = true;
                self.run = RunFormat::default();
            }
            "rPr" if self.in_run => self.in_run_props = true,
            "b" if self.in_run_props => self.run.bold = toggle_on(event),
            "i" if self.in_run_props => self.run.italic = toggle_on(event),
            "u" if self.in_run_props => self.run.underline = toggle_on(event),
            "strike" | "dstrike" if self.in_run_props => self.run.strike = toggle_on(event),
            "vertAlign" if self.in_run_props => {
                self.run.superscript = event.attr("val") == Some("superscript");
                self.run.subscript = event.attr("val") == Some("subscript");
            }
            "t" if self.in_run => self.in_text = true,
            "tab" if self.in_run => self.pending_text.push('\t'),
            "br" | "cr" if self.in_run => {
                if event.attr("type") != Some("page") {
                    self.flush_text();
                    self.push_inline("<br>");
                }
            }
            "footnoteReference" | "endnoteReference" if self.in_run => {
                if let (Some(kind), Some(id)) = (NoteKind::from_reference(name), event.attr("id")) {
                    self.flush_text();
                    let number = ctx.note_number(kind, id);
                    let prefix = kind.element();
                    let id = escape_html(id);
                    self.push_inline(&format!(
                        "<sup><a href=\"#{prefix}-{id}\" id=\"{prefix}-ref-{id}\">[{number}]</a></sup>"
                    ));
                }
            }
            "hyperlink" => {
                self.flush_text();
                let href = match (event.attr("id"), event.attr("anchor")) {
                    (Some(id), _) => rels.get(id).map(|rel| rel.target.clone()),
                    (None, Some(anchor)) => Some(format!("#{}", anchor)),
                    (None, None) => None,
                };
                match href {
                    Some(href) => {
                        self.push_inline(&format!("<a href=\"{}\">", escape_html(&href)));
                        self.links.push(true);
                    }
                    None => self.links.push(false),
                }
            }
            "tbl" => {
                self.close_list();
                self.html.push_str("<table>");
            }
            "tr" => self.html.push_str("<tr>"),
            "tc" => {
                self.close_list();
                self.html.push_str("<td>");
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str, numbering: &Numbering) {
        match name {
            "p" => self.finish_paragraph(numbering),
            "pPr" => self.in_paragraph_props = false,
            "r" => {
                self.flush_text();
                self.in_run = false;
            }
            "rPr" => self.in_run_props = false,
            "t" => self.in_text = false,
            "hyperlink" => {
                self.flush_text();
                if self.links.pop() == Some(true) {
                    self.push_inline("</a>");
                }
            }
            "tbl" => self.html.push_str("</table>"),
            "tr" => self.html.push_str("</tr>"),
            "tc" => {
                self.close_list();
                self.html.push_str("</td>");
            }
            _ => {}
        }
    }

    /// Append markup to the current paragraph (or the block output outside one)
    fn push_inline(&mut self, markup: &str) {
        match self.paragraph.as_mut() {
            Some(paragraph) => paragraph.html.push_str(markup),
            None => self.html.push_str(markup),
        }
    }

    /// Emit buffered run text with the run's formatting
    fn flush_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let mut text = escape_html(&self.pending_text);
        self.pending_text.clear();

        let run = self.run;
        if run.superscript {
            text = format!("<sup>{}</sup>", text);
        }
        if run.subscript {
            text = format!("<sub>{}</sub>", text);
        }
        if run.strike {
            text = format!("<s>{}</s>", text);
        }
        if run.underline {
            text = format!("<u>{}</u>", text);
        }
        if run.italic {
            text = format!("<em>{}</em>", text);
        }
        if run.bold {
            text = format!("<strong>{}</strong>", text);
        }
        self.push_inline(&text);
    }

    fn finish_paragraph(&mut self, numbering: &Numbering) {
        self.flush_text();
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };
        if paragraph.html.trim().is_empty() {
            return;
        }

        if let Some(level) = paragraph.heading {
            self.close_list();
            self.html
                .push_str(&format!("<h{level}>{}</h{level}>", paragraph.html));
            return;
        }

        match paragraph.num_id.filter(|id| id != "0") {
            Some(num_id) => {
                let level = paragraph.num_level.as_deref().unwrap_or("0");
                let ordered = numbering.is_ordered(&num_id, level);
                self.open_list(num_id, ordered, &paragraph.html);
            }
            None => {
                self.close_list();
                self.html.push_str(&format!("<p>{}</p>", paragraph.html));
            }
        }
    }

    fn open_list(&mut self, num_id: String, ordered: bool, item_html: &str) {
        let same_list = self.list.as_ref().is_some_and(|list| list.num_id == num_id);
        if !same_list {
            self.close_list();
            self.html.push_str(if ordered { "<ol>" } else { "<ul>" });
            self.list = Some(OpenList { num_id, ordered });
        }
        self.html.push_str(&format!("<li>{}</li>", item_html));
    }

    fn close_list(&mut self) {
        if let Some(list) = self.list.take() {
            self.html
                .push_str(if list.ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn finish(mut self, numbering: &Numbering) -> String {
        self.finish_paragraph(numbering);
        self.close_list();
        self.html
    }
}

/// Footnotes and endnotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NoteKind {
    Footnote,
    Endnote,
}

impl NoteKind {
    fn from_reference(name: &str) -> Option<Self> {
        match name {
            "footnoteReference" => Some(NoteKind::Footnote),
            "endnoteReference" => Some(NoteKind::Endnote),
            _ => None,
        }
    }

    /// Element name of a note, also the prefix of its anchors
    fn element(self) -> &'static str {
        match self {
            NoteKind::Footnote => "footnote",
            NoteKind::Endnote => "endnote",
        }
    }

    fn part(self) -> &'static str {
        match self {
            NoteKind::Footnote => "word/footnotes.xml",
            NoteKind::Endnote => "word/endnotes.xml",
        }
    }
}

/// Notes of one part, keyed by id, with the part's relationships
struct NotePart {
    notes: HashMap<String, Vec<XmlEvent>>,
    rels: Relationships,
}

/// Split a notes part into per-note event lists
fn split_notes(events: &[XmlEvent], element: &str) -> HashMap<String, Vec<XmlEvent>> {
    let mut notes = HashMap::new();
    let mut current: Option<(String, Vec<XmlEvent>)> = None;
    let mut depth = 0usize;

    for event in events {
        match current.take() {
            None => {
                if let XmlEvent::Open { name, .. } = event {
                    if let (true, Some(id)) = (name == element, event.attr("id")) {
                        current = Some((id.to_string(), Vec::new()));
                        depth = 0;
                    }
                }
            }
            Some((id, mut body)) => {
                match event {
                    XmlEvent::Close { name } if name == element && depth == 0 => {
                        notes.insert(id, body);
                        continue;
                    }
                    XmlEvent::Open { .. } => depth += 1,
                    XmlEvent::Close { .. } => depth = depth.saturating_sub(1),
                    XmlEvent::Text(_) => {}
                }
                body.push(event.clone());
                current = Some((id, body));
            }
        }
    }
    notes
}

/// Read the notes part for `kind`; `None` (with a message) when it is missing
fn load_note_part(
    ctx: &mut ConversionContext<'_, '_>,
    kind: NoteKind,
) -> Result<Option<NotePart>, ConvertError> {
    let part = kind.part();
    let Some(data) = ctx.package.part(part)? else {
        ctx.messages.push(format!(
            "Document references {}s but {} is missing",
            kind.element(),
            part
        ));
        return Ok(None);
    };
    Ok(Some(NotePart {
        notes: split_notes(&read_events(part, &data)?, kind.element()),
        rels: ctx.package.relationships(part)?,
    }))
}

/// Render referenced notes as a trailing ordered list
fn convert_notes(ctx: &mut ConversionContext<'_, '_>) -> Result<String, ConvertError> {
    if ctx.note_refs.is_empty() {
        return Ok(String::new());
    }

    let mut parts: HashMap<NoteKind, Option<NotePart>> = HashMap::new();
    let mut html = String::from("<ol>");
    let mut index = 0;
    // Notes may reference further notes, which extends the list
    while index < ctx.note_refs.len() {
        let (kind, id) = ctx.note_refs[index].clone();
        index += 1;

        if !parts.contains_key(&kind) {
            let part = load_note_part(ctx, kind)?;
            parts.insert(kind, part);
        }

        let mut body = BodyState::new("word");
        if let Some(Some(part)) = parts.get(&kind) {
            match part.notes.get(&id) {
                Some(events) => {
                    for event in events {
                        body.handle(event, ctx, &part.rels)?;
                    }
                }
                None => ctx
                    .messages
                    .push(format!("No {} with id {}", kind.element(), id)),
            }
        }
        let mut content = body.finish(&ctx.numbering);

        let prefix = kind.element();
        let id = escape_html(&id);
        let back_link = format!(" <a href=\"#{prefix}-ref-{id}\">↑</a>");
        if content.ends_with("</p>") {
            content.insert_str(content.len() - "</p>".len(), &back_link);
        } else {
            content.push_str(&format!("<p>{}</p>", back_link.trim_start()));
        }
        html.push_str(&format!("<li id=\"{prefix}-{id}\">{content}</li>"));
    }
    html.push_str("</ol>");
    Ok(html)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory .docx packages for tests

    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// A 1x1 PNG
    pub(crate) const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    /// Minimal JPEG header (SOI + JFIF APP0 + SOF0)
    pub(crate) const JPEG: &[u8] = &[
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x02, 0x00, 0x03, 0x03,
        0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01, 0xFF, 0xD9,
    ];

    const NAMESPACES: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\" \
        xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
        xmlns:wp=\"http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing\" \
        xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
        xmlns:pic=\"http://schemas.openxmlformats.org/drawingml/2006/picture\" \
        xmlns:mc=\"http://schemas.openxmlformats.org/markup-compatibility/2006\" \
        xmlns:v=\"urn:schemas-microsoft-com:vml\"";

    pub(crate) fn document_xml(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document {NAMESPACES}><w:body>{body}</w:body></w:document>"
        )
    }

    pub(crate) fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
    }

    pub(crate) fn heading(style: &str, text: &str) -> String {
        format!(
            "<w:p><w:pPr><w:pStyle w:val=\"{style}\"/></w:pPr>\
             <w:r><w:t>{text}</w:t></w:r></w:p>"
        )
    }

    pub(crate) fn inline_image(rel_id: &str, alt: &str) -> String {
        format!(
            "<w:p><w:r><w:drawing><wp:inline><wp:docPr id=\"1\" name=\"Picture\" descr=\"{alt}\"/>\
             <a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed=\"{rel_id}\"/>\
             </pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"
        )
    }

    pub(crate) fn relationships(rels: &[(&str, &str)]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        );
        for (id, target) in rels {
            let (target, mode) = match target.strip_prefix("external:") {
                Some(url) => (url, " TargetMode=\"External\""),
                None => (*target, ""),
            };
            xml.push_str(&format!(
                "<Relationship Id=\"{id}\" Type=\"rel\" Target=\"{target}\"{mode}/>"
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub(crate) const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
        <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
        <Default Extension=\"png\" ContentType=\"image/png\"/>\
        <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
        <Override PartName=\"/word/media/photo.bin\" ContentType=\"image/jpeg\"/>\
        </Types>";

    /// Zip the given parts into a package
    pub(crate) fn package(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Package with just a document body (and content types)
    pub(crate) fn simple_docx(body: &str) -> Vec<u8> {
        let document = document_xml(body);
        package(&[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("word/document.xml", document.as_bytes()),
        ])
    }

    /// Package with a heading, text and two images
    pub(crate) fn illustrated_docx() -> Vec<u8> {
        let body = format!(
            "{}{}{}{}",
            heading("Heading1", "Report"),
            paragraph("Opening text"),
            inline_image("rIdImg1", "First figure"),
            inline_image("rIdImg2", "Second figure"),
        );
        let document = document_xml(&body);
        let rels = relationships(&[
            ("rIdImg1", "media/image1.png"),
            ("rIdImg2", "media/photo.bin"),
        ]);
        package(&[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", PNG),
            ("word/media/photo.bin", JPEG),
        ])
    }
}
