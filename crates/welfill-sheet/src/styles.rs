//! Wrap-text cell formats
//!
//! Multi-line values only display as multiple lines when their cell format
//! wraps text. Rather than edit a format the template already uses, the
//! cell's `cellXfs` entry is cloned with `<alignment wrapText="1"/>` and the
//! written cell points at the clone. Formats that already wrap are reused.

use crate::error::SheetError;
use crate::package::read_entry;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::{Read, Seek};
use tracing::{debug, warn};
use zip::ZipArchive;

type XfEvents = Vec<Event<'static>>;

/// Cell formats of one styles part, plus the wrapped clones added so far
#[derive(Debug)]
pub(crate) struct WrapStyles {
    part: String,
    source: String,
    xfs: Vec<XfEvents>,
    added: Vec<XfEvents>,
    clones: HashMap<u32, u32>,
}

impl WrapStyles {
    /// Load the styles part `part`; `None` when the package lacks it
    pub(crate) fn load<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        part: &str,
    ) -> Result<Option<Self>, SheetError> {
        match read_entry(archive, part)? {
            Some(source) => Self::parse(part, source).map(Some),
            None => {
                warn!("Styles part '{}' is missing, multi-line cells will not wrap", part);
                Ok(None)
            }
        }
    }

    pub(crate) fn parse(part: &str, source: String) -> Result<Self, SheetError> {
        let mut reader = Reader::from_str(&source);
        let mut xfs = Vec::new();
        let mut in_cell_xfs = false;
        let mut current: Option<XfEvents> = None;

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Eof => break,
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Event::Empty(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                    xfs.push(vec![event.into_owned()]);
                }
                Event::Start(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                    current = Some(vec![event.into_owned()]);
                }
                Event::End(e) if e.local_name().as_ref() == b"xf" => {
                    if let Some(mut xf) = current.take() {
                        xf.push(event.into_owned());
                        xfs.push(xf);
                    }
                }
                _ => {
                    if let Some(xf) = current.as_mut() {
                        xf.push(event.into_owned());
                    }
                }
            }
        }

        Ok(Self {
            part: part.to_string(),
            source,
            xfs,
            added: Vec::new(),
            clones: HashMap::new(),
        })
    }

    /// Zip entry name of the styles part
    pub(crate) fn part(&self) -> &str {
        &self.part
    }

    /// Whether any wrapped format was added
    pub(crate) fn is_modified(&self) -> bool {
        !self.added.is_empty()
    }

    /// Index of a format like `style` that wraps text
    ///
    /// Unknown indexes come back unchanged.
    pub(crate) fn wrapped(&mut self, style: u32) -> Result<u32, SheetError> {
        if let Some(&clone) = self.clones.get(&style) {
            return Ok(clone);
        }
        let Some(xf) = self.xfs.get(style as usize) else {
            debug!("Cell format {} not in '{}', leaving it", style, self.part);
            return Ok(style);
        };
        if wraps(xf)? {
            return Ok(style);
        }

        let clone = with_wrap_text(xf)?;
        self.added.push(clone);
        let index = (self.xfs.len() + self.added.len() - 1) as u32;
        self.clones.insert(style, index);
        Ok(index)
    }

    /// The styles part with the added formats appended to `cellXfs`
    pub(crate) fn render(&self) -> Result<Vec<u8>, SheetError> {
        let total = (self.xfs.len() + self.added.len()).to_string();
        let mut reader = Reader::from_str(&self.source);
        let mut writer = Writer::new(Vec::with_capacity(self.source.len() + 256 * self.added.len()));

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Eof => break,
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                    let start = with_attribute(e, b"count", &total)?;
                    writer.write_event(Event::Start(start))?;
                }
                Event::End(e) if e.local_name().as_ref() == b"cellXfs" => {
                    for xf in &self.added {
                        for xf_event in xf {
                            writer.write_event(xf_event.clone())?;
                        }
                    }
                    writer.write_event(event)?;
                }
                _ => writer.write_event(event)?,
            }
        }

        Ok(writer.into_inner())
    }
}

fn is_alignment(event: &Event<'_>) -> bool {
    matches!(event, Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"alignment")
}

fn wraps(xf: &[Event<'static>]) -> Result<bool, SheetError> {
    for event in xf {
        if let Event::Start(e) | Event::Empty(e) = event {
            if e.local_name().as_ref() != b"alignment" {
                continue;
            }
            for attr in e.attributes() {
                let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
                if attr.key.as_ref() == b"wrapText" {
                    let value = attr.unescape_value()?;
                    return Ok(matches!(value.as_ref(), "1" | "true"));
                }
            }
        }
    }
    Ok(false)
}

/// Copy of an `xf` with `applyAlignment="1"` and wrapping switched on
fn with_wrap_text(xf: &[Event<'static>]) -> Result<XfEvents, SheetError> {
    let (start, rest) = match xf.split_first() {
        Some((Event::Start(e), rest)) => (e, rest),
        Some((Event::Empty(e), rest)) => (e, rest),
        _ => return Err(SheetError::Format("Malformed cell format".to_string())),
    };

    let prefix = match start.name().as_ref().iter().position(|&b| b == b':') {
        Some(colon) => String::from_utf8_lossy(&start.name().as_ref()[..=colon]).into_owned(),
        None => String::new(),
    };
    let alignment_name = format!("{}alignment", prefix);

    let mut clone = vec![Event::Start(with_attribute(start, b"applyAlignment", "1")?)];
    if !rest.iter().any(is_alignment) {
        let mut alignment = BytesStart::new(alignment_name);
        alignment.push_attribute(("wrapText", "1"));
        clone.push(Event::Empty(alignment));
    }
    for event in rest {
        match event {
            Event::Start(e) if is_alignment(event) => {
                clone.push(Event::Start(with_attribute(e, b"wrapText", "1")?));
            }
            Event::Empty(e) if is_alignment(event) => {
                clone.push(Event::Empty(with_attribute(e, b"wrapText", "1")?));
            }
            other => clone.push(other.clone()),
        }
    }
    if matches!(xf.first(), Some(Event::Empty(_))) {
        clone.push(Event::End(BytesEnd::new(
            String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        )));
    }
    Ok(clone)
}

/// Copy of `element` with `key` set to `value`, other attributes in order
fn with_attribute(
    element: &BytesStart<'_>,
    key: &[u8],
    value: &str,
) -> Result<BytesStart<'static>, SheetError> {
    let mut out = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
    let mut replaced = false;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
        if attr.key.as_ref() == key {
            out.push_attribute((key, value.as_bytes()));
            replaced = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !replaced {
        out.push_attribute((key, value.as_bytes()));
    }
    Ok(out)
}
