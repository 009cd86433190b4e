//! Streaming worksheet rewrite
//!
//! Replaces or inserts cells in a worksheet part without touching anything
//! else: styles, merges, column widths, print setup and drawings pass through
//! byte-for-byte as events. Written cells become inline strings and keep the
//! style index (`s`) of the cell they replace. A value with a line break
//! instead points at a wrapping copy of that style when `styles` is given.

use crate::error::SheetError;
use crate::styles::WrapStyles;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use welfill_domain::CellRef;

type PendingRows<'v> = BTreeMap<u32, BTreeMap<u32, &'v str>>;

/// Rewrite `xml` so every cell in `writes` holds its new text
pub(crate) fn rewrite_sheet(
    xml: &[u8],
    writes: &BTreeMap<CellRef, String>,
    styles: Option<&mut WrapStyles>,
) -> Result<Vec<u8>, SheetError> {
    let mut pending: PendingRows<'_> = BTreeMap::new();
    for (cell, value) in writes {
        pending
            .entry(cell.row)
            .or_default()
            .insert(cell.col, value.as_str());
    }

    let mut rewriter = SheetRewriter {
        writer: Writer::new(Vec::with_capacity(xml.len() + 256 * writes.len())),
        pending,
        styles,
        prefix: String::new(),
        current_row: None,
        last_row: 0,
        last_col: 0,
        skipping_cell: false,
    };

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?;
        if matches!(event, Event::Eof) {
            break;
        }
        rewriter.handle(event)?;
        buf.clear();
    }

    if !rewriter.pending.is_empty() {
        return Err(SheetError::Format(
            "Worksheet has no sheetData element".to_string(),
        ));
    }

    Ok(rewriter.writer.into_inner())
}

struct SheetRewriter<'v, 's> {
    writer: Writer<Vec<u8>>,
    pending: PendingRows<'v>,
    styles: Option<&'s mut WrapStyles>,
    /// Namespace prefix of the worksheet elements, including the colon
    prefix: String,
    current_row: Option<u32>,
    last_row: u32,
    last_col: u32,
    /// Inside a replaced `<c>`: drop events until its end tag
    skipping_cell: bool,
}

impl<'v, 's> SheetRewriter<'v, 's> {
    fn handle(&mut self, event: Event<'_>) -> Result<(), SheetError> {
        if self.skipping_cell {
            if let Event::End(e) = &event {
                if e.local_name().as_ref() == b"c" {
                    self.skipping_cell = false;
                }
            }
            return Ok(());
        }

        match &event {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                self.prefix = element_prefix(e.name().as_ref());
                self.write(event)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                self.prefix = element_prefix(e.name().as_ref());
                self.write(Event::Start(e.to_owned()))?;
                self.flush_rows_before(None)?;
                self.write(Event::End(e.to_end().into_owned()))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                self.flush_rows_before(None)?;
                self.write(event)?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row = self.row_number(e)?;
                self.flush_rows_before(Some(row))?;
                self.current_row = Some(row);
                self.last_col = 0;
                self.write(event)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row = self.row_number(e)?;
                self.flush_rows_before(Some(row))?;
                match self.pending.remove(&row) {
                    Some(cells) => {
                        self.write(Event::Start(e.to_owned()))?;
                        for (col, value) in cells {
                            self.write_new_cell(CellRef::new(row, col), value)?;
                        }
                        self.write(Event::End(e.to_end().into_owned()))?;
                    }
                    None => self.write(event)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                if let Some(row) = self.current_row.take() {
                    self.flush_cells_before(row, None)?;
                }
                self.write(event)?;
            }
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"c" && self.current_row.is_some() =>
            {
                let row = self.current_row.unwrap_or_default();
                let cell = self.cell_ref(e, row)?;
                self.flush_cells_before(row, Some(cell.col))?;
                self.last_col = cell.col;

                let replacement = self
                    .pending
                    .get_mut(&row)
                    .and_then(|cells| cells.remove(&cell.col));
                match replacement {
                    Some(value) => {
                        let is_start = matches!(event, Event::Start(_));
                        self.write_replacement_cell(e, cell, value)?;
                        self.skipping_cell = is_start;
                    }
                    None => self.write(event)?,
                }
            }
            _ => self.write(event)?,
        }
        Ok(())
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), SheetError> {
        self.writer.write_event(event)?;
        Ok(())
    }

    /// Row number from `r`, or the next row when the attribute is omitted
    fn row_number(&mut self, row: &BytesStart<'_>) -> Result<u32, SheetError> {
        let number = match attribute(row, b"r")? {
            Some(r) => r
                .trim()
                .parse()
                .map_err(|_| SheetError::Format(format!("Invalid row number '{}'", r)))?,
            None => self.last_row + 1,
        };
        self.last_row = number;
        Ok(number)
    }

    /// Cell coordinate from `r`, or the next column when the attribute is omitted
    fn cell_ref(&self, cell: &BytesStart<'_>, row: u32) -> Result<CellRef, SheetError> {
        match attribute(cell, b"r")? {
            Some(r) => CellRef::parse(&r).map_err(SheetError::Format),
            None => Ok(CellRef::new(row, self.last_col + 1)),
        }
    }

    /// Emit pending rows numbered below `limit` (all when `None`)
    fn flush_rows_before(&mut self, limit: Option<u32>) -> Result<(), SheetError> {
        while let Some(entry) = self.pending.first_entry() {
            if limit.is_some_and(|l| *entry.key() >= l) {
                break;
            }
            let (row, cells) = entry.remove_entry();
            if cells.is_empty() {
                continue;
            }

            let row_name = format!("{}row", self.prefix);
            let mut start = BytesStart::new(row_name.as_str());
            start.push_attribute(("r", row.to_string().as_str()));
            self.write(Event::Start(start))?;
            for (col, value) in cells {
                self.write_new_cell(CellRef::new(row, col), value)?;
            }
            self.write(Event::End(BytesEnd::new(row_name.as_str())))?;
        }
        Ok(())
    }

    /// Emit pending cells of `row` in columns below `limit` (all when `None`)
    fn flush_cells_before(&mut self, row: u32, limit: Option<u32>) -> Result<(), SheetError> {
        let Some(cells) = self.pending.get_mut(&row) else {
            return Ok(());
        };
        let mut ready = Vec::new();
        while let Some(entry) = cells.first_entry() {
            if limit.is_some_and(|l| *entry.key() >= l) {
                break;
            }
            ready.push(entry.remove_entry());
        }
        if cells.is_empty() {
            self.pending.remove(&row);
        }

        for (col, value) in ready {
            self.write_new_cell(CellRef::new(row, col), value)?;
        }
        Ok(())
    }

    fn write_new_cell(&mut self, cell: CellRef, value: &str) -> Result<(), SheetError> {
        let cell_name = format!("{}c", self.prefix);
        let mut start = BytesStart::new(cell_name.as_str());
        start.push_attribute(("r", cell.to_string().as_str()));
        if let Some(style) = self.wrapping_style(0, value)? {
            start.push_attribute(("s", style.to_string().as_str()));
        }
        start.push_attribute(("t", "inlineStr"));
        self.write_inline_string(start, value)
    }

    /// Style index to use for a multi-line `value` in a cell styled `style`
    fn wrapping_style(&mut self, style: u32, value: &str) -> Result<Option<u32>, SheetError> {
        match self.styles.as_deref_mut() {
            Some(styles) if value.contains('\n') => {
                let wrapped = styles.wrapped(style)?;
                Ok((wrapped != style).then_some(wrapped))
            }
            _ => Ok(None),
        }
    }

    /// Replace an existing cell, keeping its attributes apart from the type
    /// and value metadata
    fn write_replacement_cell(
        &mut self,
        original: &BytesStart<'_>,
        cell: CellRef,
        value: &str,
    ) -> Result<(), SheetError> {
        let original_style = attribute(original, b"s")?;
        let style = original_style
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let wrapped = self.wrapping_style(style, value)?;

        let original_name = original.name();
        let mut start = BytesStart::new(String::from_utf8_lossy(original_name.as_ref()));
        let mut has_ref = false;
        for attr in original.attributes() {
            let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
            match (attr.key.as_ref(), wrapped) {
                (b"t" | b"cm" | b"vm", _) => {}
                (b"s", Some(wrapped)) => {
                    start.push_attribute(("s", wrapped.to_string().as_str()));
                }
                (key, _) => {
                    has_ref |= key == b"r";
                    start.push_attribute(attr);
                }
            }
        }
        if !has_ref {
            start.push_attribute(("r", cell.to_string().as_str()));
        }
        if let (None, Some(wrapped)) = (original_style, wrapped) {
            start.push_attribute(("s", wrapped.to_string().as_str()));
        }
        start.push_attribute(("t", "inlineStr"));
        self.write_inline_string(start, value)
    }

    fn write_inline_string(&mut self, cell: BytesStart<'_>, value: &str) -> Result<(), SheetError> {
        let end = cell.to_end().into_owned();
        let is_name = format!("{}is", self.prefix);
        let t_name = format!("{}t", self.prefix);
        let mut t = BytesStart::new(t_name.as_str());
        t.push_attribute(("xml:space", "preserve"));

        self.write(Event::Start(cell))?;
        self.write(Event::Start(BytesStart::new(is_name.as_str())))?;
        self.write(Event::Start(t))?;
        self.write(Event::Text(BytesText::new(&xml_safe(value))))?;
        self.write(Event::End(BytesEnd::new(t_name.as_str())))?;
        self.write(Event::End(BytesEnd::new(is_name.as_str())))?;
        self.write(Event::End(end))?;
        Ok(())
    }
}

/// `x:` for `x:sheetData`, empty for an unprefixed element
fn element_prefix(qname: &[u8]) -> String {
    let qname = String::from_utf8_lossy(qname);
    match qname.split_once(':') {
        Some((prefix, _)) => format!("{}:", prefix),
        None => String::new(),
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, SheetError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Drop characters XML 1.0 cannot carry; line breaks and tabs stay
fn xml_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| match c {
            '\n' | '\r' | '\t' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => !c.is_control(),
        })
        .collect()
}
