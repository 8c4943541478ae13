//! XLSX writer for export operations
//!
//! The workbook is a zip container, so nothing can reach the consumer until the
//! central directory is written. Rows are deflated into an anonymous temp file
//! as they arrive and the finished file is streamed out in chunks on
//! [`FormatWriter::finalize`]. Memory use stays at one batch of rows.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::dataset::{Column, Row, Value};
use crate::error::Result;
use crate::export::job::SPREADSHEET_MAX_SHEET_ROWS;

use super::{ChunkSink, FormatWriter};

const READ_CHUNK: usize = 64 * 1024;
const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Writer for XLSX format
///
/// One worksheet; the header occupies row 1 and data starts on row 2.
pub struct XlsxWriter {
    sink: ChunkSink,
    zip: Option<ZipWriter<File>>,
    xml: String,
    sheet_rows: u64,
    max_sheet_rows: u64,
    bytes_written: u64,
    finalized: bool,
}

impl XlsxWriter {
    /// Create a new XLSX writer
    ///
    /// # Arguments
    /// * `sink` - Where the finished workbook is streamed
    pub fn new(sink: ChunkSink) -> Self {
        debug!("Created XLSX writer for job {}", sink.job_id());
        Self {
            sink,
            zip: None,
            xml: String::new(),
            sheet_rows: 0,
            max_sheet_rows: SPREADSHEET_MAX_SHEET_ROWS,
            bytes_written: 0,
            finalized: false,
        }
    }

    #[cfg(test)]
    fn with_max_sheet_rows(mut self, max: u64) -> Self {
        self.max_sheet_rows = max;
        self
    }

    /// Write the package parts that do not depend on the data
    fn start_package(&self) -> Result<ZipWriter<File>> {
        let file = tempfile::tempfile()?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        let fail = |e: &dyn std::fmt::Display| self.sink.encoding_failure(e.to_string());

        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", ROOT_RELS_XML),
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ] {
            zip.start_file(name, options).map_err(|e| fail(&e))?;
            zip.write_all(body.as_bytes()).map_err(|e| fail(&e))?;
        }

        zip.start_file(SHEET_PATH, options).map_err(|e| fail(&e))?;
        zip.write_all(SHEET_OPEN_XML.as_bytes()).map_err(|e| fail(&e))?;
        Ok(zip)
    }

    /// Append buffered sheet XML to the open worksheet entry
    fn flush_xml(&mut self) -> Result<()> {
        let sink = &self.sink;
        let zip = self
            .zip
            .as_mut()
            .ok_or_else(|| sink.encoding_failure("worksheet written before header"))?;
        zip.write_all(self.xml.as_bytes())
            .map_err(|e| sink.encoding_failure(e.to_string()))?;
        self.xml.clear();
        Ok(())
    }

    fn push_row<'a, I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.sheet_rows += 1;
        self.xml.push_str(&format!(r#"<row r="{}">"#, self.sheet_rows));
        for value in cells {
            push_cell(&mut self.xml, value);
        }
        self.xml.push_str("</row>");
    }
}

#[async_trait]
impl FormatWriter for XlsxWriter {
    async fn write_header(&mut self, columns: &[Column]) -> Result<()> {
        let zip = self.start_package()?;
        self.zip = Some(zip);

        let header: Vec<Value> = columns.iter().map(|c| Value::text(&c.name)).collect();
        self.push_row(header.iter());
        self.flush_xml()?;
        debug!("Wrote XLSX header: {} fields", columns.len());
        Ok(())
    }

    async fn write_batch(&mut self, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        // Bytes only flow on finalize, so a consumer that left has to be noticed here.
        if self.sink.is_closed() {
            return Err(self.sink.cancelled());
        }
        if self.sheet_rows + rows.len() as u64 > self.max_sheet_rows {
            return Err(self.sink.encoding_failure(format!(
                "worksheet row limit of {} exceeded",
                self.max_sheet_rows
            )));
        }

        for row in rows {
            self.push_row(row.iter());
        }
        self.flush_xml()?;
        debug!(
            "Wrote {} rows to XLSX (total: {})",
            rows.len(),
            self.sheet_rows.saturating_sub(1)
        );
        Ok(rows.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(self.sink.encoding_failure("XLSX output finalized twice"));
        }
        self.xml.push_str(SHEET_CLOSE_XML);
        self.flush_xml()?;

        let zip = self
            .zip
            .take()
            .ok_or_else(|| self.sink.encoding_failure("worksheet written before header"))?;
        let mut file = zip
            .finish()
            .map_err(|e| self.sink.encoding_failure(e.to_string()))?;
        file.seek(SeekFrom::Start(0))?;
        self.finalized = true;

        let mut file = tokio::fs::File::from_std(file);
        loop {
            let mut chunk = vec![0u8; READ_CHUNK];
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            chunk.truncate(n);
            self.bytes_written += n as u64;
            self.sink.send(chunk).await?;
        }

        debug!(
            "Finalized XLSX output for job {} ({} rows, {} bytes)",
            self.sink.job_id(),
            self.sheet_rows.saturating_sub(1),
            self.bytes_written
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Append one `<c>` element
///
/// Numbers are stored as numbers; everything else, including booleans and
/// non-finite floats, is an inline string holding the rendered value.
fn push_cell(xml: &mut String, value: &Value) {
    match value {
        Value::Null => xml.push_str("<c/>"),
        Value::Int(_) => {
            xml.push_str("<c><v>");
            xml.push_str(&value.render());
            xml.push_str("</v></c>");
        }
        Value::Float(f) if f.is_finite() => {
            xml.push_str("<c><v>");
            xml.push_str(&value.render());
            xml.push_str("</v></c>");
        }
        _ => {
            let text = encode_cell_text(&value.render());
            xml.push_str(r#"<c t="inlineStr"><is><t xml:space="preserve">"#);
            xml.push_str(&quick_xml::escape::escape(text.as_str()));
            xml.push_str("</t></is></c>");
        }
    }
}

/// Encode text XML 1.0 cannot carry with the SpreadsheetML `_xHHHH_` escape
///
/// Control characters become `_x0001_` and so on. A literal `_xHHHH_` in the
/// input has its underscore escaped as `_x005F_` so readers do not decode it.
fn encode_cell_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        let invalid = (c < ' ' && !matches!(c, '\t' | '\n' | '\r'))
            || c == '\u{FFFE}'
            || c == '\u{FFFF}';
        if invalid || (c == '_' && looks_escaped(&s[i..])) {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

fn looks_escaped(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && b[0] == b'_'
        && b[1] == b'x'
        && b[2..6].iter().all(u8::is_ascii_hexdigit)
        && b[6] == b'_'
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Export" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

const SHEET_OPEN_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#;

const SHEET_CLOSE_XML: &str = "</sheetData></worksheet>";
