#![allow(dead_code)]

use rusty_catalog::error::ImportError;
use rusty_catalog::import::ImportListener;
use rusty_catalog::import::UploadDescriptor;
use rusty_catalog::import::UploadPayload;
use rusty_catalog::import::UploadReceipt;
use rusty_catalog::import::Uploader;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const ITEMS_CSV: &[u8] = b"id,descripcion,precio\n1,Product 1,10.0\n2,Product 2,12.5\n";

#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Index into the shared string table (xlsx only)
    Shared(usize),
    /// Excel serial number rendered with the built-in date format 14 (xlsx only)
    Date(f64),
    Blank,
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_owned())
}

pub fn number(value: f64) -> Cell {
    Cell::Number(value)
}

/// Records listener callbacks.
#[derive(Debug, Default)]
pub struct Recorder {
    pub committed: Vec<(UploadDescriptor, UploadReceipt)>,
    pub errors: Vec<String>,
}

impl ImportListener for Recorder {
    fn on_committed(&mut self, descriptor: &UploadDescriptor, receipt: &UploadReceipt) {
        self.committed.push((descriptor.clone(), receipt.clone()));
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }
}

/// Answers uploads from a queue and keeps every payload it was sent.
#[derive(Debug, Default)]
pub struct MockUploader {
    pub sent: RefCell<Vec<UploadPayload>>,
    responses: RefCell<VecDeque<Result<UploadReceipt, ImportError>>>,
}

impl MockUploader {
    pub fn answering(responses: Vec<Result<UploadReceipt, ImportError>>) -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            responses: RefCell::new(responses.into()),
        }
    }
}

impl Uploader for MockUploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<UploadReceipt, ImportError> {
        self.sent.borrow_mut().push(payload.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ImportError::UploadTransportError("no response queued".to_owned())))
    }
}

pub fn receipt(status: u16) -> UploadReceipt {
    UploadReceipt { status, message: None, processed: None }
}

fn column_name(mut col: usize) -> String {
    let mut name = String::new();
    col += 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    name
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn worksheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, cells) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, cell) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_name(col), row + 1);
            match cell {
                Cell::Text(value) => xml.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(value)
                )),
                Cell::Number(value) => xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#)),
                Cell::Shared(index) => xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#)),
                Cell::Date(serial) => xml.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#)),
                Cell::Blank => (),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Builds an xlsx package. Sheets are declared in the given order but stored
/// under part names numbered in reverse, so declared order differs from
/// archive order.
pub fn xlsx(sheets: &[(&str, Vec<Vec<Cell>>)], shared_strings: &[&str]) -> Vec<u8> {
    let sheets: Vec<(&str, String)> = sheets.iter().map(|(name, rows)| (*name, worksheet_xml(rows))).collect();
    package(&sheets, shared_strings)
}

/// Builds an xlsx package with one sheet whose `<sheetData>` content is
/// given verbatim.
pub fn xlsx_with_sheet_data(sheet_data: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
    );
    package(&[("Sheet1", xml)], &[])
}

fn package(sheets: &[(&str, String)], shared_strings: &[&str]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let mut add = |name: &str, content: &str| {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    };

    add(
        "[Content_Types].xml",
        r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
    );

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (position, (name, _)) in sheets.iter().enumerate() {
        let part = sheets.len() - position;
        workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{part}" r:id="rId{part}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{part}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{part}.xml"/>"#
        ));
    }
    workbook.push_str("</sheets></workbook>");
    relationships.push_str(
        r#"<Relationship Id="rIdStyles" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
    );
    add("xl/workbook.xml", &workbook);
    add("xl/_rels/workbook.xml.rels", &relationships);
    add(
        "xl/styles.xml",
        r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#,
    );

    for (position, (_, xml)) in sheets.iter().enumerate() {
        let part = sheets.len() - position;
        add(&format!("xl/worksheets/sheet{part}.xml"), xml);
    }

    if !shared_strings.is_empty() {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
            shared_strings.len()
        );
        for string in shared_strings {
            xml.push_str(&format!("<si><t>{}</t></si>", escape(string)));
        }
        xml.push_str("</sst>");
        add("xl/sharedStrings.xml", &xml);
    }

    writer.finish().unwrap().into_inner()
}

fn record(kind: u16, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&kind.to_le_bytes());
    bytes.extend_from_slice(&(body.len() as u16).to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

fn bof() -> Vec<u8> {
    let mut body = vec![0u8; 16];
    body[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    record(2057, &body)
}

/// BIFF8 Workbook stream: globals with one BOUNDSHEET8 per sheet, then the
/// sheet substreams holding LABEL and NUMBER cells.
fn workbook_stream(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    // Record header, stream offset, visibility and type, then the short string.
    let bound_sheet_size = |name: &str| 4 + 4 + 2 + 2 + name.len();
    let globals_size = bof().len() + sheets.iter().map(|(name, _)| bound_sheet_size(name)).sum::<usize>() + 4;

    let mut substreams = Vec::new();
    let mut offsets = Vec::new();
    for (_, rows) in sheets {
        offsets.push(globals_size + substreams.len());
        substreams.extend(bof());
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                let mut body = Vec::new();
                body.extend_from_slice(&(row as u16).to_le_bytes());
                body.extend_from_slice(&(col as u16).to_le_bytes());
                body.extend_from_slice(&0u16.to_le_bytes());
                match cell {
                    Cell::Text(value) => {
                        body.extend_from_slice(&(value.len() as u16).to_le_bytes());
                        body.push(0);
                        body.extend_from_slice(value.as_bytes());
                        substreams.extend(record(516, &body));
                    }
                    Cell::Number(value) => {
                        body.extend_from_slice(&value.to_le_bytes());
                        substreams.extend(record(515, &body));
                    }
                    _ => (),
                }
            }
        }
        substreams.extend(record(10, &[]));
    }

    let mut stream = bof();
    for ((name, _), offset) in sheets.iter().zip(&offsets) {
        let mut body = Vec::new();
        body.extend_from_slice(&(*offset as u32).to_le_bytes());
        body.extend_from_slice(&[0, 0]);
        body.push(name.len() as u8);
        body.push(0);
        body.extend_from_slice(name.as_bytes());
        stream.extend(record(133, &body));
    }
    stream.extend(record(10, &[]));
    assert_eq!(stream.len(), globals_size);
    stream.extend(substreams);
    stream
}

/// Builds a version 3 compound file holding a single `Workbook` stream.
///
/// Sector 0 is the allocation table, sector 1 the directory and sectors 2..
/// the stream, padded to at least 4096 bytes so it lives in regular sectors.
/// Sheet names and text cells must be ASCII.
pub fn xls(sheets: &[(&str, Vec<Vec<Cell>>)]) -> Vec<u8> {
    const SECTOR: usize = 512;
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;

    let mut stream = workbook_stream(sheets);
    let stream_size = stream.len().max(4096).div_ceil(SECTOR) * SECTOR;
    stream.resize(stream_size, 0);
    let stream_sectors = stream_size / SECTOR;
    assert!(stream_sectors + 2 <= SECTOR / 4, "workbook too large for one allocation sector");

    let mut header = vec![0u8; SECTOR];
    header[0..8].copy_from_slice(&0xE11A_B1A1_E011_CFD0u64.to_le_bytes());
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&4096u32.to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[64..68].copy_from_slice(&0u32.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[72..76].copy_from_slice(&0u32.to_le_bytes());
    header[76..80].copy_from_slice(&0u32.to_le_bytes());
    for slot in header[80..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE.to_le_bytes());
    }

    let mut table = vec![FREE; SECTOR / 4];
    table[0] = 0xFFFF_FFFD;
    table[1] = END_OF_CHAIN;
    for sector in 2..stream_sectors + 2 {
        table[sector] = if sector + 1 < stream_sectors + 2 { sector as u32 + 1 } else { END_OF_CHAIN };
    }
    let table: Vec<u8> = table.iter().flat_map(|entry| entry.to_le_bytes()).collect();

    let mut directory = vec![0u8; SECTOR];
    write_directory_entry(&mut directory[0..128], "Root Entry", 5, END_OF_CHAIN, 0);
    write_directory_entry(&mut directory[128..256], "Workbook", 2, 2, stream_size as u32);

    let mut file = header;
    file.extend(table);
    file.extend(directory);
    file.extend(stream);
    file
}

fn write_directory_entry(entry: &mut [u8], name: &str, kind: u8, start: u32, size: u32) {
    let name: Vec<u8> = name.encode_utf16().chain([0]).flat_map(|unit| unit.to_le_bytes()).collect();
    entry[..name.len()].copy_from_slice(&name);
    entry[64..66].copy_from_slice(&(name.len() as u16).to_le_bytes());
    entry[66] = kind;
    entry[68..72].copy_from_slice(&FREE_SID.to_le_bytes());
    entry[72..76].copy_from_slice(&FREE_SID.to_le_bytes());
    entry[76..80].copy_from_slice(&FREE_SID.to_le_bytes());
    entry[116..120].copy_from_slice(&start.to_le_bytes());
    entry[120..124].copy_from_slice(&size.to_le_bytes());
}

const FREE_SID: u32 = 0xFFFF_FFFF;
