use anyhow::{Context, Result};
use log::debug;
use quick_xml::events::Event;
use std::io::Read;

/// Decompressed byte cap per ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Flatten an XLSX workbook to linear text: every non-empty cell value on
/// its own line, in row-major order, sheet by sheet. Empty cells leave no
/// trace in the output.
///
/// The workbook is read as an OOXML ZIP: shared strings from
/// `xl/sharedStrings.xml`, then each `xl/worksheets/sheetN.xml` in sheet
/// order. Shared-string, inline-string, formula-string, boolean, and
/// numeric cells are all preserved as their raw display text.
pub fn extract_xlsx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("Failed to open XLSX archive")?;

    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = list_worksheet_names(&archive);
    debug!(
        "XLSX workbook: {} sheet(s), {} shared string(s)",
        sheet_names.len(),
        shared_strings.len()
    );

    let mut values = Vec::new();
    for name in sheet_names {
        let sheet_xml = read_zip_entry(&mut archive, &name)?;
        read_sheet_cells(&sheet_xml, &shared_strings, &mut values)
            .with_context(|| format!("Failed to parse worksheet {}", name))?;
    }

    Ok(values.join("\n"))
}

fn read_zip_entry(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .with_context(|| format!("Missing ZIP entry {}", name))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .with_context(|| format!("Failed to read ZIP entry {}", name))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        anyhow::bail!("ZIP entry {} exceeds size limit", name);
    }
    Ok(out)
}

/// Shared strings are optional; a workbook with only numeric cells has none.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>> {
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry(archive, "xl/sharedStrings.xml")?;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                // rich-text entries split one value across several <t> runs
                b"t" if current.is_some() => in_t = true,
                _ => {}
            },
            Event::Text(t) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(t.unescape().unwrap_or_default().as_ref());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

fn list_worksheet_names(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Append every non-empty cell value of one worksheet, in document order
/// (which is row-major in sheet XML).
fn read_sheet_cells(
    xml: &[u8],
    shared_strings: &[String],
    values: &mut Vec<String>,
) -> Result<()> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut cell_type = CellType::Raw;
    let mut in_v = false;
    let mut in_inline_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => cell_type = cell_type_from_attrs(&e),
                b"v" => in_v = true,
                b"t" if cell_type == CellType::Inline => in_inline_t = true,
                _ => {}
            },
            Event::Text(t) if in_v || in_inline_t => {
                let raw = t.unescape().unwrap_or_default();
                let raw = raw.trim();
                if !raw.is_empty() {
                    match cell_type {
                        CellType::Shared => {
                            if let Ok(i) = raw.parse::<usize>() {
                                if let Some(s) = shared_strings.get(i) {
                                    if !s.is_empty() {
                                        values.push(s.clone());
                                    }
                                }
                            }
                        }
                        CellType::Raw | CellType::Inline => values.push(raw.to_string()),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"t" => in_inline_t = false,
                b"c" => cell_type = CellType::Raw,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CellType {
    /// Numeric, boolean, or formula-string value held directly in `<v>`
    Raw,
    /// `t="s"`: `<v>` holds an index into the shared-string table
    Shared,
    /// `t="inlineStr"`: value held in `<is><t>`
    Inline,
}

fn cell_type_from_attrs(e: &quick_xml::events::BytesStart<'_>) -> CellType {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"t" {
            return match attr.value.as_ref() {
                b"s" => CellType::Shared,
                b"inlineStr" => CellType::Inline,
                _ => CellType::Raw,
            };
        }
    }
    CellType::Raw
}
