//! Shopping list rendering.
//!
//! CSV is plain text with a fixed header. PDF output is a minimal PDF 1.4
//! document that embeds DejaVu Sans as a Type0 font, so ingredient names in
//! any script the font covers render as written. Lines that overflow an A4
//! page continue on a new page.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::{Context, Result};
use flate2::{Compression, write::ZlibEncoder};
use serde::Deserialize;
use ttf_parser::{Face, GlyphId};

use crate::constants::export::{CSV_FILENAME, PDF_FILENAME};
use crate::db::ShoppingListItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Pdf,
}

/// A rendered file ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct Export {
    pub content_type: &'static str,
    pub file_name: &'static str,
    pub body: Vec<u8>,
}

pub fn render(format: ExportFormat, items: &[ShoppingListItem]) -> Result<Export> {
    Ok(match format {
        ExportFormat::Csv => Export {
            content_type: "text/csv; charset=utf-8",
            file_name: CSV_FILENAME,
            body: render_csv(items).into_bytes(),
        },
        ExportFormat::Pdf => Export {
            content_type: "application/pdf",
            file_name: PDF_FILENAME,
            body: render_pdf(items)?,
        },
    })
}

#[must_use]
pub fn render_csv(items: &[ShoppingListItem]) -> String {
    let mut csv = String::from("Name,Measurement_unit,Amount\n");
    for item in items {
        let _ = writeln!(
            csv,
            "{},{},{}",
            csv_field(&item.name),
            csv_field(&item.measurement_unit),
            item.amount
        );
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
const FONT_NAME: &str = "DejaVuSans";

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 56;
const TITLE_SIZE: u32 = 18;
const BODY_SIZE: u32 = 12;
const LEADING: u32 = 18;
/// Baseline of the first list line, below the title.
const FIRST_LINE_Y: u32 = PAGE_HEIGHT - MARGIN - 30;
pub const LINES_PER_PAGE: usize = ((FIRST_LINE_Y - MARGIN) / LEADING) as usize;

// Object numbers: 1 catalog, 2 page tree, 3 Type0 font, 4 CID font,
// 5 ToUnicode map, 6 font descriptor, 7 font program, then
// (page, content) pairs.
const FIRST_PAGE_OBJECT: usize = 8;

/// Glyph lookup over the embedded font. Records every glyph it hands out
/// so the font dictionaries only list what the document uses.
struct GlyphEncoder<'a> {
    face: Face<'a>,
    used: BTreeMap<u16, char>,
}

impl<'a> GlyphEncoder<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        let face = Face::parse(data, 0).context("Failed to parse embedded PDF font")?;
        Ok(Self {
            face,
            used: BTreeMap::new(),
        })
    }

    /// Hex string of two-byte glyph ids for `Identity-H` text operators.
    /// Characters the font lacks map to glyph 0.
    fn encode(&mut self, text: &str) -> String {
        let mut hex = String::with_capacity(text.len() * 4);
        for ch in text.chars() {
            let ch = if ch.is_control() { ' ' } else { ch };
            let GlyphId(gid) = self.face.glyph_index(ch).unwrap_or(GlyphId(0));
            if gid != 0 {
                self.used.entry(gid).or_insert(ch);
            }
            let _ = write!(hex, "{gid:04X}");
        }
        hex
    }

    /// Font units scaled to the 1000-unit PDF glyph space.
    fn scale(&self, value: i32) -> i32 {
        value * 1000 / i32::from(self.face.units_per_em().max(1))
    }

    fn widths(&self) -> String {
        let mut out = String::from("[");
        for gid in self.used.keys() {
            let advance = self
                .face
                .glyph_hor_advance(GlyphId(*gid))
                .map_or(0, |a| self.scale(i32::from(a)));
            let _ = write!(out, " {gid} [{advance}]");
        }
        out.push_str(" ]");
        out
    }

    fn to_unicode(&self) -> String {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );

        let entries: Vec<_> = self.used.iter().collect();
        // At most 100 entries per bfchar block.
        for block in entries.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", block.len());
            for (gid, ch) in block {
                let mut units = [0u16; 2];
                let utf16: String = ch
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|unit| format!("{unit:04X}"))
                    .collect();
                let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str(
            "endcmap\nCMapName currentdict /defineresource pop\nend\nend",
        );
        cmap
    }

    fn descriptor(&self) -> String {
        let bbox = self.face.global_bounding_box();
        let ascent = self.scale(i32::from(self.face.ascender()));
        let descent = self.scale(i32::from(self.face.descender()));
        let cap_height = self
            .face
            .capital_height()
            .map_or(ascent, |h| self.scale(i32::from(h)));

        format!(
            "<< /Type /FontDescriptor /FontName /{FONT_NAME} /Flags 32 \
             /FontBBox [{} {} {} {}] /ItalicAngle 0 /Ascent {ascent} /Descent {descent} \
             /CapHeight {cap_height} /StemV 80 /FontFile2 7 0 R >>",
            self.scale(i32::from(bbox.x_min)),
            self.scale(i32::from(bbox.y_min)),
            self.scale(i32::from(bbox.x_max)),
            self.scale(i32::from(bbox.y_max)),
        )
    }
}

fn stream_object(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut object = format!("<< /Length {}{dict_extra} >>\nstream\n", data.len()).into_bytes();
    object.extend_from_slice(data);
    object.extend_from_slice(b"\nendstream");
    object
}

fn font_program() -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(FONT_DATA)
        .context("Failed to compress PDF font")?;
    let compressed = encoder.finish().context("Failed to compress PDF font")?;

    Ok(stream_object(
        &format!(" /Length1 {} /Filter /FlateDecode", FONT_DATA.len()),
        &compressed,
    ))
}

pub fn render_pdf(items: &[ShoppingListItem]) -> Result<Vec<u8>> {
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "{} ({}) - {}",
                item.name, item.measurement_unit, item.amount
            )
        })
        .collect();

    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![lines.as_slice()]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    let page_count = pages.len();

    let mut glyphs = GlyphEncoder::new(FONT_DATA)?;
    let mut page_objects: Vec<Vec<u8>> = Vec::with_capacity(page_count * 2);

    for (index, page_lines) in pages.iter().enumerate() {
        let content_ref = FIRST_PAGE_OBJECT + index * 2 + 1;
        page_objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_ref} 0 R >>"
            )
            .into_bytes(),
        );

        let title = if page_count > 1 {
            format!("Shopping list ({}/{page_count})", index + 1)
        } else {
            "Shopping list".to_string()
        };
        let stream = page_stream(&mut glyphs, &title, page_lines);
        page_objects.push(stream_object("", stream.as_bytes()));
    }

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", FIRST_PAGE_OBJECT + i * 2))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects: Vec<Vec<u8>> = Vec::with_capacity(FIRST_PAGE_OBJECT - 1 + page_objects.len());
    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").into_bytes());
    objects.push(
        format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{FONT_NAME} /Encoding /Identity-H \
             /DescendantFonts [4 0 R] /ToUnicode 5 0 R >>"
        )
        .into_bytes(),
    );
    objects.push(
        format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{FONT_NAME} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /FontDescriptor 6 0 R /DW 1000 /W {} /CIDToGIDMap /Identity >>",
            glyphs.widths()
        )
        .into_bytes(),
    );
    objects.push(stream_object("", glyphs.to_unicode().as_bytes()));
    objects.push(glyphs.descriptor().into_bytes());
    objects.push(font_program()?);
    objects.extend(page_objects);

    Ok(assemble(&objects))
}

fn page_stream(glyphs: &mut GlyphEncoder<'_>, title: &str, lines: &[String]) -> String {
    let mut out = String::new();
    let title_y = PAGE_HEIGHT - MARGIN;

    let _ = writeln!(
        out,
        "BT /F1 {TITLE_SIZE} Tf {MARGIN} {title_y} Td <{}> Tj ET",
        glyphs.encode(title)
    );

    for (i, line) in lines.iter().enumerate() {
        let offset = u32::try_from(i).unwrap_or(0) * LEADING;
        let y = FIRST_LINE_Y - offset;
        let _ = writeln!(
            out,
            "BT /F1 {BODY_SIZE} Tf {MARGIN} {y} Td <{}> Tj ET",
            glyphs.encode(line)
        );
    }

    out
}

fn assemble(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());

    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(xref, "{offset:010} 00000 n ");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    );
    pdf.extend_from_slice(xref.as_bytes());

    pdf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, amount: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = render_csv(&[item("egg", "pcs", 2), item("flour", "g", 500)]);
        assert_eq!(csv, "Name,Measurement_unit,Amount\negg,pcs,2\nflour,g,500\n");
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let csv = render_csv(&[item("salt, sea", "pinch \"big\"", 1)]);
        assert!(csv.ends_with("\"salt, sea\",\"pinch \"\"big\"\"\",1\n"));
    }

    /// Text drawn by every `Tj` operator, decoded through the ToUnicode map.
    fn shown_text(pdf: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(pdf).into_owned();

        let mut glyphs = std::collections::HashMap::new();
        let bfchar = regex::Regex::new(r"<([0-9A-F]{4})> <([0-9A-F]+)>").unwrap();
        for caps in bfchar.captures_iter(&text) {
            let units: Vec<u16> = caps[2]
                .as_bytes()
                .chunks(4)
                .map(|c| u16::from_str_radix(std::str::from_utf8(c).unwrap(), 16).unwrap())
                .collect();
            glyphs.insert(caps[1].to_string(), String::from_utf16(&units).unwrap());
        }

        let shows = regex::Regex::new(r"<([0-9A-F]*)> Tj").unwrap();
        shows
            .captures_iter(&text)
            .map(|caps| {
                caps[1]
                    .as_bytes()
                    .chunks(4)
                    .map(|gid| glyphs[std::str::from_utf8(gid).unwrap()].clone())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_pdf_single_page() {
        let pdf = render_pdf(&[item("flour", "g", 500)]).unwrap();
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/Subtype /Type0"));
        assert!(text.contains("/FontFile2 7 0 R"));
        assert!(text.trim_end().ends_with("%%EOF"));

        assert_eq!(shown_text(&pdf), vec!["Shopping list", "flour (g) - 500"]);
    }

    #[test]
    fn test_pdf_keeps_cyrillic_names() {
        let pdf = render_pdf(&[item("Мука", "г", 500), item("Яйца", "шт", 2)]).unwrap();
        assert_eq!(
            shown_text(&pdf),
            vec!["Shopping list", "Мука (г) - 500", "Яйца (шт) - 2"]
        );

        let face = Face::parse(FONT_DATA, 0).unwrap();
        let GlyphId(gid) = face.glyph_index('М').unwrap();
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.contains(&format!("<{gid:04X}> <041C>")));
    }

    #[test]
    fn test_pdf_empty_list_still_has_a_page() {
        let pdf = render_pdf(&[]).unwrap();
        let text = String::from_utf8_lossy(&pdf).into_owned();
        assert!(text.contains("/Count 1"));
        assert_eq!(shown_text(&pdf), vec!["Shopping list"]);
    }

    #[test]
    fn test_pdf_paginates_overflowing_lines() {
        let items: Vec<_> = (0..LINES_PER_PAGE * 2 + 1)
            .map(|i| item(&format!("item {i}"), "g", 1))
            .collect();
        let pdf = render_pdf(&items).unwrap();
        let text = String::from_utf8_lossy(&pdf).into_owned();
        assert!(text.contains("/Count 3"));

        let shown = shown_text(&pdf);
        assert!(shown.contains(&"Shopping list (3/3)".to_string()));
        assert_eq!(shown.last().map(String::as_str), Some("item 76 (g) - 1"));
    }

    #[test]
    fn test_pdf_xref_offsets_point_at_objects() {
        let pdf = render_pdf(&[item("milk", "ml", 250)]).unwrap();
        let xref_at = pdf
            .windows(5)
            .rposition(|w| w == b"xref\n")
            .unwrap();
        let table = std::str::from_utf8(&pdf[xref_at..]).unwrap();
        // Entry 0 is the free-list head; entry 1 is the catalog.
        let entries: Vec<usize> = table
            .lines()
            .skip(3)
            .take(FIRST_PAGE_OBJECT + 1)
            .map(|line| line[..10].parse().unwrap())
            .collect();
        for (index, offset) in entries.iter().enumerate() {
            let header = format!("{} 0 obj", index + 1);
            assert!(pdf[*offset..].starts_with(header.as_bytes()));
        }
    }

    #[test]
    fn test_glyph_encoder_maps_missing_chars_to_notdef() {
        let mut glyphs = GlyphEncoder::new(FONT_DATA).unwrap();
        let hex = glyphs.encode("a\u{10FFFD}");
        assert!(hex.ends_with("0000"));
        assert_eq!(glyphs.used.len(), 1);
    }
}
