//! Fixed-layout, one-page PDF summary of a damage report.
//!
//! Output is a pure function of the report fields: no creation dates, no
//! document IDs, so the same report always yields the same bytes.

use damage_desk::model::document_file_name;
use damage_desk::{DocumentRenderer, RenderedDocument, Report};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TITLE: &str = "SafeStreet Damage Report Summary";
pub const WRAP_WIDTH_MM: f64 = 170.0;

// A4 portrait; layout coordinates are millimetres from the top-left corner.
const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_X_MM: f64 = 20.0;
const TITLE_Y_MM: f64 = 20.0;
const FIELDS_Y_MM: [f64; 4] = [40.0, 50.0, 60.0, 70.0];
const DETAILS_Y_MM: f64 = 90.0;
const PARAGRAPH_Y_MM: f64 = 100.0;
const TITLE_SIZE: f64 = 16.0;
const BODY_SIZE: f64 = 12.0;
const LINE_HEIGHT_FACTOR: f64 = 1.15;
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];
const FALLBACK_WIDTH: u16 = 556;

/// One positioned line of text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub x_mm: f64,
    pub y_mm: f64,
    pub font_size: f64,
    pub text: String,
}

impl TextLine {
    fn new(y_mm: f64, font_size: f64, text: impl Into<String>) -> Self {
        Self {
            x_mm: MARGIN_X_MM,
            y_mm,
            font_size,
            text: text.into(),
        }
    }
}

/// The one-sentence recap printed under "Details:".
pub fn summary_sentence(report: &Report) -> String {
    format!(
        "This report highlights damage at {}. Summary: {}. Status: {}.",
        report.location, report.summary, report.status
    )
}

/// Every line of the page, top to bottom.
pub fn layout(report: &Report) -> Vec<TextLine> {
    let fields = [
        format!("Location: {}", report.location),
        format!("Summary: {}", report.summary),
        format!("Status: {}", report.status),
        format!("Date: {}", report.formatted_date()),
    ];
    let mut lines = vec![TextLine::new(TITLE_Y_MM, TITLE_SIZE, TITLE)];
    lines.extend(
        FIELDS_Y_MM
            .iter()
            .zip(fields)
            .map(|(y, text)| TextLine::new(*y, BODY_SIZE, text)),
    );
    lines.push(TextLine::new(DETAILS_Y_MM, BODY_SIZE, "Details:"));

    let step_mm = BODY_SIZE * LINE_HEIGHT_FACTOR / PT_PER_MM;
    let wrapped = wrap_text(&summary_sentence(report), BODY_SIZE, WRAP_WIDTH_MM);
    lines.extend(
        wrapped
            .into_iter()
            .enumerate()
            .map(|(i, text)| TextLine::new(PARAGRAPH_Y_MM + step_mm * i as f64, BODY_SIZE, text)),
    );
    lines
}

fn char_width(c: char) -> u16 {
    match c {
        ' '..='~' => HELVETICA_WIDTHS[c as usize - 32],
        _ => FALLBACK_WIDTH,
    }
}

/// Rendered width of `text` in millimetres at `font_size` points.
pub fn text_width_mm(text: &str, font_size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    f64::from(units) / 1000.0 * font_size / PT_PER_MM
}

/// Greedy word wrap to `width_mm`. Newlines force a break; a word wider than
/// the column is split between characters.
pub fn wrap_text(text: &str, font_size: f64, width_mm: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width_mm(&candidate, font_size) <= width_mm {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width_mm(word, font_size) <= width_mm {
                current = word.to_string();
            } else {
                let mut pieces = break_word(word, font_size, width_mm);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, font_size: f64, width_mm: f64) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        current.push(c);
        if current.chars().count() > 1 && text_width_mm(&current, font_size) > width_mm {
            current.pop();
            pieces.push(std::mem::replace(&mut current, c.to_string()));
        }
    }
    pieces.push(current);
    pieces
}

/// PDF literal string body (WinAnsi). Characters outside Latin-1 become '?'.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(lines: &[TextLine]) -> String {
    lines
        .iter()
        .map(|l| {
            format!(
                "BT\n/F1 {} Tf\n{:.2} {:.2} Td\n({}) Tj\nET",
                l.font_size,
                l.x_mm * PT_PER_MM,
                (PAGE_HEIGHT_MM - l.y_mm) * PT_PER_MM,
                pdf_string(&l.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn assemble(content: &str) -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
            PAGE_WIDTH_MM * PT_PER_MM,
            PAGE_HEIGHT_MM * PT_PER_MM
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut out: Vec<u8> = b"%PDF-1.3\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in offsets {
        tail.push_str(&format!("{:010} 00000 n \n", off));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.extend_from_slice(tail.as_bytes());
    out
}

/// Render the report to PDF bytes.
pub fn render_pdf(report: &Report) -> Vec<u8> {
    assemble(&content_stream(&layout(report)))
}

/// `Damage_Report_<id>.pdf`
pub fn file_name(report: &Report) -> String {
    document_file_name(&report.id)
}

/// Write an already rendered document to `out_path`.
pub fn write_pdf(
    document: &RenderedDocument,
    out_path: impl AsRef<Path>,
) -> Result<(), DocumentError> {
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(DocumentError::Io)?;
    f.write_all(&document.bytes).map_err(DocumentError::Io)?;
    Ok(())
}

/// Write an already rendered document into `dir` under its own file name.
pub fn save_pdf(
    document: &RenderedDocument,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, DocumentError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(DocumentError::Io)?;
    let path = dir.join(&document.file_name);
    write_pdf(document, &path)?;
    Ok(path)
}

/// [`DocumentRenderer`] backed by [`render_pdf`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, report: &Report) -> RenderedDocument {
        RenderedDocument {
            file_name: file_name(report),
            bytes: render_pdf(report),
        }
    }
}

#[derive(Debug)]
pub enum DocumentError {
    Io(std::io::Error),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Io(e) => write!(f, "io: {}", e),
        }
    }
}

impl std::error::Error for DocumentError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_st() -> Report {
        serde_json::from_str(
            r#"{"_id":"1","location":"Main St","summary":"Pothole","status":"pending","date":"2024-01-01"}"#,
        )
        .unwrap()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn layout_fixed_positions() {
        let lines = layout(&main_st());
        let summary: Vec<(f64, &str)> = lines.iter().map(|l| (l.y_mm, l.text.as_str())).collect();
        assert_eq!(summary[0], (20.0, TITLE));
        assert_eq!(summary[1], (40.0, "Location: Main St"));
        assert_eq!(summary[2], (50.0, "Summary: Pothole"));
        assert_eq!(summary[3], (60.0, "Status: pending"));
        assert_eq!(summary[4], (70.0, "Date: 1/1/2024"));
        assert_eq!(summary[5], (90.0, "Details:"));
        assert_eq!(
            summary[6],
            (
                100.0,
                "This report highlights damage at Main St. Summary: Pothole. Status: pending."
            )
        );
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0].font_size, 16.0);
        assert!(lines.iter().all(|l| l.x_mm == 20.0));
        assert!(lines[1..].iter().all(|l| l.font_size == 12.0));
    }

    #[test]
    fn text_width_uses_helvetica_metrics() {
        // 944/1000 * 12pt = 11.328pt
        let w = text_width_mm("W", 12.0);
        assert!((w - 11.328 / PT_PER_MM).abs() < 1e-9);
        assert_eq!(text_width_mm("", 12.0), 0.0);
        assert!(text_width_mm("iiii", 12.0) < text_width_mm("MMMM", 12.0));
    }

    #[test]
    fn wrap_keeps_every_word_within_width() {
        let text = "Large sinkhole opened across both lanes near the northbound bus stop after heavy rain overnight and traffic is being diverted";
        let lines = wrap_text(text, 12.0, WRAP_WIDTH_MM);
        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|l| text_width_mm(l, 12.0) <= WRAP_WIDTH_MM));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn wrap_breaks_overlong_word() {
        let word = "W".repeat(80);
        let lines = wrap_text(&word, 12.0, WRAP_WIDTH_MM);
        assert!(lines.len() >= 2);
        assert_eq!(lines.concat(), word);
        assert!(lines
            .iter()
            .all(|l| text_width_mm(l, 12.0) <= WRAP_WIDTH_MM));
    }

    #[test]
    fn wrap_honours_newlines() {
        assert_eq!(wrap_text("a\nb", 12.0, WRAP_WIDTH_MM), vec!["a", "b"]);
        assert_eq!(wrap_text("", 12.0, WRAP_WIDTH_MM), vec![""]);
    }

    #[test]
    fn long_paragraph_steps_down_the_page() {
        let mut r = main_st();
        r.summary = "Pothole ".repeat(40).trim_end().to_string();
        let lines = layout(&r);
        let paragraph: Vec<&TextLine> = lines.iter().filter(|l| l.y_mm >= 100.0).collect();
        assert!(paragraph.len() > 1);
        let step = paragraph[1].y_mm - paragraph[0].y_mm;
        assert!((step - 12.0 * 1.15 / PT_PER_MM).abs() < 1e-9);
    }

    #[test]
    fn render_is_deterministic() {
        let a = render_pdf(&main_st());
        let b = render_pdf(&main_st());
        assert_eq!(a, b);
        assert!(a.starts_with(b"%PDF-1.3\n"));
        assert!(a.ends_with(b"%%EOF\n"));
        assert!(contains(&a, "(Location: Main St) Tj"));
        assert!(contains(&a, "(Date: 1/1/2024) Tj"));
        assert!(contains(&a, "/BaseFont /Helvetica"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_pdf(&main_st());
        let text = String::from_utf8_lossy(&pdf);
        let start = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let xref_at: usize = text[start..].lines().next().unwrap().parse().unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref\n0 6\n"));

        let table = String::from_utf8_lossy(&pdf[xref_at..]).into_owned();
        let offsets: Vec<usize> = table
            .lines()
            .skip(3)
            .take(5)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, off) in offsets.iter().enumerate() {
            let header = format!("{} 0 obj\n", i + 1);
            assert!(pdf[*off..].starts_with(header.as_bytes()), "object {}", i + 1);
        }
    }

    #[test]
    fn special_characters_are_escaped() {
        let mut r = main_st();
        r.location = "Bridge (east) \\ ramp".into();
        r.summary = "Café – closed".into();
        let pdf = render_pdf(&r);
        assert!(contains(&pdf, "(Location: Bridge \\(east\\) \\\\ ramp) Tj"));
        assert!(contains(&pdf, "(Summary: Caf\\351 ? closed) Tj"));
    }

    #[test]
    fn renderer_names_file_by_id() {
        let doc = PdfRenderer.render(&main_st());
        assert_eq!(doc.file_name, "Damage_Report_1.pdf");
        assert_eq!(doc.bytes, render_pdf(&main_st()));
    }

    #[test]
    fn save_pdf_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PdfRenderer.render(&main_st());
        let path = save_pdf(&doc, dir.path().join("reports")).unwrap();
        assert_eq!(path.file_name().unwrap(), "Damage_Report_1.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), doc.bytes);
    }

    #[test]
    fn write_pdf_uses_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let doc = PdfRenderer.render(&main_st());
        let out = dir.path().join("custom.pdf");
        write_pdf(&doc, &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), doc.bytes);
        assert!(!dir.path().join("Damage_Report_1.pdf").exists());
    }
}
