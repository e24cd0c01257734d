//! Rendered document handed from a renderer to the dispatch pipeline.

use crate::model::Report;
use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use sha2::{Digest, Sha256};

/// `Damage_Report_<id>.pdf`. Path separators, `:` and control characters in
/// the id become `_`, so the name always stays inside the target directory.
pub fn document_file_name(report_id: &str) -> String {
    let id: String = report_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("Damage_Report_{}.pdf", id)
}

/// Document bytes plus the file name they are saved under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    pub fn new(report: &Report, bytes: Vec<u8>) -> Self {
        Self {
            file_name: document_file_name(&report.id),
            bytes,
        }
    }

    /// SHA-256 of the bytes, lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    /// Standard padded base64, as the email endpoint expects in `pdfBase64`.
    pub fn to_base64(&self) -> String {
        b64.encode(&self.bytes)
    }
}

/// Pure mapping from a report to a document. Must not depend on anything but
/// the report fields.
pub trait DocumentRenderer: Send + Sync + 'static {
    fn render(&self, report: &Report) -> RenderedDocument;
}
