//! Report records as served by the backend, and the rendered-document seam.

mod document;
mod report;

pub use document::{document_file_name, DocumentRenderer, RenderedDocument};
pub use report::{Report, ReportDate, INVALID_DATE};
