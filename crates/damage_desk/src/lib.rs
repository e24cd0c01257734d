//! damage_desk — operator console core for crowd-sourced damage reports.
//!
//! Loads reports from the backend, drives the accept/confirm/timeout flow,
//! and dispatches rendered documents to the email endpoint and local disk.
//! Never writes report status back to the backend.

pub mod api;
pub mod model;
pub mod review;

pub use api::{ApiConfig, ApiError, ReportMailer, ReportSource, ReportsClient};
pub use model::{DocumentRenderer, RenderedDocument, Report, ReportDate};
pub use review::{
    AcceptController, AcceptState, DirectorySink, DocumentSink, EmailStatus, Notifier,
    ReviewConfig, ReviewScreen, TableRow, ViewOutcome, ViewPipeline,
};
