//! Backend HTTP API: report listing and the report email endpoint.

mod client;

pub use client::{
    ApiConfig, ApiError, EmailRequest, ReportMailer, ReportSource, ReportsClient,
    DEFAULT_BACKEND_URL,
};
