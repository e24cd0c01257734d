//! reqwest client for the reports backend.

use crate::model::Report;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const REPORTS_PATH: &str = "api/reports";
const SEND_EMAIL_PATH: &str = "api/send-report-email";
const TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_secs: TIMEOUT_SECS,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Body of `POST /api/send-report-email`.
#[derive(Serialize)]
pub struct EmailRequest<'a> {
    pub report: &'a Report,
    #[serde(rename = "pdfBase64")]
    pub pdf_base64: &'a str,
}

/// Where the review screen gets its reports from.
pub trait ReportSource: Send + Sync {
    fn list_reports(&self) -> impl Future<Output = Result<Vec<Report>, ApiError>> + Send;
}

/// Hands a rendered report to the backend for emailing.
pub trait ReportMailer: Send + Sync + 'static {
    fn send_report_email(
        &self,
        report: &Report,
        pdf_base64: &str,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;
}

/// Client for the reports backend. No retries: a failed call is reported once.
#[derive(Clone)]
pub struct ReportsClient {
    base: Url,
    client: reqwest::Client,
}

impl ReportsClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn reports_url(&self) -> Result<Url, ApiError> {
        Ok(self.base.join(REPORTS_PATH)?)
    }

    pub fn send_email_url(&self) -> Result<Url, ApiError> {
        Ok(self.base.join(SEND_EMAIL_PATH)?)
    }

    async fn read_success(res: reqwest::Response) -> Result<String, ApiError> {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Api(status.as_u16(), body));
        }
        Ok(body)
    }

    /// `GET /api/reports`
    pub async fn fetch_reports(&self) -> Result<Vec<Report>, ApiError> {
        let url = self.reports_url()?;
        debug!(%url, "fetching reports");
        let res = self.client.get(url).send().await?;
        let body = Self::read_success(res).await?;
        let reports: Vec<Report> = serde_json::from_str(&body)?;
        info!(count = reports.len(), "reports loaded");
        Ok(reports)
    }

    /// `POST /api/send-report-email`. The success payload is backend-defined.
    pub async fn post_report_email(
        &self,
        report: &Report,
        pdf_base64: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.send_email_url()?;
        let body = EmailRequest { report, pdf_base64 };
        debug!(%url, report_id = %report.id, bytes_b64 = pdf_base64.len(), "sending report email");
        let res = self.client.post(url).json(&body).send().await?;
        let text = Self::read_success(res).await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        // Non-JSON success bodies are kept verbatim.
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }
}

impl ReportSource for ReportsClient {
    async fn list_reports(&self) -> Result<Vec<Report>, ApiError> {
        self.fetch_reports().await
    }
}

impl ReportMailer for ReportsClient {
    async fn send_report_email(
        &self,
        report: &Report,
        pdf_base64: &str,
    ) -> Result<serde_json::Value, ApiError> {
        self.post_report_email(report, pdf_base64).await
    }
}
