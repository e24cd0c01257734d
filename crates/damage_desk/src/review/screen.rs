//! Review screen state: the report table, its actions, and the banner.

use crate::api::{ApiError, ReportMailer, ReportSource};
use crate::model::{DocumentRenderer, Report};
use crate::review::accept::{AcceptController, ACCEPT_DELAY_MS};
use crate::review::dispatch::{DocumentSink, ViewOutcome, ViewPipeline};
use crate::review::notice::{Notice, Notifier, NOTICE_TTL_MS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

pub const SCREEN_TITLE: &str = "Damage Reports";
pub const LOADING_TEXT: &str = "Loading reports...";
pub const CONFIRM_TEXT: &str = "View Report to confirm";
const HEADERS: [&str; 6] = ["ID", "Location", "Summary", "Status", "Date", "Actions"];

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    pub accept_delay_ms: u64,
    pub notice_ttl_ms: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            accept_delay_ms: ACCEPT_DELAY_MS,
            notice_ttl_ms: NOTICE_TTL_MS,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError {
    #[error("no report at row {0}")]
    NoSuchRow(usize),
    #[error("another report is awaiting confirmation")]
    AcceptPending,
}

/// One table row as the view shows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    /// 1-based position in the list.
    pub index: usize,
    pub id: String,
    pub location: String,
    pub summary: String,
    pub status: String,
    pub date: String,
    /// False on every row while an accept is pending.
    pub actions_enabled: bool,
    /// True on the row whose accept is pending.
    pub confirming: bool,
}

impl TableRow {
    pub fn actions_label(&self) -> String {
        if self.confirming {
            format!("{} [cancel]", CONFIRM_TEXT)
        } else if self.actions_enabled {
            "[accept] [reject]".to_string()
        } else {
            "(disabled)".to_string()
        }
    }
}

pub struct ReviewScreen<S, R, M, K> {
    source: S,
    pipeline: Arc<ViewPipeline<R, M, K>>,
    accept: AcceptController,
    reports: Vec<Report>,
    loading: bool,
    load_error: Option<String>,
}

impl<S, R, M, K> ReviewScreen<S, R, M, K>
where
    S: ReportSource,
    R: DocumentRenderer,
    M: ReportMailer,
    K: DocumentSink,
{
    pub fn new(source: S, renderer: R, mailer: M, sink: K, config: &ReviewConfig) -> Self {
        let notifier = Notifier::new(Duration::from_millis(config.notice_ttl_ms));
        Self {
            source,
            pipeline: Arc::new(ViewPipeline::new(renderer, mailer, sink, notifier)),
            accept: AcceptController::new(Duration::from_millis(config.accept_delay_ms)),
            reports: Vec::new(),
            loading: false,
            load_error: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pipeline(&self) -> &ViewPipeline<R, M, K> {
        &self.pipeline
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message from the last failed load, cleared by the next successful one.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Apply a fetch result. On failure the previous list is kept.
    pub fn finish_load(
        &mut self,
        result: Result<Vec<Report>, ApiError>,
    ) -> Result<usize, ApiError> {
        self.loading = false;
        match result {
            Ok(reports) => {
                self.reports = reports;
                self.load_error = None;
                Ok(self.reports.len())
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch reports");
                self.load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn load(&mut self) -> Result<usize, ApiError> {
        self.begin_load();
        let result = self.source.list_reports().await;
        self.finish_load(result)
    }

    pub fn report(&self, index: usize) -> Result<&Report, ActionError> {
        index
            .checked_sub(1)
            .and_then(|i| self.reports.get(i))
            .ok_or(ActionError::NoSuchRow(index))
    }

    pub fn rows(&self) -> Vec<TableRow> {
        let pending = self.accept.pending_report_id();
        self.reports
            .iter()
            .enumerate()
            .map(|(i, r)| TableRow {
                index: i + 1,
                id: r.id.clone(),
                location: r.location.clone(),
                summary: r.summary.clone(),
                status: r.status.clone(),
                date: r.formatted_date(),
                actions_enabled: pending.is_none(),
                confirming: pending.as_deref() == Some(r.id.as_str()),
            })
            .collect()
    }

    pub fn accept_delay(&self) -> Duration {
        self.accept.delay()
    }

    pub fn pending_report_id(&self) -> Option<String> {
        self.accept.pending_report_id()
    }

    /// Start the grace period for row `index`; when it elapses the report is
    /// rendered, emailed and saved.
    pub fn accept(&self, index: usize) -> Result<&Report, ActionError> {
        let report = self.report(index)?;
        let pipeline = Arc::clone(&self.pipeline);
        let started = self.accept.start(report.clone(), move |r| async move {
            pipeline.view(&r).await;
        });
        if !started {
            return Err(ActionError::AcceptPending);
        }
        Ok(report)
    }

    pub fn cancel(&self) -> Option<String> {
        self.accept.cancel()
    }

    /// Acknowledge a rejection. The report's status is left untouched.
    pub fn reject(&self, index: usize) -> Result<&Report, ActionError> {
        if self.accept.is_pending() {
            return Err(ActionError::AcceptPending);
        }
        let report = self.report(index)?;
        info!(report_id = %report.id, "rejected report");
        Ok(report)
    }

    /// Run the view flow for row `index` right away, bypassing the grace period.
    pub async fn view_now(&self, index: usize) -> Result<ViewOutcome, ActionError> {
        let report = self.report(index)?;
        Ok(self.pipeline.view(report).await)
    }

    pub fn notification(&self) -> Option<String> {
        self.pipeline.notifier().current()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<Option<Notice>> {
        self.pipeline.notifier().subscribe()
    }

    /// Report ids as their view flow starts, whether from a fired accept or
    /// from `view_now`.
    pub fn subscribe_views(&self) -> watch::Receiver<Option<String>> {
        self.pipeline.subscribe_viewing()
    }

    /// Accepted reports whose view flow is still running.
    pub fn in_flight(&self) -> usize {
        self.accept.in_flight()
    }

    /// Wait for every fired accept to finish its email and save.
    pub async fn wait_in_flight(&self) -> usize {
        self.accept.wait_in_flight().await
    }

    pub fn render_table(&self) -> String {
        let mut out = format!("{}\n", SCREEN_TITLE);
        if self.loading {
            out.push_str(LOADING_TEXT);
            out.push('\n');
            return out;
        }
        if let Some(e) = &self.load_error {
            out.push_str(&format!("! could not load reports: {}\n", e));
        }
        out.push_str(&format_table(&self.rows()));
        if let Some(text) = self.notification() {
            out.push_str(&format!(">> {}\n", text));
        }
        out
    }
}

/// Fixed-width text table with a header rule.
pub fn format_table(rows: &[TableRow]) -> String {
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|r| {
            [
                r.index.to_string(),
                r.location.clone(),
                r.summary.clone(),
                r.status.clone(),
                r.date.clone(),
                r.actions_label(),
            ]
        })
        .collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |values: &[&str]| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(widths)
            .map(|(v, w)| format!("{:<w$}", v, w = w))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(&HEADERS);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &cells {
        let values: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&values));
    }
    out
}
