//! View pipeline: render, encode, email, save, notify.

use crate::api::ReportMailer;
use crate::model::{DocumentRenderer, RenderedDocument, Report};
use crate::review::notice::{Notifier, MAIL_FAILED, MAIL_SENT};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

/// Where rendered documents are written locally.
pub trait DocumentSink: Send + Sync + 'static {
    fn save(&self, document: &RenderedDocument) -> std::io::Result<PathBuf>;
}

/// Writes documents into a directory, creating it if needed.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSink for DirectorySink {
    fn save(&self, document: &RenderedDocument) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&document.file_name);
        std::fs::write(&path, &document.bytes)?;
        Ok(path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmailStatus {
    Sent,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct ViewOutcome {
    pub report_id: String,
    pub email: EmailStatus,
    pub saved_to: Option<PathBuf>,
    pub digest: String,
}

impl ViewOutcome {
    /// Banner text for this outcome.
    pub fn notice(&self) -> &'static str {
        match self.email {
            EmailStatus::Sent => MAIL_SENT,
            EmailStatus::Failed(_) => MAIL_FAILED,
        }
    }
}

pub struct ViewPipeline<R, M, K> {
    renderer: R,
    mailer: M,
    sink: K,
    notifier: Notifier,
    /// Id of the report most recently handed to `view`.
    viewing: watch::Sender<Option<String>>,
}

impl<R, M, K> ViewPipeline<R, M, K>
where
    R: DocumentRenderer,
    M: ReportMailer,
    K: DocumentSink,
{
    pub fn new(renderer: R, mailer: M, sink: K, notifier: Notifier) -> Self {
        Self {
            renderer,
            mailer,
            sink,
            notifier,
            viewing: watch::channel(None).0,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Every `view` call publishes its report id here as it starts.
    pub fn subscribe_viewing(&self) -> watch::Receiver<Option<String>> {
        self.viewing.subscribe()
    }

    pub fn render(&self, report: &Report) -> RenderedDocument {
        self.renderer.render(report)
    }

    /// Run the full flow for one report. Email failures do not stop the local
    /// save; neither step is retried.
    pub async fn view(&self, report: &Report) -> ViewOutcome {
        info!(report_id = %report.id, "viewing report");
        self.viewing.send_replace(Some(report.id.clone()));
        let document = self.render(report);
        let digest = document.digest();
        let payload = document.to_base64();

        let email = match self.mailer.send_report_email(report, &payload).await {
            Ok(response) => {
                info!(report_id = %report.id, %response, "email send response");
                EmailStatus::Sent
            }
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "failed to send report email");
                EmailStatus::Failed(e.to_string())
            }
        };

        let saved_to = match self.sink.save(&document) {
            Ok(path) => {
                info!(report_id = %report.id, path = %path.display(), %digest, "document saved");
                Some(path)
            }
            Err(e) => {
                warn!(
                    report_id = %report.id,
                    file = %document.file_name,
                    error = %e,
                    "failed to save document"
                );
                None
            }
        };

        let outcome = ViewOutcome {
            report_id: report.id.clone(),
            email,
            saved_to,
            digest,
        };
        self.notifier.show(outcome.notice());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct EchoRenderer;

    impl DocumentRenderer for EchoRenderer {
        fn render(&self, report: &Report) -> RenderedDocument {
            RenderedDocument::new(report, report.location.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct Mailbox {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl ReportMailer for Arc<Mailbox> {
        async fn send_report_email(
            &self,
            report: &Report,
            pdf_base64: &str,
        ) -> Result<serde_json::Value, ApiError> {
            self.sent
                .lock()
                .unwrap()
                .push((report.id.clone(), pdf_base64.to_string()));
            if self.fail {
                Err(ApiError::Api(500, "smtp down".into()))
            } else {
                Ok(serde_json::json!({"message": "ok"}))
            }
        }
    }

    fn report() -> Report {
        Report {
            id: "42".into(),
            location: "ABC".into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_sends_saves_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Arc::new(Mailbox::default());
        let pipeline = ViewPipeline::new(
            EchoRenderer,
            Arc::clone(&mailbox),
            DirectorySink::new(dir.path()),
            Notifier::default(),
        );
        let outcome = pipeline.view(&report()).await;
        assert_eq!(outcome.email, EmailStatus::Sent);
        assert_eq!(
            mailbox.sent.lock().unwrap().as_slice(),
            &[("42".to_string(), "QUJD".to_string())]
        );
        let path = outcome.saved_to.unwrap();
        assert_eq!(path, dir.path().join("Damage_Report_42.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"ABC");
        assert_eq!(pipeline.notifier().current().as_deref(), Some(MAIL_SENT));
        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(pipeline.notifier().current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Arc::new(Mailbox {
            fail: true,
            ..Default::default()
        });
        let pipeline = ViewPipeline::new(
            EchoRenderer,
            Arc::clone(&mailbox),
            DirectorySink::new(dir.path().join("out")),
            Notifier::default(),
        );
        let outcome = pipeline.view(&report()).await;
        assert!(matches!(outcome.email, EmailStatus::Failed(ref m) if m.contains("500")));
        assert!(outcome.saved_to.is_some_and(|p| p.exists()));
        assert_eq!(pipeline.notifier().current().as_deref(), Some(MAIL_FAILED));
        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(pipeline.notifier().current().as_deref(), Some(MAIL_FAILED));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(pipeline.notifier().current(), None);
    }

    #[tokio::test]
    async fn hostile_id_is_saved_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let pipeline = ViewPipeline::new(
            EchoRenderer,
            Arc::new(Mailbox::default()),
            DirectorySink::new(&out),
            Notifier::default(),
        );
        let report = Report {
            id: "../escaped/x".into(),
            location: "ABC".into(),
            ..Default::default()
        };
        let path = pipeline.view(&report).await.saved_to.unwrap();
        assert_eq!(path, out.join("Damage_Report_.._escaped_x.pdf"));
        assert!(!dir.path().join("escaped").exists());
    }

    #[tokio::test]
    async fn viewing_id_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ViewPipeline::new(
            EchoRenderer,
            Arc::new(Mailbox::default()),
            DirectorySink::new(dir.path()),
            Notifier::default(),
        );
        let mut rx = pipeline.subscribe_viewing();
        assert_eq!(*rx.borrow(), None);
        pipeline.view(&report()).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some("42"));
        pipeline.view(&report()).await;
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn save_failure_keeps_email_outcome() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();
        let pipeline = ViewPipeline::new(
            EchoRenderer,
            Arc::new(Mailbox::default()),
            DirectorySink::new(&blocker),
            Notifier::default(),
        );
        let outcome = pipeline.view(&report()).await;
        assert_eq!(outcome.email, EmailStatus::Sent);
        assert!(outcome.saved_to.is_none());
        assert_eq!(outcome.notice(), MAIL_SENT);
    }
}
