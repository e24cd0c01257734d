//! Transient notification banner that clears itself after a fixed time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

pub const NOTICE_TTL_MS: u64 = 5000;
pub const MAIL_SENT: &str = "Mail has been sent";
pub const MAIL_FAILED: &str = "Failed to send mail";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub text: String,
}

struct Inner {
    tx: watch::Sender<Option<Notice>>,
    next_id: AtomicU64,
}

/// Banner state shared between the pipeline (writer) and the view (reader).
/// Each banner is cleared `ttl` after it was shown unless a newer one replaced it.
#[derive(Clone)]
pub struct Notifier {
    ttl: Duration,
    inner: Arc<Inner>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(NOTICE_TTL_MS))
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            ttl,
            inner: Arc::new(Inner {
                tx,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current banner text, if any.
    pub fn current(&self) -> Option<String> {
        self.inner.tx.borrow().as_ref().map(|n| n.text.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.tx.subscribe()
    }

    /// Show `text` and schedule its removal. Requires a tokio runtime.
    pub fn show(&self, text: impl Into<String>) {
        let text = text.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        info!(notice = %text, "notification set");
        self.inner.tx.send_replace(Some(Notice { id, text }));

        let inner = Arc::clone(&self.inner);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let cleared = inner.tx.send_if_modified(|cur| {
                if cur.as_ref().is_some_and(|n| n.id == id) {
                    *cur = None;
                    true
                } else {
                    false
                }
            });
            if cleared {
                debug!(id, "notification cleared");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clears_after_ttl() {
        let n = Notifier::default();
        n.show(MAIL_SENT);
        assert_eq!(n.current().as_deref(), Some(MAIL_SENT));
        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(n.current().as_deref(), Some(MAIL_SENT));
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(n.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn older_timer_does_not_clear_newer_banner() {
        let n = Notifier::default();
        n.show(MAIL_SENT);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        n.show(MAIL_FAILED);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(n.current().as_deref(), Some(MAIL_FAILED));
        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(n.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_set_and_clear() {
        let n = Notifier::new(Duration::from_millis(100));
        let mut rx = n.subscribe();
        n.show("hello");
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone().map(|notice| notice.text);
        assert_eq!(seen.as_deref(), Some("hello"));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
