//! Operator review flow: accept with grace period, view pipeline, banner, screen.

mod accept;
mod dispatch;
mod notice;
mod screen;

pub use accept::{AcceptController, AcceptState, ACCEPT_DELAY_MS};
pub use dispatch::{DirectorySink, DocumentSink, EmailStatus, ViewOutcome, ViewPipeline};
pub use notice::{Notice, Notifier, MAIL_FAILED, MAIL_SENT, NOTICE_TTL_MS};
pub use screen::{
    format_table, ActionError, ReviewConfig, ReviewScreen, TableRow, CONFIRM_TEXT, LOADING_TEXT,
    SCREEN_TITLE,
};
