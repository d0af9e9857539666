//! Mailbox polling - one cycle of fetch, extract, publish, mark.
//!
//! A message is marked seen only after its publish succeeded in the same
//! cycle. A failed publish leaves the message unseen so the next cycle picks
//! it up again.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::stats::PollStats;
use super::store::{MailSession, MailStore};
use crate::error::{ExtractionError, MailboxError};
use crate::extract::{extract, parse_content_tree, read_headers};
use crate::queue::{message_key, EmailSink};

/// Where a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Extraction,
    Publish,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Extraction => f.write_str("extraction"),
            FailureStage::Publish => f.write_str("publish"),
        }
    }
}

/// Result of handling one unseen message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Published and marked seen.
    Delivered,
    /// Not published; left unseen for the next cycle.
    DeliveryFailed { stage: FailureStage, error: String },
    /// Published, but the seen flag could not be set. May be redelivered.
    MarkFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerMessageResult {
    pub uid: u32,
    pub subject: String,
    pub outcome: MessageOutcome,
}

/// Polls one mailbox and hands each unseen message to an [`EmailSink`].
pub struct MailboxPoller<S, P> {
    store: S,
    sink: P,
    stats: Arc<PollStats>,
}

impl<S, P> MailboxPoller<S, P>
where
    S: MailStore,
    P: EmailSink,
{
    pub fn new(store: S, sink: P, stats: Arc<PollStats>) -> Self {
        Self { store, sink, stats }
    }

    pub fn stats(&self) -> &Arc<PollStats> {
        &self.stats
    }

    /// Run one poll cycle.
    ///
    /// Returns an error only when the cycle as a whole failed (connect,
    /// select or search). Per-message failures are reported in the results.
    /// The session is closed on every path once it was opened.
    pub async fn poll(&self) -> Result<Vec<PerMessageResult>, MailboxError> {
        self.stats.record_cycle();

        let mut session = match self.store.connect().await {
            Ok(session) => session,
            Err(e) => {
                self.stats.record_cycle_failure();
                error!(error = %e, "mailbox_connect_failed");
                return Err(e);
            }
        };

        let result = self.process_unseen(&mut session).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "mailbox_close_failed");
        }

        match &result {
            Ok(results) => {
                let delivered = results
                    .iter()
                    .filter(|r| r.outcome == MessageOutcome::Delivered)
                    .count();
                info!(
                    messages = results.len(),
                    delivered = delivered,
                    failed = results.len() - delivered,
                    "mailbox_poll_complete"
                );
            }
            Err(e) => {
                self.stats.record_cycle_failure();
                error!(error = %e, "mailbox_poll_failed");
            }
        }

        result
    }

    async fn process_unseen(
        &self,
        session: &mut S::Session,
    ) -> Result<Vec<PerMessageResult>, MailboxError> {
        let uids = session.unseen().await?;

        info!(unseen = uids.len(), "mailbox_unseen_listed");

        let mut results = Vec::with_capacity(uids.len());
        for uid in uids {
            results.push(self.process_message(session, uid).await);
        }
        Ok(results)
    }

    async fn process_message(&self, session: &mut S::Session, uid: u32) -> PerMessageResult {
        // Headers first, so later failures can still name the message
        let headers = match session.headers(uid).await {
            Ok(raw) => match read_headers(&raw) {
                Ok(headers) => headers,
                Err(e) => return self.extraction_failed(uid, String::new(), e),
            },
            Err(e) => return self.extraction_failed(uid, String::new(), fetch_error(uid, e)),
        };

        info!(uid = uid, subject = %headers.subject, sender = %headers.sender, "email_processing");

        let raw = match session.fetch(uid).await {
            Ok(raw) => raw,
            Err(e) => return self.extraction_failed(uid, headers.subject, fetch_error(uid, e)),
        };

        let tree = match parse_content_tree(&raw) {
            Ok(tree) => tree,
            Err(e) => return self.extraction_failed(uid, headers.subject, e),
        };

        let email = extract(headers.subject, headers.sender, &tree);
        let key = message_key(headers.message_id.as_deref(), &email.subject, &email.sender);

        if let Err(e) = self.sink.publish_email(&key, &email).await {
            self.stats.record_publish_failure();
            error!(uid = uid, subject = %email.subject, error = %e, "email_publish_failed");
            return PerMessageResult {
                uid,
                subject: email.subject,
                outcome: MessageOutcome::DeliveryFailed {
                    stage: FailureStage::Publish,
                    error: e.to_string(),
                },
            };
        }

        info!(uid = uid, message_key = %key, subject = %email.subject, "email_published");

        let outcome = match session.mark_seen(uid).await {
            Ok(()) => {
                self.stats.record_delivered();
                info!(uid = uid, subject = %email.subject, "email_marked_seen");
                MessageOutcome::Delivered
            }
            Err(e) => {
                self.stats.record_mark_failure();
                error!(
                    uid = uid,
                    subject = %email.subject,
                    error = %e,
                    "email_mark_seen_failed"
                );
                MessageOutcome::MarkFailed {
                    error: e.to_string(),
                }
            }
        };

        PerMessageResult {
            uid,
            subject: email.subject,
            outcome,
        }
    }

    fn extraction_failed(&self, uid: u32, subject: String, err: ExtractionError) -> PerMessageResult {
        self.stats.record_extraction_failure();
        error!(uid = uid, subject = %subject, error = %err, "email_extraction_failed");

        PerMessageResult {
            uid,
            subject,
            outcome: MessageOutcome::DeliveryFailed {
                stage: FailureStage::Extraction,
                error: err.to_string(),
            },
        }
    }
}

fn fetch_error(uid: u32, e: MailboxError) -> ExtractionError {
    ExtractionError::Fetch {
        uid,
        reason: e.to_string(),
    }
}
