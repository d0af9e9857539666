//! Mailbox ingestion.
//!
//! ## Processing Flow
//!
//! ```text
//! scheduler → MailboxPoller::poll() → MailStore::connect()
//!                   │
//!                   └─ per unseen uid: fetch → extract → publish → mark seen
//! ```

pub mod imap;
pub mod poller;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use imap::{ImapSettings, ImapStore};
pub use poller::{FailureStage, MailboxPoller, MessageOutcome, PerMessageResult};
pub use scheduler::{run_cycle, run_scheduled, CycleOutcome};
pub use stats::{PollStats, StatsSnapshot};
pub use store::{MailSession, MailStore};
