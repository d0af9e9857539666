//! Routing of extracted emails.
//!
//! ## Processing Flow
//!
//! ```text
//! incoming_emails → handle_delivery() → RoutingOrchestrator::route()
//!                                           ├─ html_to_text(body)
//!                                           ├─ Analyzer::analyze()
//!                                           └─ RoutingDecider::evaluate()
//!                   Forward → routed_emails, Reject → ack
//! ```

pub mod analysis;
pub mod decider;
pub mod dispatch;
pub mod orchestrator;

pub use analysis::{AnalysisClient, Analyzer};
pub use decider::{
    parse_analysis, strip_code_fence, AllowList, AnalysisResult, Decision, RoutingAction,
    RoutingDecider, Strictness, NOT_IN_ALLOW_LIST,
};
pub use dispatch::{handle_delivery, Settlement};
pub use orchestrator::{RouteOutcome, RoutingOrchestrator};
