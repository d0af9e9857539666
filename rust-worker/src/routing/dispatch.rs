//! Map a queue delivery to a routing run and a settlement.

use tracing::{error, info};

use super::analysis::Analyzer;
use super::decider::RoutingAction;
use super::orchestrator::RoutingOrchestrator;
use crate::queue::{ParsedEmail, RoutedEmail, RoutedSink};

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Done with it, forwarded or rejected.
    Ack,
    /// The forward could not be published; try again later.
    Requeue,
    /// Unusable payload or no analysis available; discard.
    Drop,
}

pub async fn handle_delivery<A, R>(
    orchestrator: &RoutingOrchestrator<A>,
    sink: &R,
    data: &[u8],
) -> Settlement
where
    A: Analyzer,
    R: RoutedSink,
{
    let email: ParsedEmail = match serde_json::from_slice(data) {
        Ok(email) => email,
        Err(e) => {
            error!(error = %e, payload_length = data.len(), "email_decode_failed");
            return Settlement::Drop;
        }
    };

    // Unavailable analysis is logged by the orchestrator
    let Ok(outcome) = orchestrator.route(email).await else {
        return Settlement::Drop;
    };

    match outcome.action {
        RoutingAction::Forward(forward_to) => {
            let routed = RoutedEmail {
                forward_to,
                sentiment: outcome.sentiment,
                email: outcome.email,
            };

            match sink.publish_routed(&routed).await {
                Ok(()) => {
                    info!(
                        subject = %routed.email.subject,
                        forward_to = %routed.forward_to,
                        "routed_email_published"
                    );
                    Settlement::Ack
                }
                Err(e) => {
                    error!(
                        subject = %routed.email.subject,
                        forward_to = %routed.forward_to,
                        error = %e,
                        "routed_email_publish_failed"
                    );
                    Settlement::Requeue
                }
            }
        }
        RoutingAction::Reject(_) => Settlement::Ack,
    }
}
