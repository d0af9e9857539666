//! Per-email routing: sanitize, analyze, decide.

use tracing::{error, info, warn};

use super::analysis::Analyzer;
use super::decider::{RoutingAction, RoutingDecider};
use crate::error::AnalysisUnavailable;
use crate::html::html_to_text;
use crate::queue::ParsedEmail;

/// Result of routing one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// The email as sent for analysis, with a plain-text body
    pub email: ParsedEmail,
    /// Sentiment reported by the analysis, empty when it was malformed
    pub sentiment: String,
    pub action: RoutingAction,
}

pub struct RoutingOrchestrator<A> {
    analyzer: A,
    decider: RoutingDecider,
}

impl<A: Analyzer> RoutingOrchestrator<A> {
    pub fn new(analyzer: A, decider: RoutingDecider) -> Self {
        Self { analyzer, decider }
    }

    /// Route one email.
    ///
    /// Fails only when the analysis service could not be reached; the caller
    /// drops the email in that case.
    pub async fn route(&self, mut email: ParsedEmail) -> Result<RouteOutcome, AnalysisUnavailable> {
        email.body = html_to_text(&email.body);

        let raw = match self.analyzer.analyze(&email).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    subject = %email.subject,
                    sender = %email.sender,
                    error = %e,
                    "analysis_unavailable"
                );
                return Err(e);
            }
        };

        let decision = self.decider.evaluate(&raw);
        let sentiment = decision
            .analysis
            .map(|analysis| analysis.sentiment)
            .unwrap_or_default();

        match &decision.action {
            RoutingAction::Forward(address) => info!(
                subject = %email.subject,
                sender = %email.sender,
                sentiment = %sentiment,
                forward_to = %address,
                "routing_forward"
            ),
            RoutingAction::Reject(reason) => warn!(
                subject = %email.subject,
                sender = %email.sender,
                sentiment = %sentiment,
                reason = %reason,
                "routing_reject"
            ),
        }

        Ok(RouteOutcome {
            email,
            sentiment,
            action: decision.action,
        })
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::FakeAnalyzer;
    use super::*;
    use crate::routing::decider::{AllowList, Strictness};

    fn orchestrator(analyzer: FakeAnalyzer) -> RoutingOrchestrator<FakeAnalyzer> {
        let allow_list: AllowList = ["alice.j@yourcompany.com"].into_iter().collect();
        RoutingOrchestrator::new(
            analyzer,
            RoutingDecider::new(Arc::new(allow_list), Strictness::Permissive),
        )
    }

    fn html_email() -> ParsedEmail {
        let mut email = ParsedEmail::new("Refund", "customer@example.com");
        email.body = "<html><body><p>I want a <b>refund</b> &amp; an apology</p></body></html>".to_string();
        email
    }

    #[tokio::test]
    async fn test_route_sanitizes_body_before_analysis() {
        let analyzer = FakeAnalyzer::answering(
            r#"{"analysis":"{\"sentiment\":\"negative\",\"forward_to\":\"alice.j@yourcompany.com\"}"}"#,
        );
        let seen = analyzer.seen.clone();

        let outcome = orchestrator(analyzer).route(html_email()).await.unwrap();

        assert_eq!(
            outcome.action,
            RoutingAction::Forward("alice.j@yourcompany.com".to_string())
        );
        assert_eq!(outcome.sentiment, "negative");
        assert_eq!(outcome.email.body, "I want a refund & an apology");
        assert_eq!(seen.lock().unwrap()[0].body, "I want a refund & an apology");
    }

    #[tokio::test]
    async fn test_route_rejects_outside_allow_list() {
        let analyzer = FakeAnalyzer::answering(
            r#"{"analysis":"{\"sentiment\":\"positive\",\"forward_to\":\"unknown@external.com\"}"}"#,
        );

        let outcome = orchestrator(analyzer).route(html_email()).await.unwrap();

        assert_eq!(outcome.action, RoutingAction::Reject("not in allow-list".to_string()));
        assert_eq!(outcome.sentiment, "positive");
    }

    #[tokio::test]
    async fn test_route_malformed_response_rejects() {
        let outcome = orchestrator(FakeAnalyzer::answering("<html>502</html>"))
            .route(html_email())
            .await
            .unwrap();

        assert!(matches!(outcome.action, RoutingAction::Reject(_)));
        assert_eq!(outcome.sentiment, "");
    }

    #[tokio::test]
    async fn test_route_unavailable_analysis_fails() {
        let err = orchestrator(FakeAnalyzer::unreachable())
            .route(html_email())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisUnavailable::Transport(_)));
    }
}
