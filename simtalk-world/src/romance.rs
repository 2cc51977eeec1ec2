//! Post-conversation romance analysis.
//!
//! When a conversation ends with something said, the transcript is handed
//! to a [`RomanceAnalyzer`]. Analysis is fire-and-forget; outcomes are
//! polled by the tick loop and written into both relationship records.

use simtalk_core::{AgentId, Transcript};
use simtalk_llm::{GenerativeBackend, GenerativeClient, RomanceVerdict, parse_structured, prompt};
use tracing::{debug, warn};

/// A finished conversation to analyse.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// First participant.
    pub a: AgentId,
    /// Second participant.
    pub b: AgentId,
    /// Display name of `a`.
    pub name_a: String,
    /// Display name of `b`.
    pub name_b: String,
    /// What was said.
    pub transcript: Transcript,
    /// Romance `a` held towards `b` when the conversation ended.
    pub current_romance: f32,
}

/// The verdict for one analysed conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct RomanceOutcome {
    /// First participant.
    pub a: AgentId,
    /// Second participant.
    pub b: AgentId,
    /// New romance score for both sides (clamped when applied).
    pub romance: f32,
    /// One-sentence summary, possibly empty.
    pub summary: String,
}

/// Judges finished conversations.
pub trait RomanceAnalyzer: Send {
    /// Queue a finished conversation. Must not block.
    fn request_analysis(&mut self, request: AnalysisRequest);

    /// Take the next available verdict.
    fn poll_outcome(&mut self) -> Option<RomanceOutcome> {
        None
    }
}

/// Discards every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRomanceAnalyzer;

impl RomanceAnalyzer for NullRomanceAnalyzer {
    fn request_analysis(&mut self, request: AnalysisRequest) {
        debug!(a = %request.a, b = %request.b, "Romance analysis disabled, dropping request");
    }
}

/// Analyses conversations with a generative backend.
///
/// Requests are keyed by the agent pair, so a pair can have at most one
/// analysis in flight.
pub struct LlmRomanceAnalyzer<B> {
    client: GenerativeClient<(AgentId, AgentId), B>,
}

impl<B: GenerativeBackend> LlmRomanceAnalyzer<B> {
    /// Wrap a dispatcher dedicated to romance analyses.
    #[must_use]
    pub fn new(client: GenerativeClient<(AgentId, AgentId), B>) -> Self {
        Self { client }
    }

    /// Analyses still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.client.pending_count()
    }
}

impl<B: GenerativeBackend> RomanceAnalyzer for LlmRomanceAnalyzer<B> {
    fn request_analysis(&mut self, request: AnalysisRequest) {
        let prompt = prompt::romance_analysis(
            &request.name_a,
            &request.name_b,
            &request.transcript,
            request.current_romance,
        );
        if !self.client.submit((request.a, request.b), prompt) {
            debug!(a = %request.a, b = %request.b, "Romance analysis already in flight for pair");
        }
    }

    fn poll_outcome(&mut self) -> Option<RomanceOutcome> {
        loop {
            let ((a, b), text) = self.client.poll_result()?;
            match parse_structured::<RomanceVerdict>(&text) {
                Ok(verdict) => {
                    return Some(RomanceOutcome {
                        a,
                        b,
                        romance: verdict.romance,
                        summary: verdict.summary,
                    });
                }
                Err(e) => warn!(%a, %b, "Dropping unparseable romance analysis: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use simtalk_llm::{LlmError, Prompt};

    use super::*;

    struct Verdicts;

    impl GenerativeBackend for Verdicts {
        async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
            if prompt.user.contains("Grump") {
                Err(LlmError::Unavailable("nope".into()))
            } else {
                Ok(r#"{"romance": 0.6, "summary": "Sweet."}"#.into())
            }
        }
    }

    fn request(name_b: &str) -> AnalysisRequest {
        let a = AgentId::new();
        let mut transcript = Transcript::new();
        transcript.push(a, "Ada", "Hi there.");
        AnalysisRequest {
            a,
            b: AgentId::new(),
            name_a: "Ada".into(),
            name_b: name_b.into(),
            transcript,
            current_romance: 0.1,
        }
    }

    async fn settle(analyzer: &LlmRomanceAnalyzer<Verdicts>) {
        for _ in 0..1_000 {
            if analyzer.pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn parses_verdicts_and_drops_placeholders() {
        let client = GenerativeClient::new(Verdicts).expect("runtime");
        let mut analyzer = LlmRomanceAnalyzer::new(client);

        let good = request("Bo");
        analyzer.request_analysis(request("Grump"));
        analyzer.request_analysis(good.clone());
        settle(&analyzer).await;

        let outcome = analyzer.poll_outcome().expect("one verdict");
        assert_eq!((outcome.a, outcome.b), (good.a, good.b));
        assert!((outcome.romance - 0.6).abs() < 1e-6);
        assert_eq!(outcome.summary, "Sweet.");
        assert!(analyzer.poll_outcome().is_none());
    }

    #[test]
    fn null_analyzer_never_yields() {
        let mut analyzer = NullRomanceAnalyzer;
        analyzer.request_analysis(request("Bo"));
        assert!(analyzer.poll_outcome().is_none());
    }
}
