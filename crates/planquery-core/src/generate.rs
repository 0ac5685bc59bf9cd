//! Grounded answer generation.
//!
//! Assembles retrieved chunks and role framing into a prompt, invokes
//! the generation provider once, and returns the answer with the chunk
//! ids that ground it. No multi-turn planning and no internal retries:
//! a provider failure surfaces as [`GenerationError`] and the caller
//! decides whether to retry or degrade.
//!
//! An empty context never reaches the provider — prompting a model with
//! no records invites hallucination, so the fixed no-match answer is
//! returned instead.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::models::{Answer, Query, ScoredChunk};
use crate::retrieve::role_profile;

/// Fixed response when retrieval produced no context.
pub const NO_MATCH_ANSWER: &str =
    "The available planning records do not contain information relevant to this question.";

/// Grounding policy for the assistant, modeled on the planning-record
/// corpus it answers from.
const SYSTEM_PROMPT: &str = "\
You are a planning-permission assistant with access to a database of real \
planning application records. Answer questions using ONLY the planning \
records provided to you. Follow these rules:

1. Never invent planning references, addresses, dates, or decisions.
2. When referencing an application, cite its record marker exactly as \
given, e.g. [2458/24-0].
3. If the provided records do not contain enough information to answer, \
say so explicitly and describe what the records do show.
4. Be precise with dates and decision wording. Do not guess outcomes.
5. When listing applications, give reference, location, proposal summary, \
and decision.";

/// A generation backend: one completion call per invocation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produce a completion for the given system and user messages.
    ///
    /// Implementations bound the call with a timeout and map transient
    /// and permanent failures onto [`GenerationError`]; they do not
    /// retry internally.
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

/// Generate a grounded answer for a query from retrieved context.
pub async fn generate(
    provider: &dyn CompletionProvider,
    query: &Query,
    context: &[ScoredChunk],
) -> Result<Answer, GenerationError> {
    if context.is_empty() {
        return Ok(Answer {
            text: NO_MATCH_ANSWER.to_string(),
            cited: Vec::new(),
            role: query.role,
        });
    }

    let profile = role_profile(query.role);

    let mut system = SYSTEM_PROMPT.to_string();
    if !profile.framing.is_empty() {
        system.push_str("\n\n");
        system.push_str(profile.framing);
    }

    let user = build_user_prompt(&query.text, context);
    let text = provider.complete(&system, &user).await?;
    let cited = extract_citations(&text, context);

    Ok(Answer {
        text,
        cited,
        role: query.role,
    })
}

/// Format the question plus the context records, each headed by its
/// chunk id as a citation marker.
fn build_user_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let mut prompt = format!(
        "Based on the following planning records, answer this question.\n\n\
         Question: {}\n\nRetrieved planning records:\n",
        question
    );
    for sc in context {
        prompt.push_str(&format!(
            "\n--- Record [{}] (relevance: {:.2}) ---\n{}\n",
            sc.chunk.id, sc.score, sc.chunk.text
        ));
    }
    prompt.push_str(
        "\nProvide a clear, accurate answer based on these records, citing record \
         markers like [2458/24-0] where relevant.",
    );
    prompt
}

/// Chunk ids the answer text actually references.
///
/// Falls back to citing the whole context when the model referenced no
/// marker at all — traceability beats precision there.
fn extract_citations(text: &str, context: &[ScoredChunk]) -> Vec<String> {
    let mut cited: Vec<String> = context
        .iter()
        .filter(|sc| {
            text.contains(&format!("[{}]", sc.chunk.id))
                || text.contains(&sc.chunk.id)
                || text.contains(&sc.chunk.record_ref)
        })
        .map(|sc| sc.chunk.id.clone())
        .collect();

    if cited.is_empty() {
        cited = context.iter().map(|sc| sc.chunk.id.clone()).collect();
    }
    cited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{DevelopmentCategory, LandType, Scale};
    use crate::models::{ChunkMetadata, PlanningChunk, StakeholderRole};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        response: String,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn context_chunk(id: &str, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: PlanningChunk {
                id: id.to_string(),
                record_ref: id.rsplit_once('-').map(|(r, _)| r.to_string()).unwrap_or_default(),
                chunk_index: 0,
                text: text.to_string(),
                hash: String::new(),
                metadata: ChunkMetadata {
                    reference: id.to_string(),
                    location: String::new(),
                    category: DevelopmentCategory::Residential,
                    land_type: LandType::PrivateLand,
                    scale: Scale::Single,
                    decision: String::new(),
                    submitted: None,
                    has_appeal: false,
                },
            },
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_empty_context_skips_provider() {
        let provider = StubProvider::new("should never appear");
        let query = Query::new("anything", StakeholderRole::None);

        let answer = generate(&provider, &query, &[]).await.unwrap();
        assert_eq!(answer.text, NO_MATCH_ANSWER);
        assert!(answer.cited.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cites_referenced_chunks() {
        let provider =
            StubProvider::new("Application [1001/25-0] was granted with conditions.");
        let query = Query::new("What was decided?", StakeholderRole::None);
        let context = vec![
            context_chunk("1001/25-0", "Planning application 1001/25: granted."),
            context_chunk("2002/25-0", "Planning application 2002/25: refused."),
        ];

        let answer = generate(&provider, &query, &context).await.unwrap();
        assert_eq!(answer.cited, vec!["1001/25-0".to_string()]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncited_answer_falls_back_to_full_context() {
        let provider = StubProvider::new("Nothing was referenced explicitly.");
        let query = Query::new("Summarize", StakeholderRole::None);
        let context = vec![context_chunk("1001/25-0", "text")];

        let answer = generate(&provider, &query, &context).await.unwrap();
        assert_eq!(answer.cited, vec!["1001/25-0".to_string()]);
    }

    #[tokio::test]
    async fn test_prompt_contains_question_and_markers() {
        let question = "Were there appeals in Rathmines?";
        let context = vec![context_chunk("3003/24-1", "Under appeal in Rathmines.")];
        let prompt = build_user_prompt(question, &context);
        assert!(prompt.contains(question));
        assert!(prompt.contains("[3003/24-1]"));
        assert!(prompt.contains("Under appeal in Rathmines."));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        struct FailingProvider;

        #[async_trait]
        impl CompletionProvider for FailingProvider {
            async fn complete(
                &self,
                _system: &str,
                _user: &str,
            ) -> Result<String, GenerationError> {
                Err(GenerationError::RateLimited)
            }
        }

        let query = Query::new("anything", StakeholderRole::None);
        let context = vec![context_chunk("1/24-0", "text")];
        let err = generate(&FailingProvider, &query, &context).await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited));
    }
}
