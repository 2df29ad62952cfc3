//! Combining child results into a single reply.
//!
//! The synthesizer is pure with respect to the child results: it reads
//! them, formats or asks the provider to merge them, and mutates no
//! memory.

use std::sync::Arc;

use fractal_types::{ChatParams, ChatRequest, MessageItem, Provider};
use serde::{Deserialize, Serialize};

use crate::request::SynthesisStrategy;

/// The outcome of one child agent, as fed to the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildOutcome {
    /// The child's node id.
    pub node_id: String,
    /// The subtask description it worked on.
    pub description: String,
    /// Whether the child completed successfully.
    pub success: bool,
    /// The child's result text (empty on failure).
    pub result: String,
    /// The failure description, when `success` is false.
    pub error: Option<String>,
}

/// Combine child outcomes per the chosen strategy.
///
/// `Llm` falls back to `Structured` when the provider call fails; `Auto`
/// uses `Llm` when a provider is present and any child succeeded.
pub async fn synthesize(
    strategy: SynthesisStrategy,
    original_task: &str,
    outcomes: &[ChildOutcome],
    provider: Option<&Arc<dyn Provider>>,
    max_tokens: usize,
) -> String {
    if outcomes.is_empty() {
        return "No subtask results to synthesize.".to_string();
    }
    match strategy {
        SynthesisStrategy::Concatenate => concatenate(outcomes),
        SynthesisStrategy::Structured => structured(outcomes),
        SynthesisStrategy::Llm => match provider {
            Some(provider) => {
                llm_synthesize(original_task, outcomes, provider, max_tokens).await
            }
            None => {
                tracing::warn!("llm synthesis requested without a provider, using structured");
                structured(outcomes)
            }
        },
        SynthesisStrategy::Auto => {
            let any_success = outcomes.iter().any(|o| o.success);
            match provider {
                Some(provider) if any_success => {
                    llm_synthesize(original_task, outcomes, provider, max_tokens).await
                }
                _ => structured(outcomes),
            }
        }
    }
}

/// Join result strings with separators.
#[must_use]
pub fn concatenate(outcomes: &[ChildOutcome]) -> String {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| format!("Subtask {} result:\n{}", i + 1, outcome.result))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Render a markdown document with per-subtask sections and a top-line
/// summary.
#[must_use]
pub fn structured(outcomes: &[ChildOutcome]) -> String {
    let succeeded = outcomes.iter().filter(|o| o.success).count();
    let failed = outcomes.len() - succeeded;
    let mut lines = vec![
        "# Delegation results".to_string(),
        format!(
            "**Total**: {} subtasks | ✓ {} succeeded | ✗ {} failed",
            outcomes.len(),
            succeeded,
            failed
        ),
        String::new(),
    ];
    for (i, outcome) in outcomes.iter().enumerate() {
        let marker = if outcome.success { "✓" } else { "✗" };
        lines.push(format!("## Subtask {} - {}", i + 1, marker));
        lines.push(format!("*{}*", outcome.description));
        if let Some(error) = &outcome.error {
            lines.push(format!("**Error**: {error}"));
        }
        if !outcome.result.is_empty() {
            lines.push(outcome.result.clone());
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

async fn llm_synthesize(
    original_task: &str,
    outcomes: &[ChildOutcome],
    provider: &Arc<dyn Provider>,
    max_tokens: usize,
) -> String {
    let results_section = outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            let marker = if outcome.success { "✓" } else { "✗" };
            format!("Subtask {} ({}):\n{}", i + 1, marker, outcome.result)
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = format!(
        "Combine the following subtask results into one coherent answer.\n\n\
         Original task:\n{original_task}\n\n\
         Subtask results:\n{results_section}\n\n\
         Integrate the successful results, keep the answer fluent, note \
         failed subtasks briefly, and reply with the answer only."
    );
    let request = ChatRequest {
        messages: vec![MessageItem::user(prompt)],
        tools: vec![],
        params: ChatParams {
            max_tokens: Some(max_tokens),
            temperature: None,
        },
    };
    match provider.chat(request).await {
        Ok(response) => response.content.trim().to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "llm synthesis failed, falling back to structured");
            structured(outcomes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes() -> Vec<ChildOutcome> {
        vec![
            ChildOutcome {
                node_id: "p:worker-0-abc".into(),
                description: "research".into(),
                success: true,
                result: "found three papers".into(),
                error: None,
            },
            ChildOutcome {
                node_id: "p:worker-1-def".into(),
                description: "summarize".into(),
                success: false,
                result: String::new(),
                error: Some("max iterations exceeded".into()),
            },
        ]
    }

    #[test]
    fn concatenate_joins_with_separators() {
        let text = concatenate(&outcomes());
        assert!(text.contains("Subtask 1 result:"));
        assert!(text.contains("\n\n---\n\n"));
    }

    #[test]
    fn structured_counts_and_marks() {
        let text = structured(&outcomes());
        assert!(text.contains("**Total**: 2 subtasks | ✓ 1 succeeded | ✗ 1 failed"));
        assert!(text.contains("## Subtask 1 - ✓"));
        assert!(text.contains("## Subtask 2 - ✗"));
        assert!(text.contains("max iterations exceeded"));
    }

    #[tokio::test]
    async fn auto_without_provider_is_structured() {
        let text = synthesize(SynthesisStrategy::Auto, "task", &outcomes(), None, 2000).await;
        assert!(text.starts_with("# Delegation results"));
    }

    #[tokio::test]
    async fn empty_outcomes_short_circuit() {
        let text = synthesize(SynthesisStrategy::Concatenate, "task", &[], None, 2000).await;
        assert_eq!(text, "No subtask results to synthesize.");
    }
}
