//! Context assembly: turn memory into the provider's message list.

use fractal_memory::AgentMemory;
use fractal_types::{MessageItem, Role};

/// Build the message list for one LLM call.
///
/// Presentation order: system prompt, L2 working-set blocks, L3 summary
/// block, L4 retrieval block, then the recent L1 conversation. The token
/// budget is allocated by priority — system > L1-recent > L2 > L3 >
/// L4-retrieved — so when space runs out, the lowest-priority sources are
/// truncated first.
pub async fn build_context(
    memory: &mut AgentMemory,
    system_prompt: &str,
    session_id: Option<&str>,
    query: Option<&str>,
    budget: usize,
    recent_limit: usize,
) -> Vec<MessageItem> {
    let mut remaining = budget;

    let system = MessageItem::system(system_prompt);
    let system_tokens = system_prompt.len() / 4 + 4;
    remaining = remaining.saturating_sub(system_tokens);

    // L1: most recent messages, newest kept preferentially.
    let recent = memory.recent(recent_limit, session_id);
    let mut conversation: Vec<MessageItem> = Vec::new();
    for message in recent.into_iter().rev() {
        let cost = message.token_count.max(1);
        if cost > remaining {
            break;
        }
        remaining -= cost;
        conversation.push(message);
    }
    conversation.reverse();

    // L2: important working-set entries as a context block.
    let mut blocks: Vec<MessageItem> = Vec::new();
    let important = memory.important(10, session_id);
    if !important.is_empty() {
        let mut lines = vec!["Relevant working memory:".to_string()];
        let mut used = 0usize;
        for entry in &important {
            let cost = entry.token_count.max(1);
            if used + cost > remaining {
                break;
            }
            used += cost;
            lines.push(format!("- {}", entry.content));
        }
        if lines.len() > 1 {
            remaining -= used;
            blocks.push(MessageItem::system(lines.join("\n")));
        }
    }

    // L3: compressed history.
    let summaries = memory.summaries(10, session_id);
    if !summaries.is_empty() && remaining > 0 {
        let mut lines = vec!["Earlier task summaries:".to_string()];
        let mut used = 0usize;
        for summary in &summaries {
            let text = summary.text_form();
            let cost = text.len() / 4 + 1;
            if used + cost > remaining {
                break;
            }
            used += cost;
            lines.push(format!("- {text}"));
        }
        if lines.len() > 1 {
            remaining -= used;
            blocks.push(MessageItem::system(lines.join("\n")));
        }
    }

    // L4: retrieval for the current query, lowest priority.
    if let Some(query) = query {
        if remaining > 0 {
            let retrieved = memory.semantic_search(query, 5, session_id).await;
            if !retrieved.is_empty() {
                let mut lines = vec!["Retrieved context:".to_string()];
                let mut used = 0usize;
                for summary in &retrieved {
                    let text = summary.text_form();
                    let cost = text.len() / 4 + 1;
                    if used + cost > remaining {
                        break;
                    }
                    used += cost;
                    lines.push(format!("- {text}"));
                }
                if lines.len() > 1 {
                    blocks.push(MessageItem::system(lines.join("\n")));
                }
            }
        }
    }

    let mut messages = Vec::with_capacity(2 + blocks.len() + conversation.len());
    messages.push(system);
    messages.extend(blocks);
    messages.extend(conversation);
    messages
}

/// Whether a message list still contains actual conversation (something
/// beyond system blocks).
#[must_use]
pub fn has_conversation(messages: &[MessageItem]) -> bool {
    messages.iter().any(|m| m.role != Role::System)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractal_memory::MemoryConfig;
    use fractal_token::EstimateCounter;
    use std::sync::Arc;

    fn memory() -> AgentMemory {
        AgentMemory::new(
            "agent",
            MemoryConfig::default(),
            Arc::new(EstimateCounter::new()),
        )
    }

    #[tokio::test]
    async fn system_prompt_comes_first() {
        let mut memory = memory();
        memory.add_message(MessageItem::user("hello"), None);
        let messages =
            build_context(&mut memory, "You are helpful.", None, None, 10_000, 20).await;
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are helpful.");
        assert_eq!(messages.last().unwrap().content, "hello");
        assert!(has_conversation(&messages));
    }

    #[tokio::test]
    async fn recent_conversation_survives_a_tight_budget() {
        let mut memory = memory();
        for i in 0..20 {
            let mut msg = MessageItem::user(format!("message number {i}"));
            msg.token_count = 50;
            memory.add_message(msg, None);
        }
        // Budget fits the system prompt plus a handful of messages; the
        // newest must win.
        let messages = build_context(&mut memory, "sys", None, None, 200, 20).await;
        let contents: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert!(!contents.is_empty());
        assert_eq!(*contents.last().unwrap(), "message number 19");
    }

    #[tokio::test]
    async fn working_set_appears_as_context_block() {
        let config = MemoryConfig::default().with_l1_budget(20);
        let mut memory =
            AgentMemory::new("agent", config, Arc::new(EstimateCounter::new()));
        let mut msg = MessageItem::user("remember the API key rotates monthly");
        msg.token_count = 15;
        memory.add_message_with(msg, None, None, Some(0.9));
        let mut msg = MessageItem::user("current question");
        msg.token_count = 15;
        memory.add_message(msg, None);

        let messages = build_context(&mut memory, "sys", None, None, 10_000, 20).await;
        let block = messages
            .iter()
            .find(|m| m.content.starts_with("Relevant working memory:"))
            .expect("L2 block present");
        assert!(block.content.contains("API key"));
    }
}
