//! Aggregation of streamed tool-call fragments.
//!
//! Providers stream tool calls as `start → delta* → complete`. The
//! aggregator accumulates argument fragments per call index and parses
//! them as JSON at completion; a parse failure yields an invalid call
//! that must be surfaced as an error observation, never executed.

use std::collections::BTreeMap;

use fractal_types::{StreamChunk, ToolCall};

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    fragments: String,
    provider_args: Option<serde_json::Value>,
}

/// A fully aggregated tool call, valid or not.
#[derive(Debug)]
pub enum AggregatedCall {
    /// Arguments parsed; the call may be executed.
    Call(ToolCall),
    /// Argument parsing failed; execute nothing, observe the error.
    Invalid {
        /// The call id, if the provider assigned one.
        id: String,
        /// The tool name.
        name: String,
        /// The parse error.
        error: String,
    },
}

/// Accumulates per-index tool-call fragments from a chunk stream.
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stream chunk. Non-tool chunks are ignored.
    pub fn absorb(&mut self, chunk: &StreamChunk) {
        match chunk {
            StreamChunk::ToolCallStart { id, name, index } => {
                let call = self.calls.entry(*index).or_default();
                call.id = id.clone();
                call.name = name.clone();
            }
            StreamChunk::ToolCallDelta {
                index,
                arguments_fragment,
            } => {
                self.calls
                    .entry(*index)
                    .or_default()
                    .fragments
                    .push_str(arguments_fragment);
            }
            StreamChunk::ToolCallComplete {
                id,
                name,
                arguments,
            } => {
                // Complete carries no index; match by id, then by name.
                let matched_key = self
                    .calls
                    .iter()
                    .find(|(_, c)| c.id == *id)
                    .or_else(|| {
                        self.calls
                            .iter()
                            .find(|(_, c)| c.name == *name && c.provider_args.is_none())
                    })
                    .map(|(k, _)| *k);
                let entry = matched_key.and_then(|k| self.calls.get_mut(&k));
                match entry {
                    Some(call) => {
                        if call.id.is_empty() {
                            call.id = id.clone();
                        }
                        call.provider_args = arguments.clone();
                    }
                    None => {
                        let index = self.calls.keys().next_back().map_or(0, |i| i + 1);
                        self.calls.insert(
                            index,
                            PartialCall {
                                id: id.clone(),
                                name: name.clone(),
                                fragments: String::new(),
                                provider_args: arguments.clone(),
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// Whether any tool calls were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Consume the aggregator, yielding the calls in stream order.
    #[must_use]
    pub fn finish(self) -> Vec<AggregatedCall> {
        self.calls
            .into_values()
            .map(|call| {
                let arguments = match call.provider_args {
                    Some(args) => Ok(args),
                    None if call.fragments.trim().is_empty() => {
                        Ok(serde_json::Value::Object(serde_json::Map::new()))
                    }
                    None => serde_json::from_str::<serde_json::Value>(&call.fragments)
                        .map_err(|e| e.to_string()),
                };
                match arguments {
                    Ok(arguments) => AggregatedCall::Call(ToolCall {
                        id: call.id,
                        name: call.name,
                        arguments,
                    }),
                    Err(error) => AggregatedCall::Invalid {
                        id: call.id,
                        name: call.name,
                        error,
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(id: &str, name: &str, index: usize) -> StreamChunk {
        StreamChunk::ToolCallStart {
            id: id.into(),
            name: name.into(),
            index,
        }
    }

    fn delta(index: usize, fragment: &str) -> StreamChunk {
        StreamChunk::ToolCallDelta {
            index,
            arguments_fragment: fragment.into(),
        }
    }

    fn complete(id: &str, name: &str) -> StreamChunk {
        StreamChunk::ToolCallComplete {
            id: id.into(),
            name: name.into(),
            arguments: None,
        }
    }

    #[test]
    fn assembles_fragmented_arguments() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&start("c1", "calc", 0));
        agg.absorb(&delta(0, "{\"x\":"));
        agg.absorb(&delta(0, " 7}"));
        agg.absorb(&complete("c1", "calc"));
        let calls = agg.finish();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            AggregatedCall::Call(call) => {
                assert_eq!(call.name, "calc");
                assert_eq!(call.arguments, json!({"x": 7}));
            }
            AggregatedCall::Invalid { .. } => panic!("expected valid call"),
        }
    }

    #[test]
    fn invalid_json_yields_invalid_call() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&start("c1", "calc", 0));
        agg.absorb(&delta(0, "{x:"));
        agg.absorb(&complete("c1", "calc"));
        let calls = agg.finish();
        match &calls[0] {
            AggregatedCall::Invalid { name, error, .. } => {
                assert_eq!(name, "calc");
                assert!(!error.is_empty());
            }
            AggregatedCall::Call(_) => panic!("expected invalid call"),
        }
    }

    #[test]
    fn provider_parsed_arguments_win() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&start("c1", "calc", 0));
        agg.absorb(&delta(0, "{broken"));
        agg.absorb(&StreamChunk::ToolCallComplete {
            id: "c1".into(),
            name: "calc".into(),
            arguments: Some(json!({"x": 1})),
        });
        let calls = agg.finish();
        assert!(matches!(
            &calls[0],
            AggregatedCall::Call(call) if call.arguments == json!({"x": 1})
        ));
    }

    #[test]
    fn multiple_calls_keep_stream_order() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&start("c1", "first", 0));
        agg.absorb(&delta(0, "{}"));
        agg.absorb(&start("c2", "second", 1));
        agg.absorb(&delta(1, "{}"));
        agg.absorb(&complete("c1", "first"));
        agg.absorb(&complete("c2", "second"));
        let names: Vec<String> = agg
            .finish()
            .into_iter()
            .map(|c| match c {
                AggregatedCall::Call(call) => call.name,
                AggregatedCall::Invalid { name, .. } => name,
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn empty_fragments_mean_no_arguments() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&start("c1", "list", 0));
        agg.absorb(&complete("c1", "list"));
        let calls = agg.finish();
        assert!(matches!(
            &calls[0],
            AggregatedCall::Call(call) if call.arguments == json!({})
        ));
    }

    #[test]
    fn complete_without_start_still_registers() {
        let mut agg = ToolCallAggregator::new();
        agg.absorb(&StreamChunk::ToolCallComplete {
            id: "c9".into(),
            name: "ping".into(),
            arguments: Some(json!({})),
        });
        let calls = agg.finish();
        assert_eq!(calls.len(), 1);
    }
}
