#![deny(missing_docs)]
//! Fractal delegation for fractal agents.
//!
//! When an agent calls `delegate_subtasks`, the [`FractalOrchestrator`]
//! validates the request (fail fast, before any child exists), spawns
//! child agents with inherited-and-filtered tool sets, runs them
//! sequentially or in parallel, and synthesizes their results into a
//! single reply via [`synthesizer`].
//!
//! Depth is bounded: a child created at the recursion limit loses
//! `delegate_subtasks` from its tool set entirely, so the tree cannot
//! grow past `max_recursive_depth` even if the model tries.

pub mod orchestrator;
pub mod request;
pub mod synthesizer;

pub use orchestrator::{FractalOrchestrator, OrchestratorConfig};
pub use request::{DelegationRequest, ExecutionMode, SubtaskSpec, SynthesisStrategy};
pub use synthesizer::{synthesize, ChildOutcome};
