//! Delegation behavior against the scripted mock provider.

use std::sync::Arc;

use fractal_bus::{Dispatcher, EventBus};
use fractal_loop::DelegationContext;
use fractal_orch::{
    DelegationRequest, ExecutionMode, FractalOrchestrator, OrchestratorConfig, SubtaskSpec,
    SynthesisStrategy,
};
use fractal_token::EstimateCounter;
use fractal_tool::{ToolRegistry, ToolRouter};
use fractal_types::test_utils::{MockProvider, MockTurn};
use fractal_types::{DelegationError, Task};
use serde_json::json;

fn harness(turns: Vec<MockTurn>) -> (FractalOrchestrator, Arc<Dispatcher>) {
    let provider = Arc::new(MockProvider::new(turns));
    let bus = Arc::new(EventBus::new());
    let dispatcher = Arc::new(Dispatcher::builder(bus).build());
    let orchestrator = FractalOrchestrator::new(
        provider,
        dispatcher.clone(),
        Arc::new(EstimateCounter::new()),
    );
    (orchestrator, dispatcher)
}

fn context(depth: usize) -> DelegationContext {
    let task = Task::new("caller", "agent.execute")
        .with_parameter("content", json!("the original task"));
    DelegationContext {
        parent_id: "root".to_string(),
        depth,
        session_id: None,
        task,
        router: ToolRouter::new(ToolRegistry::new()),
    }
}

fn request(n: usize, mode: ExecutionMode, strategy: SynthesisStrategy) -> DelegationRequest {
    let mut request = DelegationRequest::new(
        (0..n)
            .map(|i| SubtaskSpec::new(format!("subtask {i}")))
            .collect(),
    );
    request.execution_mode = mode;
    request.synthesis_strategy = strategy;
    request
}

#[tokio::test]
async fn sequential_delegation_synthesizes_with_llm() {
    let (orchestrator, _) = harness(vec![
        MockTurn::tool_call("done", json!({"message": "A researched"})),
        MockTurn::tool_call("done", json!({"message": "B summarized"})),
        // The auto strategy asks the provider to synthesize.
        MockTurn::text("A and B, combined."),
    ]);
    let result = orchestrator
        .delegate_request(
            context(0),
            request(2, ExecutionMode::Sequential, SynthesisStrategy::Auto),
        )
        .await
        .unwrap();
    assert_eq!(result, "A and B, combined.");
}

#[tokio::test]
async fn structured_synthesis_counts_outcomes() {
    let (orchestrator, _) = harness(vec![
        MockTurn::tool_call("done", json!({"message": "first"})),
        MockTurn::tool_call("done", json!({"message": "second"})),
    ]);
    let result = orchestrator
        .delegate_request(
            context(0),
            request(2, ExecutionMode::Sequential, SynthesisStrategy::Structured),
        )
        .await
        .unwrap();
    assert!(result.contains("**Total**: 2 subtasks | ✓ 2 succeeded | ✗ 0 failed"));
    assert!(result.contains("first"));
    assert!(result.contains("second"));
}

#[tokio::test]
async fn parallel_delegation_waits_for_all() {
    let (orchestrator, _) = harness(vec![
        MockTurn::tool_call("done", json!({"message": "finished"})),
        MockTurn::tool_call("done", json!({"message": "finished"})),
    ]);
    let result = orchestrator
        .delegate_request(
            context(0),
            request(2, ExecutionMode::Parallel, SynthesisStrategy::Structured),
        )
        .await
        .unwrap();
    assert!(result.contains("✓ 2 succeeded"));
}

#[tokio::test]
async fn empty_subtasks_fail_fast() {
    let (orchestrator, _) = harness(vec![]);
    let err = orchestrator
        .delegate_request(
            context(0),
            request(0, ExecutionMode::Sequential, SynthesisStrategy::Auto),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DelegationError::EmptySubtasks));
}

#[tokio::test]
async fn too_many_subtasks_fail_fast() {
    let (orchestrator, _) = harness(vec![]);
    let err = orchestrator
        .delegate_request(
            context(0),
            request(9, ExecutionMode::Sequential, SynthesisStrategy::Auto),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DelegationError::TooManySubtasks { given: 9, max: 8 }
    ));
}

#[tokio::test]
async fn depth_limit_fails_fast() {
    let (orchestrator, _) = harness(vec![]);
    let err = orchestrator
        .delegate_request(
            context(3),
            request(1, ExecutionMode::Sequential, SynthesisStrategy::Auto),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DelegationError::DepthExceeded { depth: 3, max: 3 }
    ));
}

#[tokio::test]
async fn sequential_failure_surfaces_partial_results() {
    let (orchestrator, _) = harness(vec![
        MockTurn::tool_call("done", json!({"message": "first ok"})),
        MockTurn::Failure {
            retryable: false,
            message: "model rejected the request".into(),
        },
    ]);
    let err = orchestrator
        .delegate_request(
            context(0),
            request(2, ExecutionMode::Sequential, SynthesisStrategy::Auto),
        )
        .await
        .unwrap_err();
    match err {
        DelegationError::ChildFailed { child, message } => {
            assert!(child.contains(":worker-1-"));
            assert!(message.contains("Partial results"));
            assert!(message.contains("first ok"));
        }
        other => panic!("expected ChildFailed, got {other}"),
    }
}

#[tokio::test]
async fn child_at_the_boundary_cannot_delegate() {
    // max depth 1: the child spawns without `delegate_subtasks`. Its
    // attempt to call it becomes a not-found observation and the loop
    // recovers with a plain answer.
    let (orchestrator, _) = harness(vec![
        MockTurn::tool_call(
            "delegate_subtasks",
            json!({"subtasks": [{"description": "go deeper"}]}),
        ),
        MockTurn::text("answered directly instead"),
    ]);
    let orchestrator = orchestrator.with_config(OrchestratorConfig {
        max_recursive_depth: 1,
        ..OrchestratorConfig::default()
    });
    let result = orchestrator
        .delegate_request(
            context(0),
            request(1, ExecutionMode::Sequential, SynthesisStrategy::Structured),
        )
        .await
        .unwrap();
    assert!(result.contains("answered directly instead"));
    assert!(result.contains("✓ 1 succeeded"));
}

#[tokio::test]
async fn children_are_uniquely_named() {
    let (orchestrator, dispatcher) = harness(vec![
        MockTurn::tool_call("done", json!({"message": "x"})),
        MockTurn::tool_call("done", json!({"message": "y"})),
    ]);
    orchestrator
        .delegate_request(
            context(0),
            request(2, ExecutionMode::Sequential, SynthesisStrategy::Structured),
        )
        .await
        .unwrap();

    let completes = dispatcher.bus().query(&fractal_types::EventQuery {
        event_type: Some("node.complete".into()),
        limit: 10,
        ..fractal_types::EventQuery::default()
    });
    assert_eq!(completes.len(), 2);
    let sources: Vec<&str> = completes.iter().map(|e| e.source.as_str()).collect();
    assert!(sources.iter().all(|s| s.starts_with("/agent/root:worker-")));
    assert_ne!(sources[0], sources[1]);
}
