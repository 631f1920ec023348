//! End-to-end flow tests for the tracking core: create a session, drive
//! it with progress and task events, and verify the derived state and
//! the published event stream.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use foundry_core::config::PipelineConfig;
use foundry_core::{
    EventPublisher, MemoryPublisher, ProgressAggregator, SessionRegistry, Termination,
};
use foundry_types::{
    AgentId, Phase, PhaseStatus, PipelineEvent, ProgressEvent, SessionId, SessionStatus,
    TaskEvent, TaskId, TaskStatus, TaskType, UserId,
};

struct Core {
    registry: Arc<SessionRegistry>,
    publisher: Arc<MemoryPublisher>,
    aggregator: ProgressAggregator,
}

fn make_core(config: PipelineConfig) -> Core {
    let publisher = Arc::new(MemoryPublisher::new());
    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        &config,
    ));
    let aggregator = ProgressAggregator::new(
        Arc::clone(&registry),
        Arc::clone(&publisher) as Arc<dyn EventPublisher>,
        config,
    );
    Core {
        registry,
        publisher,
        aggregator,
    }
}

fn progress(session: &str, phase: Phase, value: f64) -> ProgressEvent {
    ProgressEvent {
        session_id: SessionId::new(session),
        user_id: Some(UserId::new("u1")),
        phase,
        step: "step".to_owned(),
        progress: value,
        message: "working".to_owned(),
        agent_id: None,
        estimated_time_remaining: None,
        details: None,
        timestamp: Utc::now(),
    }
}

fn task(session: &str, id: &str, task_type: TaskType, status: TaskStatus) -> TaskEvent {
    TaskEvent {
        session_id: SessionId::new(session),
        user_id: Some(UserId::new("u1")),
        task_id: TaskId::new(id),
        task_type,
        action: "work".to_owned(),
        status,
        agent_id: AgentId::new("agent-1"),
        progress: None,
        message: None,
        error: None,
        result: None,
        timestamp: Utc::now(),
    }
}

/// The two-phase weighting scenario: analysis (0.10) and generation
/// (0.35) both at 100 blend to exactly 45 overall.
#[tokio::test]
async fn weighted_overall_progress_scenario() {
    let core = make_core(PipelineConfig::default());
    core.registry
        .create(SessionId::new("S1"), UserId::new("u1"), "space-trader")
        .await
        .unwrap();

    core.aggregator
        .apply_progress_event(progress("S1", Phase::Analysis, 100.0))
        .await
        .unwrap();

    // A completed generation task alone does not move phase progress.
    core.aggregator
        .apply_task_event(task("S1", "t1", TaskType::Creation, TaskStatus::Started))
        .await
        .unwrap();
    core.aggregator
        .apply_task_event(task("S1", "t1", TaskType::Creation, TaskStatus::Completed))
        .await
        .unwrap();
    let mid = core.registry.get(&SessionId::new("S1")).await.unwrap();
    assert!((mid.overall_progress - 10.0).abs() < 1e-9);

    // Once generation itself reports 100, overall is 45 exactly.
    core.aggregator
        .apply_progress_event(progress("S1", Phase::Generation, 100.0))
        .await
        .unwrap();
    let session = core.registry.get(&SessionId::new("S1")).await.unwrap();
    assert!((session.overall_progress - 45.0).abs() < 1e-9);
    assert_eq!(session.current_phase, Phase::Optimization);
    assert_eq!(
        session.phase(Phase::Generation).unwrap().status,
        PhaseStatus::Completed
    );
}

/// Overall progress never decreases across any sequence of accepted
/// events while the session is running.
#[tokio::test]
async fn overall_progress_never_regresses() {
    let core = make_core(PipelineConfig::default());
    core.registry
        .create(SessionId::new("S1"), UserId::new("u1"), "rogue-like")
        .await
        .unwrap();

    let sequence = [
        (Phase::Analysis, 40.0),
        (Phase::Generation, 25.0),
        (Phase::Analysis, 10.0),
        (Phase::Optimization, 80.0),
        (Phase::Generation, 5.0),
        (Phase::Analysis, 100.0),
    ];

    let mut last_overall = 0.0_f64;
    for (phase, value) in sequence {
        core.aggregator
            .apply_progress_event(progress("S1", phase, value))
            .await
            .unwrap();
        let session = core.registry.get(&SessionId::new("S1")).await.unwrap();
        assert!(
            session.overall_progress >= last_overall,
            "overall regressed: {} < {last_overall}",
            session.overall_progress
        );
        last_overall = session.overall_progress;
    }
}

/// Explicit termination publishes exactly one terminal event, keeps the
/// session queryable through the grace period, and then pruning removes
/// it.
#[tokio::test]
async fn termination_grace_and_prune() {
    let config = PipelineConfig {
        terminal_grace_secs: 60,
        ..PipelineConfig::default()
    };
    let core = make_core(config);
    core.registry
        .create(SessionId::new("S1"), UserId::new("u1"), "platformer")
        .await
        .unwrap();
    core.aggregator
        .apply_progress_event(progress("S1", Phase::Analysis, 30.0))
        .await
        .unwrap();

    core.registry
        .terminate(&SessionId::new("S1"), Termination::Failed, "worker died")
        .await
        .unwrap();

    // Dependent UIs can still read the failure during the grace period.
    let session = core.registry.get(&SessionId::new("S1")).await.unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.phase(Phase::Analysis).unwrap().status,
        PhaseStatus::Failed
    );

    // Events after termination are rejected and change nothing.
    let rejected = core
        .aggregator
        .apply_progress_event(progress("S1", Phase::Analysis, 90.0))
        .await;
    assert!(rejected.is_err());
    let unchanged = core.registry.get(&SessionId::new("S1")).await.unwrap();
    assert_eq!(unchanged.status, SessionStatus::Failed);

    // Past the grace period the session is pruned.
    let later = Utc::now() + Duration::seconds(120);
    assert_eq!(core.registry.prune(later).await, 1);
    assert!(core.registry.get(&SessionId::new("S1")).await.is_err());

    // Exactly one terminal event went to observers.
    let terminal_count = core
        .publisher
        .events()
        .iter()
        .filter(|e| matches!(e, PipelineEvent::SessionTerminated { .. }))
        .count();
    assert_eq!(terminal_count, 1);
}

/// Sessions tracked in parallel do not interfere with each other.
#[tokio::test]
async fn concurrent_sessions_are_independent() {
    let core = make_core(PipelineConfig::default());
    for i in 0..8 {
        core.registry
            .create(
                SessionId::new(format!("S{i}")),
                UserId::new("u1"),
                format!("artifact-{i}"),
            )
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    let aggregator = Arc::new(core.aggregator);
    for i in 0..8 {
        let aggregator = Arc::clone(&aggregator);
        handles.push(tokio::spawn(async move {
            let session = format!("S{i}");
            for step in 1..=10u32 {
                aggregator
                    .apply_progress_event(progress(
                        &session,
                        Phase::Analysis,
                        f64::from(step) * 10.0,
                    ))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8 {
        let session = core
            .registry
            .get(&SessionId::new(format!("S{i}")))
            .await
            .unwrap();
        assert_eq!(
            session.phase(Phase::Analysis).unwrap().status,
            PhaseStatus::Completed
        );
        // analysis weight 0.10 at 100% = 10 overall
        assert!((session.overall_progress - 10.0).abs() < 1e-9);
    }
}

/// Repair tasks land in the compilation phase and exhaustion fails it.
#[tokio::test]
async fn repair_retry_exhaustion_fails_compilation() {
    let config = PipelineConfig {
        max_task_retries: 1,
        ..PipelineConfig::default()
    };
    let core = make_core(config);
    core.registry
        .create(SessionId::new("S1"), UserId::new("u1"), "puzzle")
        .await
        .unwrap();

    core.aggregator
        .apply_task_event(task("S1", "fix-1", TaskType::Repair, TaskStatus::Started))
        .await
        .unwrap();
    core.aggregator
        .apply_task_event(task("S1", "fix-1", TaskType::Repair, TaskStatus::Retrying))
        .await
        .unwrap();
    core.aggregator
        .apply_task_event(task("S1", "fix-1", TaskType::Repair, TaskStatus::Started))
        .await
        .unwrap();
    // Second retry exceeds the bound of 1.
    let disposition = core
        .aggregator
        .apply_task_event(task("S1", "fix-1", TaskType::Repair, TaskStatus::Retrying))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        foundry_core::TaskDisposition::RetryExhausted
    );

    let session = core.registry.get(&SessionId::new("S1")).await.unwrap();
    assert_eq!(
        session.phase(Phase::Compilation).unwrap().status,
        PhaseStatus::Failed
    );
    let stats = session.agents.get(&AgentId::new("agent-1")).unwrap();
    assert_eq!(stats.tasks_failed, 1);
}
