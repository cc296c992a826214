//! Integration tests for the stack lifecycle state machine.
//!
//! Mock collaborators stand in for the container engine and the native
//! process, so every state transition runs without Docker installed.

mod common;

use common::{lifecycle, lifecycle_with_extensions, MockEngine, MockNative};
use corral_core::native::NativeService;
use corral_core::{CorralError, PlatformKind, StackState, StartOutcome, UpdateOptions, UpdateOutcome};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::test]
async fn test_start_then_start_is_a_noop() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);

    let first = orchestrator.start(false).await.unwrap();
    assert!(matches!(first, StartOutcome::Started { .. }));
    assert!(first.success());

    let second = orchestrator.start(false).await.unwrap();
    assert_eq!(second, StartOutcome::AlreadyRunning);

    // Exactly one engine mutation happened.
    let ups = engine.calls().iter().filter(|c| c.as_str() == "up").count();
    assert_eq!(ups, 1);
}

#[tokio::test]
async fn test_stop_on_stopped_stack_succeeds() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);

    orchestrator.stop().await.unwrap();
    assert_eq!(orchestrator.stack_state().await.unwrap(), StackState::Stopped);
}

#[tokio::test]
async fn test_restart_cycles_the_stack() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);

    orchestrator.start(false).await.unwrap();
    let outcome = orchestrator.restart(false).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { .. }));

    let calls = engine.calls();
    let stop_pos = calls.iter().position(|c| c == "stop").unwrap();
    let last_up = calls.iter().rposition(|c| c == "up").unwrap();
    assert!(stop_pos < last_up, "restart must stop before starting again");
}

#[tokio::test]
async fn test_update_refuses_running_stack_without_force() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);
    orchestrator.start(false).await.unwrap();

    let outcome = orchestrator.update(UpdateOptions::default()).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::RestartRequired);
    assert!(!outcome.success());

    // Nothing was pulled, stopped, or restarted.
    assert!(!engine.calls().iter().any(|c| c.starts_with("pull") || c == "stop"));
}

#[tokio::test]
async fn test_inline_update_pulls_without_extra_cycle() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);
    orchestrator.start(false).await.unwrap();

    let opts = UpdateOptions {
        force_restart: true,
        called_from_start_restart: true,
        ..UpdateOptions::default()
    };
    let outcome = orchestrator.update(opts).await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Completed {
            extension_failures: vec![],
            native_failures: vec![],
            restarted: false
        }
    );

    let calls = engine.calls();
    assert!(calls.iter().any(|c| c.starts_with("pull")));
    assert!(!calls.iter().any(|c| c == "stop"), "inline update must not stop the stack");
}

#[tokio::test]
async fn test_standalone_update_stops_pulls_and_restarts() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);
    orchestrator.start(false).await.unwrap();

    let opts = UpdateOptions { force_restart: true, ..UpdateOptions::default() };
    let outcome = orchestrator.update(opts).await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Completed {
            extension_failures: vec![],
            native_failures: vec![],
            restarted: true
        }
    );

    let calls = engine.calls();
    let stop = calls.iter().position(|c| c == "stop").unwrap();
    let pull = calls.iter().position(|c| c.starts_with("pull")).unwrap();
    let up = calls.iter().rposition(|c| c == "up").unwrap();
    assert!(stop < pull && pull < up);
    assert_eq!(orchestrator.stack_state().await.unwrap(), StackState::Running);
}

#[tokio::test]
async fn test_update_flags_are_mutually_exclusive() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine, vec![], PlatformKind::GenericCpu);

    let opts =
        UpdateOptions { services_only: true, extensions_only: true, ..UpdateOptions::default() };
    assert!(matches!(
        orchestrator.update(opts).await,
        Err(CorralError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_extension_failure_does_not_block_siblings() {
    let engine = MockEngine::new();
    engine.state.lock().unwrap().fail_pull.push("broken".to_string());

    let extensions = vec![
        ("broken".to_string(), PathBuf::from("extensions/broken/docker-compose.yml")),
        ("search".to_string(), PathBuf::from("extensions/search/docker-compose.yml")),
    ];
    let orchestrator = lifecycle_with_extensions(
        engine.clone(),
        vec![],
        PlatformKind::GenericCpu,
        extensions,
    );

    let outcome = orchestrator.update(UpdateOptions::default()).await.unwrap();
    match outcome {
        UpdateOutcome::Completed { extension_failures, native_failures, restarted } => {
            assert_eq!(extension_failures, vec!["broken".to_string()]);
            assert!(native_failures.is_empty());
            assert!(!restarted);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Both extensions were attempted despite the first failing.
    let pulls = engine.calls().iter().filter(|c| c.starts_with("pull")).count();
    assert_eq!(pulls, 3, "core pull plus one per extension");
}

#[tokio::test]
async fn test_standalone_update_surfaces_native_restart_failure() {
    let engine = MockEngine::new();
    let native = MockNative::failing("model-server");
    let orchestrator = lifecycle(
        engine.clone(),
        vec![native as Arc<dyn NativeService>],
        PlatformKind::AppleSilicon,
    );
    orchestrator.start(false).await.unwrap();

    let opts = UpdateOptions { force_restart: true, ..UpdateOptions::default() };
    let outcome = orchestrator.update(opts).await.unwrap();
    match &outcome {
        UpdateOutcome::Completed { native_failures, restarted, .. } => {
            assert_eq!(native_failures, &vec!["model-server".to_string()]);
            assert!(*restarted);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!outcome.success(), "a failed native restart must fail the update");
}

#[tokio::test]
async fn test_native_start_failure_is_aggregated_not_fatal() {
    let engine = MockEngine::new();
    let native = MockNative::failing("model-server");
    let orchestrator = lifecycle(
        engine.clone(),
        vec![native as Arc<dyn NativeService>],
        PlatformKind::AppleSilicon,
    );

    let outcome = orchestrator.start(false).await.unwrap();
    match &outcome {
        StartOutcome::Started { native_failures } => {
            assert_eq!(native_failures, &vec!["model-server".to_string()]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!outcome.success());

    // Containerized services still came up.
    assert!(engine.calls().iter().any(|c| c == "up"));
}

#[tokio::test]
async fn test_native_service_participates_in_stack_state() {
    let engine = MockEngine::new();
    let native = MockNative::new("model-server");
    let orchestrator = lifecycle(
        engine.clone(),
        vec![native.clone() as Arc<dyn NativeService>],
        PlatformKind::AppleSilicon,
    );

    orchestrator.start(false).await.unwrap();
    assert_eq!(orchestrator.stack_state().await.unwrap(), StackState::Running);
    assert!(native.is_running().await);

    // Kill just the native side: the stack becomes partially running.
    native.stop().await.unwrap();
    assert_eq!(orchestrator.stack_state().await.unwrap(), StackState::PartiallyRunning);

    orchestrator.stop().await.unwrap();
    assert_eq!(orchestrator.stack_state().await.unwrap(), StackState::Stopped);
}

#[tokio::test]
async fn test_status_reports_every_registered_service() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);
    orchestrator.start(false).await.unwrap();

    let statuses = orchestrator.status().await.unwrap();
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s.is_running));

    orchestrator.stop().await.unwrap();
    let statuses = orchestrator.status().await.unwrap();
    assert!(statuses.iter().all(|s| !s.is_running));
}

#[tokio::test]
async fn test_logs_for_unknown_service_is_an_error() {
    let engine = MockEngine::new();
    let orchestrator = lifecycle(engine, vec![], PlatformKind::GenericCpu);

    assert!(matches!(
        orchestrator.logs(Some("nope"), false, 10).await,
        Err(CorralError::UnknownService { .. })
    ));
}

#[tokio::test]
async fn test_logs_dispatch_native_and_containerized() {
    let engine = MockEngine::new();
    let native = MockNative::new("model-server");
    let orchestrator = lifecycle(
        engine.clone(),
        vec![native as Arc<dyn NativeService>],
        PlatformKind::AppleSilicon,
    );

    let mut native_stream = orchestrator.logs(Some("model-server"), false, 10).await.unwrap();
    assert_eq!(native_stream.next_line().await.unwrap().as_deref(), Some("native log line"));

    let mut compose_stream = orchestrator.logs(Some("web-ui"), false, 10).await.unwrap();
    assert_eq!(compose_stream.next_line().await.unwrap().as_deref(), Some("log line"));
}
