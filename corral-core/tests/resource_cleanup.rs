//! Integration tests for the label-based cleanup engine.

mod common;

use common::{lifecycle, EngineState, MockEngine};
use corral_core::engine::ContainerEngine;
use corral_core::{
    AlwaysConfirm, CleanupOptions, NeverConfirm, PlatformKind, ResourceCleanupEngine,
};
use std::sync::Arc;
use tempfile::TempDir;

fn seeded_engine() -> Arc<MockEngine> {
    MockEngine::with_state(EngineState {
        containers: vec![("model-server".to_string(), true), ("web-ui".to_string(), true)],
        networks: vec!["corral_default".to_string()],
        volumes: vec!["corral_models".to_string()],
        images: vec!["model-server:latest".to_string()],
        ..EngineState::default()
    })
}

fn cleanup_engine(
    engine: Arc<MockEngine>,
    config_dir: &std::path::Path,
    confirm: bool,
) -> ResourceCleanupEngine {
    let lc = lifecycle(engine.clone(), vec![], PlatformKind::GenericCpu);
    let confirmer: Arc<dyn corral_core::Confirmer> =
        if confirm { Arc::new(AlwaysConfirm) } else { Arc::new(NeverConfirm) };
    ResourceCleanupEngine::new(
        engine as Arc<dyn ContainerEngine>,
        lc,
        config_dir.to_path_buf(),
        confirmer,
    )
}

#[tokio::test]
async fn test_default_cleanup_keeps_volumes_images_and_config() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(config_dir.path().join("corral.json"), b"{}").unwrap();

    let engine = seeded_engine();
    let cleanup = cleanup_engine(engine.clone(), config_dir.path(), true);

    let report = cleanup.cleanup(CleanupOptions::default()).await.unwrap();
    assert_eq!(report.containers_removed, 2);
    assert_eq!(report.networks_removed, 1);
    assert_eq!(report.images_removed, 0);
    assert_eq!(report.volumes_removed, 0);
    assert!(!report.config_removed);

    assert_eq!(engine.volumes(), vec!["corral_models".to_string()]);
    assert!(config_dir.path().join("corral.json").is_file());
}

#[tokio::test]
async fn test_remove_everything_overrides_individual_flags() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(config_dir.path().join("corral.json"), b"{}").unwrap();

    let engine = seeded_engine();
    let cleanup = cleanup_engine(engine.clone(), config_dir.path(), true);

    // Volumes and config explicitly off; the override must win.
    let opts = CleanupOptions {
        remove_volumes: false,
        remove_config: false,
        remove_everything: true,
        force: true,
        ..CleanupOptions::default()
    };
    let report = cleanup.cleanup(opts).await.unwrap();
    assert_eq!(report.volumes_removed, 1);
    assert!(report.config_removed);
    assert!(engine.volumes().is_empty());
    assert!(!config_dir.path().exists());
}

#[tokio::test]
async fn test_volume_removal_has_its_own_confirmation_gate() {
    let config_dir = TempDir::new().unwrap();
    let engine = seeded_engine();
    let cleanup = cleanup_engine(engine.clone(), config_dir.path(), false);

    let opts = CleanupOptions { remove_volumes: true, ..CleanupOptions::default() };
    let report = cleanup.cleanup(opts).await.unwrap();

    // Containers and networks went; volumes survived the declined gate.
    assert_eq!(report.containers_removed, 2);
    assert!(report.volumes_declined);
    assert_eq!(report.volumes_removed, 0);
    assert_eq!(engine.volumes(), vec!["corral_models".to_string()]);
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(config_dir.path().join("corral.json"), b"{}").unwrap();

    let engine = seeded_engine();
    let cleanup = cleanup_engine(engine.clone(), config_dir.path(), true);

    let opts = CleanupOptions { remove_everything: true, force: true, ..CleanupOptions::default() };
    let first = cleanup.cleanup(opts).await.unwrap();
    assert_eq!(first.containers_removed, 2);

    // Nothing left to remove is a success, not an error.
    let second = cleanup.cleanup(opts).await.unwrap();
    assert_eq!(second.containers_removed, 0);
    assert_eq!(second.networks_removed, 0);
    assert_eq!(second.volumes_removed, 0);
    assert!(!second.config_removed);
}
