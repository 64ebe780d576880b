use super::*;
use crate::errors::{ProvisionError, SyncError};
use std::path::PathBuf;

#[tokio::test]
async fn test_run_stage_passes_success_through() {
    let mut signals = ShutdownSignals::install().unwrap();
    let value = run_stage(Stage::Install, Some(Duration::from_secs(5)), &mut signals, async {
        Ok::<_, ProvisionError>(42)
    })
    .await
    .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_run_stage_converts_stage_errors() {
    let mut signals = ShutdownSignals::install().unwrap();
    let err = run_stage(Stage::Clone, None, &mut signals, async {
        Err::<(), _>(SyncError::ForeignContent {
            path: PathBuf::from("/app"),
        })
    })
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Stage::Clone);
    assert_eq!(err.exit_code(), 80);
}

#[tokio::test]
async fn test_run_stage_timeout_uses_stage_exit_code() {
    let mut signals = ShutdownSignals::install().unwrap();
    let err = run_stage(Stage::Update, Some(Duration::from_millis(50)), &mut signals, async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<(), SyncError>(())
    })
    .await
    .unwrap_err();

    assert!(
        matches!(err, LaunchError::Timeout { stage: Stage::Update, after } if after == Duration::from_millis(50))
    );
    assert_eq!(err.exit_code(), 81);
    assert!(err.to_string().contains("update stage timed out after 50ms"), "{}", err);
}

#[tokio::test]
async fn test_run_stage_without_limit_waits() {
    let mut signals = ShutdownSignals::install().unwrap();
    let value = run_stage(Stage::Browser, None, &mut signals, async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, ProvisionError>("done")
    })
    .await
    .unwrap();
    assert_eq!(value, "done");
}
