//! End-to-end tests: submission through the service to a terminal task state

mod common;

use common::{ClipDescription, Harness, SimulatedEngine};
use std::time::Duration;
use video_edit_pipeline::video_edit_core::{OperationRequest, ValidationIssue};
use video_edit_pipeline::video_edit_orchestrator::TaskErrorKind;
use video_edit_pipeline::{
    CompilationError, EditRequest, OperationKind, SubmitError, TaskState,
};

const WAIT: Duration = Duration::from_secs(10);

fn ops(requests: Vec<OperationRequest>) -> EditRequest {
    EditRequest::Operations(requests)
}

fn trim(start: f64, end: f64) -> OperationRequest {
    OperationRequest::new("trim")
        .with_param("start_time", start)
        .with_param("end_time", end)
}

fn rotate(angle: i64) -> OperationRequest {
    OperationRequest::new("rotate").with_param("angle", angle)
}

#[tokio::test]
async fn test_trim_then_rotate_completes() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(20.0, 640, 480).await;

    let submission = harness
        .service
        .submit(&asset, ops(vec![trim(0.0, 10.0), rotate(90)]))
        .await
        .unwrap();
    assert_eq!(submission.state, TaskState::Queued);

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
    assert_eq!(
        view.states(),
        vec![TaskState::Queued, TaskState::Running, TaskState::Completed]
    );
    assert!(view.error.is_none());

    let output = view.output.unwrap();
    assert_eq!(output.steps.len(), 2);
    let clip = ClipDescription::read(&output.path).unwrap();
    assert!((clip.duration - 10.0).abs() < 1e-9);
    assert_eq!((clip.width, clip.height), (480, 640));

    // Only the final output remains; per-step files are cleaned up
    let work_dir = harness.dir.path().join("work");
    let leftovers = std::fs::read_dir(&work_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_instruction_compiles_to_same_pipeline() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(20.0, 640, 480).await;

    let submission = harness
        .service
        .submit(
            &asset,
            EditRequest::Instruction("trim from 0 to 10 seconds and rotate 90 degrees".to_string()),
        )
        .await
        .unwrap();
    let kinds: Vec<OperationKind> = submission.operations.iter().map(|op| op.kind).collect();
    assert_eq!(kinds, vec![OperationKind::Trim, OperationKind::Rotate]);
    assert!(submission.operations.iter().all(|op| op.rationale.is_some()));

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
    let clip = ClipDescription::read(&view.output.unwrap().path).unwrap();
    assert!((clip.duration - 10.0).abs() < 1e-9);
    assert_eq!((clip.width, clip.height), (480, 640));
}

#[tokio::test]
async fn test_crop_outside_small_frame_creates_no_task() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(5.0, 50, 50).await;

    let crop = OperationRequest::new("crop")
        .with_param("x", 0)
        .with_param("y", 0)
        .with_param("width", 100)
        .with_param("height", 100);
    let err = harness
        .service
        .submit(&asset, ops(vec![crop]))
        .await
        .unwrap_err();

    let SubmitError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert!(!validation.issues.is_empty());
    assert!(validation.issues.iter().all(|issue| matches!(
        issue,
        ValidationIssue::OutOfRange {
            index: 0,
            kind: OperationKind::Crop,
            ..
        }
    )));
    assert!(harness.service.list_tasks().await.is_empty());
    assert!(harness.engine.applied().is_empty());
}

#[tokio::test]
async fn test_unsupported_instruction_is_a_compilation_error() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(5.0, 640, 480).await;

    let err = harness
        .service
        .submit(&asset, EditRequest::Instruction("make it louder".to_string()))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            SubmitError::Compilation(CompilationError::NoRecognizedOperations { .. })
        ),
        "{err:?}"
    );
    assert!(harness.service.list_tasks().await.is_empty());
}

#[tokio::test]
async fn test_engine_failure_names_the_failing_operation() {
    let harness = Harness::start(SimulatedEngine::failing_on(OperationKind::Stabilization));
    let asset = harness.upload(5.0, 640, 480).await;

    let submission = harness
        .service
        .submit(
            &asset,
            ops(vec![
                OperationRequest::new("denoise"),
                OperationRequest::new("stabilization"),
                OperationRequest::new("upscale"),
            ]),
        )
        .await
        .unwrap();

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Failed);
    assert!(view.output.is_none());
    let error = view.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::Execution);
    assert_eq!(error.operation_index, Some(1));
    assert_eq!(error.operation_kind, Some(OperationKind::Stabilization));
    assert_eq!(harness.engine.applied(), vec![OperationKind::Denoise]);

    // The asset is free again once the task has failed
    assert!(harness
        .service
        .submit(&asset, ops(vec![OperationRequest::new("denoise")]))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_engine_panic_fails_the_task_and_keeps_the_worker() {
    let harness = Harness::start(SimulatedEngine::panicking_on(OperationKind::Stabilization));
    let asset = harness.upload(5.0, 640, 480).await;

    let submission = harness
        .service
        .submit(
            &asset,
            ops(vec![
                OperationRequest::new("denoise"),
                OperationRequest::new("stabilization"),
            ]),
        )
        .await
        .unwrap();
    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Failed);
    let error = view.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::Internal);
    assert!(error.message.contains("panicked"), "{}", error.message);

    // The asset slot is released and the single worker still takes jobs
    let retry = harness
        .service
        .submit(&asset, ops(vec![OperationRequest::new("denoise")]))
        .await
        .unwrap();
    let view = harness
        .service
        .wait_for_terminal(&retry.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
}

#[tokio::test]
async fn test_second_submission_for_busy_asset_is_rejected() {
    let harness = Harness::start(SimulatedEngine::with_delay(Duration::from_millis(200)));
    let asset = harness.upload(5.0, 640, 480).await;
    let other = harness.upload(5.0, 640, 480).await;

    let first = harness
        .service
        .submit(&asset, ops(vec![rotate(180)]))
        .await
        .unwrap();
    let err = harness
        .service
        .submit(&asset, ops(vec![rotate(90)]))
        .await
        .unwrap_err();
    match err {
        SubmitError::DuplicateSubmission { existing, .. } => assert_eq!(existing, first.task_id),
        other => panic!("expected duplicate submission, got {other:?}"),
    }

    // A different asset is unaffected
    assert!(harness
        .service
        .submit(&other, ops(vec![rotate(90)]))
        .await
        .is_ok());

    let view = harness
        .service
        .wait_for_terminal(&first.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
    assert!(harness
        .service
        .submit(&asset, ops(vec![rotate(90)]))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cancel_queued_task() {
    let harness = Harness::start(SimulatedEngine::with_delay(Duration::from_millis(200)));
    let busy = harness.upload(5.0, 640, 480).await;
    let waiting = harness.upload(5.0, 640, 480).await;

    // One worker: the second task stays queued behind the first
    let running = harness
        .service
        .submit(&busy, ops(vec![rotate(90), rotate(90)]))
        .await
        .unwrap();
    let queued = harness
        .service
        .submit(&waiting, ops(vec![rotate(90)]))
        .await
        .unwrap();

    let state = harness.service.cancel(&queued.task_id).await.unwrap();
    assert_eq!(state, TaskState::Cancelled);

    let view = harness.service.status(&queued.task_id).await.unwrap();
    assert_eq!(view.states(), vec![TaskState::Queued, TaskState::Cancelled]);

    let view = harness
        .service
        .wait_for_terminal(&running.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
    // The cancelled job was skipped by the worker
    assert_eq!(harness.engine.applied().len(), 2);
    let view = harness.service.status(&queued.task_id).await.unwrap();
    assert_eq!(view.state, TaskState::Cancelled);
    assert!(view.started_at.is_none());
}

#[tokio::test]
async fn test_cancel_running_task_stops_between_operations() {
    let harness = Harness::start(SimulatedEngine::with_delay(Duration::from_millis(300)));
    let asset = harness.upload(5.0, 640, 480).await;

    let submission = harness
        .service
        .submit(
            &asset,
            ops(vec![
                OperationRequest::new("denoise"),
                OperationRequest::new("denoise"),
                OperationRequest::new("denoise"),
            ]),
        )
        .await
        .unwrap();

    for _ in 0..100 {
        let view = harness.service.status(&submission.task_id).await.unwrap();
        if view.state == TaskState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let state = harness.service.cancel(&submission.task_id).await.unwrap();
    assert_eq!(state, TaskState::Running);

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(
        view.states(),
        vec![TaskState::Queued, TaskState::Running, TaskState::Cancelled]
    );
    assert!(view.cancel_requested);
    assert!(view.output.is_none());
    assert!(harness.engine.applied().len() < 3);

    // Terminal tasks cannot be cancelled again
    assert!(harness.service.cancel(&submission.task_id).await.is_err());
}

#[tokio::test]
async fn test_task_timeout_fails_the_task() {
    let harness = Harness::start_with(
        SimulatedEngine::with_delay(Duration::from_millis(600)),
        |config| config.task_timeout_secs = 1,
    );
    let asset = harness.upload(5.0, 640, 480).await;

    let submission = harness
        .service
        .submit(
            &asset,
            ops(vec![
                OperationRequest::new("denoise"),
                OperationRequest::new("denoise"),
                OperationRequest::new("denoise"),
            ]),
        )
        .await
        .unwrap();

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Failed);
    let error = view.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::Timeout);
    assert_eq!(harness.engine.applied().len(), 2);
    assert!(error.last_intermediate.is_some());
}

#[tokio::test]
async fn test_stabilization_after_crop_warns_but_runs() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(5.0, 640, 480).await;

    let crop = OperationRequest::new("crop")
        .with_param("x", 0)
        .with_param("y", 0)
        .with_param("width", 320)
        .with_param("height", 240);
    let submission = harness
        .service
        .submit(&asset, ops(vec![crop, OperationRequest::new("stabilization")]))
        .await
        .unwrap();
    assert_eq!(submission.warnings.len(), 1);
    assert_eq!(submission.warnings[0].index, 1);
    assert_eq!(submission.warnings[0].kind, OperationKind::Stabilization);

    let view = harness
        .service
        .wait_for_terminal(&submission.task_id, WAIT)
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed);
    assert_eq!(view.warnings, submission.warnings);
}

#[tokio::test]
async fn test_interpretation_is_deterministic() {
    let harness = Harness::start(SimulatedEngine::default());
    let asset = harness.upload(30.0, 1920, 1080).await;
    let instruction = "cut from 5 to 20 seconds, speed it up 2x and then denoise";

    let first = harness
        .service
        .interpret(Some(&asset), instruction)
        .await
        .unwrap();
    let second = harness
        .service
        .interpret(Some(&asset), instruction)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert!(!first.operations.is_empty());
}

#[tokio::test]
async fn test_unknown_asset_is_rejected() {
    let harness = Harness::start(SimulatedEngine::default());
    let missing = video_edit_pipeline::AssetId::from("1700000000000_missing.mp4");

    let err = harness
        .service
        .submit(&missing, ops(vec![rotate(90)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AssetNotFound(_)));
}

#[tokio::test]
async fn test_shutdown_drains_queued_work() {
    let harness = Harness::start(SimulatedEngine::with_delay(Duration::from_millis(50)));
    let a = harness.upload(5.0, 640, 480).await;
    let b = harness.upload(5.0, 640, 480).await;
    harness.service.submit(&a, ops(vec![rotate(90)])).await.unwrap();
    harness.service.submit(&b, ops(vec![rotate(90)])).await.unwrap();

    let engine = harness.engine.clone();
    harness.service.shutdown().await;
    assert_eq!(engine.applied().len(), 2);
}
