//! Pipeline runs against the real ffmpeg and ffprobe binaries
//!
//! Ignored by default; run with `cargo test --test ffmpeg_test -- --ignored`
//! on a machine with ffmpeg on the PATH.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use video_edit_pipeline::video_edit_core::{MediaProbe, OperationRequest};
use video_edit_pipeline::video_edit_ffmpeg::FfprobeProbe;
use video_edit_pipeline::video_edit_orchestrator::LocalAssetStore;
use video_edit_pipeline::{EditRequest, EditService, ServiceConfig, TaskState};

/// Three second 320x240 test pattern with a sine tone
fn generate_test_video(path: &Path) {
    let status = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=3:size=320x240:rate=25",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=3",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-shortest",
        ])
        .arg(path)
        .status()
        .expect("ffmpeg must be installed");
    assert!(status.success());
}

#[tokio::test]
#[ignore]
async fn test_trim_rotate_denoise_with_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("pattern.mp4");
    generate_test_video(&source);

    let mut config = ServiceConfig {
        upload_dir: dir.path().join("uploads"),
        output_dir: dir.path().join("outputs"),
        work_dir: dir.path().join("work"),
        ..ServiceConfig::default()
    };
    config.interpreter.backend = "keyword".parse().unwrap();
    let store = Arc::new(LocalAssetStore::from_config(&config));
    let service = EditService::builder(config)
        .asset_store(store.clone())
        .build()
        .unwrap();

    let asset = store.import(&source).await.unwrap();
    let submission = service
        .submit(
            &asset.id,
            EditRequest::Operations(vec![
                OperationRequest::new("trim")
                    .with_param("start_time", 0.5)
                    .with_param("end_time", 2.0),
                OperationRequest::new("rotate").with_param("angle", 90),
                OperationRequest::new("denoise").with_param("intensity", 0.3),
            ]),
        )
        .await
        .unwrap();

    let view = service
        .wait_for_terminal(&submission.task_id, Duration::from_secs(120))
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed, "{:?}", view.error);

    let output = view.output.unwrap().path;
    let info = FfprobeProbe::default().probe(&output).await.unwrap();
    assert_eq!(info.resolution(), Some((240, 320)));
    assert!((info.duration - 1.5).abs() < 0.3, "duration {}", info.duration);
    assert!(info.has_audio());
}

#[tokio::test]
#[ignore]
async fn test_instruction_with_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("pattern.mp4");
    generate_test_video(&source);

    let mut config = ServiceConfig {
        upload_dir: dir.path().join("uploads"),
        output_dir: dir.path().join("outputs"),
        work_dir: dir.path().join("work"),
        ..ServiceConfig::default()
    };
    config.interpreter.backend = "keyword".parse().unwrap();
    let store = Arc::new(LocalAssetStore::from_config(&config));
    let service = EditService::builder(config)
        .asset_store(store.clone())
        .build()
        .unwrap();

    let asset = store.import(&source).await.unwrap();
    let submission = service
        .submit(
            &asset.id,
            EditRequest::Instruction("resize to 160x120 and speed it up 2x".to_string()),
        )
        .await
        .unwrap();

    let view = service
        .wait_for_terminal(&submission.task_id, Duration::from_secs(120))
        .await
        .unwrap();
    assert_eq!(view.state, TaskState::Completed, "{:?}", view.error);

    let info = FfprobeProbe::default().probe(&view.output.unwrap().path).await.unwrap();
    assert_eq!(info.resolution(), Some((160, 120)));
    assert!((info.duration - 1.5).abs() < 0.3, "duration {}", info.duration);
}
