//! Integration tests for the progress relay against a fake downloader
//!
//! Run with: cargo test --test relay_test

#![cfg(unix)]

mod common;

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{Sandbox, HAPPY_VIDEO};
use mediadrop::download::relay::{ProgressEvent, ProgressRelay, RelayError};
use mediadrop::download::request::DownloadParams;

fn video_params() -> DownloadParams {
    DownloadParams {
        url: Some("https://example.com/watch?v=abc".to_string()),
        format: Some("video".to_string()),
        resolution: Some("720".to_string()),
        video_format: Some("mp4".to_string()),
    }
}

/// Run the relay to completion and collect everything it emitted.
async fn run_to_end(sandbox: &Sandbox, params: DownloadParams) -> Vec<ProgressEvent> {
    let relay = ProgressRelay::start(&sandbox.config, params).await.unwrap();
    let (tx, mut rx) = mpsc::channel(32);

    let handle = tokio::spawn(relay.run(tx, CancellationToken::new()));

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    handle.await.unwrap().unwrap();
    events
}

#[tokio::test]
#[serial]
async fn test_happy_path_sequence() {
    let sandbox = Sandbox::with_downloader(HAPPY_VIDEO);
    sandbox.add_file("old.mp4", b"already here");

    let events = run_to_end(&sandbox, video_params()).await;

    assert_eq!(
        events,
        vec![
            ProgressEvent::Line("50%".to_string()),
            ProgressEvent::Line("100%".to_string()),
            ProgressEvent::FileReady {
                filename: "video.mp4".to_string(),
                retrieval_path: "/files/video.mp4".to_string(),
            },
            ProgressEvent::Done,
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_streaming_arguments() {
    let sandbox = Sandbox::with_downloader(HAPPY_VIDEO);
    run_to_end(&sandbox, video_params()).await;

    let args = sandbox.recorded_args();
    assert_eq!(args.first().map(String::as_str), Some("-f"));
    assert_eq!(
        args[1],
        "bestvideo[height<=720][ext=mp4]+bestaudio/best[height<=720][ext=mp4]/\
         bestvideo[height<=720]+bestaudio/best[height<=720]"
    );
    assert!(args.contains(&"--newline".to_string()));
    assert!(args.contains(&"--progress-template".to_string()));
    assert!(args.contains(&"--no-playlist".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=abc"));
}

#[tokio::test]
#[serial]
async fn test_no_new_file_emits_done_only() {
    let sandbox = Sandbox::with_downloader(r#"echo "[download] already downloaded" >&2"#);
    sandbox.add_file("existing.mp4", b"x");

    let events = run_to_end(&sandbox, video_params()).await;

    assert_eq!(
        events,
        vec![
            ProgressEvent::Line("[download] already downloaded".to_string()),
            ProgressEvent::Done,
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_non_zero_exit_still_ends_with_done() {
    let sandbox = Sandbox::with_downloader(
        r#"echo "ERROR: Unsupported URL" >&2
exit 1"#,
    );

    let events = run_to_end(&sandbox, video_params()).await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], ProgressEvent::Line("ERROR: Unsupported URL".to_string()));
    assert!(matches!(&events[1], ProgressEvent::Failed(msg) if msg.contains("exit")));
    assert_eq!(events[2], ProgressEvent::Done);
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_process_and_skips_file() {
    let mut sandbox = Sandbox::with_downloader(
        r#"echo "10%" >&2
exec sleep 30"#,
    );
    sandbox.config.stream_timeout = Duration::from_millis(500);

    let started = std::time::Instant::now();
    let events = run_to_end(&sandbox, video_params()).await;
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(events.first(), Some(&ProgressEvent::Line("10%".to_string())));
    assert!(matches!(&events[1], ProgressEvent::Failed(msg) if msg.contains("timed out")));
    assert_eq!(events.last(), Some(&ProgressEvent::Done));
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::FileReady { .. })));
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_downloader_children() {
    // The downloader's own child (think ffmpeg) would write a file later
    let mut sandbox = Sandbox::with_downloader(
        r#"echo "10%" >&2
sh -c 'sleep 2; : > "$1/late.mp4"' _ "$dir""#,
    );
    sandbox.config.stream_timeout = Duration::from_millis(500);

    let events = run_to_end(&sandbox, video_params()).await;
    assert_eq!(
        events,
        vec![
            ProgressEvent::Line("10%".to_string()),
            ProgressEvent::Failed("download timed out after 500ms".to_string()),
            ProgressEvent::Done,
        ]
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!sandbox.download_dir().join("late.mp4").exists());
}

#[tokio::test]
#[serial]
async fn test_cancel_kills_downloader_children() {
    let sandbox = Sandbox::with_downloader(
        r#"echo "started" >&2
sh -c 'sleep 1; : > "$1/late.mp4"' _ "$dir""#,
    );

    let relay = ProgressRelay::start(&sandbox.config, video_params()).await.unwrap();
    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(tx, cancel.clone()));

    assert_eq!(rx.recv().await, Some(ProgressEvent::Line("started".to_string())));
    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(RelayError::ClientGone)));

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(!sandbox.download_dir().join("late.mp4").exists());
}

#[tokio::test]
#[serial]
async fn test_partial_artifacts_are_not_announced() {
    let sandbox = Sandbox::with_downloader(
        r#": > "$dir/clip.mp4.part"
: > "$dir/clip.mp4""#,
    );

    let events = run_to_end(&sandbox, video_params()).await;

    assert_eq!(
        events,
        vec![
            ProgressEvent::FileReady {
                filename: "clip.mp4".to_string(),
                retrieval_path: "/files/clip.mp4".to_string(),
            },
            ProgressEvent::Done,
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_carriage_returns_split_lines() {
    let sandbox = Sandbox::with_downloader(r#"printf ' 1.0%%\r 2.0%%\r\n' >&2"#);

    let events = run_to_end(&sandbox, video_params()).await;

    assert_eq!(
        events,
        vec![
            ProgressEvent::Line(" 1.0%".to_string()),
            ProgressEvent::Line(" 2.0%".to_string()),
            ProgressEvent::Done,
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_cancel_kills_process_and_stops_emitting() {
    let sandbox = Sandbox::with_downloader(
        r#"echo "started" >&2
sleep 1
: > "$dir/late.mp4""#,
    );

    let relay = ProgressRelay::start(&sandbox.config, video_params()).await.unwrap();
    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(tx, cancel.clone()));

    assert_eq!(rx.recv().await, Some(ProgressEvent::Line("started".to_string())));
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(RelayError::ClientGone)));
    assert_eq!(rx.recv().await, None);

    // The script was killed before it could write its file
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!sandbox.download_dir().join("late.mp4").exists());
}

#[tokio::test]
#[serial]
async fn test_dropped_receiver_stops_relay() {
    let sandbox = Sandbox::with_downloader(
        r#"echo "first" >&2
exec sleep 30"#,
    );

    let relay = ProgressRelay::start(&sandbox.config, video_params()).await.unwrap();
    let (tx, rx) = mpsc::channel(32);
    drop(rx);

    let result = tokio::time::timeout(Duration::from_secs(5), relay.run(tx, CancellationToken::new()))
        .await
        .unwrap();
    assert!(matches!(result, Err(RelayError::ClientGone)));
}
