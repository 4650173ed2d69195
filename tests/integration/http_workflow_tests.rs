/*!
 * Integration tests running the engine against a stub synthesis REST API
 */

use anyhow::Result;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use narrasync::engine::SegmentSyncEngine;
use narrasync::errors::SyncError;
use narrasync::providers::http::HttpSynthesisProvider;
use narrasync::providers::JobKind;
use crate::common;

const MARKS: &str = "{\"time\":0,\"type\":\"sentence\",\"start\":7,\"end\":44,\"value\":\"Hello world.\"}\n\
                     {\"time\":0,\"type\":\"ssml\",\"start\":7,\"end\":33,\"value\":\"segment_0\"}\n\
                     {\"time\":6,\"type\":\"word\",\"start\":33,\"end\":38,\"value\":\"Hello\"}\n\
                     {\"time\":420,\"type\":\"word\",\"start\":39,\"end\":44,\"value\":\"world\"}\n\
                     {\"time\":1200,\"type\":\"ssml\",\"start\":45,\"end\":71,\"value\":\"segment_1\"}\n\
                     {\"time\":1800,\"type\":\"word\",\"start\":71,\"end\":74,\"value\":\"Bye\"}\n";

fn task(id: &str, status: &str) -> serde_json::Value {
    json!({ "SynthesisTask": { "TaskId": id, "TaskStatus": status } })
}

fn completed_task(id: &str, output_uri: String) -> serde_json::Value {
    json!({ "SynthesisTask": { "TaskId": id, "TaskStatus": "completed", "OutputUri": output_uri } })
}

async fn mount_submissions(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/synthesisTasks"))
        .and(body_partial_json(json!({ "OutputFormat": "mp3" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("audio-task", "scheduled")))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/synthesisTasks"))
        .and(body_partial_json(json!({ "OutputFormat": "json", "SpeechMarkTypes": ["ssml", "word"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("marks-task", "scheduled")))
        .expect(1)
        .mount(server)
        .await;
}

fn engine_for(server: &MockServer, dir: &std::path::Path) -> SegmentSyncEngine {
    let provider = HttpSynthesisProvider::new(server.uri(), "", "narration-bucket", Duration::from_secs(5))
        .expect("client should build");
    SegmentSyncEngine::new(Arc::new(provider), common::fast_engine_config(dir))
}

/// Both tasks are started, polled to completion and their outputs downloaded
#[tokio::test]
async fn test_synchronize_withHttpProvider_shouldWriteTimedSubtitles() -> Result<()> {
    common::init_logger();
    let temp_dir = common::create_temp_dir()?;
    let server = MockServer::start().await;
    mount_submissions(&server).await;

    // The marks task reports progress once before completing
    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/marks-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("marks-task", "inProgress")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/marks-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_task(
            "marks-task",
            format!("{}/outputs/marks-task.marks", server.uri()),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/audio-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completed_task(
            "audio-task",
            format!("{}/outputs/audio-task.mp3", server.uri()),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/outputs/marks-task.marks"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MARKS))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/outputs/audio-task.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 narration".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let output = engine_for(&server, temp_dir.path())
        .synchronize("Hello world. Bye.", "http demo", &CancellationToken::new())
        .await?;

    assert_eq!(output.audio_path, temp_dir.path().join("audio").join("http_demo.mp3"));
    assert_eq!(fs::read(&output.audio_path)?, b"ID3 narration");
    assert_eq!(
        fs::read_to_string(&output.subtitle_path)?,
        "1\n00:00:00,000 --> 00:00:01,200\nHello world.\n\n2\n00:00:01,200 --> 00:00:02,800\nBye.\n\n"
    );
    Ok(())
}

/// A failed marks task fails the attempt with the provider's reason
#[tokio::test]
async fn test_synchronize_withFailedHttpTask_shouldWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let server = MockServer::start().await;
    mount_submissions(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/audio-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("audio-task", "inProgress")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/marks-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SynthesisTask": {
                "TaskId": "marks-task",
                "TaskStatus": "failed",
                "TaskStatusReason": "Voice not available"
            }
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server, temp_dir.path());
    let result = engine
        .synchronize("Hello world. Bye.", "failing", &CancellationToken::new())
        .await;

    match result {
        Err(SyncError::SynthesisFailed { kind, reason }) => {
            assert_eq!(kind, JobKind::Marks);
            assert_eq!(reason, "Voice not available");
        }
        other => panic!("expected SynthesisFailed, got {:?}", other),
    }
    assert!(!engine.config().audio_path("failing").exists());
    assert!(!engine.config().subtitle_path("failing").exists());
    Ok(())
}

/// A service that keeps answering 503 exhausts the retry budget
#[tokio::test]
async fn test_synchronize_withPersistentOutage_shouldFailUnavailable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let server = MockServer::start().await;
    mount_submissions(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/audio-task"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/synthesisTasks/marks-task"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("marks-task", "inProgress")))
        .mount(&server)
        .await;

    let result = engine_for(&server, temp_dir.path())
        .synchronize("Hello world. Bye.", "outage", &CancellationToken::new())
        .await;

    match result {
        Err(SyncError::SynthesisUnavailable { kind, attempts, last_error }) => {
            assert_eq!(kind, JobKind::Audio);
            assert_eq!(attempts, 4);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected SynthesisUnavailable, got {:?}", other),
    }
    Ok(())
}
