//! Integration tests for the individual pipeline stages against the fakes
//! in `common`.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use common::{
    image_outputs, CountingSleeper, FakeEngine, HistoryStep, RecordingConnector, PROMPT_ID,
};
use genjob_core::env::Environment;
use genjob_core::job::{FileUrlInput, ImageInput, OutputConfig, OutputMode};
use genjob_pipeline::poller::{wait_for_engine, CompletionPoller};
use genjob_pipeline::publisher::ResultPublisher;
use genjob_pipeline::submitter::submit_workflow;
use genjob_pipeline::uploader::{upload_file_urls, upload_images, UploadStatus};
use genjob_pipeline::{JobError, PollCounting, RetryPolicy};
use genjob_storage::{StorageCredentials, StorageTarget, UrlStyle, DEFAULT_PRESIGN_EXPIRY};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), max_attempts)
}

fn image(name: &str, data: &str) -> ImageInput {
    ImageInput {
        name: name.into(),
        image: data.into(),
    }
}

fn s3_output(prefix: &str) -> OutputConfig {
    OutputConfig {
        mode: OutputMode::ObjectStorage,
        bucket: "renders".into(),
        endpoint_url: "https://s3.example.com/".into(),
        key_prefix: prefix.into(),
    }
}

// ---------------------------------------------------------------------------
// AssetUploader
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_invalid_image_fails_the_batch_but_uploads_the_rest() {
    let engine = FakeEngine::new();
    let images = [image("good.png", "aGVsbG8="), image("bad.png", "%%% not base64 %%%")];

    let report = upload_images(&engine, &images).await;

    assert_eq!(report.status, UploadStatus::Error);
    assert_eq!(report.success_messages, ["Successfully uploaded good.png"]);
    assert_eq!(report.error_messages.len(), 1);
    assert!(report.error_messages[0].starts_with("Error decoding bad.png"));
    assert_eq!(engine.uploaded_names(), ["good.png"]);
}

#[tokio::test]
async fn engine_rejection_is_reported_per_image() {
    let engine = FakeEngine::new().with_failing_upload("b.png");
    let images = [image("a.png", "aGVsbG8="), image("b.png", "aGVsbG8=")];

    let report = upload_images(&engine, &images).await;

    assert!(report.is_error());
    assert_eq!(report.success_messages.len(), 1);
    assert!(report.error_messages[0].contains("disk full"));
}

#[tokio::test]
async fn empty_batches_succeed_without_messages() {
    let engine = FakeEngine::new();

    let images = upload_images(&engine, &[]).await;
    let files = upload_file_urls(&engine, &[]).await;

    for report in [images, files] {
        assert_eq!(report.status, UploadStatus::Success);
        assert!(report.success_messages.is_empty());
        assert!(report.error_messages.is_empty());
    }
}

#[tokio::test]
async fn file_urls_continue_after_a_failure() {
    let engine = FakeEngine::new().with_failing_upload("a.safetensors");
    let files = [
        FileUrlInput {
            name: "a.safetensors".into(),
            url: "https://files.example.com/a".into(),
        },
        FileUrlInput {
            name: "b.mp4".into(),
            url: "https://files.example.com/b".into(),
        },
    ];

    let report = upload_file_urls(&engine, &files).await;

    assert!(report.is_error());
    assert_eq!(report.success_messages, ["Successfully uploaded b.mp4"]);
    assert_eq!(engine.fetched.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// WorkflowSubmitter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_prompt_id_and_forwards_graph() {
    let engine = FakeEngine::new();
    let workflow = json!({ "3": { "class_type": "KSampler" } });

    let prompt_id = submit_workflow(&engine, workflow.as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(prompt_id, PROMPT_ID);
    assert_eq!(*engine.submitted.lock().unwrap(), vec![workflow]);
}

#[tokio::test]
async fn node_errors_fail_submission() {
    let engine = FakeEngine::new().with_node_errors(json!({ "4": { "errors": ["bad ckpt"] } }));
    let workflow = json!({ "4": {} });

    let err = submit_workflow(&engine, workflow.as_object().unwrap())
        .await
        .unwrap_err();

    assert_matches!(err, JobError::NodeErrors(ref v) if v["4"]["errors"][0] == "bad ckpt");
}

#[tokio::test]
async fn rejected_workflow_returns_node_errors_as_data() {
    let engine = FakeEngine::new()
        .rejecting_workflow(json!({ "4": { "class_type": "CheckpointLoaderSimple" } }));
    let workflow = json!({ "4": {} });

    let err = submit_workflow(&engine, workflow.as_object().unwrap())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        JobError::NodeErrors(ref v) if v["4"]["class_type"] == "CheckpointLoaderSimple"
    );
}

// ---------------------------------------------------------------------------
// Availability probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_probe_succeeds_once_reachable() {
    let engine = FakeEngine::new().with_failing_pings(2);
    let sleeper = CountingSleeper::default();

    wait_for_engine(&engine, &sleeper, &policy(5)).await.unwrap();

    assert_eq!(engine.pings(), 3);
    assert_eq!(sleeper.sleeps(), 2);
}

#[tokio::test]
async fn engine_probe_exhaustion_is_an_error() {
    let engine = FakeEngine::new().with_failing_pings(u32::MAX);
    let sleeper = CountingSleeper::default();

    let err = wait_for_engine(&engine, &sleeper, &policy(4)).await.unwrap_err();

    assert_matches!(err, JobError::EngineUnavailable { attempts: 4 });
    assert_eq!(engine.pings(), 4);
}

// ---------------------------------------------------------------------------
// CompletionPoller
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outputs_found_after_n_absent_probes() {
    let engine = FakeEngine::new().with_history([
        HistoryStep::Absent,
        HistoryStep::Absent,
        HistoryStep::Absent,
        HistoryStep::Done(image_outputs(&["a.png"])),
    ]);
    let sleeper = CountingSleeper::default();

    let outputs = CompletionPoller::new(&engine, &sleeper, policy(10), PollCounting::EveryProbe)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap();

    assert!(outputs.contains_key("9"));
    assert_eq!(engine.history_probes(), 4);
    assert_eq!(sleeper.sleeps(), 3);
}

#[tokio::test]
async fn never_found_times_out() {
    let engine = FakeEngine::new();
    let sleeper = CountingSleeper::default();

    let err = CompletionPoller::new(&engine, &sleeper, policy(5), PollCounting::EveryProbe)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap_err();

    assert_matches!(err, JobError::PollTimeout { attempts: 5 });
    assert_eq!(engine.history_probes(), 5);
}

#[tokio::test]
async fn pending_records_count_against_the_budget_by_default() {
    let engine = FakeEngine::new().with_history(std::iter::repeat(HistoryStep::Pending).take(10));
    let sleeper = CountingSleeper::default();

    let err = CompletionPoller::new(&engine, &sleeper, policy(3), PollCounting::EveryProbe)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap_err();

    assert_matches!(err, JobError::PollTimeout { attempts: 3 });
    assert_eq!(engine.history_probes(), 3);
}

#[tokio::test]
async fn absent_only_counting_keeps_polling_pending_records() {
    let mut steps = vec![HistoryStep::Absent];
    steps.extend(std::iter::repeat(HistoryStep::Pending).take(6));
    steps.push(HistoryStep::Done(image_outputs(&["a.png"])));
    let engine = FakeEngine::new().with_history(steps);
    let sleeper = CountingSleeper::default();

    let outputs = CompletionPoller::new(&engine, &sleeper, policy(3), PollCounting::AbsentOnly)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap();

    assert!(!outputs.is_empty());
    assert_eq!(engine.history_probes(), 8);
    assert_eq!(sleeper.sleeps(), 7);
}

#[tokio::test]
async fn engine_error_status_is_terminal() {
    let engine = FakeEngine::new().with_history([
        HistoryStep::Pending,
        HistoryStep::Failed(json!(["execution_error", { "node_id": "3" }])),
    ]);
    let sleeper = CountingSleeper::default();

    let err = CompletionPoller::new(&engine, &sleeper, policy(10), PollCounting::EveryProbe)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap_err();

    assert_matches!(err, JobError::Generation(ref status) if status["status_str"] == "error");
    assert_eq!(engine.history_probes(), 2);
}

#[tokio::test]
async fn transport_error_while_polling_is_terminal() {
    let engine = FakeEngine::new().with_history([HistoryStep::Absent, HistoryStep::Transport]);
    let sleeper = CountingSleeper::default();

    let err = CompletionPoller::new(&engine, &sleeper, policy(10), PollCounting::EveryProbe)
        .wait_for_outputs(PROMPT_ID)
        .await
        .unwrap_err();

    assert_matches!(err, JobError::PollTransport(_));
    assert_eq!(engine.history_probes(), 2);
}

// ---------------------------------------------------------------------------
// ResultPublisher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn object_storage_without_credentials_is_reported_as_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    std::fs::write(&path, b"png").unwrap();

    let connector = RecordingConnector::new();
    let env = Environment::from_pairs([("ACME_AWS_ACCESS_KEY_ID", "AKIA")]);
    let publisher = ResultPublisher::new(&connector, &env, None);

    let err = publisher
        .publish("job-1", &[path], Some(&s3_output("ACME_")))
        .await
        .unwrap_err();

    assert_matches!(
        err,
        JobError::CredentialsMissing { ref keys } if keys == &["ACME_AWS_SECRET_ACCESS_KEY".to_string()]
    );
    assert!(connector.uploaded_keys().is_empty());
}

#[tokio::test]
async fn object_storage_skips_missing_files_and_uses_prefix_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("a.png");
    std::fs::write(&present, b"png").unwrap();
    let missing = dir.path().join("gone.png");

    let connector = RecordingConnector::new();
    let env = Environment::from_pairs([
        ("ACME_AWS_ACCESS_KEY_ID", "AKIA-ACME"),
        ("ACME_AWS_SECRET_ACCESS_KEY", "secret"),
        ("ACME_AWS_REGION", "eu-west-1"),
        ("AWS_ACCESS_KEY_ID", "AKIA-DEFAULT"),
    ]);
    let publisher = ResultPublisher::new(&connector, &env, None);

    let urls = publisher
        .publish("job-1", &[present, missing], Some(&s3_output("ACME_")))
        .await
        .unwrap();

    assert_eq!(urls, ["https://s3.example.com/renders/job-1/a.png"]);
    let uploads = connector.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].access_key_id, "AKIA-ACME");
    assert_eq!(uploads[0].region.as_deref(), Some("eu-west-1"));
}

#[tokio::test]
async fn object_storage_fails_fast_on_first_upload_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<_> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, b"png").unwrap();
            path
        })
        .collect();

    let connector = RecordingConnector::failing_after(1);
    let env = Environment::from_pairs([
        ("P_AWS_ACCESS_KEY_ID", "AKIA"),
        ("P_AWS_SECRET_ACCESS_KEY", "secret"),
    ]);
    let publisher = ResultPublisher::new(&connector, &env, None);

    let err = publisher
        .publish("job-1", &paths, Some(&s3_output("P_")))
        .await
        .unwrap_err();

    assert_matches!(err, JobError::StorageUpload(ref m) if m.contains("job-1/b.png"));
    assert_eq!(connector.uploaded_keys(), ["job-1/a.png"]);
}

#[tokio::test]
async fn embedded_mode_returns_base64_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.png");
    let second = dir.path().join("a.txt");
    std::fs::write(&first, b"hello").unwrap();
    std::fs::write(&second, b"caption").unwrap();

    let connector = RecordingConnector::new();
    let env = Environment::default();
    let publisher = ResultPublisher::new(&connector, &env, None);

    let published = publisher.publish("job-1", &[first, second], None).await.unwrap();

    assert_eq!(published, ["aGVsbG8=", "Y2FwdGlvbg=="]);
    assert!(connector.uploaded_keys().is_empty());
}

#[tokio::test]
async fn embedded_mode_missing_file_is_a_collection_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("a.png");

    let connector = RecordingConnector::new();
    let env = Environment::default();
    let publisher = ResultPublisher::new(&connector, &env, None);

    let err = publisher.publish("job-1", &[missing], None).await.unwrap_err();

    assert_matches!(
        err,
        JobError::Collection(ref m) if m.starts_with("the image does not exist in the specified output folder")
    );
}

#[tokio::test]
async fn embedded_mode_uses_global_bucket_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    std::fs::write(&path, b"png").unwrap();

    let global = StorageTarget {
        endpoint_url: "https://bucket.example.com".into(),
        bucket: "10-26".into(),
        region: None,
        credentials: StorageCredentials {
            access_key_id: "GLOBAL".into(),
            secret_access_key: "secret".into(),
        },
        url_style: UrlStyle::Presigned {
            expires_in: DEFAULT_PRESIGN_EXPIRY,
        },
    };
    let connector = RecordingConnector::new();
    let env = Environment::default();
    let publisher = ResultPublisher::new(&connector, &env, Some(&global));

    let published = publisher.publish("job-7", &[path], None).await.unwrap();

    assert_eq!(
        published,
        ["https://bucket.example.com/10-26/job-7/a.png?X-Amz-Signature=fake"]
    );
    assert_eq!(connector.uploads.lock().unwrap()[0].access_key_id, "GLOBAL");
}
