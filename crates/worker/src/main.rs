//! `genjob-worker` -- runs one ComfyUI job.
//!
//! Reads a `{id, input}` job envelope from the file given as the first
//! argument (or stdin), drives it through the pipeline and prints the
//! outcome JSON to stdout. Logs go to stderr.
//!
//! See [`genjob_worker::config::WorkerConfig::from_env`] for the
//! environment variables. `RUST_LOG` controls the log filter and
//! `LOG_FORMAT=json` switches to JSON log lines.

use std::sync::Arc;

use genjob_comfyui::api::ComfyUIApi;
use genjob_core::env::Environment;
use genjob_pipeline::JobRunner;
use genjob_storage::s3::S3Connector;
use genjob_trigger::ServiceTriggerFactory;
use genjob_worker::config::{LogFormat, WorkerConfig};
use genjob_worker::input::{read_envelope, EnvelopeSource};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "genjob_worker=info,genjob_pipeline=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env = Environment::from_process();
    init_tracing(LogFormat::from_env(&env));

    let config = WorkerConfig::from_env(&env).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid worker configuration");
        std::process::exit(1);
    });

    // No total deadline; streamed uploads are bounded only by read gaps.
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.http_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        });

    let engine = ComfyUIApi::from_host(client.clone(), &config.comfy_host);

    tracing::info!(
        api_url = %engine.api_url(),
        output_root = %config.pipeline.output_root.display(),
        poll_counting = ?config.pipeline.poll_counting,
        global_bucket = config.pipeline.global_bucket.is_some(),
        "Starting genjob-worker",
    );

    let runner = JobRunner::new(
        Arc::new(engine),
        Arc::new(S3Connector),
        Arc::new(ServiceTriggerFactory::new(env.clone(), client)),
        env,
        config.pipeline,
    );

    let arg = std::env::args().nth(1);
    let source = EnvelopeSource::from_arg(arg.as_deref());
    let envelope = read_envelope(&source).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to read job envelope");
        std::process::exit(1);
    });

    let outcome = runner.run_envelope(&envelope).await;

    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize job outcome");
            std::process::exit(1);
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
