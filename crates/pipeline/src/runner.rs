//! Job orchestration.
//!
//! [`JobRunner`] runs one job end to end and always returns a
//! [`JobOutcome`]; stage errors never escape as panics or `Err`s.

use std::sync::Arc;

use genjob_comfyui::api::EngineApi;
use genjob_core::env::Environment;
use genjob_core::job::Job;
use genjob_core::result::{JobOutcome, JobResult};
use genjob_core::validation::parse_envelope;
use genjob_storage::StoreConnector;
use genjob_trigger::{TriggerError, TriggerFactory, TriggerHandler};

use crate::collector::collect_outputs;
use crate::config::PipelineConfig;
use crate::error::{AssetBatch, JobError};
use crate::poller::{wait_for_engine, CompletionPoller};
use crate::publisher::ResultPublisher;
use crate::retry::{Sleeper, TokioSleeper};
use crate::submitter::submit_workflow;
use crate::uploader::{upload_file_urls, upload_images};

/// Runs jobs against one engine.
///
/// Holds only immutable configuration and shared clients, so a single
/// runner can serve concurrent jobs.
pub struct JobRunner {
    engine: Arc<dyn EngineApi>,
    stores: Arc<dyn StoreConnector>,
    triggers: Arc<dyn TriggerFactory>,
    sleeper: Arc<dyn Sleeper>,
    env: Environment,
    config: PipelineConfig,
}

impl JobRunner {
    pub fn new(
        engine: Arc<dyn EngineApi>,
        stores: Arc<dyn StoreConnector>,
        triggers: Arc<dyn TriggerFactory>,
        env: Environment,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            stores,
            triggers,
            sleeper: Arc::new(TokioSleeper),
            env,
            config,
        }
    }

    /// Replace the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate a host envelope `{id, input}` and run it.
    pub async fn run_envelope(&self, envelope: &serde_json::Value) -> JobOutcome {
        match parse_envelope(envelope) {
            Ok(job) => self.run(&job).await,
            Err(e) => {
                tracing::error!(error = %e, "Rejected job input");
                self.fail(JobError::Validation(e))
            }
        }
    }

    /// Run a validated job.
    #[tracing::instrument(skip_all, fields(job_id = %job.id))]
    pub async fn run(&self, job: &Job) -> JobOutcome {
        let trigger = match self.prepare_trigger(job) {
            Ok(trigger) => trigger,
            Err(e) => return self.fail(e),
        };

        match self.execute(job).await {
            Ok(outputs) => {
                tracing::info!(count = outputs.len(), "Job completed");
                if let Some(handler) = trigger {
                    dispatch_trigger(handler.as_ref(), &outputs).await;
                }
                JobOutcome::Completed(JobResult::success(outputs, self.config.refresh_worker))
            }
            Err(e) => self.fail(e),
        }
    }

    /// Build and validate the job's trigger handler, if any.
    fn prepare_trigger(&self, job: &Job) -> Result<Option<Box<dyn TriggerHandler>>, JobError> {
        let Some(config) = &job.trigger else {
            return Ok(None);
        };

        let handler = self.triggers.create(config).map_err(|e| match e {
            TriggerError::Unsupported(service) => JobError::UnsupportedTrigger(service),
            other => JobError::TriggerValidation(other.to_string()),
        })?;
        handler
            .validate()
            .map_err(|e| JobError::TriggerValidation(e.to_string()))?;

        tracing::debug!(service = config.service(), "Trigger handler ready");
        Ok(Some(handler))
    }

    async fn execute(&self, job: &Job) -> Result<Vec<String>, JobError> {
        let engine = self.engine.as_ref();
        let sleeper = self.sleeper.as_ref();

        wait_for_engine(engine, sleeper, &self.config.availability).await?;

        let report = upload_images(engine, &job.images).await;
        if report.is_error() {
            return Err(JobError::Upload {
                batch: AssetBatch::Images,
                report,
            });
        }

        let report = upload_file_urls(engine, &job.file_urls).await;
        if report.is_error() {
            return Err(JobError::Upload {
                batch: AssetBatch::Files,
                report,
            });
        }

        let prompt_id = submit_workflow(engine, &job.workflow).await?;

        let outputs = CompletionPoller::new(
            engine,
            sleeper,
            self.config.completion,
            self.config.poll_counting,
        )
        .wait_for_outputs(&prompt_id)
        .await?;

        let paths = collect_outputs(&outputs, &self.config.output_root)?;

        ResultPublisher::new(
            self.stores.as_ref(),
            &self.env,
            self.config.global_bucket.as_ref(),
        )
        .publish(&job.id, &paths, job.output.as_ref())
        .await
    }

    fn fail(&self, err: JobError) -> JobOutcome {
        tracing::error!(error = %err, class = ?err.class(), "Job failed");
        err.into_outcome(self.config.refresh_worker)
    }
}

/// Notify the job's downstream service. Failures are logged only: the
/// outputs are already published.
async fn dispatch_trigger(handler: &dyn TriggerHandler, outputs: &[String]) {
    let payload = match serde_json::to_string(outputs) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize trigger payload");
            return;
        }
    };

    match handler.handle(&payload).await {
        Ok(response) => tracing::info!(response = %response, "Trigger dispatched"),
        Err(e) => tracing::error!(error = %e, "Trigger dispatch failed"),
    }
}
