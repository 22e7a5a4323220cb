//! Post-completion triggers.
//!
//! A job may ask for a downstream service to be notified once its outputs
//! are published. Each [`TriggerConfig`] variant maps to one
//! [`TriggerHandler`] implementation; [`ServiceTriggerFactory`] performs
//! that lookup. Handlers validate their credentials right after
//! construction so an unusable trigger fails the job before any engine
//! work starts.

use async_trait::async_trait;
use genjob_core::env::Environment;
use genjob_core::job::TriggerConfig;

pub mod supabase;

use supabase::SupabaseTriggerHandler;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from trigger construction, validation and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// No handler exists for the declared `service` tag.
    #[error("Unsupported service: {0}")]
    Unsupported(String),

    /// A required credential is missing from the environment.
    #[error("{0} not set in environment")]
    MissingCredential(String),

    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The downstream service returned a non-2xx status code.
    #[error("Trigger service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Capability implemented by every trigger variant.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Check that everything `handle` needs is configured.
    fn validate(&self) -> Result<(), TriggerError>;

    /// Notify the downstream service with the serialized output list.
    /// The returned string is informational only.
    async fn handle(&self, output: &str) -> Result<String, TriggerError>;
}

/// Selects the handler for a trigger configuration.
pub trait TriggerFactory: Send + Sync {
    fn create(&self, config: &TriggerConfig) -> Result<Box<dyn TriggerHandler>, TriggerError>;
}

/// Default factory: resolves credentials from the injected environment.
pub struct ServiceTriggerFactory {
    env: Environment,
    client: reqwest::Client,
}

impl ServiceTriggerFactory {
    pub fn new(env: Environment, client: reqwest::Client) -> Self {
        Self { env, client }
    }
}

impl TriggerFactory for ServiceTriggerFactory {
    fn create(&self, config: &TriggerConfig) -> Result<Box<dyn TriggerHandler>, TriggerError> {
        match config {
            TriggerConfig::Supabase(trigger) => Ok(Box::new(SupabaseTriggerHandler::new(
                trigger.clone(),
                &self.env,
                self.client.clone(),
            ))),
            TriggerConfig::Unsupported { service } => {
                Err(TriggerError::Unsupported(service.clone()))
            }
        }
    }
}
