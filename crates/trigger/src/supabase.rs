//! Supabase row-update trigger.
//!
//! Writes the published output list (and optionally a status value) into
//! one row of a Supabase table through the PostgREST endpoint.

use async_trait::async_trait;
use genjob_core::env::{prefixed_key, Environment};
use genjob_core::job::SupabaseTrigger;

use crate::{TriggerError, TriggerHandler};

/// Suffix of the project URL variable: `{key_prefix}SUPABASE_URL`.
pub const URL_VAR: &str = "SUPABASE_URL";

/// Suffix of the service key variable: `{key_prefix}SUPABASE_KEY`.
pub const KEY_VAR: &str = "SUPABASE_KEY";

/// Handler for [`SupabaseTrigger`].
///
/// Credentials are resolved from the environment snapshot at construction
/// time; [`validate`](TriggerHandler::validate) reports whichever is
/// missing.
pub struct SupabaseTriggerHandler {
    trigger: SupabaseTrigger,
    url: Option<String>,
    key: Option<String>,
    client: reqwest::Client,
}

impl SupabaseTriggerHandler {
    pub fn new(trigger: SupabaseTrigger, env: &Environment, client: reqwest::Client) -> Self {
        let url = env
            .get_prefixed(&trigger.key_prefix, URL_VAR)
            .map(|u| u.trim_end_matches('/').to_string());
        let key = env.get_prefixed(&trigger.key_prefix, KEY_VAR).map(str::to_string);
        Self {
            trigger,
            url,
            key,
            client,
        }
    }

    /// Row patch: the output column, plus the status column when both the
    /// field name and value are configured.
    pub fn update_body(&self, output: &str) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        data.insert(
            self.trigger.output_field.clone(),
            serde_json::Value::String(output.to_string()),
        );
        if let (Some(field), Some(status)) = (&self.trigger.status_field, &self.trigger.status) {
            data.insert(field.clone(), serde_json::Value::String(status.clone()));
        }
        serde_json::Value::Object(data)
    }

    fn credentials(&self) -> Result<(&str, &str), TriggerError> {
        let url = self.url.as_deref().ok_or_else(|| {
            TriggerError::MissingCredential(prefixed_key(&self.trigger.key_prefix, URL_VAR))
        })?;
        let key = self.key.as_deref().ok_or_else(|| {
            TriggerError::MissingCredential(prefixed_key(&self.trigger.key_prefix, KEY_VAR))
        })?;
        Ok((url, key))
    }
}

#[async_trait]
impl TriggerHandler for SupabaseTriggerHandler {
    fn validate(&self) -> Result<(), TriggerError> {
        self.credentials().map(|_| ())
    }

    async fn handle(&self, output: &str) -> Result<String, TriggerError> {
        let (url, key) = self.credentials()?;
        let body = self.update_body(output);
        let filter = format!("eq.{}", self.trigger.id);

        tracing::info!(
            table = %self.trigger.table,
            id_field = %self.trigger.id_field,
            id = %self.trigger.id,
            "Updating Supabase row",
        );

        let response = self
            .client
            .patch(format!("{url}/rest/v1/{}", self.trigger.table))
            .query(&[(self.trigger.id_field.as_str(), filter.as_str())])
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "Failed to update Supabase");
            return Err(TriggerError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}
