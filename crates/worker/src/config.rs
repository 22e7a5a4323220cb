use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use genjob_core::env::Environment;
use genjob_pipeline::config::{
    DEFAULT_AVAILABILITY_INTERVAL, DEFAULT_AVAILABILITY_MAX_ATTEMPTS, DEFAULT_OUTPUT_ROOT,
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS,
};
use genjob_pipeline::{PipelineConfig, PollCounting, RetryPolicy};
use genjob_storage::{StorageCredentials, StorageTarget, UrlStyle, DEFAULT_PRESIGN_EXPIRY};

/// Engine address used when `COMFY_HOST` is unset.
pub const DEFAULT_COMFY_HOST: &str = "127.0.0.1:8188";
/// Idle read timeout used when `COMFY_HTTP_TIMEOUT_SECS` is unset.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;
/// TCP connect timeout used when `COMFY_CONNECT_TIMEOUT_SECS` is unset.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// `strftime` pattern of the default global bucket name.
pub const DEFAULT_BUCKET_NAME_FORMAT: &str = "%m-%y";

/// A configuration variable that is present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be set when {required_by} is set")]
    Missing {
        var: &'static str,
        required_by: &'static str,
    },
}

/// Log line format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` falls back to text.
    pub fn from_env(env: &Environment) -> Self {
        match env.get("LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Engine `host:port` or base URL.
    pub comfy_host: String,
    /// Longest gap between reads of a response. Bodies as a whole are
    /// unbounded so long streamed uploads can finish.
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load configuration from `env` with defaults.
    ///
    /// | Env Var                            | Default            |
    /// |------------------------------------|--------------------|
    /// | `COMFY_HOST`                       | `127.0.0.1:8188`   |
    /// | `COMFY_API_AVAILABLE_INTERVAL_MS`  | `50`               |
    /// | `COMFY_API_AVAILABLE_MAX_RETRIES`  | `500`              |
    /// | `COMFY_POLLING_INTERVAL_MS`        | `250`              |
    /// | `COMFY_POLLING_MAX_RETRIES`        | `5000`             |
    /// | `COMFY_POLLING_COUNT_PENDING`      | `true`             |
    /// | `COMFY_OUTPUT_PATH`                | `/comfyui/output`  |
    /// | `COMFY_HTTP_TIMEOUT_SECS`          | `300`              |
    /// | `COMFY_CONNECT_TIMEOUT_SECS`       | `10`               |
    /// | `REFRESH_WORKER`                   | `false`            |
    /// | `BUCKET_ENDPOINT_URL`              | unset              |
    /// | `BUCKET_NAME`                      | current `%m-%y`    |
    /// | `BUCKET_REGION`                    | `us-east-1`        |
    pub fn from_env(env: &Environment) -> Result<Self, ConfigError> {
        Self::from_env_at(env, Utc::now())
    }

    /// Like [`from_env`](Self::from_env) with an explicit clock for the
    /// default bucket name.
    pub fn from_env_at(env: &Environment, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let comfy_host = env
            .get("COMFY_HOST")
            .unwrap_or(DEFAULT_COMFY_HOST)
            .to_string();

        let availability = RetryPolicy::new(
            parse_millis(
                env,
                "COMFY_API_AVAILABLE_INTERVAL_MS",
                DEFAULT_AVAILABILITY_INTERVAL,
            )?,
            parse_var(
                env,
                "COMFY_API_AVAILABLE_MAX_RETRIES",
                DEFAULT_AVAILABILITY_MAX_ATTEMPTS,
            )?,
        );
        let completion = RetryPolicy::new(
            parse_millis(env, "COMFY_POLLING_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?,
            parse_var(env, "COMFY_POLLING_MAX_RETRIES", DEFAULT_POLL_MAX_ATTEMPTS)?,
        );

        let poll_counting = if parse_bool(env, "COMFY_POLLING_COUNT_PENDING", true)? {
            PollCounting::EveryProbe
        } else {
            PollCounting::AbsentOnly
        };

        let output_root = PathBuf::from(env.get("COMFY_OUTPUT_PATH").unwrap_or(DEFAULT_OUTPUT_ROOT));
        let http_timeout = Duration::from_secs(parse_var(
            env,
            "COMFY_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let connect_timeout = Duration::from_secs(parse_var(
            env,
            "COMFY_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?);

        Ok(Self {
            comfy_host,
            http_timeout,
            connect_timeout,
            pipeline: PipelineConfig {
                availability,
                completion,
                poll_counting,
                output_root,
                refresh_worker: parse_bool(env, "REFRESH_WORKER", false)?,
                global_bucket: global_bucket(env, now)?,
            },
        })
    }
}

/// The global bucket is enabled by `BUCKET_ENDPOINT_URL`.
fn global_bucket(
    env: &Environment,
    now: DateTime<Utc>,
) -> Result<Option<StorageTarget>, ConfigError> {
    const ENDPOINT_VAR: &str = "BUCKET_ENDPOINT_URL";

    let Some(endpoint_url) = env.get(ENDPOINT_VAR) else {
        return Ok(None);
    };

    let require = |var: &'static str| {
        env.get(var).map(str::to_owned).ok_or(ConfigError::Missing {
            var,
            required_by: ENDPOINT_VAR,
        })
    };

    let bucket = env
        .get("BUCKET_NAME")
        .map(str::to_owned)
        .unwrap_or_else(|| now.format(DEFAULT_BUCKET_NAME_FORMAT).to_string());

    Ok(Some(StorageTarget {
        endpoint_url: endpoint_url.to_string(),
        bucket,
        region: env.get("BUCKET_REGION").map(str::to_owned),
        credentials: StorageCredentials {
            access_key_id: require("BUCKET_ACCESS_KEY_ID")?,
            secret_access_key: require("BUCKET_SECRET_ACCESS_KEY")?,
        },
        url_style: UrlStyle::Presigned {
            expires_in: DEFAULT_PRESIGN_EXPIRY,
        },
    }))
}

fn parse_var<T>(env: &Environment, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_millis(
    env: &Environment,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match env.get(var) {
        None => Ok(default),
        Some(_) => parse_var(env, var, 0u64).map(Duration::from_millis),
    }
}

fn parse_bool(env: &Environment, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = env.get(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}
