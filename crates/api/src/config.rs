use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use headshot_bridge::bfl::DEFAULT_BFL_BASE_URL;
use headshot_bridge::fal::{DEFAULT_FAL_QUEUE_URL, LORA_GENERATION_MODEL, LORA_TRAINING_MODEL};
use headshot_bridge::upload::DEFAULT_UPLOAD_URL;
use headshot_core::polling::{PollBudget, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS};

/// Errors raised while reading configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("REQUEST_TIMEOUT_SECS ({timeout_secs}s) must exceed the {budget} wait ceiling ({ceiling:?})")]
    TimeoutTooShort {
        timeout_secs: u64,
        budget: &'static str,
        ceiling: Duration,
    },
}

/// Server configuration loaded from environment variables.
///
/// Everything except the provider API keys has a default suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8051`).
    pub port: u16,
    /// Allowed CORS origins; `*` mirrors any origin.
    pub cors_origins: Vec<String>,
    /// Whole-request timeout in seconds. Must cover the longest training run.
    pub request_timeout_secs: u64,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Parent directory for per-request staging directories.
    pub staging_dir: PathBuf,
    pub providers: ProviderConfig,
}

/// Credentials, endpoints and wait budgets for the external providers.
#[derive(Clone)]
pub struct ProviderConfig {
    pub bfl_api_key: String,
    pub bfl_base_url: String,
    pub fal_key: String,
    pub fal_queue_url: String,
    pub fal_lora_model: String,
    pub fal_training_model: String,
    pub upload_url: String,
    /// Budget for polling BFL jobs.
    pub poll: PollBudget,
    /// Budget for fal subscribe cycles (training takes minutes).
    pub subscribe: PollBudget,
}

// Keys stay out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("bfl_api_key", &"<redacted>")
            .field("bfl_base_url", &self.bfl_base_url)
            .field("fal_key", &"<redacted>")
            .field("fal_queue_url", &self.fal_queue_url)
            .field("fal_lora_model", &self.fal_lora_model)
            .field("fal_training_model", &self.fal_training_model)
            .field("upload_url", &self.upload_url)
            .field("poll", &self.poll)
            .field("subscribe", &self.subscribe)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                                |
    /// |--------------------------|----------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                              |
    /// | `PORT`                   | `8051`                                 |
    /// | `CORS_ORIGINS`           | `*`                                    |
    /// | `REQUEST_TIMEOUT_SECS`   | `3600`                                 |
    /// | `MAX_UPLOAD_BYTES`       | `104857600`                            |
    /// | `STAGING_DIR`            | system temp dir                        |
    /// | `BFL_API_KEY`            | required                               |
    /// | `BFL_BASE_URL`           | `https://api.bfl.ai`                   |
    /// | `FAL_KEY`                | required                               |
    /// | `FAL_QUEUE_URL`          | `https://queue.fal.run`                |
    /// | `FAL_LORA_MODEL`         | `fal-ai/flux-lora`                     |
    /// | `FAL_TRAINING_MODEL`     | `fal-ai/flux-lora-fast-training`       |
    /// | `UPLOAD_HOST_URL`        | `https://tmpfiles.org/api/v1/upload`   |
    /// | `POLL_MAX_ATTEMPTS`      | `40`                                   |
    /// | `POLL_INTERVAL_MS`       | `500`                                  |
    /// | `SUBSCRIBE_MAX_ATTEMPTS` | `1800`                                 |
    /// | `SUBSCRIBE_INTERVAL_MS`  | `1000`                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let cors_origins: Vec<String> = env
            .string("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let staging_dir = env
            .optional("STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let poll = PollBudget::new(
            env.parse("POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS)?,
            Duration::from_millis(
                env.parse("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64)?,
            ),
        );
        let subscribe = PollBudget::new(
            env.parse("SUBSCRIBE_MAX_ATTEMPTS", 1800)?,
            Duration::from_millis(env.parse("SUBSCRIBE_INTERVAL_MS", 1000)?),
        );

        let providers = ProviderConfig {
            bfl_api_key: env.required("BFL_API_KEY")?,
            bfl_base_url: env.string("BFL_BASE_URL", DEFAULT_BFL_BASE_URL),
            fal_key: env.required("FAL_KEY")?,
            fal_queue_url: env.string("FAL_QUEUE_URL", DEFAULT_FAL_QUEUE_URL),
            fal_lora_model: env.string("FAL_LORA_MODEL", LORA_GENERATION_MODEL),
            fal_training_model: env.string("FAL_TRAINING_MODEL", LORA_TRAINING_MODEL),
            upload_url: env.string("UPLOAD_HOST_URL", DEFAULT_UPLOAD_URL),
            poll,
            subscribe,
        };

        let request_timeout_secs = env.parse("REQUEST_TIMEOUT_SECS", 3600)?;
        ensure_timeout_covers(request_timeout_secs, "poll", &poll)?;
        ensure_timeout_covers(request_timeout_secs, "subscribe", &subscribe)?;

        Ok(Self {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 8051)?,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes: env.parse("MAX_UPLOAD_BYTES", 100 * 1024 * 1024)?,
            staging_dir,
            providers,
        })
    }
}

/// The request timeout must outlast every wait budget, or requests are cut
/// off before the provider settles.
fn ensure_timeout_covers(
    timeout_secs: u64,
    budget: &'static str,
    wait: &PollBudget,
) -> Result<(), ConfigError> {
    let ceiling = wait.ceiling();
    if Duration::from_secs(timeout_secs) <= ceiling {
        return Err(ConfigError::TimeoutTooShort {
            timeout_secs,
            budget,
            ceiling,
        });
    }
    Ok(())
}

/// Typed accessors over a variable lookup function.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const KEYS: [(&str, &str); 2] = [("BFL_API_KEY", "bfl"), ("FAL_KEY", "fal")];

    #[test]
    fn defaults_apply_with_only_keys() {
        let config = ServerConfig::from_lookup(lookup(&KEYS)).unwrap();
        assert_eq!(config.port, 8051);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.providers.bfl_base_url, "https://api.bfl.ai");
        assert_eq!(config.providers.poll.max_attempts, 40);
        assert_eq!(config.providers.poll.interval, Duration::from_millis(500));
        assert_eq!(config.providers.fal_training_model, "fal-ai/flux-lora-fast-training");
    }

    #[test]
    fn missing_bfl_key_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("FAL_KEY", "fal")])).unwrap_err();
        assert_matches!(err, ConfigError::Missing("BFL_API_KEY"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = ServerConfig::from_lookup(lookup(&[("BFL_API_KEY", "  "), ("FAL_KEY", "f")]))
            .unwrap_err();
        assert_matches!(err, ConfigError::Missing("BFL_API_KEY"));
    }

    #[test]
    fn invalid_number_is_reported() {
        let mut vars = KEYS.to_vec();
        vars.push(("POLL_MAX_ATTEMPTS", "many"));
        let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { name: "POLL_MAX_ATTEMPTS", .. });
    }

    #[test]
    fn overrides_and_origin_list() {
        let mut vars = KEYS.to_vec();
        vars.push(("CORS_ORIGINS", "http://a.test, http://b.test,"));
        vars.push(("POLL_INTERVAL_MS", "250"));
        vars.push(("STAGING_DIR", "/var/tmp/headshots"));
        let config = ServerConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.providers.poll.interval, Duration::from_millis(250));
        assert_eq!(config.staging_dir, PathBuf::from("/var/tmp/headshots"));
    }

    #[test]
    fn timeout_shorter_than_subscribe_ceiling_is_rejected() {
        let mut vars = KEYS.to_vec();
        vars.push(("REQUEST_TIMEOUT_SECS", "600"));
        let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_matches!(
            err,
            ConfigError::TimeoutTooShort { timeout_secs: 600, budget: "subscribe", .. }
        );
    }

    #[test]
    fn timeout_shorter_than_poll_ceiling_is_rejected() {
        let mut vars = KEYS.to_vec();
        vars.push(("REQUEST_TIMEOUT_SECS", "60"));
        vars.push(("POLL_MAX_ATTEMPTS", "200"));
        vars.push(("SUBSCRIBE_MAX_ATTEMPTS", "10"));
        let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS (60s)"));
        assert_matches!(err, ConfigError::TimeoutTooShort { budget: "poll", .. });
    }

    #[test]
    fn overflowing_interval_is_rejected_not_panicking() {
        let mut vars = KEYS.to_vec();
        vars.push(("POLL_MAX_ATTEMPTS", "4000000000"));
        vars.push(("POLL_INTERVAL_MS", "18446744073709551615"));
        let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_matches!(err, ConfigError::TimeoutTooShort { budget: "poll", .. });
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = ServerConfig::from_lookup(lookup(&KEYS)).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"bfl\""));
    }
}
