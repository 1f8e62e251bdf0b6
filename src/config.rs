use std::{env, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub meme_bucket_name: String,
    pub memes_table: String,
    // Store region as string for simplicity here, aws_clients can convert
    pub aws_region: String,
    // Optional endpoint for LocalStack or any S3-compatible store
    pub localstack_endpoint: Option<String>,
    pub public_url_base: Option<String>,
    pub openai: OpenAiConfig,
    pub action_delay: Duration,
    pub max_action_delay: Duration,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub url_list: PathBuf,
    pub download_timeout: Duration,
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

// Never print the key.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiConfig {
    /// Returns the API key or the error every describing driver reports when it is absent.
    pub fn require_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".into()))
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let action_delay = Duration::from_millis(parse_var(&lookup, "ACTION_DELAY_MS", 500)?);
        let max_action_delay =
            Duration::from_millis(parse_var(&lookup, "MAX_ACTION_DELAY_MS", 30_000)?);
        if max_action_delay < action_delay {
            return Err(ConfigError::InvalidVar(
                "MAX_ACTION_DELAY_MS".into(),
                format!("must not be smaller than ACTION_DELAY_MS ({} ms)", action_delay.as_millis()),
            ));
        }

        Ok(Config {
            meme_bucket_name: var_or("MEME_BUCKET_NAME", "memes"),
            memes_table: var_or("MEMES_TABLE", "memes"),
            aws_region: var_or("AWS_DEFAULT_REGION", "us-east-1"),
            localstack_endpoint: optional("AWS_ENDPOINT_URL"),
            public_url_base: optional("PUBLIC_URL_BASE"),
            openai: OpenAiConfig {
                api_key: optional("OPENAI_API_KEY"),
                base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: var_or("OPENAI_MODEL", "gpt-3.5-turbo"),
            },
            action_delay,
            max_action_delay,
            input_dir: PathBuf::from(var_or("MEMES_INPUT_DIR", "Curated")),
            output_dir: PathBuf::from(var_or("MEMES_OUTPUT_DIR", "downloaded_memes")),
            url_list: PathBuf::from(var_or("MEMES_URL_LIST", "all-urls.txt")),
            download_timeout: Duration::from_secs(parse_var(&lookup, "DOWNLOAD_TIMEOUT_SECS", 10)?),
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => T::from_str(raw.trim())
            .map_err(|e| ConfigError::InvalidVar(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_match_the_batch_scripts() {
        let config = load(&[]).unwrap();
        assert_eq!(config.meme_bucket_name, "memes");
        assert_eq!(config.memes_table, "memes");
        assert_eq!(config.action_delay, Duration::from_millis(500));
        assert_eq!(config.download_timeout, Duration::from_secs(10));
        assert_eq!(config.input_dir, PathBuf::from("Curated"));
        assert_eq!(config.url_list, PathBuf::from("all-urls.txt"));
        assert_eq!(config.openai.model, "gpt-3.5-turbo");
        assert!(config.openai.api_key.is_none());
        assert!(config.localstack_endpoint.is_none());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("MEME_BUCKET_NAME", "  "), ("AWS_ENDPOINT_URL", "")]).unwrap();
        assert_eq!(config.meme_bucket_name, "memes");
        assert!(config.localstack_endpoint.is_none());
    }

    #[test]
    fn invalid_delay_is_reported_with_its_variable() {
        let err = load(&[("ACTION_DELAY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar(ref name, _) if name == "ACTION_DELAY_MS"));
    }

    #[test]
    fn max_delay_below_base_is_rejected() {
        let err = load(&[("ACTION_DELAY_MS", "1000"), ("MAX_ACTION_DELAY_MS", "10")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar(ref name, _) if name == "MAX_ACTION_DELAY_MS"));
    }

    #[test]
    fn missing_api_key_is_reported_on_demand() {
        let config = load(&[]).unwrap();
        assert!(matches!(
            config.openai.require_key(),
            Err(ConfigError::MissingVar(ref name)) if name == "OPENAI_API_KEY"
        ));

        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.openai.require_key().unwrap(), "sk-test");
        assert!(!format!("{:?}", config.openai).contains("sk-test"));
    }
}
