//! Configuration loading.
//!
//! Reads `config.toml` from the given path and layers `SHELVER_*` environment
//! overrides on top. A missing or unparseable file falls back to defaults
//! with a warning rather than refusing to start.

use std::path::Path;

use shelver_types::config::ShelverConfig;
use tracing::{debug, warn};

/// Load configuration from `{path}` (a `config.toml`), then apply
/// environment overrides.
pub async fn load_config(path: &Path) -> ShelverConfig {
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(content) => match toml::from_str::<ShelverConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to parse {}: {err}, using defaults", path.display());
                ShelverConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config file at {}, using defaults", path.display());
            ShelverConfig::default()
        }
        Err(err) => {
            warn!("failed to read {}: {err}, using defaults", path.display());
            ShelverConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    config
}

/// Override select knobs from `SHELVER_*` environment variables.
///
/// Unparseable numeric values are ignored with a warning; the file/default
/// value stays in effect.
pub fn apply_env_overrides(config: &mut ShelverConfig) {
    override_string("SHELVER_LLM_API_KEY", &mut config.llm_api_key);
    override_string("SHELVER_LLM_BASE_URL", &mut config.llm_base_url);
    override_string("SHELVER_MODEL_NAME", &mut config.model_name);
    override_string("SHELVER_STORE_BASE_URL", &mut config.store_base_url);
    override_string(
        "SHELVER_ORCHESTRATOR_BASE_URL",
        &mut config.orchestrator_base_url,
    );
    override_string("SHELVER_DATABASE_PATH", &mut config.database_path);
    override_string("SHELVER_BIND_ADDR", &mut config.bind_addr);

    override_parsed("SHELVER_MAX_TOKENS", &mut config.max_tokens);
    override_parsed(
        "SHELVER_TOKEN_BUDGET_PERCENTAGE",
        &mut config.token_budget_percentage,
    );
    override_parsed("SHELVER_MAX_RETRIES_PER_ITEM", &mut config.max_retries_per_item);
    override_parsed("SHELVER_MAX_CALLBACK_RETRIES", &mut config.max_callback_retries);
    override_parsed("SHELVER_ALARM_INTERVAL_MS", &mut config.alarm_interval_ms);
    override_parsed("SHELVER_TEMPERATURE", &mut config.temperature);
    override_parsed(
        "SHELVER_INPUT_COST_PER_MILLION",
        &mut config.input_cost_per_million,
    );
    override_parsed(
        "SHELVER_OUTPUT_COST_PER_MILLION",
        &mut config.output_cost_per_million,
    );
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("ignoring unparseable {var}={value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).await;
        assert_eq!(config.max_tokens, 128_000);
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            "model_name = \"gpt-4o\"\nmax_retries_per_item = 5\ntoken_budget_percentage = 0.5\n",
        )
        .await
        .unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.model_name, "gpt-4o");
        assert_eq!(config.max_retries_per_item, 5);
        assert!((config.token_budget_percentage - 0.5).abs() < f64::EPSILON);
        // Untouched knobs keep their defaults.
        assert_eq!(config.alarm_interval_ms, 100);
    }

    #[tokio::test]
    async fn invalid_toml_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "this is not [valid toml").await.unwrap();

        let config = load_config(&path).await;
        assert_eq!(config.max_tokens, 128_000);
    }

    #[test]
    fn env_override_replaces_value() {
        // Serialized env mutation: this test owns its variable name.
        unsafe { std::env::set_var("SHELVER_TEST_MODEL_OVERRIDE", "gpt-5-nano") };
        let mut target = "original".to_string();
        override_string("SHELVER_TEST_MODEL_OVERRIDE", &mut target);
        assert_eq!(target, "gpt-5-nano");
        unsafe { std::env::remove_var("SHELVER_TEST_MODEL_OVERRIDE") };
    }

    #[test]
    fn unparseable_numeric_override_is_ignored() {
        unsafe { std::env::set_var("SHELVER_TEST_BAD_NUMBER", "not-a-number") };
        let mut target: u64 = 42;
        override_parsed("SHELVER_TEST_BAD_NUMBER", &mut target);
        assert_eq!(target, 42);
        unsafe { std::env::remove_var("SHELVER_TEST_BAD_NUMBER") };
    }
}
