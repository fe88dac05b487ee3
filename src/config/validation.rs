use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API access configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    let has_inline_key = config
        .api_key
        .as_deref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);

    if !has_inline_key && config.api_key_file.is_none() {
        return Err(ConfigError::MissingCredentials(
            "either api-key or api-key-file must be set".to_string(),
        ));
    }

    if config.call_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "call-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed identity is required".to_string(),
        ));
    }

    if let Some(seed) = config.seeds.iter().find(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "seed identities cannot be blank, got '{}'",
            seed
        )));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.retry_base_secs < 1 {
        return Err(ConfigError::Validation(
            "retry-base-secs must be >= 1".to_string(),
        ));
    }

    if config.ban_backoff_secs < config.retry_base_secs {
        return Err(ConfigError::Validation(format!(
            "ban-backoff-secs ({}) must not be shorter than retry-base-secs ({})",
            config.ban_backoff_secs, config.retry_base_secs
        )));
    }

    if config.population_estimate < 1 {
        return Err(ConfigError::Validation(
            "population-estimate must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.queue_path.is_empty() {
        return Err(ConfigError::Validation(
            "queue-path cannot be empty".to_string(),
        ));
    }

    if config.visited_path.is_empty() {
        return Err(ConfigError::Validation(
            "visited-path cannot be empty".to_string(),
        ));
    }

    if config.queue_path == config.visited_path {
        return Err(ConfigError::Validation(format!(
            "queue-path and visited-path must differ, both are '{}'",
            config.queue_path
        )));
    }

    Ok(())
}
