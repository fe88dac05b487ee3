use crate::config::types::{ApiConfig, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The API key is resolved during loading: an `api-key-file` is read
/// (relative to the config file's directory) and its first line becomes
/// `api.api_key`.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use douban_ripple::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Page size: {}", config.crawler.page_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let mut config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    config.api.api_key = Some(resolve_api_key(&config.api, base_dir)?);

    Ok(config)
}

/// Resolves the API key from the inline value or the key file
///
/// # Arguments
///
/// * `api` - The API section of the configuration
/// * `base_dir` - Directory relative key-file paths are resolved against
///
/// # Returns
///
/// * `Ok(String)` - The API key
/// * `Err(ConfigError)` - No key configured, or the key file is unreadable or empty
pub fn resolve_api_key(api: &ApiConfig, base_dir: &Path) -> Result<String, ConfigError> {
    if let Some(key) = api.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let file = api.api_key_file.as_ref().ok_or_else(|| {
        ConfigError::MissingCredentials("either api-key or api-key-file must be set".to_string())
    })?;

    let file = if file.is_absolute() {
        file.clone()
    } else {
        base_dir.join(file)
    };

    let content = std::fs::read_to_string(&file).map_err(|e| {
        ConfigError::MissingCredentials(format!("cannot read {}: {}", file.display(), e))
    })?;

    content
        .lines()
        .next()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ConfigError::MissingCredentials(format!("{} does not contain a key", file.display()))
        })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs against different configurations can be told apart.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
