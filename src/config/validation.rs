use crate::config::types::{
    AopsConfig, ArchiveConfig, Config, CrawlerConfig, FeedConfig, StackExchangeConfig,
    UserAgentConfig,
};
use crate::feed::Transform;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_archive_config(&config.archive)?;
    validate_aops_config(&config.aops)?;
    validate_stackexchange_config(&config.stackexchange)?;
    validate_feed_config(&config.feed)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.posts_per_request < 1 || config.posts_per_request > 500 {
        return Err(ConfigError::Validation(format!(
            "posts-per-request must be between 1 and 500, got {}",
            config.posts_per_request
        )));
    }

    if config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 20, got {}",
            config.max_retries
        )));
    }

    if config.connect_timeout_secs == 0 || config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs and request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(hook) = &config.hook_script {
        if hook.trim().is_empty() {
            return Err(ConfigError::Validation(
                "hook-script cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.divisions < 1 {
        return Err(ConfigError::Validation(
            "divisions must be >= 1".to_string(),
        ));
    }

    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "archive root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_aops_config(config: &AopsConfig) -> Result<(), ConfigError> {
    validate_root_url(&config.root_url, "aops root-url")?;
    validate_prefix(&config.file_prefix, "aops file-prefix")?;

    if config.bootstrap_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bootstrap-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_stackexchange_config(config: &StackExchangeConfig) -> Result<(), ConfigError> {
    if let Some(root) = &config.root_url {
        validate_root_url(root, "stackexchange root-url")?;
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    Ok(())
}

fn validate_feed_config(config: &FeedConfig) -> Result<(), ConfigError> {
    for url in &config.indexd_urls {
        Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid indexd URL '{}': {}", url, e)))?;
    }

    for (field, pipeline) in &config.fields {
        let Some((source, transforms)) = pipeline.split_first() else {
            return Err(ConfigError::Validation(format!(
                "feed field '{}' must name a source key",
                field
            )));
        };
        if source.is_empty() {
            return Err(ConfigError::Validation(format!(
                "feed field '{}' has an empty source key",
                field
            )));
        }
        for name in transforms {
            name.parse::<Transform>().map_err(|e| {
                ConfigError::Validation(format!("feed field '{}': {}", field, e))
            })?;
        }
    }

    Ok(())
}

/// Validates a site root URL (http or https, with a host)
fn validate_root_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must be an http(s) URL with a host",
            what, raw
        )));
    }

    Ok(())
}

/// File prefixes end up in file names, so keep them to a safe alphabet
fn validate_prefix(prefix: &str, what: &str) -> Result<(), ConfigError> {
    if prefix.is_empty()
        || !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "{} must be non-empty and contain only [A-Za-z0-9_-], got '{}'",
            what, prefix
        )));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
